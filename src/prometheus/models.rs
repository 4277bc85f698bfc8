//! Response shapes of the Prometheus HTTP API (`/api/v1/...`).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::{PagError, Result};
use crate::transport::RawResponse;

/// Label set of a series
pub type Metric = BTreeMap<String, String>;

/// Non-fatal warnings attached to a query result
pub type Warnings = Vec<String>;

/// `[<unix seconds>, "<value>"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePair(pub f64, pub String);

impl SamplePair {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        from_unix_seconds(self.0)
    }

    /// Numeric value; Prometheus encodes `NaN`, `+Inf` and `-Inf` as strings
    pub fn value(&self) -> Option<f64> {
        match self.1.as_str() {
            "+Inf" => Some(f64::INFINITY),
            "-Inf" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric: Metric,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SamplePair>,

    /// Native histogram sample, kept in its wire form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStream {
    pub metric: Metric,

    #[serde(default)]
    pub values: Vec<SamplePair>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub histograms: Vec<serde_json::Value>,
}

/// Result of an instant or range query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryValue {
    Vector(Vec<Sample>),
    Matrix(Vec<SampleStream>),
    Scalar(SamplePair),
    String(SamplePair),
}

/// Optional knobs for `query` and `query_range`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Server-side evaluation timeout
    pub timeout: Option<Duration>,
    /// Maximum number of returned series
    pub limit: Option<u64>,
}

impl QueryOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(timeout) = self.timeout {
            pairs.push(("timeout", format_seconds(timeout)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Time window and resolution of a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemplarQueryResult {
    pub series_labels: Metric,

    #[serde(default)]
    pub exemplars: Vec<Exemplar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    #[serde(default)]
    pub labels: Metric,
    pub value: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsResult {
    #[serde(default)]
    pub active_targets: Vec<ActiveTarget>,

    #[serde(default)]
    pub dropped_targets: Vec<DroppedTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealth {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTarget {
    #[serde(default)]
    pub discovered_labels: Metric,
    #[serde(default)]
    pub labels: Metric,
    pub scrape_pool: String,
    pub scrape_url: String,
    #[serde(default)]
    pub global_url: String,
    #[serde(default)]
    pub last_error: String,
    #[serde(default)]
    pub last_scrape: Option<DateTime<Utc>>,
    /// Seconds
    #[serde(default)]
    pub last_scrape_duration: f64,
    pub health: TargetHealth,
    #[serde(default)]
    pub scrape_interval: Option<String>,
    #[serde(default)]
    pub scrape_timeout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedTarget {
    #[serde(default)]
    pub discovered_labels: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesResult {
    #[serde(default)]
    pub groups: Vec<RuleGroupStatus>,
}

/// A loaded rule group as reported by `/api/v1/rules`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupStatus {
    pub name: String,
    pub file: String,
    /// Evaluation interval in seconds
    #[serde(default)]
    pub interval: f64,
    #[serde(default)]
    pub rules: Vec<RuleStatus>,
    #[serde(default)]
    pub last_evaluation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub evaluation_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleStatus {
    Alerting(AlertingRuleStatus),
    Recording(RecordingRuleStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertingRuleStatus {
    pub name: String,
    pub query: String,
    /// Seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub labels: Metric,
    #[serde(default)]
    pub annotations: Metric,
    #[serde(default)]
    pub alerts: Vec<PromAlert>,
    pub health: String,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRuleStatus {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub labels: Metric,
    pub health: String,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertsResult {
    #[serde(default)]
    pub alerts: Vec<PromAlert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Inactive,
    Pending,
    Firing,
}

/// An active alert as evaluated by Prometheus' rule manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromAlert {
    #[serde(default)]
    pub active_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub annotations: Metric,
    #[serde(default)]
    pub labels: Metric,
    pub state: AlertState,
    #[serde(default)]
    pub value: String,
}

/// `{"status": ..., "data": ..., "errorType": ..., "error": ..., "warnings": [...]}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Warnings,
}

/// Unwrap the API envelope
///
/// An `error` envelope wins over the HTTP status, since Prometheus reports
/// `bad_data` and friends with 4xx/5xx codes and a JSON body.
pub(crate) fn decode_envelope<T: serde::de::DeserializeOwned>(response: RawResponse) -> Result<(T, Warnings)> {
    let envelope: Envelope<T> = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(err) => {
            response.clone().error_for_status()?;
            return Err(PagError::Decode(err));
        }
    };

    if envelope.status == "error" {
        return Err(PagError::Prometheus {
            error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: envelope.error.unwrap_or_default(),
        });
    }

    let response = response.error_for_status()?;
    let data = envelope.data.ok_or_else(|| PagError::Prometheus {
        error_type: "bad_response".to_string(),
        message: format!("missing data in {} response", response.status),
    })?;

    Ok((data, envelope.warnings))
}

/// Unix seconds with fractional part, the way the query API expects timestamps
pub(crate) fn format_timestamp(time: &DateTime<Utc>) -> String {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9;
    seconds.to_string()
}

pub(crate) fn format_seconds(duration: Duration) -> String {
    duration.as_secs_f64().to_string()
}

fn from_unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    let secs = seconds.floor();
    let nanos = ((seconds - secs) * 1e9).round() as u32;
    Utc.timestamp_opt(secs as i64, nanos.min(999_999_999)).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_decode_vector() {
        let body = r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"__name__":"up","job":"prometheus"},"value":[1700000000.5,"1"]}]},"warnings":["partial"]}"#;
        let (value, warnings): (QueryValue, _) = decode_envelope(raw(200, body)).unwrap();

        let QueryValue::Vector(samples) = value else {
            panic!("expected vector");
        };
        assert_eq!(samples[0].metric["job"], "prometheus");
        let pair = samples[0].value.as_ref().unwrap();
        assert_eq!(pair.value(), Some(1.0));
        assert_eq!(pair.timestamp().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(warnings, vec!["partial".to_string()]);
    }

    #[test]
    fn test_decode_matrix_and_scalar() {
        let body = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{},"values":[[1,"1"],[2,"+Inf"]]}]}}"#;
        let (value, _): (QueryValue, _) = decode_envelope(raw(200, body)).unwrap();
        let QueryValue::Matrix(streams) = value else {
            panic!("expected matrix");
        };
        assert_eq!(streams[0].values[1].value(), Some(f64::INFINITY));

        let body = r#"{"status":"success","data":{"resultType":"scalar","result":[1,"42"]}}"#;
        let (value, _): (QueryValue, _) = decode_envelope(raw(200, body)).unwrap();
        assert_eq!(value, QueryValue::Scalar(SamplePair(1.0, "42".to_string())));
    }

    #[test]
    fn test_decode_error_envelope() {
        let body = r#"{"status":"error","errorType":"bad_data","error":"parse error at char 4"}"#;
        let err = decode_envelope::<QueryValue>(raw(400, body)).unwrap_err();

        match err {
            PagError::Prometheus { error_type, message } => {
                assert_eq!(error_type, "bad_data");
                assert_eq!(message, "parse error at char 4");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_non_json_error_status() {
        let err = decode_envelope::<QueryValue>(raw(502, "Bad Gateway")).unwrap_err();
        assert!(matches!(err, PagError::Api { status: 502, .. }));
    }

    #[test]
    fn test_decode_non_json_success() {
        let err = decode_envelope::<QueryValue>(raw(200, "<html>")).unwrap_err();
        assert!(matches!(err, PagError::Decode(_)));
    }

    #[test]
    fn test_decode_rules() {
        let body = r#"{"status":"success","data":{"groups":[{"name":"node","file":"/etc/prometheus/rules/node.yml","interval":15,"rules":[
            {"type":"alerting","name":"InstanceDown","query":"up == 0","duration":300,"labels":{"severity":"critical"},"annotations":{},"alerts":[],"health":"ok","state":"inactive"},
            {"type":"recording","name":"job:up:sum","query":"sum by (job) (up)","health":"ok"}
        ]}]}}"#;
        let (rules, _): (RulesResult, _) = decode_envelope(raw(200, body)).unwrap();

        let group = &rules.groups[0];
        assert_eq!(group.interval, 15.0);
        assert!(matches!(&group.rules[0], RuleStatus::Alerting(rule) if rule.duration == 300.0));
        assert!(matches!(&group.rules[1], RuleStatus::Recording(rule) if rule.name == "job:up:sum"));
    }

    #[test]
    fn test_format_timestamp() {
        let time = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
        assert_eq!(format_timestamp(&time), "1700000000.5");

        let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(format_timestamp(&time), "1700000000");
    }

    #[test]
    fn test_query_options_pairs() {
        let options = QueryOptions::default()
            .with_timeout(Duration::from_millis(1500))
            .with_limit(10);
        assert_eq!(
            options.pairs(),
            vec![("timeout", "1.5".to_string()), ("limit", "10".to_string())]
        );
        assert!(QueryOptions::default().pairs().is_empty());
    }
}
