use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Value of the conventional `severity` label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl Display for AlertSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertSeverity::Critical => "critical",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Info => "info",
        };
        f.write_str(name)
    }
}

/// Alert as accepted by `POST /api/v2/alerts`
///
/// Alertmanager identifies an alert by its full label set; pushing the same
/// labels again refreshes the existing alert instead of creating a new one.
///
/// # Example
///
/// ```rust
/// use pag_api::{Alert, AlertSeverity};
///
/// let alert = Alert::new("DiskFull")
///     .with_severity(AlertSeverity::Critical)
///     .with_label("instance", "db-1")
///     .with_summary("Disk usage above 95%");
/// assert_eq!(alert.alertname(), Some("DiskFull"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,

    /// Set to resolve the alert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,

    #[serde(rename = "generatorURL", default, skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
}

impl Alert {
    /// New alert carrying only the `alertname` label, starting now
    pub fn new(alertname: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("alertname".to_string(), alertname.to_string());

        Self {
            labels,
            annotations: BTreeMap::new(),
            starts_at: Some(Utc::now()),
            ends_at: None,
            generator_url: None,
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_severity(self, severity: AlertSeverity) -> Self {
        self.with_label("severity", &severity.to_string())
    }

    /// Annotations do not take part in identity
    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_summary(self, summary: &str) -> Self {
        self.with_annotation("summary", summary)
    }

    pub fn with_description(self, description: &str) -> Self {
        self.with_annotation("description", description)
    }

    pub fn with_generator_url(mut self, url: &str) -> Self {
        self.generator_url = Some(url.to_string());
        self
    }

    pub fn with_starts_at(mut self, time: DateTime<Utc>) -> Self {
        self.starts_at = Some(time);
        self
    }

    pub fn with_ends_at(mut self, time: DateTime<Utc>) -> Self {
        self.ends_at = Some(time);
        self
    }

    /// Mark the alert as resolved as of now
    pub fn resolve(mut self) -> Self {
        self.ends_at = Some(Utc::now());
        self
    }

    pub fn alertname(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}
