use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::duration::PromDuration;

/// One `file_sd` target group
///
/// ```yaml
/// - targets: ["10.0.0.1:9100"]
///   labels:
///     env: prod
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDiscoveryEndpoint {
    pub targets: Vec<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ServiceDiscoveryEndpoint {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}

/// Named set of target groups, written to `<name>.yaml` in the file_sd directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDiscovery {
    pub name: String,

    pub endpoints: Vec<ServiceDiscoveryEndpoint>,
}

impl ServiceDiscovery {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoints: Vec::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: ServiceDiscoveryEndpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }
}

/// Alerting or recording rule in Prometheus rule-file format
///
/// # Example
///
/// ```rust
/// use pag_api::{PromDuration, Rule};
///
/// let rule = Rule::alerting("InstanceDown", "up == 0")
///     .with_for(PromDuration::from_secs(300))
///     .with_label("severity", "critical")
///     .with_annotation("summary", "Instance {{ $labels.instance }} down");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,

    pub expr: String,

    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_firing_for: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Rule {
    pub fn alerting(name: &str, expr: &str) -> Self {
        Self {
            alert: Some(name.to_string()),
            expr: expr.to_string(),
            ..Self::default()
        }
    }

    pub fn recording(record: &str, expr: &str) -> Self {
        Self {
            record: Some(record.to_string()),
            expr: expr.to_string(),
            ..Self::default()
        }
    }

    /// How long the expression must hold before the alert fires
    pub fn with_for(mut self, duration: PromDuration) -> Self {
        self.for_duration = Some(duration);
        self
    }

    pub fn with_keep_firing_for(mut self, duration: PromDuration) -> Self {
        self.keep_firing_for = Some(duration);
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<PromDuration>,

    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interval: None,
            rules: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: PromDuration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Top-level document of a rule file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroups {
    pub groups: Vec<RuleGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_yaml_shape() {
        let group = RuleGroup::new("node").with_rule(
            Rule::alerting("InstanceDown", "up == 0")
                .with_for(PromDuration::from_secs(300))
                .with_label("severity", "critical"),
        );
        let doc = RuleGroups { groups: vec![group] };

        let yaml = serde_yaml::to_string(&doc).unwrap();
        assert!(yaml.contains("name: node"));
        assert!(yaml.contains("alert: InstanceDown"));
        assert!(yaml.contains("for: 5m"));
        assert!(yaml.contains("severity: critical"));
        assert!(!yaml.contains("record"));
        assert!(!yaml.contains("annotations"));
    }

    #[test]
    fn test_parse_upstream_rule_file() {
        let yaml = r#"
groups:
  - name: example
    interval: 1m
    rules:
      - record: job:http_inprogress_requests:sum
        expr: sum by (job) (http_inprogress_requests)
      - alert: HighRequestLatency
        expr: job:request_latency_seconds:mean5m{job="myjob"} > 0.5
        for: 10m
        labels:
          severity: page
        annotations:
          summary: High request latency
"#;
        let doc: RuleGroups = serde_yaml::from_str(yaml).unwrap();
        let group = &doc.groups[0];
        assert_eq!(group.interval, Some(PromDuration::from_secs(60)));
        assert_eq!(group.rules[0].record.as_deref(), Some("job:http_inprogress_requests:sum"));
        assert_eq!(group.rules[1].for_duration, Some(PromDuration::from_secs(600)));
        assert_eq!(group.rules[1].labels["severity"], "page");
    }

    #[test]
    fn test_service_discovery_builder() {
        let sd = ServiceDiscovery::new("node").with_endpoint(
            ServiceDiscoveryEndpoint::new(["10.0.0.1:9100", "10.0.0.2:9100"]).with_label("env", "prod"),
        );

        assert_eq!(sd.endpoints[0].targets.len(), 2);

        let yaml = serde_yaml::to_string(&sd.endpoints).unwrap();
        assert!(yaml.starts_with("- targets:"));
        assert!(yaml.contains("env: prod"));
    }
}
