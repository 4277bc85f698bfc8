//! Typed view of `prometheus.yml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::duration::PromDuration;
use crate::http_config::HttpClientConfig;
use crate::types::ServiceDiscoveryEndpoint;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrometheusYaml {
    #[serde(default)]
    pub global: PrometheusGlobalYaml,

    #[serde(default)]
    pub rule_files: Vec<String>,

    #[serde(default)]
    pub scrape_configs: Vec<ScrapeConfigYaml>,
}

impl PrometheusYaml {
    /// First file listed by any `file_sd_configs` entry, in scrape config order
    pub fn first_file_sd_file(&self) -> Option<&str> {
        self.scrape_configs
            .iter()
            .flat_map(|sc| sc.file_sd_configs.iter())
            .find_map(|sd| sd.files.first())
            .map(String::as_str)
    }

    pub fn first_rule_file(&self) -> Option<&str> {
        self.rule_files.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusGlobalYaml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_interval: Option<PromDuration>,

    /// Shifts rule evaluation into the past so late samples are included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_query_offset: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_log_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_failure_log_file: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfigYaml {
    pub job_name: String,

    #[serde(default)]
    pub honor_labels: bool,

    #[serde(default = "default_true")]
    pub honor_timestamps: bool,

    #[serde(default)]
    pub track_timestamps_staleness: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<PromDuration>,

    #[serde(default)]
    pub scrape_classic_histograms: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_failure_log_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(default = "default_true")]
    pub enable_compression: bool,

    /// `basic_auth`, `tls_config` and friends sit inline in the scrape config
    #[serde(flatten)]
    pub http_client_config: HttpClientConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_configs: Vec<ServiceDiscoveryEndpoint>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_sd_configs: Vec<FileSdConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSdConfig {
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<PromDuration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::read_yaml;
    use crate::config::test_support::testdata;

    #[test]
    fn test_parse_fixture() {
        let yaml: PrometheusYaml = read_yaml(&testdata("prometheus.yaml")).unwrap();

        assert_eq!(yaml.global.scrape_interval, Some(PromDuration::from_secs(15)));
        assert_eq!(yaml.global.external_labels["monitor"], "pag");
        assert_eq!(yaml.rule_files, vec!["rules/*.yml".to_string()]);

        let first = &yaml.scrape_configs[0];
        assert_eq!(first.job_name, "prometheus");
        assert!(first.honor_timestamps);
        assert_eq!(first.static_configs[0].targets, vec!["localhost:9090".to_string()]);

        let node = &yaml.scrape_configs[1];
        assert_eq!(node.metrics_path.as_deref(), Some("/metrics"));
        assert_eq!(
            node.http_client_config.basic_auth.as_ref().map(|b| b.username.as_str()),
            Some("scraper")
        );
        assert_eq!(yaml.first_file_sd_file(), Some("targets/*.yaml"));
    }

    #[test]
    fn test_first_file_sd_skips_empty_entries() {
        let yaml: PrometheusYaml = serde_yaml::from_str(
            r#"
scrape_configs:
  - job_name: a
    file_sd_configs:
      - files: []
  - job_name: b
    file_sd_configs:
      - files: [/etc/prometheus/sd/b.yaml]
"#,
        )
        .unwrap();

        assert_eq!(yaml.first_file_sd_file(), Some("/etc/prometheus/sd/b.yaml"));
    }

    #[test]
    fn test_empty_document_defaults() {
        let yaml: PrometheusYaml = serde_yaml::from_str("{}").unwrap();
        assert!(yaml.scrape_configs.is_empty());
        assert_eq!(yaml.first_file_sd_file(), None);
        assert_eq!(yaml.first_rule_file(), None);
    }
}
