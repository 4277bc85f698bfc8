use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::duration::PromDuration;
use crate::errors::{PagError, Result};

/// Connection settings for all three backends
///
/// Usually loaded from a YAML (or JSON) file:
///
/// ```yaml
/// timeout: 30s
/// prometheus:
///   endpoint: localhost:9090
///   config_yaml: /etc/prometheus/prometheus.yml
/// alertManager:
///   endpoint: localhost:9093
///   config_yaml: /etc/alertmanager/alertmanager.yml
/// grafana:
///   endpoint: localhost:3000
///   api_token: glsa_xxx
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub prometheus: PrometheusConfig,

    #[serde(rename = "alertManager", alias = "alertmanager")]
    pub alert_manager: AlertmanagerConfig,

    pub grafana: GrafanaConfig,

    /// Timeout applied to every request of the shared HTTP client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<PromDuration>,
}

impl Config {
    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = read_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section; the error names the first section that fails
    pub fn validate(&self) -> Result<()> {
        self.prometheus.validate()?;
        self.alert_manager.validate()?;
        self.grafana.validate()
    }
}

/// Prometheus endpoint plus the path of a local copy of its `prometheus.yml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub config_yaml: PathBuf,
}

impl PrometheusConfig {
    pub fn new(endpoint: impl Into<String>, config_yaml: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            config_yaml: config_yaml.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint_and_file("prometheus", &self.endpoint, &self.config_yaml)
    }
}

/// Alertmanager endpoint plus the path of a local copy of its `alertmanager.yml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertmanagerConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub config_yaml: PathBuf,
}

impl AlertmanagerConfig {
    pub fn new(endpoint: impl Into<String>, config_yaml: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            config_yaml: config_yaml.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint_and_file("alertManager", &self.endpoint, &self.config_yaml)
    }
}

fn default_org_id() -> u64 {
    1
}

/// Grafana endpoint and credentials
///
/// The API token is sent as a bearer token. Without a token, username and
/// password are sent as basic auth together with the `X-Grafana-Org-Id` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrafanaConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_token: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_org_id")]
    pub org_id: u64,
}

impl Default for GrafanaConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: String::new(),
            username: String::new(),
            password: String::new(),
            org_id: default_org_id(),
        }
    }
}

impl GrafanaConfig {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            ..Self::default()
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(PagError::MissingField {
                section: "grafana",
                field: "endpoint",
            });
        }
        if self.api_token.is_empty() && (self.username.is_empty() || self.password.is_empty()) {
            return Err(PagError::MissingField {
                section: "grafana",
                field: "api_token",
            });
        }
        Ok(())
    }
}

fn validate_endpoint_and_file(section: &'static str, endpoint: &str, file: &Path) -> Result<()> {
    if endpoint.is_empty() {
        return Err(PagError::MissingField {
            section,
            field: "endpoint",
        });
    }
    if file.as_os_str().is_empty() {
        return Err(PagError::MissingField {
            section,
            field: "config_yaml",
        });
    }
    if !file.exists() {
        return Err(PagError::ConfigFileNotFound(file.to_path_buf()));
    }
    Ok(())
}

/// Read a whole file and deserialize it as YAML
pub(crate) fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            PagError::ConfigFileNotFound(path.to_path_buf())
        } else {
            PagError::ReadFile {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_yaml::from_str(&data).map_err(|source| PagError::ParseYaml {
        path: path.to_path_buf(),
        source,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{scratch_dir, testdata};
    use super::*;

    fn valid_config() -> Config {
        Config {
            prometheus: PrometheusConfig::new("localhost:9090", testdata("prometheus.yaml")),
            alert_manager: AlertmanagerConfig::new("localhost:9093", testdata("alertmanager.yaml")),
            grafana: GrafanaConfig::new("localhost:3000", "token"),
            timeout: None,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_endpoint() {
        let mut config = valid_config();
        config.prometheus.endpoint.clear();

        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "prometheus config: endpoint is required");
    }

    #[test]
    fn test_missing_config_yaml() {
        let mut config = valid_config();
        config.alert_manager.config_yaml = PathBuf::new();

        assert!(matches!(
            config.validate(),
            Err(PagError::MissingField {
                section: "alertManager",
                field: "config_yaml"
            })
        ));
    }

    #[test]
    fn test_config_yaml_must_exist() {
        let mut config = valid_config();
        config.prometheus.config_yaml = PathBuf::from("/definitely/not/here.yml");

        assert!(matches!(config.validate(), Err(PagError::ConfigFileNotFound(_))));
    }

    #[test]
    fn test_grafana_requires_token_or_basic_auth() {
        let mut config = valid_config();
        config.grafana.api_token.clear();
        config.grafana.username = "admin".to_string();

        assert!(matches!(
            config.validate(),
            Err(PagError::MissingField {
                section: "grafana",
                field: "api_token"
            })
        ));
    }

    #[test]
    fn test_grafana_basic_auth_without_token() {
        let mut config = valid_config();
        config.grafana = GrafanaConfig::new("localhost:3000", "").with_basic_auth("admin", "admin");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = scratch_dir("config");
        let path = dir.join("pag.yaml");
        let body = format!(
            "timeout: 15s\nprometheus:\n  endpoint: localhost:9090\n  config_yaml: {}\nalertmanager:\n  endpoint: localhost:9093\n  config_yaml: {}\ngrafana:\n  endpoint: localhost:3000\n  api_token: abc\n",
            testdata("prometheus.yaml").display(),
            testdata("alertmanager.yaml").display(),
        );
        std::fs::write(&path, body).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.timeout, Some(PromDuration::from_secs(15)));
        assert_eq!(config.alert_manager.endpoint, "localhost:9093");
        assert_eq!(config.grafana.org_id, 1);
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, PagError::ConfigFileNotFound(_)));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let dir = scratch_dir("config-invalid");
        let path = dir.join("pag.yaml");
        std::fs::write(&path, "prometheus: [unclosed").unwrap();

        assert!(matches!(Config::from_file(&path), Err(PagError::ParseYaml { .. })));
    }
}
