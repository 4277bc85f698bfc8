//! # PAG API
//!
//! One async Rust client for a monitoring stack of [Prometheus](https://prometheus.io),
//! [Alertmanager](https://prometheus.io/docs/alerting/latest/alertmanager/) and
//! [Grafana](https://grafana.com).
//!
//! ## Features
//!
//! - Typed Prometheus queries, targets, rules and alerts
//! - File-based service discovery targets and rule groups written as sidecar YAML
//! - Alertmanager lifecycle endpoints and alert ingestion
//! - Grafana API keys, data sources, folders and dashboards
//! - Parsed snapshots of the local `prometheus.yml` and `alertmanager.yml`
//! - Every call takes a [`CancellationToken`](tokio_util::sync::CancellationToken)
//!
//! ## Example
//!
//! ```rust,no_run
//! use pag_api::{Client, Config, PrometheusApi, QueryOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Config::from_file("pag.yaml")?)?;
//!     let prometheus = client.prometheus()?;
//!
//!     let cancel = CancellationToken::new();
//!     let (value, warnings) = prometheus
//!         .query(&cancel, "up", chrono::Utc::now(), QueryOptions::default())
//!         .await?;
//!
//!     println!("{value:?} ({} warnings)", warnings.len());
//!     Ok(())
//! }
//! ```

mod alertmanager;
mod client;
mod config;
mod duration;
mod errors;
mod grafana;
mod http_config;
mod prometheus;
mod transport;
mod types;

pub use alertmanager::{
    Alert, AlertSeverity, AlertmanagerApi, AlertmanagerClient, AlertmanagerGlobalYaml,
    AlertmanagerYaml, EmailConfig, InhibitRule, Receiver, Route, WebhookConfig, WechatConfig,
};
pub use client::Client;
pub use config::{AlertmanagerConfig, Config, GrafanaConfig, PrometheusConfig};
pub use duration::PromDuration;
pub use errors::{PagError, Result};
pub use grafana::{
    ApiKeyRole, DashboardFullWithMeta, DashboardMeta, DataSource, Folder, GrafanaApi,
    GrafanaClient, SaveDashboardResult,
};
pub use http_config::{Authorization, BasicAuth, HttpClientConfig, TlsConfig};
pub use prometheus::{
    ActiveTarget, AlertState, AlertingRuleStatus, AlertsResult, DroppedTarget, Exemplar,
    ExemplarQueryResult, FileSdConfig, Metric, PromAlert, PrometheusApi, PrometheusClient,
    PrometheusGlobalYaml, PrometheusYaml, QueryOptions, QueryValue, Range, RecordingRuleStatus,
    RuleGroupStatus, RuleStatus, RulesResult, Sample, SamplePair, SampleStream,
    ScrapeConfigYaml, TargetHealth, TargetsResult, Warnings,
};
pub use transport::{normalize_endpoint, ApiRequest, Credentials, RawResponse, Transport};
pub use types::{Rule, RuleGroup, RuleGroups, ServiceDiscovery, ServiceDiscoveryEndpoint};
