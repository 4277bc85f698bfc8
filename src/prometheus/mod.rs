//! Prometheus HTTP API plus the local `prometheus.yml` snapshot.

mod models;
mod snapshot;

pub use models::{
    ActiveTarget, AlertState, AlertingRuleStatus, AlertsResult, DroppedTarget, Exemplar,
    ExemplarQueryResult, Metric, PromAlert, QueryOptions, QueryValue, Range, RecordingRuleStatus,
    RuleGroupStatus, RuleStatus, RulesResult, Sample, SamplePair, SampleStream, TargetHealth,
    TargetsResult, Warnings,
};
pub use snapshot::{FileSdConfig, PrometheusGlobalYaml, PrometheusYaml, ScrapeConfigYaml};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::{read_yaml, PrometheusConfig};
use crate::errors::{PagError, Result};
use crate::transport::{ApiRequest, Credentials, Transport};
use crate::types::{RuleGroup, RuleGroups, ServiceDiscovery};
use models::{decode_envelope, format_seconds, format_timestamp};

/// Everything the crate can do against a Prometheus server
///
/// Implemented by [`PrometheusClient`]; accept `&dyn PrometheusApi` to be able
/// to substitute a fake in tests.
#[async_trait]
pub trait PrometheusApi: Send + Sync {
    /// Parsed `prometheus.yml` as it was when the client was built
    fn config_yaml(&self) -> PrometheusYaml;

    async fn healthy(&self, cancel: &CancellationToken) -> Result<()>;
    async fn ready(&self, cancel: &CancellationToken) -> Result<()>;
    async fn reload(&self, cancel: &CancellationToken) -> Result<()>;

    /// All metric names (`__name__` label values)
    async fn values(&self, cancel: &CancellationToken) -> Result<Vec<String>>;

    async fn query(
        &self,
        cancel: &CancellationToken,
        query: &str,
        time: DateTime<Utc>,
        options: QueryOptions,
    ) -> Result<(QueryValue, Warnings)>;

    async fn query_range(
        &self,
        cancel: &CancellationToken,
        query: &str,
        range: Range,
        options: QueryOptions,
    ) -> Result<(QueryValue, Warnings)>;

    async fn query_exemplars(
        &self,
        cancel: &CancellationToken,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExemplarQueryResult>>;

    /// Write a file_sd sidecar; picked up by Prometheus' own file watcher
    async fn add_target(&self, cancel: &CancellationToken, sd: &ServiceDiscovery) -> Result<()>;
    async fn targets(&self, cancel: &CancellationToken) -> Result<TargetsResult>;

    /// Write a rule file sidecar, then reload Prometheus
    async fn add_rule_groups(&self, cancel: &CancellationToken, group: &RuleGroup) -> Result<()>;
    async fn rules(&self, cancel: &CancellationToken) -> Result<RulesResult>;

    async fn alerts(&self, cancel: &CancellationToken) -> Result<AlertsResult>;
}

/// Client for a single Prometheus server
///
/// # Example
///
/// ```rust,no_run
/// use pag_api::{PrometheusApi, PrometheusClient, PrometheusConfig};
/// use reqwest_middleware::ClientBuilder;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let http = ClientBuilder::new(reqwest::Client::new()).build();
///     let config = PrometheusConfig::new("localhost:9090", "/etc/prometheus/prometheus.yml");
///     let prometheus = PrometheusClient::new(http, &config)?;
///
///     let names = prometheus.values(&CancellationToken::new()).await?;
///     println!("{} metric names", names.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PrometheusClient {
    transport: Transport,
    config_path: PathBuf,
    snapshot: Arc<PrometheusYaml>,
}

impl PrometheusClient {
    /// Parse the local config file and set up the HTTP transport
    ///
    /// No request is made; an unreachable server only shows up on the first call.
    pub fn new(client: ClientWithMiddleware, config: &PrometheusConfig) -> Result<Self> {
        let transport = Transport::new(client, &config.endpoint, Credentials::None)?;
        let snapshot: PrometheusYaml = read_yaml(&config.config_yaml)?;

        debug!(
            endpoint = %transport.base_url(),
            scrape_configs = snapshot.scrape_configs.len(),
            "Loaded Prometheus config"
        );

        Ok(Self {
            transport,
            config_path: config.config_yaml.clone(),
            snapshot: Arc::new(snapshot),
        })
    }

    /// Borrow the snapshot without cloning it
    pub fn snapshot(&self) -> &PrometheusYaml {
        &self.snapshot
    }

    /// Directory holding the config file; relative paths in it are resolved from here
    fn base_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new(""))
    }

    fn sidecar_dir(&self, file: &str) -> PathBuf {
        let dir = Path::new(file).parent().unwrap_or_else(|| Path::new(""));
        self.base_dir().join(dir)
    }

    async fn lifecycle(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<()> {
        self.transport.execute(request, cancel).await?.error_for_status()?;
        Ok(())
    }

    async fn api<T: serde::de::DeserializeOwned>(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<(T, Warnings)> {
        let response = self.transport.execute(request, cancel).await?;
        decode_envelope(response)
    }
}

#[async_trait]
impl PrometheusApi for PrometheusClient {
    fn config_yaml(&self) -> PrometheusYaml {
        self.snapshot.as_ref().clone()
    }

    #[instrument(name = "PrometheusClient::healthy", skip_all)]
    async fn healthy(&self, cancel: &CancellationToken) -> Result<()> {
        self.lifecycle(ApiRequest::get("/-/healthy"), cancel).await
    }

    #[instrument(name = "PrometheusClient::ready", skip_all)]
    async fn ready(&self, cancel: &CancellationToken) -> Result<()> {
        self.lifecycle(ApiRequest::get("/-/ready"), cancel).await
    }

    #[instrument(name = "PrometheusClient::reload", skip_all)]
    async fn reload(&self, cancel: &CancellationToken) -> Result<()> {
        self.lifecycle(ApiRequest::post("/-/reload"), cancel).await?;
        debug!("Prometheus reloaded");
        Ok(())
    }

    #[instrument(name = "PrometheusClient::values", skip_all)]
    async fn values(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let request = ApiRequest::get("/api/v1/label/:name/values").arg("name", "__name__");
        let (values, _) = self.api(request, cancel).await?;
        Ok(values)
    }

    #[instrument(name = "PrometheusClient::query", skip_all, fields(query = %query))]
    async fn query(
        &self,
        cancel: &CancellationToken,
        query: &str,
        time: DateTime<Utc>,
        options: QueryOptions,
    ) -> Result<(QueryValue, Warnings)> {
        let mut form = vec![("query", query.to_string()), ("time", format_timestamp(&time))];
        form.extend(options.pairs());

        self.api(ApiRequest::post("/api/v1/query").form(form), cancel).await
    }

    #[instrument(name = "PrometheusClient::query_range", skip_all, fields(query = %query))]
    async fn query_range(
        &self,
        cancel: &CancellationToken,
        query: &str,
        range: Range,
        options: QueryOptions,
    ) -> Result<(QueryValue, Warnings)> {
        let mut form = vec![
            ("query", query.to_string()),
            ("start", format_timestamp(&range.start)),
            ("end", format_timestamp(&range.end)),
            ("step", format_seconds(range.step)),
        ];
        form.extend(options.pairs());

        self.api(ApiRequest::post("/api/v1/query_range").form(form), cancel).await
    }

    #[instrument(name = "PrometheusClient::query_exemplars", skip_all, fields(query = %query))]
    async fn query_exemplars(
        &self,
        cancel: &CancellationToken,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExemplarQueryResult>> {
        let form = vec![
            ("query", query.to_string()),
            ("start", format_timestamp(&start)),
            ("end", format_timestamp(&end)),
        ];

        let (exemplars, _) = self
            .api(ApiRequest::post("/api/v1/query_exemplars").form(form), cancel)
            .await?;
        Ok(exemplars)
    }

    #[instrument(name = "PrometheusClient::add_target", skip_all, fields(name = %sd.name))]
    async fn add_target(&self, _cancel: &CancellationToken, sd: &ServiceDiscovery) -> Result<()> {
        check_sidecar_name(&sd.name)?;
        let file = self
            .snapshot
            .first_file_sd_file()
            .ok_or(PagError::NoFileServiceDiscovery)?;

        let dst = self.sidecar_dir(file).join(format!("{}.yaml", sd.name));
        let data = serde_yaml::to_string(&sd.endpoints).map_err(PagError::SerializeYaml)?;
        write_sidecar(&dst, data).await?;

        debug!(path = %dst.display(), "Wrote file_sd targets");
        Ok(())
    }

    #[instrument(name = "PrometheusClient::targets", skip_all)]
    async fn targets(&self, cancel: &CancellationToken) -> Result<TargetsResult> {
        let (targets, _) = self.api(ApiRequest::get("/api/v1/targets"), cancel).await?;
        Ok(targets)
    }

    #[instrument(name = "PrometheusClient::add_rule_groups", skip_all, fields(name = %group.name))]
    async fn add_rule_groups(&self, cancel: &CancellationToken, group: &RuleGroup) -> Result<()> {
        check_sidecar_name(&group.name)?;
        let file = self.snapshot.first_rule_file().ok_or(PagError::NoRuleFiles)?;

        let dst = self.sidecar_dir(file).join(format!("{}.yml", group.name));
        let doc = RuleGroups {
            groups: vec![group.clone()],
        };
        let data = serde_yaml::to_string(&doc).map_err(PagError::SerializeYaml)?;
        write_sidecar(&dst, data).await?;

        debug!(path = %dst.display(), "Wrote rule file");
        self.reload(cancel).await
    }

    #[instrument(name = "PrometheusClient::rules", skip_all)]
    async fn rules(&self, cancel: &CancellationToken) -> Result<RulesResult> {
        let (rules, _) = self.api(ApiRequest::get("/api/v1/rules"), cancel).await?;
        Ok(rules)
    }

    #[instrument(name = "PrometheusClient::alerts", skip_all)]
    async fn alerts(&self, cancel: &CancellationToken) -> Result<AlertsResult> {
        let (alerts, _) = self.api(ApiRequest::get("/api/v1/alerts"), cancel).await?;
        Ok(alerts)
    }
}

/// Sidecar names become file names, so they may not escape the target directory
fn check_sidecar_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(PagError::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn write_sidecar(path: &Path, data: String) -> Result<()> {
    tokio::fs::write(path, data)
        .await
        .map_err(|source| PagError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
}
