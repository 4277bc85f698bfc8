use reqwest::Client as HttpClient;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::{debug, instrument};

use crate::alertmanager::AlertmanagerClient;
use crate::config::Config;
use crate::errors::{PagError, Result};
use crate::grafana::GrafanaClient;
use crate::prometheus::PrometheusClient;

/// Entry point holding the validated config and the shared HTTP client
///
/// # Example
///
/// ```rust,no_run
/// use pag_api::{AlertmanagerApi, Client, Config, PrometheusApi};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new(Config::from_file("pag.yaml")?)?;
///     let cancel = CancellationToken::new();
///
///     client.prometheus()?.healthy(&cancel).await?;
///     client.alertmanager()?.ready(&cancel).await?;
///
///     let grafana = client.grafana().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Config,
    http: ClientWithMiddleware,
}

impl Client {
    /// Create a client with a plain reqwest transport
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.timeout.filter(|t| !t.is_zero()) {
            builder = builder.timeout(timeout.as_duration());
        }
        let http = builder.build().map_err(PagError::BuildHttpClient)?;

        Ok(Self {
            config,
            http: ClientBuilder::new(http).build(),
        })
    }

    /// Create a client with a custom reqwest middleware client
    ///
    /// This allows you to add custom middleware (retry, logging, etc.).
    /// `config.timeout` is ignored; configure it on `http` instead.
    pub fn with_http_client(http: ClientWithMiddleware, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prometheus client; reads `prometheus.config_yaml`
    #[instrument(name = "Client::prometheus", skip_all)]
    pub fn prometheus(&self) -> Result<PrometheusClient> {
        PrometheusClient::new(self.http.clone(), &self.config.prometheus)
    }

    /// Alertmanager client; reads `alertManager.config_yaml`
    #[instrument(name = "Client::alertmanager", skip_all)]
    pub fn alertmanager(&self) -> Result<AlertmanagerClient> {
        AlertmanagerClient::new(self.http.clone(), &self.config.alert_manager)
    }

    /// Grafana client; checks the credentials against the server first
    #[instrument(name = "Client::grafana", skip_all)]
    pub async fn grafana(&self) -> Result<GrafanaClient> {
        let grafana = GrafanaClient::connect(self.http.clone(), &self.config.grafana).await?;
        debug!("Grafana client ready");
        Ok(grafana)
    }
}
