//! Alertmanager lifecycle endpoints, alert ingestion and the local
//! `alertmanager.yml` snapshot.

mod alert;
mod snapshot;

pub use alert::{Alert, AlertSeverity};
pub use snapshot::{
    AlertmanagerGlobalYaml, AlertmanagerYaml, EmailConfig, InhibitRule, Receiver, Route,
    WebhookConfig, WechatConfig,
};

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::{read_yaml, AlertmanagerConfig};
use crate::errors::Result;
use crate::transport::{ApiRequest, Credentials, Transport};

#[async_trait]
pub trait AlertmanagerApi: Send + Sync {
    /// Parsed `alertmanager.yml` as it was when the client was built
    fn config_yaml(&self) -> AlertmanagerYaml;

    async fn healthy(&self, cancel: &CancellationToken) -> Result<()>;
    async fn ready(&self, cancel: &CancellationToken) -> Result<()>;
    async fn reload(&self, cancel: &CancellationToken) -> Result<()>;

    /// Push alerts; an empty list makes no request
    async fn push_alerts(&self, cancel: &CancellationToken, alerts: &[Alert]) -> Result<()>;
}

/// Client for a single Alertmanager instance
///
/// # Example
///
/// ```rust,no_run
/// use pag_api::{Alert, AlertSeverity, AlertmanagerApi, AlertmanagerClient, AlertmanagerConfig};
/// use reqwest_middleware::ClientBuilder;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let http = ClientBuilder::new(reqwest::Client::new()).build();
///     let config = AlertmanagerConfig::new("localhost:9093", "/etc/alertmanager/alertmanager.yml");
///     let alertmanager = AlertmanagerClient::new(http, &config)?;
///
///     let alert = Alert::new("HighMemoryUsage").with_severity(AlertSeverity::Warning);
///     alertmanager.push_alerts(&CancellationToken::new(), &[alert]).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AlertmanagerClient {
    transport: Transport,
    snapshot: Arc<AlertmanagerYaml>,
}

impl AlertmanagerClient {
    /// Parse the local config file and set up the HTTP transport
    ///
    /// Does not contact Alertmanager.
    pub fn new(client: ClientWithMiddleware, config: &AlertmanagerConfig) -> Result<Self> {
        let transport = Transport::new(client, &config.endpoint, Credentials::None)?;
        let snapshot: AlertmanagerYaml = read_yaml(&config.config_yaml)?;

        debug!(
            endpoint = %transport.base_url(),
            receivers = snapshot.receivers.len(),
            "Loaded Alertmanager config"
        );

        Ok(Self {
            transport,
            snapshot: Arc::new(snapshot),
        })
    }

    pub fn snapshot(&self) -> &AlertmanagerYaml {
        &self.snapshot
    }

    async fn lifecycle(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<()> {
        self.transport.execute(request, cancel).await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl AlertmanagerApi for AlertmanagerClient {
    fn config_yaml(&self) -> AlertmanagerYaml {
        self.snapshot.as_ref().clone()
    }

    #[instrument(name = "AlertmanagerClient::healthy", skip_all)]
    async fn healthy(&self, cancel: &CancellationToken) -> Result<()> {
        self.lifecycle(ApiRequest::get("/-/healthy"), cancel).await
    }

    #[instrument(name = "AlertmanagerClient::ready", skip_all)]
    async fn ready(&self, cancel: &CancellationToken) -> Result<()> {
        self.lifecycle(ApiRequest::get("/-/ready"), cancel).await
    }

    #[instrument(name = "AlertmanagerClient::reload", skip_all)]
    async fn reload(&self, cancel: &CancellationToken) -> Result<()> {
        self.lifecycle(ApiRequest::post("/-/reload"), cancel).await?;
        debug!("Alertmanager reloaded");
        Ok(())
    }

    #[instrument(
        name = "AlertmanagerClient::push_alerts",
        skip_all,
        fields(alert_count = alerts.len())
    )]
    async fn push_alerts(&self, cancel: &CancellationToken, alerts: &[Alert]) -> Result<()> {
        if alerts.is_empty() {
            debug!("No alerts to push");
            return Ok(());
        }

        let request = ApiRequest::post("/api/v2/alerts").json(alerts)?;
        self.lifecycle(request, cancel).await?;

        debug!("Alerts pushed successfully");
        Ok(())
    }
}
