//! Grafana HTTP API: API keys, data sources, folders and dashboards.

mod models;

pub use models::{
    ApiKeyRole, DashboardFullWithMeta, DashboardMeta, DataSource, Folder, SaveDashboardResult,
};

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::GrafanaConfig;
use crate::errors::Result;
use crate::transport::{ApiRequest, Credentials, Transport};
use models::{
    AddApiKeyCommand, AddDataSourceCommand, AddDataSourceResult, CreateFolderCommand, DeleteResult,
    FolderSearchHit, NewApiKeyResult, SaveDashboardCommand,
};

#[async_trait]
pub trait GrafanaApi: Send + Sync {
    /// Create an Admin API key living `ttl_seconds` and return its secret
    async fn add_api_key(&self, cancel: &CancellationToken, name: &str, ttl_seconds: i64) -> Result<String>;

    async fn data_source_by_name(&self, cancel: &CancellationToken, name: &str) -> Result<DataSource>;
    async fn add_data_source(&self, cancel: &CancellationToken, ds: &DataSource) -> Result<DataSource>;

    /// Folder whose title equals `title` exactly, created when none exists
    ///
    /// When several folders share the title, the first one listed wins.
    ///
    /// Not atomic: two concurrent calls with the same new title can both
    /// create a folder.
    async fn find_or_create_folder(&self, cancel: &CancellationToken, title: &str) -> Result<Folder>;
    /// Delete a folder; returns its title
    async fn delete_folder(&self, cancel: &CancellationToken, uid: &str) -> Result<String>;

    async fn dashboard_by_uid(&self, cancel: &CancellationToken, uid: &str) -> Result<DashboardFullWithMeta>;
    /// Create or overwrite `dashboard` inside the folder `folder_uid`
    async fn upsert_dashboard(
        &self,
        cancel: &CancellationToken,
        folder_uid: &str,
        dashboard: &serde_json::Value,
    ) -> Result<SaveDashboardResult>;
    /// Delete a dashboard; returns its title
    async fn delete_dashboard(&self, cancel: &CancellationToken, uid: &str) -> Result<String>;
}

/// Client for a Grafana instance
///
/// # Example
///
/// ```rust,no_run
/// use pag_api::{GrafanaApi, GrafanaClient, GrafanaConfig};
/// use reqwest_middleware::ClientBuilder;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let http = ClientBuilder::new(reqwest::Client::new()).build();
///     let grafana = GrafanaClient::connect(http, &GrafanaConfig::new("localhost:3000", "glsa_token")).await?;
///
///     let folder = grafana.find_or_create_folder(&CancellationToken::new(), "Team A").await?;
///     println!("folder uid: {}", folder.uid);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct GrafanaClient {
    transport: Transport,
}

impl GrafanaClient {
    /// Build the client and check it can list API keys
    ///
    /// Fails when Grafana is unreachable or rejects the credentials.
    #[instrument(name = "GrafanaClient::connect", skip_all, fields(endpoint = %config.endpoint))]
    pub async fn connect(client: ClientWithMiddleware, config: &GrafanaConfig) -> Result<Self> {
        let credentials = if !config.api_token.is_empty() {
            Credentials::Bearer(config.api_token.clone())
        } else {
            Credentials::Basic {
                username: config.username.clone(),
                password: config.password.clone(),
                org_id: Some(config.org_id),
            }
        };

        let transport = Transport::new(client, &config.endpoint, credentials)?;
        let grafana = Self { transport };

        grafana
            .transport
            .execute(ApiRequest::get("/api/auth/keys"), &CancellationToken::new())
            .await?
            .error_for_status()?;

        info!(endpoint = %grafana.transport.base_url(), "Connected to Grafana");
        Ok(grafana)
    }

    async fn folder_by_uid(&self, cancel: &CancellationToken, uid: &str) -> Result<Folder> {
        let request = ApiRequest::get("/api/folders/:uid").arg("uid", uid);
        self.transport.execute(request, cancel).await?.json()
    }
}

#[async_trait]
impl GrafanaApi for GrafanaClient {
    #[instrument(name = "GrafanaClient::add_api_key", skip_all, fields(name = %name))]
    async fn add_api_key(&self, cancel: &CancellationToken, name: &str, ttl_seconds: i64) -> Result<String> {
        let request = ApiRequest::post("/api/auth/keys").json(&AddApiKeyCommand {
            name,
            role: ApiKeyRole::Admin,
            seconds_to_live: ttl_seconds,
        })?;

        let result: NewApiKeyResult = self.transport.execute(request, cancel).await?.json()?;
        Ok(result.key)
    }

    #[instrument(name = "GrafanaClient::data_source_by_name", skip_all, fields(name = %name))]
    async fn data_source_by_name(&self, cancel: &CancellationToken, name: &str) -> Result<DataSource> {
        let request = ApiRequest::get("/api/datasources/name/:name").arg("name", name);
        self.transport.execute(request, cancel).await?.json()
    }

    #[instrument(name = "GrafanaClient::add_data_source", skip_all, fields(name = %ds.name))]
    async fn add_data_source(&self, cancel: &CancellationToken, ds: &DataSource) -> Result<DataSource> {
        let request = ApiRequest::post("/api/datasources").json(&AddDataSourceCommand::from(ds))?;

        let result: AddDataSourceResult = self.transport.execute(request, cancel).await?.json()?;
        debug!(uid = %result.datasource.uid, "Data source created");
        Ok(result.datasource)
    }

    #[instrument(name = "GrafanaClient::find_or_create_folder", skip_all, fields(title = %title))]
    async fn find_or_create_folder(&self, cancel: &CancellationToken, title: &str) -> Result<Folder> {
        let folders: Vec<FolderSearchHit> = self
            .transport
            .execute(ApiRequest::get("/api/folders"), cancel)
            .await?
            .json()?;

        if let Some(hit) = folders.iter().find(|f| f.title == title) {
            debug!(uid = %hit.uid, "Folder exists");
            return self.folder_by_uid(cancel, &hit.uid).await;
        }

        let request = ApiRequest::post("/api/folders").json(&CreateFolderCommand { title })?;
        let folder: Folder = self.transport.execute(request, cancel).await?.json()?;

        debug!(uid = %folder.uid, "Folder created");
        Ok(folder)
    }

    #[instrument(name = "GrafanaClient::delete_folder", skip_all, fields(uid = %uid))]
    async fn delete_folder(&self, cancel: &CancellationToken, uid: &str) -> Result<String> {
        let request = ApiRequest::delete("/api/folders/:uid").arg("uid", uid);
        let result: DeleteResult = self.transport.execute(request, cancel).await?.json()?;
        Ok(result.title)
    }

    #[instrument(name = "GrafanaClient::dashboard_by_uid", skip_all, fields(uid = %uid))]
    async fn dashboard_by_uid(&self, cancel: &CancellationToken, uid: &str) -> Result<DashboardFullWithMeta> {
        let request = ApiRequest::get("/api/dashboards/uid/:uid").arg("uid", uid);
        self.transport.execute(request, cancel).await?.json()
    }

    #[instrument(name = "GrafanaClient::upsert_dashboard", skip_all, fields(folder_uid = %folder_uid))]
    async fn upsert_dashboard(
        &self,
        cancel: &CancellationToken,
        folder_uid: &str,
        dashboard: &serde_json::Value,
    ) -> Result<SaveDashboardResult> {
        let request = ApiRequest::post("/api/dashboards/db").json(&SaveDashboardCommand {
            dashboard,
            folder_uid,
            overwrite: true,
        })?;

        let result: SaveDashboardResult = self.transport.execute(request, cancel).await?.json()?;
        debug!(uid = %result.uid, version = result.version, "Dashboard saved");
        Ok(result)
    }

    #[instrument(name = "GrafanaClient::delete_dashboard", skip_all, fields(uid = %uid))]
    async fn delete_dashboard(&self, cancel: &CancellationToken, uid: &str) -> Result<String> {
        let request = ApiRequest::delete("/api/dashboards/uid/:uid").arg("uid", uid);
        let result: DeleteResult = self.transport.execute(request, cancel).await?.json()?;
        Ok(result.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PagError;
    use reqwest::Client;
    use reqwest_middleware::ClientBuilder;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> ClientWithMiddleware {
        ClientBuilder::new(Client::new()).build()
    }

    async fn mount_key_listing(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/auth/keys"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(mock_server)
            .await;
    }

    async fn connected(mock_server: &MockServer) -> GrafanaClient {
        mount_key_listing(mock_server).await;
        GrafanaClient::connect(http(), &GrafanaConfig::new(mock_server.uri(), "token"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_unreachable_fails() {
        let result = GrafanaClient::connect(http(), &GrafanaConfig::new("127.0.0.1:1", "token")).await;
        assert!(matches!(result, Err(PagError::Request(_))));
    }

    #[tokio::test]
    async fn test_connect_rejected_credentials_fail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/auth/keys"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"message":"Invalid API key"}"#))
            .mount(&mock_server)
            .await;

        let result = GrafanaClient::connect(http(), &GrafanaConfig::new(mock_server.uri(), "bad")).await;
        assert!(matches!(result, Err(PagError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_connect_basic_auth_without_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/auth/keys"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .and(header("x-grafana-org-id", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = GrafanaConfig::new(mock_server.uri(), "").with_basic_auth("admin", "secret");
        GrafanaClient::connect(http(), &config).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_api_key() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/api/auth/keys"))
            .and(body_json(json!({"name": "ci", "role": "Admin", "secondsToLive": 60})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "ci", "key": "eyJrIjoi"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let key = grafana.add_api_key(&CancellationToken::new(), "ci", 60).await.unwrap();
        assert_eq!(key, "eyJrIjoi");
    }

    #[tokio::test]
    async fn test_data_sources() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/api/datasources/name/Prometheus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1, "uid": "prom", "orgId": 1, "name": "Prometheus", "type": "prometheus",
                "access": "proxy", "url": "http://prometheus:9090", "isDefault": true
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/datasources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasource": {"id": 2, "uid": "loki", "name": "Loki", "type": "loki", "url": "http://loki:3100"},
                "id": 2, "message": "Datasource added", "name": "Loki"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();
        let ds = grafana.data_source_by_name(&cancel, "Prometheus").await.unwrap();
        assert_eq!(ds.uid, "prom");
        assert!(ds.is_default);

        let created = grafana
            .add_data_source(&cancel, &DataSource::new("Loki", "loki", "http://loki:3100"))
            .await
            .unwrap();
        assert_eq!(created.id, Some(2));
        assert_eq!(created.kind, "loki");
    }

    #[tokio::test]
    async fn test_data_source_not_found() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/api/datasources/name/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"Data source not found"}"#))
            .mount(&mock_server)
            .await;

        let err = grafana
            .data_source_by_name(&CancellationToken::new(), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, PagError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_find_or_create_folder_creates_when_absent() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/api/folders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "uid": "other", "title": "测试FOLDER"}
            ])))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/folders"))
            .and(body_json(json!({"title": "测试folder"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7, "uid": "new-uid", "title": "测试folder", "url": "/dashboards/f/new-uid/", "version": 1
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let folder = grafana
            .find_or_create_folder(&CancellationToken::new(), "测试folder")
            .await
            .unwrap();
        assert_eq!(folder.uid, "new-uid");
        assert_eq!(folder.title, "测试folder");
    }

    #[tokio::test]
    async fn test_find_or_create_folder_is_idempotent() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        // The listing reflects the folder created by the first call
        Mock::given(method("GET"))
            .and(path("/api/folders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/folders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 7, "uid": "ops", "title": "Ops"}
            ])))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/folders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "uid": "ops", "title": "Ops"})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/folders/ops"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "uid": "ops", "title": "Ops"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();
        let first = grafana.find_or_create_folder(&cancel, "Ops").await.unwrap();
        let second = grafana.find_or_create_folder(&cancel, "Ops").await.unwrap();
        assert_eq!(first.uid, second.uid);
    }

    #[tokio::test]
    async fn test_find_or_create_folder_duplicate_titles_take_first() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/api/folders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 3, "uid": "ops-a", "title": "Ops"},
                {"id": 4, "uid": "ops-b", "title": "Ops"}
            ])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/folders/ops-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "uid": "ops-a", "title": "Ops"})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/folders/ops-b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 4, "uid": "ops-b", "title": "Ops"})))
            .expect(0)
            .mount(&mock_server)
            .await;

        let folder = grafana
            .find_or_create_folder(&CancellationToken::new(), "Ops")
            .await
            .unwrap();
        assert_eq!(folder.uid, "ops-a");
    }

    #[tokio::test]
    async fn test_delete_folder_returns_title() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        Mock::given(method("DELETE"))
            .and(path("/api/folders/ops"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7, "message": "Folder Ops deleted", "title": "Ops"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let title = grafana.delete_folder(&CancellationToken::new(), "ops").await.unwrap();
        assert_eq!(title, "Ops");
    }

    #[tokio::test]
    async fn test_dashboards() {
        let mock_server = MockServer::start().await;
        let grafana = connected(&mock_server).await;

        Mock::given(method("GET"))
            .and(path("/api/dashboards/uid/node"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dashboard": {"uid": "node", "title": "Node", "panels": []},
                "meta": {"slug": "node", "folderUid": "ops", "version": 3}
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dashboards/db"))
            .and(body_json(json!({
                "dashboard": {"uid": "node", "title": "Node"},
                "folderUid": "ops",
                "overwrite": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 12, "uid": "node", "url": "/d/node/node", "status": "success", "version": 4, "slug": "node"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/dashboards/uid/node"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Node", "message": "Dashboard Node deleted", "id": 12
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();

        let full = grafana.dashboard_by_uid(&cancel, "node").await.unwrap();
        assert_eq!(full.dashboard["title"], "Node");
        assert_eq!(full.meta.folder_uid, "ops");

        let saved = grafana
            .upsert_dashboard(&cancel, "ops", &json!({"uid": "node", "title": "Node"}))
            .await
            .unwrap();
        assert_eq!(saved.version, 4);

        let title = grafana.delete_dashboard(&cancel, "node").await.unwrap();
        assert_eq!(title, "Node");
    }
}
