//! Request and response bodies of the Grafana HTTP API.

use serde::{Deserialize, Serialize};

/// Role granted to a new API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiKeyRole {
    Viewer,
    Editor,
    Admin,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddApiKeyCommand<'a> {
    pub name: &'a str,
    pub role: ApiKeyRole,
    pub seconds_to_live: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NewApiKeyResult {
    pub key: String,
}

/// Data source as stored by Grafana
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default)]
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,

    pub name: String,

    /// Plugin id, e.g. `prometheus`
    #[serde(rename = "type")]
    pub kind: String,

    /// `proxy` or `direct`
    #[serde(default)]
    pub access: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub basic_auth: bool,

    #[serde(default)]
    pub basic_auth_user: String,

    #[serde(default)]
    pub with_credentials: bool,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_data: Option<serde_json::Value>,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl DataSource {
    pub fn new(name: &str, kind: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            url: url.to_string(),
            access: "proxy".to_string(),
            ..Self::default()
        }
    }
}

/// Subset of [`DataSource`] accepted when creating one
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddDataSourceCommand<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub access: &'a str,
    pub url: &'a str,
    pub user: &'a str,
    pub database: &'a str,
    pub basic_auth: bool,
    pub basic_auth_user: &'a str,
    pub with_credentials: bool,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_data: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub uid: &'a str,
}

impl<'a> From<&'a DataSource> for AddDataSourceCommand<'a> {
    fn from(ds: &'a DataSource) -> Self {
        Self {
            name: &ds.name,
            kind: &ds.kind,
            access: &ds.access,
            url: &ds.url,
            user: &ds.user,
            database: &ds.database,
            basic_auth: ds.basic_auth,
            basic_auth_user: &ds.basic_auth_user,
            with_credentials: ds.with_credentials,
            is_default: ds.is_default,
            json_data: ds.json_data.as_ref(),
            uid: &ds.uid,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AddDataSourceResult {
    pub datasource: DataSource,
}

/// Entry of the folder listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct FolderSearchHit {
    pub uid: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(default)]
    pub id: i64,

    pub uid: String,

    pub title: String,

    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uid: Option<String>,

    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateFolderCommand<'a> {
    pub title: &'a str,
}

/// Body of DELETE responses for folders and dashboards
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeleteResult {
    #[serde(default)]
    pub title: String,
}

/// `GET /api/dashboards/uid/:uid`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardFullWithMeta {
    /// Dashboard JSON model
    pub dashboard: serde_json::Value,

    #[serde(default)]
    pub meta: DashboardMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMeta {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub folder_uid: String,
    #[serde(default)]
    pub folder_title: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub provisioned: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveDashboardCommand<'a> {
    pub dashboard: &'a serde_json::Value,
    pub folder_uid: &'a str,
    pub overwrite: bool,
}

/// Result of saving a dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDashboardResult {
    #[serde(default)]
    pub id: i64,
    pub uid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub slug: String,
}
