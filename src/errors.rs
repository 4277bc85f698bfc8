use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, PagError>;

/// Errors that can occur when configuring or calling Prometheus, Alertmanager or Grafana
#[derive(Debug, Error)]
pub enum PagError {
    /// A required configuration field is empty
    #[error("{section} config: {field} is required")]
    MissingField {
        /// Config section (`prometheus`, `alertManager`, `grafana`)
        section: &'static str,
        /// Name of the missing field
        field: &'static str,
    },

    /// A configured file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    ConfigFileNotFound(PathBuf),

    /// Failed to read a local file
    #[error("Failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local YAML file does not match the expected schema
    #[error("Failed to parse {}: {source}", path.display())]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to write a sidecar file
    #[error("Failed to write {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Endpoint could not be turned into a URL
    #[error("Invalid endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    /// Malformed Prometheus-style duration
    #[error("Invalid duration {0:?}")]
    InvalidDuration(String),

    /// Sidecar name is empty or contains a path separator
    #[error("Invalid name {0:?}: must be non-empty and contain no path separators")]
    InvalidName(String),

    /// Failed to build HTTP client
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest_middleware::Error),

    /// Reading the response body failed
    #[error("Failed to read response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    /// The body drain task panicked or was aborted
    #[error("Response body task failed: {0}")]
    BodyTask(#[source] tokio::task::JoinError),

    /// The caller cancelled the request before it completed
    #[error("Request cancelled")]
    Cancelled,

    /// Failed to serialize a request body
    #[error("Failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Failed to serialize a sidecar file
    #[error("Failed to serialize YAML: {0}")]
    SerializeYaml(#[source] serde_yaml::Error),

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Remote API returned a non-success status code
    #[error("API error: HTTP {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Prometheus answered with an `error` envelope
    #[error("Prometheus error ({error_type}): {message}")]
    Prometheus {
        /// `errorType` from the envelope, e.g. `bad_data`
        error_type: String,
        message: String,
    },

    /// Prometheus config has no scrape config with `file_sd_configs`
    #[error("no file_sd_configs configured")]
    NoFileServiceDiscovery,

    /// Prometheus config has no `rule_files`
    #[error("no rule_files configured")]
    NoRuleFiles,
}

impl PagError {
    /// Check if the error is retryable
    ///
    /// Returns `true` for:
    /// - Network/connection errors
    /// - Timeout errors
    /// - Server errors (5xx status codes)
    ///
    /// The clients never retry on their own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(source) => {
                if let Some(reqwest_err) = StdError::source(source) {
                    if let Some(err) = reqwest_err.downcast_ref::<reqwest::Error>() {
                        return err.is_connect() || err.is_timeout();
                    }
                }
                if let reqwest_middleware::Error::Reqwest(err) = source {
                    return err.is_connect() || err.is_timeout();
                }
                false
            }
            Self::ReadBody(err) => err.is_timeout(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the call ended because the caller's token was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
