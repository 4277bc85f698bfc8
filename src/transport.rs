//! Request/response plumbing shared by the Prometheus, Alertmanager and
//! Grafana clients.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::errors::{PagError, Result};

const DEFAULT_SCHEME: &str = "http://";

/// Turn `host:port` into `http://host:port` and parse it
///
/// Endpoints that already carry a scheme are parsed as-is.
pub fn normalize_endpoint(endpoint: &str) -> Result<Url> {
    let address = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{endpoint}")
    };

    Url::parse(&address).map_err(|source| PagError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Credentials attached to every request
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: String,
        /// Sent as `X-Grafana-Org-Id`
        org_id: Option<u64>,
    },
}

#[derive(Debug, Clone)]
enum RequestBody {
    Empty,
    Json(Vec<u8>),
    Form(String),
}

/// A single call against a backend, addressed by a path template
///
/// Named placeholders (`:uid`) in the template are replaced by [`arg`](Self::arg)
/// values; each replacement is percent-encoded as one path segment.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    template: String,
    args: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, template: &str) -> Self {
        Self {
            method,
            template: template.to_string(),
            args: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(template: &str) -> Self {
        Self::new(Method::GET, template)
    }

    pub fn post(template: &str) -> Self {
        Self::new(Method::POST, template)
    }

    pub fn delete(template: &str) -> Self {
        Self::new(Method::DELETE, template)
    }

    /// Substitute `:name` in the path template
    pub fn arg(mut self, name: &str, value: impl Into<String>) -> Self {
        self.args.push((name.to_string(), value.into()));
        self
    }

    /// Append a query string pair
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Send `body` as JSON
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let data = serde_json::to_vec(body).map_err(PagError::Serialize)?;
        self.body = RequestBody::Json(data);
        Ok(self)
    }

    /// Send the pairs as an `application/x-www-form-urlencoded` body
    pub fn form<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, String)>) -> Self {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, &value);
        }
        self.body = RequestBody::Form(serializer.finish());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// A fully buffered response
///
/// Status codes are not interpreted here; typed callers decide what a
/// non-success status means for them.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx response into [`PagError::Api`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PagError::Api {
                status: self.status.as_u16(),
                message: self.text(),
            })
        }
    }

    /// Check the status, then decode the body as JSON
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        let response = self.error_for_status()?;
        serde_json::from_slice(&response.body).map_err(PagError::Decode)
    }
}

/// Base URL, HTTP client and credentials for one backend
#[derive(Clone)]
pub struct Transport {
    client: ClientWithMiddleware,
    base_url: Url,
    credentials: Credentials,
}

impl Transport {
    pub fn new(client: ClientWithMiddleware, endpoint: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_endpoint(endpoint)?,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Expand a path template against the base URL
    ///
    /// The template is appended to any path prefix the base URL already has.
    /// Placeholders without a matching argument are left untouched.
    pub fn url(&self, template: &str, args: &[(String, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for segment in template.split('/').filter(|s| !s.is_empty()) {
                let value = segment
                    .strip_prefix(':')
                    .and_then(|name| args.iter().find(|(arg, _)| arg == name))
                    .map(|(_, value)| value.as_str())
                    .unwrap_or(segment);
                segments.push(value);
            }
        }
        url
    }

    /// Issue `request` and buffer the whole response body
    ///
    /// Both the send and the body read race `cancel`. A token that is
    /// already cancelled fails before any I/O.
    #[instrument(
        name = "Transport::execute",
        skip_all,
        fields(method = %request.method, path = %request.template)
    )]
    pub async fn execute(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<RawResponse> {
        if cancel.is_cancelled() {
            return Err(PagError::Cancelled);
        }

        let mut url = self.url(&request.template, &request.args);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        debug!(url = %url, "Sending request");

        let mut builder = self.client.request(request.method, url);
        builder = match &self.credentials {
            Credentials::None => builder,
            Credentials::Bearer(token) => builder.bearer_auth(token),
            Credentials::Basic {
                username,
                password,
                org_id,
            } => {
                let builder = builder.basic_auth(username, Some(password));
                match org_id {
                    Some(org_id) => builder.header("X-Grafana-Org-Id", org_id.to_string()),
                    None => builder,
                }
            }
        };
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(data) => builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(data),
            RequestBody::Form(data) => builder
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
                .body(data),
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PagError::Cancelled),
            sent = builder.send() => sent.map_err(PagError::Request)?,
        };

        let status = response.status();
        let body = read_body(response, cancel).await?;

        debug!(status = status.as_u16(), bytes = body.len(), "Received response");
        Ok(RawResponse { status, body })
    }
}

/// Drain `response` on a background task while watching `cancel`
///
/// On cancellation the drain task is told to drop the stream, and is still
/// awaited before returning so the connection is released. `Cancelled` wins
/// over whatever error the aborted read produced.
async fn read_body(response: reqwest::Response, cancel: &CancellationToken) -> Result<Vec<u8>> {
    let close = cancel.child_token();

    let mut drain = tokio::spawn({
        let close = close.clone();
        async move {
            let mut response = response;
            let mut body = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = close.cancelled() => return Err(PagError::Cancelled),
                    chunk = response.chunk() => match chunk {
                        Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                        Ok(None) => return Ok(body),
                        Err(err) => return Err(PagError::ReadBody(err)),
                    },
                }
            }
        }
    });

    tokio::select! {
        biased;
        joined = &mut drain => joined.map_err(PagError::BodyTask)?,
        _ = cancel.cancelled() => {
            close.cancel();
            if let Err(err) = drain.await {
                debug!(error = %err, "Body drain task failed after cancellation");
            }
            Err(PagError::Cancelled)
        }
    }
}
