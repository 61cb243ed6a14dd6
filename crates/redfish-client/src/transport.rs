//! HTTP transport for Redfish requests
//!
//! [`Transport`] is the seam between the workflow code and the wire. The
//! provided [`HttpTransport`] uses `reqwest`; other BMC dialects or test
//! doubles can implement the trait instead.

use std::borrow::Cow;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::auth::{Session, AUTH_TOKEN_HEADER};
use crate::config::ClientConfig;
use crate::error::{snippet, RedfishError, Result, TransportError};

/// Request body variants used by Redfish operations
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// Single-file `multipart/form-data` upload
    Multipart {
        field: String,
        filename: String,
        data: Bytes,
    },
}

/// A request against a server-relative path (or an absolute URL)
#[derive(Debug, Clone)]
pub struct RedfishRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RedfishRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Attach a single file as `multipart/form-data`
    pub fn multipart(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.body = RequestBody::Multipart {
            field: field.into(),
            filename: filename.into(),
            data: data.into(),
        };
        self
    }

    /// Add an extra header for this request only
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful (2xx) response with its body fully read
#[derive(Debug, Clone)]
pub struct RedfishResponse {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RedfishResponse {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| RedfishError::Parse {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }

    /// Body as a JSON value; `None` when empty or not JSON
    pub fn json_value(&self) -> Option<serde_json::Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Capability set for issuing Redfish calls.
///
/// Implementations attach the session token when one is given and map
/// failures onto [`TransportError`]. Non-2xx answers are errors. No retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL every relative path is joined onto
    fn base_url(&self) -> &Url;

    /// Execute a request
    async fn request(
        &self,
        request: RedfishRequest,
        session: Option<&Session>,
    ) -> Result<RedfishResponse>;

    async fn get(&self, path: &str, session: Option<&Session>) -> Result<RedfishResponse> {
        self.request(RedfishRequest::get(path), session).await
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
        session: Option<&Session>,
    ) -> Result<RedfishResponse> {
        self.request(RedfishRequest::post(path).json(body), session)
            .await
    }

    async fn patch(
        &self,
        path: &str,
        body: serde_json::Value,
        session: Option<&Session>,
    ) -> Result<RedfishResponse> {
        self.request(RedfishRequest::patch(path).json(body), session)
            .await
    }

    async fn delete(&self, path: &str, session: Option<&Session>) -> Result<RedfishResponse> {
        self.request(RedfishRequest::delete(path), session).await
    }
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(!config.connection.verify_ssl)
            .default_headers(headers)
            .build()
            .map_err(|e| RedfishError::configuration(format!("HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url())?;

        Ok(Self { client, base_url })
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Into::into)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn request(
        &self,
        request: RedfishRequest,
        session: Option<&Session>,
    ) -> Result<RedfishResponse> {
        let url = self.build_url(&request.path)?;
        let method = request.method.clone();
        debug!(
            "HTTP request: {} {} | headers={:?} | authenticated={}",
            method,
            url,
            request.headers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            session.is_some_and(Session::is_valid)
        );

        let mut builder = self.client.request(method.clone(), url.clone());
        if let Some(session) = session.filter(|s| s.is_valid()) {
            builder = builder.header(AUTH_TOKEN_HEADER, session.token());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart {
                field,
                filename,
                data,
            } => {
                let len = data.len() as u64;
                let part = reqwest::multipart::Part::stream_with_length(data, len)
                    .file_name(filename)
                    .mime_str("application/octet-stream")
                    .map_err(|e| RedfishError::upload(format!("Invalid multipart part: {}", e)))?;
                builder.multipart(reqwest::multipart::Form::new().part(field, part))
            }
        };

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&method, &url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&method, &url, e))?;

        debug!(
            "HTTP response: {} {} | status={} | elapsed={}ms | length={}B",
            method,
            url,
            status.as_u16(),
            started.elapsed().as_millis(),
            body.len()
        );
        debug!(
            "HTTP response preview: {} {} | {}",
            method,
            url,
            snippet(&String::from_utf8_lossy(&body))
        );

        if !status.is_success() {
            return Err(TransportError::http_status(
                method.as_str(),
                url.as_str(),
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            )
            .into());
        }

        Ok(RedfishResponse {
            url: url.to_string(),
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

fn map_reqwest_error(method: &Method, url: &Url, e: reqwest::Error) -> RedfishError {
    error!("HTTP request error: {} {} | {}", method, url, e);
    let err = if e.is_timeout() {
        TransportError::Timeout {
            method: method.to_string(),
            url: url.to_string(),
        }
    } else {
        TransportError::ConnectionFailed {
            method: method.to_string(),
            url: url.to_string(),
            reason: e.to_string(),
        }
    };
    err.into()
}
