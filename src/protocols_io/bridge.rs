//! Resource bridge: the single path from a tool call to the protocols.io API.
//!
//! Every outbound call goes through [`ResourceBridge::access`], which
//!
//! - joins the configured base URL with the request path, one
//!   percent-encoded segment at a time,
//! - attaches the `Authorization: Bearer` header,
//! - sends the body as JSON for non-GET requests,
//! - bounds the whole exchange by the configured timeout,
//! - decodes the response as JSON.
//!
//! Any failure along the way (transport, timeout, non-2xx status, malformed
//! body) comes back as an error record instead of an `Err`:
//!
//! ```json
//! { "error": true, "message": "request timed out after 30 seconds", "url": "https://…" }
//! ```
//!
//! Calls are one-shot. Idle connections are not kept between calls, so
//! concurrent tool invocations share nothing but the immutable client
//! configuration.

use std::fmt;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Url};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::BridgeError;

/// Longest response excerpt folded into a status error message.
const MAX_DETAIL_CHARS: usize = 512;

/// A path below the API base URL, kept as separate segments.
///
/// Fixed text is split on `/`. Values added with [`Self::segment`] always stay
/// a single segment: `/`, `?`, `#` and `%` in them are percent-encoded when the
/// URL is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// Creates a path from fixed text such as `/v3/session/profile`.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self::default().join(path)
    }

    /// Appends the `/`-separated segments of fixed text.
    #[must_use]
    pub fn join(mut self, path: &str) -> Self {
        self.segments.extend(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        self
    }

    /// Appends one value as exactly one segment.
    #[must_use]
    pub fn segment(mut self, value: impl ToString) -> Self {
        self.segments.push(value.to_string());
        self
    }

    /// Returns the segments, unencoded.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for ResourcePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ResourcePath {
    fn from(path: String) -> Self {
        Self::new(&path)
    }
}

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    /// HTTP method.
    pub method: Method,
    /// Path appended to the base URL.
    pub path: ResourcePath,
    /// Query pairs, percent-encoded when the URL is built.
    pub query: Vec<(&'static str, String)>,
    /// JSON body, ignored for GET.
    pub body: Option<Value>,
}

impl ResourceRequest {
    /// Creates a request without query or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<ResourcePath>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<ResourcePath>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a POST request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<ResourcePath>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    /// Creates a PUT request with a JSON body.
    #[must_use]
    pub fn put(path: impl Into<ResourcePath>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    /// Creates a DELETE request with a JSON body.
    #[must_use]
    pub fn delete(path: impl Into<ResourcePath>, body: Value) -> Self {
        Self::new(Method::DELETE, path).with_body(body)
    }

    /// Appends a query pair.
    #[must_use]
    pub fn with_query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// The uniform failure value returned in place of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Human-readable description, never containing the access token.
    pub message: String,
    /// The URL that was attempted.
    pub url: String,
}

impl ErrorRecord {
    /// Creates a record for a failed call to `url`.
    #[must_use]
    pub fn new(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Converts the record into its JSON form.
    #[must_use]
    pub fn into_value(self) -> Value {
        json!({
            "error": true,
            "message": self.message,
            "url": self.url,
        })
    }

    /// Returns `true` if `value` has the shape produced by [`Self::into_value`].
    #[must_use]
    pub fn is_error_record(value: &Value) -> bool {
        value.get("error").and_then(Value::as_bool) == Some(true)
            && value.get("message").is_some_and(Value::is_string)
            && value.get("url").is_some_and(Value::is_string)
    }
}

/// Authenticated, error-normalising HTTP access to the API.
pub struct ResourceBridge {
    client: Client,
    base_url: String,
    access_token: String,
    timeout_secs: u64,
}

impl ResourceBridge {
    /// Creates a bridge for the given API settings.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Client`] if the HTTP client cannot be built
    /// (for example when the TLS backend fails to initialise).
    pub fn new(config: &ApiConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(0)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BridgeError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the absolute URL for a request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidUrl`] if the base URL does not parse or
    /// a segment is empty, `.` or `..`.
    pub fn url_for(&self, request: &ResourceRequest) -> Result<Url, BridgeError> {
        let raw = self.raw_url(request);
        if let Some(bad) = request
            .path
            .segments()
            .iter()
            .find(|s| matches!(s.as_str(), "" | "." | ".."))
        {
            return Err(BridgeError::InvalidUrl(format!(
                "{raw}: path segment {bad:?} is not allowed"
            )));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| BridgeError::InvalidUrl(format!("{raw}: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| BridgeError::InvalidUrl(format!("{raw}: base URL cannot hold a path")))?
            .pop_if_empty()
            .extend(request.path.segments());

        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        Ok(url)
    }

    /// Performs the request and returns the decoded body or an error record.
    ///
    /// Never fails: see the module documentation for the error record shape.
    pub async fn access(&self, request: ResourceRequest) -> Value {
        let url = match self.url_for(&request) {
            Ok(url) => url,
            Err(e) => {
                warn!(method = %request.method, error = %e, "Rejected protocols.io request");
                return ErrorRecord::new(e.to_string(), self.raw_url(&request)).into_value();
            }
        };

        match self.send(&request, url.clone()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    method = %request.method,
                    url = %url,
                    error = %e,
                    "protocols.io request failed"
                );
                ErrorRecord::new(e.to_string(), url.as_str()).into_value()
            }
        }
    }

    async fn send(&self, request: &ResourceRequest, url: Url) -> Result<Value, BridgeError> {
        debug!(method = %request.method, url = %url, "Sending protocols.io request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/json");

        if request.method != Method::GET {
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        debug!(status = status.as_u16(), bytes = text.len(), "Received protocols.io response");

        if !status.is_success() {
            return Err(BridgeError::Status {
                status,
                detail: detail_excerpt(&text),
            });
        }

        serde_json::from_str(&text).map_err(BridgeError::Decode)
    }

    fn raw_url(&self, request: &ResourceRequest) -> String {
        format!("{}{}", self.base_url, request.path)
    }

    fn classify(&self, error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Timeout(self.timeout_secs)
        } else {
            BridgeError::Transport(error)
        }
    }
}

/// Formats a response body as a `": …"` suffix for status errors.
fn detail_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut excerpt: String = trimmed.chars().take(MAX_DETAIL_CHARS).collect();
    if excerpt.len() < trimmed.len() {
        excerpt.push('…');
    }
    format!(": {excerpt}")
}
