use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use super::list_source::{decode_list_response, ListSource, ListSourceError};
use crate::model::Desk;
use crate::{DESKS_LIST_PATH, FETCH_TIMEOUT, MAX_TIMEOUT};

const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: String,
    host: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        let parsed = Self::validate(&url)?;
        let host = parsed
            .host_str()
            .map(str::to_lowercase)
            .unwrap_or_default();

        Ok(Self {
            url: parsed.to_string(),
            host,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolves `path` against this URL, replacing any existing path.
    pub fn join(&self, path: &str) -> Result<Self, HttpError> {
        let base = Url::parse(&self.url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(&self.url),
            reason: e.to_string(),
        })?;
        let joined = base.join(path).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(path),
            reason: e.to_string(),
        })?;
        Self::new(joined.to_string())
    }

    fn validate(url: &str) -> Result<Url, HttpError> {
        if url.trim().is_empty() {
            return Err(HttpError::InvalidUrl {
                url: String::new(),
                reason: "URL cannot be empty".to_string(),
            });
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(url),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme().to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        if parsed.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "URL must have a host".to_string(),
            });
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        Ok(parsed)
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            url.to_string()
        } else {
            let cut = (0..=100).rev().find(|i| url.is_char_boundary(*i)).unwrap_or(0);
            format!("{}...", &url[..cut])
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("connection failed to {host}: {message}")]
    ConnectionError { host: String, message: String },

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("request cancelled")]
    Cancelled,
}

impl HttpError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ConnectionError { .. })
    }
}

impl From<HttpError> for ListSourceError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            HttpError::ConnectionError { .. } => Self::Network(e.to_string()),
            HttpError::InvalidUrl { .. } | HttpError::InvalidRequest { .. } | HttpError::Cancelled => {
                Self::Other(e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpRequest {
    url: ValidatedUrl,
    headers: Vec<(String, String)>,
    timeout_ms: u64,
    request_id: String,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: ValidatedUrl, timeout: Duration) -> Self {
        Self {
            url,
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &ValidatedUrl {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Performs HTTP on behalf of the core. The platform shell owns the actual client.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpListSourceConfig {
    pub base_url: String,
    pub path: String,
    pub timeout_ms: u64,
}

impl Default for HttpListSourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            path: DESKS_LIST_PATH.to_string(),
            timeout_ms: u64::try_from(FETCH_TIMEOUT.as_millis()).unwrap_or(30_000),
        }
    }
}

impl HttpListSourceConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<ValidatedUrl, HttpError> {
        if self.timeout_ms == 0 {
            return Err(HttpError::InvalidRequest {
                reason: "timeout cannot be zero".to_string(),
            });
        }
        if Duration::from_millis(self.timeout_ms) > MAX_TIMEOUT {
            return Err(HttpError::InvalidRequest {
                reason: format!("timeout exceeds maximum of {}ms", MAX_TIMEOUT.as_millis()),
            });
        }
        ValidatedUrl::new(self.base_url.as_str())?.join(&self.path)
    }
}

/// `ListSource` backed by a GET against the desks endpoint.
pub struct HttpListSource<T: HttpTransport> {
    transport: T,
    endpoint: ValidatedUrl,
    timeout: Duration,
}

impl<T: HttpTransport> HttpListSource<T> {
    pub fn new(transport: T, config: &HttpListSourceConfig) -> Result<Self, HttpError> {
        let endpoint = config.validate()?;
        Ok(Self {
            transport,
            endpoint,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }
}

#[async_trait::async_trait]
impl<T: HttpTransport> ListSource for HttpListSource<T> {
    #[instrument(skip(self), fields(host = %self.endpoint.host()))]
    async fn fetch(&self) -> Result<Vec<Desk>, ListSourceError> {
        let request = HttpRequest::get(self.endpoint.clone(), self.timeout);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            warn!(status = response.status(), "Desk list request failed");
            let body = String::from_utf8(response.body().to_vec()).ok();
            return Err(ListSourceError::Status {
                status: response.status(),
                body,
            });
        }

        let desks = decode_list_response(response.body())?;
        debug!(count = desks.len(), "Desk list decoded");
        Ok(desks)
    }
}
