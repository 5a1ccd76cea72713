//! HTTP transport for the catalog API.
//!
//! Every request carries `Authorization: Bearer <token>` when a session token
//! is set; non-2xx responses surface as [`ClientError::Http`].

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::cache::{ErrorInfo, ErrorKind};
use crate::config::ApiSettings;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("http error: status {status} body {body}")]
    Http { status: u16, body: String },
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Turn a 404 into `NotFound { resource }`; other errors pass through.
    #[must_use]
    pub fn into_not_found(self, resource: impl Into<String>) -> Self {
        if self.is_not_found() {
            Self::NotFound {
                resource: resource.into(),
            }
        } else {
            self
        }
    }
}

impl From<&ClientError> for ErrorInfo {
    fn from(err: &ClientError) -> Self {
        let kind = match err {
            ClientError::Network(_) | ClientError::Url(_) | ClientError::InvalidHeader(_) => {
                ErrorKind::Network
            }
            ClientError::Http { .. } => ErrorKind::Http,
            ClientError::NotFound { .. } => ErrorKind::NotFound,
            ClientError::Decode(_) => ErrorKind::Decode,
        };
        let info = ErrorInfo::new(kind, err.to_string());
        match err.status() {
            Some(status) => info.with_status(status),
            None => info,
        }
    }
}

/// Decode a JSON body into a typed value.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Request/response channel to the catalog API.
///
/// `path` is relative to the API base and may carry a query string.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError>;

    /// Replace the bearer token attached to subsequent requests.
    fn set_token(&self, token: Option<String>);

    fn has_token(&self) -> bool;
}

#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base: Url,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base,
            token: RwLock::new(None),
        })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self, ClientError> {
        Self::new(settings.base_url.as_str(), settings.timeout)
    }

    pub fn user_agent() -> &'static str {
        concat!("catalog-sync/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(ClientError::Url)
    }

    fn auth_header(&self) -> Result<Option<HeaderValue>, ClientError> {
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        token
            .map(|token| {
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| ClientError::InvalidHeader(e.to_string()))
            })
            .transpose()
    }

    async fn handle(resp: Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Decode(format!("failed to parse body: {e}")))
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let url = self.url(path)?;
        let mut req = self.client.request(method.clone(), url);
        if let Some(header) = self.auth_header()? {
            req = req.header(AUTHORIZATION, header);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        let started = Instant::now();
        let resp = req.send().await?;
        debug!(
            %method,
            path,
            status = resp.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "Catalog API responded"
        );
        Self::handle(resp).await
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
