//! HTTP access to the catalog and raster services.
//!
//! Everything that talks to the network goes through [`Transport`] so that
//! retry policy can wrap it as a decorator and tests can swap in fixtures.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
}

impl TransportError {
    /// Only upstream server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Status { status, .. } if *status >= 500)
    }

    pub fn is_transient(&self) -> bool {
        self.is_retryable() || matches!(self, TransportError::Network { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError>;
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        (**self).get_json(url).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        (**self).post_json(url, body).await
    }
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { client })
    }

    async fn decode(url: &str, response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Self::decode(url, response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        debug!(url = %url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Self::decode(url, response).await
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles each retry)
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// Retries the wrapped transport with exponential backoff on 5xx responses.
/// Client errors, network failures and undecodable bodies are returned as is.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn with_retry<F, Fut>(&self, url: &str, call: F) -> Result<Value, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, TransportError>>,
    {
        let mut attempt = 1;
        let mut delay = self.policy.initial_delay;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(
                        url = %url,
                        error = %e,
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.policy.max_delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        self.with_retry(url, || self.inner.get_json(url)).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.with_retry(url, || self.inner.post_json(url, body)).await
    }
}
