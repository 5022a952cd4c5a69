use crate::config::ClientConfig;
use crate::error::ConfigError;
use crate::error::GatewayError;
use crate::request::MetricsRequest;
use async_trait::async_trait;
use hyper::ext::ReasonPhrase;
use nftel_protocol::MetricsPayload;
use reqwest::header::ACCEPT;
use reqwest::header::HeaderValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use tracing::warn;
use url::Url;

/// Anything that can answer a [`MetricsRequest`].
///
/// Implementations must hold no per-call state: the cache calls `fetch`
/// from many tasks at once.
#[async_trait]
pub trait MetricsSource: Send + Sync + 'static {
    async fn fetch(&self, request: &MetricsRequest) -> Result<MetricsPayload, GatewayError>;
}

#[async_trait]
impl<T> MetricsSource for Arc<T>
where
    T: MetricsSource + ?Sized,
{
    async fn fetch(&self, request: &MetricsRequest) -> Result<MetricsPayload, GatewayError> {
        (**self).fetch(request).await
    }
}

/// HTTP client for the aggregation service.
#[derive(Clone, Debug)]
pub struct MetricsGateway {
    http: reqwest::Client,
    base_url: Url,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl MetricsGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| ConfigError::Invalid(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.base_url()?,
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn attempt(&self, request: &MetricsRequest) -> Result<MetricsPayload, GatewayError> {
        let url = request.url(&self.base_url);
        let resp = self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            // hyper only records the phrase when it differs from the canonical one.
            let status_text = resp
                .extensions()
                .get::<ReasonPhrase>()
                .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
                .or(status.canonical_reason())
                .unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                status_text: status_text.to_string(),
            });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        MetricsPayload::decode(request.endpoint(), &body)
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

#[async_trait]
impl MetricsSource for MetricsGateway {
    async fn fetch(&self, request: &MetricsRequest) -> Result<MetricsPayload, GatewayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(
                endpoint = %request.endpoint(),
                request = %request.path_and_query(),
                attempt,
                "fetching metrics"
            );
            match self.attempt(request).await {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_retryable() && attempt <= self.retry_attempts => {
                    warn!(
                        endpoint = %request.endpoint(),
                        attempt,
                        "metrics request failed, retrying: {err}"
                    );
                    if !self.retry_delay.is_zero() {
                        sleep(self.retry_delay).await;
                    }
                }
                Err(err) => {
                    warn!(
                        endpoint = %request.endpoint(),
                        attempt,
                        "metrics request failed: {err}"
                    );
                    return Err(err);
                }
            }
        }
    }
}
