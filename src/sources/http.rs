//! Shared HTTP plumbing: rate limiting, per-request timeout and retry with
//! exponential backoff.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, instrument};

use crate::config::NetworkConfig;
use crate::error::SourceError;

pub struct HttpSource {
    client: Client,
    limiter: DefaultDirectRateLimiter,
    timeout: Duration,
    max_retries: usize,
    retry_base_delay_ms: u64,
    retry_max_delay: Duration,
}

impl HttpSource {
    pub fn new(config: &NetworkConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("pair-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &NetworkConfig) -> Self {
        let per_second = NonZeroU32::new(config.rate_limit_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            client,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
            retry_max_delay: Duration::from_secs(config.retry_max_delay_secs),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send `request` and decode the JSON body. Transient failures (timeouts,
    /// transport errors, 429 and 5xx) are retried with exponential backoff.
    #[instrument(skip_all)]
    pub async fn send_json(&self, request: RequestBuilder) -> Result<Value, SourceError> {
        // from_millis(2).factor(b) yields b*2, b*4, b*8, ... milliseconds
        let strategy = ExponentialBackoff::from_millis(2)
            .factor((self.retry_base_delay_ms / 2).max(1))
            .max_delay(self.retry_max_delay)
            .take(self.max_retries);

        let request = &request;
        RetryIf::spawn(strategy, move || self.attempt(request), |e: &SourceError| {
            let retry = e.is_transient();
            if retry {
                debug!("Retrying after transient error: {}", e);
            }
            retry
        })
        .await
    }

    /// Same as [`send_json`](Self::send_json), decoded into `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SourceError> {
        let value = self.send_json(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn attempt(&self, request: &RequestBuilder) -> Result<Value, SourceError> {
        let request = request
            .try_clone()
            .ok_or_else(|| SourceError::Transport("request body cannot be replayed".to_string()))?;

        self.limiter.until_ready().await;

        let response = request.timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}
