//! REST HTTP Client - Rate-limited JSON Fetches
//!
//! Wraps reqwest with a per-request timeout, a concurrency cap and a
//! per-minute quota, shared by the REST price sources. Every failure
//! maps to an upstream [`FetchError`] tagged with the owning provider.
//! There are no retries: the next scheduler tick is the retry.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{FetchError, ProviderKind};

/// Configuration for one REST source's client.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
    /// Requests allowed per minute; over-quota fetches fail fast.
    pub requests_per_minute: u32,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(5),
            max_concurrent: 4,
            requests_per_minute: 60,
        }
    }
}

/// Rate-limited JSON client for one provider.
pub struct RestClient {
    http: Client,
    provider: ProviderKind,
    base_url: String,
    semaphore: Arc<Semaphore>,
    limiter: DefaultDirectRateLimiter,
}

impl RestClient {
    pub fn new(provider: ProviderKind, config: RestClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        let per_minute = NonZeroU32::new(config.requests_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    fn upstream(&self, message: impl Into<String>) -> FetchError {
        FetchError::upstream(self.provider.label(), message)
    }

    /// GET `{base_url}{path}` with `query` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        if self.limiter.check().is_err() {
            warn!(provider = self.provider.label(), "Local rate limit reached");
            return Err(self.upstream("rate limited"));
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| self.upstream("client shut down"))?;

        let url = format!("{}{path}", self.base_url);
        debug!(provider = self.provider.label(), url = %url, "REST request");

        let response = self.http.get(&url).query(query).send().await.map_err(|e| {
            if e.is_timeout() {
                self.upstream("request timed out")
            } else {
                self.upstream(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.upstream(format!("HTTP {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| self.upstream(format!("malformed response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_quota_exhaustion_fails_fast() {
        let client = RestClient::new(
            ProviderKind::RestFallback,
            RestClientConfig {
                base_url: "http://127.0.0.1:9/".to_string(),
                timeout: Duration::from_millis(200),
                max_concurrent: 1,
                requests_per_minute: 1,
            },
        )
        .unwrap();

        // First call consumes the quota (and fails on the closed port).
        let first = client.get_json::<serde_json::Value>("/x", &[]).await;
        assert!(first.is_err());

        let second = client.get_json::<serde_json::Value>("/x", &[]).await;
        assert_eq!(
            second.unwrap_err(),
            FetchError::upstream("rest_fallback", "rate limited")
        );
    }
}
