pub mod price_volume;
pub mod screening;

pub use price_volume::fetch_price_volume_1y;
pub use screening::{
    EtfSurgeFilter, ScreeningBatch, ScreeningFilters, UndervaluedFilter, fetch_bottom_reversal,
    fetch_etf_volume_surge, fetch_smart_portfolio, fetch_undervalued, fetch_view,
    fetch_weekly_volume_surge,
};

use crate::error::FetchError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Thin wrapper over a `reqwest` client bound to the screening API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    max_attempts: usize,
}

impl ApiClient {
    pub fn new(client: Client, base_url: impl Into<String>, max_attempts: usize) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, path: &str, query: &[(&str, String)]) -> String {
        let mut url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        for (idx, (key, value)) in query.iter().enumerate() {
            url.push(if idx == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = self.endpoint_url(path, query);
        let response = self.send_with_retry(&url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Contract { url, source })
    }

    async fn send_with_retry(&self, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 1;
        loop {
            debug!(url, attempt, "sending request");
            let error = match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => FetchError::Status {
                    url: url.to_string(),
                    status: response.status(),
                },
                Err(source) => FetchError::Transport {
                    url: url.to_string(),
                    source,
                },
            };

            if attempt >= self.max_attempts || !error.is_retryable() {
                return Err(error);
            }
            let backoff = calculate_backoff(attempt);
            warn!(url, attempt, ?backoff, error = %error, "request failed, retrying");
            sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn calculate_backoff(attempt: usize) -> Duration {
    const MAX_BACKOFF_EXPONENT: u32 = 10;
    let exponent = u32::try_from(attempt)
        .unwrap_or(MAX_BACKOFF_EXPONENT)
        .min(MAX_BACKOFF_EXPONENT);
    let seconds = 2_u64.saturating_pow(exponent);
    Duration::from_secs(seconds)
}

/// Format a numeric filter for the query string, rejecting NaN and infinities.
pub(crate) fn finite_param(name: &'static str, value: f64) -> Result<String, FetchError> {
    if value.is_finite() {
        Ok(value.to_string())
    } else {
        Err(FetchError::InvalidParameter { name, value })
    }
}
