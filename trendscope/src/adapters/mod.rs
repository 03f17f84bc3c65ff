//! Adapters around the external services.
//!
//! Each service sits behind a trait so tests can swap in canned responses. The
//! adapters on top of those traits never fail: transport or decoding problems
//! are logged and turned into an empty value.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod knowledge_graph;
pub mod search_interest;

pub use knowledge_graph::{
    EntityItem, EntityLookupAdapter, EntityLookupResult, EntityLookupService, HttpEntityLookup,
};
pub use search_interest::{
    HttpSearchInterest, InterestData, InterestSample, RegionSample, RelatedTerm, RelatedTerms, SearchInterestService,
    TrendAdapter, MAX_KEYWORDS_PER_REQUEST,
};

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("Trendscope/0.1.0")
        .build()
        .context("failed to build reqwest client")
}

/// Pause before the first retry; doubled for every further attempt.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// GET a JSON document, retrying server errors, rate limiting and network
/// failures with exponential backoff (`backoff`, 2x, 4x...). Other client
/// errors are returned immediately.
pub(crate) async fn get_json_with_retry<T: DeserializeOwned>(
    client: &Client,
    url: &url::Url,
    max_retries: u32,
    backoff: Duration,
) -> Result<T> {
    let attempts = max_retries.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = backoff * 2u32.pow(attempt - 2);
            tracing::info!(url = %redacted(url), attempt, attempts, ?delay, "retrying service call");
            tokio::time::sleep(delay).await;
        }

        match client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json::<T>()
                        .await
                        .with_context(|| format!("failed to decode response from {}", redacted(url)));
                } else if status.is_server_error() {
                    last_error = Some(anyhow::anyhow!("server error: {}", status));
                    continue;
                } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                    continue;
                } else {
                    // Client error (4xx) - permanent, don't retry
                    return Err(anyhow::anyhow!(
                        "request to {} failed with status: {}",
                        redacted(url),
                        status
                    ));
                }
            }
            Err(e) => {
                last_error = Some(anyhow::Error::new(e).context("network error during service call"));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
}

/// URL without its query string, so API keys never reach the logs.
pub(crate) fn redacted(url: &url::Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
