use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{build_client, get_json_with_retry, redacted, DEFAULT_BACKOFF};

/// One entity returned by the lookup service, normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityItem {
    pub name: Option<String>,
    pub types: Vec<String>,
    pub description: Option<String>,
    /// `detailedDescription.articleBody`
    pub detailed_description: Option<String>,
    /// `detailedDescription.url`, usually an encyclopedia article
    pub detailed_description_url: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub result_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityLookupResult {
    pub items: Vec<EntityItem>,
}

impl EntityLookupResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait::async_trait]
pub trait EntityLookupService: Send + Sync {
    async fn lookup(&self, query: &str, limit: u32) -> Result<EntityLookupResult>;
}

/// Knowledge-graph search over HTTP (`itemListElement[].result` response shape).
pub struct HttpEntityLookup {
    base_url: url::Url,
    api_key: Option<String>,
    max_retries: u32,
    backoff: Duration,
    client: Client,
}

impl HttpEntityLookup {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: url::Url::parse(base_url)
                .with_context(|| format!("invalid entity lookup URL: {}", base_url))?,
            api_key,
            max_retries: 1,
            backoff: DEFAULT_BACKOFF,
            client: build_client(timeout_secs)?,
        })
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait::async_trait]
impl EntityLookupService for HttpEntityLookup {
    async fn lookup(&self, query: &str, limit: u32) -> Result<EntityLookupResult> {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            pairs.append_pair("limit", &limit.to_string());
            pairs.append_pair("indent", "false");
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }

        debug!(url = %redacted(&url), query, "entity lookup request");
        let raw: RawSearchResponse = get_json_with_retry(&self.client, &url, self.max_retries, self.backoff).await?;
        Ok(raw.into())
    }
}

/// Wraps an `EntityLookupService`; failures become an empty result.
#[derive(Clone)]
pub struct EntityLookupAdapter {
    service: Arc<dyn EntityLookupService>,
    limit: u32,
}

impl EntityLookupAdapter {
    pub fn new(service: Arc<dyn EntityLookupService>, limit: u32) -> Self {
        Self {
            service,
            limit: limit.max(1),
        }
    }

    pub async fn lookup(&self, query: &str) -> EntityLookupResult {
        let query = query.trim();
        if query.is_empty() {
            return EntityLookupResult::default();
        }

        match self.service.lookup(query, self.limit).await {
            Ok(result) => {
                info!(query, items = result.items.len(), "entity lookup complete");
                normalize(result)
            }
            Err(e) => {
                warn!(query, "entity lookup unavailable: {:#}", e);
                EntityLookupResult::default()
            }
        }
    }
}

/// Trim strings and drop empty ones so downstream code only has to check `Option`.
fn normalize(result: EntityLookupResult) -> EntityLookupResult {
    fn clean(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    let items = result
        .items
        .into_iter()
        .map(|item| EntityItem {
            name: clean(item.name),
            types: item
                .types
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            description: clean(item.description),
            detailed_description: clean(item.detailed_description),
            detailed_description_url: clean(item.detailed_description_url),
            url: clean(item.url),
            image: clean(item.image),
            result_score: item.result_score,
        })
        .collect();

    EntityLookupResult { items }
}

// Wire format of the knowledge-graph search API
#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(rename = "itemListElement", default)]
    item_list_element: Vec<RawListElement>,
}

#[derive(Debug, Deserialize)]
struct RawListElement {
    #[serde(default)]
    result: Option<RawResult>,
    #[serde(rename = "resultScore", default)]
    result_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResult {
    name: Option<String>,
    #[serde(rename = "@type", default)]
    types: Vec<String>,
    description: Option<String>,
    #[serde(rename = "detailedDescription")]
    detailed_description: Option<RawDetailedDescription>,
    url: Option<String>,
    image: Option<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawDetailedDescription {
    #[serde(rename = "articleBody")]
    article_body: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(rename = "contentUrl")]
    content_url: Option<String>,
    url: Option<String>,
}

impl From<RawSearchResponse> for EntityLookupResult {
    fn from(raw: RawSearchResponse) -> Self {
        let items = raw
            .item_list_element
            .into_iter()
            .filter_map(|el| {
                let result = el.result?;
                let (detailed_description, detailed_description_url) = match result.detailed_description {
                    Some(d) => (d.article_body, d.url),
                    None => (None, None),
                };
                Some(EntityItem {
                    name: result.name,
                    types: result.types,
                    description: result.description,
                    detailed_description,
                    detailed_description_url,
                    url: result.url,
                    image: result.image.and_then(|i| i.content_url.or(i.url)),
                    result_score: el.result_score,
                })
            })
            .collect();
        EntityLookupResult { items }
    }
}
