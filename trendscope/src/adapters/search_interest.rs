use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{build_client, get_json_with_retry, redacted, DEFAULT_BACKOFF};
use crate::error::PipelineError;
use crate::trend::{InterestPoint, Timeframe, TrendSeries};

/// The service compares at most five keywords per request.
pub const MAX_KEYWORDS_PER_REQUEST: usize = 5;

/// Raw interest data for a set of keywords, one value per keyword per sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestData {
    pub interest_over_time: Vec<InterestSample>,
    pub interest_by_region: Vec<RegionSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestSample {
    pub date: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSample {
    pub geo: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedTerm {
    pub term: String,
    /// Relative score for `top`, growth percentage for `rising`.
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedTerms {
    pub top: Vec<RelatedTerm>,
    pub rising: Vec<RelatedTerm>,
}

impl RelatedTerms {
    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.rising.is_empty()
    }

    pub fn all_terms(&self) -> impl Iterator<Item = &str> {
        self.top.iter().chain(self.rising.iter()).map(|t| t.term.as_str())
    }
}

#[async_trait::async_trait]
pub trait SearchInterestService: Send + Sync {
    async fn series(&self, keywords: &[String], timeframe: Timeframe) -> Result<InterestData>;
    async fn related_queries(&self, keyword: &str) -> Result<RelatedTerms>;
    async fn related_topics(&self, keyword: &str) -> Result<RelatedTerms>;
}

/// Search-interest service over HTTP.
///
/// `GET {base}/interest?keywords=a,b&timeframe=today 3-m`,
/// `GET {base}/related_queries?keyword=k`, `GET {base}/related_topics?keyword=k`.
pub struct HttpSearchInterest {
    base_url: url::Url,
    api_key: Option<String>,
    max_retries: u32,
    backoff: Duration,
    client: Client,
}

impl HttpSearchInterest {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let mut base = url::Url::parse(base_url)
            .with_context(|| format!("invalid search-interest URL: {}", base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base_url: base,
            api_key,
            max_retries: 3,
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

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<url::Url> {
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("failed to build {} endpoint", path))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }
        Ok(url)
    }

    async fn related(&self, path: &str, keyword: &str) -> Result<RelatedTerms> {
        let url = self.endpoint(path, &[("keyword", keyword)])?;
        debug!(url = %redacted(&url), keyword, "related terms request");
        let raw: RawRelated = get_json_with_retry(&self.client, &url, self.max_retries, self.backoff).await?;
        Ok(raw.into())
    }
}

#[async_trait::async_trait]
impl SearchInterestService for HttpSearchInterest {
    async fn series(&self, keywords: &[String], timeframe: Timeframe) -> Result<InterestData> {
        let joined = keywords.join(",");
        let url = self.endpoint("interest", &[("keywords", &joined), ("timeframe", timeframe.as_query())])?;
        debug!(url = %redacted(&url), %timeframe, "interest request");
        let raw: RawInterest = get_json_with_retry(&self.client, &url, self.max_retries, self.backoff).await?;
        Ok(raw.into())
    }

    async fn related_queries(&self, keyword: &str) -> Result<RelatedTerms> {
        self.related("related_queries", keyword).await
    }

    async fn related_topics(&self, keyword: &str) -> Result<RelatedTerms> {
        self.related("related_topics", keyword).await
    }
}

/// Wraps a `SearchInterestService`, spacing out calls and turning failures
/// into empty values.
#[derive(Clone)]
pub struct TrendAdapter {
    service: Arc<dyn SearchInterestService>,
    min_interval: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl TrendAdapter {
    pub fn new(service: Arc<dyn SearchInterestService>, min_interval: Duration) -> Self {
        Self {
            service,
            min_interval,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait until `min_interval` has passed since the previous call. The lock is
    /// held while waiting so concurrent callers queue up behind each other.
    async fn throttle(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(?wait, "throttling search-interest call");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// One `TrendSeries` per keyword, in input order. A keyword the service had
    /// no data for gets an empty series.
    pub async fn fetch_series(
        &self,
        keywords: &[String],
        timeframe: Timeframe,
    ) -> crate::error::Result<Vec<TrendSeries>> {
        let keywords = validate_keywords(keywords)?;

        self.throttle().await;
        let data = match self.service.series(&keywords, timeframe).await {
            Ok(data) => {
                info!(keywords = ?keywords, %timeframe, samples = data.interest_over_time.len(), "interest data fetched");
                data
            }
            Err(e) => {
                warn!(keywords = ?keywords, %timeframe, "search-interest service unavailable: {:#}", e);
                InterestData::default()
            }
        };

        Ok(split_by_keyword(&keywords, timeframe, &data))
    }

    pub async fn related_queries(&self, keyword: &str) -> RelatedTerms {
        self.throttle().await;
        match self.service.related_queries(keyword).await {
            Ok(terms) => terms,
            Err(e) => {
                warn!(keyword, "related queries unavailable: {:#}", e);
                RelatedTerms::default()
            }
        }
    }

    pub async fn related_topics(&self, keyword: &str) -> RelatedTerms {
        self.throttle().await;
        match self.service.related_topics(keyword).await {
            Ok(terms) => terms,
            Err(e) => {
                warn!(keyword, "related topics unavailable: {:#}", e);
                RelatedTerms::default()
            }
        }
    }
}

fn validate_keywords(keywords: &[String]) -> crate::error::Result<Vec<String>> {
    let mut cleaned: Vec<String> = Vec::new();
    for k in keywords {
        let k = k.trim();
        if !k.is_empty() && !cleaned.iter().any(|c| c.eq_ignore_ascii_case(k)) {
            cleaned.push(k.to_string());
        }
    }
    if cleaned.is_empty() {
        return Err(PipelineError::malformed("keyword list must not be empty"));
    }
    if cleaned.len() > MAX_KEYWORDS_PER_REQUEST {
        return Err(PipelineError::malformed(format!(
            "at most {} keywords per request, got {}",
            MAX_KEYWORDS_PER_REQUEST,
            cleaned.len()
        )));
    }
    Ok(cleaned)
}

fn split_by_keyword(keywords: &[String], timeframe: Timeframe, data: &InterestData) -> Vec<TrendSeries> {
    keywords
        .iter()
        .map(|keyword| {
            let points = data
                .interest_over_time
                .iter()
                .filter_map(|sample| {
                    lookup_value(&sample.values, keyword).map(|value| InterestPoint {
                        timestamp: sample.date,
                        value,
                    })
                })
                .collect();
            let regions = data
                .interest_by_region
                .iter()
                .filter_map(|r| lookup_value(&r.values, keyword).map(|v| (r.geo.clone(), v)))
                .collect();
            TrendSeries::new(keyword.clone(), timeframe, points, regions)
        })
        .collect()
}

/// Services echo keywords back with their own casing.
fn lookup_value(values: &BTreeMap<String, f64>, keyword: &str) -> Option<f64> {
    values.get(keyword).copied().or_else(|| {
        values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .map(|(_, v)| *v)
    })
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates.
fn parse_sample_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// Wire format
#[derive(Debug, Deserialize)]
struct RawInterest {
    #[serde(default)]
    interest_over_time: Vec<RawSample>,
    #[serde(default)]
    interest_by_region: Vec<RawRegion>,
}

#[derive(Debug, Deserialize)]
struct RawSample {
    date: String,
    #[serde(default)]
    values: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawRegion {
    geo: String,
    #[serde(default)]
    values: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawRelated {
    #[serde(default)]
    top: Vec<RawTerm>,
    #[serde(default)]
    rising: Vec<RawTerm>,
}

#[derive(Debug, Deserialize)]
struct RawTerm {
    #[serde(alias = "title", alias = "topic_title")]
    query: String,
    #[serde(default)]
    value: f64,
}

impl From<RawInterest> for InterestData {
    fn from(raw: RawInterest) -> Self {
        let interest_over_time = raw
            .interest_over_time
            .into_iter()
            .filter_map(|s| match parse_sample_date(&s.date) {
                Some(date) => Some(InterestSample { date, values: s.values }),
                None => {
                    debug!(date = %s.date, "skipping interest sample with unparsable date");
                    None
                }
            })
            .collect();
        let interest_by_region = raw
            .interest_by_region
            .into_iter()
            .map(|r| RegionSample { geo: r.geo, values: r.values })
            .collect();
        InterestData {
            interest_over_time,
            interest_by_region,
        }
    }
}

impl From<RawRelated> for RelatedTerms {
    fn from(raw: RawRelated) -> Self {
        let convert = |terms: Vec<RawTerm>| {
            terms
                .into_iter()
                .map(|t| RelatedTerm {
                    term: t.query.trim().to_string(),
                    value: t.value,
                })
                .filter(|t| !t.term.is_empty())
                .collect::<Vec<RelatedTerm>>()
        };
        RelatedTerms {
            top: convert(raw.top),
            rising: convert(raw.rising),
        }
    }
}
