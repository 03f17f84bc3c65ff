use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::{
    EntityLookupAdapter, HttpEntityLookup, HttpSearchInterest, RelatedTerms, TrendAdapter,
};
use crate::error::{PipelineError, Result};
use crate::gaps::{self, Gap, GapInputs, GapPartition, GapPrioritizer};
use crate::llm::SuggestionService;
use crate::opportunities::{OpportunitySynthesizer, StrategyPlan};
use crate::relationships::{competitor_overlap, CompetitorOverlap, Entity, RelationshipMapper, RelationshipMatrix};
use crate::trend::{Timeframe, TrendMomentum, TrendSeries};

pub const DEFAULT_TIMEFRAMES: [Timeframe; 2] = [Timeframe::Last90Days, Timeframe::LastYear];

const DEFAULT_KG_URL: &str = "https://kgsearch.googleapis.com/v1/entities:search";
const DEFAULT_TRENDS_URL: &str = "http://localhost:8090/trends";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MIN_INTERVAL_MILLIS: u64 = 1000;
const DEFAULT_KG_LIMIT: u32 = 10;

/// Parts of an analysis that came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSection {
    KnowledgeGraph,
    TrendSeries,
    RelatedQueries,
    RelatedTopics,
    Competitors,
    RelationshipMatrix,
}

#[derive(Debug, Clone, Serialize)]
pub struct EcosystemAnalysis {
    pub topic: String,
    pub generated_at: DateTime<Utc>,
    pub entity: Entity,
    pub competitors: Vec<Entity>,
    pub competitor_overlap: Vec<CompetitorOverlap>,
    pub trend_series: Vec<TrendSeries>,
    pub related_queries: RelatedTerms,
    pub related_topics: RelatedTerms,
    pub relationship_matrix: RelationshipMatrix,
    pub gaps: Vec<Gap>,
    pub partition: GapPartition,
    pub strategy: StrategyPlan,
    pub missing_sections: Vec<AnalysisSection>,
}

/// Runs the whole entity/trend pipeline for one topic.
#[derive(Clone)]
pub struct EcosystemAnalyzer {
    mapper: RelationshipMapper,
    trends: TrendAdapter,
    synthesizer: OpportunitySynthesizer,
    timeframes: Vec<Timeframe>,
    max_trend_keywords: usize,
}

impl EcosystemAnalyzer {
    pub fn new(mapper: RelationshipMapper, trends: TrendAdapter) -> Self {
        Self {
            mapper,
            trends,
            synthesizer: OpportunitySynthesizer::default(),
            timeframes: DEFAULT_TIMEFRAMES.to_vec(),
            max_trend_keywords: crate::adapters::MAX_KEYWORDS_PER_REQUEST,
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: OpportunitySynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        if !timeframes.is_empty() {
            self.timeframes = timeframes;
        }
        self
    }

    pub fn with_max_trend_keywords(mut self, max: usize) -> Self {
        self.max_trend_keywords = max.clamp(1, crate::adapters::MAX_KEYWORDS_PER_REQUEST);
        self
    }

    /// Wire the HTTP adapters from configuration. Anything unusable in `cfg`
    /// comes back as `PipelineError::Config`.
    pub fn from_config(cfg: &common::Config, suggestions: Option<Arc<dyn SuggestionService>>) -> Result<Self> {
        Self::wire(cfg, suggestions).map_err(PipelineError::config)
    }

    fn wire(cfg: &common::Config, suggestions: Option<Arc<dyn SuggestionService>>) -> anyhow::Result<Self> {
        let kg = &cfg.knowledge_graph;
        let lookup = HttpEntityLookup::new(
            kg.api_url.as_deref().unwrap_or(DEFAULT_KG_URL),
            common::api_key_from_env(kg.api_key_env.as_deref())?,
            kg.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
        )?;
        let lookup = EntityLookupAdapter::new(Arc::new(lookup), kg.result_limit.unwrap_or(DEFAULT_KG_LIMIT));

        let tr = &cfg.trends;
        let mut interest = HttpSearchInterest::new(
            tr.api_url.as_deref().unwrap_or(DEFAULT_TRENDS_URL),
            common::api_key_from_env(tr.api_key_env.as_deref())?,
            tr.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
        )?;
        if let Some(retries) = tr.max_retries {
            interest = interest.with_retries(retries);
        }
        let trends = TrendAdapter::new(
            Arc::new(interest),
            Duration::from_millis(tr.min_interval_millis.unwrap_or(DEFAULT_MIN_INTERVAL_MILLIS)),
        );

        let timeframes = match &tr.timeframes {
            Some(names) => names
                .iter()
                .map(|n| n.parse::<Timeframe>().map_err(|e| anyhow!(e)))
                .collect::<anyhow::Result<Vec<_>>>()
                .context("invalid trends.timeframes")?,
            None => DEFAULT_TIMEFRAMES.to_vec(),
        };

        let pipeline = &cfg.pipeline;
        let mapper = RelationshipMapper::new(lookup, suggestions)
            .with_limits(pipeline.max_related_entities(), pipeline.suggestion_limit());

        Ok(Self::new(mapper, trends)
            .with_synthesizer(OpportunitySynthesizer::new(pipeline.phase_one_high_limit()))
            .with_timeframes(timeframes)
            .with_max_trend_keywords(pipeline.max_trend_keywords()))
    }

    /// Best effort: any collaborator that fails leaves its section empty and
    /// named in `missing_sections`. Only an empty topic is an error.
    pub async fn analyze_entity_ecosystem(&self, topic: &str, competitors: &[String]) -> Result<EcosystemAnalysis> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::malformed("topic must not be empty"));
        }
        info!(topic, competitors = competitors.len(), "starting ecosystem analysis");

        let entity = self.mapper.map_entity(topic).await?;
        let competitor_entities = self.mapper.map_competitors(competitors).await;

        let keywords: Vec<String> = std::iter::once(topic.to_string())
            .chain(entity.related_entities().iter().cloned())
            .take(self.max_trend_keywords)
            .collect();

        let mut trend_series = Vec::new();
        for timeframe in &self.timeframes {
            trend_series.extend(self.trends.fetch_series(&keywords, *timeframe).await?);
        }
        let related_queries = self.trends.related_queries(topic).await;
        let related_topics = self.trends.related_topics(topic).await;

        let matrix = RelationshipMatrix::build(&entity, &[&related_queries, &related_topics]);
        let overlaps = competitor_overlap(&entity, &competitor_entities);

        let inputs = GapInputs {
            knowledge_graph: gaps::knowledge_graph_gaps(&entity, &[&related_queries, &related_topics]),
            trending: gaps::trending_gaps(&entity, &related_queries, &trend_series),
            relationships: gaps::relationship_gaps(&entity, &overlaps, &matrix),
            seasonal: gaps::seasonal_gaps(&trend_series),
        };
        let sorted = GapPrioritizer::prioritize(inputs);
        let partition = GapPrioritizer::partition(&sorted);
        let momentum = TrendMomentum::from_series(&trend_series);
        let strategy = self.synthesizer.synthesize(&sorted, &partition, momentum);

        let mut missing_sections = Vec::new();
        if entity.types().is_empty() && entity.description().is_none() && entity.authority_signals().is_empty() {
            missing_sections.push(AnalysisSection::KnowledgeGraph);
        }
        if trend_series.iter().all(TrendSeries::is_empty) {
            missing_sections.push(AnalysisSection::TrendSeries);
        }
        if related_queries.is_empty() {
            missing_sections.push(AnalysisSection::RelatedQueries);
        }
        if related_topics.is_empty() {
            missing_sections.push(AnalysisSection::RelatedTopics);
        }
        if !competitors.is_empty() && competitor_entities.iter().all(|c| c.related_entities().is_empty()) {
            missing_sections.push(AnalysisSection::Competitors);
        }
        if matrix.is_empty() {
            missing_sections.push(AnalysisSection::RelationshipMatrix);
        }
        if !missing_sections.is_empty() {
            warn!(topic, missing = ?missing_sections, "analysis degraded");
        }

        info!(
            topic,
            gaps = sorted.len(),
            strategy = %strategy.recommended_strategy,
            "ecosystem analysis complete"
        );

        Ok(EcosystemAnalysis {
            topic: topic.to_string(),
            generated_at: Utc::now(),
            entity,
            competitors: competitor_entities,
            competitor_overlap: overlaps,
            trend_series,
            related_queries,
            related_topics,
            relationship_matrix: matrix,
            gaps: sorted,
            partition,
            strategy,
            missing_sections,
        })
    }
}
