use serde::{Deserialize, Serialize};
use std::fmt;

use crate::adapters::RelatedTerms;
use crate::extraction;
use crate::relationships::{CompetitorOverlap, Entity, RelationshipMatrix};
use crate::trend::{TrendDirection, TrendSeries};

const KG_CONTENT_GAPS: usize = 5;
const RISING_QUERY_GAPS: usize = 5;
const COMPETITOR_GAPS_PER_COMPETITOR: usize = 5;
const ECOSYSTEM_GAPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSource {
    KnowledgeGraph,
    Trending,
    Relationships,
    Seasonal,
}

impl GapSource {
    /// Priority is a function of the source alone.
    pub fn priority(&self) -> GapPriority {
        match self {
            GapSource::KnowledgeGraph => GapPriority::High,
            GapSource::Trending => GapPriority::Urgent,
            GapSource::Relationships => GapPriority::Medium,
            GapSource::Seasonal => GapPriority::Scheduled,
        }
    }
}

/// Declaration order is the ranking: `Urgent` sorts first, `Unranked` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPriority {
    Urgent,
    High,
    Medium,
    Scheduled,
    Unranked,
}

impl fmt::Display for GapPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GapPriority::Urgent => "urgent",
            GapPriority::High => "high",
            GapPriority::Medium => "medium",
            GapPriority::Scheduled => "scheduled",
            GapPriority::Unranked => "unranked",
        };
        f.write_str(s)
    }
}

/// What kind of work closes the gap. The roadmap uses this to place
/// non-urgent gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFocus {
    Content,
    Authority,
    Ecosystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub description: String,
    pub source: GapSource,
    pub priority: GapPriority,
    pub focus: GapFocus,
    pub reasoning: String,
}

impl Gap {
    /// New gaps are unranked until they go through `GapPrioritizer`.
    pub fn new(source: GapSource, focus: GapFocus, description: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            source,
            priority: GapPriority::Unranked,
            focus,
            reasoning: reasoning.into(),
        }
    }
}

/// The four independently produced gap lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapInputs {
    pub knowledge_graph: Vec<Gap>,
    pub trending: Vec<Gap>,
    pub relationships: Vec<Gap>,
    pub seasonal: Vec<Gap>,
}

/// Quick wins are the urgent and high gaps; everything else is strategic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapPartition {
    pub quick_wins: Vec<Gap>,
    pub strategic: Vec<Gap>,
}

pub struct GapPrioritizer;

impl GapPrioritizer {
    /// Concatenate (knowledge graph, trending, relationships, seasonal), stamp
    /// each gap with its source priority and stable-sort by priority.
    pub fn prioritize(inputs: GapInputs) -> Vec<Gap> {
        let GapInputs {
            knowledge_graph,
            trending,
            relationships,
            seasonal,
        } = inputs;

        let mut all: Vec<Gap> = knowledge_graph
            .into_iter()
            .chain(trending)
            .chain(relationships)
            .chain(seasonal)
            .map(|mut gap| {
                gap.priority = gap.source.priority();
                gap
            })
            .collect();

        // sort_by_key is stable: equal priorities keep input order
        all.sort_by_key(|g| g.priority);
        all
    }

    pub fn partition(sorted: &[Gap]) -> GapPartition {
        let (quick_wins, strategic) = sorted
            .iter()
            .cloned()
            .partition(|g| matches!(g.priority, GapPriority::Urgent | GapPriority::High));
        GapPartition { quick_wins, strategic }
    }
}

fn mentioned_in(name: &str, terms: &[&RelatedTerms]) -> bool {
    terms
        .iter()
        .flat_map(|t| t.all_terms())
        .any(|t| extraction::mentions(t, name))
}

/// Missing authority signals, plus related entities nobody searches alongside the topic.
pub fn knowledge_graph_gaps(entity: &Entity, trend_terms: &[&RelatedTerms]) -> Vec<Gap> {
    let mut gaps: Vec<Gap> = entity
        .missing_authority_signals()
        .into_iter()
        .map(|signal| {
            Gap::new(
                GapSource::KnowledgeGraph,
                GapFocus::Authority,
                format!("Establish {} for {}", signal.name().replace('_', " "), entity.name()),
                format!("The knowledge graph shows no {} signal for this entity", signal),
            )
        })
        .collect();

    gaps.extend(
        entity
            .related_entities()
            .iter()
            .filter(|e| !mentioned_in(e, trend_terms))
            .take(KG_CONTENT_GAPS)
            .map(|e| {
                Gap::new(
                    GapSource::KnowledgeGraph,
                    GapFocus::Content,
                    format!("Cover '{}' as a supporting subtopic of {}", e, entity.name()),
                    "Linked to the entity in the knowledge graph but absent from related searches",
                )
            }),
    );
    gaps
}

/// Rising related queries the entity does not already cover, and keywords
/// whose interest is rising.
pub fn trending_gaps(entity: &Entity, related_queries: &RelatedTerms, series: &[TrendSeries]) -> Vec<Gap> {
    let mut gaps: Vec<Gap> = related_queries
        .rising
        .iter()
        .filter(|q| !entity.is_related_to(&q.term))
        .take(RISING_QUERY_GAPS)
        .map(|q| {
            Gap::new(
                GapSource::Trending,
                GapFocus::Content,
                format!("Publish timely content answering '{}'", q.term),
                format!("Rising related query (+{:.0}%)", q.value),
            )
        })
        .collect();

    let mut seen: Vec<&str> = Vec::new();
    for s in series.iter().filter(|s| s.direction() == TrendDirection::Rising) {
        if seen.iter().any(|k| k.eq_ignore_ascii_case(s.keyword())) {
            continue;
        }
        seen.push(s.keyword());
        gaps.push(Gap::new(
            GapSource::Trending,
            GapFocus::Content,
            format!("Expand coverage of '{}' while interest is rising", s.keyword()),
            format!("Interest over {} is up {:.0}%", s.timeframe(), s.momentum()),
        ));
    }
    gaps
}

/// Entities competitors are associated with but the primary is not, and the
/// strongest links between two related entities.
pub fn relationship_gaps(
    entity: &Entity,
    overlaps: &[CompetitorOverlap],
    matrix: &RelationshipMatrix,
) -> Vec<Gap> {
    let mut gaps: Vec<Gap> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for overlap in overlaps {
        for e in overlap.unique_to_competitor.iter().take(COMPETITOR_GAPS_PER_COMPETITOR) {
            if seen.contains(&e.as_str()) {
                continue;
            }
            seen.push(e);
            gaps.push(Gap::new(
                GapSource::Relationships,
                GapFocus::Content,
                format!("Cover '{}', which {} is associated with", e, overlap.competitor),
                format!("Competitor {} links to it; {} does not", overlap.competitor, entity.name()),
            ));
        }
    }

    let primary = entity.name().to_lowercase();
    gaps.extend(
        matrix
            .ranked()
            .into_iter()
            .filter(|edge| edge.entity_a != primary && edge.entity_b != primary)
            .take(ECOSYSTEM_GAPS)
            .map(|edge| {
                Gap::new(
                    GapSource::Relationships,
                    GapFocus::Ecosystem,
                    format!("Explain how '{}' relates to '{}'", edge.entity_a, edge.entity_b),
                    format!(
                        "Relationship strength {:.1} from {} independent source(s)",
                        edge.strength,
                        edge.sources.len()
                    ),
                )
            }),
    );
    gaps
}

/// One gap per keyword with a clear seasonal peak in a year-long series.
pub fn seasonal_gaps(series: &[TrendSeries]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for s in series.iter().filter(|s| s.timeframe().supports_seasonality()) {
        if seen.iter().any(|k| k.eq_ignore_ascii_case(s.keyword())) {
            continue;
        }
        let Some(month) = s.seasonal_peak_month() else {
            continue;
        };
        seen.push(s.keyword());
        let month_name = u8::try_from(month)
            .ok()
            .and_then(|m| chrono::Month::try_from(m).ok())
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| format!("month {}", month));
        gaps.push(Gap::new(
            GapSource::Seasonal,
            GapFocus::Content,
            format!("Prepare '{}' content ahead of the {} interest peak", s.keyword(), month_name),
            format!("{} interest peaks in {} over the last year", s.keyword(), month_name),
        ));
    }
    gaps
}
