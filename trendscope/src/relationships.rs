use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapters::{EntityLookupAdapter, EntityLookupResult, RelatedTerms};
use crate::error::{PipelineError, Result};
use crate::extraction::{self, AuthoritySignal, EntityCategory};
use crate::llm::suggestions::suggest_related_entities;
use crate::llm::SuggestionService;

pub const MAX_RELATED_ENTITIES: usize = 50;

/// A named concept and what the lookup service and the suggestion service say
/// surrounds it. Built once per analysis run and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    name: String,
    description: Option<String>,
    types: BTreeSet<String>,
    categorized_types: BTreeMap<EntityCategory, Vec<String>>,
    related_entities: Vec<String>,
    authority_signals: BTreeSet<AuthoritySignal>,
}

impl Entity {
    /// Assemble an entity from a lookup result plus suggested names.
    ///
    /// Candidates from the lookup text come first, suggestions after; the
    /// combined list is case-folded, deduplicated and capped.
    pub fn from_lookup(
        name: &str,
        lookup: &EntityLookupResult,
        suggested: Vec<String>,
        max_related: usize,
    ) -> Self {
        let name = name.trim().to_string();
        let primary = lookup.items.first();

        let types: BTreeSet<String> = primary.map(|p| p.types.iter().cloned().collect()).unwrap_or_default();

        let description = primary.and_then(|p| p.detailed_description.clone().or_else(|| p.description.clone()));

        let mut candidates = description
            .as_deref()
            .map(extraction::extract_candidates)
            .unwrap_or_default();
        candidates.extend(suggested.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));

        let related_entities =
            extraction::dedupe_related(candidates, &name, max_related.min(MAX_RELATED_ENTITIES));

        Self {
            categorized_types: categorize_types(&types),
            authority_signals: extraction::authority_signals(&lookup.items),
            name,
            description,
            types,
            related_entities,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    pub fn categorized_types(&self) -> &BTreeMap<EntityCategory, Vec<String>> {
        &self.categorized_types
    }

    pub fn related_entities(&self) -> &[String] {
        &self.related_entities
    }

    pub fn authority_signals(&self) -> &BTreeSet<AuthoritySignal> {
        &self.authority_signals
    }

    pub fn missing_authority_signals(&self) -> Vec<AuthoritySignal> {
        AuthoritySignal::ALL
            .into_iter()
            .filter(|s| !self.authority_signals.contains(s))
            .collect()
    }

    pub fn is_related_to(&self, other: &str) -> bool {
        let other = other.trim().to_lowercase();
        self.related_entities.iter().any(|e| *e == other)
    }
}

fn categorize_types(types: &BTreeSet<String>) -> BTreeMap<EntityCategory, Vec<String>> {
    let mut out: BTreeMap<EntityCategory, Vec<String>> = BTreeMap::new();
    for t in types {
        out.entry(extraction::categorize_type(t)).or_default().push(t.clone());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipSource {
    KnowledgeGraph,
    Trends,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipEdge {
    pub entity_a: String,
    pub entity_b: String,
    pub sources: BTreeSet<RelationshipSource>,
    pub strength: f64,
}

/// Pairwise relationship strengths. Pairs are stored with `entity_a < entity_b`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationshipMatrix {
    edges: Vec<RelationshipEdge>,
}

const SOURCE_COUNT: f64 = 2.0;

impl RelationshipMatrix {
    /// Combine lookup co-occurrence and trend co-occurrence for every pair of
    /// names among the entity and its related entities.
    ///
    /// - knowledge graph: the pair shares a sentence of the entity description;
    ///   for pairs with the entity itself, the related name appears in the description.
    /// - trends: some related query/topic of the entity mentions both names; for
    ///   pairs with the entity itself, some term mentions the related name.
    pub fn build(entity: &Entity, trend_terms: &[&RelatedTerms]) -> Self {
        let primary = entity.name().to_lowercase();
        let description = entity.description().unwrap_or_default();
        let description_words = extraction::words(description);
        let sentences: Vec<Vec<String>> = extraction::sentences(description)
            .into_iter()
            .map(extraction::words)
            .collect();
        let terms: Vec<Vec<String>> = trend_terms
            .iter()
            .flat_map(|t| t.all_terms())
            .map(extraction::words)
            .collect();

        let mut edges: BTreeMap<(String, String), BTreeSet<RelationshipSource>> = BTreeMap::new();
        let mut support = |a: &str, b: &str, source: RelationshipSource| {
            let key = if a <= b {
                (a.to_string(), b.to_string())
            } else {
                (b.to_string(), a.to_string())
            };
            edges.entry(key).or_default().insert(source);
        };
        let both_in = |words: &[String], a: &str, b: &str| {
            extraction::contains_phrase(words, a) && extraction::contains_phrase(words, b)
        };

        let related = entity.related_entities();
        for e in related {
            if extraction::contains_phrase(&description_words, e) {
                support(&primary, e, RelationshipSource::KnowledgeGraph);
            }
            if terms.iter().any(|t| extraction::contains_phrase(t, e)) {
                support(&primary, e, RelationshipSource::Trends);
            }
        }

        for (i, a) in related.iter().enumerate() {
            for b in &related[i + 1..] {
                if sentences.iter().any(|s| both_in(s, a, b)) {
                    support(a, b, RelationshipSource::KnowledgeGraph);
                }
                if terms.iter().any(|t| both_in(t, a, b)) {
                    support(a, b, RelationshipSource::Trends);
                }
            }
        }

        let edges = edges
            .into_iter()
            .map(|((entity_a, entity_b), sources)| RelationshipEdge {
                strength: sources.len() as f64 / SOURCE_COUNT,
                entity_a,
                entity_b,
                sources,
            })
            .collect();

        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn strength(&self, a: &str, b: &str) -> f64 {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.edges
            .iter()
            .find(|e| e.entity_a == a && e.entity_b == b)
            .map(|e| e.strength)
            .unwrap_or(0.0)
    }

    /// Strongest first; ties by source count, then alphabetically by pair.
    pub fn ranked(&self) -> Vec<&RelationshipEdge> {
        let mut ranked: Vec<&RelationshipEdge> = self.edges.iter().collect();
        ranked.sort_by(|x, y| {
            y.strength
                .total_cmp(&x.strength)
                .then_with(|| y.sources.len().cmp(&x.sources.len()))
                .then_with(|| (&x.entity_a, &x.entity_b).cmp(&(&y.entity_a, &y.entity_b)))
        });
        ranked
    }
}

/// How a competitor's surroundings compare with the primary entity's.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorOverlap {
    pub competitor: String,
    pub shared: Vec<String>,
    pub unique_to_competitor: Vec<String>,
}

pub fn competitor_overlap(primary: &Entity, competitors: &[Entity]) -> Vec<CompetitorOverlap> {
    competitors
        .iter()
        .map(|c| {
            let (shared, unique_to_competitor): (Vec<String>, Vec<String>) = c
                .related_entities()
                .iter()
                .filter(|e| e.as_str() != primary.name().to_lowercase())
                .cloned()
                .partition(|e| primary.related_entities().contains(e));
            CompetitorOverlap {
                competitor: c.name().to_string(),
                shared,
                unique_to_competitor,
            }
        })
        .collect()
}

/// Builds entities from the lookup adapter and, when configured, the
/// suggestion service.
#[derive(Clone)]
pub struct RelationshipMapper {
    lookup: EntityLookupAdapter,
    suggestions: Option<Arc<dyn SuggestionService>>,
    max_related: usize,
    suggestion_limit: usize,
}

impl RelationshipMapper {
    pub fn new(lookup: EntityLookupAdapter, suggestions: Option<Arc<dyn SuggestionService>>) -> Self {
        Self {
            lookup,
            suggestions,
            max_related: MAX_RELATED_ENTITIES,
            suggestion_limit: 20,
        }
    }

    pub fn with_limits(mut self, max_related: usize, suggestion_limit: usize) -> Self {
        self.max_related = max_related.min(MAX_RELATED_ENTITIES);
        self.suggestion_limit = suggestion_limit.min(20);
        self
    }

    pub async fn map_entity(&self, name: &str) -> Result<Entity> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::malformed("entity name must not be empty"));
        }

        let lookup = self.lookup.lookup(name).await;
        let types: Vec<String> = lookup.items.first().map(|p| p.types.clone()).unwrap_or_default();

        let suggested = match &self.suggestions {
            Some(service) => suggest_related_entities(service.as_ref(), name, &types, self.suggestion_limit).await,
            None => {
                debug!(entity = %name, "no suggestion service configured");
                Vec::new()
            }
        };

        let entity = Entity::from_lookup(name, &lookup, suggested, self.max_related);
        info!(
            entity = %entity.name(),
            related = entity.related_entities().len(),
            signals = entity.authority_signals().len(),
            "entity mapped"
        );
        Ok(entity)
    }

    /// Blank names are skipped; one entity per remaining name, in order.
    pub async fn map_competitors(&self, names: &[String]) -> Vec<Entity> {
        let mut out = Vec::new();
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            // Only fails on a blank name, which was filtered above.
            if let Ok(entity) = self.map_entity(name).await {
                out.push(entity);
            }
        }
        out
    }
}
