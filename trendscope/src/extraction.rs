//! Text heuristics used while building an entity.
//!
//! All functions here are pure. Rule order is part of the contract:
//!
//! 1. Candidate names come from three independent passes over the same text
//!    (capitalized phrases, quoted substrings, parenthetical substrings), in
//!    that order, unioned. A capitalized phrase is a run of whitespace-separated
//!    words that each start with an uppercase letter (any script) followed by
//!    letters or digits, so acronyms ("AWS") and names like "McDonald" count.
//! 2. Every candidate is trimmed; anything of two characters or fewer is dropped.
//! 3. Type strings are categorized by the first matching category in
//!    `EntityCategory::ORDER`; nothing matching falls back to `Other`.
//! 4. A name is mentioned in a text only as a whole run of words: "go" is not
//!    in "ago", "java" is not in "javascript".

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use crate::adapters::EntityItem;

static CAPITALIZED_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\p{Lu}[\p{L}\p{N}]*(?:\s+\p{Lu}[\p{L}\p{N}]*)*\b").expect("valid regex"));
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("valid regex"));
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]+)\)").expect("valid regex"));

const MIN_CANDIDATE_CHARS: usize = 3;

pub fn capitalized_phrases(text: &str) -> Vec<String> {
    CAPITALIZED_PHRASE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn quoted_substrings(text: &str) -> Vec<String> {
    QUOTED
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn parenthetical_substrings(text: &str) -> Vec<String> {
    PARENTHETICAL
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Union of the three passes, trimmed, short candidates dropped. Order is
/// first occurrence across passes; duplicates are left for the caller.
pub fn extract_candidates(text: &str) -> Vec<String> {
    capitalized_phrases(text)
        .into_iter()
        .chain(quoted_substrings(text))
        .chain(parenthetical_substrings(text))
        .map(|c| c.trim().to_string())
        .filter(|c| c.chars().count() >= MIN_CANDIDATE_CHARS)
        .collect()
}

/// Case-fold, drop blanks and `exclude`, keep first occurrences, cap at `max`.
///
/// Deduplication depends only on the folded value, so two calls with the same
/// input produce the same output.
pub fn dedupe_related(candidates: impl IntoIterator<Item = String>, exclude: &str, max: usize) -> Vec<String> {
    let exclude = exclude.trim().to_lowercase();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for candidate in candidates {
        if out.len() >= max {
            break;
        }
        let folded = normalize_whitespace(&candidate.to_lowercase());
        if folded.is_empty() || folded == exclude {
            continue;
        }
        if seen.insert(folded.clone()) {
            out.push(folded);
        }
    }
    out
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Organizations,
    People,
    Places,
    Concepts,
    Products,
    Events,
    Other,
}

impl EntityCategory {
    /// Matching order; the first category with a matching keyword wins.
    pub const ORDER: [EntityCategory; 6] = [
        EntityCategory::Organizations,
        EntityCategory::People,
        EntityCategory::Places,
        EntityCategory::Concepts,
        EntityCategory::Products,
        EntityCategory::Events,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            EntityCategory::Organizations => &["organization", "company", "corporation", "business", "institution", "agency"],
            EntityCategory::People => &["person", "people", "author", "artist", "athlete"],
            EntityCategory::Places => &["place", "city", "country", "location", "landmark", "administrativearea"],
            EntityCategory::Concepts => &["concept", "thing", "topic", "field", "language", "theory"],
            EntityCategory::Products => &["product", "software", "brand", "model", "application"],
            EntityCategory::Events => &["event", "festival", "conference", "competition"],
            EntityCategory::Other => &[],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntityCategory::Organizations => "organizations",
            EntityCategory::People => "people",
            EntityCategory::Places => "places",
            EntityCategory::Concepts => "concepts",
            EntityCategory::Products => "products",
            EntityCategory::Events => "events",
            EntityCategory::Other => "other",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Total: every type string lands in exactly one category.
pub fn categorize_type(raw_type: &str) -> EntityCategory {
    let lowered = raw_type.to_lowercase();
    EntityCategory::ORDER
        .into_iter()
        .find(|category| category.keywords().iter().any(|k| lowered.contains(k)))
        .unwrap_or(EntityCategory::Other)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthoritySignal {
    WikipediaPresence,
    OfficialWebsite,
    DetailedDescription,
    KnowledgeGraphImage,
}

impl AuthoritySignal {
    pub const ALL: [AuthoritySignal; 4] = [
        AuthoritySignal::WikipediaPresence,
        AuthoritySignal::OfficialWebsite,
        AuthoritySignal::DetailedDescription,
        AuthoritySignal::KnowledgeGraphImage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AuthoritySignal::WikipediaPresence => "wikipedia_presence",
            AuthoritySignal::OfficialWebsite => "official_website",
            AuthoritySignal::DetailedDescription => "detailed_description",
            AuthoritySignal::KnowledgeGraphImage => "knowledge_graph_image",
        }
    }
}

impl fmt::Display for AuthoritySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Each signal appears at most once however many items carry it.
///
/// A Wikipedia link may sit on the item itself or on its detailed
/// description. Any URL at all (item, description or image) counts as
/// `official_website`.
pub fn authority_signals(items: &[EntityItem]) -> BTreeSet<AuthoritySignal> {
    let mut signals = BTreeSet::new();
    for item in items {
        let urls = [
            item.url.as_deref(),
            item.detailed_description_url.as_deref(),
            item.image.as_deref(),
        ];
        if urls[..2].iter().flatten().any(|u| is_wikipedia_url(u)) {
            signals.insert(AuthoritySignal::WikipediaPresence);
        }
        if urls.iter().flatten().any(|u| !u.trim().is_empty()) {
            signals.insert(AuthoritySignal::OfficialWebsite);
        }
        if item.detailed_description.is_some() {
            signals.insert(AuthoritySignal::DetailedDescription);
        }
        if item.image.is_some() {
            signals.insert(AuthoritySignal::KnowledgeGraphImage);
        }
    }
    signals
}

fn is_wikipedia_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(u) => u
            .host_str()
            .map(|h| h == "wikipedia.org" || h.ends_with(".wikipedia.org"))
            .unwrap_or(false),
        Err(_) => raw.contains("wikipedia.org"),
    }
}

/// Lower-cased alphanumeric words of `text`; everything else separates words.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `phrase` occurs in the already split `haystack` as a contiguous run of words.
pub fn contains_phrase(haystack: &[String], phrase: &str) -> bool {
    let needle = words(phrase);
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Case-insensitive whole-word mention of `phrase` in `text`.
pub fn mentions(text: &str, phrase: &str) -> bool {
    contains_phrase(&words(text), phrase)
}

/// Split text into sentences for co-occurrence checks.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Rust is a language sponsored by Mozilla Research. It is often called \"the borrow checker language\" \
                        and is developed by the Rust Foundation (a nonprofit) with help from AWS (Amazon).";

    #[test]
    fn test_each_heuristic() {
        let caps = capitalized_phrases(TEXT);
        assert!(caps.contains(&"Mozilla Research".to_string()));
        assert!(caps.contains(&"Rust Foundation".to_string()));
        assert!(caps.contains(&"Amazon".to_string()));
        assert!(caps.contains(&"AWS".to_string()));

        assert_eq!(quoted_substrings(TEXT), vec!["the borrow checker language"]);
        assert_eq!(quoted_substrings("“Fearless Concurrency” motto"), vec!["Fearless Concurrency"]);
        assert_eq!(parenthetical_substrings(TEXT), vec!["a nonprofit", "Amazon"]);
    }

    #[test]
    fn test_short_candidates_dropped() {
        let out = extract_candidates("It (ab) \"xy\" Go and Zig");
        assert!(out.iter().all(|c| c.chars().count() > 2));
        assert!(out.contains(&"Zig".to_string()));
        assert!(!out.contains(&"It".to_string()));
        assert!(!out.contains(&"ab".to_string()));
    }

    #[test]
    fn test_dedupe_folds_and_caps() {
        let candidates = vec![
            "Mozilla".to_string(),
            "mozilla".to_string(),
            "Rust".to_string(),
            "  Cargo   Book ".to_string(),
            "".to_string(),
        ];
        let out = dedupe_related(candidates.clone(), "rust", 50);
        assert_eq!(out, vec!["mozilla", "cargo book"]);
        assert_eq!(out, dedupe_related(candidates, "rust", 50));

        let many = (0..80).map(|i| format!("Entity {}", i));
        let out = dedupe_related(many, "x", 50);
        assert_eq!(out.len(), 50);
        assert!(out.iter().all(|e| e == &e.to_lowercase() && !e.is_empty()));
    }

    #[test]
    fn test_categorization_is_total_and_ordered() {
        assert_eq!(categorize_type("Organization"), EntityCategory::Organizations);
        assert_eq!(categorize_type("SoftwareCompany"), EntityCategory::Organizations);
        assert_eq!(categorize_type("Person"), EntityCategory::People);
        assert_eq!(categorize_type("City"), EntityCategory::Places);
        assert_eq!(categorize_type("Thing"), EntityCategory::Concepts);
        assert_eq!(categorize_type("SoftwareApplication"), EntityCategory::Products);
        assert_eq!(categorize_type("SportsEvent"), EntityCategory::Events);
        assert_eq!(categorize_type("Xyzzy"), EntityCategory::Other);
        assert_eq!(categorize_type(""), EntityCategory::Other);
        // "company" outranks the products keyword "brand"
        assert_eq!(categorize_type("BrandCompany"), EntityCategory::Organizations);
    }

    #[test]
    fn test_authority_signals_once_each() {
        let items = vec![
            EntityItem {
                url: Some("https://www.rust-lang.org".into()),
                detailed_description: Some("Rust is...".into()),
                detailed_description_url: Some("https://en.wikipedia.org/wiki/Rust".into()),
                ..Default::default()
            },
            EntityItem {
                url: Some("https://example.com".into()),
                image: Some("https://img.example/a.png".into()),
                ..Default::default()
            },
        ];
        let signals = authority_signals(&items);
        assert_eq!(signals.len(), 4);

        let bare = authority_signals(&[EntityItem::default()]);
        assert!(bare.is_empty());

        // no item URL, but an article link and an image are still URLs
        let no_site = authority_signals(&[EntityItem {
            detailed_description_url: Some("https://en.wikipedia.org/wiki/Rust".into()),
            image: Some("https://img.example/rust.png".into()),
            ..Default::default()
        }]);
        assert!(no_site.contains(&AuthoritySignal::WikipediaPresence));
        assert!(no_site.contains(&AuthoritySignal::KnowledgeGraphImage));
        assert!(no_site.contains(&AuthoritySignal::OfficialWebsite));

        let fake = authority_signals(&[EntityItem {
            url: Some("https://notwikipedia.org.evil.com/".into()),
            ..Default::default()
        }]);
        assert!(!fake.contains(&AuthoritySignal::WikipediaPresence));
        assert!(fake.contains(&AuthoritySignal::OfficialWebsite));
    }

    #[test]
    fn test_capitalized_phrases_beyond_ascii() {
        let caps = capitalized_phrases("Founded by McDonald with NASA support in Zürich Österreich.");
        assert!(caps.contains(&"McDonald".to_string()));
        assert!(caps.contains(&"NASA".to_string()));
        assert!(caps.contains(&"Zürich Österreich".to_string()));
        assert!(!caps.iter().any(|c| c.contains("with")));
    }

    #[test]
    fn test_mentions_whole_words_only() {
        assert!(!mentions("Rust was created years ago by Graydon Hoare.", "go"));
        assert!(!mentions("javascript vs rust", "java"));
        assert!(mentions("Java vs Rust", "java"));
        assert!(mentions("written by Graydon  Hoare.", "graydon hoare"));
        assert!(mentions("the rust-foundation site", "rust foundation"));
        assert!(!mentions("anything", ""));
        assert!(!mentions("graydon", "graydon hoare"));
    }

    #[test]
    fn test_sentences() {
        assert_eq!(sentences("A b. C d!\nE?"), vec!["A b", "C d", "E"]);
    }
}
