// Related-entity suggestions
use tracing::{info, warn};

use super::SuggestionService;

/// Ask the suggestion service for entities related to `entity_name`.
///
/// Any failure yields an empty list: suggestions only ever add candidates to a
/// mapping, they never make it fail.
pub async fn suggest_related_entities<S: SuggestionService + ?Sized>(
    service: &S,
    entity_name: &str,
    entity_types: &[String],
    limit: usize,
) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let prompt = related_entities_prompt(entity_name, entity_types, limit);
    match service.suggest(&prompt).await {
        Ok(text) => {
            let candidates = parse_suggestion_lines(&text, limit);
            info!(entity = %entity_name, count = candidates.len(), "suggestion service returned related entities");
            candidates
        }
        Err(e) => {
            warn!(entity = %entity_name, "suggestion service failed: {:#}, continuing without suggestions", e);
            Vec::new()
        }
    }
}

fn related_entities_prompt(entity_name: &str, entity_types: &[String], limit: usize) -> String {
    let types = if entity_types.is_empty() {
        "unknown".to_string()
    } else {
        entity_types.join(", ")
    };
    format!(
        "List up to {limit} named entities (organizations, people, places, products, concepts or events) \
         that are closely related to \"{entity_name}\" (types: {types}).\n\
         Return one entity name per line, without numbering or commentary."
    )
}

/// Split a newline-delimited answer into trimmed candidates, dropping list
/// markers and blank lines, keeping at most `limit`.
pub fn parse_suggestion_lines(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);

    // "1. Foo" / "12) Foo"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim();
        }
    }
    line.trim()
}
