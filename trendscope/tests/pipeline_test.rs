use mockito::{Matcher, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use trendscope::adapters::{EntityLookupAdapter, HttpEntityLookup, HttpSearchInterest, TrendAdapter};
use trendscope::gaps::{GapPriority, GapSource};
use trendscope::llm::remote::RemoteLlmProvider;
use trendscope::llm::SuggestionService;
use trendscope::pipeline::{AnalysisSection, EcosystemAnalyzer};
use trendscope::relationships::RelationshipMapper;
use trendscope::trend::Timeframe;

const KG_BODY: &str = r#"{
    "itemListElement": [{
        "result": {
            "name": "Rust",
            "@type": ["Thing", "ProgrammingLanguage"],
            "detailedDescription": {
                "articleBody": "Rust is sponsored by Mozilla Research. The Rust Foundation supports Cargo.",
                "url": "https://en.wikipedia.org/wiki/Rust_(programming_language)"
            },
            "url": "https://www.rust-lang.org"
        }
    }]
}"#;

const INTEREST_BODY: &str = r#"{
    "interest_over_time": [
        {"date": "2024-01-01", "values": {"Rust": 20, "mozilla research": 5, "the rust foundation": 3, "cargo": 8, "tokio": 1}},
        {"date": "2024-01-02", "values": {"Rust": 22, "mozilla research": 5, "the rust foundation": 3, "cargo": 8, "tokio": 2}},
        {"date": "2024-01-03", "values": {"Rust": 60, "mozilla research": 10, "the rust foundation": 9, "cargo": 8, "tokio": 4}},
        {"date": "2024-01-04", "values": {"Rust": 70, "mozilla research": 12, "the rust foundation": 9, "cargo": 8, "tokio": 8}}
    ],
    "interest_by_region": []
}"#;

async fn mock_services(server: &mut ServerGuard) {
    server
        .mock("GET", "/kg")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(KG_BODY)
        .create_async()
        .await;
    server
        .mock("GET", "/trends/interest")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(INTEREST_BODY)
        .create_async()
        .await;
    server
        .mock("GET", "/trends/related_queries")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"top": [{"query": "rust mozilla research", "value": 100}],
                "rising": [{"query": "rust embedded", "value": 300}, {"query": "tokio", "value": 120}]}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/trends/related_topics")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"top": [{"topic_title": "Cargo tokio", "value": 80}], "rising": []}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/llm")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Tokio\n- Cargo\nServo"}}]
            })
            .to_string(),
        )
        .create_async()
        .await;
}

fn analyzer(base: &str, with_llm: bool) -> EcosystemAnalyzer {
    let lookup = HttpEntityLookup::new(&format!("{}/kg", base), None, 5).unwrap();
    let interest = HttpSearchInterest::new(&format!("{}/trends", base), None, 5)
        .unwrap()
        .with_retries(1);
    let suggestions: Option<Arc<dyn SuggestionService>> = if with_llm {
        Some(Arc::new(RemoteLlmProvider::new(format!("{}/llm", base), "k", "test-model")))
    } else {
        None
    };

    let mapper = RelationshipMapper::new(EntityLookupAdapter::new(Arc::new(lookup), 5), suggestions);
    let trends = TrendAdapter::new(Arc::new(interest), Duration::ZERO);
    EcosystemAnalyzer::new(mapper, trends).with_timeframes(vec![Timeframe::Last7Days])
}

#[tokio::test]
async fn test_ecosystem_analysis_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    mock_services(&mut server).await;

    let analysis = analyzer(&server.url(), true)
        .analyze_entity_ecosystem("Rust", &[])
        .await
        .unwrap();

    assert_eq!(
        analysis.entity.related_entities(),
        &["mozilla research", "the rust foundation", "cargo", "tokio", "servo"]
    );
    // topic plus the first four related entities
    assert_eq!(analysis.trend_series.len(), 5);
    assert!(analysis.missing_sections.is_empty());

    // "tokio" is already a related entity, so only "rust embedded" is a query gap
    let trending: Vec<&str> = analysis
        .gaps
        .iter()
        .filter(|g| g.source == GapSource::Trending)
        .map(|g| g.description.as_str())
        .collect();
    assert!(trending[0].contains("rust embedded"));
    assert!(trending.iter().any(|d| d.contains("'Rust'")));
    assert!(trending.iter().any(|d| d.contains("'tokio'")));
    assert!(!trending.iter().any(|d| d.contains("'cargo'")));

    assert_eq!(analysis.gaps[0].priority, GapPriority::Urgent);
    assert!(analysis.gaps.windows(2).all(|w| w[0].priority <= w[1].priority));
    assert_eq!(analysis.relationship_matrix.strength("cargo", "tokio"), 0.5);
    assert_eq!(analysis.strategy.gap_count(), analysis.gaps.len());
    assert_eq!(
        analysis.strategy.recommended_strategy.to_string(),
        "capitalize_on_momentum"
    );

    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["topic"], "Rust");
    assert!(json["strategy"]["phases"].as_array().unwrap().len() == 3);
}

#[tokio::test]
async fn test_analysis_without_suggestions_or_services() {
    // nothing is listening on these paths: every call gets a 501 from mockito
    let server = mockito::Server::new_async().await;
    let analysis = analyzer(&server.url(), false)
        .analyze_entity_ecosystem("Rust", &["Go".to_string()])
        .await
        .unwrap();

    assert!(analysis.entity.related_entities().is_empty());
    assert!(analysis.missing_sections.contains(&AnalysisSection::KnowledgeGraph));
    assert!(analysis.missing_sections.contains(&AnalysisSection::TrendSeries));
    assert!(analysis.missing_sections.contains(&AnalysisSection::Competitors));
    assert!(analysis.gaps.iter().all(|g| g.source == GapSource::KnowledgeGraph));
}
