use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;
use trendscope::adapters::{
    EntityLookupAdapter, EntityLookupService, HttpEntityLookup, HttpSearchInterest, SearchInterestService,
    TrendAdapter,
};
use trendscope::trend::{Timeframe, TrendDirection};
use trendscope::PipelineError;

const KG_BODY: &str = r#"{
    "itemListElement": [{
        "result": {
            "name": "Rust",
            "@type": ["Thing", "ProgrammingLanguage"],
            "description": "Programming language",
            "detailedDescription": {
                "articleBody": "Rust is a language sponsored by Mozilla Research.",
                "url": "https://en.wikipedia.org/wiki/Rust_(programming_language)"
            },
            "url": "https://www.rust-lang.org"
        },
        "resultScore": 512.0
    }]
}"#;

#[tokio::test]
async fn test_entity_lookup_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/kg")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "Rust".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
            Matcher::UrlEncoded("key".into(), "secret".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(KG_BODY)
        .create_async()
        .await;

    let http = HttpEntityLookup::new(&format!("{}/kg", server.url()), Some("secret".into()), 5).unwrap();
    let adapter = EntityLookupAdapter::new(Arc::new(http), 10);
    let result = adapter.lookup("Rust").await;

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].types, vec!["Thing", "ProgrammingLanguage"]);
    assert_eq!(result.items[0].url.as_deref(), Some("https://www.rust-lang.org"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_entity_lookup_auth_failure_is_no_data() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/kg")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error": {"code": 403}}"#)
        .expect(1)
        .create_async()
        .await;

    let http = HttpEntityLookup::new(&format!("{}/kg", server.url()), None, 5)
        .unwrap()
        .with_retries(3);
    // the raw service reports the error; 4xx is never retried
    assert!(http.lookup("Rust", 10).await.is_err());
    mock.assert_async().await;

    let adapter = EntityLookupAdapter::new(Arc::new(http), 10);
    assert!(adapter.lookup("Rust").await.is_empty());
}

#[tokio::test]
async fn test_interest_series_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/trends/interest")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("keywords".into(), "rust,go".into()),
            Matcher::UrlEncoded("timeframe".into(), "today 3-m".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{
                "interest_over_time": [
                    {"date": "2024-03-01", "values": {"rust": 10, "go": 60}},
                    {"date": "2024-03-02", "values": {"rust": 12, "go": 58}},
                    {"date": "2024-03-03T00:00:00Z", "values": {"rust": 40, "go": 20}},
                    {"date": "not a date", "values": {"rust": 99, "go": 99}},
                    {"date": "2024-03-04", "values": {"rust": 44, "go": 22}}
                ],
                "interest_by_region": [{"geo": "DE", "values": {"rust": 100, "go": 40}}]
            }"#,
        )
        .create_async()
        .await;

    let http = HttpSearchInterest::new(&format!("{}/trends", server.url()), None, 5).unwrap();
    let adapter = TrendAdapter::new(Arc::new(http), Duration::ZERO);
    let series = adapter
        .fetch_series(&["rust".to_string(), "go".to_string()], Timeframe::Last90Days)
        .await
        .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].keyword(), "rust");
    assert_eq!(series[0].interest_over_time().len(), 4);
    assert_eq!(series[0].direction(), TrendDirection::Rising);
    assert_eq!(series[1].direction(), TrendDirection::Falling);
    assert_eq!(series[0].interest_by_region().get("DE"), Some(&100.0));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_related_terms_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _queries = server
        .mock("GET", "/trends/related_queries")
        .match_query(Matcher::UrlEncoded("keyword".into(), "rust".into()))
        .with_status(200)
        .with_body(r#"{"top": [{"query": "rust tutorial", "value": 100}], "rising": [{"query": "rust 2024", "value": 250}]}"#)
        .create_async()
        .await;
    let _topics = server
        .mock("GET", "/trends/related_topics")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let http = HttpSearchInterest::new(&format!("{}/trends/", server.url()), None, 5).unwrap();
    let queries = http.related_queries("rust").await.unwrap();
    assert_eq!(queries.top[0].term, "rust tutorial");
    assert_eq!(queries.rising[0].value, 250.0);

    let adapter = TrendAdapter::new(Arc::new(http), Duration::ZERO);
    assert!(adapter.related_topics("rust").await.is_empty());
}

#[tokio::test]
async fn test_server_error_degrades_to_empty_series() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/trends/interest")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let http = HttpSearchInterest::new(&format!("{}/trends", server.url()), None, 5)
        .unwrap()
        .with_retries(1);
    let adapter = TrendAdapter::new(Arc::new(http), Duration::ZERO);
    let series = adapter.fetch_series(&["rust".to_string()], Timeframe::LastYear).await.unwrap();

    assert_eq!(series.len(), 1);
    assert!(series[0].is_empty());
    assert_eq!(series[0].direction(), TrendDirection::Unknown);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let mut server = mockito::Server::new_async().await;
    // created first, so it answers the first request and then steps aside
    let unavailable = server
        .mock("GET", "/trends/related_queries")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let recovered = server
        .mock("GET", "/trends/related_queries")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"top": [{"query": "rust async", "value": 90}], "rising": []}"#)
        .expect(1)
        .create_async()
        .await;

    let http = HttpSearchInterest::new(&format!("{}/trends", server.url()), None, 5)
        .unwrap()
        .with_retries(3)
        .with_backoff(Duration::from_millis(10));
    let queries = http.related_queries("rust").await.unwrap();

    assert_eq!(queries.top.len(), 1);
    assert_eq!(queries.top[0].term, "rust async");
    assert_eq!(queries.top[0].value, 90.0);
    unavailable.assert_async().await;
    recovered.assert_async().await;
}

#[tokio::test]
async fn test_rate_limited_lookup_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let limited = server
        .mock("GET", "/kg")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/kg")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(KG_BODY)
        .expect(1)
        .create_async()
        .await;

    let http = HttpEntityLookup::new(&format!("{}/kg", server.url()), None, 5)
        .unwrap()
        .with_retries(2)
        .with_backoff(Duration::from_millis(10));
    let result = http.lookup("Rust", 1).await.unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].name.as_deref(), Some("Rust"));
    limited.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_keyword_limits_fail_fast() {
    let server = mockito::Server::new_async().await;
    let http = HttpSearchInterest::new(&server.url(), None, 5).unwrap();
    let adapter = TrendAdapter::new(Arc::new(http), Duration::ZERO);

    let err = adapter.fetch_series(&[], Timeframe::LastDay).await.unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));

    let six: Vec<String> = (0..6).map(|i| format!("kw{}", i)).collect();
    let err = adapter.fetch_series(&six, Timeframe::LastDay).await.unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));
}
