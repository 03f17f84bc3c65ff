use mockito::Matcher;
use trendscope::llm::remote::RemoteLlmProvider;
use trendscope::llm::suggestions::suggest_related_entities;
use trendscope::llm::{LlmProvider, LlmRequest, SuggestionService};

fn completion(content: &str) -> String {
    serde_json::json!({
        "model": "gpt-4o-mini",
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
    .to_string()
}

#[tokio::test]
async fn test_remote_provider_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer fake-api-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("This is a test response"))
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o-mini");

    let request = LlmRequest {
        prompt: "Test prompt".to_string(),
        max_tokens: Some(100),
        temperature: Some(0.7),
        timeout_seconds: Some(10),
    };

    let response = provider.generate(request).await.unwrap();
    assert_eq!(response.content, "This is a test response");
    assert_eq!(response.model, "gpt-4o-mini");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_provider_defaults_reach_the_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "local-model",
            "max_tokens": 120,
            "temperature": 0.3
        })))
        .with_status(200)
        .with_body(completion("Cargo"))
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "k", "local-model").with_max_tokens(120);
    assert_eq!(provider.suggest("Rust").await.unwrap(), "Cargo");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_usage_is_tolerated() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "k", "local-model");
    let text = provider.suggest("anything").await.unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_suggestions_through_remote_provider() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::Regex("Rust".to_string()))
        .with_status(200)
        .with_body(completion("1. Mozilla\n- Cargo\n\n* Tokio\nServo"))
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "k", "gpt-4o-mini");
    let names = suggest_related_entities(&provider, "Rust", &["ProgrammingLanguage".to_string()], 3).await;
    assert_eq!(names, vec!["Mozilla", "Cargo", "Tokio"]);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_error_status() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(401)
        .with_body(r#"{"error": "invalid api key"}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "bad-key", "gpt-4o-mini");

    let err = provider.suggest("Test prompt").await.unwrap_err();
    assert!(err.to_string().contains("401"));

    // callers asking for entities get nothing rather than an error
    let names = suggest_related_entities(&provider, "Rust", &[], 20).await;
    assert!(names.is_empty());
}
