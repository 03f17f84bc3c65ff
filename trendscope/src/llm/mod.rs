use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Core trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Free-text suggestion capability: a prompt in, newline-delimited candidates out.
///
/// Every `LlmProvider` is a suggestion service; tests can also implement this
/// directly without going through the request/response types.
#[async_trait::async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(&self, prompt: &str) -> Result<String>;
}

#[async_trait::async_trait]
impl<T: LlmProvider + ?Sized> SuggestionService for T {
    async fn suggest(&self, prompt: &str) -> Result<String> {
        let response = self
            .generate(LlmRequest {
                prompt: prompt.to_string(),
                max_tokens: None,
                temperature: None,
                timeout_seconds: None,
            })
            .await?;
        Ok(response.content)
    }
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
}

pub mod remote;
pub mod suggestions;

const DEFAULT_LLM_URL: &str = "http://localhost:11434/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Build the suggestion service selected by `[llm] adapter`.
///
/// `Ok(None)` means suggestions are switched off (`adapter = "none"` or no
/// adapter). A remote adapter without its API key variable is an error.
pub fn create_suggestion_service(llm_config: &common::LlmConfig) -> Result<Option<Arc<dyn SuggestionService>>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("none");
    match adapter {
        "remote" => {
            let remote = llm_config
                .remote
                .as_ref()
                .context("Remote adapter selected but no [llm.remote] section found")?;
            let api_key = common::api_key_from_env(remote.api_key_env.as_deref())?
                .context("Missing api_key_env in [llm.remote]")?;

            let mut provider = remote::RemoteLlmProvider::new(
                remote.api_url.as_deref().unwrap_or(DEFAULT_LLM_URL),
                api_key,
                remote.model.as_deref().unwrap_or(DEFAULT_MODEL),
            );
            if let Some(secs) = remote.timeout_seconds {
                provider = provider.with_timeout(secs);
            }
            if let Some(max_tokens) = remote.max_tokens {
                provider = provider.with_max_tokens(max_tokens);
            }
            info!(model = %provider.model(), "LLM suggestion service initialized");
            Ok(Some(Arc::new(provider)))
        }
        "none" => Ok(None),
        other => anyhow::bail!("Unknown LLM adapter type: {}", other),
    }
}
