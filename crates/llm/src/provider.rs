use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// LLM completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("all providers exhausted")]
    AllProvidersExhausted,
}

/// Trait for LLM providers (OpenAI, Claude, Gemini, etc.)
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Mock provider for testing — returns a fixed response, or a fixed error.
#[derive(Debug, Clone)]
pub struct MockProvider {
    response: Result<String, String>,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: Ok(response.into()) }
    }

    /// Create a mock that always fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { response: Err(message.into()) }
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        let response = self.response.clone();
        Box::pin(async move {
            match response {
                Ok(content) => Ok(CompletionResponse {
                    content,
                    input_tokens: 10,
                    output_tokens: 20,
                }),
                Err(message) => Err(LlmError::RequestFailed(message)),
            }
        })
    }
}

/// LLM router — routes requests to available providers with fallback.
/// Tracks per-provider failure counts; 3 consecutive failures → unavailable.
/// The conversation engine performs no retries of its own; this is the only
/// fallback layer in the stack.
pub struct LlmRouter {
    providers: Vec<Box<dyn LlmProvider>>,
    fail_counts: Vec<u32>,
}

impl LlmRouter {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        let len = providers.len();
        Self {
            providers,
            fail_counts: vec![0; len],
        }
    }

    /// True if at least one provider is available.
    pub fn is_available(&self) -> bool {
        self.fail_counts.iter().any(|&c| c < 3)
    }

    /// Send a completion request, trying providers in priority order.
    pub async fn complete(
        &mut self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        for (i, provider) in self.providers.iter().enumerate() {
            if self.fail_counts[i] >= 3 {
                continue;
            }

            match provider.complete(request.clone()).await {
                Ok(response) => {
                    self.fail_counts[i] = 0;
                    return Ok(response);
                }
                Err(e) => {
                    self.fail_counts[i] += 1;
                    tracing::warn!(
                        provider = provider.name(),
                        fail_count = self.fail_counts[i],
                        error = %e,
                        "LLM provider failed"
                    );
                }
            }
        }

        Err(LlmError::AllProvidersExhausted)
    }

    /// Reset failure count for a provider (called by periodic health probe).
    pub fn reset_provider(&mut self, index: usize) {
        if let Some(count) = self.fail_counts.get_mut(index) {
            *count = 0;
        }
    }
}
