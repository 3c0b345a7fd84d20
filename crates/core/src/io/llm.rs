use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use banter_llm::{ChatMessage, CompletionRequest, LlmError, LlmProvider};

/// What the reply pipeline needs from a model: messages in, text out.
/// No retries at this layer.
pub trait ChatClient: Send + Sync {
    fn chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + '_>>;
}

/// [`ChatClient`] over any [`LlmProvider`], with fixed sampling settings
/// tuned for short conversational replies.
pub struct ProviderChat {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
    temperature: f32,
}

impl ProviderChat {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_tokens: 512,
            temperature: 0.8,
        }
    }
}

impl ChatClient for ProviderChat {
    fn chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + '_>> {
        let request = CompletionRequest {
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        Box::pin(async move {
            let response = self.provider.complete(request).await?;
            Ok(response.content)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_llm::MockProvider;

    #[tokio::test]
    async fn provider_chat_returns_text() {
        let chat = ProviderChat::new(Arc::new(MockProvider::new("嗯嗯")));
        let reply = chat.chat(vec![ChatMessage::user("在吗")]).await.unwrap();
        assert_eq!(reply, "嗯嗯");
    }

    #[tokio::test]
    async fn provider_chat_propagates_failure() {
        let chat = ProviderChat::new(Arc::new(MockProvider::failing("down")));
        assert!(chat.chat(vec![ChatMessage::user("在吗")]).await.is_err());
    }
}
