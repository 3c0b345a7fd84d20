use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::error::EngineError;

/// Outbound surface toward a chat platform. Implementations must be safe
/// to call concurrently across sessions; `reply_to` uses the platform's
/// native quote mechanism when available.
pub trait ChatAdapter: Send + Sync {
    fn send_text(
        &self,
        group_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + '_>>;
}

/// One delivered message, as seen by the recording adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub group_id: String,
    pub text: String,
    pub reply_to: Option<String>,
}

/// Test adapter that records every send; can be told to fail after a
/// number of successful sends.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    sent: Mutex<Vec<SentMessage>>,
    fail_after: Mutex<Option<usize>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send once `n` have succeeded.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl ChatAdapter for RecordingAdapter {
    fn send_text(
        &self,
        group_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + '_>> {
        let message = SentMessage {
            group_id: group_id.to_owned(),
            text: text.to_owned(),
            reply_to: reply_to.map(str::to_owned),
        };
        Box::pin(async move {
            let mut sent = self.sent.lock().unwrap();
            if let Some(limit) = *self.fail_after.lock().unwrap()
                && sent.len() >= limit
            {
                return Err(EngineError::Send("adapter closed".into()));
            }
            sent.push(message);
            Ok(())
        })
    }
}
