//! Engine error types. Cancellation is not an error — the send pipeline
//! reports it through `SendOutcome`.

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed event, dropped at preprocessing.
    #[error("invalid event: {0}")]
    Validation(String),

    /// LLM call failed; the conversational turn is skipped, nothing is
    /// committed and no retry is scheduled at this layer.
    #[error(transparent)]
    Llm(#[from] banter_llm::LlmError),

    /// Platform adapter refused a send; remaining segments are aborted.
    #[error("adapter send failed: {0}")]
    Send(String),
}
