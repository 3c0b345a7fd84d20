mod adapter;
mod command;
mod llm;

pub use adapter::{ChatAdapter, RecordingAdapter, SentMessage};
pub use command::{CommandDispatcher, NullDispatcher};
pub use llm::{ChatClient, ProviderChat};
