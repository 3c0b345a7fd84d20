mod context;
mod pipeline;
mod prompt;
mod style;

pub use context::{build_context, ContextMeta, ReplyContext};
pub use pipeline::{PreparedReply, ReplyOutcome, ReplyPipeline};
pub use prompt::{build_messages, flatten_messages};
pub use style::{derive_style, DynamicStyle};
