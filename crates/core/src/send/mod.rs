mod pipeline;
mod utterance;

pub use pipeline::{SendOutcome, SendPipeline};
pub use utterance::{plan_utterances, UtterancePlan, UtteranceSegment};
