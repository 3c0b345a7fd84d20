mod debounce;
mod preprocess;

pub use debounce::{DebounceSnapshot, Debouncer};
pub use preprocess::{classify, Classification, Halt, Preprocessor};
