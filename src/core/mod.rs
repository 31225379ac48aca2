pub mod orchestrator;
pub mod parser;
pub mod patch;
pub mod prompt;
pub mod publisher;
pub mod walker;

pub use orchestrator::{FileOutcome, Orchestrator, RunReport};
pub use parser::{ReviewItem, ReviewResult};
pub use publisher::CommentPublisher;
