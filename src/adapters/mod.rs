pub mod anthropic;
pub mod llm;
pub mod openai;

pub use anthropic::AnthropicBackend;
pub use llm::{create_backend, BackendConfig, BackendError, ReviewBackend};
pub use openai::OpenAiBackend;
