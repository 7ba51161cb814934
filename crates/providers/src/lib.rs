pub mod openai_compat;
pub mod router;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ModelRouter, RoutingDecision};
pub use traits::{ChatRequest, ChatResponse, LlmProvider, Message, MessageRole, Usage};
