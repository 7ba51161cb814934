//! Per-ticket conversation state.
//!
//! One [`Conversation`] exists per active ticket channel. The store is
//! in-memory; an optional JSON snapshot lets a restart pick up where the
//! previous process stopped.

pub mod conversation;
pub mod sentiment;
pub mod store;

pub use conversation::{Conversation, ConversationSummary, EscalationRecord, NewConversation};
pub use sentiment::{SentimentTemperature, SentimentTrend};
pub use store::ConversationStore;
