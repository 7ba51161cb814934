//! System prompt assembly for ticket conversations.

pub mod builder;
pub mod injection;
pub mod report;
pub mod truncation;

pub use builder::{PromptInputs, PromptPackBuilder};
pub use report::{PromptReport, SectionKind, SectionReport};
