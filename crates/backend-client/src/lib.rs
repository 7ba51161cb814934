//! `tp-backend`: client for the support backend that owns tickets, the
//! team directory, knowledge bases, memories and the task/reminder sinks.
//!
//! The orchestrator only sees the [`SupportBackend`] trait. The shipped
//! implementation is [`RestSupportBackend`], a `reqwest` client with retry
//! and exponential back-off on transient failures. [`InMemoryBackend`]
//! stands in when no backend is configured.

pub mod backend;
pub mod memory;
pub mod rest;
pub mod types;

pub use backend::SupportBackend;
pub use memory::{InMemoryBackend, SinkLog};
pub use rest::{from_reqwest, RestSupportBackend};
pub use types::{
    DaySummaryRecord, EscalationLevel, EscalationRequest, HistoryMessage, MemoryRequest,
    ModelSpend, ReminderRequest, RenameRequest, TaskRequest, TaskSpend, TeamMember,
    TicketCostRecord,
};
