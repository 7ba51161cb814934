//! Conversation runtime: the orchestrator and the services it drives.
//!
//! Entry point: [`Orchestrator::spawn_event`] takes one inbound platform
//! event and returns the outbound actions the adapter should perform.

pub mod actions;
pub mod budget;
pub mod conversation_lock;
pub mod dispatch;
pub mod escalation;
pub mod events;
pub mod governed;
pub mod intent;
pub mod knowledge;
pub mod memory;
pub mod orchestrator;
pub mod reply;

pub use events::{InboundEvent, OutboundAction};
pub use orchestrator::{Orchestrator, OrchestratorDeps};
