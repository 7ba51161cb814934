//! `tp-gateway`: the TicketPilot server.
//!
//! [`runtime`] holds the conversation orchestrator and its services,
//! [`api`] the axum surface the chat platform connector talks to.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
