//! Shared types for TicketPilot: configuration, the error type, structured
//! trace events, and the conversation value types every crate speaks.

pub mod config;
pub mod conversation;
pub mod error;
pub mod trace;
