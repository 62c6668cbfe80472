//! Rescue Alert CLI
//!
//! Offline evaluation and replay of a case's event log, for audits and
//! incident review.

pub mod commands;
pub mod config;

pub use commands::{audit_schemas, evaluate_log, replay_log, ReplayReport};
pub use config::Overrides;
