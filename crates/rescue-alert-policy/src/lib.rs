//! Rescue Alert Policy Engine
//!
//! Event-sourced decision engine for emergency pet-rescue alerts.
//!
//! Given the ordered event log of a case, the engine:
//! - Folds events into an alert projection (incrementally or by replay)
//! - Decides which requested channels are eligible, failing closed on ambiguity
//! - Emits an ordered audit batch with one reason code per suppressed channel

pub mod audit;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod event;
pub mod projection;
pub mod replay;
pub mod request;

pub use audit::{AuditEvent, PredictedIneligibility};
pub use config::EngineConfig;
pub use engine::PolicyEngine;
pub use evaluator::{evaluate, idempotency_key, suppression_reason, Decision, Evaluator, EvaluatorOptions};
pub use event::MemoryEvent;
pub use projection::{apply_event, AlertProjection, HumanReview, ProjectionBuilder};
pub use replay::{replay, replay_with_digest, verify_replay};
pub use request::{request_from_events, EvaluateRequest, RequestField, Resolution, ValidatedRequest};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::AuditEvent;
    pub use crate::config::EngineConfig;
    pub use crate::engine::PolicyEngine;
    pub use crate::evaluator::{evaluate, Decision, Evaluator};
    pub use crate::event::MemoryEvent;
    pub use crate::projection::{AlertProjection, ProjectionBuilder};
    pub use crate::replay::{replay, verify_replay};
    pub use crate::request::{request_from_events, EvaluateRequest};
}
