//! Rescue Alert Telemetry
//!
//! Consumers of the audit batches the policy engine emits.
//!
//! Provides:
//! - Schema validation of audit events and audit batches
//! - Hash-chained audit trails for tamper detection
//! - Evaluation and suppression metrics

pub mod audit;
pub mod metrics;
pub mod schema;

pub use audit::{verify_records, AuditTrail, ChainBreak, ChainedRecord};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use schema::{validate_audit_event, validate_audit_stream, validate_decision, SchemaViolation};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditTrail, ChainedRecord};
    pub use crate::metrics::MetricsCollector;
    pub use crate::schema::{validate_audit_event, validate_audit_stream, validate_decision, SchemaViolation};
}
