//! Audit events emitted by an evaluation

use rescue_alert_core::{GeofenceSnapshot, ReasonCode, Tier};
use serde::{Deserialize, Serialize};

/// Channel expected to be ineligible, listed on `policy_evaluated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedIneligibility {
    pub channel: String,
    pub reason_code: ReasonCode,
}

/// One immutable entry of an evaluation's audit batch
///
/// `tier`, `geofence_snapshot` and identifying strings come from the request.
/// When the request was ambiguous the unparseable parts are written as
/// `null` (or an empty string for text) so the refusal is still recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// Exactly one per evaluation, always first
    PolicyEvaluated {
        decision_id: String,
        policy_version_hash: String,
        tier: Option<Tier>,
        geofence_snapshot: Option<GeofenceSnapshot>,
        eligible_channels: Vec<String>,
        evaluation_timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        predicted_ineligibility: Option<Vec<PredictedIneligibility>>,
    },

    /// One per eligible channel
    AlertEmitted {
        decision_id: String,
        policy_version_hash: String,
        channel: String,
        audience_segment: String,
        geofence_snapshot: GeofenceSnapshot,
        ttl_seconds: u64,
        per_recipient_caps_applied: bool,
        idempotency_key: String,
    },

    /// One per suppressed channel
    AlertSuppressed {
        decision_id: String,
        policy_version_hash: String,
        case_id: String,
        channel: String,
        geofence_snapshot: Option<GeofenceSnapshot>,
        evaluation_timestamp: String,
        reason_code: ReasonCode,
    },
}

impl AuditEvent {
    /// Wire discriminator of this event
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::PolicyEvaluated { .. } => "policy_evaluated",
            AuditEvent::AlertEmitted { .. } => "alert_emitted",
            AuditEvent::AlertSuppressed { .. } => "alert_suppressed",
        }
    }

    pub fn decision_id(&self) -> &str {
        match self {
            AuditEvent::PolicyEvaluated { decision_id, .. }
            | AuditEvent::AlertEmitted { decision_id, .. }
            | AuditEvent::AlertSuppressed { decision_id, .. } => decision_id,
        }
    }

    /// Channel this event concerns, if any
    pub fn channel(&self) -> Option<&str> {
        match self {
            AuditEvent::PolicyEvaluated { .. } => None,
            AuditEvent::AlertEmitted { channel, .. } | AuditEvent::AlertSuppressed { channel, .. } => {
                Some(channel)
            }
        }
    }

    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            AuditEvent::AlertSuppressed { reason_code, .. } => Some(*reason_code),
            _ => None,
        }
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        match self {
            AuditEvent::AlertEmitted {
                idempotency_key, ..
            } => Some(idempotency_key),
            _ => None,
        }
    }
}
