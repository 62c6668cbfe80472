//! Domain events of the per-case event log

use rescue_alert_core::Result;
use serde::{Deserialize, Serialize};

use crate::request::EvaluateRequest;

/// One entry of the append-only, totally ordered event log of a case
///
/// Each kind has exactly one projection update rule. Unrecognized `type`
/// values deserialize to [`MemoryEvent::Unknown`] and are skipped by folds so
/// newer writers never break older readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum MemoryEvent {
    /// Request to evaluate alert eligibility
    EvaluateRequested(EvaluateRequest),

    /// Recipient consent given for a channel and audience segment
    ConsentGranted {
        channel: String,
        audience_segment: String,
    },

    /// Recipient consent withdrawn
    ConsentRevoked {
        channel: String,
        audience_segment: String,
    },

    /// Delivery partner contract turned on or off
    PartnerContractChanged {
        channel: String,
        audience_segment: String,
        active: bool,
    },

    /// Channel throttled until an ISO-8601 instant
    RateLimitSet {
        channel: String,
        audience_segment: String,
        until: String,
    },

    /// Throttle lifted
    RateLimitCleared {
        channel: String,
        audience_segment: String,
    },

    /// Recipient paused all alerts
    UserPaused,

    /// Recipient resumed alerts
    UserResumed,

    /// Human review required before alerting
    HumanReviewFlagged {
        /// Channels the review applies to; empty means every channel
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        channels: Vec<String>,
    },

    /// Human review completed
    HumanReviewCleared,

    FraudSignalRaised,
    FraudSignalCleared,
    LowConfidenceFlagged,
    LowConfidenceCleared,

    /// Alert needs an escalation proof before it may go out
    EscalationProofRequired,

    /// Escalation proof provided
    EscalationProofAttached,

    /// Event kind this version does not know
    #[serde(other)]
    Unknown,
}

impl MemoryEvent {
    /// Wire discriminator of this event
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryEvent::EvaluateRequested(_) => "evaluate_requested",
            MemoryEvent::ConsentGranted { .. } => "consent_granted",
            MemoryEvent::ConsentRevoked { .. } => "consent_revoked",
            MemoryEvent::PartnerContractChanged { .. } => "partner_contract_changed",
            MemoryEvent::RateLimitSet { .. } => "rate_limit_set",
            MemoryEvent::RateLimitCleared { .. } => "rate_limit_cleared",
            MemoryEvent::UserPaused => "user_paused",
            MemoryEvent::UserResumed => "user_resumed",
            MemoryEvent::HumanReviewFlagged { .. } => "human_review_flagged",
            MemoryEvent::HumanReviewCleared => "human_review_cleared",
            MemoryEvent::FraudSignalRaised => "fraud_signal_raised",
            MemoryEvent::FraudSignalCleared => "fraud_signal_cleared",
            MemoryEvent::LowConfidenceFlagged => "low_confidence_flagged",
            MemoryEvent::LowConfidenceCleared => "low_confidence_cleared",
            MemoryEvent::EscalationProofRequired => "escalation_proof_required",
            MemoryEvent::EscalationProofAttached => "escalation_proof_attached",
            MemoryEvent::Unknown => "unknown",
        }
    }

    /// Parse a JSON array of events
    pub fn parse_log(json: &str) -> Result<Vec<MemoryEvent>> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn consent_granted(channel: impl Into<String>, audience_segment: impl Into<String>) -> Self {
        MemoryEvent::ConsentGranted {
            channel: channel.into(),
            audience_segment: audience_segment.into(),
        }
    }

    pub fn partner_active(channel: impl Into<String>, audience_segment: impl Into<String>) -> Self {
        MemoryEvent::PartnerContractChanged {
            channel: channel.into(),
            audience_segment: audience_segment.into(),
            active: true,
        }
    }

    pub fn rate_limit(
        channel: impl Into<String>,
        audience_segment: impl Into<String>,
        until: impl Into<String>,
    ) -> Self {
        MemoryEvent::RateLimitSet {
            channel: channel.into(),
            audience_segment: audience_segment.into(),
            until: until.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_event() {
        let json = r#"{"type": "consent_granted", "channel": "sms", "audience_segment": "fosters"}"#;
        let event: MemoryEvent = serde_json::from_str(json).unwrap();

        match event {
            MemoryEvent::ConsentGranted {
                channel,
                audience_segment,
            } => {
                assert_eq!(channel, "sms");
                assert_eq!(audience_segment, "fosters");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_evaluate_requested_event() {
        let json = r#"{
            "type": "evaluate_requested",
            "case_id": "case-1",
            "policy_version_hash": "pv-1",
            "tier": "T1",
            "geofence_snapshot": {"lat_microdegrees": 1, "lng_microdegrees": 2, "radius_meters": 3},
            "ttl_seconds": 60,
            "requested_channels": ["sms"],
            "audience_segment": "fosters"
        }"#;
        let event: MemoryEvent = serde_json::from_str(json).unwrap();

        match event {
            MemoryEvent::EvaluateRequested(request) => {
                assert_eq!(request.case_id, Some(serde_json::json!("case-1")));
                assert_eq!(request.ttl_seconds, Some(serde_json::json!(60)));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_evaluate_requested_tolerates_missing_fields() {
        let json = r#"{"type": "evaluate_requested", "case_id": "case-1"}"#;
        let event: MemoryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), "evaluate_requested");
    }

    #[test]
    fn test_unknown_event_type() {
        let json = r#"{"type": "volunteer_assigned", "volunteer_id": "v-9"}"#;
        let event: MemoryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, MemoryEvent::Unknown);
    }

    #[test]
    fn test_scoped_human_review() {
        let json = r#"{"type": "human_review_flagged", "channels": ["push"]}"#;
        let event: MemoryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            MemoryEvent::HumanReviewFlagged {
                channels: vec!["push".to_string()]
            }
        );

        let unscoped: MemoryEvent = serde_json::from_str(r#"{"type": "human_review_flagged"}"#).unwrap();
        assert_eq!(unscoped, MemoryEvent::HumanReviewFlagged { channels: vec![] });
    }

    #[test]
    fn test_unit_event_ignores_extra_fields() {
        let json = r#"{"type": "user_paused", "source": "sms_reply"}"#;
        let event: MemoryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, MemoryEvent::UserPaused);
    }

    #[test]
    fn test_parse_log() {
        let json = r#"[
            {"type": "user_paused"},
            {"type": "rate_limit_set", "channel": "sms", "audience_segment": "fosters", "until": "2026-03-01T12:00:00Z"},
            {"type": "something_new"}
        ]"#;
        let events = MemoryEvent::parse_log(json).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind(), "rate_limit_set");
        assert_eq!(events[2], MemoryEvent::Unknown);
    }

    #[test]
    fn test_parse_log_rejects_malformed_json() {
        let result = MemoryEvent::parse_log(r#"[{"type": "user_paused"},"#);
        assert!(matches!(result, Err(rescue_alert_core::Error::Serialization(_))));
    }
}
