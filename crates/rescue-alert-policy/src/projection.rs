//! Alert projection and its incremental builder
//!
//! The projection is derived read-state folded from the event log. It is
//! rebuilt freely and never written back. [`apply_event`] holds the one
//! update rule per event kind; both the incremental builder and the replay
//! engine go through it.

use rescue_alert_core::{canonical, channel_key, CanonicalError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::event::MemoryEvent;

/// Human review requirement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HumanReview {
    #[default]
    NotRequired,
    Required {
        /// `None` applies the review to every channel
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channels: Option<BTreeSet<String>>,
    },
}

impl HumanReview {
    /// Whether review blocks the given channel
    pub fn blocks(&self, channel: &str) -> bool {
        match self {
            HumanReview::NotRequired => false,
            HumanReview::Required { channels: None } => true,
            HumanReview::Required {
                channels: Some(scope),
            } => scope.contains(channel),
        }
    }
}

/// Current alerting state of a case
///
/// Per-channel maps are keyed by `channel::audience_segment`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertProjection {
    pub consent_by_channel: BTreeMap<String, bool>,
    pub partner_contract_by_channel: BTreeMap<String, bool>,
    /// Raw ISO-8601 expiry as written in the log
    pub rate_limit_until_by_channel: BTreeMap<String, String>,
    pub user_paused: bool,
    pub human_review: HumanReview,
    pub fraud_signal: bool,
    pub low_confidence: bool,
    pub escalation_proof_required: bool,
    pub escalation_proof_attached: bool,
}

impl AlertProjection {
    /// Consent is granted only when explicitly recorded as `true`
    pub fn consent(&self, channel: &str, audience_segment: &str) -> bool {
        self.consent_by_channel
            .get(&channel_key(channel, audience_segment))
            .copied()
            .unwrap_or(false)
    }

    /// Partner contract is active only when explicitly recorded as `true`
    pub fn partner_contract(&self, channel: &str, audience_segment: &str) -> bool {
        self.partner_contract_by_channel
            .get(&channel_key(channel, audience_segment))
            .copied()
            .unwrap_or(false)
    }

    pub fn rate_limit_until(&self, channel: &str, audience_segment: &str) -> Option<&str> {
        self.rate_limit_until_by_channel
            .get(&channel_key(channel, audience_segment))
            .map(String::as_str)
    }

    /// Canonical text of this projection
    pub fn canonical(&self) -> Result<String, CanonicalError> {
        canonical::encode_serializable(self)
    }

    /// SHA-256 of the canonical text
    pub fn digest(&self) -> Result<String, CanonicalError> {
        canonical::digest_serializable(self)
    }
}

/// Apply one event to a projection
///
/// Last write in log order wins for every field, rate-limit expiries
/// included, regardless of which instant is later.
pub fn apply_event(projection: &mut AlertProjection, event: &MemoryEvent) {
    match event {
        MemoryEvent::ConsentGranted {
            channel,
            audience_segment,
        } => {
            projection
                .consent_by_channel
                .insert(channel_key(channel, audience_segment), true);
        }
        MemoryEvent::ConsentRevoked {
            channel,
            audience_segment,
        } => {
            projection
                .consent_by_channel
                .insert(channel_key(channel, audience_segment), false);
        }
        MemoryEvent::PartnerContractChanged {
            channel,
            audience_segment,
            active,
        } => {
            projection
                .partner_contract_by_channel
                .insert(channel_key(channel, audience_segment), *active);
        }
        MemoryEvent::RateLimitSet {
            channel,
            audience_segment,
            until,
        } => {
            projection
                .rate_limit_until_by_channel
                .insert(channel_key(channel, audience_segment), until.clone());
        }
        MemoryEvent::RateLimitCleared {
            channel,
            audience_segment,
        } => {
            projection
                .rate_limit_until_by_channel
                .remove(&channel_key(channel, audience_segment));
        }
        MemoryEvent::UserPaused => projection.user_paused = true,
        MemoryEvent::UserResumed => projection.user_paused = false,
        MemoryEvent::HumanReviewFlagged { channels } => {
            let scope = if channels.is_empty() {
                None
            } else {
                Some(channels.iter().cloned().collect())
            };
            projection.human_review = HumanReview::Required { channels: scope };
        }
        MemoryEvent::HumanReviewCleared => projection.human_review = HumanReview::NotRequired,
        MemoryEvent::FraudSignalRaised => projection.fraud_signal = true,
        MemoryEvent::FraudSignalCleared => projection.fraud_signal = false,
        MemoryEvent::LowConfidenceFlagged => projection.low_confidence = true,
        MemoryEvent::LowConfidenceCleared => projection.low_confidence = false,
        MemoryEvent::EscalationProofRequired => projection.escalation_proof_required = true,
        MemoryEvent::EscalationProofAttached => projection.escalation_proof_attached = true,
        // The request itself does not change alerting state.
        MemoryEvent::EvaluateRequested(_) | MemoryEvent::Unknown => {}
    }
}

/// Incrementally maintained projection for one case
///
/// Single writer: `apply` takes `&mut self`, so a builder shared across
/// threads needs the caller's own lock, scoped per case id.
#[derive(Debug, Clone, Default)]
pub struct ProjectionBuilder {
    projection: AlertProjection,
    applied: usize,
}

impl ProjectionBuilder {
    /// Create a builder over an empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the next event of the log
    pub fn apply(&mut self, event: &MemoryEvent) {
        apply_event(&mut self.projection, event);
        self.applied += 1;
    }

    /// Fold a run of events in order
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a MemoryEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Number of events folded so far
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Current projection
    pub fn projection(&self) -> &AlertProjection {
        &self.projection
    }

    /// Owned copy of the current projection
    pub fn snapshot(&self) -> AlertProjection {
        self.projection.clone()
    }

    pub fn into_projection(self) -> AlertProjection {
        self.projection
    }
}
