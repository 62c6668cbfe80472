//! Alert policy evaluator
//!
//! Decides which requested channels may carry an alert and produces the
//! audit batch justifying every inclusion and exclusion:
//! - Ambiguous requests suppress every requested channel (`policy_ambiguity`)
//! - Otherwise each channel is checked against a fixed precedence of
//!   suppression rules; the first match is its one reason code
//! - Decision ids and idempotency keys are digests of canonical inputs
//!
//! Evaluation is a pure computation over its arguments. Time comes only from
//! the injected clock, read once per call.

use chrono::{DateTime, Utc};
use rescue_alert_core::clock::{format_timestamp, parse_timestamp};
use rescue_alert_core::{canonical, Clock, GeofenceSnapshot, ReasonCode, Result, Tier};
use serde::Serialize;
use tracing::debug;

use crate::audit::{AuditEvent, PredictedIneligibility};
use crate::projection::AlertProjection;
use crate::request::{EvaluateRequest, PartialRequest, Resolution, ValidatedRequest};

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub decision_id: String,

    /// Lexically sorted
    pub eligible_channels: Vec<String>,

    /// `policy_evaluated`, then `alert_emitted`, then `alert_suppressed`
    pub audit_events: Vec<AuditEvent>,

    /// Request failed the ambiguity check
    #[serde(skip)]
    pub ambiguous: bool,
}

impl Decision {
    /// Suppressed channels with their reason codes, in audit order
    pub fn suppressions(&self) -> impl Iterator<Item = (&str, ReasonCode)> {
        self.audit_events.iter().filter_map(|event| match event {
            AuditEvent::AlertSuppressed {
                channel,
                reason_code,
                ..
            } => Some((channel.as_str(), *reason_code)),
            _ => None,
        })
    }

    /// Reason a channel was suppressed, if it was
    pub fn reason_for(&self, channel: &str) -> Option<ReasonCode> {
        self.suppressions()
            .find(|(suppressed, _)| *suppressed == channel)
            .map(|(_, reason)| reason)
    }

    /// Idempotency key emitted for an eligible channel
    pub fn idempotency_key(&self, channel: &str) -> Option<&str> {
        self.audit_events
            .iter()
            .find(|event| matches!(event, AuditEvent::AlertEmitted { .. }) && event.channel() == Some(channel))
            .and_then(AuditEvent::idempotency_key)
    }

    /// Canonical text of the audit batch
    pub fn canonical_audit(&self) -> Result<String> {
        Ok(canonical::encode_serializable(&self.audit_events)?)
    }
}

/// Knobs that shape the audit output without changing the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorOptions {
    /// Value written to `alert_emitted.per_recipient_caps_applied`
    pub per_recipient_caps: bool,

    /// Attach `predicted_ineligibility` to `policy_evaluated` when anything is suppressed
    pub emit_predicted_ineligibility: bool,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            per_recipient_caps: false,
            emit_predicted_ineligibility: true,
        }
    }
}

/// Policy evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    options: EvaluatorOptions,
}

impl Evaluator {
    /// Create an evaluator with default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EvaluatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Evaluate a request against a projection snapshot
    pub fn evaluate(
        &self,
        request: &EvaluateRequest,
        projection: &AlertProjection,
        clock: &dyn Clock,
    ) -> Result<Decision> {
        let now = clock.now();
        let evaluation_timestamp = format_timestamp(&now);

        match request.resolve() {
            Resolution::Valid(request) => {
                self.evaluate_valid(&request, projection, &now, evaluation_timestamp)
            }
            Resolution::Ambiguous(partial) => self.fail_closed(&partial, evaluation_timestamp),
        }
    }

    fn evaluate_valid(
        &self,
        request: &ValidatedRequest,
        projection: &AlertProjection,
        now: &DateTime<Utc>,
        evaluation_timestamp: String,
    ) -> Result<Decision> {
        let mut eligible_channels = Vec::new();
        let mut suppressed = Vec::new();

        for channel in &request.requested_channels {
            match suppression_reason(channel, &request.audience_segment, projection, now) {
                Some(reason) => {
                    debug!(
                        case_id = %request.case_id,
                        channel = %channel,
                        reason = %reason,
                        "Channel suppressed"
                    );
                    suppressed.push((channel.clone(), reason));
                }
                None => eligible_channels.push(channel.clone()),
            }
        }
        eligible_channels.sort();
        suppressed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.as_str().cmp(b.1.as_str())));

        let decision_id = canonical::digest_serializable(&DecisionIdInput {
            case_id: Some(request.case_id.as_str()),
            policy_version_hash: Some(request.policy_version_hash.as_str()),
            tier: Some(request.tier),
            geofence_snapshot: Some(request.geofence_snapshot),
            ttl_seconds: Some(request.ttl_seconds),
            eligible_channels: &eligible_channels,
            evaluation_timestamp: &evaluation_timestamp,
        })?;

        let mut audit_events = Vec::with_capacity(1 + request.requested_channels.len());
        audit_events.push(AuditEvent::PolicyEvaluated {
            decision_id: decision_id.clone(),
            policy_version_hash: request.policy_version_hash.clone(),
            tier: Some(request.tier),
            geofence_snapshot: Some(request.geofence_snapshot),
            eligible_channels: eligible_channels.clone(),
            evaluation_timestamp: evaluation_timestamp.clone(),
            predicted_ineligibility: self.predicted_ineligibility(&suppressed),
        });

        for channel in &eligible_channels {
            audit_events.push(AuditEvent::AlertEmitted {
                decision_id: decision_id.clone(),
                policy_version_hash: request.policy_version_hash.clone(),
                channel: channel.clone(),
                audience_segment: request.audience_segment.clone(),
                geofence_snapshot: request.geofence_snapshot,
                ttl_seconds: request.ttl_seconds,
                per_recipient_caps_applied: self.options.per_recipient_caps,
                idempotency_key: idempotency_key(request, channel)?,
            });
        }

        for (channel, reason_code) in suppressed {
            audit_events.push(AuditEvent::AlertSuppressed {
                decision_id: decision_id.clone(),
                policy_version_hash: request.policy_version_hash.clone(),
                case_id: request.case_id.clone(),
                channel,
                geofence_snapshot: Some(request.geofence_snapshot),
                evaluation_timestamp: evaluation_timestamp.clone(),
                reason_code,
            });
        }

        Ok(Decision {
            decision_id,
            eligible_channels,
            audit_events,
            ambiguous: false,
        })
    }

    fn fail_closed(&self, partial: &PartialRequest, evaluation_timestamp: String) -> Result<Decision> {
        debug!(
            case_id = ?partial.case_id,
            problems = ?partial.problems,
            "Ambiguous request, suppressing every requested channel"
        );

        let decision_id = canonical::digest_serializable(&DecisionIdInput {
            case_id: partial.case_id.as_deref(),
            policy_version_hash: partial.policy_version_hash.as_deref(),
            tier: partial.tier,
            geofence_snapshot: partial.geofence_snapshot,
            ttl_seconds: partial.ttl_seconds,
            eligible_channels: &[],
            evaluation_timestamp: &evaluation_timestamp,
        })?;

        let policy_version_hash = partial.policy_version_hash.clone().unwrap_or_default();
        let case_id = partial.case_id.clone().unwrap_or_default();
        let suppressed: Vec<(String, ReasonCode)> = partial
            .requested_channels
            .iter()
            .map(|channel| (channel.clone(), ReasonCode::PolicyAmbiguity))
            .collect();

        let mut audit_events = Vec::with_capacity(1 + suppressed.len());
        audit_events.push(AuditEvent::PolicyEvaluated {
            decision_id: decision_id.clone(),
            policy_version_hash: policy_version_hash.clone(),
            tier: partial.tier,
            geofence_snapshot: partial.geofence_snapshot,
            eligible_channels: Vec::new(),
            evaluation_timestamp: evaluation_timestamp.clone(),
            predicted_ineligibility: self.predicted_ineligibility(&suppressed),
        });

        for (channel, reason_code) in suppressed {
            audit_events.push(AuditEvent::AlertSuppressed {
                decision_id: decision_id.clone(),
                policy_version_hash: policy_version_hash.clone(),
                case_id: case_id.clone(),
                channel,
                geofence_snapshot: partial.geofence_snapshot,
                evaluation_timestamp: evaluation_timestamp.clone(),
                reason_code,
            });
        }

        Ok(Decision {
            decision_id,
            eligible_channels: Vec::new(),
            audit_events,
            ambiguous: true,
        })
    }

    fn predicted_ineligibility(
        &self,
        suppressed: &[(String, ReasonCode)],
    ) -> Option<Vec<PredictedIneligibility>> {
        if !self.options.emit_predicted_ineligibility || suppressed.is_empty() {
            return None;
        }
        Some(
            suppressed
                .iter()
                .map(|(channel, reason_code)| PredictedIneligibility {
                    channel: channel.clone(),
                    reason_code: *reason_code,
                })
                .collect(),
        )
    }
}

/// Evaluate with default options
pub fn evaluate(
    request: &EvaluateRequest,
    projection: &AlertProjection,
    clock: &dyn Clock,
) -> Result<Decision> {
    Evaluator::new().evaluate(request, projection, clock)
}

/// First suppression rule a channel trips, in precedence order
pub fn suppression_reason(
    channel: &str,
    audience_segment: &str,
    projection: &AlertProjection,
    now: &DateTime<Utc>,
) -> Option<ReasonCode> {
    if !projection.partner_contract(channel, audience_segment) {
        return Some(ReasonCode::PartnerUnavailable);
    }
    if !projection.consent(channel, audience_segment) {
        return Some(ReasonCode::ConsentMissing);
    }
    if projection.user_paused {
        return Some(ReasonCode::UserPaused);
    }
    if let Some(until) = projection.rate_limit_until(channel, audience_segment) {
        if rate_limit_active(until, now) {
            return Some(ReasonCode::RateLimited);
        }
    }
    if projection.human_review.blocks(channel) {
        return Some(ReasonCode::HumanReviewRequired);
    }
    // Fraud alone does not suppress; it escalates low confidence.
    if projection.fraud_signal && projection.low_confidence {
        return Some(ReasonCode::FraudSignal);
    }
    if projection.low_confidence {
        return Some(ReasonCode::LowConfidence);
    }
    if projection.escalation_proof_required && !projection.escalation_proof_attached {
        return Some(ReasonCode::VerificationRequired);
    }
    None
}

/// Unparseable expiries count as active
fn rate_limit_active(until: &str, now: &DateTime<Utc>) -> bool {
    match parse_timestamp(until) {
        Ok(until) => *now < until,
        Err(e) => {
            debug!(until = %until, error = %e, "Unreadable rate-limit expiry, treating as active");
            true
        }
    }
}

/// Key downstream transport uses to collapse retries of one logical alert
///
/// Excludes the evaluation timestamp so re-evaluation yields the same key.
pub fn idempotency_key(request: &ValidatedRequest, channel: &str) -> Result<String> {
    Ok(canonical::digest_serializable(&IdempotencyInput {
        case_id: &request.case_id,
        policy_version_hash: &request.policy_version_hash,
        channel,
        audience_segment: &request.audience_segment,
        geofence_snapshot: request.geofence_snapshot,
        ttl_seconds: request.ttl_seconds,
    })?)
}

#[derive(Serialize)]
struct DecisionIdInput<'a> {
    case_id: Option<&'a str>,
    policy_version_hash: Option<&'a str>,
    tier: Option<Tier>,
    geofence_snapshot: Option<GeofenceSnapshot>,
    ttl_seconds: Option<u64>,
    eligible_channels: &'a [String],
    evaluation_timestamp: &'a str,
}

#[derive(Serialize)]
struct IdempotencyInput<'a> {
    case_id: &'a str,
    policy_version_hash: &'a str,
    channel: &'a str,
    audience_segment: &'a str,
    geofence_snapshot: GeofenceSnapshot,
    ttl_seconds: u64,
}
