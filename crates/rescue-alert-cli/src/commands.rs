//! Subcommand implementations
//!
//! Commands return the lines to print, so the binary stays a thin shell
//! around them.

use anyhow::{bail, Context};
use rescue_alert_core::canonical;
use rescue_alert_policy::prelude::*;
use rescue_alert_policy::replay_with_digest;
use rescue_alert_telemetry::schema::{published_schema, EVENT_TYPES};
use rescue_alert_telemetry::{validate_decision, AuditTrail};
use tracing::{info, warn};

/// Evaluate the latest request in `events_json` and render the audit batch
///
/// Each line is one canonical JSON audit event, or one chained record when
/// `chain` is set. The batch is checked against the audit schemas first.
pub fn evaluate_log(events_json: &str, config: &EngineConfig, chain: bool) -> anyhow::Result<Vec<String>> {
    let events = MemoryEvent::parse_log(events_json).context("failed to parse event log")?;
    let clock = config.clock()?;
    let engine = PolicyEngine::new(config.clone());

    let decision = engine.evaluate_log(&events, clock.as_ref())?;

    if let Err(violations) = validate_decision(&decision) {
        let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
        bail!("audit batch violates schema: {}", details.join("; "));
    }

    if chain {
        let mut trail = AuditTrail::new();
        trail.add_decision(&decision)?;
        return trail
            .records()
            .iter()
            .map(|record| canonical::encode_serializable(record).map_err(Into::into))
            .collect();
    }

    decision
        .audit_events
        .iter()
        .map(|event| canonical::encode_serializable(event).map_err(Into::into))
        .collect()
}

/// Outcome of rebuilding a projection both ways
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub events: usize,
    pub incremental_digest: String,
    pub replayed_digest: String,
    /// Canonical JSON of the replayed projection
    pub projection: String,
}

impl ReplayReport {
    pub fn matches(&self) -> bool {
        self.incremental_digest == self.replayed_digest
    }

    pub fn lines(&self, with_projection: bool) -> Vec<String> {
        let mut lines = vec![
            format!("events {}", self.events),
            format!("incremental {}", self.incremental_digest),
            format!("replay {}", self.replayed_digest),
        ];
        if with_projection {
            lines.push(self.projection.clone());
        }
        lines
    }
}

/// Build the projection event by event and by full replay, and compare digests
pub fn replay_log(events_json: &str) -> anyhow::Result<ReplayReport> {
    let events = MemoryEvent::parse_log(events_json).context("failed to parse event log")?;

    let mut builder = ProjectionBuilder::new();
    for event in &events {
        builder.apply(event);
    }
    let incremental_digest = builder.projection().digest()?;
    let (projection, replayed_digest) = replay_with_digest(&events)?;

    let report = ReplayReport {
        events: events.len(),
        incremental_digest,
        replayed_digest,
        projection: projection.canonical()?,
    };

    if report.matches() {
        info!(events = report.events, digest = %report.replayed_digest, "Replay matches");
    } else {
        warn!(
            incremental = %report.incremental_digest,
            replayed = %report.replayed_digest,
            "Projection drift detected"
        );
    }
    Ok(report)
}

/// Canonical text of every published audit event schema, in batch order
pub fn audit_schemas() -> anyhow::Result<Vec<String>> {
    EVENT_TYPES
        .iter()
        .map(|event_type| -> anyhow::Result<String> {
            let schema = published_schema(event_type)
                .with_context(|| format!("no published schema for {}", event_type))?;
            Ok(canonical::encode(&schema)?)
        })
        .collect()
}
