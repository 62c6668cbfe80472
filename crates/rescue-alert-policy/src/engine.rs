//! Policy engine facade
//!
//! Ties the pieces together for a caller holding a complete event log:
//! extract the request, fold the projection, optionally prove it against a
//! replay, then evaluate.

use rescue_alert_core::{Clock, Result};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::evaluator::{Decision, Evaluator};
use crate::event::MemoryEvent;
use crate::projection::{AlertProjection, ProjectionBuilder};
use crate::replay::verify_replay;
use crate::request::request_from_events;

/// Policy evaluation engine
pub struct PolicyEngine {
    config: EngineConfig,
    evaluator: Evaluator,
}

impl PolicyEngine {
    /// Create a new policy engine
    pub fn new(config: EngineConfig) -> Self {
        let evaluator = Evaluator::with_options(config.evaluator_options());
        Self { config, evaluator }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Fold the log into a projection, checked against replay when configured
    pub fn project(&self, events: &[MemoryEvent]) -> Result<AlertProjection> {
        let mut builder = ProjectionBuilder::new();
        builder.apply_all(events);

        if self.config.verify_replay {
            verify_replay(&builder, events)?;
        }

        Ok(builder.into_projection())
    }

    /// Evaluate the latest request in a complete event log
    pub fn evaluate_log(&self, events: &[MemoryEvent], clock: &dyn Clock) -> Result<Decision> {
        let request = request_from_events(events)?;
        let projection = self.project(events)?;
        let decision = self.evaluator.evaluate(&request, &projection, clock)?;

        if decision.ambiguous {
            warn!(
                decision_id = %decision.decision_id,
                suppressed = decision.suppressions().count(),
                "Ambiguous evaluation request, all channels suppressed"
            );
        } else {
            info!(
                decision_id = %decision.decision_id,
                eligible = decision.eligible_channels.len(),
                suppressed = decision.suppressions().count(),
                "Alert policy evaluated"
            );
        }
        for (channel, reason) in decision.suppressions() {
            debug!(channel = %channel, reason = %reason, "Suppression recorded");
        }

        Ok(decision)
    }

    /// Evaluate using an incrementally maintained builder
    ///
    /// `events` must be the log the builder was fed; it is used for request
    /// extraction and, when configured, replay verification.
    pub fn evaluate_with_builder(
        &self,
        builder: &ProjectionBuilder,
        events: &[MemoryEvent],
        clock: &dyn Clock,
    ) -> Result<Decision> {
        let request = request_from_events(events)?;
        if self.config.verify_replay {
            verify_replay(builder, events)?;
        }
        self.evaluator.evaluate(&request, builder.projection(), clock)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
