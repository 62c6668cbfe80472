//! Replay engine: rebuild the projection from the full event history
//!
//! Replay is the reference against which the incrementally maintained
//! projection is checked. The comparison runs on canonical digests, so a
//! difference in key order or encoding counts as drift just like a
//! difference in state.

use rescue_alert_core::{Error, Result};
use tracing::{debug, warn};

use crate::event::MemoryEvent;
use crate::projection::{apply_event, AlertProjection, ProjectionBuilder};

/// Fold the whole history into a fresh projection in one pass
pub fn replay(events: &[MemoryEvent]) -> AlertProjection {
    events
        .iter()
        .fold(AlertProjection::default(), |mut projection, event| {
            apply_event(&mut projection, event);
            projection
        })
}

/// Replay the history and return the projection with its digest
pub fn replay_with_digest(events: &[MemoryEvent]) -> Result<(AlertProjection, String)> {
    let projection = replay(events);
    let digest = projection.digest()?;
    Ok((projection, digest))
}

/// Check an incremental projection against a replay of the same log
///
/// Returns the agreed digest, or [`Error::ProjectionDrift`] carrying both.
pub fn verify_replay(builder: &ProjectionBuilder, events: &[MemoryEvent]) -> Result<String> {
    if builder.applied() != events.len() {
        warn!(
            applied = builder.applied(),
            log_len = events.len(),
            "Incremental projection has not seen the full log"
        );
    }

    let incremental = builder.projection().digest()?;
    let (_, replayed) = replay_with_digest(events)?;

    if incremental != replayed {
        warn!(
            incremental = %incremental,
            replayed = %replayed,
            "Projection drift detected"
        );
        return Err(Error::ProjectionDrift {
            incremental,
            replayed,
        });
    }

    debug!(digest = %incremental, events = events.len(), "Replay matches incremental projection");
    Ok(incremental)
}
