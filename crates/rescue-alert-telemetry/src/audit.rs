//! Hash-chained audit trail
//!
//! Each audit event a decision emits is wrapped in a record that carries the
//! hash of its predecessor. Editing, dropping or reordering any record breaks
//! the chain and is caught by [`AuditTrail::verify`].

use rescue_alert_core::{canonical, CanonicalError};
use rescue_alert_policy::{AuditEvent, Decision};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Audit trail with hash-chained records for tamper detection
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: Vec<ChainedRecord>,
    chain_hash: Option<String>,
}

/// One audit event bound to its position in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedRecord {
    /// Zero-based position in the trail
    pub sequence: u64,

    /// The audit event as emitted
    pub event: AuditEvent,

    /// Hash of the previous record (`None` for the first)
    pub previous_hash: Option<String>,

    /// SHA-256 over the canonical form of sequence, event and previous hash
    pub hash: String,
}

/// Where and why verification failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainBreak {
    #[error("record {sequence} has sequence number out of place")]
    Sequence { sequence: u64 },

    #[error("record {sequence} does not link to its predecessor")]
    Link { sequence: u64 },

    #[error("record {sequence} hash does not match its contents")]
    Hash { sequence: u64 },
}

impl AuditTrail {
    /// Create a new audit trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event to the trail
    pub fn add_event(&mut self, event: AuditEvent) -> Result<&ChainedRecord, CanonicalError> {
        let sequence = self.records.len() as u64;
        let previous_hash = self.chain_hash.clone();
        let hash = compute_hash(sequence, &event, previous_hash.as_deref())?;

        self.chain_hash = Some(hash.clone());
        self.records.push(ChainedRecord {
            sequence,
            event,
            previous_hash,
            hash,
        });

        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    /// Append a decision's whole audit batch, in order
    pub fn add_decision(&mut self, decision: &Decision) -> Result<(), CanonicalError> {
        for event in &decision.audit_events {
            self.add_event(event.clone())?;
        }
        Ok(())
    }

    /// Verify the integrity of the audit trail
    pub fn verify(&self) -> bool {
        self.verify_detailed().is_ok()
    }

    /// Verify and report the first broken record
    pub fn verify_detailed(&self) -> Result<(), ChainBreak> {
        verify_records(&self.records)
    }

    /// Get all records
    pub fn records(&self) -> &[ChainedRecord] {
        &self.records
    }

    /// Hash of the latest record
    pub fn head(&self) -> Option<&str> {
        self.chain_hash.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Verify records obtained elsewhere, e.g. read back from storage
pub fn verify_records(records: &[ChainedRecord]) -> Result<(), ChainBreak> {
    let mut previous: Option<&str> = None;

    for (position, record) in records.iter().enumerate() {
        if record.sequence != position as u64 {
            return Err(ChainBreak::Sequence {
                sequence: record.sequence,
            });
        }
        if record.previous_hash.as_deref() != previous {
            return Err(ChainBreak::Link {
                sequence: record.sequence,
            });
        }

        let computed = compute_hash(record.sequence, &record.event, previous).map_err(|_| ChainBreak::Hash {
            sequence: record.sequence,
        })?;
        if computed != record.hash {
            return Err(ChainBreak::Hash {
                sequence: record.sequence,
            });
        }

        previous = Some(&record.hash);
    }

    Ok(())
}

fn compute_hash(sequence: u64, event: &AuditEvent, previous_hash: Option<&str>) -> Result<String, CanonicalError> {
    let event = serde_json::to_value(event).map_err(|e| CanonicalError::Unrepresentable(e.to_string()))?;
    canonical::digest(&json!({
        "sequence": sequence,
        "event": event,
        "previous_hash": previous_hash,
    }))
}
