//! Rescue Alert Core
//!
//! Core types, traits, and utilities shared across the rescue alert
//! policy engine.
//!
//! This crate provides:
//! - Error types and result handling
//! - Domain types for tiers, geofences and reason codes
//! - Canonical encoding and SHA-256 digests of structured values
//! - The injected clock abstraction

pub mod canonical;
pub mod clock;
pub mod error;
pub mod types;

pub use canonical::CanonicalError;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use types::{channel_key, is_key_component, GeofenceSnapshot, ReasonCode, Tier};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::canonical::{self, CanonicalError};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::types::{channel_key, is_key_component, GeofenceSnapshot, ReasonCode, Tier};
}
