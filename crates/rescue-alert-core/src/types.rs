//! Core types for the rescue alert engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between channel and audience segment in projection keys
pub const KEY_SEPARATOR: &str = "::";

/// Build the projection key for a (channel, audience segment) pair
pub fn channel_key(channel: &str, audience_segment: &str) -> String {
    format!("{}{}{}", channel, KEY_SEPARATOR, audience_segment)
}

/// Whether `name` can sit on either side of a projection key unambiguously
///
/// Names holding the separator, or a colon at either end, would let two
/// different pairs share one key.
pub fn is_key_component(name: &str) -> bool {
    !name.contains(KEY_SEPARATOR) && !name.starts_with(':') && !name.ends_with(':')
}

/// Alert severity tier, `T0` through `T5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
}

impl Tier {
    /// Wire name of this tier
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::T0 => "T0",
            Tier::T1 => "T1",
            Tier::T2 => "T2",
            Tier::T3 => "T3",
            Tier::T4 => "T4",
            Tier::T5 => "T5",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "T0" => Ok(Tier::T0),
            "T1" => Ok(Tier::T1),
            "T2" => Ok(Tier::T2),
            "T3" => Ok(Tier::T3),
            "T4" => Ok(Tier::T4),
            "T5" => Ok(Tier::T5),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Geofence of an alert, in integer microdegrees and meters
///
/// Coordinates never pass through floating point so hashing and comparison
/// stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeofenceSnapshot {
    /// Latitude in millionths of a degree
    pub lat_microdegrees: i64,

    /// Longitude in millionths of a degree
    pub lng_microdegrees: i64,

    /// Radius in meters
    pub radius_meters: u64,
}

impl GeofenceSnapshot {
    /// Latitude bound in microdegrees
    pub const MAX_LAT: i64 = 90_000_000;

    /// Longitude bound in microdegrees
    pub const MAX_LNG: i64 = 180_000_000;

    /// Create a new geofence snapshot
    pub fn new(lat_microdegrees: i64, lng_microdegrees: i64, radius_meters: u64) -> Self {
        Self {
            lat_microdegrees,
            lng_microdegrees,
            radius_meters,
        }
    }

    /// Whether the coordinates fall on the globe
    pub fn in_range(&self) -> bool {
        self.lat_microdegrees.abs() <= Self::MAX_LAT && self.lng_microdegrees.abs() <= Self::MAX_LNG
    }
}

/// Justification attached to a suppressed channel
///
/// Closed set. Every suppressed channel carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    ConsentMissing,
    UserPaused,
    RateLimited,
    LowConfidence,
    FraudSignal,
    PartnerUnavailable,
    VerificationRequired,
    HumanReviewRequired,
    PolicyAmbiguity,
}

impl ReasonCode {
    /// Every reason code, in declaration order
    pub const ALL: [ReasonCode; 9] = [
        ReasonCode::ConsentMissing,
        ReasonCode::UserPaused,
        ReasonCode::RateLimited,
        ReasonCode::LowConfidence,
        ReasonCode::FraudSignal,
        ReasonCode::PartnerUnavailable,
        ReasonCode::VerificationRequired,
        ReasonCode::HumanReviewRequired,
        ReasonCode::PolicyAmbiguity,
    ];

    /// Wire name of this reason code
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::ConsentMissing => "consent_missing",
            ReasonCode::UserPaused => "user_paused",
            ReasonCode::RateLimited => "rate_limited",
            ReasonCode::LowConfidence => "low_confidence",
            ReasonCode::FraudSignal => "fraud_signal",
            ReasonCode::PartnerUnavailable => "partner_unavailable",
            ReasonCode::VerificationRequired => "verification_required",
            ReasonCode::HumanReviewRequired => "human_review_required",
            ReasonCode::PolicyAmbiguity => "policy_ambiguity",
        }
    }

    /// Parse a wire name
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_str() == s)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
