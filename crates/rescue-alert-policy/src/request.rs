//! Evaluation requests
//!
//! A request arrives inside an `evaluate_requested` event written by a
//! collaborator, so every field is kept as raw JSON until [`EvaluateRequest::resolve`]
//! checks it. A missing or malformed field makes the request ambiguous, which
//! the evaluator turns into a fail-closed decision rather than an error.

use rescue_alert_core::{is_key_component, Error, GeofenceSnapshot, Result, Tier};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::event::MemoryEvent;

/// Request to decide which channels may carry an alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_version_hash: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geofence_snapshot: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_channels: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_segment: Option<Value>,
}

/// A field of [`EvaluateRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestField {
    CaseId,
    PolicyVersionHash,
    Tier,
    GeofenceSnapshot,
    TtlSeconds,
    RequestedChannels,
    AudienceSegment,
}

impl RequestField {
    pub const ALL: [RequestField; 7] = [
        RequestField::CaseId,
        RequestField::PolicyVersionHash,
        RequestField::Tier,
        RequestField::GeofenceSnapshot,
        RequestField::TtlSeconds,
        RequestField::RequestedChannels,
        RequestField::AudienceSegment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestField::CaseId => "case_id",
            RequestField::PolicyVersionHash => "policy_version_hash",
            RequestField::Tier => "tier",
            RequestField::GeofenceSnapshot => "geofence_snapshot",
            RequestField::TtlSeconds => "ttl_seconds",
            RequestField::RequestedChannels => "requested_channels",
            RequestField::AudienceSegment => "audience_segment",
        }
    }
}

impl fmt::Display for RequestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully checked request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub case_id: String,
    pub policy_version_hash: String,
    pub tier: Tier,
    pub geofence_snapshot: GeofenceSnapshot,
    pub ttl_seconds: u64,
    /// Deduplicated, lexically sorted
    pub requested_channels: Vec<String>,
    pub audience_segment: String,
}

/// Whatever could be salvaged from an ambiguous request
///
/// Carried into the audit trail so a fail-closed decision still records
/// which case and channels it refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRequest {
    pub case_id: Option<String>,
    pub policy_version_hash: Option<String>,
    pub tier: Option<Tier>,
    pub geofence_snapshot: Option<GeofenceSnapshot>,
    pub ttl_seconds: Option<u64>,
    /// String entries of the requested channel list, deduplicated and sorted
    pub requested_channels: Vec<String>,
    pub audience_segment: Option<String>,
    /// Fields that were missing or malformed
    pub problems: Vec<RequestField>,
}

/// Outcome of checking a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Valid(ValidatedRequest),
    Ambiguous(PartialRequest),
}

impl EvaluateRequest {
    /// Build a well-formed request from typed parts
    pub fn new(
        case_id: impl Into<String>,
        policy_version_hash: impl Into<String>,
        tier: Tier,
        geofence_snapshot: GeofenceSnapshot,
        ttl_seconds: u64,
        requested_channels: &[&str],
        audience_segment: impl Into<String>,
    ) -> Self {
        Self {
            case_id: Some(Value::String(case_id.into())),
            policy_version_hash: Some(Value::String(policy_version_hash.into())),
            tier: Some(Value::String(tier.as_str().to_string())),
            geofence_snapshot: Some(json!(geofence_snapshot)),
            ttl_seconds: Some(json!(ttl_seconds)),
            requested_channels: Some(json!(requested_channels)),
            audience_segment: Some(Value::String(audience_segment.into())),
        }
    }

    /// Raw value of a field
    pub fn field(&self, field: RequestField) -> Option<&Value> {
        self.slot(field).as_ref()
    }

    /// Replace a field with an arbitrary raw value
    pub fn with_field(mut self, field: RequestField, value: Value) -> Self {
        *self.slot_mut(field) = Some(value);
        self
    }

    /// Remove a field
    pub fn without(mut self, field: RequestField) -> Self {
        *self.slot_mut(field) = None;
        self
    }

    fn slot(&self, field: RequestField) -> &Option<Value> {
        match field {
            RequestField::CaseId => &self.case_id,
            RequestField::PolicyVersionHash => &self.policy_version_hash,
            RequestField::Tier => &self.tier,
            RequestField::GeofenceSnapshot => &self.geofence_snapshot,
            RequestField::TtlSeconds => &self.ttl_seconds,
            RequestField::RequestedChannels => &self.requested_channels,
            RequestField::AudienceSegment => &self.audience_segment,
        }
    }

    fn slot_mut(&mut self, field: RequestField) -> &mut Option<Value> {
        match field {
            RequestField::CaseId => &mut self.case_id,
            RequestField::PolicyVersionHash => &mut self.policy_version_hash,
            RequestField::Tier => &mut self.tier,
            RequestField::GeofenceSnapshot => &mut self.geofence_snapshot,
            RequestField::TtlSeconds => &mut self.ttl_seconds,
            RequestField::RequestedChannels => &mut self.requested_channels,
            RequestField::AudienceSegment => &mut self.audience_segment,
        }
    }

    /// Check every field; any problem makes the request ambiguous
    pub fn resolve(&self) -> Resolution {
        let mut partial = PartialRequest::default();

        partial.case_id = checked(&mut partial.problems, RequestField::CaseId, self.case_id.as_ref(), non_empty_string);
        partial.policy_version_hash = checked(
            &mut partial.problems,
            RequestField::PolicyVersionHash,
            self.policy_version_hash.as_ref(),
            non_empty_string,
        );
        partial.tier = checked(&mut partial.problems, RequestField::Tier, self.tier.as_ref(), parse_tier);
        partial.geofence_snapshot = checked(
            &mut partial.problems,
            RequestField::GeofenceSnapshot,
            self.geofence_snapshot.as_ref(),
            parse_geofence,
        );
        partial.ttl_seconds = checked(&mut partial.problems, RequestField::TtlSeconds, self.ttl_seconds.as_ref(), integral_u64);
        partial.audience_segment = checked(
            &mut partial.problems,
            RequestField::AudienceSegment,
            self.audience_segment.as_ref(),
            key_component,
        );

        let (channels, channels_ok) = parse_channels(self.requested_channels.as_ref());
        partial.requested_channels = channels;
        if !channels_ok {
            partial.problems.push(RequestField::RequestedChannels);
        }
        partial.problems.sort();

        match partial {
            PartialRequest {
                case_id: Some(case_id),
                policy_version_hash: Some(policy_version_hash),
                tier: Some(tier),
                geofence_snapshot: Some(geofence_snapshot),
                ttl_seconds: Some(ttl_seconds),
                requested_channels,
                audience_segment: Some(audience_segment),
                problems,
            } if problems.is_empty() => Resolution::Valid(ValidatedRequest {
                case_id,
                policy_version_hash,
                tier,
                geofence_snapshot,
                ttl_seconds,
                requested_channels,
                audience_segment,
            }),
            partial => Resolution::Ambiguous(partial),
        }
    }
}

/// Extract the request carried by the last `evaluate_requested` event
///
/// A log without one cannot be evaluated; the caller must stop here.
pub fn request_from_events(events: &[MemoryEvent]) -> Result<EvaluateRequest> {
    events
        .iter()
        .rev()
        .find_map(|event| match event {
            MemoryEvent::EvaluateRequested(request) => Some(request.clone()),
            _ => None,
        })
        .ok_or(Error::MissingEvaluateRequest)
}

fn checked<T>(
    problems: &mut Vec<RequestField>,
    field: RequestField,
    raw: Option<&Value>,
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let parsed = raw.and_then(parse);
    if parsed.is_none() {
        problems.push(field);
    }
    parsed
}

fn non_empty_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Channel and segment names end up in projection keys
fn key_component(value: &Value) -> Option<String> {
    non_empty_string(value).filter(|name| is_key_component(name))
}

fn parse_tier(value: &Value) -> Option<Tier> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn parse_geofence(value: &Value) -> Option<GeofenceSnapshot> {
    let map = value.as_object()?;
    if map.len() != 3 {
        return None;
    }
    let geofence = GeofenceSnapshot {
        lat_microdegrees: integral_i64(map.get("lat_microdegrees")?)?,
        lng_microdegrees: integral_i64(map.get("lng_microdegrees")?)?,
        radius_meters: integral_u64(map.get("radius_meters")?)?,
    };
    geofence.in_range().then_some(geofence)
}

/// Largest magnitude a double holds without losing integer precision
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Integers, including floats such as `60.0` with no fractional part
fn integral_i64(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT).then_some(f as i64)
}

fn integral_u64(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    integral_i64(value).and_then(|n| u64::try_from(n).ok())
}

/// Returns the salvaged channel names and whether the list was well formed
fn parse_channels(raw: Option<&Value>) -> (Vec<String>, bool) {
    let Some(items) = raw.and_then(Value::as_array) else {
        return (Vec::new(), false);
    };

    let mut channels = BTreeSet::new();
    let mut well_formed = !items.is_empty();
    for item in items {
        match key_component(item) {
            Some(channel) => {
                channels.insert(channel);
            }
            None => well_formed = false,
        }
    }
    (channels.into_iter().collect(), well_formed)
}
