//! Audit event schema validation
//!
//! Each audit event variant has a published JSON Schema (draft 2020-12) that
//! forbids additional properties. Events are checked against the schema for
//! their `type`; batches are additionally checked for ordering and a shared
//! decision id. Validation is meant for tests and offline tooling, where a
//! violation means the emitting code is wrong.

use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use rescue_alert_core::ReasonCode;
use rescue_alert_policy::Decision;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::warn;

/// Audit event types, in batch order
pub const EVENT_TYPES: [&str; 3] = ["policy_evaluated", "alert_emitted", "alert_suppressed"];

const TIERS: [&str; 6] = ["T0", "T1", "T2", "T3", "T4", "T5"];

/// One schema violation, located by a JSON pointer into the checked value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, thiserror::Error)]
#[error("{path}: {message}")]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Published JSON Schema for one audit event type
///
/// `tier` and `geofence_snapshot` may be `null` where an ambiguous request
/// left them unknown. `alert_emitted` is only produced for valid requests.
pub fn published_schema(event_type: &str) -> Option<Value> {
    let digest = json!({"type": "string", "pattern": "^[0-9a-f]{64}$"});
    let timestamp = json!({"type": "string", "format": "date-time"});
    let reason_codes: Vec<&str> = ReasonCode::ALL.iter().map(ReasonCode::as_str).collect();

    let (properties, required) = match event_type {
        "policy_evaluated" => {
            let mut nullable_tier: Vec<Value> = vec![Value::Null];
            nullable_tier.extend(TIERS.iter().map(|t| json!(t)));
            (
                json!({
                    "type": {"const": "policy_evaluated"},
                    "decision_id": digest,
                    "policy_version_hash": {"type": "string"},
                    "tier": {"enum": nullable_tier},
                    "geofence_snapshot": geofence_schema(true),
                    "eligible_channels": {"type": "array", "items": {"type": "string"}},
                    "evaluation_timestamp": timestamp,
                    "predicted_ineligibility": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "channel": {"type": "string"},
                                "reason_code": {"enum": reason_codes}
                            },
                            "required": ["channel", "reason_code"],
                            "additionalProperties": false
                        }
                    }
                }),
                json!([
                    "type",
                    "decision_id",
                    "policy_version_hash",
                    "tier",
                    "geofence_snapshot",
                    "eligible_channels",
                    "evaluation_timestamp"
                ]),
            )
        }
        "alert_emitted" => (
            json!({
                "type": {"const": "alert_emitted"},
                "decision_id": digest,
                "policy_version_hash": {"type": "string"},
                "channel": {"type": "string"},
                "audience_segment": {"type": "string"},
                "geofence_snapshot": geofence_schema(false),
                "ttl_seconds": {"type": "integer", "minimum": 0},
                "per_recipient_caps_applied": {"type": "boolean"},
                "idempotency_key": digest
            }),
            json!([
                "type",
                "decision_id",
                "policy_version_hash",
                "channel",
                "audience_segment",
                "geofence_snapshot",
                "ttl_seconds",
                "per_recipient_caps_applied",
                "idempotency_key"
            ]),
        ),
        "alert_suppressed" => (
            json!({
                "type": {"const": "alert_suppressed"},
                "decision_id": digest,
                "policy_version_hash": {"type": "string"},
                "case_id": {"type": "string"},
                "channel": {"type": "string"},
                "geofence_snapshot": geofence_schema(true),
                "evaluation_timestamp": timestamp,
                "reason_code": {"enum": reason_codes}
            }),
            json!([
                "type",
                "decision_id",
                "policy_version_hash",
                "case_id",
                "channel",
                "geofence_snapshot",
                "evaluation_timestamp",
                "reason_code"
            ]),
        ),
        _ => return None,
    };

    Some(json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": event_type,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    }))
}

fn geofence_schema(nullable: bool) -> Value {
    let kind = if nullable { json!(["object", "null"]) } else { json!("object") };
    json!({
        "type": kind,
        "properties": {
            "lat_microdegrees": {"type": "integer"},
            "lng_microdegrees": {"type": "integer"},
            "radius_meters": {"type": "integer", "minimum": 0}
        },
        "required": ["lat_microdegrees", "lng_microdegrees", "radius_meters"],
        "additionalProperties": false
    })
}

type CompiledSchemas = Result<Vec<(&'static str, Validator)>, String>;

fn compiled() -> &'static CompiledSchemas {
    static SCHEMAS: OnceLock<CompiledSchemas> = OnceLock::new();
    SCHEMAS.get_or_init(|| {
        EVENT_TYPES
            .iter()
            .map(|event_type| -> Result<(&'static str, Validator), String> {
                let schema = published_schema(event_type)
                    .ok_or_else(|| format!("no schema for {}", event_type))?;
                let validator = jsonschema::options()
                    .should_validate_formats(true)
                    .build(&schema)
                    .map_err(|e| format!("invalid schema for {}: {}", event_type, e))?;
                Ok((*event_type, validator))
            })
            .collect()
    })
}

/// Validate one serialized audit event
pub fn validate_audit_event(value: &Value) -> Result<(), Vec<SchemaViolation>> {
    let mut violations = Vec::new();
    check_event(value, "", &mut violations);
    finish(violations)
}

/// Validate an evaluation's whole audit batch, including its ordering
pub fn validate_audit_stream(values: &[Value]) -> Result<(), Vec<SchemaViolation>> {
    let mut violations = Vec::new();

    for (index, value) in values.iter().enumerate() {
        check_event(value, &format!("/{}", index), &mut violations);
    }
    check_batch_shape(values, &mut violations);

    finish(violations)
}

/// Validate the audit batch of a decision as it would be written out
pub fn validate_decision(decision: &Decision) -> Result<(), Vec<SchemaViolation>> {
    let mut values = Vec::with_capacity(decision.audit_events.len());
    for (index, event) in decision.audit_events.iter().enumerate() {
        match serde_json::to_value(event) {
            Ok(value) => values.push(value),
            Err(e) => {
                return Err(vec![SchemaViolation::new(format!("/{}", index), e.to_string())]);
            }
        }
    }

    let result = validate_audit_stream(&values);
    if let Err(violations) = &result {
        warn!(
            decision_id = %decision.decision_id,
            violations = violations.len(),
            "Audit batch failed schema validation"
        );
    }
    result
}

fn finish(mut violations: Vec<SchemaViolation>) -> Result<(), Vec<SchemaViolation>> {
    if violations.is_empty() {
        return Ok(());
    }
    violations.sort();
    violations.dedup();
    Err(violations)
}

fn check_event(value: &Value, base: &str, violations: &mut Vec<SchemaViolation>) {
    let Some(object) = value.as_object() else {
        violations.push(SchemaViolation::new(root(base), "audit event must be an object"));
        return;
    };

    let Some(event_type) = object.get("type").and_then(Value::as_str) else {
        violations.push(SchemaViolation::new(format!("{}/type", base), "missing string discriminator"));
        return;
    };

    let schemas = match compiled() {
        Ok(schemas) => schemas,
        Err(message) => {
            violations.push(SchemaViolation::new(root(base), message.clone()));
            return;
        }
    };

    let Some((_, validator)) = schemas.iter().find(|(name, _)| *name == event_type) else {
        violations.push(SchemaViolation::new(
            format!("{}/type", base),
            format!("unknown audit event type '{}'", event_type),
        ));
        return;
    };

    for error in validator.iter_errors(value) {
        let path = format!("{}{}", base, error.instance_path);
        match &error.kind {
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                for name in unexpected {
                    violations.push(SchemaViolation::new(
                        format!("{}/{}", path, name),
                        "additional property not allowed",
                    ));
                }
            }
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                violations.push(SchemaViolation::new(
                    format!("{}/{}", path, name),
                    "required property missing",
                ));
            }
            _ => violations.push(SchemaViolation::new(root_if_empty(path), error.to_string())),
        }
    }
}

fn check_batch_shape(values: &[Value], violations: &mut Vec<SchemaViolation>) {
    let event_type = |v: &Value| v.get("type").and_then(Value::as_str).map(str::to_owned);

    match values.first().and_then(event_type).as_deref() {
        Some("policy_evaluated") => {}
        _ => violations.push(SchemaViolation::new("/0", "batch must start with policy_evaluated")),
    }

    let decision_id = values.first().and_then(|v| v.get("decision_id"));
    let mut seen_suppressed = false;
    let mut channels = BTreeSet::new();
    let mut emitted = Vec::new();

    for (index, value) in values.iter().enumerate() {
        let path = format!("/{}", index);
        match event_type(value).as_deref() {
            Some("policy_evaluated") if index > 0 => {
                violations.push(SchemaViolation::new(path.clone(), "policy_evaluated must appear exactly once"));
            }
            Some("alert_emitted") => {
                if seen_suppressed {
                    violations.push(SchemaViolation::new(
                        path.clone(),
                        "alert_emitted must precede every alert_suppressed",
                    ));
                }
                if let Some(channel) = value.get("channel").and_then(Value::as_str) {
                    emitted.push(channel.to_string());
                }
            }
            Some("alert_suppressed") => seen_suppressed = true,
            _ => {}
        }

        if index > 0 && value.get("decision_id") != decision_id {
            violations.push(SchemaViolation::new(
                format!("{}/decision_id", path),
                "decision_id differs from policy_evaluated",
            ));
        }

        if let Some(channel) = value.get("channel").and_then(Value::as_str) {
            if !channels.insert(channel.to_string()) {
                violations.push(SchemaViolation::new(
                    format!("{}/channel", path),
                    format!("channel '{}' accounted for more than once", channel),
                ));
            }
        }
    }

    let eligible: Option<Vec<String>> = values
        .first()
        .and_then(|v| v.get("eligible_channels"))
        .and_then(|v| serde_json::from_value(v.clone()).ok());
    if let Some(eligible) = eligible {
        if eligible != emitted {
            violations.push(SchemaViolation::new(
                "/0/eligible_channels",
                "eligible_channels does not match the emitted channels",
            ));
        }
    }
}

fn root(base: &str) -> String {
    root_if_empty(base.to_string())
}

fn root_if_empty(path: String) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}
