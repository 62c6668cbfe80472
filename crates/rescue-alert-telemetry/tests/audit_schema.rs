//! Audit batches produced by the engine must satisfy the published schemas

use proptest::prelude::*;
use rescue_alert_core::{FixedClock, GeofenceSnapshot, ReasonCode, Tier};
use rescue_alert_policy::prelude::*;
use rescue_alert_policy::{EvaluatorOptions, RequestField};
use rescue_alert_telemetry::prelude::*;
use serde_json::{json, Value};

const SEGMENT: &str = "nearby_volunteers";

fn request(channels: &[&str]) -> EvaluateRequest {
    EvaluateRequest::new(
        "case-2026-0311",
        "9c1f0e7d",
        Tier::T3,
        GeofenceSnapshot::new(-33_868_800, 151_209_300, 5_000),
        900,
        channels,
        SEGMENT,
    )
}

fn clock() -> FixedClock {
    FixedClock::parse("2026-03-11T08:00:00Z").unwrap()
}

fn as_values(decision: &Decision) -> Vec<Value> {
    decision
        .audit_events
        .iter()
        .map(|event| serde_json::to_value(event).unwrap())
        .collect()
}

#[test]
fn mixed_decision_validates() {
    let events = vec![
        MemoryEvent::partner_active("sms", SEGMENT),
        MemoryEvent::partner_active("push", SEGMENT),
        MemoryEvent::consent_granted("sms", SEGMENT),
        MemoryEvent::EvaluateRequested(request(&["sms", "push", "email"])),
    ];
    let decision = PolicyEngine::default().evaluate_log(&events, &clock()).unwrap();

    assert_eq!(decision.eligible_channels, vec!["sms"]);
    assert_eq!(validate_decision(&decision), Ok(()));
    for value in as_values(&decision) {
        assert_eq!(validate_audit_event(&value), Ok(()));
    }
}

#[test]
fn ambiguous_decision_validates() {
    let request = request(&["sms", "push"])
        .without(RequestField::Tier)
        .with_field(RequestField::GeofenceSnapshot, json!({"lat_microdegrees": 1.25}));
    let events = vec![MemoryEvent::EvaluateRequested(request)];

    let decision = PolicyEngine::default().evaluate_log(&events, &clock()).unwrap();
    assert!(decision.ambiguous);

    let values = as_values(&decision);
    assert_eq!(values[0]["tier"], Value::Null);
    assert_eq!(values[0]["geofence_snapshot"], Value::Null);
    assert_eq!(validate_audit_stream(&values), Ok(()));
}

#[test]
fn predicted_ineligibility_validates_when_enabled_or_not() {
    let projection = replay(&[MemoryEvent::partner_active("sms", SEGMENT)]);

    for emit_predicted_ineligibility in [true, false] {
        let evaluator = Evaluator::with_options(EvaluatorOptions {
            per_recipient_caps: true,
            emit_predicted_ineligibility,
        });
        let decision = evaluator
            .evaluate(&request(&["sms", "push"]), &projection, &clock())
            .unwrap();
        let values = as_values(&decision);

        assert_eq!(
            values[0].get("predicted_ineligibility").is_some(),
            emit_predicted_ineligibility
        );
        assert_eq!(validate_audit_stream(&values), Ok(()));
    }
}

#[test]
fn tampered_batch_is_rejected() {
    let events = vec![
        MemoryEvent::partner_active("sms", SEGMENT),
        MemoryEvent::EvaluateRequested(request(&["sms"])),
    ];
    let decision = PolicyEngine::default().evaluate_log(&events, &clock()).unwrap();
    let mut values = as_values(&decision);
    values[1]["reason_code"] = json!("vibes");

    let violations = validate_audit_stream(&values).unwrap_err();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, "/1/reason_code");
}

#[test]
fn decisions_chain_into_a_verifiable_trail() {
    let engine = PolicyEngine::default();
    let metrics = MetricsCollector::new();
    let mut trail = AuditTrail::new();

    let mut events = vec![
        MemoryEvent::partner_active("sms", SEGMENT),
        MemoryEvent::consent_granted("sms", SEGMENT),
        MemoryEvent::EvaluateRequested(request(&["sms", "push"])),
    ];
    let first = engine.evaluate_log(&events, &clock()).unwrap();
    trail.add_decision(&first).unwrap();
    metrics.record_decision(&first);

    events.push(MemoryEvent::UserPaused);
    events.push(MemoryEvent::EvaluateRequested(request(&["sms", "push"])));
    let second = engine.evaluate_log(&events, &clock()).unwrap();
    trail.add_decision(&second).unwrap();
    metrics.record_decision(&second);

    assert_eq!(trail.len(), first.audit_events.len() + second.audit_events.len());
    assert!(trail.verify());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.evaluations, 2);
    assert_eq!(snapshot.eligible_channels, 1);
    assert_eq!(snapshot.suppressions_for(ReasonCode::PartnerUnavailable), 2);
    assert_eq!(snapshot.suppressions_for(ReasonCode::UserPaused), 1);
}

fn arb_event() -> impl Strategy<Value = MemoryEvent> {
    let channel = prop::sample::select(vec!["sms", "push", "email"]);
    (channel, 0u8..9).prop_map(|(channel, kind)| match kind {
        0 | 1 => MemoryEvent::partner_active(channel, SEGMENT),
        2 | 3 => MemoryEvent::consent_granted(channel, SEGMENT),
        4 => MemoryEvent::rate_limit(channel, SEGMENT, "2026-03-11T09:00:00Z"),
        5 => MemoryEvent::HumanReviewFlagged {
            channels: vec![channel.to_string()],
        },
        6 => MemoryEvent::LowConfidenceFlagged,
        7 => MemoryEvent::EscalationProofRequired,
        _ => MemoryEvent::Unknown,
    })
}

proptest! {
    #[test]
    fn prop_every_decision_satisfies_schemas(
        events in prop::collection::vec(arb_event(), 0..25),
        mask in 0u8..128,
    ) {
        let mut request = request(&["sms", "push", "email"]);
        for (bit, field) in RequestField::ALL.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                request = request.without(*field);
            }
        }
        let decision = evaluate(&request, &replay(&events), &clock()).unwrap();

        prop_assert_eq!(validate_decision(&decision), Ok(()));
    }
}
