//! Audit sink tests.

use class_capacity::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, SharedAuditSink,
    TracingAuditSink,
};

#[test]
fn test_in_memory_sink_drops_oldest_when_full() {
    let mut sink = InMemoryAuditSink::new(2);
    for booking_id in 1..=3 {
        sink.record(build_audit_event(booking_id, 1, AuditAction::Cancel, None));
    }
    let ids: Vec<_> = sink.events().iter().map(|e| e.booking_id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_zero_sized_sink_records_nothing() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(1, 1, AuditAction::Promote, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_shared_sink_clones_see_same_events() {
    let reader = SharedAuditSink::new(8);
    let mut writer = reader.clone();
    writer.record(build_audit_event(
        5,
        2,
        AuditAction::Promote,
        Some("released_by=4".into()),
    ));

    let events = reader.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::Promote);
    assert_eq!(events[0].payload.as_deref(), Some("released_by=4"));
}

#[test]
fn test_events_get_unique_ids() {
    let a = build_audit_event(1, 1, AuditAction::Cancel, None);
    let b = build_audit_event(1, 1, AuditAction::Cancel, None);
    assert_ne!(a.event_id, b.event_id);
}

#[test]
fn test_action_serializes_snake_case() {
    let json = serde_json::to_string(&AuditAction::PromotionSkipped).unwrap();
    assert_eq!(json, "\"promotion_skipped\"");
    assert_eq!(AuditAction::PromotionSkipped.as_str(), "promotion_skipped");
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingAuditSink;
    sink.record(build_audit_event(1, 1, AuditAction::Cancel, Some("confirmed".into())));
}
