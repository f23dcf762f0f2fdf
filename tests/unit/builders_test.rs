//! Builder tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use class_capacity::builders::{build_in_memory, ManagerBuilder};
use class_capacity::config::{ManagerConfig, StoreBackendConfig};
use class_capacity::core::{AuditAction, BookingStatus, FitnessClass, NewBooking};
use class_capacity::infra::InMemoryStore;
use class_capacity::util::clock::ManualClock;

#[tokio::test]
async fn test_build_in_memory_wires_audit_log() {
    let (assembled, store) = build_in_memory(ManagerConfig::default()).unwrap();
    store
        .insert_class(FitnessClass {
            id: 1,
            name: "pilates".into(),
            capacity: 1,
        })
        .unwrap();
    let held = store
        .insert_booking(NewBooking {
            class_id: 1,
            participant_id: 10,
            status: BookingStatus::Confirmed,
            requested_at: Utc::now(),
        })
        .await
        .unwrap();

    assembled.manager.cancel_booking(held.id).await.unwrap();

    let log = assembled.audit_log.expect("audit log enabled by default");
    let actions: Vec<_> = log.events().iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Cancel]);
}

#[test]
fn test_zero_audit_buffer_disables_log() {
    let cfg = ManagerConfig {
        audit_buffer: 0,
        ..ManagerConfig::default()
    };
    let (assembled, _store) = build_in_memory(cfg).unwrap();
    assert!(assembled.audit_log.is_none());
}

#[test]
fn test_build_in_memory_rejects_other_backend() {
    let cfg = ManagerConfig {
        store: StoreBackendConfig::Postgres,
        database_url: Some("postgres://localhost/gym".into()),
        ..ManagerConfig::default()
    };
    assert!(build_in_memory(cfg).is_err());
}

#[test]
fn test_builder_rejects_invalid_config() {
    let store = InMemoryStore::new();
    let cfg = ManagerConfig {
        transaction_timeout_secs: 0,
        ..ManagerConfig::default()
    };
    let err = ManagerBuilder::new(store.clone(), store)
        .config(cfg)
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().starts_with("config invalid"), "{err}");
}

#[tokio::test]
async fn test_builder_applies_clock() {
    let at = Utc.with_ymd_and_hms(2024, 2, 2, 12, 0, 0).unwrap();
    let store = InMemoryStore::new();
    store
        .insert_class(FitnessClass {
            id: 4,
            name: "boxing".into(),
            capacity: 2,
        })
        .unwrap();
    let booking = store
        .insert_booking(NewBooking {
            class_id: 4,
            participant_id: 1,
            status: BookingStatus::Waitlisted,
            requested_at: at,
        })
        .await
        .unwrap();

    let builder = ManagerBuilder::new(store.clone(), store).clock(Arc::new(ManualClock::new(at)));
    assert_eq!(builder.config_ref(), &ManagerConfig::default());
    let assembled = builder.build().unwrap();

    let cancelled = assembled.manager.cancel_booking(booking.id).await.unwrap();
    assert_eq!(cancelled.cancelled_at, Some(at));
}
