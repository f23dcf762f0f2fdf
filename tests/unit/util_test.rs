//! Clock and telemetry helper tests.

use chrono::{Duration, TimeZone, Utc};
use class_capacity::util::clock::{Clock, ManualClock, SystemClock};
use class_capacity::util::telemetry::init_tracing_with_default;

#[test]
fn test_manual_clock_shared_between_clones() {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let handle = clock.clone();

    handle.advance(Duration::seconds(90));
    assert_eq!(clock.now(), start + Duration::seconds(90));

    let later = start + Duration::days(1);
    clock.set(later);
    assert_eq!(handle.now(), later);
}

#[test]
fn test_system_clock_moves_forward() {
    let a = SystemClock.now();
    let b = SystemClock.now();
    assert!(b >= a);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing_with_default("class_capacity=debug");
    init_tracing_with_default("class_capacity=trace");
}
