//! Error type tests.

use class_capacity::core::{BookingError, BookingStatus, StoreError};

#[test]
fn test_conflict_detection() {
    assert!(BookingError::Store(StoreError::Conflict("40001".into())).is_conflict());
    assert!(!BookingError::Store(StoreError::Timeout).is_conflict());
    assert!(!BookingError::NotFound(1).is_conflict());
}

#[test]
fn test_store_error_converts_transparently() {
    let err: BookingError = StoreError::MissingRow(42).into();
    assert!(matches!(err, BookingError::Store(StoreError::MissingRow(42))));
    assert_eq!(err.to_string(), "booking 42 missing from store");
}

#[test]
fn test_invalid_transition_message_names_states() {
    let err = BookingError::InvalidTransition {
        id: 7,
        from: BookingStatus::Waitlisted,
        to: BookingStatus::Confirmed,
    };
    assert_eq!(
        err.to_string(),
        "booking 7 cannot move from waitlisted to confirmed"
    );
}

#[test]
fn test_status_parse_round_trip_and_rejects_unknown() {
    for status in [
        BookingStatus::Confirmed,
        BookingStatus::Waitlisted,
        BookingStatus::Cancelled,
    ] {
        assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
    }
    let err = "pending".parse::<BookingStatus>().unwrap_err();
    assert_eq!(err.to_string(), "unknown booking status `pending`");
}
