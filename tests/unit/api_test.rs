//! API handler and error mapping tests.

use chrono::Utc;
use class_capacity::core::{
    BookingError, BookingStatus, CapacityManager, FitnessClass, NewBooking, StoreError,
};
use class_capacity::infra::InMemoryStore;
use class_capacity::runtime::{
    cancel_booking, class_occupancy, health, update_booking_status, ApiError,
    CancelBookingRequest, ErrorCode, UpdateBookingStatusRequest,
};

async fn manager_with_full_class() -> (CapacityManager<InMemoryStore, InMemoryStore>, i64, i64) {
    let store = InMemoryStore::new();
    store
        .insert_class(FitnessClass {
            id: 2,
            name: "hiit".into(),
            capacity: 1,
        })
        .unwrap();
    let mut ids = Vec::new();
    for (participant_id, status) in [(1, BookingStatus::Confirmed), (2, BookingStatus::Waitlisted)] {
        let booking = store
            .insert_booking(NewBooking {
                class_id: 2,
                participant_id,
                status,
                requested_at: Utc::now(),
            })
            .await
            .unwrap();
        ids.push(booking.id);
    }
    (CapacityManager::new(store.clone(), store), ids[0], ids[1])
}

#[test]
fn test_error_codes() {
    let cases = [
        (BookingError::NotFound(1), ErrorCode::NotFound),
        (BookingError::AlreadyCancelled(1), ErrorCode::AlreadyCancelled),
        (BookingError::ClassNotFound(1), ErrorCode::ClassNotFound),
        (
            BookingError::InvalidTransition {
                id: 1,
                from: BookingStatus::Waitlisted,
                to: BookingStatus::Confirmed,
            },
            ErrorCode::InvalidTransition,
        ),
        (
            BookingError::Store(StoreError::Conflict("retry".into())),
            ErrorCode::Conflict,
        ),
        (BookingError::Store(StoreError::Timeout), ErrorCode::StoreFailure),
    ];
    for (err, code) in cases {
        assert_eq!(ApiError::from(err).code, code);
    }
}

#[tokio::test]
async fn test_cancel_then_occupancy() {
    let (manager, held, waiting) = manager_with_full_class().await;

    let resp = cancel_booking(&manager, CancelBookingRequest { booking_id: held })
        .await
        .unwrap();
    assert_eq!(resp.status, BookingStatus::Cancelled);
    assert!(resp.cancelled_at.is_some());

    let occupancy = class_occupancy(&manager, 2).await.unwrap();
    assert_eq!(occupancy.confirmed, 1);
    assert_eq!(occupancy.available, 0);
    assert_eq!(
        manager.booking(waiting).await.unwrap().status,
        BookingStatus::Confirmed
    );

    let err = cancel_booking(&manager, CancelBookingRequest { booking_id: held })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AlreadyCancelled);
}

#[tokio::test]
async fn test_update_request_from_json() {
    let (manager, _held, waiting) = manager_with_full_class().await;

    let req: UpdateBookingStatusRequest =
        serde_json::from_str(&format!(r#"{{"booking_id":{waiting},"status":"confirmed"}}"#))
            .unwrap();
    let err = update_booking_status(&manager, req).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);

    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["code"], "invalid_transition");
}

#[tokio::test]
async fn test_unknown_class_occupancy() {
    let (manager, _, _) = manager_with_full_class().await;
    let err = class_occupancy(&manager, 99).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ClassNotFound);
}

#[test]
fn test_health() {
    assert!(health().ok);
}
