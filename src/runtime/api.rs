//! API-facing request/response models and handlers.
//!
//! Transport is left to the caller; these functions take and return serde
//! types so any RPC layer can mount them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    Booking, BookingError, BookingId, BookingStatus, BookingStore, CapacityManager, ClassId,
    ClassStore, Occupancy, ParticipantId, StoreError,
};

/// Cancel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    /// Booking to cancel.
    pub booking_id: BookingId,
}

/// Status update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookingStatusRequest {
    /// Booking to update.
    pub booking_id: BookingId,
    /// Requested status.
    pub status: BookingStatus,
}

/// Booking as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingResponse {
    /// Booking identifier.
    pub id: BookingId,
    /// Class identifier.
    pub class_id: ClassId,
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Current status.
    pub status: BookingStatus,
    /// Request time.
    pub requested_at: DateTime<Utc>,
    /// Cancellation time, present only for cancelled bookings.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            class_id: b.class_id,
            participant_id: b.participant_id,
            status: b.status,
            requested_at: b.requested_at,
            cancelled_at: b.cancelled_at,
        }
    }
}

/// Class seat usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyResponse {
    /// Class identifier.
    pub class_id: ClassId,
    /// Configured capacity.
    pub capacity: u32,
    /// Confirmed bookings.
    pub confirmed: u32,
    /// Waitlisted bookings.
    pub waitlisted: u32,
    /// Free confirmed slots.
    pub available: u32,
}

impl From<Occupancy> for OccupancyResponse {
    fn from(o: Occupancy) -> Self {
        Self {
            available: o.available(),
            class_id: o.class_id,
            capacity: o.capacity,
            confirmed: o.confirmed,
            waitlisted: o.waitlisted,
        }
    }
}

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Booking absent.
    NotFound,
    /// Booking already cancelled.
    AlreadyCancelled,
    /// Class absent.
    ClassNotFound,
    /// Status change not allowed.
    InvalidTransition,
    /// Store kept conflicting after retries; the caller may retry.
    Conflict,
    /// Any other store failure.
    StoreFailure,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error kind.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        let code = match &err {
            BookingError::NotFound(_) => ErrorCode::NotFound,
            BookingError::AlreadyCancelled(_) => ErrorCode::AlreadyCancelled,
            BookingError::ClassNotFound(_) => ErrorCode::ClassNotFound,
            BookingError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            BookingError::Store(StoreError::Conflict(_)) => ErrorCode::Conflict,
            BookingError::Store(_) => ErrorCode::StoreFailure,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Cancel a booking.
///
/// # Errors
///
/// The manager's error mapped onto [`ApiError`].
pub async fn cancel_booking<B, C>(
    manager: &CapacityManager<B, C>,
    req: CancelBookingRequest,
) -> Result<BookingResponse, ApiError>
where
    B: BookingStore,
    C: ClassStore,
{
    manager
        .cancel_booking(req.booking_id)
        .await
        .map(BookingResponse::from)
        .map_err(ApiError::from)
}

/// Update a booking's status.
///
/// # Errors
///
/// The manager's error mapped onto [`ApiError`].
pub async fn update_booking_status<B, C>(
    manager: &CapacityManager<B, C>,
    req: UpdateBookingStatusRequest,
) -> Result<BookingResponse, ApiError>
where
    B: BookingStore,
    C: ClassStore,
{
    manager
        .update_booking_status(req.booking_id, req.status)
        .await
        .map(BookingResponse::from)
        .map_err(ApiError::from)
}

/// Seat usage of a class.
///
/// # Errors
///
/// The manager's error mapped onto [`ApiError`].
pub async fn class_occupancy<B, C>(
    manager: &CapacityManager<B, C>,
    class_id: ClassId,
) -> Result<OccupancyResponse, ApiError>
where
    B: BookingStore,
    C: ClassStore,
{
    manager
        .occupancy(class_id)
        .await
        .map(OccupancyResponse::from)
        .map_err(ApiError::from)
}

/// Return a health payload.
pub const fn health() -> Health {
    Health { ok: true }
}
