//! Error types for booking and store operations.

use thiserror::Error;

use crate::core::booking::{BookingId, BookingStatus, ClassId};

/// Errors raised by booking store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
    /// Transaction lost a serialization race and may be retried.
    #[error("transaction conflict: {0}")]
    Conflict(String),
    /// Transaction scope could not be acquired in time.
    #[error("transaction timed out")]
    Timeout,
    /// An update targeted a booking the store does not hold.
    #[error("booking {0} missing from store")]
    MissingRow(BookingId),
}

/// Errors returned to callers of the capacity manager.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Booking id is unknown.
    #[error("booking {0} not found")]
    NotFound(BookingId),
    /// Booking was already cancelled; the request is rejected, not ignored.
    #[error("booking {0} is already cancelled")]
    AlreadyCancelled(BookingId),
    /// Referenced class does not exist.
    #[error("class {0} not found")]
    ClassNotFound(ClassId),
    /// Requested status change is not a caller-initiated transition.
    #[error("booking {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Booking the request targeted.
        id: BookingId,
        /// Current status.
        from: BookingStatus,
        /// Requested status.
        to: BookingStatus,
    },
    /// Store failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Whether the error came from a serialization conflict in the store.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict(_)))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
