//! Booking and class records plus the booking status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Booking identifier.
pub type BookingId = i64;
/// Class identifier.
pub type ClassId = i64;
/// Participant (member) identifier.
pub type ParticipantId = i64;

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Holds a slot counted against class capacity.
    Confirmed,
    /// Queued for a slot, ordered by request time.
    Waitlisted,
    /// Terminal; releases any slot the booking held.
    Cancelled,
}

impl BookingStatus {
    /// Stable lowercase name used on the wire and in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Waitlisted => "waitlisted",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the booking still takes part in capacity accounting.
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether a caller may request a move from `self` to `next`.
    ///
    /// Promotion (`Waitlisted -> Confirmed`) is reserved for reallocation and
    /// is not a caller-initiated transition. Identity moves between live
    /// states are accepted as no-ops.
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Confirmed | Self::Waitlisted, Self::Cancelled) => true,
            (Self::Confirmed, Self::Confirmed) | (Self::Waitlisted, Self::Waitlisted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status `{0}`")]
pub struct ParseStatusError(pub String);

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "waitlisted" => Ok(Self::Waitlisted),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A participant's booking for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier; lower ids were inserted earlier.
    pub id: BookingId,
    /// Class the booking is for.
    pub class_id: ClassId,
    /// Participant holding the booking.
    pub participant_id: ParticipantId,
    /// Current status.
    pub status: BookingStatus,
    /// When the booking was requested; waitlist order key.
    pub requested_at: DateTime<Utc>,
    /// Set if and only if `status` is `Cancelled`.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Check the `cancelled_at` / `Cancelled` pairing.
    pub fn is_consistent(&self) -> bool {
        matches!(
            (self.status, self.cancelled_at),
            (BookingStatus::Cancelled, Some(_))
                | (BookingStatus::Confirmed | BookingStatus::Waitlisted, None)
        )
    }

    /// Apply a store update in place.
    pub fn apply(&mut self, update: &BookingUpdate) {
        self.status = update.status;
        self.cancelled_at = update.cancelled_at;
    }

    /// Key used to order waitlisted bookings: earliest request, then lowest id.
    pub fn waitlist_key(&self) -> (DateTime<Utc>, BookingId) {
        (self.requested_at, self.id)
    }
}

/// Seed data for a booking; creation-time placement is decided by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    /// Class the booking is for.
    pub class_id: ClassId,
    /// Participant holding the booking.
    pub participant_id: ParticipantId,
    /// Initial status.
    pub status: BookingStatus,
    /// Request time; waitlist order key.
    pub requested_at: DateTime<Utc>,
}

/// A class with a fixed number of confirmed slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitnessClass {
    /// Class identifier.
    pub id: ClassId,
    /// Display name.
    pub name: String,
    /// Maximum simultaneous confirmed bookings.
    pub capacity: u32,
}

/// Fields a store writes when a booking changes status.
///
/// Only constructible through [`BookingUpdate::cancelled`] and
/// [`BookingUpdate::confirmed`], which keep `cancelled_at` paired with the
/// status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingUpdate {
    status: BookingStatus,
    cancelled_at: Option<DateTime<Utc>>,
}

impl BookingUpdate {
    /// Cancel, stamping the cancellation time.
    pub const fn cancelled(at: DateTime<Utc>) -> Self {
        Self {
            status: BookingStatus::Cancelled,
            cancelled_at: Some(at),
        }
    }

    /// Confirm, clearing any cancellation stamp.
    pub const fn confirmed() -> Self {
        Self {
            status: BookingStatus::Confirmed,
            cancelled_at: None,
        }
    }

    /// Target status.
    pub const fn status(&self) -> BookingStatus {
        self.status
    }

    /// Cancellation stamp written with the status.
    pub const fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }
}

/// Snapshot of a class's seat usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    /// Class the snapshot describes.
    pub class_id: ClassId,
    /// Configured capacity.
    pub capacity: u32,
    /// Confirmed bookings.
    pub confirmed: u32,
    /// Waitlisted bookings.
    pub waitlisted: u32,
}

impl Occupancy {
    /// Free confirmed slots.
    pub const fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.confirmed)
    }

    /// Whether the capacity invariant holds.
    pub const fn is_within_capacity(&self) -> bool {
        self.confirmed <= self.capacity
    }
}
