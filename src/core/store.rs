//! Store abstractions consumed by the capacity manager.
//!
//! Bookings are read and written through a [`BookingTx`] opened with
//! [`BookingStore::begin`]. A transaction owns exclusive write scope over one
//! class until it is committed or dropped; dropping it without
//! [`BookingTx::commit`] discards every write made through it.

use async_trait::async_trait;

use crate::core::booking::{
    Booking, BookingId, BookingStatus, BookingUpdate, ClassId, FitnessClass,
};
use crate::core::error::StoreError;

/// Transaction over the bookings of a single class.
#[async_trait]
pub trait BookingTx: Send {
    /// Read a booking, observing writes made earlier in this transaction.
    async fn find_by_id(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Write a status change and return the updated booking.
    async fn update(&mut self, id: BookingId, update: BookingUpdate)
        -> Result<Booking, StoreError>;

    /// Waitlisted booking with the earliest `requested_at`, lowest id on ties.
    async fn find_oldest_waitlisted(
        &mut self,
        class_id: ClassId,
    ) -> Result<Option<Booking>, StoreError>;

    /// Look up a class on the transaction's own connection.
    ///
    /// Reallocation reads capacity through this so that a transaction holding
    /// the class lock never waits on a second connection.
    async fn find_class(&mut self, class_id: ClassId) -> Result<Option<FitnessClass>, StoreError>;

    /// Number of confirmed bookings for the class.
    async fn count_confirmed(&mut self, class_id: ClassId) -> Result<u32, StoreError>;

    /// Bookings of the class in `status`, ordered by `requested_at` then id.
    async fn list_by_status(
        &mut self,
        class_id: ClassId,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Make every write of this transaction durable.
    async fn commit(self) -> Result<(), StoreError>;
}

/// Booking persistence.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Transaction type handed out by [`BookingStore::begin`].
    type Tx: BookingTx;

    /// Read a committed booking outside any transaction.
    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Open a transaction scoped to `class_id`.
    ///
    /// Only one transaction per class makes progress at a time, so a
    /// recount-then-promote sequence inside it cannot interleave with another.
    async fn begin(&self, class_id: ClassId) -> Result<Self::Tx, StoreError>;
}

/// Read access to class capacity.
#[async_trait]
pub trait ClassStore: Send + Sync {
    /// Look up a class.
    async fn find_class(&self, id: ClassId) -> Result<Option<FitnessClass>, StoreError>;
}
