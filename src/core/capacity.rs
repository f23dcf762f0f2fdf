//! Capacity manager: cancellation and waitlist promotion.
//!
//! Both public write paths, [`CapacityManager::cancel_booking`] and
//! [`CapacityManager::update_booking_status`], end in
//! [`CapacityManager::release_and_reallocate`]. The cancellation write, the
//! confirmed recount and the promotion write share one class-scoped store
//! transaction, so concurrent releases in the same class cannot both promote
//! into the same free slot.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::booking::{
    Booking, BookingId, BookingStatus, BookingUpdate, ClassId, Occupancy,
};
use crate::core::error::BookingError;
use crate::core::store::{BookingStore, BookingTx, ClassStore};
use crate::util::clock::{Clock, SystemClock};

/// Default number of times a conflicting transaction is re-run.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Outcome of the reallocation step that follows the release of a slot.
#[derive(Debug)]
enum Reallocation {
    Promoted(Booking),
    Full { confirmed: u32, capacity: u32 },
    EmptyWaitlist,
    ClassMissing,
}

/// Owns the confirmed-count invariant for every class it serves.
pub struct CapacityManager<B, C> {
    bookings: B,
    classes: C,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
    max_conflict_retries: u32,
}

impl<B, C> CapacityManager<B, C>
where
    B: BookingStore,
    C: ClassStore,
{
    /// Create a manager over the given stores using the system clock.
    pub fn new(bookings: B, classes: C) -> Self {
        Self {
            bookings,
            classes,
            clock: Arc::new(SystemClock),
            audit: None,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    /// Replace the clock used to stamp `cancelled_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Set how many times a store conflict is retried before it is surfaced.
    #[must_use]
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Booking store handle.
    pub const fn bookings(&self) -> &B {
        &self.bookings
    }

    /// Class store handle.
    pub const fn classes(&self) -> &C {
        &self.classes
    }

    /// Cancel a booking, promoting the oldest waitlisted booking of the class
    /// if a confirmed slot was released.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `AlreadyCancelled` if the booking was
    /// already cancelled, or the store error that aborted the transaction.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        self.release_and_reallocate(id).await
    }

    /// Apply a caller-requested status change.
    ///
    /// A move to `Cancelled` takes the same path as [`Self::cancel_booking`].
    /// Requesting the current status of a live booking returns it unchanged.
    ///
    /// # Errors
    ///
    /// `AlreadyCancelled` for any request on a cancelled booking,
    /// `InvalidTransition` for any other move between live states, plus the
    /// errors of [`Self::cancel_booking`].
    pub async fn update_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        if status == BookingStatus::Cancelled {
            return self.release_and_reallocate(id).await;
        }

        let current = self.booking(id).await?;
        if current.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(id));
        }
        if current.status.can_transition_to(status) {
            tracing::debug!(booking_id = id, %status, "status unchanged");
            return Ok(current);
        }
        Err(BookingError::InvalidTransition {
            id,
            from: current.status,
            to: status,
        })
    }

    /// Cancel `id` and reallocate its slot, re-running the whole transaction
    /// when the store reports a serialization conflict.
    ///
    /// # Errors
    ///
    /// See [`Self::cancel_booking`].
    #[tracing::instrument(skip(self))]
    pub async fn release_and_reallocate(&self, id: BookingId) -> Result<Booking, BookingError> {
        let mut attempt = 0;
        loop {
            match self.try_release(id).await {
                Err(err) if err.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(booking_id = id, attempt, "cancellation conflicted, retrying: {err}");
                }
                other => return other,
            }
        }
    }

    async fn try_release(&self, id: BookingId) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(id));
        }

        let mut tx = self.bookings.begin(booking.class_id).await?;

        // Another release may have committed between the lookup and `begin`.
        let prior = tx.find_by_id(id).await?.ok_or(BookingError::NotFound(id))?;
        let releases_slot = match prior.status {
            BookingStatus::Confirmed => true,
            BookingStatus::Waitlisted => false,
            BookingStatus::Cancelled => return Err(BookingError::AlreadyCancelled(id)),
        };

        let cancelled = tx
            .update(id, BookingUpdate::cancelled(self.clock.now()))
            .await?;

        let outcome = if releases_slot {
            Some(self.reallocate(&mut tx, prior.class_id).await?)
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(
            booking_id = id,
            class_id = prior.class_id,
            prior_status = %prior.status,
            "booking cancelled"
        );
        self.record(&cancelled, AuditAction::Cancel, Some(prior.status.to_string()));
        match outcome {
            Some(Reallocation::Promoted(promoted)) => {
                self.record(&promoted, AuditAction::Promote, Some(format!("released_by={id}")));
            }
            Some(Reallocation::ClassMissing) => {
                self.record(&cancelled, AuditAction::PromotionSkipped, None);
            }
            Some(Reallocation::Full { confirmed, capacity }) => {
                tracing::debug!(class_id = prior.class_id, confirmed, capacity, "no free slot to reallocate");
            }
            Some(Reallocation::EmptyWaitlist) | None => {}
        }

        Ok(cancelled)
    }

    /// Promote the oldest waitlisted booking if the class has a free slot.
    ///
    /// Recounts confirmed bookings instead of trusting a decrement, so any
    /// earlier drift is corrected by the next release.
    async fn reallocate(
        &self,
        tx: &mut B::Tx,
        class_id: ClassId,
    ) -> Result<Reallocation, BookingError> {
        let Some(class) = tx.find_class(class_id).await? else {
            tracing::warn!(class_id, "class not found, skipping waitlist promotion");
            return Ok(Reallocation::ClassMissing);
        };

        let confirmed = tx.count_confirmed(class_id).await?;
        if confirmed >= class.capacity {
            return Ok(Reallocation::Full {
                confirmed,
                capacity: class.capacity,
            });
        }

        let Some(next) = tx.find_oldest_waitlisted(class_id).await? else {
            tracing::debug!(class_id, "waitlist empty");
            return Ok(Reallocation::EmptyWaitlist);
        };

        let promoted = tx.update(next.id, BookingUpdate::confirmed()).await?;
        tracing::info!(
            class_id,
            booking_id = promoted.id,
            participant_id = promoted.participant_id,
            "promoted from waitlist"
        );
        Ok(Reallocation::Promoted(promoted))
    }

    /// Fetch a booking.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    /// Seat usage for a class, read in one transaction.
    ///
    /// # Errors
    ///
    /// `ClassNotFound` when the class is absent.
    pub async fn occupancy(&self, class_id: ClassId) -> Result<Occupancy, BookingError> {
        let class = self
            .classes
            .find_class(class_id)
            .await?
            .ok_or(BookingError::ClassNotFound(class_id))?;

        let mut tx = self.bookings.begin(class_id).await?;
        let confirmed = tx.count_confirmed(class_id).await?;
        let waitlisted = tx
            .list_by_status(class_id, BookingStatus::Waitlisted)
            .await?
            .len();
        tx.commit().await?;

        Ok(Occupancy {
            class_id,
            capacity: class.capacity,
            confirmed,
            waitlisted: u32::try_from(waitlisted).unwrap_or(u32::MAX),
        })
    }

    /// Waitlisted bookings in promotion order.
    ///
    /// # Errors
    ///
    /// `ClassNotFound` when the class is absent.
    pub async fn waitlist(&self, class_id: ClassId) -> Result<Vec<Booking>, BookingError> {
        if self.classes.find_class(class_id).await?.is_none() {
            return Err(BookingError::ClassNotFound(class_id));
        }
        let mut tx = self.bookings.begin(class_id).await?;
        let waiting = tx
            .list_by_status(class_id, BookingStatus::Waitlisted)
            .await?;
        tx.commit().await?;
        Ok(waiting)
    }

    fn record(&self, booking: &Booking, action: AuditAction, payload: Option<String>) {
        if let Some(audit) = &self.audit {
            audit
                .lock()
                .record(build_audit_event(booking.id, booking.class_id, action, payload));
        }
    }
}
