//! In-memory booking and class store.
//!
//! Transactions take a per-class async lock for their whole lifetime and stage
//! writes locally; commit applies the staged rows under the table lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use crate::core::booking::{
    Booking, BookingId, BookingStatus, BookingUpdate, ClassId, FitnessClass, NewBooking,
};
use crate::core::error::StoreError;
use crate::core::store::{BookingStore, BookingTx, ClassStore};

struct Shared {
    bookings: RwLock<BTreeMap<BookingId, Booking>>,
    classes: RwLock<HashMap<ClassId, FitnessClass>>,
    class_locks: Mutex<HashMap<ClassId, Arc<tokio::sync::Mutex<()>>>>,
    next_booking_id: AtomicI64,
    lock_timeout: Option<Duration>,
}

/// Store holding bookings and classes in process memory.
///
/// Cloning is cheap; clones share the same tables.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store whose transactions wait indefinitely for the
    /// class lock.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create an empty store whose transactions give up with
    /// [`StoreError::Timeout`] after waiting `timeout` for the class lock.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(lock_timeout: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(Shared {
                bookings: RwLock::new(BTreeMap::new()),
                classes: RwLock::new(HashMap::new()),
                class_locks: Mutex::new(HashMap::new()),
                next_booking_id: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }

    /// Register or replace a class.
    ///
    /// # Errors
    ///
    /// Rejects a zero capacity.
    pub fn insert_class(&self, class: FitnessClass) -> Result<(), StoreError> {
        if class.capacity == 0 {
            return Err(StoreError::Backend(format!(
                "class {} capacity must be positive",
                class.id
            )));
        }
        self.shared.classes.write().insert(class.id, class);
        Ok(())
    }

    /// Remove a class, leaving its bookings in place.
    ///
    /// The class lock is dropped too unless a transaction holds or awaits it;
    /// a later transaction on the leftover bookings recreates it.
    pub fn remove_class(&self, class_id: ClassId) -> Option<FitnessClass> {
        let removed = self.shared.classes.write().remove(&class_id);
        let mut locks = self.shared.class_locks.lock();
        if locks
            .get(&class_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&class_id);
        }
        removed
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.shared.class_locks.lock().len()
    }

    /// Insert a booking with the next id, holding the class lock while doing so.
    ///
    /// Capacity is not checked here. Cancelled seeds get `cancelled_at` set to
    /// their request time.
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] if the class lock cannot be taken in time.
    pub async fn insert_booking(&self, new: NewBooking) -> Result<Booking, StoreError> {
        let _guard = self.lock_class(new.class_id).await?;
        let id = self.shared.next_booking_id.fetch_add(1, Ordering::AcqRel);
        let booking = Booking {
            id,
            class_id: new.class_id,
            participant_id: new.participant_id,
            status: new.status,
            requested_at: new.requested_at,
            cancelled_at: (new.status == BookingStatus::Cancelled).then_some(new.requested_at),
        };
        self.shared.bookings.write().insert(id, booking.clone());
        tracing::trace!(booking_id = id, class_id = new.class_id, status = %new.status, "booking inserted");
        Ok(booking)
    }

    /// Committed bookings of a class ordered by id.
    pub fn bookings_for_class(&self, class_id: ClassId) -> Vec<Booking> {
        self.shared
            .bookings
            .read()
            .values()
            .filter(|b| b.class_id == class_id)
            .cloned()
            .collect()
    }

    async fn lock_class(&self, class_id: ClassId) -> Result<OwnedMutexGuard<()>, StoreError> {
        let lock = {
            let mut locks = self.shared.class_locks.lock();
            Arc::clone(locks.entry(class_id).or_default())
        };
        match self.shared.lock_timeout {
            Some(timeout) => tokio::time::timeout(timeout, lock.lock_owned())
                .await
                .map_err(|_| {
                    tracing::warn!(class_id, ?timeout, "timed out waiting for class lock");
                    StoreError::Timeout
                }),
            None => Ok(lock.lock_owned().await),
        }
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.shared.bookings.read().get(&id).cloned())
    }

    async fn begin(&self, class_id: ClassId) -> Result<Self::Tx, StoreError> {
        let guard = self.lock_class(class_id).await?;
        Ok(InMemoryTx {
            shared: Arc::clone(&self.shared),
            class_id,
            staged: BTreeMap::new(),
            _guard: guard,
        })
    }
}

#[async_trait]
impl ClassStore for InMemoryStore {
    async fn find_class(&self, id: ClassId) -> Result<Option<FitnessClass>, StoreError> {
        Ok(self.shared.classes.read().get(&id).cloned())
    }
}

/// Transaction over one class of an [`InMemoryStore`].
pub struct InMemoryTx {
    shared: Arc<Shared>,
    class_id: ClassId,
    staged: BTreeMap<BookingId, Booking>,
    _guard: OwnedMutexGuard<()>,
}

impl InMemoryTx {
    fn view(&self, id: BookingId) -> Option<Booking> {
        self.staged
            .get(&id)
            .cloned()
            .or_else(|| self.shared.bookings.read().get(&id).cloned())
    }

    fn class_view(&self, class_id: ClassId, status: BookingStatus) -> Vec<Booking> {
        let mut rows: BTreeMap<BookingId, Booking> = self
            .shared
            .bookings
            .read()
            .values()
            .filter(|b| b.class_id == class_id)
            .map(|b| (b.id, b.clone()))
            .collect();
        for (id, staged) in &self.staged {
            if staged.class_id == class_id {
                rows.insert(*id, staged.clone());
            }
        }
        let mut rows: Vec<Booking> = rows.into_values().filter(|b| b.status == status).collect();
        rows.sort_by_key(Booking::waitlist_key);
        rows
    }
}

#[async_trait]
impl BookingTx for InMemoryTx {
    async fn find_by_id(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.view(id))
    }

    async fn update(
        &mut self,
        id: BookingId,
        update: BookingUpdate,
    ) -> Result<Booking, StoreError> {
        let mut booking = self.view(id).ok_or(StoreError::MissingRow(id))?;
        if booking.class_id != self.class_id {
            return Err(StoreError::Backend(format!(
                "booking {id} belongs to class {}, outside transaction on class {}",
                booking.class_id, self.class_id
            )));
        }
        booking.apply(&update);
        self.staged.insert(id, booking.clone());
        Ok(booking)
    }

    async fn find_oldest_waitlisted(
        &mut self,
        class_id: ClassId,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .class_view(class_id, BookingStatus::Waitlisted)
            .into_iter()
            .next())
    }

    async fn find_class(&mut self, class_id: ClassId) -> Result<Option<FitnessClass>, StoreError> {
        Ok(self.shared.classes.read().get(&class_id).cloned())
    }

    async fn count_confirmed(&mut self, class_id: ClassId) -> Result<u32, StoreError> {
        let confirmed = self.class_view(class_id, BookingStatus::Confirmed).len();
        u32::try_from(confirmed)
            .map_err(|_| StoreError::Backend(format!("confirmed count overflow for class {class_id}")))
    }

    async fn list_by_status(
        &mut self,
        class_id: ClassId,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self.class_view(class_id, status))
    }

    async fn commit(self) -> Result<(), StoreError> {
        let Self {
            shared,
            class_id,
            staged,
            _guard,
        } = self;
        let written = staged.len();
        {
            let mut bookings = shared.bookings.write();
            bookings.extend(staged);
        }
        tracing::trace!(class_id, written, "transaction committed");
        Ok(())
    }
}
