//! Postgres-backed booking and class store.
//!
//! Each transaction runs at `SERIALIZABLE` isolation and locks the class row
//! with `FOR UPDATE`, so releases within one class are applied one after the
//! other. Serialization failures surface as [`StoreError::Conflict`] and are
//! retried by the capacity manager.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::core::booking::{
    Booking, BookingId, BookingStatus, BookingUpdate, ClassId, FitnessClass, NewBooking,
};
use crate::core::error::StoreError;
use crate::core::store::{BookingStore, BookingTx, ClassStore};

const BOOKING_COLUMNS: &str = "id, class_id, participant_id, status, requested_at, cancelled_at";

/// Store backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PostgresStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Open a pool against `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection fails.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(map_sqlx)?;
        Ok(Self::new(pool))
    }

    /// Bound every statement inside a transaction by `timeout`.
    #[must_use]
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Migration statements for the class and booking tables.
    pub fn migrations() -> &'static [&'static str] {
        &[r"
CREATE TABLE IF NOT EXISTS gym_classes (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    capacity INTEGER NOT NULL CHECK (capacity > 0)
);
CREATE TABLE IF NOT EXISTS class_bookings (
    id BIGSERIAL PRIMARY KEY,
    class_id BIGINT NOT NULL,
    participant_id BIGINT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('confirmed', 'waitlisted', 'cancelled')),
    requested_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    cancelled_at TIMESTAMPTZ,
    CHECK ((status = 'cancelled') = (cancelled_at IS NOT NULL))
);
CREATE INDEX IF NOT EXISTS idx_class_bookings_waitlist
    ON class_bookings (class_id, status, requested_at, id);
"]
    }

    /// Apply [`Self::migrations`].
    ///
    /// # Errors
    ///
    /// Returns the first failing statement's error.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in Self::migrations() {
            sqlx::raw_sql(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
        }
        Ok(())
    }

    /// Register or replace a class.
    ///
    /// # Errors
    ///
    /// Rejects a capacity outside `1..=i32::MAX`, or returns the database error.
    pub async fn insert_class(&self, class: &FitnessClass) -> Result<(), StoreError> {
        let capacity = i32::try_from(class.capacity)
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| {
                StoreError::Backend(format!("class {} capacity must be positive", class.id))
            })?;
        sqlx::query(
            "INSERT INTO gym_classes (id, name, capacity) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, capacity = EXCLUDED.capacity",
        )
        .bind(class.id)
        .bind(&class.name)
        .bind(capacity)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Insert a booking without capacity checks.
    ///
    /// # Errors
    ///
    /// Returns the database error.
    pub async fn insert_booking(&self, new: &NewBooking) -> Result<Booking, StoreError> {
        let cancelled_at = (new.status == BookingStatus::Cancelled).then_some(new.requested_at);
        let sql = format!(
            "INSERT INTO class_bookings (class_id, participant_id, status, requested_at, cancelled_at)
             VALUES ($1, $2, $3, $4, $5) RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.class_id)
            .bind(new.participant_id)
            .bind(new.status.as_str())
            .bind(new.requested_at)
            .bind(cancelled_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        booking_from_row(&row)
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    type Tx = PostgresTx;

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM class_bookings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn begin(&self, class_id: ClassId) -> Result<Self::Tx, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        if let Some(timeout) = self.statement_timeout {
            let sql = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }
        let class = sqlx::query("SELECT id, name, capacity FROM gym_classes WHERE id = $1 FOR UPDATE")
            .bind(class_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .as_ref()
            .map(class_from_row)
            .transpose()?;
        Ok(PostgresTx {
            tx,
            class_id,
            class,
        })
    }
}

#[async_trait]
impl ClassStore for PostgresStore {
    async fn find_class(&self, id: ClassId) -> Result<Option<FitnessClass>, StoreError> {
        let row = sqlx::query("SELECT id, name, capacity FROM gym_classes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(class_from_row).transpose()
    }
}

/// Serializable transaction holding the class row lock.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    class_id: ClassId,
    /// Class row as locked by `begin`; `None` when the class does not exist.
    class: Option<FitnessClass>,
}

#[async_trait]
impl BookingTx for PostgresTx {
    async fn find_by_id(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM class_bookings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn update(
        &mut self,
        id: BookingId,
        update: BookingUpdate,
    ) -> Result<Booking, StoreError> {
        let sql = format!(
            "UPDATE class_bookings SET status = $2, cancelled_at = $3
             WHERE id = $1 AND class_id = $4 RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(update.status().as_str())
            .bind(update.cancelled_at())
            .bind(self.class_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref()
            .map(booking_from_row)
            .transpose()?
            .ok_or(StoreError::MissingRow(id))
    }

    async fn find_oldest_waitlisted(
        &mut self,
        class_id: ClassId,
    ) -> Result<Option<Booking>, StoreError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM class_bookings
             WHERE class_id = $1 AND status = 'waitlisted'
             ORDER BY requested_at ASC, id ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(class_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn find_class(&mut self, class_id: ClassId) -> Result<Option<FitnessClass>, StoreError> {
        if class_id == self.class_id {
            return Ok(self.class.clone());
        }
        let row = sqlx::query("SELECT id, name, capacity FROM gym_classes WHERE id = $1")
            .bind(class_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(class_from_row).transpose()
    }

    async fn count_confirmed(&mut self, class_id: ClassId) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM class_bookings WHERE class_id = $1 AND status = 'confirmed'",
        )
        .bind(class_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        u32::try_from(count)
            .map_err(|_| StoreError::Backend(format!("confirmed count overflow for class {class_id}")))
    }

    async fn list_by_status(
        &mut self,
        class_id: ClassId,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM class_bookings
             WHERE class_id = $1 AND status = $2
             ORDER BY requested_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(class_id)
            .bind(status.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}

fn class_from_row(row: &PgRow) -> Result<FitnessClass, StoreError> {
    let id: ClassId = row.try_get("id").map_err(map_sqlx)?;
    let capacity: i32 = row.try_get("capacity").map_err(map_sqlx)?;
    Ok(FitnessClass {
        id,
        name: row.try_get("name").map_err(map_sqlx)?,
        capacity: u32::try_from(capacity)
            .map_err(|_| StoreError::Backend(format!("class {id} has negative capacity")))?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    let status: String = row.try_get("status").map_err(map_sqlx)?;
    Ok(Booking {
        id: row.try_get("id").map_err(map_sqlx)?,
        class_id: row.try_get("class_id").map_err(map_sqlx)?,
        participant_id: row.try_get("participant_id").map_err(map_sqlx)?,
        status: status
            .parse()
            .map_err(|e: crate::core::booking::ParseStatusError| StoreError::Backend(e.to_string()))?,
        requested_at: row.try_get("requested_at").map_err(map_sqlx)?,
        cancelled_at: row.try_get("cancelled_at").map_err(map_sqlx)?,
    })
}

/// Map a driver error onto the store taxonomy.
///
/// SQLSTATE `40001` (serialization failure) and `40P01` (deadlock) are
/// retryable conflicts; `57014` is a cancelled statement, which is how
/// `statement_timeout` reports itself.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("40001" | "40P01") => return StoreError::Conflict(db_err.message().to_string()),
            Some("57014") => return StoreError::Timeout,
            _ => {}
        }
    }
    if matches!(err, sqlx::Error::PoolTimedOut) {
        return StoreError::Timeout;
    }
    StoreError::Backend(err.to_string())
}
