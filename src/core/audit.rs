//! Audit trail for cancellations and promotions.
//!
//! Every committed cancellation and promotion is recorded, along with
//! promotions skipped because the class could not be found.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::booking::{BookingId, ClassId};
use crate::util::clock::now_ms;

/// What happened to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Booking moved to cancelled.
    Cancel,
    /// Waitlisted booking moved to confirmed.
    Promote,
    /// A confirmed slot was released but the class lookup failed.
    PromotionSkipped,
}

impl AuditAction {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::Promote => "promote",
            Self::PromotionSkipped => "promotion_skipped",
        }
    }
}

/// One recorded booking change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Random v4 id, unique per event.
    pub event_id: String,
    /// Booking the event concerns.
    pub booking_id: BookingId,
    /// Class the booking belongs to.
    pub class_id: ClassId,
    /// Action taken.
    pub action: AuditAction,
    /// Unix time of recording, in milliseconds.
    pub created_at_ms: u128,
    /// Free-form detail, e.g. the prior status or the releasing booking.
    pub payload: Option<String>,
}

/// Destination for booking audit events.
///
/// Called after the owning transaction committed, never for rolled-back work.
pub trait AuditSink: Send {
    /// Store or forward `event`.
    fn record(&mut self, event: AuditEvent);
}

/// Ring buffer of the most recent events.
pub struct InMemoryAuditSink {
    buffer: VecDeque<AuditEvent>,
    limit: usize,
}

impl InMemoryAuditSink {
    /// Keep at most `limit` events; 0 keeps none.
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(limit.min(1024)),
            limit,
        }
    }

    /// Buffered events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        Vec::from(self.buffer.clone())
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.limit == 0 {
            return;
        }
        while self.buffer.len() >= self.limit {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }
}

/// Cloneable handle over an [`InMemoryAuditSink`]; one clone is handed to the
/// manager, the others read events back.
#[derive(Clone)]
pub struct SharedAuditSink {
    inner: Arc<Mutex<InMemoryAuditSink>>,
}

impl SharedAuditSink {
    /// Shared ring buffer keeping at most `limit` events.
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryAuditSink::new(limit))),
        }
    }

    /// Buffered events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().events()
    }
}

impl AuditSink for SharedAuditSink {
    fn record(&mut self, event: AuditEvent) {
        self.inner.lock().record(event);
    }
}

/// Sink that forwards events to `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::info!(
            target: "class_capacity::audit",
            event_id = %event.event_id,
            booking_id = event.booking_id,
            class_id = event.class_id,
            action = event.action.as_str(),
            payload = event.payload.as_deref().unwrap_or(""),
            "booking audit"
        );
    }
}

/// Stamp a new event with a fresh id and the current time.
pub fn build_audit_event(
    booking_id: BookingId,
    class_id: ClassId,
    action: AuditAction,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        booking_id,
        class_id,
        action,
        created_at_ms: now_ms(),
        payload,
    }
}
