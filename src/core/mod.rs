//! Booking model, store traits and the capacity manager.

pub mod audit;
pub mod booking;
pub mod capacity;
pub mod error;
pub mod store;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, SharedAuditSink,
    TracingAuditSink,
};
pub use booking::{
    Booking, BookingId, BookingStatus, BookingUpdate, ClassId, FitnessClass, NewBooking,
    Occupancy, ParseStatusError, ParticipantId,
};
pub use capacity::{CapacityManager, DEFAULT_MAX_CONFLICT_RETRIES};
pub use error::{AppResult, BookingError, StoreError};
pub use store::{BookingStore, BookingTx, ClassStore};
