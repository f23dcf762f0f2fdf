//! # Class Capacity
//!
//! Capacity and waitlist reallocation for class bookings.
//!
//! A class has a fixed number of confirmed slots. Bookings beyond that wait in
//! a queue ordered by request time. This crate owns the release half of that
//! lifecycle: when a confirmed booking is cancelled, the slot it frees goes to
//! the longest-waiting booking of the same class, and the number of confirmed
//! bookings never exceeds the class capacity.
//!
//! ## Key Features
//!
//! - **Single reallocation routine**: cancel-by-id and status updates share the
//!   same release path
//! - **Class-scoped transactions**: cancellation, recount and promotion commit
//!   together, so concurrent releases cannot over-promote
//! - **Self-correcting**: the confirmed count is recomputed on every release
//! - **Pluggable stores**: in-memory store for tests and embedding, Postgres
//!   behind the `postgres` feature
//! - **Audit trail**: cancellations and promotions are recorded to an
//!   [`core::AuditSink`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use class_capacity::builders::build_in_memory;
//! use class_capacity::config::ManagerConfig;
//! use class_capacity::core::{BookingStatus, FitnessClass, NewBooking};
//!
//! let (assembled, store) = build_in_memory(ManagerConfig::default())?;
//! store.insert_class(FitnessClass { id: 1, name: "spin".into(), capacity: 1 })?;
//! let held = store.insert_booking(NewBooking {
//!     class_id: 1,
//!     participant_id: 7,
//!     status: BookingStatus::Confirmed,
//!     requested_at: chrono::Utc::now(),
//! }).await?;
//!
//! let cancelled = assembled.manager.cancel_booking(held.id).await?;
//! assert_eq!(cancelled.status, BookingStatus::Cancelled);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Booking model, store traits and the capacity manager.
pub mod core;
/// Configuration models for the manager and store backends.
pub mod config;
/// Builders to construct a manager from configuration.
pub mod builders;
/// Infrastructure adapters for storage backends.
pub mod infra;
/// API surface for an RPC layer.
pub mod runtime;
/// Shared utilities.
pub mod util;
