//! API surface for an RPC layer.

pub mod api;

pub use api::{
    cancel_booking, class_occupancy, health, update_booking_status, ApiError, BookingResponse,
    CancelBookingRequest, ErrorCode, Health, OccupancyResponse, UpdateBookingStatusRequest,
};
