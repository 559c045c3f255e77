//! Booking lifecycle
//!
//! State machine from creation through assignment, acceptance, completion,
//! and cancellation, including buffer-conflict rejection at creation time
//! and the overrun cascade when a booking runs long.

pub mod model;
pub mod policy;
pub mod service;

pub use model::{
    Booking, BookingStatus, CancelBookingRequest, CancellationResult, CreateBookingRequest,
    LocationType, UpdateBookingRequest,
};
pub use service::BookingService;
