//! Route definitions

mod assignment;
mod availability;
mod booking;
mod payment;
mod webhook;

pub use assignment::assignment_routes;
pub use availability::availability_routes;
pub use booking::booking_routes;
pub use payment::payment_routes;
pub use webhook::webhook_routes;
