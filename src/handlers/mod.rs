//! API handlers

pub mod assignment;
pub mod availability;
pub mod booking;
pub mod payment;
pub mod webhook;

pub use assignment::*;
pub use availability::*;
pub use booking::*;
pub use payment::*;
pub use webhook::*;
