//! Freelancer availability index
//!
//! Answers "who could take this job" for a date/time window at a store:
//! linkage, geography, declared availability, and conflicting bookings.
//! Ranking of the result is the `ranking` module's job.

pub mod model;
pub mod service;

pub use model::{Candidate, Coordinate, Distance, FindAvailableQuery};
pub use service::AvailabilityIndex;
