//! Store and service catalog lookups
//!
//! Simple read-side collaborator: the booking core asks it for service
//! durations, home-visit policy, service radius, and store auto-assign
//! settings. It never carries business logic of its own.

pub mod model;
pub mod service;

pub use model::{ServiceOffering, Store};
pub use service::CatalogService;
