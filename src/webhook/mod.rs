//! Webhook reconciler module
//!
//! Applies payment gateway capture events to local state. Every step is
//! guarded so duplicate deliveries of the same event are harmless.

pub mod service;

pub use service::ReconcilerService;
