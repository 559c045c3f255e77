//! BookVeil booking core library
//!
//! Booking lifecycle, freelancer assignment, availability search,
//! commission resolution and escrow settlement for a salon marketplace.

pub mod assignment;
pub mod availability;
pub mod booking;
pub mod catalog;
pub mod commission;
pub mod config;
pub mod db;
pub mod error;
pub mod escrow;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod ranking;
pub mod routes;
pub mod state;
pub mod timewindow;
pub mod webhook;
