//! Commission rule resolution and three-way payment splits

pub mod model;
pub mod service;

pub use model::{CommissionRule, CommissionScope, CommissionSplit};
pub use service::{select_rule, split_amount, CommissionService, DEFAULT_SPLIT};
