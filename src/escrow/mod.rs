//! Payments, escrow holds, and settlement
//!
//! Funds captured for a booking are held in escrow; release resolves the
//! commission split and spawns per-payee payout rows exactly once. Refunds
//! call the gateway first and only then touch local state.

pub mod model;
pub mod service;

pub use model::{
    Escrow, EscrowStatus, Payment, PaymentStatus, Payout, PayoutPayee, Refund,
};
pub use service::EscrowService;
