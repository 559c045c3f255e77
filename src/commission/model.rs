//! Commission models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scope a commission rule applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "commission_scope", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommissionScope {
    Global,
    Store,
    Service,
    Freelancer,
}

/// A scoped percentage split definition. Multiple rules may match a
/// payment; the resolver picks exactly one by scope score then priority.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommissionRule {
    pub id: Uuid,
    pub scope_type: CommissionScope,
    pub scope_id: Option<Uuid>,
    pub store_pct: i32,
    pub freelancer_pct: i32,
    pub platform_pct: i32,
    pub priority: i32,
    pub active: bool,
}

impl CommissionRule {
    pub fn percentages_sum(&self) -> i32 {
        self.store_pct + self.freelancer_pct + self.platform_pct
    }
}

/// Resolved three-way split of a payment amount. Shares always sum to the
/// input amount exactly; the platform absorbs the rounding remainder.
#[derive(Debug, Clone, Serialize)]
pub struct CommissionSplit {
    pub store_share: i64,
    pub freelancer_share: i64,
    pub platform_share: i64,
    /// Rule that produced this split, if any matched (None = built-in default).
    pub rule_used: Option<Uuid>,
}
