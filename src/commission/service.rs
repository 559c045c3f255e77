//! Commission resolver - scope-priority rule selection and split math

use sqlx::PgPool;
use uuid::Uuid;

use crate::commission::model::{CommissionRule, CommissionScope, CommissionSplit};
use crate::error::{ApiError, ApiResult};

// Scope match scores. A service-scoped rule beats a freelancer-scoped one,
// which beats store, which beats global; rule priority breaks ties.
const SCORE_SERVICE_MATCH: i32 = 1000;
const SCORE_FREELANCER_MATCH: i32 = 500;
const SCORE_STORE_MATCH: i32 = 200;
const SCORE_GLOBAL_MATCH: i32 = 100;

/// Fallback split applied when no rule matches at all: store 80,
/// freelancer 10, platform 10.
pub const DEFAULT_SPLIT: (i32, i32, i32) = (80, 10, 10);

/// Score a rule against a payment's scope ids. None = rule does not apply.
fn match_score(
    rule: &CommissionRule,
    store_id: Uuid,
    service_id: Option<Uuid>,
    freelancer_id: Option<Uuid>,
) -> Option<i32> {
    let base = match rule.scope_type {
        CommissionScope::Service => {
            if rule.scope_id.is_some() && rule.scope_id == service_id {
                SCORE_SERVICE_MATCH
            } else {
                return None;
            }
        }
        CommissionScope::Freelancer => {
            if rule.scope_id.is_some() && rule.scope_id == freelancer_id {
                SCORE_FREELANCER_MATCH
            } else {
                return None;
            }
        }
        CommissionScope::Store => {
            if rule.scope_id == Some(store_id) {
                SCORE_STORE_MATCH
            } else {
                return None;
            }
        }
        CommissionScope::Global => {
            if rule.scope_id.is_none() {
                SCORE_GLOBAL_MATCH
            } else {
                return None;
            }
        }
    };

    Some(base + rule.priority)
}

/// Pick the highest-scoring active rule, if any matches.
pub fn select_rule<'a>(
    rules: &'a [CommissionRule],
    store_id: Uuid,
    service_id: Option<Uuid>,
    freelancer_id: Option<Uuid>,
) -> Option<&'a CommissionRule> {
    rules
        .iter()
        .filter(|r| r.active)
        .filter_map(|r| match_score(r, store_id, service_id, freelancer_id).map(|s| (s, r)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, rule)| rule)
}

/// Split an amount by percentages. Store and freelancer shares round to
/// nearest; the platform takes the remainder so the three shares sum to
/// `amount` exactly.
pub fn split_amount(amount: i64, store_pct: i32, freelancer_pct: i32) -> (i64, i64, i64) {
    let store_share = ((amount as f64) * (store_pct as f64) / 100.0).round() as i64;
    let freelancer_share = ((amount as f64) * (freelancer_pct as f64) / 100.0).round() as i64;
    let platform_share = amount - store_share - freelancer_share;
    (store_share, freelancer_share, platform_share)
}

/// DB-backed resolver
#[derive(Clone)]
pub struct CommissionService {
    db_pool: PgPool,
}

impl CommissionService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Resolve the applicable split for a payment.
    pub async fn resolve(
        &self,
        amount: i64,
        store_id: Uuid,
        service_id: Option<Uuid>,
        freelancer_id: Option<Uuid>,
    ) -> ApiResult<CommissionSplit> {
        let rules = sqlx::query_as::<_, CommissionRule>(
            "SELECT id, scope_type, scope_id, store_pct, freelancer_pct, platform_pct, \
             priority, active FROM commission_rules WHERE active = TRUE",
        )
        .fetch_all(&self.db_pool)
        .await?;

        let chosen = select_rule(&rules, store_id, service_id, freelancer_id);

        let (store_pct, freelancer_pct, rule_used) = match chosen {
            Some(rule) => {
                if rule.percentages_sum() != 100 {
                    return Err(ApiError::ValidationError(format!(
                        "Commission rule {} percentages sum to {}, expected 100",
                        rule.id,
                        rule.percentages_sum()
                    )));
                }
                (rule.store_pct, rule.freelancer_pct, Some(rule.id))
            }
            None => (DEFAULT_SPLIT.0, DEFAULT_SPLIT.1, None),
        };

        let (store_share, freelancer_share, platform_share) =
            split_amount(amount, store_pct, freelancer_pct);

        Ok(CommissionSplit {
            store_share,
            freelancer_share,
            platform_share,
            rule_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(
        scope_type: CommissionScope,
        scope_id: Option<Uuid>,
        priority: i32,
    ) -> CommissionRule {
        CommissionRule {
            id: Uuid::new_v4(),
            scope_type,
            scope_id,
            store_pct: 70,
            freelancer_pct: 20,
            platform_pct: 10,
            priority,
            active: true,
        }
    }

    #[test]
    fn test_scope_precedence() {
        let store_id = Uuid::new_v4();
        let service_id = Uuid::new_v4();
        let freelancer_id = Uuid::new_v4();

        let global = rule(CommissionScope::Global, None, 0);
        let store = rule(CommissionScope::Store, Some(store_id), 0);
        let freelancer = rule(CommissionScope::Freelancer, Some(freelancer_id), 0);
        let service = rule(CommissionScope::Service, Some(service_id), 0);

        let rules = vec![
            global.clone(),
            store.clone(),
            freelancer.clone(),
            service.clone(),
        ];

        // Service scope wins over everything
        let chosen =
            select_rule(&rules, store_id, Some(service_id), Some(freelancer_id)).unwrap();
        assert_eq!(chosen.id, service.id);

        // Without a service match, freelancer scope wins
        let chosen = select_rule(&rules, store_id, None, Some(freelancer_id)).unwrap();
        assert_eq!(chosen.id, freelancer.id);

        // Then store, then global
        let chosen = select_rule(&rules, store_id, None, None).unwrap();
        assert_eq!(chosen.id, store.id);

        let chosen = select_rule(&rules, Uuid::new_v4(), None, None).unwrap();
        assert_eq!(chosen.id, global.id);
    }

    #[test]
    fn test_priority_breaks_ties() {
        let store_id = Uuid::new_v4();
        let low = rule(CommissionScope::Store, Some(store_id), 1);
        let high = rule(CommissionScope::Store, Some(store_id), 5);
        let rules = vec![low, high.clone()];

        let chosen = select_rule(&rules, store_id, None, None).unwrap();
        assert_eq!(chosen.id, high.id);
    }

    #[test]
    fn test_inactive_rules_skipped() {
        let store_id = Uuid::new_v4();
        let mut inactive = rule(CommissionScope::Store, Some(store_id), 10);
        inactive.active = false;
        let rules = vec![inactive];

        assert!(select_rule(&rules, store_id, None, None).is_none());
    }

    #[test]
    fn test_no_match_returns_none() {
        let rules = vec![rule(CommissionScope::Store, Some(Uuid::new_v4()), 0)];
        assert!(select_rule(&rules, Uuid::new_v4(), None, None).is_none());
    }

    #[test]
    fn test_split_sums_exactly() {
        // Amounts not divisible by the percentages: remainder goes to platform
        for amount in [0i64, 1, 99, 100, 101, 999, 12345, 1_000_001] {
            for (s, f) in [(80, 10), (70, 20), (33, 33), (50, 45)] {
                let (store, freelancer, platform) = split_amount(amount, s, f);
                assert_eq!(
                    store + freelancer + platform,
                    amount,
                    "amount={} split={}%/{}%",
                    amount,
                    s,
                    f
                );
            }
        }
    }

    #[test]
    fn test_split_even_division() {
        let (store, freelancer, platform) = split_amount(1000, 80, 10);
        assert_eq!((store, freelancer, platform), (800, 100, 100));
    }

    #[test]
    fn test_split_rounding_remainder_to_platform() {
        // 33% of 101 rounds to 33; platform absorbs the leftover
        let (store, freelancer, platform) = split_amount(101, 33, 33);
        assert_eq!(store, 33);
        assert_eq!(freelancer, 33);
        assert_eq!(platform, 35);
    }
}
