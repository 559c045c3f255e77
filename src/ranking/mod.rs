//! Candidate ranking
//!
//! Orders availability-index output by a linear score over distance,
//! rating, and current load. The weights are a product decision, not a
//! derived quantity, so they live in one configurable struct.

use crate::availability::model::{Candidate, Distance};

/// Weights applied to each candidate signal. Lower score ranks first:
/// distance counts against a candidate, rating counts for them, and load
/// penalizes heavily enough to spread work across the roster.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub distance: f64,
    pub rating: f64,
    pub load: f64,
    pub max_results: usize,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            distance: 1.0,
            rating: 2.0,
            load: 5.0,
            max_results: 10,
        }
    }
}

/// Score a single candidate; lower is better.
pub fn score(candidate: &Candidate, weights: &RankWeights) -> f64 {
    candidate.distance.effective_km() * weights.distance - candidate.rating * weights.rating
        + candidate.load as f64 * weights.load
}

/// Rank candidates best-first and truncate to `max_results`.
///
/// Unknown distances sort after every known distance regardless of rating
/// or load; a stable sort keeps input order among exact ties.
pub fn rank(mut candidates: Vec<Candidate>, weights: &RankWeights) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        let known_order = matches!(a.distance, Distance::Unknown)
            .cmp(&matches!(b.distance, Distance::Unknown));
        known_order.then_with(|| {
            score(a, weights)
                .partial_cmp(&score(b, weights))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    candidates.truncate(weights.max_results);
    candidates
}
