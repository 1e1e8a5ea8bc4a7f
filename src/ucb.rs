//! UCB1 scoring for two arms.
//!
//! Score is `ctr_estimate + sqrt(3 * ln(n_total) / views)`. The store must be
//! created with [`ArmStore::seeded(1)`](crate::ArmStore::seeded) so neither the
//! logarithm nor the division ever sees zero.

use crate::{Arm, ArmPair, ArmStats, ArmStore, Selection};

/// Exploration coefficient inside the square root of the bonus term.
pub const UCB1_BONUS_C: f64 = 3.0;

/// Coefficient of the bound-proximity indifference threshold.
pub const UCB1_PROXIMITY_C: f64 = 2.0;

/// Deterministic UCB1 selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ucb1;

impl Ucb1 {
    /// Upper confidence bound for one arm given `n_total` views over both arms.
    pub fn bound(stats: &ArmStats, n_total: u64) -> f64 {
        let views = stats.views.max(1) as f64;
        let n = (n_total.max(1)) as f64;
        stats.ctr_estimate + (UCB1_BONUS_C * n.ln() / views).sqrt()
    }

    pub fn bounds(store: &ArmStore) -> ArmPair<f64> {
        let n = store.total_views();
        store.snapshot().map(|_, s| Self::bound(&s, n))
    }

    /// Bounds closer than this are treated as indistinguishable.
    pub fn proximity_threshold(store: &ArmStore) -> f64 {
        let n = store.total_views().max(1) as f64;
        let min_views = store.min_views();
        if min_views == 0 {
            return f64::INFINITY;
        }
        (UCB1_PROXIMITY_C * n.ln() / min_views as f64).sqrt()
    }

    /// Pick the arm with the larger bound. Arm `B` wins exact ties.
    pub fn select(store: &ArmStore) -> Selection {
        Selection::argmax(Self::bounds(store))
    }

    /// Convenience for logging: the bonus term alone.
    pub fn bonus(store: &ArmStore, arm: Arm) -> f64 {
        let s = store.get(arm);
        Self::bound(s, store.total_views()) - s.ctr_estimate
    }
}
