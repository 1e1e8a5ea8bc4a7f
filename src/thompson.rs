//! Thompson sampling over Beta posteriors for click/no-click outcomes.
//!
//! Notes:
//! - This policy is **seedable** so selection can be reproducible in tests.
//! - Pending views count as failures until their outcome is reported; the
//!   posterior is `Beta(alpha0 + clicks, beta0 + views - clicks)`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};

use crate::{Arm, ArmPair, ArmStats, ArmStore, Error, Result, Selection};

/// Prior pseudo-counts for Thompson sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThompsonConfig {
    /// Prior alpha (must be > 0).
    pub alpha0: f64,
    /// Prior beta (must be > 0).
    pub beta0: f64,
}

impl Default for ThompsonConfig {
    fn default() -> Self {
        Self {
            alpha0: 1.0,
            beta0: 1.0,
        }
    }
}

impl ThompsonConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("alpha0", self.alpha0), ("beta0", self.beta0)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::Configuration(format!(
                    "thompson {name} must be finite and > 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Beta posterior parameters for one arm.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    pub fn expected_value(&self) -> f64 {
        let denom = self.alpha + self.beta;
        if denom <= 0.0 {
            0.5
        } else {
            self.alpha / denom
        }
    }

    pub fn variance(&self) -> f64 {
        let s = self.alpha + self.beta;
        if s <= 0.0 {
            return 0.25;
        }
        self.alpha * self.beta / (s * s * (s + 1.0))
    }
}

/// Seedable Thompson-sampling selector for two arms.
#[derive(Debug, Clone)]
pub struct ThompsonSampling {
    cfg: ThompsonConfig,
    rng: StdRng,
}

impl ThompsonSampling {
    /// Create a selector with a deterministic fixed seed (0).
    pub fn new(cfg: ThompsonConfig) -> Self {
        Self::with_seed(cfg, 0)
    }

    /// Create a selector with a fixed seed (reproducible).
    pub fn with_seed(cfg: ThompsonConfig, seed: u64) -> Self {
        Self {
            cfg,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> ThompsonConfig {
        self.cfg
    }

    pub fn posterior(&self, stats: &ArmStats) -> BetaPosterior {
        BetaPosterior {
            alpha: self.cfg.alpha0 + stats.clicks as f64,
            beta: self.cfg.beta0 + stats.failures() as f64,
        }
    }

    pub fn posteriors(&self, store: &ArmStore) -> ArmPair<BetaPosterior> {
        store.snapshot().map(|_, s| self.posterior(&s))
    }

    fn sample_beta(&mut self, p: BetaPosterior) -> f64 {
        if !(p.alpha.is_finite() && p.beta.is_finite()) || p.alpha <= 0.0 || p.beta <= 0.0 {
            return 0.5;
        }
        match Beta::new(p.alpha, p.beta) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.5,
        }
    }

    /// Draw one sample from `arm`'s posterior.
    pub fn sample(&mut self, store: &ArmStore, arm: Arm) -> f64 {
        let p = self.posterior(store.get(arm));
        self.sample_beta(p)
    }

    /// Sample both posteriors and pick the larger draw.
    ///
    /// Tie-break: arm `B` wins exact ties.
    pub fn select(&mut self, store: &ArmStore) -> Selection {
        let a = self.sample(store, Arm::A);
        let b = self.sample(store, Arm::B);
        Selection::argmax(ArmPair::new(a, b))
    }
}

impl Default for ThompsonSampling {
    fn default() -> Self {
        Self::new(ThompsonConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(va: u64, ca: u64, vb: u64, cb: u64) -> ArmStore {
        let mut s = ArmStore::new();
        for _ in 0..va {
            s.record_view(Arm::A);
        }
        for _ in 0..vb {
            s.record_view(Arm::B);
        }
        for _ in 0..ca {
            s.record_click(Arm::A).unwrap();
        }
        for _ in 0..cb {
            s.record_click(Arm::B).unwrap();
        }
        s
    }

    #[test]
    fn posterior_adds_prior_pseudo_counts() {
        let ts = ThompsonSampling::default();
        let p = ts.posteriors(&store(10, 7, 10, 3));
        assert_eq!(p.a, BetaPosterior { alpha: 8.0, beta: 4.0 });
        assert_eq!(p.b, BetaPosterior { alpha: 4.0, beta: 8.0 });
    }

    #[test]
    fn deterministic_given_same_seed_and_state() {
        let s = store(5, 2, 5, 1);
        let mut t1 = ThompsonSampling::with_seed(ThompsonConfig::default(), 42);
        let mut t2 = ThompsonSampling::with_seed(ThompsonConfig::default(), 42);
        for _ in 0..20 {
            assert_eq!(t1.select(&s), t2.select(&s));
        }
    }

    #[test]
    fn strong_evidence_dominates_selection() {
        let s = store(200, 150, 200, 10);
        let mut ts = ThompsonSampling::with_seed(ThompsonConfig::default(), 7);
        let picks_a = (0..200).filter(|_| ts.select(&s).arm == Arm::A).count();
        assert_eq!(picks_a, 200);
    }

    #[test]
    fn rejects_non_positive_priors() {
        assert!(ThompsonConfig { alpha0: 0.0, beta0: 1.0 }.validate().is_err());
        assert!(ThompsonConfig { alpha0: 1.0, beta0: f64::NAN }.validate().is_err());
        assert!(ThompsonConfig::default().validate().is_ok());
    }

    #[test]
    fn samples_stay_in_unit_interval() {
        let s = store(3, 1, 0, 0);
        let mut ts = ThompsonSampling::with_seed(ThompsonConfig { alpha0: 0.5, beta0: 0.5 }, 3);
        for _ in 0..1000 {
            let x = ts.sample(&s, Arm::B);
            assert!((0.0..=1.0).contains(&x));
        }
    }
}
