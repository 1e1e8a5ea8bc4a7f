//! Minimum-exploration warm-up gate.
//!
//! Early estimates are noisy: a handful of lucky clicks can make a policy's
//! confidence terms look decisive long before they are. While the gate is open,
//! every decision is a fair coin flip, independent of the arm statistics.
//! Once `window` decisions have been issued the gate closes for good and the
//! selection policy runs unconditionally.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Arm;

/// Default warm-up length, in decisions.
pub const DEFAULT_WARMUP_WINDOW: u64 = 600;

/// Configuration for the warm-up gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WarmupConfig {
    /// Whether minimum exploration is applied at all.
    pub enabled: bool,
    /// Number of decisions forced to a coin flip.
    pub window: u64,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: DEFAULT_WARMUP_WINDOW,
        }
    }
}

impl WarmupConfig {
    /// Enabled gate with the given window.
    pub fn with_window(window: u64) -> Self {
        Self {
            enabled: window > 0,
            window,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Seedable gate that decides whether to bypass policy scoring.
#[derive(Debug, Clone)]
pub struct WarmupGate {
    cfg: WarmupConfig,
    rng: StdRng,
}

impl WarmupGate {
    pub fn new(cfg: WarmupConfig, seed: u64) -> Self {
        Self {
            cfg,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> WarmupConfig {
        self.cfg
    }

    /// True while decisions must be forced to a coin flip.
    pub fn is_open(&self, decisions_issued: u64) -> bool {
        self.cfg.enabled && decisions_issued < self.cfg.window
    }

    /// `Some(arm)` from a fair coin when the gate is open, `None` otherwise.
    pub fn force(&mut self, decisions_issued: u64) -> Option<Arm> {
        if !self.is_open(decisions_issued) {
            return None;
        }
        Some(if self.rng.random::<bool>() { Arm::A } else { Arm::B })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_gate_never_forces() {
        let mut g = WarmupGate::new(WarmupConfig::disabled(), 1);
        assert_eq!(g.force(0), None);
    }

    #[test]
    fn gate_closes_at_window() {
        let mut g = WarmupGate::new(WarmupConfig::with_window(3), 1);
        assert!(g.force(0).is_some());
        assert!(g.force(2).is_some());
        assert_eq!(g.force(3), None);
        assert_eq!(g.force(1000), None);
    }

    #[test]
    fn coin_is_roughly_fair() {
        let mut g = WarmupGate::new(WarmupConfig::with_window(u64::MAX), 99);
        let n = 10_000;
        let a = (0..n).filter(|_| g.force(0) == Some(Arm::A)).count();
        let frac = a as f64 / n as f64;
        assert!((frac - 0.5).abs() < 0.03, "frac={frac}");
    }

    #[test]
    fn zero_window_is_disabled() {
        assert!(!WarmupConfig::with_window(0).enabled);
    }
}
