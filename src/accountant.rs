//! Exploration/exploitation classification and regret accounting.
//!
//! Regret needs ground truth. When the data collaborator supplies historical
//! CTRs ([`OracleCtr`]), every resolved outcome accrues
//! `best_ctr - reward` (realized regret) and every decision accrues
//! `best_ctr - ctr[arm]` (pseudo-regret). Without an oracle both are `None`.

use crate::{Arm, Error, Result};

/// Historical true CTR per arm.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OracleCtr {
    pub a: f64,
    pub b: f64,
}

impl OracleCtr {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    pub fn validate(&self) -> Result<()> {
        for (arm, v) in [(Arm::A, self.a), (Arm::B, self.b)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Configuration(format!(
                    "oracle ctr for arm {arm} must be in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }

    pub fn ctr(&self, arm: Arm) -> f64 {
        match arm {
            Arm::A => self.a,
            Arm::B => self.b,
        }
    }

    pub fn best(&self) -> f64 {
        self.a.max(self.b)
    }

    pub fn best_arm(&self) -> Arm {
        if self.a > self.b {
            Arm::A
        } else {
            Arm::B
        }
    }
}

/// Process-wide exploration and regret counters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExplorationTally {
    pub explorations: u64,
    pub exploitations: u64,
    /// `None` when no oracle CTRs were supplied.
    pub cumulative_regret: Option<f64>,
    pub pseudo_regret: Option<f64>,
}

impl ExplorationTally {
    /// `explorations / (explorations + exploitations)`, or 0 before any decision.
    pub fn exploration_rate(&self) -> f64 {
        let n = self.explorations + self.exploitations;
        if n == 0 {
            0.0
        } else {
            self.explorations as f64 / n as f64
        }
    }

    pub fn decisions(&self) -> u64 {
        self.explorations + self.exploitations
    }
}

/// Tallies decisions and outcomes against an optional oracle.
#[derive(Debug, Clone, Default)]
pub struct Accountant {
    oracle: Option<OracleCtr>,
    tally: ExplorationTally,
}

impl Accountant {
    pub fn new(oracle: Option<OracleCtr>) -> Self {
        let zero = oracle.map(|_| 0.0);
        Self {
            oracle,
            tally: ExplorationTally {
                cumulative_regret: zero,
                pseudo_regret: zero,
                ..ExplorationTally::default()
            },
        }
    }

    pub fn oracle(&self) -> Option<OracleCtr> {
        self.oracle
    }

    /// Count one decision, classified from the pre-decision confidence gap.
    pub fn record_decision(&mut self, arm: Arm, exploring: bool) {
        if exploring {
            self.tally.explorations += 1;
        } else {
            self.tally.exploitations += 1;
        }
        if let (Some(o), Some(r)) = (self.oracle, self.tally.pseudo_regret.as_mut()) {
            *r += o.best() - o.ctr(arm);
        }
    }

    /// Accrue realized regret for one resolved outcome.
    pub fn record_outcome(&mut self, positive: bool) {
        if let (Some(o), Some(r)) = (self.oracle, self.tally.cumulative_regret.as_mut()) {
            let reward = if positive { 1.0 } else { 0.0 };
            *r += o.best() - reward;
        }
    }

    pub fn tally(&self) -> ExplorationTally {
        self.tally
    }
}
