//! The two tracked arms and their counters.
//!
//! [`ArmStore`] is the only place `views` and `clicks` change. It takes `&mut self`
//! for every mutation, so callers sharing it across threads must serialize access
//! (the [`Engine`](crate::Engine) holds it behind a single lock).

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::{Error, Result};

/// One of the two competing variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arm {
    A,
    B,
}

impl Arm {
    /// Both arms, in stable order.
    pub const ALL: [Arm; 2] = [Arm::A, Arm::B];

    /// Display name (`"A"` / `"B"`).
    pub fn name(self) -> &'static str {
        match self {
            Arm::A => "A",
            Arm::B => "B",
        }
    }

    /// The opposing arm.
    pub fn other(self) -> Arm {
        match self {
            Arm::A => Arm::B,
            Arm::B => Arm::A,
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value per arm.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmPair<T> {
    pub a: T,
    pub b: T,
}

impl<T> ArmPair<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn map<U>(self, mut f: impl FnMut(Arm, T) -> U) -> ArmPair<U> {
        ArmPair {
            a: f(Arm::A, self.a),
            b: f(Arm::B, self.b),
        }
    }

    /// `(arm, &value)` in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (Arm, &T)> {
        [(Arm::A, &self.a), (Arm::B, &self.b)].into_iter()
    }
}

impl<T> Index<Arm> for ArmPair<T> {
    type Output = T;

    fn index(&self, arm: Arm) -> &T {
        match arm {
            Arm::A => &self.a,
            Arm::B => &self.b,
        }
    }
}

impl<T> IndexMut<Arm> for ArmPair<T> {
    fn index_mut(&mut self, arm: Arm) -> &mut T {
        match arm {
            Arm::A => &mut self.a,
            Arm::B => &mut self.b,
        }
    }
}

/// Counters for one arm.
///
/// `ctr_estimate` is a running mean over resolved outcomes (`observed` of them);
/// it is updated incrementally and never recomputed from raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmStats {
    pub views: u64,
    pub clicks: u64,
    pub observed: u64,
    pub ctr_estimate: f64,
}

impl ArmStats {
    /// `clicks / views`, or 0 when the arm was never shown.
    pub fn empirical_ctr(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            self.clicks as f64 / self.views as f64
        }
    }

    /// Views not (yet) matched by a click.
    pub fn failures(&self) -> u64 {
        self.views.saturating_sub(self.clicks)
    }

    fn observe(&mut self, reward: f64) {
        self.observed = self.observed.saturating_add(1);
        self.ctr_estimate += (reward - self.ctr_estimate) / self.observed as f64;
    }
}

/// Per-arm counters for both arms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmStore {
    arms: ArmPair<ArmStats>,
}

impl ArmStore {
    /// Both arms start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Both arms start with `views` pseudo-impressions and no clicks.
    ///
    /// UCB1 uses `seeded(1)` so `ln(n_total)` and `1 / views` stay finite.
    pub fn seeded(views: u64) -> Self {
        let s = ArmStats {
            views,
            ..ArmStats::default()
        };
        Self {
            arms: ArmPair::new(s, s),
        }
    }

    pub fn record_view(&mut self, arm: Arm) {
        let s = &mut self.arms[arm];
        s.views = s.views.saturating_add(1);
    }

    /// Record a positive outcome. Rejected when it would make `clicks > views`.
    pub fn record_click(&mut self, arm: Arm) -> Result<()> {
        let s = &mut self.arms[arm];
        if s.clicks >= s.views {
            return Err(Error::InvalidState {
                arm,
                views: s.views,
                clicks: s.clicks,
            });
        }
        s.clicks += 1;
        s.observe(1.0);
        Ok(())
    }

    /// Record a negative outcome: only the running estimate moves.
    pub fn record_miss(&mut self, arm: Arm) {
        self.arms[arm].observe(0.0);
    }

    pub fn get(&self, arm: Arm) -> &ArmStats {
        &self.arms[arm]
    }

    /// Copy of both arms' counters.
    pub fn snapshot(&self) -> ArmPair<ArmStats> {
        self.arms
    }

    /// Views summed over both arms.
    pub fn total_views(&self) -> u64 {
        self.arms.a.views.saturating_add(self.arms.b.views)
    }

    /// Smaller of the two view counts.
    pub fn min_views(&self) -> u64 {
        self.arms.a.views.min(self.arms.b.views)
    }
}
