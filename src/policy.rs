//! Selection policies behind one capability trait.
//!
//! [`ThompsonSampling`], [`Ucb1`], and [`Alternation`] all expose the same
//! surface: pick an arm from the current [`ArmStore`], report the deterministic
//! scores the exploration accountant compares, and describe their per-arm
//! parameters for snapshots. [`SelectionPolicy`] is the tagged enum the engine
//! stores; reporting code matches on [`PolicyKind`] rather than concrete types.

use std::fmt;

use crate::{Arm, ArmPair, ArmStore, ThompsonConfig, ThompsonSampling, Ucb1, TIEBREAK_EPS};

/// Which policy family is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolicyKind {
    #[default]
    Thompson,
    Ucb1,
    Alternation,
}

impl PolicyKind {
    /// Algorithm name used in run reports.
    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::Thompson => "Thompson",
            PolicyKind::Ucb1 => "UCB1",
            PolicyKind::Alternation => "Alternation",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An arm choice plus the per-arm values it was made from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub arm: Arm,
    pub scores: ArmPair<f64>,
}

impl Selection {
    /// `A` only when its score is strictly larger; ties go to `B`.
    pub fn argmax(scores: ArmPair<f64>) -> Self {
        let arm = if scores.a > scores.b { Arm::A } else { Arm::B };
        Self { arm, scores }
    }
}

/// Policy-specific per-arm parameters, as exposed in snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolicyParams {
    Thompson { alpha: f64, beta: f64 },
    Ucb1 { ctr_estimate: f64, bound: f64 },
    Alternation,
}

/// Common interface for the two-arm selection policies.
pub trait ArmPolicy {
    fn kind(&self) -> PolicyKind;

    /// Choose an arm. May consume randomness or advance internal state.
    fn select(&mut self, store: &ArmStore) -> Selection;

    /// Deterministic per-arm scores used to classify exploration.
    fn confidence_scores(&self, store: &ArmStore) -> ArmPair<f64>;

    /// Score gaps smaller than this count as "exploring".
    fn indifference_threshold(&self, store: &ArmStore) -> f64;

    fn snapshot_params(&self, store: &ArmStore) -> ArmPair<PolicyParams>;

    /// Pre-decision classification: are the arms still indistinguishable?
    fn is_exploring(&self, store: &ArmStore) -> bool {
        let s = self.confidence_scores(store);
        (s.a - s.b).abs() < self.indifference_threshold(store)
    }
}

impl ArmPolicy for ThompsonSampling {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Thompson
    }

    fn select(&mut self, store: &ArmStore) -> Selection {
        ThompsonSampling::select(self, store)
    }

    /// Posterior means.
    fn confidence_scores(&self, store: &ArmStore) -> ArmPair<f64> {
        self.posteriors(store).map(|_, p| p.expected_value())
    }

    /// Combined posterior standard deviation of the two means.
    fn indifference_threshold(&self, store: &ArmStore) -> f64 {
        let p = self.posteriors(store);
        (p.a.variance() + p.b.variance()).sqrt()
    }

    fn snapshot_params(&self, store: &ArmStore) -> ArmPair<PolicyParams> {
        self.posteriors(store).map(|_, p| PolicyParams::Thompson {
            alpha: p.alpha,
            beta: p.beta,
        })
    }
}

impl ArmPolicy for Ucb1 {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Ucb1
    }

    fn select(&mut self, store: &ArmStore) -> Selection {
        Ucb1::select(store)
    }

    fn confidence_scores(&self, store: &ArmStore) -> ArmPair<f64> {
        Ucb1::bounds(store)
    }

    fn indifference_threshold(&self, store: &ArmStore) -> f64 {
        Ucb1::proximity_threshold(store)
    }

    fn snapshot_params(&self, store: &ArmStore) -> ArmPair<PolicyParams> {
        let bounds = Ucb1::bounds(store);
        store.snapshot().map(|arm, s| PolicyParams::Ucb1 {
            ctr_estimate: s.ctr_estimate,
            bound: bounds[arm],
        })
    }
}

/// Non-adaptive control: A, B, A, B, ... regardless of statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alternation {
    next: Arm,
}

impl Alternation {
    pub fn new() -> Self {
        Self { next: Arm::A }
    }

    /// The arm the next call will return.
    pub fn peek(&self) -> Arm {
        self.next
    }
}

impl Default for Alternation {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmPolicy for Alternation {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Alternation
    }

    fn select(&mut self, _store: &ArmStore) -> Selection {
        let arm = self.next;
        self.next = arm.other();
        let mut scores = ArmPair::new(0.0, 0.0);
        scores[arm] = 1.0;
        Selection { arm, scores }
    }

    fn confidence_scores(&self, _store: &ArmStore) -> ArmPair<f64> {
        ArmPair::new(0.0, 0.0)
    }

    /// Every alternation decision is exploratory.
    fn indifference_threshold(&self, _store: &ArmStore) -> f64 {
        f64::INFINITY
    }

    fn snapshot_params(&self, _store: &ArmStore) -> ArmPair<PolicyParams> {
        ArmPair::new(PolicyParams::Alternation, PolicyParams::Alternation)
    }
}

/// The active policy, tagged by family.
#[derive(Debug, Clone)]
pub enum SelectionPolicy {
    Thompson(ThompsonSampling),
    Ucb1(Ucb1),
    Alternation(Alternation),
}

impl SelectionPolicy {
    pub fn thompson(cfg: ThompsonConfig, seed: u64) -> Self {
        SelectionPolicy::Thompson(ThompsonSampling::with_seed(cfg, seed))
    }

    pub fn ucb1() -> Self {
        SelectionPolicy::Ucb1(Ucb1)
    }

    pub fn alternation() -> Self {
        SelectionPolicy::Alternation(Alternation::new())
    }

    /// Counters this policy needs before it is first invoked.
    pub fn initial_store(&self) -> ArmStore {
        match self {
            SelectionPolicy::Ucb1(_) => ArmStore::seeded(1),
            SelectionPolicy::Thompson(_) | SelectionPolicy::Alternation(_) => ArmStore::new(),
        }
    }

    fn inner(&self) -> &dyn ArmPolicy {
        match self {
            SelectionPolicy::Thompson(p) => p,
            SelectionPolicy::Ucb1(p) => p,
            SelectionPolicy::Alternation(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ArmPolicy {
        match self {
            SelectionPolicy::Thompson(p) => p,
            SelectionPolicy::Ucb1(p) => p,
            SelectionPolicy::Alternation(p) => p,
        }
    }
}

impl ArmPolicy for SelectionPolicy {
    fn kind(&self) -> PolicyKind {
        self.inner().kind()
    }

    fn select(&mut self, store: &ArmStore) -> Selection {
        self.inner_mut().select(store)
    }

    fn confidence_scores(&self, store: &ArmStore) -> ArmPair<f64> {
        self.inner().confidence_scores(store)
    }

    fn indifference_threshold(&self, store: &ArmStore) -> f64 {
        self.inner().indifference_threshold(store)
    }

    fn snapshot_params(&self, store: &ArmStore) -> ArmPair<PolicyParams> {
        self.inner().snapshot_params(store)
    }

    fn is_exploring(&self, store: &ArmStore) -> bool {
        let s = self.confidence_scores(store);
        let gap = (s.a - s.b).abs();
        gap < self.indifference_threshold(store) || gap <= TIEBREAK_EPS
    }
}
