//! The decision engine: one context object owning all mutable state.
//!
//! ```rust
//! use abmux::{Engine, EngineConfig, Error};
//!
//! let engine = Engine::new(EngineConfig::ucb1())?;
//! let first = engine.decide(); // pick an arm, get a ticket
//! let second = engine.decide();
//!
//! // Outcomes may arrive in any order, but only once per ticket.
//! engine.report_outcome(second.ticket, true)?;
//! engine.report_outcome(first.ticket, false)?;
//! assert_eq!(
//!     engine.report_outcome(first.ticket, true),
//!     Err(Error::AlreadyResolved(first.ticket))
//! );
//! assert_eq!(engine.snapshot().arm(second.arm).clicks, 1);
//! # Ok::<(), Error>(())
//! ```
//!
//! All mutations run under a single `parking_lot::Mutex`, so `issue` (ticket +
//! view increment) and `resolve` (ticket transition + click) are atomic with
//! respect to each other. After each mutation the writer publishes an
//! immutable [`EngineSnapshot`]; readers clone that `Arc` and never touch the
//! state lock.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    Accountant, Arm, ArmPair, ArmPolicy, ArmStore, Decision, DecisionLedger, DecisionNote, Error,
    ExplorationTally, LedgerCounts, OracleCtr, PolicyKind, PolicyParams, Result, RunReport,
    SelectionPolicy, ThompsonConfig, Ticket, TicketId, WarmupConfig, WarmupGate,
    DEFAULT_TICKET_HISTORY,
};

/// Seed offset for the warm-up coin, so it never shares a stream with the policy.
const WARMUP_SEED_SALT: u64 = 0xC0E1_1A11;

/// Full configuration for an [`Engine`].
///
/// Start with [`EngineConfig::default()`] (Thompson sampling, `Beta(1, 1)`
/// priors, no warm-up) or one of the policy constructors, then adjust via the
/// builder methods or by setting fields directly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    pub policy: PolicyKind,
    /// Required when `policy` is [`PolicyKind::Thompson`].
    pub thompson: Option<ThompsonConfig>,
    pub warmup: WarmupConfig,
    /// Historical true CTRs; without them regret is reported as unavailable.
    pub oracle: Option<OracleCtr>,
    /// Seed for all engine randomness (posterior draws and the warm-up coin).
    pub seed: u64,
    /// Terminal tickets kept for [`Engine::ticket`] and [`Engine::outcome_log`].
    #[cfg_attr(feature = "serde", serde(default = "default_ticket_history"))]
    pub ticket_history: usize,
}

#[cfg(feature = "serde")]
fn default_ticket_history() -> usize {
    DEFAULT_TICKET_HISTORY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::thompson(ThompsonConfig::default())
    }
}

impl EngineConfig {
    pub fn thompson(cfg: ThompsonConfig) -> Self {
        Self {
            policy: PolicyKind::Thompson,
            thompson: Some(cfg),
            warmup: WarmupConfig::default(),
            oracle: None,
            seed: 0,
            ticket_history: DEFAULT_TICKET_HISTORY,
        }
    }

    pub fn ucb1() -> Self {
        Self {
            policy: PolicyKind::Ucb1,
            thompson: None,
            ..Self::default()
        }
    }

    pub fn alternation() -> Self {
        Self {
            policy: PolicyKind::Alternation,
            thompson: None,
            ..Self::default()
        }
    }

    pub fn with_warmup(mut self, window: u64) -> Self {
        self.warmup = WarmupConfig::with_window(window);
        self
    }

    pub fn with_oracle(mut self, oracle: OracleCtr) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_ticket_history(mut self, cap: usize) -> Self {
        self.ticket_history = cap;
        self
    }

    /// Check required parameters and build the policy.
    pub fn build_policy(&self) -> Result<SelectionPolicy> {
        if let Some(o) = &self.oracle {
            o.validate()?;
        }
        match self.policy {
            PolicyKind::Thompson => {
                let cfg = self.thompson.ok_or_else(|| {
                    Error::Configuration("thompson policy requires prior pseudo-counts".into())
                })?;
                cfg.validate()?;
                Ok(SelectionPolicy::thompson(cfg, self.seed))
            }
            PolicyKind::Ucb1 => Ok(SelectionPolicy::ucb1()),
            PolicyKind::Alternation => Ok(SelectionPolicy::alternation()),
        }
    }
}

/// Read-only per-arm view.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmSnapshot {
    pub arm: Arm,
    /// Includes any seed views the policy starts with.
    pub views: u64,
    pub clicks: u64,
    pub empirical_ctr: f64,
    pub params: PolicyParams,
}

/// Consistent point-in-time copy of the engine's state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineSnapshot {
    pub policy: PolicyKind,
    pub arms: ArmPair<ArmSnapshot>,
    /// Views per arm present before the first decision (1 each for UCB1).
    pub baseline_views: ArmPair<u64>,
    pub tally: ExplorationTally,
    pub tickets: LedgerCounts,
    pub oracle: Option<OracleCtr>,
    pub warmup_open: bool,
}

impl EngineSnapshot {
    pub fn arm(&self, arm: Arm) -> &ArmSnapshot {
        &self.arms[arm]
    }

    pub fn total_views(&self) -> u64 {
        self.arms.a.views + self.arms.b.views
    }

    pub fn total_clicks(&self) -> u64 {
        self.arms.a.clicks + self.arms.b.clicks
    }

    /// Views that came from real decisions (seed views excluded).
    pub fn decided_views(&self) -> u64 {
        self.total_views()
            .saturating_sub(self.baseline_views.a + self.baseline_views.b)
    }
}

/// Receives statistics snapshots at caller-chosen checkpoints.
pub trait SnapshotSink {
    fn publish(&self, snapshot: &EngineSnapshot);
}

impl<F: Fn(&EngineSnapshot)> SnapshotSink for F {
    fn publish(&self, snapshot: &EngineSnapshot) {
        self(snapshot)
    }
}

/// Sink that keeps every published snapshot.
#[derive(Debug, Default)]
pub struct CollectingSink {
    snapshots: Mutex<Vec<EngineSnapshot>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<EngineSnapshot> {
        std::mem::take(&mut *self.snapshots.lock())
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSink for CollectingSink {
    fn publish(&self, snapshot: &EngineSnapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }
}

#[derive(Debug)]
struct EngineState {
    store: ArmStore,
    policy: SelectionPolicy,
    gate: WarmupGate,
    ledger: DecisionLedger,
    accountant: Accountant,
    baseline_views: ArmPair<u64>,
}

impl EngineState {
    fn snapshot(&self) -> EngineSnapshot {
        let params = self.policy.snapshot_params(&self.store);
        let arms = self.store.snapshot().map(|arm, s| ArmSnapshot {
            arm,
            views: s.views,
            clicks: s.clicks,
            empirical_ctr: s.empirical_ctr(),
            params: params[arm],
        });
        EngineSnapshot {
            policy: self.policy.kind(),
            arms,
            baseline_views: self.baseline_views,
            tally: self.accountant.tally(),
            tickets: self.ledger.counts(),
            oracle: self.accountant.oracle(),
            warmup_open: self.gate.is_open(self.ledger.issued()),
        }
    }
}

/// Two-arm bandit decision engine. Share it across threads with `Arc<Engine>`.
#[derive(Debug)]
pub struct Engine {
    state: Mutex<EngineState>,
    published: RwLock<Arc<EngineSnapshot>>,
}

impl Engine {
    /// Validate `cfg` and build an engine. [`Error::Configuration`] is only
    /// ever raised here and in [`Engine::with_store`].
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        let policy = cfg.build_policy()?;
        let store = policy.initial_store();
        Ok(Self::assemble(&cfg, policy, store))
    }

    /// Build an engine that starts from counts accumulated elsewhere, such as
    /// a store carried over from an earlier run.
    ///
    /// UCB1 needs at least one view on each arm.
    pub fn with_store(cfg: EngineConfig, store: ArmStore) -> Result<Self> {
        let policy = cfg.build_policy()?;
        if policy.kind() == PolicyKind::Ucb1 && store.min_views() == 0 {
            return Err(Error::Configuration(
                "ucb1 requires at least one view per arm".into(),
            ));
        }
        Ok(Self::assemble(&cfg, policy, store))
    }

    fn assemble(cfg: &EngineConfig, policy: SelectionPolicy, store: ArmStore) -> Self {
        let state = EngineState {
            baseline_views: store.snapshot().map(|_, s| s.views),
            store,
            gate: WarmupGate::new(cfg.warmup, cfg.seed ^ WARMUP_SEED_SALT),
            ledger: DecisionLedger::with_history(cfg.ticket_history),
            accountant: Accountant::new(cfg.oracle),
            policy,
        };
        info!(
            policy = %state.policy.kind(),
            warmup_enabled = cfg.warmup.enabled,
            warmup_window = cfg.warmup.window,
            oracle = cfg.oracle.is_some(),
            baseline_views = state.baseline_views.a + state.baseline_views.b,
            "bandit engine started"
        );
        let snap = Arc::new(state.snapshot());
        Self {
            state: Mutex::new(state),
            published: RwLock::new(snap),
        }
    }

    pub fn policy(&self) -> PolicyKind {
        self.published.read().policy
    }

    /// Choose an arm and issue its ticket.
    pub fn decide(&self) -> Decision {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        // Classification uses the gap before this decision changes any counter.
        let exploring = st.policy.is_exploring(&st.store);
        let kind = st.policy.kind();
        let (arm, exploring, scores, note) = match st.gate.force(st.ledger.issued()) {
            Some(arm) => (arm, true, None, DecisionNote::WarmupForced),
            None => {
                let sel = st.policy.select(&st.store);
                (sel.arm, exploring, Some(sel.scores), kind.selection_note())
            }
        };

        let ticket = st.ledger.issue(arm, &mut st.store);
        st.accountant.record_decision(arm, exploring);
        debug!(
            ticket = ticket.id.0,
            arm = %arm,
            views = st.store.get(arm).views,
            exploring,
            forced = note == DecisionNote::WarmupForced,
            "showing arm"
        );
        self.publish_locked(st);

        Decision {
            ticket: ticket.id,
            arm,
            policy: kind,
            exploring,
            scores,
            note,
        }
    }

    /// Report the outcome for a previously issued ticket.
    ///
    /// Fails with [`Error::UnknownTicket`] or [`Error::AlreadyResolved`]; in
    /// both cases nothing changes and the caller must not retry.
    pub fn report_outcome(&self, ticket: TicketId, positive: bool) -> Result<()> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        match st.ledger.resolve(ticket, positive, &mut st.store) {
            Ok(t) => {
                st.accountant.record_outcome(positive);
                debug!(
                    ticket = t.id.0,
                    arm = %t.arm,
                    positive,
                    clicks = st.store.get(t.arm).clicks,
                    "outcome recorded"
                );
                self.publish_locked(st);
                Ok(())
            }
            Err(e) => {
                warn!(ticket = ticket.0, positive, error = %e, "outcome rejected");
                Err(e)
            }
        }
    }

    /// Expire pending tickets older than `before`. Returns how many expired.
    pub fn expire_pending_before(&self, before: TicketId) -> u64 {
        let mut guard = self.state.lock();
        let n = guard.ledger.expire_pending_before(before);
        if n > 0 {
            debug!(count = n, before = before.0, "expired abandoned tickets");
            self.publish_locked(&guard);
        }
        n
    }

    /// Latest consistent snapshot. Never blocks on in-flight decisions.
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.published.read().clone()
    }

    /// Push the latest snapshot to `sink`.
    pub fn publish_snapshot(&self, sink: &dyn SnapshotSink) {
        let snap = self.snapshot();
        sink.publish(&snap);
    }

    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        self.state.lock().ledger.get(id).copied()
    }

    /// Pending and recently finished tickets in issue order, `Some(clicked)`
    /// once resolved. See [`DecisionLedger::outcome_log`].
    pub fn outcome_log(&self) -> Vec<(TicketId, Option<bool>)> {
        self.state.lock().ledger.outcome_log()
    }

    pub fn run_report(&self) -> RunReport {
        RunReport::from_snapshot(&self.snapshot())
    }

    // Called with the state lock held so publication order matches mutation order.
    fn publish_locked(&self, st: &EngineState) {
        *self.published.write() = Arc::new(st.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thompson_without_priors_is_rejected() {
        let cfg = EngineConfig {
            thompson: None,
            ..EngineConfig::default()
        };
        assert!(matches!(Engine::new(cfg), Err(Error::Configuration(_))));
    }

    #[test]
    fn bad_oracle_is_rejected_at_construction() {
        let cfg = EngineConfig::ucb1().with_oracle(OracleCtr::new(-0.1, 0.5));
        assert!(matches!(Engine::new(cfg), Err(Error::Configuration(_))));
    }

    #[test]
    fn decide_then_report_updates_counters() {
        let e = Engine::new(EngineConfig::default().with_seed(3)).unwrap();
        let d = e.decide();
        assert_eq!(e.snapshot().arm(d.arm).views, 1);
        e.report_outcome(d.ticket, true).unwrap();
        let s = e.snapshot();
        assert_eq!(s.arm(d.arm).clicks, 1);
        assert_eq!(s.tickets.resolved, 1);
        assert_eq!(
            e.report_outcome(d.ticket, true),
            Err(Error::AlreadyResolved(d.ticket))
        );
        assert_eq!(e.snapshot(), s);
    }

    #[test]
    fn ucb1_engine_starts_seeded() {
        let e = Engine::new(EngineConfig::ucb1()).unwrap();
        let s = e.snapshot();
        assert_eq!(s.baseline_views, ArmPair::new(1, 1));
        assert_eq!(s.total_views(), 2);
        assert_eq!(s.decided_views(), 0);
        let d = e.decide();
        assert_eq!(d.policy, PolicyKind::Ucb1);
        assert_eq!(d.note, DecisionNote::DeterministicChoice);
        assert_eq!(e.snapshot().decided_views(), 1);
    }

    #[test]
    fn alternation_engine_alternates() {
        let e = Engine::new(EngineConfig::alternation()).unwrap();
        let arms: Vec<Arm> = (0..4).map(|_| e.decide().arm).collect();
        assert_eq!(arms, vec![Arm::A, Arm::B, Arm::A, Arm::B]);
        assert_eq!(e.snapshot().tally.exploration_rate(), 1.0);
    }

    #[test]
    fn warmup_decisions_are_forced_then_released() {
        let e = Engine::new(EngineConfig::default().with_warmup(5)).unwrap();
        for _ in 0..5 {
            let d = e.decide();
            assert!(d.was_forced());
            assert!(d.exploring);
            assert_eq!(d.scores, None);
        }
        assert!(!e.snapshot().warmup_open);
        assert!(!e.decide().was_forced());
    }

    #[test]
    fn regret_unavailable_without_oracle() {
        let e = Engine::new(EngineConfig::default()).unwrap();
        let d = e.decide();
        e.report_outcome(d.ticket, false).unwrap();
        assert_eq!(e.snapshot().tally.cumulative_regret, None);
        assert_eq!(e.run_report().total_regret, None);
    }

    #[test]
    fn closure_sink_receives_snapshots() {
        let e = Engine::new(EngineConfig::default()).unwrap();
        e.decide();
        let seen = Mutex::new(0u64);
        let sink = |s: &EngineSnapshot| *seen.lock() += s.tickets.issued;
        e.publish_snapshot(&sink);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn engine_can_start_from_existing_counts() {
        let mut store = ArmStore::new();
        for _ in 0..4 {
            store.record_view(Arm::A);
        }
        store.record_click(Arm::A).unwrap();
        store.record_view(Arm::B);

        let e = Engine::with_store(EngineConfig::alternation(), store).unwrap();
        let s = e.snapshot();
        assert_eq!(s.baseline_views, ArmPair::new(4, 1));
        assert_eq!(s.arm(Arm::A).clicks, 1);
        assert_eq!(s.decided_views(), 0);
        e.decide();
        assert_eq!(e.snapshot().decided_views(), 1);

        assert!(matches!(
            Engine::with_store(EngineConfig::ucb1(), ArmStore::new()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn ticket_history_bounds_the_outcome_log() {
        let e = Engine::new(EngineConfig::ucb1().with_ticket_history(8)).unwrap();
        let mut last = None;
        for i in 0..1_000 {
            let d = e.decide();
            e.report_outcome(d.ticket, i % 4 == 0).unwrap();
            last = Some(d.ticket);
        }
        let log = e.outcome_log();
        assert_eq!(log.len(), 8);
        assert_eq!(log.last().map(|&(id, _)| id), last);
        assert_eq!(e.snapshot().tickets.resolved, 1_000);
        assert!(e.ticket(TicketId(0)).is_none());
        assert_eq!(
            e.report_outcome(TicketId(0), true),
            Err(Error::AlreadyResolved(TicketId(0)))
        );
    }
}
