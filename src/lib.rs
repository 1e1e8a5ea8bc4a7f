//! `abmux`: a two-arm bandit decision engine for impression/click experiments.
//!
//! For every impression request the engine picks one of two arms, hands back a
//! ticket, and later folds the reported outcome for that ticket into its
//! per-arm statistics. Decisions balance exploring the less certain arm
//! against exploiting the one currently believed best.
//!
//! ```rust
//! use abmux::{Arm, Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::default().with_seed(7))?;
//! let d = engine.decide(); // arm + ticket
//! let clicked = d.arm == Arm::B;
//! engine.report_outcome(d.ticket, clicked)?; // exactly once per ticket
//!
//! let snap = engine.snapshot();
//! assert_eq!(snap.tickets.resolved, 1);
//! assert_eq!(snap.total_clicks(), u64::from(clicked));
//! # Ok::<(), abmux::Error>(())
//! ```
//!
//! **Selection policies** (all behind [`ArmPolicy`], stored as [`SelectionPolicy`]):
//! - [`ThompsonSampling`]: Beta posterior draws, `Beta(alpha0 + clicks, beta0 + views - clicks)`.
//! - [`Ucb1`]: `ctr_estimate + sqrt(3 ln n / views)`, arms seeded with one view each.
//! - [`Alternation`]: non-adaptive A/B/A/B control.
//!
//! **Around the policy:**
//! - [`WarmupGate`]: fair coin flips for the first `window` decisions.
//! - [`DecisionLedger`]: ticket arena; each ticket resolves at most once.
//! - [`Accountant`]: exploration/exploitation tally and regret against [`OracleCtr`].
//! - [`Engine`]: the context object tying these together behind one lock, with
//!   lock-free [`EngineSnapshot`] reads.
//! - [`RunReport`] / [`simulate`]: offline evaluation.
//!
//! **Goals:**
//! - **Seedable**: same config + same outcome stream → same decisions.
//! - **Ticketed correlation**: outcomes bind to the decision that produced
//!   them, never to whatever a shared counter reads at report time.
//! - **No panics on bad input**: misuse comes back as [`Error`].
//!
//! **Non-goals:**
//! - More than two arms, persistence across restarts, multi-metric optimization.
//! - Serving-layer concerns (HTTP, CSV loading, plotting).

#![forbid(unsafe_code)]

/// Epsilon used for floating-point tie-breaking in score comparisons.
const TIEBREAK_EPS: f64 = 1e-12;

mod error;
pub use error::*;

mod arm;
pub use arm::*;

mod thompson;
pub use thompson::*;

mod ucb;
pub use ucb::*;

mod policy;
pub use policy::*;

mod warmup;
pub use warmup::*;

mod ledger;
pub use ledger::*;

mod accountant;
pub use accountant::*;

mod decision;
pub use decision::*;

mod engine;
pub use engine::*;

mod report;
pub use report::*;

pub mod sim;
pub use sim::{simulate, BernoulliEnv, Environment, ReplayEnv};
