//! Offline simulation harness.
//!
//! Drives an [`Engine`] through `decide` / `report_outcome` against an
//! [`Environment`] that answers "did the user click?" for the shown arm, and
//! publishes snapshots at caller-chosen checkpoints. Two environments ship:
//! [`BernoulliEnv`] draws fresh clicks from fixed true CTRs, and [`ReplayEnv`]
//! replays recorded per-arm click streams in order until one runs dry.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::{Arm, ArmPair, Engine, OracleCtr, Result, RunReport, SnapshotSink};

/// Default snapshot checkpoints, in decisions.
pub const DEFAULT_CHECKPOINTS: [u64; 6] = [50, 150, 500, 1500, 3000, 5000];

/// Source of simulated user behavior.
pub trait Environment {
    /// Outcome for one impression of `arm`, or `None` when out of data.
    fn outcome(&mut self, arm: Arm) -> Option<bool>;
}

/// Independent Bernoulli clicks with fixed per-arm CTR.
#[derive(Debug, Clone)]
pub struct BernoulliEnv {
    ctr: ArmPair<f64>,
    rng: StdRng,
}

impl BernoulliEnv {
    /// CTRs are clamped into `[0, 1]`.
    pub fn new(ctr_a: f64, ctr_b: f64, seed: u64) -> Self {
        let clamp = |p: f64| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            ctr: ArmPair::new(clamp(ctr_a), clamp(ctr_b)),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn oracle(&self) -> OracleCtr {
        OracleCtr::new(self.ctr.a, self.ctr.b)
    }
}

impl Environment for BernoulliEnv {
    fn outcome(&mut self, arm: Arm) -> Option<bool> {
        Some(self.rng.random_bool(self.ctr[arm]))
    }
}

/// Recorded click streams, consumed in order per arm.
#[derive(Debug, Clone, Default)]
pub struct ReplayEnv {
    streams: ArmPair<Vec<bool>>,
    cursor: ArmPair<usize>,
}

impl ReplayEnv {
    pub fn new(a: Vec<bool>, b: Vec<bool>) -> Self {
        Self {
            streams: ArmPair::new(a, b),
            cursor: ArmPair::default(),
        }
    }

    /// Mean of each full stream, the historical "true" CTR. `None` if a stream is empty.
    pub fn oracle(&self) -> Option<OracleCtr> {
        let mean = |v: &[bool]| {
            if v.is_empty() {
                None
            } else {
                Some(v.iter().filter(|&&c| c).count() as f64 / v.len() as f64)
            }
        };
        Some(OracleCtr::new(
            mean(self.streams.a.as_slice())?,
            mean(self.streams.b.as_slice())?,
        ))
    }

    /// Records consumed so far, per arm.
    pub fn consumed(&self) -> ArmPair<usize> {
        self.cursor
    }
}

impl Environment for ReplayEnv {
    fn outcome(&mut self, arm: Arm) -> Option<bool> {
        let i = self.cursor[arm];
        let v = *self.streams[arm].get(i)?;
        self.cursor[arm] = i + 1;
        Some(v)
    }
}

/// Run up to `trials` decide/report rounds.
///
/// After each round whose decision count appears in `checkpoints`, the current
/// snapshot goes to `sink`. Stops early when the environment runs out of data;
/// the decision that found it empty stays pending.
pub fn simulate(
    engine: &Engine,
    env: &mut dyn Environment,
    trials: u64,
    checkpoints: &[u64],
    sink: &dyn SnapshotSink,
) -> Result<RunReport> {
    for t in 1..=trials {
        let d = engine.decide();
        let Some(clicked) = env.outcome(d.arm) else {
            debug!(trial = t, arm = %d.arm, "environment exhausted");
            break;
        };
        engine.report_outcome(d.ticket, clicked)?;
        if checkpoints.contains(&t) {
            engine.publish_snapshot(sink);
        }
    }
    Ok(engine.run_report())
}
