//! Run all three policies against the same synthetic click data and compare.
//!
//! ```text
//! cargo run --example ctr_duel
//! RUST_LOG=abmux=debug cargo run --example ctr_duel   # per-decision logs
//! ```

use abmux::sim::DEFAULT_CHECKPOINTS;
use abmux::{simulate, BernoulliEnv, Engine, EngineConfig, EngineSnapshot, OracleCtr, PolicyKind};
use tracing_subscriber::EnvFilter;

const CTR_A: f64 = 0.07;
const CTR_B: f64 = 0.10;
const TRIALS: u64 = 5_000;

fn main() -> Result<(), abmux::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("abmux=info")))
        .init();

    let oracle = OracleCtr::new(CTR_A, CTR_B);
    let configs = [
        EngineConfig::default().with_warmup(600),
        EngineConfig::ucb1(),
        EngineConfig::alternation(),
    ];

    for cfg in configs {
        let cfg = cfg.with_oracle(oracle).with_seed(42);
        let engine = Engine::new(cfg)?;
        let mut env = BernoulliEnv::new(CTR_A, CTR_B, 42);

        let checkpoint = |s: &EngineSnapshot| {
            println!(
                "  [{:>5}] A {:>4}/{:<5} B {:>4}/{:<5} explore={:.3}",
                s.tickets.issued,
                s.arms.a.clicks,
                s.arms.a.views,
                s.arms.b.clicks,
                s.arms.b.views,
                s.tally.exploration_rate(),
            );
        };

        println!("{}", engine.policy());
        let report = simulate(&engine, &mut env, TRIALS, &DEFAULT_CHECKPOINTS, &checkpoint)?;
        for (k, v) in report.columns() {
            if !v.is_empty() {
                println!("  {k:<16} {v}");
            }
        }
        if report.algorithm == PolicyKind::Thompson {
            println!("  share of B: {:.3}", report.view_share(abmux::Arm::B));
        }
        println!();
    }
    Ok(())
}
