//! End-of-run summary row for the analysis collaborator.
//!
//! The engine never writes files; [`RunReport`] is the flat record a report
//! writer persists once per completed run. Posterior fields are filled only
//! when the active policy is Thompson sampling, decided from the snapshot's
//! [`PolicyKind`] tag.

use crate::{Arm, ArmPair, BetaPosterior, EngineSnapshot, PolicyKind, PolicyParams};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub algorithm: PolicyKind,
    /// Historical true CTR per arm, when supplied.
    pub true_ctr: Option<ArmPair<f64>>,
    pub empirical_ctr: ArmPair<f64>,
    pub clicks: ArmPair<u64>,
    pub views: ArmPair<u64>,
    pub total_regret: Option<f64>,
    pub explorations: u64,
    pub exploitations: u64,
    pub exploration_rate: f64,
    /// Thompson only.
    pub posterior: Option<ArmPair<BetaPosterior>>,
}

impl RunReport {
    pub fn from_snapshot(s: &EngineSnapshot) -> Self {
        let posterior = match s.policy {
            PolicyKind::Thompson => {
                let p = s.arms.map(|_, a| match a.params {
                    PolicyParams::Thompson { alpha, beta } => Some(BetaPosterior { alpha, beta }),
                    PolicyParams::Ucb1 { .. } | PolicyParams::Alternation => None,
                });
                p.a.zip(p.b).map(|(a, b)| ArmPair::new(a, b))
            }
            PolicyKind::Ucb1 | PolicyKind::Alternation => None,
        };
        Self {
            algorithm: s.policy,
            true_ctr: s.oracle.map(|o| ArmPair::new(o.a, o.b)),
            empirical_ctr: s.arms.map(|_, a| a.empirical_ctr),
            clicks: s.arms.map(|_, a| a.clicks),
            views: s.arms.map(|_, a| a.views),
            total_regret: s.tally.cumulative_regret,
            explorations: s.tally.explorations,
            exploitations: s.tally.exploitations,
            exploration_rate: s.tally.exploration_rate(),
            posterior,
        }
    }

    /// The arm with more views at the end of the run (B on ties).
    pub fn favored_arm(&self) -> Arm {
        if self.views.a > self.views.b {
            Arm::A
        } else {
            Arm::B
        }
    }

    /// Share of all views that went to `arm`.
    pub fn view_share(&self, arm: Arm) -> f64 {
        let total = self.views.a + self.views.b;
        if total == 0 {
            0.0
        } else {
            self.views[arm] as f64 / total as f64
        }
    }

    /// Flat `(column, value)` pairs for tabular writers; missing values are empty.
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        fn opt(v: Option<f64>) -> String {
            v.map(|x| x.to_string()).unwrap_or_default()
        }
        let tc = self.true_ctr;
        let post = self.posterior;
        vec![
            ("algorithm", self.algorithm.name().to_string()),
            ("true_ctr_a", opt(tc.map(|p| p.a))),
            ("true_ctr_b", opt(tc.map(|p| p.b))),
            ("bandit_ctr_a", self.empirical_ctr.a.to_string()),
            ("bandit_ctr_b", self.empirical_ctr.b.to_string()),
            ("button_a_clicks", self.clicks.a.to_string()),
            ("button_a_views", self.views.a.to_string()),
            ("button_b_clicks", self.clicks.b.to_string()),
            ("button_b_views", self.views.b.to_string()),
            ("total_regret", opt(self.total_regret)),
            ("explorations", self.explorations.to_string()),
            ("exploitations", self.exploitations.to_string()),
            ("exploration_rate", self.exploration_rate.to_string()),
            ("a_alpha", opt(post.map(|p| p.a.alpha))),
            ("a_beta", opt(post.map(|p| p.a.beta))),
            ("b_alpha", opt(post.map(|p| p.b.alpha))),
            ("b_beta", opt(post.map(|p| p.b.beta))),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, EngineConfig, OracleCtr};

    #[test]
    fn thompson_report_carries_posteriors() {
        let e = Engine::new(EngineConfig::default().with_oracle(OracleCtr::new(0.07, 0.1))).unwrap();
        for i in 0..10 {
            let d = e.decide();
            e.report_outcome(d.ticket, i % 2 == 0).unwrap();
        }
        let r = e.run_report();
        assert_eq!(r.algorithm, PolicyKind::Thompson);
        let p = r.posterior.unwrap();
        assert_eq!(p.a.alpha + p.b.alpha, 2.0 + 5.0);
        assert_eq!(p.a.beta + p.b.beta, 2.0 + 5.0);
        assert!(r.total_regret.is_some());
        assert_eq!(r.true_ctr, Some(ArmPair::new(0.07, 0.1)));
    }

    #[test]
    fn ucb1_report_has_no_posteriors() {
        let e = Engine::new(EngineConfig::ucb1()).unwrap();
        e.decide();
        let r = e.run_report();
        assert_eq!(r.posterior, None);
        let cols = r.columns();
        assert_eq!(cols[0], ("algorithm", "UCB1".to_string()));
        let a_alpha = cols.iter().find(|(k, _)| *k == "a_alpha").unwrap();
        assert_eq!(a_alpha.1, "");
        assert_eq!(cols.len(), 17);
    }

    #[test]
    fn view_share_sums_to_one() {
        let e = Engine::new(EngineConfig::alternation()).unwrap();
        for _ in 0..3 {
            e.decide();
        }
        let r = e.run_report();
        assert!((r.view_share(Arm::A) + r.view_share(Arm::B) - 1.0).abs() < 1e-12);
        assert_eq!(r.favored_arm(), Arm::A);
    }
}
