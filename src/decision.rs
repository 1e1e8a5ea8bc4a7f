//! Decision envelope returned to the serving layer.
//!
//! A [`Decision`] carries what the caller needs (arm name and ticket) plus a
//! typed note on how the choice was made, suitable for logging and offline
//! replay.

use crate::{Arm, ArmPair, PolicyKind, TicketId};

/// How a decision's arm was chosen.
///
/// Prefer adding new variants over changing existing semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecisionNote {
    /// The warm-up gate was open; the arm came from a fair coin flip.
    WarmupForced,

    /// Policy sampled per-arm posteriors and chose the max.
    SampledPosteriorMax,

    /// Policy chose the larger deterministic score (B wins ties).
    DeterministicChoice,

    /// Non-adaptive alternation.
    Alternated,
}

/// A single selection, bound to its outcome ticket.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    /// Ticket to quote when reporting the outcome.
    pub ticket: TicketId,
    /// The arm to show.
    pub arm: Arm,
    /// The policy that was active.
    pub policy: PolicyKind,
    /// Pre-decision classification (forced decisions are always exploring).
    pub exploring: bool,
    /// Per-arm values the policy compared; `None` for forced decisions.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub scores: Option<ArmPair<f64>>,
    pub note: DecisionNote,
}

impl Decision {
    pub fn arm_name(&self) -> &'static str {
        self.arm.name()
    }

    pub fn was_forced(&self) -> bool {
        self.note == DecisionNote::WarmupForced
    }
}

impl PolicyKind {
    /// Note describing how this policy picks when it is actually consulted.
    pub(crate) fn selection_note(self) -> DecisionNote {
        match self {
            PolicyKind::Thompson => DecisionNote::SampledPosteriorMax,
            PolicyKind::Ucb1 => DecisionNote::DeterministicChoice,
            PolicyKind::Alternation => DecisionNote::Alternated,
        }
    }
}
