//! Error taxonomy for the decision engine.
//!
//! Every variant is returned to the caller of the operation that produced it;
//! none of them poison the engine.

use crate::{Arm, TicketId};

/// Errors returned by engine, ledger, and store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation would break `clicks <= views` for `arm`. State is unchanged.
    #[error("invalid state for arm {arm}: click with views={views} clicks={clicks}")]
    InvalidState {
        /// Arm the click was recorded against.
        arm: Arm,
        /// Views at the time of the rejected call.
        views: u64,
        /// Clicks at the time of the rejected call.
        clicks: u64,
    },

    /// No ticket with this id was ever issued, or it expired unresolved.
    #[error("unknown ticket {0}")]
    UnknownTicket(TicketId),

    /// The ticket was already resolved; the second report is rejected.
    #[error("ticket {0} already resolved")]
    AlreadyResolved(TicketId),

    /// The engine was configured with missing or out-of-range parameters.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
