//! Structured error kinds, reported per net and aggregated at the session
//! level. A* and strategy layers return these upward; the congestion
//! driver recovers from the retryable ones by ripup, everything else
//! terminates the net and is folded into the final report.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("no path exists between the requested endpoints")]
    Unreachable,
    #[error("path blocked by a foreign net's occupancy")]
    BlockedByForeignNet,
    #[error("node expansion budget exceeded")]
    ExceededNodeBudget,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetErrorKind {
    #[error("no path exists even with all foreign nets absent")]
    NetUnreachable,
    #[error("path exists under an empty grid but not under current occupancy")]
    NetBlocked,
    #[error("A* gave up before exhaustion")]
    NodeBudgetExceeded,
    #[error("sub-grid escape could not reach any grid cell for this pad")]
    PadInescapable,
    #[error("no via spans the requested transition {from} -> {to} under current rules")]
    ViaRuleViolation { from: u8, to: u8 },
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl NetErrorKind {
    /// Retryable by ripup-and-reroute inside the congestion driver.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NetErrorKind::NetBlocked | NetErrorKind::NodeBudgetExceeded)
    }
}

#[derive(Debug, Clone)]
pub struct NetError {
    pub net_id: u32,
    pub net_name: String,
    pub kind: NetErrorKind,
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "net '{}' ({}): {}", self.net_name, self.net_id, self.kind)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
