//! Per-unit outcomes and per-session generation reporting

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Why a unit failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitFailure {
    /// The request never completed (send error, connection reset, abort
    /// that was not cancellation)
    Transport(String),
    /// Non-2xx, non-499 response from the service
    Service { status: u16, message: String },
}

impl std::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitFailure::Transport(msg) => write!(f, "transport: {}", msg),
            UnitFailure::Service { status, message } => {
                write!(f, "service ({}): {}", status, message)
            }
        }
    }
}

/// Terminal state of one generation unit
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    /// The unit produced an audio artifact
    Success(Bytes),
    /// The unit was cancelled before or during its request
    Cancelled,
    /// The unit failed; later units are still attempted
    Failed(UnitFailure),
}

/// Counts of unit outcomes for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl GenerationReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Success(_) => self.completed += 1,
            UnitOutcome::Cancelled => self.cancelled += 1,
            UnitOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// All units reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.completed + self.failed + self.cancelled >= self.total
    }

    pub fn is_partial(&self) -> bool {
        self.failed > 0 || self.cancelled > 0
    }

    /// User-visible summary ("N of M generated")
    pub fn summary(&self) -> String {
        if self.cancelled > 0 {
            format!(
                "{} of {} generated ({} cancelled)",
                self.completed, self.total, self.cancelled
            )
        } else {
            format!("{} of {} generated", self.completed, self.total)
        }
    }
}
