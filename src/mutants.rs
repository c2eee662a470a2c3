use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AggregationInvariantViolation;

pub type MutantId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// One (operator, node) pair found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationPoint {
    pub operator: String,
    /// Path of the source unit, relative to the project root.
    pub file: PathBuf,
    pub location: Location,
    pub original: String,
    pub mutated: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutantStatus {
    Generated,
    Queued,
    Running,
    Killed,
    Survived,
    Stillborn,
    TimedOut,
    Errored,
    Skipped,
}

impl MutantStatus {
    pub const TERMINAL: [MutantStatus; 6] = [
        MutantStatus::Killed,
        MutantStatus::Survived,
        MutantStatus::Stillborn,
        MutantStatus::TimedOut,
        MutantStatus::Errored,
        MutantStatus::Skipped,
    ];

    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            MutantStatus::Generated | MutantStatus::Queued | MutantStatus::Running
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: MutantStatus) -> bool {
        use MutantStatus::*;
        match (self, next) {
            (Generated, Queued) => true,
            (Queued, Running) | (Queued, Skipped) => true,
            // A retried mutant goes back through the queue.
            (Running, Queued) => true,
            (Running, s) => s.is_terminal(),
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MutantStatus::Generated => "generated",
            MutantStatus::Queued => "queued",
            MutantStatus::Running => "running",
            MutantStatus::Killed => "killed",
            MutantStatus::Survived => "survived",
            MutantStatus::Stillborn => "stillborn",
            MutantStatus::TimedOut => "timed out",
            MutantStatus::Errored => "errored",
            MutantStatus::Skipped => "skipped",
        }
    }
}

/// A materialized mutant: one isolated working copy of the project.
#[derive(Debug, Clone)]
pub struct Mutant {
    pub id: MutantId,
    pub point: MutationPoint,
    pub workdir: PathBuf,
}

/// Where one mutant is in its lifecycle. The scheduler moves every planned
/// mutant through this; a refused move is a scheduling bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    id: MutantId,
    status: MutantStatus,
}

impl Lifecycle {
    pub fn new(id: MutantId) -> Self {
        Self {
            id,
            status: MutantStatus::Generated,
        }
    }

    pub fn status(&self) -> MutantStatus {
        self.status
    }

    /// Move to `next`. The status is left unchanged when the move is refused.
    pub fn advance(&mut self, next: MutantStatus) -> Result<(), AggregationInvariantViolation> {
        if !self.status.can_transition_to(next) {
            return Err(AggregationInvariantViolation::IllegalTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        tracing::debug!("m{}: {} -> {}", self.id, self.status.label(), next.label());
        self.status = next;
        Ok(())
    }
}

/// Raw outcome of one supervised command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub timed_out: bool,
    pub cancelled: bool,
    pub output: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        !self.timed_out && !self.cancelled && self.exit_code == Some(0)
    }
}

/// Terminal record sent from a worker to the aggregator.
#[derive(Debug, Clone)]
pub struct MutantOutcome {
    pub id: MutantId,
    pub point: MutationPoint,
    pub status: MutantStatus,
    pub duration: Duration,
    pub attempts: u32,
    pub diff: String,
    /// Truncated build/test output, or the error text for `Errored`.
    pub detail: Option<String>,
}
