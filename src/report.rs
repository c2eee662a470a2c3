use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AggregationInvariantViolation;
use crate::mutants::{MutantId, MutantOutcome, MutantStatus};
use crate::operators;

/// Terminal-status tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub killed: usize,
    pub survived: usize,
    pub stillborn: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: MutantStatus) {
        match status {
            MutantStatus::Killed => self.killed += 1,
            MutantStatus::Survived => self.survived += 1,
            MutantStatus::Stillborn => self.stillborn += 1,
            MutantStatus::TimedOut => self.timed_out += 1,
            MutantStatus::Errored => self.errored += 1,
            MutantStatus::Skipped => self.skipped += 1,
            MutantStatus::Generated | MutantStatus::Queued | MutantStatus::Running => {}
        }
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        self.killed += other.killed;
        self.survived += other.survived;
        self.stillborn += other.stillborn;
        self.timed_out += other.timed_out;
        self.errored += other.errored;
        self.skipped += other.skipped;
    }

    pub fn total(&self) -> usize {
        self.killed + self.survived + self.stillborn + self.timed_out + self.errored + self.skipped
    }

    /// Mutants that count towards the score.
    pub fn valid(&self, include_timeouts: bool) -> usize {
        let timed_out = if include_timeouts { self.timed_out } else { 0 };
        self.killed + self.survived + timed_out
    }

    /// Killed over valid, or `None` when nothing valid ran.
    pub fn score(&self, include_timeouts: bool) -> Option<f64> {
        let valid = self.valid(include_timeouts);
        if valid == 0 {
            return None;
        }
        let timed_out = if include_timeouts { self.timed_out } else { 0 };
        Some((self.killed + timed_out) as f64 / valid as f64)
    }

    pub fn survival_rate(&self, include_timeouts: bool) -> Option<f64> {
        let valid = self.valid(include_timeouts);
        (valid > 0).then(|| self.survived as f64 / valid as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorSummary {
    pub operator: String,
    /// Mutants planned for this operator, whatever their status.
    pub total: usize,
    pub counts: StatusCounts,
    pub score: Option<f64>,
    pub survival_rate: Option<f64>,
    /// Survival rate above the configured threshold.
    pub weak: bool,
}

/// One mutant's final record, as persisted and shown by `show`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutantRecord {
    pub id: MutantId,
    pub ref_id: String,
    pub operator: String,
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub original: String,
    pub mutated: String,
    pub status: MutantStatus,
    pub duration_ms: u64,
    pub attempts: u32,
    pub diff: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A surviving mutant as listed at the top level of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survivor {
    pub id: MutantId,
    pub ref_id: String,
    pub file: PathBuf,
    pub line: usize,
    pub operator: String,
    pub diff: String,
}

impl From<&MutantRecord> for Survivor {
    fn from(m: &MutantRecord) -> Self {
        Self {
            id: m.id,
            ref_id: m.ref_id.clone(),
            file: m.file.clone(),
            line: m.line,
            operator: m.operator.clone(),
            diff: m.diff.clone(),
        }
    }
}

pub fn ref_id(id: MutantId) -> String {
    format!("m{id}")
}

impl From<MutantOutcome> for MutantRecord {
    fn from(o: MutantOutcome) -> Self {
        Self {
            id: o.id,
            ref_id: ref_id(o.id),
            operator: o.point.operator,
            file: o.point.file,
            line: o.point.location.line,
            column: o.point.location.column,
            original: o.point.original,
            mutated: o.point.mutated,
            status: o.status,
            duration_ms: o.duration.as_millis() as u64,
            attempts: o.attempts,
            diff: o.diff,
            context_before: o.point.context_before,
            context_after: o.point.context_after,
            detail: o.detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationReport {
    pub project_root: PathBuf,
    /// Planned mutants, equal to `counts.total()`.
    pub total: usize,
    pub counts: StatusCounts,
    /// `None` means no valid mutants.
    pub score: Option<f64>,
    pub scoring_includes_timeouts: bool,
    pub survival_threshold: f64,
    pub operators: Vec<OperatorSummary>,
    /// Surviving mutants, ordered by id.
    pub survivors: Vec<Survivor>,
    /// Every planned mutant, ordered by id.
    pub mutants: Vec<MutantRecord>,
    pub scan_errors: Vec<String>,
    pub baseline_ms: Option<u64>,
    pub duration_ms: u64,
}

impl MutationReport {
    pub fn surviving(&self) -> impl Iterator<Item = &MutantRecord> {
        self.with_status(MutantStatus::Survived)
    }

    pub fn with_status(&self, status: MutantStatus) -> impl Iterator<Item = &MutantRecord> {
        self.mutants.iter().filter(move |m| m.status == status)
    }

    pub fn weak_operators(&self) -> impl Iterator<Item = &OperatorSummary> {
        self.operators.iter().filter(|o| o.weak)
    }

    /// Look up a mutant by `mN` or `@mN`.
    pub fn find(&self, reference: &str) -> Option<&MutantRecord> {
        let reference = reference.trim_start_matches('@');
        self.mutants.iter().find(|m| m.ref_id == reference)
    }
}

/// Scoring policy applied when the aggregator finishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub include_timeouts: bool,
    pub survival_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            include_timeouts: false,
            survival_threshold: 0.5,
        }
    }
}

/// Collects exactly one terminal outcome per planned mutant. Owned by a single
/// thread; the result does not depend on arrival order.
#[derive(Debug)]
pub struct Aggregator {
    policy: ScoringPolicy,
    planned: BTreeSet<MutantId>,
    outcomes: HashMap<MutantId, MutantOutcome>,
}

impl Aggregator {
    pub fn new(planned: impl IntoIterator<Item = MutantId>, policy: ScoringPolicy) -> Self {
        Self {
            policy,
            planned: planned.into_iter().collect(),
            outcomes: HashMap::new(),
        }
    }

    pub fn recorded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn record(&mut self, outcome: MutantOutcome) -> Result<(), AggregationInvariantViolation> {
        if !self.planned.contains(&outcome.id) {
            return Err(AggregationInvariantViolation::UnknownMutant(outcome.id));
        }
        if !outcome.status.is_terminal() {
            return Err(AggregationInvariantViolation::NonTerminal {
                id: outcome.id,
                status: outcome.status,
            });
        }
        if let Some(first) = self.outcomes.get(&outcome.id) {
            return Err(AggregationInvariantViolation::DuplicateStatus {
                id: outcome.id,
                first: first.status,
                second: outcome.status,
            });
        }
        tracing::debug!("m{} -> {}", outcome.id, outcome.status.label());
        self.outcomes.insert(outcome.id, outcome);
        Ok(())
    }

    /// Build the report. Every planned mutant must have been recorded.
    pub fn finish(mut self) -> Result<MutationReport, AggregationInvariantViolation> {
        let mut mutants = Vec::with_capacity(self.planned.len());
        for &id in &self.planned {
            let outcome = self
                .outcomes
                .remove(&id)
                .ok_or(AggregationInvariantViolation::MissingStatus(id))?;
            mutants.push(MutantRecord::from(outcome));
        }

        let mut counts = StatusCounts::default();
        let mut per_op: BTreeMap<(usize, String), StatusCounts> = BTreeMap::new();
        for m in &mutants {
            counts.add(m.status);
            let rank = operators::catalog()
                .iter()
                .position(|op| op.id == m.operator)
                .unwrap_or(usize::MAX);
            per_op.entry((rank, m.operator.clone())).or_default().add(m.status);
        }

        let policy = self.policy;
        let operators = per_op
            .into_iter()
            .map(|((_, operator), c)| {
                let survival_rate = c.survival_rate(policy.include_timeouts);
                OperatorSummary {
                    operator,
                    total: c.total(),
                    counts: c,
                    score: c.score(policy.include_timeouts),
                    survival_rate,
                    weak: survival_rate.is_some_and(|r| r > policy.survival_threshold),
                }
            })
            .collect();

        let survivors = mutants
            .iter()
            .filter(|m| m.status == MutantStatus::Survived)
            .map(Survivor::from)
            .collect();

        Ok(MutationReport {
            project_root: PathBuf::new(),
            total: counts.total(),
            counts,
            score: counts.score(policy.include_timeouts),
            scoring_includes_timeouts: policy.include_timeouts,
            survival_threshold: policy.survival_threshold,
            operators,
            survivors,
            mutants,
            scan_errors: Vec::new(),
            baseline_ms: None,
            duration_ms: 0,
        })
    }
}
