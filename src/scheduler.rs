use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, mpsc};
use std::time::{Duration, Instant};

use crate::classify::classify;
use crate::config::RunConfig;
use crate::error::{AggregationInvariantViolation, MaterializationError, MutantError, RunError};
use crate::materialize::{self, apply_mutation, generate_diff};
use crate::mutants::{ExecutionResult, Lifecycle, MutantId, MutantOutcome, MutantStatus, MutationPoint};
use crate::process::{CancellationToken, CommandSpec, run_supervised};
use crate::report::{Aggregator, MutationReport, ScoringPolicy};
use crate::source::SourceUnit;

/// Attempts per mutant before a launch or filesystem failure becomes `Errored`.
const MAX_ATTEMPTS: u32 = 2;
/// Added to the scaled baseline when deriving the per-mutant timeout.
const TIMEOUT_SLACK: Duration = Duration::from_secs(2);
/// Baseline limit when no per-mutant timeout is configured.
const BASELINE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Limits handed to an executor for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    pub timeout: Duration,
    pub cancel: &'a CancellationToken,
}

/// What one attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub status: MutantStatus,
    pub diff: String,
    pub detail: Option<String>,
}

/// Runs a single mutant to a verdict. Implementations must be safe to call
/// from several workers at once.
pub trait MutantExecutor: Sync {
    fn execute(
        &self,
        id: MutantId,
        point: &MutationPoint,
        ctx: AttemptContext<'_>,
    ) -> Result<Attempt, MutantError>;
}

/// Materializes each mutant, runs the build and test commands in its copy,
/// classifies the result and removes the copy.
#[derive(Debug)]
pub struct CommandExecutor {
    project_root: PathBuf,
    output_root: PathBuf,
    sources: HashMap<PathBuf, String>,
    build: Option<CommandSpec>,
    test: CommandSpec,
    max_output_bytes: usize,
    retain_artifacts: bool,
}

impl CommandExecutor {
    pub fn new(
        project_root: &Path,
        output_root: &Path,
        units: &[SourceUnit],
        build: Option<CommandSpec>,
        test: CommandSpec,
    ) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            output_root: output_root.to_path_buf(),
            sources: units
                .iter()
                .map(|u| (u.path.clone(), u.text.clone()))
                .collect(),
            build: build.map(|b| b.resolved_against(project_root)),
            test: test.resolved_against(project_root),
            max_output_bytes: 8 * 1024,
            retain_artifacts: false,
        }
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_retain_artifacts(mut self, retain: bool) -> Self {
        self.retain_artifacts = retain;
        self
    }

    fn run_commands(
        &self,
        workdir: &Path,
        ctx: AttemptContext<'_>,
    ) -> Result<(Option<ExecutionResult>, Option<ExecutionResult>), MutantError> {
        let build = match &self.build {
            Some(spec) => Some(run_supervised(
                spec,
                workdir,
                ctx.timeout,
                ctx.cancel,
                self.max_output_bytes,
            )?),
            None => None,
        };
        if build.as_ref().is_some_and(|b| !b.success()) {
            return Ok((build, None));
        }
        let spent = build.as_ref().map(|b| b.duration).unwrap_or_default();
        let test = run_supervised(
            &self.test,
            workdir,
            ctx.timeout.saturating_sub(spent),
            ctx.cancel,
            self.max_output_bytes,
        )?;
        Ok((build, Some(test)))
    }
}

impl MutantExecutor for CommandExecutor {
    fn execute(
        &self,
        id: MutantId,
        point: &MutationPoint,
        ctx: AttemptContext<'_>,
    ) -> Result<Attempt, MutantError> {
        let text = self
            .sources
            .get(&point.file)
            .ok_or_else(|| MaterializationError::UnknownUnit(point.file.clone()))?;
        let diff = generate_diff(text, &apply_mutation(text, point)?);
        let mutant = materialize::materialize(&self.project_root, text, point, &self.output_root, id)?;

        let ran = self.run_commands(&mutant.workdir, ctx);
        if !self.retain_artifacts {
            materialize::discard(&mutant);
        }
        let (build, test) = ran?;

        let status = classify(build.as_ref(), test.as_ref(), self.build.is_some());
        let detail = test.or(build).map(|r| r.output).filter(|o| !o.is_empty());
        Ok(Attempt {
            status,
            diff,
            detail,
        })
    }
}

/// Pool-level limits.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub per_mutant_timeout: Duration,
    pub global_timeout: Option<Duration>,
    pub grace_period: Duration,
    pub policy: ScoringPolicy,
}

pub struct Scheduler {
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run every planned mutant through `executor` on a bounded worker pool.
    /// Each planned id ends with exactly one terminal status in the report.
    pub fn run<E: MutantExecutor>(
        &self,
        plan: &[(MutantId, MutationPoint)],
        executor: &E,
    ) -> Result<MutationReport, AggregationInvariantViolation> {
        let started = Instant::now();
        // A deadline too far out to represent is no deadline.
        let deadline = self.config.global_timeout.and_then(|g| started.checked_add(g));
        let queue: Mutex<VecDeque<&(MutantId, MutationPoint)>> = Mutex::new(plan.iter().collect());
        let mut aggregator = Aggregator::new(plan.iter().map(|(id, _)| *id), self.config.policy);
        let workers = self.config.concurrency.max(1).min(plan.len());
        tracing::info!("running {} mutants on {} workers", plan.len(), workers);

        let (tx, rx) = mpsc::channel::<Result<MutantOutcome, AggregationInvariantViolation>>();
        let recorded = std::thread::scope(|s| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                s.spawn(move || self.worker(queue, executor, deadline, tx));
            }
            drop(tx);

            for outcome in rx {
                if let Err(violation) = outcome.and_then(|o| aggregator.record(o)) {
                    tracing::error!("{violation}");
                    self.cancel.cancel();
                    return Err(violation);
                }
            }
            Ok(())
        });
        recorded?;

        let mut report = aggregator.finish()?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    fn worker<E: MutantExecutor>(
        &self,
        queue: &Mutex<VecDeque<&(MutantId, MutationPoint)>>,
        executor: &E,
        deadline: Option<Instant>,
        tx: mpsc::Sender<Result<MutantOutcome, AggregationInvariantViolation>>,
    ) {
        loop {
            let next = match queue.lock() {
                Ok(mut q) => q.pop_front(),
                Err(poisoned) => poisoned.into_inner().pop_front(),
            };
            let Some((id, point)) = next else { break };
            let outcome = self.run_one(*id, point, executor, deadline);
            let failed = outcome.is_err();
            if tx.send(outcome).is_err() || failed {
                break;
            }
        }
    }

    fn run_one<E: MutantExecutor>(
        &self,
        id: MutantId,
        point: &MutationPoint,
        executor: &E,
        deadline: Option<Instant>,
    ) -> Result<MutantOutcome, AggregationInvariantViolation> {
        let mut lifecycle = Lifecycle::new(id);
        lifecycle.advance(MutantStatus::Queued)?;
        let skip_reason = if self.cancel.is_cancelled() {
            Some("run cancelled")
        } else if deadline.is_some_and(|d| Instant::now() >= d) {
            Some("global deadline reached")
        } else {
            None
        };
        if let Some(reason) = skip_reason {
            lifecycle.advance(MutantStatus::Skipped)?;
            return Ok(MutantOutcome {
                id,
                point: point.clone(),
                status: lifecycle.status(),
                duration: Duration::ZERO,
                attempts: 0,
                diff: String::new(),
                detail: Some(reason.to_string()),
            });
        }

        let started = Instant::now();
        let mut attempts = 0;
        let attempt = loop {
            attempts += 1;
            lifecycle.advance(MutantStatus::Running)?;
            let ctx = AttemptContext {
                timeout: self.attempt_timeout(deadline),
                cancel: &self.cancel,
            };
            match executor.execute(id, point, ctx) {
                Ok(attempt) => break attempt,
                Err(e) if attempts < MAX_ATTEMPTS && !self.cancel.is_cancelled() => {
                    tracing::warn!("m{id} attempt {attempts} failed, retrying: {e}");
                    lifecycle.advance(MutantStatus::Queued)?;
                }
                Err(e) => {
                    tracing::warn!("m{id} errored: {e}");
                    break Attempt {
                        status: MutantStatus::Errored,
                        diff: String::new(),
                        detail: Some(e.to_string()),
                    };
                }
            }
        };
        lifecycle.advance(attempt.status)?;

        Ok(MutantOutcome {
            id,
            point: point.clone(),
            status: lifecycle.status(),
            duration: started.elapsed(),
            attempts,
            diff: attempt.diff,
            detail: attempt.detail,
        })
    }

    /// Per-mutant limit, capped so nothing outlives the global deadline plus grace.
    fn attempt_timeout(&self, deadline: Option<Instant>) -> Duration {
        let per_mutant = self.config.per_mutant_timeout;
        match deadline.and_then(|d| d.checked_add(self.config.grace_period)) {
            Some(hard_stop) => per_mutant.min(hard_stop.saturating_duration_since(Instant::now())),
            None => per_mutant,
        }
    }
}

/// Result of running the build and test commands on the unmutated project.
#[derive(Debug, Clone, Copy)]
pub struct Baseline {
    pub duration: Duration,
}

impl Baseline {
    /// `baseline × multiplier + 2 s`.
    pub fn derived_timeout(&self, multiplier: u32) -> Duration {
        self.duration.saturating_mul(multiplier).saturating_add(TIMEOUT_SLACK)
    }
}

/// Check that the project builds and its tests pass before mutating anything.
pub fn run_baseline(
    project_root: &Path,
    output_root: &Path,
    build: Option<&CommandSpec>,
    test: &CommandSpec,
    timeout: Duration,
    cancel: &CancellationToken,
    max_output_bytes: usize,
) -> Result<Baseline, RunError> {
    let workdir = materialize::prepare_baseline(project_root, output_root).map_err(MutantError::from)?;
    let result = baseline_commands(&workdir, build, test, timeout, cancel, max_output_bytes);
    if let Err(e) = std::fs::remove_dir_all(&workdir) {
        tracing::warn!("failed to remove {}: {}", workdir.display(), e);
    }
    let duration = result?;
    tracing::info!("baseline passed in {:.1}s", duration.as_secs_f64());
    Ok(Baseline { duration })
}

fn baseline_commands(
    workdir: &Path,
    build: Option<&CommandSpec>,
    test: &CommandSpec,
    timeout: Duration,
    cancel: &CancellationToken,
    max_output_bytes: usize,
) -> Result<Duration, RunError> {
    let mut total = Duration::ZERO;
    let steps = build.into_iter().map(|b| ("build", b)).chain([("test", test)]);
    for (what, spec) in steps {
        let result = run_supervised(spec, workdir, timeout, cancel, max_output_bytes)
            .map_err(MutantError::from)?;
        if !result.success() {
            let reason = if result.timed_out {
                format!("{what} command `{}` timed out", spec.display())
            } else if result.cancelled {
                format!("{what} command `{}` was cancelled", spec.display())
            } else {
                format!("{what} command `{}` failed:\n{}", spec.display(), result.output)
            };
            return Err(RunError::BaselineFailed(reason));
        }
        total += result.duration;
    }
    Ok(total)
}

/// Everything a full run needs beyond the config.
pub struct RunRequest<'a> {
    pub project_root: &'a Path,
    pub targets: &'a [PathBuf],
    pub config: &'a RunConfig,
    pub cancel: CancellationToken,
    /// Names this run's directory under the output root. Random when `None`.
    pub session: Option<String>,
}

pub fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

/// Discover, scan, baseline and execute. The caller installs the Ctrl-C handler
/// on `request.cancel`.
pub fn run_project(request: RunRequest<'_>) -> Result<MutationReport, RunError> {
    let RunRequest {
        project_root,
        targets,
        config,
        cancel,
        session,
    } = request;
    config.validate(project_root)?;
    let operators = config.selected_operators()?;
    let test = config.test_spec()?;
    let build = config.build_spec()?;
    let output_root = materialize::resolve_path(&config.output_root_for(project_root));

    let files = crate::project::discover_sources(
        project_root,
        targets,
        &config.source_filter(),
        Some(&output_root),
    )?;
    let (units, scan_errors) = crate::source::load_units(project_root, &files);
    tracing::info!("loaded {} source units ({} skipped)", units.len(), scan_errors.len());
    if let Some(name) = config.function.as_deref() {
        crate::scanner::check_function(&units, name)?;
    }

    let points = crate::scanner::scan(&units, &operators, config.function.as_deref());
    tracing::info!("found {} mutation points", points.len());
    let plan: Vec<(MutantId, MutationPoint)> = points.into_iter().enumerate().collect();

    let session = session.unwrap_or_else(generate_session_id);
    let run_root = output_root.join(format!("run-{session}"));
    std::fs::create_dir_all(&run_root)?;
    let test = test.resolved_against(project_root);
    let build = build.map(|b| b.resolved_against(project_root));

    let baseline_timeout = config.per_mutant_timeout().unwrap_or(BASELINE_TIMEOUT);
    // An interrupted baseline still yields a report, with every mutant skipped.
    let baseline = match run_baseline(
        project_root,
        &run_root,
        build.as_ref(),
        &test,
        baseline_timeout,
        &cancel,
        config.max_output_bytes,
    ) {
        Ok(b) => Some(b),
        Err(e) if cancel.is_cancelled() => {
            tracing::warn!("baseline interrupted: {e}");
            None
        }
        Err(e) => {
            remove_empty_dirs(&run_root, &output_root);
            return Err(e);
        }
    };
    let per_mutant_timeout = config
        .per_mutant_timeout()
        .or_else(|| baseline.map(|b| b.derived_timeout(config.timeout_multiplier)))
        .unwrap_or(BASELINE_TIMEOUT);
    tracing::info!("per-mutant timeout {:.1}s", per_mutant_timeout.as_secs_f64());

    let executor = CommandExecutor::new(project_root, &run_root, &units, build, test)
        .with_max_output_bytes(config.max_output_bytes)
        .with_retain_artifacts(config.retain_artifacts);
    let scheduler = Scheduler::new(
        SchedulerConfig {
            concurrency: config.concurrency,
            per_mutant_timeout,
            global_timeout: config.global_timeout(),
            grace_period: config.grace_period(),
            policy: ScoringPolicy {
                include_timeouts: config.scoring_includes_timeouts,
                survival_threshold: config.survival_threshold,
            },
        },
        cancel,
    );
    let mut report = scheduler.run(&plan, &executor)?;

    if !config.retain_artifacts {
        remove_empty_dirs(&run_root, &output_root);
    }

    report.project_root = project_root.to_path_buf();
    report.baseline_ms = baseline.map(|b| b.duration.as_millis() as u64);
    report.scan_errors = scan_errors.iter().map(|e| e.to_string()).collect();
    tracing::info!(
        "run finished: {} killed, {} survived in {:.1}s",
        report.counts.killed,
        report.counts.survived,
        report.duration_ms as f64 / 1000.0
    );
    Ok(report)
}

/// `remove_dir` only succeeds on empty directories, so retained or foreign
/// content stays.
fn remove_empty_dirs(run_root: &Path, output_root: &Path) {
    let _ = std::fs::remove_dir(run_root);
    let _ = std::fs::remove_dir(output_root);
}
