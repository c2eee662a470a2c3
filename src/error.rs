use std::path::PathBuf;

use thiserror::Error;

use crate::mutants::{MutantId, MutantStatus};

/// A source unit that could not be turned into a scannable tree.
/// The unit is skipped; the run continues with the others.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file type: {path}")]
    UnsupportedLanguage { path: PathBuf },
    #[error("parser rejected {path}")]
    Parse { path: PathBuf },
    #[error("{path} has a syntax error near line {line}")]
    Malformed { path: PathBuf, line: usize },
}

impl ScanError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            ScanError::Unreadable { path, .. }
            | ScanError::UnsupportedLanguage { path }
            | ScanError::Parse { path }
            | ScanError::Malformed { path, .. } => path,
        }
    }
}

/// Copying the project or writing the mutated file failed for one mutant.
#[derive(Debug, Error)]
pub enum MaterializationError {
    #[error("failed to copy project tree into {dest}: {source}")]
    Copy {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write mutated file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no loaded source unit for {0}")]
    UnknownUnit(PathBuf),
    #[error("mutation span {start}..{end} is outside {path} ({len} bytes)")]
    SpanOutOfBounds {
        path: PathBuf,
        start: usize,
        end: usize,
        len: usize,
    },
}

/// The build or test subprocess could not be started or reaped.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that keeps one mutant from producing a verdict.
#[derive(Debug, Error)]
pub enum MutantError {
    #[error(transparent)]
    Materialization(#[from] MaterializationError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// A scheduling correctness bug. Never recoverable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationInvariantViolation {
    #[error("mutant m{id} reported {second:?} after already reporting {first:?}")]
    DuplicateStatus {
        id: MutantId,
        first: MutantStatus,
        second: MutantStatus,
    },
    #[error("mutant m{0} was never reported")]
    MissingStatus(MutantId),
    #[error("mutant m{0} was not part of the plan")]
    UnknownMutant(MutantId),
    #[error("mutant m{id} reported non-terminal status {status:?}")]
    NonTerminal { id: MutantId, status: MutantStatus },
    #[error("mutant m{id} cannot move from {from:?} to {to:?}")]
    IllegalTransition {
        id: MutantId,
        from: MutantStatus,
        to: MutantStatus,
    },
}

/// Invalid run configuration. Detected before any work is scheduled.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown mutation operator '{id}'. Available: {available}")]
    UnknownOperator { id: String, available: String },
    #[error("no mutation operators enabled")]
    NoOperators,
    #[error("concurrency must be a positive integer")]
    ZeroConcurrency,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("{0} command is empty")]
    EmptyCommand(&'static str),
    #[error("survival threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f64),
    #[error("output directory {output} must not be the project root or contain it ({project})")]
    OutputAliasesProject { output: PathBuf, project: PathBuf },
    #[error("no such file or directory: {0}")]
    MissingTarget(PathBuf),
    #[error("Function '{name}' not found. Available: {available}")]
    FunctionNotFound { name: String, available: String },
    #[error("invalid glob pattern '{0}'")]
    InvalidPattern(String),
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors that end a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Aggregation(#[from] AggregationInvariantViolation),
    #[error("tests fail before mutation. Fix failing tests first.\n{0}")]
    BaselineFailed(String),
    #[error("baseline could not run: {0}")]
    Baseline(#[from] MutantError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
