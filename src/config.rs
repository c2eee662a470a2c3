//! Run configuration, loaded from `darwinian.toml` and overridden by CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::materialize;
use crate::operators::{self, MutationOperator};
use crate::process::CommandSpec;
use crate::project::SourceFilter;

pub const CONFIG_FILE: &str = "darwinian.toml";
pub const DEFAULT_OUTPUT_DIR: &str = ".darwinian";

/// Configuration for a mutation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Operator ids to apply. Empty means the default set.
    pub operators: Vec<String>,
    /// Maximum number of mutants executing at once.
    pub concurrency: usize,
    /// Wall-clock limit per mutant. Derived from the baseline when unset.
    pub per_mutant_timeout_secs: Option<u64>,
    /// Wall-clock limit for the whole run.
    pub global_timeout_secs: Option<u64>,
    /// Extra time in-flight mutants get once the global deadline passes.
    pub grace_period_secs: u64,
    pub timeout_multiplier: u32,
    /// Keep mutant working directories after the run.
    pub retain_artifacts: bool,
    /// Count timed-out mutants as killed in the score.
    pub scoring_includes_timeouts: bool,
    pub build_command: Option<String>,
    pub test_command: Option<String>,
    /// Survival rate above which an operator is flagged as weak.
    pub survival_threshold: f64,
    pub max_output_bytes: usize,
    /// Where mutant working directories are created. Defaults to
    /// `<project>/.darwinian`.
    pub output_root: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Restrict scanning to the body of this function.
    pub function: Option<String>,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            operators: Vec::new(),
            concurrency: default_concurrency(),
            per_mutant_timeout_secs: None,
            global_timeout_secs: None,
            grace_period_secs: 5,
            timeout_multiplier: 3,
            retain_artifacts: false,
            scoring_includes_timeouts: false,
            build_command: None,
            test_command: None,
            survival_threshold: 0.5,
            max_output_bytes: 8 * 1024,
            output_root: None,
            include: Vec::new(),
            exclude: vec![
                "**/test_*.py".into(),
                "**/*_test.py".into(),
                "**/conftest.py".into(),
                "**/*.test.*".into(),
                "**/*.spec.*".into(),
                "tests/**".into(),
            ],
            function: None,
        }
    }
}

impl RunConfig {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `darwinian.toml` in the project root, or defaults when absent.
    pub fn discover(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(CONFIG_FILE);
        if path.exists() {
            tracing::info!("using config {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn with_operators<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.operators = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_test_command(mut self, cmd: impl Into<String>) -> Self {
        self.test_command = Some(cmd.into());
        self
    }

    pub fn with_build_command(mut self, cmd: impl Into<String>) -> Self {
        self.build_command = Some(cmd.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.per_mutant_timeout_secs = Some(secs);
        self
    }

    pub fn with_global_timeout_secs(mut self, secs: u64) -> Self {
        self.global_timeout_secs = Some(secs);
        self
    }

    pub fn with_grace_period_secs(mut self, secs: u64) -> Self {
        self.grace_period_secs = secs;
        self
    }

    pub fn with_output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_root = Some(dir.into());
        self
    }

    pub fn with_retain_artifacts(mut self, retain: bool) -> Self {
        self.retain_artifacts = retain;
        self
    }

    pub fn with_timeouts_scored(mut self, counted: bool) -> Self {
        self.scoring_includes_timeouts = counted;
        self
    }

    pub fn per_mutant_timeout(&self) -> Option<Duration> {
        self.per_mutant_timeout_secs.map(Duration::from_secs)
    }

    pub fn global_timeout(&self) -> Option<Duration> {
        self.global_timeout_secs.map(Duration::from_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn output_root_for(&self, project_root: &Path) -> PathBuf {
        match &self.output_root {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_root.join(dir),
            None => project_root.join(DEFAULT_OUTPUT_DIR),
        }
    }

    pub fn source_filter(&self) -> SourceFilter {
        SourceFilter {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        }
    }

    pub fn selected_operators(&self) -> Result<Vec<&'static MutationOperator>, ConfigError> {
        let ops = operators::select(&self.operators)?;
        if ops.is_empty() {
            return Err(ConfigError::NoOperators);
        }
        Ok(ops)
    }

    pub fn test_spec(&self) -> Result<CommandSpec, ConfigError> {
        CommandSpec::parse("test", self.test_command.as_deref().unwrap_or(""))
    }

    pub fn build_spec(&self) -> Result<Option<CommandSpec>, ConfigError> {
        self.build_command
            .as_deref()
            .map(|cmd| CommandSpec::parse("build", cmd))
            .transpose()
    }

    /// Checks needed before scanning: operators, scope and filters.
    pub fn validate_scan(&self) -> Result<(), ConfigError> {
        self.selected_operators()?;
        for pattern in self.include.iter().chain(&self.exclude) {
            if pattern.trim().is_empty() {
                return Err(ConfigError::InvalidPattern(pattern.clone()));
            }
        }
        Ok(())
    }

    /// Full validation for an executing run. Fails before any work is scheduled.
    pub fn validate(&self, project_root: &Path) -> Result<(), ConfigError> {
        self.validate_scan()?;
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.per_mutant_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroDuration("per_mutant_timeout_secs"));
        }
        if self.global_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroDuration("global_timeout_secs"));
        }
        if self.timeout_multiplier == 0 {
            return Err(ConfigError::ZeroDuration("timeout_multiplier"));
        }
        if !(0.0..=1.0).contains(&self.survival_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.survival_threshold));
        }
        self.test_spec()?;
        self.build_spec()?;
        materialize::validate_isolation(project_root, &self.output_root_for(project_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid() -> RunConfig {
        RunConfig::default().with_test_command("pytest -q")
    }

    #[test]
    fn defaults_and_builder_overrides() {
        let cfg = RunConfig::default()
            .with_operators(["relational_boundary"])
            .with_concurrency(2)
            .with_timeout_secs(7)
            .with_retain_artifacts(true);
        assert_eq!(cfg.operators, vec!["relational_boundary"]);
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.per_mutant_timeout(), Some(Duration::from_secs(7)));
        assert!(cfg.retain_artifacts);
        assert!(!cfg.scoring_includes_timeouts);
        assert_eq!(cfg.survival_threshold, 0.5);
    }

    #[test]
    fn validate_accepts_defaults_with_test_command() {
        let dir = TempDir::new().unwrap();
        valid().validate(dir.path()).unwrap();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        assert!(matches!(
            valid().with_concurrency(0).validate(root),
            Err(ConfigError::ZeroConcurrency)
        ));
        assert!(matches!(
            valid().with_timeout_secs(0).validate(root),
            Err(ConfigError::ZeroDuration(_))
        ));
        assert!(matches!(
            RunConfig::default().validate(root),
            Err(ConfigError::EmptyCommand("test"))
        ));
        assert!(matches!(
            valid().with_operators(["nope"]).validate(root),
            Err(ConfigError::UnknownOperator { .. })
        ));
        let mut cfg = valid();
        cfg.survival_threshold = 1.5;
        assert!(matches!(cfg.validate(root), Err(ConfigError::ThresholdOutOfRange(_))));
        assert!(matches!(
            valid().with_output_root(root).validate(root),
            Err(ConfigError::OutputAliasesProject { .. })
        ));
    }

    #[test]
    fn load_parses_toml_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "operators = [\"bool_flip\"]\nconcurrency = 3\ntest_command = \"npm test\"\nper_mutant_timeout_secs = 30\n",
        )
        .unwrap();
        let cfg = RunConfig::discover(dir.path()).unwrap();
        assert_eq!(cfg.operators, vec!["bool_flip"]);
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.test_command.as_deref(), Some("npm test"));
        assert_eq!(cfg.per_mutant_timeout_secs, Some(30));
        assert_eq!(cfg.grace_period_secs, 5);
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "concurency = 3\n").unwrap();
        assert!(matches!(RunConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            RunConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn output_root_resolution() {
        let root = Path::new("/proj");
        assert_eq!(RunConfig::default().output_root_for(root), root.join(".darwinian"));
        assert_eq!(
            RunConfig::default().with_output_root("out").output_root_for(root),
            root.join("out")
        );
    }
}
