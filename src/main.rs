use darwinian::config::RunConfig;
use darwinian::error::{ConfigError, RunError};
use darwinian::output;
use darwinian::process::CancellationToken;
use darwinian::project::{self, find_project_root};
use darwinian::scheduler::{self, RunRequest};
use darwinian::{materialize, operators, scanner, source, state};

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_CONFIG: i32 = 2;
const EXIT_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "darwinian", version, about = "Mutation testing for Python, Rust and JavaScript projects")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScanArgs {
    /// Files or directories to mutate (default: the project root)
    paths: Vec<PathBuf>,
    /// Operator to apply; repeat for several (default: the default set)
    #[arg(short = 'o', long = "operator")]
    operators: Vec<String>,
    /// Function name to scope mutations to
    #[arg(short, long)]
    function: Option<String>,
    /// Only mutate files matching this glob (relative to the project root)
    #[arg(long)]
    include: Vec<String>,
    /// Never mutate files matching this glob
    #[arg(long)]
    exclude: Vec<String>,
    /// Config file (default: darwinian.toml in the project root)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mutate the project and run its tests against every mutant
    Run {
        #[command(flatten)]
        scan: ScanArgs,
        /// Test command, run in each mutant's copy of the project
        #[arg(long, env = "DARWINIAN_TEST_CMD")]
        test_cmd: Option<String>,
        /// Build command run before the tests; failures count as stillborn
        #[arg(long)]
        build_cmd: Option<String>,
        /// Mutants to run in parallel (default: available cores)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
        /// Per-mutant timeout in seconds (default: 3x baseline + 2s)
        #[arg(long)]
        timeout: Option<u64>,
        /// Timeout multiplier applied to the baseline duration
        #[arg(long)]
        timeout_mult: Option<u32>,
        /// Wall-clock limit for the whole run in seconds
        #[arg(long)]
        global_timeout: Option<u64>,
        /// Seconds in-flight mutants get after the global timeout
        #[arg(long)]
        grace: Option<u64>,
        /// Keep mutant working directories after the run
        #[arg(long)]
        keep_mutants: bool,
        /// Count timed-out mutants as killed in the score
        #[arg(long)]
        count_timeouts: bool,
        /// Directory for mutant working copies (default: .darwinian)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Session ID naming this run's working directory (default: random)
        #[arg(long)]
        session: Option<String>,
        /// Exit code only, no output
        #[arg(short, long)]
        quiet: bool,
    },
    /// List mutation points without running anything
    Scan {
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// List the available mutation operators
    Operators {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show details for a mutant of the last run
    Show {
        /// Mutant ref (e.g. @m1 or m1)
        #[arg(name = "ref")]
        mutant_ref: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Summary of last run
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Run {
            scan,
            test_cmd,
            build_cmd,
            jobs,
            timeout,
            timeout_mult,
            global_timeout,
            grace,
            keep_mutants,
            count_timeouts,
            output_dir,
            session,
            quiet,
        } => {
            let overrides = RunOverrides {
                test_cmd,
                build_cmd,
                jobs,
                timeout,
                timeout_mult,
                global_timeout,
                grace,
                keep_mutants,
                count_timeouts,
                output_dir,
            };
            cmd_run(scan, overrides, session, quiet)
        }
        Commands::Scan { scan } => cmd_scan(scan),
        Commands::Operators { json } => cmd_operators(json),
        Commands::Show { mutant_ref, json } => cmd_show(mutant_ref, json),
        Commands::Status { json } => cmd_status(json),
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "darwinian=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string(value) {
        Ok(json) => {
            println!("{json}");
            EXIT_OK
        }
        Err(e) => {
            output::print_error(&format!("Failed to serialize output: {e}"));
            EXIT_FAILED
        }
    }
}

struct RunOverrides {
    test_cmd: Option<String>,
    build_cmd: Option<String>,
    jobs: Option<usize>,
    timeout: Option<u64>,
    timeout_mult: Option<u32>,
    global_timeout: Option<u64>,
    grace: Option<u64>,
    keep_mutants: bool,
    count_timeouts: bool,
    output_dir: Option<PathBuf>,
}

impl RunOverrides {
    fn apply(self, mut config: RunConfig) -> RunConfig {
        if let Some(cmd) = self.test_cmd {
            config = config.with_test_command(cmd);
        }
        if let Some(cmd) = self.build_cmd {
            config = config.with_build_command(cmd);
        }
        if let Some(jobs) = self.jobs {
            config = config.with_concurrency(jobs);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout_secs(secs);
        }
        if let Some(mult) = self.timeout_mult {
            config.timeout_multiplier = mult;
        }
        if let Some(secs) = self.global_timeout {
            config = config.with_global_timeout_secs(secs);
        }
        if let Some(secs) = self.grace {
            config = config.with_grace_period_secs(secs);
        }
        if let Some(dir) = self.output_dir {
            config = config.with_output_root(materialize::resolve_path(&absolute(&dir)));
        }
        if self.keep_mutants {
            config = config.with_retain_artifacts(true);
        }
        if self.count_timeouts {
            config = config.with_timeouts_scored(true);
        }
        config
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Project root for the given targets: found from the first one, else the cwd.
fn resolve_root(paths: &[PathBuf]) -> PathBuf {
    let start = paths
        .first()
        .map(|p| absolute(p))
        .unwrap_or_else(|| absolute(Path::new(".")));
    let root = find_project_root(&start);
    root.canonicalize().unwrap_or(root)
}

/// Canonicalize targets so they share a prefix with the canonical root.
fn resolve_targets(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
    paths
        .iter()
        .map(|p| {
            absolute(p)
                .canonicalize()
                .map_err(|_| ConfigError::MissingTarget(p.clone()))
        })
        .collect()
}

/// Config file values, then the scan flags on top.
fn load_config(args: &ScanArgs, root: &Path) -> Result<RunConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::discover(root)?,
    };
    if !args.operators.is_empty() {
        config = config.with_operators(args.operators.iter().cloned());
    }
    if args.function.is_some() {
        config.function = args.function.clone();
    }
    if !args.include.is_empty() {
        config.include = args.include.clone();
    }
    if !args.exclude.is_empty() {
        config.exclude.extend(args.exclude.iter().cloned());
    }
    Ok(config)
}

fn cmd_run(scan: ScanArgs, overrides: RunOverrides, session: Option<String>, quiet: bool) -> i32 {
    let root = resolve_root(&scan.paths);
    let json_mode = scan.json;

    let loaded = resolve_targets(&scan.paths)
        .and_then(|targets| load_config(&scan, &root).map(|c| (targets, overrides.apply(c))));
    let (targets, config) = match loaded {
        Ok(v) => v,
        Err(e) => {
            output::print_error(&e.to_string());
            return EXIT_CONFIG;
        }
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!("cannot install Ctrl-C handler: {e}");
    }

    let report = match scheduler::run_project(RunRequest {
        project_root: &root,
        targets: &targets,
        config: &config,
        cancel,
        session,
    }) {
        Ok(r) => r,
        Err(RunError::Config(e)) => {
            output::print_error(&e.to_string());
            return EXIT_CONFIG;
        }
        Err(e) => {
            output::print_error(&e.to_string());
            return EXIT_FAILED;
        }
    };

    if let Err(e) = state::save_last_run(&report) {
        tracing::warn!("failed to save report: {e}");
    }

    let code = if report.score.is_some() {
        EXIT_OK
    } else {
        EXIT_FAILED
    };
    if quiet {
        return code;
    }
    if json_mode {
        if print_json(&report) != EXIT_OK {
            return EXIT_FAILED;
        }
    } else {
        output::print_run_result(&report);
    }
    code
}

fn cmd_scan(scan: ScanArgs) -> i32 {
    let root = resolve_root(&scan.paths);

    let loaded = resolve_targets(&scan.paths)
        .and_then(|targets| load_config(&scan, &root).map(|c| (targets, c)));
    let (targets, config) = match loaded {
        Ok(v) => v,
        Err(e) => {
            output::print_error(&e.to_string());
            return EXIT_CONFIG;
        }
    };
    let ops = match config.validate_scan().and_then(|_| config.selected_operators()) {
        Ok(ops) => ops,
        Err(e) => {
            output::print_error(&e.to_string());
            return EXIT_CONFIG;
        }
    };

    let files = match project::discover_sources(
        &root,
        &targets,
        &config.source_filter(),
        Some(&materialize::resolve_path(&config.output_root_for(&root))),
    ) {
        Ok(f) => f,
        Err(e) => {
            output::print_error(&format!("Failed to list sources: {e}"));
            return EXIT_FAILED;
        }
    };
    let (units, errors) = source::load_units(&root, &files);

    if let Some(name) = config.function.as_deref() {
        if let Err(e) = scanner::check_function(&units, name) {
            output::print_error(&e.to_string());
            return EXIT_CONFIG;
        }
    }

    let points = scanner::scan(&units, &ops, config.function.as_deref());
    if scan.json {
        return print_json(&points);
    }
    for e in &errors {
        output::print_error(&e.to_string());
    }
    if points.is_empty() {
        output::print_success("No mutable code found.");
        return EXIT_OK;
    }
    output::print_points(&points);
    EXIT_OK
}

#[derive(Serialize)]
struct OperatorInfo {
    id: &'static str,
    category: operators::OperatorCategory,
    enabled_by_default: bool,
    description: &'static str,
}

fn cmd_operators(json_mode: bool) -> i32 {
    let catalog = operators::catalog();
    if json_mode {
        let infos: Vec<OperatorInfo> = catalog
            .iter()
            .map(|op| OperatorInfo {
                id: op.id,
                category: op.category,
                enabled_by_default: op.enabled_by_default,
                description: op.description,
            })
            .collect();
        return print_json(&infos);
    }
    output::print_operators(catalog);
    EXIT_OK
}

fn cmd_show(mutant_ref: String, json_mode: bool) -> i32 {
    let ref_id = mutant_ref.trim_start_matches('@');

    let last_run = match state::load_last_run() {
        Some(r) => r,
        None => {
            output::print_error("No previous run found. Run `darwinian run` first.");
            return EXIT_CONFIG;
        }
    };

    match last_run.find(ref_id) {
        Some(m) => {
            if json_mode {
                return print_json(m);
            }
            output::print_mutant_detail(m);
            EXIT_OK
        }
        None => {
            let valid: Vec<_> = last_run.surviving().map(|m| format!("@{}", m.ref_id)).collect();
            output::print_error(&format!(
                "Mutant @{} not found. Survivors: {}",
                ref_id,
                valid.join(", ")
            ));
            EXIT_CONFIG
        }
    }
}

fn cmd_status(json_mode: bool) -> i32 {
    match state::load_last_run() {
        Some(report) => {
            if json_mode {
                return print_json(&report);
            }
            output::print_status(&report);
            EXIT_OK
        }
        None => {
            output::print_error("No previous run found. Run `darwinian run` first.");
            EXIT_CONFIG
        }
    }
}
