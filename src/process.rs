use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{ConfigError, LaunchError};
use crate::mutants::ExecutionResult;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// A build or test command split into program and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Split on whitespace. `what` names the command in the error.
    pub fn parse(what: &'static str, cmd: &str) -> Result<Self, ConfigError> {
        let mut parts = cmd.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::EmptyCommand(what))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Make a relative program path (e.g. `.venv/bin/pytest`) absolute against
    /// `base`, so it still resolves from inside a mutant's working copy. Bare
    /// names are left for PATH lookup.
    pub fn resolved_against(&self, base: &Path) -> Self {
        let p = Path::new(&self.program);
        if p.is_absolute() || !self.program.contains('/') {
            return self.clone();
        }
        let candidate = base.join(p);
        if !candidate.exists() {
            return self.clone();
        }
        Self {
            program: candidate.to_string_lossy().to_string(),
            args: self.args.clone(),
        }
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Shared run-wide cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct OutputBuffer {
    data: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.data.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.data.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn into_string(self) -> String {
        let mut out = String::from_utf8_lossy(&self.data).into_owned();
        if self.truncated {
            out.push_str(TRUNCATION_MARKER);
        }
        out
    }
}

fn drain<R: Read + Send + 'static>(
    mut pipe: R,
    buffer: Arc<Mutex<OutputBuffer>>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push(&chunk[..n]);
                    }
                }
            }
        }
    })
}

/// SIGKILL the process group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: u32) {
    if let Ok(pgid) = i32::try_from(pid) {
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32) {}

fn kill_group(child: &mut Child) {
    // The child leads its own process group, so this also reaches grandchildren.
    signal_group(child.id());
    let _ = child.kill();
}

/// Run `spec` in `cwd`, killing it once `timeout` elapses or `cancel` fires.
/// Output from both streams is captured into one buffer of at most
/// `max_output_bytes`.
pub fn run_supervised(
    spec: &CommandSpec,
    cwd: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
    max_output_bytes: usize,
) -> Result<ExecutionResult, LaunchError> {
    let start = Instant::now();
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(cwd)
        .env("OBJC_DISABLE_INITIALIZE_FORK_SAFETY", "YES")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let buffer = Arc::new(Mutex::new(OutputBuffer::new(max_output_bytes)));
    let mut readers = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        readers.push(drain(out, Arc::clone(&buffer)));
    }
    if let Some(err) = child.stderr.take() {
        readers.push(drain(err, Arc::clone(&buffer)));
    }

    let mut timed_out = false;
    let mut cancelled = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if cancel.is_cancelled() {
                    cancelled = true;
                } else if start.elapsed() >= timeout {
                    timed_out = true;
                }
                if timed_out || cancelled {
                    kill_group(&mut child);
                    match child.wait() {
                        Ok(status) => break status,
                        Err(source) => {
                            return Err(LaunchError::Wait {
                                program: spec.program.clone(),
                                source,
                            });
                        }
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                kill_group(&mut child);
                let _ = child.wait();
                return Err(LaunchError::Wait {
                    program: spec.program.clone(),
                    source,
                });
            }
        }
    };

    // Background processes left by the command would hold the pipes open.
    signal_group(child.id());
    for reader in readers {
        let _ = reader.join();
    }

    let output = buffer
        .lock()
        .map(|mut buf| std::mem::replace(&mut *buf, OutputBuffer::new(0)).into_string())
        .unwrap_or_default();

    Ok(ExecutionResult {
        exit_code: status.code(),
        duration: start.elapsed(),
        timed_out,
        cancelled,
        output,
    })
}
