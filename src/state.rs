use std::path::{Path, PathBuf};

use crate::report::MutationReport;

pub const REPORT_FILE: &str = ".darwinian-report.json";

pub fn report_path(dir: &Path) -> PathBuf {
    dir.join(REPORT_FILE)
}

fn dirs_or_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Persist the report in the working directory for `show` and `status`.
pub fn save_last_run(report: &MutationReport) -> std::io::Result<()> {
    save_to_path(report, &report_path(&dirs_or_cwd()))
}

pub fn load_last_run() -> Option<MutationReport> {
    load_from_path(&report_path(&dirs_or_cwd()))
}

pub fn save_to_path(report: &MutationReport, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

pub fn load_from_path(path: &Path) -> Option<MutationReport> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!("ignoring unreadable report {}: {}", path.display(), e);
            None
        }
    }
}
