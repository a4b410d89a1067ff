//! Run summaries, the plain-text failure log, and the JSON run report.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::engine::{FetchOutcome, FetchStatus, SyncReport};
use crate::fingerprint::unix_timestamp;

/// File name of the failure log written next to the output directory.
pub const ERROR_LOG_NAME: &str = "download_errors.log";

/// Per-status counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub downloaded: usize,
    pub verified_unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_transferred: u64,
}

impl SyncSummary {
    pub fn from_outcomes(outcomes: &[FetchOutcome]) -> Self {
        let mut s = SyncSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for o in outcomes {
            match o.status {
                FetchStatus::Downloaded => s.downloaded += 1,
                FetchStatus::VerifiedUnchanged => s.verified_unchanged += 1,
                FetchStatus::Skipped => s.skipped += 1,
                FetchStatus::Failed => s.failed += 1,
            }
            s.bytes_transferred += o.bytes_transferred;
        }
        s
    }

    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tasks: {} downloaded, {} unchanged, {} skipped, {} failed ({} bytes)",
            self.total,
            self.downloaded,
            self.verified_unchanged,
            self.skipped,
            self.failed,
            self.bytes_transferred
        )
    }
}

/// Append one line per failed outcome: `<unix ts>\t<key>\t<attempts>\t<reason>`.
/// Returns how many lines were written; the file is not touched when nothing failed.
pub fn append_error_log(path: &Path, outcomes: &[FetchOutcome]) -> Result<usize> {
    let failed: Vec<&FetchOutcome> = outcomes.iter().filter(|o| o.is_failed()).collect();
    if failed.is_empty() {
        return Ok(0);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open error log: {}", path.display()))?;
    let ts = unix_timestamp();
    for o in &failed {
        writeln!(
            f,
            "{}\t{}\t{}\t{}",
            ts,
            o.logical_key,
            o.attempts,
            o.error.as_deref().unwrap_or("unknown")
        )?;
    }
    Ok(failed.len())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    finished_at: i64,
    elapsed_ms: u64,
    peak_in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    halted: Option<&'a str>,
    summary: SyncSummary,
    outcomes: &'a [FetchOutcome],
}

/// Write the whole report as pretty JSON (outcomes in manifest order).
pub fn write_json_report(path: &Path, report: &SyncReport) -> Result<()> {
    let doc = JsonReport {
        finished_at: unix_timestamp(),
        elapsed_ms: report.elapsed.as_millis() as u64,
        peak_in_flight: report.peak_in_flight,
        halted: report.halted.as_deref(),
        summary: SyncSummary::from_outcomes(&report.outcomes),
        outcomes: &report.outcomes,
    };
    let json = serde_json::to_string_pretty(&doc)?;
    fs::write(path, json).with_context(|| format!("write report: {}", path.display()))?;
    Ok(())
}
