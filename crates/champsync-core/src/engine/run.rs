//! Coordinator: pre-check, queue, worker pool, aggregation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::gauge::InFlightGauge;
use super::outcome::{FetchOutcome, FetchStatus};
use super::prepare::{DirError, DirPreparer};
use super::worker::{worker_loop, Completed, WorkDone, WorkItem, WorkKind, WorkerContext};
use super::{SyncError, SyncOptions, SyncReport};
use crate::control::RunControl;
use crate::fingerprint::{needs_fetch, unix_timestamp, Fingerprint, FingerprintStore};
use crate::manifest::DownloadTask;
use crate::retry::FetchError;

pub(super) fn sync(
    opts: &SyncOptions,
    tasks: &[DownloadTask],
    store: &mut FingerprintStore,
    concurrency: usize,
) -> Result<SyncReport, SyncError> {
    if concurrency == 0 {
        return Err(SyncError::InvalidConcurrency);
    }
    let mut keys = HashSet::with_capacity(tasks.len());
    let mut dests: HashMap<&Path, &str> = HashMap::with_capacity(tasks.len());
    for t in tasks {
        if !keys.insert(t.logical_key()) {
            return Err(SyncError::DuplicateKey(t.logical_key().to_string()));
        }
        if let Some(first) = dests.insert(t.destination_path(), t.logical_key()) {
            return Err(SyncError::DuplicateDestination {
                first: first.to_string(),
                second: t.logical_key().to_string(),
                path: t.destination_path().to_path_buf(),
            });
        }
    }

    let started = Instant::now();
    let control = &opts.control;
    let mut outcomes: HashMap<String, FetchOutcome> = HashMap::with_capacity(tasks.len());

    let mut dirs = DirPreparer::default();
    let mut queue = VecDeque::new();
    for (index, task) in tasks.iter().enumerate() {
        if control.is_cancelled() {
            break;
        }
        let key = task.logical_key();
        let stored = store.get(key).cloned();
        let present = task.destination_path().is_file();
        let kind = match &stored {
            _ if opts.force => WorkKind::Fetch,
            None => WorkKind::Fetch,
            Some(_) if !present => WorkKind::Fetch,
            // Recorded for another file; whatever sits at this path is unverified.
            Some(fp) if fp.local_path != task.destination_path() => WorkKind::Fetch,
            Some(_) if opts.probe_remote => WorkKind::Probe,
            Some(fp) => {
                if !needs_fetch(Some(fp), present, None, opts.cache_policy) {
                    tracing::debug!(key, "cached");
                    record(opts, &mut outcomes, FetchOutcome::skipped(key, fp.content_hash, 0));
                    continue;
                }
                WorkKind::Fetch
            }
        };
        if let Err(e) = url::Url::parse(task.source_locator()) {
            let err = FetchError::InvalidLocator(format!("{}: {}", task.source_locator(), e));
            tracing::warn!(key, "{}", err);
            record(opts, &mut outcomes, FetchOutcome::failed(key, err.to_string(), 0));
            continue;
        }
        if let Err(e) = dirs.prepare(task.destination_path()) {
            record(opts, &mut outcomes, dir_failed(control, key, e));
            continue;
        }
        queue.push_back(WorkItem {
            index,
            url: task.source_locator().to_string(),
            dest: task.destination_path().to_path_buf(),
            kind,
            stored,
            file_present: present,
        });
    }

    let gauge = Arc::new(InFlightGauge::new());
    let queued = queue.len();
    let num_workers = concurrency.min(queued);
    tracing::info!(
        tasks = tasks.len(),
        queued,
        workers = num_workers,
        "starting sync"
    );
    let work = Arc::new(Mutex::new(queue));
    let (tx, rx) = mpsc::channel::<WorkDone>();
    let ctx = WorkerContext {
        transport: Arc::clone(&opts.transport),
        retry: opts.retry,
        cache_policy: opts.cache_policy,
        control: control.clone(),
        gauge: Arc::clone(&gauge),
    };
    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let ctx = ctx.clone();
        let work = Arc::clone(&work);
        let tx = tx.clone();
        handles.push(std::thread::spawn(move || worker_loop(ctx, work, tx)));
    }
    drop(tx);

    // Channel closes once every worker has exited.
    for done in rx {
        let task = &tasks[done.index];
        let outcome = apply(task, done, store, control);
        match outcome.status {
            FetchStatus::Failed => tracing::warn!(
                key = %outcome.logical_key,
                attempts = outcome.attempts,
                "failed: {}",
                outcome.error.as_deref().unwrap_or("unknown")
            ),
            status => tracing::info!(
                key = %outcome.logical_key,
                bytes = outcome.bytes_transferred,
                "{}",
                status
            ),
        }
        record(opts, &mut outcomes, outcome);
    }

    let mut panicked = false;
    for h in handles {
        if h.join().is_err() {
            panicked = true;
        }
    }

    let halted = control.is_cancelled().then(|| {
        control
            .reason()
            .unwrap_or_else(|| "cancelled".to_string())
    });
    let missing_reason = match (&halted, panicked) {
        (Some(r), _) => r.clone(),
        (None, true) => "worker panicked".to_string(),
        (None, false) => "not attempted".to_string(),
    };
    for task in tasks {
        if !outcomes.contains_key(task.logical_key()) {
            record(opts, &mut outcomes, FetchOutcome::failed(task.logical_key(), missing_reason.clone(), 0));
        }
    }

    let ordered: Vec<FetchOutcome> = tasks
        .iter()
        .filter_map(|t| outcomes.remove(t.logical_key()))
        .collect();
    let report = SyncReport {
        outcomes: ordered,
        peak_in_flight: gauge.peak(),
        elapsed: started.elapsed(),
        halted,
    };
    tracing::info!(
        downloaded = report.count(FetchStatus::Downloaded),
        unchanged = report.count(FetchStatus::VerifiedUnchanged),
        skipped = report.count(FetchStatus::Skipped),
        failed = report.count(FetchStatus::Failed),
        peak_in_flight = report.peak_in_flight,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "sync finished"
    );
    Ok(report)
}

/// Outcome for a task whose directory could not be created. A fatal cause
/// (disk full, read-only filesystem) halts the run.
pub(super) fn dir_failed(control: &RunControl, key: &str, e: DirError) -> FetchOutcome {
    if e.fatal {
        tracing::error!("halting run: {}", e.reason);
        control.halt(e.reason.clone());
    }
    FetchOutcome::failed(key, e.reason, 0)
}

fn record(opts: &SyncOptions, outcomes: &mut HashMap<String, FetchOutcome>, outcome: FetchOutcome) {
    if let Some(tx) = &opts.outcome_tx {
        let _ = tx.send(outcome.clone());
    }
    outcomes.insert(outcome.logical_key.clone(), outcome);
}

/// Fold one worker result into the store and turn it into an outcome.
fn apply(
    task: &DownloadTask,
    done: WorkDone,
    store: &mut FingerprintStore,
    control: &RunControl,
) -> FetchOutcome {
    let key = task.logical_key();
    match done.result {
        Ok(Completed::ProbeMatched) => match store.get(key) {
            Some(fp) => FetchOutcome::skipped(key, fp.content_hash, done.attempts),
            None => FetchOutcome::failed(key, "fingerprint vanished during run", done.attempts),
        },
        Ok(Completed::Unchanged { hash, len, etag }) => {
            if let Some(mut fp) = store.get(key).cloned() {
                fp.last_verified_at = unix_timestamp();
                if etag.is_some() {
                    fp.etag = etag;
                }
                store.insert(fp);
            }
            FetchOutcome::fetched(key, FetchStatus::VerifiedUnchanged, hash, len, done.attempts)
        }
        Ok(Completed::Written { hash, len, etag }) => {
            store.insert(Fingerprint {
                logical_key: key.to_string(),
                content_hash: hash,
                byte_length: len,
                local_path: task.destination_path().to_path_buf(),
                etag,
                last_verified_at: unix_timestamp(),
            });
            FetchOutcome::fetched(key, FetchStatus::Downloaded, hash, len, done.attempts)
        }
        Err(FetchError::Cancelled) => FetchOutcome::failed(
            key,
            control.reason().unwrap_or_else(|| "cancelled".to_string()),
            done.attempts,
        ),
        Err(e) => FetchOutcome::failed(key, e.to_string(), done.attempts),
    }
}
