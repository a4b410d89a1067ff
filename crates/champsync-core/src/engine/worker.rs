//! Worker side of a sync: probe, fetch with retry, stage, commit.
//!
//! Workers never touch the fingerprint store. They report what happened on
//! disk and the coordinator records it.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use super::gauge::InFlightGauge;
use crate::checksum::ContentHash;
use crate::control::RunControl;
use crate::fingerprint::{needs_fetch, CachePolicy, Fingerprint};
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::storage::{Staged, StagedFile};
use crate::transport::{FetchMeta, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WorkKind {
    /// Cached and present: HEAD first, fetch only if the probe disagrees.
    Probe,
    Fetch,
}

#[derive(Debug)]
pub(super) struct WorkItem {
    pub index: usize,
    pub url: String,
    pub dest: PathBuf,
    pub kind: WorkKind,
    pub stored: Option<Fingerprint>,
    pub file_present: bool,
}

#[derive(Debug)]
pub(super) enum Completed {
    /// Probe agreed with the stored fingerprint.
    ProbeMatched,
    /// Body hashed equal to the stored fingerprint; temp file discarded.
    Unchanged {
        hash: ContentHash,
        len: u64,
        etag: Option<String>,
    },
    /// Body committed to the destination.
    Written {
        hash: ContentHash,
        len: u64,
        etag: Option<String>,
    },
}

#[derive(Debug)]
pub(super) struct WorkDone {
    pub index: usize,
    pub result: Result<Completed, FetchError>,
    pub attempts: u32,
}

/// Everything a worker thread shares with its siblings.
#[derive(Clone)]
pub(super) struct WorkerContext {
    pub transport: Arc<dyn Transport>,
    pub retry: RetryPolicy,
    pub cache_policy: CachePolicy,
    pub control: RunControl,
    pub gauge: Arc<InFlightGauge>,
}

/// Pull items until the queue is empty or the run is cancelled.
pub(super) fn worker_loop(
    ctx: WorkerContext,
    work: Arc<Mutex<VecDeque<WorkItem>>>,
    tx: mpsc::Sender<WorkDone>,
) {
    loop {
        if ctx.control.is_cancelled() {
            break;
        }
        let item = match work.lock() {
            Ok(mut q) => q.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        let Some(item) = item else {
            break;
        };
        let done = process(&ctx, &item);
        if let Err(e) = &done.result {
            if e.is_environment_fatal() {
                tracing::error!("halting run: {}", e);
                ctx.control.halt(e.to_string());
            }
        }
        if tx.send(done).is_err() {
            break;
        }
    }
}

fn process(ctx: &WorkerContext, item: &WorkItem) -> WorkDone {
    let mut attempts = 0;
    if item.kind == WorkKind::Probe {
        let probed = run_with_retry(&ctx.retry, &ctx.control, |_| {
            let _in_flight = ctx.gauge.enter();
            ctx.transport.probe(&item.url, &ctx.control)
        });
        attempts += probed.attempts;
        let probe = match probed.result {
            Ok(p) => Some(p),
            Err(FetchError::Cancelled) => {
                return WorkDone {
                    index: item.index,
                    result: Err(FetchError::Cancelled),
                    attempts,
                }
            }
            Err(e) => {
                tracing::debug!(url = %item.url, "probe unavailable: {}", e);
                None
            }
        };
        if !needs_fetch(
            item.stored.as_ref(),
            item.file_present,
            probe.as_ref(),
            ctx.cache_policy,
        ) {
            return WorkDone {
                index: item.index,
                result: Ok(Completed::ProbeMatched),
                attempts,
            };
        }
    }

    let fetched = run_with_retry(&ctx.retry, &ctx.control, |_| fetch_once(ctx, item));
    attempts += fetched.attempts;
    let result = fetched.result.and_then(|(staged, meta)| settle(item, staged, meta));
    WorkDone {
        index: item.index,
        result,
        attempts,
    }
}

/// One GET into a fresh `<dest>.part`. Any error drops (and removes) the temp file.
fn fetch_once(ctx: &WorkerContext, item: &WorkItem) -> Result<(Staged, FetchMeta), FetchError> {
    let _in_flight = ctx.gauge.enter();
    let mut staged = StagedFile::create(&item.dest).map_err(FetchError::Storage)?;
    let meta = ctx.transport.fetch(&item.url, &ctx.control, &mut |chunk: &[u8]| {
        staged.write(chunk)
    })?;
    if staged.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    let staged = staged.finish().map_err(FetchError::Storage)?;
    Ok((staged, meta))
}

/// Commit the staged body, or discard it when it matches what is already on disk.
fn settle(item: &WorkItem, staged: Staged, meta: FetchMeta) -> Result<Completed, FetchError> {
    let hash = staged.hash();
    let len = staged.len();
    let unchanged = item.file_present
        && item
            .stored
            .as_ref()
            .is_some_and(|fp| fp.content_hash == hash && fp.local_path == item.dest);
    if unchanged {
        staged.discard();
        return Ok(Completed::Unchanged {
            hash,
            len,
            etag: meta.etag,
        });
    }
    staged.commit(&item.dest).map_err(FetchError::Storage)?;
    Ok(Completed::Written {
        hash,
        len,
        etag: meta.etag,
    })
}
