//! Sync engine: decide per task whether to skip, probe or fetch, run the
//! network work on a bounded pool of worker threads, and fold the results
//! back into the fingerprint store.
//!
//! The engine is blocking. Callers on an async runtime should run `sync` in
//! `spawn_blocking`.

mod gauge;
mod outcome;
mod prepare;
mod run;
mod worker;


pub use gauge::{InFlightGauge, InFlightGuard};
pub use outcome::{FetchOutcome, FetchStatus};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::control::RunControl;
use crate::fingerprint::{CachePolicy, FingerprintStore};
use crate::manifest::DownloadTask;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Precondition violations. Per-task problems never surface here; they are
/// recorded as `Failed` outcomes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
    #[error("duplicate logical key: {0}")]
    DuplicateKey(String),
    /// Two tasks would write the same file.
    #[error("tasks {first} and {second} share destination {}", .path.display())]
    DuplicateDestination {
        first: String,
        second: String,
        path: PathBuf,
    },
}

/// Explicit run context.
#[derive(Clone)]
pub struct SyncOptions {
    pub transport: Arc<dyn Transport>,
    pub retry: RetryPolicy,
    pub cache_policy: CachePolicy,
    /// HEAD cached assets and compare size/ETag instead of trusting the cache.
    pub probe_remote: bool,
    /// Fetch every task regardless of fingerprints.
    pub force: bool,
    pub control: RunControl,
    /// Receives each outcome as soon as it is final.
    pub outcome_tx: Option<tokio::sync::mpsc::UnboundedSender<FetchOutcome>>,
}

impl SyncOptions {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            cache_policy: CachePolicy::default(),
            probe_remote: false,
            force: false,
            control: RunControl::new(),
            outcome_tx: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    /// One outcome per task, in manifest order.
    pub outcomes: Vec<FetchOutcome>,
    /// Most network operations observed in flight at once.
    pub peak_in_flight: usize,
    pub elapsed: Duration,
    /// Set when the run was cancelled, hit its deadline, or halted on a storage error.
    pub halted: Option<String>,
}

impl SyncReport {
    pub fn count(&self, status: FetchStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes_transferred).sum()
    }
}

pub struct SyncEngine {
    opts: SyncOptions,
}

impl SyncEngine {
    pub fn new(opts: SyncOptions) -> Self {
        Self { opts }
    }

    pub fn control(&self) -> &RunControl {
        &self.opts.control
    }

    /// Bring every task's destination up to date. Exactly one outcome per
    /// task; at most `concurrency` network operations at a time. The caller
    /// persists `store` afterwards.
    pub fn sync(
        &self,
        tasks: &[DownloadTask],
        store: &mut FingerprintStore,
        concurrency: usize,
    ) -> Result<SyncReport, SyncError> {
        run::sync(&self.opts, tasks, store, concurrency)
    }
}
