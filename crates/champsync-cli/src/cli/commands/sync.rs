//! `champsync sync <manifest>`: run the engine over a manifest.

use anyhow::Result;
use champsync_core::config::SyncConfig;
use champsync_core::control::RunControl;
use champsync_core::engine::{FetchOutcome, FetchStatus, SyncEngine, SyncOptions};
use champsync_core::fingerprint::{CachePolicy, FingerprintDb};
use champsync_core::manifest::Manifest;
use champsync_core::report::{self, SyncSummary};
use champsync_core::retry::RetryPolicy;
use champsync_core::transport::{CurlTransport, TransportOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Flags of the `sync` subcommand; `None`/`false` means "use config".
#[derive(Debug, Clone)]
pub struct SyncArgs {
    pub manifest: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub probe: bool,
    pub reverify: bool,
    pub force: bool,
    pub deadline: Option<u64>,
    pub report: Option<PathBuf>,
}

impl SyncArgs {
    fn output_dir(&self, cfg: &SyncConfig) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| cfg.output_dir())
    }

    fn cache_policy(&self, cfg: &SyncConfig) -> CachePolicy {
        if self.reverify {
            CachePolicy::Reverify
        } else {
            cfg.cache_policy
        }
    }

    fn run_control(&self, cfg: &SyncConfig) -> RunControl {
        match self.deadline.or(cfg.run_deadline_secs) {
            Some(secs) => RunControl::with_deadline(Duration::from_secs(secs)),
            None => RunControl::new(),
        }
    }
}

fn print_outcome(o: &FetchOutcome) {
    match o.status {
        FetchStatus::Failed => println!(
            "  {:<18} {}  ({})",
            o.status,
            o.logical_key,
            o.error.as_deref().unwrap_or("unknown")
        ),
        FetchStatus::Skipped => {}
        _ => println!("  {:<18} {}  {} bytes", o.status, o.logical_key, o.bytes_transferred),
    }
}

/// Returns Ok(false) if any task failed.
pub async fn run_sync(db: &FingerprintDb, cfg: &SyncConfig, args: SyncArgs) -> Result<bool> {
    let output_dir = args.output_dir(cfg);
    let manifest = Manifest::load(&args.manifest, &output_dir)?;
    let mut store = db.load().await?;
    tracing::info!(
        tasks = manifest.len(),
        fingerprints = store.len(),
        output_dir = %output_dir.display(),
        "sync starting"
    );

    let control = args.run_control(cfg);
    let interrupt = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, finishing in-flight transfers...");
            interrupt.cancel();
        }
    });

    let (outcome_tx, mut outcome_rx) = tokio::sync::mpsc::unbounded_channel::<FetchOutcome>();
    let printer = tokio::spawn(async move {
        while let Some(o) = outcome_rx.recv().await {
            print_outcome(&o);
        }
    });

    let opts = SyncOptions {
        transport: Arc::new(CurlTransport::new(TransportOptions::from(cfg))),
        retry: RetryPolicy::from(&cfg.retry_config()),
        cache_policy: args.cache_policy(cfg),
        probe_remote: args.probe || cfg.probe_remote,
        force: args.force,
        control,
        outcome_tx: Some(outcome_tx),
    };
    let concurrency = args.concurrency.unwrap_or(cfg.concurrency);
    let tasks = manifest.tasks;
    let (result, store) = tokio::task::spawn_blocking(move || {
        let engine = SyncEngine::new(opts);
        let result = engine.sync(&tasks, &mut store, concurrency);
        (result, store)
    })
    .await?;
    let _ = printer.await;
    let report = result?;

    db.save(&store).await?;

    let log_path = output_dir.join(report::ERROR_LOG_NAME);
    match report::append_error_log(&log_path, &report.outcomes) {
        Ok(0) => {}
        Ok(n) => println!("{} failure(s) logged to {}", n, log_path.display()),
        Err(e) => tracing::warn!("could not write {}: {:#}", log_path.display(), e),
    }
    if let Some(path) = &args.report {
        report::write_json_report(path, &report)?;
    }

    let summary = SyncSummary::from_outcomes(&report.outcomes);
    println!("{}", summary);
    if let Some(reason) = &report.halted {
        println!("run stopped early: {}", reason);
    }
    Ok(summary.all_ok())
}
