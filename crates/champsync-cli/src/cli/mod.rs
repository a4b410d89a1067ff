//! CLI for champsync.

mod commands;

use anyhow::Result;
use champsync_core::config;
use champsync_core::fingerprint::FingerprintDb;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_forget, run_status, run_sync, run_verify, SyncArgs};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "champsync")]
#[command(about = "champsync: change-aware sync of wiki champion assets", long_about = None)]
pub struct Cli {
    /// Fingerprint database (default: ~/.local/state/champsync/fingerprints.db).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download new or changed assets listed in a manifest.
    Sync {
        /// JSON manifest: {"tasks": [{"key", "url", "path", "category"}]}.
        manifest: PathBuf,
        /// Root for relative manifest paths (overrides config output_dir).
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Maximum fetches in flight (overrides config concurrency).
        #[arg(long, short = 'j', value_name = "N")]
        concurrency: Option<usize>,
        /// HEAD each cached asset and re-fetch when its size or ETag changed.
        #[arg(long)]
        probe: bool,
        /// Re-download cached assets and compare by hash.
        #[arg(long)]
        reverify: bool,
        /// Ignore fingerprints and fetch everything.
        #[arg(long)]
        force: bool,
        /// Stop the run after this many seconds.
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,
        /// Write a JSON report of every outcome to this file.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// List stored fingerprints.
    Status,

    /// Re-hash recorded files and report missing or changed ones.
    Verify {
        /// Drop fingerprints whose files are missing or changed.
        #[arg(long)]
        prune: bool,
    },

    /// Delete one fingerprint so its asset is fetched on the next sync.
    Forget {
        /// Logical key of the asset.
        key: String,
    },

    /// Compute SHA-256 of a file.
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    /// Returns Ok(false) when the command completed but found failures.
    pub async fn run_from_args() -> Result<bool> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        if let CliCommand::Checksum { path } = &cli.command {
            run_checksum(Path::new(path)).await?;
            return Ok(true);
        }

        let db = match &cli.db {
            Some(path) => FingerprintDb::open_at(path).await?,
            None => FingerprintDb::open_default().await?,
        };

        let ok = match cli.command {
            CliCommand::Sync {
                manifest,
                output_dir,
                concurrency,
                probe,
                reverify,
                force,
                deadline,
                report,
            } => {
                let args = SyncArgs {
                    manifest,
                    output_dir,
                    concurrency,
                    probe,
                    reverify,
                    force,
                    deadline,
                    report,
                };
                run_sync(&db, &cfg, args).await?
            }
            CliCommand::Status => {
                run_status(&db).await?;
                true
            }
            CliCommand::Verify { prune } => run_verify(&db, prune).await?,
            CliCommand::Forget { key } => {
                run_forget(&db, &key).await?;
                true
            }
            CliCommand::Checksum { .. } => true,
        };

        Ok(ok)
    }
}

#[cfg(test)]
mod tests;
