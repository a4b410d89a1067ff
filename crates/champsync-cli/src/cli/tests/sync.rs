//! Tests for the sync subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_sync_defaults() {
    match parse(&["champsync", "sync", "manifest.json"]) {
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
            assert_eq!(manifest, Path::new("manifest.json"));
            assert!(output_dir.is_none());
            assert!(concurrency.is_none());
            assert!(!probe && !reverify && !force);
            assert!(deadline.is_none());
            assert!(report.is_none());
        }
        _ => panic!("expected Sync"),
    }
}

#[test]
fn cli_parse_sync_all_flags() {
    match parse(&[
        "champsync",
        "sync",
        "m.json",
        "--output-dir",
        "/srv/lol",
        "-j",
        "4",
        "--probe",
        "--reverify",
        "--force",
        "--deadline",
        "900",
        "--report",
        "run.json",
    ]) {
        CliCommand::Sync {
            output_dir,
            concurrency,
            probe,
            reverify,
            force,
            deadline,
            report,
            ..
        } => {
            assert_eq!(output_dir.as_deref(), Some(Path::new("/srv/lol")));
            assert_eq!(concurrency, Some(4));
            assert!(probe && reverify && force);
            assert_eq!(deadline, Some(900));
            assert_eq!(report.as_deref(), Some(Path::new("run.json")));
        }
        _ => panic!("expected Sync with flags"),
    }
}

#[test]
fn cli_parse_sync_requires_manifest() {
    assert!(Cli::try_parse_from(["champsync", "sync"]).is_err());
}

#[test]
fn cli_parse_global_db() {
    let cli = Cli::try_parse_from(["champsync", "status", "--db", "/tmp/fp.db"]).unwrap();
    assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/fp.db")));
    assert!(matches!(cli.command, CliCommand::Status));
}
