//! `champsync verify [--prune]`: audit recorded files against their fingerprints.

use anyhow::Result;
use champsync_core::fingerprint::FingerprintDb;

/// Returns Ok(true) when every fingerprint matched (or stale ones were pruned).
pub async fn run_verify(db: &FingerprintDb, prune: bool) -> Result<bool> {
    let store = db.load().await?;
    let total = store.len();
    let findings = tokio::task::spawn_blocking(move || store.audit()).await?;

    for f in &findings {
        println!("{:<40} {}", f.logical_key, f.problem);
    }
    if prune {
        for f in &findings {
            db.remove(&f.logical_key).await?;
        }
        if !findings.is_empty() {
            tracing::info!(pruned = findings.len(), "pruned stale fingerprints");
        }
    }
    println!(
        "{} of {} fingerprint(s) stale{}",
        findings.len(),
        total,
        if prune && !findings.is_empty() { " (pruned)" } else { "" }
    );
    Ok(findings.is_empty() || prune)
}
