//! `champsync status`: list stored fingerprints.

use anyhow::Result;
use champsync_core::fingerprint::FingerprintDb;

pub async fn run_status(db: &FingerprintDb) -> Result<()> {
    let store = db.load().await?;
    if store.is_empty() {
        println!("No fingerprints in database.");
        return Ok(());
    }
    println!("{:<12} {:>10} {:<12} {:<40} {}", "HASH", "SIZE", "VERIFIED", "KEY", "PATH");
    for fp in store.iter() {
        let hex = fp.content_hash.to_hex();
        println!(
            "{:<12} {:>10} {:<12} {:<40} {}",
            &hex[..12],
            fp.byte_length,
            fp.last_verified_at,
            fp.logical_key,
            fp.local_path.display()
        );
    }
    println!("{} fingerprint(s)", store.len());
    Ok(())
}
