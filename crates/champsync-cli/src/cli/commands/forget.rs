//! `champsync forget <key>`: drop one fingerprint.

use anyhow::Result;
use champsync_core::fingerprint::FingerprintDb;

pub async fn run_forget(db: &FingerprintDb, key: &str) -> Result<()> {
    if db.remove(key).await? {
        println!("Forgot {key}");
    } else {
        println!("No fingerprint for {key}");
    }
    Ok(())
}
