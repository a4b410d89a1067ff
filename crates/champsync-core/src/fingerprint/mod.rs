//! Fingerprints: what we last saw for each logical asset key.
//!
//! `FingerprintStore` is the in-memory map the engine mutates during a run;
//! `FingerprintDb` loads it from and flushes it to SQLite around the run.

mod audit;
mod compare;
mod db;

pub use audit::{AuditFinding, AuditProblem};
pub use compare::{needs_fetch, CachePolicy};
pub use db::FingerprintDb;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::checksum::ContentHash;

/// Last verified content of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    pub logical_key: String,
    pub content_hash: ContentHash,
    pub byte_length: u64,
    /// Where the file was written when this fingerprint was recorded.
    pub local_path: PathBuf,
    /// ETag the server sent with the body, if any.
    pub etag: Option<String>,
    /// Unix seconds.
    pub last_verified_at: i64,
}

/// logical_key -> Fingerprint. Entries are only ever replaced whole.
#[derive(Debug, Clone, Default)]
pub struct FingerprintStore {
    entries: BTreeMap<String, Fingerprint>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Fingerprint> {
        self.entries.get(key)
    }

    /// Insert or replace the fingerprint for its logical key. Returns the previous one.
    pub fn insert(&mut self, fp: Fingerprint) -> Option<Fingerprint> {
        self.entries.insert(fp.logical_key.clone(), fp)
    }

    pub fn remove(&mut self, key: &str) -> Option<Fingerprint> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by logical key.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.entries.values()
    }
}

impl FromIterator<Fingerprint> for FingerprintStore {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        let mut store = FingerprintStore::new();
        for fp in iter {
            store.insert(fp);
        }
        store
    }
}

/// Current time as Unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
pub(crate) fn sample(key: &str, body: &[u8], path: impl Into<PathBuf>) -> Fingerprint {
    Fingerprint {
        logical_key: key.to_string(),
        content_hash: ContentHash::of(body),
        byte_length: body.len() as u64,
        local_path: path.into(),
        etag: None,
        last_verified_at: 1_700_000_000,
    }
}
