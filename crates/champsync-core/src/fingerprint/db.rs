//! SQLite-backed fingerprint persistence.
//!
//! Loaded once before a sync and saved once after it; the engine itself only
//! touches the in-memory `FingerprintStore`.

use anyhow::Result;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::{Path, PathBuf};

use super::{Fingerprint, FingerprintStore};
use crate::checksum::ContentHash;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the fingerprint database.
///
/// Stored under the XDG state directory:
/// `~/.local/state/champsync/fingerprints.db` by default.
#[derive(Clone)]
pub struct FingerprintDb {
    pool: Pool<Sqlite>,
}

impl FingerprintDb {
    /// Default database location.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("champsync")?;
        Ok(xdg_dirs.get_state_home().join("fingerprints.db"))
    }

    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = FingerprintDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database for tests (no disk I/O).
    #[cfg(test)]
    pub(crate) async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = FingerprintDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fingerprints (
                logical_key TEXT PRIMARY KEY NOT NULL,
                content_hash TEXT NOT NULL,
                byte_length INTEGER NOT NULL,
                local_path TEXT NOT NULL,
                etag TEXT,
                last_verified_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load every readable fingerprint. Malformed rows are skipped with a
    /// warning so those keys are re-fetched instead of failing the run.
    pub async fn load(&self) -> Result<FingerprintStore> {
        let rows = sqlx::query(
            r#"
            SELECT logical_key, content_hash, byte_length, local_path, etag, last_verified_at
            FROM fingerprints
            ORDER BY logical_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut store = FingerprintStore::new();
        let mut skipped = 0usize;
        for row in &rows {
            match decode_row(row) {
                Ok(fp) => {
                    store.insert(fp);
                }
                Err(reason) => {
                    skipped += 1;
                    let key: Option<String> = row.try_get("logical_key").ok();
                    tracing::warn!(key = key.as_deref().unwrap_or("?"), "ignoring corrupt fingerprint: {}", reason);
                }
            }
        }
        tracing::debug!(loaded = store.len(), skipped, "fingerprints loaded");
        Ok(store)
    }

    /// Upsert every entry of `store` in one transaction.
    pub async fn save(&self, store: &FingerprintStore) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for fp in store.iter() {
            sqlx::query(
                r#"
                INSERT INTO fingerprints (
                    logical_key, content_hash, byte_length, local_path, etag, last_verified_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(logical_key) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    byte_length = excluded.byte_length,
                    local_path = excluded.local_path,
                    etag = excluded.etag,
                    last_verified_at = excluded.last_verified_at
                "#,
            )
            .bind(&fp.logical_key)
            .bind(fp.content_hash.to_hex())
            .bind(fp.byte_length as i64)
            .bind(fp.local_path.to_string_lossy().into_owned())
            .bind(&fp.etag)
            .bind(fp.last_verified_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Delete one fingerprint. Returns false if the key was not stored.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let r = sqlx::query(
            r#"
            DELETE FROM fingerprints
            WHERE logical_key = ?1
            "#,
        )
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }
}

fn decode_row(row: &SqliteRow) -> Result<Fingerprint, String> {
    let logical_key: String = row.try_get("logical_key").map_err(|e| e.to_string())?;
    let hash_hex: String = row.try_get("content_hash").map_err(|e| e.to_string())?;
    let content_hash: ContentHash = hash_hex.parse().map_err(|e: crate::checksum::InvalidHash| e.to_string())?;
    let byte_length: i64 = row.try_get("byte_length").map_err(|e| e.to_string())?;
    if byte_length < 0 {
        return Err(format!("negative byte_length {}", byte_length));
    }
    let local_path: String = row.try_get("local_path").map_err(|e| e.to_string())?;
    let etag: Option<String> = row.try_get("etag").map_err(|e| e.to_string())?;
    let last_verified_at: i64 = row.try_get("last_verified_at").map_err(|e| e.to_string())?;
    Ok(Fingerprint {
        logical_key,
        content_hash,
        byte_length: byte_length as u64,
        local_path: PathBuf::from(local_path),
        etag,
        last_verified_at,
    })
}
