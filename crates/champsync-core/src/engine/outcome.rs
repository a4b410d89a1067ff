//! Terminal result of one task in one run.

use serde::Serialize;
use std::fmt;

use crate::checksum::ContentHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Cached copy trusted; no body transferred.
    Skipped,
    /// New or changed content written to the destination.
    Downloaded,
    /// Gave up on the task; see `FetchOutcome::error`.
    Failed,
    /// Body re-fetched but identical to the stored fingerprint.
    VerifiedUnchanged,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Skipped => "skipped",
            FetchStatus::Downloaded => "downloaded",
            FetchStatus::Failed => "failed",
            FetchStatus::VerifiedUnchanged => "verified_unchanged",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub logical_key: String,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub bytes_transferred: u64,
    /// Network attempts spent on the task (probe and fetch combined).
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
}

impl FetchOutcome {
    pub(crate) fn skipped(key: &str, hash: ContentHash, attempts: u32) -> Self {
        Self {
            logical_key: key.to_string(),
            status: FetchStatus::Skipped,
            error: None,
            bytes_transferred: 0,
            attempts,
            content_hash: Some(hash),
        }
    }

    pub(crate) fn fetched(
        key: &str,
        status: FetchStatus,
        hash: ContentHash,
        bytes: u64,
        attempts: u32,
    ) -> Self {
        Self {
            logical_key: key.to_string(),
            status,
            error: None,
            bytes_transferred: bytes,
            attempts,
            content_hash: Some(hash),
        }
    }

    pub(crate) fn failed(key: &str, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            logical_key: key.to_string(),
            status: FetchStatus::Failed,
            error: Some(reason.into()),
            bytes_transferred: 0,
            attempts,
            content_hash: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == FetchStatus::Failed
    }
}
