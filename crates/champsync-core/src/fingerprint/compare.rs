//! "Has this asset changed?" without always paying for the body.

use serde::{Deserialize, Serialize};

use super::Fingerprint;
use crate::transport::RemoteProbe;

/// What to do with a cached asset when no remote probe is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Stored fingerprint + file on disk is enough to skip.
    #[default]
    #[serde(alias = "trust")]
    TrustCache,
    /// Always download and compare by hash.
    Reverify,
}

/// Returns true when the asset must be transferred.
///
/// The local file is re-checked rather than trusted from the store. A probe
/// that disagrees with the stored size or ETag forces a fetch; a probe that
/// agrees allows a skip; no probe falls back to `policy`.
pub fn needs_fetch(
    stored: Option<&Fingerprint>,
    local_file_present: bool,
    remote_probe: Option<&RemoteProbe>,
    policy: CachePolicy,
) -> bool {
    let Some(stored) = stored else {
        return true;
    };
    if !local_file_present {
        return true;
    }
    match remote_probe {
        Some(probe) => {
            if let Some(len) = probe.content_length {
                if len != stored.byte_length {
                    tracing::debug!(key = %stored.logical_key, stored = stored.byte_length, remote = len, "size changed");
                    return true;
                }
            }
            if let (Some(a), Some(b)) = (stored.etag.as_deref(), probe.etag.as_deref()) {
                if a != b {
                    tracing::debug!(key = %stored.logical_key, "etag changed");
                    return true;
                }
            }
            if probe.content_length.is_none() && (stored.etag.is_none() || probe.etag.is_none()) {
                return policy == CachePolicy::Reverify;
            }
            false
        }
        None => policy == CachePolicy::Reverify,
    }
}
