//! Destination directory creation on the coordinating thread.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::storage;

#[derive(Debug, Clone)]
pub(super) struct DirError {
    pub reason: String,
    /// Disk full or read-only filesystem: every later task would fail too.
    pub fatal: bool,
}

impl DirError {
    pub fn from_io(dir: &Path, e: &std::io::Error) -> Self {
        Self {
            reason: format!("cannot create {}: {}", dir.display(), e),
            fatal: storage::is_environment_fatal(e),
        }
    }
}

/// Creates each destination directory once. A directory that could not be
/// created is remembered, and later tasks under it fail without another `mkdir`.
#[derive(Debug, Default)]
pub(super) struct DirPreparer {
    ready: HashSet<PathBuf>,
    blocked: HashMap<PathBuf, String>,
}

impl DirPreparer {
    pub fn prepare(&mut self, dest: &Path) -> Result<(), DirError> {
        let Some(dir) = dest.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if self.ready.contains(dir) {
            return Ok(());
        }
        if let Some(reason) = dir.ancestors().find_map(|a| self.blocked.get(a)) {
            return Err(DirError {
                reason: reason.clone(),
                fatal: false,
            });
        }
        match std::fs::create_dir_all(dir) {
            Ok(()) => {
                self.ready.insert(dir.to_path_buf());
                Ok(())
            }
            Err(e) => {
                let blocker = first_missing_ancestor(dir);
                let err = DirError::from_io(&blocker, &e);
                tracing::warn!("{}", err.reason);
                self.blocked.insert(blocker, err.reason.clone());
                Err(err)
            }
        }
    }
}

/// Topmost ancestor of `dir` that does not exist, i.e. the `mkdir` that failed.
/// Falls back to `dir` itself when every component exists (e.g. a file in the way).
fn first_missing_ancestor(dir: &Path) -> PathBuf {
    let mut blocker = dir;
    for a in dir.ancestors() {
        if a.as_os_str().is_empty() || a.exists() {
            break;
        }
        blocker = a;
    }
    blocker.to_path_buf()
}
