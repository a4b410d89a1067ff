//! Disk side of a fetch: stage the body under `<dest>.part`, hash while
//! writing, and rename into place only once the digest is known.
//!
//! A staged file that is dropped without `commit` removes its temp file, so a
//! failed or interrupted attempt never leaves anything under the final name.

mod staged;

pub use staged::{Staged, StagedFile};

use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `Ahri.png` → `Ahri.png.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// True for I/O errors that will hit every remaining task the same way
/// (disk full, quota exceeded, read-only filesystem).
pub fn is_environment_fatal(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        if let Some(code) = e.raw_os_error() {
            return code == libc::ENOSPC || code == libc::EROFS || code == libc::EDQUOT;
        }
    }
    let _ = e;
    false
}
