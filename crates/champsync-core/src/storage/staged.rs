//! Hash-while-writing temp file with atomic finalize.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::{ContentHash, StreamHasher};

/// Body being written to `<dest>.part`. Removes the temp file on drop.
pub struct StagedFile {
    file: Option<BufWriter<File>>,
    temp_path: PathBuf,
    hasher: StreamHasher,
}

impl StagedFile {
    /// Create (or truncate) the temp file next to `final_path`.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let temp_path = super::temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        Ok(Self {
            file: Some(BufWriter::new(file)),
            temp_path,
            hasher: StreamHasher::new(),
        })
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.write_all(data)?,
            None => return Err(io::Error::new(io::ErrorKind::Other, "staged file already closed")),
        }
        self.hasher.update(data);
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.hasher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hasher.is_empty()
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Flush and fsync, returning the digest. The file is still under its temp name.
    pub fn finish(mut self) -> io::Result<Staged> {
        let Some(writer) = self.file.take() else {
            return Err(io::Error::new(io::ErrorKind::Other, "staged file already closed"));
        };
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        let hasher = std::mem::take(&mut self.hasher);
        let (hash, len) = hasher.finish();
        Ok(Staged {
            temp_path: std::mem::take(&mut self.temp_path),
            hash,
            len,
            committed: false,
        })
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.temp_path.as_os_str().is_empty() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// A fully written, hashed temp file waiting to be committed or discarded.
#[derive(Debug)]
pub struct Staged {
    temp_path: PathBuf,
    hash: ContentHash,
    len: u64,
    committed: bool,
}

impl Staged {
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Atomically rename the temp file to `final_path`.
    pub fn commit(mut self, final_path: &Path) -> io::Result<()> {
        std::fs::rename(&self.temp_path, final_path)?;
        self.committed = true;
        Ok(())
    }

    /// Drop the temp file, leaving any existing destination untouched.
    pub fn discard(self) {}
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
