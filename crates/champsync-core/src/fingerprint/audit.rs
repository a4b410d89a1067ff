//! Check stored fingerprints against the files on disk.

use std::fmt;

use super::FingerprintStore;
use crate::checksum;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditProblem {
    /// No file at the recorded path.
    Missing,
    /// File exists but its size differs from the fingerprint.
    SizeMismatch { stored: u64, actual: u64 },
    /// Same size, different content.
    HashMismatch,
    /// File could not be read.
    Unreadable(String),
}

impl fmt::Display for AuditProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditProblem::Missing => write!(f, "missing"),
            AuditProblem::SizeMismatch { stored, actual } => {
                write!(f, "size {} (stored {})", actual, stored)
            }
            AuditProblem::HashMismatch => write!(f, "content changed"),
            AuditProblem::Unreadable(e) => write!(f, "unreadable: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditFinding {
    pub logical_key: String,
    pub problem: AuditProblem,
}

impl FingerprintStore {
    /// Re-hash every recorded file. Returns one finding per stale entry.
    pub fn audit(&self) -> Vec<AuditFinding> {
        let mut findings = Vec::new();
        for fp in self.iter() {
            let problem = match std::fs::metadata(&fp.local_path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(AuditProblem::Missing),
                Err(e) => Some(AuditProblem::Unreadable(e.to_string())),
                Ok(meta) if meta.len() != fp.byte_length => Some(AuditProblem::SizeMismatch {
                    stored: fp.byte_length,
                    actual: meta.len(),
                }),
                Ok(_) => match checksum::sha256_path(&fp.local_path) {
                    Ok(h) if h == fp.content_hash => None,
                    Ok(_) => Some(AuditProblem::HashMismatch),
                    Err(e) => Some(AuditProblem::Unreadable(format!("{:#}", e))),
                },
            };
            if let Some(problem) = problem {
                findings.push(AuditFinding {
                    logical_key: fp.logical_key.clone(),
                    problem,
                });
            }
        }
        findings
    }
}
