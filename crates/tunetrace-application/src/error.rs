// SPDX-License-Identifier: GPL-3.0-or-later
use thiserror::Error;
use tunetrace_fingerprint::FingerprintError;
use tunetrace_infrastructure::StoreError;

/// Errors returned by indexing, recognition and deletion.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Failed to fingerprint audio: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    #[error("Failed to read directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An indexing task panicked or was aborted by the runtime.
    #[error("Indexing task failed: {0}")]
    Task(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl LibraryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

pub type LibraryResult<T> = Result<T, LibraryError>;
