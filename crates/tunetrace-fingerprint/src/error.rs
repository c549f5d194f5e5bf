// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FingerprintError>;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid landmark hash: {0}")]
    InvalidHash(String),

    /// The blocking decode task panicked or was cancelled by the runtime.
    #[error("Fingerprint task failed: {0}")]
    Task(String),
}

impl FingerprintError {
    /// Whether the input file itself could not be turned into samples.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::UnsupportedFormat(_))
    }
}
