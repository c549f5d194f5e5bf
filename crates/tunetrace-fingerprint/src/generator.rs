// SPDX-License-Identifier: GPL-3.0-or-later

//! Fingerprint generation from audio files and sample buffers.
//!
//! # Example
//!
//! ```no_run
//! use tunetrace_fingerprint::FingerprintGenerator;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = FingerprintGenerator::new();
//! let fingerprint = generator.generate_from_file(Path::new("song.mp3")).await?;
//! println!("Generated {} landmark hashes", fingerprint.len());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use tracing::{debug, instrument};

use crate::decoder::{decode_file, ChannelMode};
use crate::landmark::extract_landmark;
use crate::{Fingerprint, FingerprintError, Result, SpectralTransform};

/// Fingerprint generator for audio files.
///
/// Cheap to clone; the FFT plan is shared between clones.
#[derive(Debug, Clone, Default)]
pub struct FingerprintGenerator {
    transform: SpectralTransform,
    channel_mode: ChannelMode,
}

impl FingerprintGenerator {
    /// Create a generator that concatenates channels.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel_mode(channel_mode: ChannelMode) -> Self {
        Self {
            transform: SpectralTransform::new(),
            channel_mode,
        }
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    /// Fingerprint an already-decoded buffer.
    ///
    /// One hash per full window; a trailing partial window contributes nothing.
    pub fn fingerprint_samples(&self, samples: &[f32]) -> Fingerprint {
        self.transform
            .frames(samples)
            .map(|frame| extract_landmark(&frame))
            .collect()
    }

    /// Decode and fingerprint a file on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the file cannot be opened, probed or decoded.
    /// Nothing is returned for a file that fails part-way through.
    pub fn generate_blocking(&self, path: &Path) -> Result<Fingerprint> {
        let audio = decode_file(path, self.channel_mode)?;
        let fingerprint = self.fingerprint_samples(&audio.samples);

        debug!(
            file = %path.display(),
            sample_count = audio.samples.len(),
            duration_secs = audio.duration_secs(),
            hash_count = fingerprint.len(),
            "Generated fingerprint"
        );

        Ok(fingerprint)
    }

    /// Decode and fingerprint a file on the blocking thread pool.
    #[instrument(skip_all, fields(file = %path.as_ref().display()))]
    pub async fn generate_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Fingerprint> {
        let generator = self.clone();
        let path = path.as_ref().to_path_buf();

        tokio::task::spawn_blocking(move || generator.generate_blocking(&path))
            .await
            .map_err(|e| FingerprintError::Task(e.to_string()))?
    }
}
