// SPDX-License-Identifier: GPL-3.0-or-later

//! Landmark fingerprinting for audio identification.
//!
//! This crate provides functionality for:
//! - Decoding MP3, FLAC and WAV files into normalized PCM samples
//! - Splitting samples into tumbling windows and transforming them to the
//!   frequency domain
//! - Reducing each window to a quantized landmark hash
//!
//! The window size, band boundaries and fuzz factor in [`landmark`] are shared
//! by indexing and recognition. Changing any of them invalidates every stored
//! posting.

pub mod decoder;
pub mod error;
pub mod fingerprint;
pub mod generator;
pub mod landmark;
pub mod spectral;

pub use decoder::{ChannelMode, DecodedAudio};
pub use error::{FingerprintError, Result};
pub use fingerprint::{Fingerprint, LandmarkHash};
pub use generator::FingerprintGenerator;
pub use spectral::SpectralTransform;
