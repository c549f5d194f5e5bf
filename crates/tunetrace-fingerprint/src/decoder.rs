// SPDX-License-Identifier: GPL-3.0-or-later

//! Audio decoding into a flat buffer of normalized samples.
//!
//! Decoding goes through symphonia. Supported containers/codecs:
//!
//! - MP3 (MPEG-1 Audio Layer III)
//! - FLAC (Free Lossless Audio Codec)
//! - WAV (PCM)

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument, warn};

use crate::{FingerprintError, Result};

/// How multi-channel audio is flattened into one sample buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// All of channel 0, then all of channel 1, and so on.
    ///
    /// Fingerprints produced this way are only comparable with fingerprints
    /// produced the same way, so this stays the default for existing libraries.
    #[default]
    Concatenate,
    /// Average the channels of each frame into a single mono sample.
    Downmix,
}

/// Decoded audio, already flattened according to a [`ChannelMode`].
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
    /// Samples per channel before flattening.
    pub frames: usize,
}

impl DecodedAudio {
    /// Build from per-channel (planar) sample vectors.
    pub fn from_planar(planes: Vec<Vec<f32>>, sample_rate: u32, mode: ChannelMode) -> Self {
        let channels = planes.len();
        let frames = planes.iter().map(Vec::len).max().unwrap_or(0);
        let samples = match mode {
            ChannelMode::Concatenate => planes.concat(),
            ChannelMode::Downmix => downmix(&planes),
        };

        Self {
            samples,
            sample_rate,
            channels,
            frames,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / f64::from(self.sample_rate)
    }
}

fn downmix(planes: &[Vec<f32>]) -> Vec<f32> {
    let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
    let channels = planes.len().max(1) as f32;
    (0..frames)
        .map(|i| planes.iter().map(|plane| plane[i]).sum::<f32>() / channels)
        .collect()
}

/// Decode an audio file into normalized samples in `[-1, 1]`.
///
/// # Errors
///
/// Returns [`FingerprintError::Decode`] if the file cannot be opened or read,
/// and [`FingerprintError::UnsupportedFormat`] if no demuxer or codec accepts it.
#[instrument(skip_all, fields(file = %path.display(), ?mode))]
pub fn decode_file(path: &Path, mode: ChannelMode) -> Result<DecodedAudio> {
    debug!("Opening audio file for decoding");
    let file = File::open(path)
        .map_err(|e| FingerprintError::Decode(format!("Failed to open audio file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(&extension.to_lowercase());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| FingerprintError::UnsupportedFormat(format!("Failed to probe stream: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| FingerprintError::UnsupportedFormat("No audio tracks found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| {
            FingerprintError::UnsupportedFormat(format!("Failed to create decoder: {}", e))
        })?;

    let mut planes: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(FingerprintError::Decode(format!(
                    "Error reading packet: {}",
                    e
                )))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = e, "Skipping corrupt audio frame");
                continue;
            }
            Err(e) => {
                return Err(FingerprintError::Decode(format!(
                    "Failed to decode frame: {}",
                    e
                )))
            }
        };

        let spec = *decoded.spec();
        if spec.rate > 0 {
            sample_rate = spec.rate;
        }

        let channels = spec.channels.count().max(1);
        if planes.len() < channels {
            planes.resize_with(channels, Vec::new);
        }

        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_planar_ref(decoded);

        for (plane, chunk) in planes.iter_mut().zip(buffer.samples().chunks_exact(frames)) {
            plane.extend(chunk.iter().map(|s| s.clamp(-1.0, 1.0)));
        }
    }

    let audio = DecodedAudio::from_planar(planes, sample_rate, mode);

    debug!(
        sample_count = audio.samples.len(),
        sample_rate = audio.sample_rate,
        channels = audio.channels,
        "Decoded audio"
    );

    Ok(audio)
}
