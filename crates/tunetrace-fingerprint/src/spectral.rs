// SPDX-License-Identifier: GPL-3.0-or-later

//! Tumbling-window DFT over a sample buffer.

use std::fmt;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::landmark::WINDOW_SIZE;

/// Forward transform over consecutive, non-overlapping windows.
///
/// No window function is applied and a trailing partial window is dropped,
/// so a buffer of `n` samples yields exactly `n / WINDOW_SIZE` frames.
#[derive(Clone)]
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f64>>,
}

impl SpectralTransform {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            fft: planner.plan_fft_forward(WINDOW_SIZE),
        }
    }

    pub fn frame_count(&self, sample_count: usize) -> usize {
        sample_count / WINDOW_SIZE
    }

    /// Frames in time order, one per full window.
    pub fn frames<'a>(
        &'a self,
        samples: &'a [f32],
    ) -> impl Iterator<Item = Vec<Complex<f64>>> + 'a {
        samples.chunks_exact(WINDOW_SIZE).map(move |window| {
            let mut buffer: Vec<Complex<f64>> = window
                .iter()
                .map(|&s| Complex::new(f64::from(s), 0.0))
                .collect();
            self.fft.process(&mut buffer);
            buffer
        })
    }
}

impl Default for SpectralTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("window_size", &WINDOW_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_frame_count_drops_partial_window() {
        let transform = SpectralTransform::new();
        assert_eq!(transform.frame_count(0), 0);
        assert_eq!(transform.frame_count(WINDOW_SIZE - 1), 0);
        assert_eq!(transform.frame_count(3 * WINDOW_SIZE + 100), 3);
    }

    #[test]
    fn test_frames_match_frame_count() {
        let transform = SpectralTransform::new();
        let samples = vec![0.1f32; 2 * WINDOW_SIZE + 17];
        let frames: Vec<_> = transform.frames(&samples).collect();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == WINDOW_SIZE));
    }

    #[test]
    fn test_bin_centred_tone_peaks_at_its_bin() {
        let transform = SpectralTransform::new();
        let bin = 123usize;
        let samples: Vec<f32> = (0..WINDOW_SIZE)
            .map(|n| (2.0 * PI * bin as f32 * n as f32 / WINDOW_SIZE as f32).sin())
            .collect();

        let frame = transform.frames(&samples).next().unwrap();
        let peak = frame[..WINDOW_SIZE / 2]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }

    #[test]
    fn test_windows_do_not_overlap() {
        let transform = SpectralTransform::new();
        let mut samples = vec![0.0f32; 2 * WINDOW_SIZE];
        samples[WINDOW_SIZE..].iter_mut().for_each(|s| *s = 1.0);

        let frames: Vec<_> = transform.frames(&samples).collect();
        // DC bin is the sum of the window.
        assert!(frames[0][0].norm() < 1e-9);
        assert!((frames[1][0].re - WINDOW_SIZE as f64).abs() < 1e-6);
    }
}
