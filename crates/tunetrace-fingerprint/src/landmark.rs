// SPDX-License-Identifier: GPL-3.0-or-later

//! Reduction of one spectral frame to a landmark hash.

use rustfft::num_complex::Complex;

use crate::LandmarkHash;

/// Samples per tumbling window (and bins per spectral frame).
pub const WINDOW_SIZE: usize = 8192;

/// Frequency-bin boundaries; band `k` spans `[BAND_BOUNDARIES[k], BAND_BOUNDARIES[k + 1])`.
pub const BAND_BOUNDARIES: [usize; 5] = [40, 80, 120, 180, 300];

pub const BAND_COUNT: usize = BAND_BOUNDARIES.len() - 1;

/// Peak bins are floored to a multiple of this to tolerate small shifts.
pub const FUZZ_FACTOR: u32 = 2;

/// Hash the dominant bin of each band in `frame`.
///
/// A band with no energy keeps bin 0, which is still a valid hash.
pub fn extract_landmark(frame: &[Complex<f64>]) -> LandmarkHash {
    debug_assert!(frame.len() >= BAND_BOUNDARIES[BAND_COUNT]);

    let mut best_magnitude = [0.0f64; BAND_COUNT];
    let mut best_bin = [0u32; BAND_COUNT];
    let mut band = 0;

    for (bin, value) in frame
        .iter()
        .enumerate()
        .take(BAND_BOUNDARIES[BAND_COUNT])
        .skip(BAND_BOUNDARIES[0])
    {
        while bin >= BAND_BOUNDARIES[band + 1] {
            band += 1;
        }

        let magnitude = value.norm();
        if magnitude > best_magnitude[band] {
            best_magnitude[band] = magnitude;
            best_bin[band] = bin as u32;
        }
    }

    LandmarkHash::pack(best_bin.map(quantize))
}

fn quantize(bin: u32) -> u32 {
    bin - bin % FUZZ_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_peaks(peaks: &[(usize, f64)]) -> Vec<Complex<f64>> {
        let mut frame = vec![Complex::new(0.0, 0.0); WINDOW_SIZE];
        for &(bin, magnitude) in peaks {
            frame[bin] = Complex::new(0.0, magnitude);
        }
        frame
    }

    #[test]
    fn test_silent_frame_hashes_to_zero() {
        let frame = frame_with_peaks(&[]);
        assert_eq!(extract_landmark(&frame).value(), 0);
    }

    #[test]
    fn test_one_peak_per_band() {
        let frame = frame_with_peaks(&[(50, 1.0), (90, 2.0), (150, 3.0), (250, 4.0)]);
        assert_eq!(extract_landmark(&frame).components(), [50, 90, 150, 250]);
    }

    #[test]
    fn test_odd_bins_are_floored_to_fuzz_factor() {
        let frame = frame_with_peaks(&[(41, 1.0), (81, 1.0), (121, 1.0), (299, 1.0)]);
        assert_eq!(extract_landmark(&frame).components(), [40, 80, 120, 298]);
    }

    #[test]
    fn test_band_boundaries_are_half_open() {
        // 80 opens band 1, 79 closes band 0.
        let frame = frame_with_peaks(&[(79, 5.0), (80, 5.0)]);
        let [b0, b1, b2, b3] = extract_landmark(&frame).components();
        assert_eq!((b0, b1), (78, 80));
        assert_eq!((b2, b3), (0, 0));
    }

    #[test]
    fn test_bins_outside_bands_are_ignored() {
        let frame = frame_with_peaks(&[(39, 100.0), (300, 100.0), (4000, 100.0)]);
        assert_eq!(extract_landmark(&frame).value(), 0);
    }

    #[test]
    fn test_strongest_bin_wins_and_first_wins_ties() {
        let frame = frame_with_peaks(&[(60, 1.0), (70, 3.0), (72, 3.0)]);
        assert_eq!(extract_landmark(&frame).components()[0], 70);
    }

    #[test]
    fn test_magnitude_not_real_part_decides() {
        let mut frame = frame_with_peaks(&[(100, 1.0)]);
        frame[110] = Complex::new(-2.0, -2.0);
        assert_eq!(extract_landmark(&frame).components()[1], 110);
    }

    #[test]
    fn test_every_component_is_even() {
        let peaks: Vec<(usize, f64)> = (40..300).map(|b| (b, ((b * 37) % 101) as f64)).collect();
        let frame = frame_with_peaks(&peaks);
        for component in extract_landmark(&frame).components() {
            assert_eq!(component % FUZZ_FACTOR, 0);
        }
    }
}
