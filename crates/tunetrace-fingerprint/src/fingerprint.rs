// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::landmark::BAND_COUNT;
use crate::FingerprintError;

/// Decimal weight of each band's quantized bin inside a packed hash.
///
/// Band 0 gets two decimal digits of room, bands 1 and 2 get three and band 3
/// is unbounded.
const BAND_WEIGHTS: [u64; BAND_COUNT] = [1, 100, 100_000, 100_000_000];

/// Quantized landmark for one time slot.
///
/// Stored and compared as its decimal string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct LandmarkHash(u64);

impl LandmarkHash {
    /// Pack already-quantized per-band bins, lowest band first.
    pub fn pack(bins: [u32; BAND_COUNT]) -> Self {
        let value = bins
            .iter()
            .zip(BAND_WEIGHTS)
            .map(|(&bin, weight)| u64::from(bin) * weight)
            .sum();
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Split the hash back into its per-band bins, lowest band first.
    pub fn components(&self) -> [u32; BAND_COUNT] {
        let v = self.0;
        [
            (v % 100) as u32,
            ((v / 100) % 1_000) as u32,
            ((v / 100_000) % 1_000) as u32,
            (v / 100_000_000) as u32,
        ]
    }
}

impl fmt::Display for LandmarkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LandmarkHash {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FingerprintError::InvalidHash(format!(
                "expected decimal digits, got {s:?}"
            )));
        }

        s.parse::<u64>()
            .map(Self)
            .map_err(|e| FingerprintError::InvalidHash(format!("{s:?}: {e}")))
    }
}

impl From<LandmarkHash> for String {
    fn from(hash: LandmarkHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for LandmarkHash {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ordered landmark hashes of one recording; index is the time slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    hashes: Vec<LandmarkHash>,
}

impl Fingerprint {
    pub fn new(hashes: Vec<LandmarkHash>) -> Self {
        Self { hashes }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn hashes(&self) -> &[LandmarkHash] {
        &self.hashes
    }

    /// `(time_slot, hash)` pairs in time order.
    pub fn slots(&self) -> impl Iterator<Item = (u32, LandmarkHash)> + '_ {
        self.hashes
            .iter()
            .enumerate()
            .map(|(slot, &hash)| (slot as u32, hash))
    }

    /// Contiguous sub-range of time slots, renumbered from zero.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let start = start.min(self.hashes.len());
        let end = start.saturating_add(len).min(self.hashes.len());
        Self::new(self.hashes[start..end].to_vec())
    }
}

impl FromIterator<LandmarkHash> for Fingerprint {
    fn from_iter<I: IntoIterator<Item = LandmarkHash>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
