// SPDX-License-Identifier: GPL-3.0-or-later
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects & IDs
// ============================================================================

/// Store-assigned song identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SongId(pub i64);

impl SongId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// An indexed track. Names are unique across the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub name: String,
}

impl Song {
    pub fn new(id: SongId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One occurrence of a landmark hash inside a stored song.
///
/// The hash itself is the lookup key, so postings returned from a hash query
/// only carry where the hash occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub time_slot: u32,
    pub song_id: SongId,
}

impl Posting {
    pub fn new(time_slot: u32, song_id: SongId) -> Self {
        Self { time_slot, song_id }
    }

    /// Signed offset between this posting and a query slot carrying the same hash.
    ///
    /// Two recordings of the same passage differ by a constant offset, so true
    /// matches pile up on a single delta.
    pub fn delta_from(&self, query_slot: u32) -> i64 {
        i64::from(self.time_slot) - i64::from(query_slot)
    }
}
