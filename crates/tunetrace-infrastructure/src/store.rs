// SPDX-License-Identifier: GPL-3.0-or-later
use thiserror::Error;
use tunetrace_domain::{Posting, Song, SongId};
use tunetrace_fingerprint::{Fingerprint, LandmarkHash};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A song with this name is already indexed.
    #[error("Song already exists: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store write failed: {0}")]
    Write(#[source] sqlx::Error),

    #[error("Store read failed: {0}")]
    Read(#[source] sqlx::Error),

    #[error("Corrupt posting data: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Persistent song and posting storage.
///
/// Implementations must accept concurrent callers. Postings of a song written
/// through [`SongStore::index_song`] become visible together with the song.
#[async_trait::async_trait]
pub trait SongStore: Send + Sync {
    /// Insert a song record without postings.
    async fn create_song(&self, name: &str) -> StoreResult<SongId>;

    async fn append_posting(
        &self,
        song_id: SongId,
        time_slot: u32,
        hash: LandmarkHash,
    ) -> StoreResult<()>;

    /// Insert a song and one posting per time slot of `fingerprint`, atomically.
    async fn index_song(&self, name: &str, fingerprint: &Fingerprint) -> StoreResult<SongId>;

    /// Every posting carrying `hash`, ordered by song id then time slot.
    async fn postings_by_hash(&self, hash: LandmarkHash) -> StoreResult<Vec<Posting>>;

    /// Remove a song and all of its postings.
    async fn delete_song(&self, name: &str) -> StoreResult<()>;

    async fn song_name(&self, song_id: SongId) -> StoreResult<String>;

    async fn list_songs(&self) -> StoreResult<Vec<Song>>;

    async fn posting_count(&self, song_id: SongId) -> StoreResult<u64>;

    /// Stored hashes of a song in time-slot order.
    async fn song_fingerprint(&self, song_id: SongId) -> StoreResult<Fingerprint>;
}
