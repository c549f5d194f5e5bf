// SPDX-License-Identifier: GPL-3.0-or-later

//! Synthetic songs and an in-memory store for tests.

use std::f32::consts::PI;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tunetrace_config::{AppConfig, DatabaseConfig};
use tunetrace_domain::{Posting, Song, SongId};
use tunetrace_fingerprint::landmark::{BAND_BOUNDARIES, BAND_COUNT, WINDOW_SIZE};
use tunetrace_fingerprint::{Fingerprint, LandmarkHash};
use tunetrace_infrastructure::{init_database, SongStore, SqliteSongStore, StoreError, StoreResult};

pub fn memory_database() -> DatabaseConfig {
    DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        pool_max_size: 1,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database: memory_database(),
        ..AppConfig::default()
    }
}

pub async fn memory_store() -> Arc<SqliteSongStore> {
    let pool = init_database(&memory_database())
        .await
        .expect("init in-memory database");
    Arc::new(SqliteSongStore::new(pool))
}

/// Even bin inside band `band`, varying with `seed` and `window`.
fn band_bin(seed: usize, window: usize, band: usize) -> usize {
    let low = BAND_BOUNDARIES[band];
    let half_width = (BAND_BOUNDARIES[band + 1] - low) / 2;
    low + 2 * ((window * (3 + 2 * band) + seed * 11 + band * 5) % half_width)
}

/// `windows` full windows of bin-centred tones, one tone per band per window.
pub fn song_samples(seed: usize, windows: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(windows * WINDOW_SIZE);
    for window in 0..windows {
        let bins: Vec<usize> = (0..BAND_COUNT).map(|band| band_bin(seed, window, band)).collect();
        samples.extend((0..WINDOW_SIZE).map(|n| {
            bins.iter()
                .map(|&b| 0.2 * (2.0 * PI * b as f32 * n as f32 / WINDOW_SIZE as f32).sin())
                .sum::<f32>()
        }));
    }
    samples
}

pub fn write_wav(path: &Path, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &s in samples {
        writer
            .write_sample((s * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Behaviour injected by [`HookedStore`].
#[derive(Debug, Default)]
pub struct StoreHooks {
    /// Sleep inside `index_song` before writing.
    pub index_delay: Option<Duration>,
    /// Every `postings_by_hash` fails with a read error.
    pub fail_lookups: bool,
    /// Delete this song just before the first `song_name` call is answered.
    pub delete_before_name: Option<String>,
}

/// In-memory store with hooks for concurrency, failure and race tests.
pub struct HookedStore {
    inner: Arc<SqliteSongStore>,
    hooks: StoreHooks,
    deleted: AtomicBool,
    /// Signalled each time an `index_song` call starts.
    pub index_started: Notify,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl HookedStore {
    pub async fn new(hooks: StoreHooks) -> Arc<Self> {
        Arc::new(Self {
            inner: memory_store().await,
            hooks,
            deleted: AtomicBool::new(false),
            index_started: Notify::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SongStore for HookedStore {
    async fn create_song(&self, name: &str) -> StoreResult<SongId> {
        self.inner.create_song(name).await
    }

    async fn append_posting(
        &self,
        song_id: SongId,
        time_slot: u32,
        hash: LandmarkHash,
    ) -> StoreResult<()> {
        self.inner.append_posting(song_id, time_slot, hash).await
    }

    async fn index_song(&self, name: &str, fingerprint: &Fingerprint) -> StoreResult<SongId> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.index_started.notify_one();
        if let Some(delay) = self.hooks.index_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.inner.index_song(name, fingerprint).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn postings_by_hash(&self, hash: LandmarkHash) -> StoreResult<Vec<Posting>> {
        if self.hooks.fail_lookups {
            return Err(StoreError::Read(sqlx::Error::PoolClosed));
        }
        self.inner.postings_by_hash(hash).await
    }

    async fn delete_song(&self, name: &str) -> StoreResult<()> {
        self.inner.delete_song(name).await
    }

    async fn song_name(&self, song_id: SongId) -> StoreResult<String> {
        if let Some(victim) = &self.hooks.delete_before_name {
            if !self.deleted.swap(true, Ordering::SeqCst) {
                self.inner.delete_song(victim).await?;
            }
        }
        self.inner.song_name(song_id).await
    }

    async fn list_songs(&self) -> StoreResult<Vec<Song>> {
        self.inner.list_songs().await
    }

    async fn posting_count(&self, song_id: SongId) -> StoreResult<u64> {
        self.inner.posting_count(song_id).await
    }

    async fn song_fingerprint(&self, song_id: SongId) -> StoreResult<Fingerprint> {
        self.inner.song_fingerprint(song_id).await
    }
}
