// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tunetrace_config::AppConfig;
use tunetrace_domain::SongId;
use tunetrace_fingerprint::FingerprintGenerator;
use tunetrace_infrastructure::{SongStore, SqliteSongStore};

use crate::{IndexReport, IndexedSong, IndexingPipeline, LibraryResult, Recognition, Recognizer};

/// A stored song with the number of postings it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySong {
    pub id: SongId,
    pub name: String,
    pub postings: u64,
}

/// Entry point tying the indexer, recognizer and store together.
#[derive(Clone)]
pub struct MusicLibrary {
    store: Arc<dyn SongStore>,
    indexer: IndexingPipeline,
    recognizer: Recognizer,
}

impl MusicLibrary {
    pub fn new(store: Arc<dyn SongStore>, config: &AppConfig) -> Self {
        let generator = FingerprintGenerator::with_channel_mode(config.fingerprint.channel_mode);
        Self {
            indexer: IndexingPipeline::new(store.clone(), generator.clone(), &config.indexing),
            recognizer: Recognizer::new(store.clone(), generator, &config.recognition),
            store,
        }
    }

    /// Connect to the configured database, run migrations and build the library.
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let store = SqliteSongStore::connect(&config.database).await?;
        info!(target: "application", "music library ready");
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn store(&self) -> &Arc<dyn SongStore> {
        &self.store
    }

    pub async fn index_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> LibraryResult<IndexedSong> {
        self.indexer.index_file(path, cancel).await
    }

    pub async fn index_directory(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> LibraryResult<IndexReport> {
        self.indexer.index_directory(dir, cancel).await
    }

    pub async fn recognize(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> LibraryResult<Recognition> {
        self.recognizer.recognize_file(path, cancel).await
    }

    pub async fn song_name(&self, song_id: SongId) -> LibraryResult<String> {
        Ok(self.store.song_name(song_id).await?)
    }

    /// Remove a song and all of its postings.
    pub async fn delete_song(&self, name: &str) -> LibraryResult<()> {
        self.store.delete_song(name).await?;
        info!(target: "application", %name, "song deleted");
        Ok(())
    }

    pub async fn list_songs(&self) -> LibraryResult<Vec<LibrarySong>> {
        let songs = self.store.list_songs().await?;
        let mut listed = Vec::with_capacity(songs.len());
        for song in songs {
            let postings = self.store.posting_count(song.id).await?;
            listed.push(LibrarySong {
                id: song.id,
                name: song.name,
                postings,
            });
        }
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{song_samples, test_config, write_wav};
    use crate::LibraryError;
    use tunetrace_fingerprint::landmark::WINDOW_SIZE;

    async fn open_library() -> MusicLibrary {
        MusicLibrary::open(&test_config()).await.unwrap()
    }

    #[tokio::test]
    async fn index_directory_then_recognize_each_clip() {
        let library = open_library().await;
        let songs = tempfile::tempdir().unwrap();
        let clips = tempfile::tempdir().unwrap();

        let names = ["Lady", "Travel", "Intergalactic"];
        for (seed, name) in names.iter().enumerate() {
            let samples = song_samples(seed + 30, 24);
            write_wav(&songs.path().join(format!("{}.wav", name)), &samples);
            write_wav(
                &clips.path().join(format!("{}.wav", name)),
                &samples[5 * WINDOW_SIZE..15 * WINDOW_SIZE],
            );
        }

        let report = library
            .index_directory(songs.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.succeeded(), 3);

        for name in names {
            let result = library
                .recognize(&clips.path().join(format!("{}.wav", name)), &CancellationToken::new())
                .await
                .unwrap();
            let best = result.best().expect("match");
            assert_eq!(best.name, name);
            assert!((best.confidence - 100.0).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn list_reports_posting_counts() {
        let library = open_library().await;
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.wav");
        let second = dir.path().join("second.wav");
        write_wav(&first, &song_samples(1, 3));
        write_wav(&second, &song_samples(2, 5));

        library.index_file(&first, &CancellationToken::new()).await.unwrap();
        library.index_file(&second, &CancellationToken::new()).await.unwrap();

        let listed = library.list_songs().await.unwrap();
        let summary: Vec<(&str, u64)> =
            listed.iter().map(|s| (s.name.as_str(), s.postings)).collect();
        assert_eq!(summary, vec![("first", 3), ("second", 5)]);
    }

    #[tokio::test]
    async fn delete_removes_song_and_missing_is_not_found() {
        let library = open_library().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.wav");
        let samples = song_samples(3, 12);
        write_wav(&path, &samples);

        let song = library.index_file(&path, &CancellationToken::new()).await.unwrap();
        library.delete_song("gone").await.unwrap();

        assert!(library.list_songs().await.unwrap().is_empty());
        assert_eq!(library.store().posting_count(song.id).await.unwrap(), 0);

        let result = library
            .recognize(&path, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.is_match());

        let err = library.delete_song("gone").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, LibraryError::Store(_)));
    }

    #[tokio::test]
    async fn reindex_after_delete_succeeds() {
        let library = open_library().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("again.wav");
        write_wav(&path, &song_samples(4, 4));

        library.index_file(&path, &CancellationToken::new()).await.unwrap();
        library.delete_song("again").await.unwrap();
        let song = library.index_file(&path, &CancellationToken::new()).await.unwrap();
        assert_eq!(song.slots, 4);
    }
}
