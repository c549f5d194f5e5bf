// SPDX-License-Identifier: GPL-3.0-or-later

//! Library indexing with a bounded pool of fingerprinting tasks.
//!
//! Each file is fingerprinted on the blocking pool and written to the store
//! together with all of its postings. A directory run never lets one file's
//! failure stop the others, and it only returns once every task has finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use tunetrace_config::IndexingConfig;
use tunetrace_domain::SongId;
use tunetrace_fingerprint::FingerprintGenerator;
use tunetrace_infrastructure::SongStore;

use crate::{LibraryError, LibraryResult};

/// A song written to the store by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSong {
    pub id: SongId,
    pub name: String,
    /// Time slots written, one posting each.
    pub slots: usize,
}

/// Result of indexing one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: LibraryResult<IndexedSong>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-file outcomes of a directory run, in path order.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub outcomes: Vec<FileOutcome>,
}

impl IndexReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Clone)]
pub struct IndexingPipeline {
    store: Arc<dyn SongStore>,
    generator: FingerprintGenerator,
    max_concurrent: usize,
    extensions: Vec<String>,
}

impl IndexingPipeline {
    pub fn new(
        store: Arc<dyn SongStore>,
        generator: FingerprintGenerator,
        config: &IndexingConfig,
    ) -> Self {
        Self {
            store,
            generator,
            max_concurrent: config.max_concurrent_tasks.max(1),
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Display name for a song file: its stem.
    ///
    /// Paths without an extension are rejected so that stray files are not
    /// indexed under surprising names.
    pub fn song_name_for(path: &Path) -> LibraryResult<String> {
        if path.extension().is_none() {
            return Err(LibraryError::InvalidPath(format!(
                "no file extension: {}",
                path.display()
            )));
        }

        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LibraryError::InvalidPath(path.display().to_string()))
    }

    pub fn is_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Audio files directly inside `dir`, sorted by path.
    pub fn collect_audio_files(&self, dir: &Path) -> LibraryResult<Vec<PathBuf>> {
        let directory_error = |source| LibraryError::Directory {
            path: dir.display().to_string(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(directory_error)? {
            let path = entry.map_err(directory_error)?.path();
            if path.is_file() && self.is_audio_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Fingerprint one file and store it as a song named after the file stem.
    ///
    /// `cancel` is checked before decoding and again before the write. A write
    /// in progress when it fires is abandoned and its transaction rolled back.
    #[instrument(skip_all, fields(file = %path.display()))]
    pub async fn index_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> LibraryResult<IndexedSong> {
        let name = Self::song_name_for(path)?;

        if cancel.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }
        let fingerprint = self.generator.generate_from_file(path).await?;

        // Decoding cannot be interrupted; skip the write instead.
        if cancel.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }
        let id = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LibraryError::Cancelled),
            id = self.store.index_song(&name, &fingerprint) => id?,
        };

        debug!(target: "indexer", song_id = %id, %name, slots = fingerprint.len(), "indexed song");
        Ok(IndexedSong {
            id,
            name,
            slots: fingerprint.len(),
        })
    }

    /// Index every audio file in `dir`, at most `max_concurrent_tasks` at a time.
    ///
    /// Only an unreadable directory fails the whole call. Files not yet started
    /// when `cancel` fires are reported as cancelled, and so are running ones,
    /// which stop at their next checkpoint without writing.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub async fn index_directory(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> LibraryResult<IndexReport> {
        let files = self.collect_audio_files(dir)?;
        info!(
            target: "indexer",
            files = files.len(),
            max_concurrent = self.max_concurrent,
            "indexing directory"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        // `None` marks a file that was never dispatched.
        let mut running: Vec<(PathBuf, Option<JoinHandle<LibraryResult<IndexedSong>>>)> =
            Vec::with_capacity(files.len());

        for path in files {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                running.push((path, None));
                continue;
            };

            let pipeline = self.clone();
            let cancel = cancel.clone();
            let task_path = path.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                pipeline.index_file(&task_path, &cancel).await
            });
            running.push((path, Some(handle)));
        }

        let mut report = IndexReport::default();
        for (path, handle) in running {
            let result = match handle {
                Some(handle) => handle
                    .await
                    .unwrap_or_else(|e| Err(LibraryError::Task(e.to_string()))),
                None => Err(LibraryError::Cancelled),
            };
            log_outcome(&path, &result);
            report.outcomes.push(FileOutcome { path, result });
        }

        info!(
            target: "indexer",
            succeeded = report.succeeded(),
            failed = report.failed(),
            "directory indexing completed"
        );
        Ok(report)
    }
}

fn log_outcome(path: &Path, result: &LibraryResult<IndexedSong>) {
    match result {
        Ok(song) => info!(
            target: "indexer",
            file = %path.display(),
            song_id = %song.id,
            slots = song.slots,
            "file indexed"
        ),
        Err(LibraryError::Cancelled) => {
            debug!(target: "indexer", file = %path.display(), "file skipped after cancellation")
        }
        Err(error) => warn!(target: "indexer", file = %path.display(), %error, "file failed"),
    }
}
