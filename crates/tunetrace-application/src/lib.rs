// SPDX-License-Identifier: GPL-3.0-or-later

//! Indexing and recognition services on top of the fingerprint and store crates.

pub mod error;
pub mod indexer;
pub mod library;
pub mod recognizer;
pub mod votes;

#[cfg(test)]
mod test_support;

pub use error::{LibraryError, LibraryResult};
pub use indexer::{FileOutcome, IndexReport, IndexedSong, IndexingPipeline};
pub use library::{LibrarySong, MusicLibrary};
pub use recognizer::{BestMatch, Recognition, Recognizer};
pub use votes::{MatchCandidate, VoteTally};

pub use tokio_util::sync::CancellationToken;
