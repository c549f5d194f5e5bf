// SPDX-License-Identifier: GPL-3.0-or-later

//! Query-side matching of a fingerprint against the stored library.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use tunetrace_config::RecognitionConfig;
use tunetrace_domain::SongId;
use tunetrace_fingerprint::{Fingerprint, FingerprintGenerator, LandmarkHash};
use tunetrace_infrastructure::SongStore;

use crate::votes::{MatchCandidate, VoteTally};
use crate::{LibraryError, LibraryResult};

/// Winning song of a recognition call.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub song_id: SongId,
    pub name: String,
    pub votes: u32,
    /// Share of query slots that voted for the winning offset, in percent.
    pub confidence: f64,
}

/// Outcome of a recognition call. "No match" is a result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Match {
        best: BestMatch,
        /// Ranked candidates, winner first.
        candidates: Vec<MatchCandidate>,
        query_slots: usize,
    },
    NoMatch {
        query_slots: usize,
    },
}

impl Recognition {
    pub fn best(&self) -> Option<&BestMatch> {
        match self {
            Self::Match { best, .. } => Some(best),
            Self::NoMatch { .. } => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    pub fn query_slots(&self) -> usize {
        match self {
            Self::Match { query_slots, .. } | Self::NoMatch { query_slots } => *query_slots,
        }
    }
}

impl fmt::Display for Recognition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match { best, .. } => write!(
                f,
                "Best match: {} ({}% matched)",
                best.name,
                best.confidence as u32
            ),
            Self::NoMatch { .. } => write!(f, "No match"),
        }
    }
}

#[derive(Clone)]
pub struct Recognizer {
    store: Arc<dyn SongStore>,
    generator: FingerprintGenerator,
    lookup_concurrency: usize,
    max_candidates: usize,
}

impl Recognizer {
    pub fn new(
        store: Arc<dyn SongStore>,
        generator: FingerprintGenerator,
        config: &RecognitionConfig,
    ) -> Self {
        Self {
            store,
            generator,
            lookup_concurrency: config.lookup_concurrency.max(1),
            max_candidates: config.max_candidates.max(1),
        }
    }

    /// Fingerprint `path` and match it against the library.
    #[instrument(skip_all, fields(file = %path.display()))]
    pub async fn recognize_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> LibraryResult<Recognition> {
        if cancel.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }

        let fingerprint = self.generator.generate_from_file(path).await?;
        let recognition = self.recognize_fingerprint(&fingerprint, cancel).await?;

        info!(target: "recognizer", result = %recognition, "recognition finished");
        Ok(recognition)
    }

    /// Vote every query slot against the stored postings and pick a winner.
    pub async fn recognize_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        cancel: &CancellationToken,
    ) -> LibraryResult<Recognition> {
        let query_slots = fingerprint.len();
        if query_slots == 0 {
            debug!(target: "recognizer", "empty query fingerprint");
            return Ok(Recognition::NoMatch { query_slots });
        }

        // Repeated hashes are looked up once and vote once per slot they occupy.
        let mut slots_by_hash: BTreeMap<LandmarkHash, Vec<u32>> = BTreeMap::new();
        for (slot, hash) in fingerprint.slots() {
            slots_by_hash.entry(hash).or_default().push(slot);
        }

        let tally = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LibraryError::Cancelled),
            tally = self.tally_votes(slots_by_hash) => tally?,
        };

        // A candidate deleted since its postings were read gives way to the next.
        let mut candidates = tally.ranked();
        let mut winner = None;
        for (rank, candidate) in candidates.iter().enumerate() {
            match self.store.song_name(candidate.song_id).await {
                Ok(name) => {
                    winner = Some((rank, name));
                    break;
                }
                Err(e) if e.is_not_found() => debug!(
                    target: "recognizer",
                    song_id = %candidate.song_id,
                    "candidate deleted during recognition"
                ),
                Err(e) => return Err(e.into()),
            }
        }
        let Some((rank, name)) = winner else {
            debug!(target: "recognizer", query_slots, "no live song matched any query hash");
            return Ok(Recognition::NoMatch { query_slots });
        };
        let mut candidates = candidates.split_off(rank);
        candidates.truncate(self.max_candidates);
        let winner = candidates[0];

        let confidence = f64::from(winner.votes) / query_slots as f64 * 100.0;

        debug!(
            target: "recognizer",
            song_id = %winner.song_id,
            votes = winner.votes,
            query_slots,
            candidate_count = tally.candidate_count(),
            "selected best match"
        );

        Ok(Recognition::Match {
            best: BestMatch {
                song_id: winner.song_id,
                name,
                votes: winner.votes,
                confidence,
            },
            candidates,
            query_slots,
        })
    }

    async fn tally_votes(
        &self,
        slots_by_hash: BTreeMap<LandmarkHash, Vec<u32>>,
    ) -> LibraryResult<VoteTally> {
        let store = &self.store;
        let mut lookups = stream::iter(slots_by_hash)
            .map(|(hash, slots)| async move {
                store
                    .postings_by_hash(hash)
                    .await
                    .map(|postings| (slots, postings))
            })
            .buffered(self.lookup_concurrency);

        let mut tally = VoteTally::new();
        while let Some(lookup) = lookups.next().await {
            let (slots, postings) = lookup?;
            for &slot in &slots {
                for posting in &postings {
                    tally.record(posting.song_id, posting.delta_from(slot));
                }
            }
        }
        Ok(tally)
    }
}
