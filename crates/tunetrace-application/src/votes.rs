// SPDX-License-Identifier: GPL-3.0-or-later

//! Time-delta histogram voting.

use std::collections::{BTreeMap, HashMap};

use tunetrace_domain::SongId;

/// A song that received at least one vote, with its best single-delta count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidate {
    pub song_id: SongId,
    pub votes: u32,
}

#[derive(Debug, Default)]
struct VoteTable {
    deltas: HashMap<i64, u32>,
    absolute_best: u32,
}

/// Per-song histograms of time offsets between query and library postings.
///
/// Songs are kept in id order so ranking never depends on hash-map iteration.
#[derive(Debug, Default)]
pub struct VoteTally {
    tables: BTreeMap<SongId, VoteTable>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, song_id: SongId, delta: i64) {
        let table = self.tables.entry(song_id).or_default();
        let count = table.deltas.entry(delta).or_insert(0);
        *count += 1;
        table.absolute_best = table.absolute_best.max(*count);
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn candidate_count(&self) -> usize {
        self.tables.len()
    }

    /// Candidates by descending votes; equal votes go to the lowest song id.
    pub fn ranked(&self) -> Vec<MatchCandidate> {
        let mut candidates: Vec<MatchCandidate> = self
            .tables
            .iter()
            .map(|(&song_id, table)| MatchCandidate {
                song_id,
                votes: table.absolute_best,
            })
            .collect();

        candidates.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.song_id.cmp(&b.song_id)));
        candidates
    }

    pub fn best(&self) -> Option<MatchCandidate> {
        self.ranked().into_iter().next()
    }
}
