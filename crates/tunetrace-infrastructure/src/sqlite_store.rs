// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Result;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;
use tunetrace_config::DatabaseConfig;
use tunetrace_domain::{Posting, Song, SongId};
use tunetrace_fingerprint::{Fingerprint, LandmarkHash};

use crate::store::{SongStore, StoreError, StoreResult};

/// Rows per multi-row posting insert (three bind parameters each).
const POSTING_BATCH_ROWS: usize = 300;

/// SQLx-backed song store
#[derive(Clone)]
pub struct SqliteSongStore {
    pool: SqlitePool,
}

impl SqliteSongStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the pool described by `config` and run migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(crate::init_database(config).await?))
    }
}

#[async_trait::async_trait]
impl SongStore for SqliteSongStore {
    async fn create_song(&self, name: &str) -> StoreResult<SongId> {
        debug!(target: "store", name, "creating song");
        let row = sqlx::query("INSERT INTO songs (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_song_insert_error(e, name))?;
        Ok(SongId(row.get::<i64, _>("id")))
    }

    async fn append_posting(
        &self,
        song_id: SongId,
        time_slot: u32,
        hash: LandmarkHash,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO postings (hash, time, song_id) VALUES (?, ?, ?)")
            .bind(hash.to_string())
            .bind(i64::from(time_slot))
            .bind(song_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| map_posting_insert_error(e, song_id))?;
        Ok(())
    }

    async fn index_song(&self, name: &str, fingerprint: &Fingerprint) -> StoreResult<SongId> {
        debug!(target: "store", name, slots = fingerprint.len(), "indexing song");
        let mut tx = self.pool.begin().await.map_err(StoreError::Write)?;

        let row = sqlx::query("INSERT INTO songs (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_song_insert_error(e, name))?;
        let song_id = SongId(row.get::<i64, _>("id"));

        let slots: Vec<(u32, LandmarkHash)> = fingerprint.slots().collect();
        for batch in slots.chunks(POSTING_BATCH_ROWS) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO postings (hash, time, song_id) ");
            builder.push_values(batch, |mut b, (time_slot, hash)| {
                b.push_bind(hash.to_string())
                    .push_bind(i64::from(*time_slot))
                    .push_bind(song_id.0);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_posting_insert_error(e, song_id))?;
        }

        // Dropping the transaction on any error above rolls it back.
        tx.commit().await.map_err(StoreError::Write)?;
        Ok(song_id)
    }

    async fn postings_by_hash(&self, hash: LandmarkHash) -> StoreResult<Vec<Posting>> {
        let rows = sqlx::query(
            "SELECT time, song_id FROM postings WHERE hash = ? ORDER BY song_id, time",
        )
        .bind(hash.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Read)?;

        rows.iter().map(row_to_posting).collect()
    }

    async fn delete_song(&self, name: &str) -> StoreResult<()> {
        debug!(target: "store", name, "deleting song");
        let result = sqlx::query("DELETE FROM songs WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Write)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("song {:?}", name)));
        }
        Ok(())
    }

    async fn song_name(&self, song_id: SongId) -> StoreResult<String> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM songs WHERE id = ?")
            .bind(song_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Read)?;
        name.ok_or_else(|| StoreError::NotFound(format!("song id {}", song_id)))
    }

    async fn list_songs(&self) -> StoreResult<Vec<Song>> {
        let rows = sqlx::query("SELECT id, name FROM songs ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Read)?;
        Ok(rows
            .iter()
            .map(|r| Song::new(SongId(r.get::<i64, _>("id")), r.get::<String, _>("name")))
            .collect())
    }

    async fn posting_count(&self, song_id: SongId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM postings WHERE song_id = ?")
            .bind(song_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Read)?;
        Ok(count.max(0) as u64)
    }

    async fn song_fingerprint(&self, song_id: SongId) -> StoreResult<Fingerprint> {
        let hashes: Vec<String> =
            sqlx::query_scalar("SELECT hash FROM postings WHERE song_id = ? ORDER BY time")
                .bind(song_id.0)
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::Read)?;

        hashes
            .iter()
            .map(|h| {
                h.parse::<LandmarkHash>()
                    .map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn map_song_insert_error(err: sqlx::Error, name: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(name.to_string())
        }
        _ => StoreError::Write(err),
    }
}

fn map_posting_insert_error(err: sqlx::Error, song_id: SongId) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::NotFound(format!("song id {}", song_id))
        }
        _ => StoreError::Write(err),
    }
}

fn row_to_posting(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Posting> {
    let time: i64 = row.get("time");
    let time_slot = u32::try_from(time)
        .map_err(|_| StoreError::Corrupt(format!("time slot out of range: {}", time)))?;
    Ok(Posting::new(time_slot, SongId(row.get::<i64, _>("song_id"))))
}

// ============================================================================
// Tests
// ============================================================================
