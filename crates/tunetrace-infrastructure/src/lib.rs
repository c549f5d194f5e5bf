// SPDX-License-Identifier: GPL-3.0-or-later
pub mod sqlite_store;
pub mod store;

pub use sqlite_store::SqliteSongStore;
pub use store::{SongStore, StoreError, StoreResult};

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use tunetrace_config::DatabaseConfig;

/// Whether `url` names a private in-memory database.
///
/// Every connection to such a URL opens its own empty database, so the pool
/// must never hold more than one connection or let it expire.
fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Open the connection pool and run migrations.
pub async fn init_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    info!(target: "infrastructure", "initializing database");

    let in_memory = is_in_memory(&config.url);

    if !in_memory {
        if let Some(db_path) = config.url.strip_prefix("sqlite://") {
            let db_path = db_path.split('?').next().unwrap_or(db_path);
            // Create parent directory if needed
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                    info!(target: "infrastructure", path = %parent.display(), "created database directory");
                }
            }
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    info!(target: "infrastructure", db_url = %config.url, in_memory, "connecting to database");

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.pool_max_size)
    };

    let pool = pool_options.connect_with(options).await?;

    info!(target: "infrastructure", "running migrations");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!(target: "infrastructure", "database initialized successfully");
    Ok(pool)
}
