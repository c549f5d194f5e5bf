// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tunetrace_fingerprint::ChannelMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://tunetrace.db".to_string(),
            pool_max_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Upper bound on files being decoded and written at the same time.
    pub max_concurrent_tasks: usize,
    /// File extensions picked up by directory indexing, without the dot.
    pub extensions: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 8,
            extensions: vec!["mp3".to_string(), "flac".to_string(), "wav".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Hash lookups in flight per recognition call.
    pub lookup_concurrency: usize,
    /// Ranked candidates kept in a recognition result.
    pub max_candidates: usize,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            lookup_concurrency: 16,
            max_candidates: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FingerprintConfig {
    pub channel_mode: ChannelMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telemetry: TelemetryConfig,
    pub indexing: IndexingConfig,
    pub recognition: RecognitionConfig,
    pub fingerprint: FingerprintConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.database.pool_max_size > 0, "database.pool_max_size must be > 0");
        ensure!(
            self.indexing.max_concurrent_tasks > 0,
            "indexing.max_concurrent_tasks must be > 0"
        );
        ensure!(
            self.recognition.lookup_concurrency > 0,
            "recognition.lookup_concurrency must be > 0"
        );
        Ok(())
    }
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: TUNETRACE_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("TUNETRACE_").split("__"));

    let config: AppConfig = figment.extract()?;
    config.validate()?;
    info!(target: "config", "configuration loaded");
    Ok(config)
}
