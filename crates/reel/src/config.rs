//! Ingestion configuration.

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

pub const DEFAULT_JETSTREAM_URL: &str = "wss://jetstream2.us-east.bsky.network/subscribe";
pub const DEFAULT_PDS_URL: &str = "https://bsky.social";
pub const DEFAULT_APPVIEW_URL: &str = "https://api.bsky.app";
pub const DEFAULT_TMDB_URL: &str = "https://api.themoviedb.org";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://reel.db";

/// The two record collections the pipeline tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub rating: String,
    pub like: String,
}

impl Collections {
    pub fn is_tracked(&self, collection: &str) -> bool {
        collection == self.rating || collection == self.like
    }

    pub fn as_vec(&self) -> Vec<&str> {
        vec![self.rating.as_str(), self.like.as_str()]
    }
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            rating: "my.skylights.rel".to_string(),
            like: "my.skylights.like".to_string(),
        }
    }
}

/// Reconnection delay. Fixed by default; jitter is opt-in.
#[derive(Debug, Clone)]
pub struct ReconnectionConfig {
    pub delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl ReconnectionConfig {
    /// Delay before the next connection attempt.
    pub fn next_delay(&self) -> Duration {
        let jitter = if self.max_jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.max_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.delay_ms.saturating_add(jitter))
    }
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            delay_ms: 5_000,
            max_jitter_ms: 0,
        }
    }
}

/// Author history backfill bounds.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Records requested per listing page.
    pub page_size: u32,
    /// Hard cap on records listed per author.
    pub max_records: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_records: 10_000,
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Firehose subscribe endpoint (`ws://` or `wss://`).
    pub jetstream_url: String,
    /// Host serving `com.atproto.repo.listRecords`.
    pub pds_url: String,
    /// Host serving `app.bsky.actor.getProfile`.
    pub appview_url: String,
    /// Media metadata provider base URL.
    pub tmdb_url: String,
    pub tmdb_api_key: String,
    pub database_url: String,
    pub collections: Collections,
    pub reconnection: ReconnectionConfig,
    pub backfill: BackfillConfig,
}

impl IngestConfig {
    /// Load from environment (and `.env` if present). Only `TMDB_API_KEY` is required.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let tmdb_api_key = std::env::var("TMDB_API_KEY")
            .map_err(|_| Error::Config("TMDB_API_KEY is not set".into()))?;
        let defaults = Collections::default();
        let reconnection = ReconnectionConfig {
            delay_ms: env_parse("RECONNECT_DELAY_MS", ReconnectionConfig::default().delay_ms)?,
            max_jitter_ms: env_parse("RECONNECT_JITTER_MS", 0)?,
        };
        let backfill = BackfillConfig {
            page_size: env_parse("BACKFILL_PAGE_SIZE", BackfillConfig::default().page_size)?,
            max_records: env_parse("BACKFILL_MAX_RECORDS", BackfillConfig::default().max_records)?,
        };
        if backfill.page_size == 0 || backfill.page_size > 100 {
            return Err(Error::Config(format!(
                "BACKFILL_PAGE_SIZE must be within 1..=100, got {}",
                backfill.page_size
            )));
        }

        Ok(Self {
            jetstream_url: env_or("JETSTREAM_URL", DEFAULT_JETSTREAM_URL),
            pds_url: env_or("PDS_URL", DEFAULT_PDS_URL),
            appview_url: env_or("APPVIEW_URL", DEFAULT_APPVIEW_URL),
            tmdb_url: env_or("TMDB_URL", DEFAULT_TMDB_URL),
            tmdb_api_key,
            database_url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            collections: Collections {
                rating: env_or("RATING_COLLECTION", &defaults.rating),
                like: env_or("LIKE_COLLECTION", &defaults.like),
            },
            reconnection,
            backfill,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, v))),
        _ => Ok(default),
    }
}
