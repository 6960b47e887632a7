//! Firehose ingestion for media ratings and likes.
//!
//! - **StreamConsumer**: subscribes to the tracked collections on a Jetstream-style
//!   WebSocket endpoint and yields decoded envelopes.
//! - **ReconnectSupervisor**: reconnects with a fixed delay and keeps a coalesced resume
//!   watermark, so a restart replays at most one window of events.
//! - **Ingestor**: normalizes commits, backfills unseen authors, enriches ratings with media
//!   metadata, and writes everything idempotently.
//! - **BackfillReconciler**: lists an author's history once, with concurrent triggers for the
//!   same author sharing one execution.

pub mod backfill;
pub mod config;
pub mod consumer;
pub mod cursor;
pub mod enrich;
pub mod envelope;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod repo;
pub mod sqlite;
pub mod store;
pub mod supervisor;

pub use backfill::{BackfillReconciler, BackfillSummary};
pub use config::{BackfillConfig, Collections, IngestConfig, ReconnectionConfig};
pub use consumer::{EnvelopeStream, StreamConsumer};
pub use cursor::IngestionState;
pub use enrich::{EnrichmentClient, TmdbClient};
pub use envelope::{decode_envelope, Envelope};
pub use error::{Error, Result};
pub use model::{Item, ItemKind, LikeRecord, Metadata, RatingRecord};
pub use normalize::{normalize, Normalized};
pub use pipeline::{Applied, Ingestor};
pub use repo::{Profile, RepositoryClient, XrpcClient};
pub use sqlite::SqliteStore;
pub use store::Store;
pub use supervisor::{ConnectionState, ReconnectSupervisor};
