//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting, enriching, or persisting records.
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket transport failure (connect, handshake, or mid-stream).
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("upstream {service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Upstream has no such profile, record, or media item.
    #[error("not found: {0}")]
    NotFound(String),

    /// JSON payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Storage failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Item reference cannot be resolved by the metadata provider.
    #[error("invalid item {item_ref}-{value}")]
    InvalidItem { item_ref: String, value: String },

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
