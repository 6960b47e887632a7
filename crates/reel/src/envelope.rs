//! Firehose envelope types and decoding.
//!
//! One WebSocket text frame carries one JSON envelope:
//! `{did, time_us, kind, commit?: {rev, operation, collection, rkey, record?, cid?}}`.
//! Unknown kinds and operations decode into explicit fallback variants so that a new
//! upstream event type never terminates the stream.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Event kind on the firehose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Commit,
    Identity,
    Account,
    #[serde(other)]
    Other,
}

/// Commit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

/// Commit body of an envelope. `record` stays opaque until normalization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub rev: Option<String>,
    pub operation: Operation,
    pub collection: String,
    pub rkey: String,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub cid: Option<String>,
}

/// One decoded firehose event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    /// Author DID of the repository the event belongs to.
    pub did: String,
    /// Microsecond epoch timestamp assigned by the firehose; also the resume cursor.
    pub time_us: i64,
    pub kind: EventKind,
    #[serde(default)]
    pub commit: Option<Commit>,
}

/// Decode one text frame.
pub fn decode_envelope(text: &str) -> Result<Envelope> {
    Ok(serde_json::from_str(text)?)
}
