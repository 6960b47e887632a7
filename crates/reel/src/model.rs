//! Canonical entities persisted by the pipeline.
//!
//! A [RatingRecord] is identified by its `at://` URI and carries the author snapshot, the
//! rated item, optional note/rating bodies, and enrichment metadata. A [LikeRecord] points
//! at a RatingRecord by `subject_uri`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

/// Supported media provider namespaces (`item.ref`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// `tmdb:m`
    Movie,
    /// `tmdb:s`
    Series,
}

impl ItemKind {
    /// Parse an `item.ref` value. Anything outside the supported namespace is None.
    pub fn from_ref(item_ref: &str) -> Option<Self> {
        match item_ref {
            "tmdb:m" => Some(ItemKind::Movie),
            "tmdb:s" => Some(ItemKind::Series),
            _ => None,
        }
    }

    pub fn as_ref_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "tmdb:m",
            ItemKind::Series => "tmdb:s",
        }
    }

    /// Path segment used by the metadata provider.
    pub fn provider_kind(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Series => "tv",
        }
    }
}

/// Rated item: provider namespace plus provider-local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub kind: ItemKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub value: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    pub value: i64,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Crosspost {
    pub uri: String,
    pub likes: Option<i64>,
    pub reposts: Option<i64>,
    pub replies: Option<i64>,
}

/// Descriptive metadata resolved from the media provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub tagline: String,
    pub overview: String,
    pub genres: Vec<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingRecord {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub indexed_at: String,
    pub created_at: String,
    pub updated_at: String,
    /// Collection the record came from (`$type`).
    pub record_type: String,
    pub item: Item,
    pub note: Option<Note>,
    pub rating: Option<Rating>,
    pub metadata: Metadata,
    pub crosspost: Option<Crosspost>,
    pub likes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeRecord {
    pub uri: String,
    pub author_did: String,
    pub subject_cid: String,
    pub subject_uri: String,
    pub created_at: String,
}

/// `at://{did}/{collection}/{rkey}`
pub fn record_uri(did: &str, collection: &str, rkey: &str) -> String {
    format!("at://{}/{}/{}", did, collection, rkey)
}

/// Author DID of an `at://` URI, if it has one.
pub fn uri_authority(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("at://")?;
    let did = rest.split('/').next()?;
    if did.is_empty() {
        None
    } else {
        Some(did)
    }
}

/// ISO-8601 UTC with millisecond precision (`2024-09-09T20:26:02.329Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// ISO-8601 form of a microsecond epoch timestamp; falls back to now when out of range.
pub fn iso_from_micros(time_us: i64) -> String {
    iso_timestamp(DateTime::<Utc>::from_timestamp_micros(time_us).unwrap_or_else(Utc::now))
}

pub fn now_iso() -> String {
    iso_timestamp(Utc::now())
}
