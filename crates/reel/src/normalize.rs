//! Pure translation of firehose envelopes into typed commits.
//!
//! [normalize] has no state and no I/O. Everything that is not a well-formed commit on a
//! tracked collection comes back as [Normalized::Ignored] with the reason, which callers log
//! at debug level: filtering is expected, not an error.

use serde::Deserialize;
use serde_json::Value;

use crate::config::Collections;
use crate::envelope::{Envelope, EventKind, Operation};
use crate::model::{iso_from_micros, record_uri, Crosspost, Item, ItemKind, Note, Rating};

/// Why an envelope produced no commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotCommit,
    UntrackedCollection(String),
    UnsupportedOperation,
    /// Record payload missing or not shaped like the collection's schema.
    MalformedRecord,
    /// `item.ref` outside the supported namespace.
    UnsupportedItem(String),
    /// Neither `note.value` nor `rating.value` present.
    EmptyRating,
    /// Like deletions are not applied.
    LikeDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingOperation {
    Create,
    Update,
    Delete,
}

/// Body of a rating create/update, shared by live commits and backfilled records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingContent {
    pub item: Item,
    pub note: Option<Note>,
    pub rating: Option<Rating>,
    pub crosspost: Option<Crosspost>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingCommit {
    pub operation: RatingOperation,
    pub author_did: String,
    pub uri: String,
    pub cid: Option<String>,
    /// Present for create/update, absent for delete.
    pub content: Option<RatingContent>,
    pub time_us: i64,
}

/// A like on a rating record. Only creations produce one (like updates and deletes are
/// ignored), so unlike [RatingCommit] it carries no operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeCommit {
    pub author_did: String,
    pub uri: String,
    pub subject_uri: String,
    pub subject_cid: String,
    pub created_at: String,
    pub time_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Rating(RatingCommit),
    Like(LikeCommit),
    Ignored(IgnoreReason),
}

/// Recognized record shapes, keyed by collection.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    Rating(RatingPayload),
    Like(LikePayload),
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RatingPayload {
    pub item: RawItem,
    #[serde(default)]
    pub note: Option<RawNote>,
    #[serde(default)]
    pub rating: Option<RawRating>,
    #[serde(default)]
    pub crosspost: Option<Crosspost>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawItem {
    #[serde(rename = "ref")]
    pub item_ref: String,
    /// Usually a string; some clients write the provider id as a number.
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNote {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRating {
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikePayload {
    pub subject: StrongRef,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

impl RecordPayload {
    /// Parse an opaque record into the shape its collection promises.
    pub fn parse(collections: &Collections, collection: &str, record: &Value) -> Self {
        if collection == collections.rating {
            serde_json::from_value(record.clone())
                .map(RecordPayload::Rating)
                .unwrap_or(RecordPayload::Unrecognized)
        } else if collection == collections.like {
            serde_json::from_value(record.clone())
                .map(RecordPayload::Like)
                .unwrap_or(RecordPayload::Unrecognized)
        } else {
            RecordPayload::Unrecognized
        }
    }
}

impl RatingPayload {
    /// Validate namespace and body; produce canonical content.
    pub fn into_content(self) -> Result<RatingContent, IgnoreReason> {
        let kind = ItemKind::from_ref(&self.item.item_ref)
            .ok_or_else(|| IgnoreReason::UnsupportedItem(self.item.item_ref.clone()))?;
        let value = match &self.item.value {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Err(IgnoreReason::MalformedRecord),
        };
        let note = self.note.and_then(|n| match n.value {
            Some(value) if !value.is_empty() => Some(Note {
                value,
                created_at: n.created_at,
                updated_at: n.updated_at,
            }),
            _ => None,
        });
        let rating = self.rating.and_then(|r| {
            r.value.map(|value| Rating {
                value,
                created_at: r.created_at,
            })
        });
        if note.is_none() && rating.is_none() {
            return Err(IgnoreReason::EmptyRating);
        }
        Ok(RatingContent {
            item: Item { kind, value },
            note,
            rating,
            crosspost: self.crosspost,
        })
    }
}

/// Classify one envelope.
pub fn normalize(collections: &Collections, envelope: &Envelope) -> Normalized {
    if envelope.kind != EventKind::Commit {
        return Normalized::Ignored(IgnoreReason::NotCommit);
    }
    let commit = match &envelope.commit {
        Some(c) => c,
        None => return Normalized::Ignored(IgnoreReason::NotCommit),
    };
    if !collections.is_tracked(&commit.collection) {
        return Normalized::Ignored(IgnoreReason::UntrackedCollection(commit.collection.clone()));
    }
    let operation = match commit.operation {
        Operation::Create => RatingOperation::Create,
        Operation::Update => RatingOperation::Update,
        Operation::Delete => RatingOperation::Delete,
        Operation::Unknown => return Normalized::Ignored(IgnoreReason::UnsupportedOperation),
    };
    let uri = record_uri(&envelope.did, &commit.collection, &commit.rkey);

    if commit.collection == collections.like {
        return match operation {
            RatingOperation::Create => normalize_like(collections, envelope, uri),
            RatingOperation::Update => Normalized::Ignored(IgnoreReason::UnsupportedOperation),
            RatingOperation::Delete => Normalized::Ignored(IgnoreReason::LikeDelete),
        };
    }

    if operation == RatingOperation::Delete {
        return Normalized::Rating(RatingCommit {
            operation,
            author_did: envelope.did.clone(),
            uri,
            cid: commit.cid.clone(),
            content: None,
            time_us: envelope.time_us,
        });
    }

    let (record, cid) = match (&commit.record, &commit.cid) {
        (Some(record), Some(cid)) => (record, cid),
        _ => return Normalized::Ignored(IgnoreReason::MalformedRecord),
    };
    let payload = match RecordPayload::parse(collections, &commit.collection, record) {
        RecordPayload::Rating(p) => p,
        _ => return Normalized::Ignored(IgnoreReason::MalformedRecord),
    };
    match payload.into_content() {
        Ok(content) => Normalized::Rating(RatingCommit {
            operation,
            author_did: envelope.did.clone(),
            uri,
            cid: Some(cid.clone()),
            content: Some(content),
            time_us: envelope.time_us,
        }),
        Err(reason) => Normalized::Ignored(reason),
    }
}

fn normalize_like(collections: &Collections, envelope: &Envelope, uri: String) -> Normalized {
    let commit = match &envelope.commit {
        Some(c) => c,
        None => return Normalized::Ignored(IgnoreReason::NotCommit),
    };
    let record = match &commit.record {
        Some(r) => r,
        None => return Normalized::Ignored(IgnoreReason::MalformedRecord),
    };
    match RecordPayload::parse(collections, &commit.collection, record) {
        RecordPayload::Like(like) => Normalized::Like(LikeCommit {
            author_did: envelope.did.clone(),
            uri,
            subject_uri: like.subject.uri,
            subject_cid: like.subject.cid,
            created_at: like
                .created_at
                .unwrap_or_else(|| iso_from_micros(envelope.time_us)),
            time_us: envelope.time_us,
        }),
        _ => Normalized::Ignored(IgnoreReason::MalformedRecord),
    }
}
