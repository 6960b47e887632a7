//! Persistence contract consumed by the pipeline.
//!
//! Every write is idempotent: uniqueness conflicts are absorbed by the implementation and
//! reported as "nothing changed", never as errors. Implemented by [crate::SqliteStore].

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{LikeRecord, RatingRecord};

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert-or-ignore when `is_update` is false; full overwrite by `uri` otherwise.
    /// Returns true when a row was written.
    async fn upsert_rating(&self, record: &RatingRecord, is_update: bool) -> Result<bool>;

    /// Remove a rating and the likes pointing at it. Returns true when a rating was removed.
    async fn delete_rating(&self, uri: &str) -> Result<bool>;

    /// Remove every rating by `did`. Returns the number of rows removed.
    async fn delete_ratings_by_author(&self, did: &str) -> Result<u64>;

    /// True when at least one rating by `did` is stored.
    async fn rating_exists_for_author(&self, did: &str) -> Result<bool>;

    /// Insert a like when its `(author_did, subject_uri)` pair is new and its subject
    /// exists; bumps the subject's like counter. Returns true when inserted.
    async fn upsert_like(&self, like: &LikeRecord) -> Result<bool>;

    async fn get_watermark(&self) -> Result<Option<i64>>;

    async fn set_watermark(&self, time_us: i64) -> Result<()>;
}
