//! Author history backfill.
//!
//! Before an author's live events are applied, their full prior history is listed from
//! their repository and persisted. The common case is a single existence check. Concurrent
//! triggers for the same unseen author share one in-flight execution; persistence-level
//! uniqueness still absorbs anything that slips past (e.g. a second process).
//!
//! Failures never propagate: a profile or page error aborts the remaining backfill for that
//! invocation, keeps whatever was already stored, and is logged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::config::BackfillConfig;
use crate::enrich::EnrichmentClient;
use crate::error::Result;
use crate::model::{now_iso, Author, Metadata, RatingRecord};
use crate::normalize::{IgnoreReason, RatingContent, RatingPayload};
use crate::repo::{ListedRecord, RepositoryClient};
use crate::store::Store;

/// Outcome of one backfill execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    /// Records returned by the listing (bounded by the configured cap).
    pub listed: usize,
    /// Newly inserted ratings.
    pub stored: usize,
    /// Ratings that were already present.
    pub existing: usize,
    /// Records outside the supported namespace or without a note/rating.
    pub skipped: usize,
    /// Records dropped on enrichment or storage failure.
    pub failed: usize,
    /// Profile or listing failure cut the run short.
    pub aborted: bool,
}

type InFlight = Shared<BoxFuture<'static, BackfillSummary>>;

struct Inner {
    store: Arc<dyn Store>,
    repo: Arc<dyn RepositoryClient>,
    enrich: Arc<dyn EnrichmentClient>,
    collection: String,
    config: BackfillConfig,
    inflight: Mutex<HashMap<String, InFlight>>,
}

/// Ensures an author's history is present. Cheap to clone.
#[derive(Clone)]
pub struct BackfillReconciler {
    inner: Arc<Inner>,
}

impl BackfillReconciler {
    pub fn new(
        store: Arc<dyn Store>,
        repo: Arc<dyn RepositoryClient>,
        enrich: Arc<dyn EnrichmentClient>,
        collection: impl Into<String>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                repo,
                enrich,
                collection: collection.into(),
                config,
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Backfill `did` unless at least one of their ratings is already stored.
    /// Returns None on the cheap path (or when the existence check itself failed).
    pub async fn ensure_author_backfilled(&self, did: &str) -> Option<BackfillSummary> {
        match self.inner.store.rating_exists_for_author(did).await {
            Ok(true) => None,
            Ok(false) => Some(self.run_coalesced(did).await),
            Err(e) => {
                warn!(did, reason = %e, "backfill existence check failed");
                None
            }
        }
    }

    /// Drop everything stored for `did` and list their history again.
    pub async fn refresh_author(&self, did: &str) -> Result<BackfillSummary> {
        let removed = self.inner.store.delete_ratings_by_author(did).await?;
        info!(did, removed, "cleared author history");
        Ok(self.run_coalesced(did).await)
    }

    async fn run_coalesced(&self, did: &str) -> BackfillSummary {
        let run = {
            let mut inflight = self.inner.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match inflight.get(did) {
                Some(run) => {
                    debug!(did, "joining in-flight backfill");
                    run.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let key = did.to_string();
                    let run = async move {
                        let summary = inner.backfill(&key).await;
                        inner
                            .inflight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&key);
                        summary
                    }
                    .boxed()
                    .shared();
                    inflight.insert(did.to_string(), run.clone());
                    run
                }
            }
        };
        run.await
    }
}

impl Inner {
    async fn backfill(&self, did: &str) -> BackfillSummary {
        let mut summary = BackfillSummary::default();
        match self.list_and_store(did, &mut summary).await {
            Ok(()) => info!(
                did,
                listed = summary.listed,
                stored = summary.stored,
                skipped = summary.skipped,
                failed = summary.failed,
                "author backfilled"
            ),
            Err(e) => {
                summary.aborted = true;
                warn!(
                    did,
                    reason = %e,
                    listed = summary.listed,
                    stored = summary.stored,
                    "backfill aborted"
                );
            }
        }
        summary
    }

    async fn list_and_store(&self, did: &str, summary: &mut BackfillSummary) -> Result<()> {
        let profile = self.repo.get_profile(did).await?;
        let author = Author {
            did: did.to_string(),
            handle: profile.handle,
            display_name: profile.display_name,
            avatar: profile.avatar,
        };

        let max = self.config.max_records;
        let mut cursor: Option<String> = None;
        while summary.listed < max {
            let remaining = max - summary.listed;
            let limit = remaining.min(self.config.page_size as usize) as u32;
            let page = self
                .repo
                .list_records(did, &self.collection, limit, cursor.as_deref())
                .await?;
            let received = page.records.len();
            debug!(did, received, cursor = ?page.cursor, "listed page");
            for listed in page.records.into_iter().take(remaining) {
                summary.listed += 1;
                self.store_listed(&author, listed, summary).await;
            }
            cursor = page.cursor;
            if cursor.is_none() || received == 0 {
                break;
            }
        }
        Ok(())
    }

    async fn store_listed(
        &self,
        author: &Author,
        listed: ListedRecord,
        summary: &mut BackfillSummary,
    ) {
        let content = serde_json::from_value::<RatingPayload>(listed.value)
            .map_err(|_| IgnoreReason::MalformedRecord)
            .and_then(RatingPayload::into_content);
        let content = match content {
            Ok(c) => c,
            Err(reason) => {
                summary.skipped += 1;
                debug!(uri = %listed.uri, ?reason, "backfill skipped record");
                return;
            }
        };
        let metadata = match self.enrich.get_metadata(&content.item).await {
            Ok(m) => m,
            Err(e) => {
                summary.failed += 1;
                warn!(uri = %listed.uri, reason = %e, "enrichment failed, record dropped");
                return;
            }
        };
        let record = backfilled_record(
            author.clone(),
            listed.uri,
            listed.cid,
            &self.collection,
            content,
            metadata,
        );
        match self.store.upsert_rating(&record, false).await {
            Ok(true) => summary.stored += 1,
            Ok(false) => summary.existing += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(uri = %record.uri, reason = %e, "failed to store backfilled record");
            }
        }
    }
}

/// Build a rating from a listed record, using its own timestamps and "now" as fallback.
fn backfilled_record(
    author: Author,
    uri: String,
    cid: String,
    collection: &str,
    content: RatingContent,
    metadata: Metadata,
) -> RatingRecord {
    let now = now_iso();
    let note_created = content.note.as_ref().and_then(|n| n.created_at.clone());
    let note_updated = content.note.as_ref().and_then(|n| n.updated_at.clone());
    let rating_created = content.rating.as_ref().and_then(|r| r.created_at.clone());
    let created_at = note_created
        .or_else(|| rating_created.clone())
        .unwrap_or_else(|| now.clone());
    let updated_at = note_updated.or(rating_created).unwrap_or(now);
    RatingRecord {
        uri,
        cid,
        author,
        indexed_at: created_at.clone(),
        created_at,
        updated_at,
        record_type: collection.to_string(),
        item: content.item,
        note: content.note,
        rating: content.rating,
        metadata,
        crosspost: content.crosspost,
        likes: 0,
    }
}
