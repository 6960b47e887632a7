//! Per-envelope processing: normalize → backfill author → enrich → persist.
//!
//! A failure while building one record abandons that record only. There is no retry queue;
//! a dropped rating can come back through a later backfill of its author.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backfill::BackfillReconciler;
use crate::config::Collections;
use crate::enrich::EnrichmentClient;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::model::{iso_from_micros, uri_authority, Author, LikeRecord, Metadata, RatingRecord};
use crate::normalize::{
    normalize, LikeCommit, Normalized, RatingCommit, RatingContent, RatingOperation,
};
use crate::repo::RepositoryClient;
use crate::store::Store;

/// What processing one envelope did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Ignored,
    RatingStored,
    /// Create for a `uri` that already exists.
    RatingUnchanged,
    RatingDeleted,
    /// Delete for a `uri` that was never stored.
    RatingAbsent,
    LikeStored,
    /// Duplicate like, or its subject does not exist.
    LikeDropped,
}

/// Applies normalized commits to the store.
pub struct Ingestor {
    store: Arc<dyn Store>,
    repo: Arc<dyn RepositoryClient>,
    enrich: Arc<dyn EnrichmentClient>,
    backfill: BackfillReconciler,
    collections: Collections,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        repo: Arc<dyn RepositoryClient>,
        enrich: Arc<dyn EnrichmentClient>,
        backfill: BackfillReconciler,
        collections: Collections,
    ) -> Self {
        Self {
            store,
            repo,
            enrich,
            backfill,
            collections,
        }
    }

    /// Process one envelope, logging instead of returning failures.
    pub async fn handle(&self, envelope: &Envelope) {
        if let Err(e) = self.process(envelope).await {
            warn!(
                did = %envelope.did,
                time_us = envelope.time_us,
                reason = %e,
                "commit dropped"
            );
        }
    }

    pub async fn process(&self, envelope: &Envelope) -> Result<Applied> {
        match normalize(&self.collections, envelope) {
            Normalized::Ignored(reason) => {
                debug!(did = %envelope.did, ?reason, "envelope ignored");
                Ok(Applied::Ignored)
            }
            Normalized::Rating(commit) => self.apply_rating(commit).await,
            Normalized::Like(commit) => self.apply_like(commit).await,
        }
    }

    async fn apply_rating(&self, mut commit: RatingCommit) -> Result<Applied> {
        self.backfill.ensure_author_backfilled(&commit.author_did).await;

        if commit.operation == RatingOperation::Delete {
            let removed = self.store.delete_rating(&commit.uri).await?;
            debug!(uri = %commit.uri, removed, "rating delete applied");
            return Ok(if removed {
                Applied::RatingDeleted
            } else {
                Applied::RatingAbsent
            });
        }
        let content = match commit.content.take() {
            Some(content) => content,
            None => return Ok(Applied::Ignored),
        };

        let profile = self.repo.get_profile(&commit.author_did).await?;
        let metadata = self.enrich.get_metadata(&content.item).await?;
        let author = Author {
            did: commit.author_did.clone(),
            handle: profile.handle,
            display_name: profile.display_name,
            avatar: profile.avatar,
        };
        let is_update = commit.operation == RatingOperation::Update;
        let record = live_record(&commit, &self.collections.rating, author, content, metadata);
        if self.store.upsert_rating(&record, is_update).await? {
            debug!(uri = %record.uri, is_update, "rating stored");
            Ok(Applied::RatingStored)
        } else {
            Ok(Applied::RatingUnchanged)
        }
    }

    async fn apply_like(&self, commit: LikeCommit) -> Result<Applied> {
        match uri_authority(&commit.subject_uri) {
            Some(subject_author) => {
                self.backfill.ensure_author_backfilled(subject_author).await;
            }
            None => debug!(subject = %commit.subject_uri, "like subject is not an at:// uri"),
        }
        let like = LikeRecord {
            uri: commit.uri,
            author_did: commit.author_did,
            subject_cid: commit.subject_cid,
            subject_uri: commit.subject_uri,
            created_at: commit.created_at,
        };
        if self.store.upsert_like(&like).await? {
            debug!(uri = %like.uri, subject = %like.subject_uri, "like stored");
            Ok(Applied::LikeStored)
        } else {
            debug!(uri = %like.uri, subject = %like.subject_uri, "like dropped");
            Ok(Applied::LikeDropped)
        }
    }
}

/// Build a rating from a live commit.
fn live_record(
    commit: &RatingCommit,
    collection: &str,
    author: Author,
    content: RatingContent,
    metadata: Metadata,
) -> RatingRecord {
    let indexed_at = iso_from_micros(commit.time_us);
    let created_at = content
        .rating
        .as_ref()
        .and_then(|r| r.created_at.clone())
        .or_else(|| content.note.as_ref().and_then(|n| n.created_at.clone()))
        .unwrap_or_else(|| indexed_at.clone());
    let updated_at = content
        .note
        .as_ref()
        .and_then(|n| n.updated_at.clone())
        .unwrap_or_else(|| created_at.clone());
    RatingRecord {
        uri: commit.uri.clone(),
        cid: commit.cid.clone().unwrap_or_default(),
        author,
        indexed_at,
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
