//! SQLite-backed [Store] over `sqlx`.
//!
//! Tables: `records` (one row per rating, `uri` primary key, nested fields flattened into
//! columns), `likes` (unique per `(author_did, subject_uri)`), and a single-row `watermark`.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    Author, Crosspost, Item, ItemKind, LikeRecord, Metadata, Note, Rating, RatingRecord,
};
use crate::store::Store;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS records (
        uri TEXT PRIMARY KEY,
        cid TEXT NOT NULL,
        author_did TEXT NOT NULL,
        author_handle TEXT NOT NULL,
        author_display_name TEXT,
        author_avatar TEXT,
        indexed_at TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        record_type TEXT NOT NULL,
        record_item_ref TEXT NOT NULL,
        record_item_value TEXT NOT NULL,
        record_note_value TEXT,
        record_note_created_at TEXT,
        record_note_updated_at TEXT,
        record_rating_value INTEGER,
        record_rating_created_at TEXT,
        record_metadata_title TEXT,
        record_metadata_poster_path TEXT,
        record_metadata_backdrop_path TEXT,
        record_metadata_tagline TEXT,
        record_metadata_overview TEXT,
        record_metadata_genres TEXT,
        record_metadata_release_date TEXT,
        record_crosspost_uri TEXT,
        record_crosspost_likes INTEGER,
        record_crosspost_reposts INTEGER,
        record_crosspost_replies INTEGER,
        record_likes INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_records_author_did ON records (author_did)",
    "CREATE INDEX IF NOT EXISTS idx_records_created_at ON records (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_records_item ON records (record_item_ref, record_item_value)",
    "CREATE INDEX IF NOT EXISTS idx_records_crosspost_uri ON records (record_crosspost_uri)",
    "CREATE TABLE IF NOT EXISTS likes (
        uri TEXT PRIMARY KEY,
        author_did TEXT NOT NULL,
        subject_cid TEXT NOT NULL,
        subject_uri TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (author_did, subject_uri)
    )",
    "CREATE INDEX IF NOT EXISTS idx_likes_subject_uri ON likes (subject_uri)",
    "CREATE INDEX IF NOT EXISTS idx_likes_created_at ON likes (created_at)",
    "CREATE TABLE IF NOT EXISTS watermark (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        time_us INTEGER NOT NULL
    )",
];

/// Columns written from a [RatingRecord]. `record_likes` is never taken from the record: it is
/// recounted from `likes` on insert and only bumped by [Store::upsert_like] afterwards.
const RECORD_COLUMNS: &[&str] = &[
    "uri",
    "cid",
    "author_did",
    "author_handle",
    "author_display_name",
    "author_avatar",
    "indexed_at",
    "created_at",
    "updated_at",
    "record_type",
    "record_item_ref",
    "record_item_value",
    "record_note_value",
    "record_note_created_at",
    "record_note_updated_at",
    "record_rating_value",
    "record_rating_created_at",
    "record_metadata_title",
    "record_metadata_poster_path",
    "record_metadata_backdrop_path",
    "record_metadata_tagline",
    "record_metadata_overview",
    "record_metadata_genres",
    "record_metadata_release_date",
    "record_crosspost_uri",
    "record_crosspost_likes",
    "record_crosspost_reposts",
    "record_crosspost_replies",
];

fn insert_rating_sql(is_update: bool) -> String {
    let placeholders = vec!["?"; RECORD_COLUMNS.len()].join(", ");
    let conflict = if is_update {
        let sets = RECORD_COLUMNS[1..]
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ON CONFLICT(uri) DO UPDATE SET {sets}")
    } else {
        "ON CONFLICT(uri) DO NOTHING".to_string()
    };
    format!(
        "INSERT INTO records ({}, record_likes) \
         VALUES ({}, (SELECT COUNT(*) FROM likes WHERE subject_uri = ?)) {}",
        RECORD_COLUMNS.join(", "),
        placeholders,
        conflict
    )
}

fn bind_rating<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    r: &'q RatingRecord,
    genres: String,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let note = r.note.as_ref();
    let rating = r.rating.as_ref();
    let crosspost = r.crosspost.as_ref();
    query
        .bind(r.uri.as_str())
        .bind(r.cid.as_str())
        .bind(r.author.did.as_str())
        .bind(r.author.handle.as_str())
        .bind(r.author.display_name.as_deref())
        .bind(r.author.avatar.as_deref())
        .bind(r.indexed_at.as_str())
        .bind(r.created_at.as_str())
        .bind(r.updated_at.as_str())
        .bind(r.record_type.as_str())
        .bind(r.item.kind.as_ref_str())
        .bind(r.item.value.as_str())
        .bind(note.map(|n| n.value.as_str()))
        .bind(note.and_then(|n| n.created_at.as_deref()))
        .bind(note.and_then(|n| n.updated_at.as_deref()))
        .bind(rating.map(|r| r.value))
        .bind(rating.and_then(|r| r.created_at.as_deref()))
        .bind(r.metadata.title.as_str())
        .bind(r.metadata.poster_path.as_str())
        .bind(r.metadata.backdrop_path.as_str())
        .bind(r.metadata.tagline.as_str())
        .bind(r.metadata.overview.as_str())
        .bind(genres)
        .bind(r.metadata.release_date.as_deref())
        .bind(crosspost.map(|c| c.uri.as_str()))
        .bind(crosspost.and_then(|c| c.likes))
        .bind(crosspost.and_then(|c| c.reposts))
        .bind(crosspost.and_then(|c| c.replies))
        .bind(r.uri.as_str())
}

fn rating_from_row(row: &SqliteRow) -> Result<RatingRecord> {
    let item_ref: String = row.try_get("record_item_ref")?;
    let value: String = row.try_get("record_item_value")?;
    let kind = ItemKind::from_ref(&item_ref).ok_or_else(|| Error::InvalidItem {
        item_ref: item_ref.clone(),
        value: value.clone(),
    })?;
    let genres: Option<String> = row.try_get("record_metadata_genres")?;
    let genres = match genres {
        Some(g) if !g.is_empty() => serde_json::from_str(&g)?,
        _ => Vec::new(),
    };
    let note = row
        .try_get::<Option<String>, _>("record_note_value")?
        .map(|value| -> Result<Note> {
            Ok(Note {
                value,
                created_at: row.try_get("record_note_created_at")?,
                updated_at: row.try_get("record_note_updated_at")?,
            })
        })
        .transpose()?;
    let rating = row
        .try_get::<Option<i64>, _>("record_rating_value")?
        .map(|value| -> Result<Rating> {
            Ok(Rating {
                value,
                created_at: row.try_get("record_rating_created_at")?,
            })
        })
        .transpose()?;
    let crosspost = row
        .try_get::<Option<String>, _>("record_crosspost_uri")?
        .map(|uri| -> Result<Crosspost> {
            Ok(Crosspost {
                uri,
                likes: row.try_get("record_crosspost_likes")?,
                reposts: row.try_get("record_crosspost_reposts")?,
                replies: row.try_get("record_crosspost_replies")?,
            })
        })
        .transpose()?;

    Ok(RatingRecord {
        uri: row.try_get("uri")?,
        cid: row.try_get("cid")?,
        author: Author {
            did: row.try_get("author_did")?,
            handle: row.try_get("author_handle")?,
            display_name: row.try_get("author_display_name")?,
            avatar: row.try_get("author_avatar")?,
        },
        indexed_at: row.try_get("indexed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        record_type: row.try_get("record_type")?,
        item: Item { kind, value },
        note,
        rating,
        metadata: Metadata {
            title: row.try_get::<Option<String>, _>("record_metadata_title")?.unwrap_or_default(),
            poster_path: row
                .try_get::<Option<String>, _>("record_metadata_poster_path")?
                .unwrap_or_default(),
            backdrop_path: row
                .try_get::<Option<String>, _>("record_metadata_backdrop_path")?
                .unwrap_or_default(),
            tagline: row
                .try_get::<Option<String>, _>("record_metadata_tagline")?
                .unwrap_or_default(),
            overview: row
                .try_get::<Option<String>, _>("record_metadata_overview")?
                .unwrap_or_default(),
            genres,
            release_date: row.try_get("record_metadata_release_date")?,
        },
        crosspost,
        likes: row.try_get("record_likes")?,
    })
}

fn like_from_row(row: &SqliteRow) -> Result<LikeRecord> {
    Ok(LikeRecord {
        uri: row.try_get("uri")?,
        author_did: row.try_get("author_did")?,
        subject_cid: row.try_get("subject_cid")?,
        subject_uri: row.try_get("subject_uri")?,
        created_at: row.try_get("created_at")?,
    })
}

/// SQLite store. Cheap to clone (shares the pool).
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(url, "store ready");
        Ok(store)
    }

    /// Private in-memory database on a single long-lived connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn get_rating(&self, uri: &str) -> Result<Option<RatingRecord>> {
        let row = sqlx::query("SELECT * FROM records WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(rating_from_row).transpose()
    }

    /// Most recent ratings by `created_at`, strictly older than `before` when given.
    pub async fn recent_ratings(
        &self,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        self.fetch_ratings("1 = 1", &[], limit, before).await
    }

    pub async fn ratings_by_author(
        &self,
        did: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        self.fetch_ratings("author_did = ?", &[did], limit, before).await
    }

    pub async fn ratings_by_item(
        &self,
        kind: ItemKind,
        value: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        self.fetch_ratings(
            "record_item_ref = ? AND record_item_value = ?",
            &[kind.as_ref_str(), value],
            limit,
            before,
        )
        .await
    }

    async fn fetch_ratings(
        &self,
        filter: &str,
        params: &[&str],
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<RatingRecord>> {
        let sql = match before {
            Some(_) => format!(
                "SELECT * FROM records WHERE {filter} AND created_at < ? ORDER BY created_at DESC LIMIT ?"
            ),
            None => {
                format!("SELECT * FROM records WHERE {filter} ORDER BY created_at DESC LIMIT ?")
            }
        };
        let mut query = sqlx::query(&sql);
        for p in params {
            query = query.bind(*p);
        }
        if let Some(b) = before {
            query = query.bind(b);
        }
        let rows = query.bind(i64::from(limit)).fetch_all(&self.pool).await?;
        rows.iter().map(rating_from_row).collect()
    }

    pub async fn author_dids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT author_did FROM records ORDER BY author_did")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("author_did").map_err(Error::from))
            .collect()
    }

    pub async fn likes_by_author(&self, did: &str, limit: u32) -> Result<Vec<LikeRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM likes WHERE author_did = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(did)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(like_from_row).collect()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_rating(&self, record: &RatingRecord, is_update: bool) -> Result<bool> {
        let genres = serde_json::to_string(&record.metadata.genres)?;
        let sql = insert_rating_sql(is_update);
        let result = bind_rating(sqlx::query(&sql), record, genres)
            .execute(&self.pool)
            .await?;
        let written = result.rows_affected() > 0;
        if !written {
            debug!(uri = %record.uri, "rating already stored");
        }
        Ok(written)
    }

    async fn delete_rating(&self, uri: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM records WHERE uri = ?")
            .bind(uri)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let likes = sqlx::query("DELETE FROM likes WHERE subject_uri = ?")
            .bind(uri)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        if likes > 0 {
            debug!(uri, likes, "removed likes of deleted rating");
        }
        Ok(removed > 0)
    }

    async fn delete_ratings_by_author(&self, did: &str) -> Result<u64> {
        // likes stay: the re-listed ratings recount them on insert
        let result = sqlx::query("DELETE FROM records WHERE author_did = ?")
            .bind(did)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rating_exists_for_author(&self, did: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM records WHERE author_did = ? LIMIT 1")
            .bind(did)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn upsert_like(&self, like: &LikeRecord) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let subject = sqlx::query("SELECT 1 FROM records WHERE uri = ?")
            .bind(like.subject_uri.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if subject.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }
        let inserted = sqlx::query(
            "INSERT INTO likes (uri, author_did, subject_cid, subject_uri, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(like.uri.as_str())
        .bind(like.author_did.as_str())
        .bind(like.subject_cid.as_str())
        .bind(like.subject_uri.as_str())
        .bind(like.created_at.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;
        if inserted {
            sqlx::query("UPDATE records SET record_likes = record_likes + 1 WHERE uri = ?")
                .bind(like.subject_uri.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_watermark(&self) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT time_us FROM watermark WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<i64, _>("time_us"))
            .transpose()
            .map_err(Error::from)
    }

    async fn set_watermark(&self, time_us: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO watermark (id, time_us) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET time_us = excluded.time_us",
        )
        .bind(time_us)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uri: &str, did: &str, created_at: &str) -> RatingRecord {
        RatingRecord {
            uri: uri.to_string(),
            cid: "bafyreia".to_string(),
            author: Author {
                did: did.to_string(),
                handle: "alice.test".to_string(),
                display_name: Some("Alice".to_string()),
                avatar: None,
            },
            indexed_at: created_at.to_string(),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            record_type: "my.skylights.rel".to_string(),
            item: Item {
                kind: ItemKind::Movie,
                value: "603".to_string(),
            },
            note: None,
            rating: Some(Rating {
                value: 5,
                created_at: Some(created_at.to_string()),
            }),
            metadata: Metadata {
                title: "The Matrix".to_string(),
                genres: vec!["Action".to_string(), "Sci-Fi".to_string()],
                ..Default::default()
            },
            crosspost: None,
            likes: 0,
        }
    }

    fn like(uri: &str, author: &str, subject: &str) -> LikeRecord {
        LikeRecord {
            uri: uri.to_string(),
            author_did: author.to_string(),
            subject_cid: "bafyreia".to_string(),
            subject_uri: subject.to_string(),
            created_at: "2024-09-10T00:00:00.000Z".to_string(),
        }
    }

    const URI: &str = "at://did:plc:abc/my.skylights.rel/1";

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        assert!(store.upsert_rating(&r, false).await.unwrap());
        let mut again = r.clone();
        again.metadata.title = "Changed".to_string();
        assert!(!store.upsert_rating(&again, false).await.unwrap());
        let all = store.recent_ratings(10, None).await.unwrap();
        assert_eq!(all, vec![r]);
    }

    #[tokio::test]
    async fn update_overwrites_but_keeps_likes() {
        let store = SqliteStore::in_memory().await.unwrap();
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        store.upsert_rating(&r, false).await.unwrap();
        let l = like("at://did:plc:bob/my.skylights.like/1", "did:plc:bob", URI);
        assert!(store.upsert_like(&l).await.unwrap());

        let mut updated = r.clone();
        updated.cid = "bafyreinew".to_string();
        updated.rating = None;
        updated.note = Some(Note {
            value: "rewatched".to_string(),
            created_at: None,
            updated_at: Some("2024-09-11T00:00:00.000Z".to_string()),
        });
        assert!(store.upsert_rating(&updated, true).await.unwrap());

        let stored = store.get_rating(URI).await.unwrap().unwrap();
        assert_eq!(stored.cid, "bafyreinew");
        assert!(stored.rating.is_none());
        assert_eq!(stored.note.unwrap().value, "rewatched");
        assert_eq!(stored.likes, 1);
    }

    #[tokio::test]
    async fn update_of_missing_row_inserts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        assert!(store.upsert_rating(&r, true).await.unwrap());
        assert!(store.get_rating(URI).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_only_target() {
        let store = SqliteStore::in_memory().await.unwrap();
        let other = "at://did:plc:abc/my.skylights.rel/2";
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        store.upsert_rating(&r, false).await.unwrap();
        let r = record(other, "did:plc:abc", "2024-09-10T00:00:00.000Z");
        store.upsert_rating(&r, false).await.unwrap();
        assert!(store.delete_rating(URI).await.unwrap());
        assert!(!store.delete_rating(URI).await.unwrap());
        assert!(store.get_rating(URI).await.unwrap().is_none());
        assert!(store.get_rating(other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_takes_its_likes_along() {
        let store = SqliteStore::in_memory().await.unwrap();
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        store.upsert_rating(&r, false).await.unwrap();
        let l = like("at://did:plc:bob/my.skylights.like/1", "did:plc:bob", URI);
        assert!(store.upsert_like(&l).await.unwrap());

        assert!(store.delete_rating(URI).await.unwrap());
        assert!(store.likes_by_author("did:plc:bob", 10).await.unwrap().is_empty());

        // recreated subject starts clean and the like can land again
        store.upsert_rating(&r, false).await.unwrap();
        assert_eq!(store.get_rating(URI).await.unwrap().unwrap().likes, 0);
        assert!(store.upsert_like(&l).await.unwrap());
        assert_eq!(store.get_rating(URI).await.unwrap().unwrap().likes, 1);
    }

    #[tokio::test]
    async fn reinsert_recounts_surviving_likes() {
        let store = SqliteStore::in_memory().await.unwrap();
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        store.upsert_rating(&r, false).await.unwrap();
        for liker in ["did:plc:bob", "did:plc:carol"] {
            let l = like(&format!("at://{liker}/my.skylights.like/1"), liker, URI);
            assert!(store.upsert_like(&l).await.unwrap());
        }

        assert_eq!(store.delete_ratings_by_author("did:plc:abc").await.unwrap(), 1);
        assert_eq!(store.likes_by_author("did:plc:bob", 10).await.unwrap().len(), 1);
        assert!(store.upsert_rating(&r, false).await.unwrap());
        assert_eq!(store.get_rating(URI).await.unwrap().unwrap().likes, 2);
    }

    #[tokio::test]
    async fn dangling_like_is_dropped() {
        let store = SqliteStore::in_memory().await.unwrap();
        let l = like("at://did:plc:bob/my.skylights.like/1", "did:plc:bob", URI);
        assert!(!store.upsert_like(&l).await.unwrap());
        assert!(store.likes_by_author("did:plc:bob", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_like_counts_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        store.upsert_rating(&r, false).await.unwrap();
        let first = like("at://did:plc:bob/my.skylights.like/1", "did:plc:bob", URI);
        // same author and subject under a different record key
        let second = like("at://did:plc:bob/my.skylights.like/2", "did:plc:bob", URI);
        assert!(store.upsert_like(&first).await.unwrap());
        assert!(!store.upsert_like(&first).await.unwrap());
        assert!(!store.upsert_like(&second).await.unwrap());
        assert_eq!(store.get_rating(URI).await.unwrap().unwrap().likes, 1);
        assert_eq!(store.likes_by_author("did:plc:bob", 10).await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn author_existence_and_bulk_delete() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(!store.rating_exists_for_author("did:plc:abc").await.unwrap());
        let r = record(URI, "did:plc:abc", "2024-09-09T00:00:00.000Z");
        store.upsert_rating(&r, false).await.unwrap();
        let xyz = record(
            "at://did:plc:xyz/my.skylights.rel/1",
            "did:plc:xyz",
            "2024-09-09T00:00:00.000Z",
        );
        store.upsert_rating(&xyz, false).await.unwrap();
        assert!(store.rating_exists_for_author("did:plc:abc").await.unwrap());
        assert_eq!(store.author_dids().await.unwrap(), vec!["did:plc:abc", "did:plc:xyz"]);
        assert_eq!(store.delete_ratings_by_author("did:plc:abc").await.unwrap(), 1);
        assert!(!store.rating_exists_for_author("did:plc:abc").await.unwrap());
        assert!(store.rating_exists_for_author("did:plc:xyz").await.unwrap());
    }

    #[tokio::test]
    async fn feeds_page_by_created_at() {
        let store = SqliteStore::in_memory().await.unwrap();
        for (i, day) in ["07", "08", "09"].iter().enumerate() {
            let uri = format!("at://did:plc:abc/my.skylights.rel/{i}");
            let created = format!("2024-09-{day}T00:00:00.000Z");
            store.upsert_rating(&record(&uri, "did:plc:abc", &created), false).await.unwrap();
        }
        let page = store.ratings_by_author("did:plc:abc", 2, None).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].created_at, "2024-09-09T00:00:00.000Z");
        let next = store
            .ratings_by_author("did:plc:abc", 2, Some(&page[1].created_at))
            .await
            .unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].created_at, "2024-09-07T00:00:00.000Z");
        assert_eq!(store.ratings_by_item(ItemKind::Movie, "603", 10, None).await.unwrap().len(), 3);
        assert!(store.ratings_by_item(ItemKind::Series, "603", 10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn watermark_last_write_wins() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.get_watermark().await.unwrap(), None);
        store.set_watermark(10).await.unwrap();
        store.set_watermark(20).await.unwrap();
        assert_eq!(store.get_watermark().await.unwrap(), Some(20));
    }

    #[test]
    fn update_sql_never_touches_likes() {
        let sql = insert_rating_sql(true);
        assert!(sql.contains("ON CONFLICT(uri) DO UPDATE SET cid = excluded.cid"));
        assert!(!sql.contains("record_likes"));
        assert!(insert_rating_sql(false).ends_with("DO NOTHING"));
    }
}
