//! Common helpers for integration tests: in-process upstream fakes and envelope builders.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reel::error::{Error, Result};
use reel::model::{Item, Metadata};
use reel::repo::{ListedRecord, Profile, RecordPage, RepositoryClient};
use reel::{
    BackfillConfig, BackfillReconciler, Collections, EnrichmentClient, Envelope, Ingestor,
    SqliteStore, Store,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

pub const RATING: &str = "my.skylights.rel";
pub const LIKE: &str = "my.skylights.like";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reel=debug".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

/// Repository fake: serves per-author listings in pages, counts every call.
#[derive(Default)]
pub struct FakeRepository {
    records: Mutex<HashMap<String, Vec<ListedRecord>>>,
    missing_profiles: Mutex<HashSet<String>>,
    /// Page index (0-based) at which listing fails with an upstream error.
    fail_page: Mutex<Option<usize>>,
    delay: Option<Duration>,
    pub profile_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn add_record(&self, did: &str, rkey: &str, value: Value) {
        let uri = format!("at://{}/{}/{}", did, RATING, rkey);
        self.records
            .lock()
            .unwrap()
            .entry(did.to_string())
            .or_default()
            .push(ListedRecord {
                uri,
                cid: format!("bafy-{}", rkey),
                value,
            });
    }

    pub fn remove_profile(&self, did: &str) {
        self.missing_profiles.lock().unwrap().insert(did.to_string());
    }

    pub fn fail_listing_at_page(&self, page: usize) {
        *self.fail_page.lock().unwrap() = Some(page);
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryClient for FakeRepository {
    async fn get_profile(&self, did: &str) -> Result<Profile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.missing_profiles.lock().unwrap().contains(did) {
            return Err(Error::NotFound(did.to_string()));
        }
        let name = did.rsplit(':').next().unwrap_or(did);
        Ok(Profile {
            did: did.to_string(),
            handle: format!("{}.test", name),
            display_name: Some(name.to_uppercase()),
            avatar: None,
        })
    }

    async fn list_records(
        &self,
        did: &str,
        _collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_page.lock().unwrap() == Some(call) {
            return Err(Error::Upstream {
                service: "xrpc",
                status: 502,
                body: "bad gateway".into(),
            });
        }
        let all = self.records.lock().unwrap().get(did).cloned().unwrap_or_default();
        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + limit as usize).min(all.len());
        let records = all.get(start..end).map(<[ListedRecord]>::to_vec).unwrap_or_default();
        Ok(RecordPage {
            records,
            cursor: (end < all.len()).then(|| end.to_string()),
        })
    }
}

/// Enrichment fake: title "Title {value}" unless overridden; failing ids return NotFound.
#[derive(Default)]
pub struct FakeEnrichment {
    overrides: Mutex<HashMap<String, Metadata>>,
    failing: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl FakeEnrichment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: &str, metadata: Metadata) {
        self.overrides.lock().unwrap().insert(value.to_string(), metadata);
    }

    pub fn fail(&self, value: &str) {
        self.failing.lock().unwrap().insert(value.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnrichmentClient for FakeEnrichment {
    async fn get_metadata(&self, item: &Item) -> Result<Metadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&item.value) {
            return Err(Error::NotFound(format!("{}-{}", item.kind.as_ref_str(), item.value)));
        }
        if let Some(m) = self.overrides.lock().unwrap().get(&item.value) {
            return Ok(m.clone());
        }
        Ok(Metadata {
            title: format!("Title {}", item.value),
            ..Metadata::default()
        })
    }
}

pub fn matrix() -> Metadata {
    Metadata {
        title: "The Matrix".into(),
        poster_path: "/matrix.jpg".into(),
        backdrop_path: "/matrix-bg.jpg".into(),
        tagline: "Welcome to the Real World.".into(),
        overview: "A hacker learns the truth.".into(),
        genres: vec!["Action".into(), "Science Fiction".into()],
        release_date: Some("1999-03-30".into()),
    }
}

/// Everything a test needs, wired the way the binary wires it.
pub struct Harness {
    pub store: SqliteStore,
    pub repo: Arc<FakeRepository>,
    pub enrich: Arc<FakeEnrichment>,
    pub backfill: BackfillReconciler,
    pub ingestor: Arc<Ingestor>,
}

pub async fn harness_with(repo: FakeRepository, config: BackfillConfig) -> Harness {
    init_tracing();
    let store = SqliteStore::in_memory().await.expect("in-memory store");
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let repo = Arc::new(repo);
    let enrich = Arc::new(FakeEnrichment::new());
    let backfill = BackfillReconciler::new(
        Arc::clone(&shared),
        repo.clone(),
        enrich.clone(),
        RATING,
        config,
    );
    let ingestor = Arc::new(Ingestor::new(
        shared,
        repo.clone(),
        enrich.clone(),
        backfill.clone(),
        Collections::default(),
    ));
    Harness {
        store,
        repo,
        enrich,
        backfill,
        ingestor,
    }
}

pub async fn harness() -> Harness {
    harness_with(FakeRepository::new(), BackfillConfig::default()).await
}

pub fn rating_record(item_value: &str, rating: i64) -> Value {
    json!({
        "$type": RATING,
        "item": {"ref": "tmdb:m", "value": item_value},
        "rating": {"value": rating, "createdAt": "2024-09-09T19:46:00.000Z"}
    })
}

pub fn commit_envelope(
    did: &str,
    time_us: i64,
    operation: &str,
    collection: &str,
    rkey: &str,
    record: Option<Value>,
) -> Envelope {
    let mut commit = json!({
        "rev": "3l3qo2vutsw2b",
        "operation": operation,
        "collection": collection,
        "rkey": rkey,
    });
    if let Some(r) = record {
        commit["record"] = r;
        commit["cid"] = json!(format!("bafy-{}-{}", rkey, time_us));
    }
    serde_json::from_value(json!({
        "did": did,
        "time_us": time_us,
        "kind": "commit",
        "commit": commit,
    }))
    .expect("valid envelope")
}

pub fn like_envelope(did: &str, time_us: i64, rkey: &str, subject_uri: &str) -> Envelope {
    commit_envelope(
        did,
        time_us,
        "create",
        LIKE,
        rkey,
        Some(json!({
            "$type": LIKE,
            "subject": {"uri": subject_uri, "cid": "bafy-subject"},
            "createdAt": "2024-09-09T20:00:00.000Z"
        })),
    )
}

/// Raw identity frame (non-commit), as the firehose sends it.
pub fn identity_frame(did: &str, time_us: i64) -> String {
    json!({"did": did, "time_us": time_us, "kind": "identity", "identity": {"did": did, "seq": 1}})
        .to_string()
}
