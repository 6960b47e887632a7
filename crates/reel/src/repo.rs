//! Repository listing and profile lookup against the upstream network.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Author profile snapshot stored alongside each rating.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// One record from `com.atproto.repo.listRecords`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListedRecord {
    pub uri: String,
    pub cid: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<ListedRecord>,
    /// Opaque continuation; absent on the last page.
    #[serde(default)]
    pub cursor: Option<String>,
}

#[async_trait]
pub trait RepositoryClient: Send + Sync {
    async fn get_profile(&self, did: &str) -> Result<Profile>;

    async fn list_records(
        &self,
        did: &str,
        collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<RecordPage>;
}

/// XRPC client: listing against a PDS host, profiles against an AppView host.
#[derive(Debug, Clone)]
pub struct XrpcClient {
    http: reqwest::Client,
    pds_url: String,
    appview_url: String,
}

impl XrpcClient {
    pub fn new(
        http: reqwest::Client,
        pds_url: impl Into<String>,
        appview_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            pds_url: pds_url.into().trim_end_matches('/').to_string(),
            appview_url: appview_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
        subject: &str,
    ) -> Result<T> {
        let resp = self.http.get(&url).query(query).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        // XRPC reports missing repos/profiles as 400 with an error name in the body
        if status == reqwest::StatusCode::NOT_FOUND
            || body.contains("NotFound")
            || body.contains("Profile not found")
        {
            return Err(Error::NotFound(subject.to_string()));
        }
        Err(Error::Upstream {
            service: "xrpc",
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RepositoryClient for XrpcClient {
    async fn get_profile(&self, did: &str) -> Result<Profile> {
        let url = format!("{}/xrpc/app.bsky.actor.getProfile", self.appview_url);
        self.get(url, &[("actor", did)], did).await
    }

    async fn list_records(
        &self,
        did: &str,
        collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        let url = format!("{}/xrpc/com.atproto.repo.listRecords", self.pds_url);
        let limit = limit.to_string();
        let mut query = vec![("repo", did), ("collection", collection), ("limit", limit.as_str())];
        if let Some(c) = cursor {
            query.push(("cursor", c));
        }
        self.get(url, &query, did).await
    }
}
