//! Media metadata enrichment.
//!
//! No caching: every lookup is a network call.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{Item, Metadata};

#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    /// Resolve descriptive metadata for an item. Not-found is an error.
    async fn get_metadata(&self, item: &Item) -> Result<Metadata>;
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

/// Subset of the provider's movie/tv detail response.
#[derive(Debug, Deserialize)]
struct Details {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    backdrop_path: Option<String>,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    first_air_date: Option<String>,
}

impl From<Details> for Metadata {
    fn from(d: Details) -> Self {
        Metadata {
            title: d.title.or(d.name).unwrap_or_default(),
            poster_path: d.poster_path.unwrap_or_default(),
            backdrop_path: d.backdrop_path.unwrap_or_default(),
            tagline: d.tagline.unwrap_or_default(),
            overview: d.overview.unwrap_or_default(),
            genres: d.genres.into_iter().map(|g| g.name).collect(),
            release_date: d.release_date.or(d.first_air_date),
        }
    }
}

/// TMDB v3 client (bearer-token auth).
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn details_url(&self, item: &Item) -> Result<String> {
        let id: u64 = item.value.trim().parse().map_err(|_| Error::InvalidItem {
            item_ref: item.kind.as_ref_str().to_string(),
            value: item.value.clone(),
        })?;
        Ok(format!(
            "{}/3/{}/{}?language=en-US",
            self.base_url,
            item.kind.provider_kind(),
            id
        ))
    }
}

#[async_trait]
impl EnrichmentClient for TmdbClient {
    async fn get_metadata(&self, item: &Item) -> Result<Metadata> {
        let url = self.details_url(item)?;
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("{}-{}", item.kind.as_ref_str(), item.value)));
        }
        if !status.is_success() {
            return Err(Error::Upstream {
                service: "tmdb",
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let details: Details = resp.json().await?;
        if details.success == Some(false) {
            return Err(Error::NotFound(format!("{}-{}", item.kind.as_ref_str(), item.value)));
        }
        Ok(details.into())
    }
}
