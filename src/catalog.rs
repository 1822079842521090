//! Remote catalog source: a paginated index endpoint plus a per-item
//! detail endpoint. The ingestion batcher drives this through the
//! [`CatalogClient`] seam so tests can substitute a fake.

use serde::Deserialize;

use crate::row::{Row, STAT_NAMES, Stats};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("catalog request failed ({url}): {error}")]
    Fetch { error: reqwest::Error, url: url::Url },
    #[error("invalid catalog url: {0}")]
    Url(#[from] url::ParseError),
}

/// One entry of the catalog index: display name and where the full
/// record lives.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub url: url::Url,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    results: Vec<IndexEntry>,
}

/// Raw per-item record as the remote serves it. Statistics arrive as an
/// unordered name/value list, not as named fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub stats: Vec<RawStat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStat {
    pub name: String,
    pub base_value: i64,
}

pub trait CatalogClient {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The full index, bounded by `cap`.
    fn fetch_index(&self, cap: usize)
    -> impl Future<Output = Result<Vec<IndexEntry>, Self::Error>>;

    fn fetch_detail(
        &self,
        entry: &IndexEntry,
    ) -> impl Future<Output = Result<RawRecord, Self::Error>>;
}

pub struct HttpCatalog {
    client: reqwest::Client,
    base: url::Url,
}

impl HttpCatalog {
    pub fn new(base: url::Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }
}

impl CatalogClient for HttpCatalog {
    type Error = Error;

    async fn fetch_index(&self, cap: usize) -> Result<Vec<IndexEntry>, Error> {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("limit", &cap.to_string());
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| Error::Fetch {
                error,
                url: url.clone(),
            })?;
        let index: IndexResponse = response
            .json()
            .await
            .map_err(|error| Error::Fetch { error, url })?;
        Ok(index.results)
    }

    async fn fetch_detail(&self, entry: &IndexEntry) -> Result<RawRecord, Error> {
        let response = self
            .client
            .get(entry.url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| Error::Fetch {
                error,
                url: entry.url.clone(),
            })?;
        response.json().await.map_err(|error| Error::Fetch {
            error,
            url: entry.url.clone(),
        })
    }
}

/// Generation tier boundaries by source key, lowest key of each tier.
const GENERATION_STARTS: [i64; 9] = [1, 152, 252, 387, 494, 650, 722, 810, 906];

pub fn generation_for(source_key: i64) -> i64 {
    GENERATION_STARTS
        .iter()
        .rev()
        .position(|start| source_key >= *start)
        .map(|offset| (GENERATION_STARTS.len() - offset) as i64)
        .unwrap_or(0)
}

/// Normalize a raw record into a row. Statistics are looked up by name;
/// a missing stat is 0, never an error.
pub fn normalize(raw: RawRecord) -> Row {
    let mut stats = Stats::default();
    for name in STAT_NAMES {
        let value = raw
            .stats
            .iter()
            .find(|stat| stat.name == name)
            .map(|stat| stat.base_value)
            .unwrap_or(0);
        stats.set(name, value);
    }
    Row {
        id: Row::fresh_id(),
        source_key: raw.id,
        name: raw.name,
        sprite: raw.sprite,
        categories: raw.categories,
        generation: generation_for(raw.id),
        abilities: raw.abilities,
        stats,
        extra: Default::default(),
    }
}
