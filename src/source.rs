//! Query source client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{HarvestError, Result, SearchQuery};

/// One pull from the query source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBatch {
    /// Query texts, in serving order.
    #[serde(default)]
    pub queries: Vec<String>,
    /// Queries still queued on the source side.
    #[serde(default)]
    pub remaining: Option<usize>,
    /// Set once the source will never produce another query.
    #[serde(default)]
    pub exhausted: bool,
}

impl QueryBatch {
    /// The batch as search queries, skipping blank entries.
    pub fn search_queries(&self) -> Vec<SearchQuery> {
        self.queries
            .iter()
            .map(SearchQuery::new)
            .filter(|q| !q.is_blank())
            .collect()
    }
}

/// Status reported by the query source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub total_queries: usize,
    #[serde(default)]
    pub served_queries: usize,
    #[serde(default)]
    pub exhausted: bool,
}

#[derive(Deserialize)]
struct SearchStringsResponse {
    #[serde(default)]
    search_strings: Vec<String>,
}

/// Producer of search queries.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Pulls the next batch of queries.
    async fn next_batch(&self) -> Result<QueryBatch>;

    /// Detailed match strings for the analysis sink.
    async fn search_strings(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Status of the source, when it exposes one.
    async fn health(&self) -> Option<SourceHealth> {
        None
    }
}

/// [`QuerySource`] backed by the query-generation service.
pub struct HttpQuerySource {
    client: Client,
    base_url: String,
}

impl HttpQuerySource {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| HarvestError::Config("HTTP client could not be built".into()))?;
        Ok(Self { client, base_url })
    }

    /// Returns the service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| HarvestError::QuerySource)?;

        let status = response.status();
        if !status.is_success() {
            debug!("Query source {} answered HTTP {}", path, status.as_u16());
            return Err(HarvestError::QuerySource);
        }

        response
            .json::<T>()
            .await
            .map_err(|_| HarvestError::MalformedResponse)
    }
}

#[async_trait]
impl QuerySource for HttpQuerySource {
    async fn next_batch(&self) -> Result<QueryBatch> {
        self.get_json("/queries").await
    }

    async fn search_strings(&self) -> Result<Vec<String>> {
        let response: SearchStringsResponse = self.get_json("/search-strings").await?;
        Ok(response.search_strings)
    }

    async fn health(&self) -> Option<SourceHealth> {
        self.get_json("/health").await.ok()
    }
}
