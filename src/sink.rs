//! Analysis sink client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{HarvestError, Result, ScrapedPage};

/// One page of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSubmission {
    pub url: String,
    pub raw_content: String,
    pub source_engine: String,
}

impl From<&ScrapedPage> for PageSubmission {
    fn from(page: &ScrapedPage) -> Self {
        Self {
            url: page.url.clone(),
            raw_content: page.raw.clone(),
            source_engine: page.engine.clone(),
        }
    }
}

/// Body of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub pages: Vec<PageSubmission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_strings: Option<Vec<String>>,
}

/// Acknowledgement returned by the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SinkAck {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub relevant_count: usize,
}

/// Downstream consumer of fetched pages.
#[async_trait]
pub trait AnalysisSink: Send + Sync {
    /// Submits one batch. `Ok` means the sink acknowledged it.
    async fn submit(&self, batch: &BatchSubmission) -> Result<SinkAck>;
}

/// [`AnalysisSink`] posting to `{base}/analyze`.
pub struct HttpAnalysisSink {
    client: Client,
    endpoint: String,
}

impl HttpAnalysisSink {
    /// Creates a client for the analysis service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let endpoint = format!("{}/analyze", base_url.trim_end_matches('/'));
        url::Url::parse(&endpoint)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| HarvestError::Config("HTTP client could not be built".into()))?;
        Ok(Self { client, endpoint })
    }

    /// Returns the submission endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisSink for HttpAnalysisSink {
    async fn submit(&self, batch: &BatchSubmission) -> Result<SinkAck> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(batch)
            .send()
            .await
            .map_err(|_| HarvestError::DispatchFailed)?;

        let status = response.status();
        if !status.is_success() {
            debug!("Analysis sink answered HTTP {}", status.as_u16());
            return Err(HarvestError::DispatchFailed);
        }

        // Any 2xx is an acknowledgement, even without a readable summary.
        Ok(response.json::<SinkAck>().await.unwrap_or_default())
    }
}
