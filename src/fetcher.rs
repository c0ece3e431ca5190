//! Content fetcher for live URLs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use scraper::{Html, Node};
use tracing::{debug, info, warn};

use crate::limit::WorkerLimit;
use crate::retry::RetryPolicy;
use crate::transport::{fetch_with_retry, Method, Transport};
use crate::{DiscoveredUrl, HarvestError, Result, ScrapedPage};

/// Elements whose text never reaches the extracted content.
pub const STRIPPED_ELEMENTS: [&str; 10] = [
    "script", "style", "noscript", "nav", "header", "footer", "form", "iframe", "svg", "template",
];

/// Trait for fetching the full content of a discovered URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches and extracts the page behind `target`.
    async fn fetch(&self, target: &DiscoveredUrl) -> Result<ScrapedPage>;
}

/// Returns the visible text of an HTML document.
///
/// Text inside [`STRIPPED_ELEMENTS`] is dropped and whitespace runs are
/// collapsed to single spaces.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut words: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let stripped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| STRIPPED_ELEMENTS.contains(&el.name()))
        });
        if !stripped {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

/// [`PageFetcher`] issuing `GET` requests through the transport.
///
/// Its retry policy is the only one applied: at most `max_retries + 1`
/// attempts of `timeout` each.
pub struct OnionFetcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OnionFetcher {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            transport,
            timeout,
            retry,
        }
    }
}

#[async_trait]
impl PageFetcher for OnionFetcher {
    async fn fetch(&self, target: &DiscoveredUrl) -> Result<ScrapedPage> {
        let response = match fetch_with_retry(
            self.transport.as_ref(),
            Method::GET,
            &target.url,
            self.timeout,
            &self.retry,
        )
        .await
        {
            Ok(response) => response,
            Err(HarvestError::RequestTimeout) => return Err(HarvestError::FetchTimeout),
            Err(err) => return Err(err),
        };

        let text = extract_text(&response.body);
        debug!("Fetched {} ({} chars)", target.url, response.body.len());
        Ok(ScrapedPage::new(
            target.url.as_str(),
            text,
            response.body,
            target.engine.as_str(),
        ))
    }
}

/// Result of fetching a set of live URLs.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Pages in discovery order.
    pub pages: Vec<ScrapedPage>,
    /// URLs that were dropped, with the reason.
    pub failures: Vec<(String, HarvestError)>,
    /// Set when the proxy died while fetching.
    pub fatal: Option<HarvestError>,
}

/// Fetches every URL in parallel under the worker limit.
///
/// Pages fetched before a fatal error are still returned so the caller can
/// flush them.
pub async fn fetch_all(
    fetcher: &dyn PageFetcher,
    limit: &WorkerLimit,
    urls: &[DiscoveredUrl],
) -> FetchOutcome {
    let fetches = urls.iter().map(|url| async move {
        let _permit = limit.acquire().await?;
        fetcher.fetch(url).await
    });
    let results = join_all(fetches).await;

    let mut outcome = FetchOutcome::default();
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(page) => outcome.pages.push(page),
            Err(err) if err.is_fatal() => {
                outcome.fatal.get_or_insert(err);
            }
            Err(err) => {
                warn!("Dropping {}: {}", url.url, err.class());
                outcome.failures.push((url.url.clone(), err));
            }
        }
    }

    info!(
        "Fetched {}/{} pages",
        outcome.pages.len(),
        urls.len()
    );
    outcome
}
