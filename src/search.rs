//! Search fan-out across the engine registry.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::aggregator::EngineLinks;
use crate::engines::EngineRegistry;
use crate::limit::WorkerLimit;
use crate::retry::RetryPolicy;
use crate::transport::{fetch_with_retry, Transport};
use crate::{Aggregator, DiscoveredUrls, Engine, HarvestError, Result, SearchQuery};

/// Runs one query against every enabled engine concurrently.
pub struct Search {
    registry: EngineRegistry,
    transport: Arc<dyn Transport>,
    limit: WorkerLimit,
    retry: RetryPolicy,
    aggregator: Aggregator,
}

impl Search {
    /// Creates a scheduler over `registry` that does not retry timeouts.
    pub fn new(registry: EngineRegistry, transport: Arc<dyn Transport>, limit: WorkerLimit) -> Self {
        Self {
            registry,
            transport,
            limit,
            retry: RetryPolicy::none(),
            aggregator: Aggregator::new(),
        }
    }

    /// Sets the timeout retry policy of engine requests.
    ///
    /// Each attempt gets the engine timeout; the engine as a whole gets
    /// [`RetryPolicy::budget`] of it.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the engine registry.
    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Returns the number of configured engines.
    pub fn engine_count(&self) -> usize {
        self.registry.len()
    }

    /// Performs a search across all enabled engines.
    ///
    /// Failing engines are logged and left out of the merged set, so a
    /// query whose engines all fail yields an empty set. Only
    /// [`HarvestError::ProxyUnavailable`] is returned as an error.
    pub async fn search(&self, query: &SearchQuery) -> Result<DiscoveredUrls> {
        if self.registry.is_empty() {
            return Err(HarvestError::NoEngines);
        }
        if query.is_blank() {
            return Err(HarvestError::InvalidQuery("Query cannot be empty".into()));
        }

        let start = Instant::now();
        let engines = self.registry.enabled();
        debug!("Searching {} engines for '{}'", engines.len(), query.text);

        let futures = engines
            .iter()
            .enumerate()
            .map(|(position, engine)| self.query_engine(position, engine.as_ref(), query));
        let outcomes = join_all(futures).await;

        let mut fatal = false;
        let mut failed = Vec::new();
        let mut answered = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(links) => answered.push(links),
                Err((engine, err)) => {
                    fatal |= err.is_fatal();
                    failed.push(engine);
                }
            }
        }
        if fatal {
            return Err(HarvestError::ProxyUnavailable);
        }

        let mut results = self.aggregator.aggregate(answered);
        for engine in failed {
            results.add_failed_engine(engine);
        }
        results.set_duration(start.elapsed().as_millis() as u64);

        info!(
            "Query '{}': {} unique URLs from {}/{} engines in {}ms",
            query.text,
            results.len(),
            engines.len() - results.failed_engines.len(),
            engines.len(),
            results.duration_ms
        );
        Ok(results)
    }

    async fn query_engine(
        &self,
        position: usize,
        engine: &dyn Engine,
        query: &SearchQuery,
    ) -> std::result::Result<EngineLinks, (String, HarvestError)> {
        let name = engine.name().to_string();
        let fail = |err: HarvestError| {
            if err.is_fatal() {
                warn!("Engine {} hit a dead proxy", name);
            } else {
                warn!("Engine {} failed: {}", name, err.class());
            }
            Err((name.clone(), err))
        };

        let request = match engine.build_request(query) {
            Ok(request) => request,
            Err(err) => return fail(err),
        };

        let _permit = match self.limit.acquire().await {
            Ok(permit) => permit,
            Err(err) => return fail(err),
        };

        let per_attempt = engine.timeout();
        let response = match timeout(
            self.retry.budget(per_attempt),
            fetch_with_retry(
                self.transport.as_ref(),
                request.method,
                &request.url,
                per_attempt,
                &self.retry,
            ),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return fail(err),
            Err(_) => return fail(HarvestError::RequestTimeout),
        };

        let links = engine.extract_links(&response.body);
        debug!("Engine {} returned {} links", name, links.len());
        Ok(EngineLinks::new(position, name.as_str(), links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineRequest;
    use crate::transport::mock::{MockTransport, Reply};
    use crate::transport::{Method, TransportResponse};
    use crate::EngineConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FirstAttemptTimesOut {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FirstAttemptTimesOut {
        async fn fetch(&self, _: Method, _: &str, timeout: Duration) -> Result<TransportResponse> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(timeout).await;
                return Err(HarvestError::RequestTimeout);
            }
            Ok(TransportResponse::ok("http://x.onion"))
        }
    }

    struct MockEngine {
        config: EngineConfig,
        url: String,
    }

    impl MockEngine {
        fn new(name: &str) -> Self {
            Self {
                config: EngineConfig {
                    name: name.to_string(),
                    shortcut: name.to_lowercase(),
                    ..Default::default()
                },
                url: format!("http://{}.onion/", name.to_lowercase()),
            }
        }

        fn with_timeout(mut self, secs: u64) -> Self {
            self.config.timeout = secs;
            self
        }

        fn disabled(mut self) -> Self {
            self.config.enabled = false;
            self
        }
    }

    impl Engine for MockEngine {
        fn config(&self) -> &EngineConfig {
            &self.config
        }

        fn build_request(&self, _query: &SearchQuery) -> Result<EngineRequest> {
            Ok(EngineRequest::get(self.url.clone()))
        }

        fn extract_links(&self, body: &str) -> Vec<String> {
            body.lines().map(str::to_string).collect()
        }
    }

    fn search(engines: Vec<MockEngine>, transport: MockTransport) -> Search {
        let mut registry = EngineRegistry::new();
        for engine in engines {
            registry.register(engine);
        }
        Search::new(registry, Arc::new(transport), WorkerLimit::new(3))
    }

    fn body(urls: &[&str]) -> Reply {
        Reply::Body(urls.join("\n"))
    }

    #[tokio::test]
    async fn test_search_no_engines() {
        let search = search(vec![], MockTransport::new());
        let result = search.search(&SearchQuery::new("test")).await;
        assert!(matches!(result, Err(HarvestError::NoEngines)));
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let search = search(vec![MockEngine::new("A")], MockTransport::new());
        let result = search.search(&SearchQuery::new("   ")).await;
        assert!(matches!(result, Err(HarvestError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_search_aggregates_results() {
        let transport = MockTransport::new()
            .route("http://a.onion/", body(&["http://x.onion", "http://y.onion/"]))
            .route("http://b.onion/", body(&["http://y.onion", "http://z.onion"]));
        let search = search(vec![MockEngine::new("A"), MockEngine::new("B")], transport);

        let results = search.search(&SearchQuery::new("test")).await.unwrap();
        let urls: Vec<_> = results.items().iter().map(|u| u.url.as_str()).collect();
        assert_eq!(urls, vec!["http://x.onion", "http://y.onion", "http://z.onion"]);
        assert_eq!(results.items()[1].engine, "A");
        assert!(results.failed_engines.is_empty());
    }

    #[tokio::test]
    async fn test_search_handles_engine_failure() {
        let transport = MockTransport::new()
            .route("http://a.onion/", body(&["http://x.onion"]))
            .route("http://b.onion/", Reply::Status(503));
        let search = search(vec![MockEngine::new("A"), MockEngine::new("B")], transport);

        let results = search.search(&SearchQuery::new("test")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.failed_engines, vec!["B"]);
    }

    #[tokio::test]
    async fn test_search_all_engines_fail() {
        let transport = MockTransport::new()
            .route("http://a.onion/", Reply::Timeout)
            .route("http://b.onion/", Reply::Status(500));
        let search = search(vec![MockEngine::new("A"), MockEngine::new("B")], transport);

        let results = search.search(&SearchQuery::new("test")).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(results.failed_engines.len(), 2);
    }

    #[tokio::test]
    async fn test_search_engine_timeout_is_isolated() {
        let transport = MockTransport::new()
            .route("http://a.onion/", body(&["http://x.onion"]))
            .route(
                "http://slow.onion/",
                Reply::Slow(Duration::from_secs(5), "http://late.onion".into()),
            );
        let search = search(
            vec![MockEngine::new("A"), MockEngine::new("Slow").with_timeout(1)],
            transport,
        );

        let results = search.search(&SearchQuery::new("test")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.failed_engines, vec!["Slow"]);
    }

    #[tokio::test]
    async fn test_search_retries_timeouts_within_budget() {
        let transport = Arc::new(MockTransport::new().route("http://a.onion/", Reply::Timeout));
        let mut registry = EngineRegistry::new();
        registry.register(MockEngine::new("A"));
        let search = Search::new(registry, transport.clone(), WorkerLimit::new(3))
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));

        let results = search.search(&SearchQuery::new("test")).await.unwrap();
        assert_eq!(results.failed_engines, vec!["A"]);
        assert_eq!(transport.count(&Method::GET, "http://a.onion/"), 3);
    }

    #[tokio::test]
    async fn test_search_retry_fits_outer_deadline() {
        // The first attempt uses its whole timeout; the retry must still run.
        let transport = Arc::new(FirstAttemptTimesOut::default());
        let mut registry = EngineRegistry::new();
        registry.register(MockEngine::new("A").with_timeout(1));
        let search = Search::new(registry, transport.clone(), WorkerLimit::new(3))
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1)));

        let results = search.search(&SearchQuery::new("test")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.failed_engines.is_empty());
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_proxy_unavailable_escapes() {
        let transport = MockTransport::new()
            .route("http://a.onion/", body(&["http://x.onion"]))
            .route("http://b.onion/", Reply::ProxyDown);
        let search = search(vec![MockEngine::new("A"), MockEngine::new("B")], transport);

        let result = search.search(&SearchQuery::new("test")).await;
        assert_eq!(result.unwrap_err(), HarvestError::ProxyUnavailable);
    }

    #[tokio::test]
    async fn test_search_filters_disabled_engines() {
        let transport = MockTransport::new()
            .route("http://a.onion/", body(&["http://x.onion"]))
            .route("http://b.onion/", body(&["http://y.onion"]));
        let search = search(
            vec![MockEngine::new("A"), MockEngine::new("B").disabled()],
            transport,
        );

        let results = search.search(&SearchQuery::new("test")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.items()[0].url, "http://x.onion");
    }

    #[tokio::test]
    async fn test_search_engine_count() {
        let search = search(vec![MockEngine::new("A"), MockEngine::new("B")], MockTransport::new());
        assert_eq!(search.engine_count(), 2);
        assert_eq!(search.registry().enabled().len(), 2);
    }
}
