//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use onion_harvest::transport::Method;
use onion_harvest::{
    AnalysisSink, BatchSubmission, Engine, EngineConfig, EngineRequest, HarvestConfig,
    HarvestError, QueryBatch, QuerySource, Result, SearchQuery, SinkAck, Transport,
    TransportResponse,
};

/// Canned transport answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Timeout,
    ProxyDown,
    /// Never answers.
    Hang,
}

/// Transport answering from a routing table. HEAD falls back to the GET
/// route; unknown URLs fail to connect.
#[derive(Default)]
pub struct FakeTransport {
    get: HashMap<String, Reply>,
    head: HashMap<String, Reply>,
    proxy_down: AtomicBool,
    calls: Mutex<Vec<(Method, String)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(mut self, url: &str, reply: Reply) -> Self {
        self.get.insert(url.to_string(), reply);
        self
    }

    pub fn head(mut self, url: &str, reply: Reply) -> Self {
        self.head.insert(url.to_string(), reply);
        self
    }

    /// Serves `body` for `url` under both methods.
    pub fn page(self, url: &str, body: &str) -> Self {
        self.get(url, Reply::Body(body.to_string()))
    }

    pub fn calls(&self, method: &Method, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, u)| m == method && u == url)
            .count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, method: Method, url: &str, _: Duration) -> Result<TransportResponse> {
        self.calls.lock().unwrap().push((method.clone(), url.to_string()));
        let reply = if method == Method::HEAD {
            self.head.get(url).or_else(|| self.get.get(url))
        } else {
            self.get.get(url)
        };
        match reply.cloned() {
            Some(Reply::Body(body)) => Ok(TransportResponse::ok(body)),
            Some(Reply::Timeout) => Err(HarvestError::RequestTimeout),
            Some(Reply::ProxyDown) => {
                self.proxy_down.store(true, Ordering::SeqCst);
                Err(HarvestError::ProxyUnavailable)
            }
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(HarvestError::ConnectionFailed),
        }
    }

    async fn probe_proxy(&self) -> bool {
        !self.proxy_down.load(Ordering::SeqCst)
    }
}

/// Engine that requests `http://{shortcut}.onion/?q=...` and treats every
/// line of the body as a result link.
pub struct LineEngine {
    config: EngineConfig,
}

impl LineEngine {
    pub fn new(name: &str) -> Self {
        Self {
            config: EngineConfig {
                name: name.to_string(),
                shortcut: name.to_lowercase(),
                timeout: 5,
                enabled: true,
            },
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        format!(
            "http://{}.onion/?q={}",
            self.config.shortcut,
            SearchQuery::new(query).encoded()
        )
    }
}

impl Engine for LineEngine {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn build_request(&self, query: &SearchQuery) -> Result<EngineRequest> {
        Ok(EngineRequest::get(self.search_url(&query.text)))
    }

    fn extract_links(&self, body: &str) -> Vec<String> {
        body.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Query source replaying a script, then serving empty batches.
pub struct ScriptedSource {
    batches: Mutex<VecDeque<QueryBatch>>,
    pulls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(batches: Vec<QueryBatch>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            pulls: AtomicUsize::new(0),
        }
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuerySource for ScriptedSource {
    async fn next_batch(&self) -> Result<QueryBatch> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Sink acknowledging and recording every batch.
#[derive(Default)]
pub struct CollectingSink {
    batches: Mutex<Vec<BatchSubmission>>,
}

impl CollectingSink {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.pages.len())
            .collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|batch| batch.pages.iter().map(|page| page.url.clone()))
            .collect()
    }
}

#[async_trait]
impl AnalysisSink for CollectingSink {
    async fn submit(&self, batch: &BatchSubmission) -> Result<SinkAck> {
        self.batches.lock().unwrap().push(batch.clone());
        Ok(SinkAck {
            total: batch.pages.len(),
            relevant_count: 0,
        })
    }
}

pub fn batch(queries: &[&str], exhausted: bool) -> QueryBatch {
    QueryBatch {
        queries: queries.iter().map(|q| q.to_string()).collect(),
        remaining: None,
        exhausted,
    }
}

/// Fast configuration for in-memory runs.
pub fn config(batch_size: usize) -> HarvestConfig {
    HarvestConfig {
        batch_size,
        max_workers: 4,
        retry_backoff_ms: 1,
        fetch_retries: 0,
        dispatch_retries: 0,
        poll_interval_secs: 3600,
        grace_period_secs: 1,
        ..Default::default()
    }
}
