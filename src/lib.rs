//! # onion-harvest
//!
//! A crawl and dispatch engine for onion services.
//!
//! The engine pulls search queries from a query source, fans each query out
//! to a registry of onion search engines, drops dead links with a cheap
//! liveness probe, fetches the surviving pages and forwards them in bounded
//! batches to an analysis sink. Every request goes through a local SOCKS
//! proxy on its own circuit:
//!
//! - Per-request circuit isolation via unique proxy credentials
//! - Concurrent engine fan-out with per-engine timeouts
//! - Run-wide URL deduplication
//! - Best-effort batched delivery with bounded retries
//! - Deterministic stop on source exhaustion or proxy loss
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use onion_harvest::{
//!     HarvestConfig, HttpAnalysisSink, HttpQuerySource, PollLoop, TorTransport,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarvestConfig::default();
//!     let transport = Arc::new(TorTransport::from_config(&config));
//!     let source = Arc::new(HttpQuerySource::new(
//!         &config.query_service_url,
//!         config.service_timeout(),
//!     )?);
//!     let sink = Arc::new(HttpAnalysisSink::new(
//!         &config.analysis_service_url,
//!         config.service_timeout(),
//!     )?);
//!
//!     let status = PollLoop::new(config, transport, source, sink)?
//!         .run(CancellationToken::new())
//!         .await;
//!     println!("stopped in state {}", status.state);
//!     Ok(())
//! }
//! ```

mod aggregator;
mod circuit;
mod config;
mod engine;
mod error;
mod query;
mod result;
mod retry;
mod search;

pub mod control;
pub mod dispatcher;
pub mod engines;
pub mod fetcher;
pub mod limit;
pub mod liveness;
pub mod poll;
pub mod server;
pub mod sink;
pub mod source;
pub mod transport;

pub use aggregator::{Aggregator, EngineLinks};
pub use circuit::{CircuitIdentity, CircuitIdentityGenerator};
pub use config::HarvestConfig;
pub use control::{HealthReport, LoopHandle};
pub use dispatcher::{Batch, DispatchStats, Dispatcher};
pub use engine::{Engine, EngineConfig, EngineKind, EngineRequest, EngineSpec};
pub use engines::EngineRegistry;
pub use error::{HarvestError, Result};
pub use fetcher::{OnionFetcher, PageFetcher};
pub use limit::WorkerLimit;
pub use liveness::{LivenessOutcome, LivenessProbe};
pub use poll::{CycleReport, LoopState, LoopStatus, PollLoop, PollState};
pub use query::SearchQuery;
pub use result::{normalize_url, DiscoveredUrl, DiscoveredUrls, LivenessResult, ScrapedPage};
pub use retry::RetryPolicy;
pub use search::Search;
pub use sink::{AnalysisSink, BatchSubmission, HttpAnalysisSink, PageSubmission, SinkAck};
pub use source::{HttpQuerySource, QueryBatch, QuerySource, SourceHealth};
pub use transport::{fetch_with_retry, ProxyConfig, TorTransport, Transport, TransportResponse};
