//! Poll loop.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//!            tick                 batch pulled
//!   Idle ───────────▶ Polling ─────────────────▶ Dispatching ──▶ Idle
//!                        │ source error              │
//!                        └──────────▶ Idle           ├─ exhausted flag ─▶ Exhausted
//!                                                    └─ proxy down ─────▶ Fatal
//! ```
//!
//! `Exhausted` and `Fatal` are terminal: no query is ever pulled again. The
//! dispatcher is flushed after every query, so no path out of `Dispatching`
//! leaves pages buffered.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::control::LoopHandle;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::engines::EngineRegistry;
use crate::fetcher::{fetch_all, OnionFetcher, PageFetcher};
use crate::limit::WorkerLimit;
use crate::liveness::LivenessProbe;
use crate::sink::AnalysisSink;
use crate::source::QuerySource;
use crate::transport::Transport;
use crate::{HarvestConfig, HarvestError, Result, Search, SearchQuery};

/// Lifecycle state of the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Idle,
    Polling,
    Dispatching,
    Exhausted,
    Fatal,
}

impl LoopState {
    /// Returns `true` for states the loop never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Fatal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Dispatching => "dispatching",
            Self::Exhausted => "exhausted",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polling bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollState {
    pub last_poll: Option<DateTime<Utc>>,
    /// Monotonic: once set it is never cleared.
    pub exhausted: bool,
    pub queries_served: u64,
}

/// Counters of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub queries: usize,
    pub discovered: usize,
    /// URLs skipped because an earlier query already handled them.
    pub already_seen: usize,
    /// URLs left out by the per-query scrape limit.
    pub over_limit: usize,
    pub dead: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub dispatch: DispatchStats,
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatus {
    pub state: LoopState,
    pub poll: PollState,
    /// Generic failure class that put the loop in `Fatal`.
    pub failure: Option<String>,
    pub cycles: u64,
    pub seen_urls: usize,
    pub last_cycle: Option<CycleReport>,
}

/// Drives query pulls and fetch cycles until the source is exhausted or the
/// proxy dies.
pub struct PollLoop {
    config: HarvestConfig,
    transport: Arc<dyn Transport>,
    source: Arc<dyn QuerySource>,
    search: Search,
    liveness: LivenessProbe,
    fetcher: Arc<dyn PageFetcher>,
    limit: WorkerLimit,
    dispatcher: Dispatcher,
    seen: HashSet<String>,
    state: LoopState,
    poll: PollState,
    failure: Option<String>,
    cycles: u64,
    last_cycle: Option<CycleReport>,
    status_tx: watch::Sender<LoopStatus>,
    trigger: Arc<Notify>,
}

impl PollLoop {
    /// Wires every component from one configuration.
    pub fn new(
        config: HarvestConfig,
        transport: Arc<dyn Transport>,
        source: Arc<dyn QuerySource>,
        sink: Arc<dyn AnalysisSink>,
    ) -> Result<Self> {
        config.validate()?;

        let limit = WorkerLimit::new(config.max_workers);
        let search = Search::new(
            EngineRegistry::from_config(&config),
            Arc::clone(&transport),
            limit.clone(),
        )
        .with_retry(config.transport_retry());
        let liveness = LivenessProbe::new(
            Arc::clone(&transport),
            limit.clone(),
            config.liveness_timeout(),
        );
        let fetcher = Arc::new(OnionFetcher::new(
            Arc::clone(&transport),
            config.fetch_timeout(),
            config.fetch_retry(),
        ));
        let dispatcher = Dispatcher::new(sink, config.batch_size, config.dispatch_retry());
        let (status_tx, _) = watch::channel(LoopStatus::default());

        Ok(Self {
            config,
            transport,
            source,
            search,
            liveness,
            fetcher,
            limit,
            dispatcher,
            seen: HashSet::new(),
            state: LoopState::Idle,
            poll: PollState::default(),
            failure: None,
            cycles: 0,
            last_cycle: None,
            status_tx,
            trigger: Arc::new(Notify::new()),
        })
    }

    /// Replaces the engine registry built from the configuration.
    pub fn with_registry(mut self, registry: EngineRegistry) -> Self {
        self.search = Search::new(registry, Arc::clone(&self.transport), self.limit.clone())
            .with_retry(self.config.transport_retry());
        self
    }

    /// Replaces the content fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn poll_state(&self) -> &PollState {
        &self.poll
    }

    /// Current status snapshot.
    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            state: self.state,
            poll: self.poll.clone(),
            failure: self.failure.clone(),
            cycles: self.cycles,
            seen_urls: self.seen.len(),
            last_cycle: self.last_cycle.clone(),
        }
    }

    /// Handle for observing and triggering the loop from other tasks.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle::new(
            self.status_tx.subscribe(),
            Arc::clone(&self.trigger),
            Arc::clone(&self.transport),
            Arc::clone(&self.source),
            self.config.proxy_address(),
        )
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            debug!("Poll loop {} -> {}", self.state, state);
            self.state = state;
        }
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }

    /// Pulls one batch and runs a fetch cycle per query, flushing the
    /// dispatcher after each.
    ///
    /// Does nothing once the loop is in a terminal state.
    pub async fn tick(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        if self.state.is_terminal() {
            debug!("Poll loop is {}, not pulling", self.state);
            return report;
        }

        self.set_state(LoopState::Polling);
        let batch = match self.source.next_batch().await {
            Ok(batch) => batch,
            Err(err) => {
                warn!("Query source unavailable: {}", err.class());
                self.set_state(LoopState::Idle);
                return report;
            }
        };
        self.poll.last_poll = Some(Utc::now());

        let queries = batch.search_queries();
        info!(
            "Pulled {} queries (remaining: {:?}, exhausted: {})",
            queries.len(),
            batch.remaining,
            batch.exhausted
        );

        if self.config.attach_search_strings && !queries.is_empty() {
            match self.source.search_strings().await {
                Ok(strings) if !strings.is_empty() => {
                    self.dispatcher.set_search_strings(Some(strings))
                }
                Ok(_) => self.dispatcher.set_search_strings(None),
                Err(err) => {
                    warn!("Could not load search strings: {}", err.class());
                    self.dispatcher.set_search_strings(None);
                }
            }
        }

        self.set_state(LoopState::Dispatching);
        let mut fatal = None;
        for query in &queries {
            self.poll.queries_served += 1;
            report.queries += 1;
            let outcome = self.process_query(query, &mut report).await;
            // Each query is its own fetch cycle; its partial batch never
            // mixes with the next query's pages.
            report.dispatch.merge(self.dispatcher.finish().await);
            if let Err(err) = outcome {
                fatal = Some(err);
                break;
            }
        }

        self.cycles += 1;
        self.last_cycle = Some(report.clone());

        if let Some(err) = fatal {
            self.enter_fatal(&err);
        } else if batch.exhausted {
            info!("Query source exhausted, stopping");
            self.poll.exhausted = true;
            self.set_state(LoopState::Exhausted);
        } else {
            self.set_state(LoopState::Idle);
        }

        info!(
            "Cycle {} done: {} queries, {} URLs, {} dead, {} fetched, {} pages sent, {} dropped",
            self.cycles,
            report.queries,
            report.discovered,
            report.dead,
            report.fetched,
            report.dispatch.pages_sent,
            report.dispatch.pages_dropped
        );
        report
    }

    async fn process_query(&mut self, query: &SearchQuery, report: &mut CycleReport) -> Result<()> {
        info!("Processing query '{}'", query.text);

        let discovered = match self.search.search(query).await {
            Ok(discovered) => discovered,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("Search for '{}' failed: {}", query.text, err.class());
                return Ok(());
            }
        };
        report.discovered += discovered.len();

        let mut fresh = Vec::new();
        for url in discovered.into_vec() {
            if self.seen.contains(&url.url) {
                report.already_seen += 1;
            } else if fresh.len() >= self.config.scrape_limit {
                report.over_limit += 1;
            } else {
                self.seen.insert(url.url.clone());
                fresh.push(url);
            }
        }
        if fresh.is_empty() {
            debug!("No new URLs for '{}'", query.text);
            return Ok(());
        }

        let liveness = self.liveness.filter(fresh).await?;
        report.dead += liveness.dead.len();

        let fetched = fetch_all(self.fetcher.as_ref(), &self.limit, &liveness.live).await;
        report.fetched += fetched.pages.len();
        report.fetch_failures += fetched.failures.len();

        for page in fetched.pages {
            self.dispatcher.offer(page).await;
        }

        match fetched.fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn enter_fatal(&mut self, err: &HarvestError) {
        error!("Fatal failure ({}), stopping the run", err.class());
        self.failure = Some(err.class().to_string());
        self.limit.close();
        self.set_state(LoopState::Fatal);
    }

    /// Runs cycles until the loop reaches a terminal state or `cancel` fires.
    ///
    /// The first cycle starts immediately; later ones follow every poll
    /// interval or a manual trigger. On cancellation the in-flight cycle gets
    /// the grace period to finish, then is abandoned and the buffered pages
    /// are flushed.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopStatus {
        info!(
            "Poll loop started (interval: {}s, engines: {})",
            self.config.poll_interval_secs,
            self.search.engine_count()
        );
        let grace = self.config.grace_period();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let completed = {
                let tick = self.tick();
                tokio::pin!(tick);
                tokio::select! {
                    _ = &mut tick => true,
                    _ = cancel.cancelled() => {
                        info!("Cancellation requested, waiting up to {:?} for the current cycle", grace);
                        timeout(grace, &mut tick).await.is_ok()
                    }
                }
            };

            if cancel.is_cancelled() {
                if !completed {
                    warn!("Abandoning the in-flight cycle");
                    let stats = self.dispatcher.finish().await;
                    debug!("Flushed {} pages on shutdown", stats.pages_sent);
                    if !self.state.is_terminal() {
                        self.set_state(LoopState::Idle);
                    }
                }
                break;
            }
            if self.state.is_terminal() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.config.poll_interval()) => {}
                _ = self.trigger.notified() => info!("Manual trigger"),
            }
        }

        info!("Poll loop stopped in state {}", self.state);
        self.publish();
        self.status()
    }
}
