//! Observation and manual control of a running poll loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::time::timeout;

use crate::poll::{LoopState, LoopStatus};
use crate::source::{QuerySource, SourceHealth};
use crate::transport::Transport;

/// Health summary of the engine.
///
/// Only generic failure classes are exposed, never error text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// `ok`, `degraded` (proxy unreachable) or `failed` (fatal stop).
    pub status: &'static str,
    pub state: LoopState,
    pub proxy_reachable: bool,
    pub proxy: String,
    pub last_poll: Option<DateTime<Utc>>,
    pub queries_served: u64,
    pub exhausted: bool,
    pub failure: Option<String>,
    pub cycles: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_source: Option<SourceHealth>,
}

/// Longest a health check waits for the query source.
const SOURCE_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle onto a [`PollLoop`](crate::PollLoop).
#[derive(Clone)]
pub struct LoopHandle {
    status: watch::Receiver<LoopStatus>,
    trigger: Arc<Notify>,
    transport: Arc<dyn Transport>,
    source: Arc<dyn QuerySource>,
    proxy: String,
    source_timeout: Duration,
}

impl LoopHandle {
    pub(crate) fn new(
        status: watch::Receiver<LoopStatus>,
        trigger: Arc<Notify>,
        transport: Arc<dyn Transport>,
        source: Arc<dyn QuerySource>,
        proxy: String,
    ) -> Self {
        Self {
            status,
            trigger,
            transport,
            source,
            proxy,
            source_timeout: SOURCE_HEALTH_TIMEOUT,
        }
    }

    /// Sets how long a health check waits for the query source.
    pub fn with_source_timeout(mut self, source_timeout: Duration) -> Self {
        self.source_timeout = source_timeout;
        self
    }

    /// Latest published status.
    pub fn status(&self) -> LoopStatus {
        self.status.borrow().clone()
    }

    /// Asks the loop to start a cycle now instead of waiting for the poll
    /// interval. Returns `false` when the loop is in a terminal state.
    ///
    /// A trigger sent while a cycle is running starts another one right
    /// after it.
    pub fn trigger(&self) -> bool {
        if self.status.borrow().state.is_terminal() {
            return false;
        }
        self.trigger.notify_one();
        true
    }

    /// Probes the proxy and the query source and summarizes the loop.
    ///
    /// A query source slower than the source timeout is left out of the
    /// report.
    pub async fn health(&self) -> HealthReport {
        let status = self.status();
        let (proxy_reachable, query_source) = tokio::join!(
            self.transport.probe_proxy(),
            timeout(self.source_timeout, self.source.health())
        );
        let query_source = query_source.ok().flatten();

        let summary = if status.state == LoopState::Fatal {
            "failed"
        } else if !proxy_reachable {
            "degraded"
        } else {
            "ok"
        };

        HealthReport {
            status: summary,
            state: status.state,
            proxy_reachable,
            proxy: self.proxy.clone(),
            last_poll: status.poll.last_poll,
            queries_served: status.poll.queries_served,
            exhausted: status.poll.exhausted,
            failure: status.failure,
            cycles: status.cycles,
            query_source,
        }
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("state", &self.status.borrow().state)
            .field("proxy", &self.proxy)
            .finish()
    }
}
