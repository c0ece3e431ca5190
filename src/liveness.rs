//! Liveness prefilter.
//!
//! A cheap `HEAD` through the transport decides whether a URL is worth a
//! full fetch. Most hidden services in a search index are gone, so this
//! check keeps the expensive fetch slots for targets that answer.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::limit::WorkerLimit;
use crate::transport::{Method, Transport};
use crate::{DiscoveredUrl, HarvestError, LivenessResult, Result};

/// Live and dead URLs of one prefilter pass.
#[derive(Debug, Default)]
pub struct LivenessOutcome {
    /// Live URLs, in discovery order.
    pub live: Vec<DiscoveredUrl>,
    /// Verdicts for dead URLs.
    pub dead: Vec<LivenessResult>,
}

/// Existence probe for discovered URLs.
pub struct LivenessProbe {
    transport: Arc<dyn Transport>,
    limit: WorkerLimit,
    timeout: Duration,
}

impl LivenessProbe {
    pub fn new(transport: Arc<dyn Transport>, limit: WorkerLimit, timeout: Duration) -> Self {
        Self {
            transport,
            limit,
            timeout,
        }
    }

    /// Returns whether `url` answers a `HEAD` with a success status.
    ///
    /// Timeouts, error statuses and connection failures all mean dead; only
    /// [`HarvestError::ProxyUnavailable`] is returned as an error.
    pub async fn check(&self, url: &str) -> Result<bool> {
        match self.transport.fetch(Method::HEAD, url, self.timeout).await {
            Ok(_) => Ok(true),
            Err(HarvestError::ProxyUnavailable) => Err(HarvestError::ProxyUnavailable),
            Err(err) => {
                debug!("Dead link {} ({})", url, err.class());
                Ok(false)
            }
        }
    }

    async fn check_limited(&self, url: &str) -> Result<bool> {
        let _permit = self.limit.acquire().await?;
        self.check(url).await
    }

    /// Probes every URL in parallel under the worker limit.
    pub async fn filter(&self, urls: Vec<DiscoveredUrl>) -> Result<LivenessOutcome> {
        let verdicts = join_all(urls.iter().map(|u| self.check_limited(&u.url))).await;

        let mut outcome = LivenessOutcome::default();
        for (url, verdict) in urls.into_iter().zip(verdicts) {
            match verdict {
                Ok(true) => outcome.live.push(url),
                Ok(false) => outcome.dead.push(LivenessResult::new(url.url, false)),
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => outcome.dead.push(LivenessResult::new(url.url, false)),
            }
        }

        info!(
            "Liveness: {} live, {} dead",
            outcome.live.len(),
            outcome.dead.len()
        );
        Ok(outcome)
    }
}
