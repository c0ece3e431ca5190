//! Discovered URLs, liveness verdicts and scraped pages.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Normalizes a URL for deduplication.
///
/// Only absolute `http`/`https` URLs with a host are accepted. Scheme and
/// host are lowercased, the fragment is dropped and trailing slashes are
/// trimmed.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);
    let normalized = url.as_str().trim_end_matches('/').to_string();
    Some(normalized)
}

/// Host of a URL, if it parses.
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw).ok()?.host_str().map(str::to_lowercase)
}

/// A URL reported by a search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    /// Normalized URL.
    pub url: String,
    /// First engine, in registry order, that reported the URL.
    pub engine: String,
    /// When the URL was merged into the result set.
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredUrl {
    /// Creates a discovered URL stamped with the current time.
    pub fn new(url: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            engine: engine.into(),
            discovered_at: Utc::now(),
        }
    }
}

/// Ordered set of discovered URLs, unique by normalized URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveredUrls {
    urls: Vec<DiscoveredUrl>,
    #[serde(skip)]
    seen: HashSet<String>,
    /// Engines that failed during the search.
    pub failed_engines: Vec<String>,
    /// Search duration in milliseconds.
    pub duration_ms: u64,
}

impl DiscoveredUrls {
    /// Creates a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a URL unless its normalized form is already present.
    ///
    /// Returns `true` when the URL was added.
    pub fn insert(&mut self, url: DiscoveredUrl) -> bool {
        if self.seen.insert(url.url.clone()) {
            self.urls.push(url);
            true
        } else {
            false
        }
    }

    /// Returns whether the normalized URL is present.
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Returns the URLs in merge order.
    pub fn items(&self) -> &[DiscoveredUrl] {
        &self.urls
    }

    /// Consumes the set and returns the URLs in merge order.
    pub fn into_vec(self) -> Vec<DiscoveredUrl> {
        self.urls
    }

    /// Number of URLs.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Records an engine failure.
    pub fn add_failed_engine(&mut self, engine: impl Into<String>) {
        self.failed_engines.push(engine.into());
    }

    /// Sets the search duration.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }
}

/// Outcome of a liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResult {
    pub url: String,
    pub alive: bool,
    pub checked_at: DateTime<Utc>,
}

impl LivenessResult {
    /// Creates a verdict stamped with the current time.
    pub fn new(url: impl Into<String>, alive: bool) -> Self {
        Self {
            url: url.into(),
            alive,
            checked_at: Utc::now(),
        }
    }
}

/// A fully fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// Page URL.
    pub url: String,
    /// Visible text with non-content markup removed.
    pub text: String,
    /// Raw response payload.
    pub raw: String,
    /// Engine that discovered the URL.
    pub engine: String,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

impl ScrapedPage {
    /// Creates a page stamped with the current time.
    pub fn new(
        url: impl Into<String>,
        text: impl Into<String>,
        raw: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            raw: raw.into(),
            engine: engine.into(),
            fetched_at: Utc::now(),
        }
    }
}
