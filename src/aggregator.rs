//! Merging of per-engine link lists.

use tracing::debug;

use crate::result::{normalize_url, DiscoveredUrl, DiscoveredUrls};

/// Links returned by one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLinks {
    /// Position of the engine in the registry.
    pub position: usize,
    /// Engine name.
    pub engine: String,
    /// Links as extracted.
    pub links: Vec<String>,
}

impl EngineLinks {
    pub fn new(position: usize, engine: impl Into<String>, links: Vec<String>) -> Self {
        Self {
            position,
            engine: engine.into(),
            links,
        }
    }
}

/// Merges the link lists of every engine into one deduplicated set.
#[derive(Debug, Default)]
pub struct Aggregator;

impl Aggregator {
    /// Creates a new aggregator.
    pub fn new() -> Self {
        Self
    }

    /// Aggregates results from multiple engines.
    ///
    /// Lists are merged in registry order whatever order they completed in,
    /// so the first engine in the registry to report a URL is its source.
    /// Links that do not normalize are dropped.
    pub fn aggregate(&self, mut engine_links: Vec<EngineLinks>) -> DiscoveredUrls {
        engine_links.sort_by_key(|e| e.position);

        let mut merged = DiscoveredUrls::new();
        for EngineLinks { engine, links, .. } in engine_links {
            let mut added = 0;
            for link in links {
                let Some(url) = normalize_url(&link) else {
                    continue;
                };
                if merged.insert(DiscoveredUrl::new(url, engine.as_str())) {
                    added += 1;
                }
            }
            debug!("Engine {} contributed {} new URLs", engine, added);
        }
        merged
    }
}
