//! Search engine trait and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::Method;
use crate::{Result, SearchQuery};

/// Configuration for a search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Display name of the engine.
    pub name: String,
    /// Short identifier (e.g., "ahmia").
    pub shortcut: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Whether the engine is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout() -> u64 {
    40
}

fn default_enabled() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shortcut: String::new(),
            timeout: 40,
            enabled: true,
        }
    }
}

/// Adapter family used to build an engine from its table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// URL template plus generic onion link extraction.
    #[default]
    Template,
    /// Ahmia, whose result links go through a redirect endpoint.
    Ahmia,
}

/// One row of the engine table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpec {
    /// Display name of the engine.
    pub name: String,
    /// Short identifier.
    pub shortcut: String,
    /// Search URL with a `{query}` placeholder.
    pub url_template: String,
    /// Adapter family.
    #[serde(default)]
    pub kind: EngineKind,
    /// Whether the engine is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Timeout override in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl EngineSpec {
    /// Creates an enabled template engine row.
    pub fn new(
        name: impl Into<String>,
        shortcut: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            shortcut: shortcut.into(),
            url_template: url_template.into(),
            kind: EngineKind::Template,
            enabled: true,
            timeout: None,
        }
    }

    /// Sets the adapter family.
    pub fn with_kind(mut self, kind: EngineKind) -> Self {
        self.kind = kind;
        self
    }
}

/// An engine-specific request derived from a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub method: Method,
    pub url: String,
}

impl EngineRequest {
    /// A GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
        }
    }
}

/// Trait for implementing search engine adapters.
///
/// Adapters never perform I/O: the scheduler sends the request they build
/// through the transport and hands the body back for link extraction.
/// Extraction fails closed, returning an empty list for anything it does not
/// recognize.
pub trait Engine: Send + Sync {
    /// Returns the engine configuration.
    fn config(&self) -> &EngineConfig;

    /// Maps a query onto the engine's search request.
    fn build_request(&self, query: &SearchQuery) -> Result<EngineRequest>;

    /// Extracts result links from a response body.
    fn extract_links(&self, body: &str) -> Vec<String>;

    /// Returns the engine name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Returns the engine shortcut.
    fn shortcut(&self) -> &str {
        &self.config().shortcut
    }

    /// Returns the request timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config().timeout)
    }

    /// Returns whether the engine is enabled.
    fn is_enabled(&self) -> bool {
        self.config().enabled
    }
}
