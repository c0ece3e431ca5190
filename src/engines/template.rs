//! Engines driven by a search URL template.

use url::Url;

use super::links::extract_onion_links;
use crate::engine::{EngineRequest, EngineSpec};
use crate::result::host_of;
use crate::{Engine, EngineConfig, HarvestError, Result, SearchQuery};

/// Placeholder replaced by the encoded query terms.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Fills `template` with the form-encoded query.
pub(crate) fn render_template(template: &str, query: &SearchQuery) -> Result<String> {
    if query.is_blank() {
        return Err(HarvestError::InvalidQuery("empty query".to_string()));
    }
    let url = template.replace(QUERY_PLACEHOLDER, &query.encoded());
    Url::parse(&url)?;
    Ok(url)
}

/// An onion search engine described by a URL template.
///
/// Templates without a `{query}` placeholder are index pages; they are
/// fetched as-is and mined for links.
pub struct TemplateEngine {
    config: EngineConfig,
    url_template: String,
    host: Option<String>,
}

impl TemplateEngine {
    /// Creates an engine from its configuration and template.
    pub fn new(config: EngineConfig, url_template: impl Into<String>) -> Self {
        let url_template = url_template.into();
        let host = host_of(&url_template.replace(QUERY_PLACEHOLDER, ""));
        Self {
            config,
            url_template,
            host,
        }
    }

    /// Creates an engine from a registry row.
    pub fn from_spec(spec: &EngineSpec, default_timeout: u64) -> Self {
        Self::new(
            EngineConfig {
                name: spec.name.clone(),
                shortcut: spec.shortcut.clone(),
                timeout: spec.timeout.unwrap_or(default_timeout),
                enabled: spec.enabled,
            },
            spec.url_template.clone(),
        )
    }

    /// Returns the URL template.
    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    /// Returns the engine's own host.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl Engine for TemplateEngine {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn build_request(&self, query: &SearchQuery) -> Result<EngineRequest> {
        render_template(&self.url_template, query).map(EngineRequest::get)
    }

    fn extract_links(&self, body: &str) -> Vec<String> {
        extract_onion_links(body, self.host())
    }
}
