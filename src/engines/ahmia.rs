//! Ahmia onion search engine.

use url::Url;

use super::links::{anchor_hrefs, collect_links};
use super::template::render_template;
use crate::engine::{EngineRequest, EngineSpec};
use crate::result::host_of;
use crate::{Engine, EngineConfig, Result, SearchQuery};

/// Ahmia wraps every result in a `/search/redirect?...&redirect_url=` link.
pub struct Ahmia {
    config: EngineConfig,
    url_template: String,
    host: Option<String>,
}

impl Ahmia {
    /// Creates the adapter from a registry row.
    pub fn from_spec(spec: &EngineSpec, default_timeout: u64) -> Self {
        Self {
            config: EngineConfig {
                name: spec.name.clone(),
                shortcut: spec.shortcut.clone(),
                timeout: spec.timeout.unwrap_or(default_timeout),
                enabled: spec.enabled,
            },
            url_template: spec.url_template.clone(),
            host: host_of(&spec.url_template.replace("{query}", "")),
        }
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

impl Engine for Ahmia {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn build_request(&self, query: &SearchQuery) -> Result<EngineRequest> {
        render_template(&self.url_template, query).map(EngineRequest::get)
    }

    fn extract_links(&self, body: &str) -> Vec<String> {
        let targets: Vec<String> = anchor_hrefs(body)
            .into_iter()
            .map(|href| extract_redirect_url(&href).unwrap_or(href))
            .collect();
        collect_links(targets.iter().map(String::as_str), self.host.as_deref())
    }
}

fn extract_redirect_url(href: &str) -> Option<String> {
    if !href.contains("redirect_url=") {
        return None;
    }
    let base = Url::parse("http://ahmia.invalid/").ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "redirect_url")
        .map(|(_, value)| value.into_owned())
}
