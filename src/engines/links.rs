//! Onion link extraction shared by the engine adapters.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::result::{host_of, normalize_url};

static ONION_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[a-z0-9.]+\.onion[^\s"'<>]*"#)
        .expect("ONION_LINK: hardcoded regex is valid")
});

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("ANCHOR: hardcoded selector is valid"));

/// Returns every onion URL found in `href`.
pub fn onion_urls(href: &str) -> impl Iterator<Item = &str> {
    ONION_LINK.find_iter(href).map(|m| m.as_str())
}

/// Collects the `href` of every anchor in `html`, in document order.
pub fn anchor_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Filters raw candidate links into the normalized result list of an engine.
///
/// Keeps onion URLs only, drops engine self-references (links back to
/// `engine_host` and anything mentioning `search`) and duplicates.
pub fn collect_links<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    engine_host: Option<&str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for candidate in candidates {
        for raw in onion_urls(candidate) {
            if raw.to_ascii_lowercase().contains("search") {
                continue;
            }
            let Some(url) = normalize_url(raw) else {
                continue;
            };
            if engine_host.is_some() && host_of(&url).as_deref() == engine_host {
                continue;
            }
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }
    }

    links
}

/// Generic extraction: onion links from every anchor of the page.
pub fn extract_onion_links(html: &str, engine_host: Option<&str>) -> Vec<String> {
    let hrefs = anchor_hrefs(html);
    collect_links(hrefs.iter().map(String::as_str), engine_host)
}
