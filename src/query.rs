//! Search query representation.

use serde::{Deserialize, Serialize};

/// A query handed out by the query source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search terms.
    pub text: String,
    /// Detailed match strings (company names, domains, ...) for the sink.
    #[serde(default)]
    pub match_strings: Vec<String>,
}

impl SearchQuery {
    /// Creates a new search query with the given terms.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            match_strings: Vec::new(),
        }
    }

    /// Sets the detailed match strings.
    pub fn with_match_strings(mut self, match_strings: Vec<String>) -> Self {
        self.match_strings = match_strings;
        self
    }

    /// Returns whether the query has no searchable terms.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Form-encoded terms (`+` for spaces), as search forms expect.
    pub fn encoded(&self) -> String {
        url::form_urlencoded::byte_serialize(self.text.trim().as_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_new() {
        let query = SearchQuery::new("acme leak");
        assert_eq!(query.text, "acme leak");
        assert!(query.match_strings.is_empty());
    }

    #[test]
    fn test_search_query_with_match_strings() {
        let query = SearchQuery::new("acme")
            .with_match_strings(vec!["acme.com".to_string(), "@acme.com".to_string()]);
        assert_eq!(query.match_strings.len(), 2);
    }

    #[test]
    fn test_search_query_is_blank() {
        assert!(SearchQuery::new("   ").is_blank());
        assert!(SearchQuery::new("\t\n").is_blank());
        assert!(!SearchQuery::new("x").is_blank());
    }

    #[test]
    fn test_search_query_encoded() {
        assert_eq!(SearchQuery::new("acme corp").encoded(), "acme+corp");
        assert_eq!(SearchQuery::new(" a&b ").encoded(), "a%26b");
    }

    #[test]
    fn test_search_query_deserialization() {
        let query: SearchQuery = serde_json::from_str(r#"{"text":"acme"}"#).unwrap();
        assert_eq!(query, SearchQuery::new("acme"));
    }
}
