//! Error types for the harvest engine.
//!
//! Every message rendered by [`HarvestError`] is generic: library error text,
//! local paths and upstream payloads are classified away before an error is
//! constructed, so an error can be logged or surfaced to any collaborator
//! as-is.

use thiserror::Error;

/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Errors that can occur while discovering, fetching and dispatching pages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarvestError {
    /// The local anonymizing proxy cannot be reached. Fatal to the run.
    #[error("Anonymizing proxy unavailable")]
    ProxyUnavailable,

    /// A single request exceeded its deadline.
    #[error("Request timed out")]
    RequestTimeout,

    /// The target answered with a non-success status.
    #[error("Upstream returned HTTP {status}")]
    Upstream { status: u16 },

    /// The proxy is up but the target could not be reached through it.
    #[error("Connection failed")]
    ConnectionFailed,

    /// A search engine produced no usable answer.
    #[error("Engine '{engine}' query failed")]
    EngineQueryFailed { engine: String },

    /// The liveness probe rejected the URL.
    #[error("Dead link")]
    DeadLink,

    /// A full fetch kept timing out after all retries.
    #[error("Fetch timed out after retries")]
    FetchTimeout,

    /// The analysis sink refused a batch.
    #[error("Batch dispatch failed")]
    DispatchFailed,

    /// A response did not have the expected shape.
    #[error("Malformed response")]
    MalformedResponse,

    /// The query source could not be reached.
    #[error("Query source unavailable")]
    QuerySource,

    /// A URL could not be built or parsed.
    #[error("Invalid URL")]
    InvalidUrl,

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// No engines configured.
    #[error("No search engines configured")]
    NoEngines,

    /// Work was refused because the run is shutting down.
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration rejected at startup.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HarvestError {
    /// Returns `true` when the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProxyUnavailable)
    }

    /// Returns `true` for errors a caller may retry locally.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout | Self::FetchTimeout)
    }

    /// Stable failure class used in logs and health reports.
    pub fn class(&self) -> &'static str {
        match self {
            Self::ProxyUnavailable => "proxy_unavailable",
            Self::RequestTimeout => "request_timeout",
            Self::Upstream { .. } => "upstream_error",
            Self::ConnectionFailed => "connection_failed",
            Self::EngineQueryFailed { .. } => "engine_query_failed",
            Self::DeadLink => "dead_link",
            Self::FetchTimeout => "fetch_timeout",
            Self::DispatchFailed => "dispatch_failed",
            Self::MalformedResponse => "malformed_response",
            Self::QuerySource => "query_source_unavailable",
            Self::InvalidUrl => "invalid_url",
            Self::InvalidQuery(_) => "invalid_query",
            Self::NoEngines => "no_engines",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "invalid_config",
        }
    }
}

impl From<url::ParseError> for HarvestError {
    fn from(_: url::ParseError) -> Self {
        Self::InvalidUrl
    }
}

impl From<reqwest::Error> for HarvestError {
    /// Collapses a client error into its failure class. The library message is
    /// dropped on purpose.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout
        } else if let Some(status) = err.status() {
            Self::Upstream {
                status: status.as_u16(),
            }
        } else if err.is_decode() || err.is_body() {
            Self::MalformedResponse
        } else if err.is_builder() {
            Self::InvalidUrl
        } else {
            Self::ConnectionFailed
        }
    }
}
