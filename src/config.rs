//! Runtime configuration.
//!
//! A [`HarvestConfig`] is built once at startup and handed to every component
//! constructor. Every option has a default so a partial document (or an empty
//! environment) still yields a runnable configuration.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineSpec;
use crate::retry::RetryPolicy;
use crate::{HarvestError, Result};

/// Configuration for a harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Host of the local SOCKS proxy.
    #[serde(default = "default_proxy_host")]
    pub proxy_host: String,
    /// Port of the local SOCKS proxy.
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
    /// Concurrent network operations across search, liveness and fetch.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// How many engines of the registry to use, in registry order.
    #[serde(default = "default_num_engines")]
    pub num_engines: usize,
    /// Maximum number of new URLs promoted to liveness checks per query.
    #[serde(default = "default_scrape_limit")]
    pub scrape_limit: usize,
    /// Pages per batch sent to the analysis sink.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between two poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Base URL of the query source.
    #[serde(default = "default_query_service_url")]
    pub query_service_url: String,
    /// Base URL of the analysis sink.
    #[serde(default = "default_analysis_service_url")]
    pub analysis_service_url: String,
    /// Per-engine search timeout in seconds.
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
    /// Liveness probe timeout in seconds.
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,
    /// Full fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Timeout for calls to the query source and analysis sink.
    #[serde(default = "default_service_timeout_secs")]
    pub service_timeout_secs: u64,
    /// Retries of a timed-out engine search request.
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,
    /// Fetcher retries on request timeout.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    /// Dispatcher retries on sink failure.
    #[serde(default = "default_dispatch_retries")]
    pub dispatch_retries: u32,
    /// Base delay of every exponential backoff, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Time an in-flight query may keep running after cancellation.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Fetch detailed match strings once per cycle and attach them to batches.
    #[serde(default)]
    pub attach_search_strings: bool,
    /// Engine table; empty means the built-in registry.
    #[serde(default)]
    pub engines: Vec<EngineSpec>,
    /// Bind address of the control server.
    #[serde(default = "default_control_addr")]
    pub control_addr: String,
}

fn default_proxy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_proxy_port() -> u16 {
    9050
}

fn default_max_workers() -> usize {
    3
}

fn default_num_engines() -> usize {
    17
}

fn default_scrape_limit() -> usize {
    20
}

fn default_batch_size() -> usize {
    5
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_query_service_url() -> String {
    "http://query-generator:8001".to_string()
}

fn default_analysis_service_url() -> String {
    "http://ai-analysis:8000".to_string()
}

fn default_search_timeout_secs() -> u64 {
    40
}

fn default_liveness_timeout_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    45
}

fn default_service_timeout_secs() -> u64 {
    120
}

fn default_transport_retries() -> u32 {
    1
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_dispatch_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_grace_period_secs() -> u64 {
    30
}

fn default_control_addr() -> String {
    "0.0.0.0:8002".to_string()
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            proxy_host: default_proxy_host(),
            proxy_port: default_proxy_port(),
            max_workers: default_max_workers(),
            num_engines: default_num_engines(),
            scrape_limit: default_scrape_limit(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            query_service_url: default_query_service_url(),
            analysis_service_url: default_analysis_service_url(),
            search_timeout_secs: default_search_timeout_secs(),
            liveness_timeout_secs: default_liveness_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            service_timeout_secs: default_service_timeout_secs(),
            transport_retries: default_transport_retries(),
            fetch_retries: default_fetch_retries(),
            dispatch_retries: default_dispatch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            grace_period_secs: default_grace_period_secs(),
            attach_search_strings: false,
            engines: Vec::new(),
            control_addr: default_control_addr(),
        }
    }
}

impl HarvestConfig {
    /// Checks the invariants every component relies on.
    pub fn validate(&self) -> Result<()> {
        if self.proxy_host.trim().is_empty() {
            return Err(HarvestError::Config("proxy host is empty".into()));
        }
        if self.proxy_port == 0 {
            return Err(HarvestError::Config("proxy port must be non-zero".into()));
        }
        if self.max_workers == 0 {
            return Err(HarvestError::Config("max_workers must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(HarvestError::Config("batch_size must be at least 1".into()));
        }
        if self.scrape_limit == 0 {
            return Err(HarvestError::Config("scrape_limit must be at least 1".into()));
        }
        if self.num_engines == 0 {
            return Err(HarvestError::Config("num_engines must be at least 1".into()));
        }
        if self.control_addr.parse::<SocketAddr>().is_err() {
            return Err(HarvestError::Config("control_addr is not a socket address".into()));
        }
        for (name, value) in [
            ("query_service_url", &self.query_service_url),
            ("analysis_service_url", &self.analysis_service_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(HarvestError::Config(format!("{} is not a valid URL", name)));
            }
        }
        Ok(())
    }

    /// Parsed control server address.
    pub fn control_socket(&self) -> Result<SocketAddr> {
        self.control_addr
            .parse()
            .map_err(|_| HarvestError::Config("control_addr is not a socket address".into()))
    }

    /// `host:port` of the proxy.
    pub fn proxy_address(&self) -> String {
        format!("{}:{}", self.proxy_host, self.proxy_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Retry policy of engine search requests.
    pub fn transport_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.transport_retries, self.backoff())
    }

    /// Retry policy of the content fetcher.
    pub fn fetch_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch_retries, self.backoff())
    }

    /// Retry policy of the batch dispatcher.
    pub fn dispatch_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.dispatch_retries, self.backoff())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HarvestConfig::default();
        assert_eq!(config.proxy_host, "127.0.0.1");
        assert_eq!(config.proxy_port, 9050);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.num_engines, 17);
        assert_eq!(config.scrape_limit, 20);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
        assert!(!config.attach_search_strings);
        assert!(config.engines.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization_fills_defaults() {
        let json = r#"{"proxy_port": 9150, "batch_size": 10}"#;
        let config: HarvestConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.proxy_port, 9150);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.proxy_host, "127.0.0.1"); // default
        assert_eq!(config.fetch_timeout_secs, 45); // default
    }

    #[test]
    fn test_config_proxy_address() {
        let config = HarvestConfig {
            proxy_host: "tor".to_string(),
            proxy_port: 9150,
            ..Default::default()
        };
        assert_eq!(config.proxy_address(), "tor:9150");
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = HarvestConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = HarvestConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_control_addr() {
        let config = HarvestConfig {
            control_addr: "localhost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(
            HarvestConfig::default().control_socket().unwrap().port(),
            8002
        );
    }

    #[test]
    fn test_validate_rejects_bad_service_url() {
        let config = HarvestConfig {
            analysis_service_url: "not a url".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: analysis_service_url is not a valid URL"
        );
    }

    #[test]
    fn test_retry_policies_share_backoff() {
        let config = HarvestConfig {
            retry_backoff_ms: 20,
            fetch_retries: 4,
            ..Default::default()
        };
        assert_eq!(config.fetch_retry().max_retries, 4);
        assert_eq!(config.fetch_retry().base_backoff, Duration::from_millis(20));
        assert_eq!(config.dispatch_retry().base_backoff, Duration::from_millis(20));
    }
}
