//! Client configuration.
//!
//! [`ClientConfig`] is a plain value built in code (builder-style `with_*`
//! methods) or from the environment via [`ClientConfig::from_env`]. The
//! client only needs these values at construction; how they were obtained is
//! the caller's business.

use crate::api::retry::RetryConfig;
use crate::model::ResourceKind;
use std::collections::HashMap;
use std::time::Duration;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api-v3.mbta.com";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "MBTA_API_KEY";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "MBTA_BASE_URL";

/// Freshness and capacity bounds for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl CachePolicy {
    pub const fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries }
    }
}

/// Per-resource-kind cache policies.
///
/// Live data expires quickly while static network data is kept for an hour.
/// Use [`CachePolicies::uniform`] for a single policy across every kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicies {
    policies: HashMap<ResourceKind, CachePolicy>,
}

/// Entries kept per resource kind unless overridden.
pub const DEFAULT_CACHE_ENTRIES: usize = 256;

impl Default for CachePolicies {
    fn default() -> Self {
        let policies = ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let ttl = match kind {
                    ResourceKind::Vehicle => Duration::from_secs(10),
                    ResourceKind::Prediction => Duration::from_secs(15),
                    ResourceKind::Alert | ResourceKind::LiveFacility => Duration::from_secs(60),
                    ResourceKind::Schedule | ResourceKind::Trip => Duration::from_secs(5 * 60),
                    _ => Duration::from_secs(60 * 60),
                };
                (kind, CachePolicy::new(ttl, DEFAULT_CACHE_ENTRIES))
            })
            .collect();
        Self { policies }
    }
}

impl CachePolicies {
    /// The same policy for every resource kind.
    pub fn uniform(policy: CachePolicy) -> Self {
        Self {
            policies: ResourceKind::ALL.into_iter().map(|k| (k, policy)).collect(),
        }
    }

    /// Override the policy for one kind.
    pub fn with_policy(mut self, kind: ResourceKind, policy: CachePolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    pub fn get(&self, kind: ResourceKind) -> CachePolicy {
        self.policies
            .get(&kind)
            .copied()
            .unwrap_or(CachePolicy::new(Duration::ZERO, 0))
    }
}

/// Everything needed to construct an [`MbtaClient`](crate::MbtaClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Sent as the `x-api-key` header. Anonymous access is rate-limited harder.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub cache: CachePolicies,
    /// `page[limit]` used when a caller does not specify one.
    pub default_page_limit: u32,
    /// Safety bound on pages followed by fetch-all queries.
    pub max_pages: u32,
    /// Send `fields[type]` so upstream only returns decoded attributes.
    pub sparse_fieldsets: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
            retry: RetryConfig::default(),
            cache: CachePolicies::default(),
            default_page_limit: 10,
            max_pages: 20,
            sparse_fieldsets: true,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `MBTA_API_KEY` and `MBTA_BASE_URL`. Empty
    /// values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name| lookup(name).filter(|v: &String| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(key) = non_empty(API_KEY_ENV) {
            config.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = non_empty(BASE_URL_ENV) {
            config.base_url = url.trim().to_string();
        }
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: CachePolicies) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.default_page_limit = limit;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_sparse_fieldsets(mut self, enabled: bool) -> Self {
        self.sparse_fieldsets = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_data_expires_faster_than_static() {
        let policies = CachePolicies::default();
        let vehicles = policies.get(ResourceKind::Vehicle).ttl;
        let predictions = policies.get(ResourceKind::Prediction).ttl;
        let stops = policies.get(ResourceKind::Stop).ttl;
        assert!(vehicles < predictions);
        assert!(predictions < stops);
        assert_eq!(policies.get(ResourceKind::Shape).max_entries, DEFAULT_CACHE_ENTRIES);
    }

    #[test]
    fn uniform_and_override() {
        let one_minute = CachePolicy::new(Duration::from_secs(60), 8);
        let policies = CachePolicies::uniform(one_minute)
            .with_policy(ResourceKind::Vehicle, CachePolicy::new(Duration::from_secs(1), 2));
        assert_eq!(policies.get(ResourceKind::Route), one_minute);
        assert_eq!(policies.get(ResourceKind::Vehicle).max_entries, 2);
    }

    #[test]
    fn env_lookup_ignores_empty_values() {
        let config = ClientConfig::from_lookup(|name| match name {
            API_KEY_ENV => Some(" secret ".into()),
            BASE_URL_ENV => Some("   ".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::default()
            .with_base_url("http://127.0.0.1:9999")
            .with_page_limit(50)
            .with_sparse_fieldsets(false);
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.default_page_limit, 50);
        assert!(!config.sparse_fieldsets);
    }
}
