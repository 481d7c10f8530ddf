//! Expiring web page cache with per-URL access counters
//!
//! Pages live under `cached:<url>` with a storage-side TTL; the component
//! keeps no expiry state of its own. `count:<url>` counts every request,
//! hit or miss, and never expires.

use std::sync::Arc;
use std::time::Duration;

use memostore::{expiry_seconds, Error, Result, StorageAdapter};
use tracing::debug;

use crate::stats::CacheStats;
use crate::value::{decode_integer, decode_text};

/// Lifetime of a cached page unless configured otherwise
pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(10);

/// Key of the access counter for `url`
pub fn count_key(url: &str) -> String {
    format!("count:{}", url)
}

/// Key of the cached page for `url`
pub fn cached_key(url: &str) -> String {
    format!("cached:{}", url)
}

/// Blocking source of page content
pub trait Fetcher {
    /// Fetch the body of `url` as text
    fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP(S) fetcher on a shared `ureq` agent
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher with default transport settings
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
        }
    }

    /// Use a preconfigured agent (timeouts, proxy, TLS)
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| Error::Fetch(format!("GET {} failed: {}", url, e)))?;
        response
            .into_string()
            .map_err(|e| Error::Fetch(format!("reading body of {} failed: {}", url, e)))
    }
}

/// Web cache configuration
#[derive(Debug, Clone)]
pub struct WebCacheConfig {
    /// How long a fetched page is served from storage
    pub ttl: Duration,
}

impl Default for WebCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_PAGE_TTL,
        }
    }
}

impl WebCacheConfig {
    /// Set the page lifetime
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Page cache over a storage adapter
pub struct WebCache<F: Fetcher = HttpFetcher> {
    adapter: Arc<dyn StorageAdapter>,
    fetcher: F,
    config: WebCacheConfig,
    stats: CacheStats,
}

impl WebCache<HttpFetcher> {
    /// Create a cache fetching over HTTP with the default 10 second TTL
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            fetcher: HttpFetcher::new(),
            config: WebCacheConfig::default(),
            stats: CacheStats::new(),
        }
    }
}

impl<F: Fetcher> WebCache<F> {
    /// Create a cache with a custom fetcher and configuration
    ///
    /// # Returns
    /// * `Result<WebCache<F>>` - `Error::InvalidArgument` if the TTL is under
    ///   one second or not a whole number of seconds
    pub fn with_fetcher(
        adapter: Arc<dyn StorageAdapter>,
        fetcher: F,
        config: WebCacheConfig,
    ) -> Result<Self> {
        expiry_seconds(config.ttl)?;
        Ok(Self {
            adapter,
            fetcher,
            config,
            stats: CacheStats::new(),
        })
    }

    /// Get the content of `url`, from storage if cached, else from upstream
    ///
    /// # Arguments
    /// * `url` - Page address, used verbatim in storage keys
    ///
    /// # Returns
    /// * `Result<String>` - page content; fetch errors propagate and leave
    ///   nothing cached
    pub fn get_page(&self, url: &str) -> Result<String> {
        let count = self.adapter.increment(&count_key(url))?;

        let key = cached_key(url);
        if let Some(cached) = self.adapter.get(&key)? {
            self.stats.record_hit();
            debug!(url, count, "page cache hit");
            return decode_text(cached);
        }

        self.stats.record_miss();
        debug!(url, count, "page cache miss, fetching");

        let content = self.fetcher.fetch(url)?;
        self.stats.record_fetch();

        self.adapter
            .set_with_expiry(&key, content.as_bytes(), self.config.ttl)?;
        Ok(content)
    }

    /// Total requests made for `url`
    pub fn access_count(&self, url: &str) -> Result<i64> {
        match self.adapter.get(&count_key(url))? {
            Some(raw) => decode_integer(raw),
            None => Ok(0),
        }
    }

    /// Hit/miss/fetch statistics of this instance
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Configured page lifetime
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Underlying fetcher
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}
