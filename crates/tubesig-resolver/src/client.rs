//! HTTP collaborator: watch pages and player scripts.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use tubesig_core::{Error, HttpError, Result};

use crate::context::ResolverConfig;

/// Base delay for exponential backoff (milliseconds).
const BASE_RETRY_DELAY_MS: u64 = 500;

/// Block applied after a 429 without `Retry-After`.
const DEFAULT_RATE_LIMIT_BLOCK: Duration = Duration::from_secs(60);

/// Entries above this count trigger an expiry sweep.
const CACHE_SWEEP_THRESHOLD: usize = 16;

/// Fetches page and script bodies as text.
///
/// A failed page fetch ends the resolution. A failed script fetch only
/// leaves ciphered streams unresolved.
pub trait PageFetcher: Send + Sync {
    /// Fetch a watch page.
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<String>> + Send;

    /// Fetch a player script. Implementations may cache by URL.
    fn fetch_script(&self, url: &str) -> impl Future<Output = Result<String>> + Send {
        self.fetch_page(url)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct RateLimitState {
    blocked_until: Option<Instant>,
}

impl RateLimitState {
    fn is_blocked(&self) -> bool {
        self.blocked_until.is_some_and(|until| Instant::now() < until)
    }

    fn block_for(&mut self, duration: Duration) {
        self.blocked_until = Some(Instant::now() + duration);
    }

    fn remaining_secs(&self) -> Option<u64> {
        self.blocked_until
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
    }
}

/// reqwest-backed [`PageFetcher`] with retries and a player-script cache.
#[derive(Clone)]
pub struct WatchClient {
    http: reqwest::Client,
    max_retries: u32,
    /// Player scripts keyed by URL digest.
    scripts: Arc<DashMap<String, CacheEntry<String>>>,
    script_ttl: Duration,
    rate_limit_state: Arc<RwLock<RateLimitState>>,
}

impl WatchClient {
    /// Create a client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(&ResolverConfig::default())
    }

    /// Create a client from resolver configuration.
    pub fn with_config(config: &ResolverConfig) -> Result<Self> {
        let profile = &config.profile;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, header_value(&profile.accept_language)?);
        headers.insert(USER_AGENT, header_value(&profile.user_agent)?);
        headers.insert(REFERER, header_value(&profile.referer)?);
        headers.insert("Origin", header_value(&profile.origin)?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .cookie_store(true)
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            max_retries: config.max_retries.max(1),
            scripts: Arc::new(DashMap::new()),
            script_ttl: config.script_cache_ttl(),
            rate_limit_state: Arc::new(RwLock::new(RateLimitState::default())),
        })
    }

    /// Set the player-script cache TTL.
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.script_ttl = ttl;
        self
    }

    /// GET `url` as text, retrying transient failures.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        {
            let state = self.rate_limit_state.read();
            if state.is_blocked() {
                return Err(Error::RateLimited {
                    retry_after_secs: state.remaining_secs(),
                });
            }
        }

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
                debug!("Retry attempt {attempt} for {url} after {delay:?}");
            }

            match self.do_request(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!("GET {url} failed (attempt {attempt}): {e}");

                    if let Error::RateLimited { retry_after_secs } = &e {
                        let block = retry_after_secs
                            .map_or(DEFAULT_RATE_LIMIT_BLOCK, Duration::from_secs);
                        self.rate_limit_state.write().block_for(block);
                    }

                    if !e.is_retryable() {
                        return Err(e);
                    }

                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Network("Request failed".to_string())))
    }

    async fn do_request(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(HttpError::Timeout)
            } else if e.is_connect() {
                Error::Http(HttpError::ConnectionFailed(e.to_string()))
            } else if e.is_builder() {
                Error::Http(HttpError::InvalidUrl(url.to_string()))
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());

            return Err(Error::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Http(HttpError::StatusError {
                status: status.as_u16(),
                message,
            }));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))
    }

    fn cache_key(&self, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn get_cached(&self, key: &str) -> Option<String> {
        let entry = self.scripts.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.scripts.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn set_cached(&self, key: String, value: String) {
        self.scripts.insert(key, CacheEntry::new(value, self.script_ttl));

        if self.scripts.len() > CACHE_SWEEP_THRESHOLD {
            self.cleanup_cache();
        }
    }

    fn cleanup_cache(&self) {
        self.scripts.retain(|_, entry| !entry.is_expired());
    }

    /// Drop all cached player scripts.
    pub fn clear_cache(&self) {
        self.scripts.clear();
    }

    /// Number of cached player scripts.
    pub fn cache_size(&self) -> usize {
        self.scripts.len()
    }
}

impl PageFetcher for WatchClient {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.get_text(url).await
    }

    async fn fetch_script(&self, url: &str) -> Result<String> {
        let key = self.cache_key(url);
        if let Some(cached) = self.get_cached(&key) {
            debug!("Script cache hit for {url}");
            return Ok(cached);
        }

        let script = self.get_text(url).await?;
        self.set_cached(key, script.clone());
        Ok(script)
    }
}

impl Default for WatchClient {
    /// # Panics
    /// Panics if the HTTP client cannot be created.
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new().expect("Failed to create default watch client")
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidConfig(format!("header value `{value}`: {e}")))
}
