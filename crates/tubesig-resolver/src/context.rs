//! Client profile and resolver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tubesig_cipher::SandboxLimits;
use tubesig_core::ExtensionTable;

/// Browser identity sent with every page and script request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    /// User agent string.
    pub user_agent: String,
    /// Referer header.
    pub referer: String,
    /// Site origin, used for watch URLs and relative script paths.
    pub origin: String,
    /// Accept-Language header.
    pub accept_language: String,
}

impl ClientProfile {
    /// Desktop Chrome on macOS.
    pub fn desktop_chrome() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            referer: "https://www.youtube.com/".to_string(),
            origin: "https://www.youtube.com".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }

    /// Replace the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Replace the origin (and the referer derived from it).
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        self.referer = format!("{origin}/");
        self.origin = origin;
        self
    }

    /// Watch page URL for a video id.
    pub fn watch_url(&self, video_id: &str) -> String {
        format!("{}/watch?v={video_id}", self.origin)
    }
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self::desktop_chrome()
    }
}

/// Everything a [`crate::Resolver`] can be tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    pub profile: ClientProfile,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts for retryable fetch failures.
    pub max_retries: u32,
    /// How long a fetched player script is kept, in seconds.
    pub script_cache_ttl_secs: u64,
    /// MIME substring to extension table.
    pub extensions: ExtensionTable,
    /// Sandbox resource limits.
    pub sandbox: SandboxLimits,
}

impl ResolverConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn script_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.script_cache_ttl_secs)
    }

    #[must_use]
    pub fn with_profile(mut self, profile: ClientProfile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: ExtensionTable) -> Self {
        self.extensions = extensions;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            profile: ClientProfile::default(),
            timeout_secs: 30,
            max_retries: 3,
            script_cache_ttl_secs: 60 * 60,
            extensions: ExtensionTable::default(),
            sandbox: SandboxLimits::default(),
        }
    }
}
