//! Error types for tubesig.

use thiserror::Error;

/// Result type alias using tubesig's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tubesig.
#[derive(Error, Debug)]
pub enum Error {
    // Fetch errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    // Manifest errors
    #[error("Player manifest not found in page")]
    ManifestNotFound,

    #[error("Player manifest is malformed: {0}")]
    ManifestMalformed(String),

    // Descrambling errors
    #[error("Signature descrambler not found in player script")]
    DescramblerNotFound,

    #[error("Failed to extract `{name}` from player script: {reason}")]
    FragmentExtractionFailed { name: String, reason: String },

    #[error("Sandbox failed to load script: {0}")]
    SandboxLoad(String),

    #[error("Sandbox invocation failed: {0}")]
    SandboxInvocation(String),

    // Aggregate errors
    #[error("No usable formats in manifest")]
    NoUsableFormats,

    #[error("No format with itag {0}")]
    FormatNotFound(u32),

    #[error("Invalid video id: {0}")]
    InvalidVideoId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// HTTP-specific errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed with status {status}: {message}")]
    StatusError { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Returns true if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::RateLimited { .. }
                | Self::Http(HttpError::ConnectionFailed(_) | HttpError::Timeout)
        )
    }

    /// Returns true if this is a rate limit error.
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true if the error came from the descrambling chain.
    ///
    /// These are absorbed per stream and never abort a resolution.
    pub const fn is_descramble_failure(&self) -> bool {
        matches!(
            self,
            Self::DescramblerNotFound
                | Self::FragmentExtractionFailed { .. }
                | Self::SandboxLoad(_)
                | Self::SandboxInvocation(_)
        )
    }

    /// Returns true if the error ends a resolution with no partial result.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ManifestNotFound | Self::ManifestMalformed(_) | Self::NoUsableFormats
        )
    }

    /// Returns true if the page or script fetch was refused (403).
    pub const fn is_forbidden(&self) -> bool {
        matches!(
            self,
            Self::Http(HttpError::StatusError { status: 403, .. })
        )
    }
}
