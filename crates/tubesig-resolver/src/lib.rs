//! # tubesig-resolver
//!
//! Resolve a video id or watch URL to typed metadata with request-ready
//! stream URLs.
//!
//! The watch page is fetched through a [`PageFetcher`], the embedded player
//! manifest is cut out and parsed ([`manifest`]), and every stream descriptor
//! is turned into a [`ResolvedFormat`] ([`resolver`]). The player script is
//! only fetched when at least one descriptor carries a signature cipher.

pub mod client;
pub mod context;
pub mod manifest;
pub mod player;
pub mod resolver;
pub mod types;

pub use client::{PageFetcher, WatchClient};
pub use context::{ClientProfile, ResolverConfig};
pub use manifest::Manifest;
pub use resolver::{SignatureCipher, UrlResolver};
pub use tubesig_core::{
    lookup_by_tag, ExtensionTable, ResolvedFormat, SignatureState, VideoMetadata,
};

use tracing::{debug, info, warn};
use tubesig_cipher::{QuickJsSandbox, ScriptEngine};
use tubesig_core::Result;

/// End-to-end resolver: page fetch, manifest, descrambling, aggregation.
pub struct Resolver<F = WatchClient, E = QuickJsSandbox> {
    profile: ClientProfile,
    fetcher: F,
    urls: UrlResolver<E>,
}

impl Resolver {
    /// Resolver with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ResolverConfig::default())
    }

    /// Resolver backed by [`WatchClient`] and [`QuickJsSandbox`].
    pub fn with_config(config: ResolverConfig) -> Result<Self> {
        let fetcher = WatchClient::with_config(&config)?;
        let engine = QuickJsSandbox::with_limits(config.sandbox);
        Ok(Self::from_parts(
            config.profile,
            fetcher,
            engine,
            config.extensions,
        ))
    }
}

impl<F: PageFetcher, E: ScriptEngine> Resolver<F, E> {
    /// Assemble a resolver from its collaborators.
    pub const fn from_parts(
        profile: ClientProfile,
        fetcher: F,
        engine: E,
        extensions: ExtensionTable,
    ) -> Self {
        Self {
            profile,
            fetcher,
            urls: UrlResolver::new(engine, extensions),
        }
    }

    pub const fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolve a bare video id or a watch URL.
    ///
    /// Page fetch and manifest failures end the resolution. Script fetch and
    /// descrambling failures only downgrade the affected formats to [`SignatureState::Unresolved`].
    pub async fn resolve(&self, input: &str) -> Result<VideoMetadata> {
        let id = player::video_id(input)?;
        info!("Resolving {id}");

        let page = self.fetcher.fetch_page(&self.profile.watch_url(&id)).await?;
        let manifest = manifest::extract(&page)?;

        let script = if manifest.needs_descrambling() {
            match player::script_url(&page, &self.profile.origin) {
                Some(url) => {
                    debug!("Player script: {url}");
                    match self.fetcher.fetch_script(&url).await {
                        Ok(script) => Some(script),
                        Err(e) => {
                            warn!("Player script fetch failed, ciphered streams stay unresolved: {e}");
                            None
                        }
                    }
                }
                None => {
                    warn!("No player script referenced by {id}; ciphered streams stay unresolved");
                    None
                }
            }
        } else {
            None
        };

        let metadata = self.urls.assemble(manifest, script.as_deref())?;
        info!(
            "Resolved {id}: {} formats ({} playable)",
            metadata.formats().len(),
            metadata.playable().count()
        );
        Ok(metadata)
    }
}
