//! Turning raw stream descriptors into request-ready formats.

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};
use tubesig_cipher::{decipher, locate, Descrambler, ScriptEngine};
use tubesig_core::{
    quality_label, Error, ExtensionTable, RawStreamDescriptor, ResolvedFormat, Result,
    SignatureState, StreamSource, VideoMetadata,
};
use url::form_urlencoded;

use crate::manifest::Manifest;

/// Query parameter used when a cipher does not name one.
const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// Decoded `signatureCipher` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCipher {
    /// Base stream URL.
    pub url: String,
    /// Scrambled signature, if the stream needs one.
    pub signature: Option<String>,
    /// Query parameter the descrambled signature goes under.
    pub param: String,
}

impl SignatureCipher {
    /// Parse URL-encoded pairs; the first occurrence of a key wins.
    pub fn parse(cipher: &str) -> Result<Self> {
        let mut url = None;
        let mut signature = None;
        let mut param = None;

        for (key, value) in form_urlencoded::parse(cipher.as_bytes()) {
            let slot = match &*key {
                "url" => &mut url,
                "s" => &mut signature,
                "sp" => &mut param,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let url = url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::ManifestMalformed("signature cipher without `url`".to_string()))?;

        Ok(Self {
            url,
            signature: signature.filter(|s| !s.is_empty()),
            param: param
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_SIGNATURE_PARAM.to_string()),
        })
    }

    /// Base URL with `signature` appended under [`Self::param`].
    pub fn signed_url(&self, signature: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let escaped: String = form_urlencoded::byte_serialize(signature.as_bytes()).collect();
        format!("{}{separator}{}={escaped}", self.url, self.param)
    }
}

/// Per-manifest descrambling state.
///
/// The locator runs at most once; recipes are rebuilt for every signature.
pub struct DescrambleSession<'a, E: ?Sized> {
    engine: &'a E,
    script: Option<&'a str>,
    descrambler: OnceCell<Option<Descrambler>>,
}

impl<'a, E: ScriptEngine + ?Sized> DescrambleSession<'a, E> {
    pub fn new(engine: &'a E, script: Option<&'a str>) -> Self {
        Self {
            engine,
            script,
            descrambler: OnceCell::new(),
        }
    }

    /// Located descrambler, searching the script on first use.
    pub fn descrambler(&self) -> Option<&Descrambler> {
        self.descrambler
            .get_or_init(|| {
                let script = self.script?;
                match locate(script) {
                    Ok(found) => Some(found),
                    Err(e) => {
                        warn!("Signature descrambling unavailable: {e}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Descramble one signature.
    pub fn descramble(&self, signature: &str) -> Result<String> {
        let script = self.script.ok_or(Error::DescramblerNotFound)?;
        let descrambler = self.descrambler().ok_or(Error::DescramblerNotFound)?;
        decipher(self.engine, script, descrambler, signature)
    }
}

/// Builds [`VideoMetadata`] from a manifest and an optional player script.
#[derive(Debug, Clone)]
pub struct UrlResolver<E> {
    engine: E,
    extensions: ExtensionTable,
}

impl<E: ScriptEngine> UrlResolver<E> {
    pub const fn new(engine: E, extensions: ExtensionTable) -> Self {
        Self { engine, extensions }
    }

    pub const fn engine(&self) -> &E {
        &self.engine
    }

    pub const fn extensions(&self) -> &ExtensionTable {
        &self.extensions
    }

    /// Resolve every descriptor, progressive first, in manifest order.
    ///
    /// Descriptors without a URL or cipher are dropped. Descrambling failures
    /// keep the base URL and mark the format [`SignatureState::Unresolved`].
    pub fn assemble(&self, manifest: Manifest, script: Option<&str>) -> Result<VideoMetadata> {
        let session = DescrambleSession::new(&self.engine, script);

        let formats: Vec<ResolvedFormat> = manifest
            .descriptors()
            .filter_map(|descriptor| self.resolve_descriptor(descriptor, &session))
            .collect();

        debug!(
            "Resolved {} of {} descriptors for `{}`",
            formats.len(),
            manifest.len(),
            manifest.details.id
        );

        VideoMetadata::new(manifest.details, formats)
    }

    /// Resolve a single descriptor, or `None` if it has nothing to resolve.
    pub fn resolve_descriptor(
        &self,
        descriptor: &RawStreamDescriptor,
        session: &DescrambleSession<'_, E>,
    ) -> Option<ResolvedFormat> {
        let (url, signature) = match &descriptor.source {
            StreamSource::Direct(url) => (url.clone(), SignatureState::Direct),
            StreamSource::Cipher(cipher) => {
                let cipher = match SignatureCipher::parse(cipher) {
                    Ok(cipher) => cipher,
                    Err(e) => {
                        warn!("Skipping itag {}: {e}", descriptor.itag);
                        return None;
                    }
                };
                self.apply_cipher(descriptor.itag, &cipher, session)
            }
            StreamSource::Missing => {
                debug!("Skipping itag {}: no url or cipher", descriptor.itag);
                return None;
            }
        };

        Some(ResolvedFormat {
            itag: descriptor.itag,
            url,
            mime_type: descriptor.mime_type.clone(),
            quality: quality_label(descriptor.quality.as_deref(), descriptor.height),
            extension: self.extensions.extension_for(&descriptor.mime_type).to_string(),
            kind: descriptor.kind,
            signature,
            height: descriptor.height,
            bitrate: descriptor.bitrate,
        })
    }

    fn apply_cipher(
        &self,
        itag: u32,
        cipher: &SignatureCipher,
        session: &DescrambleSession<'_, E>,
    ) -> (String, SignatureState) {
        let Some(scrambled) = &cipher.signature else {
            return (cipher.url.clone(), SignatureState::Direct);
        };

        match session.descramble(scrambled) {
            Ok(signature) => (cipher.signed_url(&signature), SignatureState::Deciphered),
            Err(e) => {
                warn!("Itag {itag} keeps its base URL: {e}");
                (cipher.url.clone(), SignatureState::Unresolved)
            }
        }
    }
}
