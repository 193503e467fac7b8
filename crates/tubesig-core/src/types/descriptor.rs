//! Raw stream descriptors as they appear in a player manifest.

use serde::{Deserialize, Serialize};

/// Which manifest group a stream came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Muxed audio + video (`formats`).
    Progressive,
    /// Single-track stream (`adaptiveFormats`).
    Adaptive,
}

/// Where a descriptor's URL comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum StreamSource {
    /// A ready-to-use URL.
    Direct(String),
    /// A signature-cipher query string that has to be unpacked.
    Cipher(String),
    /// Neither a URL nor a cipher was present.
    Missing,
}

impl StreamSource {
    /// Build from the manifest's optional `url` and `signatureCipher` fields.
    ///
    /// Empty strings count as absent. A direct URL wins if both are set.
    pub fn from_fields(url: Option<String>, cipher: Option<String>) -> Self {
        match (
            url.filter(|u| !u.is_empty()),
            cipher.filter(|c| !c.is_empty()),
        ) {
            (Some(url), _) => Self::Direct(url),
            (None, Some(cipher)) => Self::Cipher(cipher),
            (None, None) => Self::Missing,
        }
    }

    pub const fn is_cipher(&self) -> bool {
        matches!(self, Self::Cipher(_))
    }
}

/// One stream entry from the manifest, before any URL resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawStreamDescriptor {
    /// Stream tag, unique within a manifest.
    pub itag: u32,
    /// URL or cipher.
    pub source: StreamSource,
    /// MIME type, e.g. `video/mp4; codecs="avc1.42001E, mp4a.40.2"`.
    pub mime_type: String,
    /// Explicit quality label from the manifest.
    pub quality: Option<String>,
    /// Pixel height.
    pub height: Option<u32>,
    /// Bitrate in bits per second.
    pub bitrate: Option<u64>,
    /// Manifest group.
    pub kind: StreamKind,
}

impl RawStreamDescriptor {
    pub fn new(itag: u32, source: StreamSource, mime_type: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            itag,
            source,
            mime_type: mime_type.into(),
            quality: None,
            height: None,
            bitrate: None,
            kind,
        }
    }

    /// Set the explicit quality label.
    #[must_use]
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Set the pixel height.
    #[must_use]
    pub const fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Whether resolving this descriptor may need the player script.
    pub const fn needs_descrambling(&self) -> bool {
        self.source.is_cipher()
    }
}
