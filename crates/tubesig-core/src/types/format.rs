//! Resolved stream formats and container classification.

use serde::{Deserialize, Serialize};

use super::descriptor::StreamKind;

/// How a format's URL was obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignatureState {
    /// The manifest carried a usable URL (or a cipher without a signature).
    #[default]
    Direct,
    /// The signature was descrambled and appended.
    Deciphered,
    /// Descrambling failed; the URL is the bare base URL and will most
    /// likely be refused at fetch time.
    Unresolved,
}

/// A stream with a request-ready URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedFormat {
    /// Stream tag.
    pub itag: u32,
    /// Absolute URL, never empty.
    pub url: String,
    /// MIME type from the manifest.
    pub mime_type: String,
    /// Human-readable quality label.
    pub quality: String,
    /// Container extension picked from the MIME type.
    pub extension: String,
    /// Manifest group.
    pub kind: StreamKind,
    /// Signature outcome for this URL.
    pub signature: SignatureState,
    /// Pixel height (if known).
    pub height: Option<u32>,
    /// Bitrate in bits per second (if known).
    pub bitrate: Option<u64>,
}

impl ResolvedFormat {
    /// Whether the URL is expected to be accepted by the provider.
    pub const fn is_playable(&self) -> bool {
        !matches!(self.signature, SignatureState::Unresolved)
    }

    /// Whether this format carries both audio and video.
    pub const fn is_progressive(&self) -> bool {
        matches!(self.kind, StreamKind::Progressive)
    }
}

/// Pick a display label: explicit value, then `{height}p`, then `unknown`.
pub fn quality_label(explicit: Option<&str>, height: Option<u32>) -> String {
    match (explicit.filter(|q| !q.is_empty()), height) {
        (Some(quality), _) => quality.to_string(),
        (None, Some(h)) if h > 0 => format!("{h}p"),
        _ => "unknown".to_string(),
    }
}

/// Ordered mapping from MIME substrings to file extensions.
///
/// Entries are tried in order and the first substring found in the MIME
/// type wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionTable {
    entries: Vec<(String, String)>,
    fallback: String,
}

impl ExtensionTable {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Append an entry; it is tried after all existing ones.
    #[must_use]
    pub fn with_entry(mut self, needle: impl Into<String>, extension: impl Into<String>) -> Self {
        self.entries.push((needle.into(), extension.into()));
        self
    }

    /// Classify a MIME type.
    pub fn extension_for(&self, mime_type: &str) -> &str {
        let mime_lower = mime_type.to_lowercase();
        self.entries
            .iter()
            .find(|(needle, _)| mime_lower.contains(needle.as_str()))
            .map_or(self.fallback.as_str(), |(_, ext)| ext.as_str())
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        ["3gp", "mp4", "flv", "webm"]
            .into_iter()
            .fold(Self::new("avi"), |table, tag| table.with_entry(tag, tag))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quality_label_policy() {
        assert_eq!(quality_label(Some("hd720"), Some(720)), "hd720");
        assert_eq!(quality_label(None, Some(480)), "480p");
        assert_eq!(quality_label(Some(""), Some(144)), "144p");
        assert_eq!(quality_label(None, Some(0)), "unknown");
        assert_eq!(quality_label(None, None), "unknown");
    }

    #[test]
    fn test_extension_table_first_match_wins() {
        let table = ExtensionTable::default();
        assert_eq!(table.extension_for("video/mp4; codecs=\"avc1\""), "mp4");
        assert_eq!(table.extension_for("audio/webm; codecs=\"opus\""), "webm");
        assert_eq!(table.extension_for("video/3gpp"), "3gp");
        assert_eq!(table.extension_for("application/x-unknown"), "avi");
    }

    #[test]
    fn test_extension_table_custom_order() {
        let table = ExtensionTable::new("bin")
            .with_entry("audio/mp4", "m4a")
            .with_entry("mp4", "mp4");
        assert_eq!(table.extension_for("audio/mp4"), "m4a");
        assert_eq!(table.extension_for("VIDEO/MP4"), "mp4");
        assert_eq!(table.extension_for("text/plain"), "bin");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_playable() {
        let mut format = ResolvedFormat {
            itag: 18,
            url: "https://a.test/v".into(),
            mime_type: "video/mp4".into(),
            quality: "medium".into(),
            extension: "mp4".into(),
            kind: StreamKind::Progressive,
            signature: SignatureState::Deciphered,
            height: Some(360),
            bitrate: None,
        };
        assert!(format.is_playable());
        format.signature = SignatureState::Unresolved;
        assert!(!format.is_playable());
    }

    proptest! {
        #[test]
        fn prop_quality_label_never_empty(explicit in proptest::option::of("[a-z0-9]{0,8}"), height in proptest::option::of(0u32..5000)) {
            let label = quality_label(explicit.as_deref(), height);
            prop_assert!(!label.is_empty());
        }

        #[test]
        fn prop_height_label_suffix(height in 1u32..5000) {
            prop_assert_eq!(quality_label(None, Some(height)), format!("{height}p"));
        }
    }
}
