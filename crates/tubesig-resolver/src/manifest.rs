//! Player manifest extraction from watch-page markup.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use tubesig_cipher::fragment::balanced_end;
use tubesig_core::{Error, RawStreamDescriptor, Result, StreamKind, VideoDetails};

use crate::types::RawPlayerResponse;

#[allow(clippy::expect_used)] // Literal pattern
static MANIFEST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ytInitialPlayerResponse\s*=\s*\{").expect("valid manifest marker")
});

/// Typed manifest: video details plus both descriptor groups.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub details: VideoDetails,
    /// `formats`, in manifest order.
    pub progressive: Vec<RawStreamDescriptor>,
    /// `adaptiveFormats`, in manifest order.
    pub adaptive: Vec<RawStreamDescriptor>,
}

impl Manifest {
    /// All descriptors, progressive first.
    pub fn descriptors(&self) -> impl Iterator<Item = &RawStreamDescriptor> {
        self.progressive.iter().chain(&self.adaptive)
    }

    /// Whether any descriptor carries a signature cipher.
    pub fn needs_descrambling(&self) -> bool {
        self.descriptors().any(RawStreamDescriptor::needs_descrambling)
    }

    pub fn len(&self) -> usize {
        self.progressive.len() + self.adaptive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn from_raw(raw: RawPlayerResponse) -> Self {
        let details = raw.video_details.unwrap_or_default();
        let streaming = raw.streaming_data.unwrap_or_else(|| {
            if let Some(status) = &raw.playability_status {
                warn!(
                    "No streaming data (status {}: {})",
                    status.status,
                    status.reason.as_deref().unwrap_or("no reason given")
                );
            }
            Default::default()
        });

        Self {
            details: VideoDetails {
                id: details.video_id.clone(),
                title: details.title.clone(),
                author: details.author.clone(),
                keywords: VideoDetails::join_keywords(&details.keywords),
                view_count: details.view_count,
                length_seconds: details.length_seconds,
                thumbnail_url: details.thumbnail_url(),
                average_rating: details.average_rating,
            },
            progressive: streaming
                .formats
                .iter()
                .map(|f| f.to_descriptor(StreamKind::Progressive))
                .collect(),
            adaptive: streaming
                .adaptive_formats
                .iter()
                .map(|f| f.to_descriptor(StreamKind::Adaptive))
                .collect(),
        }
    }
}

/// Cut the manifest JSON object out of page markup.
///
/// The object must be followed by a `;`.
pub fn manifest_json(page: &str) -> Result<&str> {
    let marker = MANIFEST_MARKER
        .find(page)
        .ok_or(Error::ManifestNotFound)?;
    let open = marker.end() - 1;

    let end = balanced_end(page, open)
        .ok_or_else(|| Error::ManifestMalformed("unterminated manifest object".to_string()))?;

    if !page[end..].trim_start().starts_with(';') {
        return Err(Error::ManifestMalformed(
            "manifest object is not followed by `;`".to_string(),
        ));
    }

    Ok(&page[open..end])
}

/// Extract and deserialize the player manifest.
pub fn extract(page: &str) -> Result<Manifest> {
    let json = manifest_json(page)?;
    let raw: RawPlayerResponse =
        serde_json::from_str(json).map_err(|e| Error::ManifestMalformed(e.to_string()))?;

    let manifest = Manifest::from_raw(raw);
    debug!(
        "Manifest for `{}`: {} progressive, {} adaptive",
        manifest.details.id,
        manifest.progressive.len(),
        manifest.adaptive.len()
    );
    Ok(manifest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tubesig_core::StreamSource;

    const PAGE: &str = r#"<html><script>var ytcfg={};</script><script nonce="x">var ytInitialPlayerResponse = {"videoDetails":{"videoId":"dQw4w9WgXcQ","title":"Never {Gonna}; Give","author":"Rick","lengthSeconds":"212","keywords":["pop","80s"],"viewCount":"42","thumbnail":{"thumbnails":[{"url":"https://i.test/1.jpg","width":120,"height":90},{"url":"https://i.test/2.jpg"}]}},"streamingData":{"formats":[{"itag":18,"url":"https://r.test/18","mimeType":"video/mp4","quality":"medium","height":360}],"adaptiveFormats":[{"itag":137,"signatureCipher":"url=https%3A%2F%2Fr.test%2F137&s=AB","mimeType":"video/mp4"},{"itag":251,"url":"https://r.test/251","mimeType":"audio/webm"}]}};var meta = {};</script></html>"#;

    #[test]
    fn test_extract_full_manifest() {
        let manifest = extract(PAGE).unwrap();

        assert_eq!(manifest.details.id, "dQw4w9WgXcQ");
        assert_eq!(manifest.details.title, "Never {Gonna}; Give");
        assert_eq!(manifest.details.author, "Rick");
        assert_eq!(manifest.details.keywords, "pop, 80s");
        assert_eq!(manifest.details.view_count, 42);
        assert_eq!(manifest.details.length_seconds, 212);
        assert_eq!(manifest.details.thumbnail_url, "https://i.test/1.jpg");

        assert_eq!(manifest.progressive.len(), 1);
        assert_eq!(manifest.adaptive.len(), 2);
        assert!(manifest.needs_descrambling());
        assert!(matches!(manifest.adaptive[0].source, StreamSource::Cipher(_)));

        let order: Vec<u32> = manifest.descriptors().map(|d| d.itag).collect();
        assert_eq!(order, vec![18, 137, 251]);
    }

    #[test]
    fn test_manifest_json_bounds() {
        let json = manifest_json(PAGE).unwrap();
        assert!(json.starts_with(r#"{"videoDetails""#));
        assert!(json.ends_with("}]}}"));
    }

    #[test]
    fn test_marker_missing() {
        let err = extract("<html><body>nothing here</body></html>").unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = extract("var ytInitialPlayerResponse = {videoDetails: 1};").unwrap_err();
        assert!(matches!(err, Error::ManifestMalformed(_)));
    }

    #[test]
    fn test_unterminated_is_malformed() {
        let err = extract(r#"var ytInitialPlayerResponse = {"a":{"b":1}"#).unwrap_err();
        assert!(matches!(err, Error::ManifestMalformed(_)));
    }

    #[test]
    fn test_missing_terminator_is_malformed() {
        let err = extract(r#"var ytInitialPlayerResponse = {"a":1}</script>"#).unwrap_err();
        assert!(matches!(err, Error::ManifestMalformed(_)));
    }

    #[test]
    fn test_missing_sections_default() {
        let manifest = extract(r#"ytInitialPlayerResponse={"playabilityStatus":{"status":"LOGIN_REQUIRED"}} ;"#).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.details, VideoDetails::default());
        assert!(!manifest.needs_descrambling());
    }
}
