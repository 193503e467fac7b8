//! Raw player-manifest structures as embedded in the watch page.

use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tubesig_core::{RawStreamDescriptor, StreamKind, StreamSource};

/// Embedded `ytInitialPlayerResponse` object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlayerResponse {
    pub playability_status: Option<PlayabilityStatus>,
    pub streaming_data: Option<StreamingData>,
    pub video_details: Option<VideoDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    #[serde(default)]
    pub formats: Vec<Format>,
    #[serde(default)]
    pub adaptive_formats: Vec<Format>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    #[serde(default, deserialize_with = "lenient")]
    pub itag: u32,
    pub url: Option<String>,
    pub signature_cipher: Option<String>,
    /// Older manifests use `cipher` instead of `signatureCipher`.
    pub cipher: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    pub quality: Option<String>,
    pub quality_label: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub bitrate: Option<u64>,
}

impl Format {
    /// Convert to a typed descriptor for the given group.
    pub fn to_descriptor(&self, kind: StreamKind) -> RawStreamDescriptor {
        let source = StreamSource::from_fields(
            self.url.clone(),
            self.signature_cipher.clone().or_else(|| self.cipher.clone()),
        );

        RawStreamDescriptor {
            itag: self.itag,
            source,
            mime_type: self.mime_type.clone(),
            quality: self
                .quality_label
                .clone()
                .filter(|q| !q.is_empty())
                .or_else(|| self.quality.clone()),
            height: self.height,
            bitrate: self.bitrate,
            kind,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub length_seconds: u64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub view_count: u64,
    #[serde(default)]
    pub author: String,
    pub thumbnail: Option<ThumbnailContainer>,
    #[serde(default, deserialize_with = "lenient")]
    pub average_rating: f64,
}

impl VideoDetails {
    /// First thumbnail URL, or empty.
    pub fn thumbnail_url(&self) -> String {
        self.thumbnail
            .as_ref()
            .and_then(|t| t.thumbnails.first())
            .map(|t| t.url.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailContainer {
    #[serde(default)]
    pub thumbnails: Vec<ThumbnailItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailItem {
    pub url: String,
}

fn parse_number<T: FromStr>(value: Option<Value>) -> Option<T> {
    match value? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Number or decimal string; anything unparsable becomes the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    Ok(parse_number(Option::<Value>::deserialize(deserializer)?).unwrap_or_default())
}

/// Like [`lenient`] but keeps absence and garbage as `None`.
fn lenient_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    Ok(parse_number(Option::<Value>::deserialize(deserializer)?))
}
