//! Video metadata aggregate.

use serde::{Deserialize, Serialize};

use super::format::ResolvedFormat;
use crate::error::{Error, Result};

/// Resolved video: descriptive metadata plus its playable formats.
///
/// Deserialization goes through [`VideoMetadata::new`], so an empty format
/// list is rejected there too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "MetadataRecord")]
pub struct VideoMetadata {
    /// Video id.
    pub id: String,
    pub title: String,
    pub author: String,
    /// Keywords rendered as one descriptive string.
    pub keywords: String,
    pub view_count: u64,
    pub length_seconds: u64,
    /// First thumbnail in the manifest, or empty.
    pub thumbnail_url: String,
    pub average_rating: f64,
    formats: Vec<ResolvedFormat>,
}

impl VideoMetadata {
    /// Assemble the aggregate.
    ///
    /// Fails with [`Error::NoUsableFormats`] when `formats` is empty.
    pub fn new(details: VideoDetails, formats: Vec<ResolvedFormat>) -> Result<Self> {
        if formats.is_empty() {
            return Err(Error::NoUsableFormats);
        }

        Ok(Self {
            id: details.id,
            title: details.title,
            author: details.author,
            keywords: details.keywords,
            view_count: details.view_count,
            length_seconds: details.length_seconds,
            thumbnail_url: details.thumbnail_url,
            average_rating: details.average_rating,
            formats,
        })
    }

    /// Formats in order: progressive first, then adaptive.
    pub fn formats(&self) -> &[ResolvedFormat] {
        &self.formats
    }

    /// Find a format by itag.
    pub fn format_by_itag(&self, itag: u32) -> Option<&ResolvedFormat> {
        self.formats.iter().find(|f| f.itag == itag)
    }

    /// Position of a format in [`Self::formats`].
    pub fn index_of_itag(&self, itag: u32) -> Option<usize> {
        self.formats.iter().position(|f| f.itag == itag)
    }

    /// Formats whose URL is expected to work.
    pub fn playable(&self) -> impl Iterator<Item = &ResolvedFormat> {
        self.formats.iter().filter(|f| f.is_playable())
    }
}

/// Wire shape of [`VideoMetadata`], validated on conversion.
#[derive(Deserialize)]
struct MetadataRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    keywords: String,
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    length_seconds: u64,
    #[serde(default)]
    thumbnail_url: String,
    #[serde(default)]
    average_rating: f64,
    #[serde(default)]
    formats: Vec<ResolvedFormat>,
}

impl TryFrom<MetadataRecord> for VideoMetadata {
    type Error = Error;

    fn try_from(record: MetadataRecord) -> Result<Self> {
        let details = VideoDetails {
            id: record.id,
            title: record.title,
            author: record.author,
            keywords: record.keywords,
            view_count: record.view_count,
            length_seconds: record.length_seconds,
            thumbnail_url: record.thumbnail_url,
            average_rating: record.average_rating,
        };
        Self::new(details, record.formats)
    }
}

/// Descriptive fields of a video, without formats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub author: String,
    pub keywords: String,
    pub view_count: u64,
    pub length_seconds: u64,
    pub thumbnail_url: String,
    pub average_rating: f64,
}

impl VideoDetails {
    /// Join a keyword list into the single descriptive string.
    pub fn join_keywords(keywords: &[String]) -> String {
        keywords.join(", ")
    }
}

/// Look up a format by itag, failing with [`Error::FormatNotFound`].
pub fn lookup_by_tag(metadata: &VideoMetadata, itag: u32) -> Result<&ResolvedFormat> {
    metadata
        .format_by_itag(itag)
        .ok_or(Error::FormatNotFound(itag))
}
