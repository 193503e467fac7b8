//! Core domain types for tubesig.

pub mod descriptor;
pub mod format;
pub mod video;

pub use descriptor::{RawStreamDescriptor, StreamKind, StreamSource};
pub use format::{quality_label, ExtensionTable, ResolvedFormat, SignatureState};
pub use video::{lookup_by_tag, VideoDetails, VideoMetadata};
