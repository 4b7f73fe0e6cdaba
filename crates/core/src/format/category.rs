//! Extension to category classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Broad family of file formats. Dispatch keys on pairs of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatCategory {
    Video,
    Audio,
    Image,
    Document,
    Pdf,
    Archive,
}

impl FormatCategory {
    pub const ALL: [FormatCategory; 6] = [
        FormatCategory::Video,
        FormatCategory::Audio,
        FormatCategory::Image,
        FormatCategory::Document,
        FormatCategory::Pdf,
        FormatCategory::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatCategory::Video => "video",
            FormatCategory::Audio => "audio",
            FormatCategory::Image => "image",
            FormatCategory::Document => "document",
            FormatCategory::Pdf => "pdf",
            FormatCategory::Archive => "archive",
        }
    }

    /// Extensions belonging to this category, lowercase without the dot.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FormatCategory::Video => VIDEO_EXTENSIONS,
            FormatCategory::Audio => AUDIO_EXTENSIONS,
            FormatCategory::Image => IMAGE_EXTENSIONS,
            FormatCategory::Document => DOCUMENT_EXTENSIONS,
            FormatCategory::Pdf => PDF_EXTENSIONS,
            FormatCategory::Archive => ARCHIVE_EXTENSIONS,
        }
    }
}

impl fmt::Display for FormatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "flv", "mkv", "wmv", "webm", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "flac", "m4a", "ogg", "wma", "opus"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "ico"];
const DOCUMENT_EXTENSIONS: &[&str] = &["docx", "doc", "txt", "rtf", "html", "epub", "mobi"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];
// rar and 7z are recognised so callers get a precise rejection, but no
// archive backend reads or writes them.
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz"];

/// Lowercases an extension and strips any leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Classifies an extension, case-insensitively. `None` means unknown.
pub fn classify(extension: &str) -> Option<FormatCategory> {
    let ext = normalize_extension(extension);
    FormatCategory::ALL
        .into_iter()
        .find(|category| category.extensions().contains(&ext.as_str()))
}

/// Returns the normalized extension of a path, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .filter(|ext| !ext.is_empty())
}

/// Every extension the registry knows, in category order.
pub fn known_extensions() -> impl Iterator<Item = &'static str> {
    FormatCategory::ALL
        .into_iter()
        .flat_map(|category| category.extensions().iter().copied())
}

/// Source/target category pair used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionPair {
    pub source: FormatCategory,
    pub target: FormatCategory,
}

impl ConversionPair {
    /// Category pairs that have a conversion strategy.
    pub const SUPPORTED: [ConversionPair; 8] = [
        ConversionPair::new(FormatCategory::Video, FormatCategory::Video),
        ConversionPair::new(FormatCategory::Video, FormatCategory::Audio),
        ConversionPair::new(FormatCategory::Audio, FormatCategory::Audio),
        ConversionPair::new(FormatCategory::Image, FormatCategory::Image),
        ConversionPair::new(FormatCategory::Document, FormatCategory::Document),
        ConversionPair::new(FormatCategory::Document, FormatCategory::Pdf),
        ConversionPair::new(FormatCategory::Pdf, FormatCategory::Document),
        ConversionPair::new(FormatCategory::Archive, FormatCategory::Archive),
    ];

    pub const fn new(source: FormatCategory, target: FormatCategory) -> Self {
        Self { source, target }
    }

    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(self)
    }
}

impl fmt::Display for ConversionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Whether any strategy converts `source` category into `target` category.
pub fn is_pair_supported(source: FormatCategory, target: FormatCategory) -> bool {
    ConversionPair::new(source, target).is_supported()
}
