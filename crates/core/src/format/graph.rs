//! The extension-level conversion graph offered to callers.

use super::category::{normalize_extension, FormatCategory};

/// Targets of one category reachable from a source extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGroup {
    pub category: FormatCategory,
    pub extensions: &'static [&'static str],
}

struct GraphRow {
    source: &'static str,
    targets: &'static [TargetGroup],
}

const fn video(extensions: &'static [&'static str]) -> TargetGroup {
    TargetGroup {
        category: FormatCategory::Video,
        extensions,
    }
}

const fn audio(extensions: &'static [&'static str]) -> TargetGroup {
    TargetGroup {
        category: FormatCategory::Audio,
        extensions,
    }
}

const fn image(extensions: &'static [&'static str]) -> TargetGroup {
    TargetGroup {
        category: FormatCategory::Image,
        extensions,
    }
}

const fn document(extensions: &'static [&'static str]) -> TargetGroup {
    TargetGroup {
        category: FormatCategory::Document,
        extensions,
    }
}

const fn archive(extensions: &'static [&'static str]) -> TargetGroup {
    TargetGroup {
        category: FormatCategory::Archive,
        extensions,
    }
}

const PDF: TargetGroup = TargetGroup {
    category: FormatCategory::Pdf,
    extensions: &["pdf"],
};

static GRAPH: &[GraphRow] = &[
    // Video
    GraphRow {
        source: "mp4",
        targets: &[
            video(&["flv", "avi", "mov", "wmv", "mkv", "webm", "m4v"]),
            audio(&["mp3", "aac", "wav", "m4a", "ogg"]),
        ],
    },
    GraphRow {
        source: "flv",
        targets: &[
            video(&["mp4", "avi", "mov", "wmv", "mkv"]),
            audio(&["mp3", "aac", "wav", "m4a"]),
        ],
    },
    GraphRow {
        source: "avi",
        targets: &[
            video(&["mp4", "flv", "mov", "wmv", "mkv"]),
            audio(&["mp3", "aac", "wav"]),
        ],
    },
    GraphRow {
        source: "mov",
        targets: &[
            video(&["mp4", "flv", "avi", "wmv", "mkv"]),
            audio(&["mp3", "aac", "wav", "m4a"]),
        ],
    },
    GraphRow {
        source: "wmv",
        targets: &[
            video(&["mp4", "flv", "avi", "mov", "mkv"]),
            audio(&["mp3", "wav", "wma"]),
        ],
    },
    GraphRow {
        source: "mkv",
        targets: &[
            video(&["mp4", "flv", "avi", "mov", "wmv"]),
            audio(&["mp3", "aac", "wav", "m4a"]),
        ],
    },
    GraphRow {
        source: "webm",
        targets: &[video(&["mp4", "mkv"]), audio(&["mp3", "opus", "ogg"])],
    },
    // Audio
    GraphRow {
        source: "mp3",
        targets: &[audio(&["wav", "aac", "ogg", "wma", "m4a", "flac"])],
    },
    GraphRow {
        source: "wav",
        targets: &[audio(&["mp3", "aac", "ogg", "wma", "m4a", "flac"])],
    },
    GraphRow {
        source: "aac",
        targets: &[audio(&["mp3", "wav", "ogg", "wma", "m4a"])],
    },
    GraphRow {
        source: "ogg",
        targets: &[audio(&["mp3", "wav", "aac", "wma", "m4a"])],
    },
    GraphRow {
        source: "wma",
        targets: &[audio(&["mp3", "wav", "aac", "ogg", "m4a"])],
    },
    GraphRow {
        source: "m4a",
        targets: &[audio(&["mp3", "wav", "aac", "ogg", "wma"])],
    },
    GraphRow {
        source: "flac",
        targets: &[audio(&["mp3", "wav", "aac", "ogg", "wma", "m4a"])],
    },
    // Image
    GraphRow {
        source: "jpg",
        targets: &[image(&["png", "bmp", "gif", "webp", "tiff", "ico"])],
    },
    GraphRow {
        source: "jpeg",
        targets: &[image(&["png", "bmp", "gif", "webp", "tiff", "ico"])],
    },
    GraphRow {
        source: "png",
        targets: &[image(&["jpg", "bmp", "gif", "webp", "tiff", "ico"])],
    },
    GraphRow {
        source: "bmp",
        targets: &[image(&["jpg", "png", "gif", "webp", "tiff"])],
    },
    GraphRow {
        source: "gif",
        targets: &[image(&["jpg", "png", "bmp", "webp", "tiff"])],
    },
    GraphRow {
        source: "webp",
        targets: &[image(&["jpg", "png", "bmp", "gif", "tiff"])],
    },
    GraphRow {
        source: "tiff",
        targets: &[image(&["jpg", "png", "bmp", "gif", "webp"])],
    },
    GraphRow {
        source: "ico",
        targets: &[image(&["png", "jpg"])],
    },
    // Documents
    GraphRow {
        source: "pdf",
        targets: &[document(&["doc", "docx", "txt", "rtf", "html", "epub", "mobi"])],
    },
    GraphRow {
        source: "doc",
        targets: &[document(&["docx", "txt", "rtf", "html"]), PDF],
    },
    GraphRow {
        source: "docx",
        targets: &[document(&["doc", "txt", "rtf", "html"]), PDF],
    },
    GraphRow {
        source: "txt",
        targets: &[document(&["doc", "docx", "rtf", "html"]), PDF],
    },
    GraphRow {
        source: "rtf",
        targets: &[document(&["doc", "docx", "txt", "html"]), PDF],
    },
    GraphRow {
        source: "html",
        targets: &[document(&["doc", "docx", "txt", "rtf"]), PDF],
    },
    GraphRow {
        source: "epub",
        targets: &[document(&["mobi"]), PDF],
    },
    GraphRow {
        source: "mobi",
        targets: &[document(&["epub"]), PDF],
    },
    // Archives
    GraphRow {
        source: "zip",
        targets: &[archive(&["tar", "gz"])],
    },
    GraphRow {
        source: "tar",
        targets: &[archive(&["zip", "gz"])],
    },
    GraphRow {
        source: "gz",
        targets: &[archive(&["zip", "tar"])],
    },
];

/// Read-only view of which extension pairs are offered.
///
/// Category support ([`super::ConversionPair`]) is necessary but not
/// sufficient: the engine only accepts pairs listed here.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatGraph;

impl FormatGraph {
    /// Target groups reachable from `source`, ordered by category.
    /// Unknown sources yield an empty slice.
    pub fn targets(source: &str) -> &'static [TargetGroup] {
        let source = normalize_extension(source);
        GRAPH
            .iter()
            .find(|row| row.source == source)
            .map(|row| row.targets)
            .unwrap_or(&[])
    }

    /// Whether `target` is offered for `source`.
    pub fn is_reachable(source: &str, target: &str) -> bool {
        let target = normalize_extension(target);
        Self::targets(source)
            .iter()
            .any(|group| group.extensions.contains(&target.as_str()))
    }

    /// Extensions that appear as a conversion source.
    pub fn sources() -> impl Iterator<Item = &'static str> {
        GRAPH.iter().map(|row| row.source)
    }

    /// Every (source, target) pair in the graph.
    pub fn pairs() -> impl Iterator<Item = (&'static str, &'static str)> {
        GRAPH.iter().flat_map(|row| {
            row.targets
                .iter()
                .flat_map(move |group| group.extensions.iter().map(move |ext| (row.source, *ext)))
        })
    }
}
