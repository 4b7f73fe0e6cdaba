//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::progress::ProgressReporter;
use crate::format::{ConversionPair, FormatCategory};

/// Callback receiving progress percentages in `[0, 100]`.
pub type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

/// Closed taxonomy of conversion failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No strategy handles the extension pair.
    UnsupportedFormat,
    /// A required external tool could not be launched.
    ExecutableNotFound,
    /// The source's duration could not be determined.
    ProbeFailure,
    /// The source is not a valid file of its claimed format.
    CorruptInput,
    /// The source decoded partially and then failed.
    DecodeError,
    /// The external tool or library failed for another reason.
    ProcessFailure,
    /// A filesystem operation failed.
    IoFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnsupportedFormat => "unsupported_format",
            FailureKind::ExecutableNotFound => "executable_not_found",
            FailureKind::ProbeFailure => "probe_failure",
            FailureKind::CorruptInput => "corrupt_input",
            FailureKind::DecodeError => "decode_error",
            FailureKind::ProcessFailure => "process_failure",
            FailureKind::IoFailure => "io_failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a conversion request. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Success,
    Failed { kind: FailureKind, detail: String },
    Cancelled,
}

impl ConversionOutcome {
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A caller's request to convert one file into another.
///
/// Built once with the `with_*` methods, then handed to the engine.
#[derive(Clone)]
pub struct ConversionRequest {
    id: Uuid,
    source_path: PathBuf,
    target_path: PathBuf,
    progress: Option<ProgressSink>,
    cancellation: CancellationToken,
}

impl ConversionRequest {
    pub fn new(source_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_path: source_path.into(),
            target_path: target_path.into(),
            progress: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attaches a progress callback.
    pub fn with_progress<F>(mut self, sink: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(sink));
        self
    }

    /// Uses `token` to signal cancellation instead of a private one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn progress_sink(&self) -> Option<&ProgressSink> {
        self.progress.as_ref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("id", &self.id)
            .field("source_path", &self.source_path)
            .field("target_path", &self.target_path)
            .field("has_progress", &self.progress.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// Which strategy family owns a category pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// External transcoder (video and audio).
    Transcode,
    /// In-process raster image re-encoding.
    Image,
    /// Headless office suite.
    Office,
    /// PDF text extraction.
    PdfText,
    /// Extract-and-repack between archive formats.
    Archive,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Transcode,
        StrategyKind::Image,
        StrategyKind::Office,
        StrategyKind::PdfText,
        StrategyKind::Archive,
    ];

    pub fn for_pair(pair: ConversionPair) -> Option<Self> {
        use FormatCategory::*;
        match (pair.source, pair.target) {
            (Video, Video) | (Video, Audio) | (Audio, Audio) => Some(Self::Transcode),
            (Image, Image) => Some(Self::Image),
            (Document, Document) | (Document, Pdf) => Some(Self::Office),
            (Pdf, Document) => Some(Self::PdfText),
            (Archive, Archive) => Some(Self::Archive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Transcode => "transcode",
            StrategyKind::Image => "image",
            StrategyKind::Office => "office",
            StrategyKind::PdfText => "pdf_text",
            StrategyKind::Archive => "archive",
        }
    }
}

/// How the transcoder is driven for a category pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeProfile {
    /// Video to video; progress read from the diagnostic stream.
    VideoReencode,
    /// Video to audio; video dropped, progress on stdout.
    AudioExtract,
    /// Audio to audio; progress on stdout.
    AudioTranscode,
}

impl TranscodeProfile {
    pub fn for_pair(pair: ConversionPair) -> Option<Self> {
        use FormatCategory::*;
        match (pair.source, pair.target) {
            (Video, Video) => Some(Self::VideoReencode),
            (Video, Audio) => Some(Self::AudioExtract),
            (Audio, Audio) => Some(Self::AudioTranscode),
            _ => None,
        }
    }

    /// Whether progress markers arrive on stdout (`-progress pipe:1`).
    pub fn reports_on_stdout(&self) -> bool {
        !matches!(self, Self::VideoReencode)
    }
}

/// Video encoder selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Vp9,
}

impl VideoCodec {
    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Vp9 => "libvpx-vp9",
        }
    }
}

/// Audio encoder used alongside a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Opus,
}

impl AudioCodec {
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Opus => "libopus",
        }
    }
}

/// Encoder choice for a video container extension.
pub fn codecs_for_container(extension: &str) -> (VideoCodec, AudioCodec) {
    match extension {
        "webm" => (VideoCodec::Vp9, AudioCodec::Opus),
        _ => (VideoCodec::H264, AudioCodec::Aac),
    }
}

/// Containers that benefit from moving the index to the front.
pub fn supports_faststart(extension: &str) -> bool {
    matches!(extension, "mp4" | "mov" | "m4v")
}

/// A validated request, as handed to a strategy.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub request: ConversionRequest,
    pub pair: ConversionPair,
    pub kind: StrategyKind,
    pub source_ext: String,
    pub target_ext: String,
    pub progress: ProgressReporter,
}

impl ConversionJob {
    pub fn source(&self) -> &Path {
        self.request.source_path()
    }

    pub fn target(&self) -> &Path {
        self.request.target_path()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.request.cancellation_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.request.cancellation_token().is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_strategy_kind_covers_exactly_supported_pairs() {
        for source in FormatCategory::ALL {
            for target in FormatCategory::ALL {
                let pair = ConversionPair::new(source, target);
                assert_eq!(
                    StrategyKind::for_pair(pair).is_some(),
                    pair.is_supported(),
                    "{pair}"
                );
            }
        }
    }

    #[test]
    fn test_transcode_profile_conventions() {
        let pair = ConversionPair::new(FormatCategory::Video, FormatCategory::Audio);
        let profile = TranscodeProfile::for_pair(pair).unwrap();
        assert_eq!(profile, TranscodeProfile::AudioExtract);
        assert!(profile.reports_on_stdout());
        assert!(!TranscodeProfile::VideoReencode.reports_on_stdout());
        assert!(TranscodeProfile::for_pair(ConversionPair::new(
            FormatCategory::Image,
            FormatCategory::Image
        ))
        .is_none());
    }

    #[test]
    fn test_container_codecs() {
        assert_eq!(
            codecs_for_container("webm"),
            (VideoCodec::Vp9, AudioCodec::Opus)
        );
        assert_eq!(
            codecs_for_container("mkv"),
            (VideoCodec::H264, AudioCodec::Aac)
        );
        assert!(supports_faststart("m4v"));
        assert!(!supports_faststart("avi"));
    }

    #[test]
    fn test_request_builder() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let token = CancellationToken::new();
        let request = ConversionRequest::new("/in/a.mp4", "/out/a.mp3")
            .with_progress(move |p| sink.lock().unwrap().push(p))
            .with_cancellation(token.clone());

        assert_eq!(request.source_path(), Path::new("/in/a.mp4"));
        assert_eq!(request.target_path(), Path::new("/out/a.mp3"));
        (request.progress_sink().unwrap())(7);
        assert_eq!(*seen.lock().unwrap(), vec![7]);

        token.cancel();
        assert!(request.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = ConversionRequest::new("a.png", "a.bmp");
        let b = ConversionRequest::new("a.png", "a.bmp");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ConversionOutcome::failed(FailureKind::CorruptInput, "bad header");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "corrupt_input");
        assert_eq!(outcome.failure_kind(), Some(FailureKind::CorruptInput));
        assert_eq!(ConversionOutcome::Cancelled.label(), "cancelled");
    }
}
