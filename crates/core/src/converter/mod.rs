//! Converter module: strategies that turn one file format into another.
//!
//! [`ConversionEngine`] is the entry point. It validates a
//! [`ConversionRequest`] against the [`crate::format::FormatGraph`], hands the
//! job to the [`ConversionStrategy`] registered for its category pair and
//! reports a single [`ConversionOutcome`].
//!
//! # Strategies
//!
//! - [`TranscodeStrategy`]: video and audio through ffprobe/ffmpeg, with
//!   progress parsed from the transcoder's output
//! - [`ImageStrategy`]: raster images, in-process
//! - [`OfficeStrategy`]: documents to documents or PDF via headless LibreOffice
//! - [`PdfTextStrategy`]: PDF to documents by text extraction
//! - [`ArchiveStrategy`]: zip, tar and tar.gz repacking
//!
//! # Example
//!
//! ```ignore
//! use convertino_core::converter::{ConversionEngine, ConversionRequest, ConverterConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = ConversionEngine::new(ConverterConfig::default());
//! let token = CancellationToken::new();
//!
//! let request = ConversionRequest::new("/media/talk.mp4", "/media/talk.mp3")
//!     .with_progress(|percent| println!("{percent}%"))
//!     .with_cancellation(token.clone());
//!
//! match engine.convert(request).await {
//!     ConversionOutcome::Success => println!("done"),
//!     ConversionOutcome::Failed { kind, detail } => eprintln!("{kind}: {detail}"),
//!     ConversionOutcome::Cancelled => eprintln!("cancelled"),
//! }
//! ```

mod archive;
mod blocking;
mod cleanup;
mod config;
mod diagnostics;
mod engine;
mod error;
mod ffmpeg;
mod office;
mod pdf;
mod process;
mod progress;
mod raster;
mod traits;
mod types;

pub use archive::{ArchiveFormat, ArchiveStrategy};
pub use cleanup::remove_partial_output;
pub use config::{ConverterConfig, VideoProfile};
pub use diagnostics::{classify_diagnostics, DiagnosticLines, DiagnosticTail};
pub use engine::ConversionEngine;
pub use error::ConverterError;
pub use ffmpeg::TranscodeStrategy;
pub use office::OfficeStrategy;
pub use pdf::{render_html, PdfTextStrategy};
pub use progress::{is_usable_duration, percent_of, ProgressMarker, ProgressReporter};
pub use raster::ImageStrategy;
pub use traits::ConversionStrategy;
pub use types::{
    codecs_for_container, supports_faststart, AudioCodec, ConversionJob, ConversionOutcome,
    ConversionRequest, FailureKind, ProgressSink, StrategyKind, TranscodeProfile, VideoCodec,
};
