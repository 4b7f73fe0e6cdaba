//! Error types for the converter module.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::diagnostics::classify_diagnostics;
use super::types::{ConversionOutcome, FailureKind};

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// No strategy handles this extension pair.
    #[error("Unsupported conversion: {source_ext} -> {target_ext}")]
    UnsupportedFormat {
        source_ext: String,
        target_ext: String,
    },

    /// The operating system could not launch the tool.
    #[error("{tool} could not be launched from {path}")]
    ExecutableNotFound {
        tool: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to determine the source's duration.
    #[error("Failed to probe media duration: {reason}")]
    ProbeFailed { reason: String },

    /// External process failed or produced no output.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        diagnostics: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// An in-process codec or parser rejected the input.
    #[error("{reason}")]
    Library { kind: FailureKind, reason: String },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Job was cancelled.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl ConverterError {
    pub fn unsupported(source_ext: impl Into<String>, target_ext: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            source_ext: source_ext.into(),
            target_ext: target_ext.into(),
        }
    }

    /// Creates a new conversion failed error with diagnostic output.
    pub fn conversion_failed(reason: impl Into<String>, diagnostics: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            diagnostics,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    pub fn library(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Library {
            kind,
            reason: reason.into(),
        }
    }

    /// Failure category, or `None` for cancellation.
    pub fn kind(&self) -> Option<FailureKind> {
        let kind = match self {
            Self::UnsupportedFormat { .. } => FailureKind::UnsupportedFormat,
            Self::ExecutableNotFound { .. } => FailureKind::ExecutableNotFound,
            Self::ProbeFailed { .. } => FailureKind::ProbeFailure,
            Self::ConversionFailed {
                reason,
                diagnostics,
            } => classify_diagnostics(diagnostics.as_deref().unwrap_or(reason)),
            Self::Timeout { .. } => FailureKind::ProcessFailure,
            Self::Library { kind, .. } => *kind,
            Self::Io(_) => FailureKind::IoFailure,
            Self::Cancelled => return None,
        };
        Some(kind)
    }

    /// Text surfaced to the caller as the failure detail.
    ///
    /// Process failures carry the tool's own diagnostic output.
    pub fn detail(&self) -> String {
        match self {
            Self::ConversionFailed {
                diagnostics: Some(text),
                ..
            } if !text.trim().is_empty() => text.clone(),
            other => other.to_string(),
        }
    }

    pub fn into_outcome(self) -> ConversionOutcome {
        match self.kind() {
            Some(kind) => ConversionOutcome::failed(kind, self.detail()),
            None => ConversionOutcome::Cancelled,
        }
    }
}
