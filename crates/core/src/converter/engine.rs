//! Request validation, dispatch and outcome handling.

use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::archive::ArchiveStrategy;
use super::cleanup::remove_partial_output;
use super::config::ConverterConfig;
use super::error::ConverterError;
use super::ffmpeg::TranscodeStrategy;
use super::office::OfficeStrategy;
use super::pdf::PdfTextStrategy;
use super::progress::ProgressReporter;
use super::raster::ImageStrategy;
use super::traits::ConversionStrategy;
use super::types::{ConversionJob, ConversionOutcome, ConversionRequest, FailureKind, StrategyKind};
use crate::format::{classify, extension_of, ConversionPair, FormatGraph};
use crate::metrics;
use crate::resolver::ExecutableResolver;

/// Entry point for conversions.
///
/// Each call to [`ConversionEngine::convert`] validates the request, picks
/// the strategy for its category pair and always resolves to exactly one
/// [`ConversionOutcome`]. Failed or cancelled runs never leave a target
/// behind.
pub struct ConversionEngine {
    strategies: HashMap<StrategyKind, Arc<dyn ConversionStrategy>>,
}

impl ConversionEngine {
    /// Creates an engine whose tools are located from the live environment.
    pub fn new(config: ConverterConfig) -> Self {
        let resolver = ExecutableResolver::from_config(&config);
        Self::with_resolver(config, resolver)
    }

    /// Creates an engine using an explicit resolver.
    pub fn with_resolver(config: ConverterConfig, resolver: ExecutableResolver) -> Self {
        let resolver = Arc::new(resolver);
        let office = Arc::new(OfficeStrategy::new(config.clone(), resolver.clone()));

        let mut strategies: HashMap<StrategyKind, Arc<dyn ConversionStrategy>> = HashMap::new();
        strategies.insert(
            StrategyKind::Transcode,
            Arc::new(TranscodeStrategy::new(config.clone(), resolver)),
        );
        strategies.insert(StrategyKind::Image, Arc::new(ImageStrategy::new()));
        strategies.insert(StrategyKind::Office, office.clone());
        strategies.insert(
            StrategyKind::PdfText,
            Arc::new(PdfTextStrategy::new(config.clone(), office)),
        );
        strategies.insert(StrategyKind::Archive, Arc::new(ArchiveStrategy::new(config)));

        Self { strategies }
    }

    /// Replaces the strategy used for `kind`.
    pub fn with_strategy(
        mut self,
        kind: StrategyKind,
        strategy: Arc<dyn ConversionStrategy>,
    ) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    /// Validates a request without touching the filesystem.
    ///
    /// Both extensions must be known and the pair must be in [`FormatGraph`].
    pub fn prepare(&self, request: ConversionRequest) -> Result<ConversionJob, ConverterError> {
        let source_ext = extension_of(request.source_path()).unwrap_or_default();
        let target_ext = extension_of(request.target_path()).unwrap_or_default();
        let unsupported = || ConverterError::unsupported(&source_ext, &target_ext);

        let source = classify(&source_ext).ok_or_else(unsupported)?;
        let target = classify(&target_ext).ok_or_else(unsupported)?;
        let pair = ConversionPair::new(source, target);
        let kind = StrategyKind::for_pair(pair).ok_or_else(unsupported)?;
        if !FormatGraph::is_reachable(&source_ext, &target_ext) {
            return Err(unsupported());
        }

        let progress = ProgressReporter::new(request.progress_sink().cloned());
        Ok(ConversionJob {
            request,
            pair,
            kind,
            source_ext,
            target_ext,
            progress,
        })
    }

    /// Runs a conversion to completion.
    pub async fn convert(&self, request: ConversionRequest) -> ConversionOutcome {
        let span = info_span!(
            "convert",
            request_id = %request.id(),
            source = %request.source_path().display(),
            target = %request.target_path().display(),
            strategy = tracing::field::Empty,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: ConversionRequest) -> ConversionOutcome {
        let started = Instant::now();

        let job = match self.prepare(request) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Rejected conversion request");
                let outcome = e.into_outcome();
                metrics::record_outcome("none", &outcome, started.elapsed());
                return outcome;
            }
        };
        tracing::Span::current().record("strategy", job.kind.as_str());

        if job.is_cancelled() {
            info!("Cancelled before start");
            let outcome = ConversionOutcome::Cancelled;
            metrics::record_outcome(job.kind.as_str(), &outcome, started.elapsed());
            return outcome;
        }

        let outcome = self.dispatch(&job).await;

        if !outcome.is_success() {
            remove_partial_output(job.target()).await;
        }

        match &outcome {
            ConversionOutcome::Success => info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Conversion succeeded"
            ),
            ConversionOutcome::Failed { kind, detail } => {
                warn!(%kind, detail = %detail, "Conversion failed")
            }
            ConversionOutcome::Cancelled => info!("Conversion cancelled"),
        }
        metrics::record_outcome(job.kind.as_str(), &outcome, started.elapsed());
        outcome
    }

    async fn dispatch(&self, job: &ConversionJob) -> ConversionOutcome {
        if let Some(parent) = job.target().parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ConversionOutcome::failed(
                    FailureKind::IoFailure,
                    format!("Failed to create {}: {e}", parent.display()),
                );
            }
        }

        let Some(strategy) = self.strategies.get(&job.kind) else {
            return ConverterError::unsupported(&job.source_ext, &job.target_ext).into_outcome();
        };
        debug!(strategy = strategy.name(), pair = %job.pair, "Dispatching");

        match AssertUnwindSafe(strategy.execute(job)).catch_unwind().await {
            Ok(Ok(())) => ConversionOutcome::Success,
            Ok(Err(e)) => e.into_outcome(),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(strategy = strategy.name(), %message, "Strategy panicked");
                ConversionOutcome::failed(
                    FailureKind::ProcessFailure,
                    format!("{} strategy panicked: {message}", strategy.name()),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
