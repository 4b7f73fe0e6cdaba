//! Trait definitions for the converter module.

use async_trait::async_trait;

use super::error::ConverterError;
use super::types::ConversionJob;

/// One way of turning a source file into a target file.
///
/// Implementations write `job.target()`, report progress through
/// `job.progress`, and return [`ConverterError::Cancelled`] when they observe
/// `job.cancellation()`. Removing a partial target after failure is the
/// engine's job.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Returns the name of this strategy.
    fn name(&self) -> &str;

    /// Performs the conversion.
    async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::progress::ProgressReporter;
    use crate::converter::types::{ConversionRequest, StrategyKind};
    use crate::format::{ConversionPair, FormatCategory};

    struct CopyStrategy;

    #[async_trait]
    impl ConversionStrategy for CopyStrategy {
        fn name(&self) -> &str {
            "copy"
        }

        async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError> {
            if job.is_cancelled() {
                return Err(ConverterError::Cancelled);
            }
            tokio::fs::copy(job.source(), job.target()).await?;
            job.progress.complete();
            Ok(())
        }
    }

    fn job(source: &std::path::Path, target: &std::path::Path) -> ConversionJob {
        ConversionJob {
            request: ConversionRequest::new(source, target),
            pair: ConversionPair::new(FormatCategory::Document, FormatCategory::Document),
            kind: StrategyKind::Office,
            source_ext: "txt".to_string(),
            target_ext: "rtf".to_string(),
            progress: ProgressReporter::silent(),
        }
    }

    #[tokio::test]
    async fn test_strategy_executes() {
        let temp = tempfile::TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let target = temp.path().join("a.rtf");
        std::fs::write(&source, "hello").unwrap();

        let job = job(&source, &target);
        let strategy: &dyn ConversionStrategy = &CopyStrategy;
        strategy.execute(&job).await.unwrap();

        assert_eq!(strategy.name(), "copy");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
        assert_eq!(job.progress.last(), Some(100));
    }

    #[tokio::test]
    async fn test_strategy_errors_propagate() {
        let temp = tempfile::TempDir::new().unwrap();
        let job = job(&temp.path().join("missing.txt"), &temp.path().join("x.rtf"));
        let err = CopyStrategy.execute(&job).await.unwrap_err();
        assert!(matches!(err, ConverterError::Io(_)));
    }
}
