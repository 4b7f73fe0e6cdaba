//! Running synchronous codec work off the async runtime.

use super::error::ConverterError;
use super::types::FailureKind;

/// Runs `work` on the blocking pool, turning a panic into a process failure.
pub(crate) async fn run_blocking<T, F>(label: &'static str, work: F) -> Result<T, ConverterError>
where
    F: FnOnce() -> Result<T, ConverterError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        ConverterError::library(FailureKind::ProcessFailure, format!("{label} task failed: {e}"))
    })?
}
