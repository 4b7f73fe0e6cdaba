//! Removal of partially written targets.

use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::metrics;

/// Deletes `path` if it exists.
///
/// A failure here is logged and counted but never replaces the outcome that
/// triggered the cleanup. Returns whether the path is gone afterwards.
pub async fn remove_partial_output(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed partial output");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove partial output");
            metrics::PARTIAL_CLEANUP_FAILURES.inc();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_removes_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("half.mp4");
        std::fs::write(&path, b"partial").unwrap();

        assert!(remove_partial_output(&path).await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_fine() {
        let temp = TempDir::new().unwrap();
        assert!(remove_partial_output(&temp.path().join("never.mp4")).await);
    }

    #[tokio::test]
    async fn test_directory_is_reported() {
        let temp = TempDir::new().unwrap();
        assert!(!remove_partial_output(temp.path()).await);
        assert!(temp.path().exists());
    }
}
