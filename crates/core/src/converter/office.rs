//! Document conversion through a headless LibreOffice.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::process::{drain, spawn_error, wait_for_exit, Exit};
use super::traits::ConversionStrategy;
use super::types::ConversionJob;
use crate::resolver::{ExecutableHandle, ExecutableResolver, ToolSpec};

/// Runs `soffice --headless --convert-to` and moves the result into place.
///
/// LibreOffice picks the output name itself (`<stem>.<ext>` inside
/// `--outdir`), so conversions go through a scratch directory.
pub struct OfficeStrategy {
    config: ConverterConfig,
    resolver: Arc<ExecutableResolver>,
}

impl OfficeStrategy {
    pub fn new(config: ConverterConfig, resolver: Arc<ExecutableResolver>) -> Self {
        Self { config, resolver }
    }

    /// Converts `source` to `target` in the `target_ext` format.
    pub async fn convert_file(
        &self,
        source: &Path,
        target: &Path,
        target_ext: &str,
        token: &CancellationToken,
    ) -> Result<(), ConverterError> {
        let soffice = self.resolver.resolve(ToolSpec::SOFFICE);
        let scratch = tempfile::Builder::new()
            .prefix(".convertino-office-")
            .tempdir_in(self.scratch_parent(target))?;

        let result = self
            .run(&soffice, source, target, target_ext, scratch.path(), token)
            .await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove office scratch directory");
        }
        result
    }

    fn scratch_parent(&self, target: &Path) -> PathBuf {
        self.config
            .temp_dir
            .clone()
            .or_else(|| {
                target
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
            .unwrap_or_else(std::env::temp_dir)
    }

    async fn run(
        &self,
        soffice: &ExecutableHandle,
        source: &Path,
        target: &Path,
        target_ext: &str,
        outdir: &Path,
        token: &CancellationToken,
    ) -> Result<(), ConverterError> {
        debug!(source = %source.display(), target_ext, "Starting soffice");
        let mut child = soffice
            .command()
            .arg("--headless")
            .arg("--convert-to")
            .arg(target_ext)
            .arg("--outdir")
            .arg(outdir)
            .arg(source)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(soffice, e))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let exit = wait_for_exit(&mut child, token, self.config.timeout_secs).await?;
        let status = match exit {
            Exit::Status(status) => status,
            Exit::Cancelled => return Err(ConverterError::Cancelled),
            Exit::TimedOut(timeout_secs) => return Err(ConverterError::Timeout { timeout_secs }),
        };

        let mut diagnostics = String::new();
        for handle in [stderr, stdout].into_iter().flatten() {
            if let Ok(text) = handle.await {
                diagnostics.push_str(text.trim());
                diagnostics.push('\n');
            }
        }
        let diagnostics = diagnostics.trim().to_string();

        // soffice exits 0 even when a filter fails, so the file is the real signal.
        let produced = produced_path(outdir, source, target_ext);
        if !status.success() || !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            let reason = if status.success() {
                format!("soffice did not produce {}", produced.display())
            } else {
                format!("soffice exited with {status}")
            };
            return Err(ConverterError::conversion_failed(
                reason,
                Some(diagnostics).filter(|d| !d.is_empty()),
            ));
        }

        move_into_place(&produced, target).await
    }
}

/// Where LibreOffice writes its output for `source`.
fn produced_path(outdir: &Path, source: &Path, target_ext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    outdir.join(format!("{stem}.{target_ext}"))
}

/// Renames when possible, copying across filesystems otherwise.
async fn move_into_place(from: &Path, to: &Path) -> Result<(), ConverterError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

#[async_trait]
impl ConversionStrategy for OfficeStrategy {
    fn name(&self) -> &str {
        "soffice"
    }

    async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }
        self.convert_file(job.source(), job.target(), &job.target_ext, job.cancellation())
            .await?;
        job.progress.complete();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_produced_path_uses_source_stem() {
        let path = produced_path(Path::new("/tmp/out"), Path::new("/docs/report.v2.docx"), "pdf");
        assert_eq!(path, PathBuf::from("/tmp/out/report.v2.pdf"));
    }

    #[tokio::test]
    async fn test_move_into_place() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("a.pdf");
        let to = temp.path().join("b.pdf");
        std::fs::write(&from, b"%PDF").unwrap();

        move_into_place(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"%PDF");
    }
}
