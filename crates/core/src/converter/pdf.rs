//! PDF to document conversion via text extraction.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::blocking::run_blocking;
use super::config::ConverterConfig;
use super::error::ConverterError;
use super::office::OfficeStrategy;
use super::traits::ConversionStrategy;
use super::types::{ConversionJob, FailureKind};

/// Extracts a PDF's text layer and writes it in the target format.
///
/// `txt` and `html` are written directly; other document formats are
/// produced by handing the extracted text to [`OfficeStrategy`]. Layout,
/// images and fonts are not carried over.
pub struct PdfTextStrategy {
    config: ConverterConfig,
    office: Arc<OfficeStrategy>,
}

impl PdfTextStrategy {
    pub fn new(config: ConverterConfig, office: Arc<OfficeStrategy>) -> Self {
        Self { config, office }
    }

    /// Reads the text layer of `source`.
    pub fn extract_text(source: &Path) -> Result<String, ConverterError> {
        std::fs::metadata(source)?;
        pdf_extract::extract_text(source).map_err(|e| {
            ConverterError::library(
                FailureKind::CorruptInput,
                format!("Invalid data found in PDF: {e}"),
            )
        })
    }

    async fn write_via_office(
        &self,
        job: &ConversionJob,
        text: &str,
    ) -> Result<(), ConverterError> {
        let parent = self
            .config
            .temp_dir
            .clone()
            .or_else(|| job.target().parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(std::env::temp_dir);
        let scratch = tempfile::Builder::new()
            .prefix(".convertino-pdf-")
            .tempdir_in(parent)?;

        let stem = job
            .source()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let intermediate: PathBuf = scratch.path().join(format!("{stem}.txt"));
        tokio::fs::write(&intermediate, text).await?;

        let result = self
            .office
            .convert_file(&intermediate, job.target(), &job.target_ext, job.cancellation())
            .await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove pdf scratch directory");
        }
        result
    }
}

/// Wraps plain text in a minimal HTML document, one `<p>` per paragraph.
pub fn render_html(title: &str, text: &str) -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", escape_html(title)));

    let normalized = text.replace("\r\n", "\n");
    for paragraph in normalized.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let lines: Vec<String> = paragraph.lines().map(escape_html).collect();
        html.push_str(&format!("<p>{}</p>\n", lines.join("<br>\n")));
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[async_trait]
impl ConversionStrategy for PdfTextStrategy {
    fn name(&self) -> &str {
        "pdf_text"
    }

    async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        let source = job.source().to_path_buf();
        let text = run_blocking("pdf extract", move || Self::extract_text(&source)).await?;
        debug!(chars = text.len(), "Extracted PDF text");

        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        match job.target_ext.as_str() {
            "txt" => tokio::fs::write(job.target(), &text).await?,
            "html" => {
                let title = job
                    .source()
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                tokio::fs::write(job.target(), render_html(&title, &text)).await?
            }
            _ => self.write_via_office(job, &text).await?,
        }

        job.progress.complete();
        Ok(())
    }
}
