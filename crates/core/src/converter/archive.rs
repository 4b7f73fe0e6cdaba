//! Repacking between archive formats through a scratch directory.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::blocking::run_blocking;
use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::ConversionStrategy;
use super::types::{ConversionJob, FailureKind};

/// Progress reported once extraction has finished.
const EXTRACTED_PERCENT: u8 = 50;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Archive containers with a read and write backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    /// Gzip-compressed tar, named by its `gz` extension.
    TarGz,
}

impl ArchiveFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "zip" => Some(Self::Zip),
            "tar" => Some(Self::Tar),
            "gz" | "tgz" => Some(Self::TarGz),
            _ => None,
        }
    }

    /// Unpacks `archive` into `dest`. Returns the number of files written.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<usize, ConverterError> {
        let file = File::open(archive)?;
        match self {
            Self::Zip => {
                let mut zip = ZipArchive::new(BufReader::new(file)).map_err(zip_error)?;
                zip.extract(dest).map_err(zip_error)?;
            }
            // Compression is detected from content, so a gzipped `.tar` or a
            // plain `.gz` tar still unpacks.
            Self::Tar | Self::TarGz => {
                let mut reader = BufReader::new(file);
                let unpacked = if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
                    tar::Archive::new(GzDecoder::new(reader)).unpack(dest)
                } else {
                    tar::Archive::new(reader).unpack(dest)
                };
                unpacked.map_err(unpack_error)?;
            }
        }
        Ok(collect_files(dest)?.len())
    }

    /// Packs every file under `root` into `target`. Returns the entry count.
    pub fn pack(&self, root: &Path, target: &Path) -> Result<usize, ConverterError> {
        let files = collect_files(root)?;
        let out = BufWriter::new(File::create(target)?);

        match self {
            Self::Zip => {
                let mut writer = ZipWriter::new(out);
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                for (path, relative) in &files {
                    writer
                        .start_file(zip_entry_name(relative), options)
                        .map_err(zip_error)?;
                    io::copy(&mut File::open(path)?, &mut writer)?;
                }
                writer.finish().map_err(zip_error)?.flush()?;
            }
            Self::Tar => {
                let mut builder = tar::Builder::new(out);
                for (path, relative) in &files {
                    builder.append_path_with_name(path, relative)?;
                }
                builder.into_inner()?.flush()?;
            }
            Self::TarGz => {
                let mut builder =
                    tar::Builder::new(GzEncoder::new(out, Compression::default()));
                for (path, relative) in &files {
                    builder.append_path_with_name(path, relative)?;
                }
                builder.into_inner()?.finish()?.flush()?;
            }
        }
        Ok(files.len())
    }
}

/// Regular files under `root` as (absolute, relative) pairs in a stable order.
fn collect_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>, ConverterError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::other(e.to_string()))?
            .to_path_buf();
        files.push((entry.into_path(), relative));
    }
    Ok(files)
}

fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn zip_error(err: ZipError) -> ConverterError {
    match err {
        ZipError::Io(e) => unpack_error(e),
        other => ConverterError::library(
            FailureKind::CorruptInput,
            format!("Invalid data found in zip archive: {other}"),
        ),
    }
}

fn unpack_error(err: io::Error) -> ConverterError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidInput => {
            ConverterError::library(
                FailureKind::CorruptInput,
                format!("Invalid data found in archive: {err}"),
            )
        }
        _ => ConverterError::Io(err),
    }
}

/// Extracts the source into a scratch directory, then packs it as the target.
pub struct ArchiveStrategy {
    config: ConverterConfig,
}

impl ArchiveStrategy {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
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

    async fn repack(
        &self,
        job: &ConversionJob,
        source_format: ArchiveFormat,
        target_format: ArchiveFormat,
        scratch: &Path,
    ) -> Result<(), ConverterError> {
        let source = job.source().to_path_buf();
        let dir = scratch.to_path_buf();
        let extracted =
            run_blocking("archive extract", move || source_format.extract(&source, &dir)).await?;
        debug!(files = extracted, "Extracted archive");
        job.progress.report(EXTRACTED_PERCENT);

        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        let target = job.target().to_path_buf();
        let dir = scratch.to_path_buf();
        let packed =
            run_blocking("archive pack", move || target_format.pack(&dir, &target)).await?;
        debug!(files = packed, "Packed archive");
        job.progress.complete();
        Ok(())
    }
}

#[async_trait]
impl ConversionStrategy for ArchiveStrategy {
    fn name(&self) -> &str {
        "archive"
    }

    async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        let source_format = ArchiveFormat::from_extension(&job.source_ext)
            .ok_or_else(|| ConverterError::unsupported(&job.source_ext, &job.target_ext))?;
        let target_format = ArchiveFormat::from_extension(&job.target_ext)
            .ok_or_else(|| ConverterError::unsupported(&job.source_ext, &job.target_ext))?;
        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        let parent = self.scratch_parent(job.target());
        let scratch = tempfile::Builder::new()
            .prefix(".convertino-archive-")
            .tempdir_in(&parent)?;

        let result = self
            .repack(job, source_format, target_format, scratch.path())
            .await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove archive scratch directory");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        std::fs::create_dir_all(root.join("nested/deeper")).unwrap();
        std::fs::write(root.join("a.txt"), b"alpha").unwrap();
        std::fs::write(root.join("nested/b.bin"), [0u8, 1, 2, 3, 255]).unwrap();
        std::fs::write(root.join("nested/deeper/c.md"), b"# c").unwrap();
    }

    fn assert_same_tree(expected: &Path, actual: &Path) {
        let left = collect_files(expected).unwrap();
        let right = collect_files(actual).unwrap();
        let names = |files: &[(PathBuf, PathBuf)]| {
            files.iter().map(|(_, rel)| rel.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(&left), names(&right));
        for ((a, _), (b, _)) in left.iter().zip(right.iter()) {
            assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ArchiveFormat::from_extension("zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_extension("gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_extension("rar"), None);
        assert_eq!(ArchiveFormat::from_extension("7z"), None);
    }

    #[test]
    fn test_pack_then_extract_each_format() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("original");
        populate(&original);

        for (format, name) in [
            (ArchiveFormat::Zip, "out.zip"),
            (ArchiveFormat::Tar, "out.tar"),
            (ArchiveFormat::TarGz, "out.tar.gz"),
        ] {
            let archive = temp.path().join(name);
            assert_eq!(format.pack(&original, &archive).unwrap(), 3);

            let unpacked = temp.path().join(format!("unpacked-{name}"));
            std::fs::create_dir_all(&unpacked).unwrap();
            assert_eq!(format.extract(&archive, &unpacked).unwrap(), 3);
            assert_same_tree(&original, &unpacked);
        }
    }

    #[test]
    fn test_tar_compression_is_detected_from_content() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("original");
        populate(&original);

        // Gzipped content behind a `.tar` name, plain tar behind a `.gz` name.
        let gzipped = temp.path().join("mislabelled.tar");
        ArchiveFormat::TarGz.pack(&original, &gzipped).unwrap();
        let plain = temp.path().join("mislabelled.gz");
        ArchiveFormat::Tar.pack(&original, &plain).unwrap();

        for (format, archive) in [(ArchiveFormat::Tar, &gzipped), (ArchiveFormat::TarGz, &plain)] {
            let unpacked = temp.path().join(format!("unpacked-{format:?}"));
            std::fs::create_dir_all(&unpacked).unwrap();
            assert_eq!(format.extract(archive, &unpacked).unwrap(), 3);
            assert_same_tree(&original, &unpacked);
        }
    }

    #[test]
    fn test_zip_entry_names_use_forward_slashes() {
        assert_eq!(zip_entry_name(Path::new("nested/deeper/c.md")), "nested/deeper/c.md");
    }

    #[test]
    fn test_corrupt_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.zip");
        std::fs::write(&archive, b"this is not a zip file at all").unwrap();

        let err = ArchiveFormat::Zip
            .extract(&archive, temp.path())
            .unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::CorruptInput));
    }

    #[test]
    fn test_missing_archive_is_io_failure() {
        let temp = TempDir::new().unwrap();
        let err = ArchiveFormat::Tar
            .extract(&temp.path().join("missing.tar"), temp.path())
            .unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::IoFailure));
    }
}
