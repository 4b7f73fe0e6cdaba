//! Testing utilities: fake external tools and scriptable strategies.
//!
//! [`FakeToolchain`] writes small shell scripts named `ffprobe`, `ffmpeg` and
//! `soffice` into a temporary directory and points a resolver at it, so the
//! real process supervision code runs without the real binaries.
//! [`MockStrategy`] replaces a strategy outright for dispatcher tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use convertino_core::testing::{FakeToolchain, TranscoderScript};
//!
//! let tools = FakeToolchain::new()?;
//! tools.install_prober("120.0")?;
//! tools.install_transcoder(
//!     TranscoderScript::new().stdout_line("out_time=00:01:00.000000"),
//! )?;
//!
//! let engine = tools.engine(ConverterConfig::default());
//! let outcome = engine.convert(ConversionRequest::new("in.mp4", "out.mp3")).await;
//! ```

#[cfg(unix)]
mod fake_toolchain;
mod mock_strategy;

#[cfg(unix)]
pub use fake_toolchain::{FakeToolchain, OfficeBehaviour, TranscoderScript};
pub use mock_strategy::{MockBehaviour, MockStrategy};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io;
    use std::path::{Path, PathBuf};

    /// Writes a small gradient PNG.
    pub fn write_png(path: &Path, width: u32, height: u32) -> Result<(), image::ImageError> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 96, 255])
        });
        img.save_with_format(path, image::ImageFormat::Png)
    }

    /// Creates a small nested directory tree and returns its relative file paths.
    pub fn populate_tree(root: &Path) -> io::Result<Vec<PathBuf>> {
        let files = [
            ("readme.txt", b"top level".to_vec()),
            ("data/values.csv", b"a,b\n1,2\n".to_vec()),
            ("data/raw/blob.bin", vec![0u8, 7, 42, 255, 128]),
        ];
        let mut written = Vec::new();
        for (relative, contents) in files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, contents)?;
            written.push(PathBuf::from(relative));
        }
        Ok(written)
    }
}
