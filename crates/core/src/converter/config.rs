//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the conversion engine.
///
/// Every tool path is optional; unset tools are located by
/// [`crate::resolver::ExecutableResolver`] on each conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Explicit path to the ffmpeg binary.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit path to the ffprobe binary.
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Explicit path to the LibreOffice `soffice` binary.
    #[serde(default)]
    pub soffice_path: Option<PathBuf>,

    /// Directory shipped alongside the application with bundled tools.
    #[serde(default)]
    pub bundle_dir: Option<PathBuf>,

    /// Install roots searched after the platform defaults.
    #[serde(default)]
    pub extra_install_roots: Vec<PathBuf>,

    /// Scratch directory for archive repacking and office output.
    /// Defaults to the target's directory.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Timeout for a single external process in seconds. Unset means none.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Diagnostic lines kept for failure details.
    #[serde(default = "default_tail_lines")]
    pub diagnostic_tail_lines: usize,

    /// Video re-encode settings.
    #[serde(default)]
    pub video: VideoProfile,
}

/// Encoder settings for video to video conversions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProfile {
    /// x264 preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor (0-51).
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio bitrate for the re-encoded audio stream.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
}

fn default_tail_lines() -> usize {
    64
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u8 {
    23
}

fn default_audio_bitrate() -> u32 {
    128
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            crf: default_crf(),
            audio_bitrate_kbps: default_audio_bitrate(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            soffice_path: None,
            bundle_dir: None,
            extra_install_roots: Vec::new(),
            temp_dir: None,
            timeout_secs: None,
            diagnostic_tail_lines: default_tail_lines(),
            video: VideoProfile::default(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path: Some(ffmpeg_path),
            ffprobe_path: Some(ffprobe_path),
            ..Default::default()
        }
    }

    /// Sets the soffice path.
    pub fn with_soffice(mut self, soffice_path: PathBuf) -> Self {
        self.soffice_path = Some(soffice_path);
        self
    }

    /// Sets the bundled-resources directory.
    pub fn with_bundle_dir(mut self, bundle_dir: PathBuf) -> Self {
        self.bundle_dir = Some(bundle_dir);
        self
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = Some(temp_dir);
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Sets how many diagnostic lines are retained.
    pub fn with_diagnostic_tail(mut self, lines: usize) -> Self {
        self.diagnostic_tail_lines = lines;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.ffmpeg_path, None);
        assert_eq!(config.timeout_secs, None);
        assert_eq!(config.diagnostic_tail_lines, 64);
        assert_eq!(config.video.preset, "medium");
        assert_eq!(config.video.crf, 23);
        assert_eq!(config.video.audio_bitrate_kbps, 128);
    }

    #[test]
    fn test_config_builder() {
        let config = ConverterConfig::with_paths(
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffprobe"),
        )
        .with_soffice(PathBuf::from("/opt/libreoffice/program/soffice"))
        .with_temp_dir(PathBuf::from("/tmp/test"))
        .with_timeout(7200)
        .with_diagnostic_tail(16);

        assert_eq!(
            config.ffmpeg_path,
            Some(PathBuf::from("/usr/local/bin/ffmpeg"))
        );
        assert_eq!(config.temp_dir, Some(PathBuf::from("/tmp/test")));
        assert_eq!(config.timeout_secs, Some(7200));
        assert_eq!(config.diagnostic_tail_lines, 16);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ConverterConfig = toml::from_str(
            r#"
timeout_secs = 30

[video]
crf = 18
"#,
        )
        .unwrap();
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.video.crf, 18);
        assert_eq!(config.video.preset, "medium");
        assert_eq!(config.diagnostic_tail_lines, 64);
    }

    #[test]
    fn test_config_serialization() {
        let config = ConverterConfig::default().with_bundle_dir(PathBuf::from("/app/resources"));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ConverterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bundle_dir, config.bundle_dir);
        assert_eq!(parsed.video, config.video);
    }
}
