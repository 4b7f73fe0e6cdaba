use super::{types::Config, ConfigError};

/// x264 presets accepted for `converter.video.preset`.
const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Validate configuration
/// Currently validates:
/// - CRF is within 0-51
/// - Preset is a known x264 preset
/// - Audio bitrate and diagnostic tail are non-zero
/// - Timeout, when set, is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let converter = &config.converter;

    if converter.video.crf > 51 {
        return Err(ConfigError::ValidationError(format!(
            "converter.video.crf must be between 0 and 51, got {}",
            converter.video.crf
        )));
    }

    if !X264_PRESETS.contains(&converter.video.preset.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "converter.video.preset '{}' is not an x264 preset",
            converter.video.preset
        )));
    }

    if converter.video.audio_bitrate_kbps == 0 {
        return Err(ConfigError::ValidationError(
            "converter.video.audio_bitrate_kbps cannot be 0".to_string(),
        ));
    }

    if converter.diagnostic_tail_lines == 0 {
        return Err(ConfigError::ValidationError(
            "converter.diagnostic_tail_lines cannot be 0".to_string(),
        ));
    }

    if converter.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "converter.timeout_secs cannot be 0; omit it to disable the timeout".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConverterConfig;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_crf_out_of_range() {
        let mut config = Config::default();
        config.converter.video.crf = 52;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_unknown_preset() {
        let mut config = Config::default();
        config.converter.video.preset = "ludicrous".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            converter: ConverterConfig::default().with_timeout(0),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_tail() {
        let config = Config {
            converter: ConverterConfig::default().with_diagnostic_tail(0),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
