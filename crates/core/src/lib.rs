pub mod config;
pub mod converter;
pub mod format;
pub mod metrics;
pub mod resolver;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LoggingConfig,
};
pub use converter::{
    ConversionEngine, ConversionOutcome, ConversionRequest, ConverterConfig, ConverterError,
    FailureKind, StrategyKind,
};
pub use format::{FormatCategory, FormatGraph};
pub use resolver::{ExecutableResolver, ToolSpec};
pub use tokio_util::sync::CancellationToken;
