use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convertino_core::format::normalize_extension;
use convertino_core::{
    load_config, validate_config, CancellationToken, Config, ConversionEngine, ConversionOutcome,
    ConversionRequest, FormatGraph, LoggingConfig,
};

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "CONVERTINO_CONFIG";

/// Exit code used when a conversion is interrupted.
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "convertino", version, about = "Convert media, images, documents and archives")]
struct Cli {
    /// Configuration file (defaults to $CONVERTINO_CONFIG, then ./convertino.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert SOURCE into TARGET, picking the format from the extensions.
    Convert {
        source: PathBuf,
        target: PathBuf,
        /// Print the outcome as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// List the formats a source extension can be converted to.
    Targets { extension: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("convertino: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .or_else(|| {
            let local = PathBuf::from("convertino.toml");
            local.exists().then_some(local)
        });

    let config = match path {
        Some(path) => load_config(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(command: Command, config: Config) -> Result<ExitCode> {
    match command {
        Command::Convert {
            source,
            target,
            json,
        } => convert(config, source, target, json).await,
        Command::Targets { extension } => {
            list_targets(&extension);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn convert(config: Config, source: PathBuf, target: PathBuf, json: bool) -> Result<ExitCode> {
    let engine = ConversionEngine::new(config.converter);
    let token = CancellationToken::new();

    let watcher = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupt received, cancelling conversion");
        watcher.cancel();
    });

    let request = ConversionRequest::new(&source, &target)
        .with_cancellation(token)
        .with_progress(|percent: u8| eprintln!("progress: {percent}%"));
    info!(request_id = %request.id(), "Converting {:?} -> {:?}", source, target);

    let outcome = engine.convert(request).await;

    if json {
        println!(
            "{}",
            serde_json::to_string(&outcome).context("Failed to serialize outcome")?
        );
    }

    Ok(match outcome {
        ConversionOutcome::Success => {
            if !json {
                println!("{}", target.display());
            }
            ExitCode::SUCCESS
        }
        ConversionOutcome::Failed { kind, detail } => {
            if !json {
                eprintln!("convertino: {kind}: {detail}");
            }
            ExitCode::FAILURE
        }
        ConversionOutcome::Cancelled => {
            if !json {
                eprintln!("convertino: cancelled");
            }
            ExitCode::from(EXIT_CANCELLED)
        }
    })
}

fn list_targets(extension: &str) {
    let extension = normalize_extension(extension);
    let groups = FormatGraph::targets(&extension);
    if groups.is_empty() {
        println!("{extension}: no known conversions");
        return;
    }
    for group in groups {
        println!("{}: {}", group.category, group.extensions.join(", "));
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_convert() {
        let cli = Cli::parse_from(["convertino", "convert", "in.mp4", "out.mp3", "--json"]);
        match cli.command {
            Command::Convert {
                source,
                target,
                json,
            } => {
                assert_eq!(source, PathBuf::from("in.mp4"));
                assert_eq!(target, PathBuf::from("out.mp3"));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::parse_from(["convertino", "targets", "png", "--config", "c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        assert!(load(Some(Path::new("/nonexistent/convertino.toml"))).is_err());
    }
}
