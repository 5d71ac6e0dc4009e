mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, Layer,
};

use commands::{CheckArgs, InputArgs};
use iptv_checker::config::Config;
use iptv_checker::scheduler::ShutdownHandle;

#[derive(Parser)]
#[command(
    name = "iptv-checker",
    version,
    about = "Check IPTV playlist streams and split them into working and broken playlists",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check playlist streams and write working/broken playlists
    Check(CheckArgs),

    /// Show which playlists are already fully checked
    Status {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Remove outputs of incomplete runs
    Cleanup {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    // Initialize tracing/logging
    setup_tracing(&config, cli.verbose)?;

    tracing::info!("iptv-checker starting");

    match cli.command {
        Commands::Check(args) => {
            tracing::info!(
                file = ?args.input.file,
                dir = ?args.input.dir,
                force = %args.force,
                "Starting check command"
            );

            let shutdown = ShutdownHandle::new();
            spawn_ctrl_c_handler(shutdown.clone());
            commands::check(config, args, shutdown).await?;
        }

        Commands::Status { input } => {
            tracing::info!(file = ?input.file, dir = ?input.dir, "Starting status command");
            commands::status(config, input)?;
        }

        Commands::Cleanup { input } => {
            tracing::info!(file = ?input.file, dir = ?input.dir, "Starting cleanup command");
            commands::cleanup(config, input)?;
        }
    }

    tracing::info!("iptv-checker completed successfully");
    Ok(())
}

fn spawn_ctrl_c_handler(shutdown: ShutdownHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight checks");
            shutdown.trigger();
        }
    });
}

fn setup_tracing(config: &Config, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("iptv_checker=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!(
                "iptv_checker={},warn",
                config.logging.level.to_lowercase()
            ))
        })
    };

    let log_file = match &config.logging.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(file)
        }
        None => None,
    };

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .with(file_layer(log_file))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(file_layer(log_file))
                .init();
        }
    }

    Ok(())
}

fn file_layer<S>(file: Option<File>) -> Option<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    })
}
