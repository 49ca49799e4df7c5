//! filedrop command-line entry point.

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use filedrop_transfer::{Dispatcher, Progress, Sender};

use crate::config::Config;

/// filedrop - send a single file over TCP
#[derive(Parser)]
#[command(name = "filedrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive files until interrupted
    Serve {
        /// Listen address
        #[arg(short, long)]
        bind: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Send one file to a receiver
    Send {
        /// File to send
        file: PathBuf,

        /// Receiver address (host:port)
        endpoint: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Serve { bind, output } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            rt.block_on(serve(config))
        }
        Commands::Send { file, endpoint } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            rt.block_on(send(config, file))
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::bind(config.dispatcher_config()).await?;
    let shutdown = dispatcher.shutdown_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, shutting down");
        }
        shutdown.cancel();
    });

    dispatcher.run().await;
    Ok(())
}

async fn send(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let (progress_tx, progress_rx) = mpsc::channel(64);

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, aborting transfer");
            interrupt.cancel();
        }
    });
    tokio::spawn(log_progress(progress_rx));

    let sender = Sender::new(config.sender_config())
        .with_progress(progress_tx)
        .with_cancel(cancel);

    match sender.send(&file, &config.endpoint).await {
        Ok(report) => {
            tracing::info!(
                name = %report.name,
                bytes = report.bytes_transferred,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "file sent successfully"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(file = %file.display(), "transfer failed: {e}");
            Err(e.into())
        }
    }
}

/// Logs progress at debug level, once per 10% step.
///
/// Events may be dropped under load; completion is logged from the
/// [`SendReport`](filedrop_transfer::SendReport) instead.
async fn log_progress(mut rx: mpsc::Receiver<Progress>) {
    let mut last_step = 0;
    while let Some(p) = rx.recv().await {
        let step = if p.total == 0 {
            10
        } else {
            (u128::from(p.transferred) * 10 / u128::from(p.total)) as u64
        };
        if step > last_step {
            last_step = step;
            tracing::debug!(
                name = %p.name,
                transferred = p.transferred,
                total = p.total,
                "progress {}%",
                step * 10
            );
        }
    }
}
