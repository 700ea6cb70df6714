// ABOUTME: Entry point for the agent call desk backend
// ABOUTME: Initializes logging, loads config, and runs the HTTP and socket server

use agentline::{config::Config, paths, server};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "agentline", version, about = "Agent status and incoming-call relay server")]
struct Cli {
    /// Path to config.toml (overrides AGENTLINE_CONFIG_PATH and the search path)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,
}

/// Set up stderr logging plus a daily rolling JSON file in the log dir.
/// The returned guard must stay alive for file logs to flush.
fn init_logging() -> Option<WorkerGuard> {
    let log_dir = paths::log_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "agentline.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Could not create log directory {}: {} (file logging disabled)",
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("agentline panicked: {}", panic_info);
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    let _log_guard = init_logging();
    let cli = Cli::parse();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting agentline");

    let mut config = Config::load_from(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        bind = %config.bind_address(),
        relay_interval_secs = config.relay.interval_secs,
        log_store = config.log_store.is_some(),
        call_store = config.call_store.is_some(),
        "Configuration loaded"
    );

    if let Err(e) = server::start_server(config).await {
        let message = format!("{:#}", e);
        tracing::error!(error = %message, "Server exited with error");
        return Err(e);
    }

    Ok(())
}
