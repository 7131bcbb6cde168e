//! Pulse CLI - Command-line client for the Pulse analytics dashboard.
//!
//! Provides a headless client for the Pulse server's real-time channel.
//! Useful for watching live notifications from a terminal, scripting,
//! and debugging the server's event stream without a browser.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use pulse_core::config::{AppConfig, ConfigHandle};
use pulse_core::error::PulseResult;
use pulse_core::logging;
use pulse_core::platform::Platform;

/// Pulse - real-time analytics dashboard client.
#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Pulse analytics dashboard CLI",
    long_about = "A command-line client for the Pulse analytics dashboard.\n\
                   Connect to a Pulse server to stream live notifications and alerts."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the real-time channel and stream notifications.
    Listen {
        /// Channels to subscribe, as type:target pairs (e.g. keyword:rust).
        #[arg(short = 's', long = "subscribe", value_name = "TYPE:TARGET")]
        channels: Vec<String>,
        /// Bearer token for the handshake (skips the REST login).
        #[arg(short, long)]
        token: Option<String>,
        /// Username for REST login (overrides config).
        #[arg(short, long)]
        username: Option<String>,
        /// Connect without authenticating (public events only).
        #[arg(long)]
        anonymous: bool,
        /// Seconds between liveness pings (0 disables).
        #[arg(long, default_value = "30")]
        ping_interval: u64,
    },
    /// Show the current configuration and server reachability.
    Status,
}

#[tokio::main]
async fn main() -> PulseResult<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let log_dir = Platform::data_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join("logs");
    let _guard = logging::init_logging(log_level, &log_dir, false)?;

    // Load configuration
    let config = if let Some(path) = cli.config.as_deref() {
        AppConfig::load_from_file(std::path::Path::new(path))?
    } else {
        AppConfig::load_default()?
    };

    let config_handle = ConfigHandle::new(config);

    info!("Pulse CLI v{}", pulse_core::constants::APP_VERSION);

    match cli.command {
        Commands::Listen {
            channels,
            token,
            username,
            anonymous,
            ping_interval,
        } => {
            commands::listen::run(
                config_handle,
                channels,
                token,
                username,
                anonymous,
                ping_interval,
            )
            .await
        }
        Commands::Status => commands::status::run(config_handle, cli.format).await,
    }
}
