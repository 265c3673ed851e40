//! Padsock CLI - command-line front end for the resilient socket client.
//!
//! Connects to an Etherpad server's admin or editor socket from the
//! terminal. Useful for watching live events, scripting one-off requests,
//! and checking whether a stored admin token is still accepted.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use pad_core::config::{AppConfig, ConfigHandle};
use pad_core::error::PadResult;
use pad_core::logging;
use pad_core::platform;

/// Padsock - resilient WebSocket client for Etherpad servers.
#[derive(Parser)]
#[command(
    name = "padsock",
    version,
    about = "Resilient Etherpad socket client",
    long_about = "A command-line client for Etherpad's admin and editor sockets.\n\
                   Reconnects with backoff, queues messages while offline and prints events as they arrive."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Server origin (overrides config).
    #[arg(short, long, global = true)]
    origin: Option<String>,

    /// Admin bearer token (overrides config).
    #[arg(short, long, global = true)]
    token: Option<String>,

    /// Join this channel on the editor socket instead of the admin socket.
    #[arg(long, global = true)]
    channel: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// One JSON object per line, for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print events until Ctrl+C.
    Listen {
        /// Application event to print (repeatable). Lifecycle events are always shown.
        #[arg(short, long = "event")]
        events: Vec<String>,
    },
    /// Connect, send one event and optionally wait for a reply.
    Emit {
        /// Event name.
        event: String,
        /// JSON payload.
        payload: Option<String>,
        /// Wait for this event and print its payload.
        #[arg(short, long)]
        wait: Option<String>,
        /// Seconds to wait for the connection and the reply.
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },
    /// Check the admin token against the validation endpoint.
    Validate,
}

#[tokio::main]
async fn main() -> PadResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml")),
    };
    let mut config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };
    apply_overrides(&mut config, &cli);

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| PathBuf::from("logs"));
    let _guard = logging::init_logging(&log_level, &log_dir, config.logging.json_output)?;

    info!(
        "padsock v{} on {}",
        pad_core::constants::APP_VERSION,
        platform::describe()
    );
    let config_handle = ConfigHandle::new(config);

    // Dispatch to command handlers
    match cli.command {
        Commands::Listen { events } => {
            commands::listen::run(config_handle, &config_path, events, cli.format).await
        }
        Commands::Emit {
            event,
            payload,
            wait,
            timeout_secs,
        } => {
            commands::emit::run(
                config_handle,
                &config_path,
                commands::emit::EmitArgs {
                    event,
                    payload,
                    wait,
                    timeout_secs,
                },
                cli.format,
            )
            .await
        }
        Commands::Validate => commands::validate::run(config_handle, cli.format).await,
    }
}

/// Command-line flags win over the configuration file.
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(origin) = &cli.origin {
        config.server.origin = AppConfig::sanitize_origin(origin);
    }
    if let Some(token) = &cli.token {
        config.auth.token = Some(token.clone());
    }
    if let Some(channel) = &cli.channel {
        config.server.channel = Some(channel.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let cli = Cli::try_parse_from([
            "padsock",
            "--origin",
            "pad.example.com/",
            "--token",
            "abc",
            "listen",
            "-e",
            "settings",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.server.origin, "http://pad.example.com");
        assert_eq!(config.auth.token.as_deref(), Some("abc"));
        assert!(config.server.channel.is_none());
        assert!(matches!(cli.command, Commands::Listen { ref events } if events == &["settings"]));
    }

    #[test]
    fn test_emit_arguments() {
        let cli = Cli::try_parse_from([
            "padsock",
            "--channel",
            "pad-1",
            "emit",
            "load",
            r#"{"x":1}"#,
            "--wait",
            "settings",
        ])
        .unwrap();
        match cli.command {
            Commands::Emit {
                event,
                payload,
                wait,
                timeout_secs,
            } => {
                assert_eq!(event, "load");
                assert_eq!(payload.as_deref(), Some(r#"{"x":1}"#));
                assert_eq!(wait.as_deref(), Some("settings"));
                assert_eq!(timeout_secs, 10);
            }
            _ => panic!("expected emit command"),
        }
        assert_eq!(cli.channel.as_deref(), Some("pad-1"));
    }
}
