//! CLI command implementations.

pub mod emit;
pub mod listen;
pub mod validate;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use dialoguer::Password;
use serde_json::Value;
use tracing::{debug, info};

use pad_core::config::{AuthConfig, ConfigHandle};
use pad_core::error::{PadError, PadResult};
use pad_socket::{ConnectionStatus, MemorySession, SocketClient, SocketClientBuilder};

use crate::OutputFormat;

/// Session seeded from config, prompting for a token when the admin route has none.
pub async fn resolve_session(config: &ConfigHandle) -> PadResult<Arc<MemorySession>> {
    let cfg = config.read().await;
    let needs_token = cfg.server.channel.is_none();
    let mut auth = cfg.auth.clone();
    drop(cfg);

    if needs_token && auth.token.as_deref().map_or(true, str::is_empty) {
        let token = Password::new()
            .with_prompt("Admin token")
            .interact()
            .map_err(|e| PadError::Internal(e.to_string()))?;
        auth.token = Some(token);
    }
    Ok(Arc::new(MemorySession::from_config(&auth)))
}

/// Build a client from config without connecting yet.
pub async fn build_client(
    config: &ConfigHandle,
    session: Arc<MemorySession>,
) -> PadResult<SocketClient> {
    let cfg = config.read().await;
    let client = SocketClientBuilder::from_config(&cfg, session)?
        .with_auto_connect(false)
        .build()?;
    debug!(client = %client.id(), origin = %cfg.server.origin, "socket client ready");
    Ok(client)
}

/// Wait until the client is connected, giving up on `failed` or after `timeout`.
pub async fn wait_until_connected(client: &SocketClient, timeout: Duration) -> PadResult<()> {
    let mut states = client.state_receiver();
    let wait = async {
        loop {
            {
                let state = states.borrow_and_update();
                match state.status {
                    ConnectionStatus::Connected => return Ok(()),
                    ConnectionStatus::Failed => {
                        return Err(PadError::Socket(
                            state
                                .last_error
                                .clone()
                                .unwrap_or_else(|| "connection failed".into()),
                        ));
                    }
                    _ => {}
                }
            }
            states
                .changed()
                .await
                .map_err(|_| PadError::Internal("socket driver stopped".into()))?;
        }
    };

    tokio::time::timeout(timeout, wait).await.map_err(|_| {
        PadError::Socket(format!("not connected after {}s", timeout.as_secs()))
    })?
}

/// Drop the stored token after the server rejected it.
///
/// The config file is rewritten only if it already exists.
pub async fn forget_credentials(config: &ConfigHandle, config_path: &Path) -> PadResult<()> {
    let mut cfg = config.write().await;
    cfg.auth = AuthConfig::default();
    if config_path.exists() {
        cfg.save_to_file(config_path)?;
        info!("cleared stored credentials in {}", config_path.display());
    }
    println!(
        "  {} Token rejected; stored credentials cleared. Log in again to get a new token.",
        style("AUTH").red().bold()
    );
    Ok(())
}

/// Print one dispatched event.
pub fn print_event(format: OutputFormat, event: &str, payload: Option<&Value>) {
    match format {
        OutputFormat::Json => {
            let mut line = serde_json::json!({
                "event": event,
                "at": chrono::Utc::now().to_rfc3339(),
            });
            if let Some(payload) = payload {
                line["data"] = payload.clone();
            }
            println!("{line}");
        }
        OutputFormat::Text => {
            let name = format!("[{event}]");
            let name = if pad_socket::SocketEventType::from_name(event).is_synthetic() {
                style(name).yellow()
            } else {
                style(name).cyan()
            };
            match payload {
                Some(payload) => println!("  {name} {payload}"),
                None => println!("  {name}"),
            }
        }
    }
}
