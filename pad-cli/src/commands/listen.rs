//! Listen command - stay connected and print events as they arrive.

use std::path::Path;

use console::style;
use serde_json::Value;
use tokio::sync::mpsc;

use pad_core::config::ConfigHandle;
use pad_core::error::{PadError, PadResult};
use pad_socket::SocketEventType;

use crate::OutputFormat;

/// Run the listen command.
pub async fn run(
    config: ConfigHandle,
    config_path: &Path,
    events: Vec<String>,
    format: OutputFormat,
) -> PadResult<()> {
    let session = super::resolve_session(&config).await?;
    let client = super::build_client(&config, session.clone()).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Option<Value>)>();
    let names = SocketEventType::synthetic_names()
        .iter()
        .map(|name| name.to_string())
        .chain(events);
    for name in names {
        let tx = tx.clone();
        let event = name.clone();
        client.on(name, move |payload| {
            let _ = tx.send((event.clone(), payload.cloned()));
        });
    }

    let origin = config.read().await.server.origin.clone();
    println!("Connecting to {origin}... (Ctrl+C to stop)");
    let mut reloads = session.reloads();
    client.connect()?;

    let result = loop {
        tokio::select! {
            Some((event, payload)) = rx.recv() => {
                super::print_event(format, &event, payload.as_ref());
                if event == SocketEventType::ReconnectFailed.as_str() {
                    break Err(PadError::Socket(format!(
                        "gave up reconnecting after {} attempt(s)",
                        payload.unwrap_or(Value::Null)
                    )));
                }
            }
            Ok(()) = reloads.changed() => {
                super::forget_credentials(&config, config_path).await?;
                break Err(PadError::AuthFailed("token rejected by server".into()));
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n  {} Disconnecting...", style("BYE").dim());
                client.disconnect()?;
                break Ok(());
            }
        }
    };

    client.shutdown();
    result
}
