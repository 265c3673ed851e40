//! Emit command - send one event, optionally wait for a reply.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use console::style;
use serde_json::Value;
use tokio::sync::mpsc;

use pad_core::config::ConfigHandle;
use pad_core::error::{PadError, PadResult};
use pad_socket::ConnectionStatus;

use crate::OutputFormat;

/// Arguments of the emit command.
pub struct EmitArgs {
    pub event: String,
    pub payload: Option<String>,
    pub wait: Option<String>,
    pub timeout_secs: u64,
}

/// Run the emit command.
pub async fn run(
    config: ConfigHandle,
    config_path: &Path,
    args: EmitArgs,
    format: OutputFormat,
) -> PadResult<()> {
    let payload = parse_payload(&args.event, args.payload.as_deref())?;
    let timeout = Duration::from_secs(args.timeout_secs);

    let session = super::resolve_session(&config).await?;
    let client = super::build_client(&config, session.clone()).await?;

    let (tx, mut replies) = mpsc::unbounded_channel::<Option<Value>>();
    if let Some(wait) = &args.wait {
        client.once(wait.as_str(), move |payload| {
            let _ = tx.send(payload.cloned());
        });
    }

    // Queued until the link is open; the first emit also starts connecting.
    client.emit(&args.event, payload)?;

    if let Err(e) = super::wait_until_connected(&client, timeout).await {
        if session.reload_count() > 0 {
            super::forget_credentials(&config, config_path).await?;
        }
        client.shutdown();
        return Err(e);
    }
    // A failed send leaves the message queued for the next link.
    let drained = tokio::time::timeout(
        timeout,
        client.wait_for_state(|state| state.queued_messages == 0),
    )
    .await;
    match drained {
        Ok(Ok(_)) => {
            if let OutputFormat::Text = format {
                println!("  {} Sent {}", style("OK").green().bold(), args.event);
            }
        }
        Ok(Err(e)) => {
            client.shutdown();
            return Err(e);
        }
        Err(_) => {
            client.shutdown();
            return Err(PadError::Socket(format!(
                "{} still queued after {}s",
                args.event, args.timeout_secs
            )));
        }
    }

    let result = match &args.wait {
        Some(wait) => match tokio::time::timeout(timeout, replies.recv()).await {
            Ok(Some(reply)) => {
                super::print_event(format, wait, reply.as_ref());
                Ok(())
            }
            Ok(None) => Err(PadError::Internal("reply channel closed".into())),
            Err(_) => Err(PadError::Socket(format!(
                "no {wait} reply within {}s",
                args.timeout_secs
            ))),
        },
        None => Ok(()),
    };

    client.disconnect()?;
    client.wait_for_status(ConnectionStatus::Disconnected).await?;
    client.shutdown();
    result
}

/// Parse the optional JSON payload given on the command line.
fn parse_payload(event: &str, raw: Option<&str>) -> PadResult<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = serde_json::from_str::<Value>(raw)
        .with_context(|| format!("payload for {event} is not valid JSON"))?;
    Ok(Some(value))
}
