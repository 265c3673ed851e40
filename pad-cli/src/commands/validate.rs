//! Validate command - check the admin token without opening a socket.

use console::style;

use pad_core::config::ConfigHandle;
use pad_core::error::{PadError, PadResult};
use pad_socket::{AuthStatus, Authorizer, Endpoint, HttpAuthorizer, SessionStore};

use crate::OutputFormat;

/// Run the validate command.
pub async fn run(config: ConfigHandle, format: OutputFormat) -> PadResult<()> {
    let server = config.read().await.server.clone();
    let endpoint = Endpoint::from_config(&server)?;

    if !endpoint.requires_token() {
        println!(
            "  {} The channel route does not use a token; nothing to validate.",
            style("SKIP").yellow().bold()
        );
        return Ok(());
    }

    let session = super::resolve_session(&config).await?;
    let token = session
        .token()
        .ok_or_else(|| PadError::MissingConfig("admin token".into()))?;

    let origin = endpoint.origin().to_string();
    let authorizer = HttpAuthorizer::new(endpoint, server.validate_path.clone())?;
    let status = authorizer.validate(&token).await?;

    match format {
        OutputFormat::Json => {
            let verdict = match status {
                AuthStatus::Valid => "valid",
                AuthStatus::Unauthorized => "unauthorized",
            };
            println!(
                "{}",
                serde_json::json!({ "origin": origin, "token": verdict })
            );
        }
        OutputFormat::Text => match status {
            AuthStatus::Valid => println!(
                "  {} Token accepted by {}",
                style("OK").green().bold(),
                origin
            ),
            AuthStatus::Unauthorized => println!(
                "  {} Token rejected by {}",
                style("FAIL").red().bold(),
                origin
            ),
        },
    }

    match status {
        AuthStatus::Valid => Ok(()),
        AuthStatus::Unauthorized => Err(PadError::AuthFailed("token rejected by server".into())),
    }
}
