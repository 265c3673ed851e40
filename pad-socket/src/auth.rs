//! Authorization pre-check and credential storage.
//!
//! Privileged clients validate their bearer token against a side-channel
//! endpoint before opening the socket. A rejected token is terminal for the
//! session: the stored credentials are cleared and a reload is requested
//! instead of retrying.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use pad_core::config::AuthConfig;
use pad_core::error::{PadError, PadResult};

use crate::endpoint::Endpoint;

/// Verdict of the authorization pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Valid,
    Unauthorized,
}

/// Validates bearer tokens before a connection attempt.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Err` means the check itself could not be completed and may be retried.
    async fn validate(&self, token: &str) -> PadResult<AuthStatus>;
}

/// Pre-check over HTTP against the validation endpoint.
#[derive(Clone)]
pub struct HttpAuthorizer {
    client: Client,
    endpoint: Endpoint,
    validate_path: String,
}

impl HttpAuthorizer {
    pub fn new(endpoint: Endpoint, validate_path: impl Into<String>) -> PadResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PadError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            validate_path: validate_path.into(),
        })
    }
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
    async fn validate(&self, token: &str) -> PadResult<AuthStatus> {
        let url = self.endpoint.validate_url(&self.validate_path, token)?;
        debug!("validating token at {}", url.path());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PadError::Http(format!("token validation request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("token rejected by server");
            Ok(AuthStatus::Unauthorized)
        } else if status.is_success() {
            Ok(AuthStatus::Valid)
        } else {
            Err(PadError::Http(format!(
                "token validation returned status {status}"
            )))
        }
    }
}

/// Owner of the credentials the login flow produced.
pub trait SessionStore: Send + Sync {
    /// Current bearer token, if any.
    fn token(&self) -> Option<String>;

    /// Forget the bearer and refresh tokens.
    fn clear_credentials(&self);

    /// Ask the hosting surface to start over with a full reload.
    fn request_reload(&self);
}

#[derive(Debug, Default)]
struct Credentials {
    token: Option<String>,
    refresh_token: Option<String>,
}

/// In-memory session store.
///
/// Reload requests bump a counter observable through [`MemorySession::reloads`].
#[derive(Debug)]
pub struct MemorySession {
    credentials: Mutex<Credentials>,
    reload_tx: watch::Sender<u64>,
}

impl MemorySession {
    pub fn new(token: Option<String>, refresh_token: Option<String>) -> Self {
        let (reload_tx, _) = watch::channel(0);
        Self {
            credentials: Mutex::new(Credentials {
                token,
                refresh_token,
            }),
            reload_tx,
        }
    }

    /// Session without credentials (channel route).
    pub fn anonymous() -> Self {
        Self::new(None, None)
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.token.clone(), config.refresh_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.lock().refresh_token.clone()
    }

    /// Number of reload requests so far.
    pub fn reload_count(&self) -> u64 {
        *self.reload_tx.borrow()
    }

    /// Receiver notified on every reload request.
    pub fn reloads(&self) -> watch::Receiver<u64> {
        self.reload_tx.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Credentials> {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySession {
    fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    fn clear_credentials(&self) {
        let mut credentials = self.lock();
        credentials.token = None;
        credentials.refresh_token = None;
        info!("stored credentials cleared");
    }

    fn request_reload(&self) {
        self.reload_tx.send_modify(|count| *count += 1);
        info!("reload requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_memory_session_clear() {
        let session = MemorySession::new(Some("token".into()), Some("refresh".into()));
        assert_eq!(session.token().as_deref(), Some("token"));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh"));

        session.clear_credentials();
        assert!(session.token().is_none());
        assert!(session.refresh_token().is_none());
    }

    #[tokio::test]
    async fn test_reload_is_observable() {
        let session = MemorySession::anonymous();
        let mut reloads = session.reloads();
        session.request_reload();

        reloads.changed().await.unwrap();
        assert_eq!(*reloads.borrow(), 1);
        assert_eq!(session.reload_count(), 1);
    }

    #[test]
    fn test_session_from_empty_config() {
        let session = MemorySession::from_config(&AuthConfig::default());
        assert!(session.token().is_none());
        assert_eq!(session.reload_count(), 0);
    }

    async fn authorizer_answering(status: u16) -> (MockServer, HttpAuthorizer) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/validate"))
            .and(query_param("token", "abc"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;
        let endpoint = Endpoint::admin(&server.uri()).unwrap();
        let authorizer = HttpAuthorizer::new(endpoint, "/admin/validate").unwrap();
        (server, authorizer)
    }

    #[tokio::test]
    async fn test_http_authorizer_accepts_success() {
        let (_server, authorizer) = authorizer_answering(200).await;
        assert_eq!(authorizer.validate("abc").await.unwrap(), AuthStatus::Valid);
    }

    #[tokio::test]
    async fn test_http_authorizer_maps_401_to_unauthorized() {
        let (_server, authorizer) = authorizer_answering(401).await;
        assert_eq!(
            authorizer.validate("abc").await.unwrap(),
            AuthStatus::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_http_authorizer_other_status_is_transient() {
        let (_server, authorizer) = authorizer_answering(503).await;
        let err = authorizer.validate("abc").await.unwrap_err();
        assert!(matches!(err, PadError::Http(_)));
        assert!(err.is_transient());
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_http_authorizer_unreachable_is_transient() {
        let endpoint = Endpoint::admin("http://127.0.0.1:9").unwrap();
        let authorizer = HttpAuthorizer::new(endpoint, "/admin/validate").unwrap();
        match authorizer.validate("abc").await {
            Err(e) => assert!(e.is_transient()),
            // Something unexpected is listening; nothing to assert.
            Ok(_) => {}
        }
    }
}
