//! Socket URL construction.

use reqwest::Url;

use pad_core::config::ServerConfig;
use pad_core::constants;
use pad_core::error::{PadError, PadResult};

/// How the client identifies itself in the socket URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Privileged socket authenticated with the session's bearer token.
    Token,
    /// Editor socket joining a logical channel.
    Channel(String),
}

/// Where and how to open the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    origin: Url,
    socket_path: String,
    route: Route,
}

impl Endpoint {
    /// Token route on the admin socket path.
    pub fn admin(origin: &str) -> PadResult<Self> {
        Self::new(origin, constants::ADMIN_SOCKET_PATH, Route::Token)
    }

    /// Channel route on the editor socket path.
    pub fn channel(origin: &str, namespace: impl Into<String>) -> PadResult<Self> {
        Self::new(
            origin,
            constants::CHANNEL_SOCKET_PATH,
            Route::Channel(namespace.into()),
        )
    }

    pub fn new(origin: &str, socket_path: &str, route: Route) -> PadResult<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| PadError::Config(format!("invalid origin {origin}: {e}")))?;
        match origin.scheme() {
            "http" | "https" | "ws" | "wss" => {}
            other => {
                return Err(PadError::Config(format!("unsupported origin scheme: {other}")));
            }
        }
        if origin.host_str().is_none() {
            return Err(PadError::Config(format!("origin has no host: {origin}")));
        }
        if let Route::Channel(namespace) = &route {
            if namespace.is_empty() {
                return Err(PadError::MissingConfig("channel namespace".into()));
            }
        }

        Ok(Self {
            origin,
            socket_path: socket_path.to_string(),
            route,
        })
    }

    /// Build the endpoint described by the server configuration.
    pub fn from_config(config: &ServerConfig) -> PadResult<Self> {
        let route = match &config.channel {
            Some(namespace) => Route::Channel(namespace.clone()),
            None => Route::Token,
        };
        Self::new(&config.origin, config.effective_socket_path(), route)
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn requires_token(&self) -> bool {
        self.route == Route::Token
    }

    /// Origin the endpoint was built from.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Socket URL. A secure origin yields `wss`, a plain one `ws`.
    ///
    /// `token` is required for the token route and ignored otherwise.
    pub fn socket_url(&self, token: Option<&str>) -> PadResult<Url> {
        let scheme = match self.origin.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        let mut url = self.origin_with_path(&self.socket_path)?;
        url.set_scheme(scheme)
            .map_err(|_| PadError::Config(format!("cannot use scheme {scheme} for {url}")))?;

        match &self.route {
            Route::Token => {
                let token = token
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| PadError::MissingConfig("bearer token".into()))?;
                url.query_pairs_mut()
                    .append_pair(constants::TOKEN_QUERY_KEY, token);
            }
            Route::Channel(namespace) => {
                url.query_pairs_mut()
                    .append_pair(constants::CHANNEL_QUERY_KEY, namespace);
            }
        }
        Ok(url)
    }

    /// Validation URL for the authorization pre-check, always http(s).
    pub fn validate_url(&self, validate_path: &str, token: &str) -> PadResult<Url> {
        let scheme = match self.origin.scheme() {
            "https" | "wss" => "https",
            _ => "http",
        };
        let mut url = self.origin_with_path(validate_path)?;
        url.set_scheme(scheme)
            .map_err(|_| PadError::Config(format!("cannot use scheme {scheme} for {url}")))?;
        url.query_pairs_mut()
            .append_pair(constants::TOKEN_QUERY_KEY, token);
        Ok(url)
    }

    fn origin_with_path(&self, path: &str) -> PadResult<Url> {
        let mut url = self.origin.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.set_path(path);
        Ok(url)
    }
}
