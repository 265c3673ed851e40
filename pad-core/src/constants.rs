//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "padsock";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server origin used when nothing is configured.
pub const DEFAULT_ORIGIN: &str = "http://localhost:9001";

/// Socket path for privileged (admin) clients.
pub const ADMIN_SOCKET_PATH: &str = "/admin/ws";

/// Token validation endpoint queried before an admin socket is opened.
pub const ADMIN_VALIDATE_PATH: &str = "/admin/validate";

/// Socket path for editor clients joining a logical channel.
pub const CHANNEL_SOCKET_PATH: &str = "/socket.io/";

/// Query key carrying the bearer token.
pub const TOKEN_QUERY_KEY: &str = "token";

/// Query key carrying the logical channel identifier.
pub const CHANNEL_QUERY_KEY: &str = "namespace";

/// Default reconnect delay for the first attempt, in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Default cap on the exponential reconnect delay, in milliseconds.
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default upper bound for the random jitter added to each delay, in milliseconds.
pub const DEFAULT_RECONNECT_JITTER_MS: u64 = 1_000;

/// Close reason reported when the caller disconnects.
pub const CLIENT_DISCONNECT_REASON: &str = "io client disconnect";

/// Close reason reported when the caller forces a reconnect on a live link.
pub const FORCED_RECONNECT_REASON: &str = "forced reconnect";

/// Disconnect reason reported when a connection attempt fails before opening.
pub const CONNECT_ERROR_REASON: &str = "connect error";

/// Close reason reported when the transport ends without a close frame.
pub const TRANSPORT_CLOSE_REASON: &str = "transport close";
