//! padsock core - foundation types shared by the socket client and the CLI.
//!
//! This crate provides:
//! - Application configuration (server origin, credentials, reconnect policy)
//! - The unified error type
//! - Structured logging with tracing
//! - Platform directory helpers
//! - Well-known endpoint paths and query keys

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{PadError, PadResult};
pub use logging::init_logging;
