//! Per-user directories for configuration and logs.

use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::error::{PadError, PadResult};

/// Directory holding `config.toml`, e.g. `~/.config/padsock` on Linux.
pub fn config_dir() -> PadResult<PathBuf> {
    app_dir(dirs::config_dir(), "config")
}

/// Directory for persistent data, e.g. `~/.local/share/padsock` on Linux.
pub fn data_dir() -> PadResult<PathBuf> {
    app_dir(dirs::data_dir(), "data")
}

/// Default log directory under [`data_dir`].
pub fn log_dir() -> PadResult<PathBuf> {
    Ok(data_dir()?.join("logs"))
}

/// Short description of the host, for the startup log line.
pub fn describe() -> String {
    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH)
}

fn app_dir(base: Option<PathBuf>, kind: &str) -> PadResult<PathBuf> {
    base.map(|base| base.join(APP_NAME))
        .ok_or_else(|| PadError::Config(format!("could not determine {kind} directory")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_dir_is_namespaced() {
        let dir = app_dir(Some(PathBuf::from("/tmp/base")), "config").unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/base").join(APP_NAME));
    }

    #[test]
    fn test_missing_base_is_config_error() {
        let err = app_dir(None, "data").unwrap_err();
        assert!(matches!(err, PadError::Config(ref m) if m.contains("data directory")));
    }

    #[test]
    fn test_describe_names_os() {
        assert!(describe().starts_with(std::env::consts::OS));
    }
}
