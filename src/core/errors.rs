//! PWD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::notify::GatewayError;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PwdError>;

/// Top-level error type for plcwatchd.
#[derive(Debug, Error)]
pub enum PwdError {
    #[error("[PWD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PWD-1002] missing mandatory argument: {name}")]
    MissingArgument { name: &'static str },

    #[error("[PWD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PWD-1004] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[PWD-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[PWD-2101] notification gateway failure: {source}")]
    Gateway {
        #[from]
        source: GatewayError,
    },

    #[error("[PWD-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PWD-3003] logging setup failed: {details}")]
    Logging { details: String },

    #[error("[PWD-3004] daemonization failed: {details}")]
    Daemonize { details: String },

    #[error("[PWD-3005] signal handler registration failed: {details}")]
    Signal { details: String },
}

impl PwdError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PWD-1001",
            Self::MissingArgument { .. } => "PWD-1002",
            Self::ConfigParse { .. } => "PWD-1003",
            Self::MissingConfig { .. } => "PWD-1004",
            Self::UnsupportedPlatform { .. } => "PWD-1101",
            Self::Gateway { .. } => "PWD-2101",
            Self::Io { .. } => "PWD-3002",
            Self::Logging { .. } => "PWD-3003",
            Self::Daemonize { .. } => "PWD-3004",
            Self::Signal { .. } => "PWD-3005",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<toml::de::Error> for PwdError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PwdError;
    use crate::notify::GatewayError;

    #[test]
    fn codes_are_stable_and_prefixed() {
        let err = PwdError::MissingArgument { name: "ip" };
        assert_eq!(err.code(), "PWD-1002");
        assert!(err.to_string().starts_with("[PWD-1002]"));
    }

    #[test]
    fn gateway_failures_convert_with_their_code() {
        let err = PwdError::from(GatewayError::Transport("timed out".to_string()));
        assert_eq!(err.code(), "PWD-2101");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn toml_errors_map_to_config_parse() {
        let parse = toml::from_str::<toml::Value>("controller = [").expect_err("invalid toml");
        let err = PwdError::from(parse);
        assert_eq!(err.code(), "PWD-1003");
    }
}
