use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not valid")]
    NotValid(&'static str),

    #[error("Failed to decode host key: {0}")]
    HostKey(String),

    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting {0}")]
    Invalid(#[from] ValidationError),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// SSH-related errors
#[derive(Error, Debug)]
pub enum SshError {
    #[error("Listener failed: {0}")]
    Listener(std::io::Error),

    #[error("Server task failed: {0}")]
    Task(String),

    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),
}

/// Outcome of a failed public key authorization check.
///
/// Malformed input is reported as such and never folded into `NotFound`.
/// `Remote` covers failures of the control plane itself and is logged apart
/// from a genuine miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("failed to parse user tag: {0}")]
    InvalidUserTag(String),

    #[error("failed to parse public key: {0}")]
    InvalidPublicKey(String),

    #[error("matching public key not found")]
    NotFound,

    #[error("authorization backend failed: {0}")]
    Remote(String),
}

impl AuthError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::NotFound)
    }
}

/// Errors parsing a tunnel destination out of a `direct-tcpip` request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("host '{0}' does not match <unit>.<application>.<model>.juju.local")]
    Format(String),

    #[error("unit number '{0}' out of range")]
    UnitNumber(String),

    #[error("port {0} out of range")]
    Port(u32),
}
