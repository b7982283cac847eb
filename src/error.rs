//! Error types for directory identity operations.
//!
//! Expected failures (user not found, bad credentials, unreachable directory) are
//! encoded in the return values of [`DirectoryService`](crate::DirectoryService)
//! operations. The errors here travel between the internal layers and surface only
//! from `connect()` and configuration loading.

use std::path::PathBuf;
use std::time::Duration;

/// LDAP result code returned for rejected credentials.
pub const INVALID_CREDENTIALS: u32 = 49;

/// LDAP result code for a filter that cannot be parsed.
pub const FILTER_ERROR: u32 = 87;

/// Errors raised by the directory transport and the components built on it.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Directory integration is not configured
    #[error("Directory integration is disabled")]
    Disabled,

    /// An operation needed a live connection and none was available
    #[error("No live directory connection")]
    NotConnected,

    /// The transport could not reach the directory endpoint
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// The directory rejected a bind
    #[error("Bind as '{identity}' failed with code {code}: {message}")]
    Bind {
        identity: String,
        code: u32,
        message: String,
    },

    /// The directory answered a search with a non-success result
    #[error("Search under '{base}' with filter {filter} failed with code {code}: {message}")]
    Search {
        base: String,
        filter: String,
        code: u32,
        message: String,
    },

    /// The directory did not answer within the configured timeout
    #[error("Directory {operation} timed out after {duration:?}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// The connection broke mid-session
    #[error("Directory transport error: {0}")]
    Transport(String),

    /// An entry could not be decoded into a directory entry
    #[error("Malformed directory entry: {message}")]
    EntryParse { message: String },
}

impl DirectoryError {
    /// Whether the error leaves the underlying connection unusable.
    ///
    /// Protocol-level result codes (bad credentials, no such object) keep the
    /// socket healthy; transport failures and timeouts do not.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            DirectoryError::Connect { .. }
                | DirectoryError::Timeout { .. }
                | DirectoryError::Transport(_)
                | DirectoryError::NotConnected
        )
    }

    /// Whether the error is a bind rejected for bad credentials.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, DirectoryError::Bind { code, .. } if *code == INVALID_CREDENTIALS)
    }
}

/// Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors raised while loading directory configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The configuration file could not be read
    #[error("Failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or has the wrong shape
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The file holds no directory section
    #[error("Configuration file {} has no 'directory' section", path.display())]
    MissingSection { path: PathBuf },

    /// A value is present but unusable
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
