//! Domain error types

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::segment::SegmentId;
use crate::domain::session::SessionId;

/// Errors from the session/segment ledger and its persistence layer
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Disk failure during a metadata/transcript flush or an artifact move.
    /// Flush failures are fatal to the operation and always surfaced.
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown session: {0}")]
    SessionNotFound(SessionId),

    #[error("unknown segment {segment} in session {session}")]
    SegmentNotFound {
        session: SessionId,
        segment: SegmentId,
    },

    /// Persisted session metadata exists but does not parse.
    /// Surfaced as-is, never auto-repaired.
    #[error("corrupt session metadata at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl LedgerError {
    /// Wrap an io::Error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
