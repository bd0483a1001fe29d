//! Error taxonomy for PKI directory operations.
//!
//! Every lifecycle operation returns a definite [`Result`]. Only
//! [`PkiError::Validation`] is recoverable (the prompt loop re-asks); all other
//! variants abort the current operation.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkiError {
    /// No configuration file; the directory is uninitialized.
    #[error("no configuration found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("configuration at {path} is corrupt: {reason}")]
    ConfigCorrupt { path: PathBuf, reason: String },

    #[error("configuration already exists at {0}, please choose a different directory")]
    AlreadyInitialized(PathBuf),

    /// A required artifact (CA, DH parameters, certificate) is absent.
    #[error("{0}")]
    MissingPrerequisite(String),

    #[error("cryptographic backend failure: {0}")]
    Backend(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid input: {0}")]
    Validation(String),
}

impl PkiError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PkiError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PkiError::ConfigCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the failure came from bad user input and may be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PkiError::Validation(_))
    }
}

impl From<openssl::error::ErrorStack> for PkiError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        PkiError::Backend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;
