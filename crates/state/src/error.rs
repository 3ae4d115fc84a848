//! Error types for state persistence

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the state store
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State file exists but cannot be parsed
    #[error("corrupt state file {}: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    /// State file was written by a newer engine
    #[error("state file {} has schema version {found}, this engine supports {supported}", .path.display())]
    SchemaIncompatible {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

impl Error {
    /// Stable machine-readable code for the structured output contract
    pub fn code(&self) -> &'static str {
        match self {
            Self::SchemaIncompatible { .. } => "SchemaIncompatible",
            Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => "PermissionDenied",
            Self::Io(_) | Self::Corrupt { .. } => "InternalError",
        }
    }
}

/// Result type for state operations
pub type Result<T> = std::result::Result<T, Error>;
