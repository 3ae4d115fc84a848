//! Error types for the restore subsystem
//!
//! These are the fatal errors; anything that goes wrong with a single
//! restore entry is recorded on its journal entry and never aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal restore/revert errors
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No journal exists for the requested run
    #[error("no restore journal for run '{0}'")]
    JournalNotFound(String),

    /// Journal file exists but cannot be parsed
    #[error("corrupt journal {}: {message}", .path.display())]
    JournalCorrupt { path: PathBuf, message: String },

    /// State store failure while persisting the journal
    #[error(transparent)]
    State(#[from] state::Error),
}

impl Error {
    /// Stable machine-readable code for the structured output contract
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => "PermissionDenied",
            Self::State(e) => e.code(),
            Self::Io(_) | Self::JournalNotFound(_) | Self::JournalCorrupt { .. } => {
                "RestoreFailed"
            }
        }
    }
}

/// Result type for restore operations
pub type Result<T> = std::result::Result<T, Error>;
