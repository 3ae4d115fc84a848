//! Error types for the convergence engine
//!
//! Everything here is fatal: it aborts before any action executes.
//! Per-item install or restore failures are data on the report, not
//! errors, so a partially failed run still returns `Ok`.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest could not be resolved
    #[error(transparent)]
    Manifest(#[from] manifest::Error),

    /// State store failure
    #[error(transparent)]
    State(#[from] state::Error),

    /// Restore journal could not be persisted
    #[error(transparent)]
    Restore(#[from] restore::Error),

    /// Plan file does not exist
    #[error("plan not found: {}", .0.display())]
    PlanNotFound(PathBuf),

    /// Plan file exists but cannot be parsed
    #[error("failed to parse plan {}: {message}", .path.display())]
    PlanParse { path: PathBuf, message: String },

    /// An app references a driver that is not registered, or the driver
    /// cannot enumerate installed packages at all
    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for the structured output contract
    pub fn code(&self) -> &'static str {
        match self {
            Self::Manifest(e) => e.code(),
            Self::State(e) => e.code(),
            Self::Restore(e) => e.code(),
            Self::PlanNotFound(_) => "PlanNotFound",
            Self::PlanParse { .. } => "PlanParseError",
            Self::DriverUnavailable(_) => "DriverUnavailable",
            Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => "PermissionDenied",
            Self::Io(_) => "InternalError",
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
