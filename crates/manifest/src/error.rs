//! Error types for manifest resolution

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading and resolving manifests
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest file does not exist
    #[error("manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Include could not be resolved to a profile or path
    #[error("include '{0}' does not resolve to a profile or manifest path")]
    IncludeNotFound(String),

    /// Malformed JSONC/JSON/YAML
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Structurally valid but semantically wrong manifest
    #[error("invalid manifest {}: {message}", .path.display())]
    Validation { path: PathBuf, message: String },

    /// Referenced config module is not in the catalog
    #[error("unknown config module '{0}'")]
    UnknownConfigModule(String),

    /// Bundle archive could not be expanded
    #[error("failed to expand bundle {}: {source}", .path.display())]
    Bundle {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for the structured output contract
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::IncludeNotFound(_) => "ManifestNotFound",
            Self::Parse { .. } | Self::Bundle { .. } => "ManifestParseError",
            Self::Validation { .. } | Self::UnknownConfigModule(_) => "ManifestValidationError",
            Self::Io(_) => "InternalError",
        }
    }
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, Error>;
