//! # Manifest
//!
//! Parsing and resolution of declarative provisioning manifests.
//!
//! This crate provides functionality to:
//! - Parse JSONC/JSON/YAML manifest files (string-aware comment stripping)
//! - Compose manifests from includes: profile names, paths or zip bundles
//! - Apply post-merge exclusion filters
//! - Expand config-module references against an immutable catalog
//!
//! ## Example
//!
//! ```no_run
//! use manifest::{resolve, Catalog, ResolveOptions};
//! use std::path::Path;
//!
//! let catalog = Catalog::default();
//! let options = ResolveOptions::default();
//! let resolved = resolve(Path::new("machine.jsonc"), &catalog, &options)?;
//!
//! for app in &resolved.manifest.apps {
//!     println!("{} -> {:?}", app.id, app.version);
//! }
//! # Ok::<(), manifest::Error>(())
//! ```

mod catalog;
mod error;
mod jsonc;
mod resolver;
mod types;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use jsonc::strip_comments;
pub use resolver::{
    load_document, resolve, to_canonical_json, ResolveOptions, ResolvedManifest,
};
pub use types::{
    AppEntry, ConfigModule, ConflictPolicy, Manifest, RestoreEntry, RestoreKind, RestorerPolicy,
    Sensitivity, VerifyCheck, SUPPORTED_VERSION,
};
