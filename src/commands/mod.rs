//! Command implementations
//!
//! Each command is a thin function over the workspace crates: resolve,
//! call the engine, shape the result for the output layer. Fatal errors
//! bubble up as `anyhow::Error`; partial failures come back as a
//! successful `CommandOutput` with `success` false.

pub mod apply;
pub mod drift;
pub mod plan;
pub mod restore;
pub mod revert;
pub mod verify;

use crate::cli::ManifestArgs;
use crate::output::EventSink;
use anyhow::Result;
use engine::DriverRegistry;
use manifest::{Catalog, ResolveOptions, ResolvedManifest};
use serde_json::Value;
use state::StateStore;

/// Everything a command needs beyond its own arguments
pub struct Context {
    pub quiet: bool,
    pub run_id: String,
    pub store: StateStore,
    pub registry: DriverRegistry,
    pub events: EventSink,
}

/// What a command hands back to the output layer
pub struct CommandOutput {
    pub data: Value,
    /// False for partial failures; fatal errors never get here
    pub success: bool,
}

/// Resolve a manifest per the shared CLI flags and hash its canonical
/// form
///
/// The hash is taken over the canonical JSON of the fully merged
/// manifest, so edits in any include layer change it.
pub fn resolve_manifest(args: &ManifestArgs) -> Result<(ResolvedManifest, String)> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::default(),
    };
    let options = ResolveOptions {
        manifests_root: args.manifests_root.clone(),
    };
    let resolved = manifest::resolve(&args.manifest, &catalog, &options)?;
    let hash = state::manifest_hash(manifest::to_canonical_json(&resolved.manifest).as_bytes());
    log::debug!(
        "resolved {} apps, {} restore entries, hash {hash}",
        resolved.manifest.apps.len(),
        resolved.manifest.restore.len()
    );
    Ok((resolved, hash))
}
