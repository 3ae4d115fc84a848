//! # State
//!
//! Run-state persistence and drift detection for the provisioning engine.
//!
//! This crate provides functionality to:
//! - Hash manifests (SHA-256, line-ending normalized) for change detection
//! - Persist run results atomically (temp file + rename, never truncated)
//! - Keep an append-only run history keyed by run id
//! - Answer "what changed since the last run"
//!
//! ## Example
//!
//! ```no_run
//! use state::{StateStore, manifest_hash};
//! use std::path::PathBuf;
//!
//! let store = StateStore::new(PathBuf::from("/home/me/.local/state/forja"));
//! let state = store.load()?;
//! if let Some(last) = &state.last_applied {
//!     let current = manifest_hash(&std::fs::read("machine.jsonc")?);
//!     println!("drifted: {}", last.manifest_hash != current);
//! }
//! # Ok::<(), state::Error>(())
//! ```

mod drift;
mod error;
mod hash;
mod store;

pub use drift::{compute_drift, DesiredApp, DriftReport, VersionDrift};
pub use error::{Error, Result};
pub use hash::manifest_hash;
pub use store::{
    atomic_write, new_run_id, AppliedState, RunCounts, RunRecord, RunState, StateStore,
    VerifyState, STATE_SCHEMA_VERSION,
};
