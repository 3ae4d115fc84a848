//! # Restore
//!
//! Journaled, reversible configuration restore.
//!
//! This crate provides functionality to:
//! - Apply restore entries (copy, merge-json, merge-ini, append) with a
//!   conflict policy defaulting to skip
//! - Guard sensitive paths (SSH keys, credential stores) per module policy
//! - Journal every attempted entry and persist the journal atomically
//! - Revert a past run from its journal, idempotently
//!
//! ## Example
//!
//! ```no_run
//! use restore::{run, revert, RestoreJournal, RestoreOptions};
//! use state::StateStore;
//! use std::path::{Path, PathBuf};
//!
//! let store = StateStore::new(PathBuf::from("/home/me/.local/state/forja"));
//! let journal = run(
//!     &[],
//!     Path::new("machine.jsonc"),
//!     Path::new("/export"),
//!     "20250101-120000",
//!     &store,
//!     &RestoreOptions::default(),
//! )?;
//!
//! // Later: undo everything that run changed
//! let journal = RestoreJournal::load(&store.journal_file("20250101-120000"))?;
//! revert(&journal, false)?;
//! # Ok::<(), restore::Error>(())
//! ```

mod engine;
mod error;
mod fsops;
mod journal;
mod revert;
mod sensitive;

pub use engine::{run, RestoreOptions};
pub use error::{Error, Result};
pub use journal::{latest_journal, JournalAction, JournalEntry, RestoreJournal};
pub use revert::{revert, RevertSummary};
