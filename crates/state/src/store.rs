//! Run-state persistence
//!
//! One JSON state file records the last applied manifest, the last verify
//! outcome and an append-only run history. The file is owned exclusively
//! by [`StateStore`] and only ever replaced atomically: a crash mid-write
//! can never leave a truncated file for a later run to trip over.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Schema version of the persisted state file
pub const STATE_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// State structures
// ============================================================================

/// Persisted engine state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub schema_version: u32,

    /// Last apply attempt, dry-run or not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied: Option<AppliedState>,

    /// Last verify outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verify: Option<VerifyState>,

    /// Append-only run history, keyed by run id
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            last_applied: None,
            last_verify: None,
            runs: Vec::new(),
        }
    }
}

/// Metadata of the last apply attempt
///
/// Drift detection needs the last *attempted* manifest even when the run
/// partially failed, so this is written after every run. `dry_run`
/// distinguishes simulated runs from committed ones; a dry run updates
/// this metadata but carries no installed-inventory assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedState {
    pub manifest_path: String,
    pub manifest_hash: String,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Metadata of the last verify pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyState {
    pub manifest_hash: String,
    pub timestamp_utc: DateTime<Utc>,
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
}

/// One entry in the run history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub command: String,
    pub timestamp_utc: DateTime<Utc>,
    pub manifest_hash: String,
    #[serde(default)]
    pub dry_run: bool,
    pub counts: RunCounts,
}

/// Per-run result counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    pub total: usize,
    pub installed: usize,
    pub upgraded: usize,
    pub already_installed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunCounts {
    /// Actions that converged: installed, upgraded or already satisfied
    pub fn success(&self) -> usize {
        self.installed + self.upgraded + self.already_installed
    }

    /// True when nothing failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl RunState {
    /// Record an apply attempt: updates `last_applied` and upserts the
    /// history entry for this run id
    ///
    /// A run that flushes progress snapshots mid-flight records itself
    /// several times; each flush replaces the previous snapshot instead
    /// of appending a duplicate.
    pub fn record_apply(&mut self, manifest_path: &Path, record: RunRecord) {
        self.last_applied = Some(AppliedState {
            manifest_path: manifest_path.display().to_string(),
            manifest_hash: record.manifest_hash.clone(),
            timestamp_utc: record.timestamp_utc,
            dry_run: record.dry_run,
        });
        match self.runs.iter_mut().find(|r| r.run_id == record.run_id) {
            Some(existing) => *existing = record,
            None => self.runs.push(record),
        }
    }

    /// Record a verify outcome
    pub fn record_verify(&mut self, verify: VerifyState) {
        self.last_verify = Some(verify);
    }
}

// ============================================================================
// Run ids
// ============================================================================

/// Generate a run id: `yyyyMMdd-HHmmss`, host-qualified when a host is given
pub fn new_run_id(now: DateTime<Utc>, host: Option<&str>) -> String {
    let stamp = now.format("%Y%m%d-%H%M%S");
    match host {
        Some(h) if !h.is_empty() => format!("{stamp}-{h}"),
        _ => stamp.to_string(),
    }
}

// ============================================================================
// Store
// ============================================================================

/// Owner of the state directory: run-state file, journals and backups
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open a store rooted at the given directory
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// State directory root
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_file(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    /// Directory where restore journals are persisted
    pub fn journals_dir(&self) -> PathBuf {
        self.dir.join("journals")
    }

    /// Journal file for one run
    pub fn journal_file(&self, run_id: &str) -> PathBuf {
        self.journals_dir().join(format!("{run_id}.json"))
    }

    /// Backup directory for one run
    pub fn backups_dir(&self, run_id: &str) -> PathBuf {
        self.dir.join("backups").join(run_id)
    }

    /// Load state from disk, or default if the file does not exist yet
    pub fn load(&self) -> Result<RunState> {
        let path = self.state_file();
        if !path.exists() {
            log::debug!("state file does not exist, using default state");
            return Ok(RunState::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let state: RunState = serde_json::from_str(&content).map_err(|e| Error::Corrupt {
            path: path.clone(),
            message: e.to_string(),
        })?;

        if state.schema_version > STATE_SCHEMA_VERSION {
            return Err(Error::SchemaIncompatible {
                path,
                found: state.schema_version,
                supported: STATE_SCHEMA_VERSION,
            });
        }

        Ok(state)
    }

    /// Save state to disk via atomic replace
    pub fn save(&self, state: &RunState) -> Result<()> {
        let content = serde_json::to_vec_pretty(state).map_err(|e| Error::Corrupt {
            path: self.state_file(),
            message: e.to_string(),
        })?;
        atomic_write(&self.state_file(), &content)?;
        log::debug!("saved state to {}", self.state_file().display());
        Ok(())
    }
}

/// Write a file atomically: stage in a temp file in the same directory,
/// then rename over the target
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
