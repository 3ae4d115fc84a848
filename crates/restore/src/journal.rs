//! Restore journal
//!
//! One journal per restore run. Entries are appended in memory while the
//! run executes; the completed journal is persisted atomically once and
//! never mutated afterwards. Revert is its only consumer.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Terminal state of one journal entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    /// Target was written (copy, merge or append)
    Restored,
    /// Target existed and the conflict policy said leave it alone
    SkippedExists,
    /// Target is locked by a running process; nothing was written
    SkippedInUse,
    /// Optional source was absent
    SkippedMissingSource,
    /// Sensitive-path policy refused the action
    BlockedSensitive,
    /// Entry failed; `error` carries the reason
    Failed,
}

/// Record of one attempted restore entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub source: String,
    pub target: String,
    pub target_existed_before: bool,
    pub backup_requested: bool,
    pub backup_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    pub action: JournalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Warn-only sensitivity hits land here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Journal of one restore run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreJournal {
    pub run_id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub manifest_path: String,
    pub manifest_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_root: Option<String>,
    pub entries: Vec<JournalEntry>,
}

impl RestoreJournal {
    pub fn new(
        run_id: String,
        manifest_path: &Path,
        manifest_dir: &Path,
        export_root: Option<&Path>,
    ) -> Self {
        Self {
            run_id,
            timestamp_utc: Utc::now(),
            manifest_path: manifest_path.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            export_root: export_root.map(|p| p.display().to_string()),
            entries: Vec::new(),
        }
    }

    /// Count of entries that actually mutated a target
    pub fn restored(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.action == JournalAction::Restored)
            .count()
    }

    /// Count of failed entries
    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.action == JournalAction::Failed)
            .count()
    }

    /// Persist atomically; called exactly once, at the end of the run
    pub fn persist(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| Error::JournalCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        state::atomic_write(path, &bytes)?;
        log::debug!("persisted restore journal to {}", path.display());
        Ok(())
    }

    /// Load a past journal for revert
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::JournalNotFound(
                path.file_stem()
                    .map_or_else(|| path.display().to_string(), |s| {
                        s.to_string_lossy().to_string()
                    }),
            ));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::JournalCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Most recent journal file in a journal directory, by file name
///
/// Run-id file names sort chronologically, so lexicographic max is the
/// latest run.
pub fn latest_journal(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut latest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json")
            && latest.as_ref().is_none_or(|l| l < &path)
        {
            latest = Some(path);
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(action: JournalAction) -> JournalEntry {
        JournalEntry {
            source: "git/.gitconfig".into(),
            target: "/home/me/.gitconfig".into(),
            target_existed_before: false,
            backup_requested: true,
            backup_created: false,
            backup_path: None,
            action,
            error: None,
            warning: None,
        }
    }

    #[test]
    fn persist_and_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut journal = RestoreJournal::new(
            "20250101-120000".into(),
            Path::new("m.json"),
            Path::new("/export"),
            None,
        );
        journal.entries.push(entry(JournalAction::Restored));
        journal.entries.push(entry(JournalAction::SkippedExists));

        let path = dir.path().join("20250101-120000.json");
        journal.persist(&path).unwrap();

        let loaded = RestoreJournal::load(&path).unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.restored(), 1);
        assert_eq!(loaded.failed(), 0);
    }

    #[test]
    fn missing_journal_is_reported() {
        let err = RestoreJournal::load(Path::new("/nonexistent/20250101-000000.json"))
            .unwrap_err();
        assert!(matches!(err, Error::JournalNotFound(_)));
    }

    #[test]
    fn journal_actions_serialize_snake_case() {
        let json = serde_json::to_string(&JournalAction::SkippedExists).unwrap();
        assert_eq!(json, r#""skipped_exists""#);
        let json = serde_json::to_string(&JournalAction::SkippedInUse).unwrap();
        assert_eq!(json, r#""skipped_in_use""#);
    }

    #[test]
    fn latest_journal_picks_newest_run_id() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("20250101-120000.json"), "{}").unwrap();
        std::fs::write(dir.path().join("20250202-090000.json"), "{}").unwrap();

        let latest = latest_journal(dir.path()).unwrap().unwrap();
        assert!(latest.ends_with("20250202-090000.json"));
    }
}
