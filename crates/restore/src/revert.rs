//! Revert
//!
//! Replays a past restore journal in reverse. Entries that restored over
//! a backed-up target get the backup copied back; entries that created a
//! target delete it; skipped and blocked entries are no-ops. Running
//! revert twice over the same journal is safe: work already undone is
//! detected and skipped.

use crate::error::Result;
use crate::fsops;
use crate::journal::{JournalAction, JournalEntry, RestoreJournal};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of a revert pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevertSummary {
    /// Backups copied back over their targets
    pub restored_backups: usize,
    /// Created targets removed
    pub removed: usize,
    /// Entries with nothing to undo
    pub skipped: usize,
    /// Entries that could not be undone
    pub failed: usize,
}

impl RevertSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Revert a journal, newest entry first
pub fn revert(journal: &RestoreJournal, dry_run: bool) -> Result<RevertSummary> {
    let mut summary = RevertSummary::default();

    for entry in journal.entries.iter().rev() {
        match revert_entry(entry, dry_run) {
            RevertOutcome::RestoredBackup => summary.restored_backups += 1,
            RevertOutcome::Removed => summary.removed += 1,
            RevertOutcome::Nothing => summary.skipped += 1,
            RevertOutcome::Failed(reason) => {
                log::warn!("revert {}: {reason}", entry.target);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

enum RevertOutcome {
    RestoredBackup,
    Removed,
    Nothing,
    Failed(String),
}

fn revert_entry(entry: &JournalEntry, dry_run: bool) -> RevertOutcome {
    if entry.action != JournalAction::Restored {
        return RevertOutcome::Nothing;
    }

    let target = PathBuf::from(&entry.target);

    if entry.backup_created {
        let Some(backup) = entry.backup_path.as_deref().map(Path::new) else {
            return RevertOutcome::Failed("backup recorded but no backup path".into());
        };
        if !backup.exists() {
            // Already reverted (or backup pruned); idempotent no-op
            return RevertOutcome::Nothing;
        }
        if dry_run {
            return RevertOutcome::RestoredBackup;
        }
        return match fsops::copy_path(backup, &target) {
            Ok(()) => RevertOutcome::RestoredBackup,
            Err(e) => RevertOutcome::Failed(e.to_string()),
        };
    }

    if !entry.target_existed_before {
        if !target.exists() {
            // Already removed; idempotent no-op
            return RevertOutcome::Nothing;
        }
        if dry_run {
            return RevertOutcome::Removed;
        }
        let result = if target.is_dir() {
            std::fs::remove_dir_all(&target)
        } else {
            std::fs::remove_file(&target)
        };
        return match result {
            Ok(()) => RevertOutcome::Removed,
            Err(e) => RevertOutcome::Failed(e.to_string()),
        };
    }

    // Restored over an existing target without a backup (overwrite policy):
    // there is nothing to roll back to.
    RevertOutcome::Failed("no backup exists for overwritten target".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(target: &Path) -> JournalEntry {
        JournalEntry {
            source: "src".into(),
            target: target.display().to_string(),
            target_existed_before: false,
            backup_requested: true,
            backup_created: false,
            backup_path: None,
            action: JournalAction::Restored,
            error: None,
            warning: None,
        }
    }

    fn journal(entries: Vec<JournalEntry>) -> RestoreJournal {
        RestoreJournal {
            run_id: "20250101-120000".into(),
            timestamp_utc: chrono::Utc::now(),
            manifest_path: "m.json".into(),
            manifest_dir: "/export".into(),
            export_root: None,
            entries,
        }
    }

    #[test]
    fn created_target_is_deleted() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(".gitconfig");
        fs::write(&target, "restored content").unwrap();

        let summary = revert(&journal(vec![entry(&target)]), false).unwrap();

        assert_eq!(summary.removed, 1);
        assert!(!target.exists());
    }

    #[test]
    fn backup_is_copied_back_over_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(".gitconfig");
        let backup = dir.path().join("backups/.gitconfig");
        fs::write(&target, "new content").unwrap();
        fs::create_dir_all(backup.parent().unwrap()).unwrap();
        fs::write(&backup, "original content").unwrap();

        let mut e = entry(&target);
        e.target_existed_before = true;
        e.backup_created = true;
        e.backup_path = Some(backup.display().to_string());

        let summary = revert(&journal(vec![e]), false).unwrap();

        assert_eq!(summary.restored_backups, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "original content");
    }

    #[test]
    fn revert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(".gitconfig");
        fs::write(&target, "restored content").unwrap();
        let j = journal(vec![entry(&target)]);

        let first = revert(&j, false).unwrap();
        assert_eq!(first.removed, 1);

        let second = revert(&j, false).unwrap();
        assert_eq!(second.removed, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.failed, 0);
    }

    #[test]
    fn skipped_entries_are_noops() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(".gitconfig");
        fs::write(&target, "untouched").unwrap();

        let mut e = entry(&target);
        e.action = JournalAction::SkippedExists;
        e.target_existed_before = true;

        let summary = revert(&journal(vec![e]), false).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "untouched");
    }

    #[test]
    fn dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(".gitconfig");
        fs::write(&target, "restored content").unwrap();

        let summary = revert(&journal(vec![entry(&target)]), true).unwrap();
        assert_eq!(summary.removed, 1);
        assert!(target.exists());
    }

    #[test]
    fn overwrite_without_backup_cannot_be_undone() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(".gitconfig");
        fs::write(&target, "x").unwrap();

        let mut e = entry(&target);
        e.target_existed_before = true; // overwrite policy, no backup

        let summary = revert(&journal(vec![e]), false).unwrap();
        assert_eq!(summary.failed, 1);
    }
}
