//! Restore execution
//!
//! Processes resolved restore entries as one journaled run. Per-entry
//! failures are recorded and the run continues; only journal persistence
//! itself can fail the run. Guard order per entry: sensitive-path check,
//! in-use check, then conflict dispatch.

use crate::error::Result;
use crate::fsops;
use crate::journal::{JournalAction, JournalEntry, RestoreJournal};
use crate::sensitive::{self, SensitivityVerdict};
use manifest::{ConflictPolicy, RestoreEntry, RestoreKind};
use state::StateStore;
use std::path::{Component, Path, PathBuf};

/// Options for one restore run
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Classify and journal, but write nothing and persist no journal
    pub dry_run: bool,
    /// Overrides the manifest directory as the root for relative sources
    pub export_root: Option<PathBuf>,
}

/// Execute restore entries and return the completed journal
///
/// The journal is re-persisted atomically under the state store after
/// every entry (never in a dry run), so an interrupt mid-run leaves the
/// completed entries on disk where revert can find them.
pub fn run(
    entries: &[RestoreEntry],
    manifest_path: &Path,
    manifest_dir: &Path,
    run_id: &str,
    store: &StateStore,
    options: &RestoreOptions,
) -> Result<RestoreJournal> {
    let source_root = options
        .export_root
        .clone()
        .unwrap_or_else(|| manifest_dir.to_path_buf());

    let mut journal = RestoreJournal::new(
        run_id.to_string(),
        manifest_path,
        manifest_dir,
        options.export_root.as_deref(),
    );

    for entry in entries {
        let record = process_entry(entry, &source_root, run_id, store, options.dry_run);
        if let Some(error) = &record.error {
            log::warn!("restore {} -> {}: {error}", record.source, record.target);
        }
        journal.entries.push(record);

        // Flush after each entry; a mid-run flush failure is survivable
        // as long as the final one lands.
        if !options.dry_run {
            if let Err(e) = journal.persist(&store.journal_file(run_id)) {
                log::warn!("journal flush failed after {}: {e}", journal.entries.len());
            }
        }
    }

    if !options.dry_run {
        journal.persist(&store.journal_file(run_id))?;
    }

    Ok(journal)
}

fn process_entry(
    entry: &RestoreEntry,
    source_root: &Path,
    run_id: &str,
    store: &StateStore,
    dry_run: bool,
) -> JournalEntry {
    let source = source_root.join(&entry.source);
    let target = expand_target(&entry.target);
    let target_existed = target.exists();

    let mut record = JournalEntry {
        source: entry.source.clone(),
        target: target.display().to_string(),
        target_existed_before: target_existed,
        backup_requested: entry.backup,
        backup_created: false,
        backup_path: None,
        action: JournalAction::SkippedExists,
        error: None,
        warning: None,
    };

    if !source.exists() {
        if entry.optional {
            record.action = JournalAction::SkippedMissingSource;
        } else {
            record.action = JournalAction::Failed;
            record.error = Some(format!(
                "RequiredSourceNotFound: {} does not exist",
                source.display()
            ));
        }
        return record;
    }

    match sensitive::check(&target, entry.sensitivity, entry.restorer) {
        SensitivityVerdict::Clear => {}
        SensitivityVerdict::Warn(reason) => record.warning = Some(reason),
        SensitivityVerdict::Block(reason) => {
            record.action = JournalAction::BlockedSensitive;
            record.error = Some(reason);
            return record;
        }
    }

    if target_existed && fsops::target_in_use(&target) {
        record.action = JournalAction::SkippedInUse;
        return record;
    }

    // Conflict dispatch. Default is skip: an existing target is never
    // touched unless the entry opted into an overwrite policy.
    if target_existed {
        match entry.on_conflict {
            ConflictPolicy::Skip => {
                record.action = JournalAction::SkippedExists;
                return record;
            }
            ConflictPolicy::BackupAndOverwrite => {
                let backup_path = store.backups_dir(run_id).join(backup_relative(&target));
                if !dry_run {
                    if let Err(e) = fsops::copy_path(&target, &backup_path) {
                        record.action = JournalAction::Failed;
                        record.error = Some(format!("backup failed: {e}"));
                        return record;
                    }
                }
                record.backup_created = true;
                record.backup_path = Some(backup_path.display().to_string());
            }
            ConflictPolicy::Overwrite => {}
        }
    }

    if dry_run {
        record.action = JournalAction::Restored;
        return record;
    }

    match perform(entry.kind, &source, &target) {
        Ok(()) => record.action = JournalAction::Restored,
        Err(e) => {
            record.action = JournalAction::Failed;
            record.error = Some(e.to_string());
        }
    }
    record
}

fn perform(kind: RestoreKind, source: &Path, target: &Path) -> Result<()> {
    match kind {
        RestoreKind::Copy => fsops::copy_path(source, target),
        RestoreKind::MergeJson => fsops::merge_json_file(source, target),
        RestoreKind::MergeIni => fsops::merge_ini_file(source, target),
        RestoreKind::Append => fsops::append_file(source, target),
    }
}

fn expand_target(target: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(target).as_ref())
}

/// Relative path of a target inside the run's backup directory
///
/// Targets under the home directory keep their home-relative structure;
/// anything else keeps its full structure minus the root/drive prefix.
fn backup_relative(target: &Path) -> PathBuf {
    if let Some(home) = dirs::home_dir()
        && let Ok(rel) = target.strip_prefix(&home)
    {
        return rel.to_path_buf();
    }
    target
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::RestorerPolicy;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        export: PathBuf,
        targets: PathBuf,
        store: StateStore,
        manifest_path: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let export = dir.path().join("export");
        let targets = dir.path().join("home");
        fs::create_dir_all(export.join("git")).unwrap();
        fs::create_dir_all(&targets).unwrap();
        fs::write(export.join("git/.gitconfig"), "[user]\nname = me\n").unwrap();
        let store = StateStore::new(dir.path().join("state"));
        let manifest_path = dir.path().join("m.json");
        Fixture {
            export,
            targets,
            store,
            manifest_path,
            _dir: dir,
        }
    }

    fn copy_entry(fx: &Fixture, on_conflict: ConflictPolicy) -> RestoreEntry {
        let target = fx.targets.join(".gitconfig");
        serde_json::from_value(serde_json::json!({
            "type": "copy",
            "source": "git/.gitconfig",
            "target": target.to_string_lossy(),
            "onConflict": serde_json::to_value(on_conflict).unwrap(),
        }))
        .unwrap()
    }

    fn run_one(fx: &Fixture, entry: RestoreEntry, run_id: &str) -> RestoreJournal {
        run(
            &[entry],
            &fx.manifest_path,
            &fx.export,
            run_id,
            &fx.store,
            &RestoreOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn absent_target_is_restored() {
        let fx = fixture();
        let journal = run_one(&fx, copy_entry(&fx, ConflictPolicy::Skip), "20250101-120000");

        let entry = &journal.entries[0];
        assert_eq!(entry.action, JournalAction::Restored);
        assert!(!entry.target_existed_before);
        assert!(!entry.backup_created);
        assert_eq!(
            fs::read_to_string(fx.targets.join(".gitconfig")).unwrap(),
            "[user]\nname = me\n"
        );
    }

    #[test]
    fn existing_target_with_default_policy_is_left_untouched() {
        let fx = fixture();
        fs::write(fx.targets.join(".gitconfig"), "local edits").unwrap();

        let journal = run_one(&fx, copy_entry(&fx, ConflictPolicy::Skip), "20250101-120001");

        let entry = &journal.entries[0];
        assert_eq!(entry.action, JournalAction::SkippedExists);
        assert!(!entry.backup_created);
        assert_eq!(
            fs::read_to_string(fx.targets.join(".gitconfig")).unwrap(),
            "local edits"
        );
    }

    #[test]
    fn backup_and_overwrite_preserves_structure_under_run_backups() {
        let fx = fixture();
        fs::write(fx.targets.join(".gitconfig"), "old").unwrap();

        let run_id = "20250101-120002";
        let journal = run_one(&fx, copy_entry(&fx, ConflictPolicy::BackupAndOverwrite), run_id);

        let entry = &journal.entries[0];
        assert_eq!(entry.action, JournalAction::Restored);
        assert!(entry.backup_created);

        let backup_path = PathBuf::from(entry.backup_path.as_ref().unwrap());
        assert!(backup_path.starts_with(fx.store.backups_dir(run_id)));
        assert_eq!(fs::read_to_string(&backup_path).unwrap(), "old");
        assert_eq!(
            fs::read_to_string(fx.targets.join(".gitconfig")).unwrap(),
            "[user]\nname = me\n"
        );
    }

    #[test]
    fn missing_required_source_fails_the_entry_only() {
        let fx = fixture();
        let mut entry = copy_entry(&fx, ConflictPolicy::Skip);
        entry.source = "git/missing".into();

        let journal = run_one(&fx, entry, "20250101-120003");
        let record = &journal.entries[0];
        assert_eq!(record.action, JournalAction::Failed);
        assert!(record.error.as_ref().unwrap().contains("RequiredSourceNotFound"));
    }

    #[test]
    fn missing_optional_source_is_skipped() {
        let fx = fixture();
        let mut entry = copy_entry(&fx, ConflictPolicy::Skip);
        entry.source = "git/missing".into();
        entry.optional = true;

        let journal = run_one(&fx, entry, "20250101-120004");
        assert_eq!(journal.entries[0].action, JournalAction::SkippedMissingSource);
    }

    #[test]
    fn blocked_sensitive_target_is_refused() {
        let fx = fixture();
        let mut entry = copy_entry(&fx, ConflictPolicy::Skip);
        let target = fx.targets.join(".ssh/config");
        entry.target = target.to_string_lossy().into_owned();
        entry.restorer = Some(RestorerPolicy::Block);

        let journal = run_one(&fx, entry, "20250101-120005");
        assert_eq!(journal.entries[0].action, JournalAction::BlockedSensitive);
        assert!(!target.exists());
    }

    #[test]
    fn warn_only_sensitive_target_proceeds_with_warning() {
        let fx = fixture();
        let mut entry = copy_entry(&fx, ConflictPolicy::Skip);
        let target = fx.targets.join(".ssh/config");
        entry.target = target.to_string_lossy().into_owned();

        let journal = run_one(&fx, entry, "20250101-120006");
        let record = &journal.entries[0];
        assert_eq!(record.action, JournalAction::Restored);
        assert!(record.warning.is_some());
        assert!(target.exists());
    }

    #[test]
    fn dry_run_writes_nothing_and_persists_no_journal() {
        let fx = fixture();
        let run_id = "20250101-120007";
        let journal = run(
            &[copy_entry(&fx, ConflictPolicy::Skip)],
            &fx.manifest_path,
            &fx.export,
            run_id,
            &fx.store,
            &RestoreOptions {
                dry_run: true,
                export_root: None,
            },
        )
        .unwrap();

        assert_eq!(journal.entries[0].action, JournalAction::Restored);
        assert!(!fx.targets.join(".gitconfig").exists());
        assert!(!fx.store.journal_file(run_id).exists());
    }

    #[test]
    fn journal_is_persisted_for_the_run() {
        let fx = fixture();
        let run_id = "20250101-120008";
        run_one(&fx, copy_entry(&fx, ConflictPolicy::Skip), run_id);

        let loaded = RestoreJournal::load(&fx.store.journal_file(run_id)).unwrap();
        assert_eq!(loaded.run_id, run_id);
        assert_eq!(loaded.entries.len(), 1);
    }

    #[test]
    fn journal_on_disk_tracks_each_completed_entry() {
        let fx = fixture();
        let run_id = "20250101-120009";
        let journal_path = fx.store.journal_file(run_id);
        let copied = fx.targets.join("journal-copy.json");

        // The second entry copies the journal file itself, capturing
        // what was on disk between entries.
        let second: RestoreEntry = serde_json::from_value(serde_json::json!({
            "type": "copy",
            "source": journal_path.to_string_lossy(),
            "target": copied.to_string_lossy(),
        }))
        .unwrap();

        run(
            &[copy_entry(&fx, ConflictPolicy::Skip), second],
            &fx.manifest_path,
            &fx.export,
            run_id,
            &fx.store,
            &RestoreOptions::default(),
        )
        .unwrap();

        // An interrupt after the first entry would have found it journaled.
        let mid_run: RestoreJournal =
            serde_json::from_str(&fs::read_to_string(&copied).unwrap()).unwrap();
        assert_eq!(mid_run.entries.len(), 1);

        let final_journal = RestoreJournal::load(&journal_path).unwrap();
        assert_eq!(final_journal.entries.len(), 2);
    }
}
