//! Apply execution
//!
//! Runs a plan against the drivers. Install/upgrade actions are split
//! into a parallel-safe batch (bounded worker pool) and a must-run-serial
//! batch for installers with shared global state. Results land in a
//! ledger keyed by plan position, so parallel completion order never
//! leaks into reports, journals or summaries - and every result is
//! flushed to the run-state file as it lands, so an interrupt at any
//! point leaves the completed items on disk.

use crate::driver::DriverRegistry;
use crate::error::{Error, Result};
use crate::planner::{CurrentState, Decision, Plan, PlannedAction};
use manifest::Manifest;
use rayon::prelude::*;
use restore::RestoreOptions;
use serde::{Deserialize, Serialize};
use state::{RunCounts, RunRecord, StateStore};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Installer-id patterns that must never run concurrently: these touch
/// machine-wide installer locks or shared runtime state.
const SERIAL_ONLY_PATTERNS: &[&str] = &[
    "vcredist",
    "dotnet",
    "visualstudio",
    "sqlserver",
    "office",
    "wsl",
    "msiexec",
];

/// Options for one apply run
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Classify and count, but never call a driver mutation or restore
    pub dry_run: bool,
    /// Run the restore phase after installation
    pub enable_restore: bool,
    /// Worker pool bound for parallel-safe actions
    pub jobs: usize,
    /// Export root forwarded to the restore phase
    pub export_root: Option<PathBuf>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            enable_restore: false,
            jobs: 4,
            export_root: None,
        }
    }
}

/// Terminal status of one applied item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    Installed,
    AlreadyInstalled,
    Upgraded,
    Failed,
    SkippedFiltered,
}

/// Result of one item, in manifest order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub app_id: String,
    pub driver: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Restore-phase counters on the apply report
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreCounts {
    pub total: usize,
    pub restored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Everything one apply run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub run_id: String,
    pub dry_run: bool,
    pub counts: RunCounts,
    pub items: Vec<ItemResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<RestoreCounts>,
}

impl ApplyReport {
    /// True when no item failed; partial failures make this false while
    /// the run itself still returns `Ok`
    pub fn is_success(&self) -> bool {
        self.counts.is_success() && self.restore.is_none_or(|r| r.failed == 0)
    }
}

/// Execute a plan
///
/// Fatal errors (unknown driver, unreadable state) abort before any
/// driver mutation. Per-item failures are recorded and execution
/// continues. Run state is persisted after the install phase even when
/// items failed, so drift detection always sees the last attempt.
pub fn apply(
    plan: &Plan,
    manifest: &Manifest,
    manifest_path: &Path,
    manifest_dir: &Path,
    registry: &DriverRegistry,
    store: &StateStore,
    run_id: &str,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    // Fail fast, before any mutation: state must be writable-compatible
    // and every planned driver must exist.
    let mut run_state = store.load()?;
    for action in plan.pending() {
        registry.get(&action.driver)?;
    }

    let mut seeded: Vec<Option<ItemResult>> = vec![None; plan.actions.len()];

    for (i, action) in plan.actions.iter().enumerate() {
        match action.decision {
            Decision::Skip => seeded[i] = Some(skip_result(action)),
            Decision::Install | Decision::Upgrade if options.dry_run => {
                seeded[i] = Some(simulated_result(action));
            }
            Decision::Install | Decision::Upgrade => {}
        }
    }

    // Ordered by construction: the ledger is indexed by plan position.
    let items: Vec<ItemResult> = if options.dry_run {
        seeded.into_iter().flatten().collect()
    } else {
        let ledger = ProgressLedger {
            store,
            manifest_path,
            manifest_hash: &plan.manifest_hash,
            run_id,
            total: seeded.len(),
            results: Mutex::new(seeded),
        };
        execute_pending(plan, registry, options.jobs, &ledger)?;
        ledger.into_results().into_iter().flatten().collect()
    };
    let counts = count(&items, items.len());

    run_state.record_apply(
        manifest_path,
        RunRecord {
            run_id: run_id.to_string(),
            command: "apply".into(),
            timestamp_utc: chrono::Utc::now(),
            manifest_hash: plan.manifest_hash.clone(),
            dry_run: options.dry_run,
            counts,
        },
    );
    store.save(&run_state)?;

    // Restore is a second phase: it never runs before the target
    // applications exist, and never in a dry run.
    let restore_counts = if options.enable_restore && !options.dry_run && !manifest.restore.is_empty()
    {
        let journal = restore::run(
            &manifest.restore,
            manifest_path,
            manifest_dir,
            run_id,
            store,
            &RestoreOptions {
                dry_run: false,
                export_root: options.export_root.clone(),
            },
        )?;
        let restored = journal.restored();
        let failed = journal.failed();
        Some(RestoreCounts {
            total: journal.entries.len(),
            restored,
            failed,
            skipped: journal.entries.len() - restored - failed,
        })
    } else {
        None
    };

    Ok(ApplyReport {
        run_id: run_id.to_string(),
        dry_run: options.dry_run,
        counts,
        items,
        restore: restore_counts,
    })
}

/// In-flight result aggregation with flush-on-record persistence
///
/// Every recorded result rewrites this run's state snapshot on disk, so
/// completed items survive an external interrupt mid-batch. Lock
/// poisoning is tolerated: a panicking worker must not cost the others
/// their results.
struct ProgressLedger<'a> {
    store: &'a StateStore,
    manifest_path: &'a Path,
    manifest_hash: &'a str,
    run_id: &'a str,
    total: usize,
    results: Mutex<Vec<Option<ItemResult>>>,
}

impl ProgressLedger<'_> {
    fn record(&self, index: usize, item: ItemResult) {
        let snapshot: Vec<ItemResult> = {
            let mut results = self.lock();
            results[index] = Some(item);
            results.iter().flatten().cloned().collect()
        };
        // A failed flush must not abort the batch; the final save at the
        // end of the run still reports it.
        if let Err(e) = self.persist(&snapshot) {
            log::warn!("progress flush failed: {e}");
        }
    }

    fn persist(&self, items: &[ItemResult]) -> Result<()> {
        let mut run_state = self.store.load()?;
        run_state.record_apply(
            self.manifest_path,
            RunRecord {
                run_id: self.run_id.to_string(),
                command: "apply".into(),
                timestamp_utc: chrono::Utc::now(),
                manifest_hash: self.manifest_hash.to_string(),
                dry_run: false,
                counts: count(items, self.total),
            },
        );
        Ok(self.store.save(&run_state)?)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<ItemResult>>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn into_results(self) -> Vec<Option<ItemResult>> {
        self.results
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run pending actions: parallel-safe ones on a bounded pool, the rest
/// one at a time after the pool drains
fn execute_pending(
    plan: &Plan,
    registry: &DriverRegistry,
    jobs: usize,
    ledger: &ProgressLedger<'_>,
) -> Result<()> {
    let pending: Vec<(usize, &PlannedAction)> = plan
        .actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.decision != Decision::Skip)
        .collect();

    let (parallel, serial): (Vec<_>, Vec<_>) = pending
        .into_iter()
        .partition(|(_, a)| is_parallel_safe(&a.app_id));

    if !parallel.is_empty() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        pool.install(|| {
            parallel.par_iter().for_each(|(i, action)| {
                ledger.record(*i, execute_action(registry, action));
            });
        });
    }

    for (i, action) in serial {
        log::debug!("running '{}' serially (shared installer state)", action.app_id);
        ledger.record(i, execute_action(registry, action));
    }

    Ok(())
}

fn execute_action(registry: &DriverRegistry, action: &PlannedAction) -> ItemResult {
    // Drivers were validated before the run started
    let Ok(driver) = registry.get(&action.driver) else {
        return ItemResult {
            app_id: action.app_id.clone(),
            driver: action.driver.clone(),
            status: ItemStatus::Failed,
            error: Some(format!("driver '{}' disappeared mid-run", action.driver)),
        };
    };

    let outcome = match action.decision {
        Decision::Install => driver.install(&action.app_id).map(|()| ItemStatus::Installed),
        Decision::Upgrade => driver.upgrade(&action.app_id).map(|()| ItemStatus::Upgraded),
        Decision::Skip => Ok(ItemStatus::SkippedFiltered),
    };

    match outcome {
        Ok(status) => ItemResult {
            app_id: action.app_id.clone(),
            driver: action.driver.clone(),
            status,
            error: None,
        },
        Err(e) => {
            log::warn!("{} {} failed: {e}", action.decision_name(), action.app_id);
            ItemResult {
                app_id: action.app_id.clone(),
                driver: action.driver.clone(),
                status: ItemStatus::Failed,
                error: Some(e.to_string()),
            }
        }
    }
}

impl PlannedAction {
    fn decision_name(&self) -> &'static str {
        match self.decision {
            Decision::Install => "install",
            Decision::Upgrade => "upgrade",
            Decision::Skip => "skip",
        }
    }
}

fn skip_result(action: &PlannedAction) -> ItemResult {
    let status = match action.current_state {
        CurrentState::Installed => ItemStatus::AlreadyInstalled,
        CurrentState::Absent | CurrentState::VersionMismatch => ItemStatus::SkippedFiltered,
    };
    ItemResult {
        app_id: action.app_id.clone(),
        driver: action.driver.clone(),
        status,
        error: None,
    }
}

fn simulated_result(action: &PlannedAction) -> ItemResult {
    let status = match action.decision {
        Decision::Install => ItemStatus::Installed,
        Decision::Upgrade => ItemStatus::Upgraded,
        Decision::Skip => ItemStatus::SkippedFiltered,
    };
    ItemResult {
        app_id: action.app_id.clone(),
        driver: action.driver.clone(),
        status,
        error: None,
    }
}

fn count(items: &[ItemResult], total: usize) -> RunCounts {
    let mut counts = RunCounts {
        total,
        ..Default::default()
    };
    for item in items {
        match item.status {
            ItemStatus::Installed => counts.installed += 1,
            ItemStatus::Upgraded => counts.upgraded += 1,
            ItemStatus::AlreadyInstalled => counts.already_installed += 1,
            ItemStatus::SkippedFiltered => counts.skipped += 1,
            ItemStatus::Failed => counts.failed += 1,
        }
    }
    counts
}

/// Whether an app id is safe to install concurrently with others
fn is_parallel_safe(app_id: &str) -> bool {
    let id = app_id.to_lowercase();
    !SERIAL_ONLY_PATTERNS.iter().any(|p| id.contains(p))
}
