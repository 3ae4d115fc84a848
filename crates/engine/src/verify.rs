//! Post-convergence verification
//!
//! Runs the manifest's verify checks against the live host and records
//! the outcome in run state. Checks are read-only; a failing check never
//! mutates anything, it only lowers the pass count.

use crate::driver::DriverRegistry;
use crate::error::Result;
use crate::version;
use manifest::VerifyCheck;
use serde::{Deserialize, Serialize};
use state::{StateStore, VerifyState};
use std::collections::BTreeMap;
use std::path::Path;

/// Outcome of one check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub check: String,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome of a full verify pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub results: Vec<CheckResult>,
}

impl VerifyReport {
    pub fn is_success(&self) -> bool {
        self.fail == 0
    }
}

/// Run all checks and persist the summary to run state
pub fn run(
    checks: &[VerifyCheck],
    manifest_hash: &str,
    registry: &DriverRegistry,
    store: &StateStore,
) -> Result<VerifyReport> {
    // Inventory is fetched once; version checks share the snapshot.
    let needs_inventory = checks
        .iter()
        .any(|c| matches!(c, VerifyCheck::Version { .. }));
    let inventory = if needs_inventory {
        registry.inventory()?
    } else {
        BTreeMap::new()
    };

    let results: Vec<CheckResult> = checks
        .iter()
        .map(|check| evaluate(check, &inventory))
        .collect();

    let pass = results.iter().filter(|r| r.pass).count();
    let report = VerifyReport {
        total: results.len(),
        pass,
        fail: results.len() - pass,
        results,
    };

    let mut run_state = store.load()?;
    run_state.record_verify(VerifyState {
        manifest_hash: manifest_hash.to_string(),
        timestamp_utc: chrono::Utc::now(),
        total: report.total,
        pass: report.pass,
        fail: report.fail,
    });
    store.save(&run_state)?;

    Ok(report)
}

fn evaluate(check: &VerifyCheck, inventory: &BTreeMap<String, String>) -> CheckResult {
    let (pass, reason) = match check {
        VerifyCheck::FileExists { path } => {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                (true, None)
            } else {
                (false, Some(format!("no file at {expanded}")))
            }
        }
        VerifyCheck::CommandExists { command } => {
            if command_on_path(command) {
                (true, None)
            } else {
                (false, Some(format!("'{command}' not found on PATH")))
            }
        }
        VerifyCheck::RegistryKeyExists { key } => registry_key_exists(key),
        VerifyCheck::Version { app, constraint } => match lookup(inventory, app) {
            Some(installed) if version::satisfies(installed, constraint) => (true, None),
            Some(installed) => (
                false,
                Some(format!("installed {installed}, wanted {constraint}")),
            ),
            None => (false, Some(format!("'{app}' is not installed"))),
        },
    };

    CheckResult {
        check: check.label(),
        pass,
        reason,
    }
}

/// Inventory lookup, tolerant of id casing differences between the
/// manifest and the driver listing
fn lookup<'a>(inventory: &'a BTreeMap<String, String>, app: &str) -> Option<&'a String> {
    inventory.get(app).or_else(|| {
        inventory
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(app))
            .map(|(_, version)| version)
    })
}

/// Resolve a command name against PATH, honoring `.exe` on Windows
fn command_on_path(command: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let direct = dir.join(command);
        if direct.is_file() {
            return true;
        }
        cfg!(windows) && dir.join(format!("{command}.exe")).is_file()
    })
}

#[cfg(windows)]
fn registry_key_exists(key: &str) -> (bool, Option<String>) {
    match std::process::Command::new("reg")
        .args(["query", key])
        .output()
    {
        Ok(out) if out.status.success() => (true, None),
        Ok(_) => (false, Some(format!("registry key {key} not found"))),
        Err(e) => (false, Some(format!("reg query failed: {e}"))),
    }
}

#[cfg(not(windows))]
fn registry_key_exists(key: &str) -> (bool, Option<String>) {
    (
        false,
        Some(format!(
            "registry check for {key} is only meaningful on Windows"
        )),
    )
}
