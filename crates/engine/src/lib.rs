//! Convergence engine
//!
//! Turns a resolved manifest into action: classify each desired app
//! against the installed inventory ([`planner`]), execute the resulting
//! plan through package-manager drivers ([`executor`]), run read-only
//! host checks afterwards ([`verify`]) and report drift between runs.
//!
//! The engine is deliberately idempotent: planning the same manifest
//! against the same host twice yields the same plan, and applying a plan
//! to a converged host performs no driver mutations.

pub mod driver;
pub mod error;
pub mod executor;
pub mod planner;
pub mod verify;
pub mod version;

pub use driver::{Driver, DriverError, DriverRegistry, InstalledPackage};
pub use error::{Error, Result};
pub use executor::{apply, ApplyOptions, ApplyReport, ItemResult, ItemStatus, RestoreCounts};
pub use planner::{CurrentState, Decision, Plan, PlannedAction};
pub use verify::{CheckResult, VerifyReport};

use manifest::Manifest;
use state::{DesiredApp, DriftReport};

/// Compare desired state against the live inventory and the last run
///
/// `last_hash` is the manifest hash recorded on the previous apply, if
/// any; `current_hash` is the hash of the manifest being checked now.
pub fn drift(
    manifest: &Manifest,
    current_hash: &str,
    last_hash: Option<&str>,
    registry: &DriverRegistry,
) -> Result<DriftReport> {
    let inventory = registry.inventory()?;
    let desired: Vec<DesiredApp> = manifest
        .apps
        .iter()
        .map(|app| DesiredApp {
            id: app.id.clone(),
            version: app.version.clone(),
        })
        .collect();
    Ok(state::compute_drift(
        &desired,
        &inventory,
        last_hash,
        current_hash,
        version::satisfies,
    ))
}
