//! Plan generation
//!
//! Diffs a resolved manifest against the installed inventory into an
//! ordered action list. Output order equals manifest order, so two plans
//! computed from identical inputs are byte-identical - plan files are
//! reproducible and apply can replay a frozen plan later.

use crate::driver::DriverRegistry;
use crate::error::{Error, Result};
use crate::version;
use chrono::{DateTime, Utc};
use manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Where an app stands relative to its desired state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CurrentState {
    Absent,
    Installed,
    VersionMismatch,
}

/// What apply should do about it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Install,
    Upgrade,
    Skip,
}

/// One planned action, in manifest order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAction {
    pub app_id: String,
    pub driver: String,
    pub current_state: CurrentState,
    pub decision: Decision,
    pub reason: String,
}

/// A frozen, replayable plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub manifest_hash: String,
    pub generated_utc: DateTime<Utc>,
    pub actions: Vec<PlannedAction>,
}

impl Plan {
    /// Actions that will mutate the machine
    pub fn pending(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions.iter().filter(|a| a.decision != Decision::Skip)
    }

    /// Persist the plan as JSON via atomic replace
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| Error::PlanParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        state::atomic_write(path, &bytes)?;
        Ok(())
    }

    /// Load a previously generated plan
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::PlanNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::PlanParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Generate a plan from a resolved manifest and the current inventory
pub fn generate(
    manifest: &Manifest,
    manifest_hash: &str,
    registry: &DriverRegistry,
) -> Result<Plan> {
    let inventory = registry.inventory()?;
    generate_with_inventory(manifest, manifest_hash, registry, &inventory)
}

/// Plan against a pre-fetched inventory snapshot
pub fn generate_with_inventory(
    manifest: &Manifest,
    manifest_hash: &str,
    registry: &DriverRegistry,
    inventory: &BTreeMap<String, String>,
) -> Result<Plan> {
    let mut actions = Vec::with_capacity(manifest.apps.len());

    for app in &manifest.apps {
        let driver_id = app.driver_or(registry.primary_id());
        let driver = registry.get(driver_id)?;

        let action = match inventory.get(&app.id) {
            None => PlannedAction {
                app_id: app.id.clone(),
                driver: driver_id.to_string(),
                current_state: CurrentState::Absent,
                decision: Decision::Install,
                reason: "not installed".into(),
            },
            Some(installed) => match &app.version {
                None => PlannedAction {
                    app_id: app.id.clone(),
                    driver: driver_id.to_string(),
                    current_state: CurrentState::Installed,
                    decision: Decision::Skip,
                    reason: format!("installed ({installed})"),
                },
                Some(constraint) if version::satisfies(installed, constraint) => PlannedAction {
                    app_id: app.id.clone(),
                    driver: driver_id.to_string(),
                    current_state: CurrentState::Installed,
                    decision: Decision::Skip,
                    reason: format!("{installed} satisfies {constraint}"),
                },
                Some(constraint) => {
                    let (decision, reason) = if driver.supports_upgrade() {
                        (
                            Decision::Upgrade,
                            format!("{installed} does not satisfy {constraint}"),
                        )
                    } else {
                        (
                            Decision::Skip,
                            format!(
                                "{installed} does not satisfy {constraint}, driver '{driver_id}' cannot upgrade"
                            ),
                        )
                    };
                    PlannedAction {
                        app_id: app.id.clone(),
                        driver: driver_id.to_string(),
                        current_state: CurrentState::VersionMismatch,
                        decision,
                        reason,
                    }
                }
            },
        };
        actions.push(action);
    }

    log::info!(
        "planned {} actions ({} pending)",
        actions.len(),
        actions.iter().filter(|a| a.decision != Decision::Skip).count()
    );

    Ok(Plan {
        manifest_hash: manifest_hash.to_string(),
        generated_utc: Utc::now(),
        actions,
    })
}
