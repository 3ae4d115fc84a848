//! Drift detection
//!
//! Drift compares the last recorded manifest hash and the desired app set
//! against the current manifest hash and installed inventory. Version
//! constraint evaluation is injected by the caller so this crate stays
//! below the planner in the dependency order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A desired app, reduced to what drift needs
#[derive(Debug, Clone)]
pub struct DesiredApp {
    pub id: String,
    /// Version constraint, if the manifest pinned one
    pub version: Option<String>,
}

/// An installed app whose version no longer satisfies its constraint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionDrift {
    pub id: String,
    pub installed: String,
    pub constraint: String,
}

/// What changed since the last run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    /// Manifest hash differs from the last applied one
    pub manifest_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hash: Option<String>,
    pub current_hash: String,
    /// Desired but not installed
    pub missing: Vec<String>,
    /// Installed but not desired
    pub extra: Vec<String>,
    /// Installed but at the wrong version
    pub version_mismatches: Vec<VersionDrift>,
}

impl DriftReport {
    /// True when nothing drifted
    pub fn is_clean(&self) -> bool {
        !self.manifest_changed
            && self.missing.is_empty()
            && self.extra.is_empty()
            && self.version_mismatches.is_empty()
    }
}

/// Compute drift between desired state and the installed inventory
///
/// `satisfies` answers whether an installed version meets a constraint;
/// the planner's comparator is passed in here.
pub fn compute_drift<F>(
    desired: &[DesiredApp],
    inventory: &BTreeMap<String, String>,
    last_hash: Option<&str>,
    current_hash: &str,
    satisfies: F,
) -> DriftReport
where
    F: Fn(&str, &str) -> bool,
{
    let mut report = DriftReport {
        manifest_changed: last_hash != Some(current_hash),
        last_hash: last_hash.map(ToString::to_string),
        current_hash: current_hash.to_string(),
        ..Default::default()
    };

    for app in desired {
        match inventory.get(&app.id) {
            None => report.missing.push(app.id.clone()),
            Some(installed) => {
                if let Some(constraint) = &app.version
                    && !satisfies(installed, constraint)
                {
                    report.version_mismatches.push(VersionDrift {
                        id: app.id.clone(),
                        installed: installed.clone(),
                        constraint: constraint.clone(),
                    });
                }
            }
        }
    }

    let desired_ids: std::collections::BTreeSet<&str> =
        desired.iter().map(|a| a.id.as_str()).collect();
    for id in inventory.keys() {
        if !desired_ids.contains(id.as_str()) {
            report.extra.push(id.clone());
        }
    }

    report
}
