//! Data types for manifests, restore entries, verify checks and config modules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The manifest schema major version this engine understands
pub const SUPPORTED_VERSION: u32 = 1;

// ============================================================================
// Manifest
// ============================================================================

/// A declarative description of desired machine state
///
/// Manifests are authored as JSONC, JSON or YAML. After resolution
/// (includes merged, exclusions applied, config modules expanded) the
/// manifest is self-contained: every app id is unique and every restore
/// and verify entry is concrete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema major version; must equal [`SUPPORTED_VERSION`]
    pub version: u32,

    /// Human-readable manifest name
    #[serde(default)]
    pub name: String,

    /// When this manifest was captured from a machine, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<DateTime<Utc>>,

    /// Applications to converge
    #[serde(default)]
    pub apps: Vec<AppEntry>,

    /// Configuration files to restore after install
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restore: Vec<RestoreEntry>,

    /// Post-convergence checks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verify: Vec<VerifyCheck>,

    /// Profile names or paths of manifests to merge in, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    /// App ids to drop after the merge
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Config-module ids to drop after the merge
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_configs: Vec<String>,

    /// Config-module references expanded against the module catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_modules: Vec<String>,
}

// ============================================================================
// Apps
// ============================================================================

/// A single application entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppEntry {
    /// Stable identifier, unique within a resolved manifest
    pub id: String,

    /// Installer driver id; older manifests omit this and get the
    /// primary driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    /// Per-platform package references (e.g. "windows" -> winget id)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub refs: BTreeMap<String, String>,

    /// Version constraint: "1.2.3" means exactly, ">=1.2.3" means at least
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl AppEntry {
    /// Driver id for this entry, falling back to the given primary driver
    pub fn driver_or<'a>(&'a self, primary: &'a str) -> &'a str {
        self.driver.as_deref().unwrap_or(primary)
    }
}

// ============================================================================
// Restore entries
// ============================================================================

/// How a restore entry converges its target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreKind {
    /// Copy the source file or directory tree over the target
    Copy,
    /// Deep-merge source JSON into the target JSON
    MergeJson,
    /// Merge source INI sections/keys into the target INI
    MergeIni,
    /// Append source content to the end of the target
    Append,
}

/// What to do when the restore target already exists
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Leave the existing target untouched
    #[default]
    Skip,
    /// Copy the target aside under the run's backup directory, then overwrite
    BackupAndOverwrite,
    /// Overwrite with no backup; engine-internal escape hatch, manifests
    /// should not set this directly
    Overwrite,
}

/// Sensitivity classification of a restore target, declared per config module
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Sensitivity {
    #[default]
    Low,
    Medium,
    High,
}

/// Restorer behavior for sensitive targets
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RestorerPolicy {
    /// Proceed, but record a warning on the journal entry
    #[default]
    WarnOnly,
    /// Refuse the action
    Block,
}

/// One configuration-restore action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreEntry {
    /// Convergence strategy
    #[serde(rename = "type")]
    pub kind: RestoreKind,

    /// Source path, relative to the export root or the manifest directory
    pub source: String,

    /// Target path on the machine; may use `~`
    pub target: String,

    /// Whether a backup is requested when overwriting
    #[serde(default = "default_true")]
    pub backup: bool,

    /// A missing source is tolerated instead of failing the entry
    #[serde(default)]
    pub optional: bool,

    /// Conflict policy when the target already exists
    #[serde(default)]
    pub on_conflict: ConflictPolicy,

    /// Sensitivity carried over from the declaring config module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<Sensitivity>,

    /// Restorer policy carried over from the declaring config module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restorer: Option<RestorerPolicy>,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Verify checks
// ============================================================================

/// A post-convergence host check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VerifyCheck {
    /// A file or directory exists at the given path
    #[serde(rename_all = "camelCase")]
    FileExists { path: String },

    /// An executable is resolvable on PATH
    #[serde(rename_all = "camelCase")]
    CommandExists { command: String },

    /// A Windows registry key exists (fails with a reason elsewhere)
    #[serde(rename_all = "camelCase")]
    RegistryKeyExists { key: String },

    /// An installed app satisfies a version constraint
    #[serde(rename_all = "camelCase")]
    Version { app: String, constraint: String },
}

impl VerifyCheck {
    /// Short label used in reports
    pub fn label(&self) -> String {
        match self {
            Self::FileExists { path } => format!("file-exists {path}"),
            Self::CommandExists { command } => format!("command-exists {command}"),
            Self::RegistryKeyExists { key } => format!("registry-key-exists {key}"),
            Self::Version { app, constraint } => format!("version {app} {constraint}"),
        }
    }
}

// ============================================================================
// Config modules
// ============================================================================

/// A catalog entry describing how one well-known application is restored
/// and verified
///
/// The catalog file format and its schema validation are owned by the
/// catalog tooling; this is the shape the resolver consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigModule {
    /// Module id, referenced from `configModules`
    pub id: String,

    /// Driver package ids this module matches
    #[serde(default)]
    pub driver_ids: Vec<String>,

    /// Executable names this module matches
    #[serde(default)]
    pub executables: Vec<String>,

    /// Uninstall-registry display names this module matches
    #[serde(default)]
    pub display_names: Vec<String>,

    /// Sensitivity of the configuration this module touches
    #[serde(default)]
    pub sensitivity: Sensitivity,

    /// Restorer behavior when the sensitivity check trips
    #[serde(default)]
    pub restorer: RestorerPolicy,

    /// Restore entries contributed by this module
    #[serde(default)]
    pub restore: Vec<RestoreEntry>,

    /// Verify checks contributed by this module
    #[serde(default)]
    pub verify: Vec<VerifyCheck>,
}
