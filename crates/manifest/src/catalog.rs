//! Config-module catalog
//!
//! The catalog maps well-known applications to restore entries and verify
//! checks. Its file format and schema validation belong to the catalog
//! tooling; here it is a registry built once at startup and passed through
//! the pipeline immutably.

use crate::error::{Error, Result};
use crate::jsonc;
use crate::types::ConfigModule;
use serde::Deserialize;
use std::path::Path;

/// Immutable config-module registry
#[derive(Debug, Default)]
pub struct Catalog {
    modules: Vec<ConfigModule>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    modules: Vec<ConfigModule>,
}

impl Catalog {
    /// Build a catalog from already-loaded modules
    pub fn new(modules: Vec<ConfigModule>) -> Self {
        Self { modules }
    }

    /// Load a catalog file (JSONC object with a `modules` array)
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let stripped = jsonc::strip_comments(&content);
        let file: CatalogFile =
            serde_json::from_str(&stripped).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        log::debug!(
            "loaded {} config modules from {}",
            file.modules.len(),
            path.display()
        );
        Ok(Self::new(file.modules))
    }

    /// Number of modules in the catalog
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Look up a module by id
    pub fn get(&self, id: &str) -> Option<&ConfigModule> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Resolve a manifest reference to a module
    ///
    /// Matches, in order: module id, driver package identity, executable
    /// name, uninstall-registry display name. Display names compare
    /// case-insensitively; everything else is exact.
    pub fn find(&self, reference: &str) -> Option<&ConfigModule> {
        if let Some(m) = self.get(reference) {
            return Some(m);
        }
        if let Some(m) = self
            .modules
            .iter()
            .find(|m| m.driver_ids.iter().any(|d| d == reference))
        {
            return Some(m);
        }
        if let Some(m) = self
            .modules
            .iter()
            .find(|m| m.executables.iter().any(|e| e == reference))
        {
            return Some(m);
        }
        self.modules.iter().find(|m| {
            m.display_names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(reference))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RestoreEntry, RestoreKind, Sensitivity};

    fn sample() -> Catalog {
        let json = r#"{
            "modules": [
                {
                    "id": "git",
                    "driverIds": ["Git.Git"],
                    "executables": ["git"],
                    "displayNames": ["Git"],
                    "restore": [
                        { "type": "copy", "source": "git/.gitconfig", "target": "~/.gitconfig" }
                    ]
                },
                {
                    "id": "openssh",
                    "executables": ["ssh"],
                    "sensitivity": "high",
                    "restorer": "block"
                }
            ]
        }"#;
        let file: CatalogFile = serde_json::from_str(json).unwrap();
        Catalog::new(file.modules)
    }

    #[test]
    fn finds_by_id_driver_exe_and_display_name() {
        let catalog = sample();
        assert_eq!(catalog.find("git").unwrap().id, "git");
        assert_eq!(catalog.find("Git.Git").unwrap().id, "git");
        assert_eq!(catalog.find("ssh").unwrap().id, "openssh");
        assert_eq!(catalog.find("GIT").unwrap().id, "git"); // display name, case-insensitive
        assert!(catalog.find("nope").is_none());
    }

    #[test]
    fn module_sensitivity_deserializes() {
        let catalog = sample();
        let ssh = catalog.get("openssh").unwrap();
        assert_eq!(ssh.sensitivity, Sensitivity::High);
    }

    #[test]
    fn module_restore_entries_are_concrete() {
        let catalog = sample();
        let entries: &Vec<RestoreEntry> = &catalog.get("git").unwrap().restore;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, RestoreKind::Copy);
    }
}
