//! Installer driver interface
//!
//! Concrete drivers (winget, apt, brew) live outside the engine; this is
//! the seam they plug into. The registry is built once at startup and
//! passed through the pipeline immutably.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// A package the driver reports as installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: String,
    pub version: String,
}

/// Failure of a single driver operation
///
/// `Unavailable` is fatal (the driver cannot work at all); `Failed` is a
/// per-item result that never aborts the batch.
#[derive(ThisError, Debug)]
pub enum DriverError {
    #[error("driver unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

/// Pluggable installer adapter
pub trait Driver: Send + Sync {
    /// Driver id as referenced from manifests (e.g. "winget", "brew")
    fn id(&self) -> &str;

    /// Snapshot of installed packages: id and version
    fn list_installed(&self) -> std::result::Result<Vec<InstalledPackage>, DriverError>;

    /// Install a package by id
    fn install(&self, id: &str) -> std::result::Result<(), DriverError>;

    /// Upgrade a package by id
    fn upgrade(&self, id: &str) -> std::result::Result<(), DriverError>;

    /// Whether this driver can upgrade in place
    fn supports_upgrade(&self) -> bool {
        false
    }
}

/// Immutable registry of drivers, keyed by driver id
pub struct DriverRegistry {
    primary: String,
    drivers: BTreeMap<String, Box<dyn Driver>>,
}

impl DriverRegistry {
    /// Create a registry; `primary` is the driver apps get when their
    /// entry does not name one
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            drivers: BTreeMap::new(),
        }
    }

    /// Add a driver; builder-style so construction reads as one expression
    pub fn with(mut self, driver: Box<dyn Driver>) -> Self {
        self.drivers.insert(driver.id().to_string(), driver);
        self
    }

    /// Id of the primary driver
    pub fn primary_id(&self) -> &str {
        &self.primary
    }

    /// Look up a driver, failing fatally when it is not registered
    pub fn get(&self, id: &str) -> Result<&dyn Driver> {
        self.drivers
            .get(id)
            .map(AsRef::as_ref)
            .ok_or_else(|| Error::DriverUnavailable(format!("no driver registered for '{id}'")))
    }

    /// Installed inventory across all registered drivers, id -> version
    pub fn inventory(&self) -> Result<BTreeMap<String, String>> {
        let mut inventory = BTreeMap::new();
        for driver in self.drivers.values() {
            let installed = driver
                .list_installed()
                .map_err(|e| Error::DriverUnavailable(format!("{}: {e}", driver.id())))?;
            for package in installed {
                inventory.insert(package.id, package.version);
            }
        }
        Ok(inventory)
    }
}
