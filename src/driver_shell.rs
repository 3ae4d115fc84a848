//! Shell-based installer drivers
//!
//! Adapts real package-manager CLIs to the engine's `Driver` seam by
//! shelling out. Each verb is a full command line (program plus args);
//! install and upgrade get the package id appended. The inventory is
//! parsed from two-column `id version` output, which brew, dpkg and
//! winget can all be coaxed into.

use engine::{Driver, DriverError, DriverRegistry, InstalledPackage};
use std::process::Command;

/// A package-manager CLI wrapped as a driver
pub struct ShellDriver {
    id: String,
    list_cmd: Vec<String>,
    install_cmd: Vec<String>,
    /// `None` means the backend cannot upgrade in place
    upgrade_cmd: Option<Vec<String>>,
}

impl ShellDriver {
    /// Homebrew: `brew list --versions` is already two-column
    pub fn brew() -> Self {
        Self {
            id: "brew".into(),
            list_cmd: cmdline(&["brew", "list", "--versions"]),
            install_cmd: cmdline(&["brew", "install"]),
            upgrade_cmd: Some(cmdline(&["brew", "upgrade"])),
        }
    }

    /// apt, listing through dpkg-query for a stable two-column format
    pub fn apt() -> Self {
        Self {
            id: "apt".into(),
            list_cmd: cmdline(&["dpkg-query", "-W", "-f", "${Package} ${Version}\n"]),
            install_cmd: cmdline(&["apt-get", "install", "-y"]),
            upgrade_cmd: Some(cmdline(&["apt-get", "install", "-y", "--only-upgrade"])),
        }
    }

    /// winget with machine-friendly flags
    pub fn winget() -> Self {
        Self {
            id: "winget".into(),
            list_cmd: cmdline(&["winget", "list", "--disable-interactivity"]),
            install_cmd: cmdline(&[
                "winget",
                "install",
                "--exact",
                "--silent",
                "--accept-package-agreements",
                "--accept-source-agreements",
                "--id",
            ]),
            upgrade_cmd: Some(cmdline(&["winget", "upgrade", "--exact", "--silent", "--id"])),
        }
    }

    /// Any other CLI following the same verb shape
    pub fn custom(
        id: &str,
        list_cmd: &[&str],
        install_cmd: &[&str],
        upgrade_cmd: Option<&[&str]>,
    ) -> Self {
        Self {
            id: id.into(),
            list_cmd: cmdline(list_cmd),
            install_cmd: cmdline(install_cmd),
            upgrade_cmd: upgrade_cmd.map(cmdline),
        }
    }

    fn run(&self, cmd: &[String], package: Option<&str>) -> Result<String, DriverError> {
        let (program, base_args) = cmd
            .split_first()
            .ok_or_else(|| DriverError::Unavailable(format!("{}: empty command", self.id)))?;

        let mut command = Command::new(program);
        command.args(base_args);
        if let Some(package) = package {
            command.arg(package);
        }

        let output = command
            .output()
            .map_err(|e| DriverError::Unavailable(format!("{program}: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DriverError::Failed(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

impl Driver for ShellDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn list_installed(&self) -> Result<Vec<InstalledPackage>, DriverError> {
        let stdout = self
            .run(&self.list_cmd, None)
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;
        Ok(parse_inventory(&stdout))
    }

    fn install(&self, id: &str) -> Result<(), DriverError> {
        log::info!("installing {id} via {}", self.id);
        self.run(&self.install_cmd, Some(id)).map(|_| ())
    }

    fn upgrade(&self, id: &str) -> Result<(), DriverError> {
        let Some(upgrade_cmd) = &self.upgrade_cmd else {
            return Err(DriverError::Failed(format!(
                "{} cannot upgrade in place",
                self.id
            )));
        };
        log::info!("upgrading {id} via {}", self.id);
        self.run(upgrade_cmd, Some(id)).map(|_| ())
    }

    fn supports_upgrade(&self) -> bool {
        self.upgrade_cmd.is_some()
    }
}

fn cmdline(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Parse `id version` pairs, one per line; malformed lines are skipped
fn parse_inventory(stdout: &str) -> Vec<InstalledPackage> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let version = parts.next()?;
            Some(InstalledPackage {
                id: id.to_string(),
                version: version.to_string(),
            })
        })
        .collect()
}

/// Build the default registry for this platform
///
/// The primary driver is the platform's native package manager; apps
/// that name another registered driver still resolve to it explicitly.
pub fn default_registry() -> DriverRegistry {
    if cfg!(target_os = "windows") {
        DriverRegistry::new("winget").with(Box::new(ShellDriver::winget()))
    } else if cfg!(target_os = "macos") {
        DriverRegistry::new("brew").with(Box::new(ShellDriver::brew()))
    } else {
        DriverRegistry::new("apt").with(Box::new(ShellDriver::apt()))
    }
}
