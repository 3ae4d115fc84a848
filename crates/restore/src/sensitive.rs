//! Sensitive-path guard
//!
//! A built-in deny-list covers the places config restores must not touch
//! blindly: SSH keys, credential stores, cloud CLI credential
//! directories. Config modules additionally declare their own sensitivity;
//! the module's restorer policy decides whether a hit blocks the entry or
//! only records a warning.

use manifest::{RestorerPolicy, Sensitivity};
use std::path::Path;

/// Path segments that always count as sensitive, relative to home
const DENY_LIST: &[&str] = &[
    ".ssh",
    ".gnupg",
    ".aws",
    ".azure",
    ".config/gcloud",
    ".kube",
    ".netrc",
    ".docker/config.json",
];

/// Outcome of the sensitivity check for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensitivityVerdict {
    /// Not sensitive; proceed silently
    Clear,
    /// Sensitive, policy is warn-only; proceed and record the warning
    Warn(String),
    /// Sensitive, policy is block; refuse the action
    Block(String),
}

/// Check a target path against the deny-list and declared sensitivity
pub fn check(
    target: &Path,
    declared: Option<Sensitivity>,
    policy: Option<RestorerPolicy>,
) -> SensitivityVerdict {
    let reason = deny_list_match(target).map_or_else(
        || {
            (declared == Some(Sensitivity::High))
                .then(|| "config module declares high sensitivity".to_string())
        },
        |rule| Some(format!("target matches sensitive path rule '{rule}'")),
    );

    match reason {
        None => SensitivityVerdict::Clear,
        Some(reason) => match policy.unwrap_or_default() {
            RestorerPolicy::Block => SensitivityVerdict::Block(reason),
            RestorerPolicy::WarnOnly => SensitivityVerdict::Warn(reason),
        },
    }
}

fn deny_list_match(target: &Path) -> Option<&'static str> {
    let normalized = target.to_string_lossy().replace('\\', "/");
    DENY_LIST.iter().copied().find(|rule| {
        normalized
            .split('/')
            .collect::<Vec<_>>()
            .windows(rule.split('/').count())
            .any(|w| w.join("/") == **rule)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ssh_directory_is_denied() {
        let target = PathBuf::from("/home/me/.ssh/config");
        assert!(matches!(
            check(&target, None, None),
            SensitivityVerdict::Warn(_)
        ));
        assert!(matches!(
            check(&target, None, Some(RestorerPolicy::Block)),
            SensitivityVerdict::Block(_)
        ));
    }

    #[test]
    fn nested_deny_rule_matches_whole_segments() {
        let hit = PathBuf::from("/home/me/.config/gcloud/credentials.db");
        assert!(!matches!(check(&hit, None, None), SensitivityVerdict::Clear));

        // ".config/gcloud-backup" must not match the ".config/gcloud" rule
        let miss = PathBuf::from("/home/me/.config/gcloud-backup/file");
        assert!(matches!(check(&miss, None, None), SensitivityVerdict::Clear));
    }

    #[test]
    fn declared_high_sensitivity_trips_without_deny_hit() {
        let target = PathBuf::from("/home/me/.config/someapp/tokens.json");
        assert!(matches!(
            check(&target, Some(Sensitivity::High), Some(RestorerPolicy::Block)),
            SensitivityVerdict::Block(_)
        ));
    }

    #[test]
    fn low_and_medium_do_not_trip_on_their_own() {
        let target = PathBuf::from("/home/me/.config/someapp/settings.json");
        assert_eq!(
            check(&target, Some(Sensitivity::Medium), None),
            SensitivityVerdict::Clear
        );
        assert_eq!(check(&target, Some(Sensitivity::Low), None), SensitivityVerdict::Clear);
    }

    #[test]
    fn windows_separators_normalize() {
        let target = PathBuf::from(r"C:\Users\me\.aws\credentials");
        assert!(!matches!(check(&target, None, None), SensitivityVerdict::Clear));
    }
}
