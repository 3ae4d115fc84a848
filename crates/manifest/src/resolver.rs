//! Manifest resolution
//!
//! Loading, include/profile composition, exclusion filtering and
//! config-module expansion. Merge precedence: later includes override
//! earlier ones, and a manifest's own entries override everything it
//! includes, so the root manifest always wins.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::jsonc;
use crate::types::{AppEntry, Manifest, SUPPORTED_VERSION};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Extensions probed when an include names a profile rather than a path
const PROFILE_EXTENSIONS: &[&str] = &["jsonc", "json", "yaml", "yml", "zip"];

/// Manifest file names probed inside an expanded bundle
const BUNDLE_MANIFEST_NAMES: &[&str] = &[
    "manifest.jsonc",
    "manifest.json",
    "manifest.yaml",
    "manifest.yml",
];

/// Resolver configuration
#[derive(Debug, Default, Clone)]
pub struct ResolveOptions {
    /// Directory where profile-name includes are looked up
    pub manifests_root: Option<PathBuf>,
}

/// A fully resolved manifest plus where it came from
#[derive(Debug)]
pub struct ResolvedManifest {
    /// Merged, filtered, expanded manifest
    pub manifest: Manifest,
    /// Path of the root manifest file (or bundle archive)
    pub root_path: PathBuf,
    /// Directory of the root manifest; restore sources resolve against it
    pub base_dir: PathBuf,
    /// Holds a root bundle's extraction directory for as long as the
    /// resolution is in use; `base_dir` points into it
    _bundle_dir: Option<tempfile::TempDir>,
}

/// Resolve a manifest file into its final, self-contained form
///
/// A `.zip` root is treated as a bundle: the archive is expanded and the
/// manifest inside it becomes the root document, with restore sources
/// resolving against the extraction directory.
pub fn resolve(path: &Path, catalog: &Catalog, options: &ResolveOptions) -> Result<ResolvedManifest> {
    let (doc_path, bundle_dir) = if path.extension().and_then(|e| e.to_str()) == Some("zip") {
        let (dir, inner) = expand_bundle(path)?;
        (inner, Some(dir))
    } else {
        (path.to_path_buf(), None)
    };

    let mut visited = BTreeSet::new();
    let mut manifest = resolve_layers(&doc_path, options, &mut visited)?;

    apply_exclusions(&mut manifest);
    expand_config_modules(&mut manifest, catalog)?;
    check_unique_app_ids(path, &manifest)?;

    let base_dir = doc_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    Ok(ResolvedManifest {
        manifest,
        root_path: path.to_path_buf(),
        base_dir,
        _bundle_dir: bundle_dir,
    })
}

/// Deterministic canonical serialization of a resolved manifest
///
/// Field order is fixed by the struct, entry order by the merge, so two
/// identical resolutions serialize byte-identically.
pub fn to_canonical_json(manifest: &Manifest) -> String {
    // Serialization of an in-memory manifest cannot fail
    serde_json::to_string_pretty(manifest).unwrap_or_default()
}

// ============================================================================
// Loading
// ============================================================================

/// Parse one manifest document, without touching its includes
pub fn load_document(path: &Path) -> Result<Manifest> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let value = parse_to_value(path, &content)?;
    validate_document(path, &value)?;

    serde_json::from_value(value).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_to_value(path: &Path, content: &str) -> Result<serde_json::Value> {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml");

    if is_yaml {
        serde_yaml::from_str(content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        let stripped = jsonc::strip_comments(content);
        serde_json::from_str(&stripped).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

fn validate_document(path: &Path, value: &serde_json::Value) -> Result<()> {
    let object = value.as_object().ok_or_else(|| Error::Validation {
        path: path.to_path_buf(),
        message: "manifest must be an object".into(),
    })?;

    match object.get("version").and_then(serde_json::Value::as_u64) {
        None => {
            return Err(Error::Validation {
                path: path.to_path_buf(),
                message: "missing 'version'".into(),
            });
        }
        Some(v) if v != u64::from(SUPPORTED_VERSION) => {
            return Err(Error::Validation {
                path: path.to_path_buf(),
                message: format!(
                    "unsupported manifest version {v} (this engine supports {SUPPORTED_VERSION})"
                ),
            });
        }
        Some(_) => {}
    }

    if !object.contains_key("apps") {
        return Err(Error::Validation {
            path: path.to_path_buf(),
            message: "missing 'apps'".into(),
        });
    }

    // Duplicate ids inside a single document are author mistakes; the
    // cross-layer merge would silently hide one of them otherwise.
    if let Some(apps) = object.get("apps").and_then(serde_json::Value::as_array) {
        let mut seen = BTreeSet::new();
        for app in apps {
            if let Some(id) = app.get("id").and_then(serde_json::Value::as_str)
                && !seen.insert(id.to_string())
            {
                return Err(Error::Validation {
                    path: path.to_path_buf(),
                    message: format!("duplicate app id '{id}'"),
                });
            }
        }
    }

    Ok(())
}

// ============================================================================
// Include composition
// ============================================================================

/// Resolve a manifest and everything it includes into one merged layer
fn resolve_layers(
    path: &Path,
    options: &ResolveOptions,
    visited: &mut BTreeSet<PathBuf>,
) -> Result<Manifest> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        log::warn!("include cycle at {}, skipping", path.display());
        return Ok(Manifest {
            version: SUPPORTED_VERSION,
            ..Default::default()
        });
    }

    let own = load_document(path)?;
    let base_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    // Merge includes first, in listed order: later wins over earlier.
    let mut merged = Manifest {
        version: SUPPORTED_VERSION,
        ..Default::default()
    };
    for include in &own.includes {
        let layer = resolve_include(include, &base_dir, options, visited)?;
        merge_layer(&mut merged, layer);
    }

    // The including manifest itself is the final, highest-priority layer.
    merge_layer(&mut merged, own);
    merged.includes.clear();

    Ok(merged)
}

fn resolve_include(
    spec: &str,
    base_dir: &Path,
    options: &ResolveOptions,
    visited: &mut BTreeSet<PathBuf>,
) -> Result<Manifest> {
    let path = locate_include(spec, base_dir, options)?;

    if path.extension().and_then(|e| e.to_str()) == Some("zip") {
        return resolve_bundle(&path, options, visited);
    }

    log::debug!("merging include {} from {}", spec, path.display());
    resolve_layers(&path, options, visited)
}

/// Turn an include spec into a concrete file path
///
/// A spec that exists relative to the including manifest (or absolutely)
/// is a path include; otherwise it is a profile name looked up under the
/// manifests root with well-known extensions.
fn locate_include(spec: &str, base_dir: &Path, options: &ResolveOptions) -> Result<PathBuf> {
    let as_path = Path::new(spec);
    if as_path.is_absolute() && as_path.exists() {
        return Ok(as_path.to_path_buf());
    }

    let relative = base_dir.join(as_path);
    if relative.exists() {
        return Ok(relative);
    }

    if let Some(root) = &options.manifests_root {
        for ext in PROFILE_EXTENSIONS {
            let candidate = root.join(format!("{spec}.{ext}"));
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(Error::IncludeNotFound(spec.to_string()))
}

/// Expand a bundle archive to a scoped temp directory and resolve the
/// manifest inside it
///
/// The extraction directory is removed when this function returns, on
/// every path out - success, parse error or panic - because `TempDir`
/// cleans up on drop. Included bundles contribute only merged content,
/// so nothing in them needs to outlive resolution.
fn resolve_bundle(
    path: &Path,
    options: &ResolveOptions,
    visited: &mut BTreeSet<PathBuf>,
) -> Result<Manifest> {
    let (_dir, inner) = expand_bundle(path)?;
    resolve_layers(&inner, options, visited)
}

/// Extract a bundle archive and locate the manifest file inside it
///
/// Returns the extraction guard alongside the inner manifest path; the
/// extraction lives exactly as long as the guard.
fn expand_bundle(path: &Path) -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::TempDir::new()?;

    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| Error::Bundle {
        path: path.to_path_buf(),
        source,
    })?;
    archive.extract(dir.path()).map_err(|source| Error::Bundle {
        path: path.to_path_buf(),
        source,
    })?;

    let inner = BUNDLE_MANIFEST_NAMES
        .iter()
        .map(|name| dir.path().join(name))
        .find(|p| p.exists())
        .ok_or_else(|| Error::Validation {
            path: path.to_path_buf(),
            message: "bundle does not contain a manifest file".into(),
        })?;

    log::debug!("expanded bundle {} to {}", path.display(), dir.path().display());
    Ok((dir, inner))
}

// ============================================================================
// Merging and filtering
// ============================================================================

/// Merge `layer` over `base`; `layer` has the higher priority
fn merge_layer(base: &mut Manifest, layer: Manifest) {
    if !layer.name.is_empty() {
        base.name = layer.name;
    }
    if layer.captured.is_some() {
        base.captured = layer.captured;
    }

    for app in layer.apps {
        merge_app(&mut base.apps, app);
    }
    base.restore.extend(layer.restore);
    base.verify.extend(layer.verify);

    for module in layer.config_modules {
        if !base.config_modules.contains(&module) {
            base.config_modules.push(module);
        }
    }
    for id in layer.exclude {
        if !base.exclude.contains(&id) {
            base.exclude.push(id);
        }
    }
    for id in layer.exclude_configs {
        if !base.exclude_configs.contains(&id) {
            base.exclude_configs.push(id);
        }
    }
}

/// An app defined again in a higher layer replaces the earlier definition
/// but keeps its original position, so output order stays stable.
fn merge_app(apps: &mut Vec<AppEntry>, entry: AppEntry) {
    if let Some(existing) = apps.iter_mut().find(|a| a.id == entry.id) {
        *existing = entry;
    } else {
        apps.push(entry);
    }
}

/// Drop excluded apps and config modules
///
/// Runs strictly after the merge so an include can never reintroduce an
/// entry the root manifest excluded.
fn apply_exclusions(manifest: &mut Manifest) {
    if !manifest.exclude.is_empty() {
        let excluded: BTreeSet<&String> = manifest.exclude.iter().collect();
        manifest.apps.retain(|a| !excluded.contains(&a.id));
    }
    if !manifest.exclude_configs.is_empty() {
        let excluded: BTreeSet<&String> = manifest.exclude_configs.iter().collect();
        manifest.config_modules.retain(|m| !excluded.contains(m));
    }
}

/// Expand config-module references into concrete restore/verify entries
fn expand_config_modules(manifest: &mut Manifest, catalog: &Catalog) -> Result<()> {
    let mut expanded = BTreeSet::new();

    for reference in &manifest.config_modules {
        let module = catalog
            .find(reference)
            .ok_or_else(|| Error::UnknownConfigModule(reference.clone()))?;

        // Two references may resolve to the same module
        if !expanded.insert(module.id.clone()) {
            continue;
        }

        for entry in &module.restore {
            let mut entry = entry.clone();
            entry.sensitivity.get_or_insert(module.sensitivity);
            entry.restorer.get_or_insert(module.restorer);
            manifest.restore.push(entry);
        }
        manifest.verify.extend(module.verify.iter().cloned());
        log::debug!("expanded config module '{}' for '{reference}'", module.id);
    }

    Ok(())
}

fn check_unique_app_ids(path: &Path, manifest: &Manifest) -> Result<()> {
    let mut seen = BTreeSet::new();
    for app in &manifest.apps {
        if !seen.insert(app.id.clone()) {
            return Err(Error::Validation {
                path: path.to_path_buf(),
                message: format!("duplicate app id '{}' after include merge", app.id),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfigModule, RestorerPolicy, Sensitivity};
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = resolve(
            &dir.path().join("nope.json"),
            &Catalog::default(),
            &ResolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.code(), "ManifestNotFound");
    }

    #[test]
    fn wrong_version_fails_validation_before_anything_else() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(dir.path(), "m.json", r#"{ "version": 2, "apps": [] }"#);
        let err = resolve(&path, &Catalog::default(), &ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.code(), "ManifestValidationError");
    }

    #[test]
    fn missing_apps_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(dir.path(), "m.json", r#"{ "version": 1 }"#);
        let err = resolve(&path, &Catalog::default(), &ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn jsonc_comments_are_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            dir.path(),
            "m.jsonc",
            r#"{
                // workstation baseline
                "version": 1,
                "apps": [ { "id": "git" } /* pinned later */ ]
            }"#,
        );
        let resolved = resolve(&path, &Catalog::default(), &ResolveOptions::default()).unwrap();
        assert_eq!(resolved.manifest.apps.len(), 1);
    }

    #[test]
    fn yaml_manifest_parses() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            dir.path(),
            "m.yaml",
            "version: 1\nname: workstation\napps:\n  - id: git\n",
        );
        let resolved = resolve(&path, &Catalog::default(), &ResolveOptions::default()).unwrap();
        assert_eq!(resolved.manifest.name, "workstation");
        assert_eq!(resolved.manifest.apps[0].id, "git");
    }

    #[test]
    fn later_include_wins_and_root_wins_over_all() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            "base.json",
            r#"{ "version": 1, "apps": [
                { "id": "git", "version": "2.40.0" },
                { "id": "curl" } ] }"#,
        );
        write_manifest(
            dir.path(),
            "override.json",
            r#"{ "version": 1, "apps": [ { "id": "git", "version": "2.45.0" } ] }"#,
        );
        let root = write_manifest(
            dir.path(),
            "root.json",
            r#"{ "version": 1,
                 "includes": ["base.json", "override.json"],
                 "apps": [ { "id": "curl", "version": ">=8.0" } ] }"#,
        );

        let resolved = resolve(&root, &Catalog::default(), &ResolveOptions::default()).unwrap();
        let apps = &resolved.manifest.apps;

        // Position comes from first definition, content from the winner
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].id, "git");
        assert_eq!(apps[0].version.as_deref(), Some("2.45.0"));
        assert_eq!(apps[1].id, "curl");
        assert_eq!(apps[1].version.as_deref(), Some(">=8.0"));
    }

    #[test]
    fn profile_name_resolves_under_manifests_root() {
        let root_dir = TempDir::new().unwrap();
        let profiles = TempDir::new().unwrap();
        write_manifest(
            profiles.path(),
            "developer.jsonc",
            r#"{ "version": 1, "apps": [ { "id": "rustup" } ] }"#,
        );
        let root = write_manifest(
            root_dir.path(),
            "root.json",
            r#"{ "version": 1, "includes": ["developer"], "apps": [] }"#,
        );

        let options = ResolveOptions {
            manifests_root: Some(profiles.path().to_path_buf()),
        };
        let resolved = resolve(&root, &Catalog::default(), &options).unwrap();
        assert_eq!(resolved.manifest.apps[0].id, "rustup");
    }

    #[test]
    fn unknown_include_is_reported() {
        let dir = TempDir::new().unwrap();
        let root = write_manifest(
            dir.path(),
            "root.json",
            r#"{ "version": 1, "includes": ["missing-profile"], "apps": [] }"#,
        );
        let err = resolve(&root, &Catalog::default(), &ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::IncludeNotFound(_)));
    }

    #[test]
    fn exclusion_applies_after_merge() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            "extras.json",
            r#"{ "version": 1, "apps": [ { "id": "slack" }, { "id": "zoom" } ] }"#,
        );
        let root = write_manifest(
            dir.path(),
            "root.json",
            r#"{ "version": 1,
                 "includes": ["extras.json"],
                 "exclude": ["slack"],
                 "apps": [] }"#,
        );

        let resolved = resolve(&root, &Catalog::default(), &ResolveOptions::default()).unwrap();
        let ids: Vec<&str> = resolved.manifest.apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["zoom"]);
    }

    #[test]
    fn bundle_include_is_expanded_and_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let bundle_path = dir.path().join("extras.zip");

        let file = fs::File::create(&bundle_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("manifest.json", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(br#"{ "version": 1, "apps": [ { "id": "7zip" } ] }"#)
            .unwrap();
        zip.finish().unwrap();

        let root = write_manifest(
            dir.path(),
            "root.json",
            r#"{ "version": 1, "includes": ["extras.zip"], "apps": [] }"#,
        );
        let resolved = resolve(&root, &Catalog::default(), &ResolveOptions::default()).unwrap();
        assert_eq!(resolved.manifest.apps[0].id, "7zip");
    }

    #[test]
    fn root_zip_bundle_resolves_and_keeps_extraction_alive() {
        let dir = TempDir::new().unwrap();
        let bundle_path = dir.path().join("machine.zip");

        let file = fs::File::create(&bundle_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("manifest.json", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            br#"{ "version": 1,
                  "apps": [ { "id": "git" } ],
                  "restore": [ { "type": "copy", "source": "settings.json", "target": "~/x" } ] }"#,
        )
        .unwrap();
        zip.start_file("settings.json", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"{}").unwrap();
        zip.finish().unwrap();

        let resolved =
            resolve(&bundle_path, &Catalog::default(), &ResolveOptions::default()).unwrap();
        assert_eq!(resolved.manifest.apps[0].id, "git");
        assert_eq!(resolved.root_path, bundle_path);
        // Restore sources must be reachable under base_dir while the
        // resolution is held
        assert!(resolved.base_dir.join("settings.json").exists());
    }

    #[test]
    fn config_modules_expand_with_sensitivity() {
        let dir = TempDir::new().unwrap();
        let root = write_manifest(
            dir.path(),
            "root.json",
            r#"{ "version": 1, "apps": [], "configModules": ["openssh"] }"#,
        );

        let catalog = Catalog::new(vec![ConfigModule {
            id: "openssh".into(),
            sensitivity: Sensitivity::High,
            restorer: RestorerPolicy::Block,
            restore: vec![serde_json::from_str(
                r#"{ "type": "copy", "source": "ssh/config", "target": "~/.ssh/config" }"#,
            )
            .unwrap()],
            ..Default::default()
        }]);

        let resolved = resolve(&root, &catalog, &ResolveOptions::default()).unwrap();
        let entry = &resolved.manifest.restore[0];
        assert_eq!(entry.sensitivity, Some(Sensitivity::High));
        assert_eq!(entry.restorer, Some(RestorerPolicy::Block));
    }

    #[test]
    fn excluded_config_module_is_not_expanded() {
        let dir = TempDir::new().unwrap();
        let root = write_manifest(
            dir.path(),
            "root.json",
            r#"{ "version": 1, "apps": [],
                 "configModules": ["git"], "excludeConfigs": ["git"] }"#,
        );
        let catalog = Catalog::new(vec![ConfigModule {
            id: "git".into(),
            ..Default::default()
        }]);

        let resolved = resolve(&root, &catalog, &ResolveOptions::default()).unwrap();
        assert!(resolved.manifest.restore.is_empty());
        assert!(resolved.manifest.config_modules.is_empty());
    }

    #[test]
    fn canonical_serialization_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let root = write_manifest(
            dir.path(),
            "root.json",
            r#"{ "version": 1, "apps": [ { "id": "git" }, { "id": "curl" } ] }"#,
        );

        let a = resolve(&root, &Catalog::default(), &ResolveOptions::default()).unwrap();
        let b = resolve(&root, &Catalog::default(), &ResolveOptions::default()).unwrap();
        assert_eq!(to_canonical_json(&a.manifest), to_canonical_json(&b.manifest));
    }
}
