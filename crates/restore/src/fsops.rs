//! Filesystem operations behind restore entries
//!
//! Copy, merge and append primitives. Everything here either fully writes
//! the target or leaves it untouched; partial writes are prevented by
//! staging through the state crate's atomic replace where the target is a
//! file.

use crate::error::Result;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Copy a file or directory tree over the target
///
/// A pre-existing destination directory is removed first. Without that,
/// the recursive copy nests the source one level deeper inside the
/// destination instead of replacing it.
pub fn copy_path(source: &Path, target: &Path) -> Result<()> {
    if source.is_dir() {
        if target.exists() {
            fs::remove_dir_all(target)?;
        }
        copy_tree(source, target)
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = fs::read(source)?;
        state::atomic_write(target, &bytes)?;
        Ok(())
    }
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path());
        let dest = target.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Deep-merge source JSON into the target JSON; source wins on conflicts
///
/// A missing target degenerates to a plain copy.
pub fn merge_json_file(source: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        return copy_path(source, target);
    }

    let source_value: serde_json::Value = serde_json::from_str(&fs::read_to_string(source)?)
        .map_err(invalid_data)?;
    let mut target_value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(target)?).map_err(invalid_data)?;

    merge_json_value(&mut target_value, &source_value);

    let merged = serde_json::to_vec_pretty(&target_value).map_err(invalid_data)?;
    state::atomic_write(target, &merged)?;
    Ok(())
}

fn merge_json_value(target: &mut serde_json::Value, source: &serde_json::Value) {
    match (target, source) {
        (serde_json::Value::Object(t), serde_json::Value::Object(s)) => {
            for (key, value) in s {
                match t.get_mut(key) {
                    Some(existing) => merge_json_value(existing, value),
                    None => {
                        t.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (t, s) => *t = s.clone(),
    }
}

/// Merge source INI sections and keys into the target INI
///
/// Target formatting and comments are preserved; source keys override
/// existing values in their section, new keys append to the section, new
/// sections append at the end.
pub fn merge_ini_file(source: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        return copy_path(source, target);
    }

    let source_text = fs::read_to_string(source)?;
    let target_text = fs::read_to_string(target)?;
    let merged = merge_ini_text(&target_text, &source_text);
    state::atomic_write(target, merged.as_bytes())?;
    Ok(())
}

fn merge_ini_text(target: &str, source: &str) -> String {
    // (section, key, value) triples from the source; "" = before any section
    let mut overlay: Vec<(String, String, String)> = Vec::new();
    let mut section = String::new();
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            section = trimmed[1..trimmed.len() - 1].to_string();
        } else if let Some((key, value)) = trimmed.split_once('=')
            && !trimmed.starts_with(';')
            && !trimmed.starts_with('#')
        {
            overlay.push((section.clone(), key.trim().to_string(), value.trim().to_string()));
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut applied = vec![false; overlay.len()];
    let mut section = String::new();

    let flush_section =
        |out: &mut Vec<String>, applied: &mut Vec<bool>, section: &str| {
            for (i, (sec, key, value)) in overlay.iter().enumerate() {
                if !applied[i] && sec == section {
                    out.push(format!("{key} = {value}"));
                    applied[i] = true;
                }
            }
        };

    for line in target.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            // Entering a new section: emit overlay keys the old one never had
            flush_section(&mut out, &mut applied, &section);
            section = trimmed[1..trimmed.len() - 1].to_string();
            out.push(line.to_string());
        } else if let Some((key, _)) = trimmed.split_once('=')
            && !trimmed.starts_with(';')
            && !trimmed.starts_with('#')
            && let Some(i) = overlay
                .iter()
                .position(|(sec, k, _)| sec == &section && k == key.trim())
        {
            out.push(format!("{} = {}", key.trim(), overlay[i].2));
            applied[i] = true;
        } else {
            out.push(line.to_string());
        }
    }
    flush_section(&mut out, &mut applied, &section);

    // Sections the target never had, grouped in source order
    let mut new_sections: Vec<String> = Vec::new();
    for (i, (sec, _, _)) in overlay.iter().enumerate() {
        if !applied[i] && !new_sections.contains(sec) {
            new_sections.push(sec.clone());
        }
    }
    for sec in new_sections {
        out.push(format!("[{sec}]"));
        for (i, (s, key, value)) in overlay.iter().enumerate() {
            if !applied[i] && s == &sec {
                out.push(format!("{key} = {value}"));
                applied[i] = true;
            }
        }
    }

    let mut merged = out.join("\n");
    merged.push('\n');
    merged
}

/// Append source content to the target, creating it if absent
pub fn append_file(source: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        return copy_path(source, target);
    }

    let mut content = fs::read(target)?;
    if content.last().is_some_and(|b| *b != b'\n') {
        content.push(b'\n');
    }
    content.extend_from_slice(&fs::read(source)?);
    state::atomic_write(target, &content)?;
    Ok(())
}

/// Best-effort probe for a target locked by a running process
///
/// Tries to open the existing file for writing; an open failure on an
/// existing path is treated as in-use rather than risking a partial write.
pub fn target_in_use(target: &Path) -> bool {
    if !target.exists() || target.is_dir() {
        return false;
    }
    fs::OpenOptions::new().append(true).open(target).is_err()
}

fn invalid_data(e: serde_json::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copy_tree_replaces_existing_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub/a.txt"), "new").unwrap();
        fs::create_dir_all(dst.join("old")).unwrap();
        fs::write(dst.join("old/stale.txt"), "stale").unwrap();

        copy_path(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("sub/a.txt")).unwrap(), "new");
        // The trap: source must not be nested one level deeper
        assert!(!dst.join("src").exists());
        assert!(!dst.join("old").exists());
    }

    #[test]
    fn merge_json_is_deep_and_source_wins() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.json");
        let dst = dir.path().join("dst.json");
        fs::write(&src, r#"{ "editor": { "fontSize": 14 }, "theme": "dark" }"#).unwrap();
        fs::write(&dst, r#"{ "editor": { "fontSize": 12, "tabSize": 2 } }"#).unwrap();

        merge_json_file(&src, &dst).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&dst).unwrap()).unwrap();
        assert_eq!(value["editor"]["fontSize"], 14);
        assert_eq!(value["editor"]["tabSize"], 2);
        assert_eq!(value["theme"], "dark");
    }

    #[test]
    fn merge_ini_overrides_and_appends() {
        let target = "[core]\neditor = vim\n; comment\n[color]\nui = auto\n";
        let source = "[core]\neditor = nvim\npager = less\n[alias]\nst = status\n";

        let merged = merge_ini_text(target, source);

        assert!(merged.contains("editor = nvim"));
        assert!(merged.contains("pager = less"));
        assert!(merged.contains("; comment"));
        assert!(merged.contains("[alias]"));
        assert!(merged.contains("st = status"));
        assert!(merged.contains("ui = auto"));
        // Override happened in place, not duplicated
        assert_eq!(merged.matches("editor").count(), 1);
    }

    #[test]
    fn append_adds_separator_newline_when_needed() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("extra.sh");
        let dst = dir.path().join("profile.sh");
        fs::write(&src, "alias ll='ls -l'\n").unwrap();
        fs::write(&dst, "export PATH=$PATH:~/bin").unwrap();

        append_file(&src, &dst).unwrap();

        assert_eq!(
            fs::read_to_string(&dst).unwrap(),
            "export PATH=$PATH:~/bin\nalias ll='ls -l'\n"
        );
    }

    #[test]
    fn in_use_probe_is_quiet_for_free_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        assert!(!target_in_use(&file));
        assert!(!target_in_use(&dir.path().join("missing.txt")));
    }
}
