//! Binary and archive deltas for modified non-text files.
//!
//! Every modified binary gets a size+hash metadata delta; zip/jar archives
//! additionally get a member-level diff and a MANIFEST.MF key diff, tar
//! archives a member-level diff.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::{Value, json};
use tracing::warn;

use crate::bundle::{ArchiveEntryDiff, Delta, DeltaCategory, Locator, SizeChange};
use crate::scan::{is_text, sha256_file};

/// Emits binary/archive deltas for every modified non-text file.
pub fn binary_deltas(golden_root: &Path, drift_root: &Path, modified: &[String]) -> Vec<Delta> {
    let mut out = Vec::new();

    for rel in modified {
        let gp = golden_root.join(rel);
        let dp = drift_root.join(rel);
        if !gp.exists() || !dp.exists() || is_text(&dp) {
            continue;
        }

        match metadata_delta(&gp, &dp, rel) {
            Ok(delta) => out.push(delta),
            Err(e) => {
                warn!(rel, error = %e, "skipping unreadable binary");
                continue;
            }
        }

        if let (Some(ge), Some(ce)) = (zip_entries(&gp), zip_entries(&dp)) {
            let diff = entry_diff(&ge, &ce);
            if !diff.added.is_empty() || !diff.removed.is_empty() || !diff.changed.is_empty() {
                let mut delta = Delta::new(
                    format!("zip~{rel}"),
                    DeltaCategory::ArchiveDelta,
                    rel.clone(),
                    Locator::Path { value: rel.clone() },
                    json!({"entries": ge.len()}),
                    json!({"entries": ce.len()}),
                );
                delta.archive_diff = Some(diff);
                out.push(delta);
            }

            let gm = zip_manifest(&gp);
            let cm = zip_manifest(&dp);
            let keys: std::collections::BTreeSet<&String> = gm.keys().chain(cm.keys()).collect();
            for k in keys {
                if gm.get(k) != cm.get(k) {
                    out.push(Delta::new(
                        format!("manifest~{rel}.{k}"),
                        DeltaCategory::ArchiveManifest,
                        rel.clone(),
                        Locator::Keypath {
                            value: format!("{rel}.MANIFEST.{k}"),
                            line_start: None,
                        },
                        gm.get(k).map(|v| Value::String(v.clone())).unwrap_or(Value::Null),
                        cm.get(k).map(|v| Value::String(v.clone())).unwrap_or(Value::Null),
                    ));
                }
            }
        } else if let (Some(ge), Some(ce)) = (tar_members(&gp), tar_members(&dp)) {
            let diff = entry_diff(&ge, &ce);
            if !diff.added.is_empty() || !diff.removed.is_empty() || !diff.changed.is_empty() {
                let mut delta = Delta::new(
                    format!("tar~{rel}"),
                    DeltaCategory::ArchiveDelta,
                    rel.clone(),
                    Locator::Path { value: rel.clone() },
                    json!({"entries": ge.len()}),
                    json!({"entries": ce.len()}),
                );
                delta.archive_diff = Some(diff);
                out.push(delta);
            }
        }
    }

    out
}

fn metadata_delta(gp: &Path, dp: &Path, rel: &str) -> std::io::Result<Delta> {
    let g_meta = std::fs::metadata(gp)?;
    let d_meta = std::fs::metadata(dp)?;
    Ok(Delta::new(
        format!("bin~{rel}"),
        DeltaCategory::BinaryMeta,
        rel,
        Locator::Path {
            value: rel.to_string(),
        },
        json!({"size": g_meta.len(), "sha256": sha256_file(gp)?}),
        json!({"size": d_meta.len(), "sha256": sha256_file(dp)?}),
    ))
}

fn entry_diff(g: &BTreeMap<String, u64>, d: &BTreeMap<String, u64>) -> ArchiveEntryDiff {
    let mut out = ArchiveEntryDiff::default();
    for (k, v) in d {
        if !g.contains_key(k) {
            out.added.insert(k.clone(), *v);
        }
    }
    for (k, v) in g {
        if !d.contains_key(k) {
            out.removed.insert(k.clone(), *v);
        }
    }
    for (k, gv) in g {
        if let Some(dv) = d.get(k) {
            if gv != dv {
                out.changed.insert(k.clone(), SizeChange { from: *gv, to: *dv });
            }
        }
    }
    out
}

/// Lists zip entries as name → uncompressed size; `None` when not a zip.
fn zip_entries(path: &Path) -> Option<BTreeMap<String, u64>> {
    let file = File::open(path).ok()?;
    let mut archive = zip::ZipArchive::new(file).ok()?;
    let mut out = BTreeMap::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).ok()?;
        if entry.is_file() {
            out.insert(entry.name().to_string(), entry.size());
        }
    }
    Some(out)
}

/// Parses `META-INF/MANIFEST.MF` into a key map; empty when absent.
fn zip_manifest(path: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Ok(file) = File::open(path) else {
        return out;
    };
    let Ok(mut archive) = zip::ZipArchive::new(file) else {
        return out;
    };
    let Ok(mut entry) = archive.by_name("META-INF/MANIFEST.MF") else {
        return out;
    };
    let mut text = String::new();
    if entry.read_to_string(&mut text).is_err() {
        return out;
    }
    for line in text.lines() {
        if let Some((k, v)) = line.split_once(':') {
            out.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    out
}

/// Lists tar members as name → size; `None` when not a tar.
fn tar_members(path: &Path) -> Option<BTreeMap<String, u64>> {
    let file = File::open(path).ok()?;
    let mut archive = tar::Archive::new(file);
    let mut out = BTreeMap::new();
    let entries = archive.entries().ok()?;
    for entry in entries {
        let entry = entry.ok()?;
        if entry.header().entry_type().is_file() {
            let name = entry.path().ok()?.to_string_lossy().to_string();
            out.insert(name, entry.header().size().ok()?);
        }
    }
    if out.is_empty() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn jar_entry_and_manifest_diff() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("golden");
        let drift = dir.path().join("drift");
        std::fs::create_dir_all(&golden).unwrap();
        std::fs::create_dir_all(&drift).unwrap();

        write_zip(
            &golden.join("app.jar"),
            &[
                ("META-INF/MANIFEST.MF", "Implementation-Version: 1.0\n"),
                ("com/acme/App.class", "aaaa"),
            ],
        );
        write_zip(
            &drift.join("app.jar"),
            &[
                ("META-INF/MANIFEST.MF", "Implementation-Version: 2.0\n"),
                ("com/acme/App.class", "aaaabb"),
                ("com/acme/New.class", "cc"),
            ],
        );

        let deltas = binary_deltas(&golden, &drift, &["app.jar".to_string()]);
        let ids: Vec<&str> = deltas.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"bin~app.jar"));
        assert!(ids.contains(&"zip~app.jar"));
        assert!(ids.contains(&"manifest~app.jar.Implementation-Version"));

        let zip_delta = deltas.iter().find(|d| d.id == "zip~app.jar").unwrap();
        let diff = zip_delta.archive_diff.as_ref().unwrap();
        assert!(diff.added.contains_key("com/acme/New.class"));
        assert!(diff.changed.contains_key("com/acme/App.class"));
    }

    #[test]
    fn text_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("golden");
        let drift = dir.path().join("drift");
        std::fs::create_dir_all(&golden).unwrap();
        std::fs::create_dir_all(&drift).unwrap();
        std::fs::write(golden.join("a.yml"), "a: 1\n").unwrap();
        std::fs::write(drift.join("a.yml"), "a: 2\n").unwrap();

        assert!(binary_deltas(&golden, &drift, &["a.yml".to_string()]).is_empty());
    }
}
