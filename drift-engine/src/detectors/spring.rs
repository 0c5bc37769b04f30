//! Spring profile detector: key-level diff across every
//! `application*.{yml,yaml,properties}` file on either side.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::Value;

use crate::bundle::{Delta, DeltaCategory, Locator};
use crate::parsers::{KeypathMap, first_line_for_key, parse_flat};

use super::find_files;

fn is_spring_config(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("application")
        && (lower.ends_with(".yml") || lower.ends_with(".yaml") || lower.ends_with(".properties"))
}

fn collect(root: &Path) -> BTreeMap<String, KeypathMap> {
    find_files(root, is_spring_config)
        .into_iter()
        .map(|rel| {
            let flat = parse_flat(&root.join(&rel));
            (rel, flat)
        })
        .collect()
}

/// Emits one `spring_profile` delta per added/removed/changed key.
pub fn detect(golden_root: &Path, drift_root: &Path) -> Vec<Delta> {
    let g = collect(golden_root);
    let d = collect(drift_root);

    let mut out = Vec::new();
    let rels: BTreeSet<&String> = g.keys().chain(d.keys()).collect();
    let empty = KeypathMap::new();

    for rel in rels {
        let gf = g.get(rel).unwrap_or(&empty);
        let df = d.get(rel).unwrap_or(&empty);

        for (k, v) in df {
            if !gf.contains_key(k) {
                out.push(Delta::new(
                    format!("spring+{rel}.{k}"),
                    DeltaCategory::SpringProfile,
                    rel.clone(),
                    Locator::for_key(rel, k),
                    Value::Null,
                    v.clone(),
                ));
            }
        }
        for (k, v) in gf {
            if !df.contains_key(k) {
                out.push(Delta::new(
                    format!("spring-{rel}.{k}"),
                    DeltaCategory::SpringProfile,
                    rel.clone(),
                    Locator::for_key(rel, k),
                    v.clone(),
                    Value::Null,
                ));
            }
        }
        for (k, gv) in gf {
            if let Some(dv) = df.get(k) {
                if gv != dv {
                    out.push(Delta::new(
                        format!("spring~{rel}.{k}"),
                        DeltaCategory::SpringProfile,
                        rel.clone(),
                        Locator::for_key(rel, k),
                        gv.clone(),
                        dv.clone(),
                    ));
                }
            }
        }
    }

    // Line hints: drift side first, golden as fallback. Only the leaf key
    // matters for the scan, so the full locator value works as the tail.
    for delta in &mut out {
        let tail = delta.locator.value().to_string();
        let line = first_line_for_key(&drift_root.join(&delta.file), &tail)
            .or_else(|| first_line_for_key(&golden_root.join(&delta.file), &tail));
        if let Some(line) = line {
            delta.locator.set_line_start(line);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_key_diff() {
        let golden = tempfile::tempdir().unwrap();
        let drift = tempfile::tempdir().unwrap();
        std::fs::write(
            golden.path().join("application-prod.yml"),
            "spring:\n  datasource:\n    url: jdbc:old\n",
        )
        .unwrap();
        std::fs::write(
            drift.path().join("application-prod.yml"),
            "spring:\n  datasource:\n    url: jdbc:new\n    pool: 10\n",
        )
        .unwrap();

        let deltas = detect(golden.path(), drift.path());
        let ids: Vec<&str> = deltas.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"spring~application-prod.yml.spring.datasource.url"));
        assert!(ids.contains(&"spring+application-prod.yml.spring.datasource.pool"));
        assert!(deltas.iter().all(|d| d.category == DeltaCategory::SpringProfile));
    }

    #[test]
    fn non_application_files_ignored() {
        let golden = tempfile::tempdir().unwrap();
        let drift = tempfile::tempdir().unwrap();
        std::fs::write(golden.path().join("other.yml"), "a: 1\n").unwrap();
        std::fs::write(drift.path().join("other.yml"), "a: 2\n").unwrap();
        assert!(detect(golden.path(), drift.path()).is_empty());
    }
}
