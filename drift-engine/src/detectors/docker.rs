//! Dockerfile detector: diff of the ordered `FROM` directive list by index.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::bundle::{Delta, DeltaCategory, Locator};
use crate::scan::load_text;

use super::find_files;

fn is_dockerfile(name: &str) -> bool {
    name.to_ascii_lowercase().starts_with("dockerfile")
}

fn base_images(path: &Path) -> Vec<String> {
    let text = load_text(path).unwrap_or_default();
    text.lines()
        .filter_map(|line| {
            let s = line.trim();
            if s.to_ascii_uppercase().starts_with("FROM ") {
                s.split_whitespace().nth(1).map(str::to_string)
            } else {
                None
            }
        })
        .collect()
}

fn collect(root: &Path) -> BTreeMap<String, Vec<String>> {
    find_files(root, is_dockerfile)
        .into_iter()
        .map(|rel| {
            let bases = base_images(&root.join(&rel));
            (rel, bases)
        })
        .collect()
}

/// Emits one `container` delta per changed FROM slot.
pub fn detect(golden_root: &Path, drift_root: &Path) -> Vec<Delta> {
    let g = collect(golden_root);
    let d = collect(drift_root);

    let mut out = Vec::new();
    let rels: std::collections::BTreeSet<&String> = g.keys().chain(d.keys()).collect();
    for rel in rels {
        let gb = g.get(rel).cloned().unwrap_or_default();
        let db = d.get(rel).cloned().unwrap_or_default();
        for i in 0..gb.len().max(db.len()) {
            let old = gb.get(i).cloned().map(Value::String).unwrap_or(Value::Null);
            let new = db.get(i).cloned().map(Value::String).unwrap_or(Value::Null);
            if old != new {
                out.push(Delta::new(
                    format!("docker~{rel}#{i}"),
                    DeltaCategory::Container,
                    rel.clone(),
                    Locator::Keypath {
                        value: format!("{rel}.FROM[{i}]"),
                        line_start: None,
                    },
                    old,
                    new,
                ));
            }
        }
    }
    out
}
