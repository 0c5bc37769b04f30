//! Semantic key-level diff across changed configuration files.

use std::path::Path;

use tracing::debug;

use crate::bundle::{SemanticDiff, ValueChange};
use crate::parsers::{is_parseable, parse_flat};

/// Diffs the flattened keypath maps of every changed config path.
///
/// For each path present in `changed_paths`, both sides are parsed (an
/// absent or unparseable side is an empty map) and keys are compared.
/// Result keys are `{file}.{keypath}`.
pub fn semantic_config_diff(
    golden_root: &Path,
    drift_root: &Path,
    changed_paths: &[String],
) -> SemanticDiff {
    let mut diff = SemanticDiff::default();

    for rel in changed_paths {
        if !is_parseable(rel) {
            continue;
        }
        let g_flat = parse_flat(&golden_root.join(rel));
        let d_flat = parse_flat(&drift_root.join(rel));

        for (k, v) in &d_flat {
            if !g_flat.contains_key(k) {
                diff.added.insert(format!("{rel}.{k}"), v.clone());
            }
        }
        for (k, v) in &g_flat {
            if !d_flat.contains_key(k) {
                diff.removed.insert(format!("{rel}.{k}"), v.clone());
            }
        }
        for (k, gv) in &g_flat {
            if let Some(dv) = d_flat.get(k) {
                if gv != dv {
                    diff.changed.insert(
                        format!("{rel}.{k}"),
                        ValueChange {
                            from: gv.clone(),
                            to: dv.clone(),
                        },
                    );
                }
            }
        }
    }

    debug!(
        added = diff.added.len(),
        removed = diff.removed.len(),
        changed = diff.changed.len(),
        "semantic config diff"
    );
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_level_diff_over_both_sides() {
        let golden = tempfile::tempdir().unwrap();
        let drift = tempfile::tempdir().unwrap();
        std::fs::write(
            golden.path().join("svc.yml"),
            "timeout: 30\nretries: 3\nremoved_key: x\n",
        )
        .unwrap();
        std::fs::write(
            drift.path().join("svc.yml"),
            "timeout: 45\nretries: 3\nnew_key: y\n",
        )
        .unwrap();

        let diff = semantic_config_diff(
            golden.path(),
            drift.path(),
            &["svc.yml".to_string()],
        );
        assert_eq!(diff.added["svc.yml.new_key"], json!("y"));
        assert_eq!(diff.removed["svc.yml.removed_key"], json!("x"));
        let ch = &diff.changed["svc.yml.timeout"];
        assert_eq!(ch.from, json!(30));
        assert_eq!(ch.to, json!(45));
        assert!(!diff.changed.contains_key("svc.yml.retries"));
    }

    #[test]
    fn added_file_diffs_against_empty() {
        let golden = tempfile::tempdir().unwrap();
        let drift = tempfile::tempdir().unwrap();
        std::fs::write(drift.path().join("new.yml"), "a: 1\n").unwrap();

        let diff =
            semantic_config_diff(golden.path(), drift.path(), &["new.yml".to_string()]);
        assert_eq!(diff.added["new.yml.a"], json!(1));
        assert!(diff.removed.is_empty());
    }
}
