//! Merge pass: deltas from different detectors describing the same change
//! collapse into one.
//!
//! Merge identity is `(normalised file, config key, old, new)` - the file
//! name with its yaml extension stripped, so `application.yml` from the
//! generic config differ and the spring detector meet on one key. The
//! spring_profile tag wins over generic config. Code hunks touching the
//! same key attach as `code_snippet` + `hunk_info`; unmatched hunks stay
//! as standalone deltas.

use std::collections::HashMap;

use serde_json::Value;

use crate::bundle::{Delta, DeltaCategory, HunkInfo, Locator};

fn value_repr(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn merge_key(delta: &Delta) -> String {
    let normalized_file = delta.file.replace(".yml", "").replace(".yaml", "");
    let locator_value = delta.locator.value();
    let config_key = locator_value
        .split_once('.')
        .map(|(_, tail)| tail)
        .unwrap_or("");
    format!(
        "{normalized_file}::{config_key}::{}::{}",
        value_repr(&delta.old),
        value_repr(&delta.new)
    )
}

/// Runs the merge pass over all raw deltas. Insertion order is preserved,
/// so output ordering is a pure function of input ordering.
pub fn merge_deltas(deltas: Vec<Delta>) -> Vec<Delta> {
    let mut hunks_by_file: HashMap<String, Vec<Delta>> = HashMap::new();
    for delta in &deltas {
        if delta.category == DeltaCategory::CodeHunk {
            hunks_by_file
                .entry(delta.file.clone())
                .or_default()
                .push(delta.clone());
        }
    }

    let mut merged: Vec<Delta> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    let mut keys: Vec<String> = Vec::new();

    for delta in deltas {
        if delta.category == DeltaCategory::CodeHunk {
            continue;
        }
        let key = merge_key(&delta);
        match index_by_key.get(&key) {
            None => {
                let mut d = delta;
                d.detection_sources = vec![d.category.as_str().to_string()];
                index_by_key.insert(key.clone(), merged.len());
                keys.push(key);
                merged.push(d);
            }
            Some(&i) => {
                let existing = &mut merged[i];
                existing
                    .detection_sources
                    .push(delta.category.as_str().to_string());
                // Spring-profile identity wins; generic config wins over the
                // remaining categories.
                if delta.category == DeltaCategory::SpringProfile {
                    existing.category = DeltaCategory::SpringProfile;
                    existing.locator = delta.locator;
                    existing.id = delta.id;
                    existing.file = delta.file;
                } else if delta.category == DeltaCategory::Config
                    && existing.category != DeltaCategory::SpringProfile
                {
                    existing.category = DeltaCategory::Config;
                    existing.locator = delta.locator;
                    existing.id = delta.id;
                }
            }
        }
    }

    // Attach matching code hunks to merged config deltas.
    for (i, key) in keys.iter().enumerate() {
        let config_key = key.split("::").nth(1).unwrap_or("");
        if config_key.is_empty() {
            continue;
        }
        let file = merged[i].file.clone();
        let Some(hunks) = hunks_by_file.get(&file) else {
            continue;
        };
        for hunk in hunks {
            let Some(snippet) = &hunk.snippet else {
                continue;
            };
            if config_key.split('.').any(|part| snippet.contains(part)) {
                merged[i]
                    .detection_sources
                    .push(DeltaCategory::CodeHunk.as_str().to_string());
                merged[i].code_snippet = Some(snippet.clone());
                if let Locator::Unidiff {
                    old_start,
                    old_lines,
                    new_start,
                    new_lines,
                    hunk_header,
                    ..
                } = &hunk.locator
                {
                    merged[i].hunk_info = Some(HunkInfo {
                        old_start: *old_start,
                        old_lines: *old_lines,
                        new_start: *new_start,
                        new_lines: *new_lines,
                        hunk_header: hunk_header.clone(),
                    });
                }
                break;
            }
        }
    }

    // Unmatched hunks become standalone deltas.
    let attached: Vec<String> = merged
        .iter()
        .filter_map(|d| d.code_snippet.clone())
        .collect();
    let mut files: Vec<&String> = hunks_by_file.keys().collect();
    files.sort();
    for file in files {
        for hunk in &hunks_by_file[file] {
            let snippet = hunk.snippet.clone().unwrap_or_default();
            if attached.iter().any(|s| *s == snippet) {
                continue;
            }
            let mut d = hunk.clone();
            d.detection_sources = vec![DeltaCategory::CodeHunk.as_str().to_string()];
            merged.push(d);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg_delta(id: &str, file: &str, key: &str, old: Value, new: Value) -> Delta {
        Delta::new(
            id,
            DeltaCategory::Config,
            file,
            Locator::for_key(file, key),
            old,
            new,
        )
    }

    fn spring_delta(id: &str, file: &str, key: &str, old: Value, new: Value) -> Delta {
        Delta::new(
            id,
            DeltaCategory::SpringProfile,
            file,
            Locator::for_key(file, key),
            old,
            new,
        )
    }

    #[test]
    fn duplicate_detections_merge_to_one() {
        let deltas = vec![
            cfg_delta(
                "cfg~application.yml.server.port",
                "application.yml",
                "server.port",
                json!(8080),
                json!(9090),
            ),
            spring_delta(
                "spring~application.yml.server.port",
                "application.yml",
                "server.port",
                json!(8080),
                json!(9090),
            ),
        ];
        let merged = merge_deltas(deltas);
        assert_eq!(merged.len(), 1);
        // Spring identity wins.
        assert_eq!(merged[0].category, DeltaCategory::SpringProfile);
        assert_eq!(merged[0].id, "spring~application.yml.server.port");
        assert_eq!(merged[0].detection_sources, vec!["config", "spring_profile"]);
    }

    #[test]
    fn matching_hunk_attaches_to_config_delta() {
        let mut hunk = Delta::new(
            "hunk:application.yml:2-2->2-2",
            DeltaCategory::CodeHunk,
            "application.yml",
            Locator::Unidiff {
                value: "application.yml#2-1-2-1".to_string(),
                old_start: 2,
                old_lines: 1,
                new_start: 2,
                new_lines: 1,
                hunk_header: "@@ -2,1 +2,1 @@".to_string(),
            },
            json!(""),
            json!(""),
        );
        hunk.snippet = Some("@@ -2,1 +2,1 @@\n-  port: 8080\n+  port: 9090".to_string());

        let deltas = vec![
            cfg_delta(
                "cfg~application.yml.server.port",
                "application.yml",
                "server.port",
                json!(8080),
                json!(9090),
            ),
            hunk,
        ];
        let merged = merge_deltas(deltas);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].code_snippet.is_some());
        assert_eq!(merged[0].hunk_info.as_ref().unwrap().old_start, 2);
        assert!(merged[0].detection_sources.contains(&"code_hunk".to_string()));
    }

    #[test]
    fn unmatched_hunks_stay_standalone() {
        let mut hunk = Delta::new(
            "hunk:Main.java:10-12->10-13",
            DeltaCategory::CodeHunk,
            "Main.java",
            Locator::Unidiff {
                value: "Main.java#10-3-10-4".to_string(),
                old_start: 10,
                old_lines: 3,
                new_start: 10,
                new_lines: 4,
                hunk_header: "@@ -10,3 +10,4 @@".to_string(),
            },
            json!(""),
            json!(""),
        );
        hunk.snippet = Some("@@ -10,3 +10,4 @@\n+doWork();".to_string());

        let merged = merge_deltas(vec![hunk]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].category, DeltaCategory::CodeHunk);
        assert_eq!(merged[0].detection_sources, vec!["code_hunk"]);
    }
}
