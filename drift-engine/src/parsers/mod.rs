//! Format-aware config parsing into canonical flat keypath maps.
//!
//! Every supported format reduces to `keypath → scalar`:
//!   * YAML / JSON / TOML - nested maps flattened with dot-joined keys
//!   * properties / INI / cfg / conf - `key=value` lines
//!   * XML - element path plus `[@attr]` entries
//!
//! Unparseable input yields an empty map and a logged warning; the parser
//! registry never raises. Non-map leaves (lists, scalars at the root) are
//! kept as values.

pub mod properties;
pub mod xml;

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::scan::load_text;

/// Flat keypath map of one config file.
pub type KeypathMap = BTreeMap<String, Value>;

const PARSEABLE_EXTS: &[&str] = &[
    ".yml",
    ".yaml",
    ".json",
    ".properties",
    ".toml",
    ".ini",
    ".cfg",
    ".conf",
    ".config",
    ".xml",
];

/// Whether the parser registry can produce a keypath map for this path.
pub fn is_parseable(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    PARSEABLE_EXTS.iter().any(|e| lower.ends_with(e))
}

/// Parses a config file into a nested JSON value.
///
/// Returns `None` for unsupported extensions or unreadable files; format
/// errors degrade to an empty object with a warning.
pub fn parse_config(path: &Path) -> Option<Value> {
    let text = load_text(path)?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let parsed = match ext.as_str() {
        "yml" | "yaml" => parse_yaml(&text, path),
        "json" => parse_json(&text, path),
        "toml" => parse_toml(&text, path),
        "properties" | "ini" | "cfg" | "conf" | "config" => {
            Some(properties::parse_properties(&text))
        }
        "xml" => Some(xml::parse_xml(&text)),
        _ => None,
    };
    parsed
}

/// Parses and flattens in one step; absent/unparseable input gives an empty
/// map.
pub fn parse_flat(path: &Path) -> KeypathMap {
    match parse_config(path) {
        Some(v) => flatten(&v, ""),
        None => KeypathMap::new(),
    }
}

fn parse_yaml(text: &str, path: &Path) -> Option<Value> {
    match serde_yaml::from_str::<serde_yaml::Value>(text) {
        Ok(v) => match serde_json::to_value(&v) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "yaml value not representable, treating as empty");
                Some(Value::Object(Default::default()))
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unparseable yaml, treating as empty");
            Some(Value::Object(Default::default()))
        }
    }
}

fn parse_json(text: &str, path: &Path) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unparseable json, treating as empty");
            Some(Value::Object(Default::default()))
        }
    }
}

fn parse_toml(text: &str, path: &Path) -> Option<Value> {
    match toml::from_str::<toml::Value>(text) {
        Ok(v) => match serde_json::to_value(&v) {
            Ok(json) => Some(json),
            Err(_) => Some(Value::Object(Default::default())),
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unparseable toml, falling back to key=value lines");
            Some(properties::parse_properties(text))
        }
    }
}

/// Flattens a nested value into dot-joined keypaths.
///
/// Maps recurse; anything else is a leaf. A non-map root lands under
/// `root` (or the running prefix).
pub fn flatten(value: &Value, prefix: &str) -> KeypathMap {
    let mut out = KeypathMap::new();
    flatten_into(value, prefix, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut KeypathMap) {
    match value {
        Value::Object(map) => {
            if map.is_empty() && !prefix.is_empty() {
                return;
            }
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                match v {
                    Value::Object(_) => flatten_into(v, &key, out),
                    leaf => {
                        out.insert(key, leaf.clone());
                    }
                }
            }
        }
        Value::Null => {}
        leaf => {
            let key = if prefix.is_empty() { "root" } else { prefix };
            out.insert(key.to_string(), leaf.clone());
        }
    }
}

/// Finds the 1-based line of the first non-comment occurrence of the leaf
/// key of `key_tail` in the file's text.
pub fn first_line_for_key(path: &Path, key_tail: &str) -> Option<u32> {
    let text = load_text(path)?;
    let key = key_tail.rsplit('.').next().unwrap_or(key_tail);
    if key.is_empty() {
        return None;
    }
    for (i, line) in text.lines().enumerate() {
        let s = line.trim_start();
        if s.starts_with('#') {
            continue;
        }
        if line.contains(key) {
            return Some(i as u32 + 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn yaml_flattens_to_dot_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(
            &dir,
            "app.yml",
            "server:\n  port: 8080\n  ssl:\n    enabled: true\nname: svc\n",
        );
        let flat = parse_flat(&p);
        assert_eq!(flat["server.port"], json!(8080));
        assert_eq!(flat["server.ssl.enabled"], json!(true));
        assert_eq!(flat["name"], json!("svc"));
    }

    #[test]
    fn lists_stay_as_leaf_values() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "app.yml", "hosts:\n  - a\n  - b\n");
        let flat = parse_flat(&p);
        assert_eq!(flat["hosts"], json!(["a", "b"]));
    }

    #[test]
    fn properties_parse() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(
            &dir,
            "db.properties",
            "# comment\ndb.url=jdbc:mysql://x\ndb.user = admin\n\n",
        );
        let flat = parse_flat(&p);
        assert_eq!(flat["db.url"], json!("jdbc:mysql://x"));
        assert_eq!(flat["db.user"], json!("admin"));
    }

    #[test]
    fn broken_yaml_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "bad.yml", "key: [unclosed\n  nested: {");
        assert!(parse_flat(&p).is_empty());
    }

    #[test]
    fn flatten_is_stable_under_repetition() {
        let v = json!({"a": {"b": 1, "c": {"d": "x"}}, "e": [1, 2]});
        let once = flatten(&v, "");
        // Flattening the flat map (as an object) again is the identity.
        let as_obj = Value::Object(once.clone().into_iter().collect());
        let twice = flatten(&as_obj, "");
        assert_eq!(once, twice);
    }

    #[test]
    fn line_lookup_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "a.yml", "# port: commented\nserver:\n  port: 8080\n");
        assert_eq!(first_line_for_key(&p, "server.port"), Some(3));
        assert_eq!(first_line_for_key(&p, "absent_key"), None);
    }
}
