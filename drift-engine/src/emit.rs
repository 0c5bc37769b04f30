//! Delta builders for the semantic, dependency and file-presence diffs.

use std::path::Path;

use serde_json::Value;

use crate::bundle::{Delta, DeltaCategory, EcosystemDiff, FileChanges, Locator, SemanticDiff};
use crate::parsers::first_line_for_key;

fn split_file_and_tail(key: &str) -> (&str, &str) {
    // Keys are `{file}.{keypath}`; only the leaf matters for line lookup, so
    // splitting at the first dot is sufficient.
    match key.split_once('.') {
        Some((file, tail)) => (file, tail),
        None => (key, ""),
    }
}

fn config_locator(
    golden_root: &Path,
    drift_root: &Path,
    key: &str,
) -> (String, Locator) {
    let (file_prefix, tail) = split_file_and_tail(key);
    // Recover the real file name: the flattened key prefixes the full
    // relative path, so walk forward until a parseable extension boundary.
    // In practice config keys look like `dir/app.yml.server.port`; locate
    // the extension to split file from keypath.
    let (file, keypath) = split_at_extension(key).unwrap_or((file_prefix, tail));

    let mut locator = Locator::for_key(file, keypath);
    if !keypath.is_empty() {
        let line = first_line_for_key(&drift_root.join(file), keypath)
            .or_else(|| first_line_for_key(&golden_root.join(file), keypath));
        if let Some(line) = line {
            locator.set_line_start(line);
        }
    }
    (file.to_string(), locator)
}

const KNOWN_EXTS: &[&str] = &[
    ".yml", ".yaml", ".json", ".properties", ".toml", ".ini", ".cfg", ".conf", ".config", ".xml",
];

/// Splits `dir/app.yml.server.port` into (`dir/app.yml`, `server.port`).
fn split_at_extension(key: &str) -> Option<(&str, &str)> {
    for ext in KNOWN_EXTS {
        if let Some(pos) = key.find(&format!("{ext}.")) {
            let file_end = pos + ext.len();
            return Some((&key[..file_end], &key[file_end + 1..]));
        }
        if key.ends_with(ext) {
            return Some((key, ""));
        }
    }
    None
}

/// Builds `config` deltas from the semantic key diff.
pub fn config_deltas(
    golden_root: &Path,
    drift_root: &Path,
    conf: &SemanticDiff,
) -> Vec<Delta> {
    let mut out = Vec::new();
    for (k, v) in &conf.added {
        let (file, locator) = config_locator(golden_root, drift_root, k);
        out.push(Delta::new(
            format!("cfg+{k}"),
            DeltaCategory::Config,
            file,
            locator,
            Value::Null,
            v.clone(),
        ));
    }
    for (k, v) in &conf.removed {
        let (file, locator) = config_locator(golden_root, drift_root, k);
        out.push(Delta::new(
            format!("cfg-{k}"),
            DeltaCategory::Config,
            file,
            locator,
            v.clone(),
            Value::Null,
        ));
    }
    for (k, ch) in &conf.changed {
        let (file, locator) = config_locator(golden_root, drift_root, k);
        out.push(Delta::new(
            format!("cfg~{k}"),
            DeltaCategory::Config,
            file,
            locator,
            ch.from.clone(),
            ch.to.clone(),
        ));
    }
    out
}

/// Builds `dependency` / `build_config` deltas from the per-ecosystem diff.
pub fn dependency_deltas(
    dep_diff: &std::collections::BTreeMap<String, EcosystemDiff>,
) -> Vec<Delta> {
    let mut out = Vec::new();
    for (eco, block) in dep_diff {
        if eco == "maven_properties" {
            for (k, v) in &block.added {
                out.push(maven_prop_delta(
                    format!("mvnprop+{k}"),
                    k,
                    Value::Null,
                    Value::String(v.clone()),
                ));
            }
            for (k, v) in &block.removed {
                out.push(maven_prop_delta(
                    format!("mvnprop-{k}"),
                    k,
                    Value::String(v.clone()),
                    Value::Null,
                ));
            }
            for (k, ch) in &block.changed {
                out.push(maven_prop_delta(
                    format!("mvnprop~{k}"),
                    k,
                    Value::String(ch.from.clone()),
                    Value::String(ch.to.clone()),
                ));
            }
            continue;
        }

        for (name, ver) in &block.added {
            out.push(dep_delta(eco, format!("dep+{eco}:{name}"), name, Value::Null, ver));
        }
        for (name, ver) in &block.removed {
            out.push(dep_delta(eco, format!("dep-{eco}:{name}"), name, ver_value(ver), ""));
        }
        for (name, ch) in &block.changed {
            out.push(dep_delta(
                eco,
                format!("dep~{eco}:{name}"),
                name,
                ver_value(&ch.from),
                &ch.to,
            ));
        }
    }
    out
}

fn ver_value(v: &str) -> Value {
    Value::String(v.to_string())
}

fn dep_delta(eco: &str, id: String, name: &str, old: Value, new: &str) -> Delta {
    Delta::new(
        id,
        DeltaCategory::Dependency,
        eco,
        Locator::Coord {
            value: format!("{eco}:{name}"),
        },
        old,
        if new.is_empty() { Value::Null } else { Value::String(new.to_string()) },
    )
}

fn maven_prop_delta(id: String, key: &str, old: Value, new: Value) -> Delta {
    Delta::new(
        id,
        DeltaCategory::BuildConfig,
        "pom.xml",
        Locator::Keypath {
            value: format!("pom.xml.properties.{key}"),
            line_start: None,
        },
        old,
        new,
    )
}

/// Builds `file` presence deltas from the structural diff.
pub fn file_presence_deltas(fc: &FileChanges) -> Vec<Delta> {
    let mut out = Vec::new();
    for rel in &fc.added {
        out.push(Delta::new(
            format!("file+{rel}"),
            DeltaCategory::File,
            rel.clone(),
            Locator::Path { value: rel.clone() },
            Value::Null,
            Value::String("present".to_string()),
        ));
    }
    for rel in &fc.removed {
        out.push(Delta::new(
            format!("file-{rel}"),
            DeltaCategory::File,
            rel.clone(),
            Locator::Path { value: rel.clone() },
            Value::String("present".to_string()),
            Value::Null,
        ));
    }
    for rn in &fc.renamed {
        out.push(Delta::new(
            format!("file~{}->{}", rn.from, rn.to),
            DeltaCategory::File,
            rn.to.clone(),
            Locator::Path {
                value: rn.to.clone(),
            },
            Value::String(rn.from.clone()),
            Value::String(rn.to.clone()),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_split() {
        assert_eq!(
            split_at_extension("helm/app.yml.server.port"),
            Some(("helm/app.yml", "server.port"))
        );
        assert_eq!(split_at_extension("app.yml"), Some(("app.yml", "")));
        assert_eq!(split_at_extension("README.md"), None);
    }

    #[test]
    fn dependency_delta_shape() {
        let mut diff = std::collections::BTreeMap::new();
        let mut eco = EcosystemDiff::default();
        eco.added.insert("org.acme:sdk".to_string(), "2.0".to_string());
        diff.insert("maven".to_string(), eco);

        let deltas = dependency_deltas(&diff);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].id, "dep+maven:org.acme:sdk");
        assert_eq!(deltas[0].file, "maven");
        assert_eq!(deltas[0].locator.value(), "maven:org.acme:sdk");
    }
}
