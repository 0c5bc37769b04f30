//! Jenkinsfile detector: regex summary of pipeline-relevant settings,
//! diffed per key.

use std::collections::BTreeMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::bundle::{Delta, DeltaCategory, Locator};
use crate::parsers::first_line_for_key;
use crate::scan::load_text;

use super::find_files;

lazy_static! {
    static ref AGENT_RE: Regex = Regex::new(r"agent\s+([a-zA-Z_][a-zA-Z0-9_]*)").unwrap();
    static ref LABEL_RE: Regex = Regex::new(r#"label\s*[:=]\s*['"]([^'"]+)['"]"#).unwrap();
    static ref DOCKER_IMAGE_RE: Regex =
        Regex::new(r#"(?s)docker\s*\{\s*image\s+['"]([^'"]+)['"]"#).unwrap();
    static ref CREDENTIALS_RE: Regex =
        Regex::new(r#"credentialsId\s*[:=]\s*['"]([^'"]+)['"]"#).unwrap();
    static ref LIBRARY_RE: Regex = Regex::new(r#"@Library\(['"]([^'"]+)['"]\)"#).unwrap();
    static ref STAGE_RE: Regex = Regex::new(r#"stage\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap();
}

/// Summarises one Jenkinsfile into `{key → value}`.
fn summarize(path: &Path) -> BTreeMap<String, Value> {
    let text = load_text(path).unwrap_or_default();
    let mut out = BTreeMap::new();

    if let Some(c) = AGENT_RE.captures(&text) {
        out.insert("agent.kind".to_string(), Value::String(c[1].to_string()));
    }
    if let Some(c) = LABEL_RE.captures(&text) {
        out.insert("agent.label".to_string(), Value::String(c[1].to_string()));
    }
    if let Some(c) = DOCKER_IMAGE_RE.captures(&text) {
        out.insert(
            "agent.docker.image".to_string(),
            Value::String(c[1].to_string()),
        );
    }

    let mut creds: Vec<Value> = Vec::new();
    for c in CREDENTIALS_RE.captures_iter(&text) {
        let v = Value::String(c[1].to_string());
        if !creds.contains(&v) {
            creds.push(v);
        }
    }
    if !creds.is_empty() {
        out.insert("credentials.ids".to_string(), Value::Array(creds));
    }

    let libs: Vec<Value> = LIBRARY_RE
        .captures_iter(&text)
        .map(|c| Value::String(c[1].to_string()))
        .collect();
    if !libs.is_empty() {
        out.insert("libraries".to_string(), Value::Array(libs));
    }

    let stages: Vec<Value> = STAGE_RE
        .captures_iter(&text)
        .map(|c| Value::String(c[1].to_string()))
        .collect();
    if !stages.is_empty() {
        out.insert("stages".to_string(), Value::Array(stages));
    }

    out
}

fn is_jenkinsfile(name: &str) -> bool {
    name.to_ascii_lowercase().starts_with("jenkinsfile")
}

/// Emits one `jenkins` delta per changed summary key.
pub fn detect(golden_root: &Path, drift_root: &Path) -> Vec<Delta> {
    let mut rels = find_files(golden_root, is_jenkinsfile);
    for rel in find_files(drift_root, is_jenkinsfile) {
        if !rels.contains(&rel) {
            rels.push(rel);
        }
    }
    rels.sort();

    let mut out = Vec::new();
    for rel in rels {
        let g_path = golden_root.join(&rel);
        let d_path = drift_root.join(&rel);
        let g = if g_path.exists() { summarize(&g_path) } else { BTreeMap::new() };
        let d = if d_path.exists() { summarize(&d_path) } else { BTreeMap::new() };

        let keys: std::collections::BTreeSet<&String> = g.keys().chain(d.keys()).collect();
        for k in keys {
            let gv = g.get(k).cloned().unwrap_or(Value::Null);
            let dv = d.get(k).cloned().unwrap_or(Value::Null);
            if gv == dv {
                continue;
            }
            let mut locator = Locator::Keypath {
                value: format!("{rel}.{k}"),
                line_start: None,
            };
            if let Some(line) = first_line_for_key(&d_path, k) {
                locator.set_line_start(line);
            }
            out.push(Delta::new(
                format!("jenkins~{rel}.{k}"),
                DeltaCategory::Jenkins,
                rel.clone(),
                locator,
                gv,
                dv,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GOLDEN: &str = r#"
pipeline {
    agent any
    stages {
        stage('Build') { steps { sh 'make' } }
        stage('Deploy') {
            steps {
                withCredentials([string(credentialsId: 'deploy-key')]) { sh 'make deploy' }
            }
        }
    }
}
"#;

    const DRIFTED: &str = r#"
pipeline {
    agent any
    stages {
        stage('Build') { steps { sh 'make' } }
        stage('Deploy') {
            steps {
                withCredentials([string(credentialsId: 'rogue-key')]) { sh 'make deploy' }
            }
        }
    }
}
"#;

    #[test]
    fn credential_rotation_is_detected() {
        let golden = tempfile::tempdir().unwrap();
        let drift = tempfile::tempdir().unwrap();
        std::fs::write(golden.path().join("Jenkinsfile"), GOLDEN).unwrap();
        std::fs::write(drift.path().join("Jenkinsfile"), DRIFTED).unwrap();

        let deltas = detect(golden.path(), drift.path());
        let cred = deltas
            .iter()
            .find(|d| d.id == "jenkins~Jenkinsfile.credentials.ids")
            .unwrap();
        assert_eq!(cred.old, json!(["deploy-key"]));
        assert_eq!(cred.new, json!(["rogue-key"]));
        // Unchanged keys (agent.kind, stages) produce no deltas.
        assert_eq!(deltas.len(), 1);
    }
}
