//! The normalised delta model and the context bundle that carries it.
//!
//! A [`Delta`] is the atomic unit flowing through the pipeline: one change
//! with an exact [`Locator`], old/new values, a category, and risk/policy
//! annotations. Downstream stages (guardrails, triage, certification) only
//! ever see deltas - never raw trees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a delta, set by the detector that emitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaCategory {
    Config,
    Dependency,
    BuildConfig,
    SpringProfile,
    Jenkins,
    Container,
    CodeHunk,
    File,
    BinaryMeta,
    ArchiveDelta,
    ArchiveManifest,
    Other,
}

impl DeltaCategory {
    /// Categories describing behavioural change (as opposed to presence or
    /// packaging metadata).
    pub fn is_behavioural(&self) -> bool {
        matches!(
            self,
            DeltaCategory::CodeHunk
                | DeltaCategory::Dependency
                | DeltaCategory::BuildConfig
                | DeltaCategory::SpringProfile
                | DeltaCategory::Config
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaCategory::Config => "config",
            DeltaCategory::Dependency => "dependency",
            DeltaCategory::BuildConfig => "build_config",
            DeltaCategory::SpringProfile => "spring_profile",
            DeltaCategory::Jenkins => "jenkins",
            DeltaCategory::Container => "container",
            DeltaCategory::CodeHunk => "code_hunk",
            DeltaCategory::File => "file",
            DeltaCategory::BinaryMeta => "binary_meta",
            DeltaCategory::ArchiveDelta => "archive_delta",
            DeltaCategory::ArchiveManifest => "archive_manifest",
            DeltaCategory::Other => "other",
        }
    }
}

/// Pre-LLM risk hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Med,
    Low,
}

/// Severity scale shared by policy rules and the intent guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Exact position of a change, tagged by locator kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Locator {
    Keypath {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_start: Option<u32>,
    },
    Yamlpath {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_start: Option<u32>,
    },
    Jsonpath {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_start: Option<u32>,
    },
    Unidiff {
        value: String,
        old_start: u32,
        old_lines: u32,
        new_start: u32,
        new_lines: u32,
        hunk_header: String,
    },
    Coord {
        value: String,
    },
    Path {
        value: String,
    },
}

impl Locator {
    /// Builds a key locator for `filename` + `keypath`, choosing the locator
    /// kind from the file extension.
    pub fn for_key(filename: &str, key: &str) -> Self {
        let value = if key.is_empty() {
            filename.to_string()
        } else {
            format!("{filename}.{key}")
        };
        let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yml") | Some("yaml") => Locator::Yamlpath {
                value,
                line_start: None,
            },
            Some("json") => Locator::Jsonpath {
                value,
                line_start: None,
            },
            _ => Locator::Keypath {
                value,
                line_start: None,
            },
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Keypath { value, .. }
            | Locator::Yamlpath { value, .. }
            | Locator::Jsonpath { value, .. }
            | Locator::Unidiff { value, .. }
            | Locator::Coord { value }
            | Locator::Path { value } => value,
        }
    }

    /// Attaches a line hint where the locator kind supports one.
    pub fn set_line_start(&mut self, line: u32) {
        match self {
            Locator::Keypath { line_start, .. }
            | Locator::Yamlpath { line_start, .. }
            | Locator::Jsonpath { line_start, .. } => *line_start = Some(line),
            _ => {}
        }
    }
}

/// Policy verdict attached to a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyTagKind {
    InvariantBreach,
    AllowedVariance,
    Suspect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTag {
    pub tag: PolicyTagKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub violation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyTag {
    pub fn suspect() -> Self {
        Self {
            tag: PolicyTagKind::Suspect,
            rule: None,
            severity: None,
            violation: false,
            reason: None,
        }
    }
}

/// One suspicious pattern hit from the intent guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentFinding {
    pub category: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub severity: Severity,
}

/// Intent-guard annotation on a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentGuard {
    pub suspicious: bool,
    pub patterns_detected: Vec<IntentFinding>,
    pub severity: Severity,
}

/// Hunk coordinates attached when a config delta was corroborated by a code
/// hunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunkInfo {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub hunk_header: String,
}

/// Member-level diff of an archive (zip/jar/tar).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveEntryDiff {
    pub added: BTreeMap<String, u64>,
    pub removed: BTreeMap<String, u64>,
    pub changed: BTreeMap<String, SizeChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeChange {
    pub from: u64,
    pub to: u64,
}

/// The atomic unit flowing through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    /// Deterministic id, e.g. `cfg~a.yml.server.port`.
    pub id: String,
    pub category: DeltaCategory,
    /// Repo-relative path of the affected file.
    pub file: String,
    pub locator: Locator,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub old: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub new: Value,
    /// Unidiff body for code hunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Member-level diff for archive deltas.
    #[serde(rename = "diff", default, skip_serializing_if = "Option::is_none")]
    pub archive_diff: Option<ArchiveEntryDiff>,
    pub risk_level: RiskLevel,
    pub risk_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyTag>,
    /// Detectors that contributed to this delta after the merge pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detection_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hunk_info: Option<HunkInfo>,
    /// Guardrail annotations; populated by the guardrail stage.
    #[serde(default)]
    pub pii_redacted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pii_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_guard: Option<IntentGuard>,
}

impl Delta {
    /// Bare delta with placeholder risk; risk and policy are attached by the
    /// tagging pass.
    pub fn new(
        id: impl Into<String>,
        category: DeltaCategory,
        file: impl Into<String>,
        locator: Locator,
        old: Value,
        new: Value,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            file: file.into(),
            locator,
            old,
            new,
            snippet: None,
            archive_diff: None,
            risk_level: RiskLevel::Low,
            risk_reason: String::new(),
            policy: None,
            detection_sources: Vec::new(),
            code_snippet: None,
            hunk_info: None,
            pii_redacted: false,
            pii_types: Vec::new(),
            intent_guard: None,
        }
    }
}

/* ---------------- bundle sections ---------------- */

/// File-level structural changes between the golden and drift trees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
    pub renamed: Vec<RenamedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamedFile {
    pub from: String,
    pub to: String,
}

/// Key-level semantic diff across all changed config files; keys are
/// `{file}.{keypath}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticDiff {
    pub added: BTreeMap<String, Value>,
    pub removed: BTreeMap<String, Value>,
    pub changed: BTreeMap<String, ValueChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueChange {
    pub from: Value,
    pub to: Value,
}

/// Per-ecosystem dependency diff (`maven`, `maven_properties`, `npm`, `pip`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcosystemDiff {
    pub added: BTreeMap<String, String>,
    pub removed: BTreeMap<String, String>,
    pub changed: BTreeMap<String, StringChange>,
}

impl EcosystemDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringChange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMeta {
    pub golden: String,
    pub candidate: String,
    pub golden_name: String,
    pub candidate_name: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overview {
    pub golden_repo_name: String,
    pub candidate_repo_name: String,
    pub golden_files: usize,
    pub candidate_files: usize,
    pub total_files: usize,
    pub drifted_files: usize,
    pub added_files: usize,
    pub removed_files: usize,
    pub modified_files: usize,
    pub ci_present: bool,
    pub build_tools: Vec<String>,
    pub environment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigsSection {
    pub diff: SemanticDiff,
}

/// Everything the drift engine hands to the rest of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub meta: BundleMeta,
    pub overview: Overview,
    pub file_changes: FileChanges,
    pub dependencies: BTreeMap<String, EcosystemDiff>,
    pub configs: ConfigsSection,
    pub deltas: Vec<Delta>,
    pub git_patches: BTreeMap<String, String>,
}

/* ---------------- policies ---------------- */

/// Declarative policy file: environment-expected keys and invariant rules.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Policies {
    #[serde(default)]
    pub env_allow_keys: Vec<String>,
    #[serde(default)]
    pub invariants: Vec<InvariantRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvariantRule {
    pub name: String,
    /// Substring the delta locator must contain for the rule to apply.
    pub locator_contains: String,
    #[serde(default)]
    pub forbid_values: Vec<String>,
    #[serde(default)]
    pub require_values: Vec<String>,
    #[serde(default = "default_invariant_severity")]
    pub severity: Severity,
}

fn default_invariant_severity() -> Severity {
    Severity::Critical
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locator_serialises_with_type_tag() {
        let loc = Locator::Yamlpath {
            value: "a.yml.server.port".to_string(),
            line_start: Some(12),
        };
        let v = serde_json::to_value(&loc).unwrap();
        assert_eq!(v["type"], json!("yamlpath"));
        assert_eq!(v["value"], json!("a.yml.server.port"));
        assert_eq!(v["line_start"], json!(12));
    }

    #[test]
    fn unidiff_locator_carries_hunk_fields() {
        let loc = Locator::Unidiff {
            value: "a.yml#3-2-3-2".to_string(),
            old_start: 3,
            old_lines: 2,
            new_start: 3,
            new_lines: 2,
            hunk_header: "@@ -3,2 +3,2 @@".to_string(),
        };
        let v = serde_json::to_value(&loc).unwrap();
        assert_eq!(v["type"], json!("unidiff"));
        assert_eq!(v["old_start"], json!(3));
        assert_eq!(v["hunk_header"], json!("@@ -3,2 +3,2 @@"));
        let back: Locator = serde_json::from_value(v).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn key_locator_kind_follows_extension() {
        assert!(matches!(
            Locator::for_key("app.yml", "server.port"),
            Locator::Yamlpath { .. }
        ));
        assert!(matches!(
            Locator::for_key("pkg.json", "version"),
            Locator::Jsonpath { .. }
        ));
        assert!(matches!(
            Locator::for_key("app.properties", "db.url"),
            Locator::Keypath { .. }
        ));
    }

    #[test]
    fn severity_orders_by_badness() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::None);
    }
}
