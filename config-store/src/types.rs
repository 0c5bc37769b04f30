//! Row types exchanged with the store.

use serde::{Deserialize, Serialize};

/// A fleet service tracked in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// `{group}_{project_path}`, unique across the fleet.
    pub service_id: String,
    pub service_name: String,
    pub repo_url: String,
    pub main_branch: String,
    pub environments: Vec<String>,
    pub config_paths: Vec<String>,
    pub group_name: String,
    pub group_url: String,
    pub is_active: bool,
    pub description: Option<String>,
}

/// One validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRun {
    pub run_id: String,
    pub service_name: String,
    pub environment: String,
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub verdict: Option<String>,
    pub summary: Option<String>,
    pub repo_url: Option<String>,
    pub golden_branch: Option<String>,
    pub drift_branch: Option<String>,
}

/// A golden or drift branch registry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRecord {
    pub service_name: String,
    pub environment: String,
    pub branch_name: String,
    /// `golden` or `drift`.
    pub branch_type: String,
    pub is_active: bool,
    pub created_at: String,
    pub certification_score: Option<i64>,
}

/// Counters stored next to a context bundle payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleCounts {
    pub total_files: i64,
    pub files_with_drift: i64,
    pub total_deltas: i64,
}

/// Counters stored next to an LLM output payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriageCounts {
    pub total_files: i64,
    pub drifted_files: i64,
    pub total_deltas: i64,
    pub high_risk: i64,
    pub medium_risk: i64,
    pub low_risk: i64,
    pub allowed: i64,
}

/// Counters stored next to a policy validation payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyCounts {
    pub pii_findings: i64,
    pub intent_violations: i64,
    pub policy_violations: i64,
}

/// Columns stored next to a certification payload.
#[derive(Debug, Clone, Default)]
pub struct CertificationSummary {
    pub confidence_score: i64,
    pub decision: String,
    pub environment: String,
    pub violations_count: i64,
    pub high_risk_count: i64,
    /// Only set on accepted certifications.
    pub certified_snapshot_branch: Option<String>,
}
