//! Inputs and outputs of the confidence scorer.

use serde::{Deserialize, Serialize};

use drift_engine::Severity;

/// Final certification decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    AutoMerge,
    HumanReview,
    BlockMerge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// One policy violation feeding the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub delta_id: String,
    pub file: String,
    pub severity: Severity,
    pub rule: String,
    pub reason: String,
}

/// Counts of triaged risk items.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RiskCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl RiskCounts {
    pub fn any_blocking(&self) -> bool {
        self.critical > 0 || self.high > 0 || self.medium > 0
    }
}

/// Impact-scope estimate of the change set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlastRadius {
    pub files_affected: usize,
    pub critical_files: usize,
    pub downstream_services: Vec<String>,
    pub scope: BlastScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlastScope {
    Low,
    Medium,
    High,
    Critical,
}

/// Past behaviour of this configuration area. Optional input; absent means
/// zero adjustment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalAnalysis {
    pub past_failures: u32,
    pub past_successes: u32,
    pub outage_history: bool,
    /// 0.0 to 1.0.
    pub trust_level: f64,
}

/// The LLM's contextual safety estimate, derived from the triage output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmReasoning {
    /// 0.0 to 1.0 - confidence the change set is safe.
    pub safety_probability: f64,
    /// 0.0 to 1.0 - strength of anomaly signals (typos, unknown ids).
    pub anomaly_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_analysis: Option<HistoricalAnalysis>,
}

/// MR quality indicators granting context bonuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrContext {
    pub has_mr_tags: bool,
    pub has_jira_link: bool,
    pub has_rollback_plan: bool,
    pub has_test_evidence: bool,
    pub description_quality: DescriptionQuality,
}

impl Default for MrContext {
    fn default() -> Self {
        Self {
            has_mr_tags: false,
            has_jira_link: false,
            has_rollback_plan: false,
            has_test_evidence: false,
            description_quality: DescriptionQuality::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionQuality {
    High,
    Medium,
    Low,
}

/// Present/missing review evidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

/// Per-component score breakdown. Deductions are negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub base_score: i32,
    pub policy_deductions: i32,
    pub risk_deductions: i32,
    pub blast_radius_penalty: i32,
    pub history_adjustment: i32,
    pub llm_safety_adjustment: i32,
    pub context_bonus: i32,
    pub evidence_adjustments: i32,
}

impl Default for ScoreComponents {
    fn default() -> Self {
        Self {
            base_score: 100,
            policy_deductions: 0,
            risk_deductions: 0,
            blast_radius_penalty: 0,
            history_adjustment: 0,
            llm_safety_adjustment: 0,
            context_bonus: 0,
            evidence_adjustments: 0,
        }
    }
}

/// Scorer output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// 0 to 100.
    pub score: i32,
    pub components: ScoreComponents,
    pub decision: Decision,
    pub explanation: String,
    pub confidence_level: ConfidenceLevel,
}

/// Final certification record for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    pub confidence_score: i32,
    pub decision: Decision,
    pub confidence_level: ConfidenceLevel,
    pub components: ScoreComponents,
    pub explanation: String,
    pub environment: String,
    pub risk_level: String,
    pub policy_violations: Vec<PolicyViolation>,
    pub risk_counts: RiskCounts,
    pub blast_radius: BlastRadius,
    /// Only set once a certification has been accepted and a snapshot
    /// branch was cut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certified_snapshot_branch: Option<String>,
}
