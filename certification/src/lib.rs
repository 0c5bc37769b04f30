//! Certification engine: the quantitative decision at the end of a run.
//!
//! Pulls scorer inputs out of the guardrail and triage artefacts, runs the
//! deterministic confidence scorer, and produces the certification record.
//! This crate never touches git or the forge - cutting a certified snapshot
//! branch is an operator action taken on an accepted certification.

pub mod extract;
pub mod scorer;
pub mod types;

use tracing::info;

use guardrails::PolicyValidation;
use triage::LlmOutput;

pub use scorer::{ScorerInputs, calculate};
pub use types::{
    BlastRadius, BlastScope, Certification, ConfidenceLevel, ConfidenceScore, Decision,
    DescriptionQuality, Evidence, HistoricalAnalysis, LlmReasoning, MrContext, PolicyViolation,
    RiskCounts, ScoreComponents,
};

/// Computes the certification for a run from its persisted artefacts.
///
/// `mr_context` and `historical` are optional enrichments; absent they
/// contribute the neutral defaults.
pub fn certify(
    validation: &PolicyValidation,
    llm_output: &LlmOutput,
    environment: &str,
    mr_context: Option<MrContext>,
    historical: Option<HistoricalAnalysis>,
) -> Certification {
    let policy_violations = extract::extract_policy_violations(&validation.validated_deltas);
    let risk_level = extract::determine_risk_level(llm_output);
    let counts = extract::extract_risk_counts(llm_output, validation);
    let blast_radius =
        extract::extract_blast_radius(validation, llm_output.summary.files_with_drift);
    let llm_reasoning = extract::extract_llm_reasoning(llm_output);
    let mr_context = mr_context.unwrap_or_default();

    let inputs = ScorerInputs {
        policy_violations: &policy_violations,
        risk_level,
        counts,
        evidence: None,
        blast_radius: Some(&blast_radius),
        llm_reasoning: Some(&llm_reasoning),
        mr_context: Some(&mr_context),
        historical_pattern: historical.as_ref(),
        environment,
    };
    let score = scorer::calculate(&inputs);

    info!(
        score = score.score,
        decision = ?score.decision,
        environment,
        violations = policy_violations.len(),
        "certification computed"
    );

    Certification {
        confidence_score: score.score,
        decision: score.decision,
        confidence_level: score.confidence_level,
        components: score.components,
        explanation: score.explanation,
        environment: environment.to_string(),
        risk_level: risk_level.to_string(),
        policy_violations,
        risk_counts: counts,
        blast_radius,
        certified_snapshot_branch: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{Delta, DeltaCategory, Locator, Policies};
    use guardrails::run_guardrails;
    use serde_json::json;
    use triage::LlmBuckets;

    fn validation_for(deltas: Vec<Delta>) -> PolicyValidation {
        run_guardrails(deltas, &Policies::default(), "production")
    }

    #[test]
    fn no_drift_certifies_auto_merge_at_100() {
        let validation = validation_for(vec![]);
        let llm = LlmOutput::empty(4, "production");
        let cert = certify(&validation, &llm, "production", None, None);
        assert_eq!(cert.confidence_score, 100);
        assert_eq!(cert.decision, Decision::AutoMerge);
        assert!(cert.certified_snapshot_branch.is_none());
    }

    #[test]
    fn critical_intent_blocks_regardless_of_llm_buckets() {
        let delta = Delta::new(
            "cfg~a.yml.query",
            DeltaCategory::Config,
            "a.yml",
            Locator::for_key("a.yml", "query"),
            json!("x"),
            json!("x'; DROP TABLE users --"),
        );
        let validation = validation_for(vec![delta]);
        assert!(validation.has_critical_intent());

        // Even an all-empty LLM output cannot rescue the run.
        let llm = LlmOutput::from_buckets(LlmBuckets::default(), 4, "production");
        let cert = certify(&validation, &llm, "production", None, None);
        assert_eq!(cert.decision, Decision::BlockMerge);
        assert!(cert.risk_counts.critical > 0);
    }

    #[test]
    fn historical_input_absent_means_zero_adjustment() {
        let validation = validation_for(vec![]);
        let llm = LlmOutput::empty(4, "production");
        let with_none = certify(&validation, &llm, "production", None, None);
        let with_default = certify(
            &validation,
            &llm,
            "production",
            None,
            Some(HistoricalAnalysis::default()),
        );
        assert_eq!(with_none.confidence_score, with_default.confidence_score);
        assert_eq!(with_none.components.history_adjustment, 0);
    }
}
