//! Deterministic multi-factor confidence scorer.
//!
//! Baseline 100, then deductions and bonuses:
//!
//! | Component        | Rule |
//! |------------------|------|
//! | Policy           | per violation: critical −30, high −15, medium −5 |
//! | Risk (counts)    | any critical −80; else any high −60; else any medium −55; else −min(2·low, 60) |
//! | Risk (label)     | fallback when no counts: critical −80, high −60, medium −55 |
//! | Blast radius     | scope 5/15/25/30, +file-count and critical-file surcharges, cap 50 |
//! | History          | outages −20, failures −5 each (cap −15), clean +10, trust ±10; clamp [−20, +10] |
//! | LLM safety       | safety and anomaly bands; clamp [−20, +15] |
//! | Context          | tags/jira/rollback/tests/description; cap +25 |
//! | Evidence         | all present +20; any missing −20 |
//!
//! The final score clips to [0, 100]. Decision mapping is overridden by any
//! medium/high/critical risk count - those always block, regardless of
//! score.

use crate::types::{
    BlastRadius, BlastScope, ConfidenceLevel, ConfidenceScore, Decision, DescriptionQuality,
    Evidence, HistoricalAnalysis, LlmReasoning, MrContext, PolicyViolation, RiskCounts,
    ScoreComponents,
};
use drift_engine::Severity;

/// All scorer inputs. Optional inputs contribute zero when absent.
#[derive(Debug, Clone, Default)]
pub struct ScorerInputs<'a> {
    pub policy_violations: &'a [PolicyViolation],
    /// Overall label (`critical`/`high`/`medium`/`low`/`none`), used only
    /// when every count is zero.
    pub risk_level: &'a str,
    pub counts: RiskCounts,
    pub evidence: Option<&'a Evidence>,
    pub blast_radius: Option<&'a BlastRadius>,
    pub llm_reasoning: Option<&'a LlmReasoning>,
    pub mr_context: Option<&'a MrContext>,
    /// Historical approval pattern; no supplier today, zero adjustment when
    /// absent.
    pub historical_pattern: Option<&'a HistoricalAnalysis>,
    pub environment: &'a str,
}

/// Computes the confidence score and decision. Pure function of its inputs.
pub fn calculate(inputs: &ScorerInputs<'_>) -> ConfidenceScore {
    let mut components = ScoreComponents::default();
    let mut score: i32 = 100;

    let policy_deduction = policy_deductions(inputs.policy_violations);
    score -= policy_deduction;
    components.policy_deductions = -policy_deduction;

    // A `critical` label with no counts at all acts as one critical item.
    let mut counts = inputs.counts;
    if counts.critical == 0
        && counts.high == 0
        && counts.medium == 0
        && counts.low == 0
        && inputs.risk_level.eq_ignore_ascii_case("critical")
    {
        counts.critical = 1;
    }

    let risk_deduction =
        if counts.critical > 0 || counts.high > 0 || counts.medium > 0 || counts.low > 0 {
            risk_deduction_from_counts(&counts)
        } else {
            risk_deduction_from_label(inputs.risk_level)
        };
    score -= risk_deduction;
    components.risk_deductions = -risk_deduction;

    if let Some(evidence) = inputs.evidence {
        let adj = evidence_adjustment(evidence);
        score += adj;
        components.evidence_adjustments = adj;
    }

    // Historical approval pattern: optional input with no supplier; zero
    // adjustment when absent, and zero by definition when present.
    let _ = inputs.historical_pattern;

    if let Some(blast) = inputs.blast_radius {
        let penalty = blast_radius_penalty(blast);
        score -= penalty;
        components.blast_radius_penalty = -penalty;
    }

    if let Some(reasoning) = inputs.llm_reasoning {
        if let Some(history) = &reasoning.historical_analysis {
            let adj = history_adjustment(history);
            score += adj;
            components.history_adjustment = adj;
        }
        let adj = llm_safety_adjustment(reasoning.safety_probability, reasoning.anomaly_score);
        score += adj;
        components.llm_safety_adjustment = adj;
    }

    if let Some(ctx) = inputs.mr_context {
        let bonus = context_bonus(ctx);
        score += bonus;
        components.context_bonus = bonus;
    }

    let score = score.clamp(0, 100);
    let decision = determine_decision(score, inputs.environment, &counts);
    let explanation = explanation(score, &components, decision, &counts);
    let confidence_level = confidence_level(score);

    ConfidenceScore {
        score,
        components,
        decision,
        explanation,
        confidence_level,
    }
}

fn policy_deductions(violations: &[PolicyViolation]) -> i32 {
    violations
        .iter()
        .map(|v| match v.severity {
            Severity::Critical => 30,
            Severity::High => 15,
            Severity::Medium => 5,
            _ => 0,
        })
        .sum()
}

fn risk_deduction_from_counts(counts: &RiskCounts) -> i32 {
    if counts.critical > 0 {
        80
    } else if counts.high > 0 {
        60
    } else if counts.medium > 0 {
        55
    } else {
        ((counts.low as i32) * 2).min(60)
    }
}

fn risk_deduction_from_label(label: &str) -> i32 {
    match label.to_ascii_lowercase().as_str() {
        "critical" => 80,
        "high" => 60,
        "medium" => 55,
        "low" | "none" => 0,
        // Unknown labels are treated as medium.
        _ => 55,
    }
}

fn evidence_adjustment(evidence: &Evidence) -> i32 {
    if !evidence.found.is_empty() && evidence.missing.is_empty() {
        20
    } else if !evidence.missing.is_empty() {
        -20
    } else {
        0
    }
}

fn blast_radius_penalty(blast: &BlastRadius) -> i32 {
    let mut penalty = match blast.scope {
        BlastScope::Critical => 30,
        BlastScope::High => 25,
        BlastScope::Medium => 15,
        BlastScope::Low => 5,
    };

    if blast.files_affected > 5 {
        penalty += 10;
    } else if blast.files_affected > 3 {
        penalty += 5;
    }

    penalty += (blast.critical_files as i32) * 5;

    if !blast.downstream_services.is_empty() {
        penalty += ((blast.downstream_services.len() as i32) * 3).min(15);
    }

    penalty.min(50)
}

fn history_adjustment(history: &HistoricalAnalysis) -> i32 {
    let mut adjustment = 0;

    if history.outage_history {
        adjustment -= 20;
    } else if history.past_failures > 0 {
        adjustment -= ((history.past_failures as i32) * 5).min(15);
    }

    if history.past_successes > 5 && history.past_failures == 0 {
        adjustment += 10;
    } else if history.past_successes > 0 {
        adjustment += ((history.past_successes as i32) * 2).min(5);
    }

    if history.trust_level < 0.3 {
        adjustment -= 10;
    } else if history.trust_level > 0.8 {
        adjustment += 10;
    }

    adjustment.clamp(-20, 10)
}

fn llm_safety_adjustment(safety_probability: f64, anomaly_score: f64) -> i32 {
    let mut adjustment = 0;

    if safety_probability < 0.3 {
        adjustment -= 20;
    } else if safety_probability < 0.5 {
        adjustment -= 10;
    } else if safety_probability > 0.8 {
        adjustment += 15;
    } else if safety_probability > 0.6 {
        adjustment += 5;
    }

    if anomaly_score > 0.7 {
        adjustment -= 15;
    } else if anomaly_score > 0.5 {
        adjustment -= 10;
    } else if anomaly_score > 0.3 {
        adjustment -= 5;
    }

    adjustment.clamp(-20, 15)
}

fn context_bonus(ctx: &MrContext) -> i32 {
    let mut bonus = 0;
    if ctx.has_mr_tags {
        bonus += 5;
    }
    if ctx.has_jira_link {
        bonus += 5;
    }
    if ctx.has_rollback_plan {
        bonus += 10;
    }
    if ctx.has_test_evidence {
        bonus += 5;
    }
    bonus += match ctx.description_quality {
        DescriptionQuality::High => 5,
        DescriptionQuality::Medium => 2,
        DescriptionQuality::Low => 0,
    };
    bonus.min(25)
}

fn determine_decision(score: i32, environment: &str, counts: &RiskCounts) -> Decision {
    // Any medium/high/critical item blocks regardless of score.
    if counts.any_blocking() {
        return Decision::BlockMerge;
    }

    let (auto, review) = match environment.to_ascii_lowercase().as_str() {
        "production" => (85, 60),
        "staging" | "pre-production" => (75, 50),
        _ => (65, 50),
    };

    if score >= auto {
        Decision::AutoMerge
    } else if score >= review {
        Decision::HumanReview
    } else {
        Decision::BlockMerge
    }
}

fn confidence_level(score: i32) -> ConfidenceLevel {
    if score >= 80 {
        ConfidenceLevel::High
    } else if score >= 60 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

fn explanation(
    score: i32,
    components: &ScoreComponents,
    decision: Decision,
    counts: &RiskCounts,
) -> String {
    let mut parts = vec![format!("Confidence score: {score}/100")];

    if counts.any_blocking() {
        let mut reasons = Vec::new();
        if counts.critical > 0 {
            reasons.push(format!("{} critical risk item(s)", counts.critical));
        }
        if counts.high > 0 {
            reasons.push(format!("{} high risk item(s)", counts.high));
        }
        if counts.medium > 0 {
            reasons.push(format!("{} medium risk item(s)", counts.medium));
        }
        parts.push(format!("BLOCKED: {} detected", reasons.join(", ")));
    }

    if components.policy_deductions < 0 {
        parts.push(format!(
            "Policy violations: {} points",
            components.policy_deductions
        ));
    }
    if components.risk_deductions < 0 {
        parts.push(format!("Risk deductions: {} points", components.risk_deductions));
    }
    if components.blast_radius_penalty < 0 {
        parts.push(format!(
            "Blast radius: {} points",
            components.blast_radius_penalty
        ));
    }
    if components.llm_safety_adjustment != 0 {
        parts.push(format!(
            "LLM safety: {:+} points",
            components.llm_safety_adjustment
        ));
    }
    if components.history_adjustment != 0 {
        parts.push(format!("History: {:+} points", components.history_adjustment));
    }
    if components.context_bonus > 0 {
        parts.push(format!("Context bonus: +{} points", components.context_bonus));
    }
    if components.evidence_adjustments != 0 {
        parts.push(format!(
            "Evidence: {:+} points",
            components.evidence_adjustments
        ));
    }

    parts.push(format!("Decision: {decision:?}"));
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs<'a>() -> ScorerInputs<'a> {
        ScorerInputs {
            risk_level: "none",
            environment: "production",
            ..Default::default()
        }
    }

    #[test]
    fn empty_drift_scores_100_auto_merge() {
        let out = calculate(&base_inputs());
        assert_eq!(out.score, 100);
        assert_eq!(out.decision, Decision::AutoMerge);
        assert_eq!(out.confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn one_low_risk_item_scores_98() {
        let mut inputs = base_inputs();
        inputs.counts = RiskCounts {
            low: 1,
            ..Default::default()
        };
        inputs.risk_level = "low";
        let out = calculate(&inputs);
        assert_eq!(out.score, 98);
        assert_eq!(out.decision, Decision::AutoMerge);
    }

    #[test]
    fn twenty_low_risk_dev_items_are_human_review() {
        let mut inputs = base_inputs();
        inputs.environment = "dev";
        inputs.risk_level = "low";
        inputs.counts = RiskCounts {
            low: 20,
            ..Default::default()
        };
        let out = calculate(&inputs);
        assert_eq!(out.score, 60);
        assert_eq!(out.decision, Decision::HumanReview);
    }

    #[test]
    fn low_count_deduction_caps_at_60() {
        let mut inputs = base_inputs();
        inputs.risk_level = "low";
        inputs.counts = RiskCounts {
            low: 100,
            ..Default::default()
        };
        let out = calculate(&inputs);
        assert_eq!(out.score, 40);
    }

    #[test]
    fn any_medium_blocks_regardless_of_score() {
        let mut inputs = base_inputs();
        inputs.risk_level = "medium";
        inputs.counts = RiskCounts {
            medium: 1,
            ..Default::default()
        };
        let out = calculate(&inputs);
        assert_eq!(out.score, 45);
        assert_eq!(out.decision, Decision::BlockMerge);
    }

    #[test]
    fn high_risk_item_scores_at_most_40() {
        let mut inputs = base_inputs();
        inputs.risk_level = "high";
        inputs.counts = RiskCounts {
            high: 1,
            ..Default::default()
        };
        let out = calculate(&inputs);
        assert!(out.score <= 40);
        assert_eq!(out.decision, Decision::BlockMerge);
        assert_eq!(out.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn critical_label_without_counts_blocks() {
        let mut inputs = base_inputs();
        inputs.risk_level = "critical";
        let out = calculate(&inputs);
        assert_eq!(out.decision, Decision::BlockMerge);
        assert_eq!(out.components.risk_deductions, -80);
    }

    #[test]
    fn decision_is_monotone_in_risk_counts() {
        // Adding a high-risk item can never improve the decision.
        let mut clean = base_inputs();
        clean.risk_level = "low";
        clean.counts = RiskCounts {
            low: 2,
            ..Default::default()
        };
        let before = calculate(&clean);
        assert_eq!(before.decision, Decision::AutoMerge);

        let mut worse = clean.clone();
        worse.counts.high = 1;
        let after = calculate(&worse);
        assert_eq!(after.decision, Decision::BlockMerge);
        assert!(after.score <= before.score);
    }

    #[test]
    fn scoring_is_idempotent() {
        let mut inputs = base_inputs();
        inputs.counts = RiskCounts {
            low: 3,
            ..Default::default()
        };
        inputs.risk_level = "low";
        let a = calculate(&inputs);
        let b = calculate(&inputs);
        assert_eq!(a.score, b.score);
        assert_eq!(a.decision, b.decision);
    }

    #[test]
    fn policy_violations_deduct_by_severity() {
        let violations = vec![
            PolicyViolation {
                delta_id: "d1".into(),
                file: "a.yml".into(),
                severity: Severity::Critical,
                rule: "r1".into(),
                reason: "x".into(),
            },
            PolicyViolation {
                delta_id: "d2".into(),
                file: "a.yml".into(),
                severity: Severity::High,
                rule: "r2".into(),
                reason: "y".into(),
            },
            PolicyViolation {
                delta_id: "d3".into(),
                file: "a.yml".into(),
                severity: Severity::Medium,
                rule: "r3".into(),
                reason: "z".into(),
            },
        ];
        let mut inputs = base_inputs();
        inputs.policy_violations = &violations;
        let out = calculate(&inputs);
        assert_eq!(out.components.policy_deductions, -50);
        assert_eq!(out.score, 50);
    }

    #[test]
    fn blast_radius_penalty_caps_at_50() {
        let blast = BlastRadius {
            files_affected: 40,
            critical_files: 10,
            downstream_services: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into(), "f".into()],
            scope: BlastScope::Critical,
        };
        let mut inputs = base_inputs();
        inputs.blast_radius = Some(&blast);
        let out = calculate(&inputs);
        assert_eq!(out.components.blast_radius_penalty, -50);
    }

    #[test]
    fn llm_safety_bands() {
        assert_eq!(llm_safety_adjustment(0.95, 0.0), 15);
        assert_eq!(llm_safety_adjustment(0.7, 0.0), 5);
        assert_eq!(llm_safety_adjustment(0.4, 0.0), -10);
        assert_eq!(llm_safety_adjustment(0.1, 0.0), -20);
        assert_eq!(llm_safety_adjustment(0.9, 0.8), 0);
        assert_eq!(llm_safety_adjustment(0.1, 0.9), -20);
    }

    #[test]
    fn history_clamps() {
        let outage = HistoricalAnalysis {
            outage_history: true,
            trust_level: 0.1,
            ..Default::default()
        };
        assert_eq!(history_adjustment(&outage), -20);

        let clean = HistoricalAnalysis {
            past_successes: 10,
            trust_level: 0.9,
            ..Default::default()
        };
        assert_eq!(history_adjustment(&clean), 10);
    }

    #[test]
    fn context_bonus_caps_at_25() {
        let ctx = MrContext {
            has_mr_tags: true,
            has_jira_link: true,
            has_rollback_plan: true,
            has_test_evidence: true,
            description_quality: DescriptionQuality::High,
        };
        assert_eq!(context_bonus(&ctx), 25);
    }

    #[test]
    fn staging_thresholds_are_looser() {
        let mut inputs = base_inputs();
        inputs.environment = "staging";
        inputs.risk_level = "low";
        inputs.counts = RiskCounts {
            low: 12,
            ..Default::default()
        };
        // score 76: auto in staging, review in production.
        let out = calculate(&inputs);
        assert_eq!(out.score, 76);
        assert_eq!(out.decision, Decision::AutoMerge);

        inputs.environment = "production";
        let out = calculate(&inputs);
        assert_eq!(out.decision, Decision::HumanReview);
    }
}
