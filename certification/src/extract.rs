//! Extraction of scorer inputs from the persisted stage artefacts.

use drift_engine::{Delta, PolicyTagKind, Severity};
use guardrails::PolicyValidation;
use triage::LlmOutput;

use crate::types::{BlastRadius, BlastScope, LlmReasoning, PolicyViolation, RiskCounts};

const CRITICAL_FILE_KEYWORDS: &[&str] = &[
    "auth",
    "database",
    "db",
    "ingress",
    "gateway",
    "secret",
    "credential",
];

const ANOMALY_KEYWORDS: &[&str] = &["unknown", "typo", "mismatch", "invalid", "not found"];

/// Pulls invariant breaches out of the validated deltas.
pub fn extract_policy_violations(validated_deltas: &[Delta]) -> Vec<PolicyViolation> {
    validated_deltas
        .iter()
        .filter_map(|delta| {
            let policy = delta.policy.as_ref()?;
            if policy.tag != PolicyTagKind::InvariantBreach {
                return None;
            }
            Some(PolicyViolation {
                delta_id: delta.id.clone(),
                file: delta.file.clone(),
                severity: policy.severity.unwrap_or(Severity::High),
                rule: policy.rule.clone().unwrap_or_else(|| "unknown".to_string()),
                reason: policy
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Invariant breach detected".to_string()),
            })
        })
        .collect()
}

/// Overall risk label from the triage buckets.
pub fn determine_risk_level(llm: &LlmOutput) -> &'static str {
    if !llm.high.is_empty() {
        "high"
    } else if !llm.medium.is_empty() {
        "medium"
    } else if !llm.low.is_empty() {
        "low"
    } else {
        "none"
    }
}

/// Risk counts feeding the scorer. Critical intent findings from the
/// guardrail stage count as critical items - they are fatal to the decision
/// whatever the LLM said.
pub fn extract_risk_counts(llm: &LlmOutput, validation: &PolicyValidation) -> RiskCounts {
    RiskCounts {
        critical: validation.intent_guard_report.critical_findings,
        high: llm.high.len() as u32,
        medium: llm.medium.len() as u32,
        low: llm.low.len() as u32,
    }
}

/// Estimates the blast radius from the validated delta set.
pub fn extract_blast_radius(validation: &PolicyValidation, files_with_drift: usize) -> BlastRadius {
    let deltas = &validation.validated_deltas;

    let files_affected = if files_with_drift > 0 {
        files_with_drift
    } else {
        let mut files: Vec<&str> = deltas.iter().map(|d| d.file.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        files.len()
    };

    let critical_files = deltas
        .iter()
        .filter(|d| {
            let file = d.file.to_ascii_lowercase();
            CRITICAL_FILE_KEYWORDS.iter().any(|kw| file.contains(kw))
        })
        .count();

    let mut downstream: Vec<String> = deltas
        .iter()
        .filter_map(|d| {
            let mut parts = d.file.split('/');
            let first = parts.next()?;
            parts.next().map(|_| first.to_string())
        })
        .collect();
    downstream.sort();
    downstream.dedup();

    let scope = if files_affected >= 5 || critical_files >= 2 {
        BlastScope::High
    } else if files_affected >= 2 || critical_files >= 1 {
        BlastScope::Medium
    } else {
        BlastScope::Low
    };

    BlastRadius {
        files_affected,
        critical_files,
        downstream_services: downstream,
        scope,
    }
}

/// Derives the LLM safety estimate from the bucket distribution.
///
/// Weights: high 0.0, medium 0.3, low 0.7, allowed 1.0. Anomaly strength is
/// the share of high/medium items whose rationale mentions an anomaly
/// keyword. An empty result set is perfectly safe.
pub fn extract_llm_reasoning(llm: &LlmOutput) -> LlmReasoning {
    let high = llm.high.len();
    let medium = llm.medium.len();
    let low = llm.low.len();
    let allowed = llm.allowed_variance.len();
    let total = high + medium + low + allowed;

    let safety_probability = if total == 0 {
        1.0
    } else {
        ((medium as f64) * 0.3 + (low as f64) * 0.7 + (allowed as f64)) / (total as f64)
    };

    let anomaly_hits = llm
        .high
        .iter()
        .chain(llm.medium.iter())
        .filter(|item| {
            let why = item.why.to_ascii_lowercase();
            ANOMALY_KEYWORDS.iter().any(|kw| why.contains(kw))
        })
        .count();
    let anomaly_score = ((anomaly_hits as f64) / (total.max(1) as f64)).min(1.0);

    LlmReasoning {
        safety_probability,
        anomaly_score,
        historical_analysis: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{DeltaCategory, Locator, Policies, PolicyTag};
    use guardrails::run_guardrails;
    use serde_json::json;
    use triage::{LlmBuckets, LlmOutput};

    fn delta(id: &str, file: &str) -> Delta {
        Delta::new(
            id,
            DeltaCategory::Config,
            file,
            Locator::for_key(file, "k"),
            json!("a"),
            json!("b"),
        )
    }

    #[test]
    fn invariant_breaches_become_violations() {
        let mut d = delta("d1", "app.yml");
        d.policy = Some(PolicyTag {
            tag: PolicyTagKind::InvariantBreach,
            rule: Some("no-debug".to_string()),
            severity: Some(Severity::Critical),
            violation: true,
            reason: Some("forbidden".to_string()),
        });
        let clean = delta("d2", "app.yml");

        let violations = extract_policy_violations(&[d, clean]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "no-debug");
        assert_eq!(violations[0].severity, Severity::Critical);
    }

    #[test]
    fn blast_radius_scope_ladder() {
        let deltas = vec![delta("d1", "services/auth-service/app.yml")];
        let validation = run_guardrails(deltas, &Policies::default(), "production");

        let blast = extract_blast_radius(&validation, 1);
        // auth keyword makes it a critical file → medium scope.
        assert_eq!(blast.critical_files, 1);
        assert_eq!(blast.scope, BlastScope::Medium);
        assert_eq!(blast.downstream_services, vec!["services"]);
    }

    #[test]
    fn empty_llm_output_is_fully_safe() {
        let out = LlmOutput::from_buckets(LlmBuckets::default(), 4, "production");
        let reasoning = extract_llm_reasoning(&out);
        assert_eq!(reasoning.safety_probability, 1.0);
        assert_eq!(reasoning.anomaly_score, 0.0);
        assert_eq!(determine_risk_level(&out), "none");
    }
}
