//! Guardrail engine: PII redaction, malicious-intent scanning, policy
//! validation.
//!
//! The three sub-passes run in a fixed order over the bundle's deltas:
//! redaction first (so nothing downstream - the LLM included - ever sees a
//! raw secret), then the intent scan, then the authoritative policy pass.
//! The caller persists the sanitised delta list back to the bundle before
//! triage reads it.

pub mod intent;
pub mod pii;
pub mod policy;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use drift_engine::{Delta, IntentFinding, Policies, Severity};

pub use policy::PolicySummary;

/// Aggregate PII findings over a delta set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PiiReport {
    pub instances_found: u32,
    pub types: Vec<String>,
    pub redacted: bool,
}

/// Aggregate intent findings over a delta set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentReport {
    pub suspicious_patterns: Vec<IntentFinding>,
    pub total_findings: u32,
    pub critical_findings: u32,
    pub safe: bool,
}

/// Output of the guardrail stage: the sanitised deltas plus the three
/// reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyValidation {
    pub validated_deltas: Vec<Delta>,
    pub pii_redaction_report: PiiReport,
    pub intent_guard_report: IntentReport,
    pub policy_summary: PolicySummary,
    pub environment: String,
}

impl PolicyValidation {
    /// Whether any intent finding is fatal to certification.
    pub fn has_critical_intent(&self) -> bool {
        self.intent_guard_report
            .suspicious_patterns
            .iter()
            .any(|f| f.severity == Severity::Critical)
    }
}

/// Runs redaction → intent scan → policy validation over the deltas.
pub fn run_guardrails(
    mut deltas: Vec<Delta>,
    policies: &Policies,
    environment: &str,
) -> PolicyValidation {
    debug!(deltas = deltas.len(), environment, "guardrails: redacting PII");
    let mut pii_report = PiiReport::default();
    for delta in &mut deltas {
        pii::redact_delta(delta);
        if delta.pii_redacted {
            pii_report.instances_found += 1;
            for t in &delta.pii_types {
                if !pii_report.types.contains(t) {
                    pii_report.types.push(t.clone());
                }
            }
        }
    }
    pii_report.types.sort();
    pii_report.redacted = pii_report.instances_found > 0;

    debug!("guardrails: scanning for malicious intent");
    let mut intent_report = IntentReport::default();
    for delta in &mut deltas {
        intent::scan_delta(delta);
        if let Some(guard) = &delta.intent_guard {
            if guard.suspicious {
                intent_report.total_findings += guard.patterns_detected.len() as u32;
                intent_report.critical_findings += guard
                    .patterns_detected
                    .iter()
                    .filter(|f| f.severity == Severity::Critical)
                    .count() as u32;
                intent_report
                    .suspicious_patterns
                    .extend(guard.patterns_detected.iter().cloned());
            }
        }
    }
    intent_report.safe = intent_report.total_findings == 0;

    debug!("guardrails: validating policies");
    let policy_summary = policy::validate_policies(&mut deltas, policies, environment);

    info!(
        pii_instances = pii_report.instances_found,
        intent_findings = intent_report.total_findings,
        policy_violations = policy_summary.total_violations,
        "guardrails complete"
    );

    PolicyValidation {
        validated_deltas: deltas,
        pii_redaction_report: pii_report,
        intent_guard_report: intent_report,
        policy_summary,
        environment: environment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{DeltaCategory, Locator};
    use serde_json::json;

    fn delta(id: &str, key: &str, old: serde_json::Value, new: serde_json::Value) -> Delta {
        Delta::new(
            id,
            DeltaCategory::Config,
            "application-prod.yml",
            Locator::for_key("application-prod.yml", key),
            old,
            new,
        )
    }

    #[test]
    fn redaction_happens_before_anything_reaches_output() {
        let deltas = vec![delta(
            "cfg~application-prod.yml.spring.datasource.password",
            "spring.datasource.password",
            json!("password=old1"),
            json!("password=new2"),
        )];
        let out = run_guardrails(deltas, &Policies::default(), "production");

        let d = &out.validated_deltas[0];
        assert!(d.pii_redacted);
        assert_eq!(d.new, json!("[REDACTED_PASSWORD]"));
        assert!(out.pii_redaction_report.redacted);
        assert_eq!(out.pii_redaction_report.instances_found, 1);
    }

    #[test]
    fn critical_intent_is_surfaced() {
        let deltas = vec![delta(
            "cfg~application-prod.yml.query",
            "query",
            json!("select 1"),
            json!("select 1 where name = ''; DROP TABLE users --'"),
        )];
        let out = run_guardrails(deltas, &Policies::default(), "production");
        assert!(out.has_critical_intent());
        assert!(!out.intent_guard_report.safe);
        assert_eq!(
            out.validated_deltas[0].intent_guard.as_ref().unwrap().severity,
            Severity::Critical
        );
    }

    #[test]
    fn clean_run_is_safe_and_suspect_tagged() {
        let deltas = vec![delta(
            "cfg~application-prod.yml.timeout",
            "timeout",
            json!(30),
            json!(45),
        )];
        let out = run_guardrails(deltas, &Policies::default(), "production");
        assert!(out.intent_guard_report.safe);
        assert!(!out.pii_redaction_report.redacted);
        assert_eq!(out.policy_summary.total_violations, 0);
        assert_eq!(
            out.validated_deltas[0].policy.as_ref().unwrap().tag,
            drift_engine::PolicyTagKind::Suspect
        );
    }
}
