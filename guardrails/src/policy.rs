//! Policy revalidation under the target environment.
//!
//! The drift engine applies a first policy pass at emission time; this one
//! is authoritative: it re-checks invariants against the (now redacted)
//! deltas, preserves `allowed_variance` verdicts, and marks everything
//! untagged as `suspect` pending AI analysis.

use serde::{Deserialize, Serialize};
use tracing::debug;

use drift_engine::{Delta, Policies, PolicyTag, PolicyTagKind, Severity};

/// Violation totals by severity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PolicySummary {
    pub total_violations: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl PolicySummary {
    fn record(&mut self, severity: Severity) {
        self.total_violations += 1;
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            _ => self.low += 1,
        }
    }
}

enum PolicyCheck {
    Violation {
        rule: String,
        severity: Severity,
        reason: String,
    },
    Allowed,
    Clean,
}

fn value_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.to_ascii_lowercase(),
        other => other.to_string().to_ascii_lowercase(),
    }
}

fn check_rules(delta: &Delta, policies: &Policies) -> PolicyCheck {
    let locator_value = delta.locator.value().to_ascii_lowercase();
    let new_value = value_text(&delta.new);

    for invariant in &policies.invariants {
        let needle = invariant.locator_contains.to_ascii_lowercase();
        if needle.is_empty() || !locator_value.contains(&needle) {
            continue;
        }

        for forbidden in &invariant.forbid_values {
            if new_value.contains(&forbidden.to_ascii_lowercase()) {
                return PolicyCheck::Violation {
                    rule: invariant.name.clone(),
                    severity: invariant.severity,
                    reason: format!("Forbidden value detected: {forbidden}"),
                };
            }
        }
        for required in &invariant.require_values {
            if !new_value.contains(&required.to_ascii_lowercase()) {
                return PolicyCheck::Violation {
                    rule: invariant.name.clone(),
                    severity: invariant.severity,
                    reason: format!("Required value missing: {required}"),
                };
            }
        }
    }

    if policies
        .env_allow_keys
        .iter()
        .any(|k| !k.is_empty() && locator_value.contains(&k.to_ascii_lowercase()))
    {
        return PolicyCheck::Allowed;
    }

    PolicyCheck::Clean
}

/// Revalidates every delta and returns the violation totals.
pub fn validate_policies(
    deltas: &mut [Delta],
    policies: &Policies,
    environment: &str,
) -> PolicySummary {
    let mut summary = PolicySummary::default();

    for delta in deltas.iter_mut() {
        match check_rules(delta, policies) {
            PolicyCheck::Violation {
                rule,
                severity,
                reason,
            } => {
                delta.policy = Some(PolicyTag {
                    tag: PolicyTagKind::InvariantBreach,
                    rule: Some(rule),
                    severity: Some(severity),
                    violation: true,
                    reason: Some(reason),
                });
                summary.record(severity);
            }
            PolicyCheck::Allowed => {
                // Preserve the drift engine's allowed_variance verdict; tag
                // a fresh allow hit the same way.
                if delta
                    .policy
                    .as_ref()
                    .map(|p| p.tag != PolicyTagKind::AllowedVariance)
                    .unwrap_or(true)
                {
                    delta.policy = Some(PolicyTag {
                        tag: PolicyTagKind::AllowedVariance,
                        rule: Some("env_allow_keys".to_string()),
                        severity: None,
                        violation: false,
                        reason: None,
                    });
                }
            }
            PolicyCheck::Clean => match &delta.policy {
                Some(existing) if existing.tag == PolicyTagKind::AllowedVariance => {}
                Some(_) => {}
                None => {
                    delta.policy = Some(PolicyTag {
                        tag: PolicyTagKind::Suspect,
                        rule: None,
                        severity: Some(Severity::Medium),
                        violation: false,
                        reason: Some("Requires AI analysis".to_string()),
                    });
                }
            },
        }
    }

    debug!(
        environment,
        violations = summary.total_violations,
        critical = summary.critical,
        "policy validation complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{DeltaCategory, InvariantRule, Locator};
    use serde_json::json;

    fn delta(loc: &str, new: serde_json::Value) -> Delta {
        Delta::new(
            "t",
            DeltaCategory::Config,
            "app.yml",
            Locator::Keypath {
                value: loc.to_string(),
                line_start: None,
            },
            serde_json::Value::Null,
            new,
        )
    }

    fn forbid_policy() -> Policies {
        Policies {
            env_allow_keys: vec!["logging.level".to_string()],
            invariants: vec![InvariantRule {
                name: "no-plain-http".to_string(),
                locator_contains: "endpoint".to_string(),
                forbid_values: vec!["http://".to_string()],
                require_values: vec![],
                severity: Severity::High,
            }],
        }
    }

    #[test]
    fn forbidden_substring_violates() {
        let mut deltas = vec![delta("app.yml.service.endpoint", json!("http://plain"))];
        let summary = validate_policies(&mut deltas, &forbid_policy(), "production");
        assert_eq!(summary.total_violations, 1);
        assert_eq!(summary.high, 1);
        let tag = deltas[0].policy.as_ref().unwrap();
        assert_eq!(tag.tag, PolicyTagKind::InvariantBreach);
        assert!(tag.violation);
    }

    #[test]
    fn allow_keys_tag_allowed_variance() {
        let mut deltas = vec![delta("app.yml.logging.level", json!("DEBUG"))];
        let summary = validate_policies(&mut deltas, &forbid_policy(), "dev");
        assert_eq!(summary.total_violations, 0);
        assert_eq!(
            deltas[0].policy.as_ref().unwrap().tag,
            PolicyTagKind::AllowedVariance
        );
    }

    #[test]
    fn untagged_deltas_become_suspect() {
        let mut deltas = vec![delta("app.yml.timeout", json!(45))];
        validate_policies(&mut deltas, &Policies::default(), "production");
        let tag = deltas[0].policy.as_ref().unwrap();
        assert_eq!(tag.tag, PolicyTagKind::Suspect);
        assert_eq!(tag.severity, Some(Severity::Medium));
    }
}
