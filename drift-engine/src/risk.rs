//! Pre-LLM risk hints and declarative policy tagging.

use serde_json::Value;

use crate::bundle::{Delta, DeltaCategory, Policies, PolicyTag, PolicyTagKind, RiskLevel};

const HIGH_RISK_TOKENS: &[&str] = &[
    "password",
    "secret",
    "token",
    "credentialsid",
    "db.password",
    "db.username",
    "jdbc.url",
];

/// Locally computed risk hint: credentials and production-security surfaces
/// are high, behavioural changes are medium, presence/metadata changes low.
pub fn risk_level_and_reason(delta: &Delta) -> (RiskLevel, &'static str) {
    let loc = delta.locator.value().to_ascii_lowercase();
    let file = delta.file.to_ascii_lowercase();

    if HIGH_RISK_TOKENS.iter().any(|t| loc.contains(t)) {
        return (
            RiskLevel::High,
            "Sensitive credential or connection parameter changed.",
        );
    }
    if matches!(delta.category, DeltaCategory::Jenkins | DeltaCategory::Container)
        && (loc.contains("credentials") || loc.contains("from["))
    {
        return (
            RiskLevel::High,
            "Pipeline credential or container base image changed.",
        );
    }
    if delta.category == DeltaCategory::SpringProfile
        && (file.contains("prod") || file.contains(".production"))
    {
        return (RiskLevel::High, "Production profile configuration changed.");
    }

    if delta.category.is_behavioural() {
        return (RiskLevel::Med, "Behavioral or version/configuration change.");
    }

    (RiskLevel::Low, "Non-behavioral or metadata/package change.")
}

fn value_as_comparable(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Attaches the risk hint and the policy tag to a delta.
///
/// Tagging order: every delta starts `suspect`; an `env_allow_keys` hit
/// makes it `allowed_variance`; an invariant hit (forbidden value present,
/// or a required value missing) overrides both as `invariant_breach` with
/// the rule's severity.
pub fn tag_with_policy(delta: &mut Delta, policies: &Policies) {
    let (level, reason) = risk_level_and_reason(delta);
    delta.risk_level = level;
    delta.risk_reason = reason.to_string();

    let loc = delta.locator.value().to_ascii_lowercase();
    let mut tag = PolicyTag::suspect();

    if policies
        .env_allow_keys
        .iter()
        .any(|k| !k.is_empty() && loc.contains(&k.to_ascii_lowercase()))
    {
        tag = PolicyTag {
            tag: PolicyTagKind::AllowedVariance,
            rule: Some("env_allow_keys".to_string()),
            severity: None,
            violation: false,
            reason: None,
        };
    }

    let new_value = value_as_comparable(&delta.new);
    for inv in &policies.invariants {
        let needle = inv.locator_contains.to_ascii_lowercase();
        if needle.is_empty() || !loc.contains(&needle) {
            continue;
        }
        let forbidden_hit = inv.forbid_values.iter().any(|f| *f == new_value);
        let required_miss =
            !inv.require_values.is_empty() && !inv.require_values.iter().any(|r| *r == new_value);
        if forbidden_hit || required_miss {
            tag = PolicyTag {
                tag: PolicyTagKind::InvariantBreach,
                rule: Some(inv.name.clone()),
                severity: Some(inv.severity),
                violation: true,
                reason: Some(if forbidden_hit {
                    format!("Forbidden value detected for rule '{}'", inv.name)
                } else {
                    format!("Required value missing for rule '{}'", inv.name)
                }),
            };
        }
    }

    delta.policy = Some(tag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{InvariantRule, Locator, Severity};
    use serde_json::json;

    fn delta(category: DeltaCategory, file: &str, loc: &str, new: Value) -> Delta {
        Delta::new(
            "t",
            category,
            file,
            Locator::Keypath {
                value: loc.to_string(),
                line_start: None,
            },
            Value::Null,
            new,
        )
    }

    #[test]
    fn credential_locators_are_high() {
        let d = delta(
            DeltaCategory::Config,
            "app.yml",
            "app.yml.spring.datasource.password",
            json!("x"),
        );
        assert_eq!(risk_level_and_reason(&d).0, RiskLevel::High);
    }

    #[test]
    fn behavioural_categories_are_medium() {
        let d = delta(DeltaCategory::Dependency, "maven", "maven:org.acme:sdk", json!("2.0"));
        assert_eq!(risk_level_and_reason(&d).0, RiskLevel::Med);
    }

    #[test]
    fn presence_changes_are_low() {
        let d = delta(DeltaCategory::File, "new.txt", "new.txt", json!("present"));
        assert_eq!(risk_level_and_reason(&d).0, RiskLevel::Low);
    }

    #[test]
    fn allow_key_tags_allowed_variance() {
        let policies = Policies {
            env_allow_keys: vec!["server.port".to_string()],
            invariants: vec![],
        };
        let mut d = delta(
            DeltaCategory::Config,
            "app.yml",
            "app.yml.server.port",
            json!(9090),
        );
        tag_with_policy(&mut d, &policies);
        assert_eq!(d.policy.as_ref().unwrap().tag, PolicyTagKind::AllowedVariance);
    }

    #[test]
    fn forbidden_value_is_invariant_breach() {
        let policies = Policies {
            env_allow_keys: vec![],
            invariants: vec![InvariantRule {
                name: "no-debug-in-prod".to_string(),
                locator_contains: "debug".to_string(),
                forbid_values: vec!["true".to_string()],
                require_values: vec![],
                severity: Severity::Critical,
            }],
        };
        let mut d = delta(DeltaCategory::Config, "app.yml", "app.yml.debug", json!("true"));
        tag_with_policy(&mut d, &policies);
        let tag = d.policy.unwrap();
        assert_eq!(tag.tag, PolicyTagKind::InvariantBreach);
        assert_eq!(tag.severity, Some(Severity::Critical));
        assert!(tag.violation);
    }

    #[test]
    fn missing_required_value_is_invariant_breach() {
        let policies = Policies {
            env_allow_keys: vec![],
            invariants: vec![InvariantRule {
                name: "tls-required".to_string(),
                locator_contains: "ssl.enabled".to_string(),
                forbid_values: vec![],
                require_values: vec!["true".to_string()],
                severity: Severity::High,
            }],
        };
        let mut d = delta(
            DeltaCategory::Config,
            "app.yml",
            "app.yml.ssl.enabled",
            json!("false"),
        );
        tag_with_policy(&mut d, &policies);
        assert_eq!(d.policy.unwrap().tag, PolicyTagKind::InvariantBreach);
    }

    #[test]
    fn untouched_deltas_stay_suspect() {
        let mut d = delta(DeltaCategory::Config, "app.yml", "app.yml.timeout", json!(45));
        tag_with_policy(&mut d, &Policies::default());
        assert_eq!(d.policy.unwrap().tag, PolicyTagKind::Suspect);
    }
}
