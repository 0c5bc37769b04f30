//! Rule-based categorisation used when LLM analysis fails for a batch.

use serde_json::Value;
use tracing::debug;

use drift_engine::{Delta, PolicyTagKind};

use crate::schema::{AiReviewAssistant, AllowedVarianceItem, LlmBuckets, Remediation, TriagedItem};

const CREDENTIAL_KEYWORDS: &[&str] = &["password", "secret", "key", "token"];
const NETWORK_KEYWORDS: &[&str] = &["port", "host", "url", "endpoint"];

fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn triaged_item(delta: &Delta) -> TriagedItem {
    let old = value_text(&delta.old);
    let new = value_text(&delta.new);
    TriagedItem {
        id: delta.id.clone(),
        file: delta.file.clone(),
        locator: delta.locator.clone(),
        old: delta.old.clone(),
        new: delta.new.clone(),
        why: format!("Configuration change from {old} to {new}"),
        remediation: Remediation {
            // Reverting to the previous value is the safe remediation.
            snippet: old,
        },
        ai_review_assistant: AiReviewAssistant {
            potential_risk:
                "Automated analysis was unavailable for this change; its behavioural impact is unverified and may affect dependent services."
                    .to_string(),
            suggested_action:
                "1. Review the change manually, 2. Test in a staging environment, 3. Monitor after deployment, 4. Keep a rollback plan ready"
                    .to_string(),
        },
    }
}

/// Categorises a batch with the deterministic rules:
/// invariant breach or credential keyword → high; policy-allowed →
/// allowed_variance; network-shaped keyword → medium; everything else low.
pub fn fallback_categorize(deltas: &[Delta]) -> LlmBuckets {
    debug!(count = deltas.len(), "rule-based fallback categorisation");
    let mut buckets = LlmBuckets::default();

    for delta in deltas {
        let policy_tag = delta.policy.as_ref().map(|p| p.tag);
        let new_lower = value_text(&delta.new).to_ascii_lowercase();

        if policy_tag == Some(PolicyTagKind::InvariantBreach)
            || CREDENTIAL_KEYWORDS.iter().any(|k| new_lower.contains(k))
        {
            buckets.high.push(triaged_item(delta));
        } else if policy_tag == Some(PolicyTagKind::AllowedVariance) {
            buckets.allowed_variance.push(AllowedVarianceItem {
                id: delta.id.clone(),
                file: delta.file.clone(),
                locator: delta.locator.clone(),
                old: delta.old.clone(),
                new: delta.new.clone(),
                rationale: "Environment-specific configuration difference".to_string(),
            });
        } else if NETWORK_KEYWORDS.iter().any(|k| new_lower.contains(k)) {
            buckets.medium.push(triaged_item(delta));
        } else {
            buckets.low.push(triaged_item(delta));
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{DeltaCategory, Locator, Policies, risk::tag_with_policy};
    use serde_json::json;

    fn delta(id: &str, key: &str, new: Value) -> Delta {
        let mut d = Delta::new(
            id,
            DeltaCategory::Config,
            "app.yml",
            Locator::for_key("app.yml", key),
            Value::Null,
            new,
        );
        tag_with_policy(&mut d, &Policies::default());
        d
    }

    #[test]
    fn buckets_partition_the_input() {
        let deltas = vec![
            delta("d1", "datasource.password", json!("new-secret-value")),
            delta("d2", "server.endpoint", json!("https://svc:8443/endpoint")),
            delta("d3", "feature.enabled", json!(true)),
        ];
        let buckets = fallback_categorize(&deltas);
        assert_eq!(buckets.total(), deltas.len());
        assert_eq!(buckets.high.len(), 1);
        assert_eq!(buckets.medium.len(), 1);
        assert_eq!(buckets.low.len(), 1);
    }

    #[test]
    fn remediation_suggests_the_old_value() {
        let mut d = delta("d1", "timeout", json!("45"));
        d.old = json!("30");
        let buckets = fallback_categorize(&[d]);
        assert_eq!(buckets.low[0].remediation.snippet, "30");
    }
}
