//! Adjudication prompt builder.
//!
//! One prompt per batch, carrying every delta of the batch and the exact
//! output contract. The response must be a single JSON object with the four
//! buckets and nothing else.

use std::fmt::Write;

use serde_json::Value;

use drift_engine::{Delta, PolicyTagKind};

fn value_text(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn policy_tag_text(delta: &Delta) -> &'static str {
    match delta.policy.as_ref().map(|p| p.tag) {
        Some(PolicyTagKind::InvariantBreach) => "invariant_breach",
        Some(PolicyTagKind::AllowedVariance) => "allowed_variance",
        Some(PolicyTagKind::Suspect) => "suspect",
        None => "unknown",
    }
}

/// Builds the triage prompt for one batch of deltas in one file.
pub fn build_triage_prompt(file: &str, deltas: &[Delta], environment: &str) -> String {
    let mut p = String::new();

    let _ = writeln!(
        p,
        "You are a configuration drift adjudicator analyzing file \"{file}\" for environment \"{environment}\".\n"
    );
    let _ = writeln!(
        p,
        "Your task is to categorize ALL {} configuration changes into risk buckets.\n",
        deltas.len()
    );
    let _ = writeln!(p, "## CHANGES TO ANALYZE\n");

    for (idx, delta) in deltas.iter().enumerate() {
        let _ = writeln!(p, "### CHANGE #{}", idx + 1);
        let _ = writeln!(p, "- **ID**: `{}`", delta.id);
        let _ = writeln!(p, "- **Category**: {}", delta.category.as_str());
        let _ = writeln!(
            p,
            "- **Location**: {}: `{}`",
            serde_json::to_value(&delta.locator)
                .ok()
                .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "keypath".to_string()),
            delta.locator.value()
        );
        let _ = writeln!(p, "- **Old Value**: `{}`", value_text(&delta.old));
        let _ = writeln!(p, "- **New Value**: `{}`", value_text(&delta.new));
        let _ = writeln!(p, "- **Policy Tag**: {}\n", policy_tag_text(delta));
    }

    let _ = writeln!(
        p,
        r#"## OUTPUT FORMAT

Return ONLY valid JSON with this EXACT structure. Include ALL required fields.

```json
{{
  "high": [
    {{
      "id": "delta_id_from_above",
      "file": "{file}",
      "locator": {{"type": "keypath", "value": "full.path.to.key"}},
      "old": "previous value from the delta",
      "new": "new value from the delta",
      "why": "What changed and its impact",
      "remediation": {{"snippet": "corrected configuration value"}},
      "ai_review_assistant": {{
        "potential_risk": "2-3 sentence explanation of what could go wrong and the business impact",
        "suggested_action": "Numbered actionable steps: 1. First step, 2. Second step, 3. Third step, 4. Fourth step"
      }}
    }}
  ],
  "medium": [],
  "low": [],
  "allowed_variance": [
    {{
      "id": "delta_id_from_above",
      "file": "{file}",
      "locator": {{"type": "keypath", "value": "full.path.to.key"}},
      "old": "previous value",
      "new": "new value",
      "rationale": "Why this change is acceptable"
    }}
  ]
}}
```

## CRITICAL FIELD REQUIREMENTS

For **high**, **medium**, **low** items (ALL REQUIRED): id, file, locator
(copy the exact locator structure from the delta - if the type is "unidiff"
also copy old_start, old_lines, new_start, new_lines and hunk_header), old,
new, why, remediation.snippet, and ai_review_assistant with potential_risk
and suggested_action.

For **allowed_variance** items: id, file, locator, old, new, rationale.

## CATEGORIZATION GUIDELINES

### high (critical - database/security)
- Database credentials changed (usernames, passwords, connection strings)
- Security features disabled
- Production endpoints modified
- Authentication/authorization changes
- Policy violations (invariant_breach)

### medium (important - configuration/dependencies)
- Network configuration changes
- Dependency version changes
- Feature behavior modifications
- Performance settings adjusted

### low (minor)
- Logging level changes
- Comment updates
- Minor tweaks

### allowed_variance (acceptable)
- Environment-specific configuration differences
- Test suite configuration
- Build/CI pipeline settings
- Policy tag = "allowed_variance"

## ANALYSIS INSTRUCTIONS

1. Categorize each change into exactly ONE bucket.
2. Use the exact delta IDs from above.
3. Copy the locator structure from the delta unchanged.
4. Copy the old/new values from the delta.
5. Write a clear "why" (or "rationale" for allowed_variance).
6. Return ONLY JSON - no markdown fences, no commentary.

Begin analysis now."#
    );

    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{DeltaCategory, Locator};
    use serde_json::json;

    #[test]
    fn prompt_carries_every_delta_and_the_contract() {
        let deltas = vec![
            Delta::new(
                "cfg~a.yml.timeout",
                DeltaCategory::Config,
                "a.yml",
                Locator::for_key("a.yml", "timeout"),
                json!(30),
                json!(45),
            ),
            Delta::new(
                "cfg~a.yml.retries",
                DeltaCategory::Config,
                "a.yml",
                Locator::for_key("a.yml", "retries"),
                json!(3),
                json!(5),
            ),
        ];
        let prompt = build_triage_prompt("a.yml", &deltas, "production");
        assert!(prompt.contains("cfg~a.yml.timeout"));
        assert!(prompt.contains("cfg~a.yml.retries"));
        assert!(prompt.contains("CHANGE #2"));
        assert!(prompt.contains("allowed_variance"));
        assert!(prompt.contains("ai_review_assistant"));
        assert!(prompt.contains("environment \"production\""));
    }
}
