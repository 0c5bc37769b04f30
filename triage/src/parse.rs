//! Robust parsing of model output into the bucket schema.
//!
//! Three recovery strategies, in order:
//!   1. the widest `{...}` window of the raw text
//!   2. the same window with common JSON slips repaired (stray commas,
//!      newline soup)
//!   3. minimal empty buckets
//!
//! Syntax recovery and schema validation are separate: a syntactically
//! recovered object that does not satisfy the schema is a hard error, which
//! the engine answers with the rule-based fallback for that batch.

use serde_json::Value;
use tracing::warn;

use crate::errors::{TriageError, TriageResult};
use crate::schema::LlmBuckets;

fn brace_window(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn cleaned(window: &str) -> String {
    window
        .replace(['\n', '\r'], " ")
        .replace("},}", "}}")
        .replace(",}", "}")
        .replace(",]", "]")
}

/// Recovers a JSON value from raw model text.
fn recover_json(raw: &str) -> Value {
    if let Some(window) = brace_window(raw) {
        if let Ok(v) = serde_json::from_str::<Value>(window) {
            return v;
        }
        warn!("json recovery: direct parse failed, trying cleanup");
        if let Ok(v) = serde_json::from_str::<Value>(&cleaned(window)) {
            return v;
        }
    }
    warn!("json recovery: all strategies failed, using empty buckets");
    serde_json::json!({"high": [], "medium": [], "low": [], "allowed_variance": []})
}

/// Parses and schema-validates a model response.
///
/// # Errors
/// [`TriageError::Schema`] when the recovered JSON does not satisfy the
/// bucket schema.
pub fn parse_llm_response(raw: &str) -> TriageResult<LlmBuckets> {
    if raw.trim().is_empty() {
        return Err(TriageError::Schema("empty model response".to_string()));
    }
    let value = recover_json(raw);
    serde_json::from_value(value).map_err(|e| TriageError::Schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"Here is the analysis:
    {"high": [], "medium": [], "low": [{
        "id": "cfg~a.yml.timeout", "file": "a.yml",
        "locator": {"type": "yamlpath", "value": "a.yml.timeout"},
        "old": "30", "new": "45", "why": "timeout raised",
        "remediation": {"snippet": "timeout: 30"},
        "ai_review_assistant": {"potential_risk": "slower failure detection",
                                "suggested_action": "1. review, 2. test, 3. monitor, 4. rollback plan"}
    }], "allowed_variance": []}
    Done."#;

    #[test]
    fn surrounding_prose_is_stripped() {
        let buckets = parse_llm_response(VALID).unwrap();
        assert_eq!(buckets.low.len(), 1);
        assert_eq!(buckets.low[0].id, "cfg~a.yml.timeout");
    }

    #[test]
    fn trailing_commas_are_repaired() {
        let raw = r#"{"high": [], "medium": [], "low": [], "allowed_variance": [],}"#;
        let buckets = parse_llm_response(raw).unwrap();
        assert_eq!(buckets.total(), 0);
    }

    #[test]
    fn garbage_degrades_to_empty_buckets() {
        let buckets = parse_llm_response("I could not produce JSON, sorry.").unwrap();
        assert_eq!(buckets.total(), 0);
    }

    #[test]
    fn wrong_schema_is_an_error() {
        // Valid JSON, but buckets are objects instead of lists.
        let raw = r#"{"high": {}, "medium": [], "low": [], "allowed_variance": []}"#;
        assert!(parse_llm_response(raw).is_err());
    }

    #[test]
    fn empty_response_is_an_error() {
        assert!(parse_llm_response("   ").is_err());
    }
}
