//! Typed schema of the LLM adjudication output.
//!
//! The validator is the deserialiser: a response that does not carry the
//! four buckets with their required item fields fails to decode, which
//! sends the batch to the rule-based fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use drift_engine::Locator;

/// One categorised item in `high`/`medium`/`low`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriagedItem {
    pub id: String,
    pub file: String,
    pub locator: Locator,
    pub old: Value,
    pub new: Value,
    /// Single-sentence explanation; the model may emit `rationale` instead.
    #[serde(alias = "rationale")]
    pub why: String,
    pub remediation: Remediation,
    pub ai_review_assistant: AiReviewAssistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiReviewAssistant {
    pub potential_risk: String,
    pub suggested_action: String,
}

/// One item in `allowed_variance`; no remediation or review assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedVarianceItem {
    pub id: String,
    pub file: String,
    pub locator: Locator,
    #[serde(default)]
    pub old: Value,
    #[serde(default)]
    pub new: Value,
    #[serde(alias = "why")]
    pub rationale: String,
}

/// The four buckets, exactly as the model must return them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmBuckets {
    pub high: Vec<TriagedItem>,
    pub medium: Vec<TriagedItem>,
    pub low: Vec<TriagedItem>,
    pub allowed_variance: Vec<AllowedVarianceItem>,
}

impl LlmBuckets {
    pub fn merge(&mut self, other: LlmBuckets) {
        self.high.extend(other.high);
        self.medium.extend(other.medium);
        self.low.extend(other.low);
        self.allowed_variance.extend(other.allowed_variance);
    }

    pub fn total(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len() + self.allowed_variance.len()
    }

    /// Sorts every bucket by `(file, id)` for deterministic output.
    pub fn sort(&mut self) {
        let key = |file: &String, id: &String| (file.clone(), id.clone());
        self.high.sort_by_key(|i| key(&i.file, &i.id));
        self.medium.sort_by_key(|i| key(&i.file, &i.id));
        self.low.sort_by_key(|i| key(&i.file, &i.id));
        self.allowed_variance.sort_by_key(|i| key(&i.file, &i.id));
    }
}

/// Summary statistics attached to the merged output.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TriageSummary {
    pub total_config_files: usize,
    pub files_with_drift: usize,
    pub total_drifts: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub allowed_variance: usize,
}

/// Final output of the triage stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOutput {
    pub summary: TriageSummary,
    pub high: Vec<TriagedItem>,
    pub medium: Vec<TriagedItem>,
    pub low: Vec<TriagedItem>,
    pub allowed_variance: Vec<AllowedVarianceItem>,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LlmOutput {
    pub fn from_buckets(
        mut buckets: LlmBuckets,
        total_config_files: usize,
        environment: &str,
    ) -> Self {
        buckets.sort();
        let mut files: Vec<&str> = buckets
            .high
            .iter()
            .map(|i| i.file.as_str())
            .chain(buckets.medium.iter().map(|i| i.file.as_str()))
            .chain(buckets.low.iter().map(|i| i.file.as_str()))
            .chain(buckets.allowed_variance.iter().map(|i| i.file.as_str()))
            .collect();
        files.sort_unstable();
        files.dedup();

        let summary = TriageSummary {
            total_config_files,
            files_with_drift: files.len(),
            total_drifts: buckets.total(),
            high_risk: buckets.high.len(),
            medium_risk: buckets.medium.len(),
            low_risk: buckets.low.len(),
            allowed_variance: buckets.allowed_variance.len(),
        };

        Self {
            summary,
            high: buckets.high,
            medium: buckets.medium,
            low: buckets.low,
            allowed_variance: buckets.allowed_variance,
            environment: environment.to_string(),
            message: None,
        }
    }

    /// The output for a run with no deltas at all.
    pub fn empty(total_config_files: usize, environment: &str) -> Self {
        let mut out = Self::from_buckets(LlmBuckets::default(), total_config_files, environment);
        out.message = Some("No deltas detected - environments are in sync".to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_fields_fail_to_decode() {
        // No `remediation` / `ai_review_assistant` on a high item.
        let raw = json!({
            "high": [{"id": "x", "file": "a.yml",
                      "locator": {"type": "keypath", "value": "a.yml.k"},
                      "old": "1", "new": "2", "why": "changed"}],
            "medium": [], "low": [], "allowed_variance": []
        });
        assert!(serde_json::from_value::<LlmBuckets>(raw).is_err());
    }

    #[test]
    fn rationale_alias_is_accepted_for_why() {
        let raw = json!({
            "high": [], "medium": [], "low": [],
            "allowed_variance": [{"id": "x", "file": "a.yml",
                "locator": {"type": "keypath", "value": "a.yml.k"},
                "old": "1", "new": "2", "rationale": "env-specific"}]
        });
        let buckets: LlmBuckets = serde_json::from_value(raw).unwrap();
        assert_eq!(buckets.allowed_variance[0].rationale, "env-specific");
    }

    #[test]
    fn summary_counts_and_distinct_files() {
        let item = |file: &str, id: &str| TriagedItem {
            id: id.to_string(),
            file: file.to_string(),
            locator: Locator::Path {
                value: file.to_string(),
            },
            old: json!("a"),
            new: json!("b"),
            why: "w".to_string(),
            remediation: Remediation {
                snippet: "a".to_string(),
            },
            ai_review_assistant: AiReviewAssistant {
                potential_risk: "r".to_string(),
                suggested_action: "s".to_string(),
            },
        };
        let buckets = LlmBuckets {
            high: vec![item("a.yml", "2"), item("a.yml", "1")],
            medium: vec![item("b.yml", "3")],
            low: vec![],
            allowed_variance: vec![],
        };
        let out = LlmOutput::from_buckets(buckets, 12, "production");
        assert_eq!(out.summary.total_drifts, 3);
        assert_eq!(out.summary.files_with_drift, 2);
        assert_eq!(out.summary.total_config_files, 12);
        // Sorted by (file, id).
        assert_eq!(out.high[0].id, "1");
    }
}
