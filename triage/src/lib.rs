//! Triage engine: LLM-driven risk categorisation of deltas.
//!
//! Behaviour per run:
//! 1. **Deduplicate** by `(file, locator value, old, new)`.
//! 2. **Select** the LLM workload: config/spring deltas first (capped),
//!    then dependency deltas (capped). Everything else - and overflow -
//!    is categorised by the deterministic rules, so the output always
//!    partitions the full deduplicated set.
//! 3. **Group** by file, splitting groups of more than ten into
//!    `{file}_batch_{n}` chunks.
//! 4. One streaming completion per batch, one batch in flight at a time;
//!    parse + schema-validate; on failure, rule-based fallback for that
//!    batch.
//! 5. **Merge**, sort each bucket by `(file, id)`, attach the summary.

pub mod errors;
pub mod fallback;
pub mod parse;
pub mod prompt;
pub mod schema;

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use drift_engine::{Delta, DeltaCategory};
use llm_service::LlmServiceProfiles;

pub use errors::{TriageError, TriageResult};
pub use schema::{
    AiReviewAssistant, AllowedVarianceItem, LlmBuckets, LlmOutput, Remediation, TriageSummary,
    TriagedItem,
};

/// Maximum deltas per LLM batch.
const MAX_BATCH: usize = 10;
/// Caps on the LLM workload; overflow goes through the rule fallback.
const MAX_CONFIG_DELTAS: usize = 30;
const MAX_DEPENDENCY_DELTAS: usize = 10;

fn value_repr(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn dedup_key(delta: &Delta) -> String {
    format!(
        "{}:{}:{}:{}",
        delta.file,
        delta.locator.value(),
        value_repr(&delta.old),
        value_repr(&delta.new)
    )
}

/// Removes duplicate deltas, keeping first occurrences in order.
fn deduplicate(deltas: &[Delta]) -> Vec<Delta> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for delta in deltas {
        if seen.insert(dedup_key(delta)) {
            out.push(delta.clone());
        } else {
            debug!(file = %delta.file, locator = %delta.locator.value(), "skipping duplicate delta");
        }
    }
    out
}

/// Groups deltas by file and splits oversized groups into `MAX_BATCH`
/// chunks.
fn build_batches(deltas: Vec<Delta>) -> Vec<(String, Vec<Delta>)> {
    let mut by_file: Vec<(String, Vec<Delta>)> = Vec::new();
    for delta in deltas {
        match by_file.iter_mut().find(|(f, _)| *f == delta.file) {
            Some((_, group)) => group.push(delta),
            None => by_file.push((delta.file.clone(), vec![delta])),
        }
    }

    let mut batches = Vec::new();
    for (file, group) in by_file {
        if group.len() <= MAX_BATCH {
            batches.push((file, group));
        } else {
            for (i, chunk) in group.chunks(MAX_BATCH).enumerate() {
                batches.push((format!("{file}_batch_{}", i + 1), chunk.to_vec()));
            }
        }
    }
    batches
}

async fn analyze_batch(
    llm: &LlmServiceProfiles,
    file: &str,
    deltas: &[Delta],
    environment: &str,
) -> TriageResult<LlmBuckets> {
    let prompt = prompt::build_triage_prompt(file, deltas, environment);
    debug!(file, deltas = deltas.len(), "triage: calling llm");
    let response = llm.generate_slow(&prompt, None).await?;
    debug!(file, chars = response.len(), "triage: llm response received");
    parse::parse_llm_response(&response)
}

/// Runs the full triage stage over the (already redacted) delta list.
///
/// One LLM batch is in flight at a time; a batch whose call or schema
/// validation fails is categorised by the deterministic rules instead.
pub async fn run_triage(
    llm: &LlmServiceProfiles,
    deltas: &[Delta],
    total_config_files: usize,
    environment: &str,
) -> LlmOutput {
    if deltas.is_empty() {
        info!("triage: no deltas, environments are in sync");
        return LlmOutput::empty(total_config_files, environment);
    }

    let deduplicated = deduplicate(deltas);
    debug!(
        before = deltas.len(),
        after = deduplicated.len(),
        "triage: deduplicated"
    );

    // LLM workload: config/spring first, then dependencies, both capped.
    let config_like: Vec<Delta> = deduplicated
        .iter()
        .filter(|d| {
            matches!(
                d.category,
                DeltaCategory::Config | DeltaCategory::SpringProfile
            )
        })
        .take(MAX_CONFIG_DELTAS)
        .cloned()
        .collect();
    let dependency: Vec<Delta> = deduplicated
        .iter()
        .filter(|d| d.category == DeltaCategory::Dependency)
        .take(MAX_DEPENDENCY_DELTAS)
        .cloned()
        .collect();

    let llm_ids: HashSet<&str> = config_like
        .iter()
        .chain(dependency.iter())
        .map(|d| d.id.as_str())
        .collect();
    let rest: Vec<Delta> = deduplicated
        .iter()
        .filter(|d| !llm_ids.contains(d.id.as_str()))
        .cloned()
        .collect();

    let mut llm_workload = config_like;
    llm_workload.extend(dependency);
    let batches = build_batches(llm_workload);
    info!(
        batches = batches.len(),
        rule_categorised = rest.len(),
        "triage: batches prepared"
    );

    let mut merged = LlmBuckets::default();
    for (name, batch) in &batches {
        match analyze_batch(llm, name, batch, environment).await {
            Ok(buckets) => {
                debug!(
                    batch = %name,
                    high = buckets.high.len(),
                    medium = buckets.medium.len(),
                    low = buckets.low.len(),
                    allowed = buckets.allowed_variance.len(),
                    "triage: batch categorised"
                );
                merged.merge(buckets);
            }
            Err(e) => {
                warn!(batch = %name, error = %e, "triage: llm analysis failed, using rule fallback");
                merged.merge(fallback::fallback_categorize(batch));
            }
        }
    }

    // Deltas outside the LLM workload always go through the rules.
    merged.merge(fallback::fallback_categorize(&rest));

    let out = LlmOutput::from_buckets(merged, total_config_files, environment);
    info!(
        total = out.summary.total_drifts,
        high = out.summary.high_risk,
        medium = out.summary.medium_risk,
        low = out.summary.low_risk,
        allowed = out.summary.allowed_variance,
        "triage complete"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::Locator;
    use serde_json::json;

    fn delta(id: &str, file: &str, key: &str, old: Value, new: Value) -> Delta {
        Delta::new(
            id,
            DeltaCategory::Config,
            file,
            Locator::for_key(file, key),
            old,
            new,
        )
    }

    #[test]
    fn dedup_by_file_locator_and_values() {
        let deltas = vec![
            delta("a", "f.yml", "k", json!(1), json!(2)),
            delta("b", "f.yml", "k", json!(1), json!(2)),
            delta("c", "f.yml", "k", json!(1), json!(3)),
        ];
        let out = deduplicate(&deltas);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "a");
        assert_eq!(out[1].id, "c");
    }

    #[test]
    fn oversized_file_groups_split_into_batches() {
        let deltas: Vec<Delta> = (0..23)
            .map(|i| delta(&format!("d{i}"), "big.yml", &format!("k{i}"), json!(1), json!(2)))
            .collect();
        let batches = build_batches(deltas);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].0, "big.yml_batch_1");
        assert_eq!(batches[0].1.len(), 10);
        assert_eq!(batches[2].1.len(), 3);
    }

    #[test]
    fn small_groups_keep_their_file_name() {
        let deltas = vec![
            delta("a", "one.yml", "k", json!(1), json!(2)),
            delta("b", "two.yml", "k", json!(1), json!(2)),
        ];
        let batches = build_batches(deltas);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, "one.yml");
    }
}
