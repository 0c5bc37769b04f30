//! Markdown run report, persisted alongside the certification.

use certification::Certification;
use triage::LlmOutput;

pub fn render(
    run_id: &str,
    service_id: &str,
    environment: &str,
    certification: &Certification,
    llm_output: &LlmOutput,
) -> String {
    let decision = serde_json::to_value(certification.decision)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", certification.decision));

    let mut out = String::new();
    out.push_str(&format!("# Drift Validation Report - {service_id} ({environment})\n\n"));
    out.push_str(&format!("- **Run**: `{run_id}`\n"));
    out.push_str(&format!(
        "- **Decision**: {decision} (confidence {}/100, {:?})\n",
        certification.confidence_score, certification.confidence_level
    ));
    out.push_str(&format!(
        "- **Drift**: {} deltas across {} of {} config files\n",
        llm_output.summary.total_drifts,
        llm_output.summary.files_with_drift,
        llm_output.summary.total_config_files
    ));
    out.push_str(&format!(
        "- **Risk**: {} high / {} medium / {} low / {} allowed\n",
        llm_output.summary.high_risk,
        llm_output.summary.medium_risk,
        llm_output.summary.low_risk,
        llm_output.summary.allowed_variance
    ));
    if !certification.policy_violations.is_empty() {
        out.push_str(&format!(
            "- **Policy violations**: {}\n",
            certification.policy_violations.len()
        ));
        for v in &certification.policy_violations {
            out.push_str(&format!(
                "  - `{}` - {} ({:?}): {}\n",
                v.delta_id, v.rule, v.severity, v.reason
            ));
        }
    }
    out.push('\n');
    out.push_str(&format!("{}\n", certification.explanation));

    if !llm_output.high.is_empty() {
        out.push_str("\n## High-risk items\n\n");
        for item in &llm_output.high {
            out.push_str(&format!("- `{}` ({}): {}\n", item.id, item.file, item.why));
        }
    }

    out
}
