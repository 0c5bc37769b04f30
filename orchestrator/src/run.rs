//! The validation-run driver.
//!
//! For a requested (service, environment) the orchestrator drives the
//! stages strictly in order - snapshot → drift → guardrail → triage →
//! certify - persisting each stage's output before the next starts. Stages
//! downstream of drift read their input from the store, never from process
//! memory, so the guardrail stage's in-place delta redaction is what triage
//! actually sees.
//!
//! No stage is restarted implicitly: the first failure marks the run
//! `failure` with the error captured and leaves prior artefacts in place.

use std::path::PathBuf;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use certification::Certification;
use config_store::{
    BundleCounts, CertificationSummary, PolicyCounts, ServiceRecord, TriageCounts,
};
use drift_engine::Delta;
use git_ops::{create_orphan_config_branch, generate_branch_name, materialize_filtered_tree};
use guardrails::PolicyValidation;
use triage::LlmOutput;

use crate::context::RunContext;
use crate::errors::{StageError, StageErrorKind, git_err, storage_err};
use crate::report;

/// Result of a completed validation run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub certification: Certification,
}

/// Runs the full validation pipeline for one (service, environment).
pub async fn run_validation(
    ctx: &RunContext,
    service_id: &str,
    environment: &str,
) -> Result<RunOutcome, StageError> {
    let t0 = Instant::now();
    let service = resolve_service(ctx, service_id, environment)?;

    let run_id = format!("run_{}", Uuid::new_v4().simple());
    ctx.store
        .create_run(&run_id, service_id, environment, Some(&service.repo_url))
        .map_err(storage_err("snapshot"))?;
    info!(run_id, service_id, environment, "validation run started");

    match drive_stages(ctx, &run_id, &service, environment).await {
        Ok(certification) => {
            let verdict = decision_str(&certification);
            ctx.store
                .update_run_status(&run_id, "success", Some(&verdict), None)
                .map_err(storage_err("certify"))?;
            info!(
                run_id,
                verdict,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "validation run complete"
            );
            Ok(RunOutcome {
                run_id,
                certification,
            })
        }
        Err(e) => {
            let status = if e.kind == StageErrorKind::Cancelled {
                "cancelled"
            } else {
                "failure"
            };
            if let Err(store_err) =
                ctx.store
                    .update_run_status(&run_id, status, None, Some(&e.to_string()))
            {
                warn!(run_id, error = %store_err, "failed to record run failure");
            }
            Err(e)
        }
    }
}

fn resolve_service(
    ctx: &RunContext,
    service_id: &str,
    environment: &str,
) -> Result<ServiceRecord, StageError> {
    let service = ctx
        .store
        .get_service(service_id)
        .map_err(storage_err("snapshot"))?
        .ok_or_else(|| StageError::input("snapshot", format!("unknown service: {service_id}")))?;
    if !service.is_active {
        return Err(StageError::input(
            "snapshot",
            format!("service is inactive: {service_id}"),
        ));
    }
    if !service.environments.iter().any(|e| e == environment) {
        return Err(StageError::input(
            "snapshot",
            format!("service {service_id} has no environment {environment}"),
        ));
    }
    Ok(service)
}

async fn drive_stages(
    ctx: &RunContext,
    run_id: &str,
    service: &ServiceRecord,
    environment: &str,
) -> Result<Certification, StageError> {
    // ---------------------------
    // Stage 1: snapshot branches
    // ---------------------------
    check_cancel(ctx, "snapshot")?;
    let t1 = Instant::now();
    let golden_branch = ensure_golden_branch(ctx, service, environment).await?;
    let drift_branch = create_drift_branch(ctx, service, environment).await?;
    ctx.store
        .update_run_branches(run_id, Some(&golden_branch), Some(&drift_branch))
        .map_err(storage_err("snapshot"))?;
    debug!(
        run_id,
        golden = %golden_branch,
        drift = %drift_branch,
        "snapshot stage done ({} ms)",
        t1.elapsed().as_millis()
    );

    // ---------------------------
    // Stage 2: drift analysis
    // ---------------------------
    check_cancel(ctx, "drift")?;
    let t2 = Instant::now();
    let (golden_ws, _) = materialize(ctx, service, &golden_branch, environment, "drift").await?;
    let (drift_ws, _) = materialize(ctx, service, &drift_branch, environment, "drift").await?;

    let policies = ctx.policies.clone();
    let golden_root: PathBuf = golden_ws.path().to_path_buf();
    let drift_root: PathBuf = drift_ws.path().to_path_buf();
    let env_owned = environment.to_string();
    let bundle = tokio::task::spawn_blocking(move || {
        drift_engine::analyze(&golden_root, &drift_root, &policies, &env_owned)
    })
    .await
    .map_err(|e| StageError::new("drift", StageErrorKind::Fatal, e.to_string()))?
    .map_err(|e| StageError::new("drift", StageErrorKind::Analysis, e.to_string()))?;
    drop(golden_ws);
    drop(drift_ws);

    let bundle_id = format!("bundle_{}", Uuid::new_v4().simple());
    let counts = BundleCounts {
        total_files: bundle.overview.total_files as i64,
        files_with_drift: bundle.overview.drifted_files as i64,
        total_deltas: bundle.deltas.len() as i64,
    };
    let bundle_value =
        serde_json::to_value(&bundle).map_err(|e| StageError::new("drift", StageErrorKind::Fatal, e.to_string()))?;
    ctx.store
        .save_context_bundle(
            run_id,
            &bundle_id,
            Some(&golden_branch),
            Some(&drift_branch),
            counts,
            &bundle_value,
        )
        .map_err(storage_err("drift"))?;
    debug!(
        run_id,
        deltas = bundle.deltas.len(),
        "drift stage done ({} ms)",
        t2.elapsed().as_millis()
    );

    // ---------------------------
    // Stage 3: guardrails
    // ---------------------------
    check_cancel(ctx, "guardrail")?;
    let t3 = Instant::now();
    let deltas = load_bundle_deltas(ctx, run_id, "guardrail")?;
    let validation = guardrails::run_guardrails(deltas, &ctx.policies, environment);

    let policy_counts = PolicyCounts {
        pii_findings: validation.pii_redaction_report.instances_found as i64,
        intent_violations: validation.intent_guard_report.total_findings as i64,
        policy_violations: validation.policy_summary.total_violations as i64,
    };
    let validation_value = serde_json::to_value(&validation)
        .map_err(|e| StageError::new("guardrail", StageErrorKind::Fatal, e.to_string()))?;
    ctx.store
        .save_policy_validation(run_id, policy_counts, &validation_value)
        .map_err(storage_err("guardrail"))?;

    // In-place replacement: triage must only ever see sanitised deltas.
    let redacted = serde_json::to_value(&validation.validated_deltas)
        .map_err(|e| StageError::new("guardrail", StageErrorKind::Fatal, e.to_string()))?;
    ctx.store
        .update_context_bundle_deltas(run_id, &redacted)
        .map_err(storage_err("guardrail"))?;
    debug!(run_id, "guardrail stage done ({} ms)", t3.elapsed().as_millis());

    // ---------------------------
    // Stage 4: triage
    // ---------------------------
    check_cancel(ctx, "triage")?;
    let t4 = Instant::now();
    let stored_bundle = ctx
        .store
        .get_latest_context_bundle(run_id)
        .map_err(storage_err("triage"))?
        .ok_or_else(|| {
            StageError::new("triage", StageErrorKind::NotFound, "context bundle missing")
        })?;
    let redacted_deltas: Vec<Delta> = serde_json::from_value(
        stored_bundle.get("deltas").cloned().unwrap_or(Value::Array(vec![])),
    )
    .map_err(|e| StageError::new("triage", StageErrorKind::Fatal, e.to_string()))?;
    let total_config_files = stored_bundle
        .pointer("/overview/total_files")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;

    let llm_output = tokio::select! {
        _ = ctx.cancelled() => return Err(StageError::cancelled("triage")),
        out = triage::run_triage(&ctx.llm, &redacted_deltas, total_config_files, environment) => out,
    };

    let triage_counts = TriageCounts {
        total_files: llm_output.summary.total_config_files as i64,
        drifted_files: llm_output.summary.files_with_drift as i64,
        total_deltas: llm_output.summary.total_drifts as i64,
        high_risk: llm_output.summary.high_risk as i64,
        medium_risk: llm_output.summary.medium_risk as i64,
        low_risk: llm_output.summary.low_risk as i64,
        allowed: llm_output.summary.allowed_variance as i64,
    };
    let llm_value = serde_json::to_value(&llm_output)
        .map_err(|e| StageError::new("triage", StageErrorKind::Fatal, e.to_string()))?;
    ctx.store
        .save_llm_output(run_id, triage_counts, &llm_value)
        .map_err(storage_err("triage"))?;
    debug!(run_id, "triage stage done ({} ms)", t4.elapsed().as_millis());

    // ---------------------------
    // Stage 5: certification
    // ---------------------------
    check_cancel(ctx, "certify")?;
    let t5 = Instant::now();
    let validation: PolicyValidation = load_artifact(
        ctx.store.get_latest_policy_validation(run_id),
        "certify",
        "policy validation",
    )?;
    let llm_output: LlmOutput = load_artifact(
        ctx.store.get_latest_llm_output(run_id),
        "certify",
        "llm output",
    )?;

    let certification = certification::certify(&validation, &llm_output, environment, None, None);
    let summary = CertificationSummary {
        confidence_score: certification.confidence_score as i64,
        decision: decision_str(&certification),
        environment: environment.to_string(),
        violations_count: certification.policy_violations.len() as i64,
        high_risk_count: certification.risk_counts.high as i64,
        certified_snapshot_branch: certification.certified_snapshot_branch.clone(),
    };
    let cert_value = serde_json::to_value(&certification)
        .map_err(|e| StageError::new("certify", StageErrorKind::Fatal, e.to_string()))?;
    ctx.store
        .save_certification(run_id, &summary, &cert_value)
        .map_err(storage_err("certify"))?;

    let markdown = report::render(
        run_id,
        &service.service_id,
        environment,
        &certification,
        &llm_output,
    );
    ctx.store
        .save_report(run_id, "validation", &markdown)
        .map_err(storage_err("certify"))?;

    let aggregated = serde_json::json!({
        "summary": llm_output.summary,
        "decision": decision_str(&certification),
        "confidence_score": certification.confidence_score,
        "policy_violations": certification.policy_violations.len(),
        "pii_redacted": validation.pii_redaction_report.redacted,
        "intent_safe": validation.intent_guard_report.safe,
    });
    ctx.store
        .save_aggregated_result(
            run_id,
            &service.service_id,
            environment,
            "completed",
            llm_output.summary.total_config_files as i64,
            llm_output.summary.total_drifts as i64,
            certification.policy_violations.len() as i64,
            certification.confidence_score as i64,
            &decision_str(&certification),
            &aggregated,
        )
        .map_err(storage_err("certify"))?;
    debug!(run_id, "certify stage done ({} ms)", t5.elapsed().as_millis());

    Ok(certification)
}

/// Reuses the active golden branch or materialises a fresh env-filtered one.
async fn ensure_golden_branch(
    ctx: &RunContext,
    service: &ServiceRecord,
    environment: &str,
) -> Result<String, StageError> {
    if let Some(existing) = ctx
        .store
        .active_golden_branch(&service.service_id, environment)
        .map_err(storage_err("snapshot"))?
    {
        debug!(branch = %existing, "reusing active golden branch");
        return Ok(existing);
    }

    info!(
        service = %service.service_id,
        environment,
        "no active golden branch, creating one"
    );
    let branch_name = generate_branch_name("golden", environment);
    let repo_url = service.repo_url.clone();
    let main_branch = service.main_branch.clone();
    let config_paths = service.config_paths.clone();
    let env_owned = environment.to_string();
    let creds = ctx.git.clone();
    let name = branch_name.clone();
    tokio::task::spawn_blocking(move || {
        create_orphan_config_branch(
            &repo_url,
            &main_branch,
            &name,
            &config_paths,
            Some(&env_owned),
            &creds,
        )
    })
    .await
    .map_err(|e| StageError::new("snapshot", StageErrorKind::Fatal, e.to_string()))?
    .map_err(git_err("snapshot"))?;

    ctx.store
        .record_golden_branch(&service.service_id, environment, &branch_name, None, None)
        .map_err(storage_err("snapshot"))?;
    Ok(branch_name)
}

/// Creates the drift snapshot branch: a complete (unfiltered) config
/// snapshot of the current main.
async fn create_drift_branch(
    ctx: &RunContext,
    service: &ServiceRecord,
    environment: &str,
) -> Result<String, StageError> {
    let branch_name = generate_branch_name("drift", environment);
    let repo_url = service.repo_url.clone();
    let main_branch = service.main_branch.clone();
    let config_paths = service.config_paths.clone();
    let creds = ctx.git.clone();
    let name = branch_name.clone();
    tokio::task::spawn_blocking(move || {
        create_orphan_config_branch(&repo_url, &main_branch, &name, &config_paths, None, &creds)
    })
    .await
    .map_err(|e| StageError::new("snapshot", StageErrorKind::Fatal, e.to_string()))?
    .map_err(git_err("snapshot"))?;

    ctx.store
        .record_drift_branch(&service.service_id, environment, &branch_name, None)
        .map_err(storage_err("snapshot"))?;
    Ok(branch_name)
}

/// Materialises an env-filtered tree of a branch into a temp workspace.
async fn materialize(
    ctx: &RunContext,
    service: &ServiceRecord,
    branch: &str,
    environment: &str,
    stage: &'static str,
) -> Result<(git_ops::GitWorkspace, Vec<String>), StageError> {
    let repo_url = service.repo_url.clone();
    let branch = branch.to_string();
    let config_paths = service.config_paths.clone();
    let env_owned = environment.to_string();
    let creds = ctx.git.clone();
    tokio::task::spawn_blocking(move || {
        materialize_filtered_tree(&repo_url, &branch, &config_paths, Some(&env_owned), &creds)
    })
    .await
    .map_err(|e| StageError::new(stage, StageErrorKind::Fatal, e.to_string()))?
    .map_err(git_err(stage))
}

fn load_bundle_deltas(
    ctx: &RunContext,
    run_id: &str,
    stage: &'static str,
) -> Result<Vec<Delta>, StageError> {
    let bundle = ctx
        .store
        .get_latest_context_bundle(run_id)
        .map_err(storage_err(stage))?
        .ok_or_else(|| StageError::new(stage, StageErrorKind::NotFound, "context bundle missing"))?;
    serde_json::from_value(bundle.get("deltas").cloned().unwrap_or(Value::Array(vec![])))
        .map_err(|e| StageError::new(stage, StageErrorKind::Fatal, e.to_string()))
}

fn load_artifact<T: serde::de::DeserializeOwned>(
    loaded: Result<Option<Value>, config_store::StoreError>,
    stage: &'static str,
    what: &'static str,
) -> Result<T, StageError> {
    let value = loaded
        .map_err(storage_err(stage))?
        .ok_or_else(|| StageError::new(stage, StageErrorKind::NotFound, format!("{what} missing")))?;
    serde_json::from_value(value)
        .map_err(|e| StageError::new(stage, StageErrorKind::Fatal, format!("{what}: {e}")))
}

fn check_cancel(ctx: &RunContext, stage: &'static str) -> Result<(), StageError> {
    if ctx.is_cancelled() {
        Err(StageError::cancelled(stage))
    } else {
        Ok(())
    }
}

fn decision_str(certification: &Certification) -> String {
    serde_json::to_value(certification.decision)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", certification.decision))
}
