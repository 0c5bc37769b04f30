//! Acceptance of a certification: cutting the certified snapshot branch.
//!
//! The pipeline itself never merges anything. When an operator accepts a
//! run's certification (for AUTO_MERGE or after human review), this flow
//! builds the new golden branch - the old golden tree with the approved
//! files overlaid from the drift branch - registers it as the active
//! baseline, and records the snapshot branch on the certification. This is
//! the only place `certified_snapshot_branch` is ever set.

use serde_json::json;
use tracing::info;

use certification::{Certification, Decision};
use git_ops::{create_selective_golden_branch, generate_branch_name};

use crate::context::RunContext;
use crate::errors::{StageError, StageErrorKind, git_err, storage_err};

const STAGE: &str = "accept";

/// Cuts and registers the certified snapshot branch for an accepted run.
///
/// `approved_files` lists the drift-side files the review accepted; files
/// not listed keep their golden content. Returns the new branch name.
///
/// # Errors
/// - [`StageErrorKind::Input`] for unknown runs or blocked certifications
/// - [`StageErrorKind::NotFound`] when the run has no certification or
///   branches recorded
pub async fn accept_certification(
    ctx: &RunContext,
    run_id: &str,
    approved_files: &[String],
) -> Result<String, StageError> {
    let run = ctx
        .store
        .get_run(run_id)
        .map_err(storage_err(STAGE))?
        .ok_or_else(|| StageError::input(STAGE, format!("unknown run: {run_id}")))?;

    let cert_value = ctx
        .store
        .get_latest_certification(run_id)
        .map_err(storage_err(STAGE))?
        .ok_or_else(|| {
            StageError::new(STAGE, StageErrorKind::NotFound, "run has no certification")
        })?;
    let certification: Certification = serde_json::from_value(cert_value)
        .map_err(|e| StageError::new(STAGE, StageErrorKind::Fatal, e.to_string()))?;

    if certification.decision == Decision::BlockMerge {
        return Err(StageError::input(
            STAGE,
            "a blocked certification cannot be accepted",
        ));
    }

    let service = ctx
        .store
        .get_service(&run.service_name)
        .map_err(storage_err(STAGE))?
        .ok_or_else(|| StageError::input(STAGE, format!("unknown service: {}", run.service_name)))?;

    let golden_branch = run.golden_branch.clone().ok_or_else(|| {
        StageError::new(STAGE, StageErrorKind::NotFound, "run has no golden branch")
    })?;
    let drift_branch = run.drift_branch.clone().ok_or_else(|| {
        StageError::new(STAGE, StageErrorKind::NotFound, "run has no drift branch")
    })?;

    let new_branch = generate_branch_name("golden", &run.environment);
    let repo_url = service.repo_url.clone();
    let approved = approved_files.to_vec();
    let creds = ctx.git.clone();
    let name = new_branch.clone();
    let old_golden = golden_branch.clone();
    let drift = drift_branch.clone();
    let copied = tokio::task::spawn_blocking(move || {
        create_selective_golden_branch(&repo_url, &old_golden, &drift, &name, &approved, &creds)
    })
    .await
    .map_err(|e| StageError::new(STAGE, StageErrorKind::Fatal, e.to_string()))?
    .map_err(git_err(STAGE))?;

    let metadata = json!({
        "type": "certified_snapshot",
        "certified_from_run": run_id,
        "base": golden_branch,
        "drift": drift_branch,
        "accepted_files": copied,
    });
    ctx.store
        .record_golden_branch(
            &run.service_name,
            &run.environment,
            &new_branch,
            Some(certification.confidence_score as i64),
            Some(&metadata),
        )
        .map_err(storage_err(STAGE))?;
    ctx.store
        .set_certified_snapshot_branch(run_id, &new_branch)
        .map_err(storage_err(STAGE))?;

    info!(
        run_id,
        branch = %new_branch,
        accepted_files = copied,
        "certification accepted, snapshot branch cut"
    );
    Ok(new_branch)
}
