//! `Store` - the single shared mutable resource of the pipeline.
//!
//! Every method opens its own WAL connection and runs under the lock-retry
//! policy, so concurrent runs and the fleet sync can write safely. Artefact
//! payloads go in as `serde_json::Value`; within one run the store provides
//! read-your-writes, which the pipeline relies on between stages.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::connection::{open_connection, with_retry};
use crate::errors::StoreResult;
use crate::queries::{artifacts, registry, runs};
use crate::schema::init_schema;
use crate::types::{
    BranchRecord, BundleCounts, CertificationSummary, PolicyCounts, ServiceRecord, TriageCounts,
    ValidationRun,
};

/// Handle to the SQLite-backed store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    /// Opens (and initialises) the store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_connection(&db_path)?;
        init_schema(&conn)?;
        debug!(path = %db_path.display(), "store opened");
        Ok(Self { db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /* ---------------- validation runs ---------------- */

    pub fn create_run(
        &self,
        run_id: &str,
        service_name: &str,
        environment: &str,
        repo_url: Option<&str>,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            runs::create_run(conn, run_id, service_name, environment, repo_url, None, None)
        })
    }

    pub fn update_run_status(
        &self,
        run_id: &str,
        status: &str,
        verdict: Option<&str>,
        summary: Option<&str>,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            runs::update_run_status(conn, run_id, status, verdict, summary)
        })
    }

    pub fn update_run_branches(
        &self,
        run_id: &str,
        golden_branch: Option<&str>,
        drift_branch: Option<&str>,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            runs::update_run_branches(conn, run_id, golden_branch, drift_branch)
        })
    }

    pub fn get_run(&self, run_id: &str) -> StoreResult<Option<ValidationRun>> {
        with_retry(&self.db_path, |conn| runs::get_run(conn, run_id))
    }

    /* ---------------- stage artefacts ---------------- */

    pub fn save_context_bundle(
        &self,
        run_id: &str,
        bundle_id: &str,
        golden_branch: Option<&str>,
        drift_branch: Option<&str>,
        counts: BundleCounts,
        bundle: &Value,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::save_context_bundle(
                conn,
                run_id,
                bundle_id,
                golden_branch,
                drift_branch,
                counts,
                bundle,
            )
        })
    }

    /// Replaces the persisted bundle's delta list in place; the next stage
    /// reads only the replacement.
    pub fn update_context_bundle_deltas(&self, run_id: &str, deltas: &Value) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::update_context_bundle_deltas(conn, run_id, deltas)
        })
    }

    pub fn get_latest_context_bundle(&self, run_id: &str) -> StoreResult<Option<Value>> {
        with_retry(&self.db_path, |conn| {
            artifacts::get_latest_context_bundle(conn, run_id)
        })
    }

    pub fn save_llm_output(
        &self,
        run_id: &str,
        counts: TriageCounts,
        output: &Value,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::save_llm_output(conn, run_id, counts, output)
        })
    }

    pub fn get_latest_llm_output(&self, run_id: &str) -> StoreResult<Option<Value>> {
        with_retry(&self.db_path, |conn| {
            artifacts::get_latest_llm_output(conn, run_id)
        })
    }

    pub fn save_policy_validation(
        &self,
        run_id: &str,
        counts: PolicyCounts,
        validation: &Value,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::save_policy_validation(conn, run_id, counts, validation)
        })
    }

    pub fn get_latest_policy_validation(&self, run_id: &str) -> StoreResult<Option<Value>> {
        with_retry(&self.db_path, |conn| {
            artifacts::get_latest_policy_validation(conn, run_id)
        })
    }

    pub fn save_certification(
        &self,
        run_id: &str,
        summary: &CertificationSummary,
        certification: &Value,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::save_certification(conn, run_id, summary, certification)
        })
    }

    pub fn get_latest_certification(&self, run_id: &str) -> StoreResult<Option<Value>> {
        with_retry(&self.db_path, |conn| {
            artifacts::get_latest_certification(conn, run_id)
        })
    }

    pub fn save_report(&self, run_id: &str, report_type: &str, content: &str) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::save_report(conn, run_id, report_type, content)
        })
    }

    /// Marks the latest certification of a run as accepted by recording the
    /// snapshot branch cut from it.
    pub fn set_certified_snapshot_branch(&self, run_id: &str, branch: &str) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::set_certified_snapshot_branch(conn, run_id, branch)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn save_aggregated_result(
        &self,
        run_id: &str,
        service_name: &str,
        environment: &str,
        overall_status: &str,
        files_analyzed: i64,
        total_deltas: i64,
        policy_violations: i64,
        confidence_score: i64,
        final_decision: &str,
        aggregated: &Value,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            artifacts::save_aggregated_result(
                conn,
                run_id,
                service_name,
                environment,
                overall_status,
                files_analyzed,
                total_deltas,
                policy_violations,
                confidence_score,
                final_decision,
                aggregated,
            )
        })
    }

    pub fn get_aggregated_result(&self, run_id: &str) -> StoreResult<Option<Value>> {
        with_retry(&self.db_path, |conn| {
            artifacts::get_aggregated_result(conn, run_id)
        })
    }

    /* ---------------- service registry ---------------- */

    pub fn upsert_service(&self, svc: &ServiceRecord) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| registry::upsert_service(conn, svc))
    }

    pub fn get_service(&self, service_id: &str) -> StoreResult<Option<ServiceRecord>> {
        with_retry(&self.db_path, |conn| registry::get_service(conn, service_id))
    }

    pub fn list_services(&self, active_only: bool) -> StoreResult<Vec<ServiceRecord>> {
        with_retry(&self.db_path, |conn| registry::list_services(conn, active_only))
    }

    pub fn count_services(&self) -> StoreResult<i64> {
        with_retry(&self.db_path, |conn| registry::count_services(conn))
    }

    pub fn set_service_active(&self, service_id: &str, active: bool) -> StoreResult<bool> {
        with_retry(&self.db_path, |conn| {
            registry::set_service_active(conn, service_id, active)
        })
    }

    /* ---------------- golden-branch registry ---------------- */

    pub fn record_golden_branch(
        &self,
        service_name: &str,
        environment: &str,
        branch_name: &str,
        certification_score: Option<i64>,
        metadata: Option<&Value>,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            registry::record_golden_branch(
                conn,
                service_name,
                environment,
                branch_name,
                certification_score,
                metadata,
            )
        })
    }

    pub fn record_drift_branch(
        &self,
        service_name: &str,
        environment: &str,
        branch_name: &str,
        metadata: Option<&Value>,
    ) -> StoreResult<()> {
        with_retry(&self.db_path, |conn| {
            registry::record_drift_branch(conn, service_name, environment, branch_name, metadata)
        })
    }

    pub fn active_golden_branch(
        &self,
        service_name: &str,
        environment: &str,
    ) -> StoreResult<Option<String>> {
        with_retry(&self.db_path, |conn| {
            registry::active_golden_branch(conn, service_name, environment)
        })
    }

    pub fn latest_drift_branch(
        &self,
        service_name: &str,
        environment: &str,
    ) -> StoreResult<Option<String>> {
        with_retry(&self.db_path, |conn| {
            registry::latest_drift_branch(conn, service_name, environment)
        })
    }

    pub fn has_golden_branches(&self, service_name: &str) -> StoreResult<bool> {
        with_retry(&self.db_path, |conn| {
            registry::has_golden_branches(conn, service_name)
        })
    }

    pub fn list_branches(
        &self,
        service_name: &str,
        environment: &str,
    ) -> StoreResult<Vec<BranchRecord>> {
        with_retry(&self.db_path, |conn| {
            registry::list_branches(conn, service_name, environment)
        })
    }

    pub fn deactivate_branch(
        &self,
        service_name: &str,
        environment: &str,
        branch_name: &str,
    ) -> StoreResult<bool> {
        with_retry(&self.db_path, |conn| {
            registry::deactivate_branch(conn, service_name, environment, branch_name)
        })
    }
}
