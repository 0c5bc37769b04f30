//! Validation-run rows.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{StoreError, StoreResult};
use crate::types::ValidationRun;

pub fn create_run(
    conn: &Connection,
    run_id: &str,
    service_name: &str,
    environment: &str,
    repo_url: Option<&str>,
    golden_branch: Option<&str>,
    drift_branch: Option<&str>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO validation_runs
             (run_id, service_name, environment, status, repo_url, golden_branch, drift_branch)
         VALUES (?1, ?2, ?3, 'running', ?4, ?5, ?6)",
        params![run_id, service_name, environment, repo_url, golden_branch, drift_branch],
    )?;
    Ok(())
}

pub fn update_run_status(
    conn: &Connection,
    run_id: &str,
    status: &str,
    verdict: Option<&str>,
    summary: Option<&str>,
) -> StoreResult<()> {
    let updated = conn.execute(
        "UPDATE validation_runs
         SET status = ?2,
             verdict = COALESCE(?3, verdict),
             summary = COALESCE(?4, summary),
             completed_at = CASE WHEN ?2 IN ('success', 'failure', 'cancelled')
                                 THEN CURRENT_TIMESTAMP ELSE completed_at END
         WHERE run_id = ?1",
        params![run_id, status, verdict, summary],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound {
            what: "validation run",
            key: run_id.to_string(),
        });
    }
    Ok(())
}

pub fn update_run_branches(
    conn: &Connection,
    run_id: &str,
    golden_branch: Option<&str>,
    drift_branch: Option<&str>,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE validation_runs
         SET golden_branch = COALESCE(?2, golden_branch),
             drift_branch = COALESCE(?3, drift_branch)
         WHERE run_id = ?1",
        params![run_id, golden_branch, drift_branch],
    )?;
    Ok(())
}

pub fn get_run(conn: &Connection, run_id: &str) -> StoreResult<Option<ValidationRun>> {
    conn.query_row(
        "SELECT run_id, service_name, environment, status, created_at, completed_at,
                verdict, summary, repo_url, golden_branch, drift_branch
         FROM validation_runs WHERE run_id = ?1",
        params![run_id],
        |row| {
            Ok(ValidationRun {
                run_id: row.get(0)?,
                service_name: row.get(1)?,
                environment: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
                completed_at: row.get(5)?,
                verdict: row.get(6)?,
                summary: row.get(7)?,
                repo_url: row.get(8)?,
                golden_branch: row.get(9)?,
                drift_branch: row.get(10)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}
