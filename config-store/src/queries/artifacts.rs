//! Per-stage artefact rows: bundles, deltas, LLM outputs, policy
//! validations, certifications, reports.
//!
//! Payloads are JSON text; the columns next to them are the fields queried
//! without deserialising the whole artefact.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::errors::{StoreError, StoreResult};
use crate::types::{BundleCounts, CertificationSummary, PolicyCounts, TriageCounts};

/// Inserts the bundle payload and one `config_deltas` row per delta.
pub fn save_context_bundle(
    conn: &mut Connection,
    run_id: &str,
    bundle_id: &str,
    golden_branch: Option<&str>,
    drift_branch: Option<&str>,
    counts: BundleCounts,
    bundle: &Value,
) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO context_bundles
             (run_id, bundle_id, golden_branch, drift_branch,
              total_files, files_with_drift, total_deltas, bundle_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run_id,
            bundle_id,
            golden_branch,
            drift_branch,
            counts.total_files,
            counts.files_with_drift,
            counts.total_deltas,
            serde_json::to_string(bundle)?,
        ],
    )?;
    insert_delta_rows(&tx, run_id, bundle_id, bundle)?;
    tx.commit()?;
    Ok(())
}

/// Replaces the bundle's `deltas` array in place and refreshes the
/// per-delta rows. Used by the guardrail stage so triage reads only the
/// sanitised deltas.
pub fn update_context_bundle_deltas(
    conn: &mut Connection,
    run_id: &str,
    deltas: &Value,
) -> StoreResult<()> {
    let tx = conn.transaction()?;

    let row: Option<(String, String)> = tx
        .query_row(
            "SELECT bundle_id, bundle_data FROM context_bundles
             WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
            params![run_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (bundle_id, data) = row.ok_or_else(|| StoreError::NotFound {
        what: "context bundle",
        key: run_id.to_string(),
    })?;

    let mut bundle: Value = serde_json::from_str(&data)?;
    let total = deltas.as_array().map(|a| a.len() as i64).unwrap_or(0);
    bundle["deltas"] = deltas.clone();

    tx.execute(
        "UPDATE context_bundles SET bundle_data = ?2, total_deltas = ?3 WHERE bundle_id = ?1",
        params![bundle_id, serde_json::to_string(&bundle)?, total],
    )?;
    tx.execute(
        "DELETE FROM config_deltas WHERE bundle_id = ?1",
        params![bundle_id],
    )?;
    insert_delta_rows(&tx, run_id, &bundle_id, &bundle)?;

    tx.commit()?;
    Ok(())
}

pub fn get_latest_context_bundle(conn: &Connection, run_id: &str) -> StoreResult<Option<Value>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT bundle_data FROM context_bundles
             WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
            params![run_id],
            |row| row.get(0),
        )
        .optional()?;
    match data {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn save_llm_output(
    conn: &Connection,
    run_id: &str,
    counts: TriageCounts,
    output: &Value,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO llm_outputs
             (run_id, total_files, drifted_files, total_deltas,
              high_risk_count, medium_risk_count, low_risk_count, allowed_count, llm_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            run_id,
            counts.total_files,
            counts.drifted_files,
            counts.total_deltas,
            counts.high_risk,
            counts.medium_risk,
            counts.low_risk,
            counts.allowed,
            serde_json::to_string(output)?,
        ],
    )?;
    Ok(())
}

pub fn get_latest_llm_output(conn: &Connection, run_id: &str) -> StoreResult<Option<Value>> {
    latest_json(conn, "SELECT llm_data FROM llm_outputs WHERE run_id = ?1 ORDER BY id DESC LIMIT 1", run_id)
}

pub fn save_policy_validation(
    conn: &Connection,
    run_id: &str,
    counts: PolicyCounts,
    validation: &Value,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO policy_validations
             (run_id, pii_findings_count, intent_violations_count,
              policy_violations_count, validation_data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run_id,
            counts.pii_findings,
            counts.intent_violations,
            counts.policy_violations,
            serde_json::to_string(validation)?,
        ],
    )?;
    Ok(())
}

pub fn get_latest_policy_validation(conn: &Connection, run_id: &str) -> StoreResult<Option<Value>> {
    latest_json(
        conn,
        "SELECT validation_data FROM policy_validations WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
        run_id,
    )
}

pub fn save_certification(
    conn: &Connection,
    run_id: &str,
    summary: &CertificationSummary,
    certification: &Value,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO certifications
             (run_id, confidence_score, decision, environment, violations_count,
              high_risk_count, certified_snapshot_branch, certification_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run_id,
            summary.confidence_score,
            summary.decision,
            summary.environment,
            summary.violations_count,
            summary.high_risk_count,
            summary.certified_snapshot_branch,
            serde_json::to_string(certification)?,
        ],
    )?;
    Ok(())
}

pub fn get_latest_certification(conn: &Connection, run_id: &str) -> StoreResult<Option<Value>> {
    latest_json(
        conn,
        "SELECT certification_data FROM certifications WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
        run_id,
    )
}

pub fn save_report(
    conn: &Connection,
    run_id: &str,
    report_type: &str,
    content: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO reports (run_id, report_type, report_content) VALUES (?1, ?2, ?3)",
        params![run_id, report_type, content],
    )?;
    Ok(())
}

/// Sets the certified snapshot branch on the latest certification of a run,
/// both on the column and inside the JSON payload. Only called once a
/// certification has been accepted.
pub fn set_certified_snapshot_branch(
    conn: &mut Connection,
    run_id: &str,
    branch: &str,
) -> StoreResult<()> {
    let tx = conn.transaction()?;
    let row: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, certification_data FROM certifications
             WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
            params![run_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (id, data) = row.ok_or_else(|| StoreError::NotFound {
        what: "certification",
        key: run_id.to_string(),
    })?;

    let mut cert: Value = serde_json::from_str(&data)?;
    cert["certified_snapshot_branch"] = Value::String(branch.to_string());
    tx.execute(
        "UPDATE certifications SET certified_snapshot_branch = ?2, certification_data = ?3
         WHERE id = ?1",
        params![id, branch, serde_json::to_string(&cert)?],
    )?;
    tx.commit()?;
    Ok(())
}

/// Per-run aggregate row mirroring the final pipeline outcome.
pub fn save_aggregated_result(
    conn: &Connection,
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
    conn.execute(
        "INSERT OR REPLACE INTO aggregated_results
             (run_id, service_name, environment, overall_status, files_analyzed,
              total_deltas, policy_violations, confidence_score, final_decision, aggregated_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            run_id,
            service_name,
            environment,
            overall_status,
            files_analyzed,
            total_deltas,
            policy_violations,
            confidence_score,
            final_decision,
            serde_json::to_string(aggregated)?,
        ],
    )?;
    Ok(())
}

pub fn get_aggregated_result(conn: &Connection, run_id: &str) -> StoreResult<Option<Value>> {
    latest_json(
        conn,
        "SELECT aggregated_data FROM aggregated_results WHERE run_id = ?1",
        run_id,
    )
}

/* ----------------------- internals ----------------------- */

fn latest_json(conn: &Connection, sql: &str, run_id: &str) -> StoreResult<Option<Value>> {
    let data: Option<String> = conn
        .query_row(sql, params![run_id], |row| row.get(0))
        .optional()?;
    match data {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

fn insert_delta_rows(
    tx: &rusqlite::Transaction<'_>,
    run_id: &str,
    bundle_id: &str,
    bundle: &Value,
) -> StoreResult<()> {
    let Some(deltas) = bundle.get("deltas").and_then(Value::as_array) else {
        return Ok(());
    };

    let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO config_deltas
             (run_id, bundle_id, delta_id, file_path, locator_type, locator_value,
              old_value, new_value, drift_category, risk_level)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for delta in deltas {
        let text_of = |v: Option<&Value>| -> Option<String> {
            v.filter(|v| !v.is_null()).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        };
        stmt.execute(params![
            run_id,
            bundle_id,
            delta.get("id").and_then(Value::as_str).unwrap_or_default(),
            delta.get("file").and_then(Value::as_str).unwrap_or_default(),
            delta
                .get("locator")
                .and_then(|l| l.get("type"))
                .and_then(Value::as_str),
            delta
                .get("locator")
                .and_then(|l| l.get("value"))
                .and_then(Value::as_str),
            text_of(delta.get("old")),
            text_of(delta.get("new")),
            delta.get("category").and_then(Value::as_str),
            delta.get("risk_level").and_then(Value::as_str),
        ])?;
    }
    Ok(())
}
