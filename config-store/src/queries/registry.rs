//! Service and golden-branch registries.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::info;

use crate::errors::StoreResult;
use crate::types::{BranchRecord, ServiceRecord};

/* ----------------------- services ----------------------- */

pub fn upsert_service(conn: &Connection, svc: &ServiceRecord) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO services
             (service_id, service_name, repo_url, main_branch, environments,
              config_paths, group_name, group_url, is_active, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(service_id) DO UPDATE SET
             service_name = excluded.service_name,
             repo_url = excluded.repo_url,
             main_branch = excluded.main_branch,
             environments = excluded.environments,
             config_paths = excluded.config_paths,
             group_name = excluded.group_name,
             group_url = excluded.group_url,
             is_active = excluded.is_active,
             description = excluded.description,
             updated_at = CURRENT_TIMESTAMP",
        params![
            svc.service_id,
            svc.service_name,
            svc.repo_url,
            svc.main_branch,
            serde_json::to_string(&svc.environments)?,
            serde_json::to_string(&svc.config_paths)?,
            svc.group_name,
            svc.group_url,
            svc.is_active,
            svc.description,
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, service_id: &str) -> StoreResult<Option<ServiceRecord>> {
    let row = conn
        .query_row(
            "SELECT service_id, service_name, repo_url, main_branch, environments,
                    config_paths, group_name, group_url, is_active, description
             FROM services WHERE service_id = ?1",
            params![service_id],
            service_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn list_services(conn: &Connection, active_only: bool) -> StoreResult<Vec<ServiceRecord>> {
    let sql = if active_only {
        "SELECT service_id, service_name, repo_url, main_branch, environments,
                config_paths, group_name, group_url, is_active, description
         FROM services WHERE is_active = 1 ORDER BY service_id"
    } else {
        "SELECT service_id, service_name, repo_url, main_branch, environments,
                config_paths, group_name, group_url, is_active, description
         FROM services ORDER BY service_id"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], service_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn count_services(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?)
}

pub fn set_service_active(conn: &Connection, service_id: &str, active: bool) -> StoreResult<bool> {
    let n = conn.execute(
        "UPDATE services SET is_active = ?2, updated_at = CURRENT_TIMESTAMP
         WHERE service_id = ?1",
        params![service_id, active],
    )?;
    Ok(n > 0)
}

fn service_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServiceRecord> {
    let environments: String = row.get(4)?;
    let config_paths: Option<String> = row.get(5)?;
    Ok(ServiceRecord {
        service_id: row.get(0)?,
        service_name: row.get(1)?,
        repo_url: row.get(2)?,
        main_branch: row.get(3)?,
        environments: serde_json::from_str(&environments).unwrap_or_default(),
        config_paths: config_paths
            .map(|s| serde_json::from_str(&s).unwrap_or_default())
            .unwrap_or_default(),
        group_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        group_url: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        is_active: row.get(8)?,
        description: row.get(9)?,
    })
}

/* ----------------------- golden branches ----------------------- */

/// Records a new active golden branch.
///
/// Deactivating every previous golden record for the pair and inserting the
/// new active one is a single transaction, so readers always observe exactly
/// one active golden per (service, environment).
pub fn record_golden_branch(
    conn: &mut Connection,
    service_name: &str,
    environment: &str,
    branch_name: &str,
    certification_score: Option<i64>,
    metadata: Option<&Value>,
) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE golden_branches SET is_active = 0
         WHERE service_name = ?1 AND environment = ?2 AND branch_type = 'golden'",
        params![service_name, environment],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO golden_branches
             (service_name, environment, branch_name, branch_type, is_active,
              certification_score, metadata)
         VALUES (?1, ?2, ?3, 'golden', 1, ?4, ?5)",
        params![
            service_name,
            environment,
            branch_name,
            certification_score,
            metadata.map(|m| m.to_string()),
        ],
    )?;
    tx.commit()?;
    info!(service_name, environment, branch_name, "golden branch recorded");
    Ok(())
}

/// Records a drift snapshot branch (non-exclusive; many may be active).
pub fn record_drift_branch(
    conn: &Connection,
    service_name: &str,
    environment: &str,
    branch_name: &str,
    metadata: Option<&Value>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO golden_branches
             (service_name, environment, branch_name, branch_type, is_active, metadata)
         VALUES (?1, ?2, ?3, 'drift', 1, ?4)",
        params![service_name, environment, branch_name, metadata.map(|m| m.to_string())],
    )?;
    Ok(())
}

pub fn active_golden_branch(
    conn: &Connection,
    service_name: &str,
    environment: &str,
) -> StoreResult<Option<String>> {
    conn.query_row(
        "SELECT branch_name FROM golden_branches
         WHERE service_name = ?1 AND environment = ?2
           AND branch_type = 'golden' AND is_active = 1
         ORDER BY created_at DESC LIMIT 1",
        params![service_name, environment],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn latest_drift_branch(
    conn: &Connection,
    service_name: &str,
    environment: &str,
) -> StoreResult<Option<String>> {
    conn.query_row(
        "SELECT branch_name FROM golden_branches
         WHERE service_name = ?1 AND environment = ?2
           AND branch_type = 'drift' AND is_active = 1
         ORDER BY created_at DESC LIMIT 1",
        params![service_name, environment],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn has_golden_branches(conn: &Connection, service_name: &str) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM golden_branches
         WHERE service_name = ?1 AND branch_type = 'golden' AND is_active = 1",
        params![service_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_branches(
    conn: &Connection,
    service_name: &str,
    environment: &str,
) -> StoreResult<Vec<BranchRecord>> {
    let mut stmt = conn.prepare(
        "SELECT service_name, environment, branch_name, branch_type, is_active,
                created_at, certification_score
         FROM golden_branches
         WHERE service_name = ?1 AND environment = ?2
         ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![service_name, environment], |row| {
        Ok(BranchRecord {
            service_name: row.get(0)?,
            environment: row.get(1)?,
            branch_name: row.get(2)?,
            branch_type: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
            certification_score: row.get(6)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn deactivate_branch(
    conn: &Connection,
    service_name: &str,
    environment: &str,
    branch_name: &str,
) -> StoreResult<bool> {
    let n = conn.execute(
        "UPDATE golden_branches SET is_active = 0
         WHERE service_name = ?1 AND environment = ?2 AND branch_name = ?3",
        params![service_name, environment, branch_name],
    )?;
    Ok(n > 0)
}
