//! Schema creation and migration.
//!
//! Every artefact table references `validation_runs.run_id`; JSON payloads
//! are stored as text columns next to the columns the UI and the sync engine
//! query directly.

use rusqlite::Connection;
use tracing::info;

use crate::errors::StoreResult;

/// Creates all tables and indexes if they do not exist yet.
pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS validation_runs (
            run_id TEXT PRIMARY KEY,
            service_name TEXT NOT NULL,
            environment TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            completed_at TIMESTAMP,
            execution_time_ms INTEGER,
            verdict TEXT,
            summary TEXT,
            repo_url TEXT,
            golden_branch TEXT,
            drift_branch TEXT
        );

        CREATE TABLE IF NOT EXISTS context_bundles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            bundle_id TEXT UNIQUE NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            golden_branch TEXT,
            drift_branch TEXT,
            total_files INTEGER,
            files_with_drift INTEGER,
            total_deltas INTEGER,
            bundle_data TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES validation_runs(run_id)
        );

        CREATE TABLE IF NOT EXISTS config_deltas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            bundle_id TEXT NOT NULL,
            delta_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            locator_type TEXT,
            locator_value TEXT,
            old_value TEXT,
            new_value TEXT,
            drift_category TEXT,
            risk_level TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(bundle_id, delta_id),
            FOREIGN KEY (run_id) REFERENCES validation_runs(run_id),
            FOREIGN KEY (bundle_id) REFERENCES context_bundles(bundle_id)
        );

        CREATE TABLE IF NOT EXISTS llm_outputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            total_files INTEGER,
            drifted_files INTEGER,
            total_deltas INTEGER,
            high_risk_count INTEGER,
            medium_risk_count INTEGER,
            low_risk_count INTEGER,
            allowed_count INTEGER,
            llm_data TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES validation_runs(run_id)
        );

        CREATE TABLE IF NOT EXISTS policy_validations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            pii_findings_count INTEGER,
            intent_violations_count INTEGER,
            policy_violations_count INTEGER,
            validation_data TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES validation_runs(run_id)
        );

        CREATE TABLE IF NOT EXISTS certifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            confidence_score INTEGER,
            decision TEXT,
            environment TEXT,
            violations_count INTEGER,
            high_risk_count INTEGER,
            certified_snapshot_branch TEXT,
            certification_data TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES validation_runs(run_id)
        );

        CREATE TABLE IF NOT EXISTS golden_branches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_name TEXT NOT NULL,
            environment TEXT NOT NULL,
            branch_name TEXT NOT NULL,
            branch_type TEXT NOT NULL,
            is_active BOOLEAN DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            certification_score INTEGER,
            metadata TEXT,
            UNIQUE(service_name, environment, branch_name, branch_type)
        );

        CREATE TABLE IF NOT EXISTS aggregated_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            service_name TEXT,
            environment TEXT,
            overall_status TEXT,
            files_analyzed INTEGER,
            total_deltas INTEGER,
            policy_violations INTEGER,
            confidence_score INTEGER,
            final_decision TEXT,
            aggregated_data TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES validation_runs(run_id)
        );

        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            report_type TEXT DEFAULT 'validation',
            report_content TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES validation_runs(run_id)
        );

        CREATE TABLE IF NOT EXISTS services (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_id TEXT UNIQUE NOT NULL,
            service_name TEXT NOT NULL,
            repo_url TEXT NOT NULL,
            main_branch TEXT NOT NULL DEFAULT 'main',
            environments TEXT NOT NULL,
            config_paths TEXT,
            group_name TEXT,
            group_url TEXT,
            is_active BOOLEAN DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            log_level TEXT NOT NULL,
            logger_name TEXT NOT NULL,
            message TEXT NOT NULL,
            run_id TEXT,
            service_name TEXT,
            environment TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_runs_service_env ON validation_runs(service_name, environment);
        CREATE INDEX IF NOT EXISTS idx_runs_created ON validation_runs(created_at);
        CREATE INDEX IF NOT EXISTS idx_deltas_run ON config_deltas(run_id);
        CREATE INDEX IF NOT EXISTS idx_deltas_risk ON config_deltas(risk_level);
        CREATE INDEX IF NOT EXISTS idx_branches_active ON golden_branches(is_active);
        CREATE INDEX IF NOT EXISTS idx_services_active ON services(is_active);
        CREATE INDEX IF NOT EXISTS idx_services_id ON services(service_id);
        CREATE INDEX IF NOT EXISTS idx_logs_run ON logs(run_id);
        "#,
    )?;
    info!("store schema ready");
    Ok(())
}
