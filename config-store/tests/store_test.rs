//! Store integration tests over a temp-file database.

use serde_json::json;

use config_store::{BundleCounts, CertificationSummary, ServiceRecord, Store};

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("driftguard.db")).unwrap();
    (dir, store)
}

fn service(id: &str) -> ServiceRecord {
    ServiceRecord {
        service_id: id.to_string(),
        service_name: "Payments Adapter".to_string(),
        repo_url: "https://forge.example.com/vsat-a/payments-adapter.git".to_string(),
        main_branch: "main".to_string(),
        environments: vec!["prod".to_string(), "alpha".to_string()],
        config_paths: vec!["*.yml".to_string()],
        group_name: "vsat-a".to_string(),
        group_url: "https://forge.example.com/vsat-a".to_string(),
        is_active: true,
        description: None,
    }
}

#[test]
fn run_lifecycle() {
    let (_dir, store) = temp_store();
    store
        .create_run("run-1", "vsat-a_payments-adapter", "prod", None)
        .unwrap();

    let run = store.get_run("run-1").unwrap().unwrap();
    assert_eq!(run.status, "running");
    assert!(run.completed_at.is_none());

    store
        .update_run_status("run-1", "success", Some("AUTO_MERGE"), None)
        .unwrap();
    let run = store.get_run("run-1").unwrap().unwrap();
    assert_eq!(run.status, "success");
    assert_eq!(run.verdict.as_deref(), Some("AUTO_MERGE"));
    assert!(run.completed_at.is_some());
}

#[test]
fn updating_a_missing_run_is_an_error() {
    let (_dir, store) = temp_store();
    assert!(store.update_run_status("nope", "success", None, None).is_err());
}

#[test]
fn bundle_roundtrip_and_in_place_delta_update() {
    let (_dir, store) = temp_store();
    store.create_run("run-1", "svc", "prod", None).unwrap();

    let bundle = json!({
        "meta": {"golden_name": "golden_prod_x", "candidate_name": "drift_prod_y"},
        "deltas": [
            {"id": "cfg~a.yml.db.password", "file": "a.yml", "category": "config",
             "locator": {"type": "yamlpath", "value": "a.yml.db.password"},
             "old": "hunter2", "new": "hunter3", "risk_level": "high"}
        ]
    });
    store
        .save_context_bundle(
            "run-1",
            "bundle-1",
            Some("golden_prod_x"),
            Some("drift_prod_y"),
            BundleCounts {
                total_files: 4,
                files_with_drift: 1,
                total_deltas: 1,
            },
            &bundle,
        )
        .unwrap();

    // Guardrails replace the delta list with the redacted version.
    let redacted = json!([
        {"id": "cfg~a.yml.db.password", "file": "a.yml", "category": "config",
         "locator": {"type": "yamlpath", "value": "a.yml.db.password"},
         "old": "[REDACTED_PASSWORD]", "new": "[REDACTED_PASSWORD]",
         "risk_level": "high", "pii_redacted": true}
    ]);
    store.update_context_bundle_deltas("run-1", &redacted).unwrap();

    // The next stage must observe the sanitised values only.
    let loaded = store.get_latest_context_bundle("run-1").unwrap().unwrap();
    assert_eq!(
        loaded["deltas"][0]["old"],
        json!("[REDACTED_PASSWORD]")
    );
    assert_eq!(loaded["deltas"][0]["pii_redacted"], json!(true));
    // Untouched parts of the bundle survive the in-place update.
    assert_eq!(loaded["meta"]["golden_name"], json!("golden_prod_x"));
}

#[test]
fn at_most_one_active_golden_per_service_env() {
    let (_dir, store) = temp_store();

    store
        .record_golden_branch("svc", "prod", "golden_prod_1", None, None)
        .unwrap();
    store
        .record_golden_branch("svc", "prod", "golden_prod_2", Some(92), None)
        .unwrap();

    assert_eq!(
        store.active_golden_branch("svc", "prod").unwrap().as_deref(),
        Some("golden_prod_2")
    );

    let branches = store.list_branches("svc", "prod").unwrap();
    let active: Vec<_> = branches
        .iter()
        .filter(|b| b.branch_type == "golden" && b.is_active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].branch_name, "golden_prod_2");
    assert_eq!(active[0].certification_score, Some(92));
}

#[test]
fn drift_branches_do_not_displace_goldens() {
    let (_dir, store) = temp_store();
    store
        .record_golden_branch("svc", "prod", "golden_prod_1", None, None)
        .unwrap();
    store
        .record_drift_branch("svc", "prod", "drift_prod_1", None)
        .unwrap();

    assert_eq!(
        store.active_golden_branch("svc", "prod").unwrap().as_deref(),
        Some("golden_prod_1")
    );
    assert_eq!(
        store.latest_drift_branch("svc", "prod").unwrap().as_deref(),
        Some("drift_prod_1")
    );
}

#[test]
fn service_registry_upsert_and_soft_delete() {
    let (_dir, store) = temp_store();
    let svc = service("vsat-a_payments-adapter");
    store.upsert_service(&svc).unwrap();
    assert_eq!(store.count_services().unwrap(), 1);

    // Update in place, not duplicate.
    let mut updated = svc.clone();
    updated.repo_url = "https://forge.example.com/vsat-a/payments.git".to_string();
    store.upsert_service(&updated).unwrap();
    assert_eq!(store.count_services().unwrap(), 1);
    let loaded = store.get_service(&svc.service_id).unwrap().unwrap();
    assert_eq!(loaded.repo_url, updated.repo_url);
    assert_eq!(loaded.environments, vec!["prod", "alpha"]);

    assert!(store.set_service_active(&svc.service_id, false).unwrap());
    assert!(store.list_services(true).unwrap().is_empty());
    assert_eq!(store.list_services(false).unwrap().len(), 1);
}

#[test]
fn certification_snapshot_branch_column() {
    let (_dir, store) = temp_store();
    store.create_run("run-1", "svc", "prod", None).unwrap();

    let summary = CertificationSummary {
        confidence_score: 98,
        decision: "AUTO_MERGE".to_string(),
        environment: "prod".to_string(),
        violations_count: 0,
        high_risk_count: 0,
        certified_snapshot_branch: None,
    };
    store
        .save_certification("run-1", &summary, &json!({"decision": "AUTO_MERGE"}))
        .unwrap();

    let cert = store.get_latest_certification("run-1").unwrap().unwrap();
    assert_eq!(cert["decision"], json!("AUTO_MERGE"));

    // Acceptance stamps the snapshot branch into the payload as well.
    store
        .set_certified_snapshot_branch("run-1", "golden_prod_20260214_103015_a3f9c1")
        .unwrap();
    let cert = store.get_latest_certification("run-1").unwrap().unwrap();
    assert_eq!(
        cert["certified_snapshot_branch"],
        json!("golden_prod_20260214_103015_a3f9c1")
    );
}

#[test]
fn aggregated_result_roundtrip() {
    let (_dir, store) = temp_store();
    store.create_run("run-1", "svc", "prod", None).unwrap();
    store
        .save_aggregated_result(
            "run-1",
            "svc",
            "prod",
            "completed",
            12,
            3,
            0,
            98,
            "AUTO_MERGE",
            &json!({"decision": "AUTO_MERGE"}),
        )
        .unwrap();
    let agg = store.get_aggregated_result("run-1").unwrap().unwrap();
    assert_eq!(agg["decision"], json!("AUTO_MERGE"));
}
