//! End-to-end drift analysis over real temp trees.

use std::path::Path;

use drift_engine::{DeltaCategory, Policies, PolicyTagKind, RiskLevel, analyze};

fn write(root: &Path, rel: &str, content: &str) {
    let p = root.join(rel);
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(p, content).unwrap();
}

fn tree_pair() -> (tempfile::TempDir, tempfile::TempDir) {
    (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap())
}

#[test]
fn identical_trees_produce_no_deltas() {
    let (golden, drift) = tree_pair();
    for root in [golden.path(), drift.path()] {
        write(root, "application.yml", "server:\n  port: 8080\n");
        write(root, "pom.xml", "<project></project>");
    }

    let bundle = analyze(golden.path(), drift.path(), &Policies::default(), "production").unwrap();
    assert!(bundle.deltas.is_empty());
    assert_eq!(bundle.overview.drifted_files, 0);
    assert!(bundle.file_changes.modified.is_empty());
}

#[test]
fn delta_ids_are_a_function_of_inputs() {
    let (golden, drift) = tree_pair();
    write(golden.path(), "svc.yml", "timeout: 30\nretries: 3\n");
    write(drift.path(), "svc.yml", "timeout: 45\nretries: 3\n");
    write(golden.path(), "db.properties", "db.url=jdbc:old\n");
    write(drift.path(), "db.properties", "db.url=jdbc:new\n");

    let ids = |_: usize| -> Vec<String> {
        analyze(golden.path(), drift.path(), &Policies::default(), "production")
            .unwrap()
            .deltas
            .iter()
            .map(|d| d.id.clone())
            .collect()
    };
    let first = ids(0);
    let second = ids(1);
    assert_eq!(first, second);
    assert!(first.contains(&"cfg~svc.yml.timeout".to_string()));
    assert!(first.contains(&"cfg~db.properties.db.url".to_string()));
}

#[test]
fn timeout_bump_is_a_single_low_impact_config_delta() {
    let (golden, drift) = tree_pair();
    write(golden.path(), "service.yml", "timeout: 30\n");
    write(drift.path(), "service.yml", "timeout: 45\n");

    let bundle = analyze(golden.path(), drift.path(), &Policies::default(), "production").unwrap();
    let cfg: Vec<_> = bundle
        .deltas
        .iter()
        .filter(|d| d.category == DeltaCategory::Config)
        .collect();
    assert_eq!(cfg.len(), 1);
    assert_eq!(cfg[0].id, "cfg~service.yml.timeout");
    assert_eq!(cfg[0].risk_level, RiskLevel::Med);
    assert_eq!(cfg[0].policy.as_ref().unwrap().tag, PolicyTagKind::Suspect);
    // The same edit also shows up as a code hunk; the merge pass must have
    // attached it rather than emitting a separate delta for the same key.
    assert!(cfg[0].code_snippet.is_some() || bundle.deltas.len() > 1);
}

#[test]
fn prod_password_change_is_high_risk_spring_delta() {
    let (golden, drift) = tree_pair();
    write(
        golden.path(),
        "application-prod.yml",
        "spring:\n  datasource:\n    password: oldpass\n",
    );
    write(
        drift.path(),
        "application-prod.yml",
        "spring:\n  datasource:\n    password: newpass\n",
    );

    let bundle = analyze(golden.path(), drift.path(), &Policies::default(), "production").unwrap();
    let delta = bundle
        .deltas
        .iter()
        .find(|d| d.locator.value().contains("spring.datasource.password"))
        .expect("password delta present");
    assert_eq!(delta.risk_level, RiskLevel::High);
    assert_eq!(delta.category, DeltaCategory::SpringProfile);
}

#[test]
fn duplicate_detections_are_merged_before_output() {
    let (golden, drift) = tree_pair();
    // application.yml is seen by both the generic config differ and the
    // spring detector.
    write(golden.path(), "application.yml", "server:\n  port: 8080\n");
    write(drift.path(), "application.yml", "server:\n  port: 9090\n");

    let bundle = analyze(golden.path(), drift.path(), &Policies::default(), "production").unwrap();
    let port_deltas: Vec<_> = bundle
        .deltas
        .iter()
        .filter(|d| d.locator.value().contains("server.port"))
        .collect();
    assert_eq!(port_deltas.len(), 1);
    assert_eq!(port_deltas[0].category, DeltaCategory::SpringProfile);
    assert!(
        port_deltas[0]
            .detection_sources
            .contains(&"config".to_string())
    );
    assert!(
        port_deltas[0]
            .detection_sources
            .contains(&"spring_profile".to_string())
    );
}

#[test]
fn renamed_file_consumes_add_and_remove() {
    let (golden, drift) = tree_pair();
    write(golden.path(), "conf/old-name.yml", "a: 1\n");
    write(drift.path(), "conf/new-name.yml", "a: 1\n");

    let bundle = analyze(golden.path(), drift.path(), &Policies::default(), "production").unwrap();
    assert!(bundle.file_changes.added.is_empty());
    assert!(bundle.file_changes.removed.is_empty());
    assert_eq!(bundle.file_changes.renamed.len(), 1);
    let rename = bundle
        .deltas
        .iter()
        .find(|d| d.id.starts_with("file~"))
        .unwrap();
    assert_eq!(rename.risk_level, RiskLevel::Low);
}

#[test]
fn dependency_bump_in_pom() {
    let (golden, drift) = tree_pair();
    write(
        golden.path(),
        "pom.xml",
        "<project><dependencies><dependency><groupId>com.acme</groupId><artifactId>sdk</artifactId><version>1.0</version></dependency></dependencies></project>",
    );
    write(
        drift.path(),
        "pom.xml",
        "<project><dependencies><dependency><groupId>com.acme</groupId><artifactId>sdk</artifactId><version>2.0</version></dependency></dependencies></project>",
    );

    let bundle = analyze(golden.path(), drift.path(), &Policies::default(), "production").unwrap();
    let dep = bundle
        .deltas
        .iter()
        .find(|d| d.id == "dep~maven:com.acme:sdk")
        .expect("maven delta present");
    assert_eq!(dep.category, DeltaCategory::Dependency);
    assert_eq!(dep.old, serde_json::json!("1.0"));
    assert_eq!(dep.new, serde_json::json!("2.0"));
}

#[test]
fn git_patches_cover_modified_text_files() {
    let (golden, drift) = tree_pair();
    write(golden.path(), "svc.yml", "a: 1\nb: 2\n");
    write(drift.path(), "svc.yml", "a: 1\nb: 3\n");

    let bundle = analyze(golden.path(), drift.path(), &Policies::default(), "production").unwrap();
    let patch = bundle.git_patches.get("svc.yml").expect("patch present");
    assert!(patch.contains("a/svc.yml"));
    assert!(patch.contains("@@"));
}
