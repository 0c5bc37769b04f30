//! Precision drift engine.
//!
//! Given two materialised trees - golden (certified baseline) and drift
//! (current snapshot) - this crate produces the normalised delta stream the
//! rest of the pipeline consumes:
//!
//! 1) **Tree enumeration** - size/mtime/sha256/category/env tag per file.
//! 2) **Structural diff** - added/removed/modified, renames by content hash.
//! 3) **Semantic config diff** - key-level diff of every changed config file.
//! 4) **Dependency diff** - Maven (with property substitution), npm, pip.
//! 5) **Detectors** - Spring profiles, Jenkinsfiles, Dockerfile FROM lists.
//! 6) **Code hunks** - `git diff --no-index` per modified text file (internal
//!    unified-diff builder as fallback), comment-only hunks dropped.
//! 7) **Binary/archive diff** - size+hash metadata, zip/jar members and
//!    MANIFEST keys, tar members.
//! 8) **Merge** - duplicate findings across detectors collapse to one delta.
//! 9) **Risk + policy tagging** - substring risk hints, declarative
//!    invariant/variance tags.
//!
//! The output delta id set is a pure function of the two trees; the final
//! list is sorted by `(file, id)`.

pub mod archives;
pub mod bundle;
pub mod deps;
pub mod detectors;
pub mod emit;
pub mod errors;
pub mod hunks;
pub mod merge;
pub mod parsers;
pub mod risk;
pub mod scan;
pub mod semantic;
pub mod structural;
pub mod unidiff;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, warn};

pub use bundle::{
    ContextBundle, Delta, DeltaCategory, HunkInfo, IntentFinding, IntentGuard, InvariantRule,
    Locator, Policies, PolicyTag, PolicyTagKind, RiskLevel, Severity,
};
pub use errors::{DriftError, DriftResult};

use bundle::{BundleMeta, ConfigsSection, Overview};
use config_classify::{FileCategory, classify};

/// Loads the declarative policy file; a missing or unparseable file is an
/// empty policy set.
pub fn load_policies(path: Option<&Path>) -> Policies {
    let Some(path) = path else {
        return Policies::default();
    };
    let Ok(text) = std::fs::read_to_string(path) else {
        warn!(path = %path.display(), "policy file missing, running without policies");
        return Policies::default();
    };
    match serde_yaml::from_str(&text) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unparseable policy file, running without policies");
            Policies::default()
        }
    }
}

/// Runs the full drift analysis over two materialised trees.
///
/// `environment` only annotates the bundle overview; environment filtering
/// happens upstream when the trees are materialised.
pub fn analyze(
    golden_root: &Path,
    drift_root: &Path,
    policies: &Policies,
    environment: &str,
) -> DriftResult<ContextBundle> {
    let t0 = Instant::now();

    debug!("drift: scanning trees");
    let g_files = scan::scan_tree(golden_root)?;
    let d_files = scan::scan_tree(drift_root)?;
    debug!(
        golden = g_files.len(),
        drift = d_files.len(),
        "drift: trees scanned ({} ms)",
        t0.elapsed().as_millis()
    );

    debug!("drift: structural diff");
    let file_changes = structural::structural_diff(&g_files, &d_files);

    debug!("drift: dependency diff");
    let g_deps = deps::extract_dependencies(golden_root);
    let d_deps = deps::extract_dependencies(drift_root);
    let dep_diff = deps::dependency_diff(&g_deps, &d_deps);

    debug!("drift: semantic config diff");
    let mut changed_paths: Vec<String> = file_changes
        .modified
        .iter()
        .chain(file_changes.added.iter())
        .filter(|rel| classify(rel) == FileCategory::Config)
        .cloned()
        .collect();
    changed_paths.sort();
    changed_paths.dedup();
    let conf_diff = semantic::semantic_config_diff(golden_root, drift_root, &changed_paths);

    debug!("drift: specialised detectors");
    let spring = detectors::spring::detect(golden_root, drift_root);
    let jenkins = detectors::jenkins::detect(golden_root, drift_root);
    let docker = detectors::docker::detect(golden_root, drift_root);
    debug!(
        spring = spring.len(),
        jenkins = jenkins.len(),
        docker = docker.len(),
        "drift: detectors done"
    );

    debug!("drift: code hunks");
    let mut code_hunks = Vec::new();
    let mut git_patches = BTreeMap::new();
    for rel in &file_changes.modified {
        let gp = golden_root.join(rel);
        let dp = drift_root.join(rel);
        if !gp.exists() || !dp.exists() || !scan::is_text(&dp) {
            continue;
        }
        let (hunks, patch) = hunks::hunks_for_file(&gp, &dp, rel);
        code_hunks.extend(hunks);
        if !patch.is_empty() {
            git_patches.insert(rel.clone(), patch);
        }
    }

    debug!("drift: binary/archive diff");
    let bin = archives::binary_deltas(golden_root, drift_root, &file_changes.modified);

    debug!("drift: merge + tagging");
    let mut all_deltas = emit::config_deltas(golden_root, drift_root, &conf_diff);
    all_deltas.extend(emit::dependency_deltas(&dep_diff));
    all_deltas.extend(emit::file_presence_deltas(&file_changes));
    all_deltas.extend(spring);
    all_deltas.extend(jenkins);
    all_deltas.extend(docker);
    all_deltas.extend(code_hunks);
    all_deltas.extend(bin);

    let mut deltas = merge::merge_deltas(all_deltas);
    for delta in &mut deltas {
        risk::tag_with_policy(delta, policies);
    }
    deltas.sort_by(|a, b| (a.file.as_str(), a.id.as_str()).cmp(&(b.file.as_str(), b.id.as_str())));

    let golden_name = dir_name(golden_root);
    let candidate_name = dir_name(drift_root);
    let drifted =
        file_changes.added.len() + file_changes.removed.len() + file_changes.modified.len();

    let overview = Overview {
        golden_repo_name: golden_name.clone(),
        candidate_repo_name: candidate_name.clone(),
        golden_files: g_files.len(),
        candidate_files: d_files.len(),
        total_files: d_files.len(),
        drifted_files: drifted,
        added_files: file_changes.added.len(),
        removed_files: file_changes.removed.len(),
        modified_files: file_changes.modified.len(),
        ci_present: d_files
            .iter()
            .any(|f| f.name.to_ascii_lowercase().contains("jenkinsfile")),
        build_tools: d_files
            .iter()
            .filter(|f| f.category == FileCategory::Build)
            .map(|f| f.name.clone())
            .take(10)
            .collect(),
        environment: environment.to_string(),
    };

    let bundle = ContextBundle {
        meta: BundleMeta {
            golden: golden_root.display().to_string(),
            candidate: drift_root.display().to_string(),
            golden_name,
            candidate_name,
            generated_at: chrono::Utc::now().to_rfc3339(),
        },
        overview,
        file_changes,
        dependencies: dep_diff,
        configs: ConfigsSection { diff: conf_diff },
        deltas,
        git_patches,
    };

    debug!(
        deltas = bundle.deltas.len(),
        drifted_files = bundle.overview.drifted_files,
        "drift: analysis complete in {} ms",
        t0.elapsed().as_millis()
    );
    Ok(bundle)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
