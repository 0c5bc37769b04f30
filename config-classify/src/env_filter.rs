//! Environment ownership of configuration files.
//!
//! Golden branches are built per environment; a file carrying an environment
//! marker belongs only to that environment's baseline, while unmarked files
//! are service-level and belong to every baseline.
//!
//! Ownership rules:
//!   * `prod` marker → only `prod`
//!   * `alpha` marker → only `alpha`
//!   * `beta1` marker, or filename ending in `T1.yml` → only `beta1`
//!   * `beta2` marker, or filename ending in `T2.yml`..`T6.yml` → only `beta2`
//!   * no marker → all environments

use tracing::debug;

use crate::contains_delimited;

/// Every golden-branch environment, in canonical order.
pub const ALL_ENVIRONMENTS: [&str; 4] = ["prod", "alpha", "beta1", "beta2"];

const BETA1_SUFFIXES: &[&str] = &["t1.yml"];
const BETA2_SUFFIXES: &[&str] = &["t2.yml", "t3.yml", "t4.yml", "t5.yml", "t6.yml"];

/// Returns the environments whose baseline should contain `path`.
pub fn environments_for(path: &str) -> Vec<&'static str> {
    let norm = path.to_ascii_lowercase().replace('\\', "/");
    let filename = norm.rsplit('/').next().unwrap_or(&norm);

    if contains_delimited(&norm, "prod") {
        debug!(path, "env ownership: prod");
        return vec!["prod"];
    }
    if contains_delimited(&norm, "alpha") {
        debug!(path, "env ownership: alpha");
        return vec!["alpha"];
    }
    if contains_delimited(&norm, "beta1") || BETA1_SUFFIXES.iter().any(|s| filename.ends_with(s)) {
        debug!(path, "env ownership: beta1");
        return vec!["beta1"];
    }
    if contains_delimited(&norm, "beta2") || BETA2_SUFFIXES.iter().any(|s| filename.ends_with(s)) {
        debug!(path, "env ownership: beta2");
        return vec!["beta2"];
    }
    ALL_ENVIRONMENTS.to_vec()
}

/// Filters `files` down to those owned by `environment`.
pub fn filter_files_for_environment<S: AsRef<str>>(files: &[S], environment: &str) -> Vec<String> {
    let kept: Vec<String> = files
        .iter()
        .map(|f| f.as_ref())
        .filter(|f| environments_for(f).contains(&environment))
        .map(str::to_string)
        .collect();
    debug!(
        environment,
        kept = kept.len(),
        total = files.len(),
        "environment filter applied"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prod_files_are_prod_only() {
        assert_eq!(environments_for("helm/config-map/application-prod.yml"), vec!["prod"]);
        assert_eq!(environments_for("prod/app.yml"), vec!["prod"]);
    }

    #[test]
    fn t_suffixes_map_to_betas() {
        assert_eq!(environments_for("conf/appT1.yml"), vec!["beta1"]);
        assert_eq!(environments_for("conf/appT3.yml"), vec!["beta2"]);
        assert_eq!(environments_for("conf/appT6.yml"), vec!["beta2"]);
    }

    #[test]
    fn unmarked_files_are_global() {
        assert_eq!(environments_for("pom.xml"), ALL_ENVIRONMENTS.to_vec());
        assert_eq!(environments_for("src/application.yml"), ALL_ENVIRONMENTS.to_vec());
    }

    #[test]
    fn beta1_branch_never_sees_prod_files() {
        let files = vec![
            "application-prod.yml".to_string(),
            "application-beta1.yml".to_string(),
            "pom.xml".to_string(),
        ];
        let filtered = filter_files_for_environment(&files, "beta1");
        assert_eq!(filtered, vec!["application-beta1.yml", "pom.xml"]);
    }

    #[test]
    fn marker_must_be_delimited() {
        // "alphabet" carries no alpha marker; "vbgalpha" is its own token.
        assert_eq!(environments_for("alphabet.yml"), ALL_ENVIRONMENTS.to_vec());
    }
}
