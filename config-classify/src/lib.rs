//! Path-based classification of repository files.
//!
//! Two independent concerns live here:
//!   * [`classify`] / [`env_tag`] - map a repo-relative path to a coarse
//!     file category and an optional deployment-environment tag. Used by the
//!     drift engine when enumerating trees.
//!   * [`environments_for`] / [`filter_files_for_environment`] - decide which
//!     golden-branch environments a configuration file belongs to, so that
//!     environment-specific files never leak into another environment's
//!     baseline.
//!
//! Everything in this crate is a pure function of the path string; no I/O.

pub mod classifier;
pub mod env_filter;

pub use classifier::{FileCategory, classify, env_tag};
pub use env_filter::{ALL_ENVIRONMENTS, environments_for, filter_files_for_environment};

/// Returns `true` when `token` occurs in `haystack` as a delimited segment:
/// bounded on both sides by a non-alphanumeric character or the string edge.
///
/// This is deliberately stricter than a substring test, so that e.g.
/// `reproduce.yml` is not tagged as a `prod` file.
pub(crate) fn contains_delimited(haystack: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(token) {
        let start = from + pos;
        let end = start + token.len();
        let left_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let right_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if left_ok && right_ok {
            return true;
        }
        from = start + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::contains_delimited;

    #[test]
    fn delimited_match_respects_boundaries() {
        assert!(contains_delimited("application-prod.yml", "prod"));
        assert!(contains_delimited("helm/prod/values.yml", "prod"));
        assert!(contains_delimited("config_prod.properties", "prod"));
        assert!(!contains_delimited("reproduce.yml", "prod"));
        assert!(!contains_delimited("production.yml", "prod"));
    }
}
