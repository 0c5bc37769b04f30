//! Branch naming scheme for snapshots.
//!
//! `{prefix}_{environment}_{YYYYMMDD_HHMMSS}_{6-hex}` - the timestamp keeps
//! names sortable, the uuid suffix keeps concurrent creations collision-free.

use chrono::Local;
use uuid::Uuid;

/// Generates a unique branch name, e.g. `drift_prod_20260214_103015_a3f9c1`.
pub fn generate_branch_name(prefix: &str, environment: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = &Uuid::new_v4().simple().to_string()[..6];
    format!("{prefix}_{environment}_{timestamp}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_and_uniqueness() {
        let a = generate_branch_name("golden", "prod");
        let b = generate_branch_name("golden", "prod");
        assert!(a.starts_with("golden_prod_"));
        assert_eq!(a.split('_').count(), 5);
        assert_eq!(a.split('_').next_back().unwrap().len(), 6);
        assert_ne!(a, b);
    }
}
