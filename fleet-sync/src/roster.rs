//! Declarative fleet roster: a simple master file (the group list) merged
//! with an optional detail file (defaults, sync tuning, filters, per-group
//! overrides).
//!
//! A sha256 over the concatenated bytes of both files drives the no-op fast
//! path; the hash of the last successful sync is persisted next to the
//! master file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::errors::{SyncError, SyncResult};

/// One group (fleet namespace) in the master roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct MasterFile {
    groups: Vec<GroupEntry>,
}

/// Service defaults applied to every discovered project unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefaults {
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
    #[serde(default = "default_environments")]
    pub environments: Vec<String>,
    #[serde(default = "default_config_paths")]
    pub config_paths: Vec<String>,
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_environments() -> Vec<String> {
    vec!["prod".to_string()]
}

fn default_config_paths() -> Vec<String> {
    [
        "*.yml",
        "*.yaml",
        "*.properties",
        "*.toml",
        "*.ini",
        "*.cfg",
        "*.conf",
        "*.config",
        "Dockerfile",
        "docker-compose.yml",
        "pom.xml",
        "build.gradle",
        "build.gradle.kts",
        "settings.gradle",
        "settings.gradle.kts",
        "requirements.txt",
        "pyproject.toml",
        "go.mod",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            main_branch: default_main_branch(),
            environments: default_environments(),
            config_paths: default_config_paths(),
        }
    }
}

/// Sync engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTuning {
    #[serde(default = "default_true")]
    pub create_golden_branches: bool,
    #[serde(default = "default_branch_workers")]
    pub max_branch_workers: usize,
    #[serde(default = "default_min_services")]
    pub min_services_threshold: usize,
    #[serde(default = "default_max_delete_pct")]
    pub max_delete_percentage: u8,
}

fn default_branch_workers() -> usize {
    10
}
fn default_min_services() -> usize {
    1
}
fn default_max_delete_pct() -> u8 {
    50
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            create_golden_branches: true,
            max_branch_workers: default_branch_workers(),
            min_services_threshold: default_min_services(),
            max_delete_percentage: default_max_delete_pct(),
        }
    }
}

/// Project name filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFilters {
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DetailFile {
    #[serde(default)]
    defaults: Option<ServiceDefaults>,
    #[serde(default)]
    sync: Option<SyncTuning>,
    #[serde(default)]
    filters: Option<RosterFilters>,
    #[serde(default)]
    group_overrides: std::collections::BTreeMap<String, ServiceDefaults>,
}

/// The merged roster configuration driving one sync.
#[derive(Debug, Clone)]
pub struct Roster {
    pub groups: Vec<GroupEntry>,
    pub defaults: ServiceDefaults,
    pub tuning: SyncTuning,
    pub filters: RosterFilters,
    pub group_overrides: std::collections::BTreeMap<String, ServiceDefaults>,
}

impl Roster {
    /// Effective defaults for a group, applying any override.
    pub fn defaults_for(&self, group: &str) -> &ServiceDefaults {
        self.group_overrides.get(group).unwrap_or(&self.defaults)
    }
}

/// Paths of the roster files and the persisted hash.
#[derive(Debug, Clone)]
pub struct RosterPaths {
    pub master: PathBuf,
    pub detail: PathBuf,
    pub hash: PathBuf,
}

impl RosterPaths {
    /// Conventional layout: `fleet_master.yaml`, `fleet_config.yaml` and
    /// `.fleet_master_hash` under one config dir.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            master: dir.join("fleet_master.yaml"),
            detail: dir.join("fleet_config.yaml"),
            hash: dir.join(".fleet_master_hash"),
        }
    }
}

/// Loads and merges the roster files.
///
/// # Errors
/// - [`SyncError::Roster`] for a missing/empty master or invalid YAML
/// - [`SyncError::DuplicateGroup`] when a group is listed twice
pub fn load_roster(paths: &RosterPaths) -> SyncResult<Roster> {
    let master_text = std::fs::read_to_string(&paths.master).map_err(|e| {
        SyncError::Roster(format!(
            "master roster not readable at {}: {e}",
            paths.master.display()
        ))
    })?;
    let master: MasterFile = serde_yaml::from_str(&master_text)
        .map_err(|e| SyncError::Roster(format!("invalid master roster: {e}")))?;

    if master.groups.is_empty() {
        return Err(SyncError::Roster(
            "master roster lists no groups".to_string(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for group in &master.groups {
        if group.name.trim().is_empty() {
            return Err(SyncError::Roster("group entry missing name".to_string()));
        }
        if !seen.insert(group.name.clone()) {
            return Err(SyncError::DuplicateGroup(group.name.clone()));
        }
    }

    let detail: DetailFile = match std::fs::read_to_string(&paths.detail) {
        Ok(text) => serde_yaml::from_str(&text)
            .map_err(|e| SyncError::Roster(format!("invalid detail roster: {e}")))?,
        Err(_) => {
            warn!(path = %paths.detail.display(), "detail roster missing, using defaults");
            DetailFile::default()
        }
    };

    info!(groups = master.groups.len(), "roster loaded");
    Ok(Roster {
        groups: master.groups,
        defaults: detail.defaults.unwrap_or_default(),
        tuning: detail.sync.unwrap_or_default(),
        filters: detail.filters.unwrap_or_default(),
        group_overrides: detail.group_overrides,
    })
}

/// sha256 over the concatenation of both roster files.
pub fn roster_hash(paths: &RosterPaths) -> String {
    let mut hasher = Sha256::new();
    if let Ok(bytes) = std::fs::read(&paths.master) {
        hasher.update(&bytes);
    }
    if let Ok(bytes) = std::fs::read(&paths.detail) {
        hasher.update(&bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// The hash persisted by the last successful sync, if any.
pub fn saved_hash(paths: &RosterPaths) -> Option<String> {
    std::fs::read_to_string(&paths.hash)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Persists the current roster hash.
pub fn save_hash(paths: &RosterPaths) -> SyncResult<()> {
    if let Some(parent) = paths.hash.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&paths.hash, roster_hash(paths))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_roster(dir: &Path, master: &str, detail: Option<&str>) -> RosterPaths {
        let paths = RosterPaths::in_dir(dir);
        std::fs::write(&paths.master, master).unwrap();
        if let Some(d) = detail {
            std::fs::write(&paths.detail, d).unwrap();
        }
        paths
    }

    const MASTER: &str = "groups:\n  - name: vsat-a\n    url: https://forge.example.com/vsat-a\n  - name: vsat-b\n    url: https://forge.example.com/vsat-b\n    enabled: false\n";

    #[test]
    fn loads_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let detail = "defaults:\n  environments: [prod, alpha]\nsync:\n  max_branch_workers: 4\ngroup_overrides:\n  vsat-a:\n    environments: [prod]\n";
        let paths = write_roster(dir.path(), MASTER, Some(detail));

        let roster = load_roster(&paths).unwrap();
        assert_eq!(roster.groups.len(), 2);
        assert!(!roster.groups[1].enabled);
        assert_eq!(roster.tuning.max_branch_workers, 4);
        assert_eq!(roster.defaults.environments, vec!["prod", "alpha"]);
        assert_eq!(roster.defaults_for("vsat-a").environments, vec!["prod"]);
        assert_eq!(
            roster.defaults_for("vsat-b").environments,
            vec!["prod", "alpha"]
        );
    }

    #[test]
    fn duplicate_groups_are_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let master = "groups:\n  - name: vsat-a\n    url: u\n  - name: vsat-a\n    url: u\n";
        let paths = write_roster(dir.path(), master, None);
        assert!(matches!(
            load_roster(&paths),
            Err(SyncError::DuplicateGroup(_))
        ));
    }

    #[test]
    fn missing_detail_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_roster(dir.path(), MASTER, None);
        let roster = load_roster(&paths).unwrap();
        assert_eq!(roster.defaults.main_branch, "main");
        assert!(roster.tuning.create_golden_branches);
    }

    #[test]
    fn hash_tracks_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_roster(dir.path(), MASTER, Some("defaults: {}\n"));
        let before = roster_hash(&paths);
        save_hash(&paths).unwrap();
        assert_eq!(saved_hash(&paths).unwrap(), before);

        std::fs::write(&paths.detail, "defaults:\n  main_branch: trunk\n").unwrap();
        assert_ne!(roster_hash(&paths), before);
    }
}
