//! Per-call temporary working directories.
//!
//! Clones and checkouts happen under a configurable base so that large
//! repositories land on the same filesystem as the application:
//!   1. `DRIFTGUARD_TEMP_DIR` environment override
//!   2. `./temp` relative to the working directory
//!   3. the system temp dir
//!
//! Directories are removed on drop, covering every exit path including
//! failures mid-operation.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::errors::GitOpsResult;

/// Resolves the base directory for temporary git workspaces.
pub fn temp_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DRIFTGUARD_TEMP_DIR") {
        if !dir.trim().is_empty() {
            let base = PathBuf::from(dir);
            let _ = std::fs::create_dir_all(&base);
            return base;
        }
    }

    let project_temp = PathBuf::from("./temp");
    if std::fs::create_dir_all(&project_temp).is_ok() {
        let probe = project_temp.join(".write_test");
        if std::fs::write(&probe, b"").is_ok() {
            let _ = std::fs::remove_file(&probe);
            return project_temp;
        }
    }

    std::env::temp_dir()
}

/// A scoped workspace directory, deleted when dropped.
#[derive(Debug)]
pub struct GitWorkspace {
    dir: TempDir,
}

impl GitWorkspace {
    /// Creates a fresh workspace under the configured base.
    pub fn create(prefix: &str) -> GitOpsResult<Self> {
        let base = temp_base_dir();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{prefix}_"))
            .tempdir_in(&base)?;
        debug!(path = %dir.path().display(), "created git workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_removed_on_drop() {
        let path;
        {
            let ws = GitWorkspace::create("test_ws").unwrap();
            path = ws.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
