//! Fleet-sync errors.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Roster file missing, unreadable or structurally invalid. Fail fast.
    #[error("roster error: {0}")]
    Roster(String),

    /// The same group is listed twice in the master roster.
    #[error("duplicate group in roster: {0}")]
    DuplicateGroup(String),

    /// Forge failure that aborts the whole sync (per-group failures are
    /// recorded in the report instead).
    #[error(transparent)]
    Forge(#[from] forge_client::ForgeError),

    #[error(transparent)]
    Store(#[from] config_store::StoreError),

    #[error(transparent)]
    Git(#[from] git_ops::GitOpsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
