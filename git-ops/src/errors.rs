//! Error hierarchy for local git plumbing.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type GitOpsResult<T> = Result<T, GitOpsError>;

/// Root error type for the git-ops crate.
#[derive(Debug, Error)]
pub enum GitOpsError {
    /// Underlying libgit2 failure (clone, fetch, index, commit, push).
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Filesystem failure while materialising trees or managing temp dirs.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A config-path glob could not be compiled.
    #[error("invalid config path pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    /// The filtered file set for a branch came out empty; committing would
    /// produce an empty snapshot, which is never intended.
    #[error("no files matched for branch {branch}")]
    NothingToCommit { branch: String },

    /// A required ref was not present in the cloned repository.
    #[error("branch not found: {0}")]
    BranchNotFound(String),
}
