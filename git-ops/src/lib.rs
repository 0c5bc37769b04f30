//! Local git plumbing for baseline and drift snapshot branches.
//!
//! Everything network-facing goes through shallow clones in per-call temp
//! workspaces; everything committed preserves the source branch's blob ids
//! and file modes. Operations are synchronous (libgit2); async callers drive
//! them via `spawn_blocking`.

pub mod auth;
pub mod branches;
pub mod errors;
pub mod naming;
pub mod workspace;

pub use auth::GitCredentials;
pub use branches::{
    create_orphan_config_branch, create_selective_golden_branch, delete_remote_branch,
    materialize_filtered_tree,
};
pub use errors::{GitOpsError, GitOpsResult};
pub use naming::generate_branch_name;
pub use workspace::GitWorkspace;
