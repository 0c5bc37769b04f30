//! Forge REST client for the drift-certification pipeline.
//!
//! Wraps the GitLab REST v4 surface the pipeline needs:
//!   * fleet discovery - paginated project enumeration per group (with a
//!     user-namespace fallback for namespaces that are not groups)
//!   * branch lifecycle - existence probes (with a default-branch fast path
//!     and a bounded parallel bulk sweep), recursive tree listing, and
//!     remote branch deletion.
//!
//! Transient failures (429/5xx/transport) are retried with exponential
//! backoff and jitter via [`retry::retry`]; auth failures surface as
//! distinct terminal errors.

pub mod client;
pub mod errors;
pub mod retry;
pub mod types;

pub use client::{BRANCH_PROBE_WORKERS, ForgeClient, ForgeConfig};
pub use errors::{ForgeError, ForgeResult};
pub use types::{Project, TreeEntry};
