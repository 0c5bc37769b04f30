//! Provider-agnostic types returned by the forge client.

use serde::{Deserialize, Serialize};

/// A project (repository) hosted under a forge group or user namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    /// Path component within the namespace, e.g. `payments-adapter`.
    pub path: String,
    /// Full namespaced path, e.g. `vsat-a/payments-adapter`.
    pub path_with_namespace: String,
    /// Default branch as reported by the forge; used as the branch-probe
    /// fast path.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// HTTPS clone URL.
    pub http_url_to_repo: String,
    pub web_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One entry of a recursive repository tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Object id (blob/tree sha).
    pub id: String,
    pub name: String,
    /// `blob` or `tree`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Repo-relative path.
    pub path: String,
    /// Git file mode, e.g. `100644`.
    pub mode: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}
