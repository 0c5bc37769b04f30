//! GitLab REST v4 client for fleet discovery and branch lifecycle.
//!
//! Endpoints used:
//!   * GET    /groups/:name/projects?include_subgroups=true&archived=false
//!   * GET    /users/:name/projects?owned=true&archived=false
//!   * GET    /projects/:id/repository/branches/:branch
//!   * GET    /projects/:id/repository/tree?recursive=true
//!   * DELETE /projects/:id/repository/branches/:branch
//!
//! Group enumeration falls back to the user-namespace endpoint when the
//! group lookup 404s, because a fleet namespace may be either. All calls go
//! through the crate retry helper; 401/403 surface as distinct terminal
//! errors so the sync engine can record them per group.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::errors::{ForgeError, ForgeResult};
use crate::retry::{RetryPolicy, retry};
use crate::types::{Project, TreeEntry};

const PER_PAGE: u32 = 100;

/// Number of parallel workers for bulk branch-existence probes.
pub const BRANCH_PROBE_WORKERS: usize = 25;

/// Runtime configuration for the forge client.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// API base, e.g. `https://gitlab.example.com/api/v4`.
    pub base_api: String,
    /// Personal access token, sent as `PRIVATE-TOKEN`.
    pub token: String,
    /// Per-request timeout. Defaults to 30 s.
    pub timeout: Duration,
}

impl ForgeConfig {
    pub fn new(base_api: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_api: base_api.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// GitLab HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct ForgeClient {
    http: Client,
    base_api: String,
    token: String,
    retry_policy: RetryPolicy,
}

impl ForgeClient {
    /// Constructs a client with a shared HTTP instance and a stable user
    /// agent.
    pub fn new(cfg: ForgeConfig) -> ForgeResult<Self> {
        if cfg.token.trim().is_empty() {
            return Err(ForgeError::Config("missing forge token".into()));
        }
        let base = cfg.base_api.trim_end_matches('/').to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ForgeError::Config(format!("invalid base api url: {base}")));
        }

        debug!(base_api = %base, "creating ForgeClient");
        let http = Client::builder()
            .user_agent("driftguard-forge-client/0.1")
            .timeout(cfg.timeout)
            .build()?;

        Ok(Self {
            http,
            base_api: base,
            token: cfg.token,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Enumerates all non-archived projects of a group, including subgroups.
    ///
    /// Falls back to the user-namespace endpoint when the group does not
    /// exist - a fleet namespace can be either. Pagination errors on the
    /// first page propagate; on later pages they end the enumeration with
    /// what was collected so far.
    pub async fn list_group_projects(&self, group: &str) -> ForgeResult<Vec<Project>> {
        debug!(group, "listing group projects");
        let group_url = self.group_projects_url(group);
        let group_params = [("include_subgroups", "true"), ("archived", "false")];
        match self.list_paginated_projects(&group_url, &group_params).await {
            Ok(projects) => {
                info!(group, count = projects.len(), "group projects listed");
                Ok(projects)
            }
            Err(ForgeError::NotFound) => {
                debug!(group, "not a group, trying user namespace");
                let user_url = self.user_projects_url(group);
                let user_params = [("owned", "true"), ("archived", "false")];
                let projects = self.list_paginated_projects(&user_url, &user_params).await?;
                info!(group, count = projects.len(), "user-namespace projects listed");
                Ok(projects)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns whether `branch` exists in the given project.
    ///
    /// Fast path: when the project's default branch already equals the
    /// target, no call is issued.
    pub async fn project_has_branch(&self, project: &Project, branch: &str) -> ForgeResult<bool> {
        if project.default_branch.as_deref() == Some(branch) {
            return Ok(true);
        }

        let url = format!(
            "{}/projects/{}/repository/branches/{}",
            self.base_api,
            project.id,
            urlencoding::encode(branch)
        );
        let this = self.clone();
        let out = retry(self.retry_policy, || {
            let url = url.clone();
            let this = this.clone();
            async move {
                let resp = this
                    .http
                    .get(&url)
                    .header("PRIVATE-TOKEN", &this.token)
                    .send()
                    .await?;
                if resp.status() == StatusCode::NOT_FOUND {
                    return Ok(false);
                }
                resp.error_for_status()?;
                Ok(true)
            }
        })
        .await?;
        Ok(out)
    }

    /// Filters `projects` down to those that possess `branch`.
    ///
    /// Projects whose default branch equals the target pass without a call;
    /// the remainder is probed with a bounded pool of
    /// [`BRANCH_PROBE_WORKERS`] concurrent requests. Probe failures drop the
    /// project rather than failing the whole sweep.
    pub async fn filter_projects_with_branch(
        &self,
        projects: Vec<Project>,
        branch: &str,
    ) -> Vec<Project> {
        let (fast, to_probe): (Vec<_>, Vec<_>) = projects
            .into_iter()
            .partition(|p| p.default_branch.as_deref() == Some(branch));

        debug!(
            fast = fast.len(),
            probing = to_probe.len(),
            branch,
            "branch probe: fast-path split"
        );
        if to_probe.is_empty() {
            return fast;
        }

        let sem = Arc::new(Semaphore::new(BRANCH_PROBE_WORKERS));
        let probes = to_probe.into_iter().map(|project| {
            let sem = Arc::clone(&sem);
            let client = self.clone();
            let branch = branch.to_string();
            async move {
                let _permit = sem.acquire().await.expect("probe semaphore closed");
                match client.project_has_branch(&project, &branch).await {
                    Ok(true) => Some(project),
                    Ok(false) => None,
                    Err(e) => {
                        warn!(project = %project.path_with_namespace, error = %e, "branch probe failed, skipping project");
                        None
                    }
                }
            }
        });

        let mut kept = fast;
        kept.extend(
            futures::future::join_all(probes)
                .await
                .into_iter()
                .flatten(),
        );
        kept
    }

    /// Lists the full recursive tree of a ref (blobs and trees), paginated.
    pub async fn list_tree(&self, project_id: u64, git_ref: &str) -> ForgeResult<Vec<TreeEntry>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!("{}/projects/{}/repository/tree", self.base_api, project_id);
            let this = self.clone();
            let git_ref = git_ref.to_string();
            let batch: Vec<TreeEntry> = retry(self.retry_policy, || {
                let url = url.clone();
                let git_ref = git_ref.clone();
                let this = this.clone();
                async move {
                    let resp = this
                        .http
                        .get(&url)
                        .header("PRIVATE-TOKEN", &this.token)
                        .query(&[
                            ("recursive", "true".to_string()),
                            ("per_page", PER_PAGE.to_string()),
                            ("page", page.to_string()),
                            ("ref", git_ref.clone()),
                        ])
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?;
                    Ok(resp)
                }
            })
            .await?;

            if batch.is_empty() {
                break;
            }
            all.extend(batch);
            page += 1;
        }
        debug!(project_id, git_ref, entries = all.len(), "tree listed");
        Ok(all)
    }

    /// Deletes a remote branch.
    pub async fn delete_branch(&self, project_id: u64, branch: &str) -> ForgeResult<()> {
        let url = format!(
            "{}/projects/{}/repository/branches/{}",
            self.base_api,
            project_id,
            urlencoding::encode(branch)
        );
        let this = self.clone();
        retry(self.retry_policy, || {
            let url = url.clone();
            let this = this.clone();
            async move {
                this.http
                    .delete(&url)
                    .header("PRIVATE-TOKEN", &this.token)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
        })
        .await?;
        info!(project_id, branch, "remote branch deleted");
        Ok(())
    }

    /* ----------------------- internals ----------------------- */

    fn group_projects_url(&self, group: &str) -> String {
        format!(
            "{}/groups/{}/projects",
            self.base_api,
            urlencoding::encode(group)
        )
    }

    fn user_projects_url(&self, user: &str) -> String {
        format!(
            "{}/users/{}/projects",
            self.base_api,
            urlencoding::encode(user)
        )
    }

    async fn list_paginated_projects(
        &self,
        url: &str,
        extra_params: &[(&str, &str)],
    ) -> ForgeResult<Vec<Project>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let this = self.clone();
            let url = url.to_string();
            let result: ForgeResult<Vec<Project>> = retry(self.retry_policy, || {
                let url = url.clone();
                let this = this.clone();
                async move {
                    let resp = this
                        .http
                        .get(&url)
                        .header("PRIVATE-TOKEN", &this.token)
                        .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                        .query(extra_params)
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?;
                    Ok(resp)
                }
            })
            .await;

            match result {
                Ok(batch) => {
                    if batch.is_empty() {
                        break;
                    }
                    all.extend(batch);
                    page += 1;
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(error = %e, page, "pagination aborted, keeping partial listing");
                    break;
                }
            }
        }
        Ok(all)
    }
}
