//! Fleet reconciliation and baseline materialisation.
//!
//! One invocation: change detection → per-group discovery → registry
//! reconciliation (add/update/deactivate/reactivate, gated by the safety
//! thresholds) → parallel baseline-branch materialisation → roster-hash
//! persistence.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use glob::Pattern;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use config_store::{ServiceRecord, Store};
use forge_client::{ForgeClient, Project};
use git_ops::{GitCredentials, create_orphan_config_branch, generate_branch_name};

use crate::errors::SyncResult;
use crate::roster::{Roster, RosterPaths, ServiceDefaults, load_roster, roster_hash, save_hash, saved_hash};

/// Branches created per service fan out in a nested pool of this size.
const NESTED_BRANCH_WORKERS: usize = 5;

/// Outcome of one sync invocation.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// True when the roster was unchanged and baselines complete.
    pub no_op: bool,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deactivated: usize,
    pub reactivated: usize,
    pub branches_created: usize,
    pub errors: Vec<String>,
}

/// A service queued for baseline materialisation.
#[derive(Debug, Clone)]
struct BranchWork {
    service_id: String,
    repo_url: String,
    main_branch: String,
    environments: Vec<String>,
    config_paths: Vec<String>,
}

/// The fleet sync engine.
pub struct FleetSyncEngine {
    forge: ForgeClient,
    store: Store,
    creds: GitCredentials,
    paths: RosterPaths,
}

impl FleetSyncEngine {
    pub fn new(forge: ForgeClient, store: Store, creds: GitCredentials, paths: RosterPaths) -> Self {
        Self {
            forge,
            store,
            creds,
            paths,
        }
    }

    /// Runs one full sync.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let roster = load_roster(&self.paths)?;
        let mut report = SyncReport::default();

        if self.is_no_op(&roster)? {
            info!("fleet sync: roster unchanged and baselines complete, no-op");
            report.no_op = true;
            return Ok(report);
        }

        let mut branch_queue: Vec<BranchWork> = Vec::new();

        for group in roster.groups.iter().filter(|g| g.enabled) {
            debug!(group = %group.name, "fleet sync: syncing group");
            match self.sync_group(&roster, &group.name, &mut report).await {
                Ok(queued) => branch_queue.extend(queued),
                Err(e) => {
                    // Auth and discovery failures are terminal for the group
                    // but not for the sync.
                    warn!(group = %group.name, error = %e, "group sync failed");
                    report.errors.push(format!("{}: {e}", group.name));
                }
            }
        }

        self.reconcile_removed_groups(&roster, &mut report)?;

        if roster.tuning.create_golden_branches && !branch_queue.is_empty() {
            info!(
                services = branch_queue.len(),
                workers = roster.tuning.max_branch_workers,
                "fleet sync: materialising baselines"
            );
            self.materialize_baselines(&roster, branch_queue, &mut report)
                .await;
        }

        if report.errors.is_empty() {
            save_hash(&self.paths)?;
        }

        info!(
            added = report.added,
            updated = report.updated,
            unchanged = report.unchanged,
            deactivated = report.deactivated,
            reactivated = report.reactivated,
            branches = report.branches_created,
            errors = report.errors.len(),
            "fleet sync complete"
        );
        Ok(report)
    }

    /// No-op fast path: unchanged roster hash, a non-empty registry, every
    /// roster group present, and every active service owning at least one
    /// active golden branch.
    fn is_no_op(&self, roster: &Roster) -> SyncResult<bool> {
        let current = roster_hash(&self.paths);
        if saved_hash(&self.paths).as_deref() != Some(current.as_str()) {
            return Ok(false);
        }
        if self.store.count_services()? == 0 {
            return Ok(false);
        }

        let services = self.store.list_services(false)?;
        let known_groups: HashSet<&str> = services.iter().map(|s| s.group_name.as_str()).collect();
        for group in roster.groups.iter().filter(|g| g.enabled) {
            if !known_groups.contains(group.name.as_str()) {
                return Ok(false);
            }
        }

        for service in services.iter().filter(|s| s.is_active) {
            if !self.store.has_golden_branches(&service.service_id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn sync_group(
        &self,
        roster: &Roster,
        group_name: &str,
        report: &mut SyncReport,
    ) -> SyncResult<Vec<BranchWork>> {
        let defaults = roster.defaults_for(group_name);
        let group_url = roster
            .groups
            .iter()
            .find(|g| g.name == group_name)
            .map(|g| g.url.clone())
            .unwrap_or_default();

        let projects = self.forge.list_group_projects(group_name).await?;
        let filtered = apply_filters(projects, &roster.filters);
        if filtered.len() < roster.tuning.min_services_threshold {
            warn!(
                group = group_name,
                projects = filtered.len(),
                threshold = roster.tuning.min_services_threshold,
                "group below minimum-services threshold"
            );
        }

        let with_main = self
            .forge
            .filter_projects_with_branch(filtered, &defaults.main_branch)
            .await;
        debug!(
            group = group_name,
            candidates = with_main.len(),
            "projects with main branch"
        );

        let mut queued = Vec::new();
        for project in with_main {
            let service_id = format!("{group_name}_{}", project.path);
            match self.reconcile_service(
                &service_id,
                &project,
                group_name,
                &group_url,
                defaults,
                report,
            ) {
                Ok(Some(work)) => queued.push(work),
                Ok(None) => {}
                Err(e) => {
                    warn!(service = %service_id, error = %e, "service reconciliation failed");
                    report.errors.push(format!("{service_id}: {e}"));
                }
            }
        }
        Ok(queued)
    }

    fn reconcile_service(
        &self,
        service_id: &str,
        project: &Project,
        group_name: &str,
        group_url: &str,
        defaults: &ServiceDefaults,
        report: &mut SyncReport,
    ) -> SyncResult<Option<BranchWork>> {
        let existing = self.store.get_service(service_id)?;
        let record = ServiceRecord {
            service_id: service_id.to_string(),
            service_name: project.name.clone(),
            repo_url: project.http_url_to_repo.clone(),
            main_branch: defaults.main_branch.clone(),
            environments: defaults.environments.clone(),
            config_paths: defaults.config_paths.clone(),
            group_name: group_name.to_string(),
            group_url: group_url.to_string(),
            is_active: true,
            description: project.description.clone(),
        };

        match &existing {
            Some(old)
                if old.repo_url == record.repo_url && old.main_branch == record.main_branch =>
            {
                report.unchanged += 1;
            }
            Some(_) => {
                info!(service = service_id, "updating service");
                self.store.upsert_service(&record)?;
                report.updated += 1;
            }
            None => {
                info!(service = service_id, "adding service");
                self.store.upsert_service(&record)?;
                report.added += 1;
            }
        }

        // New services and existing ones with no baseline get branch work.
        let needs_branches = !self.store.has_golden_branches(service_id)?;
        Ok(needs_branches.then(|| BranchWork {
            service_id: service_id.to_string(),
            repo_url: record.repo_url,
            main_branch: record.main_branch,
            environments: record.environments,
            config_paths: record.config_paths,
        }))
    }

    /// Deactivates services of groups that left the roster and reactivates
    /// services of groups that returned, under the max-delete safety gate.
    fn reconcile_removed_groups(
        &self,
        roster: &Roster,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let roster_groups: HashSet<&str> =
            roster.groups.iter().map(|g| g.name.as_str()).collect();
        let services = self.store.list_services(false)?;
        if services.is_empty() {
            return Ok(());
        }

        let to_deactivate: Vec<&ServiceRecord> = services
            .iter()
            .filter(|s| s.is_active && !roster_groups.contains(s.group_name.as_str()))
            .collect();

        let max_deletes =
            services.len() * usize::from(roster.tuning.max_delete_percentage) / 100;
        if to_deactivate.len() > max_deletes {
            warn!(
                candidates = to_deactivate.len(),
                allowed = max_deletes,
                "deactivation would exceed max-delete percentage, aborting cleanup"
            );
            report.errors.push(format!(
                "cleanup aborted: {} deactivations exceed the {}% limit",
                to_deactivate.len(),
                roster.tuning.max_delete_percentage
            ));
            return Ok(());
        }

        for service in to_deactivate {
            info!(service = %service.service_id, group = %service.group_name, "deactivating service (group left roster)");
            if self.store.set_service_active(&service.service_id, false)? {
                report.deactivated += 1;
            }
        }

        for service in services
            .iter()
            .filter(|s| !s.is_active && roster_groups.contains(s.group_name.as_str()))
        {
            info!(service = %service.service_id, "reactivating service (group returned)");
            if self.store.set_service_active(&service.service_id, true)? {
                report.reactivated += 1;
            }
        }
        Ok(())
    }

    /// Creates baselines for every queued service: a complete config
    /// snapshot plus one env-filtered golden branch per environment.
    /// Services run in a bounded pool; each service fans out its branches in
    /// a nested pool.
    async fn materialize_baselines(
        &self,
        roster: &Roster,
        queue: Vec<BranchWork>,
        report: &mut SyncReport,
    ) {
        let service_sem = Arc::new(Semaphore::new(roster.tuning.max_branch_workers.max(1)));

        let tasks = queue.into_iter().map(|work| {
            let sem = Arc::clone(&service_sem);
            let store = self.store.clone();
            let creds = self.creds.clone();
            async move {
                let _permit = sem.acquire().await.expect("branch semaphore closed");
                create_branches_for_service(&store, &creds, work).await
            }
        });

        for result in join_all(tasks).await {
            match result {
                Ok(created) => report.branches_created += created,
                Err(e) => report.errors.push(e),
            }
        }
    }
}

async fn create_branches_for_service(
    store: &Store,
    creds: &GitCredentials,
    work: BranchWork,
) -> Result<usize, String> {
    let nested = Arc::new(Semaphore::new(NESTED_BRANCH_WORKERS));

    // One complete snapshot plus one env-filtered golden branch per env.
    let mut tasks = vec![(generate_branch_name("golden", "snapshot"), None)];
    for env in &work.environments {
        tasks.push((generate_branch_name("golden", env), Some(env.clone())));
    }

    let branch_futures = tasks.into_iter().map(|(branch_name, environment)| {
        let nested = Arc::clone(&nested);
        let creds = creds.clone();
        let work = work.clone();
        async move {
            let _permit = nested.acquire().await.expect("nested semaphore closed");
            let name = branch_name.clone();
            let env = environment.clone();
            let result = tokio::task::spawn_blocking(move || {
                create_orphan_config_branch(
                    &work.repo_url,
                    &work.main_branch,
                    &name,
                    &work.config_paths,
                    env.as_deref(),
                    &creds,
                )
            })
            .await;
            match result {
                Ok(Ok(files)) => Ok((branch_name, environment, files)),
                Ok(Err(e)) => Err(format!("{branch_name}: {e}")),
                Err(e) => Err(format!("{branch_name}: join error: {e}")),
            }
        }
    });

    let mut created = 0;
    let mut first_error = None;
    for result in join_all(branch_futures).await {
        match result {
            Ok((branch_name, environment, files)) => {
                let (env_label, metadata) = match &environment {
                    Some(env) => (
                        env.as_str(),
                        serde_json::json!({"type": "env_specific", "filtered_for": env}),
                    ),
                    None => (
                        "all",
                        serde_json::json!({"type": "complete_snapshot", "contains": "all_config_files"}),
                    ),
                };
                if let Err(e) = store.record_golden_branch(
                    &work.service_id,
                    env_label,
                    &branch_name,
                    None,
                    Some(&metadata),
                ) {
                    first_error
                        .get_or_insert_with(|| format!("{}: {e}", work.service_id));
                    continue;
                }
                debug!(service = %work.service_id, branch = %branch_name, files, "baseline branch created");
                created += 1;
            }
            Err(e) => {
                warn!(service = %work.service_id, error = %e, "baseline branch failed");
                first_error.get_or_insert_with(|| format!("{}: {e}", work.service_id));
            }
        }
    }

    match first_error {
        Some(e) if created == 0 => Err(e),
        Some(e) => {
            warn!(service = %work.service_id, error = %e, "partial baseline");
            Ok(created)
        }
        None => Ok(created),
    }
}

/// Applies include/exclude glob filters to project names
/// (case-insensitive).
pub fn apply_filters(projects: Vec<Project>, filters: &crate::roster::RosterFilters) -> Vec<Project> {
    let compile = |patterns: &[String]| -> Vec<Pattern> {
        patterns
            .iter()
            .filter_map(|p| match Pattern::new(&p.to_ascii_lowercase()) {
                Ok(pat) => Some(pat),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "ignoring invalid filter pattern");
                    None
                }
            })
            .collect()
    };
    let excludes = compile(&filters.exclude_patterns);
    let includes = compile(&filters.include_patterns);

    projects
        .into_iter()
        .filter(|p| {
            let name = p.name.to_ascii_lowercase();
            if excludes.iter().any(|pat| pat.matches(&name)) {
                return false;
            }
            if !includes.is_empty() && !includes.iter().any(|pat| pat.matches(&name)) {
                return false;
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterFilters;

    fn project(name: &str) -> Project {
        Project {
            id: 1,
            name: name.to_string(),
            path: name.to_string(),
            path_with_namespace: format!("g/{name}"),
            default_branch: Some("main".to_string()),
            http_url_to_repo: format!("https://forge.example.com/g/{name}.git"),
            web_url: format!("https://forge.example.com/g/{name}"),
            description: None,
        }
    }

    #[test]
    fn exclude_patterns_drop_matches() {
        let filters = RosterFilters {
            exclude_patterns: vec!["*-deprecated".to_string()],
            include_patterns: vec![],
        };
        let out = apply_filters(
            vec![project("svc-a"), project("svc-b-deprecated")],
            &filters,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "svc-a");
    }

    #[test]
    fn include_patterns_keep_only_matches() {
        let filters = RosterFilters {
            exclude_patterns: vec![],
            include_patterns: vec!["payments-*".to_string()],
        };
        let out = apply_filters(
            vec![project("payments-adapter"), project("billing-core")],
            &filters,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "payments-adapter");
    }

    #[test]
    fn no_filters_keep_everything() {
        let out = apply_filters(
            vec![project("a"), project("b")],
            &RosterFilters::default(),
        );
        assert_eq!(out.len(), 2);
    }
}
