//! Branch plumbing: clones, filtered materialisation, orphan snapshots.
//!
//! The central algorithm is orphan-branch construction: a golden or drift
//! branch is a parentless commit whose tree contains exactly the filtered
//! subset of the source branch's files, added to a fresh index as
//! `(mode, blob id, path)` tuples read from the source tree. Blob identity
//! and file modes are preserved byte-for-byte; nothing is re-hashed.

use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{FetchOptions, Index, IndexEntry, IndexTime, ObjectType, Oid, Repository, Signature, TreeWalkMode, TreeWalkResult};
use glob::Pattern;
use tracing::{debug, info, warn};

use config_classify::filter_files_for_environment;

use crate::auth::GitCredentials;
use crate::errors::{GitOpsError, GitOpsResult};
use crate::workspace::GitWorkspace;

/// One file of a branch tree: repo-relative path, git mode, blob id.
#[derive(Debug, Clone)]
pub struct TreeFile {
    pub path: String,
    pub mode: u32,
    pub id: Oid,
}

/// Shallow-clones `branch` of `repo_url` as a bare repository into `dest`.
fn clone_bare_shallow(
    repo_url: &str,
    branch: &str,
    dest: &Path,
    creds: &GitCredentials,
) -> GitOpsResult<Repository> {
    let auth_url = creds.authenticated_url(repo_url);
    let mut fetch = FetchOptions::new();
    fetch.depth(1);

    debug!(branch, dest = %dest.display(), "shallow bare clone");
    let repo = RepoBuilder::new()
        .bare(true)
        .branch(branch)
        .fetch_options(fetch)
        .clone(&auth_url, dest)?;
    Ok(repo)
}

/// Lists every blob of `branch`'s tree.
fn list_tree_files(repo: &Repository, branch: &str) -> GitOpsResult<Vec<TreeFile>> {
    let commit = repo
        .revparse_single(branch)
        .map_err(|_| GitOpsError::BranchNotFound(branch.to_string()))?
        .peel_to_commit()?;
    let tree = commit.tree()?;

    let mut files = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            let name = entry.name().unwrap_or_default();
            files.push(TreeFile {
                path: format!("{root}{name}"),
                mode: entry.filemode() as u32,
                id: entry.id(),
            });
        }
        TreeWalkResult::Ok
    })?;
    Ok(files)
}

fn compile_patterns(config_paths: &[String]) -> GitOpsResult<Vec<Pattern>> {
    config_paths.iter().map(|p| Ok(Pattern::new(p)?)).collect()
}

/// Keeps paths that match any pattern (against the full path or the bare
/// filename) and are not internal git files.
fn filter_by_patterns(files: Vec<TreeFile>, patterns: &[Pattern]) -> Vec<TreeFile> {
    files
        .into_iter()
        .filter(|f| !f.path.starts_with(".git/"))
        .filter(|f| {
            let name = f.path.rsplit('/').next().unwrap_or(&f.path);
            patterns.iter().any(|p| p.matches(&f.path) || p.matches(name))
        })
        .collect()
}

fn committer_signature() -> GitOpsResult<Signature<'static>> {
    let name = std::env::var("GIT_USER_NAME").unwrap_or_else(|_| "Driftguard".to_string());
    let email =
        std::env::var("GIT_USER_EMAIL").unwrap_or_else(|_| "driftguard@example.com".to_string());
    Ok(Signature::now(&name, &email)?)
}

/// Materialises the filtered file set of `branch` into a fresh workspace.
///
/// Selection: any supplied glob (full path or basename), `.git/` excluded,
/// optionally reduced to files owned by `environment`. Blob contents are
/// written with original bytes. Returns the workspace (removed on drop)
/// and the sorted list of materialised repo-relative paths.
pub fn materialize_filtered_tree(
    repo_url: &str,
    branch: &str,
    config_paths: &[String],
    environment: Option<&str>,
    creds: &GitCredentials,
) -> GitOpsResult<(GitWorkspace, Vec<String>)> {
    let clone_ws = GitWorkspace::create("git_clone")?;
    let out_ws = GitWorkspace::create("git_tree")?;
    let repo = clone_bare_shallow(repo_url, branch, clone_ws.path(), creds)?;

    let patterns = compile_patterns(config_paths)?;
    let mut files = filter_by_patterns(list_tree_files(&repo, branch)?, &patterns);

    if let Some(env) = environment {
        let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        let kept = filter_files_for_environment(&paths, env);
        files.retain(|f| kept.contains(&f.path));
    }

    let mut materialised = Vec::with_capacity(files.len());
    for f in &files {
        let blob = repo.find_blob(f.id)?;
        let dest = out_ws.path().join(&f.path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, blob.content())?;
        materialised.push(f.path.clone());
    }
    materialised.sort();

    info!(
        branch,
        files = materialised.len(),
        environment = environment.unwrap_or("all"),
        "materialised filtered tree"
    );
    Ok((out_ws, materialised))
}

/// Creates and pushes an orphan branch holding the filtered config subset of
/// `main_branch`.
///
/// The new commit has no parents; its tree is built from an empty index
/// populated with the source tree's exact `(mode, blob, path)` entries. With
/// `environment` set, the subset is additionally reduced by environment
/// ownership. Returns the number of committed files.
pub fn create_orphan_config_branch(
    repo_url: &str,
    main_branch: &str,
    new_branch: &str,
    config_paths: &[String],
    environment: Option<&str>,
    creds: &GitCredentials,
) -> GitOpsResult<usize> {
    let ws = GitWorkspace::create("git_branch")?;
    let repo = clone_bare_shallow(repo_url, main_branch, ws.path(), creds)?;

    let patterns = compile_patterns(config_paths)?;
    let mut files = filter_by_patterns(list_tree_files(&repo, main_branch)?, &patterns);

    if let Some(env) = environment {
        let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        let kept = filter_files_for_environment(&paths, env);
        files.retain(|f| kept.contains(&f.path));
    }

    if files.is_empty() {
        return Err(GitOpsError::NothingToCommit {
            branch: new_branch.to_string(),
        });
    }

    // Fresh in-memory index seeded from the empty tree; each entry carries
    // the original mode and blob id, so content is never re-hashed.
    let mut index = Index::new()?;
    for f in &files {
        index.add(&cacheinfo_entry(f))?;
    }
    let tree_id = index.write_tree_to(&repo)?;
    let tree = repo.find_tree(tree_id)?;

    let sig = committer_signature()?;
    let message = match environment {
        Some(env) => format!(
            "Config snapshot for {env} environment\n\nContains {} environment-specific configuration files from {main_branch}",
            files.len()
        ),
        None => format!(
            "Config-only snapshot from {main_branch}\n\nContains {} configuration files",
            files.len()
        ),
    };
    let commit_id = repo.commit(None, &sig, &sig, &message, &tree, &[])?;
    repo.reference(
        &format!("refs/heads/{new_branch}"),
        commit_id,
        true,
        "orphan config snapshot",
    )?;

    push_branch(&repo, new_branch)?;
    info!(
        branch = new_branch,
        files = files.len(),
        environment = environment.unwrap_or("all"),
        "orphan config branch created"
    );
    Ok(files.len())
}

/// Builds a new golden branch from an accepted certification: the old golden
/// tree as base, with each approved file overlaid from the drift branch.
///
/// Files rejected by the review keep their old-golden content; the result is
/// committed as a fresh orphan and pushed. Returns the number of files
/// actually copied from the drift side.
pub fn create_selective_golden_branch(
    repo_url: &str,
    old_golden_branch: &str,
    drift_branch: &str,
    new_branch: &str,
    approved_files: &[String],
    creds: &GitCredentials,
) -> GitOpsResult<usize> {
    let golden_ws = GitWorkspace::create("golden_base")?;
    let drift_ws = GitWorkspace::create("drift_source")?;

    let auth_url = creds.authenticated_url(repo_url);
    let mut fetch = FetchOptions::new();
    fetch.depth(1);
    let golden_repo = RepoBuilder::new()
        .branch(old_golden_branch)
        .fetch_options(fetch)
        .clone(&auth_url, golden_ws.path())?;

    let drift_repo = clone_bare_shallow(repo_url, drift_branch, drift_ws.path(), creds)?;
    let drift_tree = drift_repo
        .revparse_single(drift_branch)
        .map_err(|_| GitOpsError::BranchNotFound(drift_branch.to_string()))?
        .peel_to_commit()?
        .tree()?;

    let workdir = golden_repo
        .workdir()
        .map(PathBuf::from)
        .expect("non-bare clone has a workdir");

    let mut copied = 0usize;
    for rel in approved_files {
        match drift_tree.get_path(Path::new(rel)) {
            Ok(entry) => {
                let blob = drift_repo.find_blob(entry.id())?;
                let dest = workdir.join(rel);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&dest, blob.content())?;
                copied += 1;
            }
            Err(_) => {
                warn!(file = %rel, "approved file missing from drift branch, keeping golden version");
            }
        }
    }

    let mut index = golden_repo.index()?;
    index.clear()?;
    index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = golden_repo.find_tree(tree_id)?;

    let sig = committer_signature()?;
    let message = format!(
        "Selective certification snapshot\n\nBase: {old_golden_branch}\nAccepted {copied} files from {drift_branch}"
    );
    let commit_id = golden_repo.commit(None, &sig, &sig, &message, &tree, &[])?;
    golden_repo.reference(
        &format!("refs/heads/{new_branch}"),
        commit_id,
        true,
        "certified snapshot",
    )?;

    push_branch(&golden_repo, new_branch)?;
    info!(
        branch = new_branch,
        copied,
        base = old_golden_branch,
        "selective golden branch created"
    );
    Ok(copied)
}

/// Deletes a branch on the remote by pushing an empty refspec source.
pub fn delete_remote_branch(
    repo_url: &str,
    branch: &str,
    creds: &GitCredentials,
) -> GitOpsResult<()> {
    let ws = GitWorkspace::create("git_delete")?;
    let repo = Repository::init_bare(ws.path())?;
    let mut remote = repo.remote_anonymous(&creds.authenticated_url(repo_url))?;
    remote.push(&[format!(":refs/heads/{branch}").as_str()], None)?;
    info!(branch, "remote branch deleted");
    Ok(())
}

fn push_branch(repo: &Repository, branch: &str) -> GitOpsResult<()> {
    let mut remote = repo.find_remote("origin")?;
    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    remote.push(&[refspec.as_str()], None)?;
    Ok(())
}

fn cacheinfo_entry(f: &TreeFile) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: f.mode,
        uid: 0,
        gid: 0,
        file_size: 0,
        id: f.id,
        flags: 0,
        flags_extended: 0,
        path: f.path.clone().into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(path: &str) -> TreeFile {
        TreeFile {
            path: path.to_string(),
            mode: 0o100644,
            id: Oid::zero(),
        }
    }

    #[test]
    fn pattern_filter_matches_path_or_basename() {
        let patterns = compile_patterns(&["*.yml".to_string(), "pom.xml".to_string()]).unwrap();
        let files = vec![
            tf("application.yml"),
            tf("helm/values.yml"),
            tf("service/pom.xml"),
            tf("src/Main.java"),
            tf(".git/config"),
        ];
        let kept: Vec<String> = filter_by_patterns(files, &patterns)
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(kept, vec!["application.yml", "helm/values.yml", "service/pom.xml"]);
    }

    #[test]
    fn invalid_pattern_is_an_input_error() {
        assert!(compile_patterns(&["[".to_string()]).is_err());
    }
}
