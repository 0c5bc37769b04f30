//! Code-hunk extraction for modified text files.
//!
//! The primary path shells out to `git diff --no-index --binary -U3` and
//! rewrites the path headers to `a/{rel}` / `b/{rel}` so the patch applies
//! from the candidate root. When git is unavailable the internal
//! unified-diff builder takes over. Hunks whose changed lines are all
//! comments are dropped.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::bundle::{Delta, DeltaCategory, Locator};
use crate::scan::load_text;
use crate::unidiff::build_unified_diff;

const MAX_HUNKS_PER_FILE: usize = 400;
const SNIPPET_CAP: usize = 4000;

lazy_static! {
    static ref HUNK_RE: Regex =
        Regex::new(r"^@@\s*-(\d+),?(\d*)\s+\+(\d+),?(\d*)\s*@@").unwrap();
    static ref DIFF_GIT_RE: Regex = Regex::new(r"(?m)^diff --git a/.* b/.*$").unwrap();
    static ref OLD_PATH_RE: Regex = Regex::new(r"(?m)^--- (?:a/)?.*$").unwrap();
    static ref NEW_PATH_RE: Regex = Regex::new(r"(?m)^\+\+\+ (?:b/)?.*$").unwrap();
    static ref COMMENT_RE: Regex =
        Regex::new(r"^\s*(//|#|--|/\*|\*|<!--|;)").unwrap();
}

/// One parsed hunk of a patch.
#[derive(Debug, Clone)]
pub struct RawHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub header: String,
    pub body: String,
}

fn have_git() -> bool {
    static HAVE: OnceLock<bool> = OnceLock::new();
    *HAVE.get_or_init(|| {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

/// Runs `git diff --no-index` from `a` to `b`, rewriting the path headers to
/// repo-relative form. Returns `None` on failure or empty diff.
fn git_diff_no_index(a: &Path, b: &Path, rel: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["diff", "--no-index", "--binary", "-U3", "--"])
        .arg(a)
        .arg(b)
        .output()
        .ok()?;
    // 0 = no diff, 1 = diff found; anything else is a git failure.
    match output.status.code() {
        Some(0) | Some(1) => {}
        _ => return None,
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    if raw.trim().is_empty() {
        return None;
    }
    let diff_header = format!("diff --git a/{rel} b/{rel}");
    let old_header = format!("--- a/{rel}");
    let new_header = format!("+++ b/{rel}");
    let patch = DIFF_GIT_RE.replace_all(&raw, regex::NoExpand(&diff_header));
    let patch = OLD_PATH_RE.replace_all(&patch, regex::NoExpand(&old_header));
    let patch = NEW_PATH_RE.replace_all(&patch, regex::NoExpand(&new_header));
    Some(patch.trim().to_string())
}

/// Parses `@@` hunks out of a unified patch.
pub fn parse_patch_hunks(patch_text: &str) -> Vec<RawHunk> {
    let lines: Vec<&str> = patch_text.lines().collect();
    let mut hunks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(caps) = HUNK_RE.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let num = |idx: usize, default: u32| {
            caps.get(idx)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        let header = lines[i].to_string();
        i += 1;
        let mut body = Vec::new();
        while i < lines.len() && !HUNK_RE.is_match(lines[i]) && !lines[i].starts_with("diff --git ")
        {
            body.push(lines[i]);
            i += 1;
        }
        hunks.push(RawHunk {
            old_start: num(1, 0),
            old_lines: num(2, 1),
            new_start: num(3, 1),
            new_lines: num(4, 1),
            header,
            body: body.join("\n"),
        });
    }
    hunks
}

/// Whether every changed (`+`/`-`) line of the hunk body is a comment in the
/// file's comment syntax.
fn changed_lines_all_comments(body: &str, ext: &str) -> bool {
    let mut total = 0;
    let mut commenty = 0;
    for line in body.lines() {
        let Some(stripped) = line
            .strip_prefix('+')
            .or_else(|| line.strip_prefix('-'))
        else {
            continue;
        };
        let s = stripped.trim();
        if s.is_empty() {
            continue;
        }
        total += 1;
        let is_comment = COMMENT_RE.is_match(s)
            || (s.starts_with("/*") && s.ends_with("*/"))
            || (s.starts_with("<!--") && s.ends_with("-->"))
            || s == "*/"
            || (matches!(ext, ".sql") && s.starts_with("--"))
            || (matches!(
                ext,
                ".yml" | ".yaml" | ".properties" | ".cfg" | ".conf" | ".ini" | ".py" | ".sh" | ".rb"
            ) && s.starts_with('#'));
        if is_comment {
            commenty += 1;
        }
    }
    total > 0 && commenty == total
}

fn snippet_of(header: &str, body: &str) -> String {
    let full = format!("{header}\n{body}");
    if full.chars().count() > SNIPPET_CAP {
        full.chars().take(SNIPPET_CAP).collect()
    } else {
        full
    }
}

/// Extracts `code_hunk` deltas (and the full per-file patch) for one
/// modified text file. The patch direction is candidate → golden, so the
/// patch is a ready-made revert.
pub fn hunks_for_file(
    golden_path: &Path,
    drift_path: &Path,
    rel: &str,
) -> (Vec<Delta>, String) {
    let ext = rel
        .rsplit_once('.')
        .map(|(_, e)| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    let patch = if have_git() {
        git_diff_no_index(drift_path, golden_path, rel)
    } else {
        None
    }
    .unwrap_or_else(|| {
        let drift_text = load_text(drift_path).unwrap_or_default();
        let golden_text = load_text(golden_path).unwrap_or_default();
        build_unified_diff(&drift_text, &golden_text, rel)
    });

    let mut deltas = Vec::new();
    if patch.is_empty() {
        return (deltas, patch);
    }

    for hunk in parse_patch_hunks(&patch) {
        if deltas.len() >= MAX_HUNKS_PER_FILE {
            debug!(rel, "hunk cap reached, truncating");
            break;
        }
        if changed_lines_all_comments(&hunk.body, &ext) {
            continue;
        }

        let old_end = hunk.old_start + hunk.old_lines.saturating_sub(1);
        let new_end = hunk.new_start + hunk.new_lines.saturating_sub(1);
        let mut delta = Delta::new(
            format!(
                "hunk:{rel}:{}-{}->{}-{}",
                hunk.old_start, old_end, hunk.new_start, new_end
            ),
            DeltaCategory::CodeHunk,
            rel,
            Locator::Unidiff {
                value: format!(
                    "{rel}#{}-{}-{}-{}",
                    hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines
                ),
                old_start: hunk.old_start,
                old_lines: hunk.old_lines,
                new_start: hunk.new_start,
                new_lines: hunk.new_lines,
                hunk_header: hunk.header.clone(),
            },
            Value::String(String::new()),
            Value::String(String::new()),
        );
        delta.snippet = Some(snippet_of(&hunk.header, &hunk.body));
        deltas.push(delta);
    }

    (deltas, patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hunk_headers() {
        let patch = "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -3,2 +3,3 @@\n ctx\n-old\n+new\n+more\n";
        let hunks = parse_patch_hunks(patch);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_start, 3);
        assert_eq!(hunks[0].old_lines, 2);
        assert_eq!(hunks[0].new_lines, 3);
        assert!(hunks[0].body.contains("-old"));
    }

    #[test]
    fn singleton_ranges_default_to_one_line() {
        let hunks = parse_patch_hunks("@@ -7 +7 @@\n-x\n+y\n");
        assert_eq!(hunks[0].old_lines, 1);
        assert_eq!(hunks[0].new_lines, 1);
    }

    #[test]
    fn comment_only_changes_are_recognised() {
        assert!(changed_lines_all_comments(" ctx\n-# old comment\n+# new comment\n", ".yml"));
        assert!(!changed_lines_all_comments(" ctx\n-# comment\n+port: 9090\n", ".yml"));
        assert!(changed_lines_all_comments("-// note\n+// updated note\n", ".java"));
    }

    #[test]
    fn end_to_end_on_files() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("g.yml");
        let drift = dir.path().join("d.yml");
        std::fs::write(&golden, "a: 1\nb: 2\nc: 3\n").unwrap();
        std::fs::write(&drift, "a: 1\nb: 9\nc: 3\n").unwrap();

        let (deltas, patch) = hunks_for_file(&golden, &drift, "app.yml");
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].category, DeltaCategory::CodeHunk);
        assert!(deltas[0].snippet.as_ref().unwrap().contains("@@"));
        assert!(patch.contains("a/app.yml"));
        match &deltas[0].locator {
            Locator::Unidiff { hunk_header, .. } => assert!(hunk_header.starts_with("@@")),
            other => panic!("expected unidiff locator, got {other:?}"),
        }
    }
}
