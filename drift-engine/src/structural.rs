//! Structural diff: file additions, removals, modifications and renames.

use std::collections::{BTreeMap, HashMap};

use crate::bundle::{FileChanges, RenamedFile};
use crate::scan::FileMeta;

/// Computes the structural diff between golden (`g`) and drift (`d`) trees.
///
/// A rename is an (added, removed) pair with identical sha256; each match
/// consumes one entry from both lists. Output lists are sorted, so the diff
/// is a pure function of the input trees.
pub fn structural_diff(g: &[FileMeta], d: &[FileMeta]) -> FileChanges {
    let gmap: BTreeMap<&str, &FileMeta> = g.iter().map(|f| (f.path.as_str(), f)).collect();
    let dmap: BTreeMap<&str, &FileMeta> = d.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut added: Vec<String> = dmap
        .keys()
        .filter(|p| !gmap.contains_key(**p))
        .map(|p| p.to_string())
        .collect();
    let mut removed: Vec<String> = gmap
        .keys()
        .filter(|p| !dmap.contains_key(**p))
        .map(|p| p.to_string())
        .collect();
    let mut modified: Vec<String> = gmap
        .iter()
        .filter_map(|(p, gf)| match dmap.get(p) {
            Some(df) if df.sha256 != gf.sha256 => Some(p.to_string()),
            _ => None,
        })
        .collect();

    // Rename detection: same content hash on both sides, different path.
    let mut g_by_hash: HashMap<&str, Vec<&str>> = HashMap::new();
    for f in g {
        g_by_hash.entry(f.sha256.as_str()).or_default().push(&f.path);
    }
    let mut d_by_hash: HashMap<&str, Vec<&str>> = HashMap::new();
    for f in d {
        d_by_hash.entry(f.sha256.as_str()).or_default().push(&f.path);
    }

    let mut renamed = Vec::new();
    let mut hashes: Vec<&str> = g_by_hash.keys().copied().collect();
    hashes.sort_unstable();
    for hash in hashes {
        for gp in &g_by_hash[hash] {
            let Some(d_paths) = d_by_hash.get(hash) else {
                continue;
            };
            for dp in d_paths {
                if gp != dp
                    && removed.iter().any(|r| r == gp)
                    && added.iter().any(|a| a == dp)
                {
                    renamed.push(RenamedFile {
                        from: gp.to_string(),
                        to: dp.to_string(),
                    });
                    removed.retain(|r| r != gp);
                    added.retain(|a| a != dp);
                }
            }
        }
    }

    added.sort();
    removed.sort();
    modified.sort();

    FileChanges {
        added,
        removed,
        modified,
        renamed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_classify::FileCategory;

    fn meta(path: &str, sha: &str) -> FileMeta {
        FileMeta {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            ext: String::new(),
            size: 1,
            mtime_secs: 0,
            sha256: sha.to_string(),
            category: FileCategory::Config,
            env_tag: None,
        }
    }

    #[test]
    fn basic_add_remove_modify() {
        let g = vec![meta("a.yml", "h1"), meta("b.yml", "h2")];
        let d = vec![meta("a.yml", "h1x"), meta("c.yml", "h3")];
        let fc = structural_diff(&g, &d);
        assert_eq!(fc.added, vec!["c.yml"]);
        assert_eq!(fc.removed, vec!["b.yml"]);
        assert_eq!(fc.modified, vec!["a.yml"]);
        assert!(fc.renamed.is_empty());
    }

    #[test]
    fn rename_consumes_add_and_remove() {
        let g = vec![meta("old/app.yml", "same")];
        let d = vec![meta("new/app.yml", "same")];
        let fc = structural_diff(&g, &d);
        assert!(fc.added.is_empty());
        assert!(fc.removed.is_empty());
        assert_eq!(fc.renamed.len(), 1);
        assert_eq!(fc.renamed[0].from, "old/app.yml");
        assert_eq!(fc.renamed[0].to, "new/app.yml");
    }

    #[test]
    fn diff_is_symmetric_up_to_role_swap() {
        let g = vec![meta("a.yml", "h1"), meta("b.yml", "h2")];
        let d = vec![meta("a.yml", "h1x"), meta("c.yml", "h3")];
        let fwd = structural_diff(&g, &d);
        let rev = structural_diff(&d, &g);
        assert_eq!(fwd.modified, rev.modified);
        assert_eq!(fwd.added, rev.removed);
        assert_eq!(fwd.removed, rev.added);
    }
}
