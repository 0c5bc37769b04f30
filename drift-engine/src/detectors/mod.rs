//! Specialised detectors, each run only when at least one relevant file is
//! present on either side.

pub mod docker;
pub mod jenkins;
pub mod spring;

use std::path::Path;

use ignore::WalkBuilder;

/// Finds files under `root` whose name satisfies `predicate`, as sorted
/// repo-relative paths. Hidden paths are excluded.
pub(crate) fn find_files(root: &Path, predicate: impl Fn(&str) -> bool) -> Vec<String> {
    let mut out = Vec::new();
    let walk = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build();
    for entry in walk.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walker yields paths under root")
            .to_string_lossy()
            .replace('\\', "/");
        let name = rel.rsplit('/').next().unwrap_or(&rel);
        if predicate(name) {
            out.push(rel);
        }
    }
    out.sort();
    out
}
