//! Tree enumeration: every file of a materialised tree with size, mtime,
//! content hash, category and environment tag.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::warn;

use config_classify::{FileCategory, classify, env_tag};

use crate::errors::{DriftError, DriftResult};

/// Metadata of one file in a tree.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Repo-relative, forward-slashed path.
    pub path: String,
    pub name: String,
    pub ext: String,
    pub size: u64,
    pub mtime_secs: u64,
    pub sha256: String,
    pub category: FileCategory,
    pub env_tag: Option<&'static str>,
}

/// Enumerates all regular files under `root`, excluding hidden paths and
/// `.git/`. Results are sorted by path.
pub fn scan_tree(root: &Path) -> DriftResult<Vec<FileMeta>> {
    if !root.is_dir() {
        return Err(DriftError::RootMissing(root.display().to_string()));
    }

    let mut files = Vec::new();
    let walk = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build();

    for entry in walk {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let abs: PathBuf = entry.into_path();
        let rel = abs
            .strip_prefix(root)
            .expect("walker yields paths under root")
            .to_string_lossy()
            .replace('\\', "/");
        if rel.starts_with(".git/") || rel.starts_with('.') {
            continue;
        }

        match file_meta(&abs, &rel) {
            Ok(meta) => files.push(meta),
            Err(e) => warn!(path = %rel, error = %e, "skipping unreadable file"),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn file_meta(abs: &Path, rel: &str) -> DriftResult<FileMeta> {
    let meta = std::fs::metadata(abs).map_err(|e| DriftError::io(rel, e))?;
    let mtime_secs = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let name = rel.rsplit('/').next().unwrap_or(rel).to_string();
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    Ok(FileMeta {
        sha256: sha256_file(abs).map_err(|e| DriftError::io(rel, e))?,
        path: rel.to_string(),
        name,
        ext,
        size: meta.len(),
        mtime_secs,
        category: classify(rel),
        env_tag: env_tag(rel),
    })
}

/// Streaming sha256 of a file.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    use std::io::Read;

    let mut hasher = Sha256::new();
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Heuristic text check: first 8 KiB must be NUL-free and valid UTF-8.
pub fn is_text(path: &Path) -> bool {
    use std::io::Read;

    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut buf = [0u8; 8192];
    let Ok(n) = file.read(&mut buf) else {
        return false;
    };
    let sniff = &buf[..n];
    if sniff.contains(&0) {
        return false;
    }
    // Allow a multi-byte sequence cut at the buffer edge.
    match std::str::from_utf8(sniff) {
        Ok(_) => true,
        Err(e) => e.valid_up_to() + 4 >= sniff.len(),
    }
}

/// Best-effort text load; lossy on invalid UTF-8, `None` on I/O failure.
pub fn load_text(path: &Path) -> Option<String> {
    std::fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();
        std::fs::write(dir.path().join(".hidden"), "x").unwrap();
        std::fs::write(dir.path().join("application-prod.yml"), "a: 1\n").unwrap();
        std::fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();

        let files = scan_tree(dir.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["application-prod.yml", "pom.xml"]);
        assert_eq!(files[0].category, FileCategory::Config);
        assert_eq!(files[0].env_tag, Some("prod"));
        assert_eq!(files[1].category, FileCategory::Build);
        assert_eq!(files[0].sha256.len(), 64);
    }

    #[test]
    fn text_detection() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("a.yml");
        let binary = dir.path().join("a.jar");
        std::fs::write(&text, "key: value\n").unwrap();
        std::fs::write(&binary, [0x50, 0x4b, 0x03, 0x04, 0x00, 0x01]).unwrap();
        assert!(is_text(&text));
        assert!(!is_text(&binary));
    }
}
