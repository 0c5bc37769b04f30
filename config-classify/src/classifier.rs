//! File categorisation by name, extension and path segments.

use serde::{Deserialize, Serialize};

use crate::contains_delimited;

/// Coarse category of a repository file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Config,
    Code,
    Build,
    Ci,
    Infra,
    Schema,
    Other,
}

impl FileCategory {
    /// Stable lowercase name, as stored alongside deltas.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Config => "config",
            FileCategory::Code => "code",
            FileCategory::Build => "build",
            FileCategory::Ci => "ci",
            FileCategory::Infra => "infra",
            FileCategory::Schema => "schema",
            FileCategory::Other => "other",
        }
    }
}

const BUILD_FILES: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "requirements.txt",
    "pyproject.toml",
    "go.mod",
];

const CONFIG_EXTS: &[&str] = &[
    "yml", "yaml", "toml", "ini", "cfg", "conf", "properties", "config", "xml",
];

const SCHEMA_EXTS: &[&str] = &["sql", "db", "ddl"];

const CODE_EXTS: &[&str] = &[
    "java", "py", "go", "ts", "js", "json", "cs", "groovy", "kts", "gradle", "sh", "bat", "ps1",
    "rb", "php", "c", "cpp", "h", "hpp", "html", "css", "md", "txt", "csv", "tsv",
];

/// Classifies a repo-relative path into a [`FileCategory`].
///
/// Matching is case-insensitive. JSON deliberately lands in `code`, not
/// `config`: semantic key diffing is reserved for operator-managed formats.
pub fn classify(path: &str) -> FileCategory {
    let norm = path.to_ascii_lowercase().replace('\\', "/");
    let name = norm.rsplit('/').next().unwrap_or(&norm);
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");

    if name.starts_with("jenkinsfile") {
        return FileCategory::Ci;
    }
    if BUILD_FILES.contains(&name) {
        return FileCategory::Build;
    }
    if CONFIG_EXTS.contains(&ext) {
        return FileCategory::Config;
    }
    if ext == "tf" || ext == "tfvars" || norm.split('/').any(|seg| seg == "terraform") {
        return FileCategory::Infra;
    }
    if SCHEMA_EXTS.contains(&ext) {
        return FileCategory::Schema;
    }
    if CODE_EXTS.contains(&ext) {
        return FileCategory::Code;
    }
    FileCategory::Other
}

/// Environment tokens recognised in paths, in match order.
///
/// Longer tokens come before their prefixes so `production` is not shadowed
/// by `prod`.
const ENV_TOKENS: &[&str] = &[
    "production",
    "staging",
    "stage",
    "vbgalpha",
    "dev",
    "qa",
    "prod",
    "vbg",
    "vcg",
    "sit",
    "uat",
];

/// Extracts a normalised environment tag from a path, if one is present as a
/// delimited segment. `stage` normalises to `staging`, `production` to
/// `prod`.
pub fn env_tag(path: &str) -> Option<&'static str> {
    let norm = path.to_ascii_lowercase().replace('\\', "/");
    for tok in ENV_TOKENS {
        if contains_delimited(&norm, tok) {
            return Some(match *tok {
                "stage" => "staging",
                "production" => "prod",
                other => other,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_files_win_over_extension() {
        assert_eq!(classify("pom.xml"), FileCategory::Build);
        assert_eq!(classify("service/pom.xml"), FileCategory::Build);
        assert_eq!(classify("settings.xml"), FileCategory::Config);
    }

    #[test]
    fn jenkinsfile_is_ci() {
        assert_eq!(classify("Jenkinsfile"), FileCategory::Ci);
        assert_eq!(classify("ci/Jenkinsfile.deploy"), FileCategory::Ci);
    }

    #[test]
    fn config_extensions() {
        assert_eq!(classify("application-prod.yml"), FileCategory::Config);
        assert_eq!(classify("db.properties"), FileCategory::Config);
        assert_eq!(classify("app.toml"), FileCategory::Config);
    }

    #[test]
    fn json_is_code_not_config() {
        assert_eq!(classify("package.json"), FileCategory::Code);
    }

    #[test]
    fn terraform_by_segment_or_extension() {
        assert_eq!(classify("main.tf"), FileCategory::Infra);
        assert_eq!(classify("terraform/vars.txt"), FileCategory::Infra);
    }

    #[test]
    fn env_tag_normalises() {
        assert_eq!(env_tag("helm/config-map/application-prod.yml"), Some("prod"));
        assert_eq!(env_tag("env/stage/app.yml"), Some("staging"));
        assert_eq!(env_tag("app-production.yml"), Some("prod"));
        assert_eq!(env_tag("application.yml"), None);
        assert_eq!(env_tag("reproduce.yml"), None);
    }
}
