//! Dependency extraction and diff for Maven, npm and pip.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::Value;
use tracing::warn;

use crate::bundle::{EcosystemDiff, StringChange};
use crate::scan::load_text;

/// Dependencies of one ecosystem: coordinate → version (may be empty).
pub type DependencyMap = BTreeMap<String, String>;

/// Extracted dependencies per ecosystem, plus Maven properties.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDependencies {
    pub maven: Option<DependencyMap>,
    pub maven_properties: Option<DependencyMap>,
    pub npm: Option<DependencyMap>,
    pub pip: Option<DependencyMap>,
}

/// Reads dependency manifests from the root of a materialised tree.
pub fn extract_dependencies(root: &Path) -> ExtractedDependencies {
    let mut out = ExtractedDependencies::default();

    let pom = root.join("pom.xml");
    if pom.is_file() {
        if let Some(text) = load_text(&pom) {
            let (props, deps) = maven_props_and_deps(&text);
            out.maven = Some(deps);
            out.maven_properties = Some(props);
        }
    }

    let pkg = root.join("package.json");
    if pkg.is_file() {
        if let Some(text) = load_text(&pkg) {
            match serde_json::from_str::<Value>(&text) {
                Ok(obj) => {
                    let mut deps = DependencyMap::new();
                    for section in ["dependencies", "devDependencies"] {
                        if let Some(map) = obj.get(section).and_then(Value::as_object) {
                            for (k, v) in map {
                                deps.insert(
                                    k.clone(),
                                    v.as_str().unwrap_or_default().to_string(),
                                );
                            }
                        }
                    }
                    out.npm = Some(deps);
                }
                Err(e) => warn!(error = %e, "unparseable package.json, skipping npm deps"),
            }
        }
    }

    let req = root.join("requirements.txt");
    if req.is_file() {
        if let Some(text) = load_text(&req) {
            let mut deps = DependencyMap::new();
            for line in text.lines() {
                let s = line.trim();
                if s.is_empty() || s.starts_with('#') {
                    continue;
                }
                match s.split_once("==") {
                    Some((name, ver)) => {
                        deps.insert(name.trim().to_string(), ver.trim().to_string())
                    }
                    None => deps.insert(s.to_string(), String::new()),
                };
            }
            out.pip = Some(deps);
        }
    }

    out
}

/// Pulls `<properties>` entries and `<dependency>` triples out of a POM.
///
/// Versions of the form `${prop}` are substituted from the properties block
/// when the property is defined; unresolved placeholders are kept verbatim.
pub fn maven_props_and_deps(pom_text: &str) -> (DependencyMap, DependencyMap) {
    let mut properties = DependencyMap::new();
    let mut deps = DependencyMap::new();

    let mut reader = Reader::from_str(pom_text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<(String, String, String)> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "dependency" {
                    current = Some((String::new(), String::new(), String::new()));
                }
                stack.push(name);
                text_buf.clear();
            }
            Ok(Event::Text(t)) => {
                text_buf = t.unescape().unwrap_or_default().trim().to_string();
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                // A property is any direct child of <properties>.
                let in_properties =
                    stack.len() >= 2 && stack[stack.len() - 2] == "properties";
                if in_properties && !text_buf.is_empty() {
                    properties.insert(name.clone(), text_buf.clone());
                }
                if name == "dependency" {
                    if let Some((g, a, v)) = current.take() {
                        if !g.is_empty() && !a.is_empty() {
                            deps.insert(format!("{g}:{a}"), v);
                        }
                    }
                } else if let Some(dep) = current.as_mut() {
                    match name.as_str() {
                        "groupId" => dep.0 = text_buf.clone(),
                        "artifactId" => dep.1 = text_buf.clone(),
                        "version" => dep.2 = text_buf.clone(),
                        _ => {}
                    }
                }
                stack.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "unparseable pom.xml, keeping partial dependency set");
                break;
            }
        }
    }

    // ${property} substitution in versions.
    for version in deps.values_mut() {
        if let Some(name) = version
            .strip_prefix("${")
            .and_then(|s| s.strip_suffix('}'))
        {
            if let Some(resolved) = properties.get(name) {
                *version = resolved.clone();
            }
        }
    }

    (properties, deps)
}

/// Computes added/removed/changed between two dependency maps.
pub fn diff_maps(g: &DependencyMap, d: &DependencyMap) -> EcosystemDiff {
    let mut out = EcosystemDiff::default();
    for (k, v) in d {
        if !g.contains_key(k) {
            out.added.insert(k.clone(), v.clone());
        }
    }
    for (k, v) in g {
        if !d.contains_key(k) {
            out.removed.insert(k.clone(), v.clone());
        }
    }
    for (k, gv) in g {
        if let Some(dv) = d.get(k) {
            if gv != dv {
                out.changed.insert(
                    k.clone(),
                    StringChange {
                        from: gv.clone(),
                        to: dv.clone(),
                    },
                );
            }
        }
    }
    out
}

/// Diffs every ecosystem present on either side.
pub fn dependency_diff(
    g: &ExtractedDependencies,
    d: &ExtractedDependencies,
) -> BTreeMap<String, EcosystemDiff> {
    let empty = DependencyMap::new();
    let mut out = BTreeMap::new();

    let pairs: [(&str, &Option<DependencyMap>, &Option<DependencyMap>); 4] = [
        ("maven", &g.maven, &d.maven),
        ("maven_properties", &g.maven_properties, &d.maven_properties),
        ("npm", &g.npm, &d.npm),
        ("pip", &g.pip, &d.pip),
    ];
    for (eco, gm, dm) in pairs {
        if gm.is_none() && dm.is_none() {
            continue;
        }
        out.insert(
            eco.to_string(),
            diff_maps(gm.as_ref().unwrap_or(&empty), dm.as_ref().unwrap_or(&empty)),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"
        <project>
          <properties>
            <spring.version>5.3.20</spring.version>
          </properties>
          <dependencies>
            <dependency>
              <groupId>org.springframework</groupId>
              <artifactId>spring-core</artifactId>
              <version>${spring.version}</version>
            </dependency>
            <dependency>
              <groupId>com.acme</groupId>
              <artifactId>acme-sdk</artifactId>
              <version>1.4.0</version>
            </dependency>
            <dependency>
              <groupId>junit</groupId>
              <artifactId>junit</artifactId>
            </dependency>
          </dependencies>
        </project>"#;

    #[test]
    fn maven_extraction_with_property_substitution() {
        let (props, deps) = maven_props_and_deps(POM);
        assert_eq!(props["spring.version"], "5.3.20");
        assert_eq!(deps["org.springframework:spring-core"], "5.3.20");
        assert_eq!(deps["com.acme:acme-sdk"], "1.4.0");
        assert_eq!(deps["junit:junit"], "");
    }

    #[test]
    fn map_diff() {
        let mut g = DependencyMap::new();
        g.insert("a:a".into(), "1".into());
        g.insert("b:b".into(), "2".into());
        let mut d = DependencyMap::new();
        d.insert("a:a".into(), "1.1".into());
        d.insert("c:c".into(), "3".into());

        let diff = diff_maps(&g, &d);
        assert_eq!(diff.added["c:c"], "3");
        assert_eq!(diff.removed["b:b"], "2");
        assert_eq!(diff.changed["a:a"].from, "1");
        assert_eq!(diff.changed["a:a"].to, "1.1");
    }

    #[test]
    fn pip_pins_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("requirements.txt"),
            "# deps\nrequests==2.31.0\nflask\n",
        )
        .unwrap();
        let out = extract_dependencies(dir.path());
        let pip = out.pip.unwrap();
        assert_eq!(pip["requests"], "2.31.0");
        assert_eq!(pip["flask"], "");
    }
}
