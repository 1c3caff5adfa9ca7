//! Ant extractor: `build.xml`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::warn;

/// Parses the root `<project>`'s `<dependency>` children, follows
/// `<import file="..."/>` references recursively, scans `<property
/// file="..."/>` files whose name contains "dependencies" for
/// `KEY=name:version` / `KEY=lib/name-version.jar` lines, and turns
/// `<path><location>` entries ending in `.jar` into JAR records whose
/// name and version come from the file name (last `-` token is the
/// version).
pub struct AntExtractor {
    config: ExtractorConfig,
}

/// Split `name-version.jar` into its name and version parts.
fn parse_jar_location(location: &str) -> Option<(String, String)> {
    let base = Path::new(location).file_name()?.to_str()?;
    let base = base.strip_suffix(".jar")?;
    match base.rsplit_once('-') {
        Some((name, version)) => Some((name.to_string(), version.to_string())),
        None => Some((base.to_string(), String::new())),
    }
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == name.as_bytes() {
            String::from_utf8(a.value.into_owned()).ok()
        } else {
            None
        }
    })
}

impl AntExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn jar_record(&self, name: String, version: String, path: &Path) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Ant.name());
        dep.kind = "jar".to_string();
        if !version.is_empty() {
            dep.version = Some(version);
        }
        dep.file_path = Some(path.to_path_buf());
        dep
    }

    fn parse_property_file(&self, path: &Path, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((_, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            if value.ends_with(".jar") {
                if let Some((name, version)) = parse_jar_location(value) {
                    deps.push(self.jar_record(name, version, path));
                }
            } else if let Some((name, version)) = value.split_once(':') {
                if !name.is_empty() {
                    deps.push(self.jar_record(name.to_string(), version.to_string(), path));
                }
            }
        }
        Ok(())
    }

    fn parse_build_file(&self, path: &Path, depth: usize, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;
        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(true);

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut buf = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        let mut in_path_block = false;
        let mut imports: Vec<String> = Vec::new();
        let mut property_files: Vec<String> = Vec::new();

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => return Err(depscan_core::Error::parse(path, e.to_string())),
            };
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                    match name.as_str() {
                        "dependency" => {
                            if let Some(dep_name) = attr(e, "name") {
                                let mut dep =
                                    Dependency::new(dep_name, ExtractorKind::Ant.name());
                                dep.kind = attr(e, "type").unwrap_or_else(|| "jar".to_string());
                                dep.version = attr(e, "version").filter(|v| !v.is_empty());
                                dep.required =
                                    attr(e, "required").map(|r| r == "true").unwrap_or(true);
                                dep.file_path = Some(path.to_path_buf());
                                deps.push(dep);
                            }
                        }
                        "import" => {
                            if let Some(file) = attr(e, "file") {
                                imports.push(file);
                            }
                        }
                        "property" => {
                            if let Some(file) = attr(e, "file") {
                                if file.contains("dependencies") {
                                    property_files.push(file);
                                }
                            }
                        }
                        "path" => in_path_block = true,
                        _ => {}
                    }
                    if matches!(event, Event::Start(_)) {
                        stack.push(name);
                    }
                }
                Event::End(ref e) => {
                    if e.name().local_name().as_ref() == b"path" {
                        in_path_block = false;
                    }
                    stack.pop();
                }
                Event::Text(ref e) => {
                    if in_path_block && stack.last().map(|s| s.as_str()) == Some("location") {
                        let location = e.unescape().unwrap_or_default().trim().to_string();
                        if location.ends_with(".jar") {
                            if let Some((name, version)) = parse_jar_location(&location) {
                                deps.push(self.jar_record(name, version, path));
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        for file in property_files {
            let property_path = dir.join(&file);
            if let Err(e) = self.parse_property_file(&property_path, deps) {
                warn!(file = %property_path.display(), error = %e, "skipping ant property file");
            }
        }

        if depth > 0 {
            for file in imports {
                let import_path = dir.join(&file);
                if !import_path.is_file() {
                    warn!(file = %import_path.display(), "skipping unresolved ant import");
                    continue;
                }
                self.parse_build_file(&import_path, depth - 1, deps)?;
            }
        }
        Ok(())
    }
}

impl Extractor for AntExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Ant
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["build.xml"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "build.xml"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let mut deps = Vec::new();
        self.parse_build_file(file_path, self.config.max_depth, &mut deps)?;
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extract_at(dir: &Path, content: &str) -> Vec<Dependency> {
        let path = dir.join("build.xml");
        std::fs::write(&path, content).unwrap();
        AntExtractor::new(ExtractorConfig::default())
            .extract(dir, &path)
            .unwrap()
    }

    #[test]
    fn dependency_elements_extracted() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(
            dir.path(),
            r#"<project name="demo">
  <dependencies>
    <dependency name="log4j" version="2.17.1" type="jar"/>
    <dependency name="optional-lib" version="1.0" required="false"/>
  </dependencies>
</project>"#,
        );
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "log4j");
        assert_eq!(deps[0].version.as_deref(), Some("2.17.1"));
        assert!(deps[0].required);
        assert!(!deps[1].required);
    }

    #[test]
    fn jar_path_locations_parse_name_and_version() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(
            dir.path(),
            r#"<project>
  <path id="classpath">
    <location>lib/commons-io-2.11.0.jar</location>
    <location>lib/README.txt</location>
  </path>
</project>"#,
        );
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "commons-io");
        assert_eq!(deps[0].version.as_deref(), Some("2.11.0"));
        assert_eq!(deps[0].kind, "jar");
    }

    #[test]
    fn imports_are_followed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("common.xml"),
            r#"<project><dependencies><dependency name="guava" version="31.1"/></dependencies></project>"#,
        )
        .unwrap();
        let deps = extract_at(
            dir.path(),
            r#"<project><import file="common.xml"/></project>"#,
        );
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "guava");
    }

    #[test]
    fn dependencies_property_file_scanned() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("dependencies.properties"),
            "# managed deps\njunit.dependency=junit:4.13.2\nmockito=lib/mockito-core-4.5.1.jar\n",
        )
        .unwrap();
        let deps = extract_at(
            dir.path(),
            r#"<project><property file="dependencies.properties"/></project>"#,
        );
        let got: Vec<(&str, Option<&str>)> = deps
            .iter()
            .map(|d| (d.name.as_str(), d.version.as_deref()))
            .collect();
        assert_eq!(
            got,
            [
                ("junit", Some("4.13.2")),
                ("mockito-core", Some("4.5.1")),
            ]
        );
    }

    #[test]
    fn missing_import_is_skipped() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(
            dir.path(),
            r#"<project><import file="missing.xml"/></project>"#,
        );
        assert!(deps.is_empty());
    }
}
