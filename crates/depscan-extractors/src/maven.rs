//! Maven extractor: `pom.xml`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result, Scope};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Default, Clone)]
struct PomDependency {
    group_id: String,
    artifact_id: String,
    version: String,
    scope: String,
    dep_type: String,
    classifier: String,
    optional: bool,
    exclusions: Vec<String>,
}

#[derive(Debug, Default)]
struct PomFile {
    parent_group: String,
    parent_artifact: String,
    parent_version: String,
    properties: HashMap<String, String>,
    dependencies: Vec<PomDependency>,
    profile_dependencies: Vec<(String, PomDependency)>,
    modules: Vec<String>,
}

/// Parses a POM's `parent`, `properties`, `dependencies`, `modules`,
/// and `profiles` sections. Dependency names use Maven coordinates
/// (`group:artifact[:classifier]`); exclusions become conflict
/// entries. `${property}` version references are resolved against the
/// POM's own `<properties>` table and kept textually otherwise.
/// `<modules>` are followed relative to the POM's directory up to the
/// configured depth; unresolved modules are logged and skipped.
pub struct MavenExtractor {
    config: ExtractorConfig,
}

impl MavenExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn parse_pom(&self, path: &Path, content: &str) -> Result<PomFile> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut pom = PomFile::default();
        let mut buf = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        let mut current = PomDependency::default();
        let mut exclusion_group = String::new();
        let mut exclusion_artifact = String::new();
        let mut profile_id = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                    stack.push(name.clone());
                    if name == "dependency" {
                        current = PomDependency::default();
                    } else if name == "exclusion" {
                        exclusion_group.clear();
                        exclusion_artifact.clear();
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                    match name.as_str() {
                        "dependency" => {
                            let path_tags: Vec<&str> =
                                stack.iter().map(|s| s.as_str()).collect();
                            if path_tags == ["project", "dependencies", "dependency"] {
                                pom.dependencies.push(current.clone());
                            } else if path_tags
                                == ["project", "profiles", "profile", "dependencies", "dependency"]
                            {
                                pom.profile_dependencies
                                    .push((profile_id.clone(), current.clone()));
                            }
                        }
                        "exclusion" => {
                            if !exclusion_artifact.is_empty() {
                                current
                                    .exclusions
                                    .push(format!("{exclusion_group}:{exclusion_artifact}"));
                            }
                        }
                        "profile" => profile_id.clear(),
                        _ => {}
                    }
                    stack.pop();
                }
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    let tags: Vec<&str> = stack.iter().map(|s| s.as_str()).collect();
                    match tags.as_slice() {
                        ["project", "parent", "groupId"] => pom.parent_group = text,
                        ["project", "parent", "artifactId"] => pom.parent_artifact = text,
                        ["project", "parent", "version"] => pom.parent_version = text,
                        ["project", "properties", key] => {
                            pom.properties.insert((*key).to_string(), text);
                        }
                        ["project", "modules", "module"] => pom.modules.push(text),
                        ["project", "profiles", "profile", "id"] => profile_id = text,
                        [.., "exclusions", "exclusion", "groupId"] => exclusion_group = text,
                        [.., "exclusions", "exclusion", "artifactId"] => exclusion_artifact = text,
                        [.., "dependency", field] => match *field {
                            "groupId" => current.group_id = text,
                            "artifactId" => current.artifact_id = text,
                            "version" => current.version = text,
                            "scope" => current.scope = text,
                            "type" => current.dep_type = text,
                            "classifier" => current.classifier = text,
                            "optional" => current.optional = text == "true",
                            _ => {}
                        },
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(depscan_core::Error::parse(path, e.to_string()));
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(pom)
    }

    /// Resolve `${key}` against the POM's property table; unknown keys
    /// keep the textual reference.
    fn resolve_version(version: &str, properties: &HashMap<String, String>) -> String {
        if let Some(key) = version
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            if let Some(resolved) = properties.get(key) {
                return resolved.clone();
            }
        }
        version.to_string()
    }

    fn convert(
        &self,
        dep: &PomDependency,
        properties: &HashMap<String, String>,
        path: &Path,
    ) -> Dependency {
        let mut name = format!("{}:{}", dep.group_id, dep.artifact_id);
        if !dep.classifier.is_empty() {
            name = format!("{name}:{}", dep.classifier);
        }

        let mut record = Dependency::new(name, ExtractorKind::Maven.name());
        // Category precedence: type > scope > "compile".
        record.kind = if !dep.dep_type.is_empty() {
            dep.dep_type.clone()
        } else if !dep.scope.is_empty() {
            dep.scope.clone()
        } else {
            "compile".to_string()
        };
        if !dep.version.is_empty() {
            record.version = Some(Self::resolve_version(&dep.version, properties));
        }
        record.scope = match dep.scope.as_str() {
            "test" => Some(Scope::Test),
            "provided" => Some(Scope::Optional),
            _ => None,
        };
        record.optional = dep.optional;
        record.required = !dep.optional;
        record.conflicts = dep.exclusions.clone();
        record.file_path = Some(path.to_path_buf());
        record
    }

    fn extract_pom(&self, path: &Path, depth: usize, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;
        let pom = self.parse_pom(path, &content)?;

        if !pom.parent_group.is_empty() {
            let mut parent = Dependency::new(
                format!("{}:{}", pom.parent_group, pom.parent_artifact),
                ExtractorKind::Maven.name(),
            );
            parent.kind = "parent".to_string();
            if !pom.parent_version.is_empty() {
                parent.version = Some(pom.parent_version.clone());
            }
            parent.file_path = Some(path.to_path_buf());
            deps.push(parent);
        }

        for dep in &pom.dependencies {
            deps.push(self.convert(dep, &pom.properties, path));
        }
        for (profile, dep) in &pom.profile_dependencies {
            let mut record = self.convert(dep, &pom.properties, path);
            record.insert_metadata("profile", profile.clone());
            deps.push(record);
        }

        if depth > 0 {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            for module in &pom.modules {
                let module_pom = dir.join(module).join("pom.xml");
                if !module_pom.is_file() {
                    warn!(module = %module, pom = %module_pom.display(), "skipping unresolved maven module");
                    continue;
                }
                self.extract_pom(&module_pom, depth - 1, deps)?;
            }
        }
        Ok(())
    }
}

impl Extractor for MavenExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Maven
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["pom.xml"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "pom.xml"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let mut deps = Vec::new();
        self.extract_pom(file_path, self.config.max_depth, &mut deps)?;
        Ok(deps)
    }
}
