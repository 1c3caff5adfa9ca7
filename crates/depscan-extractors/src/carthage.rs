//! Carthage extractor: `Cartfile` with its `Cartfile.resolved`.

use crate::cocoapods::has_testing_suffix;
use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use regex::Regex;
use std::path::Path;

/// Parses the Cartfile line grammar (`origin "ref" "version"`), one
/// record per resolved dependency. Versions are normalized: a leading
/// `v` is stripped and a 40-hex SHA becomes `commit=...`. Binary
/// origins rewrite the source as `binary=URL`. Requirement operators
/// from the Cartfile and the platform directories under
/// `Carthage/Build` are attached as metadata.
pub struct CarthageExtractor {
    config: ExtractorConfig,
    entry: Regex,
    requirement: Regex,
}

fn is_commit_sha(version: &str) -> bool {
    version.len() == 40 && version.chars().all(|c| c.is_ascii_hexdigit())
}

/// Short name of a dependency ref: the last path segment, without
/// `.git` / `.json` suffixes.
fn short_name(reference: &str) -> String {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    last.trim_end_matches(".git")
        .trim_end_matches(".json")
        .to_string()
}

impl CarthageExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            entry: Regex::new(r#"^(github|git|binary)\s+"([^"]+)"\s+"([^"]+)""#).unwrap(),
            requirement: Regex::new(r#"^(github|git|binary)\s+"([^"]+)"\s+(.+)$"#).unwrap(),
        }
    }

    fn convert(&self, origin: &str, reference: &str, raw_version: &str, path: &Path) -> Dependency {
        let mut dep = Dependency::new(short_name(reference), ExtractorKind::Carthage.name());
        dep.kind = "carthage".to_string();
        dep.file_path = Some(path.to_path_buf());

        dep.version = Some(if is_commit_sha(raw_version) {
            dep.commit = Some(raw_version.to_string());
            format!("commit={raw_version}")
        } else {
            raw_version.strip_prefix('v').unwrap_or(raw_version).to_string()
        });

        match origin {
            "github" => {
                dep.source = Some(reference.to_string());
                dep.repository = Some(format!("https://github.com/{reference}"));
            }
            "git" => {
                dep.source = Some(reference.to_string());
                dep.repository = Some(reference.to_string());
            }
            "binary" => {
                dep.source = Some(format!("binary={reference}"));
            }
            _ => {}
        }

        if has_testing_suffix(&dep.name) {
            dep.scope = Some(Scope::Dev);
        }
        dep
    }
}

impl Extractor for CarthageExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Carthage
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["Cartfile"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "Cartfile"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
        let resolved_path = dir.join("Cartfile.resolved");
        if !resolved_path.is_file() {
            return Err(Error::MissingFile {
                path: resolved_path,
            });
        }

        let mut deps = Vec::new();
        let resolved = read_manifest(&resolved_path)?;
        for raw in resolved.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(caps) = self.entry.captures(line) {
                deps.push(self.convert(&caps[1], &caps[2], &caps[3], &resolved_path));
            }
        }

        if self.config.ignore_tests {
            deps.retain(|d| d.scope != Some(Scope::Dev));
        }

        // The Cartfile holds the declared requirements; keep them as
        // metadata beside the resolved versions.
        let cartfile = read_manifest(file_path)?;
        for raw in cartfile.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(caps) = self.requirement.captures(line) else {
                continue;
            };
            let name = short_name(&caps[2]);
            let requirement = caps[3].trim().trim_matches('"').to_string();
            if let Some(dep) = deps.iter_mut().find(|d| d.name == name) {
                dep.insert_metadata("requirement", requirement);
            }
        }

        // Built platform directories apply to every record.
        let build_dir = dir.join("Carthage").join("Build");
        if build_dir.is_dir() {
            let mut platforms: Vec<String> = std::fs::read_dir(&build_dir)
                .map_err(|e| Error::io(&build_dir, e))?
                .flatten()
                .filter(|entry| entry.path().is_dir())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect();
            platforms.sort();
            if !platforms.is_empty() {
                for dep in &mut deps {
                    dep.insert_metadata("platforms", platforms.clone());
                }
            }
        }

        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(cartfile: &str, resolved: &str) -> (TempDir, Vec<Dependency>) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Cartfile"), cartfile).unwrap();
        std::fs::write(dir.path().join("Cartfile.resolved"), resolved).unwrap();
        let deps = CarthageExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &dir.path().join("Cartfile"))
            .unwrap();
        (dir, deps)
    }

    #[test]
    fn resolved_entries_normalize_versions() {
        let (_dir, deps) = setup(
            "github \"Alamofire/Alamofire\" ~> 5.6\n",
            "github \"Alamofire/Alamofire\" \"v5.6.4\"\n\
             git \"https://example.com/tools.git\" \"8843d7f92416211de9ebb963ff4ce28125932878\"\n",
        );
        assert_eq!(deps[0].name, "Alamofire");
        assert_eq!(deps[0].version.as_deref(), Some("5.6.4"));
        assert_eq!(
            deps[0].repository.as_deref(),
            Some("https://github.com/Alamofire/Alamofire")
        );
        assert_eq!(deps[1].name, "tools");
        assert_eq!(
            deps[1].version.as_deref(),
            Some("commit=8843d7f92416211de9ebb963ff4ce28125932878")
        );
    }

    #[test]
    fn binary_sources_rewritten() {
        let (_dir, deps) = setup(
            "",
            "binary \"https://example.com/framework.json\" \"2.3.0\"\n",
        );
        assert_eq!(deps[0].name, "framework");
        assert_eq!(
            deps[0].source.as_deref(),
            Some("binary=https://example.com/framework.json")
        );
    }

    #[test]
    fn cartfile_requirements_attached() {
        let (_dir, deps) = setup(
            "github \"Alamofire/Alamofire\" ~> 5.6\n",
            "github \"Alamofire/Alamofire\" \"5.6.4\"\n",
        );
        assert_eq!(deps[0].metadata["requirement"], "~> 5.6");
    }

    #[test]
    fn build_platforms_surface_as_metadata() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Cartfile"), "").unwrap();
        std::fs::write(
            dir.path().join("Cartfile.resolved"),
            "github \"a/b\" \"1.0.0\"\n",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("Carthage/Build/iOS")).unwrap();
        std::fs::create_dir_all(dir.path().join("Carthage/Build/Mac")).unwrap();

        let deps = CarthageExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &dir.path().join("Cartfile"))
            .unwrap();
        assert_eq!(deps[0].metadata["platforms"], serde_json::json!(["Mac", "iOS"]));
    }

    #[test]
    fn missing_resolved_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Cartfile"), "").unwrap();
        let err = CarthageExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &dir.path().join("Cartfile"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingFile { .. }));
    }

    #[test]
    fn testing_suffix_marks_dev() {
        let (_dir, deps) = setup("", "github \"acme/AcmeMock\" \"1.0.0\"\n");
        assert_eq!(deps[0].scope, Some(Scope::Dev));
    }
}
