//! NuGet extractor: `*.csproj` / `*.fsproj` / `*.vbproj`, refined by
//! `obj/project.assets.json` and supplemented by `packages.config`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct AssetsFile {
    #[serde(default)]
    targets: BTreeMap<String, BTreeMap<String, AssetsTarget>>,
    #[serde(default)]
    libraries: BTreeMap<String, AssetsLibrary>,
}

#[derive(Debug, Deserialize)]
struct AssetsTarget {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AssetsLibrary {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    sha512: Option<String>,
}

/// Collects `<PackageReference Include= Version=/>` entries from the
/// project file, refines them from `project.assets.json` (resolved
/// version, package path as source, sha512, dependency map), and adds
/// packages from `packages.config` that the project file did not
/// already declare (`developmentDependency="true"` marks dev scope).
pub struct NugetExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
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

impl NugetExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn parse_project(&self, path: &Path, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;
        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.name().local_name().as_ref() == b"PackageReference" {
                        if let Some(include) = attr(e, "Include") {
                            let mut dep = Dependency::new(include, ExtractorKind::Nuget.name());
                            dep.kind = "nuget".to_string();
                            dep.version = attr(e, "Version").filter(|v| !v.is_empty());
                            dep.file_path = Some(path.to_path_buf());
                            deps.push(dep);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::parse(path, e.to_string())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn apply_assets(&self, assets_path: &Path, deps: &mut [Dependency]) -> Result<()> {
        let content = read_manifest(assets_path)?;
        let assets: AssetsFile =
            serde_json::from_str(&content).map_err(|e| Error::schema(assets_path, e.to_string()))?;

        for dep in deps.iter_mut() {
            for (lib_key, lib) in &assets.libraries {
                let Some((name, version)) = lib_key.split_once('/') else {
                    continue;
                };
                if name != dep.name {
                    continue;
                }
                dep.version = Some(version.to_string());
                if let Some(path) = &lib.path {
                    dep.source = Some(path.clone());
                }
                if let Some(sha) = &lib.sha512 {
                    dep.insert_metadata("sha512", sha.clone());
                }
                break;
            }

            'targets: for target in assets.targets.values() {
                for (pkg_key, pkg) in target {
                    let Some((name, _)) = pkg_key.split_once('/') else {
                        continue;
                    };
                    if name == dep.name {
                        if !pkg.dependencies.is_empty() {
                            dep.insert_metadata(
                                "dependencies",
                                serde_json::json!(pkg.dependencies),
                            );
                        }
                        break 'targets;
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_packages_config(&self, path: &Path, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;
        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.name().local_name().as_ref() == b"package" {
                        let Some(id) = attr(e, "id") else { continue };
                        if deps.iter().any(|d| d.name == id) {
                            continue;
                        }
                        let mut dep = Dependency::new(id, ExtractorKind::Nuget.name());
                        dep.kind = "nuget".to_string();
                        dep.version = attr(e, "version").filter(|v| !v.is_empty());
                        if attr(e, "developmentDependency").as_deref() == Some("true") {
                            dep.scope = Some(Scope::Dev);
                        }
                        if let Some(framework) = attr(e, "targetFramework") {
                            dep.insert_metadata("targetFramework", framework);
                        }
                        dep.file_path = Some(path.to_path_buf());
                        deps.push(dep);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::parse(path, e.to_string())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }
}

impl Extractor for NugetExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Nuget
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["*.csproj", "*.fsproj", "*.vbproj"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        let name = file_name(path);
        name.ends_with(".csproj") || name.ends_with(".fsproj") || name.ends_with(".vbproj")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let mut deps = Vec::new();
        self.parse_project(file_path, &mut deps)?;

        let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
        let assets_path = dir.join("obj").join("project.assets.json");
        if assets_path.is_file() {
            if let Err(e) = self.apply_assets(&assets_path, &mut deps) {
                warn!(file = %assets_path.display(), error = %e, "skipping nuget assets file");
            }
        }

        let packages_config = dir.join("packages.config");
        if packages_config.is_file() {
            if let Err(e) = self.parse_packages_config(&packages_config, &mut deps) {
                warn!(file = %packages_config.display(), error = %e, "skipping packages.config");
            }
        }
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extract_at(dir: &Path, project: &str) -> Vec<Dependency> {
        let path = dir.join("app.csproj");
        std::fs::write(&path, project).unwrap();
        NugetExtractor::new(ExtractorConfig::default())
            .extract(dir, &path)
            .unwrap()
    }

    const PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="13.0.1" />
    <PackageReference Include="Serilog" Version="2.12.0" />
  </ItemGroup>
</Project>"#;

    #[test]
    fn package_references_extracted() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(dir.path(), PROJECT);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "Newtonsoft.Json");
        assert_eq!(deps[0].version.as_deref(), Some("13.0.1"));
    }

    #[test]
    fn assets_file_refines_versions() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("obj")).unwrap();
        std::fs::write(
            dir.path().join("obj/project.assets.json"),
            r#"{
  "version": 3,
  "targets": {
    "net7.0": {
      "Newtonsoft.Json/13.0.3": {
        "type": "package",
        "dependencies": { "System.Text.Json": "7.0.0" }
      }
    }
  },
  "libraries": {
    "Newtonsoft.Json/13.0.3": {
      "type": "package",
      "path": "newtonsoft.json/13.0.3",
      "sha512": "sha512-xyz"
    }
  }
}"#,
        )
        .unwrap();

        let deps = extract_at(dir.path(), PROJECT);
        let newtonsoft = deps.iter().find(|d| d.name == "Newtonsoft.Json").unwrap();
        assert_eq!(newtonsoft.version.as_deref(), Some("13.0.3"));
        assert_eq!(newtonsoft.source.as_deref(), Some("newtonsoft.json/13.0.3"));
        assert_eq!(newtonsoft.metadata["sha512"], "sha512-xyz");
        assert_eq!(
            newtonsoft.metadata["dependencies"]["System.Text.Json"],
            "7.0.0"
        );
    }

    #[test]
    fn packages_config_adds_missing_packages() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("packages.config"),
            r#"<?xml version="1.0"?>
<packages>
  <package id="Newtonsoft.Json" version="12.0.0" />
  <package id="NUnit" version="3.13.3" developmentDependency="true" targetFramework="net472" />
</packages>"#,
        )
        .unwrap();

        let deps = extract_at(dir.path(), PROJECT);
        // Newtonsoft.Json already came from the project file and keeps
        // its declared version.
        let newtonsoft = deps.iter().find(|d| d.name == "Newtonsoft.Json").unwrap();
        assert_eq!(newtonsoft.version.as_deref(), Some("13.0.1"));

        let nunit = deps.iter().find(|d| d.name == "NUnit").unwrap();
        assert_eq!(nunit.version.as_deref(), Some("3.13.3"));
        assert_eq!(nunit.scope, Some(Scope::Dev));
        assert_eq!(nunit.metadata["targetFramework"], "net472");
    }
}
