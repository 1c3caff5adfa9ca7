//! vcpkg extractor: `vcpkg.json`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct VcpkgManifest {
    #[serde(default)]
    dependencies: Vec<VcpkgEntry>,
    #[serde(default)]
    features: HashMap<String, VcpkgFeature>,
    #[serde(default)]
    overrides: Vec<VcpkgDependency>,
}

#[derive(Debug, Deserialize)]
struct VcpkgFeature {
    #[serde(default)]
    description: String,
    #[serde(default)]
    dependencies: Vec<VcpkgEntry>,
}

/// Dependencies appear either as a bare name or as an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VcpkgEntry {
    Name(String),
    Detailed(VcpkgDependency),
}

#[derive(Debug, Deserialize)]
struct VcpkgDependency {
    name: String,
    #[serde(default, rename = "version-string")]
    version_string: Option<String>,
    #[serde(default, rename = "version-semver")]
    version_semver: Option<String>,
    #[serde(default, rename = "version-date")]
    version_date: Option<String>,
    #[serde(default, rename = "port-version")]
    port_version: Option<serde_json::Value>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    platform: Option<String>,
}

impl VcpkgDependency {
    /// Version key precedence: `version-string` > `version-semver` >
    /// `version-date`.
    fn version(&self) -> Option<&String> {
        self.version_string
            .as_ref()
            .or(self.version_semver.as_ref())
            .or(self.version_date.as_ref())
    }
}

/// Parses the vcpkg manifest: top-level `dependencies`, per-feature
/// dependency lists (emitted as `feature` + optional), and version
/// `overrides`.
pub struct VcpkgExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
}

impl VcpkgExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn convert(&self, entry: &VcpkgEntry, path: &Path) -> Dependency {
        match entry {
            VcpkgEntry::Name(name) => {
                let mut dep = Dependency::new(name, ExtractorKind::Vcpkg.name());
                dep.kind = "library".to_string();
                dep.file_path = Some(path.to_path_buf());
                dep
            }
            VcpkgEntry::Detailed(detailed) => {
                let mut dep = self.convert_detailed(detailed, path);
                dep.kind = "library".to_string();
                dep
            }
        }
    }

    fn convert_detailed(&self, detailed: &VcpkgDependency, path: &Path) -> Dependency {
        let mut dep = Dependency::new(&detailed.name, ExtractorKind::Vcpkg.name());
        dep.version = detailed.version().cloned();
        dep.file_path = Some(path.to_path_buf());
        if !detailed.features.is_empty() {
            dep.insert_metadata("features", detailed.features.clone());
        }
        if let Some(platform) = &detailed.platform {
            dep.insert_metadata("platforms", vec![platform.clone()]);
        }
        if let Some(port) = &detailed.port_version {
            dep.insert_metadata("port_version", port.clone());
        }
        dep
    }
}

impl Extractor for VcpkgExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Vcpkg
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["vcpkg.json"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "vcpkg.json"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let manifest: VcpkgManifest =
            serde_json::from_str(&content).map_err(|e| Error::schema(file_path, e.to_string()))?;

        let mut deps = Vec::new();

        for entry in &manifest.dependencies {
            deps.push(self.convert(entry, file_path));
        }

        for (feature_name, feature) in &manifest.features {
            for entry in &feature.dependencies {
                let mut dep = self.convert(entry, file_path);
                dep.kind = "feature".to_string();
                dep.optional = true;
                dep.scope = Some(Scope::Optional);
                dep.parent = Some(feature_name.clone());
                if !feature.description.is_empty() {
                    dep.insert_metadata("feature_description", feature.description.clone());
                }
                deps.push(dep);
            }
        }

        for override_entry in &manifest.overrides {
            let mut dep = self.convert_detailed(override_entry, file_path);
            dep.kind = "override".to_string();
            deps.push(dep);
        }

        Ok(deps)
    }
}
