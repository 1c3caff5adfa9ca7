//! NPM extractor: `package.json` plus a sibling `package-lock.json`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "optionalDependencies")]
    optional_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    workspaces: Option<WorkspaceConfig>,
}

/// Workspaces come as a bare list or as `{ "packages": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkspaceConfig {
    Simple(Vec<String>),
    Extended {
        packages: Vec<String>,
    },
}

impl WorkspaceConfig {
    fn patterns(&self) -> &[String] {
        match self {
            WorkspaceConfig::Simple(patterns) => patterns,
            WorkspaceConfig::Extended { packages } => packages,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackageLock {
    /// v1 lockfiles key entries by package name.
    #[serde(default)]
    dependencies: BTreeMap<String, LockEntry>,
    /// v2/v3 lockfiles key entries by `node_modules/<name>` path.
    #[serde(default)]
    packages: BTreeMap<String, LockEntry>,
}

#[derive(Debug, Deserialize)]
struct LockEntry {
    #[serde(default)]
    version: String,
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    integrity: Option<String>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

/// Parses the four dependency maps of `package.json`, glob-expands
/// `workspaces` entries and recurses into each member manifest, and
/// emits `locked` records (with `transitive` children) from a sibling
/// `package-lock.json` when one exists. Anything under `node_modules`
/// is skipped.
pub struct NpmExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
}

/// Strip range prefixes for normalized output; URLs, file specs, git
/// specs, and dist-tags pass through unchanged.
pub(crate) fn clean_version(version: &str) -> String {
    let version = version.trim();
    if version.contains("://")
        || version.starts_with("file:")
        || version.contains("git")
        || version.contains("github")
        || version.starts_with("latest")
        || version.starts_with("next")
    {
        return version.to_string();
    }
    for prefix in [">=", "<=", "^", "~", ">", "<", "="] {
        if let Some(stripped) = version.strip_prefix(prefix) {
            return stripped.trim().to_string();
        }
    }
    version.to_string()
}

pub(crate) fn under_node_modules(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
}

impl NpmExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn map_records(
        &self,
        map: &BTreeMap<String, String>,
        kind: &str,
        scope: Option<Scope>,
        required: bool,
        path: &Path,
        deps: &mut Vec<Dependency>,
    ) {
        for (name, version) in map {
            let mut dep = Dependency::new(name, ExtractorKind::Npm.name());
            dep.kind = kind.to_string();
            dep.version = Some(clean_version(version));
            dep.scope = scope;
            dep.required = required;
            dep.optional = !required;
            dep.file_path = Some(path.to_path_buf());
            deps.push(dep);
        }
    }

    fn parse_manifest(&self, path: &Path, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;
        let pkg: PackageJson =
            serde_json::from_str(&content).map_err(|e| Error::schema(path, e.to_string()))?;

        self.map_records(&pkg.dependencies, "production", None, true, path, deps);
        self.map_records(
            &pkg.dev_dependencies,
            "development",
            Some(Scope::Dev),
            true,
            path,
            deps,
        );
        self.map_records(
            &pkg.peer_dependencies,
            "peer",
            Some(Scope::Peer),
            true,
            path,
            deps,
        );
        self.map_records(
            &pkg.optional_dependencies,
            "optional",
            Some(Scope::Optional),
            false,
            path,
            deps,
        );

        if let Some(workspaces) = &pkg.workspaces {
            self.expand_workspaces(path, workspaces.patterns(), deps);
        }
        Ok(())
    }

    /// Glob-expand workspace patterns relative to the manifest and
    /// recurse into each member's `package.json`.
    fn expand_workspaces(&self, manifest: &Path, patterns: &[String], deps: &mut Vec<Dependency>) {
        let dir = manifest.parent().unwrap_or_else(|| Path::new("."));
        for pattern in patterns {
            let full_pattern = dir.join(pattern).to_string_lossy().into_owned();
            let entries = match glob::glob(&full_pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "bad npm workspace pattern");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let member_manifest = entry.join("package.json");
                if !member_manifest.is_file() {
                    continue;
                }
                if let Err(e) = self.parse_manifest(&member_manifest, deps) {
                    warn!(file = %member_manifest.display(), error = %e, "skipping workspace manifest");
                }
            }
        }
    }

    fn parse_lockfile(&self, path: &Path, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;
        let lock: PackageLock =
            serde_json::from_str(&content).map_err(|e| Error::schema(path, e.to_string()))?;

        // v1 entries are keyed by name directly; v2/v3 entries carry a
        // node_modules/ path prefix and include the root package as "".
        let entries: Vec<(String, &LockEntry)> = if !lock.dependencies.is_empty() {
            lock.dependencies
                .iter()
                .map(|(name, entry)| (name.clone(), entry))
                .collect()
        } else {
            lock.packages
                .iter()
                .filter_map(|(key, entry)| {
                    let name = key.strip_prefix("node_modules/")?;
                    Some((name.to_string(), entry))
                })
                .collect()
        };

        for (name, entry) in entries {
            let mut dep = Dependency::new(name, ExtractorKind::Npm.name());
            dep.kind = "locked".to_string();
            dep.version = Some(entry.version.clone());
            dep.required = !entry.optional;
            dep.optional = entry.optional;
            dep.source = entry.resolved.clone();
            dep.file_path = Some(path.to_path_buf());
            if let Some(integrity) = &entry.integrity {
                dep.insert_metadata("integrity", integrity.clone());
            }
            for (sub_name, sub_version) in &entry.dependencies {
                let mut child = Dependency::new(sub_name, ExtractorKind::Npm.name());
                child.kind = "transitive".to_string();
                child.version = sub_version.as_str().map(|v| v.to_string());
                child.file_path = Some(path.to_path_buf());
                dep.dependencies.push(child);
            }
            deps.push(dep);
        }
        Ok(())
    }
}

impl Extractor for NpmExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Npm
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["package.json"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "package.json" && !under_node_modules(path)
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        if under_node_modules(file_path) {
            return Ok(Vec::new());
        }

        let mut deps = Vec::new();
        self.parse_manifest(file_path, &mut deps)?;

        let lockfile = file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("package-lock.json");
        if lockfile.is_file() {
            if let Err(e) = self.parse_lockfile(&lockfile, &mut deps) {
                warn!(file = %lockfile.display(), error = %e, "skipping npm lockfile");
            }
        }
        Ok(deps)
    }
}
