//! Yarn extractor: `yarn.lock` (plus an adjacent `.yarnrc.yml`).
//!
//! Manifest semantics for Yarn projects are identical to NPM and are
//! handled by the `package.json` extractor; this one owns the lockfile.

use crate::config::ExtractorConfig;
use crate::npm::under_node_modules;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result};
use std::path::Path;
use tracing::debug;

/// Parses the YAML lockfile: every `name@spec` block becomes a
/// `locked` record with its pinned version, resolution, integrity
/// hash, and `transitive` children.
pub struct YarnExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
}

/// Package name of a lockfile key: the part before the spec `@`,
/// honoring a leading `@scope/`. Comma-separated key lists use their
/// first entry.
fn key_name(key: &str) -> Option<String> {
    let first = key.split(',').next()?.trim();
    let split_at = if let Some(rest) = first.strip_prefix('@') {
        rest.find('@').map(|i| i + 1)
    } else {
        first.find('@')
    };
    let name = match split_at {
        Some(idx) => &first[..idx],
        None => first,
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

impl YarnExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn child_records(
        map: Option<&serde_yaml::Value>,
        required: bool,
        path: &Path,
        out: &mut Vec<Dependency>,
    ) {
        let Some(serde_yaml::Value::Mapping(map)) = map else {
            return;
        };
        for (sub_name, sub_version) in map {
            let (Some(name), Some(version)) = (sub_name.as_str(), sub_version.as_str()) else {
                continue;
            };
            let mut child = Dependency::new(name, ExtractorKind::Yarn.name());
            child.kind = "transitive".to_string();
            child.version = Some(version.to_string());
            child.required = required;
            child.optional = !required;
            child.file_path = Some(path.to_path_buf());
            out.push(child);
        }
    }
}

impl Extractor for YarnExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Yarn
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["yarn.lock"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "yarn.lock" && !under_node_modules(path)
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|e| Error::parse(file_path, e.to_string()))?;

        let serde_yaml::Value::Mapping(entries) = doc else {
            return Err(Error::schema(file_path, "lockfile root is not a mapping"));
        };

        let mut deps = Vec::new();
        for (key, value) in &entries {
            let Some(key) = key.as_str() else { continue };
            if key.starts_with("__") {
                continue;
            }
            let Some(name) = key_name(key) else { continue };
            if !value.is_mapping() {
                continue;
            }

            let field = |k: &str| value.get(k);

            let mut dep = Dependency::new(name, ExtractorKind::Yarn.name());
            dep.kind = "locked".to_string();
            dep.version = field("version").and_then(|v| v.as_str()).map(String::from);
            dep.source = field("resolution")
                .or_else(|| field("resolved"))
                .and_then(|v| v.as_str())
                .map(String::from);
            dep.file_path = Some(file_path.to_path_buf());
            if let Some(integrity) = field("integrity").and_then(|v| v.as_str()) {
                dep.insert_metadata("integrity", integrity.to_string());
            }
            Self::child_records(field("dependencies"), true, file_path, &mut dep.dependencies);
            Self::child_records(
                field("optionalDependencies"),
                false,
                file_path,
                &mut dep.dependencies,
            );
            deps.push(dep);
        }

        // Yarn Berry keeps linker settings beside the lockfile; they
        // carry no dependencies but are useful context when debugging.
        let yarnrc = file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(".yarnrc.yml");
        if yarnrc.is_file() {
            if let Ok(content) = std::fs::read_to_string(&yarnrc) {
                if let Ok(serde_yaml::Value::Mapping(rc)) =
                    serde_yaml::from_str::<serde_yaml::Value>(&content)
                {
                    let linker = rc
                        .get(serde_yaml::Value::from("nodeLinker"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("node-modules");
                    debug!(node_linker = linker, file = %yarnrc.display(), "yarn configuration");
                }
            }
        }

        Ok(deps)
    }
}
