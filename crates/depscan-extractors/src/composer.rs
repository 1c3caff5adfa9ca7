//! Composer extractor: `composer.json` plus a sibling `composer.lock`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ComposerJson {
    #[serde(default)]
    require: BTreeMap<String, String>,
    #[serde(default, rename = "require-dev")]
    require_dev: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<ComposerPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<ComposerPackage>,
}

#[derive(Debug, Deserialize)]
struct ComposerPackage {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    source: Option<ComposerSource>,
    #[serde(default)]
    require: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ComposerSource {
    #[serde(default, rename = "type")]
    source_type: String,
    #[serde(default)]
    url: String,
}

/// Parses `require` and `require-dev`, skipping the `php` platform
/// requirement and `ext-*` extensions. Lockfile pins from `packages` /
/// `packages-dev` overwrite versions, set `source` to `type+url`, and
/// carry the locked package's own `require` map as metadata.
pub struct ComposerExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
}

fn is_platform_requirement(name: &str) -> bool {
    name == "php" || name.starts_with("ext-")
}

impl ComposerExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn apply_lock_packages(packages: &[ComposerPackage], scope: Option<Scope>, deps: &mut [Dependency]) {
        for pkg in packages {
            for dep in deps.iter_mut() {
                if dep.name != pkg.name || dep.scope != scope {
                    continue;
                }
                dep.version = Some(pkg.version.clone());
                if let Some(source) = &pkg.source {
                    if !source.source_type.is_empty() && !source.url.is_empty() {
                        dep.source = Some(format!("{}+{}", source.source_type, source.url));
                    }
                }
                if !pkg.require.is_empty() {
                    dep.insert_metadata("require", serde_json::json!(pkg.require));
                }
                break;
            }
        }
    }
}

impl Extractor for ComposerExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Composer
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["composer.json"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "composer.json"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let config: ComposerJson =
            serde_json::from_str(&content).map_err(|e| Error::schema(file_path, e.to_string()))?;

        let mut deps = Vec::new();
        for (name, version) in &config.require {
            if is_platform_requirement(name) {
                continue;
            }
            let mut dep = Dependency::new(name, ExtractorKind::Composer.name());
            dep.kind = "composer".to_string();
            dep.version = Some(version.clone());
            dep.file_path = Some(file_path.to_path_buf());
            deps.push(dep);
        }
        for (name, version) in &config.require_dev {
            if is_platform_requirement(name) {
                continue;
            }
            let mut dep = Dependency::new(name, ExtractorKind::Composer.name());
            dep.kind = "composer".to_string();
            dep.version = Some(version.clone());
            dep.scope = Some(Scope::Dev);
            dep.file_path = Some(file_path.to_path_buf());
            deps.push(dep);
        }

        let lock_path = file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("composer.lock");
        if lock_path.is_file() {
            match read_manifest(&lock_path)
                .and_then(|c| {
                    serde_json::from_str::<ComposerLock>(&c)
                        .map_err(|e| Error::schema(&lock_path, e.to_string()))
                }) {
                Ok(lock) => {
                    Self::apply_lock_packages(&lock.packages, None, &mut deps);
                    Self::apply_lock_packages(&lock.packages_dev, Some(Scope::Dev), &mut deps);
                }
                Err(e) => {
                    warn!(file = %lock_path.display(), error = %e, "skipping composer lockfile")
                }
            }
        }
        Ok(deps)
    }
}
