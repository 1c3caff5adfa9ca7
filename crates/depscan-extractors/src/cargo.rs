//! Cargo extractor: `Cargo.toml` plus a sibling `Cargo.lock`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use std::path::Path;
use toml::Value;
use tracing::warn;

/// Parses `[dependencies]` and `[dev-dependencies]`. A value is either
/// a version string or a table with `{version, git, branch, rev,
/// features}`; git sources encode their reference selection in the
/// version field (`branch=X`, `rev=Y`, or the raw version). When a
/// `Cargo.lock` sits beside the manifest, resolved versions overwrite
/// the declared ones and `source` comes from the lock entry.
pub struct CargoExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
}

impl CargoExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn parse_dependency(
        &self,
        name: &str,
        value: &Value,
        scope: Option<Scope>,
        path: &Path,
    ) -> Result<Dependency> {
        let mut dep = Dependency::new(name, ExtractorKind::Cargo.name());
        dep.kind = "cargo".to_string();
        dep.scope = scope;
        dep.file_path = Some(path.to_path_buf());

        match value {
            Value::String(version) => {
                dep.version = Some(version.clone());
            }
            Value::Table(table) => {
                dep.version = table
                    .get("version")
                    .and_then(|v| v.as_str())
                    .map(String::from);

                if let Some(git) = table.get("git").and_then(|v| v.as_str()) {
                    dep.source = Some(git.to_string());
                    dep.repository = Some(git.to_string());
                    if let Some(branch) = table.get("branch").and_then(|v| v.as_str()) {
                        dep.branch = Some(branch.to_string());
                        dep.version = Some(format!("branch={branch}"));
                    } else if let Some(rev) = table.get("rev").and_then(|v| v.as_str()) {
                        dep.commit = Some(rev.to_string());
                        dep.version = Some(format!("rev={rev}"));
                    }
                } else if let Some(local) = table.get("path").and_then(|v| v.as_str()) {
                    dep.source = Some(local.to_string());
                }

                if let Some(features) = table.get("features").and_then(|v| v.as_array()) {
                    let features: Vec<String> = features
                        .iter()
                        .filter_map(|f| f.as_str().map(String::from))
                        .collect();
                    if !features.is_empty() {
                        dep.insert_metadata("features", features);
                    }
                }
                if table
                    .get("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
                {
                    dep.optional = true;
                    dep.required = false;
                }
            }
            other => {
                return Err(Error::schema(
                    path,
                    format!("dependency `{name}` has unsupported value kind: {other}"),
                ));
            }
        }
        Ok(dep)
    }

    fn parse_section(
        &self,
        doc: &Value,
        section: &str,
        scope: Option<Scope>,
        path: &Path,
        deps: &mut Vec<Dependency>,
    ) -> Result<()> {
        let Some(table) = doc.get(section).and_then(|s| s.as_table()) else {
            return Ok(());
        };
        for (name, value) in table {
            deps.push(self.parse_dependency(name, value, scope, path)?);
        }
        Ok(())
    }

    /// Overwrite declared versions with the lockfile's resolved ones.
    fn apply_lockfile(&self, lock_path: &Path, deps: &mut [Dependency]) -> Result<()> {
        let content = read_manifest(lock_path)?;
        let lock: Value =
            toml::from_str(&content).map_err(|e| Error::parse(lock_path, e.to_string()))?;

        let Some(packages) = lock.get("package").and_then(|p| p.as_array()) else {
            return Ok(());
        };

        for dep in deps.iter_mut() {
            for pkg in packages {
                let name = pkg.get("name").and_then(|n| n.as_str()).unwrap_or("");
                if !name.eq_ignore_ascii_case(&dep.name) {
                    continue;
                }
                if let Some(version) = pkg.get("version").and_then(|v| v.as_str()) {
                    dep.version = Some(version.to_string());
                }
                if let Some(source) = pkg.get("source").and_then(|s| s.as_str()) {
                    dep.source = Some(source.to_string());
                }
                break;
            }
        }
        Ok(())
    }
}

impl Extractor for CargoExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Cargo
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["Cargo.toml"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "Cargo.toml"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let doc: Value =
            toml::from_str(&content).map_err(|e| Error::parse(file_path, e.to_string()))?;

        let mut deps = Vec::new();
        self.parse_section(&doc, "dependencies", None, file_path, &mut deps)?;
        self.parse_section(&doc, "dev-dependencies", Some(Scope::Dev), file_path, &mut deps)?;

        let lock_path = file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("Cargo.lock");
        if lock_path.is_file() {
            if let Err(e) = self.apply_lockfile(&lock_path, &mut deps) {
                warn!(file = %lock_path.display(), error = %e, "skipping cargo lockfile");
            }
        }
        Ok(deps)
    }
}
