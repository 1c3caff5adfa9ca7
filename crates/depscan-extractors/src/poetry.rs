//! Poetry extractor: `pyproject.toml` plus a sibling `poetry.lock`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use std::path::Path;
use toml::Value;
use tracing::warn;

/// Parses `tool.poetry.dependencies` and
/// `tool.poetry.dev-dependencies`. A value is either a version string
/// or a table with `{version, source, extras, git, rev, branch, tag}`;
/// anything else is a schema error. Lockfile pins overwrite the
/// declared version, set `source` to `type+url`, and carry `extras`
/// in metadata.
pub struct PoetryExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
}

impl PoetryExtractor {
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
        let mut dep = Dependency::new(name, ExtractorKind::Poetry.name());
        dep.kind = "poetry".to_string();
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
                dep.source = table
                    .get("source")
                    .and_then(|v| v.as_str())
                    .map(String::from);

                if let Some(extras) = table.get("extras").and_then(|v| v.as_array()) {
                    let extras: Vec<String> = extras
                        .iter()
                        .filter_map(|e| e.as_str().map(String::from))
                        .collect();
                    dep.insert_metadata("extras", extras);
                }

                if let Some(git) = table.get("git").and_then(|v| v.as_str()) {
                    dep.source = Some(git.to_string());
                    dep.repository = Some(git.to_string());
                    if let Some(rev) = table.get("rev").and_then(|v| v.as_str()) {
                        dep.commit = Some(rev.to_string());
                        dep.version = Some(format!("rev={rev}"));
                    } else if let Some(branch) = table.get("branch").and_then(|v| v.as_str()) {
                        dep.branch = Some(branch.to_string());
                        dep.version = Some(format!("branch={branch}"));
                    } else if let Some(tag) = table.get("tag").and_then(|v| v.as_str()) {
                        dep.version = Some(format!("tag={tag}"));
                    }
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
                if let Some(source) = pkg.get("source").and_then(|s| s.as_table()) {
                    let source_type = source.get("type").and_then(|t| t.as_str());
                    let url = source.get("url").and_then(|u| u.as_str());
                    if let (Some(source_type), Some(url)) = (source_type, url) {
                        dep.source = Some(format!("{source_type}+{url}"));
                    }
                }
                if let Some(extras) = pkg.get("extras").and_then(|e| e.as_array()) {
                    let extras: Vec<String> = extras
                        .iter()
                        .filter_map(|e| e.as_str().map(String::from))
                        .collect();
                    if !extras.is_empty() {
                        dep.insert_metadata("extras", extras);
                    }
                }
                break;
            }
        }
        Ok(())
    }
}

impl Extractor for PoetryExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Poetry
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["pyproject.toml"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "pyproject.toml"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let doc: Value =
            toml::from_str(&content).map_err(|e| Error::parse(file_path, e.to_string()))?;

        let poetry = doc.get("tool").and_then(|t| t.get("poetry"));
        let mut deps = Vec::new();

        if let Some(poetry) = poetry {
            if let Some(table) = poetry.get("dependencies").and_then(|d| d.as_table()) {
                for (name, value) in table {
                    deps.push(self.parse_dependency(name, value, None, file_path)?);
                }
            }
            if let Some(table) = poetry.get("dev-dependencies").and_then(|d| d.as_table()) {
                for (name, value) in table {
                    deps.push(self.parse_dependency(name, value, Some(Scope::Dev), file_path)?);
                }
            }
        }

        let lock_path = file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("poetry.lock");
        if lock_path.is_file() {
            if let Err(e) = self.apply_lockfile(&lock_path, &mut deps) {
                warn!(file = %lock_path.display(), error = %e, "skipping poetry lockfile");
            }
        }
        Ok(deps)
    }
}
