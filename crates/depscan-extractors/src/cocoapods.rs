//! CocoaPods extractor: `Podfile` with its required `Podfile.lock`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use serde_yaml::Value;
use std::path::Path;

/// Reads the lock's `PODS`, `EXTERNAL SOURCES`, `CHECKOUT OPTIONS`,
/// and `SPEC CHECKSUMS` sections. Each pod becomes one record: the
/// name is the token before ` (`, the version the parenthetical. An
/// external source overrides `source` and may replace the version
/// with `tag=`/`branch=`/`commit=`; checkout options pin a commit.
/// Pods named like test helpers (`Tests`, `Testing`, `Mock`, `Spec`
/// suffixes) are marked dev scope.
pub struct CocoapodsExtractor {
    config: ExtractorConfig,
}

/// Shared by the CocoaPods and Carthage extractors: neither ecosystem
/// has an explicit dev scope, so test-support naming is the signal.
pub(crate) fn has_testing_suffix(name: &str) -> bool {
    name.ends_with("Tests")
        || name.ends_with("Testing")
        || name.ends_with("Mock")
        || name.ends_with("Spec")
}

/// Split `Name (1.2.3)` into name and version.
fn split_pod_entry(entry: &str) -> (String, Option<String>) {
    match entry.split_once(" (") {
        Some((name, rest)) => (
            name.to_string(),
            Some(rest.trim_end_matches(')').to_string()),
        ),
        None => (entry.to_string(), None),
    }
}

/// Fetch a string field keyed either `:name` (as CocoaPods writes it)
/// or plain `name`.
fn symbol_field<'a>(map: &'a Value, name: &str) -> Option<&'a str> {
    map.get(format!(":{name}"))
        .or_else(|| map.get(name))
        .and_then(|v| v.as_str())
}

impl CocoapodsExtractor {
    /// Build the extractor.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn convert_pod(&self, entry: &Value, lock: &Value, lock_path: &Path) -> Option<Dependency> {
        // A pod is either "Name (version)" or {"Name (version)": [deps]}.
        let (raw, children) = match entry {
            Value::String(s) => (s.as_str(), None),
            Value::Mapping(m) => {
                let (key, value) = m.iter().next()?;
                (key.as_str()?, value.as_sequence())
            }
            _ => return None,
        };

        let (name, version) = split_pod_entry(raw);
        let mut dep = Dependency::new(&name, ExtractorKind::Cocoapods.name());
        dep.kind = "cocoapods".to_string();
        dep.version = version;
        dep.file_path = Some(lock_path.to_path_buf());

        if let Some(children) = children {
            let requirements: Vec<String> = children
                .iter()
                .filter_map(|c| c.as_str().map(String::from))
                .collect();
            if !requirements.is_empty() {
                dep.insert_metadata("dependencies", requirements);
            }
        }

        if let Some(external) = lock.get("EXTERNAL SOURCES").and_then(|s| s.get(&name)) {
            if let Some(git) = symbol_field(external, "git") {
                dep.source = Some(git.to_string());
                dep.repository = Some(git.to_string());
                if let Some(tag) = symbol_field(external, "tag") {
                    dep.version = Some(format!("tag={tag}"));
                } else if let Some(branch) = symbol_field(external, "branch") {
                    dep.branch = Some(branch.to_string());
                    dep.version = Some(format!("branch={branch}"));
                } else if let Some(commit) = symbol_field(external, "commit") {
                    dep.commit = Some(commit.to_string());
                    dep.version = Some(format!("commit={commit}"));
                }
            } else if let Some(path) = symbol_field(external, "path") {
                dep.source = Some(format!("path={path}"));
            }
        }

        if let Some(checkout) = lock.get("CHECKOUT OPTIONS").and_then(|s| s.get(&name)) {
            if let Some(git) = symbol_field(checkout, "git") {
                dep.source = Some(git.to_string());
            }
            if let Some(commit) = symbol_field(checkout, "commit") {
                dep.commit = Some(commit.to_string());
                dep.version = Some(format!("commit={commit}"));
            }
        }

        if let Some(checksum) = lock
            .get("SPEC CHECKSUMS")
            .and_then(|s| s.get(&name))
            .and_then(|v| v.as_str())
        {
            dep.insert_metadata("checksum", checksum.to_string());
        }

        if has_testing_suffix(&name) {
            if self.config.ignore_tests {
                return None;
            }
            dep.scope = Some(Scope::Dev);
        }

        Some(dep)
    }
}

impl Extractor for CocoapodsExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Cocoapods
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["Podfile"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "Podfile"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let lock_path = file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("Podfile.lock");
        if !lock_path.is_file() {
            return Err(Error::MissingFile { path: lock_path });
        }

        let content = read_manifest(&lock_path)?;
        let lock: Value = serde_yaml::from_str(&content)
            .map_err(|e| Error::parse(&lock_path, e.to_string()))?;

        let pods = lock
            .get("PODS")
            .and_then(|p| p.as_sequence())
            .ok_or_else(|| Error::schema(&lock_path, "missing PODS section"))?;

        Ok(pods
            .iter()
            .filter_map(|entry| self.convert_pod(entry, &lock, &lock_path))
            .collect())
    }
}
