//! Git submodule extractor: `.gitmodules`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Parses `[submodule "name"]` sections with their `path`, `url`, and
/// optional `branch` keys. When the submodule path holds a cloned
/// checkout, its HEAD commit overwrites `commit` and the checkout's
/// configured remote replaces the declared URL. URL heuristics fill
/// `source`: github.com → `github`, gitlab.com → `gitlab`,
/// bitbucket.org → `bitbucket`.
pub struct SubmoduleExtractor {
    config: ExtractorConfig,
    section: Regex,
    key_value: Regex,
    remote_url: Regex,
}

/// Resolve a checkout's git directory: either `.git` is the directory
/// itself, or a file containing `gitdir: <path>`.
fn git_dir(checkout: &Path) -> Option<PathBuf> {
    let dot_git = checkout.join(".git");
    if dot_git.is_dir() {
        return Some(dot_git);
    }
    let content = std::fs::read_to_string(&dot_git).ok()?;
    let target = content.strip_prefix("gitdir:")?.trim();
    let resolved = checkout.join(target);
    resolved.is_dir().then_some(resolved)
}

/// HEAD commit of a git directory: a detached hash directly, or the
/// hash behind the ref HEAD points at (loose ref or packed-refs).
fn head_commit(git_dir: &Path) -> Option<String> {
    let head = std::fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();

    let Some(reference) = head.strip_prefix("ref:") else {
        return Some(head.to_string());
    };
    let reference = reference.trim();

    if let Ok(hash) = std::fs::read_to_string(git_dir.join(reference)) {
        return Some(hash.trim().to_string());
    }
    let packed = std::fs::read_to_string(git_dir.join("packed-refs")).ok()?;
    packed.lines().find_map(|line| {
        let (hash, name) = line.split_once(' ')?;
        (name == reference).then(|| hash.to_string())
    })
}

fn source_of(url: &str) -> Option<&'static str> {
    if url.contains("github.com") {
        Some("github")
    } else if url.contains("gitlab.com") {
        Some("gitlab")
    } else if url.contains("bitbucket.org") {
        Some("bitbucket")
    } else {
        None
    }
}

impl SubmoduleExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            section: Regex::new(r#"^\[submodule\s+"([^"]+)"\]$"#).unwrap(),
            key_value: Regex::new(r"^(\w+)\s*=\s*(.+)$").unwrap(),
            remote_url: Regex::new(r"(?m)^\s*url\s*=\s*(.+)$").unwrap(),
        }
    }

    /// Overwrite commit and repository from a cloned checkout, when
    /// one exists.
    fn inspect_checkout(&self, checkout: &Path, dep: &mut Dependency) {
        let Some(git_dir) = git_dir(checkout) else {
            return;
        };
        if let Some(commit) = head_commit(&git_dir) {
            dep.commit = Some(commit);
        }
        if let Ok(config) = std::fs::read_to_string(git_dir.join("config")) {
            if let Some(caps) = self.remote_url.captures(&config) {
                dep.repository = Some(caps[1].trim().to_string());
            }
        }
    }
}

impl Extractor for SubmoduleExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Submodule
    }

    fn patterns(&self) -> &'static [&'static str] {
        &[".gitmodules"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == ".gitmodules"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let dir = file_path.parent().unwrap_or_else(|| Path::new("."));

        let mut deps: Vec<Dependency> = Vec::new();
        let mut current: Option<Dependency> = None;
        let mut current_path: Option<String> = None;

        let mut finish =
            |dep: Option<Dependency>, path: Option<String>, deps: &mut Vec<Dependency>| {
                if let Some(mut dep) = dep {
                    if let Some(rel) = path {
                        self.inspect_checkout(&dir.join(&rel), &mut dep);
                        dep.insert_metadata("path", rel);
                    }
                    deps.push(dep);
                }
            };

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = self.section.captures(line) {
                finish(current.take(), current_path.take(), &mut deps);
                let mut dep = Dependency::new(&caps[1], "git");
                dep.kind = "submodule".to_string();
                dep.file_path = Some(file_path.to_path_buf());
                current = Some(dep);
                continue;
            }

            let Some(dep) = current.as_mut() else { continue };
            let Some(caps) = self.key_value.captures(line) else {
                continue;
            };
            let value = caps[2].trim().to_string();
            match &caps[1] {
                "path" => current_path = Some(value),
                "url" => {
                    dep.source = source_of(&value).map(String::from);
                    dep.repository = Some(value);
                }
                "branch" => {
                    let branch = self
                        .config
                        .git_branch
                        .clone()
                        .unwrap_or(value);
                    dep.branch = Some(branch);
                }
                _ => {}
            }
        }
        finish(current.take(), current_path.take(), &mut deps);

        Ok(deps)
    }
}
