//! Bazel extractor: `BUILD`, `BUILD.bazel`, `WORKSPACE`, `WORKSPACE.bazel`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Matches `http_archive`, `git_repository`, `local_repository`, and
/// `maven_jar` workspace rules. Each rule yields one record typed by
/// the rule name. The `name = "..."` attribute may sit on the line
/// after the rule call, so patterns span whitespace freely.
pub struct BazelExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    rules: Vec<(Regex, &'static str)>,
}

impl BazelExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        let rule = |name: &str| {
            Regex::new(&format!(r#"{name}\(\s*name\s*=\s*"([^"]+)""#)).unwrap()
        };
        Self {
            config,
            rules: vec![
                (rule("http_archive"), "bazel_http_archive"),
                (rule("git_repository"), "bazel_git_repository"),
                (rule("local_repository"), "bazel_local_repository"),
                (rule("maven_jar"), "bazel_maven_jar"),
            ],
        }
    }
}

/// 1-indexed line of a byte offset.
fn line_of(content: &str, offset: usize) -> u32 {
    content[..offset].bytes().filter(|b| *b == b'\n').count() as u32 + 1
}

impl Extractor for BazelExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Bazel
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["BUILD", "BUILD.bazel", "WORKSPACE", "WORKSPACE.bazel"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        matches!(
            file_name(path),
            "BUILD" | "BUILD.bazel" | "WORKSPACE" | "WORKSPACE.bazel"
        )
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();

        for (pattern, kind) in &self.rules {
            for caps in pattern.captures_iter(&content) {
                let whole = caps.get(0).unwrap();
                let mut dep = Dependency::new(&caps[1], ExtractorKind::Bazel.name());
                dep.kind = (*kind).to_string();
                dep.file_path = Some(file_path.to_path_buf());
                dep.line = Some(line_of(&content, whole.start()));
                deps.push(dep);
            }
        }

        // Records come out grouped by rule; restore file order.
        deps.sort_by_key(|d| d.line);
        Ok(deps)
    }
}
