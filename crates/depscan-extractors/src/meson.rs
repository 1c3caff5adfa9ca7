//! Meson extractor: `meson.build`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Extracts `dependency(...)` calls (with optional `version:` keyword),
/// `pkg.get_variable(...)` lookups, `requires: [...]` lists, and
/// `subproject(...)` references. Trailing-backslash continuations are
/// joined; comment handling follows the configured policy.
pub struct MesonExtractor {
    config: ExtractorConfig,
    dependency: Regex,
    pkg_variable: Regex,
    requires: Regex,
    subproject: Regex,
}

impl MesonExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            dependency: Regex::new(
                r#"dependency\s*\(\s*['"]([^'"]+)['"]\s*(?:,\s*version\s*:\s*['"]([^'"]+)['"])?\s*\)"#,
            )
            .unwrap(),
            pkg_variable: Regex::new(r#"pkg\.get_variable\s*\(\s*['"]([^'"]+)['"]"#).unwrap(),
            requires: Regex::new(
                r#"requires\s*:\s*\[\s*(['"][^'"]+['"](?:\s*,\s*['"][^'"]+['"])*)\s*\]"#,
            )
            .unwrap(),
            subproject: Regex::new(r#"subproject\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
        }
    }

    fn record(&self, name: &str, kind: &str, path: &Path, line: u32) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Meson.name());
        dep.kind = kind.to_string();
        dep.file_path = Some(path.to_path_buf());
        dep.line = Some(line);
        dep
    }
}

impl Extractor for MesonExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Meson
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["meson.build"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "meson.build"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();

        let mut in_block_comment = false;
        let mut continuation = String::new();
        let mut continuation_start = 0u32;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;

            if raw.contains("/*") {
                in_block_comment = true;
            }
            if in_block_comment {
                if raw.contains("*/") {
                    in_block_comment = false;
                }
                continue;
            }
            if self.config.ignore_comments && raw.trim_start().starts_with('#') {
                continue;
            }

            if let Some(stripped) = raw.strip_suffix('\\') {
                if continuation.is_empty() {
                    continuation_start = line_no;
                }
                continuation.push_str(stripped);
                continuation.push(' ');
                continue;
            }
            let (line, line_no) = if continuation.is_empty() {
                (raw.to_string(), line_no)
            } else {
                let joined = format!("{continuation}{raw}");
                continuation.clear();
                (joined, continuation_start)
            };

            for caps in self.dependency.captures_iter(&line) {
                let mut dep = self.record(&caps[1], "dependency", file_path, line_no);
                if let Some(version) = caps.get(2) {
                    dep.version = Some(version.as_str().to_string());
                }
                deps.push(dep);
            }
            for caps in self.pkg_variable.captures_iter(&line) {
                deps.push(self.record(&caps[1], "pkgconfig", file_path, line_no));
            }
            if let Some(caps) = self.requires.captures(&line) {
                for req in caps[1].split(',') {
                    let name = req.trim().trim_matches(|c| c == '\'' || c == '"');
                    if !name.is_empty() {
                        deps.push(self.record(name, "requirement", file_path, line_no));
                    }
                }
            }
            for caps in self.subproject.captures_iter(&line) {
                deps.push(self.record(&caps[1], "subproject", file_path, line_no));
            }
        }

        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extract(content: &str) -> Vec<Dependency> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meson.build");
        std::fs::write(&path, content).unwrap();
        MesonExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    #[test]
    fn dependency_with_version_keyword() {
        let deps = extract(
            "boost_dep = dependency('boost', version : '>=1.74')\n\
             threads_dep = dependency('threads')\n",
        );
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "boost");
        assert_eq!(deps[0].version.as_deref(), Some(">=1.74"));
        assert_eq!(deps[1].name, "threads");
        assert!(deps[1].version.is_none());
    }

    #[test]
    fn pkgconfig_variable_lookup() {
        let deps = extract("gtk_version = pkg.get_variable('gtk+-3.0')\n");
        assert_eq!(deps[0].name, "gtk+-3.0");
        assert_eq!(deps[0].kind, "pkgconfig");
    }

    #[test]
    fn requires_list_splits_entries() {
        let deps = extract("lib = library('x', requires : ['glib-2.0', 'gio-2.0'])\n");
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["glib-2.0", "gio-2.0"]);
        assert!(deps.iter().all(|d| d.kind == "requirement"));
    }

    #[test]
    fn subprojects_extracted() {
        let deps = extract("json_proj = subproject('json')\n");
        assert_eq!(deps[0].name, "json");
        assert_eq!(deps[0].kind, "subproject");
    }

    #[test]
    fn continuation_joins_before_matching() {
        let deps = extract("dep = dependency('openssl', \\\n    version : '>=1.1')\n");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].version.as_deref(), Some(">=1.1"));
    }

    #[test]
    fn comments_ignored() {
        let deps = extract("# dependency('hidden')\ndep = dependency('real')\n");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "real");
    }
}
