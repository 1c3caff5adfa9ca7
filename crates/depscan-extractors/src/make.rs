//! Make extractor: `Makefile` / `makefile`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Tokenizes every non-comment line of a Makefile and extracts linker
/// flags, pkg-config invocations, include paths, and `REQUIRES=` /
/// `DEPENDS=` variable values. Trailing-backslash continuations are
/// joined before matching; `/* ... */` blocks are skipped.
pub struct MakeExtractor {
    config: ExtractorConfig,
    lib_flag: Regex,
    pkg_config: Regex,
    include_flag: Regex,
    requires: Regex,
    depends: Regex,
}

impl MakeExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            lib_flag: Regex::new(r"-l(\w+)").unwrap(),
            pkg_config: Regex::new(r"pkg-config\s+--libs\s+([^)#]+)").unwrap(),
            include_flag: Regex::new(r"-I(\S+)").unwrap(),
            requires: Regex::new(r"REQUIRES\s*=\s*(.+)").unwrap(),
            depends: Regex::new(r"DEPENDS\s*=\s*(.+)").unwrap(),
        }
    }

    fn record(&self, name: &str, kind: &str, path: &Path, line: u32) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Make.name());
        dep.kind = kind.to_string();
        dep.file_path = Some(path.to_path_buf());
        dep.line = Some(line);
        dep
    }
}

impl Extractor for MakeExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Make
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["Makefile", "makefile"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        matches!(file_name(path), "Makefile" | "makefile")
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

            // Join continuation lines before matching.
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

            for caps in self.lib_flag.captures_iter(&line) {
                deps.push(self.record(&caps[1], "library", file_path, line_no));
            }
            if let Some(caps) = self.pkg_config.captures(&line) {
                for pkg in caps[1].split_whitespace() {
                    deps.push(self.record(pkg, "package", file_path, line_no));
                }
            }
            for caps in self.include_flag.captures_iter(&line) {
                let include = &caps[1];
                if include.starts_with("/usr/include") {
                    continue;
                }
                deps.push(self.record(include, "include", file_path, line_no));
            }
            if let Some(caps) = self.requires.captures(&line) {
                for req in caps[1].split_whitespace() {
                    deps.push(self.record(req, "requirement", file_path, line_no));
                }
            }
            if let Some(caps) = self.depends.captures(&line) {
                for dependency in caps[1].split_whitespace() {
                    deps.push(self.record(dependency, "dependency", file_path, line_no));
                }
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
        let path = dir.path().join("Makefile");
        std::fs::write(&path, content).unwrap();
        MakeExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    fn names(deps: &[Dependency]) -> Vec<&str> {
        deps.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn linker_flags_become_libraries() {
        let deps = extract("LDFLAGS = -lm -lpthread\n");
        assert_eq!(names(&deps), ["m", "pthread"]);
        assert!(deps.iter().all(|d| d.kind == "library"));
    }

    #[test]
    fn pkg_config_packages_extracted() {
        let deps = extract("PKGS = $(shell pkg-config --libs gtk+-3.0 cairo)\n");
        let pkgs: Vec<&str> = deps
            .iter()
            .filter(|d| d.kind == "package")
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(pkgs, ["gtk+-3.0", "cairo"]);
    }

    #[test]
    fn system_include_paths_dropped() {
        let deps = extract("CFLAGS = -I/usr/include/glib -I../include\n");
        let includes: Vec<&str> = deps
            .iter()
            .filter(|d| d.kind == "include")
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(includes, ["../include"]);
    }

    #[test]
    fn continuations_join_requires_values() {
        let deps = extract("REQUIRES = openssl \\\n    zlib\n");
        let reqs: Vec<&str> = deps
            .iter()
            .filter(|d| d.kind == "requirement")
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(reqs, ["openssl", "zlib"]);
        // Joined lines report the first physical line.
        assert!(deps.iter().all(|d| d.line == Some(1)));
    }

    #[test]
    fn depends_values_extracted() {
        let deps = extract("DEPENDS = libxml2 libcurl\n");
        let got: Vec<&str> = deps
            .iter()
            .filter(|d| d.kind == "dependency")
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(got, ["libxml2", "libcurl"]);
    }

    #[test]
    fn comments_and_blocks_skipped() {
        let deps = extract("# LDFLAGS = -lhidden\n/* -lbroken\n-lstillbroken */\nLIBS = -lz\n");
        assert_eq!(names(&deps), ["z"]);
    }
}
