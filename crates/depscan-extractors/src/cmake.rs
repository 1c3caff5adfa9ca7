//! CMake extractor: `CMakeLists.txt` and `*.cmake`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Extracts `find_package`, `find_library`, `target_link_libraries`,
/// `include`, and `require` declarations. `include(...)` references to
/// sibling `.cmake` files are followed up to the configured depth;
/// missing includes are skipped silently.
pub struct CmakeExtractor {
    config: ExtractorConfig,
    find_package: Regex,
    find_library: Regex,
    target_link: Regex,
    include_name: Regex,
    include_path: Regex,
    require: Regex,
}

impl CmakeExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            find_package: Regex::new(r"(?i)find_package\s*\(\s*(\w+)").unwrap(),
            find_library: Regex::new(r"(?i)find_library\s*\(\s*\w+\s+(\w+)").unwrap(),
            target_link: Regex::new(
                r"(?i)target_link_libraries\s*\(\s*\w+\s+(?:PRIVATE|PUBLIC|INTERFACE)?\s*([^)]+)\)",
            )
            .unwrap(),
            include_name: Regex::new(r"(?i)include\s*\(\s*(\w+)").unwrap(),
            include_path: Regex::new(r"(?i)include\s*\(\s*([^)]+)\)").unwrap(),
            require: Regex::new(r"(?i)require\s*\(\s*(\w+)").unwrap(),
        }
    }

    fn record(&self, name: &str, kind: &str, path: &Path, line: u32) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Cmake.name());
        dep.kind = kind.to_string();
        dep.file_path = Some(path.to_path_buf());
        dep.line = Some(line);
        dep
    }

    fn extract_file(&self, path: &Path, depth: usize, deps: &mut Vec<Dependency>) -> Result<()> {
        let content = read_manifest(path)?;

        let mut in_block_comment = false;
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;

            // C-style block comments span whole lines here, matching
            // the grammar the scanner accepts.
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

            if let Some(caps) = self.find_package.captures(raw) {
                deps.push(self.record(&caps[1], "package", path, line_no));
            }
            if let Some(caps) = self.find_library.captures(raw) {
                deps.push(self.record(&caps[1], "library", path, line_no));
            }
            if let Some(caps) = self.target_link.captures(raw) {
                for lib in caps[1].split_whitespace() {
                    if lib.starts_with("${") {
                        continue;
                    }
                    deps.push(self.record(lib, "library", path, line_no));
                }
            }
            if let Some(caps) = self.include_name.captures(raw) {
                deps.push(self.record(&caps[1], "module", path, line_no));
            }
            if let Some(caps) = self.require.captures(raw) {
                deps.push(self.record(&caps[1], "requirement", path, line_no));
            }
        }

        if depth > 0 {
            self.extract_includes(path, &content, depth - 1, deps)?;
        }
        Ok(())
    }

    /// Follow `include(path)` references to sibling `.cmake` files.
    fn extract_includes(
        &self,
        path: &Path,
        content: &str,
        depth: usize,
        deps: &mut Vec<Dependency>,
    ) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        for line in content.lines() {
            let Some(caps) = self.include_path.captures(line) else {
                continue;
            };
            let include = caps[1].trim().trim_matches(|c| c == '"' || c == '\'');
            if include.starts_with("${") {
                continue;
            }

            let mut full = dir.join(include);
            if full.extension().and_then(|e| e.to_str()) != Some("cmake") {
                full.set_extension("cmake");
            }
            if !full.is_file() {
                continue;
            }
            self.extract_file(&full, depth, deps)?;
        }
        Ok(())
    }
}

impl Extractor for CmakeExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Cmake
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["CMakeLists.txt", "*.cmake"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        let name = file_name(path);
        name == "CMakeLists.txt" || name.ends_with(".cmake")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let mut deps = Vec::new();
        self.extract_file(file_path, self.config.max_depth, &mut deps)?;
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extract(content: &str) -> Vec<Dependency> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CMakeLists.txt");
        std::fs::write(&path, content).unwrap();
        CmakeExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    #[test]
    fn finds_packages_and_libraries() {
        let deps = extract(
            "cmake_minimum_required(VERSION 3.10)\n\
             find_package(Boost REQUIRED)\n\
             find_library(MATH_LIBRARY m)\n",
        );
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "Boost");
        assert_eq!(deps[0].kind, "package");
        assert_eq!(deps[1].name, "m");
        assert_eq!(deps[1].kind, "library");
        assert_eq!(deps[0].line, Some(2));
    }

    #[test]
    fn link_libraries_skip_variable_references() {
        let deps = extract("target_link_libraries(app PRIVATE Boost::boost ${MATH_LIBRARY} z)\n");
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Boost::boost", "z"]);
    }

    #[test]
    fn comments_are_ignored_by_default() {
        let deps = extract(
            "# find_package(Hidden)\n\
             /* find_package(AlsoHidden)\n\
             still hidden */\n\
             find_package(Visible)\n",
        );
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "Visible");
    }

    #[test]
    fn comment_matching_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CMakeLists.txt");
        std::fs::write(&path, "# find_package(Hidden)\n").unwrap();

        let config = ExtractorConfig {
            ignore_comments: false,
            ..Default::default()
        };
        let deps = CmakeExtractor::new(config).extract(dir.path(), &path).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "Hidden");
    }

    #[test]
    fn includes_are_followed_recursively() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("CMakeLists.txt");
        let module = dir.path().join("deps.cmake");
        std::fs::write(&root, "include(deps)\n").unwrap();
        std::fs::write(&module, "find_package(ZLIB)\n").unwrap();

        let deps = CmakeExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &root)
            .unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        // `include(deps)` itself is a module record; the included file
        // contributes its package.
        assert!(names.contains(&"deps"));
        assert!(names.contains(&"ZLIB"));
    }

    #[test]
    fn missing_include_is_skipped_silently() {
        let deps = extract("include(nonexistent_helpers)\nfind_package(Threads)\n");
        assert!(deps.iter().any(|d| d.name == "Threads"));
    }

    #[test]
    fn applicability_is_by_file_name() {
        let e = CmakeExtractor::new(ExtractorConfig::default());
        assert!(e.is_applicable(Path::new("CMakeLists.txt")));
        assert!(e.is_applicable(Path::new("toolchain.cmake")));
        assert!(!e.is_applicable(Path::new("Makefile")));
    }
}
