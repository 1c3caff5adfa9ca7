//! Per-extractor configuration.

/// Options threaded into every extractor at construction.
///
/// One value is shared by the whole registry; extractors read only the
/// fields that concern them.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Strip comments before matching (CMake, Make, Meson, ...).
    pub ignore_comments: bool,
    /// Drop test-scoped dependencies from the output.
    pub ignore_tests: bool,
    /// Glob patterns for files to skip entirely.
    pub exclude_files: Vec<String>,
    /// Glob patterns restricting which files are considered; empty
    /// means no restriction.
    pub include_files: Vec<String>,
    /// Recursion bound for extractors that follow references
    /// (CMake `include()`, Maven `<modules>`, Ant `<import>`).
    pub max_depth: usize,
    /// Extra CMake flags recorded into metadata.
    pub cmake_flags: Vec<String>,
    /// Extra Make flags recorded into metadata.
    pub make_flags: Vec<String>,
    /// Conan remotes consulted by external collaborators.
    pub conan_remotes: Vec<String>,
    /// vcpkg installation root.
    pub vcpkg_root: Option<String>,
    /// Branch override for Git submodule inspection.
    pub git_branch: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ignore_comments: true,
            ignore_tests: false,
            exclude_files: Vec::new(),
            include_files: Vec::new(),
            max_depth: 10,
            cmake_flags: Vec::new(),
            make_flags: Vec::new(),
            conan_remotes: Vec::new(),
            vcpkg_root: None,
            git_branch: None,
        }
    }
}

impl ExtractorConfig {
    /// Whether `file_name` passes the include/exclude glob filters.
    pub fn allows(&self, file_name: &str) -> bool {
        let matches = |patterns: &[String]| {
            patterns.iter().any(|p| {
                glob::Pattern::new(p)
                    .map(|pat| pat.matches(file_name))
                    .unwrap_or(false)
            })
        };

        if !self.include_files.is_empty() && !matches(&self.include_files) {
            return false;
        }
        !matches(&self.exclude_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ExtractorConfig::default();
        assert!(cfg.ignore_comments);
        assert!(!cfg.ignore_tests);
        assert_eq!(cfg.max_depth, 10);
    }

    #[test]
    fn exclude_globs_filter_files() {
        let cfg = ExtractorConfig {
            exclude_files: vec!["*.generated.*".to_string()],
            ..Default::default()
        };
        assert!(cfg.allows("CMakeLists.txt"));
        assert!(!cfg.allows("build.generated.ninja"));
    }

    #[test]
    fn include_globs_restrict_files() {
        let cfg = ExtractorConfig {
            include_files: vec!["package.json".to_string()],
            ..Default::default()
        };
        assert!(cfg.allows("package.json"));
        assert!(!cfg.allows("Cargo.toml"));
    }
}
