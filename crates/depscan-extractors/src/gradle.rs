//! Gradle extractor: `build.gradle[.kts]` and `settings.gradle[.kts]`.
//!
//! Groovy and Kotlin DSL are handled by the same patterns (both quote
//! styles tolerated). Declarations that require evaluating the build
//! script (`project.ext`, closures) are not detected; that is a
//! documented limitation of textual scanning.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Component build files contribute native dependencies, plugin ids,
/// project references, and include directories; settings files
/// contribute one `gradle_subproject` record per `include ':path'`.
pub struct GradleExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    native_dependency: Regex,
    plugin: Regex,
    project_ref: Regex,
    include_dir: Regex,
    component_decl: Regex,
    subproject_include: Regex,
}

impl GradleExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            native_dependency: Regex::new(
                r#"native(?:Lib|Implementation|Api)\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
            )
            .unwrap(),
            plugin: Regex::new(r#"id\s*\(?\s*['"]([^'"]+)['"]\s*\)?\s*version\s*\(?\s*['"]([^'"]+)['"]"#)
                .unwrap(),
            project_ref: Regex::new(r#"project\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
            include_dir: Regex::new(
                r#"cppCompiler\.includeDirs\.from\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
            )
            .unwrap(),
            component_decl: Regex::new(r"^(\w+)\s*[({]").unwrap(),
            subproject_include: Regex::new(r#"include\s*\(?\s*['"]([^'"]+)['"]"#).unwrap(),
        }
    }

    fn record(&self, name: &str, kind: &str, path: &Path, line: u32) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Gradle.name());
        dep.kind = kind.to_string();
        dep.file_path = Some(path.to_path_buf());
        dep.line = Some(line);
        dep
    }

    fn is_settings_file(path: &Path) -> bool {
        file_name(path).starts_with("settings.gradle")
    }

    fn extract_component_file(&self, path: &Path, content: &str, deps: &mut Vec<Dependency>) {
        let mut in_native_block = false;
        let mut current_component = String::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let line = raw.trim();

            if line.contains("components.native") {
                in_native_block = true;
                continue;
            }
            if in_native_block {
                if line == "}" {
                    in_native_block = false;
                    current_component.clear();
                } else if let Some(caps) = self.component_decl.captures(line) {
                    current_component = caps[1].to_string();
                }
            }

            if let Some(caps) = self.native_dependency.captures(line) {
                let mut dep = self.record(&caps[1], "gradle_native", path, line_no);
                if !current_component.is_empty() {
                    dep.parent = Some(current_component.clone());
                }
                deps.push(dep);
            }
            if let Some(caps) = self.plugin.captures(line) {
                let mut dep = self.record(&caps[1], "gradle_plugin", path, line_no);
                dep.version = Some(caps[2].to_string());
                deps.push(dep);
            }
            if let Some(caps) = self.project_ref.captures(line) {
                deps.push(self.record(&caps[1], "gradle_project", path, line_no));
            }
            if let Some(caps) = self.include_dir.captures(line) {
                let mut dep = self.record(&caps[1], "gradle_include_dir", path, line_no);
                if !current_component.is_empty() {
                    dep.parent = Some(current_component.clone());
                }
                deps.push(dep);
            }
        }
    }

    fn extract_settings_file(&self, path: &Path, content: &str, deps: &mut Vec<Dependency>) {
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            if let Some(caps) = self.subproject_include.captures(raw) {
                deps.push(self.record(&caps[1], "gradle_subproject", path, line_no));
            }
        }
    }
}

impl Extractor for GradleExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Gradle
    }

    fn patterns(&self) -> &'static [&'static str] {
        &[
            "build.gradle",
            "build.gradle.kts",
            "settings.gradle",
            "settings.gradle.kts",
        ]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        matches!(
            file_name(path),
            "build.gradle" | "build.gradle.kts" | "settings.gradle" | "settings.gradle.kts"
        )
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();

        if Self::is_settings_file(file_path) {
            self.extract_settings_file(file_path, &content, &mut deps);
        } else {
            self.extract_component_file(file_path, &content, &mut deps);
        }
        Ok(deps)
    }
}
