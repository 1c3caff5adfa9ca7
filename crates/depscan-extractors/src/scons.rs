//! SCons extractor: `SConstruct`, `SConscript`, `*.scons`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::{read_manifest, split_outside_quotes, unquote};
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Regex-scans SCons build scripts (never evaluated) for
/// `Environment(LIBS=[...])`, `Depends`/`Requires` calls,
/// `Import`/`SConscript` references, `env.Library`/`env.Program`
/// targets, and `env.ParseConfig` pkg-config commands.
pub struct SconsExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    environment: Regex,
    env_libs: Regex,
    depends: Regex,
    requires: Regex,
    import: Regex,
    sconscript: Regex,
    library: Regex,
    program: Regex,
    parse_config: Regex,
}

impl SconsExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            environment: Regex::new(r"env\s*=\s*Environment\s*\((.*?)\)").unwrap(),
            env_libs: Regex::new(r"LIBS\s*=\s*\[([^\]]+)\]").unwrap(),
            depends: Regex::new(r"Depends\s*\(\s*([^,]+)\s*,\s*([^)]+)\s*\)").unwrap(),
            requires: Regex::new(r"Requires\s*\(\s*([^,]+)\s*,\s*([^)]+)\s*\)").unwrap(),
            import: Regex::new(r#"Import\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
            sconscript: Regex::new(r#"SConscript\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
            library: Regex::new(r#"env\.Library\s*\(\s*['"]([^'"]+)['"]\s*,\s*([^)]+)\s*\)"#)
                .unwrap(),
            program: Regex::new(r#"env\.Program\s*\(\s*['"]([^'"]+)['"]\s*,\s*([^)]+)\s*\)"#)
                .unwrap(),
            parse_config: Regex::new(r#"env\.ParseConfig\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
        }
    }

    fn record(&self, name: &str, kind: &str, path: &Path, line: u32) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Scons.name());
        dep.kind = kind.to_string();
        dep.file_path = Some(path.to_path_buf());
        dep.line = Some(line);
        dep
    }

    /// Items of a Python list literal: brackets stripped, split on
    /// commas outside quotes, quotes removed.
    fn list_items(list: &str) -> Vec<String> {
        let trimmed = list.trim().trim_start_matches('[').trim_end_matches(']');
        split_outside_quotes(trimmed)
            .into_iter()
            .map(|item| unquote(item).to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }

    /// Package names of a pkg-config command: every token that is not
    /// the binary itself or a `--flag`.
    fn pkg_config_packages(command: &str) -> Vec<String> {
        if !command.contains("pkg-config") {
            return Vec::new();
        }
        command
            .split_whitespace()
            .filter(|tok| !tok.contains("pkg-config") && !tok.starts_with('-') && !tok.is_empty())
            .map(|tok| tok.to_string())
            .collect()
    }
}

impl Extractor for SconsExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Scons
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["SConstruct", "SConscript", "*.scons"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        let name = file_name(path);
        matches!(name, "SConstruct" | "SConscript") || name.ends_with(".scons")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = self.environment.captures(line) {
                if let Some(libs) = self.env_libs.captures(&caps[1]) {
                    for lib in Self::list_items(&libs[1]) {
                        deps.push(self.record(&lib, "scons_env", file_path, line_no));
                    }
                }
                continue;
            }

            if let Some(caps) = self.depends.captures(line) {
                let target = unquote(caps[1].trim()).to_string();
                for item in Self::list_items(&caps[2]) {
                    let mut dep = self.record(&item, "scons_depends", file_path, line_no);
                    dep.parent = Some(target.clone());
                    deps.push(dep);
                }
                continue;
            }
            if let Some(caps) = self.requires.captures(line) {
                let target = unquote(caps[1].trim()).to_string();
                for item in Self::list_items(&caps[2]) {
                    let mut dep = self.record(&item, "scons_requires", file_path, line_no);
                    dep.parent = Some(target.clone());
                    deps.push(dep);
                }
                continue;
            }
            if let Some(caps) = self.import.captures(line) {
                deps.push(self.record(&caps[1], "scons_import", file_path, line_no));
                continue;
            }
            if let Some(caps) = self.sconscript.captures(line) {
                deps.push(self.record(&caps[1], "scons_script", file_path, line_no));
                continue;
            }
            if let Some(caps) = self.library.captures(line) {
                let target = caps[1].to_string();
                for source in Self::list_items(&caps[2]) {
                    let mut dep = self.record(&source, "scons_library", file_path, line_no);
                    dep.parent = Some(target.clone());
                    deps.push(dep);
                }
                continue;
            }
            if let Some(caps) = self.program.captures(line) {
                let target = caps[1].to_string();
                for source in Self::list_items(&caps[2]) {
                    let mut dep = self.record(&source, "scons_program", file_path, line_no);
                    dep.parent = Some(target.clone());
                    deps.push(dep);
                }
                continue;
            }
            if let Some(caps) = self.parse_config.captures(line) {
                for pkg in Self::pkg_config_packages(&caps[1]) {
                    deps.push(self.record(&pkg, "scons_pkg_config", file_path, line_no));
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
        let path = dir.path().join("SConstruct");
        std::fs::write(&path, content).unwrap();
        SconsExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    #[test]
    fn environment_libs_extracted() {
        let deps = extract("env = Environment(LIBS=['m', 'pthread'])\n");
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["m", "pthread"]);
        assert!(deps.iter().all(|d| d.kind == "scons_env"));
    }

    #[test]
    fn depends_and_requires_carry_target() {
        let deps = extract(
            "Depends('main', ['libfoo'])\n\
             Requires('main', ['libbar'])\n",
        );
        assert_eq!(deps[0].name, "libfoo");
        assert_eq!(deps[0].kind, "scons_depends");
        assert_eq!(deps[0].parent.as_deref(), Some("main"));
        assert_eq!(deps[1].kind, "scons_requires");
    }

    #[test]
    fn import_and_sconscript_references() {
        let deps = extract(
            "Import('env')\n\
             SConscript('src/SConscript')\n",
        );
        assert_eq!(deps[0].kind, "scons_import");
        assert_eq!(deps[1].name, "src/SConscript");
        assert_eq!(deps[1].kind, "scons_script");
    }

    #[test]
    fn library_and_program_sources() {
        let deps = extract(
            "env.Library('mylib', ['a.cpp', 'b.cpp'])\n\
             env.Program('tool', ['main.cpp'])\n",
        );
        let libs: Vec<&str> = deps
            .iter()
            .filter(|d| d.kind == "scons_library")
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(libs, ["a.cpp", "b.cpp"]);
        let prog = deps.iter().find(|d| d.kind == "scons_program").unwrap();
        assert_eq!(prog.parent.as_deref(), Some("tool"));
    }

    #[test]
    fn parse_config_contributes_only_pkg_config_names() {
        let deps = extract(
            "env.ParseConfig('pkg-config --cflags --libs gtk+-3.0 cairo')\n\
             env.ParseConfig('sdl2-config --libs')\n",
        );
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["gtk+-3.0", "cairo"]);
    }

    #[test]
    fn comments_skipped() {
        let deps = extract("# Import('hidden')\n");
        assert!(deps.is_empty());
    }
}
