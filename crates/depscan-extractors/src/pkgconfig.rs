//! pkg-config extractor: `*.pc`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Constraint, ConstraintOp, Dependency, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;

/// Parses the `Name:`/`Version:`/`Requires:`/`Conflicts:`/`Libs:`/
/// `Cflags:` header lines of a pkg-config file. `KEY=VALUE` lines feed
/// a local variable table; `${KEY}` and `$KEY` references are expanded
/// on substitution. Each `Requires` entry becomes one `requirement`
/// record with its version constraints attached; the described package
/// itself is emitted last.
pub struct PkgConfigExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    field: Regex,
    var_ref: Regex,
}

impl PkgConfigExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            field: Regex::new(r"^([A-Za-z.]+):\s*(.+)$").unwrap(),
            var_ref: Regex::new(r"\$\{(\w+)\}|\$(\w+)").unwrap(),
        }
    }

    fn expand(&self, value: &str, variables: &HashMap<String, String>) -> String {
        self.var_ref
            .replace_all(value, |caps: &Captures<'_>| {
                let key = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
                match key.and_then(|k| variables.get(k)) {
                    Some(v) => v.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Parse one `Requires` entry (`name [op version]`).
    fn parse_requirement(&self, entry: &str, path: &Path) -> Option<Dependency> {
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        let name = *tokens.first()?;

        let mut dep = Dependency::new(name, ExtractorKind::PkgConfig.name());
        dep.kind = "requirement".to_string();
        dep.file_path = Some(path.to_path_buf());

        let mut i = 1;
        while i < tokens.len() {
            if let Some(op) = ConstraintOp::parse(tokens[i]) {
                if i + 1 < tokens.len() {
                    dep.constraints.push(Constraint::new(op, tokens[i + 1]));
                    i += 1;
                }
            }
            i += 1;
        }
        Some(dep)
    }
}

impl Extractor for PkgConfigExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::PkgConfig
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["*.pc"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path).ends_with(".pc")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();
        let mut variables: HashMap<String, String> = HashMap::new();
        let mut package: Option<Dependency> = None;

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Variable definitions come before any field that uses them.
            if !self.field.is_match(line) {
                if let Some((key, value)) = line.split_once('=') {
                    variables.insert(key.trim().to_string(), value.trim().to_string());
                }
                continue;
            }

            let caps = self.field.captures(line).unwrap();
            let key = &caps[1];
            let value = self.expand(caps[2].trim(), &variables);

            match key {
                "Name" => {
                    if package.is_none() {
                        let mut dep = Dependency::new(&value, ExtractorKind::PkgConfig.name());
                        dep.kind = "package".to_string();
                        dep.file_path = Some(file_path.to_path_buf());
                        package = Some(dep);
                    }
                }
                "Version" => {
                    if let Some(pkg) = package.as_mut() {
                        pkg.version = Some(value);
                    }
                }
                "Description" => {
                    if let Some(pkg) = package.as_mut() {
                        pkg.insert_metadata("description", value);
                    }
                }
                "URL" => {
                    if let Some(pkg) = package.as_mut() {
                        pkg.insert_metadata("homepage", value);
                    }
                }
                "Requires" | "Requires.private" => {
                    for entry in value.split(',') {
                        let entry = entry.trim();
                        if entry.is_empty() {
                            continue;
                        }
                        if let Some(mut dep) = self.parse_requirement(entry, file_path) {
                            if key == "Requires.private" {
                                dep.insert_metadata("private", true);
                            }
                            deps.push(dep);
                        }
                    }
                }
                "Conflicts" => {
                    if let Some(pkg) = package.as_mut() {
                        for entry in value.split(',') {
                            let entry = entry.trim();
                            if !entry.is_empty() {
                                pkg.conflicts.push(entry.to_string());
                            }
                        }
                    }
                }
                "Libs" | "Libs.private" | "Cflags" => {
                    if let Some(pkg) = package.as_mut() {
                        let flags: Vec<String> =
                            value.split_whitespace().map(|s| s.to_string()).collect();
                        let entry = pkg
                            .metadata
                            .entry("build_flags".to_string())
                            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
                        if let Some(arr) = entry.as_array_mut() {
                            arr.extend(flags.into_iter().map(serde_json::Value::from));
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(pkg) = package {
            deps.push(pkg);
        }
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FIXTURE: &str = "\
prefix=/usr/local
exec_prefix=${prefix}
libdir=${exec_prefix}/lib
includedir=${prefix}/include

Name: libfoo
Description: A library for doing foo things
Version: 1.2.3
URL: https://example.com/foo

Requires: libbar >= 2.0.0, libqux
Requires.private: libinternal >= 1.0.0
Conflicts: libold < 3.0.0

Libs: -L${libdir} -lfoo
Cflags: -I${includedir}/foo -DFOO_ENABLE
";

    fn extract(content: &str) -> Vec<Dependency> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("libfoo.pc");
        std::fs::write(&path, content).unwrap();
        PkgConfigExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    #[test]
    fn requirements_carry_constraints() {
        let deps = extract(FIXTURE);
        let libbar = deps.iter().find(|d| d.name == "libbar").unwrap();
        assert_eq!(libbar.kind, "requirement");
        assert_eq!(
            libbar.constraints,
            vec![Constraint::new(ConstraintOp::Ge, "2.0.0")]
        );

        let libqux = deps.iter().find(|d| d.name == "libqux").unwrap();
        assert!(libqux.constraints.is_empty());
    }

    #[test]
    fn private_requires_flagged() {
        let deps = extract(FIXTURE);
        let internal = deps.iter().find(|d| d.name == "libinternal").unwrap();
        assert_eq!(internal.metadata["private"], true);
    }

    #[test]
    fn package_record_emitted_last_with_version() {
        let deps = extract(FIXTURE);
        let pkg = deps.last().unwrap();
        assert_eq!(pkg.name, "libfoo");
        assert_eq!(pkg.kind, "package");
        assert_eq!(pkg.version.as_deref(), Some("1.2.3"));
        assert_eq!(pkg.conflicts, vec!["libold < 3.0.0"]);
        assert_eq!(pkg.metadata["homepage"], "https://example.com/foo");
    }

    #[test]
    fn variables_expand_in_flags() {
        let deps = extract(FIXTURE);
        let pkg = deps.last().unwrap();
        let flags = pkg.metadata["build_flags"].as_array().unwrap();
        assert!(flags.iter().any(|f| f == "-L/usr/local/lib"));
        assert!(flags.iter().any(|f| f == "-I/usr/local/include/foo"));
    }

    #[test]
    fn file_without_name_yields_no_package() {
        let deps = extract("Requires: zlib\n");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "zlib");
    }
}
