//! Buck extractor: `BUCK`, `BUCK.build`, `TARGETS`, `*.buck`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Tracks rule headers (`cpp_library`, `cpp_binary`, `prebuilt_jar`,
/// `remote_file`) to maintain the current target, then collects every
/// quoted item of a `deps = [ ... ]` literal (single or multi line) as
/// a record parented on that target. `#` and `//` comments are
/// stripped before quote-scanning.
pub struct BuckExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    rule_header: Regex,
    deps_open: Regex,
    quoted: Regex,
}

impl BuckExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            rule_header: Regex::new(
                r#"(?:cpp_library|cpp_binary|prebuilt_jar|remote_file)\(\s*name\s*=\s*"([^"]+)""#,
            )
            .unwrap(),
            deps_open: Regex::new(r"deps\s*=\s*\[").unwrap(),
            quoted: Regex::new(r#""([^"]+)""#).unwrap(),
        }
    }

    /// Quoted names on a line, with `#` and `//` comments removed.
    fn quoted_names<'a>(&self, line: &'a str) -> Vec<String> {
        let mut line = line;
        if let Some(idx) = line.find("//") {
            line = &line[..idx];
        }
        if let Some(idx) = line.find('#') {
            line = &line[..idx];
        }
        self.quoted
            .captures_iter(line)
            .map(|caps| caps[1].to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

impl Extractor for BuckExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Buck
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["BUCK", "BUCK.build", "TARGETS", "*.buck"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        let name = file_name(path);
        matches!(name, "BUCK" | "BUCK.build" | "TARGETS") || name.ends_with(".buck")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();

        let mut current_target = String::new();
        let mut in_deps_block = false;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let line = raw.trim();

            if let Some(caps) = self.rule_header.captures(line) {
                current_target = caps[1].to_string();
                in_deps_block = false;
            }

            let names = if let Some(m) = self.deps_open.find(line) {
                let after = &line[m.end()..];
                if after.contains(']') {
                    // Single-line literal: scan only the bracket span.
                    let span = &after[..after.find(']').unwrap()];
                    self.quoted_names(span)
                } else {
                    in_deps_block = true;
                    self.quoted_names(after)
                }
            } else if in_deps_block {
                let names = self.quoted_names(line);
                if line.contains(']') {
                    in_deps_block = false;
                }
                names
            } else {
                continue;
            };

            for name in names {
                let mut dep = Dependency::new(name, ExtractorKind::Buck.name());
                dep.kind = "buck_dependency".to_string();
                dep.file_path = Some(file_path.to_path_buf());
                dep.line = Some(line_no);
                if !current_target.is_empty() {
                    dep.parent = Some(current_target.clone());
                }
                deps.push(dep);
            }
        }

        Ok(deps)
    }
}
