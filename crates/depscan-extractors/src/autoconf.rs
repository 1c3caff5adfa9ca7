//! Autoconf extractor: `configure.ac` / `configure.in`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Constraint, ConstraintOp, Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Extracts `PKG_CHECK_MODULES`, `AC_CHECK_LIB`, `AC_CHECK_HEADER`,
/// `AC_PATH_PROG`, `AM_INIT_AUTOMAKE`, `AC_INIT`, and
/// `AC_CONFIG_SUBDIRS` declarations. `dnl` starts an until-end-of-line
/// comment; trailing-backslash continuations are joined.
pub struct AutoconfExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    pkg_check: Regex,
    check_lib: Regex,
    check_header: Regex,
    path_prog: Regex,
    am_init: Regex,
    ac_init: Regex,
    config_subdirs: Regex,
}

/// Strip m4 quoting brackets and shell quotes from an argument token.
fn clean(token: &str) -> &str {
    token.trim_matches(|c| matches!(c, '[' | ']' | '"' | '\''))
}

impl AutoconfExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            pkg_check: Regex::new(r"PKG_CHECK_MODULES\s*\(\s*\[?\w+\]?\s*,\s*\[([^\]]+)\]").unwrap(),
            check_lib: Regex::new(r"AC_CHECK_LIB\s*\(\s*([^,\s]+)").unwrap(),
            check_header: Regex::new(r"AC_CHECK_HEADER\s*\(\s*([^,\s\)]+)").unwrap(),
            path_prog: Regex::new(r"AC_PATH_PROG\s*\(\s*\[?\w+\]?\s*,\s*([^,\s\)]+)").unwrap(),
            am_init: Regex::new(r"AM_INIT_AUTOMAKE\s*\(\s*([^,\s]+)\s*,\s*([^,\s\)]+)").unwrap(),
            ac_init: Regex::new(r"AC_INIT\s*\(\s*([^,\s]+)\s*,\s*([^,\s\)]+)").unwrap(),
            config_subdirs: Regex::new(r"AC_CONFIG_SUBDIRS\s*\(\s*([^,\s\)]+)").unwrap(),
        }
    }

    fn record(&self, name: &str, kind: &str, path: &Path, line: u32) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Autoconf.name());
        dep.kind = kind.to_string();
        dep.file_path = Some(path.to_path_buf());
        dep.line = Some(line);
        dep
    }

    /// Parse a `PKG_CHECK_MODULES` module list: package names optionally
    /// followed by an operator + version pair.
    fn parse_module_list(&self, list: &str, path: &Path, line: u32, deps: &mut Vec<Dependency>) {
        let tokens: Vec<&str> = list.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            let name = tokens[i];
            let mut dep = self.record(name, "package", path, line);
            if i + 2 <= tokens.len() - 1 {
                if let Some(op) = ConstraintOp::parse(tokens[i + 1]) {
                    let version = clean(tokens[i + 2]);
                    dep.version = Some(version.to_string());
                    dep.constraints.push(Constraint::new(op, version));
                    i += 2;
                }
            }
            deps.push(dep);
            i += 1;
        }
    }
}

impl Extractor for AutoconfExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Autoconf
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["configure.ac", "configure.in"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        matches!(file_name(path), "configure.ac" | "configure.in")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();
        let mut continuation = String::new();
        let mut continuation_start = 0u32;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;

            // dnl comments run to end of line.
            let raw = match raw.find("dnl") {
                Some(pos) => &raw[..pos],
                None => raw,
            };

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

            if let Some(caps) = self.pkg_check.captures(&line) {
                self.parse_module_list(&caps[1], file_path, line_no, &mut deps);
            }
            if let Some(caps) = self.check_lib.captures(&line) {
                deps.push(self.record(clean(&caps[1]), "library", file_path, line_no));
            }
            if let Some(caps) = self.check_header.captures(&line) {
                deps.push(self.record(clean(&caps[1]), "header", file_path, line_no));
            }
            if let Some(caps) = self.path_prog.captures(&line) {
                deps.push(self.record(clean(&caps[1]), "program", file_path, line_no));
            }
            if let Some(caps) = self.am_init.captures(&line) {
                let mut dep = self.record("automake", "build_system", file_path, line_no);
                dep.version = Some(clean(&caps[2]).to_string());
                deps.push(dep);
            }
            if let Some(caps) = self.ac_init.captures(&line) {
                let mut dep = self.record("autoconf", "build_system", file_path, line_no);
                dep.version = Some(clean(&caps[2]).to_string());
                deps.push(dep);
            }
            if let Some(caps) = self.config_subdirs.captures(&line) {
                deps.push(self.record(clean(&caps[1]), "subproject", file_path, line_no));
            }
        }

        Ok(deps)
    }
}
