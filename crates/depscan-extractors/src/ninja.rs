//! Ninja extractor: `build.ninja` and `*.ninja`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;

/// Parses variable definitions and `build` declarations from generated
/// Ninja files. Each explicit input becomes a `ninja_input` record and
/// each implicit input a `ninja_implicit` record, parented on the first
/// output; `include` and `subninja` directives get records of their own
/// kind. `$VAR` / `${VAR}` references are expanded against the local
/// variable table; unknown variables pass through unchanged.
pub struct NinjaExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    build_rule: Regex,
    include: Regex,
    subninja: Regex,
    variable: Regex,
    var_ref: Regex,
}

impl NinjaExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            build_rule: Regex::new(
                r"^build\s+([^:]+):\s+(\S+)\s+([^|#]+?)(?:\|\s*([^#]+?))?\s*(?:#.*)?$",
            )
            .unwrap(),
            include: Regex::new(r"^include\s+([^#]+?)\s*(?:#.*)?$").unwrap(),
            subninja: Regex::new(r"^subninja\s+([^#]+?)\s*(?:#.*)?$").unwrap(),
            variable: Regex::new(r"^([\w.]+)\s*=\s*([^#]*?)\s*(?:#.*)?$").unwrap(),
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

    fn record(&self, name: String, kind: &str, path: &Path, line: u32) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Ninja.name());
        dep.kind = kind.to_string();
        dep.file_path = Some(path.to_path_buf());
        dep.line = Some(line);
        dep
    }
}

impl Extractor for NinjaExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Ninja
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["build.ninja", "*.ninja"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        let name = file_name(path);
        name == "build.ninja" || name.ends_with(".ninja")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();
        let mut variables: HashMap<String, String> = HashMap::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = self.build_rule.captures(line) {
                let outputs: Vec<&str> = caps[1].split_whitespace().collect();
                let rule = caps[2].to_string();
                let parent = outputs
                    .first()
                    .map(|o| self.expand(o, &variables))
                    .unwrap_or_default();

                for input in caps[3].split_whitespace() {
                    let mut dep =
                        self.record(self.expand(input, &variables), "ninja_input", file_path, line_no);
                    dep.parent = Some(parent.clone());
                    dep.insert_metadata("rule", rule.clone());
                    deps.push(dep);
                }
                if let Some(implicit) = caps.get(4) {
                    for input in implicit.as_str().split_whitespace() {
                        let mut dep = self.record(
                            self.expand(input, &variables),
                            "ninja_implicit",
                            file_path,
                            line_no,
                        );
                        dep.parent = Some(parent.clone());
                        dep.insert_metadata("rule", rule.clone());
                        deps.push(dep);
                    }
                }
                continue;
            }

            if let Some(caps) = self.include.captures(line) {
                let target = self.expand(caps[1].trim(), &variables);
                deps.push(self.record(target, "ninja_include", file_path, line_no));
                continue;
            }
            if let Some(caps) = self.subninja.captures(line) {
                let target = self.expand(caps[1].trim(), &variables);
                deps.push(self.record(target, "ninja_subninja", file_path, line_no));
                continue;
            }
            if let Some(caps) = self.variable.captures(line) {
                variables.insert(caps[1].trim().to_string(), caps[2].trim().to_string());
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
        let path = dir.path().join("build.ninja");
        std::fs::write(&path, content).unwrap();
        NinjaExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    #[test]
    fn variables_expand_in_inputs_and_outputs() {
        let deps = extract(
            "srcdir = src\n\
             objdir = build/obj\n\
             build $objdir/main.o: cxx $srcdir/main.cpp\n",
        );
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "src/main.cpp");
        assert_eq!(deps[0].kind, "ninja_input");
        assert_eq!(deps[0].parent.as_deref(), Some("build/obj/main.o"));
        assert_eq!(deps[0].metadata["rule"], "cxx");
    }

    #[test]
    fn unknown_variables_pass_through() {
        let deps = extract("build out.o: cc ${missing}/a.c\n");
        assert_eq!(deps[0].name, "${missing}/a.c");
    }

    #[test]
    fn implicit_inputs_get_their_own_kind() {
        let deps = extract("build app: link main.o | libfoo.a libbar.a\n");
        let kinds: Vec<(&str, &str)> = deps
            .iter()
            .map(|d| (d.name.as_str(), d.kind.as_str()))
            .collect();
        assert_eq!(
            kinds,
            [
                ("main.o", "ninja_input"),
                ("libfoo.a", "ninja_implicit"),
                ("libbar.a", "ninja_implicit"),
            ]
        );
        assert!(deps.iter().all(|d| d.parent.as_deref() == Some("app")));
    }

    #[test]
    fn include_and_subninja_directives() {
        let deps = extract(
            "rules = rules.ninja\n\
             include $rules\n\
             subninja sub/build.ninja\n",
        );
        assert_eq!(deps[0].name, "rules.ninja");
        assert_eq!(deps[0].kind, "ninja_include");
        assert_eq!(deps[1].name, "sub/build.ninja");
        assert_eq!(deps[1].kind, "ninja_subninja");
    }

    #[test]
    fn comments_and_blank_lines_skipped() {
        let deps = extract("# build x: cc y\n\nbuild a.o: cc a.c\n");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].line, Some(3));
    }
}
