//! Debian control extractor: `control` and `*.dsc`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Constraint, ConstraintOp, Dependency, Result, Scope};
use regex::Regex;
use std::path::Path;

/// Parses the RFC-822-like paragraph format of Debian control files.
/// `Depends`, `Pre-Depends`, and `Build-Depends[-Indep]` become required
/// dependencies; `Recommends`/`Suggests`/`Enhances` optional ones;
/// `Breaks`/`Conflicts` conflict entries; `Provides`/`Replaces` their
/// own kinds. Continuation lines (leading space or tab) are unfolded
/// into the previous field before parsing. Alternatives separated by
/// `|` are recorded as siblings.
pub struct ControlExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    entry: Regex,
}

impl ControlExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            entry: Regex::new(r"^(\S+?)(?:\s*\(\s*(>=|<=|=|>>|<<|>|<)\s*([^)]+)\))?$").unwrap(),
        }
    }

    /// Unfold continuation lines into logical `Field: value` lines.
    fn unfold(content: &str) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        for raw in content.lines() {
            match lines.last_mut() {
                Some(last) if raw.starts_with(' ') || raw.starts_with('\t') => {
                    last.push(' ');
                    last.push_str(raw.trim());
                }
                _ => lines.push(raw.to_string()),
            }
        }
        lines
    }

    fn parse_entry(
        &self,
        item: &str,
        kind: &str,
        required: bool,
        optional: bool,
        parent: Option<&str>,
        path: &Path,
    ) -> Option<Dependency> {
        let item = item.trim();
        if item.is_empty() || item.starts_with("${") {
            return None;
        }
        let caps = self.entry.captures(item)?;

        let mut dep = Dependency::new(&caps[1], "debian");
        dep.kind = kind.to_string();
        dep.required = required;
        dep.optional = optional;
        if optional {
            dep.scope = Some(Scope::Optional);
        }
        dep.parent = parent.map(|p| p.to_string());
        dep.file_path = Some(path.to_path_buf());

        if let (Some(op_str), Some(version)) = (caps.get(2), caps.get(3)) {
            // Debian's strict operators << and >> map onto < and >.
            let op = match op_str.as_str() {
                "<<" => Some(ConstraintOp::Lt),
                ">>" => Some(ConstraintOp::Gt),
                other => ConstraintOp::parse(other),
            };
            if let Some(op) = op {
                dep.constraints
                    .push(Constraint::new(op, version.as_str().trim()));
            }
        }
        Some(dep)
    }

    /// Split a field value into comma-separated entries and `|`
    /// alternatives, emitting one record per alternative.
    fn parse_field(
        &self,
        value: &str,
        kind: &str,
        required: bool,
        optional: bool,
        parent: Option<&str>,
        path: &Path,
        deps: &mut Vec<Dependency>,
    ) {
        for item in value.split(',') {
            for alternative in item.split('|') {
                if let Some(dep) =
                    self.parse_entry(alternative, kind, required, optional, parent, path)
                {
                    deps.push(dep);
                }
            }
        }
    }
}

impl Extractor for ControlExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Control
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["control", "*.dsc"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        let name = file_name(path);
        name == "control" || name.ends_with(".dsc")
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();
        let mut current_package: Option<String> = None;

        for line in Self::unfold(&content) {
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            let parent = current_package.as_deref();

            match field {
                "Package" => current_package = Some(value.to_string()),
                "Depends" | "Pre-Depends" | "Build-Depends" | "Build-Depends-Indep" => {
                    self.parse_field(value, "dependency", true, false, parent, file_path, &mut deps)
                }
                "Recommends" => {
                    self.parse_field(value, "recommends", false, true, parent, file_path, &mut deps)
                }
                "Suggests" => {
                    self.parse_field(value, "suggests", false, true, parent, file_path, &mut deps)
                }
                "Enhances" => {
                    self.parse_field(value, "enhances", false, true, parent, file_path, &mut deps)
                }
                "Breaks" => {
                    self.parse_field(value, "breaks", false, false, parent, file_path, &mut deps)
                }
                "Conflicts" => {
                    self.parse_field(value, "conflicts", false, false, parent, file_path, &mut deps)
                }
                "Provides" => {
                    self.parse_field(value, "provides", false, false, parent, file_path, &mut deps)
                }
                "Replaces" => {
                    self.parse_field(value, "replaces", false, false, parent, file_path, &mut deps)
                }
                _ => {}
            }
        }

        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FIXTURE: &str = "\
Source: mypackage
Build-Depends: debhelper (>= 9),
               cmake (>= 3.10),
               libssl-dev
Standards-Version: 4.5.0

Package: mypackage
Architecture: any
Depends: ${shlibs:Depends},
         libboost-system1.74.0 (>= 1.74.0),
         mailx | mail-transport-agent
Recommends: python3
Suggests: documentation-viewer
Conflicts: oldpackage (<< 2.0)
Provides: mypackage-tools
Description: Example package
 This is an example description.
";

    fn extract(content: &str) -> Vec<Dependency> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("control");
        std::fs::write(&path, content).unwrap();
        ControlExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    #[test]
    fn folded_build_depends_parse_with_constraints() {
        let deps = extract(FIXTURE);
        let debhelper = deps.iter().find(|d| d.name == "debhelper").unwrap();
        assert_eq!(debhelper.kind, "dependency");
        assert!(debhelper.required);
        assert_eq!(
            debhelper.constraints,
            vec![Constraint::new(ConstraintOp::Ge, "9")]
        );
        assert!(deps.iter().any(|d| d.name == "libssl-dev"));
    }

    #[test]
    fn variable_references_are_skipped() {
        let deps = extract(FIXTURE);
        assert!(!deps.iter().any(|d| d.name.starts_with("${")));
    }

    #[test]
    fn alternatives_become_siblings() {
        let deps = extract(FIXTURE);
        assert!(deps.iter().any(|d| d.name == "mailx"));
        assert!(deps.iter().any(|d| d.name == "mail-transport-agent"));
    }

    #[test]
    fn stanza_package_becomes_parent() {
        let deps = extract(FIXTURE);
        let boost = deps
            .iter()
            .find(|d| d.name == "libboost-system1.74.0")
            .unwrap();
        assert_eq!(boost.parent.as_deref(), Some("mypackage"));
        // Build-Depends precede any Package: stanza.
        let debhelper = deps.iter().find(|d| d.name == "debhelper").unwrap();
        assert!(debhelper.parent.is_none());
    }

    #[test]
    fn optional_fields_marked_optional() {
        let deps = extract(FIXTURE);
        let py = deps.iter().find(|d| d.name == "python3").unwrap();
        assert_eq!(py.kind, "recommends");
        assert!(py.optional);
        assert!(!py.required);
        assert_eq!(py.scope, Some(Scope::Optional));
    }

    #[test]
    fn strict_operators_map_onto_closed_set() {
        let deps = extract(FIXTURE);
        let old = deps.iter().find(|d| d.name == "oldpackage").unwrap();
        assert_eq!(old.kind, "conflicts");
        assert_eq!(old.constraints, vec![Constraint::new(ConstraintOp::Lt, "2.0")]);
    }

    #[test]
    fn provides_records_emitted() {
        let deps = extract(FIXTURE);
        let provides = deps.iter().find(|d| d.name == "mypackage-tools").unwrap();
        assert_eq!(provides.kind, "provides");
    }
}
