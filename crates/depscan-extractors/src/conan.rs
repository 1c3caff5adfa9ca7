//! Conan extractor: `conanfile.txt`, `conanfile.py`, `conaninfo.txt`.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Result};
use regex::Regex;
use std::path::Path;

/// Dispatches on file name: `conanfile.txt` is read as INI-like
/// sections (only `[requires]` is extracted), `conanfile.py` is
/// regex-scanned for `requires = "..."` attributes and
/// `self.requires(...)` calls (never executed), and `conaninfo.txt`
/// parses `[requires]` entries carrying a `#revision` suffix.
pub struct ConanExtractor {
    #[allow(dead_code)]
    config: ExtractorConfig,
    txt_require: Regex,
    py_attr: Regex,
    py_call: Regex,
    info_require: Regex,
}

impl ConanExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            txt_require: Regex::new(r"^([^/\s]+)/([^@\s]+)(?:@(\S+))?$").unwrap(),
            py_attr: Regex::new(r#"requires\s*=\s*["']([^"']+)["']"#).unwrap(),
            py_call: Regex::new(r#"self\.requires\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
            info_require: Regex::new(r"^([^/\s]+)/([^@#\s]+)(?:@([^#\s]+))?#(\S+)$").unwrap(),
        }
    }

    fn record(&self, name: &str, version: &str, channel: Option<&str>, path: &Path) -> Dependency {
        let mut dep = Dependency::new(name, ExtractorKind::Conan.name());
        dep.kind = "library".to_string();
        dep.version = Some(version.to_string());
        dep.source = channel.map(|c| c.to_string());
        dep.file_path = Some(path.to_path_buf());
        dep
    }

    /// Parse a `name/version[@channel]` reference.
    fn parse_reference(&self, reference: &str, path: &Path) -> Option<Dependency> {
        let mut parts = reference.splitn(3, '/');
        let name = parts.next()?;
        let rest = parts.next()?;
        let (version, channel) = match rest.split_once('@') {
            Some((v, c)) => (v, Some(c)),
            None => (rest, None),
        };
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(self.record(name, version, channel, path))
    }

    fn extract_txt(&self, path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(path)?;
        let mut deps = Vec::new();
        let mut in_requires = false;

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "[requires]" {
                in_requires = true;
                continue;
            }
            if line.starts_with('[') {
                in_requires = false;
                continue;
            }
            if !in_requires {
                continue;
            }
            if let Some(caps) = self.txt_require.captures(line) {
                deps.push(self.record(
                    &caps[1],
                    &caps[2],
                    caps.get(3).map(|m| m.as_str()),
                    path,
                ));
            }
        }
        Ok(deps)
    }

    fn extract_py(&self, path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(path)?;
        let mut deps = Vec::new();

        for raw in content.lines() {
            let line = raw.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some(caps) = self.py_attr.captures(line) {
                for reference in caps[1].split(',') {
                    if let Some(dep) = self.parse_reference(reference.trim(), path) {
                        deps.push(dep);
                    }
                }
            }
            if let Some(caps) = self.py_call.captures(line) {
                if let Some(dep) = self.parse_reference(caps[1].trim(), path) {
                    deps.push(dep);
                }
            }
        }
        Ok(deps)
    }

    fn extract_info(&self, path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(path)?;
        let mut deps = Vec::new();
        let mut in_requires = false;

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "[requires]" {
                in_requires = true;
                continue;
            }
            if line.starts_with('[') {
                in_requires = false;
                continue;
            }
            if !in_requires {
                continue;
            }
            if let Some(caps) = self.info_require.captures(line) {
                let mut dep = self.record(
                    &caps[1],
                    &caps[2],
                    caps.get(3).map(|m| m.as_str()),
                    path,
                );
                dep.insert_metadata("revision", caps[4].to_string());
                deps.push(dep);
            }
        }
        Ok(deps)
    }
}

impl Extractor for ConanExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Conan
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["conanfile.txt", "conanfile.py", "conaninfo.txt"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        matches!(
            file_name(path),
            "conanfile.txt" | "conanfile.py" | "conaninfo.txt"
        )
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        match file_name(file_path) {
            "conanfile.txt" => self.extract_txt(file_path),
            "conanfile.py" => self.extract_py(file_path),
            "conaninfo.txt" => self.extract_info(file_path),
            other => Err(depscan_core::Error::parse(
                file_path,
                format!("unsupported conan file: {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extract(name: &str, content: &str) -> Vec<Dependency> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        ConanExtractor::new(ExtractorConfig::default())
            .extract(dir.path(), &path)
            .unwrap()
    }

    #[test]
    fn txt_requires_section_only() {
        let deps = extract(
            "conanfile.txt",
            "[requires]\n\
             boost/1.76.0\n\
             openssl/1.1.1k@conan/stable\n\
             \n\
             [generators]\n\
             cmake\n",
        );
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "boost");
        assert_eq!(deps[0].version.as_deref(), Some("1.76.0"));
        assert!(deps[0].source.is_none());
        assert_eq!(deps[1].name, "openssl");
        assert_eq!(deps[1].source.as_deref(), Some("conan/stable"));
    }

    #[test]
    fn py_attribute_and_call_forms() {
        let deps = extract(
            "conanfile.py",
            "class MyLibConan(ConanFile):\n\
             \x20   requires = \"boost/1.76.0, openssl/1.1.1k@conan/stable\"\n\
             \x20   def requirements(self):\n\
             \x20       self.requires(\"zlib/1.2.11\")\n",
        );
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["boost", "openssl", "zlib"]);
    }

    #[test]
    fn py_comments_are_not_scanned() {
        let deps = extract("conanfile.py", "# self.requires(\"hidden/1.0\")\n");
        assert!(deps.is_empty());
    }

    #[test]
    fn info_entries_carry_revision() {
        let deps = extract(
            "conaninfo.txt",
            "[requires]\n\
             boost/1.76.0@conan/stable#0123456789\n\
             zlib/1.2.11#abcdef0123\n",
        );
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].metadata["revision"], "0123456789");
        assert_eq!(deps[1].name, "zlib");
        assert!(deps[1].source.is_none());
    }
}
