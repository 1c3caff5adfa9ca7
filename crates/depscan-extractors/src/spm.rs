//! Swift Package Manager extractor: `Package.swift` plus
//! `Package.resolved`.
//!
//! `Package.swift` is Swift source; the declarations are matched
//! textually, never compiled.

use crate::config::ExtractorConfig;
use crate::registry::{file_name, Extractor, ExtractorKind};
use crate::util::read_manifest;
use depscan_core::{Dependency, Error, Result, Scope};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct PackageResolved {
    #[serde(default)]
    pins: Vec<ResolvedPin>,
    #[serde(default)]
    object: Option<ResolvedObject>,
}

#[derive(Debug, Deserialize)]
struct ResolvedObject {
    #[serde(default)]
    pins: Vec<ResolvedPin>,
}

#[derive(Debug, Deserialize)]
struct ResolvedPin {
    /// v2+ key.
    #[serde(default)]
    identity: Option<String>,
    /// v1 key.
    #[serde(default, rename = "package")]
    package: Option<String>,
    #[serde(default)]
    state: ResolvedState,
}

#[derive(Debug, Default, Deserialize)]
struct ResolvedState {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    revision: Option<String>,
}

impl ResolvedPin {
    fn identity(&self) -> Option<&str> {
        self.identity.as_deref().or(self.package.as_deref())
    }
}

/// Extracts `.package(...)` declarations from the manifest. Version
/// selection precedence: `exact` > `branch=X` > `commit=Y` >
/// `"LOWER...UPPER"` > `">=LOWER"`. Pins from `Package.resolved`
/// overwrite versions by case-insensitive identity. Dependencies of
/// `.testTarget` targets are marked dev scope, and the manifest's
/// `platforms` list rides along as metadata on every record.
pub struct SpmExtractor {
    config: ExtractorConfig,
    package_decl: Regex,
    exact: Regex,
    branch: Regex,
    revision: Regex,
    from: Regex,
    range: Regex,
    path_decl: Regex,
    test_target: Regex,
    quoted: Regex,
    platforms_block: Regex,
    platform_entry: Regex,
}

/// Package identity of a repository URL: last path segment, `.git`
/// stripped, lowercased comparisons happen at the call sites.
fn url_identity(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    last.trim_end_matches(".git").to_string()
}

impl SpmExtractor {
    /// Build the extractor with its patterns compiled once.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            package_decl: Regex::new(
                r#"\.package\s*\(\s*(?:name:\s*"([^"]+)"\s*,\s*)?url:\s*"([^"]+)"\s*,\s*((?:[^()\n]|\([^()\n]*\))*)\)"#,
            )
            .unwrap(),
            exact: Regex::new(r#"exact:\s*"([^"]+)""#).unwrap(),
            branch: Regex::new(r#"branch:\s*"([^"]+)""#).unwrap(),
            revision: Regex::new(r#"revision:\s*"([^"]+)""#).unwrap(),
            from: Regex::new(r#"from:\s*"([^"]+)""#).unwrap(),
            range: Regex::new(r#""([^"]+)"\s*\.\.[.<]\s*"([^"]+)""#).unwrap(),
            path_decl: Regex::new(r#"\.package\s*\(\s*path:\s*"([^"]+)"\s*\)"#).unwrap(),
            test_target: Regex::new(r#"\.testTarget\s*\(\s*name:\s*"[^"]+"\s*,\s*dependencies:\s*\[([^\]]*)\]"#)
                .unwrap(),
            quoted: Regex::new(r#""([^"]+)""#).unwrap(),
            platforms_block: Regex::new(r"platforms:\s*\[([^\]]*)\]").unwrap(),
            platform_entry: Regex::new(r#"\.(\w+)\s*\(\s*\.?v?([\w."]+?)\s*\)"#).unwrap(),
        }
    }

    /// Version from a `.package` requirement clause, honoring the
    /// manifest precedence order.
    fn requirement_version(&self, clause: &str, dep: &mut Dependency) {
        if let Some(caps) = self.exact.captures(clause) {
            dep.version = Some(caps[1].to_string());
        } else if let Some(caps) = self.branch.captures(clause) {
            dep.branch = Some(caps[1].to_string());
            dep.version = Some(format!("branch={}", &caps[1]));
        } else if let Some(caps) = self.revision.captures(clause) {
            dep.commit = Some(caps[1].to_string());
            dep.version = Some(format!("commit={}", &caps[1]));
        } else if let Some(caps) = self.range.captures(clause) {
            dep.version = Some(format!("{}...{}", &caps[1], &caps[2]));
        } else if let Some(caps) = self.from.captures(clause) {
            dep.version = Some(format!(">={}", &caps[1]));
        }
    }

    fn apply_resolved(&self, resolved_path: &Path, deps: &mut [Dependency]) -> Result<()> {
        let content = read_manifest(resolved_path)?;
        let resolved: PackageResolved = serde_json::from_str(&content)
            .map_err(|e| Error::schema(resolved_path, e.to_string()))?;

        let pins = if !resolved.pins.is_empty() {
            resolved.pins
        } else {
            resolved.object.map(|o| o.pins).unwrap_or_default()
        };

        for dep in deps.iter_mut() {
            for pin in &pins {
                let Some(identity) = pin.identity() else { continue };
                if !identity.eq_ignore_ascii_case(&dep.name) {
                    continue;
                }
                if let Some(version) = &pin.state.version {
                    dep.version = Some(version.clone());
                } else if let Some(branch) = &pin.state.branch {
                    dep.version = Some(format!("branch={branch}"));
                } else if let Some(revision) = &pin.state.revision {
                    dep.version = Some(format!("commit={revision}"));
                }
                break;
            }
        }
        Ok(())
    }
}

impl Extractor for SpmExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Spm
    }

    fn patterns(&self) -> &'static [&'static str] {
        &["Package.swift"]
    }

    fn is_applicable(&self, path: &Path) -> bool {
        file_name(path) == "Package.swift"
    }

    fn extract(&self, _project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        let content = read_manifest(file_path)?;
        let mut deps = Vec::new();

        for caps in self.package_decl.captures_iter(&content) {
            let url = caps[2].to_string();
            let name = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| url_identity(&url));

            let mut dep = Dependency::new(name, ExtractorKind::Spm.name());
            dep.kind = "spm".to_string();
            dep.source = Some(url.clone());
            dep.repository = Some(url);
            dep.file_path = Some(file_path.to_path_buf());
            self.requirement_version(&caps[3], &mut dep);
            deps.push(dep);
        }

        for caps in self.path_decl.captures_iter(&content) {
            let local = caps[1].to_string();
            let mut dep = Dependency::new(url_identity(&local), ExtractorKind::Spm.name());
            dep.kind = "spm".to_string();
            dep.source = Some(local);
            dep.file_path = Some(file_path.to_path_buf());
            deps.push(dep);
        }

        let resolved_path = file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("Package.resolved");
        if resolved_path.is_file() {
            if let Err(e) = self.apply_resolved(&resolved_path, &mut deps) {
                warn!(file = %resolved_path.display(), error = %e, "skipping Package.resolved");
            }
        }

        // Test targets demote their dependencies to dev scope.
        for caps in self.test_target.captures_iter(&content) {
            for item in self.quoted.captures_iter(&caps[1]) {
                for dep in deps.iter_mut() {
                    if item[1].ends_with(dep.name.as_str()) {
                        dep.scope = Some(Scope::Dev);
                    }
                }
            }
        }
        if self.config.ignore_tests {
            deps.retain(|d| d.scope != Some(Scope::Dev));
        }

        if let Some(block) = self.platforms_block.captures(&content) {
            let platforms: Vec<String> = self
                .platform_entry
                .captures_iter(&block[1])
                .map(|p| format!("{} {}", &p[1], p[2].trim_matches('"')))
                .collect();
            if !platforms.is_empty() {
                for dep in &mut deps {
                    dep.insert_metadata("platforms", platforms.clone());
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

    const MANIFEST: &str = r#"// swift-tools-version:5.7
import PackageDescription

let package = Package(
    name: "MyApp",
    platforms: [ .iOS(.v13), .macOS(.v12) ],
    dependencies: [
        .package(url: "https://github.com/Alamofire/Alamofire.git", from: "5.6.0"),
        .package(url: "https://github.com/realm/SwiftLint.git", exact: "0.50.3"),
        .package(url: "https://github.com/acme/Experimental.git", branch: "main"),
        .package(url: "https://github.com/Quick/Quick.git", from: "6.0.0"),
    ],
    targets: [
        .target(name: "App", dependencies: ["Alamofire"]),
        .testTarget(name: "AppTests", dependencies: ["App", "Quick"]),
    ]
)
"#;

    fn extract_at(dir: &Path, manifest: &str) -> Vec<Dependency> {
        let path = dir.join("Package.swift");
        std::fs::write(&path, manifest).unwrap();
        SpmExtractor::new(ExtractorConfig::default())
            .extract(dir, &path)
            .unwrap()
    }

    #[test]
    fn requirement_precedence() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(dir.path(), MANIFEST);
        let by_name = |n: &str| deps.iter().find(|d| d.name == n).unwrap();
        assert_eq!(by_name("Alamofire").version.as_deref(), Some(">=5.6.0"));
        assert_eq!(by_name("SwiftLint").version.as_deref(), Some("0.50.3"));
        assert_eq!(
            by_name("Experimental").version.as_deref(),
            Some("branch=main")
        );
    }

    #[test]
    fn range_requirements_truncate_to_bounds() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(
            dir.path(),
            r#".package(url: "https://github.com/a/b.git", "1.0.0"..<"2.0.0"),"#,
        );
        assert_eq!(deps[0].version.as_deref(), Some("1.0.0...2.0.0"));
    }

    #[test]
    fn resolved_pins_overwrite_by_identity() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Package.resolved"),
            r#"{
  "pins": [
    {
      "identity": "alamofire",
      "location": "https://github.com/Alamofire/Alamofire.git",
      "state": { "version": "5.6.4" }
    }
  ],
  "version": 2
}"#,
        )
        .unwrap();
        let deps = extract_at(dir.path(), MANIFEST);
        let alamofire = deps.iter().find(|d| d.name == "Alamofire").unwrap();
        assert_eq!(alamofire.version.as_deref(), Some("5.6.4"));
    }

    #[test]
    fn v1_resolved_object_pins_supported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Package.resolved"),
            r#"{
  "object": {
    "pins": [
      { "package": "Quick", "state": { "branch": "main" } }
    ]
  },
  "version": 1
}"#,
        )
        .unwrap();
        let deps = extract_at(dir.path(), MANIFEST);
        let quick = deps.iter().find(|d| d.name == "Quick").unwrap();
        assert_eq!(quick.version.as_deref(), Some("branch=main"));
    }

    #[test]
    fn test_target_dependencies_marked_dev() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(dir.path(), MANIFEST);
        let quick = deps.iter().find(|d| d.name == "Quick").unwrap();
        assert_eq!(quick.scope, Some(Scope::Dev));
        let alamofire = deps.iter().find(|d| d.name == "Alamofire").unwrap();
        assert_eq!(alamofire.scope, None);
    }

    #[test]
    fn platforms_attached_to_every_record() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(dir.path(), MANIFEST);
        assert_eq!(
            deps[0].metadata["platforms"],
            serde_json::json!(["iOS 13", "macOS 12"])
        );
    }

    #[test]
    fn local_path_packages_extracted() {
        let dir = TempDir::new().unwrap();
        let deps = extract_at(dir.path(), r#".package(path: "../LocalKit"),"#);
        assert_eq!(deps[0].name, "LocalKit");
        assert_eq!(deps[0].source.as_deref(), Some("../LocalKit"));
    }
}
