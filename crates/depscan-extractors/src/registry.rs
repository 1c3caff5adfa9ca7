//! Extractor trait, kinds, and the dispatch registry.

use crate::config::ExtractorConfig;
use depscan_core::{Dependency, Result};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Closed set of supported manifest formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ExtractorKind {
    /// CMakeLists.txt / *.cmake
    Cmake,
    /// Makefile / makefile
    Make,
    /// build.ninja / *.ninja
    Ninja,
    /// meson.build
    Meson,
    /// configure.ac / configure.in
    Autoconf,
    /// *.pc
    PkgConfig,
    /// Debian control / *.dsc
    Control,
    /// conanfile.txt / conanfile.py / conaninfo.txt
    Conan,
    /// vcpkg.json
    Vcpkg,
    /// BUILD / WORKSPACE (Bazel)
    Bazel,
    /// BUCK / TARGETS
    Buck,
    /// SConstruct / SConscript
    Scons,
    /// build.gradle / settings.gradle (Groovy and Kotlin DSL)
    Gradle,
    /// pom.xml
    Maven,
    /// build.xml (Ant)
    Ant,
    /// package.json + package-lock.json
    Npm,
    /// yarn.lock
    Yarn,
    /// Cargo.toml + Cargo.lock
    Cargo,
    /// pyproject.toml + poetry.lock
    Poetry,
    /// composer.json + composer.lock
    Composer,
    /// *.csproj / *.fsproj / *.vbproj + project.assets.json
    Nuget,
    /// Podfile.lock
    Cocoapods,
    /// Cartfile + Cartfile.resolved
    Carthage,
    /// Package.swift + Package.resolved
    Spm,
    /// .gitmodules
    Submodule,
}

impl ExtractorKind {
    /// Stable lowercase tag; doubles as the record's `build_system`.
    pub fn name(&self) -> &'static str {
        match self {
            ExtractorKind::Cmake => "cmake",
            ExtractorKind::Make => "make",
            ExtractorKind::Ninja => "ninja",
            ExtractorKind::Meson => "meson",
            ExtractorKind::Autoconf => "autoconf",
            ExtractorKind::PkgConfig => "pkgconfig",
            ExtractorKind::Control => "control",
            ExtractorKind::Conan => "conan",
            ExtractorKind::Vcpkg => "vcpkg",
            ExtractorKind::Bazel => "bazel",
            ExtractorKind::Buck => "buck",
            ExtractorKind::Scons => "scons",
            ExtractorKind::Gradle => "gradle",
            ExtractorKind::Maven => "maven",
            ExtractorKind::Ant => "ant",
            ExtractorKind::Npm => "npm",
            ExtractorKind::Yarn => "yarn",
            ExtractorKind::Cargo => "cargo",
            ExtractorKind::Poetry => "poetry",
            ExtractorKind::Composer => "composer",
            ExtractorKind::Nuget => "nuget",
            ExtractorKind::Cocoapods => "cocoapods",
            ExtractorKind::Carthage => "carthage",
            ExtractorKind::Spm => "spm",
            ExtractorKind::Submodule => "submodule",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A format-specific dependency extractor.
///
/// Extractors are pure parsers: one file in (plus, for some formats, a
/// sibling lockfile or adjacent directory), a list of records out. They
/// never panic on malformed input; failures come back as structured
/// errors naming the kind, file, and detail.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`; the scan engine invokes them
/// from worker threads.
pub trait Extractor: Send + Sync {
    /// Which format this extractor handles.
    fn kind(&self) -> ExtractorKind;

    /// Human-readable tag.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Tie-breaker when several extractors match one file; higher wins.
    fn priority(&self) -> u32 {
        0
    }

    /// File-name globs this extractor claims. Informational;
    /// [`Extractor::is_applicable`] is the authoritative predicate.
    fn patterns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether this extractor applies to `path`, judged by file name.
    fn is_applicable(&self, path: &Path) -> bool;

    /// Parse `file_path` into dependency records.
    ///
    /// `project_root` anchors relative references (workspace globs,
    /// module recursion, sibling lockfiles outside the file's own
    /// directory).
    ///
    /// # Errors
    ///
    /// I/O and parse failures return a structured error; the scan
    /// engine records them per file without aborting the scan.
    fn extract(&self, project_root: &Path, file_path: &Path) -> Result<Vec<Dependency>>;
}

/// Factory producing an extractor from shared configuration.
pub type ExtractorFactory = fn(ExtractorConfig) -> Arc<dyn Extractor>;

/// Registry mapping kinds to factories, with registration order kept
/// for dispatch tie-breaking.
///
/// The registry is built once at scanner startup and read-only after:
/// share it via `Arc`.
pub struct ExtractorRegistry {
    entries: Vec<(ExtractorKind, Arc<dyn Extractor>)>,
    config: ExtractorConfig,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            config: ExtractorConfig::default(),
        }
    }

    /// Build the standard set with default configuration.
    pub fn standard() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    /// Build the standard set, threading `config` into every extractor.
    pub fn with_config(config: ExtractorConfig) -> Self {
        let mut registry = Self::new();
        registry.config = config.clone();
        for (kind, factory) in crate::standard_factories() {
            registry.register(kind, factory(config.clone()));
        }
        registry
    }

    /// Register an extractor. Later registrations of the same kind
    /// shadow earlier ones in [`ExtractorRegistry::get`], but dispatch
    /// order is decided by first registration.
    pub fn register(&mut self, kind: ExtractorKind, extractor: Arc<dyn Extractor>) {
        self.entries.push((kind, extractor));
    }

    /// Fetch the most recently registered extractor of `kind`.
    pub fn get(&self, kind: ExtractorKind) -> Option<Arc<dyn Extractor>> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, e)| Arc::clone(e))
    }

    /// All registered extractors, in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Extractor>> {
        self.entries.iter().map(|(_, e)| e)
    }

    /// Pick the extractor for `path`: among applicable extractors the
    /// highest priority wins, ties broken by registration order. `None`
    /// when no extractor applies or the file is filtered out by the
    /// include/exclude globs.
    pub fn extractor_for(&self, path: &Path) -> Option<Arc<dyn Extractor>> {
        if !self.config.allows(file_name(path)) {
            return None;
        }
        let mut best: Option<&Arc<dyn Extractor>> = None;
        for (_, extractor) in &self.entries {
            if !extractor.is_applicable(path) {
                continue;
            }
            match best {
                Some(current) if extractor.priority() <= current.priority() => {}
                _ => best = Some(extractor),
            }
        }
        best.map(Arc::clone)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &self.entries.len())
            .finish()
    }
}

/// File name of `path`, or the empty string for pathological paths.
pub(crate) fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeExtractor {
        kind: ExtractorKind,
        priority: u32,
        matches: &'static str,
    }

    impl Extractor for FakeExtractor {
        fn kind(&self) -> ExtractorKind {
            self.kind
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn is_applicable(&self, path: &Path) -> bool {
            file_name(path) == self.matches
        }
        fn extract(&self, _root: &Path, _path: &Path) -> Result<Vec<Dependency>> {
            Ok(vec![])
        }
    }

    fn fake(kind: ExtractorKind, priority: u32, matches: &'static str) -> Arc<dyn Extractor> {
        Arc::new(FakeExtractor {
            kind,
            priority,
            matches,
        })
    }

    #[test]
    fn highest_priority_wins() {
        let mut registry = ExtractorRegistry::new();
        registry.register(ExtractorKind::Make, fake(ExtractorKind::Make, 0, "BUILD"));
        registry.register(ExtractorKind::Bazel, fake(ExtractorKind::Bazel, 5, "BUILD"));

        let picked = registry.extractor_for(Path::new("/p/BUILD")).unwrap();
        assert_eq!(picked.kind(), ExtractorKind::Bazel);
    }

    #[test]
    fn ties_break_by_registration_order() {
        let mut registry = ExtractorRegistry::new();
        registry.register(ExtractorKind::Buck, fake(ExtractorKind::Buck, 1, "BUILD"));
        registry.register(ExtractorKind::Bazel, fake(ExtractorKind::Bazel, 1, "BUILD"));

        let picked = registry.extractor_for(Path::new("BUILD")).unwrap();
        assert_eq!(picked.kind(), ExtractorKind::Buck);
    }

    #[test]
    fn unmatched_file_is_skipped() {
        let registry = ExtractorRegistry::standard();
        assert!(registry.extractor_for(Path::new("README.md")).is_none());
        assert!(registry.extractor_for(Path::new("main.cpp")).is_none());
    }

    #[test]
    fn standard_set_covers_common_manifests() {
        let registry = ExtractorRegistry::standard();
        for name in [
            "CMakeLists.txt",
            "Makefile",
            "build.ninja",
            "meson.build",
            "configure.ac",
            "zlib.pc",
            "control",
            "conanfile.txt",
            "vcpkg.json",
            "WORKSPACE",
            "BUCK",
            "SConstruct",
            "build.gradle",
            "pom.xml",
            "build.xml",
            "package.json",
            "yarn.lock",
            "Cargo.toml",
            "pyproject.toml",
            "composer.json",
            "app.csproj",
            "Podfile",
            "Cartfile",
            "Package.swift",
            ".gitmodules",
        ] {
            assert!(
                registry.extractor_for(Path::new(name)).is_some(),
                "no extractor for {name}"
            );
        }
    }

    #[test]
    fn get_returns_latest_registration() {
        let mut registry = ExtractorRegistry::new();
        registry.register(ExtractorKind::Make, fake(ExtractorKind::Make, 0, "Makefile"));
        registry.register(ExtractorKind::Make, fake(ExtractorKind::Make, 9, "Makefile"));
        assert_eq!(registry.get(ExtractorKind::Make).unwrap().priority(), 9);
    }
}
