//! End-to-end scan pipeline tests: discovery, dispatch, caching,
//! aggregation, and analysis working together over a real tree.

use depscan_analysis::{
    FixedVersionProvider, ResolveOptions, ResolutionStrategy, Resolver,
};
use depscan_cache::DependencyCache;
use depscan_core::{Dependency, Result};
use depscan_engine::{ScanConfig, ScanStatus, Scanner};
use depscan_extractors::{Extractor, ExtractorKind, ExtractorRegistry};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A multi-ecosystem fixture tree.
fn fixture_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "CMakeLists.txt",
        "find_package(Boost)\ntarget_link_libraries(app PRIVATE ssl crypto)\n",
    );
    write(
        dir.path(),
        "build.ninja",
        "srcdir = src\nobjdir = build/obj\nbuild $objdir/main.o: cxx $srcdir/main.cpp\n",
    );
    write(
        dir.path(),
        "app/settings.gradle",
        "include ':app'\ninclude ':lib:common'\n",
    );
    write(
        dir.path(),
        "web/package.json",
        r#"{
  "name": "web",
  "workspaces": ["packages/*"],
  "dependencies": { "express": "^4.18.0" }
}"#,
    );
    write(
        dir.path(),
        "web/packages/sub/package.json",
        r#"{ "name": "sub", "dependencies": { "moment": "^2.29.1" } }"#,
    );
    write(
        dir.path(),
        "native/conanfile.txt",
        "[requires]\nboost/1.76.0\nzlib/1.2.11\n\n[generators]\ncmake\n",
    );
    dir
}

#[tokio::test]
async fn pipeline_covers_heterogeneous_manifests() {
    let dir = fixture_project();
    let scanner = Scanner::new(ScanConfig::new(dir.path()));
    let result = scanner.scan().await.unwrap();

    assert_eq!(result.status, ScanStatus::Completed);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let by_name: Vec<&str> = result.dependencies.iter().map(|d| d.name.as_str()).collect();
    // CMake
    assert!(by_name.contains(&"Boost"));
    assert!(by_name.contains(&"ssl"));
    // Ninja, with variables expanded on both sides of the edge
    let ninja = result
        .dependencies
        .iter()
        .find(|d| d.kind == "ninja_input")
        .unwrap();
    assert_eq!(ninja.name, "src/main.cpp");
    assert_eq!(ninja.parent.as_deref(), Some("build/obj/main.o"));
    // Gradle settings
    let subprojects: Vec<&str> = result
        .dependencies
        .iter()
        .filter(|d| d.kind == "gradle_subproject")
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(subprojects, [":app", ":lib:common"]);
    // NPM workspaces
    assert!(by_name.contains(&"express"));
    assert!(by_name.contains(&"moment"));
    // Conan
    assert!(by_name.contains(&"zlib"));

    let systems = &result.build_systems;
    for expected in ["cmake", "ninja", "gradle", "npm", "conan"] {
        assert!(systems.iter().any(|s| s == expected), "missing {expected}");
    }

    let analysis = result.analysis.as_ref().unwrap();
    assert_eq!(analysis.total, result.total_deps);
}

/// The multiset of records from a scan equals the union of running
/// each matched extractor by hand.
#[tokio::test]
async fn aggregation_matches_per_file_extraction() {
    let dir = fixture_project();
    let registry = ExtractorRegistry::standard();

    let mut expected: BTreeMap<String, usize> = BTreeMap::new();
    for entry in walk_files(dir.path()) {
        if let Some(extractor) = registry.extractor_for(&entry) {
            for dep in extractor.extract(dir.path(), &entry).unwrap() {
                *expected.entry(dep.name).or_default() += 1;
            }
        }
    }

    let scanner = Scanner::new(ScanConfig::new(dir.path()));
    let result = scanner.scan().await.unwrap();
    let mut actual: BTreeMap<String, usize> = BTreeMap::new();
    for dep in result.dependencies {
        *actual.entry(dep.name).or_default() += 1;
    }

    assert_eq!(actual, expected);
}

fn walk_files(root: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap().flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// An extractor that counts how often it runs; used to observe cache
/// hits.
struct CountingExtractor {
    invocations: Arc<AtomicUsize>,
}

impl Extractor for CountingExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Make
    }

    fn is_applicable(&self, path: &Path) -> bool {
        path.file_name().and_then(|n| n.to_str()) == Some("Makefile")
    }

    fn extract(&self, _root: &Path, file_path: &Path) -> Result<Vec<Dependency>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let mut dep = Dependency::new("counted", "make");
        dep.kind = "library".to_string();
        dep.file_path = Some(file_path.to_path_buf());
        Ok(vec![dep])
    }
}

#[tokio::test]
async fn unchanged_file_is_served_from_cache_on_rescan() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "Makefile", "LIBS = -lm\n");

    let invocations = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(DependencyCache::with_dir(dir.path().join(".cache")));

    let scan = |invocations: Arc<AtomicUsize>, cache: Arc<DependencyCache>| {
        let mut registry = ExtractorRegistry::new();
        registry.register(
            ExtractorKind::Make,
            Arc::new(CountingExtractor { invocations }),
        );
        Scanner::with_parts(
            ScanConfig {
                enable_cache: true,
                ..ScanConfig::new(dir.path())
            },
            Arc::new(registry),
            Some(cache),
        )
    };

    let first = scan(Arc::clone(&invocations), Arc::clone(&cache));
    let result = first.scan().await.unwrap();
    assert_eq!(result.dependencies.len(), 1);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    // Touch the file without changing its content: the hash still
    // matches, so the second scan must not invoke the extractor.
    write(dir.path(), "Makefile", "LIBS = -lm\n");
    let second = scan(Arc::clone(&invocations), Arc::clone(&cache));
    let result = second.scan().await.unwrap();
    assert_eq!(result.dependencies.len(), 1);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    // A content change invalidates the entry and re-runs extraction.
    write(dir.path(), "Makefile", "LIBS = -lm -lz\n");
    let third = scan(Arc::clone(&invocations), Arc::clone(&cache));
    third.scan().await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

/// Scan output feeds straight into the resolver.
#[tokio::test]
async fn scan_then_resolve_selects_versions_per_strategy() {
    let mut app = Dependency::new("A", "test");
    app.kind = "library".to_string();
    app.version = Some("1.0.0".to_string());
    let mut b = Dependency::new("B", "test");
    b.kind = "library".to_string();
    b.version = Some(">=1.0".to_string());
    app.dependencies.push(b);
    let records = vec![app];

    let provider = || {
        Box::new(FixedVersionProvider::new(&["1.0.0", "1.1.0", "2.0.0"]))
    };

    let newest = Resolver::with_provider(
        ResolveOptions {
            strategy: ResolutionStrategy::Newest,
            strict: false,
        },
        provider(),
    )
    .resolve(&records)
    .unwrap();
    let b = newest.resolved.iter().find(|d| d.name == "B").unwrap();
    assert_eq!(b.version.as_deref(), Some("2.0.0"));

    let minimal = Resolver::with_provider(
        ResolveOptions {
            strategy: ResolutionStrategy::Minimal,
            strict: false,
        },
        provider(),
    )
    .resolve(&records)
    .unwrap();
    let b = minimal.resolved.iter().find(|d| d.name == "B").unwrap();
    assert_eq!(b.version.as_deref(), Some("1.0.0"));
}
