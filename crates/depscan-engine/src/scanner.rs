//! The concurrent scan engine: walk, dispatch, bound, aggregate.

use crate::result::{ScanResult, ScanStatus};
use chrono::Utc;
use depscan_analysis::DependencyAnalyzer;
use depscan_cache::DependencyCache;
use depscan_core::{Error, Result};
use depscan_extractors::ExtractorRegistry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Scan configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root directory to walk.
    pub target_dir: PathBuf,
    /// Where `save_results` writes, if anywhere.
    pub output_file: Option<PathBuf>,
    /// Consult and fill the extraction cache.
    pub enable_cache: bool,
    /// Upper bound on concurrent extractions (min 1).
    pub max_workers: usize,
}

/// Default worker bound.
pub const DEFAULT_MAX_WORKERS: usize = 10;

impl ScanConfig {
    /// Configuration for `target_dir` with defaults everywhere else.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            output_file: None,
            enable_cache: false,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Scan phase reported alongside the progress fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    /// Walking the tree.
    Discovering,
    /// Running extractors.
    Extracting,
    /// Building the graph diagnostics.
    Analyzing,
    /// Terminal.
    Done,
}

/// One progress update. Fractions never decrease.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Completion fraction in `[0, 1]`.
    pub fraction: f64,
    /// Current phase.
    pub phase: ScanPhase,
}

// Extraction owns everything up to this fraction; analysis and
// finalization take the rest.
const EXTRACTION_SHARE: f64 = 0.85;
const ANALYSIS_SHARE: f64 = 0.97;

/// The scan engine.
///
/// One `Scanner` owns one scan: its configuration, the shared
/// registry, an optional cache, and the aggregate result. The engine
/// is the only source of concurrency in the core; extractors run on
/// worker threads but never fan out themselves.
pub struct Scanner {
    config: ScanConfig,
    registry: Arc<ExtractorRegistry>,
    cache: Option<Arc<DependencyCache>>,
    result: Arc<Mutex<ScanResult>>,
    stopped: Arc<AtomicBool>,
    progress_tx: watch::Sender<ScanProgress>,
    progress_rx: watch::Receiver<ScanProgress>,
}

impl Scanner {
    /// Scanner with the standard extractor set.
    pub fn new(config: ScanConfig) -> Self {
        let registry = Arc::new(ExtractorRegistry::standard());
        Self::with_registry(config, registry)
    }

    /// Scanner over a caller-provided registry.
    pub fn with_registry(config: ScanConfig, registry: Arc<ExtractorRegistry>) -> Self {
        let cache = config
            .enable_cache
            .then(|| Arc::new(DependencyCache::new()));
        Self::with_parts(config, registry, cache)
    }

    /// Fully explicit construction; tests use this to point the cache
    /// at a temporary directory.
    pub fn with_parts(
        config: ScanConfig,
        registry: Arc<ExtractorRegistry>,
        cache: Option<Arc<DependencyCache>>,
    ) -> Self {
        let mut config = config;
        config.max_workers = config.max_workers.max(1);

        let result = ScanResult::new(config.target_dir.clone());
        let (progress_tx, progress_rx) = watch::channel(ScanProgress {
            fraction: 0.0,
            phase: ScanPhase::Discovering,
        });
        Self {
            config,
            registry,
            cache,
            result: Arc::new(Mutex::new(result)),
            stopped: Arc::new(AtomicBool::new(false)),
            progress_tx,
            progress_rx,
        }
    }

    /// This scan's identifier.
    pub fn id(&self) -> Uuid {
        self.result.lock().id
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> watch::Receiver<ScanProgress> {
        self.progress_rx.clone()
    }

    /// Request cancellation. The flag is honored between files;
    /// in-flight extractions run to completion.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn publish(&self, fraction: f64, phase: ScanPhase) {
        self.progress_tx.send_modify(|progress| {
            if fraction > progress.fraction {
                progress.fraction = fraction;
                progress.phase = phase;
            }
        });
        self.result.lock().progress = self.progress_rx.borrow().fraction;
    }

    /// Walk the tree and collect every file some extractor applies to.
    /// Hidden files are skipped and hidden directories pruned.
    fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.config.target_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with('.') && entry.depth() > 0)
                    .unwrap_or(false)
            });

        for entry in walker {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            let entry = entry.map_err(|e| Error::WalkFailed {
                path: self.config.target_dir.clone(),
                detail: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.registry.extractor_for(entry.path()).is_some() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Run the scan to completion.
    ///
    /// # Errors
    ///
    /// Only a failed walk of the root directory fails the scan;
    /// extractor failures land in the result's error list.
    pub async fn scan(&self) -> Result<ScanResult> {
        let start = std::time::Instant::now();
        {
            let mut result = self.result.lock();
            result.status = ScanStatus::Running;
            result.start_time = Some(Utc::now());
        }
        info!(
            target_dir = %self.config.target_dir.display(),
            cache = self.cache.is_some(),
            max_workers = self.config.max_workers,
            "starting scan"
        );

        let files = match self.discover_files() {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "directory walk failed");
                let mut result = self.result.lock();
                result.status = ScanStatus::Failed;
                result.end_time = Some(Utc::now());
                result.duration_secs = start.elapsed().as_secs_f64();
                return Err(e);
            }
        };
        debug!(files = files.len(), "discovery complete");

        let total = files.len().max(1);
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for file in files {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            // Cache hits skip dispatch entirely.
            if let Some(cache) = &self.cache {
                if let Some(deps) = cache.get(&file) {
                    debug!(file = %file.display(), "cache hit");
                    let mut result = self.result.lock();
                    for dep in deps {
                        result.add_dependency(dep);
                    }
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    drop(result);
                    self.publish(done as f64 / total as f64 * EXTRACTION_SHARE, ScanPhase::Extracting);
                    continue;
                }
            }

            let Some(extractor) = self.registry.extractor_for(&file) else {
                continue;
            };
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .expect("semaphore never closes");

            let root = self.config.target_dir.clone();
            let cache = self.cache.clone();
            let result = Arc::clone(&self.result);
            let completed = Arc::clone(&completed);

            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                match extractor.extract(&root, &file) {
                    Ok(deps) => {
                        if let Some(cache) = &cache {
                            // Best effort: a failed write never fails
                            // the scan.
                            if let Err(e) = cache.set(&file, deps.clone()) {
                                warn!(file = %file.display(), error = %e, "cache write failed");
                            }
                        }
                        let mut result = result.lock();
                        for dep in deps {
                            result.add_dependency(dep);
                        }
                    }
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "extraction failed");
                        result.lock().add_error(file.clone(), e.to_string());
                    }
                }
                completed.fetch_add(1, Ordering::SeqCst) + 1
            }));
        }

        for handle in handles {
            if let Ok(done) = handle.await {
                self.publish(done as f64 / total as f64 * EXTRACTION_SHARE, ScanPhase::Extracting);
            }
        }
        self.publish(EXTRACTION_SHARE, ScanPhase::Extracting);

        // Analysis over the aggregate.
        let snapshot = self.result.lock().dependencies.clone();
        let analysis = DependencyAnalyzer::new().analyze(&snapshot);
        self.publish(ANALYSIS_SHARE, ScanPhase::Analyzing);

        let finished = {
            let mut result = self.result.lock();
            result.analysis = Some(analysis);
            result.status = if self.stopped.load(Ordering::SeqCst) {
                ScanStatus::Stopped
            } else {
                ScanStatus::Completed
            };
            result.end_time = Some(Utc::now());
            result.duration_secs = start.elapsed().as_secs_f64();
            result.progress = 1.0;
            result.clone()
        };
        self.publish(1.0, ScanPhase::Done);

        info!(
            total = finished.total_deps,
            direct = finished.direct_deps,
            indirect = finished.indirect_deps,
            errors = finished.errors.len(),
            duration_secs = finished.duration_secs,
            "scan finished"
        );
        Ok(finished)
    }

    /// Snapshot of the current result.
    pub fn results(&self) -> ScanResult {
        self.result.lock().clone()
    }

    /// Serialize the result as pretty JSON to `output_file` (or the
    /// explicitly given path).
    pub fn save_results(&self, path: Option<&Path>) -> Result<()> {
        let target = match path.or(self.config.output_file.as_deref()) {
            Some(target) => target.to_path_buf(),
            None => {
                return Err(Error::schema(
                    &self.config.target_dir,
                    "no output file configured",
                ))
            }
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let result = self.result.lock();
        let data = serde_json::to_vec_pretty(&*result)
            .map_err(|e| Error::schema(&target, e.to_string()))?;
        std::fs::write(&target, data).map_err(|e| Error::io(&target, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "CMakeLists.txt",
            "find_package(Boost)\nfind_package(OpenCV)\n",
        );
        write(dir.path(), "src/Makefile", "LIBS = -lm\n");
        write(
            dir.path(),
            "web/package.json",
            r#"{ "name": "web", "dependencies": { "react": "^18.0.0" } }"#,
        );
        write(dir.path(), ".hidden/CMakeLists.txt", "find_package(Secret)\n");
        dir
    }

    #[tokio::test]
    async fn scan_aggregates_across_extractors() {
        let dir = project();
        let scanner = Scanner::new(ScanConfig::new(dir.path()));
        let result = scanner.scan().await.unwrap();

        assert_eq!(result.status, ScanStatus::Completed);
        let names: Vec<&str> = result.dependencies.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"Boost"));
        assert!(names.contains(&"m"));
        assert!(names.contains(&"react"));
        assert_eq!(result.total_deps, result.dependencies.len());
        assert!(result.analysis.is_some());
        assert!((result.progress - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn hidden_directories_are_pruned() {
        let dir = project();
        let scanner = Scanner::new(ScanConfig::new(dir.path()));
        let result = scanner.scan().await.unwrap();
        assert!(!result.dependencies.iter().any(|d| d.name == "Secret"));
    }

    #[tokio::test]
    async fn extractor_failure_does_not_abort_scan() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "vcpkg.json", "{ this is not json");
        write(dir.path(), "Makefile", "LIBS = -lz\n");

        let scanner = Scanner::new(ScanConfig::new(dir.path()));
        let result = scanner.scan().await.unwrap();

        assert_eq!(result.status, ScanStatus::Completed);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].file.ends_with("vcpkg.json"));
        assert!(result.dependencies.iter().any(|d| d.name == "z"));
    }

    #[tokio::test]
    async fn missing_root_fails_the_scan() {
        let scanner = Scanner::new(ScanConfig::new("/nonexistent/depscan-root"));
        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, Error::WalkFailed { .. }));
        assert_eq!(scanner.results().status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn stop_before_scan_dispatches_nothing() {
        let dir = project();
        let scanner = Scanner::new(ScanConfig::new(dir.path()));
        scanner.stop();
        let result = scanner.scan().await.unwrap();
        assert_eq!(result.status, ScanStatus::Stopped);
        assert!(result.dependencies.is_empty());
    }

    #[tokio::test]
    async fn save_results_writes_json() {
        let dir = project();
        let output = dir.path().join("out/results.json");
        let config = ScanConfig {
            output_file: Some(output.clone()),
            ..ScanConfig::new(dir.path())
        };
        let scanner = Scanner::new(config);
        scanner.scan().await.unwrap();
        scanner.save_results(None).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["status"], "completed");
        assert!(written["dependencies"].as_array().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn worker_bound_is_at_least_one() {
        let dir = project();
        let config = ScanConfig {
            max_workers: 0,
            ..ScanConfig::new(dir.path())
        };
        let scanner = Scanner::new(config);
        let result = scanner.scan().await.unwrap();
        assert_eq!(result.status, ScanStatus::Completed);
    }

    #[tokio::test]
    async fn progress_is_monotone() {
        let dir = project();
        let scanner = Scanner::new(ScanConfig::new(dir.path()));
        let mut rx = scanner.subscribe();

        scanner.scan().await.unwrap();

        let mut last = 0.0;
        // Drain whatever updates are still buffered; each must not
        // regress.
        while rx.has_changed().unwrap_or(false) {
            let progress = *rx.borrow_and_update();
            assert!(progress.fraction >= last);
            last = progress.fraction;
        }
        assert!((scanner.results().progress - 1.0).abs() < f64::EPSILON);
    }
}
