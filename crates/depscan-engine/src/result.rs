//! Scan result types.

use chrono::{DateTime, Utc};
use depscan_analysis::AnalysisResult;
use depscan_core::Dependency;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle of a scan. Terminal states are never left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Created, not started.
    Pending,
    /// Walking and extracting.
    Running,
    /// Finished normally.
    Completed,
    /// The root walk failed.
    Failed,
    /// Cancelled by the caller.
    Stopped,
}

impl ScanStatus {
    /// Whether the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Stopped
        )
    }
}

/// A per-file extraction failure. Failures are collected, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanError {
    /// The file that failed.
    pub file: PathBuf,
    /// What went wrong.
    pub message: String,
}

/// Aggregate output of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Scan identifier.
    pub id: Uuid,
    /// Current lifecycle state.
    pub status: ScanStatus,
    /// Monotone completion fraction in `[0, 1]`.
    pub progress: f64,
    /// The scanned root.
    pub project_path: PathBuf,
    /// When the scan started.
    pub start_time: Option<DateTime<Utc>>,
    /// When the scan reached a terminal state.
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock duration in seconds.
    pub duration_secs: f64,
    /// Every record every extractor produced.
    pub dependencies: Vec<Dependency>,
    /// Records total (equals `dependencies.len()`).
    pub total_deps: usize,
    /// Records without lockfile-pinned children.
    pub direct_deps: usize,
    /// Records carrying pinned children.
    pub indirect_deps: usize,
    /// Distinct ecosystems observed, in observation order.
    pub build_systems: Vec<String>,
    /// Graph diagnostics over the record set.
    pub analysis: Option<AnalysisResult>,
    /// Per-file failures.
    pub errors: Vec<ScanError>,
}

impl ScanResult {
    /// Fresh pending result for `project_path`.
    pub fn new(project_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: ScanStatus::Pending,
            progress: 0.0,
            project_path,
            start_time: None,
            end_time: None,
            duration_secs: 0.0,
            dependencies: Vec::new(),
            total_deps: 0,
            direct_deps: 0,
            indirect_deps: 0,
            build_systems: Vec::new(),
            analysis: None,
            errors: Vec::new(),
        }
    }

    /// Append one record, maintaining the counters and the
    /// build-system list.
    pub fn add_dependency(&mut self, dep: Dependency) {
        self.total_deps += 1;
        if dep.dependencies.is_empty() {
            self.direct_deps += 1;
        } else {
            self.indirect_deps += 1;
        }
        if !dep.build_system.is_empty() && !self.build_systems.contains(&dep.build_system) {
            self.build_systems.push(dep.build_system.clone());
        }
        self.dependencies.push(dep);
    }

    /// Record a per-file failure.
    pub fn add_error(&mut self, file: PathBuf, message: String) {
        self.errors.push(ScanError { file, message });
    }
}
