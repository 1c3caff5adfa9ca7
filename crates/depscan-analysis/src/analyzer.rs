//! Dependency graph diagnostics: cycles, version conflicts, depth,
//! and per-category statistics.

use depscan_core::{Dependency, DependencyGraph};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A detected version conflict for one `(package, required version)`
/// pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionConflict {
    /// The contested package.
    pub package: String,
    /// One of the versions required for it, verbatim.
    pub required: String,
    /// The newest normalized version observed across all requirers.
    pub current: String,
    /// Who required this version, comma-joined.
    pub required_by: String,
    /// A dependency path reaching the package, when one exists.
    pub path: Vec<String>,
}

/// Counts grouped by record category, scope, and source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Record count per `type` tag.
    pub by_type: BTreeMap<String, usize>,
    /// Record count per scope (production records count under "").
    pub by_scope: BTreeMap<String, usize>,
    /// Record count per source (records without one count under "").
    pub by_source: BTreeMap<String, usize>,
}

/// Everything the analyzer computes over one record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Number of top-level records analyzed.
    pub total: usize,
    /// Records without lockfile-pinned children.
    pub direct: usize,
    /// Records carrying pinned children.
    pub indirect: usize,
    /// Every cycle found, as node paths with the revisit appended.
    pub cycles: Vec<Vec<String>>,
    /// Version conflicts, one entry per contested version.
    pub conflicts: Vec<VersionConflict>,
    /// Longest dependency chain, in edges.
    pub max_depth: usize,
    /// Aggregate counts.
    pub stats: AnalysisStats,
}

/// Builds the dependency graph from a record list and derives the
/// diagnostics (§cycles, conflicts, depth, stats).
#[derive(Debug, Default)]
pub struct DependencyAnalyzer {
    graph: DependencyGraph,
}

/// Normalize a manifest version for semver comparison:
/// - strip a leading `v`
/// - `branch=*` and `commit=*` become `0.0.0`
/// - strip a leading `>=`
/// - truncate `A...B` ranges to `A`
/// - pad to three dotted segments (`1.2` → `1.2.0`)
///
/// The function is idempotent; non-semver leftovers simply fail the
/// later parse and drop out of conflict detection.
pub fn normalize_version(version: &str) -> String {
    let mut version = version.trim();
    if let Some(stripped) = version.strip_prefix('v') {
        version = stripped;
    }
    if version.starts_with("branch=") || version.starts_with("commit=") {
        return "0.0.0".to_string();
    }
    if let Some(stripped) = version.strip_prefix(">=") {
        version = stripped.trim();
    }
    let version = match version.split_once("...") {
        Some((lower, _)) => lower,
        None => version,
    };

    let mut parts: Vec<&str> = version.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    parts.join(".")
}

impl DependencyAnalyzer {
    /// Create an analyzer with an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the full analysis over `deps`.
    pub fn analyze(&mut self, deps: &[Dependency]) -> AnalysisResult {
        self.graph = deps.iter().collect();

        let cycles = self.graph.find_cycles();
        let conflicts = self.detect_conflicts(deps);
        let max_depth = self.max_depth();
        let stats = Self::collect_stats(deps);

        // Same ingestion split the scan result keeps: a record without
        // pinned children is direct, one carrying them is indirect.
        let direct = deps.iter().filter(|d| d.dependencies.is_empty()).count();

        AnalysisResult {
            total: deps.len(),
            direct,
            indirect: deps.len() - direct,
            cycles,
            conflicts,
            max_depth,
            stats,
        }
    }

    /// The graph built by the last [`DependencyAnalyzer::analyze`].
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Conflicts exist where one name is required at two versions that
    /// normalize to distinct, parseable semver values.
    fn detect_conflicts(&self, deps: &[Dependency]) -> Vec<VersionConflict> {
        // name → version → requirers, in observation order.
        let mut versions_seen: Vec<(String, Vec<(String, Vec<String>)>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut note = |name: &str, version: &str, required_by: &str| {
            let at = *index.entry(name.to_string()).or_insert_with(|| {
                versions_seen.push((name.to_string(), Vec::new()));
                versions_seen.len() - 1
            });
            let versions = &mut versions_seen[at].1;
            match versions.iter_mut().find(|(v, _)| v == version) {
                Some((_, sources)) => sources.push(required_by.to_string()),
                None => versions.push((version.to_string(), vec![required_by.to_string()])),
            }
        };

        for dep in deps {
            if let Some(version) = &dep.version {
                note(&dep.name, version, "root");
            }
            for child in &dep.dependencies {
                if let Some(version) = &child.version {
                    note(&child.name, version, &dep.name);
                }
            }
        }

        let mut conflicts = Vec::new();
        for (package, versions) in &versions_seen {
            if versions.len() < 2 {
                continue;
            }

            let mut parsed: Vec<Version> = versions
                .iter()
                .filter_map(|(v, _)| Version::parse(&normalize_version(v)).ok())
                .collect();
            if parsed.len() < 2 {
                continue;
            }
            parsed.sort();
            let newest = parsed.last().unwrap();
            if parsed.first().unwrap() == newest {
                continue;
            }

            let path = self.find_path(package);
            for (version, sources) in versions {
                conflicts.push(VersionConflict {
                    package: package.clone(),
                    required: version.clone(),
                    current: newest.to_string(),
                    required_by: sources.join(", "),
                    path: path.clone(),
                });
            }
        }
        conflicts
    }

    /// First dependency path reaching `target`, found by DFS over the
    /// graph's insertion order.
    fn find_path(&self, target: &str) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::new();

        for node in self.graph.nodes() {
            if visited.contains(&node.name) {
                continue;
            }
            let mut path: Vec<String> = Vec::new();
            if self.dfs_path(&node.name, target, &mut visited, &mut path) {
                return path;
            }
        }
        Vec::new()
    }

    fn dfs_path(
        &self,
        node: &str,
        target: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        if node == target {
            path.push(node.to_string());
            return true;
        }
        if !visited.insert(node.to_string()) {
            return false;
        }
        path.push(node.to_string());
        for child in self.graph.edges(node) {
            if self.dfs_path(child, target, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Longest chain (in edges) reachable from any unvisited node.
    fn max_depth(&self) -> usize {
        let mut max_depth = 0;
        let mut visited: HashSet<&str> = HashSet::new();

        for node in self.graph.nodes() {
            if visited.contains(node.name.as_str()) {
                continue;
            }
            // (node, depth) stack; nodes already visited elsewhere
            // still bound the depth of this entry.
            let mut stack: Vec<(&str, usize)> = vec![(node.name.as_str(), 0)];
            while let Some((current, depth)) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                max_depth = max_depth.max(depth);
                for child in self.graph.edges(current) {
                    if !visited.contains(child.as_str()) {
                        stack.push((child.as_str(), depth + 1));
                    }
                }
            }
        }
        max_depth
    }

    fn collect_stats(deps: &[Dependency]) -> AnalysisStats {
        let mut stats = AnalysisStats::default();
        for dep in deps {
            *stats.by_type.entry(dep.kind.clone()).or_default() += 1;
            let scope = dep.scope.map(|s| s.as_str()).unwrap_or("");
            *stats.by_scope.entry(scope.to_string()).or_default() += 1;
            let source = dep.source.clone().unwrap_or_default();
            *stats.by_source.entry(source).or_default() += 1;
        }
        stats
    }

    /// Nested dependency tree keyed by package name; revisited nodes
    /// are marked cyclic instead of recursing forever.
    pub fn dependency_tree(&self) -> serde_json::Value {
        let mut visited: HashSet<String> = HashSet::new();
        let mut tree = serde_json::Map::new();

        for node in self.graph.nodes() {
            if !visited.contains(&node.name) {
                let subtree = self.build_tree(&node.name, &mut visited);
                tree.insert(node.name.clone(), subtree);
            }
        }
        serde_json::Value::Object(tree)
    }

    fn build_tree(&self, name: &str, visited: &mut HashSet<String>) -> serde_json::Value {
        let node = self.graph.node(name);
        if visited.contains(name) {
            return serde_json::json!({
                "name": name,
                "cyclic": true,
                "version": node.and_then(|n| n.versions.first().cloned()),
            });
        }
        visited.insert(name.to_string());

        let mut info = serde_json::Map::new();
        info.insert("name".to_string(), serde_json::json!(name));
        if let Some(node) = node {
            info.insert("versions".to_string(), serde_json::json!(node.versions));
            info.insert("type".to_string(), serde_json::json!(node.kind));
            info.insert("source".to_string(), serde_json::json!(node.source));
        }

        let children = self.graph.edges(name);
        if !children.is_empty() {
            let mut subtree = serde_json::Map::new();
            for child in children.to_vec() {
                subtree.insert(child.clone(), self.build_tree(&child, visited));
            }
            info.insert("dependencies".to_string(), serde_json::Value::Object(subtree));
        }
        serde_json::Value::Object(info)
    }
}
