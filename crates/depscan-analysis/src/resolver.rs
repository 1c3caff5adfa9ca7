//! Version resolution: pick one concrete version per package from a
//! candidate set, under the constraints the manifests declared.

use depscan_core::{Dependency, DependencyGraph, Error};
use semver::{Version, VersionReq};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Which candidate to pick among those satisfying every constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionStrategy {
    /// The newest satisfying version.
    #[default]
    Newest,
    /// The oldest satisfying version.
    Oldest,
    /// The minimal satisfying version.
    Minimal,
}

/// Resolution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Candidate selection strategy.
    pub strategy: ResolutionStrategy,
    /// Strict mode: cycles fail resolution and per-package failures
    /// are errors instead of `unresolved` entries.
    pub strict: bool,
}

/// Source of candidate versions for a package.
///
/// The core ships a fixed deterministic provider; collaborators that
/// talk to registries plug their own in.
pub trait VersionProvider: Send + Sync {
    /// Available versions for `name`, in any order.
    fn available_versions(&self, name: &str) -> Vec<Version>;
}

/// Deterministic candidate set for offline resolution.
#[derive(Debug, Clone)]
pub struct FixedVersionProvider {
    versions: Vec<Version>,
    overrides: HashMap<String, Vec<Version>>,
}

impl FixedVersionProvider {
    /// Parse the given version strings as the candidate set for every
    /// package.
    pub fn new(versions: &[&str]) -> Self {
        Self {
            versions: versions
                .iter()
                .filter_map(|v| Version::parse(v).ok())
                .collect(),
            overrides: HashMap::new(),
        }
    }

    /// Candidate set for one specific package.
    pub fn with_package(mut self, name: impl Into<String>, versions: &[&str]) -> Self {
        self.overrides.insert(
            name.into(),
            versions
                .iter()
                .filter_map(|v| Version::parse(v).ok())
                .collect(),
        );
        self
    }
}

impl Default for FixedVersionProvider {
    fn default() -> Self {
        Self::new(&["1.0.0", "1.1.0", "1.2.0", "2.0.0", "2.1.0", "2.2.0"])
    }
}

impl VersionProvider for FixedVersionProvider {
    fn available_versions(&self, name: &str) -> Vec<Version> {
        self.overrides
            .get(name)
            .unwrap_or(&self.versions)
            .clone()
    }
}

/// Outcome of a resolution pass.
#[derive(Debug, Default)]
pub struct ResolveResult {
    /// Records with their version replaced by the selected one, in
    /// topological (children-first) order.
    pub resolved: Vec<Dependency>,
    /// Package names that could not be resolved (non-strict mode).
    pub unresolved: Vec<String>,
    /// Per-package failures (strict mode).
    pub errors: Vec<Error>,
}

/// Topological-order version selection over a record list.
pub struct Resolver {
    options: ResolveOptions,
    provider: Box<dyn VersionProvider>,
}

impl Resolver {
    /// Resolver with the deterministic default candidate provider.
    pub fn new(options: ResolveOptions) -> Self {
        Self::with_provider(options, Box::new(FixedVersionProvider::default()))
    }

    /// Resolver with a custom candidate provider.
    pub fn with_provider(options: ResolveOptions, provider: Box<dyn VersionProvider>) -> Self {
        Self { options, provider }
    }

    /// Resolve every package in `deps`.
    ///
    /// # Errors
    ///
    /// Strict mode fails outright on dependency cycles; every other
    /// failure is collected per package.
    pub fn resolve(&self, deps: &[Dependency]) -> Result<ResolveResult, Error> {
        let graph: DependencyGraph = deps.iter().collect();

        let cycles = graph.find_cycles();
        if !cycles.is_empty() && self.options.strict {
            return Err(Error::Cycle { cycles });
        }

        let order = self.topological_sort(&graph)?;

        // First record wins when the same name appears several times;
        // children fall back to their nested record.
        let mut records: HashMap<&str, &Dependency> = HashMap::new();
        for dep in deps {
            for child in &dep.dependencies {
                records.entry(child.name.as_str()).or_insert(child);
            }
        }
        for dep in deps {
            records.insert(dep.name.as_str(), dep);
        }

        let mut result = ResolveResult::default();
        for name in order {
            let Some(&record) = records.get(name.as_str()) else {
                continue;
            };
            match self.resolve_one(record) {
                Ok(resolved) => result.resolved.push(resolved),
                Err(e) => {
                    if self.options.strict {
                        result.errors.push(e);
                    } else {
                        warn!(package = %name, error = %e, "failed to resolve dependency");
                        result.unresolved.push(name);
                    }
                }
            }
        }
        Ok(result)
    }

    fn resolve_one(&self, record: &Dependency) -> Result<Dependency, Error> {
        let constraints = self.parse_constraints(record)?;
        let mut candidates = self.provider.available_versions(&record.name);
        candidates.sort();

        let compatible: Vec<&Version> = candidates
            .iter()
            .filter(|v| constraints.iter().all(|req| req.matches(v)))
            .collect();

        let picked: Option<&Version> = match self.options.strategy {
            ResolutionStrategy::Newest => compatible.last().copied(),
            ResolutionStrategy::Oldest => compatible.first().copied(),
            ResolutionStrategy::Minimal => compatible.iter().min_by(|a, b| a.cmp(b)).copied(),
        };
        let picked = picked.ok_or_else(|| {
            Error::parse(
                record.file_path.clone().unwrap_or_default(),
                format!("no compatible versions found for {}", record.name),
            )
        })?;

        let mut resolved = (*record).clone();
        resolved.version = Some(picked.to_string());
        Ok(resolved)
    }

    /// Comma-separated fragments of the version field, each parsed as
    /// a semver requirement and conjoined.
    fn parse_constraints(&self, record: &Dependency) -> Result<Vec<VersionReq>, Error> {
        let Some(version) = &record.version else {
            return Ok(Vec::new());
        };
        let mut constraints = Vec::new();
        for fragment in version.split(',') {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                continue;
            }
            let req = VersionReq::parse(fragment).map_err(|e| {
                Error::parse(
                    record.file_path.clone().unwrap_or_default(),
                    format!("invalid version constraint `{fragment}` for {}: {e}", record.name),
                )
            })?;
            constraints.push(req);
        }
        Ok(constraints)
    }

    /// Reverse-postorder DFS with grey marking: children come before
    /// their parents; a grey revisit under strict mode aborts.
    fn topological_sort(&self, graph: &DependencyGraph) -> Result<Vec<String>, Error> {
        let mut sorted: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut grey: HashSet<String> = HashSet::new();

        for node in graph.nodes() {
            if !visited.contains(&node.name) {
                self.visit(&node.name, graph, &mut visited, &mut grey, &mut sorted)?;
            }
        }
        Ok(sorted)
    }

    fn visit(
        &self,
        name: &str,
        graph: &DependencyGraph,
        visited: &mut HashSet<String>,
        grey: &mut HashSet<String>,
        sorted: &mut Vec<String>,
    ) -> Result<(), Error> {
        if grey.contains(name) {
            if self.options.strict {
                return Err(Error::Cycle {
                    cycles: vec![vec![name.to_string()]],
                });
            }
            return Ok(());
        }
        if visited.contains(name) {
            return Ok(());
        }
        grey.insert(name.to_string());

        for child in graph.edges(name).to_vec() {
            self.visit(&child, graph, visited, grey, sorted)?;
        }

        grey.remove(name);
        visited.insert(name.to_string());
        sorted.push(name.to_string());
        Ok(())
    }
}
