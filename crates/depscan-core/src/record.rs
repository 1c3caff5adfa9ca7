//! The uniform dependency record.
//!
//! Every extractor emits [`Dependency`] values and nothing else. The
//! record is immutable once an extractor has returned it: downstream
//! components (graph, analyzer, resolver) only read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Dependency scope beyond plain production use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Development-only dependency.
    Dev,
    /// Test-only dependency.
    Test,
    /// Peer dependency (npm-style).
    Peer,
    /// Optional dependency.
    Optional,
}

impl Scope {
    /// Stable lowercase name, as used in statistics keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Dev => "dev",
            Scope::Test => "test",
            Scope::Peer => "peer",
            Scope::Optional => "optional",
        }
    }
}

/// Version predicate operator permitted in manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOp {
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `=`
    #[serde(rename = "=")]
    Eq,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `==` (Python-style exact pin)
    #[serde(rename = "==")]
    EqEq,
    /// `~>` (pessimistic / compatible-with)
    #[serde(rename = "~>")]
    Compatible,
}

impl ConstraintOp {
    /// The operator exactly as written in a manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintOp::Ge => ">=",
            ConstraintOp::Le => "<=",
            ConstraintOp::Eq => "=",
            ConstraintOp::Gt => ">",
            ConstraintOp::Lt => "<",
            ConstraintOp::EqEq => "==",
            ConstraintOp::Compatible => "~>",
        }
    }

    /// Parse an operator token. Longer operators are matched first so
    /// `>=` never parses as `>`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            ">=" => Some(ConstraintOp::Ge),
            "<=" => Some(ConstraintOp::Le),
            "==" => Some(ConstraintOp::EqEq),
            "~>" => Some(ConstraintOp::Compatible),
            "=" => Some(ConstraintOp::Eq),
            ">" => Some(ConstraintOp::Gt),
            "<" => Some(ConstraintOp::Lt),
            _ => None,
        }
    }
}

/// A `(operator, version)` predicate explicit in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// The operator.
    pub op: ConstraintOp,
    /// The version the operator applies to, verbatim.
    pub version: String,
}

impl Constraint {
    /// Build a constraint.
    pub fn new(op: ConstraintOp, version: impl Into<String>) -> Self {
        Self {
            op,
            version: version.into(),
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.op.as_str(), self.version)
    }
}

/// The uniform output of every extractor.
///
/// `version` is preserved verbatim from the manifest unless a lockfile
/// pins it; children in `dependencies` come only from lockfiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package or artifact identifier in the source's native naming.
    pub name: String,

    /// Exact version, range, tag, branch/commit reference, or URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Per-ecosystem category (`library`, `package`, `ninja_input`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Scope, when not plain production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    /// Origin: `git`, `github`, `pypi`, a path prefix, or a binary URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Repository URL for VCS-sourced entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Branch reference for VCS-sourced entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Commit hash for VCS-sourced entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// Manifest the record was discovered in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// 1-indexed line within `file_path`, where known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Build-system target or component owning this edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Ecosystem tag of the producing extractor.
    pub build_system: String,

    /// Version predicates explicit in the manifest, in file order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,

    /// Transitive children pinned by a lockfile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Names this entry conflicts with or excludes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,

    /// Whether the manifest marks this entry optional.
    #[serde(default)]
    pub optional: bool,

    /// Whether the entry is required for a build.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Ecosystem-specific extras (features, platforms, checksums, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_required() -> bool {
    true
}

impl Dependency {
    /// Create a record with the given name and ecosystem tag.
    ///
    /// New records are required, non-optional, and carry no version.
    pub fn new(name: impl Into<String>, build_system: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            kind: String::new(),
            scope: None,
            source: None,
            repository: None,
            branch: None,
            commit: None,
            file_path: None,
            line: None,
            parent: None,
            build_system: build_system.into(),
            constraints: Vec::new(),
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            optional: false,
            required: true,
            metadata: HashMap::new(),
        }
    }

    /// True when a lockfile supplied pinned children for this record.
    pub fn has_children(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Attach a metadata value under `key`.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.into(), value.into());
    }
}
