//
//  types.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

// ─── Build Options ──────────────────────────────────────────

/// Knobs for a single graph build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    pub include_dev_dependencies: bool,
    pub include_build_dependencies: bool,
    /// Scan sources for imports and merge them into the declared edges.
    pub detect_imports: bool,
    /// Directory levels below a package directory that the import scanner enters.
    pub max_source_depth: usize,
    pub source_extensions: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            include_dev_dependencies: false,
            include_build_dependencies: true,
            detect_imports: true,
            max_source_depth: 3,
            source_extensions: vec!["rs".to_string()],
        }
    }
}

// ─── Imports ────────────────────────────────────────────────

/// Which line pattern produced an import record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Use,
    ExternCrate,
    Mod,
}

/// An import-like statement found in a package's sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub source_package: String,
    pub imported_module: String,
    pub kind: ImportKind,
    pub source_file: PathBuf,
    /// 1-based.
    pub line_number: usize,
    pub raw_statement: String,
}

// ─── Edges ──────────────────────────────────────────────────

/// Evidence behind an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    /// Declared in the manifest only.
    Declared,
    /// Seen in source imports only.
    Inferred,
    /// Declared and confirmed by imports.
    Both,
}

/// Manifest section a declared dependency came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Normal,
    Build,
    Dev,
}

/// Manifest details carried by declared edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    pub kind: DependencyKind,
    pub version_spec: Option<String>,
    pub local_path: bool,
    pub workspace: bool,
}

/// A directed `from → to` dependency at package granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub source: EdgeSource,
    /// Target is not a workspace package and not marked local.
    pub is_external: bool,
    pub metadata: Option<EdgeMetadata>,
    /// Imports supporting this edge, in scan order.
    pub imports: Vec<ImportRecord>,
}

impl DependencyEdge {
    pub fn declared(from: impl Into<String>, to: impl Into<String>, metadata: EdgeMetadata) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            source: EdgeSource::Declared,
            is_external: false,
            metadata: Some(metadata),
            imports: Vec::new(),
        }
    }

    pub fn inferred(import: ImportRecord, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            source: EdgeSource::Inferred,
            is_external: false,
            metadata: None,
            imports: vec![import],
        }
    }
}

// ─── Nodes & Graph ──────────────────────────────────────────

/// A workspace package in the built graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub name: String,
    pub directory: PathBuf,
    pub manifest_path: PathBuf,
    /// Workspace packages this one depends on.
    pub dependencies: Vec<String>,
    /// Workspace packages depending on this one.
    pub dependents: Vec<String>,
    pub dependency_count: usize,
    pub dependent_count: usize,
    /// Longest dependency chain below this node. Not meaningful inside a cycle.
    pub depth: usize,
}

/// Aggregate numbers over a built graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub external_dependency_count: usize,
    pub cycle_count: usize,
    pub max_depth: usize,
    pub avg_edges_per_node: f64,
    /// Nodes with no workspace dependencies.
    pub leaf_count: usize,
    /// Nodes nothing in the workspace depends on.
    pub root_count: usize,
}

/// The full result of one build. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<String, DependencyNode>,
    pub edges: Vec<DependencyEdge>,
    pub imports: Vec<ImportRecord>,
    /// Each cycle lists its members with the first repeated at the end.
    pub cycles: Vec<Vec<String>>,
    /// Dependencies first. Only trustworthy when `cycles` is empty.
    pub deployment_order: Vec<String>,
    /// Groups that can be deployed in parallel, in order.
    pub deployment_levels: Vec<Vec<String>>,
    pub external_dependencies: BTreeSet<String>,
    /// Workspace package names in input order.
    pub workspace_packages: Vec<String>,
    pub stats: GraphStats,
    pub built_at: DateTime<Utc>,
}

impl DependencyGraph {
    /// An empty graph, as built from zero packages.
    pub fn empty() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            imports: Vec::new(),
            cycles: Vec::new(),
            deployment_order: Vec::new(),
            deployment_levels: Vec::new(),
            external_dependencies: BTreeSet::new(),
            workspace_packages: Vec::new(),
            stats: GraphStats::default(),
            built_at: Utc::now(),
        }
    }

    /// True when the deployment order can be relied on.
    pub fn is_deployable(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn node(&self, name: &str) -> Option<&DependencyNode> {
        self.nodes.get(name)
    }
}
