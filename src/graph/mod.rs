//! Dependency graph module, the core of DeployGraph.
//!
//! Declared edges are resolved first, import evidence is merged in, and the
//! merged workspace subgraph is ordered and assembled into an immutable
//! [`DependencyGraph`].

pub mod builder;
pub mod cache;
pub mod merge;
pub mod query;
pub mod resolver;
pub mod types;

pub use builder::{assemble, build_from_reader, build_graph, Assembly};
pub use cache::GraphCache;
pub use merge::merge_imports;
pub use query::{
    cycle_descriptions, deployment_order_for, direct_dependencies, direct_dependents, has_cycles,
    transitive_dependencies, transitive_dependents,
};
pub use resolver::{analyze, resolve_edges, Analysis, PackageIndex, Resolution};
pub use types::{
    BuildOptions, DependencyEdge, DependencyGraph, DependencyKind, DependencyNode, EdgeMetadata,
    EdgeSource, GraphStats, ImportKind, ImportRecord,
};
