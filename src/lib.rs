//! # DeployGraph
//!
//! Workspace dependency graph for deployment ordering.
//!
//! DeployGraph reads the packages of a workspace, resolves their declared
//! dependencies, infers more edges from `use`/`extern crate`/`mod` lines,
//! and produces an immutable [`DependencyGraph`] with cycles, a deployment
//! order, parallel deployment levels, depths and summary stats.
//!
//! ## Key Features
//!
//! - **Deterministic**: Same packages and sources always give the same graph
//! - **Cycles are data**: A cyclic workspace still builds; the graph says so
//! - **Live**: [`ChangeCoordinator`] rebuilds on file changes, debounced
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deploy_graph::{build_from_reader, BuildOptions, CargoManifestReader, OsFs};
//!
//! let reader = CargoManifestReader::new(".");
//! let graph = build_from_reader(&reader, &OsFs, &BuildOptions::default()).unwrap();
//!
//! for (i, level) in graph.deployment_levels.iter().enumerate() {
//!     println!("level {}: {}", i, level.join(", "));
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod parser;
pub mod watch;
pub mod workspace;

// Re-exports for convenience
pub use config::DeployGraphConfig;
pub use error::{GraphError, Result};
pub use graph::{
    build_from_reader, build_graph, cycle_descriptions, deployment_order_for,
    direct_dependencies, direct_dependents, has_cycles, transitive_dependencies,
    transitive_dependents, BuildOptions, DependencyEdge, DependencyGraph, DependencyNode,
    EdgeSource, GraphStats, ImportRecord,
};
pub use watch::{ChangeCoordinator, ChangeKind, CoordinatorOptions, GraphChangeEvent, Subscription};
pub use workspace::{
    CargoManifestReader, DependencyRecord, ManifestReader, MemoryFs, OsFs, Package, SourceFs,
    StaticManifestReader,
};
