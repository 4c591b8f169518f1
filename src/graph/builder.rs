//
//  builder.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info};

use super::merge::merge_imports;
use super::resolver::{analyze, declared_sections, resolve_edges, Analysis, PackageIndex};
use super::types::*;
use crate::error::Result;
use crate::parser::scan_workspace;
use crate::workspace::{ManifestReader, Package, SourceFs};

/// Nodes, external names and statistics for a set of merged edges.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub nodes: BTreeMap<String, DependencyNode>,
    pub external: BTreeSet<String>,
    pub stats: GraphStats,
}

/// Build a dependency graph from a package snapshot.
///
/// Resolves declared edges, optionally scans sources for imports and merges
/// them, orders the merged workspace subgraph, then assembles nodes and
/// statistics. Never fails; unreadable sources are skipped by the scanner.
pub fn build_graph(packages: &[Package], fs: &dyn SourceFs, options: &BuildOptions) -> DependencyGraph {
    let started = Instant::now();

    let resolution = resolve_edges(packages, options);
    let imports = if options.detect_imports {
        scan_workspace(fs, packages, options)
    } else {
        Vec::new()
    };
    let edges = merge_imports(resolution.edges, &imports, packages);

    // Inferred edges take part in ordering too.
    let index = PackageIndex::new(packages);
    let analysis = if edges.iter().any(|e| e.source == EdgeSource::Inferred) {
        analyze(index.names(), &edges)
    } else {
        Analysis {
            cycles: resolution.cycles,
            order: resolution.order,
            levels: resolution.levels,
        }
    };

    let assembly = assemble(packages, &edges, analysis.cycles.len(), options);

    let graph = DependencyGraph {
        nodes: assembly.nodes,
        edges,
        imports,
        cycles: analysis.cycles,
        deployment_order: analysis.order,
        deployment_levels: analysis.levels,
        external_dependencies: assembly.external,
        workspace_packages: index.names().to_vec(),
        stats: assembly.stats,
        built_at: Utc::now(),
    };

    info!(
        nodes = graph.stats.node_count,
        edges = graph.stats.edge_count,
        cycles = graph.stats.cycle_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "built dependency graph"
    );
    graph
}

/// Read the current package snapshot and build a graph from it.
pub fn build_from_reader(
    reader: &dyn ManifestReader,
    fs: &dyn SourceFs,
    options: &BuildOptions,
) -> Result<DependencyGraph> {
    let packages = reader.read_packages()?;
    Ok(build_graph(&packages, fs, options))
}

/// Build nodes, adjacency, depths, external classification and stats.
pub fn assemble(
    packages: &[Package],
    edges: &[DependencyEdge],
    cycle_count: usize,
    options: &BuildOptions,
) -> Assembly {
    let index = PackageIndex::new(packages);
    let names = index.names();
    let lookup: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for edge in edges {
        let (Some(&from), Some(&to)) = (lookup.get(edge.from.as_str()), lookup.get(edge.to.as_str()))
        else {
            continue;
        };
        if !dependencies[from].contains(&to) {
            dependencies[from].push(to);
        }
        if !dependents[to].contains(&from) {
            dependents[to].push(from);
        }
    }

    let depths = compute_depths(&dependencies);

    let mut nodes = BTreeMap::new();
    for package in packages {
        let Some(&idx) = lookup.get(package.name.as_str()) else {
            continue;
        };
        if nodes.contains_key(&package.name) {
            continue;
        }
        let to_names = |list: &[usize]| list.iter().map(|&i| names[i].clone()).collect::<Vec<_>>();
        nodes.insert(
            package.name.clone(),
            DependencyNode {
                name: package.name.clone(),
                directory: package.directory.clone(),
                manifest_path: package.manifest_path.clone(),
                dependencies: to_names(&dependencies[idx]),
                dependents: to_names(&dependents[idx]),
                dependency_count: dependencies[idx].len(),
                dependent_count: dependents[idx].len(),
                depth: depths[idx],
            },
        );
    }

    let external = external_dependencies(packages, &index, options);
    let stats = compute_stats(&nodes, edges.len(), external.len(), cycle_count);
    debug!(nodes = nodes.len(), max_depth = stats.max_depth, "assembled graph nodes");

    Assembly {
        nodes,
        external,
        stats,
    }
}

/// Declared names that are neither workspace packages nor marked local.
pub fn external_dependencies(
    packages: &[Package],
    index: &PackageIndex,
    options: &BuildOptions,
) -> BTreeSet<String> {
    packages
        .iter()
        .flat_map(|p| declared_sections(p, options))
        .flat_map(|(_, deps)| deps.iter())
        .filter(|dep| !index.contains(&dep.name) && !dep.is_local())
        .map(|dep| dep.name.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done(usize),
}

/// `depth = 0` without dependencies, else `1 + max(depth of dependencies)`.
///
/// Iterative post-order walk with an index-keyed memo. A dependency that is
/// still in progress sits on a cycle and counts as depth 0, so the walk
/// always terminates.
fn compute_depths(dependencies: &[Vec<usize>]) -> Vec<usize> {
    let mut marks = vec![Mark::Unvisited; dependencies.len()];

    for start in 0..dependencies.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if let Some(&dep) = dependencies[node].get(frame.1) {
                frame.1 += 1;
                if marks[dep] == Mark::Unvisited {
                    marks[dep] = Mark::InProgress;
                    stack.push((dep, 0));
                }
                continue;
            }

            let depth = dependencies[node]
                .iter()
                .map(|&d| match marks[d] {
                    Mark::Done(depth) => depth + 1,
                    _ => 1,
                })
                .max()
                .unwrap_or(0);
            marks[node] = Mark::Done(depth);
            stack.pop();
        }
    }

    marks
        .into_iter()
        .map(|m| match m {
            Mark::Done(depth) => depth,
            _ => 0,
        })
        .collect()
}

fn compute_stats(
    nodes: &BTreeMap<String, DependencyNode>,
    edge_count: usize,
    external_count: usize,
    cycle_count: usize,
) -> GraphStats {
    let node_count = nodes.len();
    GraphStats {
        node_count,
        edge_count,
        external_dependency_count: external_count,
        cycle_count,
        max_depth: nodes.values().map(|n| n.depth).max().unwrap_or(0),
        avg_edges_per_node: if node_count == 0 {
            0.0
        } else {
            edge_count as f64 / node_count as f64
        },
        leaf_count: nodes.values().filter(|n| n.dependency_count == 0).count(),
        root_count: nodes.values().filter(|n| n.dependent_count == 0).count(),
    }
}
