//
//  resolver.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use super::types::*;
use crate::workspace::{normalize_name, DependencyRecord, Package};

// ─── Package Index ──────────────────────────────────────────

/// Name lookup over the workspace packages: exact manifest name first,
/// then the folded form from [`normalize_name`].
#[derive(Debug, Clone)]
pub struct PackageIndex {
    names: Vec<String>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl PackageIndex {
    pub fn new(packages: &[Package]) -> Self {
        let mut names = Vec::with_capacity(packages.len());
        let mut exact = HashMap::new();
        let mut folded = HashMap::new();

        for package in packages {
            if exact.contains_key(&package.name) {
                warn!(package = %package.name, "duplicate package name, keeping the first");
                continue;
            }
            let idx = names.len();
            names.push(package.name.clone());
            exact.insert(package.name.clone(), idx);

            let key = normalize_name(&package.name);
            if let Some(&existing) = folded.get(&key) {
                warn!(
                    package = %package.name,
                    aliases = %names[existing],
                    "package names collide when case/hyphens are ignored; matching resolves to the first"
                );
            } else {
                folded.insert(key, idx);
            }
        }

        Self {
            names,
            exact,
            folded,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&normalize_name(name)))
            .copied()
    }

    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        self.resolve(name).map(|idx| self.names[idx].as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Workspace names in input order, duplicates removed.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

// ─── Resolution ─────────────────────────────────────────────

/// Cycles and ordering over the workspace-local subgraph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub cycles: Vec<Vec<String>>,
    pub order: Vec<String>,
    pub levels: Vec<Vec<String>>,
}

/// Declared edges plus the analysis computed over them.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub edges: Vec<DependencyEdge>,
    pub cycles: Vec<Vec<String>>,
    pub order: Vec<String>,
    pub levels: Vec<Vec<String>>,
}

/// Turn declared dependencies into edges and analyse the workspace subgraph.
///
/// Never fails: cycles are returned as data, and `order`/`levels` are
/// best-effort when any are present.
pub fn resolve_edges(packages: &[Package], options: &BuildOptions) -> Resolution {
    let index = PackageIndex::new(packages);
    let mut edges = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for package in packages {
        for (kind, deps) in declared_sections(package, options) {
            for dep in deps {
                let resolved = index.resolve_name(&dep.name);
                let to = resolved.unwrap_or(&dep.name).to_string();
                let is_external = resolved.is_none() && !dep.is_local();

                if !seen.insert((package.name.clone(), to.clone())) {
                    continue;
                }

                let mut edge = DependencyEdge::declared(&package.name, to, metadata_for(kind, dep));
                edge.is_external = is_external;
                edges.push(edge);
            }
        }
    }

    let analysis = analyze(index.names(), &edges);
    debug!(
        packages = index.names().len(),
        edges = edges.len(),
        cycles = analysis.cycles.len(),
        "resolved declared edges"
    );

    Resolution {
        edges,
        cycles: analysis.cycles,
        order: analysis.order,
        levels: analysis.levels,
    }
}

/// Dependency sections included by the build policy, normal first.
pub(crate) fn declared_sections<'a>(
    package: &'a Package,
    options: &BuildOptions,
) -> Vec<(DependencyKind, &'a [DependencyRecord])> {
    let mut sections = vec![(DependencyKind::Normal, package.dependencies.as_slice())];
    if options.include_build_dependencies {
        sections.push((DependencyKind::Build, package.build_dependencies.as_slice()));
    }
    if options.include_dev_dependencies {
        sections.push((DependencyKind::Dev, package.dev_dependencies.as_slice()));
    }
    sections
}

fn metadata_for(kind: DependencyKind, dep: &DependencyRecord) -> EdgeMetadata {
    EdgeMetadata {
        kind,
        version_spec: dep.version_spec.clone(),
        local_path: dep.local_path,
        workspace: dep.workspace,
    }
}

// ─── Analysis ───────────────────────────────────────────────

/// Compute cycles, deployment order and levels for `names` using every edge
/// whose endpoints are both in `names`. Other edges are ignored.
pub fn analyze(names: &[String], edges: &[DependencyEdge]) -> Analysis {
    let successors = workspace_successors(names, edges);

    Analysis {
        cycles: find_cycles(&successors, names),
        order: topological_order(&successors, names),
        levels: parallel_levels(&successors, names),
    }
}

/// Successor lists (dependencies) per input index, sorted by input index.
fn workspace_successors(names: &[String], edges: &[DependencyEdge]) -> Vec<Vec<usize>> {
    let lookup: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(names.len(), edges.len());
    let nodes: Vec<NodeIndex> = (0..names.len()).map(|i| graph.add_node(i)).collect();

    for edge in edges {
        if let (Some(&from), Some(&to)) = (lookup.get(edge.from.as_str()), lookup.get(edge.to.as_str())) {
            if !graph.contains_edge(nodes[from], nodes[to]) {
                graph.add_edge(nodes[from], nodes[to], ());
            }
        }
    }

    nodes
        .iter()
        .map(|&node| {
            let mut succ: Vec<usize> = graph.neighbors(node).map(|n| graph[n]).collect();
            succ.sort_unstable();
            succ
        })
        .collect()
}

fn predecessors(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut preds = vec![Vec::new(); successors.len()];
    for (node, succ) in successors.iter().enumerate() {
        for &s in succ {
            preds[s].push(node);
        }
    }
    preds
}

/// DFS with an explicit stack. Every back edge to a node still on the stack
/// yields the stack slice from that node, closed by repeating it.
fn find_cycles(successors: &[Vec<usize>], names: &[String]) -> Vec<Vec<String>> {
    let n = successors.len();
    let mut visited = vec![false; n];
    let mut on_stack = vec![false; n];
    let mut cycles = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        // (node, next successor position)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        visited[start] = true;
        on_stack[start] = true;

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            match successors[node].get(frame.1) {
                Some(&succ) => {
                    frame.1 += 1;
                    if on_stack[succ] {
                        let pos = stack.iter().position(|&(m, _)| m == succ).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[pos..].iter().map(|&(m, _)| names[m].clone()).collect();
                        cycle.push(names[succ].clone());
                        cycles.push(cycle);
                    } else if !visited[succ] {
                        visited[succ] = true;
                        on_stack[succ] = true;
                        stack.push((succ, 0));
                    }
                }
                None => {
                    on_stack[node] = false;
                    stack.pop();
                }
            }
        }
    }

    cycles
}

/// Dependencies first. Among ready packages the lowest input index goes
/// next; packages stuck behind a cycle are appended in input order.
fn topological_order(successors: &[Vec<usize>], names: &[String]) -> Vec<String> {
    let n = successors.len();
    let dependents = predecessors(successors);
    let mut remaining: Vec<usize> = successors.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while let Some(node) = ready.pop_first() {
        placed[node] = true;
        order.push(names[node].clone());
        for &dependent in &dependents[node] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    order.extend((0..n).filter(|&i| !placed[i]).map(|i| names[i].clone()));
    order
}

/// Longest-path layering: a package lands one layer above its deepest
/// dependency. Unplaceable packages form a final layer.
fn parallel_levels(successors: &[Vec<usize>], names: &[String]) -> Vec<Vec<String>> {
    let n = successors.len();
    let dependents = predecessors(successors);
    let mut remaining: Vec<usize> = successors.iter().map(Vec::len).collect();
    let mut placed = vec![false; n];
    let mut levels = Vec::new();

    let mut current: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &node in &current {
            placed[node] = true;
            for &dependent in &dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        levels.push(current.iter().map(|&i| names[i].clone()).collect());
        next.sort_unstable();
        current = next;
    }

    let stuck: Vec<String> = (0..n).filter(|&i| !placed[i]).map(|i| names[i].clone()).collect();
    if !stuck.is_empty() {
        levels.push(stuck);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, deps: &[&str]) -> Package {
        deps.iter().fold(Package::new(name, format!("/ws/{name}")), |p, d| {
            p.with_dependency(DependencyRecord::new(*d).with_path())
        })
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_relations() {
        let packages = vec![pkg("a", &[]), pkg("b", &[]), pkg("c", &[])];
        let res = resolve_edges(&packages, &BuildOptions::default());
        assert!(res.edges.is_empty());
        assert!(res.cycles.is_empty());
        assert_eq!(res.order, names(&["a", "b", "c"]));
        assert_eq!(res.levels, vec![names(&["a", "b", "c"])]);
    }

    #[test]
    fn test_acyclic_chain() {
        let packages = vec![pkg("a", &["b"]), pkg("b", &["c"]), pkg("c", &[])];
        let res = resolve_edges(&packages, &BuildOptions::default());
        assert!(res.cycles.is_empty());
        assert_eq!(res.order, names(&["c", "b", "a"]));
        assert_eq!(res.levels, vec![names(&["c"]), names(&["b"]), names(&["a"])]);
        assert_eq!(res.edges.len(), 2);
        assert!(res.edges.iter().all(|e| e.source == EdgeSource::Declared));
    }

    #[test]
    fn test_three_node_cycle() {
        let packages = vec![pkg("a", &["b"]), pkg("b", &["c"]), pkg("c", &["a"])];
        let res = resolve_edges(&packages, &BuildOptions::default());
        assert_eq!(res.cycles, vec![names(&["a", "b", "c", "a"])]);
        // Best-effort order is still a permutation.
        let mut order = res.order.clone();
        order.sort();
        assert_eq!(order, names(&["a", "b", "c"]));
        assert_eq!(res.levels, vec![names(&["a", "b", "c"])]);
    }

    #[test]
    fn test_disjoint_cycles_all_reported() {
        let packages = vec![
            pkg("a", &["b"]),
            pkg("b", &["a"]),
            pkg("c", &["d"]),
            pkg("d", &["c"]),
            pkg("e", &[]),
        ];
        let res = resolve_edges(&packages, &BuildOptions::default());
        assert_eq!(
            res.cycles,
            vec![names(&["a", "b", "a"]), names(&["c", "d", "c"])]
        );
        assert_eq!(res.order[0], "e");
        assert_eq!(res.levels[0], names(&["e"]));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let packages = vec![pkg("a", &["a"])];
        let res = resolve_edges(&packages, &BuildOptions::default());
        assert_eq!(res.cycles, vec![names(&["a", "a"])]);
    }

    #[test]
    fn test_diamond_levels() {
        let packages = vec![
            pkg("app", &["api", "worker"]),
            pkg("api", &["core"]),
            pkg("worker", &["core", "api"]),
            pkg("core", &[]),
        ];
        let res = resolve_edges(&packages, &BuildOptions::default());
        assert_eq!(res.order, names(&["core", "api", "worker", "app"]));
        assert_eq!(
            res.levels,
            vec![
                names(&["core"]),
                names(&["api"]),
                names(&["worker"]),
                names(&["app"])
            ]
        );
    }

    #[test]
    fn test_independent_packages_keep_input_order() {
        let packages = vec![pkg("z", &["m"]), pkg("m", &[]), pkg("b", &[]), pkg("a", &["b"])];
        let first = resolve_edges(&packages, &BuildOptions::default());
        let second = resolve_edges(&packages, &BuildOptions::default());
        assert_eq!(first.order, names(&["m", "z", "b", "a"]));
        assert_eq!(first.levels, vec![names(&["m", "b"]), names(&["z", "a"])]);
        assert_eq!(first.order, second.order);
        assert_eq!(first.levels, second.levels);
    }

    #[test]
    fn test_external_classification() {
        let packages = vec![Package::new("a", "/ws/a")
            .with_dependency(DependencyRecord::new("serde").with_version("1.0"))
            .with_dependency(DependencyRecord::new("outside").with_path())
            .with_dependency(DependencyRecord::new("b"))
            .with_dependency(DependencyRecord::new("serde").with_version("1.0")),
            Package::new("b", "/ws/b")];
        let res = resolve_edges(&packages, &BuildOptions::default());

        assert_eq!(res.edges.len(), 3);
        let serde = res.edges.iter().find(|e| e.to == "serde").unwrap();
        assert!(serde.is_external);
        let outside = res.edges.iter().find(|e| e.to == "outside").unwrap();
        assert!(!outside.is_external);
        let b = res.edges.iter().find(|e| e.to == "b").unwrap();
        assert!(!b.is_external);
        assert_eq!(res.order, names(&["b", "a"]));
    }

    #[test]
    fn test_dev_and_build_policy() {
        let packages = vec![
            Package::new("a", "/ws/a")
                .with_build_dependency(DependencyRecord::new("gen"))
                .with_dev_dependency(DependencyRecord::new("fixtures")),
            Package::new("gen", "/ws/gen"),
            Package::new("fixtures", "/ws/fixtures"),
        ];

        let default = resolve_edges(&packages, &BuildOptions::default());
        assert_eq!(default.edges.len(), 1);
        assert_eq!(default.edges[0].to, "gen");
        assert_eq!(
            default.edges[0].metadata.as_ref().map(|m| m.kind),
            Some(DependencyKind::Build)
        );

        let all = resolve_edges(
            &packages,
            &BuildOptions {
                include_dev_dependencies: true,
                include_build_dependencies: false,
                ..BuildOptions::default()
            },
        );
        assert_eq!(all.edges.len(), 1);
        assert_eq!(all.edges[0].to, "fixtures");
    }

    #[test]
    fn test_folded_name_resolution() {
        let packages = vec![
            Package::new("api", "/ws/api").with_dependency(DependencyRecord::new("Core_Lib")),
            Package::new("core-lib", "/ws/core-lib"),
        ];
        let res = resolve_edges(&packages, &BuildOptions::default());
        assert_eq!(res.edges[0].to, "core-lib");
        assert!(!res.edges[0].is_external);
    }

    #[test]
    fn test_package_index_first_wins_on_collision() {
        let packages = vec![Package::new("Core", "/ws/a"), Package::new("core", "/ws/b")];
        let index = PackageIndex::new(&packages);
        assert_eq!(index.resolve_name("core"), Some("core"));
        assert_eq!(index.resolve_name("CORE"), Some("Core"));
        assert_eq!(index.names().len(), 2);
    }
}
