//
//  query.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use std::collections::{BTreeSet, HashSet, VecDeque};

use super::types::*;

/// True when at least one cycle was found.
pub fn has_cycles(graph: &DependencyGraph) -> bool {
    !graph.cycles.is_empty()
}

/// Human-readable cycle list, e.g. `Cycle 1: a → b → a`.
pub fn cycle_descriptions(graph: &DependencyGraph) -> Vec<String> {
    graph
        .cycles
        .iter()
        .enumerate()
        .map(|(i, cycle)| format!("Cycle {}: {}", i + 1, cycle.join(" → ")))
        .collect()
}

/// Workspace packages `name` depends on directly. Empty for unknown names.
pub fn direct_dependencies(graph: &DependencyGraph, name: &str) -> Vec<String> {
    graph
        .nodes
        .get(name)
        .map(|n| n.dependencies.clone())
        .unwrap_or_default()
}

/// Workspace packages depending on `name` directly. Empty for unknown names.
pub fn direct_dependents(graph: &DependencyGraph, name: &str) -> Vec<String> {
    graph
        .nodes
        .get(name)
        .map(|n| n.dependents.clone())
        .unwrap_or_default()
}

/// Everything `name` depends on, directly or not, sorted.
pub fn transitive_dependencies(graph: &DependencyGraph, name: &str) -> Vec<String> {
    walk(graph, name, |node| &node.dependencies)
}

/// Everything that depends on `name`, directly or not, sorted.
pub fn transitive_dependents(graph: &DependencyGraph, name: &str) -> Vec<String> {
    walk(graph, name, |node| &node.dependents)
}

/// The slice of the deployment order needed to ship `targets`: the targets
/// plus all their transitive dependencies, dependencies first.
///
/// Unknown targets are ignored.
pub fn deployment_order_for(graph: &DependencyGraph, targets: &[&str]) -> Vec<String> {
    let mut needed: HashSet<String> = HashSet::new();
    for target in targets {
        if !graph.nodes.contains_key(*target) {
            continue;
        }
        needed.insert(target.to_string());
        needed.extend(transitive_dependencies(graph, target));
    }

    graph
        .deployment_order
        .iter()
        .filter(|name| needed.contains(*name))
        .cloned()
        .collect()
}

/// BFS over node adjacency. The start node is never part of the result,
/// even when it sits on a cycle.
fn walk<F>(graph: &DependencyGraph, start: &str, next: F) -> Vec<String>
where
    F: Fn(&DependencyNode) -> &Vec<String>,
{
    let Some(start_node) = graph.nodes.get(start) else {
        return Vec::new();
    };

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&DependencyNode> = VecDeque::from([start_node]);

    while let Some(node) = queue.pop_front() {
        for neighbor in next(node) {
            if neighbor == start || !seen.insert(neighbor.clone()) {
                continue;
            }
            if let Some(n) = graph.nodes.get(neighbor) {
                queue.push_back(n);
            }
        }
    }

    seen.into_iter().collect()
}
