//! Text and JSON rendering for the one-shot commands.
//!
//! Compact text: one fact per line, names only.

use anyhow::Result;
use serde_json::json;
use std::collections::HashSet;
use std::io::Write;
use tracing::warn;

use crate::graph::{
    cycle_descriptions, deployment_order_for, direct_dependencies, direct_dependents,
    transitive_dependencies, transitive_dependents, DependencyGraph,
};

/// Graph statistics.
pub fn stats(out: &mut impl Write, graph: &DependencyGraph, json: bool) -> Result<()> {
    let stats = &graph.stats;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(stats)?)?;
        return Ok(());
    }

    writeln!(out, "packages  {}", stats.node_count)?;
    writeln!(out, "edges     {}", stats.edge_count)?;
    writeln!(out, "external  {}", stats.external_dependency_count)?;
    writeln!(out, "cycles    {}", stats.cycle_count)?;
    writeln!(out, "depth     {}", stats.max_depth)?;
    writeln!(out, "avg edges {:.2}", stats.avg_edges_per_node)?;
    writeln!(out, "leaves    {}", stats.leaf_count)?;
    writeln!(out, "roots     {}", stats.root_count)?;
    Ok(())
}

/// Deployment order, optionally narrowed to targets or grouped by level.
///
/// Output is the bare list (or list of levels) so JSON stays parseable; the
/// best-effort warning for cyclic graphs goes to the log.
pub fn order(
    out: &mut impl Write,
    graph: &DependencyGraph,
    targets: &[String],
    levels: bool,
    json: bool,
) -> Result<()> {
    if !graph.is_deployable() {
        warn!(cycles = graph.cycles.len(), "graph has cycles, order is best effort");
    }

    let order = if targets.is_empty() {
        graph.deployment_order.clone()
    } else {
        let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
        deployment_order_for(graph, &targets)
    };

    if levels {
        let needed: HashSet<&str> = order.iter().map(String::as_str).collect();
        let levels: Vec<Vec<&str>> = graph
            .deployment_levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(String::as_str)
                    .filter(|name| needed.contains(name))
                    .collect::<Vec<_>>()
            })
            .filter(|level| !level.is_empty())
            .collect();

        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&levels)?)?;
        } else {
            for (i, level) in levels.iter().enumerate() {
                writeln!(out, "{} {}", i, level.join(" "))?;
            }
        }
        return Ok(());
    }

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&order)?)?;
    } else {
        for name in &order {
            writeln!(out, "{}", name)?;
        }
    }
    Ok(())
}

/// Cycle report. Returns true when the graph is cycle-free.
pub fn cycles(out: &mut impl Write, graph: &DependencyGraph, json: bool) -> Result<bool> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&graph.cycles)?)?;
    } else if graph.cycles.is_empty() {
        writeln!(out, "No cycles")?;
    } else {
        for line in cycle_descriptions(graph) {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(graph.cycles.is_empty())
}

/// Dependencies (or dependents) of one package.
pub fn deps(
    out: &mut impl Write,
    graph: &DependencyGraph,
    name: &str,
    transitive: bool,
    reverse: bool,
    json: bool,
) -> Result<()> {
    if graph.node(name).is_none() {
        if json {
            writeln!(out, "{}", json!({ "package": name, "found": false }))?;
        } else {
            writeln!(out, "Package '{}' not found", name)?;
        }
        return Ok(());
    }

    let names = match (transitive, reverse) {
        (false, false) => direct_dependencies(graph, name),
        (true, false) => transitive_dependencies(graph, name),
        (false, true) => direct_dependents(graph, name),
        (true, true) => transitive_dependents(graph, name),
    };

    if json {
        let key = if reverse { "dependents" } else { "dependencies" };
        let value = json!({ "package": name, "transitive": transitive, key: names });
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else if names.is_empty() {
        writeln!(out, "{} -", name)?;
    } else {
        let arrow = if reverse { "<" } else { ">" };
        writeln!(out, "{} {} {}", name, arrow, names.join(" "))?;
    }
    Ok(())
}
