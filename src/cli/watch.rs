//! Watch mode: keep the graph live and print every rebuild.

use anyhow::{Context as _, Result};
use serde_json::json;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::DeployGraphConfig;
use crate::watch::{ChangeCoordinator, ChangeKind, GraphChangeEvent};
use crate::workspace::{CargoManifestReader, OsFs};

/// Run until the process is interrupted.
pub fn run(root: &Path, config: &DeployGraphConfig, json: bool) -> Result<()> {
    let reader = Arc::new(CargoManifestReader::new(root));
    let options = config.coordinator_options(vec![root.to_path_buf()]);
    let coordinator = ChangeCoordinator::new(reader, Arc::new(OsFs), options);

    let (tx, rx) = mpsc::channel::<GraphChangeEvent>();
    let tx = Mutex::new(tx);
    let _subscription = coordinator.on_change(move |event| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(event.clone());
        }
    });

    coordinator
        .refresh(ChangeKind::FullRefresh)
        .context("initial graph build failed")?;
    coordinator.start()?;
    info!(root = %root.display(), "watching for changes (Ctrl-C to stop)");

    for event in rx {
        if json {
            println!("{}", describe_json(&event));
        } else {
            println!("{}", describe(&event));
        }
    }
    Ok(())
}

/// One status line per rebuild.
pub fn describe(event: &GraphChangeEvent) -> String {
    let stats = &event.graph.stats;
    let status = if event.graph.is_deployable() {
        "ok".to_string()
    } else {
        format!("{} cycle(s)", stats.cycle_count)
    };
    format!(
        "[{}] {:?} {} path(s): {} packages, {} edges, {}",
        event.timestamp.format("%H:%M:%S"),
        event.kind,
        event.affected_paths.len(),
        stats.node_count,
        stats.edge_count,
        status
    )
}

/// JSON form of an event, without the full graph.
pub fn describe_json(event: &GraphChangeEvent) -> serde_json::Value {
    json!({
        "kind": event.kind,
        "affected_paths": event.affected_paths,
        "timestamp": event.timestamp,
        "deployment_order": event.graph.deployment_order,
        "cycles": event.graph.cycles,
        "stats": event.graph.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;
    use chrono::Utc;
    use std::path::PathBuf;

    fn event() -> GraphChangeEvent {
        let mut graph = DependencyGraph::empty();
        graph.stats.node_count = 2;
        graph.stats.edge_count = 1;
        graph.deployment_order = vec!["core".to_string(), "app".to_string()];
        GraphChangeEvent {
            kind: ChangeKind::Modified,
            affected_paths: vec![PathBuf::from("/ws/app/Cargo.toml")],
            timestamp: Utc::now(),
            graph: Arc::new(graph),
        }
    }

    #[test]
    fn test_describe_line() {
        let line = describe(&event());
        assert!(line.ends_with("Modified 1 path(s): 2 packages, 1 edges, ok"), "{line}");
    }

    #[test]
    fn test_describe_json() {
        let value = describe_json(&event());
        assert_eq!(value["kind"], "modified");
        assert_eq!(value["deployment_order"], json!(["core", "app"]));
        assert_eq!(value["stats"]["node_count"], 2);
    }
}
