//
//  cache.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

use super::types::DependencyGraph;

/// A graph plus the moment it was stored.
#[derive(Debug, Clone)]
struct CachedGraph {
    graph: Arc<DependencyGraph>,
    built_at: Instant,
}

/// Single shared slot holding the most recent complete graph.
///
/// The slot is only ever replaced wholesale, so readers see either the
/// previous graph or the new one. Graphs already handed out are never touched.
#[derive(Debug, Default)]
pub struct GraphCache {
    slot: RwLock<Option<CachedGraph>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached graph if it is younger than `max_age`.
    pub fn get(&self, max_age: Duration) -> Option<Arc<DependencyGraph>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|cached| cached.built_at.elapsed() < max_age)
            .map(|cached| Arc::clone(&cached.graph))
    }

    /// Store a freshly built graph and return the shared handle.
    pub fn set(&self, graph: DependencyGraph) -> Arc<DependencyGraph> {
        let graph = Arc::new(graph);
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(CachedGraph {
            graph: Arc::clone(&graph),
            built_at: Instant::now(),
        });
        graph
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            debug!("graph cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_cache() {
        let cache = GraphCache::new();
        assert!(cache.get(Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_fresh_read_returns_same_instance() {
        let cache = GraphCache::new();
        let stored = cache.set(DependencyGraph::empty());

        let first = cache.get(Duration::from_secs(60)).unwrap();
        let second = cache.get(Duration::from_secs(60)).unwrap();
        assert!(Arc::ptr_eq(&stored, &first));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_expired_entry_is_not_returned() {
        let cache = GraphCache::new();
        cache.set(DependencyGraph::empty());
        thread::sleep(Duration::from_millis(20));

        assert!(cache.get(Duration::from_millis(5)).is_none());
        assert!(cache.get(Duration::from_secs(60)).is_some());
    }

    #[test]
    fn test_invalidate_keeps_handed_out_graphs() {
        let cache = GraphCache::new();
        let held = cache.set(DependencyGraph::empty());
        cache.invalidate();

        assert!(cache.get(Duration::from_secs(60)).is_none());
        assert!(held.nodes.is_empty());
        assert_eq!(Arc::strong_count(&held), 1);
    }
}
