//
//  coordinator.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use chrono::Utc;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::subscribers::{ChangeCallback, Subscribers, Subscription};
use super::{ChangeKind, CoordinatorOptions, GraphChangeEvent};
use crate::error::Result;
use crate::graph::{build_from_reader, DependencyGraph, GraphCache};
use crate::workspace::{ManifestReader, SourceFs};

enum Message {
    Change(PathBuf, ChangeKind),
    Stop,
}

/// State shared between the coordinator handle and its worker thread.
struct Shared {
    reader: Arc<dyn ManifestReader>,
    fs: Arc<dyn SourceFs>,
    options: CoordinatorOptions,
    cache: GraphCache,
    rebuild_lock: Mutex<()>,
    subscribers: Arc<Subscribers>,
}

impl Shared {
    /// Rebuild unless another caller refreshed the cache while we waited.
    fn rebuild_if_stale(&self, max_age: Duration) -> Result<Arc<DependencyGraph>> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(graph) = self.cache.get(max_age) {
            return Ok(graph);
        }
        self.build_locked()
    }

    /// Rebuild and deliver the event before releasing the rebuild lock, so
    /// subscribers see graphs in build order.
    fn rebuild_and_publish(
        &self,
        kind: ChangeKind,
        affected_paths: Vec<PathBuf>,
    ) -> Result<Arc<DependencyGraph>> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
        let graph = self.build_locked()?;
        self.publish(kind, affected_paths, Arc::clone(&graph));
        Ok(graph)
    }

    fn build_locked(&self) -> Result<Arc<DependencyGraph>> {
        let graph = build_from_reader(self.reader.as_ref(), self.fs.as_ref(), &self.options.build)?;
        Ok(self.cache.set(graph))
    }

    fn publish(&self, kind: ChangeKind, affected_paths: Vec<PathBuf>, graph: Arc<DependencyGraph>) {
        let event = GraphChangeEvent {
            kind,
            affected_paths,
            timestamp: Utc::now(),
            graph,
        };
        self.subscribers.publish(&event);
    }

    /// Rebuild for a debounced batch. Returns false when the build failed.
    fn flush(&self, pending: &BTreeMap<PathBuf, ChangeKind>) -> bool {
        let kind = ChangeKind::for_batch(pending.values().copied());
        match self.rebuild_and_publish(kind, pending.keys().cloned().collect()) {
            Ok(graph) => {
                info!(
                    kind = ?kind,
                    paths = pending.len(),
                    nodes = graph.stats.node_count,
                    "graph rebuilt after file changes"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, paths = pending.len(), "debounced rebuild failed, keeping previous graph");
                false
            }
        }
    }
}

struct Running {
    tx: Sender<Message>,
    worker: JoinHandle<()>,
    watcher: Option<RecommendedWatcher>,
}

/// Owns the graph cache and keeps it current as the workspace changes.
///
/// `start` spawns one worker thread that coalesces file events: every event
/// resets a single debounce timer, and when it fires the whole batch becomes
/// one rebuild and one [`GraphChangeEvent`]. Rebuilds never overlap, whether
/// they come from the worker, [`refresh`](Self::refresh) or a cache miss in
/// [`graph`](Self::graph).
pub struct ChangeCoordinator {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl ChangeCoordinator {
    pub fn new(
        reader: Arc<dyn ManifestReader>,
        fs: Arc<dyn SourceFs>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                reader,
                fs,
                options,
                cache: GraphCache::new(),
                rebuild_lock: Mutex::new(()),
                subscribers: Arc::new(Subscribers::default()),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.shared.options
    }

    // ─── Lifecycle ──────────────────────────────────────────────

    /// Start watching the configured roots. Calling it twice is a no-op.
    ///
    /// A root that cannot be watched is logged and skipped; only failing to
    /// create the watcher itself is an error.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel();
        let watcher = if self.shared.options.roots.is_empty() {
            None
        } else {
            Some(self.watch_roots(tx.clone())?)
        };

        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("deploy-graph-watch".to_string())
            .spawn(move || run_worker(shared, rx))?;

        info!(
            roots = self.shared.options.roots.len(),
            debounce_ms = self.shared.options.debounce.as_millis() as u64,
            "change coordinator started"
        );
        *running = Some(Running {
            tx,
            worker,
            watcher,
        });
        Ok(())
    }

    /// Stop watching and drop any pending batch. Calling it twice is a no-op.
    pub fn stop(&self) {
        let Some(running) = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };

        drop(running.watcher);
        let _ = running.tx.send(Message::Stop);
        if running.worker.join().is_err() {
            warn!("change coordinator worker panicked");
        }
        info!("change coordinator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stop, drop all subscribers and clear the cache.
    pub fn dispose(&self) {
        self.stop();
        self.shared.subscribers.clear();
        self.shared.cache.invalidate();
    }

    // ─── Graph Access ───────────────────────────────────────────

    /// The current graph: cached if fresh, otherwise rebuilt on this thread.
    pub fn graph(&self) -> Result<Arc<DependencyGraph>> {
        let max_age = self.shared.options.cache_max_age;
        match self.shared.cache.get(max_age) {
            Some(graph) => Ok(graph),
            None => self.shared.rebuild_if_stale(max_age),
        }
    }

    /// The cached graph if younger than `max_age`. Never builds.
    pub fn cached_graph(&self, max_age: Duration) -> Option<Arc<DependencyGraph>> {
        self.shared.cache.get(max_age)
    }

    /// Drop the cached graph so the next read rebuilds.
    pub fn invalidate(&self) {
        self.shared.cache.invalidate();
    }

    /// Rebuild now, bypassing the debounce timer, and publish the result.
    ///
    /// Errors are returned to the caller and the previous graph stays cached.
    pub fn refresh(&self, kind: ChangeKind) -> Result<Arc<DependencyGraph>> {
        self.shared.rebuild_and_publish(kind, Vec::new())
    }

    // ─── Notification ───────────────────────────────────────────

    /// Register a callback for every successful rebuild.
    ///
    /// Callbacks run while the rebuild lock is held, in build order. They
    /// must not call [`refresh`](Self::refresh) or rebuild through
    /// [`graph`](Self::graph); reading the event's graph is enough.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&GraphChangeEvent) + Send + Sync + 'static,
    {
        let callback: ChangeCallback = Arc::new(callback);
        self.shared.subscribers.subscribe(callback)
    }

    /// Feed a change into the debounce queue as if the watcher saw it.
    /// Ignored while stopped.
    pub fn notify_change(&self, path: impl Into<PathBuf>, kind: ChangeKind) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        match running.as_ref() {
            Some(running) => {
                let _ = running.tx.send(Message::Change(path.into(), kind));
            }
            None => debug!("change ignored, coordinator not running"),
        }
    }

    fn watch_roots(&self, tx: Sender<Message>) -> Result<RecommendedWatcher> {
        let options = self.shared.options.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "file watcher error");
                    return;
                }
            };
            let kind = match event.kind {
                EventKind::Create(_) => ChangeKind::Added,
                EventKind::Remove(_) => ChangeKind::Removed,
                EventKind::Modify(_) => ChangeKind::Modified,
                _ => return,
            };
            for path in event.paths {
                if options.is_relevant(&path) {
                    let _ = tx.send(Message::Change(path, kind));
                }
            }
        })?;

        for root in &self.shared.options.roots {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => debug!(root = %root.display(), "watching"),
                Err(e) => warn!(root = %root.display(), error = %e, "file watcher failed to start"),
            }
        }
        Ok(watcher)
    }
}

impl Drop for ChangeCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Debounce loop. The pending set survives a failed rebuild and is retried
/// with the next batch; it is dropped on stop.
fn run_worker(shared: Arc<Shared>, rx: Receiver<Message>) {
    let debounce = shared.options.debounce;
    let mut pending: BTreeMap<PathBuf, ChangeKind> = BTreeMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let message = match deadline {
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
            Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    if shared.flush(&pending) {
                        pending.clear();
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
        };

        match message {
            Message::Change(path, kind) => {
                debug!(path = %path.display(), kind = ?kind, "change queued");
                pending.insert(path, kind);
                deadline = Some(Instant::now() + debounce);
            }
            Message::Stop => break,
        }
    }

    if !pending.is_empty() {
        debug!(paths = pending.len(), "discarding pending changes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::workspace::{
        CargoManifestReader, DependencyRecord, MemoryFs, OsFs, Package, StaticManifestReader,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Reader that counts calls and can be told to fail.
    struct FlakyReader {
        inner: StaticManifestReader,
        failing: AtomicBool,
        reads: AtomicUsize,
    }

    impl FlakyReader {
        fn new(packages: Vec<Package>) -> Arc<Self> {
            Arc::new(Self {
                inner: StaticManifestReader::new(packages),
                failing: AtomicBool::new(false),
                reads: AtomicUsize::new(0),
            })
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl ManifestReader for FlakyReader {
        fn read_packages(&self) -> Result<Vec<Package>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(GraphError::manifest("/ws/Cargo.toml", "simulated failure"));
            }
            self.inner.read_packages()
        }
    }

    fn packages() -> Vec<Package> {
        vec![
            Package::new("app", "/ws/app").with_dependency(DependencyRecord::new("core").with_path()),
            Package::new("core", "/ws/core"),
        ]
    }

    fn coordinator(reader: Arc<FlakyReader>, debounce_ms: u64) -> ChangeCoordinator {
        let options = CoordinatorOptions::default().with_debounce(Duration::from_millis(debounce_ms));
        ChangeCoordinator::new(reader, Arc::new(MemoryFs::new()), options)
    }

    fn event_channel(coordinator: &ChangeCoordinator) -> (Subscription, Receiver<GraphChangeEvent>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let sub = coordinator.on_change(move |event| {
            let _ = tx.lock().unwrap().send(event.clone());
        });
        (sub, rx)
    }

    #[test]
    fn test_rapid_changes_coalesce_into_one_rebuild() {
        let reader = FlakyReader::new(packages());
        let coord = coordinator(Arc::clone(&reader), 50);
        let (_sub, events) = event_channel(&coord);

        coord.start().unwrap();
        for i in 0..10 {
            coord.notify_change(format!("/ws/core/src/m{i}.rs"), ChangeKind::Modified);
        }

        let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.kind, ChangeKind::Modified);
        assert_eq!(event.affected_paths.len(), 10);
        assert_eq!(event.graph.deployment_order, vec!["core", "app"]);

        assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(reader.reads(), 1);
        coord.stop();
    }

    #[test]
    fn test_batch_of_additions_reports_added() {
        let reader = FlakyReader::new(packages());
        let coord = coordinator(reader, 30);
        let (_sub, events) = event_channel(&coord);

        coord.start().unwrap();
        coord.notify_change("/ws/new/Cargo.toml", ChangeKind::Added);
        coord.notify_change("/ws/new/src/lib.rs", ChangeKind::Added);

        let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.kind, ChangeKind::Added);
        assert_eq!(
            event.affected_paths,
            vec![PathBuf::from("/ws/new/Cargo.toml"), PathBuf::from("/ws/new/src/lib.rs")]
        );
    }

    #[test]
    fn test_failed_debounced_rebuild_keeps_cache_and_retries() {
        let reader = FlakyReader::new(packages());
        let coord = coordinator(Arc::clone(&reader), 30);
        let (_sub, events) = event_channel(&coord);

        let before = coord.graph().unwrap();
        reader.failing.store(true, Ordering::SeqCst);

        coord.start().unwrap();
        coord.notify_change("/ws/core/Cargo.toml", ChangeKind::Modified);
        assert!(events.recv_timeout(Duration::from_millis(400)).is_err());
        assert!(coord.is_running());

        let cached = coord.cached_graph(Duration::from_secs(60)).unwrap();
        assert!(Arc::ptr_eq(&before, &cached));

        reader.failing.store(false, Ordering::SeqCst);
        coord.notify_change("/ws/app/Cargo.toml", ChangeKind::Modified);
        let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.affected_paths.len(), 2);
        assert!(!Arc::ptr_eq(&before, &event.graph));
    }

    #[test]
    fn test_manual_refresh_propagates_errors() {
        let reader = FlakyReader::new(packages());
        let coord = coordinator(Arc::clone(&reader), 1000);
        let (_sub, events) = event_channel(&coord);

        let graph = coord.refresh(ChangeKind::FullRefresh).unwrap();
        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event.kind, ChangeKind::FullRefresh);
        assert!(event.affected_paths.is_empty());
        assert!(Arc::ptr_eq(&graph, &event.graph));

        reader.failing.store(true, Ordering::SeqCst);
        let err = coord.refresh(ChangeKind::FullRefresh).unwrap_err();
        assert!(matches!(err, GraphError::Manifest { .. }));
        assert!(events.try_recv().is_err());

        let cached = coord.cached_graph(Duration::from_secs(60)).unwrap();
        assert!(Arc::ptr_eq(&graph, &cached));
    }

    #[test]
    fn test_concurrent_refreshes_publish_in_build_order() {
        let coord = Arc::new(coordinator(FlakyReader::new(packages()), 1000));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let _sub = coord.on_change(move |event| {
            recorder.lock().unwrap().push(event.graph.built_at);
        });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let coord = Arc::clone(&coord);
                thread::spawn(move || {
                    for _ in 0..10 {
                        coord.refresh(ChangeKind::FullRefresh).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 40);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_graph_serves_cache_until_expiry() {
        let reader = FlakyReader::new(packages());
        let options = CoordinatorOptions::default().with_cache_max_age(Duration::from_millis(100));
        let coord = ChangeCoordinator::new(
            Arc::clone(&reader) as Arc<dyn ManifestReader>,
            Arc::new(MemoryFs::new()),
            options,
        );

        let first = coord.graph().unwrap();
        let second = coord.graph().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(reader.reads(), 1);

        thread::sleep(Duration::from_millis(150));
        let third = coord.graph().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(reader.reads(), 2);

        coord.invalidate();
        assert!(coord.cached_graph(Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_stop_discards_pending_changes() {
        let reader = FlakyReader::new(packages());
        let coord = coordinator(Arc::clone(&reader), 100);
        let (_sub, events) = event_channel(&coord);

        coord.start().unwrap();
        coord.notify_change("/ws/core/Cargo.toml", ChangeKind::Modified);
        coord.stop();
        assert!(!coord.is_running());

        assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(reader.reads(), 0);

        coord.notify_change("/ws/core/Cargo.toml", ChangeKind::Modified);
        assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let coord = coordinator(FlakyReader::new(packages()), 50);
        coord.start().unwrap();
        coord.start().unwrap();
        assert!(coord.is_running());
        coord.stop();
        coord.stop();
        assert!(!coord.is_running());
    }

    #[test]
    fn test_unsubscribed_callback_is_not_called() {
        let coord = coordinator(FlakyReader::new(packages()), 1000);
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let sub = coord.on_change(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        coord.refresh(ChangeKind::FullRefresh).unwrap();
        sub.unsubscribe();
        coord.refresh(ChangeKind::FullRefresh).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_clears_everything() {
        let coord = coordinator(FlakyReader::new(packages()), 50);
        let _sub = coord.on_change(|_| {});
        coord.start().unwrap();
        coord.graph().unwrap();

        coord.dispose();
        assert!(!coord.is_running());
        assert!(coord.cached_graph(Duration::from_secs(60)).is_none());
        assert_eq!(coord.shared.subscribers.len(), 0);
    }

    #[test]
    fn test_watcher_picks_up_new_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"core\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();

        let options = CoordinatorOptions::default()
            .with_roots(vec![root.clone()])
            .with_debounce(Duration::from_millis(100));
        let coord = ChangeCoordinator::new(
            Arc::new(CargoManifestReader::new(root.clone())),
            Arc::new(OsFs),
            options,
        );
        std::fs::create_dir_all(root.join("app")).unwrap();
        assert_eq!(coord.graph().unwrap().stats.node_count, 1);

        let (_sub, events) = event_channel(&coord);
        coord.start().unwrap();
        thread::sleep(Duration::from_millis(100));

        std::fs::write(
            root.join("app/Cargo.toml"),
            "[package]\nname = \"app\"\nversion = \"0.1.0\"\n\n[dependencies]\ncore = { path = \"..\" }\n",
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut last = None;
        while Instant::now() < deadline {
            match events.recv_timeout(Duration::from_millis(200)) {
                Ok(event) if event.graph.stats.node_count == 2 => {
                    last = Some(event);
                    break;
                }
                _ => continue,
            }
        }

        let event = last.expect("no rebuild after manifest was written");
        assert_eq!(event.graph.deployment_order, vec!["core", "app"]);
        coord.stop();
    }
}
