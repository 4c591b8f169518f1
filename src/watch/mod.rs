//! Live refresh: file watching, debounced rebuilds and change notification.
//!
//! The [`ChangeCoordinator`] owns the graph cache. File events are coalesced
//! into one rebuild per quiet period, and every successful rebuild is
//! published to subscribers as a [`GraphChangeEvent`].

pub mod coordinator;
pub mod subscribers;

pub use coordinator::ChangeCoordinator;
pub use subscribers::{ChangeCallback, Subscription};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::graph::{BuildOptions, DependencyGraph};
use crate::parser::is_ignored_dir_name;

/// What triggered a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    FullRefresh,
}

impl ChangeKind {
    /// One kind for a batch: the shared kind if all agree, else `Modified`.
    pub fn for_batch<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = ChangeKind>,
    {
        let mut kinds = kinds.into_iter();
        let Some(first) = kinds.next() else {
            return ChangeKind::FullRefresh;
        };
        if kinds.all(|k| k == first) {
            first
        } else {
            ChangeKind::Modified
        }
    }
}

/// Published after every successful rebuild.
#[derive(Debug, Clone)]
pub struct GraphChangeEvent {
    pub kind: ChangeKind,
    /// Sorted, deduplicated. Empty for manual refreshes.
    pub affected_paths: Vec<PathBuf>,
    pub timestamp: DateTime<Utc>,
    pub graph: Arc<DependencyGraph>,
}

/// Runtime settings for a [`ChangeCoordinator`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorOptions {
    /// Directories watched recursively.
    pub roots: Vec<PathBuf>,
    pub build: BuildOptions,
    pub debounce: Duration,
    pub cache_max_age: Duration,
    pub watch_sources: bool,
    pub manifest_file_name: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            build: BuildOptions::default(),
            debounce: Duration::from_millis(1000),
            cache_max_age: Duration::from_secs(60),
            watch_sources: true,
            manifest_file_name: "Cargo.toml".to_string(),
        }
    }
}

impl CoordinatorOptions {
    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = roots;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }

    /// Whether a changed path should trigger a rebuild.
    ///
    /// Manifests always count; sources only with `watch_sources` and a
    /// recognized extension. Paths under ignored directories (relative to
    /// the watched root) never count.
    pub fn is_relevant(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        let wanted = file_name == self.manifest_file_name
            || (self.watch_sources
                && crate::parser::imports::has_extension(path, &self.build.source_extensions));
        if !wanted {
            return false;
        }

        let relative = self
            .roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        !relative
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .filter_map(|c| c.as_os_str().to_str())
            .any(is_ignored_dir_name)
    }
}
