//
//  config.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::graph::BuildOptions;
use crate::watch::CoordinatorOptions;

/// Default config file name, looked up in the workspace root.
pub const CONFIG_FILE: &str = "deploy-graph.toml";

/// Top-level DeployGraph configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployGraphConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Graph build settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub include_dev_dependencies: bool,
    #[serde(default = "default_true")]
    pub include_build_dependencies: bool,
    /// Scan sources for `use`/`extern crate`/`mod` lines.
    #[serde(default = "default_true")]
    pub detect_imports: bool,
    #[serde(default = "default_max_source_depth")]
    pub max_source_depth: usize,
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

/// File watching and cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period after the last file event before rebuilding.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// How long a cached graph is served before a read rebuilds it.
    #[serde(default = "default_cache_max_age_ms")]
    pub cache_max_age_ms: u64,
    /// Also rebuild on source file changes, not just manifests.
    #[serde(default = "default_true")]
    pub watch_sources: bool,
    #[serde(default = "default_manifest_file_name")]
    pub manifest_file_name: String,
}

fn default_true() -> bool {
    true
}

fn default_max_source_depth() -> usize {
    3
}

fn default_source_extensions() -> Vec<String> {
    vec!["rs".to_string()]
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_cache_max_age_ms() -> u64 {
    60_000
}

fn default_manifest_file_name() -> String {
    "Cargo.toml".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            include_dev_dependencies: false,
            include_build_dependencies: default_true(),
            detect_imports: default_true(),
            max_source_depth: default_max_source_depth(),
            source_extensions: default_source_extensions(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cache_max_age_ms: default_cache_max_age_ms(),
            watch_sources: default_true(),
            manifest_file_name: default_manifest_file_name(),
        }
    }
}

impl DeployGraphConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Load `deploy-graph.toml` from a workspace root.
    pub fn load_from_root(root: &Path) -> Self {
        Self::load(&root.join(CONFIG_FILE))
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            include_dev_dependencies: self.graph.include_dev_dependencies,
            include_build_dependencies: self.graph.include_build_dependencies,
            detect_imports: self.graph.detect_imports,
            max_source_depth: self.graph.max_source_depth,
            source_extensions: self.graph.source_extensions.clone(),
        }
    }

    /// Coordinator settings watching the given roots.
    pub fn coordinator_options(&self, roots: Vec<PathBuf>) -> CoordinatorOptions {
        CoordinatorOptions {
            roots,
            build: self.build_options(),
            debounce: Duration::from_millis(self.watch.debounce_ms),
            cache_max_age: Duration::from_millis(self.watch.cache_max_age_ms),
            watch_sources: self.watch.watch_sources,
            manifest_file_name: self.watch.manifest_file_name.clone(),
        }
    }
}
