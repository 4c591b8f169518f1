//! Workspace inputs: packages, dependency records, and the narrow
//! capabilities the engine needs from the outside world.
//!
//! The engine never parses manifests or touches the disk directly. It asks a
//! [`ManifestReader`] for the current package snapshot and a [`SourceFs`] for
//! directory listings and file contents, so both can be faked in tests.

pub mod fs;
pub mod manifest;

pub use fs::{FsEntry, MemoryFs, OsFs, SourceFs};
pub use manifest::{CargoManifestReader, StaticManifestReader};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// A dependency as declared in a package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Name of the depended-on package.
    pub name: String,
    /// Declared with a local filesystem path.
    #[serde(default)]
    pub local_path: bool,
    /// Inherited from a workspace-level declaration that points inside the workspace.
    #[serde(default)]
    pub workspace: bool,
    /// Version requirement as written, if any.
    #[serde(default)]
    pub version_spec: Option<String>,
}

impl DependencyRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_path: false,
            workspace: false,
            version_spec: None,
        }
    }

    pub fn with_version(mut self, spec: impl Into<String>) -> Self {
        self.version_spec = Some(spec.into());
        self
    }

    pub fn with_path(mut self) -> Self {
        self.local_path = true;
        self
    }

    pub fn with_workspace(mut self) -> Self {
        self.workspace = true;
        self
    }

    /// True when the manifest marks this dependency as locally owned.
    pub fn is_local(&self) -> bool {
        self.local_path || self.workspace
    }
}

/// One buildable unit of the workspace, as handed over by the manifest reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub directory: PathBuf,
    pub manifest_path: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
    #[serde(default)]
    pub build_dependencies: Vec<DependencyRecord>,
    #[serde(default)]
    pub dev_dependencies: Vec<DependencyRecord>,
}

impl Package {
    /// Create a package rooted at `directory` with a `Cargo.toml` manifest.
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            name: name.into(),
            manifest_path: directory.join("Cargo.toml"),
            directory,
            dependencies: Vec::new(),
            build_dependencies: Vec::new(),
            dev_dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dep: DependencyRecord) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_build_dependency(mut self, dep: DependencyRecord) -> Self {
        self.build_dependencies.push(dep);
        self
    }

    pub fn with_dev_dependency(mut self, dep: DependencyRecord) -> Self {
        self.dev_dependencies.push(dep);
        self
    }
}

/// Source of the current package snapshot. Called once per rebuild.
pub trait ManifestReader: Send + Sync {
    fn read_packages(&self) -> Result<Vec<Package>>;
}

/// Fold a package or module name for matching: case-insensitive, `-` ≡ `_`.
///
/// Two distinct packages can fold to the same key (`Foo` and `foo`); callers
/// resolve such collisions first-wins.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}
