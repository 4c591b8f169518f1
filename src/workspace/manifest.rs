//
//  manifest.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use toml::value::{Table, Value};
use tracing::{debug, warn};

use super::{DependencyRecord, ManifestReader, Package};
use crate::error::{GraphError, Result};
use crate::parser::is_ignored_dir_name;

const MANIFEST_FILE: &str = "Cargo.toml";

/// Reads `Cargo.toml` manifests found under a workspace root.
///
/// Only the fields the graph needs are looked at: package name, the three
/// dependency tables (plus their `target.*` variants), and the root
/// `[workspace.dependencies]` table for `workspace = true` inheritance.
#[derive(Debug, Clone)]
pub struct CargoManifestReader {
    root: PathBuf,
}

impl CargoManifestReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All manifest paths under the root, sorted for stable package order.
    fn discover(&self) -> Vec<PathBuf> {
        let mut manifests: Vec<PathBuf> = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_exclude(true)
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_some_and(|ft| ft.is_dir())
                    || !is_ignored_dir_name(&entry.file_name().to_string_lossy())
            })
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter(|entry| entry.file_name() == MANIFEST_FILE)
            .map(|entry| entry.into_path())
            .collect();
        manifests.sort();
        manifests
    }

    fn workspace_dependencies(&self) -> Table {
        let root_manifest = self.root.join(MANIFEST_FILE);
        let Ok(contents) = fs::read_to_string(&root_manifest) else {
            return Table::new();
        };
        match contents.parse::<Value>() {
            Ok(value) => value
                .get("workspace")
                .and_then(|ws| ws.get("dependencies"))
                .and_then(Value::as_table)
                .cloned()
                .unwrap_or_default(),
            Err(e) => {
                warn!(path = %root_manifest.display(), error = %e, "root manifest is not valid TOML");
                Table::new()
            }
        }
    }
}

impl ManifestReader for CargoManifestReader {
    fn read_packages(&self) -> Result<Vec<Package>> {
        if !self.root.is_dir() {
            return Err(GraphError::manifest(
                &self.root,
                "workspace root is not a directory",
            ));
        }

        let workspace_deps = self.workspace_dependencies();
        let mut packages = Vec::new();

        for manifest_path in self.discover() {
            let contents = match fs::read_to_string(&manifest_path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %manifest_path.display(), error = %e, "skipping unreadable manifest");
                    continue;
                }
            };
            match parse_manifest(&manifest_path, &contents, &workspace_deps) {
                Ok(Some(package)) => packages.push(package),
                Ok(None) => debug!(path = %manifest_path.display(), "virtual manifest, no package"),
                Err(e) => warn!(error = %e, "skipping manifest"),
            }
        }

        debug!(count = packages.len(), root = %self.root.display(), "read workspace manifests");
        Ok(packages)
    }
}

/// Map one manifest to a [`Package`]. `Ok(None)` for manifests without `[package]`.
fn parse_manifest(path: &Path, contents: &str, workspace_deps: &Table) -> Result<Option<Package>> {
    let value: Value = contents
        .parse()
        .map_err(|e: toml::de::Error| GraphError::manifest(path, e.to_string()))?;

    let Some(name) = value
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
    else {
        return Ok(None);
    };

    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut package = Package {
        name: name.to_string(),
        directory,
        manifest_path: path.to_path_buf(),
        dependencies: Vec::new(),
        build_dependencies: Vec::new(),
        dev_dependencies: Vec::new(),
    };

    let mut tables = vec![&value];
    if let Some(targets) = value.get("target").and_then(Value::as_table) {
        tables.extend(targets.values());
    }

    for table in tables {
        collect(table, "dependencies", workspace_deps, &mut package.dependencies);
        collect(table, "build-dependencies", workspace_deps, &mut package.build_dependencies);
        collect(table, "dev-dependencies", workspace_deps, &mut package.dev_dependencies);
    }

    Ok(Some(package))
}

fn collect(table: &Value, key: &str, workspace_deps: &Table, out: &mut Vec<DependencyRecord>) {
    let Some(deps) = table.get(key).and_then(Value::as_table) else {
        return;
    };
    for (dep_key, spec) in deps {
        out.push(parse_dependency(dep_key, spec, workspace_deps));
    }
}

fn parse_dependency(key: &str, spec: &Value, workspace_deps: &Table) -> DependencyRecord {
    match spec {
        Value::String(version) => DependencyRecord::new(key).with_version(version.clone()),
        Value::Table(t) => {
            let inherits = t.get("workspace").and_then(Value::as_bool) == Some(true);
            if inherits {
                let inherited = workspace_deps.get(key);
                let mut record = inherited
                    .map(|v| parse_dependency(key, v, &Table::new()))
                    .unwrap_or_else(|| DependencyRecord::new(key));
                if let Some(rename) = t.get("package").and_then(Value::as_str) {
                    record.name = rename.to_string();
                }
                // Only workspace path dependencies count as local.
                record.workspace = record.local_path;
                return record;
            }

            let name = t
                .get("package")
                .and_then(Value::as_str)
                .unwrap_or(key)
                .to_string();
            DependencyRecord {
                name,
                local_path: t.contains_key("path"),
                workspace: false,
                version_spec: t.get("version").and_then(Value::as_str).map(String::from),
            }
        }
        _ => DependencyRecord::new(key),
    }
}

/// Fixed package snapshot, replaceable between rebuilds.
#[derive(Debug, Default)]
pub struct StaticManifestReader {
    packages: RwLock<Vec<Package>>,
}

impl StaticManifestReader {
    pub fn new(packages: Vec<Package>) -> Self {
        Self {
            packages: RwLock::new(packages),
        }
    }

    pub fn set_packages(&self, packages: Vec<Package>) {
        *self.packages.write().unwrap_or_else(|e| e.into_inner()) = packages;
    }
}

impl ManifestReader for StaticManifestReader {
    fn read_packages(&self) -> Result<Vec<Package>> {
        Ok(self
            .packages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}
