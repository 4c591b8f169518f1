//! Reconciles declared edges with edges inferred from source imports.

use std::collections::HashMap;
use tracing::debug;

use super::resolver::PackageIndex;
use super::types::*;
use crate::workspace::Package;

/// Fold import evidence into the declared edge set.
///
/// An import whose source and target both resolve to distinct workspace
/// packages either confirms an existing edge (`Declared` becomes `Both`) or
/// adds a new `Inferred` edge. Imports of anything else are left out of the
/// edge set.
pub fn merge_imports(
    mut edges: Vec<DependencyEdge>,
    imports: &[ImportRecord],
    packages: &[Package],
) -> Vec<DependencyEdge> {
    let index = PackageIndex::new(packages);
    let mut positions: HashMap<(String, String), usize> = edges
        .iter()
        .enumerate()
        .map(|(i, e)| ((e.from.clone(), e.to.clone()), i))
        .collect();

    let mut confirmed = 0usize;
    let mut inferred = 0usize;

    for import in imports {
        let (Some(from), Some(to)) = (
            index.resolve_name(&import.source_package),
            index.resolve_name(&import.imported_module),
        ) else {
            continue;
        };
        if from == to {
            continue;
        }

        let key = (from.to_string(), to.to_string());
        match positions.get(&key) {
            Some(&pos) => {
                let edge = &mut edges[pos];
                if edge.source == EdgeSource::Declared {
                    edge.source = EdgeSource::Both;
                    confirmed += 1;
                }
                edge.imports.push(import.clone());
            }
            None => {
                positions.insert(key, edges.len());
                edges.push(DependencyEdge::inferred(import.clone(), from, to));
                inferred += 1;
            }
        }
    }

    debug!(confirmed, inferred, total = edges.len(), "merged import evidence");
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::DependencyRecord;
    use std::path::PathBuf;

    fn import(from: &str, module: &str, line: usize) -> ImportRecord {
        ImportRecord {
            source_package: from.to_string(),
            imported_module: module.to_string(),
            kind: ImportKind::Use,
            source_file: PathBuf::from(format!("/ws/{from}/src/lib.rs")),
            line_number: line,
            raw_statement: format!("use {module}::thing;"),
        }
    }

    fn packages() -> Vec<Package> {
        vec![
            Package::new("api", "/ws/api").with_dependency(DependencyRecord::new("core-lib").with_path()),
            Package::new("core-lib", "/ws/core-lib"),
            Package::new("worker", "/ws/worker"),
        ]
    }

    fn declared() -> Vec<DependencyEdge> {
        vec![DependencyEdge::declared(
            "api",
            "core-lib",
            EdgeMetadata {
                kind: DependencyKind::Normal,
                version_spec: None,
                local_path: true,
                workspace: false,
            },
        )]
    }

    #[test]
    fn test_import_confirms_declared_edge() {
        let merged = merge_imports(
            declared(),
            &[import("api", "core_lib", 1), import("api", "core_lib", 7)],
            &packages(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, EdgeSource::Both);
        assert_eq!(merged[0].imports.len(), 2);
        assert!(merged[0].metadata.is_some());
    }

    #[test]
    fn test_import_without_declaration_is_inferred() {
        let merged = merge_imports(
            declared(),
            &[import("worker", "api", 3), import("worker", "api", 4)],
            &packages(),
        );
        assert_eq!(merged.len(), 2);
        let edge = &merged[1];
        assert_eq!((edge.from.as_str(), edge.to.as_str()), ("worker", "api"));
        assert_eq!(edge.source, EdgeSource::Inferred);
        assert_eq!(edge.imports.len(), 2);
        assert!(edge.metadata.is_none());
        assert!(!edge.is_external);
    }

    #[test]
    fn test_external_and_self_imports_ignored() {
        let merged = merge_imports(
            declared(),
            &[
                import("api", "serde", 1),
                import("api", "std", 2),
                import("api", "api", 3),
                import("unknown", "api", 4),
            ],
            &packages(),
        );
        assert_eq!(merged, declared());
    }

    #[test]
    fn test_case_insensitive_match() {
        let merged = merge_imports(Vec::new(), &[import("API", "Worker", 1)], &packages());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].from, "api");
        assert_eq!(merged[0].to, "worker");
    }
}
