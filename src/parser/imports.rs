//! Import scanning: finds `use`, `extern crate` and `mod` lines in package
//! sources and turns them into [`ImportRecord`]s.
//!
//! Matching is line-based on purpose. The scanner only needs the leading
//! identifier of each statement to guess which workspace package is being
//! referenced, and it must keep going on files that don't parse.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::is_ignored_dir_name;
use crate::graph::types::{BuildOptions, ImportKind, ImportRecord};
use crate::workspace::{Package, SourceFs};

static USE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^use\s+(?:::)?([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static EXTERN_CRATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^extern\s+crate\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static MOD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^mod\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Extract import records from one source file. First matching pattern wins per line.
pub fn extract_imports(package: &str, file: &Path, source: &str) -> Vec<ImportRecord> {
    let patterns: [(&Regex, ImportKind); 3] = [
        (&USE_PATTERN, ImportKind::Use),
        (&EXTERN_CRATE_PATTERN, ImportKind::ExternCrate),
        (&MOD_PATTERN, ImportKind::Mod),
    ];

    let mut records = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        for (pattern, kind) in &patterns {
            if let Some(caps) = pattern.captures(trimmed) {
                records.push(ImportRecord {
                    source_package: package.to_string(),
                    imported_module: caps[1].to_string(),
                    kind: *kind,
                    source_file: file.to_path_buf(),
                    line_number: idx + 1,
                    raw_statement: trimmed.to_string(),
                });
                break;
            }
        }
    }
    records
}

/// Scan every recognised source file of a package, at most `max_depth`
/// directories below the package directory.
///
/// Directories listed in `nested` belong to other packages and are not
/// entered. Unreadable files and directories are logged and skipped.
pub fn scan_package(
    fs: &dyn SourceFs,
    package: &Package,
    extensions: &[String],
    max_depth: usize,
    nested: &[&Path],
) -> Vec<ImportRecord> {
    let walk = SourceWalk {
        fs,
        extensions,
        max_depth,
        nested,
    };
    let mut files = Vec::new();
    walk.collect(&package.directory, 0, &mut files);

    let mut records = Vec::new();
    for file in &files {
        match fs.read_to_string(file) {
            Ok(source) => records.extend(extract_imports(&package.name, file, &source)),
            Err(e) => {
                warn!(package = %package.name, file = %file.display(), error = %e, "skipping unreadable source file");
            }
        }
    }

    debug!(package = %package.name, files = files.len(), imports = records.len(), "scanned package sources");
    records
}

/// Scan all packages in parallel. Output keeps package input order.
///
/// A package never scans into another package's directory, so a root
/// package does not pick up the sources of members nested below it.
pub fn scan_workspace(
    fs: &dyn SourceFs,
    packages: &[Package],
    options: &BuildOptions,
) -> Vec<ImportRecord> {
    packages
        .par_iter()
        .map(|package| {
            let nested: Vec<&Path> = packages
                .iter()
                .map(|p| p.directory.as_path())
                .filter(|dir| *dir != package.directory && dir.starts_with(&package.directory))
                .collect();
            scan_package(
                fs,
                package,
                &options.source_extensions,
                options.max_source_depth,
                &nested,
            )
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Fixed parameters of one package's directory walk.
struct SourceWalk<'a> {
    fs: &'a dyn SourceFs,
    extensions: &'a [String],
    max_depth: usize,
    nested: &'a [&'a Path],
}

impl SourceWalk<'_> {
    fn collect(&self, dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
        let mut entries = match self.fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };
        entries.sort();

        for entry in entries {
            if entry.is_dir {
                let name = entry
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if depth < self.max_depth
                    && !is_ignored_dir_name(&name)
                    && !self.nested.contains(&entry.path.as_path())
                {
                    self.collect(&entry.path, depth + 1, out);
                }
            } else if has_extension(&entry.path, self.extensions) {
                out.push(entry.path);
            }
        }
    }
}

/// Check a file extension against a list like `["rs"]` or `[".rs"]`.
pub(crate) fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
