//! Filesystem capability used by the import scanner.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::warn;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FsEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Directory listing and whole-file reads. Both may fail; callers decide
/// whether a failure is fatal.
pub trait SourceFs: Send + Sync {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FsEntry>>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl SourceFs for OsFs {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FsEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            entries.push(FsEntry {
                path: entry.path(),
                is_dir,
            });
        }
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// In-memory filesystem. Directories exist implicitly as ancestors of files.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<BTreeMap<PathBuf, String>>,
    unreadable: RwLock<BTreeSet<PathBuf>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.write_file(path, contents);
        self
    }

    /// Make reads of `path` (file or directory) fail with `PermissionDenied`.
    pub fn with_unreadable(self, path: impl Into<PathBuf>) -> Self {
        self.unreadable
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into());
        self
    }

    pub fn write_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), contents.into());
    }

    fn check_readable(&self, path: &Path) -> io::Result<()> {
        let unreadable = self.unreadable.read().unwrap_or_else(|e| e.into_inner());
        if unreadable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not readable", path.display()),
            ));
        }
        Ok(())
    }
}

impl SourceFs for MemoryFs {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FsEntry>> {
        self.check_readable(path)?;
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());

        let mut children: BTreeMap<PathBuf, bool> = BTreeMap::new();
        for file in files.keys() {
            let Ok(rel) = file.strip_prefix(path) else {
                continue;
            };
            let mut components = rel.components();
            let Some(first) = components.next() else {
                continue;
            };
            let is_dir = components.next().is_some();
            let child = path.join(first);
            let entry = children.entry(child).or_insert(is_dir);
            *entry |= is_dir;
        }

        if children.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ));
        }

        Ok(children
            .into_iter()
            .map(|(path, is_dir)| FsEntry { path, is_dir })
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.check_readable(path)?;
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }
}
