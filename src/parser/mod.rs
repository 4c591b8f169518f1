//
//  mod.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

pub mod imports;

pub use imports::{extract_imports, scan_package, scan_workspace};

/// Directories that never hold first-party sources: build output, VCS
/// metadata, vendored or installed dependencies.
const BUILTIN_IGNORE: &[&str] = &[
    "target",
    "node_modules",
    "vendor",
    "dist",
    "build",
    "out",
    ".git",
    ".svn",
    ".hg",
    ".cargo",
    ".idea",
    ".vscode",
    "coverage",
    ".cache",
];

/// Check whether a directory name should be skipped while scanning or watching.
pub fn is_ignored_dir_name(name: &str) -> bool {
    BUILTIN_IGNORE.contains(&name) || (name.starts_with('.') && name.len() > 1 && name != "..")
}
