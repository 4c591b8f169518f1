//
//  error.rs
//  DeployGraph
//
//  Created by hak (tharun)
//

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the graph engine and its collaborators.
///
/// Cycles are never reported through this type; they are part of the
/// built [`DependencyGraph`](crate::graph::DependencyGraph).
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl GraphError {
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
