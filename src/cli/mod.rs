//! CLI module for DeployGraph.
//!
//! Commands:
//! - Inspect: stats, deps
//! - Deploy: order, cycles
//! - Live: watch

pub mod report;
pub mod watch;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

use crate::config::DeployGraphConfig;
use crate::graph::{build_from_reader, DependencyGraph};
use crate::workspace::{CargoManifestReader, OsFs};

#[derive(Parser)]
#[command(name = "deploy-graph")]
#[command(about = "DeployGraph - Workspace dependency graph for deployment ordering", long_about = None)]
pub struct Cli {
    /// Workspace root directory (default: current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub root: PathBuf,

    /// Config file (default: <root>/deploy-graph.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    // ─── Inspect ──────────────────────────────────────────────────
    /// Show graph statistics
    Stats,

    /// Show what a package depends on (or what depends on it)
    Deps {
        /// Package name
        name: String,

        /// Follow dependencies transitively
        #[arg(short, long)]
        transitive: bool,

        /// Show dependents instead of dependencies
        #[arg(long)]
        reverse: bool,
    },

    // ─── Deploy ───────────────────────────────────────────────────
    /// Print the deployment order, dependencies first
    Order {
        /// Only what is needed to ship these packages
        #[arg(short, long)]
        target: Vec<String>,

        /// Group packages into parallel deployment levels
        #[arg(short, long)]
        levels: bool,
    },

    /// List dependency cycles (exit status 1 if any)
    Cycles,

    // ─── Live ─────────────────────────────────────────────────────
    /// Rebuild on every change and print each update
    Watch,
}

/// Run a parsed command line against the workspace.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("workspace root {} not found", cli.root.display()))?;
    let config = match &cli.config {
        Some(path) => DeployGraphConfig::load(path),
        None => DeployGraphConfig::load_from_root(&root),
    };
    debug!(root = %root.display(), "loaded configuration");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Stats => {
            let graph = load_graph(&root, &config)?;
            report::stats(&mut out, &graph, cli.json)?;
        }

        Commands::Deps {
            name,
            transitive,
            reverse,
        } => {
            let graph = load_graph(&root, &config)?;
            report::deps(&mut out, &graph, &name, transitive, reverse, cli.json)?;
        }

        Commands::Order { target, levels } => {
            let graph = load_graph(&root, &config)?;
            report::order(&mut out, &graph, &target, levels, cli.json)?;
        }

        Commands::Cycles => {
            let graph = load_graph(&root, &config)?;
            let clean = report::cycles(&mut out, &graph, cli.json)?;
            out.flush()?;
            if !clean {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Watch => {
            drop(out);
            watch::run(&root, &config, cli.json)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// One-shot build of the workspace at `root`.
pub fn load_graph(root: &Path, config: &DeployGraphConfig) -> Result<DependencyGraph> {
    let reader = CargoManifestReader::new(root);
    let graph = build_from_reader(&reader, &OsFs, &config.build_options())
        .with_context(|| format!("failed to build graph for {}", root.display()))?;
    Ok(graph)
}
