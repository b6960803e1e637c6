//! CLI command definitions and handlers

pub mod context;
pub mod index;
pub mod status;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
}

/// Repository context indexer for AI prompt construction
#[derive(Parser, Debug)]
#[command(name = "repoctx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = styles())]
#[command(after_help = "Examples:
  repoctx index                 Index the current repository
  repoctx index --force         Re-analyze every file
  repoctx context src/main.rs   Print context for a changed file
  repoctx context --json a.rs   Machine-readable context
  repoctx status                Show the persisted snapshot summary")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index the repository into a snapshot and dependency graph
    Index(IndexArgs),

    /// Print prompt context for a set of changed files
    Context(ContextArgs),

    /// Show the persisted snapshot summary
    Status(StatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct IndexArgs {
    /// Repository path (defaults to the current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Re-analyze every file, ignoring cached results
    #[arg(short, long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct ContextArgs {
    /// Changed files, repo-relative
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Maximum graph traversal depth
    #[arg(short, long, default_value = "2")]
    pub depth: usize,

    /// Repository path (defaults to the current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Repository path (defaults to the current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}
