//! Index command implementation

use crate::cli::IndexArgs;
use crate::core::cancel::CancelToken;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::repo::GitRepo;
use crate::indexer::Indexer;
use std::env;
use std::time::Instant;
use tracing::info;

/// Run the index command
pub fn run(args: IndexArgs) -> Result<()> {
    let project_path = match args.project {
        Some(path) => path,
        None => env::current_dir()?,
    };

    let repo = GitRepo::discover(&project_path)?;
    info!(repo = repo.name(), root = %repo.root().display(), "Indexing repository");

    let config = Config::load()?;
    let indexer = Indexer::new(repo, &config)?;

    let start = Instant::now();
    let report = indexer.index_repository(args.force, &CancelToken::new())?;
    let elapsed = start.elapsed();

    println!(
        "Indexed {} files ({} analyzed, {} reused, {} failed) in {:.2}s",
        report.total_files,
        report.analyzed,
        report.reused,
        report.failed,
        elapsed.as_secs_f64()
    );
    println!(
        "Graph: {} nodes, {} edges",
        report.graph_nodes, report.graph_edges
    );

    Ok(())
}
