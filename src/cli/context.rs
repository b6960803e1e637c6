//! Context command implementation

use crate::cli::ContextArgs;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::repo::GitRepo;
use crate::graph::query::ContextSummary;
use crate::indexer::Indexer;
use std::env;

/// Run the context command
pub fn run(args: ContextArgs) -> Result<()> {
    let project_path = match args.project {
        Some(path) => path,
        None => env::current_dir()?,
    };

    let repo = GitRepo::discover(&project_path)?;
    let config = Config::load()?;
    let indexer = Indexer::new(repo, &config)?;

    if args.json {
        let summary = match indexer.load_graph()? {
            Some(graph) => graph.related_context(&args.paths, args.depth),
            None => ContextSummary::default(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let context = indexer.context_for_changed_files(&args.paths, args.depth)?;
    // Empty context is a valid answer: the caller omits the section
    if !context.is_empty() {
        print!("{context}");
    }

    Ok(())
}
