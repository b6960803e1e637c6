//! Status command implementation

use crate::cli::StatusArgs;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::repo::GitRepo;
use crate::indexer::Indexer;
use std::env;

/// Run the status command
pub fn run(args: StatusArgs) -> Result<()> {
    let project_path = match args.project {
        Some(path) => path,
        None => env::current_dir()?,
    };

    let repo = GitRepo::discover(&project_path)?;
    let config = Config::load()?;
    let indexer = Indexer::new(repo, &config)?;

    let Some(snapshot) = indexer.load_snapshot()? else {
        println!("No index found. Run `repoctx index` first.");
        return Ok(());
    };

    println!("{} ({})", snapshot.name, snapshot.branch);
    println!("  Files:        {}", snapshot.metrics.total_files);
    println!("  Lines:        {}", snapshot.metrics.total_lines);
    match &snapshot.languages.primary {
        Some(primary) => println!("  Primary:      {}", primary),
        None => println!("  Primary:      (none)"),
    }
    if !snapshot.languages.others.is_empty() {
        let others: Vec<&str> = snapshot
            .languages
            .others
            .iter()
            .map(|l| l.as_str())
            .collect();
        println!("  Others:       {}", others.join(", "));
    }
    println!("  Dependencies: {}", snapshot.dependencies.len());

    if let Some(graph) = indexer.load_graph()? {
        println!(
            "  Graph:        {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
    }

    if !snapshot.errors.is_empty() {
        println!("  Errors:       {}", snapshot.errors.len());
        for error in snapshot.errors.iter().take(5) {
            println!("    - {}", error);
        }
        if snapshot.errors.len() > 5 {
            println!("    ... and {} more", snapshot.errors.len() - 5);
        }
    }

    Ok(())
}
