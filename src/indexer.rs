//! Indexing orchestrator
//!
//! Glues the repository adapter, index engine, dependency graph, and cache
//! into the two public operations: `index_repository` and
//! `context_for_changed_files`.

use crate::cache::{self, Store};
use crate::context::RepositoryContext;
use crate::core::cancel::CancelToken;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::repo::GitRepo;
use crate::engine::IndexEngine;
use crate::graph::DependencyGraph;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Summary of one indexing run
#[derive(Debug, Clone, Copy)]
pub struct IndexReport {
    pub total_files: usize,
    pub analyzed: usize,
    pub reused: usize,
    pub failed: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

pub struct Indexer {
    repo: GitRepo,
    store: Arc<Store>,
    engine: IndexEngine,
}

impl Indexer {
    pub fn new(repo: GitRepo, config: &Config) -> Result<Self> {
        let cache_dir = config.cache_dir(repo.root())?;
        let store = Arc::new(Store::with_ttl(
            cache_dir,
            Duration::from_secs(config.cache.ttl_hours * 3600),
            Duration::from_secs(config.cache.compact_interval_secs),
        )?);
        let engine = IndexEngine::new(store.clone(), config);
        Ok(Self {
            repo,
            store,
            engine,
        })
    }

    /// Run the full pipeline: list tracked files, extract the snapshot,
    /// derive the dependency graph, persist both artifacts.
    ///
    /// Idempotent: re-running with `force = false` and an unchanged tree
    /// skips every file at the cache layer.
    pub fn index_repository(&self, force: bool, cancel: &CancelToken) -> Result<IndexReport> {
        let files = self.repo.list_files()?;
        let branch = self.repo.branch()?;

        let outcome = self.engine.extract(
            self.repo.root(),
            self.repo.name(),
            &branch,
            files,
            force,
            cancel,
        )?;
        if outcome.cancelled {
            return Err(Error::Cancelled);
        }

        cache::set_json_logged(
            &self.store,
            &cache::repo_context_key(self.repo.root()),
            &outcome.context,
        );

        let graph = DependencyGraph::build(&outcome.context);
        cache::set_json_logged(
            &self.store,
            &cache::context_graph_key(self.repo.root()),
            &graph,
        );

        info!(
            repo = self.repo.name(),
            branch = %branch,
            files = outcome.context.files.len(),
            analyzed = outcome.analyzed,
            reused = outcome.reused,
            failed = outcome.failed,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Index complete"
        );

        Ok(IndexReport {
            total_files: outcome.context.files.len(),
            analyzed: outcome.analyzed,
            reused: outcome.reused,
            failed: outcome.failed,
            graph_nodes: graph.node_count(),
            graph_edges: graph.edge_count(),
        })
    }

    /// Context string for a set of changed files from the persisted graph.
    ///
    /// Returns the empty string when no graph is cached; downstream prompt
    /// templates simply omit the section.
    pub fn context_for_changed_files(&self, paths: &[String], max_depth: usize) -> Result<String> {
        match self.load_graph()? {
            Some(graph) => Ok(graph.context_for_files(paths, max_depth)),
            None => Ok(String::new()),
        }
    }

    /// Persisted repository snapshot, if any
    pub fn load_snapshot(&self) -> Result<Option<RepositoryContext>> {
        self.store
            .get_json(&cache::repo_context_key(self.repo.root()))
    }

    /// Persisted dependency graph, if any, with lookups rebuilt
    pub fn load_graph(&self) -> Result<Option<DependencyGraph>> {
        let graph: Option<DependencyGraph> = self
            .store
            .get_json(&cache::context_graph_key(self.repo.root()))?;
        Ok(graph.map(|mut g| {
            g.rebuild_lookups();
            g
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use std::path::Path;
    use std::process::Command;
    use tempfile::tempdir;

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(args)
                .status()
                .expect("git available");
            assert!(status.success(), "git {:?} failed", args);
        };
        run(&["init", "-q", "-b", "main"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
    }

    fn indexer_for(dir: &Path, cache_root: &Path) -> Indexer {
        let config = Config {
            cache: CacheConfig {
                dir: Some(cache_root.to_path_buf()),
                ..CacheConfig::default()
            },
            ..Config::default()
        };
        let repo = GitRepo::discover(dir).unwrap();
        Indexer::new(repo, &config).unwrap()
    }

    #[test]
    fn test_end_to_end_index_and_context() {
        let dir = tempdir().unwrap();
        let cache_root = tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.go"), "package p\nfunc Foo(){}\n").unwrap();
        std::fs::write(
            dir.path().join("b.go"),
            "package p\nimport \"./a\"\nfunc Bar(){ Foo() }\n",
        )
        .unwrap();

        let indexer = indexer_for(dir.path(), cache_root.path());
        let report = indexer.index_repository(false, &CancelToken::new()).unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.analyzed, 2);
        // 2 file nodes, 2 symbol nodes, 2 Defines + 1 Imports edges
        assert_eq!(report.graph_nodes, 4);
        assert_eq!(report.graph_edges, 3);

        let snapshot = indexer.load_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.branch, "main");
        assert_eq!(snapshot.files.len(), 2);

        let context = indexer
            .context_for_changed_files(&["b.go".to_string()], 2)
            .unwrap();
        assert!(context.contains("- a.go"));
        assert!(context.contains("function Bar (b.go:"));
        assert!(context.contains("function Foo (a.go:"));

        // Idempotent: a second run without changes analyzes nothing
        let again = indexer.index_repository(false, &CancelToken::new()).unwrap();
        assert_eq!(again.analyzed, 0);
        assert_eq!(again.reused, 2);
    }

    #[test]
    fn test_missing_graph_yields_empty_context() {
        let dir = tempdir().unwrap();
        let cache_root = tempdir().unwrap();
        init_repo(dir.path());

        let indexer = indexer_for(dir.path(), cache_root.path());
        let context = indexer
            .context_for_changed_files(&["anything.rs".to_string()], 2)
            .unwrap();
        assert_eq!(context, "");
    }

    #[test]
    fn test_cancelled_run_surfaces_without_persisting() {
        let dir = tempdir().unwrap();
        let cache_root = tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();

        let indexer = indexer_for(dir.path(), cache_root.path());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = indexer.index_repository(false, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(indexer.load_snapshot().unwrap().is_none());
        assert!(indexer.load_graph().unwrap().is_none());
    }

    #[test]
    fn test_deletion_removes_file_and_edges() {
        let dir = tempdir().unwrap();
        let cache_root = tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.go"), "package p\nfunc Foo(){}\n").unwrap();
        std::fs::write(
            dir.path().join("b.go"),
            "package p\nimport \"./a\"\nfunc Bar(){}\n",
        )
        .unwrap();

        let indexer = indexer_for(dir.path(), cache_root.path());
        indexer.index_repository(false, &CancelToken::new()).unwrap();

        std::fs::remove_file(dir.path().join("b.go")).unwrap();
        indexer.index_repository(false, &CancelToken::new()).unwrap();

        let snapshot = indexer.load_snapshot().unwrap().unwrap();
        assert!(!snapshot.files.contains_key("b.go"));

        let graph = indexer.load_graph().unwrap().unwrap();
        assert!(graph.node_id("file:b.go").is_none());
    }
}
