//! Index engine
//!
//! Decides per file whether to re-analyze or reuse a cached result, fans
//! analysis out over a worker pool, and merges fresh results with carried
//! entries into a repository-wide snapshot.
//!
//! The two central invariants live here:
//!
//! - **Incremental policy**: a file is reused iff `force` is off and its
//!   cached `mod_time` equals the current stat result; cached entries for
//!   paths no longer tracked are dropped.
//! - **Merge**: the output snapshot is fresh contexts ∪ carried contexts ∪
//!   previous repo metadata, with `dependencies` recomputed from the
//!   surviving files and metrics/languages preserved verbatim when no file
//!   required analysis.

use crate::cache::{self, Store};
use crate::context::{FileContext, RepositoryContext};
use crate::core::cancel::CancelToken;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::extract::{FileAnalyzer, LanguageStats, ParserHost, QueryRegistry};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// SKIP LISTS
// =============================================================================

/// Directory components silently dropped before workers see the path
const SKIP_DIRS: &[&str] = &["node_modules", ".git", "vendor", "build", "dist", "target"];

/// Suffixes of generated artifacts that never get analyzed
const SKIP_SUFFIXES: &[&str] = &[".min.js", ".min.css", ".map"];

fn should_skip(path: &str, extra_dirs: &[String]) -> bool {
    if SKIP_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
        return true;
    }
    path.split('/')
        .any(|component| SKIP_DIRS.contains(&component) || extra_dirs.iter().any(|d| d == component))
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of one extraction run
#[derive(Debug)]
pub struct ExtractOutcome {
    pub context: RepositoryContext,
    /// Files freshly analyzed this run
    pub analyzed: usize,
    /// Files carried from the previous snapshot or the per-file cache
    pub reused: usize,
    /// Files that failed stat/read and were omitted
    pub failed: usize,
    /// Whether the run was cut short by cancellation
    pub cancelled: bool,
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct IndexEngine {
    host: Arc<ParserHost>,
    registry: Arc<QueryRegistry>,
    store: Arc<Store>,
    max_concurrency: usize,
    extra_skip_dirs: Vec<String>,
}

enum WorkerMsg {
    Fresh(FileContext),
    Cached(FileContext),
    Failed { path: String, error: String },
}

impl IndexEngine {
    pub fn new(store: Arc<Store>, config: &Config) -> Self {
        Self {
            host: Arc::new(ParserHost::new()),
            registry: Arc::new(QueryRegistry::new()),
            store,
            max_concurrency: config.concurrency(),
            extra_skip_dirs: config.ignore.dirs.clone(),
        }
    }

    /// Extract a repository snapshot for the given tracked files.
    ///
    /// Per-file failures never fail the run; they populate the snapshot's
    /// `errors`. Only aggregate-level failures return `Err`.
    pub fn extract(
        &self,
        root: &Path,
        name: &str,
        branch: &str,
        files: Vec<String>,
        force: bool,
        cancel: &CancelToken,
    ) -> Result<ExtractOutcome> {
        let files: Vec<String> = files
            .into_iter()
            .filter(|path| !should_skip(path, &self.extra_skip_dirs))
            .collect();

        let previous: Option<RepositoryContext> = self
            .store
            .get_json(&cache::repo_context_key(root))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Previous snapshot unreadable, treating as cold start");
                None
            });

        let mut errors: Vec<String> = Vec::new();
        let mut carried: BTreeMap<String, FileContext> = BTreeMap::new();
        let mut to_analyze: Vec<(String, DateTime<Utc>)> = Vec::new();
        let mut failed = 0usize;

        for path in &files {
            let mod_time: DateTime<Utc> = match std::fs::metadata(root.join(path))
                .and_then(|m| m.modified())
            {
                Ok(time) => time.into(),
                Err(e) => {
                    errors.push(format!("Failed to stat {}: {}", path, e));
                    failed += 1;
                    continue;
                }
            };

            if !force {
                if let Some(prev) = previous.as_ref().and_then(|p| p.files.get(path)) {
                    if prev.mod_time == mod_time {
                        carried.insert(path.clone(), prev.clone());
                        continue;
                    }
                }
            }
            to_analyze.push((path.clone(), mod_time));
        }

        let no_analysis_needed = to_analyze.is_empty();
        let stats = Arc::new(RwLock::new(LanguageStats::default()));
        let mut fresh: BTreeMap<String, FileContext> = BTreeMap::new();
        let mut analyzed = 0usize;
        let mut cache_hits = 0usize;

        if !no_analysis_needed {
            let (path_tx, path_rx) = bounded::<(String, DateTime<Utc>)>(1024);
            let (result_tx, result_rx) = unbounded::<WorkerMsg>();

            let worker_count = self.max_concurrency.min(to_analyze.len()).max(1);
            let mut handles = Vec::with_capacity(worker_count);

            for _ in 0..worker_count {
                let path_rx = path_rx.clone();
                let result_tx = result_tx.clone();
                let host = self.host.clone();
                let registry = self.registry.clone();
                let store = self.store.clone();
                let stats = stats.clone();
                let cancel = cancel.clone();
                let root: PathBuf = root.to_path_buf();

                handles.push(std::thread::spawn(move || {
                    let mut analyzer = FileAnalyzer::new(host, registry);

                    for (path, mod_time) in path_rx {
                        if cancel.is_cancelled() {
                            break;
                        }

                        let key = cache::file_context_key(&root, &path);
                        if !force {
                            let hit: Option<FileContext> =
                                store.get_json(&key).unwrap_or_default();
                            if let Some(ctx) = hit {
                                if ctx.mod_time == mod_time {
                                    let _ = result_tx.send(WorkerMsg::Cached(ctx));
                                    continue;
                                }
                            }
                        }

                        match analyzer.analyze(&root, &path, &cancel) {
                            Ok(ctx) => {
                                // Never write back a file from a cancelled pass
                                if !cancel.is_cancelled() {
                                    cache::set_json_logged(&store, &key, &ctx);
                                }
                                let _ = result_tx.send(WorkerMsg::Fresh(ctx));
                            }
                            Err(Error::Cancelled) => break,
                            Err(e) => {
                                let _ = result_tx.send(WorkerMsg::Failed {
                                    path,
                                    error: e.to_string(),
                                });
                            }
                        }
                    }

                    // Single merge per worker keeps the hot path lock-free
                    analyzer.stats().merge_into(&mut stats.write());
                }));
            }
            drop(path_rx);
            drop(result_tx);

            for item in to_analyze {
                if cancel.is_cancelled() {
                    break;
                }
                if path_tx.send(item).is_err() {
                    break;
                }
            }
            drop(path_tx);

            for msg in result_rx {
                match msg {
                    WorkerMsg::Fresh(ctx) => {
                        analyzed += 1;
                        fresh.insert(ctx.path.clone(), ctx);
                    }
                    WorkerMsg::Cached(ctx) => {
                        cache_hits += 1;
                        carried.insert(ctx.path.clone(), ctx);
                    }
                    WorkerMsg::Failed { path, error } => {
                        failed += 1;
                        errors.push(format!("Failed to analyze {}: {}", path, error));
                    }
                }
            }

            for handle in handles {
                let _ = handle.join();
            }
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            errors.push("Indexing cancelled before completion".to_string());
        }

        debug!(
            analyzed,
            carried = carried.len(),
            cache_hits,
            failed,
            "Extraction pass complete"
        );

        // Merge: fresh results are authoritative, carried entries fill the
        // rest, previous repo metadata rides through untouched.
        let mut context = RepositoryContext {
            name: name.to_string(),
            branch: branch.to_string(),
            ..RepositoryContext::default()
        };
        if let Some(prev) = &previous {
            context.description = prev.description.clone();
            context.url = prev.url.clone();
            context.visibility = prev.visibility.clone();
        }

        context.files = carried;
        context.files.append(&mut fresh);
        context.errors = errors;
        context.recompute_dependencies();

        if no_analysis_needed {
            if let Some(prev) = &previous {
                context.metrics = prev.metrics;
                context.languages = prev.languages.clone();
            } else {
                context.metrics.total_files = context.files.len();
                context.recompute_languages();
            }
        } else {
            context.metrics.total_files = context.files.len();
            context.metrics.total_lines = stats.read().lines_read;
            context.recompute_languages();
        }

        let reused = context.files.len().saturating_sub(analyzed);
        Ok(ExtractOutcome {
            context,
            analyzed,
            reused,
            failed,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SymbolKind;
    use crate::detect::LanguageTag;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn test_store(dir: &Path) -> Arc<Store> {
        Arc::new(
            Store::with_ttl(
                dir.join("cache"),
                Duration::from_secs(3600),
                Duration::from_secs(3600),
            )
            .unwrap(),
        )
    }

    fn engine(store: Arc<Store>) -> IndexEngine {
        IndexEngine::new(store, &Config::default())
    }

    fn go_repo() -> (TempDir, Vec<String>) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.go"), "package p\nfunc Foo(){}\n").unwrap();
        std::fs::write(
            dir.path().join("b.go"),
            "package p\nimport \"./a\"\nfunc Bar(){ Foo() }\n",
        )
        .unwrap();
        (dir, vec!["a.go".to_string(), "b.go".to_string()])
    }

    #[test]
    fn test_cold_index_two_file_go_repo() {
        let (dir, files) = go_repo();
        let store = test_store(dir.path());
        let outcome = engine(store)
            .extract(dir.path(), "p", "main", files, false, &CancelToken::new())
            .unwrap();

        assert_eq!(outcome.analyzed, 2);
        assert_eq!(outcome.failed, 0);
        let ctx = &outcome.context;
        assert_eq!(ctx.files.len(), 2);

        let a = &ctx.files["a.go"];
        assert_eq!(a.symbols.len(), 1);
        assert_eq!(a.symbols[0].name, "Foo");
        assert_eq!(a.symbols[0].kind, SymbolKind::Function);

        let b = &ctx.files["b.go"];
        assert_eq!(b.symbols[0].name, "Bar");
        assert_eq!(b.imports, vec!["./a".to_string()]);

        assert_eq!(ctx.dependencies, vec!["./a".to_string()]);
        assert_eq!(ctx.languages.primary, Some(LanguageTag::Go));
        assert_eq!(ctx.metrics.total_files, 2);
        assert!(ctx.metrics.total_lines >= 5);
    }

    #[test]
    fn test_incremental_noop_preserves_everything() {
        let (dir, files) = go_repo();
        let store = test_store(dir.path());
        let engine = engine(store.clone());

        let first = engine
            .extract(dir.path(), "p", "main", files.clone(), false, &CancelToken::new())
            .unwrap();
        store
            .set_json(&cache::repo_context_key(dir.path()), &first.context)
            .unwrap();

        let second = engine
            .extract(dir.path(), "p", "main", files, false, &CancelToken::new())
            .unwrap();

        assert_eq!(second.analyzed, 0);
        assert_eq!(second.reused, 2);
        assert_eq!(second.context.files, first.context.files);
        assert_eq!(second.context.metrics, first.context.metrics);
        assert_eq!(second.context.languages, first.context.languages);
    }

    #[test]
    fn test_incremental_targeted_reanalyzes_only_touched_file() {
        let (dir, files) = go_repo();
        let store = test_store(dir.path());
        let engine = engine(store.clone());

        let first = engine
            .extract(dir.path(), "p", "main", files.clone(), false, &CancelToken::new())
            .unwrap();
        store
            .set_json(&cache::repo_context_key(dir.path()), &first.context)
            .unwrap();

        // Cross the coarsest mtime granularity before touching the file
        std::thread::sleep(Duration::from_millis(1100));
        std::fs::write(
            dir.path().join("b.go"),
            "package p\nimport \"./a\"\nfunc Bar(){}\nfunc Baz(){}\n",
        )
        .unwrap();

        let second = engine
            .extract(dir.path(), "p", "main", files, false, &CancelToken::new())
            .unwrap();

        assert_eq!(second.analyzed, 1);
        assert_eq!(second.reused, 1);
        assert_eq!(
            second.context.files["a.go"].updated_at,
            first.context.files["a.go"].updated_at
        );
        assert!(second.context.files["b.go"].updated_at > first.context.files["b.go"].updated_at);
        assert_eq!(second.context.files["b.go"].symbols.len(), 2);
    }

    #[test]
    fn test_force_reanalyzes_all() {
        let (dir, files) = go_repo();
        let store = test_store(dir.path());
        let engine = engine(store.clone());

        let first = engine
            .extract(dir.path(), "p", "main", files.clone(), false, &CancelToken::new())
            .unwrap();
        store
            .set_json(&cache::repo_context_key(dir.path()), &first.context)
            .unwrap();

        let second = engine
            .extract(dir.path(), "p", "main", files, true, &CancelToken::new())
            .unwrap();

        assert_eq!(second.analyzed, 2);
        for path in ["a.go", "b.go"] {
            assert!(second.context.files[path].updated_at > first.context.files[path].updated_at);
        }
    }

    #[test]
    fn test_deleted_path_is_dropped() {
        let (dir, files) = go_repo();
        let store = test_store(dir.path());
        let engine = engine(store.clone());

        let first = engine
            .extract(dir.path(), "p", "main", files, false, &CancelToken::new())
            .unwrap();
        store
            .set_json(&cache::repo_context_key(dir.path()), &first.context)
            .unwrap();

        std::fs::remove_file(dir.path().join("b.go")).unwrap();
        let second = engine
            .extract(
                dir.path(),
                "p",
                "main",
                vec!["a.go".to_string()],
                false,
                &CancelToken::new(),
            )
            .unwrap();

        assert!(!second.context.files.contains_key("b.go"));
        assert_eq!(second.context.files.len(), 1);
        assert!(second.context.dependencies.is_empty());
    }

    #[test]
    fn test_skip_lists_filter_before_workers() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x()").unwrap();
        std::fs::write(dir.path().join("app.min.js"), "x()").unwrap();
        std::fs::write(dir.path().join("main.js"), "function main() {}\n").unwrap();

        let store = test_store(dir.path());
        let outcome = engine(store)
            .extract(
                dir.path(),
                "p",
                "main",
                vec![
                    "node_modules/pkg/index.js".to_string(),
                    "app.min.js".to_string(),
                    "main.js".to_string(),
                ],
                false,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(outcome.context.files.len(), 1);
        assert!(outcome.context.files.contains_key("main.js"));
    }

    #[test]
    fn test_stat_failure_omits_file_but_continues() {
        let (dir, mut files) = go_repo();
        files.push("ghost.go".to_string());

        let store = test_store(dir.path());
        let outcome = engine(store)
            .extract(dir.path(), "p", "main", files, false, &CancelToken::new())
            .unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.context.files.len(), 2);
        assert!(outcome
            .context
            .errors
            .iter()
            .any(|e| e.starts_with("Failed to stat ghost.go")));
    }

    #[test]
    fn test_cancelled_run_reports_diagnostic() {
        let (dir, files) = go_repo();
        let store = test_store(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = engine(store)
            .extract(dir.path(), "p", "main", files, false, &cancel)
            .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome
            .context
            .errors
            .iter()
            .any(|e| e.contains("cancelled")));
        assert_eq!(outcome.analyzed, 0);
    }

    #[test]
    fn test_worker_cache_hit_requires_matching_mod_time() {
        let (dir, files) = go_repo();
        let store = test_store(dir.path());
        let engine = engine(store.clone());

        // Populate the per-file cache without a repo snapshot
        let first = engine
            .extract(dir.path(), "p", "main", files.clone(), false, &CancelToken::new())
            .unwrap();
        assert_eq!(first.analyzed, 2);

        // No snapshot stored: the engine-level reuse cannot trigger, but
        // the worker-level cache check can
        let second = engine
            .extract(dir.path(), "p", "main", files, false, &CancelToken::new())
            .unwrap();
        assert_eq!(second.analyzed, 0);
        assert_eq!(second.reused, 2);
    }

    #[test]
    fn test_should_skip_table() {
        assert!(should_skip("node_modules/a.js", &[]));
        assert!(should_skip("pkg/vendor/lib.go", &[]));
        assert!(should_skip("bundle.min.js", &[]));
        assert!(should_skip("styles.min.css", &[]));
        assert!(should_skip("app.js.map", &[]));
        assert!(!should_skip("src/main.rs", &[]));
        assert!(should_skip("generated/x.rs", &["generated".to_string()]));
    }
}
