//! Per-file analyzer
//!
//! Turns one repo-relative path into a `FileContext`: stat, read, detect,
//! parse, run the symbol and import queries, normalize. Stat and read
//! failures are fatal for the file; everything downstream degrades to a
//! diagnostic on the context so the file still appears in the index with
//! whatever fields succeeded.

use crate::context::{FileContext, SymbolContext};
use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result};
use crate::detect::{self, LanguageTag};
use crate::extract::host::ParserHost;
use crate::extract::imports::ImportSet;
use crate::extract::queries::{kind_for_capture, QueryKind, QueryRegistry, IMPORT_PATH_CAPTURE};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Query, Tree};

// =============================================================================
// PER-WORKER STATISTICS
// =============================================================================

/// Language statistics accumulated privately per analyzer instance.
///
/// Workers merge these into the shared aggregate exactly once, at
/// shutdown, keeping the hot path contention-free.
#[derive(Debug, Clone, Default)]
pub struct LanguageStats {
    /// Files analyzed per detected language
    pub files_by_language: HashMap<LanguageTag, usize>,
    /// Total files analyzed by this instance
    pub files_analyzed: usize,
    /// Total source lines read by this instance
    pub lines_read: usize,
}

impl LanguageStats {
    fn record(&mut self, language: &LanguageTag, lines: usize) {
        *self.files_by_language.entry(language.clone()).or_default() += 1;
        self.files_analyzed += 1;
        self.lines_read += lines;
    }

    /// Fold this instance's counts into a shared aggregate
    pub fn merge_into(&self, aggregate: &mut LanguageStats) {
        for (language, count) in &self.files_by_language {
            *aggregate.files_by_language.entry(language.clone()).or_default() += count;
        }
        aggregate.files_analyzed += self.files_analyzed;
        aggregate.lines_read += self.lines_read;
    }
}

// =============================================================================
// ANALYZER
// =============================================================================

pub struct FileAnalyzer {
    host: Arc<ParserHost>,
    registry: Arc<QueryRegistry>,
    stats: LanguageStats,
}

impl FileAnalyzer {
    pub fn new(host: Arc<ParserHost>, registry: Arc<QueryRegistry>) -> Self {
        Self {
            host,
            registry,
            stats: LanguageStats::default(),
        }
    }

    /// Statistics accumulated by this instance so far
    pub fn stats(&self) -> &LanguageStats {
        &self.stats
    }

    /// Analyze one file into a `FileContext`.
    ///
    /// `Err` is reserved for stat/read failures and cancellation; analysis
    /// problems land in the returned context's `errors`.
    pub fn analyze(&mut self, root: &Path, rel_path: &str, cancel: &CancelToken) -> Result<FileContext> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let abs = root.join(rel_path);
        let mod_time: DateTime<Utc> = std::fs::metadata(&abs)?.modified()?.into();
        let bytes = std::fs::read(&abs)?;

        let language = detect::detect(Path::new(rel_path), &bytes);
        let lines = count_lines(&bytes);
        self.stats.record(&language, lines);

        let grammar = match self.host.get_language(&language) {
            Some(grammar) => grammar,
            // No grammar: keep the path in the index without deep analysis
            None => {
                return Ok(FileContext::basic(rel_path.to_string(), language, mod_time, lines));
            }
        };

        let mut errors = Vec::new();

        let mut parser = self.host.parser();
        if let Err(e) = parser.set_language(&grammar) {
            errors.push(format!("Parser rejected {} grammar: {}", language, e));
            let mut ctx = FileContext::basic(rel_path.to_string(), language, mod_time, lines);
            ctx.errors = errors;
            return Ok(ctx);
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let tree = parser.parse(&bytes, None);
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let Some(tree) = tree else {
            errors.push(format!("Failed to parse file {}", rel_path));
            let mut ctx = FileContext::basic(rel_path.to_string(), language, mod_time, lines);
            ctx.errors = errors;
            return Ok(ctx);
        };

        if tree.root_node().has_error() {
            errors.push(format!("Syntax error in file {}", rel_path));
        }

        let symbols = match self.registry.get(&grammar, QueryKind::Symbols, &language) {
            Ok(Some(query)) => self.run_symbol_query(&tree, &bytes, &query, rel_path),
            Ok(None) => Vec::new(),
            Err(e) => {
                errors.push(e.to_string());
                Vec::new()
            }
        };

        let imports = match self.registry.get(&grammar, QueryKind::Imports, &language) {
            Ok(Some(query)) => self.run_import_query(&tree, &bytes, &query),
            Ok(None) => ImportSet::new(),
            Err(e) => {
                errors.push(e.to_string());
                ImportSet::new()
            }
        };

        Ok(FileContext {
            path: rel_path.to_string(),
            language,
            symbols,
            imports: imports.into_vec(),
            lines,
            updated_at: Utc::now(),
            mod_time,
            errors,
        })
    }

    /// Run the symbol query over the tree root.
    ///
    /// For each match, the first capture whose name is in the capture
    /// table supplies the kind and name; the span comes from the primary
    /// (widest) match node so nested name captures still report the full
    /// construct.
    fn run_symbol_query(
        &self,
        tree: &Tree,
        source: &[u8],
        query: &Query,
        rel_path: &str,
    ) -> Vec<SymbolContext> {
        let mut symbols = Vec::new();
        let mut cursor = self.host.cursor();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            let Some(primary) = m
                .captures
                .iter()
                .min_by_key(|c| (c.node.start_byte(), std::cmp::Reverse(c.node.end_byte())))
            else {
                continue;
            };
            let start_line = primary.node.start_position().row as u32 + 1;
            let end_line = primary.node.end_position().row as u32 + 1;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                let Some(kind) = kind_for_capture(capture_name) else {
                    continue;
                };
                if let Ok(text) = capture.node.utf8_text(source) {
                    if !text.is_empty() {
                        symbols.push(SymbolContext {
                            name: text.to_string(),
                            kind,
                            start_line,
                            end_line,
                            file_path: rel_path.to_string(),
                        });
                    }
                }
                break;
            }
        }

        symbols
    }

    /// Run the import query, keeping the first occurrence of each distinct
    /// normalized path
    fn run_import_query(&self, tree: &Tree, source: &[u8], query: &Query) -> ImportSet {
        let mut imports = ImportSet::new();
        let mut cursor = self.host.cursor();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                if capture_name != IMPORT_PATH_CAPTURE {
                    continue;
                }
                if let Ok(text) = capture.node.utf8_text(source) {
                    imports.insert_raw(text);
                }
            }
        }

        imports
    }
}

fn count_lines(bytes: &[u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|&&b| b == b'\n').count();
    if bytes.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}
