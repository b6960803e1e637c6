//! Bounded graph queries
//!
//! Breadth-first walks over the dependency graph and the two-section
//! context string handed to prompt construction.

use super::{file_identity, DependencyGraph, EdgeKind, GraphNode};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Cap on file lines in the formatted context
const MAX_CONTEXT_FILES: usize = 10;
/// Cap on symbol lines in the formatted context
const MAX_CONTEXT_SYMBOLS: usize = 15;

/// A symbol surfaced by a graph query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedSymbol {
    pub name: String,
    pub kind: crate::context::SymbolKind,
    pub file_path: String,
    pub start_line: u32,
}

/// Related files and symbols for a set of start paths
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextSummary {
    pub related_files: Vec<String>,
    pub symbols: Vec<RelatedSymbol>,
}

impl DependencyGraph {
    /// Collect every file node within `max_depth` outgoing hops of the
    /// start paths, in visit order. Start files themselves are included
    /// when present in the graph.
    pub fn find_related_files(&self, start_paths: &[String], max_depth: usize) -> Vec<String> {
        let mut visited: HashSet<u32> = HashSet::new();
        let mut queue: VecDeque<(u32, usize)> = VecDeque::new();
        let mut result = Vec::new();

        for path in start_paths {
            if let Some(id) = self.node_id(&file_identity(path)) {
                if visited.insert(id) {
                    queue.push_back((id, 0));
                }
            }
        }

        while let Some((id, depth)) = queue.pop_front() {
            if let Some(GraphNode::File { path }) = self.node(id) {
                result.push(path.clone());
            }
            if depth >= max_depth {
                continue;
            }
            for edge in self.edges_from(id) {
                if visited.insert(edge.to) {
                    queue.push_back((edge.to, depth + 1));
                }
            }
        }

        result
    }

    /// Collect symbols reachable within `max_depth`: the `Defines`
    /// children of every visited file node, plus any symbol node visited
    /// directly. Deduplicated by node id.
    pub fn find_related_symbols(&self, start_paths: &[String], max_depth: usize) -> Vec<RelatedSymbol> {
        let mut visited: HashSet<u32> = HashSet::new();
        let mut emitted: HashSet<u32> = HashSet::new();
        let mut queue: VecDeque<(u32, usize)> = VecDeque::new();
        let mut result = Vec::new();

        for path in start_paths {
            if let Some(id) = self.node_id(&file_identity(path)) {
                if visited.insert(id) {
                    queue.push_back((id, 0));
                }
            }
        }

        while let Some((id, depth)) = queue.pop_front() {
            match self.node(id) {
                Some(GraphNode::File { .. }) => {
                    for edge in self.edges_from(id) {
                        if edge.kind != EdgeKind::Defines {
                            continue;
                        }
                        if emitted.insert(edge.to) {
                            if let Some(symbol) = self.related_symbol(edge.to) {
                                result.push(symbol);
                            }
                        }
                    }
                }
                Some(GraphNode::Symbol { .. }) => {
                    if emitted.insert(id) {
                        if let Some(symbol) = self.related_symbol(id) {
                            result.push(symbol);
                        }
                    }
                }
                None => {}
            }

            if depth >= max_depth {
                continue;
            }
            for edge in self.edges_from(id) {
                if visited.insert(edge.to) {
                    queue.push_back((edge.to, depth + 1));
                }
            }
        }

        result
    }

    /// Related files (minus the inputs) plus key symbols for the combined
    /// file set, as structured data
    pub fn related_context(&self, files: &[String], max_depth: usize) -> ContextSummary {
        let inputs: HashSet<&String> = files.iter().collect();
        let related_files: Vec<String> = self
            .find_related_files(files, max_depth)
            .into_iter()
            .filter(|path| !inputs.contains(path))
            .collect();

        let mut combined = files.to_vec();
        combined.extend(related_files.iter().cloned());
        let symbols = self.find_related_symbols(&combined, 2);

        ContextSummary {
            related_files,
            symbols,
        }
    }

    /// Format the two-section context string for prompt inclusion.
    ///
    /// Empty sections are omitted; when both are empty the result is the
    /// empty string. Overflow beyond the caps renders as one summary line
    /// per section.
    pub fn context_for_files(&self, files: &[String], max_depth: usize) -> String {
        let summary = self.related_context(files, max_depth);
        if summary.related_files.is_empty() && summary.symbols.is_empty() {
            return String::new();
        }

        let mut out = String::new();

        if !summary.related_files.is_empty() {
            out.push_str("Related files (via imports):\n");
            for path in summary.related_files.iter().take(MAX_CONTEXT_FILES) {
                out.push_str(&format!("- {path}\n"));
            }
            if summary.related_files.len() > MAX_CONTEXT_FILES {
                out.push_str(&format!(
                    "... and {} more\n",
                    summary.related_files.len() - MAX_CONTEXT_FILES
                ));
            }
        }

        if !summary.symbols.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Key symbols found in changed/related files:\n");
            for symbol in summary.symbols.iter().take(MAX_CONTEXT_SYMBOLS) {
                let basename = symbol
                    .file_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&symbol.file_path);
                out.push_str(&format!(
                    "- {} {} ({}:{})\n",
                    symbol.kind, symbol.name, basename, symbol.start_line
                ));
            }
            if summary.symbols.len() > MAX_CONTEXT_SYMBOLS {
                out.push_str(&format!(
                    "... and {} more\n",
                    summary.symbols.len() - MAX_CONTEXT_SYMBOLS
                ));
            }
        }

        out
    }

    fn related_symbol(&self, id: u32) -> Option<RelatedSymbol> {
        match self.node(id)? {
            GraphNode::Symbol {
                name,
                kind,
                start_line,
                file_path,
                ..
            } => Some(RelatedSymbol {
                name: name.clone(),
                kind: *kind,
                file_path: file_path.clone(),
                start_line: *start_line,
            }),
            GraphNode::File { .. } => None,
        }
    }
}
