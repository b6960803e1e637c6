//! Dependency graph
//!
//! Directed graph over file and symbol nodes with `Defines` (file ->
//! symbol) and `Imports` (file -> file) edges. Nodes live in an arena
//! indexed by integer ids; identity lookup and adjacency are rebuilt from
//! the node/edge tables after deserialization, so the persisted form is
//! just the two tables. Rebuilt from scratch on every indexing run.

pub mod query;

use crate::context::{RepositoryContext, SymbolKind};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::collections::HashMap;

// =============================================================================
// NODES AND EDGES
// =============================================================================

/// A node: a file, or a symbol defined in one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GraphNode {
    File {
        path: String,
    },
    Symbol {
        name: String,
        kind: SymbolKind,
        start_line: u32,
        end_line: u32,
        file_path: String,
    },
}

impl GraphNode {
    /// Canonical string identity. The start line disambiguates overloads
    /// declared in the same file.
    pub fn identity(&self) -> String {
        match self {
            Self::File { path } => format!("file:{path}"),
            Self::Symbol {
                name,
                file_path,
                start_line,
                ..
            } => format!("symbol:{file_path}#{name}@{start_line}"),
        }
    }

}

/// Identity string for a file path without building a node
pub fn file_identity(path: &str) -> String {
    format!("file:{path}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Defines,
    Imports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: u32,
    pub to: u32,
    pub kind: EdgeKind,
}

// =============================================================================
// GRAPH
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Identity -> node id; rebuilt after load
    #[serde(skip)]
    id_by_identity: HashMap<CompactString, u32>,
    /// Outgoing edge indices per node; rebuilt after load
    #[serde(skip)]
    outgoing: Vec<SmallVec<[u32; 4]>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent node insertion keyed on string identity; assigns a fresh
    /// integer id on first creation
    pub fn get_or_create(&mut self, node: GraphNode) -> u32 {
        let identity = CompactString::new(node.identity());
        if let Some(&id) = self.id_by_identity.get(&identity) {
            return id;
        }
        let id = self.nodes.len() as u32;
        self.nodes.push(node);
        self.outgoing.push(SmallVec::new());
        self.id_by_identity.insert(identity, id);
        id
    }

    /// Add an edge between existing nodes; duplicates are ignored
    pub fn add_edge(&mut self, from: u32, to: u32, kind: EdgeKind) {
        let exists = self.outgoing[from as usize]
            .iter()
            .any(|&i| self.edges[i as usize].to == to && self.edges[i as usize].kind == kind);
        if exists {
            return;
        }
        let idx = self.edges.len() as u32;
        self.edges.push(GraphEdge { from, to, kind });
        self.outgoing[from as usize].push(idx);
    }

    pub fn node(&self, id: u32) -> Option<&GraphNode> {
        self.nodes.get(id as usize)
    }

    pub fn node_id(&self, identity: &str) -> Option<u32> {
        self.id_by_identity.get(identity).copied()
    }

    /// Outgoing edges of a node
    pub fn edges_from(&self, id: u32) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.outgoing
            .get(id as usize)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i as usize])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Repopulate identity lookup and adjacency from the node/edge tables.
    /// Call after deserializing a persisted graph.
    pub fn rebuild_lookups(&mut self) {
        self.id_by_identity.clear();
        self.outgoing.clear();
        self.outgoing.resize(self.nodes.len(), SmallVec::new());

        for (id, node) in self.nodes.iter().enumerate() {
            self.id_by_identity
                .insert(CompactString::new(node.identity()), id as u32);
        }
        for (idx, edge) in self.edges.iter().enumerate() {
            if let Some(adj) = self.outgoing.get_mut(edge.from as usize) {
                adj.push(idx as u32);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Build a fresh graph from a repository snapshot.
    ///
    /// Pass 1 creates file nodes and their `Defines` edges; pass 2 runs
    /// the lexical import resolver and adds `Imports` edges for resolved
    /// targets. Unresolved imports produce no edge and no error.
    pub fn build(repo: &RepositoryContext) -> Self {
        let mut graph = Self::new();

        for (path, file) in &repo.files {
            let file_id = graph.get_or_create(GraphNode::File { path: path.clone() });
            for symbol in &file.symbols {
                let symbol_id = graph.get_or_create(GraphNode::Symbol {
                    name: symbol.name.clone(),
                    kind: symbol.kind,
                    start_line: symbol.start_line,
                    end_line: symbol.end_line,
                    file_path: symbol.file_path.clone(),
                });
                graph.add_edge(file_id, symbol_id, EdgeKind::Defines);
            }
        }

        for (path, file) in &repo.files {
            let from = graph.get_or_create(GraphNode::File { path: path.clone() });
            for import in &file.imports {
                if let Some(target) = resolve_import(&repo.files, path, import) {
                    if target != *path {
                        let to = graph.get_or_create(GraphNode::File { path: target });
                        graph.add_edge(from, to, EdgeKind::Imports);
                    }
                }
            }
        }

        graph
    }
}

// =============================================================================
// IMPORT RESOLUTION
// =============================================================================

/// Lexical import resolution, deliberately conservative:
/// (a) exact key match wins; (b) `.`-relative imports are cleaned against
/// the importing file's directory and retried, with the importer's own
/// extension as a completion; (c) the import is tried verbatim as a key.
/// Ecosystem-specific resolution is out of scope.
fn resolve_import<V>(files: &BTreeMap<String, V>, from_path: &str, import: &str) -> Option<String> {
    if files.contains_key(import) {
        return Some(import.to_string());
    }

    if import.starts_with('.') {
        let dir = match from_path.rfind('/') {
            Some(pos) => &from_path[..pos],
            None => "",
        };
        let joined = if dir.is_empty() {
            import.to_string()
        } else {
            format!("{dir}/{import}")
        };
        let cleaned = clean_path(&joined);

        if files.contains_key(&cleaned) {
            return Some(cleaned);
        }
        // Extensionless relative imports: complete with the importer's own
        if let Some(ext) = from_path.rsplit('.').next().filter(|e| *e != from_path) {
            let candidate = format!("{cleaned}.{ext}");
            if files.contains_key(&candidate) {
                return Some(candidate);
            }
        }
    }

    None
}

/// Normalize separators and collapse `.`/`..` components
fn clean_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let mut stack: Vec<&str> = Vec::new();
    for component in normalized.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FileContext, SymbolContext};
    use crate::detect::LanguageTag;
    use chrono::Utc;

    fn file(path: &str, symbols: &[(&str, SymbolKind, u32)], imports: &[&str]) -> FileContext {
        FileContext {
            path: path.into(),
            language: LanguageTag::Go,
            symbols: symbols
                .iter()
                .map(|(name, kind, line)| SymbolContext {
                    name: name.to_string(),
                    kind: *kind,
                    start_line: *line,
                    end_line: *line + 1,
                    file_path: path.to_string(),
                })
                .collect(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            lines: 10,
            updated_at: Utc::now(),
            mod_time: Utc::now(),
            errors: Vec::new(),
        }
    }

    fn two_file_repo() -> RepositoryContext {
        let mut repo = RepositoryContext::default();
        repo.files.insert(
            "a.go".into(),
            file("a.go", &[("Foo", SymbolKind::Function, 2)], &[]),
        );
        repo.files.insert(
            "b.go".into(),
            file("b.go", &[("Bar", SymbolKind::Function, 3)], &["./a"]),
        );
        repo
    }

    #[test]
    fn test_build_two_file_go_repo() {
        let graph = DependencyGraph::build(&two_file_repo());
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);

        let a = graph.node_id("file:a.go").unwrap();
        let b = graph.node_id("file:b.go").unwrap();
        let foo = graph.node_id("symbol:a.go#Foo@2").unwrap();
        let bar = graph.node_id("symbol:b.go#Bar@3").unwrap();

        let edges_from = |id| {
            graph
                .edges_from(id)
                .map(|e| (e.to, e.kind))
                .collect::<Vec<_>>()
        };
        assert!(edges_from(a).contains(&(foo, EdgeKind::Defines)));
        assert!(edges_from(b).contains(&(bar, EdgeKind::Defines)));
        assert!(edges_from(b).contains(&(a, EdgeKind::Imports)));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let first = graph.get_or_create(GraphNode::File { path: "x.rs".into() });
        let second = graph.get_or_create(GraphNode::File { path: "x.rs".into() });
        assert_eq!(first, second);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = DependencyGraph::new();
        let a = graph.get_or_create(GraphNode::File { path: "a".into() });
        let b = graph.get_or_create(GraphNode::File { path: "b".into() });
        graph.add_edge(a, b, EdgeKind::Imports);
        graph.add_edge(a, b, EdgeKind::Imports);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_unresolved_import_adds_no_edge() {
        let mut repo = two_file_repo();
        repo.files.get_mut("b.go").unwrap().imports = vec!["github.com/elsewhere/pkg".into()];
        let graph = DependencyGraph::build(&repo);
        let b = graph.node_id("file:b.go").unwrap();
        assert!(!graph.edges_from(b).any(|e| e.kind == EdgeKind::Imports));
    }

    #[test]
    fn test_relative_resolution_cleans_dots() {
        let mut files = BTreeMap::new();
        files.insert("src/util.ts".to_string(), ());
        files.insert("src/deep/mod.ts".to_string(), ());
        assert_eq!(
            resolve_import(&files, "src/deep/mod.ts", "../util.ts"),
            Some("src/util.ts".into())
        );
        assert_eq!(
            resolve_import(&files, "src/deep/mod.ts", "../util"),
            Some("src/util.ts".into())
        );
        assert_eq!(resolve_import(&files, "src/deep/mod.ts", "../gone"), None);
    }

    #[test]
    fn test_exact_key_match_wins() {
        let mut files = BTreeMap::new();
        files.insert("vendor/lib.rs".to_string(), ());
        assert_eq!(
            resolve_import(&files, "main.rs", "vendor/lib.rs"),
            Some("vendor/lib.rs".into())
        );
    }

    #[test]
    fn test_serde_roundtrip_with_rebuild() {
        let graph = DependencyGraph::build(&two_file_repo());
        let json = serde_json::to_vec(&graph).unwrap();
        let mut loaded: DependencyGraph = serde_json::from_slice(&json).unwrap();
        loaded.rebuild_lookups();

        assert_eq!(loaded.node_count(), graph.node_count());
        assert_eq!(loaded.edge_count(), graph.edge_count());
        let b = loaded.node_id("file:b.go").unwrap();
        let a = loaded.node_id("file:a.go").unwrap();
        assert!(loaded
            .edges_from(b)
            .any(|e| e.to == a && e.kind == EdgeKind::Imports));
    }
}
