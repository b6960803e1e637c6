//! repoctx - repository context indexing for AI prompt construction
//!
//! Walks a git-tracked source tree, parses every supported file with
//! tree-sitter, extracts a normalized inventory of symbols and imports,
//! persists the result to a local TTL'd cache, and exposes a queryable
//! dependency graph used by downstream prompt-construction code.

pub mod cache;
pub mod cli;
pub mod context;
pub mod core;
pub mod detect;
pub mod engine;
pub mod extract;
pub mod graph;
pub mod indexer;

pub use core::config::Config;
pub use core::error::{Error, Result};
pub use core::repo::GitRepo;
pub use indexer::Indexer;
