//! Parser host
//!
//! Owns the per-language grammar handles and two thread-safe pools, one of
//! parsers and one of query cursors. Grammars load lazily through a
//! registered loader table; the handle cache sits behind a reader/writer
//! lock with a double-checked lookup so the common path takes only the
//! read lock. Pool acquisition yields exclusive ownership until the guard
//! drops, at which point the instance returns for reuse by another worker.

use crate::detect::LanguageTag;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use tree_sitter::{Language, Parser, QueryCursor};

// =============================================================================
// GRAMMAR LOADERS
// =============================================================================

type GrammarLoader = fn() -> Language;

/// Loader table; adding a language is a data change here plus a query
/// registration in the registry.
fn loader_for(tag: &LanguageTag) -> Option<GrammarLoader> {
    let loader: GrammarLoader = match tag {
        LanguageTag::Go => || tree_sitter_go::LANGUAGE.into(),
        LanguageTag::JavaScript => || tree_sitter_javascript::LANGUAGE.into(),
        LanguageTag::TypeScript => || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        LanguageTag::Tsx => || tree_sitter_typescript::LANGUAGE_TSX.into(),
        LanguageTag::Python => || tree_sitter_python::LANGUAGE.into(),
        LanguageTag::Rust => || tree_sitter_rust::LANGUAGE.into(),
        LanguageTag::Java => || tree_sitter_java::LANGUAGE.into(),
        LanguageTag::Cpp => || tree_sitter_cpp::LANGUAGE.into(),
        _ => return None,
    };
    Some(loader)
}

// =============================================================================
// RESOURCE POOL
// =============================================================================

/// Unbounded acquire/release pool over a crossbeam channel.
///
/// Empty pool creates a fresh instance; released instances queue for the
/// next acquirer. No lock is held while an instance is in use.
struct Pool<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    make: fn() -> T,
}

impl<T> Pool<T> {
    fn new(make: fn() -> T) -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx, make }
    }

    fn acquire(&self) -> PoolGuard<T> {
        let item = self.rx.try_recv().unwrap_or_else(|_| (self.make)());
        PoolGuard {
            item: Some(item),
            slot: self.tx.clone(),
        }
    }
}

/// Exclusive handle to a pooled instance; returns it to the pool on drop
pub struct PoolGuard<T> {
    item: Option<T>,
    slot: Sender<T>,
}

impl<T> Deref for PoolGuard<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled item present until drop")
    }
}

impl<T> DerefMut for PoolGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled item present until drop")
    }
}

impl<T> Drop for PoolGuard<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            // Receiver gone means the host is shutting down; let it drop
            let _ = self.slot.send(item);
        }
    }
}

// =============================================================================
// PARSER HOST
// =============================================================================

pub struct ParserHost {
    languages: RwLock<HashMap<LanguageTag, Language>>,
    parsers: Pool<Parser>,
    cursors: Pool<QueryCursor>,
}

impl ParserHost {
    pub fn new() -> Self {
        Self {
            languages: RwLock::new(HashMap::new()),
            parsers: Pool::new(Parser::new),
            cursors: Pool::new(QueryCursor::new),
        }
    }

    /// Get the grammar handle for a tag, loading it on first use.
    ///
    /// Returns `None` for tags without a registered loader; those files
    /// receive basic (path-only) analysis.
    pub fn get_language(&self, tag: &LanguageTag) -> Option<Language> {
        if let Some(language) = self.languages.read().get(tag) {
            return Some(language.clone());
        }

        let loader = loader_for(tag)?;
        let mut languages = self.languages.write();
        // Double-checked: a racing worker may have loaded it already
        if let Some(language) = languages.get(tag) {
            return Some(language.clone());
        }
        let language = loader();
        languages.insert(tag.clone(), language.clone());
        Some(language)
    }

    /// Acquire a pooled parser. The caller sets the language per file.
    pub fn parser(&self) -> PoolGuard<Parser> {
        self.parsers.acquire()
    }

    /// Acquire a pooled query cursor
    pub fn cursor(&self) -> PoolGuard<QueryCursor> {
        self.cursors.acquire()
    }
}

impl Default for ParserHost {
    fn default() -> Self {
        Self::new()
    }
}
