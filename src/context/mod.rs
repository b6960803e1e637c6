//! Core data structures for the repository index
//!
//! Per-file extraction results and the repository-wide snapshot they merge
//! into. Everything here round-trips through serde; the cache persists
//! these shapes as JSON.

use crate::detect::LanguageTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// SYMBOL KIND
// =============================================================================

/// Uniform symbol taxonomy across all languages.
///
/// Language-specific capture names are projected onto this closed set by
/// the query registry's capture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Enum,
    Type,
    Variable,
    Constant,
    Field,
    Module,
    Modifier,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Type => "type",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Field => "field",
            Self::Module => "module",
            Self::Modifier => "modifier",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// SYMBOL CONTEXT
// =============================================================================

/// A single extracted symbol definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolContext {
    /// Symbol name, never empty
    pub name: String,
    pub kind: SymbolKind,
    /// Starting line, 1-indexed; spans the full construct
    pub start_line: u32,
    /// Ending line, 1-indexed; `end_line >= start_line`
    pub end_line: u32,
    /// Repo-relative path of the defining file
    pub file_path: String,
}

// =============================================================================
// FILE CONTEXT
// =============================================================================

/// Extraction result for one repo-relative path.
///
/// `mod_time` is the stat result at analysis time and is the comparison key
/// for incremental reuse; `updated_at` is the analysis instant and exists
/// only for observability. The two are never interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContext {
    pub path: String,
    pub language: LanguageTag,
    #[serde(default)]
    pub symbols: Vec<SymbolContext>,
    /// Normalized imports, first-seen order, no duplicates
    #[serde(default)]
    pub imports: Vec<String>,
    /// Source lines counted at analysis; zero for an empty file
    #[serde(default)]
    pub lines: usize,
    pub updated_at: DateTime<Utc>,
    pub mod_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl FileContext {
    /// A path-only context for files without deep analysis support
    pub fn basic(path: String, language: LanguageTag, mod_time: DateTime<Utc>, lines: usize) -> Self {
        Self {
            path,
            language,
            symbols: Vec::new(),
            imports: Vec::new(),
            lines,
            updated_at: Utc::now(),
            mod_time,
            errors: Vec::new(),
        }
    }
}

// =============================================================================
// REPOSITORY CONTEXT
// =============================================================================

/// Language aggregate: the dominant language plus the rest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageBreakdown {
    /// Language with the most files, excluding plain-text tags
    pub primary: Option<LanguageTag>,
    /// Remaining languages, sorted by descending file count
    #[serde(default)]
    pub others: Vec<LanguageTag>,
}

/// Run-level metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_files: usize,
    pub total_lines: usize,
}

/// Repository-wide snapshot, replaced atomically per indexing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryContext {
    pub name: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Repo-relative path -> per-file context; BTreeMap for stable order
    #[serde(default)]
    pub files: BTreeMap<String, FileContext>,
    /// Union of all files' imports, deduplicated, sorted
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub languages: LanguageBreakdown,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RepositoryContext {
    /// Recompute `dependencies` as the deduplicated union of file imports
    pub fn recompute_dependencies(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let mut deps = Vec::new();
        for file in self.files.values() {
            for import in &file.imports {
                if seen.insert(import.clone()) {
                    deps.push(import.clone());
                }
            }
        }
        deps.sort();
        self.dependencies = deps;
    }

    /// Recompute the language breakdown from the current file map.
    ///
    /// Plain-text tags and empty files never become primary.
    pub fn recompute_languages(&mut self) {
        let mut counts: HashMap<&LanguageTag, usize> = HashMap::new();
        for file in self.files.values() {
            if file.language.is_plainish() || file.lines == 0 {
                continue;
            }
            *counts.entry(&file.language).or_default() += 1;
        }

        let mut ranked: Vec<(&LanguageTag, usize)> = counts.into_iter().collect();
        // Tag string as tie-breaker so equal counts rank deterministically
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        let mut iter = ranked.into_iter().map(|(tag, _)| tag.clone());
        self.languages = LanguageBreakdown {
            primary: iter.next(),
            others: iter.collect(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(path: &str, language: LanguageTag, imports: &[&str]) -> FileContext {
        FileContext {
            path: path.into(),
            language,
            symbols: Vec::new(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            lines: 10,
            updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            mod_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            errors: Vec::new(),
        }
    }

    fn empty_file(path: &str, language: LanguageTag) -> FileContext {
        FileContext {
            lines: 0,
            ..file(path, language, &[])
        }
    }

    #[test]
    fn test_dependencies_are_deduplicated_union() {
        let mut repo = RepositoryContext::default();
        repo.files
            .insert("a.rs".into(), file("a.rs", LanguageTag::Rust, &["serde", "tokio"]));
        repo.files
            .insert("b.rs".into(), file("b.rs", LanguageTag::Rust, &["serde"]));
        repo.recompute_dependencies();
        assert_eq!(repo.dependencies, vec!["serde".to_string(), "tokio".to_string()]);
    }

    #[test]
    fn test_primary_language_excludes_plain_text() {
        let mut repo = RepositoryContext::default();
        repo.files
            .insert("a.txt".into(), file("a.txt", LanguageTag::Plain, &[]));
        repo.files
            .insert("b.txt".into(), file("b.txt", LanguageTag::Plain, &[]));
        repo.files
            .insert("m.go".into(), file("m.go", LanguageTag::Go, &[]));
        repo.recompute_languages();
        assert_eq!(repo.languages.primary, Some(LanguageTag::Go));
        assert!(repo.languages.others.is_empty());
    }

    #[test]
    fn test_empty_files_never_count_toward_primary() {
        let mut repo = RepositoryContext::default();
        // Tagged Go by extension but zero bytes long
        repo.files
            .insert("empty.go".into(), empty_file("empty.go", LanguageTag::Go));
        repo.files
            .insert("blank.go".into(), empty_file("blank.go", LanguageTag::Go));
        repo.files
            .insert("c.py".into(), file("c.py", LanguageTag::Python, &[]));
        repo.recompute_languages();
        assert_eq!(repo.languages.primary, Some(LanguageTag::Python));
        assert!(repo.languages.others.is_empty());

        repo.files.remove("c.py");
        repo.recompute_languages();
        assert_eq!(repo.languages.primary, None);
    }

    #[test]
    fn test_others_excludes_primary() {
        let mut repo = RepositoryContext::default();
        repo.files
            .insert("a.go".into(), file("a.go", LanguageTag::Go, &[]));
        repo.files
            .insert("b.go".into(), file("b.go", LanguageTag::Go, &[]));
        repo.files
            .insert("c.py".into(), file("c.py", LanguageTag::Python, &[]));
        repo.recompute_languages();
        assert_eq!(repo.languages.primary, Some(LanguageTag::Go));
        assert_eq!(repo.languages.others, vec![LanguageTag::Python]);
    }

    #[test]
    fn test_file_context_roundtrip() {
        let original = file("src/a.rs", LanguageTag::Rust, &["std::fmt"]);
        let json = serde_json::to_vec(&original).unwrap();
        let back: FileContext = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, original);
    }
}
