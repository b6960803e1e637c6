//! Import normalization
//!
//! Strips language-specific decoration (keywords, quotes, aliases) down to
//! a canonical import string, and collects them with first-seen ordering.

use std::collections::HashSet;

const PREFIXES: &[&str] = &["import ", "use ", "#include ", "from ", "require "];

/// Normalize a raw captured import path to its canonical form.
///
/// Returns `None` when the result is empty or still carries whitespace
/// (multi-token captures that survived stripping are noise, not paths).
pub fn normalize(raw: &str) -> Option<String> {
    let mut s = raw.trim();

    for prefix in PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start();
            break;
        }
    }

    s = s.trim_end_matches([';', '\n', '\r']).trim_end();
    s = s.trim_start_matches(['"', '\'', '<']);
    s = s.trim_end_matches(['"', '\'', '>']);

    // `x as y` and `x from y` keep only the path
    let mut owned = s.to_string();
    if let Some(pos) = owned.find(" as ") {
        owned.truncate(pos);
    }
    if let Some(pos) = owned.find(" from ") {
        owned.truncate(pos);
    }

    // Go blank imports: `_ "net/http/pprof"` arrives as `_ path` once quotes drop
    let canonical = owned.strip_prefix("_ ").unwrap_or(&owned).trim();

    if canonical.is_empty() || canonical.chars().any(char::is_whitespace) {
        return None;
    }
    Some(canonical.to_string())
}

/// Import collection with first-seen ordering and O(1) duplicate checks
#[derive(Debug, Default)]
pub struct ImportSet {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and record one raw capture. Returns true if it was new.
    pub fn insert_raw(&mut self, raw: &str) -> bool {
        match normalize(raw) {
            Some(canonical) => self.insert(canonical),
            None => false,
        }
    }

    /// Record an already-canonical import. Returns true if it was new.
    pub fn insert(&mut self, canonical: String) -> bool {
        if self.seen.contains(&canonical) {
            return false;
        }
        self.seen.insert(canonical.clone());
        self.ordered.push(canonical);
        true
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.seen.contains(canonical)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Consume into the ordered import list
    pub fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}
