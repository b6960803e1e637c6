//! File type detection
//!
//! Maps `(path, bytes)` to a language tag. Deterministic and pure: an
//! extension table first, then a byte-level MIME sniff, then three content
//! heuristics. Unrecognized files keep the sniffed MIME string as their
//! tag, which disables deep analysis but preserves the path in the index.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Language tag assigned once per file by the detector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LanguageTag {
    Go,
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Cpp,
    Rust,
    Java,
    Ruby,
    Php,
    Css,
    Html,
    Lua,
    Markdown,
    Yaml,
    Json,
    Xml,
    Sql,
    /// Plain text: no grammar, path-only indexing
    Plain,
    /// Verbatim MIME string for anything else the sniffer produced
    Other(String),
}

impl LanguageTag {
    /// Canonical string form, also used for serialization
    pub fn as_str(&self) -> &str {
        match self {
            Self::Go => "go",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Python => "python",
            Self::Cpp => "c++",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Css => "css",
            Self::Html => "html",
            Self::Lua => "lua",
            Self::Markdown => "markdown",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Sql => "sql",
            Self::Plain => "text/plain",
            Self::Other(mime) => mime,
        }
    }

    /// Inverse of [`as_str`]; unrecognized strings round-trip as `Other`
    pub fn from_tag_str(s: &str) -> Self {
        match s {
            "go" => Self::Go,
            "javascript" => Self::JavaScript,
            "typescript" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "python" => Self::Python,
            "c++" => Self::Cpp,
            "rust" => Self::Rust,
            "java" => Self::Java,
            "ruby" => Self::Ruby,
            "php" => Self::Php,
            "css" => Self::Css,
            "html" => Self::Html,
            "lua" => Self::Lua,
            "markdown" => Self::Markdown,
            "yaml" => Self::Yaml,
            "json" => Self::Json,
            "xml" => Self::Xml,
            "sql" => Self::Sql,
            "text/plain" => Self::Plain,
            other => Self::Other(other.to_string()),
        }
    }

    /// Tags excluded from the primary-language aggregate
    pub fn is_plainish(&self) -> bool {
        matches!(self, Self::Plain | Self::Other(_))
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for LanguageTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LanguageTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagVisitor;
        impl<'de> Visitor<'de> for TagVisitor {
            type Value = LanguageTag;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a language tag string")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<LanguageTag, E> {
                Ok(LanguageTag::from_tag_str(v))
            }
        }
        deserializer.deserialize_str(TagVisitor)
    }
}

/// Detect the language of a file from its path and contents
pub fn detect(path: &Path, bytes: &[u8]) -> LanguageTag {
    if let Some(tag) = from_extension(path) {
        return tag;
    }

    let mime = sniff_mime(bytes);
    if let Some(tag) = from_mime(mime) {
        return tag;
    }

    if let Some(tag) = from_content(bytes) {
        return tag;
    }

    LanguageTag::from_tag_str(mime)
}

fn from_extension(path: &Path) -> Option<LanguageTag> {
    let ext = path.extension().and_then(|e| e.to_str())?.to_lowercase();
    let tag = match ext.as_str() {
        "go" => LanguageTag::Go,
        "js" | "jsx" => LanguageTag::JavaScript,
        "ts" => LanguageTag::TypeScript,
        "tsx" => LanguageTag::Tsx,
        "py" => LanguageTag::Python,
        "java" => LanguageTag::Java,
        "rb" => LanguageTag::Ruby,
        "php" => LanguageTag::Php,
        "rs" => LanguageTag::Rust,
        "c" | "cpp" | "h" | "hpp" => LanguageTag::Cpp,
        "md" | "markdown" => LanguageTag::Markdown,
        "yaml" | "yml" => LanguageTag::Yaml,
        "json" => LanguageTag::Json,
        "xml" => LanguageTag::Xml,
        "sql" => LanguageTag::Sql,
        "css" => LanguageTag::Css,
        "html" => LanguageTag::Html,
        "lua" => LanguageTag::Lua,
        _ => return None,
    };
    Some(tag)
}

/// Minimal byte sniffer over the fixed MIME set the mapper understands.
///
/// No MIME crate in the stack; the mapper only needs to distinguish
/// markup, binary, and plain text.
fn sniff_mime(bytes: &[u8]) -> &'static str {
    let head: &[u8] = &bytes[..bytes.len().min(512)];
    let trimmed = trim_ascii_start(head);

    if starts_with_ignore_case(trimmed, b"<?xml") {
        return "text/xml";
    }
    if starts_with_ignore_case(trimmed, b"<!doctype html") || starts_with_ignore_case(trimmed, b"<html") {
        return "text/html";
    }
    if head.contains(&0) {
        return "application/octet-stream";
    }
    "text/plain"
}

fn from_mime(mime: &str) -> Option<LanguageTag> {
    match mime {
        "text/html" => Some(LanguageTag::Html),
        "text/xml" => Some(LanguageTag::Xml),
        _ => None,
    }
}

fn from_content(bytes: &[u8]) -> Option<LanguageTag> {
    let head = &bytes[..bytes.len().min(4096)];
    let text = std::str::from_utf8(head).ok()?;

    if text.contains("<?php") {
        return Some(LanguageTag::Php);
    }
    if text.starts_with("#!/usr/bin/env python") {
        return Some(LanguageTag::Python);
    }
    if text.contains("package ") && text.contains("import ") {
        return Some(LanguageTag::Go);
    }
    None
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    &bytes[i..]
}

fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len()
        && haystack[..prefix.len()]
            .iter()
            .zip(prefix)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}
