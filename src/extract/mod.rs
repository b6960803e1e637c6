//! Extraction layer: parser host, query registry, per-file analyzer,
//! import normalization

pub mod analyzer;
pub mod host;
pub mod imports;
pub mod queries;

pub use analyzer::{FileAnalyzer, LanguageStats};
pub use host::ParserHost;
pub use imports::{normalize, ImportSet};
pub use queries::{kind_for_capture, QueryCompileError, QueryKind, QueryRegistry};
