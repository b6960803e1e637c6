//! Query registry
//!
//! Owns one symbol query and one import query per language, written in the
//! tree-sitter predicate language, plus the fixed capture-name to
//! SymbolKind projection. Compiled queries are cached per
//! `(kind, language)` on first use; a compilation failure is reported to
//! the caller and becomes a per-file diagnostic, never a run failure.
//! Languages without a registered query simply produce empty results.

use crate::context::SymbolKind;
use crate::detect::LanguageTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tree_sitter::{Language, Query};

// =============================================================================
// CAPTURE TABLE
// =============================================================================

/// Projection from query capture names onto the uniform symbol taxonomy.
///
/// Captures not listed here (match anchors like `@func`, helper captures
/// like `@_fn`) carry no kind and are skipped during extraction.
static CAPTURE_KINDS: Lazy<HashMap<&'static str, SymbolKind>> = Lazy::new(|| {
    HashMap::from([
        ("func.name", SymbolKind::Function),
        ("method.name", SymbolKind::Function),
        ("getter.name", SymbolKind::Function),
        ("setter.name", SymbolKind::Function),
        ("constructor.name", SymbolKind::Function),
        ("class.name", SymbolKind::Class),
        ("struct.name", SymbolKind::Class),
        ("interface.name", SymbolKind::Interface),
        ("trait.name", SymbolKind::Interface),
        ("enum.name", SymbolKind::Enum),
        ("type.name", SymbolKind::Type),
        ("type_alias", SymbolKind::Type),
        ("var.name", SymbolKind::Variable),
        ("const.name", SymbolKind::Constant),
        ("field.name", SymbolKind::Field),
        ("property.name", SymbolKind::Field),
        ("ivar.name", SymbolKind::Field),
        ("cvar.name", SymbolKind::Field),
        ("public_field", SymbolKind::Field),
        ("module.name", SymbolKind::Module),
        ("annotation.name", SymbolKind::Modifier),
        ("component.name", SymbolKind::Constant),
        ("react_component", SymbolKind::Constant),
    ])
});

/// Look up the SymbolKind projected from a capture name
pub fn kind_for_capture(capture_name: &str) -> Option<SymbolKind> {
    CAPTURE_KINDS.get(capture_name).copied()
}

/// The capture name every import query binds its path to
pub const IMPORT_PATH_CAPTURE: &str = "import.path";

// =============================================================================
// QUERY SOURCES
// =============================================================================

/// Which of the two query families to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Symbols,
    Imports,
}

/// Symbol query source for a language, if one is registered
pub fn symbol_query_source(tag: &LanguageTag) -> Option<&'static str> {
    let source = match tag {
        LanguageTag::Go => {
            "(function_declaration name: (identifier) @func.name) @func
(method_declaration name: (field_identifier) @method.name) @method
(type_declaration (type_spec name: (type_identifier) @struct.name type: (struct_type))) @struct
(type_declaration (type_spec name: (type_identifier) @interface.name type: (interface_type))) @interface
(const_declaration (const_spec name: (identifier) @const.name)) @const
(var_declaration (var_spec name: (identifier) @var.name)) @var"
        }
        LanguageTag::Rust => {
            "(function_item name: (identifier) @func.name) @func
(struct_item name: (type_identifier) @struct.name) @struct
(enum_item name: (type_identifier) @enum.name) @enum
(trait_item name: (type_identifier) @trait.name) @trait
(type_item name: (type_identifier) @type.name) @type
(const_item name: (identifier) @const.name) @const
(static_item name: (identifier) @const.name) @static
(mod_item name: (identifier) @module.name) @module"
        }
        LanguageTag::Python => {
            "(function_definition name: (identifier) @func.name) @func
(class_definition name: (identifier) @class.name) @class
(module (expression_statement (assignment left: (identifier) @var.name) @var))"
        }
        LanguageTag::JavaScript => {
            "(function_declaration name: (identifier) @func.name) @func
(generator_function_declaration name: (identifier) @func.name) @generator
(class_declaration name: (identifier) @class.name) @class
(method_definition name: (property_identifier) @method.name) @method
(lexical_declaration (variable_declarator name: (identifier) @func.name value: (arrow_function))) @arrow
(variable_declaration (variable_declarator name: (identifier) @var.name)) @var"
        }
        LanguageTag::TypeScript | LanguageTag::Tsx => {
            "(function_declaration name: (identifier) @func.name) @func
(class_declaration name: (type_identifier) @class.name) @class
(interface_declaration name: (type_identifier) @interface.name) @interface
(enum_declaration name: (identifier) @enum.name) @enum
(type_alias_declaration name: (type_identifier) @type.name) @type
(method_definition name: (property_identifier) @method.name) @method
(public_field_definition name: (property_identifier) @field.name) @public_field
(lexical_declaration (variable_declarator name: (identifier) @func.name value: (arrow_function))) @arrow"
        }
        LanguageTag::Java => {
            "(class_declaration name: (identifier) @class.name) @class
(interface_declaration name: (identifier) @interface.name) @interface
(enum_declaration name: (identifier) @enum.name) @enum
(method_declaration name: (identifier) @method.name) @method
(constructor_declaration name: (identifier) @constructor.name) @constructor
(field_declaration declarator: (variable_declarator name: (identifier) @field.name)) @field
(annotation_type_declaration name: (identifier) @annotation.name) @annotation"
        }
        LanguageTag::Cpp => {
            "(function_definition declarator: (function_declarator declarator: (identifier) @func.name)) @func
(function_definition declarator: (function_declarator declarator: (field_identifier) @method.name)) @method
(class_specifier name: (type_identifier) @class.name) @class
(struct_specifier name: (type_identifier) @struct.name) @struct
(enum_specifier name: (type_identifier) @enum.name) @enum
(namespace_definition name: (namespace_identifier) @module.name) @module
(type_definition declarator: (type_identifier) @type.name) @type"
        }
        _ => return None,
    };
    Some(source)
}

/// Import query source for a language, if one is registered.
///
/// Each query binds exactly one path-valued capture, `@import.path`.
pub fn import_query_source(tag: &LanguageTag) -> Option<&'static str> {
    let source = match tag {
        LanguageTag::Go => "(import_spec path: (interpreted_string_literal) @import.path)",
        LanguageTag::Rust => "(use_declaration argument: (_) @import.path)",
        LanguageTag::Python => {
            "(import_statement name: (dotted_name) @import.path)
(import_statement name: (aliased_import name: (dotted_name) @import.path))
(import_from_statement module_name: (dotted_name) @import.path)"
        }
        LanguageTag::JavaScript => {
            "(import_statement source: (string) @import.path)
(call_expression function: (identifier) @_fn arguments: (arguments (string) @import.path) (#eq? @_fn \"require\"))"
        }
        LanguageTag::TypeScript | LanguageTag::Tsx => {
            "(import_statement source: (string) @import.path)"
        }
        LanguageTag::Java => "(import_declaration (scoped_identifier) @import.path)",
        LanguageTag::Cpp => {
            "(preproc_include path: (string_literal) @import.path)
(preproc_include path: (system_lib_string) @import.path)"
        }
        _ => return None,
    };
    Some(source)
}

// =============================================================================
// COMPILED QUERY CACHE
// =============================================================================

/// Query compilation failure, downgraded to a per-file diagnostic by callers
#[derive(Debug, Clone)]
pub struct QueryCompileError {
    pub language: String,
    pub message: String,
}

impl std::fmt::Display for QueryCompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} query: {}", self.language, self.message)
    }
}

/// Lazily-compiled query cache, keyed by `(kind, language)`
#[derive(Default)]
pub struct QueryRegistry {
    compiled: RwLock<HashMap<(QueryKind, LanguageTag), Arc<Query>>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the compiled query for `(kind, tag)`, compiling on first use.
    ///
    /// `Ok(None)` means no query is registered for the language, which is
    /// not an error: the file is indexed with empty symbols/imports.
    pub fn get(
        &self,
        grammar: &Language,
        kind: QueryKind,
        tag: &LanguageTag,
    ) -> Result<Option<Arc<Query>>, QueryCompileError> {
        let source = match kind {
            QueryKind::Symbols => symbol_query_source(tag),
            QueryKind::Imports => import_query_source(tag),
        };
        let Some(source) = source else {
            return Ok(None);
        };

        let key = (kind, tag.clone());
        if let Some(query) = self.compiled.read().get(&key) {
            return Ok(Some(query.clone()));
        }

        let mut compiled = self.compiled.write();
        // Double-checked: another thread may have compiled while we waited
        if let Some(query) = compiled.get(&key) {
            return Ok(Some(query.clone()));
        }

        let query = Query::new(grammar, source).map_err(|e| QueryCompileError {
            language: tag.as_str().to_string(),
            message: e.to_string(),
        })?;
        let query = Arc::new(query);
        compiled.insert(key, query.clone());
        Ok(Some(query))
    }
}
