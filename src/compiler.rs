//! Pipeline entry point.
//!
//! [`Compiler`] chains the stages over a set of parsed files:
//! associate each file's declarations with their directive blocks, assemble
//! the blocks into a draft document, then resolve type tokens and security
//! requirements.

use crate::assembler;
use crate::associator::{self, ScopeBlock};
use crate::diagnostics::{Diagnostic, Severity};
use crate::document::Document;
use crate::error::Result;
use crate::parser::{AstParser, ParsedFile};
use crate::resolver;
use log::info;
use std::path::PathBuf;

pub const DEFAULT_TITLE: &str = "Generated API";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_OPENAPI_VERSION: &str = "3.0.3";

/// Fallbacks for document fields no directive declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// `info.title` when no `!info` is present
    pub title: String,
    /// `info.version` when no `!info` is present
    pub version: String,
    /// `openapi` when no `!api` is present
    pub openapi_version: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            version: DEFAULT_VERSION.to_string(),
            openapi_version: DEFAULT_OPENAPI_VERSION.to_string(),
        }
    }
}

/// The finished document together with everything worth reporting about it.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub document: Document,
    /// Assembly diagnostics first, then resolution diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Compiles directive comments into an OpenAPI document.
///
/// # Example
///
/// ```
/// use openapi_from_annotations::compiler::{CompileOptions, Compiler};
///
/// let source = r#"
/// //! !api 3.0.3
/// //! !info "Pets" v1.0.0
///
/// /// !GET /pets -> listPets "List pets" #pets
/// /// !ok string[] "Pet names"
/// fn list_pets() {}
/// "#;
///
/// let compilation = Compiler::new(CompileOptions::default())
///     .compile_source("pets.rs", source)
///     .unwrap();
/// assert!(!compilation.has_errors());
/// assert!(compilation.document.paths.contains_key("/pets"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compiles a set of parsed files; declarations are taken in slice order,
    /// then in source order within each file.
    pub fn compile(&self, files: &[ParsedFile]) -> Compilation {
        let blocks: Vec<ScopeBlock> = files.iter().flat_map(associator::associate).collect();
        info!(
            "Associated {} directive blocks from {} files",
            blocks.iter().filter(|b| !b.is_empty()).count(),
            files.len()
        );

        let assembled = assembler::assemble(&blocks, &self.options);
        let compilation = resolver::resolve(assembled);

        info!(
            "Compiled {} paths, {} schemas ({} errors, {} warnings)",
            compilation.document.paths.len(),
            compilation.document.components.schemas.len(),
            compilation.error_count(),
            compilation.warning_count()
        );
        compilation
    }

    /// Parses and compiles a single in-memory source.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` is not valid Rust.
    pub fn compile_source(&self, path: impl Into<PathBuf>, source: &str) -> Result<Compilation> {
        let parsed = AstParser::parse_source(path, source)?;
        Ok(self.compile(std::slice::from_ref(&parsed)))
    }
}
