use crate::error::{Error, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Parser turning Rust source files into syntax trees.
///
/// Directives live in doc comments, which `syn` keeps as `#[doc]` attributes on
/// the file and on every item, so the parsed tree is all the associator needs.
///
/// # Example
///
/// ```no_run
/// use openapi_from_annotations::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/main.rs")).unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Reads and parses a single Rust source file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Rust syntax
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse_source(path, &content)
    }

    /// Parses source text that is already in memory; `path` is only used for
    /// diagnostics.
    pub fn parse_source(path: impl Into<PathBuf>, content: &str) -> Result<ParsedFile> {
        let path = path.into();
        let syntax_tree = syn::parse_file(content).map_err(|e| Error::Parse {
            file: path.clone(),
            message: format!("{} (line {})", e, e.span().start().line),
        })?;

        debug!("Successfully parsed file: {}", path.display());

        Ok(ParsedFile { path, syntax_tree })
    }

    /// Parses multiple Rust source files, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings, so that a partial
    /// document can still be produced from the rest of the tree.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                Self::parse_file(path).inspect_err(|e| warn!("Failed to parse {}: {}", path.display(), e))
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}
