//! OpenAPI from annotations - compile doc-comment directives into an OpenAPI document.
//!
//! API documentation is written next to the code it describes, as `!`-prefixed
//! directive lines inside ordinary Rust doc comments:
//!
//! ```text
//! //! !api 3.0.3
//! //! !info "Petstore" v1.0.0
//!
//! /// Returns a single pet.
//! /// !GET /pets/{id} -> getPet "Find a pet" #pets
//! /// !path id:int64 "Pet identifier" required
//! /// !ok Pet "The pet"
//! /// !error 404 ApiError "Not found"
//! async fn get_pet() {}
//! ```
//!
//! # Architecture
//!
//! 1. [`scanner`] - Recursively scans project directories for Rust files
//! 2. [`parser`] - Parses Rust source files into syntax trees
//! 3. [`lexer`] - Extracts typed directives from comment text
//! 4. [`associator`] - Pairs each declaration with its directive block
//! 5. [`assembler`] - Merges blocks into a draft document, reporting conflicts
//! 6. [`resolver`] - Resolves type tokens and security requirements
//! 7. [`compiler`] - Chains the stages above into one call
//! 8. [`serializer`] - Serializes the document to YAML or JSON
//!
//! Malformed or conflicting directives never abort a run; they are reported as
//! [`diagnostics::Diagnostic`]s next to the finished document.
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_annotations::{
//!     compiler::{CompileOptions, Compiler},
//!     parser::AstParser,
//!     scanner::FileScanner,
//!     serializer::serialize_yaml,
//! };
//! use std::path::PathBuf;
//!
//! let scan_result = FileScanner::new(PathBuf::from("./my-project")).scan().unwrap();
//! let parsed_files: Vec<_> = AstParser::parse_files(&scan_result.rust_files)
//!     .into_iter()
//!     .filter_map(Result::ok)
//!     .collect();
//!
//! let compilation = Compiler::new(CompileOptions::default()).compile(&parsed_files);
//! for diagnostic in &compilation.diagnostics {
//!     eprintln!("{}", diagnostic);
//! }
//! println!("{}", serialize_yaml(&compilation.document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod assembler;
pub mod associator;
pub mod cli;
pub mod compiler;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod serializer;
