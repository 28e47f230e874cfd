use crate::compiler::{
    CompileOptions, Compiler, DEFAULT_OPENAPI_VERSION, DEFAULT_TITLE, DEFAULT_VERSION,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info, warn};
use std::path::PathBuf;

/// OpenAPI from annotations - compile `!directives` in Rust doc comments into an OpenAPI document
#[derive(Parser, Debug)]
#[command(name = "openapi-from-annotations")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// API title used when no `!info` directive is present
    #[arg(long = "title", default_value = DEFAULT_TITLE)]
    pub title: String,

    /// API version used when no `!info` directive is present
    #[arg(long = "api-version", default_value = DEFAULT_VERSION)]
    pub api_version: String,

    /// OpenAPI version used when no `!api` directive is present
    #[arg(long = "openapi-version", default_value = DEFAULT_OPENAPI_VERSION)]
    pub openapi_version: String,

    /// Fail on warnings as well as errors
    #[arg(long = "strict")]
    pub strict: bool,
}

impl CliArgs {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            title: self.title.clone(),
            version: self.api_version.clone(),
            openapi_version: self.openapi_version.clone(),
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Logger for the binary: `Info`, or `Debug` with `--verbose`.
///
/// `filters` uses the `RUST_LOG` syntax and is applied last, so it overrides the
/// default level as well as per-module levels.
pub fn logger(verbose: bool, filters: Option<&str>) -> env_logger::Builder {
    let log_level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level);
    if let Some(filters) = filters {
        builder.parse_filters(filters);
    }
    builder
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::parser::{AstParser, ParsedFile};
    use crate::scanner::FileScanner;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};

    info!("Starting OpenAPI document generation...");

    // Step 1: Scan directory for Rust files
    info!("Scanning project directory...");
    let scanner = FileScanner::new(args.project_path.clone());
    let scan_result = scanner.scan()?;

    info!("Found {} Rust files", scan_result.rust_files.len());
    for warning in &scan_result.warnings {
        warn!("{}", warning);
    }

    if scan_result.rust_files.is_empty() {
        anyhow::bail!("No Rust files found in the project directory");
    }

    // Step 2: Parse files into syntax trees
    info!("Parsing Rust files...");
    let parsed_files: Vec<ParsedFile> = AstParser::parse_files(&scan_result.rust_files)
        .into_iter()
        .filter_map(|r| match r {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Skipping file due to parse error: {}", e);
                None
            }
        })
        .collect();

    info!("Successfully parsed {} files", parsed_files.len());

    if parsed_files.is_empty() {
        anyhow::bail!("No files could be parsed successfully");
    }

    // Step 3: Compile directives
    info!("Compiling directives...");
    let compilation = Compiler::new(args.compile_options()).compile(&parsed_files);

    for diagnostic in &compilation.diagnostics {
        if diagnostic.is_error() {
            error!("{}", diagnostic);
        } else {
            warn!("{}", diagnostic);
        }
    }

    // Step 4: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&compilation.document)?,
        OutputFormat::Json => serialize_json(&compilation.document)?,
    };

    // Step 5: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    // Step 6: Display summary
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Files scanned: {}", scan_result.rust_files.len());
    info!("  - Files parsed: {}", parsed_files.len());
    info!("  - Paths: {}", compilation.document.paths.len());
    info!("  - Schemas: {}", compilation.document.components.schemas.len());
    info!("  - Errors: {}", compilation.error_count());
    info!("  - Warnings: {}", compilation.warning_count());

    if compilation.has_errors() {
        anyhow::bail!(
            "Compilation reported {} error(s); conflicting declarations were dropped",
            compilation.error_count()
        );
    }
    if args.strict && compilation.warning_count() > 0 {
        anyhow::bail!(
            "Compilation reported {} warning(s) and --strict is set",
            compilation.warning_count()
        );
    }

    Ok(())
}
