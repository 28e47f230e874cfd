//! OpenAPI from annotations - command-line tool compiling doc-comment directives
//! into an OpenAPI document.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-annotations [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! openapi-from-annotations ./my-api-project -o openapi.yaml
//! ```
//!
//! Generate JSON documentation, failing on any warning:
//! ```bash
//! openapi-from-annotations ./my-api-project -f json -o openapi.json --strict
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! openapi-from-annotations ./my-api-project -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_annotations::cli;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can pick the log level
    let args = cli::CliArgs::parse();

    let filters = std::env::var("RUST_LOG").ok();
    cli::logger(args.verbose, filters.as_deref()).init();

    info!("OpenAPI from annotations starting...");

    let args = cli::parse_args_from_parsed(args)?;

    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
