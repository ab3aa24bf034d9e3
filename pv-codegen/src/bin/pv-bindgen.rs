use std::path::PathBuf;

use clap::Parser;
use miette::{miette, IntoDiagnostic};
use pv_codegen::{generate_group, GenerateOptions, DEFAULT_RUNTIME};
use pv_schema_parser::Schema;
use tracing_subscriber::EnvFilter;

/// Prints client bindings for a group schema.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Schema file to read
    schema: PathBuf,

    /// Group to generate; defaults to the first group in the file
    #[arg(short, long)]
    group: Option<String>,

    /// Path of the client runtime used by the generated code
    #[arg(long, default_value = DEFAULT_RUNTIME)]
    runtime: String,
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let source = std::fs::read_to_string(&args.schema).into_diagnostic()?;
    let schema = Schema::parse(&source)?;

    let group = match &args.group {
        Some(name) => schema
            .group(name)
            .ok_or_else(|| miette!("no group named `{name}` in {}", args.schema.display()))?,
        None => schema
            .groups
            .first()
            .ok_or_else(|| miette!("{} declares no groups", args.schema.display()))?,
    };

    tracing::info!(group = %group.name, "generating bindings");
    let binding = generate_group(
        group,
        &GenerateOptions {
            runtime: args.runtime,
        },
    )?;
    for line in binding.lines() {
        println!("{line}");
    }
    Ok(())
}
