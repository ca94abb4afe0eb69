//! Row-level policy compiler CLI
//!
//! Resolves the rules of a rules file for one table operation and prints
//! the compiled predicate as JSON.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rls_common::types::Operation;
use rls_compiler::RulesFile;

#[derive(Parser, Debug)]
#[command(name = "rls-compiler")]
#[command(about = "Compile row-level access rules into SQL predicates", long_about = None)]
struct Args {
    /// Path to rules file (.toml or .json)
    #[arg(short, long, default_value = "rules.toml")]
    config: PathBuf,

    /// Schema of the queried table
    #[arg(short, long, default_value = "public")]
    schema: String,

    /// Queried table
    #[arg(short, long)]
    table: String,

    /// Operation (select, insert, update, delete)
    #[arg(short, long, default_value = "select")]
    operation: String,

    /// Alias of the table in the outer query
    #[arg(short, long)]
    alias: Option<String>,

    /// Emit $n placeholders instead of inline literals
    #[arg(short, long, env = "RLS_PARAMETERIZED")]
    parameterized: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays valid JSON
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    info!("rls-compiler v{}", env!("CARGO_PKG_VERSION"));

    let operation: Operation = args.operation.parse()?;

    let mut file = if args.config.exists() {
        RulesFile::load(&args.config)?
    } else {
        info!("Rules file not found, using an empty rule set");
        RulesFile::default()
    };
    if args.parameterized {
        file.resolver.compiler.parameterized = true;
    }

    let mut context = file.context_for(&args.schema, &args.table);
    if let Some(alias) = &args.alias {
        context = context.with_alias(alias);
    }

    let resolution = file.resolver().resolve_with(
        &file.rules,
        &args.schema,
        &args.table,
        operation,
        &context,
    )?;

    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}
