//! Rendering for ledger command output
//!
//! Every command prints either a table (human use) or JSON (scripting,
//! and the payload shapes a service wrapper would expose). Status
//! messages go to stdout and respect `--quiet`; errors go to stderr and
//! never do, since a suppressed "insufficient credits" helps nobody.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;
use tabled::{Table, Tabled};

/// Output format selected by the global `--format` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'table' or 'json'", s)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render a list of quota rows
pub fn render_list<T>(rows: &[T], format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
{
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No accounts provisioned.");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
    }
    Ok(())
}

/// Render a single row (quota, receipt, or stats summary)
pub fn render_one<T>(row: &T, format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
{
    match format {
        OutputFormat::Table => println!("{}", Table::new([row])),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(row)?),
    }
    Ok(())
}

/// Render a contract payload as JSON, bypassing any table shape
pub fn render_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an operation outcome (respects quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message.green());
    }
}

/// Print a failure to stderr; never suppressed
pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

/// Print supplementary detail (respects quiet mode)
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}
