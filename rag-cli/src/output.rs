//! Output formatting helpers

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, human-oriented text
    Human,
    /// Machine-readable JSON
    Json,
}

/// Print a value either as JSON or through the given human renderer.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    human: impl FnOnce(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Human => human(value),
    }
    Ok(())
}

/// Print a success line in human mode.
pub fn success(message: &str) {
    println!("{} {message}", "✓".green());
}

/// Print a warning line to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {message}", "!".yellow());
}
