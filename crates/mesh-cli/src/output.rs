//! Output helpers shared by all subcommands.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result. Text mode falls back to pretty JSON, so
/// commands with a custom text layout only call this for JSON.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Text => serde_json::to_string_pretty(value),
    };
    match rendered {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("{}: failed to serialize output: {}", "Error".red().bold(), e),
    }
}

/// Progress message. Goes to stderr so JSON stdout stays parseable.
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Text => eprintln!("{} {}", "→".blue().bold(), message),
        OutputFormat::Json => {}
    }
}

pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Text => println!("{} {}", "✓".green().bold(), message),
        OutputFormat::Json => {}
    }
}
