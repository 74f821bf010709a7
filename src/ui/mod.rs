//! User interface module - output of calculated versions.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Writing to stdout/stderr

use std::io::{self, Write};

use clap::ValueEnum;

use crate::calculator::CalculatedVersion;
use crate::error::{GitverError, Result};

pub mod formatter;

pub use formatter::{
    format_diagnostic, format_error, format_hint, format_summary, format_toml, format_variables,
};

/// How the variables are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Toml,
}

/// Render the output for stdout
///
/// With `show_variable` only that variable's value is printed; an unknown
/// name is an error listing nothing else.
pub fn render(
    calculated: &CalculatedVersion,
    format: OutputFormat,
    show_variable: Option<&str>,
) -> Result<String> {
    let variables = calculated.variables();
    if let Some(name) = show_variable {
        return variables
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| GitverError::invalid_value("show-variable", format!("unknown variable '{}'", name)));
    }
    match format {
        OutputFormat::Text => Ok(format_variables(&variables)),
        OutputFormat::Toml => format_toml(&variables),
    }
}

/// Print the calculated version to stdout and its diagnostics to stderr
pub fn print_version(
    calculated: &CalculatedVersion,
    format: OutputFormat,
    show_variable: Option<&str>,
    show_diagnostics: bool,
) -> Result<()> {
    let output = render(calculated, format, show_variable)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", output.trim_end())?;

    if show_diagnostics {
        display_diagnostics(calculated);
    }
    Ok(())
}

pub fn display_diagnostics(calculated: &CalculatedVersion) {
    for diagnostic in calculated.diagnostics.iter().filter(|d| d.is_warning()) {
        eprintln!("{}", format_diagnostic(diagnostic));
    }
}

pub fn display_summary(calculated: &CalculatedVersion) {
    eprintln!("{}", format_summary(calculated));
}

pub fn display_error(message: &str) {
    eprintln!("{}", format_error(message));
}

pub fn display_hint(message: &str) {
    eprintln!("{}", format_hint(message));
}
