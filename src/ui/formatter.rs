//! Pure formatting functions for UI output.
//!
//! Nothing here prints; callers decide where the text goes. Styling uses
//! `console`, which drops colours when the stream is not a terminal.

use console::style;

use crate::calculator::{CalculatedVersion, VersionVariables};
use crate::diagnostics::Diagnostic;
use crate::error::{GitverError, Result};

/// One `Name value` line per variable, names padded to a column
pub fn format_variables(variables: &VersionVariables) -> String {
    let width = variables.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    variables
        .iter()
        .map(|(name, value)| format!("{:<width$}  {}", style(name).bold(), value, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Variables as a flat TOML table
pub fn format_toml(variables: &VersionVariables) -> Result<String> {
    toml::to_string(variables).map_err(|e| GitverError::invalid_value("output", e.to_string()))
}

/// A diagnostic line for stderr, warnings in yellow and the rest dimmed
pub fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    if diagnostic.is_warning() {
        format!(
            "{} {}",
            style("warning:").yellow().bold().for_stderr(),
            diagnostic
        )
    } else {
        format!("{} {}", style("note:").dim().for_stderr(), diagnostic)
    }
}

/// Short explanation of where the version came from, for verbose output
pub fn format_summary(calculated: &CalculatedVersion) -> String {
    format!(
        "{} {} on '{}' ({}; {})",
        style("→").cyan().for_stderr(),
        style(calculated.version.full_sem_ver()).green().bold().for_stderr(),
        calculated.branch.friendly_name(),
        calculated.configuration.branch_type,
        calculated.winner.description
    )
}

/// An error line for stderr
pub fn format_error(message: &str) -> String {
    format!("{} {}", style("error:").red().bold().for_stderr(), message)
}

pub fn format_hint(message: &str) -> String {
    format!("{} {}", style("hint:").cyan().for_stderr(), message)
}
