//! Output formatting and styling module.
//!
//! Stdout carries only data: entry paths from the listing commands and the
//! aggregate line of the counting commands, written to a caller-supplied
//! writer so that the walker can be driven against an in-memory buffer.
//! Diagnostics go to stderr with colored markers.

use colored::*;
use std::io::{self, Write};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Error messages (red with ✗, stderr)
/// - Warning messages (yellow with ⚠, stderr)
/// - Entry paths and aggregate lines (plain, to the given writer)
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use treewalk::output::OutputFormatter;
    /// OutputFormatter::error("Invalid command");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use treewalk::output::OutputFormatter;
    /// OutputFormatter::warning("Skipping special file '/home/user/fifo'");
    /// ```
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Writes one visited path, one per line.
    pub fn entry<W: Write>(out: &mut W, path: &Path) -> io::Result<()> {
        writeln!(out, "{}", path.display())
    }

    /// Writes a final aggregate line such as `Total files: 3`.
    pub fn summary<W: Write>(out: &mut W, line: &str) -> io::Result<()> {
        writeln!(out, "{}", line)
    }
}
