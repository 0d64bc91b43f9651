//! Pretty-printing messages to the console

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use colored::Colorize;

/// Pretty-print an error message to the console
pub fn error(error_message: String) {
    let error_title = "error:".red().bold();
    eprintln!("{} {}", error_title, error_message);
}

/// Pretty-print a warning message to the console
pub fn warning(message: String, line_number: usize) {
    let warning = "warning:".yellow().bold();
    eprintln!("{} line {}: {}", warning, line_number, message);
}

/// A span of columns within a single source line, underlined beneath a
/// diagnostic that has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A single compiler diagnostic: a line number, a human-readable message,
/// and (when the offending token is known) the source line and column span
/// to underline beneath it. Diagnostics accumulate per file in an unordered
/// set and are ordered by line only when reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
    pub span: Option<Span>,
    pub source_line: Option<String>,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Diagnostic {
        Diagnostic { line, message: message.into(), span: None, source_line: None }
    }

    pub fn with_span(line: usize, message: impl Into<String>, span: Span, source_line: impl Into<String>) -> Diagnostic {
        Diagnostic { line, message: message.into(), span: Some(span), source_line: Some(source_line.into()) }
    }
}

/// Print every file's accumulated diagnostics, ordered by line within each
/// file, files in path order. Returns `true` if anything was printed.
pub fn report_errors(errors_by_file: &BTreeMap<PathBuf, Vec<Diagnostic>>) -> bool {
    let mut any = false;
    for (path, diagnostics) in errors_by_file {
        if diagnostics.is_empty() {
            continue;
        }
        any = true;
        let mut sorted = diagnostics.clone();
        sorted.sort_by_key(|d| d.line);
        for diagnostic in sorted {
            report_one(path, &diagnostic);
        }
    }
    any
}

fn report_one(path: &Path, diagnostic: &Diagnostic) {
    let error_title = "error:".red().bold();
    eprintln!(
        "{} {}:{}: {}",
        error_title,
        path.display(),
        diagnostic.line,
        diagnostic.message
    );
    if let (Some(span), Some(source_line)) = (diagnostic.span, &diagnostic.source_line) {
        eprintln!("\t{}", source_line);
        eprintln!("\t{}", underline_span(source_line, span).green());
    }
}

/// Build a line of spaces and carets underlining `span`'s columns beneath
/// `line`, the way `chip8vm`'s assembler underlines a bad token.
fn underline_span(line: &str, span: Span) -> String {
    let start = span.start.min(line.len());
    let end = span.end.max(start).min(line.len());
    let mut underline = " ".repeat(start);
    underline.push_str(&"^".repeat((end - start).max(1)));
    underline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_errors_detects_any_diagnostics() {
        let mut map = BTreeMap::new();
        map.insert(PathBuf::from("a.sos"), vec![]);
        assert!(!report_errors(&map));

        map.insert(
            PathBuf::from("b.sos"),
            vec![Diagnostic::new(3, "unknown constant FOO")],
        );
        assert!(report_errors(&map));
    }

    #[test]
    fn underline_span_places_carets_under_the_token_columns() {
        let underline = underline_span("store 0x10 FOO", Span { start: 11, end: 14 });
        assert_eq!(underline, "           ^^^");
    }
}
