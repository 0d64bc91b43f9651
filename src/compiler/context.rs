//! [ParserContext]: the state threaded through include and template
//! expansion, and the bindings it accumulates.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::logging::{Diagnostic, Span};

use super::token::Token;
use super::value::ConstantValue;

/// A named immediate value established by `#constant NAME value`.
#[derive(Debug, Clone)]
pub struct ConstantBinding {
    pub value: ConstantValue,
    pub file: PathBuf,
    pub line: usize,
    pub tokens: Vec<Token>,
}

/// A named block of lines established by `#template_begin NAME(params)` …
/// `#template_end`, expanded inline at each invocation.
#[derive(Debug, Clone)]
pub struct TemplateBinding {
    pub formal_params: Vec<String>,
    /// Captured body lines paired with their original source line number,
    /// so diagnostics raised during expansion point at the right place.
    pub body: Vec<(usize, Vec<Token>)>,
    pub file: PathBuf,
    pub line: usize,
}

/// State shared across an entire compilation run: bindings, asset index
/// tables, and the include/template descent stacks. `active_file`,
/// `active_line` and `active_template` track where processing currently is
/// for diagnostics; they (and `constants`, during template expansion) are
/// saved and restored by the caller around nested work rather than mutated
/// through a global.
pub struct ParserContext {
    pub constants: HashMap<String, ConstantBinding>,
    pub templates: HashMap<String, TemplateBinding>,
    pub music: HashMap<String, u32>,
    pub sounds: HashMap<String, u32>,
    pub sprites: HashMap<String, u32>,
    pub include_stack: Vec<PathBuf>,
    pub template_stack: Vec<String>,
    pub active_file: PathBuf,
    pub active_template: Option<String>,
    pub active_line: usize,
    pub working_directory: PathBuf,
    pub errors: BTreeMap<PathBuf, Vec<Diagnostic>>,
    /// Raw source lines per file, cached as each file is read, so a
    /// diagnostic raised far from the original read can still underline the
    /// offending span.
    pub source_lines: BTreeMap<PathBuf, Vec<String>>,
}

impl ParserContext {
    pub fn new(working_directory: PathBuf) -> ParserContext {
        ParserContext {
            constants: HashMap::new(),
            templates: HashMap::new(),
            music: HashMap::new(),
            sounds: HashMap::new(),
            sprites: HashMap::new(),
            include_stack: Vec::new(),
            template_stack: Vec::new(),
            active_file: PathBuf::new(),
            active_template: None,
            active_line: 0,
            working_directory,
            errors: BTreeMap::new(),
            source_lines: BTreeMap::new(),
        }
    }

    /// Register an ordered asset name → index table, as established by the
    /// compiler configuration's `music`/`sounds`/`sprites` lists.
    pub fn register_assets(table: &mut HashMap<String, u32>, names: &[String]) {
        for (index, name) in names.iter().enumerate() {
            table.insert(name.clone(), index as u32);
        }
    }

    pub fn report(&mut self, file: PathBuf, diagnostic: Diagnostic) {
        self.errors.entry(file).or_default().push(diagnostic);
    }

    /// Build a diagnostic for `line` in `file`, underlining `span` when the
    /// file's source text was cached and the span falls within it.
    pub fn diagnostic_for(&self, file: &Path, line: usize, message: impl Into<String>, span: Option<Span>) -> Diagnostic {
        let source_line = self.source_lines.get(file).and_then(|lines| lines.get(line.checked_sub(1)?));
        match (span, source_line) {
            (Some(span), Some(source_line)) => Diagnostic::with_span(line, message, span, source_line.clone()),
            _ => Diagnostic::new(line, message),
        }
    }

    /// [`diagnostic_for`](Self::diagnostic_for) followed by [`report`](Self::report).
    pub fn report_token(&mut self, file: &Path, line: usize, message: impl Into<String>, span: Option<Span>) {
        let diagnostic = self.diagnostic_for(file, line, message, span);
        self.report(file.to_path_buf(), diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.errors.values().any(|v| !v.is_empty())
    }

    #[cfg(test)]
    pub fn new_for_test() -> ParserContext {
        ParserContext::new(PathBuf::from("."))
    }
}
