//! The file processor: orchestrates per-file tokenising, structural
//! validation, include/template expansion, and assembly of the flat
//! pre-resolution instruction/label stream.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::isa::{Arity, Opcode};
use crate::logging::{Diagnostic, Span};

use super::context::{ConstantBinding, ParserContext, TemplateBinding};
use super::io::SourceResolver;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use super::value::{evaluate_value, ConstantValue, ConstantValueKind};

/// A label reference used as an instruction operand, resolved in a later
/// pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRef {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
    /// The column span of the label reference token, for underlining a
    /// resolution error.
    pub token_span: Option<Span>,
}

/// An instruction operand before label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Number(i64),
    LabelRef(LabelRef),
}

/// An instruction before label resolution: an opcode plus as many operands
/// as its arity demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub operands: Vec<Operand>,
}

/// A label definition's position in the instruction/label stream, stripped
/// once addresses are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMarker {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
}

/// One entry in the flat pre-resolution stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Instruction(Instruction),
    Label(LabelMarker),
}

/// The outcome of compiling one entry file (and everything it includes).
pub struct ProcessResult {
    pub success: bool,
    pub errors_by_file: BTreeMap<PathBuf, Vec<Diagnostic>>,
    pub items: Vec<Item>,
}

/// Compile an entry file: tokenise, validate, expand, and collect the flat
/// instruction/label stream plus every file's diagnostics.
pub fn process_entry(
    path: &Path,
    ctx: &mut ParserContext,
    resolver: &dyn SourceResolver,
) -> ProcessResult {
    ctx.include_stack.push(path.to_path_buf());
    let items = process_file(path, ctx, resolver);
    ctx.include_stack.pop();
    ProcessResult { success: !ctx.has_errors(), errors_by_file: ctx.errors.clone(), items }
}

/// Process a single file: the recursive core of include/template
/// expansion. `ctx.active_file`/`ctx.active_line` are saved and restored
/// around this call's work so diagnostics in a caller resume correctly.
pub fn process_file(path: &Path, ctx: &mut ParserContext, resolver: &dyn SourceResolver) -> Vec<Item> {
    let file = path.to_path_buf();

    let lines = match resolver.read_lines(&file) {
        Ok(lines) => lines,
        Err(err) => {
            ctx.report(file.clone(), Diagnostic::new(0, format!("failed to read file: {}", err)));
            return Vec::new();
        }
    };

    ctx.source_lines.insert(file.clone(), lines.clone());

    let mut lexer = Lexer::new();
    let mut line_tokens: Vec<Vec<Token>> = lines.iter().map(|line| lexer.tokenise_line(line)).collect();
    for tokens in line_tokens.iter_mut() {
        tokens.retain(|t| {
            !matches!(t.kind, TokenKind::SingleLineComment | TokenKind::MultiLineComment)
        });
    }

    let invalid_lines = validate_structure(&line_tokens, &file, ctx);

    let saved_file = ctx.active_file.clone();
    let saved_line = ctx.active_line;
    ctx.active_file = file.clone();

    let mut items = Vec::new();
    for (idx, tokens) in line_tokens.iter().enumerate() {
        let line = idx + 1;
        ctx.active_line = line;
        if tokens.is_empty() {
            continue;
        }

        if let Some(template_name) = ctx.active_template.clone() {
            if matches!(tokens[0].kind, TokenKind::TemplateEnd) {
                ctx.active_template = None;
            } else if let Some(template) = ctx.templates.get_mut(&template_name) {
                template.body.push((line, tokens.clone()));
            }
            continue;
        }

        if invalid_lines.contains(&line) {
            continue;
        }

        process_line(tokens, &file, line, ctx, resolver, &mut items);
    }

    ctx.active_file = saved_file;
    ctx.active_line = saved_line;
    items
}

fn process_line(
    tokens: &[Token],
    file: &Path,
    line: usize,
    ctx: &mut ParserContext,
    resolver: &dyn SourceResolver,
    items: &mut Vec<Item>,
) {
    match tokens[0].kind.clone() {
        TokenKind::Label(text) => {
            items.push(Item::Label(LabelMarker { name: text, file: file.to_path_buf(), line }));
        }
        TokenKind::Operation(op) => {
            process_operation(op, &tokens[1..], file, line, ctx, items);
        }
        TokenKind::ConstantDecl(name) => {
            let value = evaluate_value(&tokens[1..], file, line, ctx);
            if let ConstantValueKind::Error(diag) = &value.kind {
                ctx.report(file.to_path_buf(), diag.clone());
            }
            ctx.constants.insert(
                name,
                ConstantBinding {
                    value: ConstantValue { kind: value.kind, consumed: value.consumed },
                    file: file.to_path_buf(),
                    line,
                    tokens: tokens[1..].to_vec(),
                },
            );
        }
        TokenKind::TemplateInvoke(name) => {
            expand_template_invocation(&name, &tokens[1..], file, line, ctx, resolver, items);
        }
        TokenKind::TemplateBegin(name) => {
            let formals = parse_formals(&tokens[1..], file, line, ctx);
            ctx.templates.insert(
                name.clone(),
                TemplateBinding { formal_params: formals, body: Vec::new(), file: file.to_path_buf(), line },
            );
            ctx.active_template = Some(name);
        }
        // A bare template_end outside any template body is a structural
        // error `validate_structure` already reported; `process_file` skips
        // calling this function for such lines, so this arm is unreachable
        // in practice and exists only to keep the match exhaustive.
        TokenKind::TemplateEnd => {}
        TokenKind::Include => {
            handle_include(&tokens[1..], file, line, ctx, resolver, items);
        }
        // Likewise already reported by `validate_structure`.
        _ => {}
    }
}

fn process_operation(
    op: Opcode,
    operand_tokens: &[Token],
    file: &Path,
    line: usize,
    ctx: &mut ParserContext,
    items: &mut Vec<Item>,
) {
    let n = match op.arity() {
        Arity::Zero => 0,
        Arity::One => 1,
        Arity::Two => 2,
    };

    let mut operands = Vec::with_capacity(n);
    let mut consumed = 0;
    let mut ok = true;

    for _ in 0..n {
        let start_span = operand_tokens.get(consumed).map(|t| t.span.into());
        let value = evaluate_value(&operand_tokens[consumed..], file, line, ctx);
        consumed += value.consumed.max(1);
        match value.kind {
            ConstantValueKind::Number(num) => operands.push(Operand::Number(num as i64)),
            ConstantValueKind::Label(text) => {
                operands.push(Operand::LabelRef(LabelRef {
                    name: text,
                    file: file.to_path_buf(),
                    line,
                    token_span: start_span,
                }))
            }
            ConstantValueKind::Error(diag) => {
                ctx.report(file.to_path_buf(), diag);
                ok = false;
            }
            ConstantValueKind::String(_) => {
                ctx.report_token(file, line, "expected a number or label, found a string", start_span);
                ok = false;
            }
        }
    }

    if ok {
        items.push(Item::Instruction(Instruction { op, operands }));
    }
}

fn parse_formals(tokens: &[Token], file: &Path, line: usize, ctx: &mut ParserContext) -> Vec<String> {
    let mut formals = Vec::new();
    if tokens.first().map(|t| &t.kind) != Some(&TokenKind::OpenParen) {
        let span = tokens.first().map(|t| t.span.into());
        ctx.report_token(file, line, "expected '(' after template_begin name", span);
        return formals;
    }
    let mut i = 1;
    loop {
        let span = tokens.get(i).map(|t| t.span.into());
        match tokens.get(i).map(|t| &t.kind) {
            Some(TokenKind::CloseParen) => break,
            Some(TokenKind::ConstantRef(name)) => {
                formals.push(name.clone());
                i += 1;
                match tokens.get(i).map(|t| &t.kind) {
                    Some(TokenKind::Comma) => i += 1,
                    Some(TokenKind::CloseParen) => {}
                    _ => {
                        ctx.report_token(file, line, "malformed template formal parameter list", tokens.get(i).map(|t| t.span.into()));
                        break;
                    }
                }
            }
            _ => {
                ctx.report_token(file, line, "each template formal parameter must be a plain name", span);
                break;
            }
        }
    }
    formals
}

fn expand_template_invocation(
    name: &str,
    tokens: &[Token],
    file: &Path,
    line: usize,
    ctx: &mut ParserContext,
    resolver: &dyn SourceResolver,
    items: &mut Vec<Item>,
) {
    if tokens.first().map(|t| &t.kind) != Some(&TokenKind::OpenParen) {
        ctx.report(
            file.to_path_buf(),
            Diagnostic::new(line, format!("expected '(' after template invocation \"{}\"", name)),
        );
        return;
    }

    let mut consumed = 1;
    let mut args = Vec::new();
    loop {
        if tokens.get(consumed).map(|t| &t.kind) == Some(&TokenKind::CloseParen) {
            consumed += 1;
            break;
        }
        let value = evaluate_value(&tokens[consumed..], file, line, ctx);
        consumed += value.consumed.max(1);
        if let ConstantValueKind::Error(diag) = &value.kind {
            ctx.report(file.to_path_buf(), diag.clone());
            return;
        }
        args.push(value.kind);
        match tokens.get(consumed).map(|t| &t.kind) {
            Some(TokenKind::Comma) => consumed += 1,
            Some(TokenKind::CloseParen) => {
                consumed += 1;
                break;
            }
            _ => {
                ctx.report(
                    file.to_path_buf(),
                    Diagnostic::new(line, format!("malformed argument list for template \"{}\"", name)),
                );
                return;
            }
        }
    }

    let Some(template) = ctx.templates.get(name).cloned() else {
        ctx.report(file.to_path_buf(), Diagnostic::new(line, format!("unknown template \"{}\"", name)));
        return;
    };

    if template.formal_params.len() != args.len() {
        ctx.report(
            file.to_path_buf(),
            Diagnostic::new(
                line,
                format!(
                    "template \"{}\" expects {} argument(s), found {}",
                    name,
                    template.formal_params.len(),
                    args.len()
                ),
            ),
        );
        return;
    }

    if ctx.template_stack.iter().any(|n| n == name) {
        ctx.report(file.to_path_buf(), Diagnostic::new(line, format!("cyclic template expansion of \"{}\"", name)));
        return;
    }

    let saved_constants = ctx.constants.clone();
    let saved_active_file = ctx.active_file.clone();
    let saved_active_line = ctx.active_line;

    ctx.template_stack.push(name.to_string());
    for (formal, value) in template.formal_params.iter().zip(args.into_iter()) {
        ctx.constants.insert(
            formal.clone(),
            ConstantBinding {
                value: ConstantValue { kind: value, consumed: 0 },
                file: file.to_path_buf(),
                line,
                tokens: Vec::new(),
            },
        );
    }

    ctx.active_file = template.file.clone();
    for (body_line, body_tokens) in &template.body {
        ctx.active_line = *body_line;
        if body_tokens.is_empty() {
            continue;
        }
        process_line(body_tokens, &template.file, *body_line, ctx, resolver, items);
    }

    ctx.active_file = saved_active_file;
    ctx.active_line = saved_active_line;
    ctx.constants = saved_constants;
    ctx.template_stack.pop();
}

fn handle_include(
    tokens: &[Token],
    file: &Path,
    line: usize,
    ctx: &mut ParserContext,
    resolver: &dyn SourceResolver,
    items: &mut Vec<Item>,
) {
    // A malformed `#include` (missing or extra tokens) is already reported
    // by `validate_structure`, which keeps `process_file` from calling this
    // function for such a line at all.
    let Some(TokenKind::StringLiteral(path_text)) = tokens.first().map(|t| &t.kind) else {
        return;
    };
    let path_text = path_text.clone();

    let resolved = ctx.working_directory.join(&path_text);
    if ctx.include_stack.contains(&resolved) {
        ctx.report(file.to_path_buf(), Diagnostic::new(line, format!("cyclic include of \"{}\"", path_text)));
        return;
    }

    ctx.include_stack.push(resolved.clone());
    let child_items = process_file(&resolved, ctx, resolver);
    items.extend(child_items);
    ctx.include_stack.pop();
}

/// The structural validation pass: populates the initial error set before
/// any expansion happens, and returns the set of lines it flagged so
/// `process_file` can skip re-deriving the same diagnostic for them later.
fn validate_structure(line_tokens: &[Vec<Token>], file: &Path, ctx: &mut ParserContext) -> HashSet<usize> {
    let mut in_template = false;
    let mut invalid_lines = HashSet::new();

    for (idx, tokens) in line_tokens.iter().enumerate() {
        let line = idx + 1;
        if tokens.is_empty() {
            continue;
        }
        let first = &tokens[0].kind;
        let first_span = Some(tokens[0].span.into());

        if in_template {
            if matches!(first, TokenKind::TemplateEnd) {
                if tokens.len() > 1 {
                    ctx.report_token(file, line, "template_end must not carry other tokens", first_span);
                    invalid_lines.insert(line);
                }
                in_template = false;
                continue;
            }
            match first {
                TokenKind::ConstantDecl(_) => {
                    ctx.report_token(file, line, "constant declarations are not permitted inside a template body", first_span);
                    invalid_lines.insert(line);
                    continue;
                }
                TokenKind::Include => {
                    ctx.report_token(file, line, "includes are not permitted inside a template body", first_span);
                    invalid_lines.insert(line);
                    continue;
                }
                TokenKind::TemplateBegin(_) => {
                    ctx.report_token(file, line, "nested template_begin is not permitted inside a template body", first_span);
                    invalid_lines.insert(line);
                    continue;
                }
                _ => {}
            }
        }

        match first {
            TokenKind::Operation(_)
            | TokenKind::TemplateInvoke(_)
            | TokenKind::TemplateBegin(_)
            | TokenKind::TemplateEnd
            | TokenKind::ConstantDecl(_)
            | TokenKind::Include
            | TokenKind::Label(_) => {}
            _ => {
                ctx.report_token(file, line, "line does not begin with a valid token", first_span);
                invalid_lines.insert(line);
                continue;
            }
        }

        match first {
            TokenKind::Label(_) if tokens.len() > 1 => {
                ctx.report_token(file, line, "a label line must not carry other tokens", first_span);
                invalid_lines.insert(line);
            }
            TokenKind::TemplateEnd => {
                ctx.report_token(file, line, "template_end without matching template_begin", first_span);
                invalid_lines.insert(line);
            }
            TokenKind::TemplateBegin(_) => {
                in_template = true;
            }
            TokenKind::Include => {
                let ok = tokens.len() == 2 && matches!(tokens[1].kind, TokenKind::StringLiteral(_));
                if !ok {
                    ctx.report_token(file, line, "include must be followed by exactly one string literal", first_span);
                    invalid_lines.insert(line);
                }
            }
            _ => {}
        }
    }

    invalid_lines
}
