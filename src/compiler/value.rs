//! The value evaluator: folds a value expression (literal, constant
//! reference, label, or builtin function call) into a [ConstantValue].

use std::path::Path;

use crate::logging::Diagnostic;

use super::context::ParserContext;
use super::token::{BuiltinFn, Token, TokenKind};

/// A folded value: a number, a string, a (possibly still-unresolved) label
/// reference, or an error — plus how many source tokens it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantValue {
    pub kind: ConstantValueKind,
    pub consumed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValueKind {
    Number(i128),
    String(String),
    Label(String),
    Error(Diagnostic),
}

impl ConstantValue {
    fn error_at(
        ctx: &ParserContext,
        file: &Path,
        line: usize,
        message: impl Into<String>,
        consumed: usize,
        span: Option<crate::logging::Span>,
    ) -> ConstantValue {
        ConstantValue { kind: ConstantValueKind::Error(ctx.diagnostic_for(file, line, message, span)), consumed }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ConstantValueKind::Error(_))
    }
}

/// Evaluate a value expression from the front of `tokens`. Always consumes
/// at least one token (reports an error on the token it stalls on) unless
/// `tokens` is empty, in which case it consumes zero and reports an error
/// attributed to `line`.
pub fn evaluate_value(tokens: &[Token], file: &Path, line: usize, ctx: &ParserContext) -> ConstantValue {
    let Some(first) = tokens.first() else {
        return ConstantValue::error_at(ctx, file, line, "expected a value, found end of line", 0, None);
    };
    let span = Some(first.span.into());

    match &first.kind {
        TokenKind::NumberLiteral(n) => {
            ConstantValue { kind: ConstantValueKind::Number(*n), consumed: 1 }
        }
        TokenKind::StringLiteral(s) => {
            ConstantValue { kind: ConstantValueKind::String(s.clone()), consumed: 1 }
        }
        TokenKind::Label(text) => {
            ConstantValue { kind: ConstantValueKind::Label(text.clone()), consumed: 1 }
        }
        TokenKind::ConstantRef(name) => match ctx.constants.get(name) {
            Some(binding) => ConstantValue { kind: binding.value.kind.clone(), consumed: 1 },
            None => ConstantValue::error_at(ctx, file, line, format!("unknown constant \"{}\"", name), 1, span),
        },
        TokenKind::Function(builtin) => evaluate_function(*builtin, tokens, file, line, ctx),
        _ => ConstantValue::error_at(ctx, file, line, "expected a value", 1, span),
    }
}

fn evaluate_function(
    builtin: BuiltinFn,
    tokens: &[Token],
    file: &Path,
    line: usize,
    ctx: &ParserContext,
) -> ConstantValue {
    let arity = builtin.arity();
    let mut consumed = 1; // the function-name token itself
    let name_span = tokens.first().map(|t| t.span.into());

    if tokens.get(consumed).map(|t| &t.kind) != Some(&TokenKind::OpenParen) {
        return ConstantValue::error_at(ctx, file, line, usage_message(builtin), consumed, name_span);
    }
    consumed += 1;

    let mut args = Vec::with_capacity(arity);
    for i in 0..arity {
        let arg = evaluate_value(&tokens[consumed..], file, line, ctx);
        consumed += arg.consumed.max(1);
        if arg.is_error() {
            return ConstantValue::error_at(ctx, file, line, usage_message(builtin), consumed, name_span);
        }
        args.push(arg.kind);

        if i + 1 < arity {
            if tokens.get(consumed).map(|t| &t.kind) != Some(&TokenKind::Comma) {
                return ConstantValue::error_at(ctx, file, line, usage_message(builtin), consumed, name_span);
            }
            consumed += 1;
        }
    }

    if tokens.get(consumed).map(|t| &t.kind) != Some(&TokenKind::CloseParen) {
        return ConstantValue::error_at(ctx, file, line, usage_message(builtin), consumed, name_span);
    }
    consumed += 1;

    match pack(builtin, &args, ctx) {
        Ok(value) => ConstantValue { kind: ConstantValueKind::Number(value), consumed },
        Err(message) => ConstantValue::error_at(ctx, file, line, message, consumed, name_span),
    }
}

fn usage_message(builtin: BuiltinFn) -> String {
    let usage = match builtin {
        BuiltinFn::Colour => "colour(r, g, b, a) where each argument is 0..255",
        BuiltinFn::Rect => "rect(x, y, w, h) where each argument is 0..0xFFFF",
        BuiltinFn::KeyPressed => "key_pressed(code) where code is 0..2^48-1",
        BuiltinFn::KeyReleased => "key_released(code) where code is 0..2^48-1",
        BuiltinFn::MousePressed => "mouse_pressed(x, y, button) where each argument is 0..0xFFFF",
        BuiltinFn::MouseReleased => "mouse_released(x, y, button) where each argument is 0..0xFFFF",
        BuiltinFn::Music => "music(name) where name is a registered music asset",
        BuiltinFn::Sound => "sound(name) where name is a registered sound asset",
        BuiltinFn::Sprite => "sprite(name) where name is a registered sprite asset",
    };
    format!("incorrect usage of {}: expected {}", builtin.name(), usage)
}

fn number_in_range(value: &ConstantValueKind, max: i128) -> Result<i128, ()> {
    match value {
        ConstantValueKind::Number(n) if *n >= 0 && *n <= max => Ok(*n),
        _ => Err(()),
    }
}

fn pack(builtin: BuiltinFn, args: &[ConstantValueKind], ctx: &ParserContext) -> Result<i128, String> {
    match builtin {
        BuiltinFn::Colour => {
            let [r, g, b, a] = take4(args);
            let (r, g, b, a) = (
                number_in_range(r, 255).map_err(|_| usage_message(builtin))?,
                number_in_range(g, 255).map_err(|_| usage_message(builtin))?,
                number_in_range(b, 255).map_err(|_| usage_message(builtin))?,
                number_in_range(a, 255).map_err(|_| usage_message(builtin))?,
            );
            Ok(a | (b << 8) | (g << 16) | (r << 24))
        }
        BuiltinFn::Rect => {
            let [x, y, w, h] = take4(args);
            let (x, y, w, h) = (
                number_in_range(x, 0xFFFF).map_err(|_| usage_message(builtin))?,
                number_in_range(y, 0xFFFF).map_err(|_| usage_message(builtin))?,
                number_in_range(w, 0xFFFF).map_err(|_| usage_message(builtin))?,
                number_in_range(h, 0xFFFF).map_err(|_| usage_message(builtin))?,
            );
            Ok(h | (w << 16) | (y << 32) | (x << 48))
        }
        BuiltinFn::KeyPressed | BuiltinFn::KeyReleased => {
            let code = number_in_range(&args[0], (1i128 << 48) - 1).map_err(|_| usage_message(builtin))?;
            let tag = if builtin == BuiltinFn::KeyPressed { 3 } else { 4 };
            Ok((code & 0xFFFF_FFFF_FFFF) | (tag << 48))
        }
        BuiltinFn::MousePressed | BuiltinFn::MouseReleased => {
            let [x, y, button] = take3(args);
            let (x, y, button) = (
                number_in_range(x, 0xFFFF).map_err(|_| usage_message(builtin))?,
                number_in_range(y, 0xFFFF).map_err(|_| usage_message(builtin))?,
                number_in_range(button, 0xFFFF).map_err(|_| usage_message(builtin))?,
            );
            let tag = if builtin == BuiltinFn::MousePressed { 1 } else { 2 };
            Ok(button | (y << 16) | (x << 32) | (tag << 48))
        }
        BuiltinFn::Music => lookup_asset(&args[0], &ctx.music, builtin),
        BuiltinFn::Sound => lookup_asset(&args[0], &ctx.sounds, builtin),
        BuiltinFn::Sprite => lookup_asset(&args[0], &ctx.sprites, builtin),
    }
}

fn lookup_asset(
    arg: &ConstantValueKind,
    table: &std::collections::HashMap<String, u32>,
    builtin: BuiltinFn,
) -> Result<i128, String> {
    match arg {
        ConstantValueKind::String(name) => table
            .get(name)
            .map(|&index| index as i128)
            .ok_or_else(|| format!("unknown {} asset \"{}\"", builtin.name(), name)),
        _ => Err(usage_message(builtin)),
    }
}

fn take3(args: &[ConstantValueKind]) -> [&ConstantValueKind; 3] {
    [&args[0], &args[1], &args[2]]
}

fn take4(args: &[ConstantValueKind]) -> [&ConstantValueKind; 4] {
    [&args[0], &args[1], &args[2], &args[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;
    use std::path::Path;

    fn eval(line: &str, ctx: &ParserContext) -> ConstantValue {
        let mut lexer = Lexer::new();
        let tokens = lexer.tokenise_line(line);
        evaluate_value(&tokens, Path::new("test.sos"), 1, ctx)
    }

    #[test]
    fn colour_packs_argb_little_endian() {
        let ctx = ParserContext::new_for_test();
        let value = eval("colour(255,255,0,255)", &ctx);
        assert_eq!(value.kind, ConstantValueKind::Number(0xFFFF00FF));
        let bytes = (0xFFFF00FFu32).to_le_bytes();
        assert_eq!(bytes, [0xFF, 0x00, 0xFF, 0xFF]); // a,b,g,r
    }

    #[test]
    fn rect_packs_in_order() {
        let ctx = ParserContext::new_for_test();
        let value = eval("rect(1,2,3,4)", &ctx);
        assert_eq!(value.kind, ConstantValueKind::Number(4 | (3 << 16) | (2 << 32) | (1 << 48)));
    }

    #[test]
    fn colour_rejects_out_of_range_argument() {
        let ctx = ParserContext::new_for_test();
        let value = eval("colour(256,0,0,0)", &ctx);
        assert!(value.is_error());
    }

    #[test]
    fn music_resolves_registered_asset_index() {
        let mut ctx = ParserContext::new_for_test();
        ctx.music.insert("theme".to_string(), 3);
        let value = eval("music(\"theme\")", &ctx);
        assert_eq!(value.kind, ConstantValueKind::Number(3));
    }

    #[test]
    fn music_rejects_unknown_asset_name() {
        let ctx = ParserContext::new_for_test();
        let value = eval("music(\"missing\")", &ctx);
        assert!(value.is_error());
    }

    #[test]
    fn label_is_not_accepted_as_function_argument() {
        let ctx = ParserContext::new_for_test();
        let value = eval("key_pressed(loop:)", &ctx);
        assert!(value.is_error());
    }
}
