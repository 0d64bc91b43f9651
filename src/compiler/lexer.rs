//! Line-oriented tokeniser. Tracks an open block comment across lines and
//! records per-token column spans.

use crate::isa::Opcode;

use super::token::{BuiltinFn, Token, TokenKind, TokenSpan};

const LABEL_BOUNDARY: [char; 4] = [':', ',', '(', ')'];

/// Tokenises a whole file, one token list per source line. The only state
/// carried across lines is whether an unterminated `/* ...` is still open.
pub struct Lexer {
    in_block_comment: bool,
}

impl Lexer {
    pub fn new() -> Lexer {
        Lexer { in_block_comment: false }
    }

    pub fn tokenise_file(lines: &[String]) -> Vec<Vec<Token>> {
        let mut lexer = Lexer::new();
        lines.iter().map(|line| lexer.tokenise_line(line)).collect()
    }

    pub fn tokenise_line(&mut self, line: &str) -> Vec<Token> {
        let chars: Vec<char> = line.chars().collect();
        let mut tokens = Vec::new();
        let mut pos = 0;

        if self.in_block_comment {
            match find_close_comment(&chars, 0) {
                Some(end) => {
                    tokens.push(Token::new(TokenKind::MultiLineComment, TokenSpan::new(0, end)));
                    self.in_block_comment = false;
                    pos = end;
                }
                None => {
                    tokens.push(Token::new(
                        TokenKind::MultiLineComment,
                        TokenSpan::new(0, chars.len()),
                    ));
                    return tokens;
                }
            }
        }

        while pos < chars.len() {
            if chars[pos].is_whitespace() {
                pos += 1;
                continue;
            }

            if let Some((token, next)) = match_operation(&chars, pos) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_builtin_fn(&chars, pos) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_label(&chars, pos) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_number(&chars, pos) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_string(&chars, pos) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_directive(&chars, pos, "#template_begin", |name| {
                TokenKind::TemplateBegin(name)
            }) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_bare_directive(&chars, pos, "#template_end", TokenKind::TemplateEnd) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) =
                match_directive(&chars, pos, "#constant", |name| TokenKind::ConstantDecl(name))
            {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_bare_directive(&chars, pos, "#include", TokenKind::Include) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if chars[pos..].starts_with(&['/', '/']) {
                tokens.push(Token::new(
                    TokenKind::SingleLineComment,
                    TokenSpan::new(pos, chars.len()),
                ));
                pos = chars.len();
                continue;
            }
            if chars[pos..].starts_with(&['/', '*']) {
                match find_close_comment(&chars, pos + 2) {
                    Some(end) => {
                        tokens.push(Token::new(TokenKind::MultiLineComment, TokenSpan::new(pos, end)));
                        pos = end;
                    }
                    None => {
                        tokens.push(Token::new(
                            TokenKind::MultiLineComment,
                            TokenSpan::new(pos, chars.len()),
                        ));
                        self.in_block_comment = true;
                        return tokens;
                    }
                }
                continue;
            }
            if let Some((token, next)) = match_template_invoke(&chars, pos) {
                tokens.push(token);
                pos = next;
                continue;
            }
            if let Some((token, next)) = match_bare_identifier(&chars, pos) {
                tokens.push(token);
                pos = next;
                continue;
            }
            match chars[pos] {
                ',' => {
                    tokens.push(Token::new(TokenKind::Comma, TokenSpan::new(pos, pos + 1)));
                    pos += 1;
                }
                '(' => {
                    tokens.push(Token::new(TokenKind::OpenParen, TokenSpan::new(pos, pos + 1)));
                    pos += 1;
                }
                ')' => {
                    tokens.push(Token::new(TokenKind::CloseParen, TokenSpan::new(pos, pos + 1)));
                    pos += 1;
                }
                c => {
                    tokens.push(Token::new(
                        TokenKind::Unknown(c.to_string()),
                        TokenSpan::new(pos, pos + 1),
                    ));
                    pos += 1;
                }
            }
        }

        tokens
    }
}

fn find_close_comment(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return Some(i + 2);
        }
        i += 1;
    }
    None
}

fn scan_word(chars: &[char], pos: usize) -> usize {
    let mut end = pos;
    while end < chars.len() && !chars[end].is_whitespace() && !LABEL_BOUNDARY.contains(&chars[end]) {
        end += 1;
    }
    end
}

fn is_boundary(chars: &[char], pos: usize) -> bool {
    pos >= chars.len() || chars[pos].is_whitespace() || chars[pos] == ',' || chars[pos] == ')'
}

fn match_operation(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    let rest: String = chars[pos..].iter().collect();
    for value in 0..32u16 {
        let op = Opcode::from_u16(value).unwrap();
        let mnemonic = op.mnemonic();
        if rest.len() >= mnemonic.len() && rest[..mnemonic.len()].eq_ignore_ascii_case(mnemonic) {
            let end = pos + mnemonic.chars().count();
            if end == chars.len() || chars[end].is_whitespace() {
                return Some((
                    Token::new(TokenKind::Operation(op), TokenSpan::new(pos, end)),
                    end,
                ));
            }
        }
    }
    None
}

fn match_builtin_fn(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    let end = scan_word(chars, pos);
    if end == pos || end >= chars.len() || chars[end] != '(' {
        return None;
    }
    let word: String = chars[pos..end].iter().collect();
    let builtin = BuiltinFn::from_name(&word)?;
    Some((Token::new(TokenKind::Function(builtin), TokenSpan::new(pos, end)), end))
}

fn match_label(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    let end = scan_word(chars, pos);
    if end == pos || end >= chars.len() || chars[end] != ':' {
        return None;
    }
    let mut label_end = end + 1;
    if label_end < chars.len() && (chars[label_end] == 'f' || chars[label_end] == 'b') {
        let after = label_end + 1;
        if is_boundary(chars, after) {
            label_end = after;
        }
    }
    let text: String = chars[pos..label_end].iter().collect();
    Some((Token::new(TokenKind::Label(text), TokenSpan::new(pos, label_end)), label_end))
}

fn match_number(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    let mut end = pos;
    let negative = chars.get(end) == Some(&'-');
    if negative {
        end += 1;
    }
    let digits_start = end;
    let hex = chars.get(end) == Some(&'0')
        && (chars.get(end + 1) == Some(&'x') || chars.get(end + 1) == Some(&'X'));
    if hex {
        end += 2;
        let hex_start = end;
        while end < chars.len() && chars[end].is_ascii_hexdigit() {
            end += 1;
        }
        if end == hex_start {
            return None;
        }
        let text: String = chars[hex_start..end].iter().collect();
        let magnitude = i128::from_str_radix(&text, 16).ok()?;
        let value = if negative { -magnitude } else { magnitude };
        return Some((Token::new(TokenKind::NumberLiteral(value), TokenSpan::new(pos, end)), end));
    }
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    let text: String = chars[digits_start..end].iter().collect();
    let magnitude: i128 = text.parse().ok()?;
    let value = if negative { -magnitude } else { magnitude };
    Some((Token::new(TokenKind::NumberLiteral(value), TokenSpan::new(pos, end)), end))
}

fn match_string(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    if chars.get(pos) != Some(&'"') {
        return None;
    }
    let mut end = pos + 1;
    while end < chars.len() && chars[end] != '"' {
        end += 1;
    }
    if end >= chars.len() {
        return None;
    }
    let content: String = chars[pos + 1..end].iter().collect();
    let span_end = end + 1;
    Some((
        Token::new(TokenKind::StringLiteral(content), TokenSpan::new(pos, span_end)),
        span_end,
    ))
}

fn match_directive(
    chars: &[char],
    pos: usize,
    keyword: &str,
    make: impl FnOnce(String) -> TokenKind,
) -> Option<(Token, usize)> {
    let rest: String = chars[pos..].iter().collect();
    if !rest.starts_with(keyword) {
        return None;
    }
    let after_keyword = pos + keyword.chars().count();
    let mut name_start = after_keyword;
    while name_start < chars.len() && chars[name_start].is_whitespace() {
        name_start += 1;
    }
    if name_start == after_keyword {
        return None; // requires whitespace before the name
    }
    let name_end = scan_word(chars, name_start);
    if name_end == name_start {
        return None;
    }
    let name: String = chars[name_start..name_end].iter().collect();
    Some((Token::new(make(name), TokenSpan::new(pos, name_end)), name_end))
}

fn match_bare_directive(
    chars: &[char],
    pos: usize,
    keyword: &str,
    kind: TokenKind,
) -> Option<(Token, usize)> {
    let rest: String = chars[pos..].iter().collect();
    if !rest.starts_with(keyword) {
        return None;
    }
    let end = pos + keyword.chars().count();
    if end < chars.len() && !chars[end].is_whitespace() && chars[end] != '"' {
        return None;
    }
    Some((Token::new(kind, TokenSpan::new(pos, end)), end))
}

fn match_template_invoke(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    let end = scan_word(chars, pos);
    if end == pos || end >= chars.len() || chars[end] != '(' {
        return None;
    }
    let name: String = chars[pos..end].iter().collect();
    Some((Token::new(TokenKind::TemplateInvoke(name), TokenSpan::new(pos, end)), end))
}

fn match_bare_identifier(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    let end = scan_word(chars, pos);
    if end == pos {
        return None;
    }
    let name: String = chars[pos..end].iter().collect();
    Some((Token::new(TokenKind::ConstantRef(name), TokenSpan::new(pos, end)), end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new();
        lexer.tokenise_line(line).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_operation_with_operands() {
        let kinds = kinds("store 0x10 42");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Operation(Opcode::Store),
                TokenKind::NumberLiteral(0x10),
                TokenKind::NumberLiteral(42),
            ]
        );
    }

    #[test]
    fn operation_mnemonic_inside_longer_identifier_is_not_an_operation() {
        // "origin" starts with "or" (a mnemonic) but has no boundary after it.
        let kinds = kinds("origin");
        assert_eq!(kinds, vec![TokenKind::ConstantRef("origin".to_string())]);
    }

    #[test]
    fn lexes_builtin_function_call() {
        let kinds = kinds("colour(255,255,0,255)");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Function(BuiltinFn::Colour),
                TokenKind::OpenParen,
                TokenKind::NumberLiteral(255),
                TokenKind::Comma,
                TokenKind::NumberLiteral(255),
                TokenKind::Comma,
                TokenKind::NumberLiteral(0),
                TokenKind::Comma,
                TokenKind::NumberLiteral(255),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn lexes_label_definition_and_direction_suffixes() {
        assert_eq!(kinds("loop:"), vec![TokenKind::Label("loop:".to_string())]);
        assert_eq!(
            kinds("jmp COND loop:b"),
            vec![
                TokenKind::Operation(Opcode::Jmp),
                TokenKind::ConstantRef("COND".to_string()),
                TokenKind::Label("loop:b".to_string()),
            ]
        );
        assert_eq!(
            kinds("jmp COND END:f"),
            vec![
                TokenKind::Operation(Opcode::Jmp),
                TokenKind::ConstantRef("COND".to_string()),
                TokenKind::Label("END:f".to_string()),
            ]
        );
    }

    #[test]
    fn lexes_negative_and_hex_numbers() {
        assert_eq!(kinds("-1"), vec![TokenKind::NumberLiteral(-1)]);
        assert_eq!(kinds("0xFF"), vec![TokenKind::NumberLiteral(255)]);
        assert_eq!(kinds("-0x10"), vec![TokenKind::NumberLiteral(-16)]);
    }

    #[test]
    fn lexes_string_literal() {
        assert_eq!(kinds("\"hello\""), vec![TokenKind::StringLiteral("hello".to_string())]);
    }

    #[test]
    fn lexes_directives() {
        assert_eq!(
            kinds("#constant YELLOW colour(255,255,0,255)"),
            vec![
                TokenKind::ConstantDecl("YELLOW".to_string()),
                TokenKind::Function(BuiltinFn::Colour),
                TokenKind::OpenParen,
                TokenKind::NumberLiteral(255),
                TokenKind::Comma,
                TokenKind::NumberLiteral(255),
                TokenKind::Comma,
                TokenKind::NumberLiteral(0),
                TokenKind::Comma,
                TokenKind::NumberLiteral(255),
                TokenKind::CloseParen,
            ]
        );
        assert_eq!(
            kinds("#include \"other.sos\""),
            vec![TokenKind::Include, TokenKind::StringLiteral("other.sos".to_string())]
        );
        assert_eq!(kinds("#template_end"), vec![TokenKind::TemplateEnd]);
        assert_eq!(
            kinds("#template_begin JMP(L)"),
            vec![
                TokenKind::TemplateBegin("JMP".to_string()),
                TokenKind::OpenParen,
                TokenKind::ConstantRef("L".to_string()),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn single_line_comment_consumes_rest_of_line() {
        assert_eq!(
            kinds("store 0x10 1 // comment"),
            vec![
                TokenKind::Operation(Opcode::Store),
                TokenKind::NumberLiteral(0x10),
                TokenKind::NumberLiteral(1),
                TokenKind::SingleLineComment,
            ]
        );
    }

    #[test]
    fn block_comment_spans_multiple_lines() {
        let mut lexer = Lexer::new();
        let first = lexer.tokenise_line("store 0x10 1 /* start of comment");
        assert!(lexer.in_block_comment);
        assert_eq!(
            first,
            vec![
                Token::new(TokenKind::Operation(Opcode::Store), TokenSpan::new(0, 5)),
                Token::new(TokenKind::NumberLiteral(0x10), TokenSpan::new(6, 10)),
                Token::new(TokenKind::NumberLiteral(1), TokenSpan::new(11, 12)),
                Token::new(TokenKind::MultiLineComment, TokenSpan::new(13, 33)),
            ]
        );
        let second = lexer.tokenise_line("still a comment */ store 0x20 2");
        assert!(!lexer.in_block_comment);
        assert_eq!(second[0].kind, TokenKind::MultiLineComment);
        assert_eq!(second[1].kind, TokenKind::Operation(Opcode::Store));
    }

    #[test]
    fn template_invocation_is_distinguished_from_constant_ref() {
        assert_eq!(
            kinds("JMP(loop:)"),
            vec![
                TokenKind::TemplateInvoke("JMP".to_string()),
                TokenKind::OpenParen,
                TokenKind::Label("loop:".to_string()),
                TokenKind::CloseParen,
            ]
        );
        assert_eq!(kinds("COND"), vec![TokenKind::ConstantRef("COND".to_string())]);
    }

    #[test]
    fn lexer_totality_reconstructs_the_line() {
        let line = "store 0x10 YELLOW // trailing comment";
        let mut lexer = Lexer::new();
        let tokens = lexer.tokenise_line(line);
        let chars: Vec<char> = line.chars().collect();
        let mut cursor = 0;
        for token in &tokens {
            assert!(chars[cursor..token.span.start()].iter().all(|c| c.is_whitespace()));
            cursor = token.span.end();
        }
        assert!(chars[cursor..].iter().all(|c| c.is_whitespace()));
    }
}
