#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use logos::Logos;
use miette::Diagnostic;
use skein_ast::Span;
use thiserror::Error;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(skein::lex))]
#[allow(unused_assignments)]
pub struct LexError {
    pub message: String,
    pub line: u32,
    #[label]
    pub span: miette::SourceSpan,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r]+|//[^\n]*|#[^\n]*")]
enum RawToken {
    #[token("let")]
    KwLet,
    #[token("fn")]
    KwFn,
    #[token("return")]
    KwReturn,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("for")]
    KwFor,
    #[token("in")]
    KwIn,
    #[token("break")]
    KwBreak,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,
    #[token("nil")]
    KwNil,
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("not")]
    KwNot,

    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("...")]
    Ellipsis,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token("\n")]
    Newline,

    #[regex(r"0x[0-9a-fA-F_]+", |lex| parse_hex(lex.slice()))]
    #[regex(r"[0-9][0-9_]*(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| parse_decimal(lex.slice()))]
    Number(Option<f64>),

    // Supported escapes: \n, \t, \r, \0, \", \', \\, and \u{HEX} (1-6 hex digits)
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, parse_string)]
    String(Option<String>),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn parse_decimal(s: &str) -> Option<f64> {
    let digits = strip_underscores(s)?;
    digits.parse::<f64>().ok()
}

fn parse_hex(s: &str) -> Option<f64> {
    let digits = strip_underscores(s.get(2..)?)?;
    u64::from_str_radix(&digits, 16).ok().map(|n| n as f64)
}

fn strip_underscores(s: &str) -> Option<String> {
    if s.is_empty() || s.ends_with('_') || s.contains("__") || s.starts_with('_') {
        return None;
    }
    Some(s.replace('_', ""))
}

fn parse_string(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    let quoted = lex.slice();
    let body = quoted.get(1..quoted.len() - 1)?;
    let mut decoded = String::with_capacity(body.len());
    let mut rest = body.chars();

    while let Some(c) = rest.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }
        let unescaped = match rest.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            q @ ('"' | '\'' | '\\') => q,
            'u' => unicode_escape(&mut rest)?,
            _ => return None,
        };
        decoded.push(unescaped);
    }

    Some(decoded)
}

/// Reads the `{HEX}` part of a `\u{HEX}` escape, 1 to 6 digits.
fn unicode_escape(rest: &mut std::str::Chars<'_>) -> Option<char> {
    if rest.next()? != '{' {
        return None;
    }
    let mut digits = String::new();
    loop {
        match rest.next()? {
            '}' => break,
            c => digits.push(c),
        }
    }
    if digits.is_empty() || digits.len() > 6 {
        return None;
    }
    char::from_u32(u32::from_str_radix(&digits, 16).ok()?)
}

/// Maps byte offsets to 1-based line numbers.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(src: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> u32 {
        let idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (idx + 1) as u32
    }
}

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn lex(&self) -> Result<Vec<Token>, LexError> {
        let lines = LineIndex::new(self.src);
        let mut tokens = Vec::new();
        let mut lex = RawToken::lexer(self.src);

        while let Some(raw) = lex.next() {
            let range = lex.span();
            let span = Span::new(range.start, range.end - range.start, lines.line_of(range.start));
            let fail = |message: &str| LexError {
                message: message.to_string(),
                line: span.line,
                span: span.into(),
            };

            let kind = match raw {
                Ok(RawToken::KwLet) => TokenKind::KwLet,
                Ok(RawToken::KwFn) => TokenKind::KwFn,
                Ok(RawToken::KwReturn) => TokenKind::KwReturn,
                Ok(RawToken::KwIf) => TokenKind::KwIf,
                Ok(RawToken::KwElse) => TokenKind::KwElse,
                Ok(RawToken::KwWhile) => TokenKind::KwWhile,
                Ok(RawToken::KwFor) => TokenKind::KwFor,
                Ok(RawToken::KwIn) => TokenKind::KwIn,
                Ok(RawToken::KwBreak) => TokenKind::KwBreak,
                Ok(RawToken::KwTrue) => TokenKind::KwTrue,
                Ok(RawToken::KwFalse) => TokenKind::KwFalse,
                Ok(RawToken::KwNil) => TokenKind::KwNil,
                Ok(RawToken::KwAnd) => TokenKind::KwAnd,
                Ok(RawToken::KwOr) => TokenKind::KwOr,
                Ok(RawToken::KwNot) => TokenKind::KwNot,

                Ok(RawToken::EqEq) => TokenKind::EqEq,
                Ok(RawToken::Neq) => TokenKind::Neq,
                Ok(RawToken::Le) => TokenKind::Le,
                Ok(RawToken::Ge) => TokenKind::Ge,
                Ok(RawToken::Lt) => TokenKind::Lt,
                Ok(RawToken::Gt) => TokenKind::Gt,
                Ok(RawToken::Eq) => TokenKind::Eq,

                Ok(RawToken::Plus) => TokenKind::Plus,
                Ok(RawToken::Minus) => TokenKind::Minus,
                Ok(RawToken::Star) => TokenKind::Star,
                Ok(RawToken::Slash) => TokenKind::Slash,
                Ok(RawToken::Percent) => TokenKind::Percent,

                Ok(RawToken::Ellipsis) => TokenKind::Ellipsis,
                Ok(RawToken::DotDot) => TokenKind::DotDot,
                Ok(RawToken::Dot) => TokenKind::Dot,
                Ok(RawToken::Comma) => TokenKind::Comma,
                Ok(RawToken::Colon) => TokenKind::Colon,
                Ok(RawToken::Semi) => TokenKind::Semi,

                Ok(RawToken::LParen) => TokenKind::LParen,
                Ok(RawToken::RParen) => TokenKind::RParen,
                Ok(RawToken::LBrace) => TokenKind::LBrace,
                Ok(RawToken::RBrace) => TokenKind::RBrace,
                Ok(RawToken::LBracket) => TokenKind::LBracket,
                Ok(RawToken::RBracket) => TokenKind::RBracket,

                Ok(RawToken::Newline) => TokenKind::Newline,

                Ok(RawToken::Ident(s)) => TokenKind::Ident(s),
                Ok(RawToken::Number(Some(n))) => TokenKind::Number(n),
                Ok(RawToken::Number(None)) => return Err(fail("invalid number literal")),
                Ok(RawToken::String(Some(s))) => TokenKind::String(s),
                Ok(RawToken::String(None)) => return Err(fail("invalid string literal")),

                Err(_) => {
                    let message = if lex.slice().starts_with(['"', '\'']) {
                        "unterminated string literal"
                    } else {
                        "unexpected character"
                    };
                    return Err(fail(message));
                }
            };

            tokens.push(Token { kind, span });
        }

        let end = self.src.len();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, 0, lines.line_of(end)),
        });

        Ok(tokens)
    }
}
