#![forbid(unsafe_code)]

mod lexer;
mod token;

pub use lexer::{LexError, Lexer};
pub use token::{Token, TokenKind};

#[cfg(test)]
mod tests {
	use super::*;

	fn kinds(src: &str) -> Vec<TokenKind> {
		Lexer::new(src).lex().unwrap().into_iter().map(|t| t.kind).collect()
	}

	#[test]
	fn lex_numbers_in_decimal_float_and_hex() {
		let nums: Vec<f64> = kinds("1_000 2.5 1e3 0xFF")
			.into_iter()
			.filter_map(|k| match k {
				TokenKind::Number(n) => Some(n),
				_ => None,
			})
			.collect();
		assert_eq!(nums, vec![1000.0, 2.5, 1000.0, 255.0]);
	}

	#[test]
	fn lex_dots_prefer_longest_operator() {
		assert_eq!(
			kinds("a .. b ... c.d"),
			vec![
				TokenKind::Ident("a".into()),
				TokenKind::DotDot,
				TokenKind::Ident("b".into()),
				TokenKind::Ellipsis,
				TokenKind::Ident("c".into()),
				TokenKind::Dot,
				TokenKind::Ident("d".into()),
				TokenKind::Eof,
			]
		);
	}

	#[test]
	fn lex_string_escapes_in_both_quote_styles() {
		let strings: Vec<String> = kinds(r#""a\n\t\"" 'it\'s' "\u{41}""#)
			.into_iter()
			.filter_map(|k| match k {
				TokenKind::String(s) => Some(s),
				_ => None,
			})
			.collect();
		assert_eq!(strings, vec!["a\n\t\"", "it's", "A"]);
	}

	#[test]
	fn lex_skips_comments_but_keeps_newlines() {
		assert_eq!(
			kinds("let x // trailing\n# whole line\nx"),
			vec![
				TokenKind::KwLet,
				TokenKind::Ident("x".into()),
				TokenKind::Newline,
				TokenKind::Newline,
				TokenKind::Ident("x".into()),
				TokenKind::Eof,
			]
		);
	}

	#[test]
	fn lex_tracks_line_numbers() {
		let tokens = Lexer::new("a\n\nb").lex().unwrap();
		let b = tokens
			.iter()
			.find(|t| t.kind == TokenKind::Ident("b".into()))
			.unwrap();
		assert_eq!(b.span.line, 3);
	}

	#[test]
	fn lex_rejects_unknown_escape() {
		let err = Lexer::new("let s = \"\\q\"").lex().unwrap_err();
		assert!(err.message.contains("invalid string literal"));
	}

	#[test]
	fn lex_rejects_stray_characters() {
		let err = Lexer::new("let a = 1 @ 2").lex().unwrap_err();
		assert_eq!(err.message, "unexpected character");
		assert_eq!(err.line, 1);
	}
}
