#![forbid(unsafe_code)]

mod error;
mod parser;

use std::sync::Arc;

use skein_ast::{Block, FunctionProto, Span};
use skein_lex::Lexer;

pub use error::{ParseError, SyntaxError};
pub use parser::{MAX_NESTING, Parser};

pub fn parse_source(src: &str, chunk: &str) -> Result<skein_ast::Program, SyntaxError> {
    let tokens = Lexer::new(src).lex()?;
    let mut parser = Parser::new(&tokens, chunk);
    Ok(parser.parse_program()?)
}

pub fn parse_expr(src: &str) -> Result<skein_ast::Expr, SyntaxError> {
    let tokens = Lexer::new(src).lex()?;
    let mut parser = Parser::new(&tokens, "=expr");
    Ok(parser.parse_expr_eof()?)
}

/// Compile a whole chunk into the variadic function that runs it.
///
/// Arguments passed to the chunk are reachable through `...`.
pub fn compile_chunk(src: &str, chunk: &str) -> Result<Arc<FunctionProto>, SyntaxError> {
    let program = parse_source(src, chunk)?;
    let span = Span::new(0, src.len(), 1);
    Ok(Arc::new(FunctionProto {
        name: None,
        chunk: chunk.to_string(),
        span,
        params: Vec::new(),
        variadic: true,
        main: true,
        body: Block {
            span,
            stmts: program.stmts,
        },
    }))
}
