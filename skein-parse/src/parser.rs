#![forbid(unsafe_code)]

use std::mem;
use std::sync::Arc;

use skein_ast::{
    AssignStmt, BinOp, Block, Expr, ExprKind, FnDef, ForStmt, FunctionProto, Ident, IfStmt,
    LetStmt, Program, ReturnStmt, Span, Spanned, Stmt, UnaryOp, WhileStmt,
};
use skein_lex::{Token, TokenKind};

use crate::error::ParseError;

/// Deepest nesting of expressions and blocks a chunk may use.
pub const MAX_NESTING: usize = 200;

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
    chunk: String,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], chunk: impl Into<String>) -> Self {
        Self {
            tokens,
            idx: 0,
            chunk: chunk.into(),
            depth: 0,
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let stmt = match self.peek_kind() {
            Some(TokenKind::KwLet) => Stmt::Let(self.parse_let_stmt()?),
            Some(TokenKind::KwFn) if matches!(self.peek_kind_n(1), Some(TokenKind::Ident(_))) => {
                Stmt::FnDef(self.parse_fn_def()?)
            }
            Some(TokenKind::KwIf) => return Ok(Stmt::If(self.parse_if_stmt()?)),
            Some(TokenKind::KwWhile) => return Ok(Stmt::While(self.parse_while_stmt()?)),
            Some(TokenKind::KwFor) => return Ok(Stmt::For(self.parse_for_stmt()?)),
            Some(TokenKind::KwReturn) => Stmt::Return(self.parse_return_stmt()?),
            Some(TokenKind::KwBreak) => {
                let tok = self.expect(TokenKind::KwBreak)?;
                Stmt::Break(tok.span)
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.at(TokenKind::Eq) {
                    self.next();
                    self.skip_newlines();
                    if !matches!(
                        expr.kind,
                        ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Member { .. }
                    ) {
                        return Err(ParseError::new("invalid assignment target", expr.span));
                    }
                    let value = self.parse_expr()?;
                    Stmt::Assign(AssignStmt {
                        span: expr.span.join(value.span),
                        target: expr,
                        expr: value,
                    })
                } else {
                    Stmt::ExprStmt(expr)
                }
            }
        };
        self.expect_stmt_terminator()?;
        Ok(stmt)
    }

    fn parse_let_stmt(&mut self) -> Result<LetStmt, ParseError> {
        let kw = self.expect(TokenKind::KwLet)?;
        let mut names = vec![self.expect_ident()?];
        while self.at(TokenKind::Comma) {
            self.next();
            names.push(self.expect_ident()?);
        }

        let mut exprs = Vec::new();
        if self.at(TokenKind::Eq) {
            self.next();
            self.skip_newlines();
            exprs = self.parse_expr_list()?;
        }

        let end = exprs
            .last()
            .map(|e| e.span)
            .or_else(|| names.last().map(|n| n.span))
            .unwrap_or(kw.span);
        Ok(LetStmt {
            span: kw.span.join(end),
            names,
            exprs,
        })
    }

    fn parse_fn_def(&mut self) -> Result<FnDef, ParseError> {
        let kw = self.expect(TokenKind::KwFn)?;
        let name = self.expect_ident()?;
        let proto = self.parse_function_rest(kw.span, Some(name.node.clone()))?;
        Ok(FnDef {
            span: proto.span,
            name,
            proto,
        })
    }

    /// Parses `(params) { body }` after the `fn` keyword (and optional name).
    fn parse_function_rest(
        &mut self,
        start: Span,
        name: Option<String>,
    ) -> Result<Arc<FunctionProto>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut params: Vec<Ident> = Vec::new();
        let mut variadic = false;
        self.skip_newlines();
        while !self.at(TokenKind::RParen) {
            if self.at(TokenKind::Ellipsis) {
                self.next();
                variadic = true;
                self.skip_newlines();
                break;
            }
            let param = self.expect_ident()?;
            if params.iter().any(|p| p.node == param.node) {
                return Err(ParseError::new(
                    format!("duplicate parameter '{}'", param.node),
                    param.span,
                ));
            }
            params.push(param);
            self.skip_newlines();
            if !self.at(TokenKind::Comma) {
                break;
            }
            self.next();
            self.skip_newlines();
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;

        Ok(Arc::new(FunctionProto {
            name,
            chunk: self.chunk.clone(),
            span: start.join(body.span),
            params,
            variadic,
            main: false,
            body,
        }))
    }

    fn parse_if_stmt(&mut self) -> Result<IfStmt, ParseError> {
        let kw = self.expect(TokenKind::KwIf)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;

        let mut else_block = None;
        if self.peek_past_newlines_is(TokenKind::KwElse) {
            self.skip_newlines();
            let else_tok = self.expect(TokenKind::KwElse)?;
            if self.at(TokenKind::KwIf) {
                let nested = self.nested(Self::parse_if_stmt)?;
                else_block = Some(Block {
                    span: else_tok.span.join(nested.span),
                    stmts: vec![Stmt::If(nested)],
                });
            } else {
                else_block = Some(self.parse_block()?);
            }
        }

        let end = else_block.as_ref().map_or(then_block.span, |b| b.span);
        Ok(IfStmt {
            span: kw.span.join(end),
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_while_stmt(&mut self) -> Result<WhileStmt, ParseError> {
        let kw = self.expect(TokenKind::KwWhile)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(WhileStmt {
            span: kw.span.join(body.span),
            cond,
            body,
        })
    }

    fn parse_for_stmt(&mut self) -> Result<ForStmt, ParseError> {
        let kw = self.expect(TokenKind::KwFor)?;
        let first = self.expect_ident()?;
        let mut second = None;
        if self.at(TokenKind::Comma) {
            self.next();
            second = Some(self.expect_ident()?);
        }
        self.expect(TokenKind::KwIn)?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(ForStmt {
            span: kw.span.join(body.span),
            first,
            second,
            iter,
            body,
        })
    }

    fn parse_return_stmt(&mut self) -> Result<ReturnStmt, ParseError> {
        let kw = self.expect(TokenKind::KwReturn)?;
        let exprs = if self.at_stmt_end() {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };
        let end = exprs.last().map_or(kw.span, |e| e.span);
        Ok(ReturnStmt {
            span: kw.span.join(end),
            exprs,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.nested(Self::parse_block_inner)
    }

    fn parse_block_inner(&mut self) -> Result<Block, ParseError> {
        let lb = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.at(TokenKind::RBrace) {
                break;
            }
            if self.at(TokenKind::Eof) {
                return Err(ParseError::new("expected '}' to close block", lb.span));
            }
            stmts.push(self.parse_stmt()?);
        }
        let rb = self.expect(TokenKind::RBrace)?;
        Ok(Block {
            span: lb.span.join(rb.span),
            stmts,
        })
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.at(TokenKind::Comma) {
            self.next();
            self.skip_newlines();
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_or_expr)
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new("expression nested too deeply", self.peek_span()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    pub fn parse_expr_eof(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.skip_separators();
        if !self.at(TokenKind::Eof) {
            return Err(ParseError::new("expected end of input", self.peek_span()));
        }
        Ok(expr)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.at(TokenKind::KwOr) {
            self.next();
            self.skip_newlines();
            let right = self.parse_and_expr()?;
            left = binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_cmp_expr()?;
        while self.at(TokenKind::KwAnd) {
            self.next();
            self.skip_newlines();
            let right = self.parse_cmp_expr()?;
            left = binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_concat_expr()?;
        let Some(op) = self.peek_kind().and_then(cmp_op) else {
            return Ok(left);
        };
        self.next();
        self.skip_newlines();
        let right = self.parse_concat_expr()?;
        let expr = binary(left, op, right);

        // `a < b < c` is rejected instead of silently comparing a bool.
        if self.peek_kind().and_then(cmp_op).is_some() {
            return Err(ParseError::new(
                "chained comparisons are not supported; use parentheses or 'and'",
                self.peek_span(),
            ));
        }
        Ok(expr)
    }

    /// `..` is right-associative.
    fn parse_concat_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add_expr()?;
        if !self.at(TokenKind::DotDot) {
            return Ok(left);
        }
        self.next();
        self.skip_newlines();
        let right = self.nested(Self::parse_concat_expr)?;
        Ok(binary(left, BinOp::Concat, right))
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.next();
            self.skip_newlines();
            let right = self.parse_mul_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Rem,
                _ => break,
            };
            self.next();
            self.skip_newlines();
            let right = self.parse_unary_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::KwNot) => UnaryOp::Not,
            Some(TokenKind::Minus) => UnaryOp::Neg,
            _ => return self.parse_postfix_expr(),
        };
        let tok = self.expect_any()?;
        let expr = self.nested(Self::parse_unary_expr)?;
        Ok(Expr {
            span: tok.span.join(expr.span),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
        })
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            if self.at(TokenKind::Dot) {
                self.next();
                let member = self.expect_ident()?;
                expr = Expr {
                    span: expr.span.join(member.span),
                    kind: ExprKind::Member {
                        base: Box::new(expr),
                        member,
                    },
                };
                continue;
            }

            if self.at(TokenKind::LBracket) {
                self.next();
                self.skip_newlines();
                let index = self.parse_expr()?;
                self.skip_newlines();
                let rb = self.expect(TokenKind::RBracket)?;
                expr = Expr {
                    span: expr.span.join(rb.span),
                    kind: ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                };
                continue;
            }

            if self.at(TokenKind::LParen) {
                self.next();
                let (args, rp) = self.parse_delimited(TokenKind::RParen)?;
                expr = Expr {
                    span: expr.span.join(rp.span),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
                continue;
            }

            break;
        }
        Ok(expr)
    }

    /// Comma-separated expressions up to `close`, newlines allowed anywhere.
    fn parse_delimited(&mut self, close: TokenKind) -> Result<(Vec<Expr>, Token), ParseError> {
        let mut items = Vec::new();
        self.skip_newlines();
        while !self.at(close.clone()) {
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if !self.at(TokenKind::Comma) {
                break;
            }
            self.next();
            self.skip_newlines();
        }
        let end = self.expect(close)?;
        Ok((items, end))
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let tok = self.expect_any()?;
        let span = tok.span;
        let kind = match tok.kind {
            TokenKind::KwNil => ExprKind::Nil,
            TokenKind::KwTrue => ExprKind::Bool(true),
            TokenKind::KwFalse => ExprKind::Bool(false),
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::String(s) => ExprKind::Str(s),
            TokenKind::Ellipsis => ExprKind::Varargs,
            TokenKind::Ident(name) => ExprKind::Ident(Ident::new(span, name)),
            TokenKind::KwFn => {
                let proto = self.parse_function_rest(span, None)?;
                return Ok(Expr {
                    span: proto.span,
                    kind: ExprKind::Function(proto),
                });
            }
            TokenKind::LParen => {
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                let rp = self.expect(TokenKind::RParen)?;
                // Parenthesized calls are truncated to one value.
                let kind = if inner.kind.is_multi() {
                    ExprKind::Paren(Box::new(inner))
                } else {
                    inner.kind
                };
                return Ok(Expr {
                    span: span.join(rp.span),
                    kind,
                });
            }
            TokenKind::LBracket => {
                let (items, rb) = self.parse_delimited(TokenKind::RBracket)?;
                return Ok(Expr {
                    span: span.join(rb.span),
                    kind: ExprKind::List(items),
                });
            }
            TokenKind::LBrace => return self.parse_map_lit(span),
            other => {
                return Err(ParseError::new(
                    format!("expected an expression, found {}", other.describe()),
                    span,
                ));
            }
        };
        Ok(Expr { span, kind })
    }

    fn parse_map_lit(&mut self, start: Span) -> Result<Expr, ParseError> {
        let mut entries: Vec<(Spanned<String>, Expr)> = Vec::new();
        self.skip_newlines();
        while !self.at(TokenKind::RBrace) {
            let key_tok = self.expect_any()?;
            let key = match key_tok.kind {
                TokenKind::Ident(name) | TokenKind::String(name) => {
                    Spanned::new(key_tok.span, name)
                }
                other => {
                    return Err(ParseError::new(
                        format!("expected a map key, found {}", other.describe()),
                        key_tok.span,
                    ));
                }
            };
            if entries.iter().any(|(k, _)| k.node == key.node) {
                return Err(ParseError::new(
                    format!("duplicate map key '{}'", key.node),
                    key.span,
                ));
            }
            self.expect(TokenKind::Colon)?;
            self.skip_newlines();
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.skip_newlines();
            if !self.at(TokenKind::Comma) {
                break;
            }
            self.next();
            self.skip_newlines();
        }
        let rb = self.expect(TokenKind::RBrace)?;
        Ok(Expr {
            span: start.join(rb.span),
            kind: ExprKind::Map(entries),
        })
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.next();
        }
    }

    fn skip_separators(&mut self) {
        while self.at(TokenKind::Newline) || self.at(TokenKind::Semi) {
            self.next();
        }
    }

    fn peek_past_newlines_is(&self, kind: TokenKind) -> bool {
        self.tokens[self.idx.min(self.tokens.len())..]
            .iter()
            .find(|t| t.kind != TokenKind::Newline)
            .is_some_and(|t| mem::discriminant(&t.kind) == mem::discriminant(&kind))
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            None | Some(TokenKind::Newline | TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof)
        )
    }

    fn expect_stmt_terminator(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::Newline) || self.at(TokenKind::Semi) {
            self.next();
            Ok(())
        } else if self.at(TokenKind::RBrace) || self.at(TokenKind::Eof) {
            Ok(())
        } else {
            let found = self
                .peek_kind()
                .map_or_else(|| "end of input".to_string(), TokenKind::describe);
            Err(ParseError::new(
                format!("expected end of statement, found {found}"),
                self.peek_span(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        let tok = self.expect_any()?;
        match tok.kind {
            TokenKind::Ident(name) => Ok(Ident::new(tok.span, name)),
            other => Err(ParseError::new(
                format!("expected identifier, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        let tok = self.expect_any()?;
        if mem::discriminant(&tok.kind) == mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {}, found {}", expected.describe(), tok.kind.describe()),
                tok.span,
            ))
        }
    }

    fn expect_any(&mut self) -> Result<Token, ParseError> {
        let tok = self
            .next()
            .ok_or_else(|| ParseError::new("unexpected end of input", self.peek_span()))?;
        if tok.kind == TokenKind::Eof {
            // Keep pointing at Eof so later diagnostics stay in range.
            self.idx -= 1;
            return Err(ParseError::new("unexpected end of input", tok.span));
        }
        Ok(tok)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind()
            .is_some_and(|k| mem::discriminant(k) == mem::discriminant(&kind))
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx)?.clone();
        self.idx += 1;
        Some(tok)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx).map(|t| &t.kind)
    }

    fn peek_kind_n(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.idx + n).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.idx)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }
}

fn cmp_op(kind: &TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::EqEq => Some(BinOp::Eq),
        TokenKind::Neq => Some(BinOp::Ne),
        TokenKind::Lt => Some(BinOp::Lt),
        TokenKind::Gt => Some(BinOp::Gt),
        TokenKind::Le => Some(BinOp::Le),
        TokenKind::Ge => Some(BinOp::Ge),
        _ => None,
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    Expr {
        span: left.span.join(right.span),
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
    }
}
