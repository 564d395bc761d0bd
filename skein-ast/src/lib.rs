#![forbid(unsafe_code)]

use std::sync::Arc;

use miette::SourceSpan;
use serde::{Deserialize, Serialize};

/// Byte range into a chunk plus the 1-based line it starts on.
///
/// Spans travel with compiled functions across threads, so they carry their
/// own line number instead of requiring the source text for tracebacks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
    pub line: u32,
}

impl Span {
    pub fn new(offset: usize, len: usize, line: u32) -> Self {
        Self { offset, len, line }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn join(self, other: Span) -> Span {
        let (first, last) = if other.offset >= self.offset {
            (self, other)
        } else {
            (other, self)
        };
        let end = first.end().max(last.end());
        Span::new(first.offset, end - first.offset, first.line)
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.offset.into(), span.len)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub type Ident = Spanned<String>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let(LetStmt),
    Assign(AssignStmt),
    FnDef(FnDef),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Break(Span),
    ExprStmt(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::FnDef(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Break(span) => *span,
            Stmt::ExprStmt(e) => e.span,
        }
    }
}

/// `let a, b = f()`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LetStmt {
    pub span: Span,
    pub names: Vec<Ident>,
    pub exprs: Vec<Expr>,
}

/// `target = expr`, where target is a name, an index or a member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub span: Span,
    pub target: Expr,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FnDef {
    pub span: Span,
    pub name: Ident,
    pub proto: Arc<FunctionProto>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub span: Span,
    pub cond: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub span: Span,
    pub cond: Expr,
    pub body: Block,
}

/// `for v in xs { }` or `for k, v in xs { }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub span: Span,
    pub first: Ident,
    pub second: Option<Ident>,
    pub iter: Expr,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub span: Span,
    pub exprs: Vec<Expr>,
}

/// A compiled function body.
///
/// This is the unit a task is shipped as: it owns no runtime state, and any
/// name it does not bind itself is looked up in the globals of whichever
/// interpreter calls it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionProto {
    pub name: Option<String>,
    pub chunk: String,
    pub span: Span,
    pub params: Vec<Ident>,
    pub variadic: bool,
    /// Set for the implicit function wrapping a whole chunk.
    pub main: bool,
    pub body: Block,
}

impl FunctionProto {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("?")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(Ident),
    Varargs,
    List(Vec<Expr>),
    /// `{ key: value, "quoted key": value }`
    Map(Vec<(Spanned<String>, Expr)>),
    Function(Arc<FunctionProto>),
    /// `(f())`: keeps only the first value of a multi-valued expression.
    Paren(Box<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        member: Ident,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

impl ExprKind {
    /// Expressions that can produce more than one value when they appear last
    /// in a list of expressions.
    pub fn is_multi(&self) -> bool {
        matches!(self, ExprKind::Call { .. } | ExprKind::Varargs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Concat => "..",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}
