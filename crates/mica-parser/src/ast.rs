//! The parser's AST. Unlike the Body Representation in `mica-core`, every
//! node here carries the source line it started on, for diagnostics and for
//! the chunk's line table. Operator enums are shared with the Body
//! Representation since lowering preserves them one-to-one.

use mica_core::body::{BinaryOp, Literal, LogicalOp, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),
    Print {
        expr: Expr,
        line: u32,
    },
    Var {
        name: String,
        init: Option<Expr>,
        line: u32,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
    },
    Return {
        value: Option<Expr>,
        line: u32,
    },
    Function(FunctionDecl),
    Class(ClassDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    /// `let name = <expr>` declarations in the class body. The compiler
    /// rejects non-literal initializers.
    pub defaults: Vec<(String, Expr, u32)>,
    pub methods: Vec<FunctionDecl>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        line: u32,
    },
    Variable {
        name: String,
        line: u32,
    },
    Assign {
        name: String,
        value: Box<Expr>,
        line: u32,
    },
    Unary {
        op: UnaryOp,
        right: Box<Expr>,
        line: u32,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        line: u32,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
        line: u32,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    Get {
        object: Box<Expr>,
        name: String,
        line: u32,
    },
    Set {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
        line: u32,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },
    IndexSet {
        object: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
        line: u32,
    },
    Array {
        elements: Vec<Expr>,
        line: u32,
    },
    This {
        line: u32,
    },
    SuperCall {
        method: String,
        args: Vec<Expr>,
        line: u32,
    },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::Literal { line, .. }
            | Expr::Variable { line, .. }
            | Expr::Assign { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Logical { line, .. }
            | Expr::Call { line, .. }
            | Expr::Get { line, .. }
            | Expr::Set { line, .. }
            | Expr::Index { line, .. }
            | Expr::IndexSet { line, .. }
            | Expr::Array { line, .. }
            | Expr::This { line }
            | Expr::SuperCall { line, .. } => *line,
        }
    }
}
