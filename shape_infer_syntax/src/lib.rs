//! Syntax provider for `shape_infer`.
//!
//! Parses the Python-like subset that numeric model code is written in
//! (function definitions with assignments, conditionals, loops, `try`,
//! comprehensions, calls, attribute access and slicing) into a syntax tree
//! whose nodes carry stable [`NodeId`]s and [`Span`]s.
//!
//! # Example
//!
//! ```
//! use shape_infer_syntax::{parse_function, StmtKind};
//!
//! let func = parse_function("def f(x):\n    return x + 1\n").unwrap();
//! assert_eq!(func.name, "f");
//! assert!(matches!(func.body[0].kind, StmtKind::Return(Some(_))));
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;
pub mod visit;

pub use ast::{
    BinOpKind, BoolOpKind, CmpOpKind, Comprehension, Constant, ExceptHandler, Expr, ExprKind,
    FunctionDef, Keyword, NodeId, NodeIdGen, Param, Slice, Stmt, StmtKind, UnaryOpKind,
};
pub use error::{ParseError, ParseResult};
pub use lexer::dedent;
pub use parser::Parser;
pub use span::{SourceMap, Span};
pub use token::Token;

/// Parse one function definition, numbering its nodes from zero.
///
/// Leading indentation shared by all lines is removed first, so method
/// source taken from a class body parses as-is.
pub fn parse_function(source: &str) -> ParseResult<FunctionDef> {
    let mut ids = NodeIdGen::new();
    parse_function_with_ids(source, &mut ids)
}

/// Parse one function definition, drawing node ids from `ids`.
pub fn parse_function_with_ids(source: &str, ids: &mut NodeIdGen) -> ParseResult<FunctionDef> {
    let source = dedent(source);
    Parser::new(&source, ids)?.parse_function()
}

/// Parse a sequence of statements (a module body or a snippet).
pub fn parse_module(source: &str) -> ParseResult<Vec<Stmt>> {
    let mut ids = NodeIdGen::new();
    let source = dedent(source);
    Parser::new(&source, &mut ids)?.parse_module()
}
