//! Recursive descent parser for the function subset
//!
//! Converts the layout-annotated token stream into the syntax tree of
//! [`crate::ast`]. Parsing stops at the first error; a function that fails to
//! parse cannot be analyzed, so there is nothing to recover into.

mod expressions;
mod statements;

use crate::ast::{Expr, ExprKind, FunctionDef, NodeIdGen, Stmt, StmtKind};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Lexer, SpannedToken};
use crate::span::{SourceMap, Span};
use crate::token::Token;

pub struct Parser<'a> {
    pub(crate) tokens: Vec<SpannedToken<'a>>,
    pub(crate) pos: usize,
    pub(crate) source_map: SourceMap,
    pub(crate) source_len: usize,
    pub(crate) ids: &'a mut NodeIdGen,
}

impl<'a> Parser<'a> {
    /// Tokenize `source` and prepare to parse it, drawing node ids from `ids`.
    pub fn new(source: &'a str, ids: &'a mut NodeIdGen) -> ParseResult<Self> {
        let lexer = Lexer::new(source);
        let source_map = lexer.source_map().clone();
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            source_map,
            source_len: source.len(),
            ids,
        })
    }

    /// Parse a single (optionally decorated) function definition.
    pub fn parse_function(mut self) -> ParseResult<FunctionDef> {
        self.skip_decorators()?;
        let func = self.parse_function_def()?;
        if let Some(tok) = self.peek_token() {
            return Err(ParseError::unexpected_token(
                tok.text,
                "end of input after function definition",
                tok.span,
            ));
        }
        Ok(func)
    }

    /// Parse a sequence of top-level statements.
    pub fn parse_module(mut self) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.is_at_end() {
            if self.eat(&Token::Newline) {
                continue;
            }
            self.skip_decorators()?;
            body.extend(self.parse_statement()?);
        }
        Ok(body)
    }

    fn skip_decorators(&mut self) -> ParseResult<()> {
        while self.check(&Token::At) {
            while !self.is_at_end() && !self.check(&Token::Newline) {
                self.advance();
            }
            self.expect(Token::Newline, "newline after decorator")?;
        }
        Ok(())
    }

    // ==================== Token Management ====================

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    pub(crate) fn peek_token(&self) -> Option<&SpannedToken<'a>> {
        self.tokens.get(self.pos)
    }

    /// Token `n` positions after the current one.
    pub(crate) fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|t| &t.token)
    }

    pub(crate) fn advance(&mut self) -> Option<SpannedToken<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    pub(crate) fn check_any(&self, expected: &[Token]) -> bool {
        self.peek().is_some_and(|t| expected.contains(t))
    }

    /// Consume the current token if it matches.
    pub(crate) fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, expected: Token, what: &str) -> ParseResult<SpannedToken<'a>> {
        if self.check(&expected) {
            if let Some(token) = self.advance() {
                return Ok(token);
            }
        }
        Err(self.error_here(what))
    }

    pub(crate) fn expect_identifier(&mut self, what: &str) -> ParseResult<(String, Span)> {
        let token = self.expect(Token::Identifier, what)?;
        Ok((token.text.to_string(), token.span))
    }

    /// Error describing the current token as unexpected.
    pub(crate) fn error_here(&self, expected: &str) -> ParseError {
        match self.peek_token() {
            Some(tok) if tok.token == Token::Newline => {
                ParseError::unexpected_token("newline", expected, tok.span)
            }
            Some(tok) if tok.text.is_empty() => {
                ParseError::unexpected_token(format!("{:?}", tok.token), expected, tok.span)
            }
            Some(tok) => ParseError::unexpected_token(tok.text, expected, tok.span),
            None => ParseError::unexpected_eof(expected, self.current_span()),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek_token()
            .map(|t| t.span)
            .unwrap_or_else(|| self.source_map.span(self.source_len, self.source_len))
    }

    /// Span of the most recently consumed token.
    pub(crate) fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_else(|| self.current_span())
    }

    /// Span from `start` to the end of the last consumed token.
    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.merge(&self.previous_span())
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    // ==================== Node Construction ====================

    pub(crate) fn mk_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: self.ids.fresh(),
            kind,
            span,
        }
    }

    pub(crate) fn mk_stmt(&mut self, kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            id: self.ids.fresh(),
            kind,
            span,
        }
    }
}
