//! Statement parsing: function definitions, compound and simple statements.

use crate::ast::{BinOpKind, ExceptHandler, ExprKind, FunctionDef, Param, Stmt, StmtKind};
use crate::error::{ParseError, ParseResult};
use crate::token::Token;

use super::Parser;

impl<'a> Parser<'a> {
    pub(crate) fn parse_function_def(&mut self) -> ParseResult<FunctionDef> {
        let start = self.expect(Token::KwDef, "'def'")?.span;
        let (name, _) = self.expect_identifier("function name")?;
        self.expect(Token::LParen, "'('")?;
        let params = self.parse_params()?;
        self.expect(Token::RParen, "')'")?;
        let returns = if self.eat(&Token::Arrow) {
            Some(self.parse_test()?)
        } else {
            None
        };
        self.expect(Token::Colon, "':' after function signature")?;
        let body = self.parse_suite()?;
        let span = self.span_from(start);
        Ok(FunctionDef {
            id: self.ids.fresh(),
            name,
            params,
            returns,
            body,
            span,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            if self.check_any(&[Token::Star, Token::Pow]) {
                return Err(ParseError::invalid_syntax(
                    "variadic parameters are not supported",
                    self.current_span(),
                ));
            }
            if self.eat(&Token::Slash) {
                // positional-only marker
            } else {
                let (name, start) = self.expect_identifier("parameter name")?;
                let annotation = if self.eat(&Token::Colon) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                let default = if self.eat(&Token::Assign) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                let span = self.span_from(start);
                params.push(Param {
                    id: self.ids.fresh(),
                    name,
                    annotation,
                    default,
                    span,
                });
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    /// Indented block after `:`, or a simple statement line on the same line.
    pub(crate) fn parse_suite(&mut self) -> ParseResult<Vec<Stmt>> {
        if !self.eat(&Token::Newline) {
            return self.parse_simple_line();
        }
        self.expect(Token::Indent, "indented block")?;
        let mut body = Vec::new();
        while !self.is_at_end() && !self.check(&Token::Dedent) {
            body.extend(self.parse_statement()?);
        }
        self.eat(&Token::Dedent);
        Ok(body)
    }

    pub(crate) fn parse_statement(&mut self) -> ParseResult<Vec<Stmt>> {
        match self.peek() {
            Some(Token::KwDef) => {
                let func = self.parse_function_def()?;
                let span = func.span;
                Ok(vec![self.mk_stmt(StmtKind::FunctionDef(Box::new(func)), span)])
            }
            Some(Token::KwIf) => {
                let start = self.current_span();
                self.advance();
                Ok(vec![self.parse_if_rest(start)?])
            }
            Some(Token::KwFor) => Ok(vec![self.parse_for()?]),
            Some(Token::KwWhile) => Ok(vec![self.parse_while()?]),
            Some(Token::KwTry) => Ok(vec![self.parse_try()?]),
            Some(Token::KwWith) => Ok(vec![self.parse_with()?]),
            Some(Token::KwClass) => Err(ParseError::invalid_syntax(
                "class definitions are not supported inside functions",
                self.current_span(),
            )),
            _ => self.parse_simple_line(),
        }
    }

    /// `if`/`elif` after its keyword; `elif` nests into `orelse`.
    fn parse_if_rest(&mut self, start: crate::span::Span) -> ParseResult<Stmt> {
        let test = self.parse_test()?;
        self.expect(Token::Colon, "':' after condition")?;
        let body = self.parse_suite()?;
        let orelse = if self.check(&Token::KwElif) {
            let elif_start = self.current_span();
            self.advance();
            vec![self.parse_if_rest(elif_start)?]
        } else if self.eat(&Token::KwElse) {
            self.expect(Token::Colon, "':' after else")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        let span = self.span_from(start);
        Ok(self.mk_stmt(StmtKind::If { test, body, orelse }, span))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::KwFor, "'for'")?.span;
        let target = self.parse_exprlist()?;
        self.expect(Token::KwIn, "'in'")?;
        let iter = self.parse_testlist()?;
        self.expect(Token::Colon, "':' after for header")?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else_clause()?;
        let span = self.span_from(start);
        Ok(self.mk_stmt(
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            span,
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::KwWhile, "'while'")?.span;
        let test = self.parse_test()?;
        self.expect(Token::Colon, "':' after condition")?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else_clause()?;
        let span = self.span_from(start);
        Ok(self.mk_stmt(StmtKind::While { test, body, orelse }, span))
    }

    fn parse_else_clause(&mut self) -> ParseResult<Vec<Stmt>> {
        if self.eat(&Token::KwElse) {
            self.expect(Token::Colon, "':' after else")?;
            self.parse_suite()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::KwTry, "'try'")?.span;
        self.expect(Token::Colon, "':' after try")?;
        let body = self.parse_suite()?;

        let mut handlers = Vec::new();
        while self.check(&Token::KwExcept) {
            let handler_start = self.current_span();
            self.advance();
            let mut exc_type = None;
            let mut name = None;
            if !self.check(&Token::Colon) {
                exc_type = Some(self.parse_test()?);
                if self.eat(&Token::KwAs) {
                    name = Some(self.expect_identifier("exception name")?.0);
                }
            }
            self.expect(Token::Colon, "':' after except clause")?;
            let handler_body = self.parse_suite()?;
            let span = self.span_from(handler_start);
            handlers.push(ExceptHandler {
                id: self.ids.fresh(),
                exc_type,
                name,
                body: handler_body,
                span,
            });
        }

        let orelse = self.parse_else_clause()?;
        let finalbody = if self.eat(&Token::KwFinally) {
            self.expect(Token::Colon, "':' after finally")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(ParseError::invalid_syntax(
                "try statement needs an except or finally clause",
                start,
            ));
        }
        let span = self.span_from(start);
        Ok(self.mk_stmt(
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            span,
        ))
    }

    fn parse_with(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::KwWith, "'with'")?.span;
        let mut items = Vec::new();
        loop {
            items.push(self.parse_test()?);
            if self.eat(&Token::KwAs) {
                self.parse_bitor()?;
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::Colon, "':' after with items")?;
        let body = self.parse_suite()?;
        let span = self.span_from(start);
        Ok(self.mk_stmt(StmtKind::With { items, body }, span))
    }

    /// Simple statements separated by `;`, terminated by a newline.
    fn parse_simple_line(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_simple()?];
        while self.eat(&Token::Semicolon) {
            if self.check(&Token::Newline) {
                break;
            }
            stmts.push(self.parse_simple()?);
        }
        self.expect(Token::Newline, "end of statement")?;
        Ok(stmts)
    }

    fn at_statement_end(&self) -> bool {
        self.is_at_end() || self.check_any(&[Token::Newline, Token::Semicolon])
    }

    fn parse_simple(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        let kind = match self.peek() {
            Some(Token::KwReturn) => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_testlist()?))
                }
            }
            Some(Token::KwPass) => {
                self.advance();
                StmtKind::Pass
            }
            Some(Token::KwBreak) => {
                self.advance();
                StmtKind::Break
            }
            Some(Token::KwContinue) => {
                self.advance();
                StmtKind::Continue
            }
            Some(Token::KwRaise) => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Raise(None)
                } else {
                    let exc = self.parse_test()?;
                    if self.eat(&Token::KwFrom) {
                        self.parse_test()?;
                    }
                    StmtKind::Raise(Some(exc))
                }
            }
            Some(Token::KwAssert) => {
                self.advance();
                let test = self.parse_test()?;
                let msg = if self.eat(&Token::Comma) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            Some(Token::KwDel) => {
                self.advance();
                let target = self.parse_exprlist()?;
                match target.kind {
                    ExprKind::Tuple(items) => StmtKind::Delete(items),
                    _ => StmtKind::Delete(vec![target]),
                }
            }
            Some(Token::KwImport) | Some(Token::KwFrom) => StmtKind::Import(self.parse_import()?),
            Some(Token::KwGlobal) | Some(Token::KwNonlocal) => {
                self.advance();
                let mut names = vec![self.expect_identifier("name")?.0];
                while self.eat(&Token::Comma) {
                    names.push(self.expect_identifier("name")?.0);
                }
                StmtKind::Global(names)
            }
            _ => self.parse_expression_statement()?,
        };
        let span = self.span_from(start);
        Ok(self.mk_stmt(kind, span))
    }

    /// `import a.b as c, d` or `from a import b as c`; returns the bound names.
    fn parse_import(&mut self) -> ParseResult<Vec<String>> {
        let from = self.eat(&Token::KwFrom);
        if from {
            while self.eat(&Token::Dot) {}
            if !self.check(&Token::KwImport) {
                self.parse_dotted_name()?;
            }
        }
        self.expect(Token::KwImport, "'import'")?;
        let parenthesized = from && self.eat(&Token::LParen);

        let mut names = Vec::new();
        loop {
            if from && self.eat(&Token::Star) {
                names.push("*".to_string());
            } else {
                let dotted = self.parse_dotted_name()?;
                let bound = if self.eat(&Token::KwAs) {
                    self.expect_identifier("alias")?.0
                } else if from {
                    dotted
                } else {
                    dotted.split('.').next().unwrap_or_default().to_string()
                };
                names.push(bound);
            }
            if !self.eat(&Token::Comma) || (parenthesized && self.check(&Token::RParen)) {
                break;
            }
        }
        if parenthesized {
            self.expect(Token::RParen, "')'")?;
        }
        Ok(names)
    }

    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_identifier("module name")?.0;
        while self.eat(&Token::Dot) {
            name.push('.');
            name.push_str(&self.expect_identifier("module name")?.0);
        }
        Ok(name)
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StmtKind> {
        let first = self.parse_testlist()?;

        if let Some(op) = self.peek().and_then(augmented_op) {
            self.advance();
            let value = self.parse_testlist()?;
            return Ok(StmtKind::AugAssign {
                target: first,
                op,
                value,
            });
        }

        if self.eat(&Token::Colon) {
            let annotation = self.parse_test()?;
            let value = if self.eat(&Token::Assign) {
                Some(self.parse_testlist()?)
            } else {
                None
            };
            return Ok(StmtKind::AnnAssign {
                target: first,
                annotation,
                value,
            });
        }

        if !self.check(&Token::Assign) {
            return Ok(StmtKind::Expr(first));
        }

        let mut targets = vec![first];
        let mut value;
        loop {
            self.expect(Token::Assign, "'='")?;
            value = self.parse_testlist()?;
            if !self.check(&Token::Assign) {
                break;
            }
            targets.push(value);
        }
        Ok(StmtKind::Assign { targets, value })
    }
}

fn augmented_op(token: &Token) -> Option<BinOpKind> {
    Some(match token {
        Token::PlusAssign => BinOpKind::Add,
        Token::MinusAssign => BinOpKind::Sub,
        Token::StarAssign => BinOpKind::Mult,
        Token::SlashAssign => BinOpKind::Div,
        Token::FloorDivAssign => BinOpKind::FloorDiv,
        Token::PercentAssign => BinOpKind::Mod,
        Token::PowAssign => BinOpKind::Pow,
        Token::AtAssign => BinOpKind::MatMult,
        _ => return None,
    })
}
