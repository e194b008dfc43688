//! Expression parsing, lowest precedence first.
//!
//! ```text
//! test        := or_test ['if' or_test 'else' test] | lambda
//! or_test     := and_test ('or' and_test)*
//! and_test    := not_test ('and' not_test)*
//! not_test    := 'not' not_test | comparison
//! comparison  := bitor (cmp_op bitor)*
//! bitor .. term: binary levels
//! factor      := ('+' | '-' | '~') factor | power
//! power       := primary ['**' factor]
//! primary     := atom (call | subscript | '.' NAME)*
//! ```

use crate::ast::{
    BinOpKind, BoolOpKind, CmpOpKind, Comprehension, Constant, Expr, ExprKind, Keyword, Slice,
    UnaryOpKind,
};
use crate::error::{ParseError, ParseResult};
use crate::token::Token;

use super::Parser;

impl<'a> Parser<'a> {
    /// Comma-separated `test`s; more than one (or a trailing comma) builds a tuple.
    pub(crate) fn parse_testlist(&mut self) -> ParseResult<Expr> {
        self.parse_sequence(Self::parse_test)
    }

    /// Assignment/loop targets, parsed below comparisons so `in` is not consumed.
    pub(crate) fn parse_exprlist(&mut self) -> ParseResult<Expr> {
        self.parse_sequence(Self::parse_bitor)
    }

    fn parse_sequence(
        &mut self,
        mut item: impl FnMut(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let first = item(self)?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let start = first.span;
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if !self.peek().is_some_and(Token::starts_expression) {
                break;
            }
            items.push(item(self)?);
        }
        let span = self.span_from(start);
        Ok(self.mk_expr(ExprKind::Tuple(items), span))
    }

    pub(crate) fn parse_test(&mut self) -> ParseResult<Expr> {
        if self.check(&Token::KwLambda) {
            return self.parse_lambda();
        }
        let body = self.parse_or_test()?;
        if !self.eat(&Token::KwIf) {
            return Ok(body);
        }
        let test = self.parse_or_test()?;
        self.expect(Token::KwElse, "'else' in conditional expression")?;
        let orelse = self.parse_test()?;
        let span = body.span.merge(&orelse.span);
        Ok(self.mk_expr(
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            span,
        ))
    }

    fn parse_lambda(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::KwLambda, "'lambda'")?.span;
        let mut params = Vec::new();
        while !self.check(&Token::Colon) {
            params.push(self.expect_identifier("lambda parameter")?.0);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::Colon, "':' in lambda")?;
        let body = self.parse_test()?;
        let span = self.span_from(start);
        Ok(self.mk_expr(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn parse_or_test(&mut self) -> ParseResult<Expr> {
        self.parse_bool_chain(Token::KwOr, BoolOpKind::Or, Self::parse_and_test)
    }

    fn parse_and_test(&mut self) -> ParseResult<Expr> {
        self.parse_bool_chain(Token::KwAnd, BoolOpKind::And, Self::parse_not_test)
    }

    fn parse_bool_chain(
        &mut self,
        keyword: Token,
        op: BoolOpKind,
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let first = operand(self)?;
        if !self.check(&keyword) {
            return Ok(first);
        }
        let start = first.span;
        let mut values = vec![first];
        while self.eat(&keyword) {
            values.push(operand(self)?);
        }
        let span = self.span_from(start);
        Ok(self.mk_expr(ExprKind::BoolOp { op, values }, span))
    }

    fn parse_not_test(&mut self) -> ParseResult<Expr> {
        if self.check(&Token::KwNot) {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_not_test()?;
            let span = start.merge(&operand.span);
            return Ok(self.mk_expr(
                ExprKind::UnaryOp {
                    op: UnaryOpKind::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOpKind> {
        let op = match self.peek()? {
            Token::Eq => CmpOpKind::Eq,
            Token::NotEq => CmpOpKind::NotEq,
            Token::Lt => CmpOpKind::Lt,
            Token::LtEq => CmpOpKind::LtE,
            Token::Gt => CmpOpKind::Gt,
            Token::GtEq => CmpOpKind::GtE,
            Token::KwIn => CmpOpKind::In,
            Token::KwNot if self.peek_nth(1) == Some(&Token::KwIn) => {
                self.advance();
                CmpOpKind::NotIn
            }
            Token::KwIs if self.peek_nth(1) == Some(&Token::KwNot) => {
                self.advance();
                CmpOpKind::IsNot
            }
            Token::KwIs => CmpOpKind::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        let span = self.span_from(left.span);
        Ok(self.mk_expr(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            span,
        ))
    }

    pub(crate) fn parse_bitor(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[(Token::Pipe, BinOpKind::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[(Token::Caret, BinOpKind::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[(Token::Ampersand, BinOpKind::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (Token::ShiftLeft, BinOpKind::LShift),
                (Token::ShiftRight, BinOpKind::RShift),
            ],
            Self::parse_arith,
        )
    }

    fn parse_arith(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[(Token::Plus, BinOpKind::Add), (Token::Minus, BinOpKind::Sub)],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (Token::Star, BinOpKind::Mult),
                (Token::Slash, BinOpKind::Div),
                (Token::FloorDiv, BinOpKind::FloorDiv),
                (Token::Percent, BinOpKind::Mod),
                (Token::At, BinOpKind::MatMult),
            ],
            Self::parse_factor,
        )
    }

    /// Left-associative binary operators of one precedence level.
    fn parse_binary_level(
        &mut self,
        ops: &[(Token, BinOpKind)],
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut left = operand(self)?;
        while let Some(op) = self
            .peek()
            .and_then(|t| ops.iter().find(|(tok, _)| tok == t))
            .map(|(_, op)| *op)
        {
            self.advance();
            let right = operand(self)?;
            let span = left.span.merge(&right.span);
            left = self.mk_expr(
                ExprKind::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOpKind::USub,
            Some(Token::Plus) => UnaryOpKind::UAdd,
            Some(Token::Tilde) => UnaryOpKind::Invert,
            _ => return self.parse_power(),
        };
        let start = self.current_span();
        self.advance();
        let operand = self.parse_factor()?;
        let span = start.merge(&operand.span);
        Ok(self.mk_expr(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let base = self.parse_primary()?;
        if !self.eat(&Token::Pow) {
            return Ok(base);
        }
        let exponent = self.parse_factor()?;
        let span = base.span.merge(&exponent.span);
        Ok(self.mk_expr(
            ExprKind::BinOp {
                left: Box::new(base),
                op: BinOpKind::Pow,
                right: Box::new(exponent),
            },
            span,
        ))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&Token::LParen) {
                let (args, keywords) = self.parse_call_args()?;
                self.expect(Token::RParen, "')' after arguments")?;
                let span = self.span_from(expr.span);
                expr = self.mk_expr(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    },
                    span,
                );
            } else if self.eat(&Token::LBracket) {
                let slice = self.parse_subscript()?;
                self.expect(Token::RBracket, "']' after subscript")?;
                let span = self.span_from(expr.span);
                expr = self.mk_expr(
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        slice: Box::new(slice),
                    },
                    span,
                );
            } else if self.eat(&Token::Dot) {
                let (attr, _) = self.expect_identifier("attribute name")?;
                let span = self.span_from(expr.span);
                expr = self.mk_expr(
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                    span,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_call_args(&mut self) -> ParseResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.check(&Token::RParen) {
            if self.check_any(&[Token::Star, Token::Pow]) {
                return Err(ParseError::invalid_syntax(
                    "argument unpacking is not supported",
                    self.current_span(),
                ));
            }
            if self.check(&Token::Identifier) && self.peek_nth(1) == Some(&Token::Assign) {
                let (arg, _) = self.expect_identifier("keyword name")?;
                self.advance();
                let value = self.parse_test()?;
                keywords.push(Keyword { arg, value });
            } else {
                if !keywords.is_empty() {
                    return Err(ParseError::invalid_syntax(
                        "positional argument follows keyword argument",
                        self.current_span(),
                    ));
                }
                let arg = self.parse_test()?;
                if self.check(&Token::KwFor) {
                    return Err(ParseError::invalid_syntax(
                        "generator expressions are not supported",
                        self.current_span(),
                    ));
                }
                args.push(arg);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn parse_subscript(&mut self) -> ParseResult<Slice> {
        let first = self.parse_slice_item()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RBracket) {
                break;
            }
            items.push(self.parse_slice_item()?);
        }
        Ok(Slice::Ext(items))
    }

    fn parse_slice_item(&mut self) -> ParseResult<Slice> {
        let lower = if self.check(&Token::Colon) {
            None
        } else {
            Some(self.parse_test()?)
        };
        if !self.eat(&Token::Colon) {
            return match lower {
                Some(index) => Ok(Slice::Index(index)),
                None => Err(self.error_here("subscript")),
            };
        }
        let ends = [Token::Colon, Token::Comma, Token::RBracket];
        let upper = if self.check_any(&ends) {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.eat(&Token::Colon) && !self.check_any(&ends[1..]) {
            Some(self.parse_test()?)
        } else {
            None
        };
        Ok(Slice::Range { lower, upper, step })
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.peek_token().cloned() else {
            return Err(self.error_here("expression"));
        };
        let span = token.span;
        match token.token {
            Token::Identifier => {
                self.advance();
                Ok(self.mk_expr(ExprKind::Name(token.text.to_string()), span))
            }
            Token::IntLiteral => {
                self.advance();
                let value = token.text.replace('_', "").parse::<i64>().map_err(|_| {
                    ParseError::InvalidNumber {
                        literal: token.text.to_string(),
                        span,
                    }
                })?;
                Ok(self.mk_expr(ExprKind::Constant(Constant::Int(value)), span))
            }
            Token::FloatLiteral => {
                self.advance();
                let value = token.text.replace('_', "").parse::<f64>().map_err(|_| {
                    ParseError::InvalidNumber {
                        literal: token.text.to_string(),
                        span,
                    }
                })?;
                Ok(self.mk_expr(ExprKind::Constant(Constant::Float(value)), span))
            }
            Token::StringLiteral | Token::TripleStringLiteral => self.parse_strings(),
            Token::KwNone => {
                self.advance();
                Ok(self.mk_expr(ExprKind::Constant(Constant::None), span))
            }
            Token::KwTrue | Token::KwFalse => {
                self.advance();
                let value = token.token == Token::KwTrue;
                Ok(self.mk_expr(ExprKind::Constant(Constant::Bool(value)), span))
            }
            Token::Ellipsis => {
                self.advance();
                Ok(self.mk_expr(ExprKind::Constant(Constant::Ellipsis), span))
            }
            Token::LParen => self.parse_paren(),
            Token::LBracket => self.parse_list(),
            Token::LBrace => self.parse_dict(),
            _ => Err(self.error_here("expression")),
        }
    }

    /// Adjacent string literals concatenate.
    fn parse_strings(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        let mut value = String::new();
        while let Some(token) = self.peek_token() {
            let quote_len = match token.token {
                Token::StringLiteral => 1,
                Token::TripleStringLiteral => 3,
                _ => break,
            };
            let text = token.text;
            let body = &text[quote_len..text.len() - quote_len];
            value.push_str(&unescape(body));
            self.advance();
        }
        let span = self.span_from(start);
        Ok(self.mk_expr(ExprKind::Constant(Constant::Str(value)), span))
    }

    fn parse_paren(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::LParen, "'('")?.span;
        if self.eat(&Token::RParen) {
            let span = self.span_from(start);
            return Ok(self.mk_expr(ExprKind::Tuple(Vec::new()), span));
        }
        let first = self.parse_test()?;
        if self.check(&Token::KwFor) {
            return Err(ParseError::invalid_syntax(
                "generator expressions are not supported",
                self.current_span(),
            ));
        }
        if !self.check(&Token::Comma) {
            self.expect(Token::RParen, "')'")?;
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RParen) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(Token::RParen, "')'")?;
        let span = self.span_from(start);
        Ok(self.mk_expr(ExprKind::Tuple(items), span))
    }

    fn parse_list(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::LBracket, "'['")?.span;
        if self.eat(&Token::RBracket) {
            let span = self.span_from(start);
            return Ok(self.mk_expr(ExprKind::List(Vec::new()), span));
        }
        let first = self.parse_test()?;
        if self.check(&Token::KwFor) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(Token::RBracket, "']' after comprehension")?;
            let span = self.span_from(start);
            return Ok(self.mk_expr(
                ExprKind::ListComp {
                    elt: Box::new(first),
                    generators,
                },
                span,
            ));
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RBracket) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(Token::RBracket, "']'")?;
        let span = self.span_from(start);
        Ok(self.mk_expr(ExprKind::List(items), span))
    }

    fn parse_comprehension_clauses(&mut self) -> ParseResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.eat(&Token::KwFor) {
            let target = self.parse_exprlist()?;
            self.expect(Token::KwIn, "'in' in comprehension")?;
            let iter = self.parse_or_test()?;
            let mut ifs = Vec::new();
            while self.eat(&Token::KwIf) {
                ifs.push(self.parse_or_test()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    fn parse_dict(&mut self) -> ParseResult<Expr> {
        let start = self.expect(Token::LBrace, "'{'")?.span;
        let mut keys = Vec::new();
        let mut values = Vec::new();
        while !self.check(&Token::RBrace) {
            keys.push(self.parse_test()?);
            if !self.check(&Token::Colon) {
                return Err(ParseError::invalid_syntax(
                    "set literals are not supported",
                    self.current_span(),
                ));
            }
            self.advance();
            values.push(self.parse_test()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace, "'}'")?;
        let span = self.span_from(start);
        Ok(self.mk_expr(ExprKind::Dict { keys, values }, span))
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some(other @ ('\\' | '\'' | '"')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
