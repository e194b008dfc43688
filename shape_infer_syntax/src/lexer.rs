//! Lexer for function source
//!
//! Wraps the logos-generated lexer with the indentation layout pass:
//! physical line breaks become `Newline`, changes of indentation become
//! `Indent`/`Dedent`, and both are suppressed inside brackets.

use logos::Logos;

use crate::error::{ParseError, ParseResult};
use crate::span::{SourceMap, Span};
use crate::token::Token;

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken<'a> {
    pub token: Token,
    pub span: Span,
    pub text: &'a str,
}

impl<'a> SpannedToken<'a> {
    pub fn new(token: Token, span: Span, text: &'a str) -> Self {
        Self { token, span, text }
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Token>,
    source_map: SourceMap,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
            source_map: SourceMap::new(source),
        }
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Lex the whole input and apply the layout pass.
    ///
    /// The returned stream always ends with `Newline` (when non-empty)
    /// followed by the `Dedent`s closing every open block.
    pub fn tokenize(mut self) -> ParseResult<Vec<SpannedToken<'a>>> {
        let mut out: Vec<SpannedToken<'a>> = Vec::new();
        let mut indents: Vec<usize> = vec![0];
        let mut brackets: Vec<(Token, Span)> = Vec::new();
        // Indentation announced by the last line break, applied at the next real token.
        let mut pending: Option<(usize, Span)> = Some((0, self.source_map.span(0, 0)));

        while let Some(result) = self.inner.next() {
            let range = self.inner.span();
            let span = self.source_map.span(range.start, range.end);
            let text = &self.source[range.clone()];
            let token = match result {
                Ok(token) => token,
                Err(()) => return Err(self.lex_error(text, span)),
            };

            if token == Token::Newline {
                if brackets.is_empty() {
                    let width = text.rsplit('\n').next().map_or(0, indentation_width);
                    pending = Some((width, span));
                }
                continue;
            }

            if let Some((width, at)) = pending.take() {
                self.layout(&mut out, &mut indents, width, at)?;
            }

            if token.opens_bracket() {
                brackets.push((token.clone(), span));
            } else if token.closes_bracket() {
                brackets.pop();
            }
            out.push(SpannedToken::new(token, span, text));
        }

        if let Some((bracket, span)) = brackets.pop() {
            let bracket = match bracket {
                Token::LParen => '(',
                Token::LBracket => '[',
                _ => '{',
            };
            return Err(ParseError::UnclosedBracket { bracket, span });
        }

        let end = self.source_map.span(self.source.len(), self.source.len());
        if out.last().is_some_and(|t| t.token != Token::Newline) {
            out.push(SpannedToken::new(Token::Newline, end, ""));
        }
        while indents.len() > 1 {
            indents.pop();
            out.push(SpannedToken::new(Token::Dedent, end, ""));
        }
        Ok(out)
    }

    fn layout(
        &self,
        out: &mut Vec<SpannedToken<'a>>,
        indents: &mut Vec<usize>,
        width: usize,
        at: Span,
    ) -> ParseResult<()> {
        if out.is_empty() {
            if width > 0 {
                return Err(ParseError::invalid_syntax("unexpected indent", at));
            }
            return Ok(());
        }
        out.push(SpannedToken::new(Token::Newline, at, ""));

        let current = indents.last().copied().unwrap_or(0);
        if width > current {
            indents.push(width);
            out.push(SpannedToken::new(Token::Indent, at, ""));
        } else {
            while indents.last().is_some_and(|&top| top > width) {
                indents.pop();
                out.push(SpannedToken::new(Token::Dedent, at, ""));
            }
            if indents.last().copied().unwrap_or(0) != width {
                return Err(ParseError::InconsistentIndent { span: at });
            }
        }
        Ok(())
    }

    fn lex_error(&self, text: &str, span: Span) -> ParseError {
        if text.starts_with(['"', '\'']) {
            ParseError::UnterminatedString { span }
        } else {
            ParseError::LexerError { span }
        }
    }
}

fn indentation_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 8 } else { 1 })
        .sum()
}

/// Strip the indentation shared by every non-blank line.
///
/// Source extracted from a class body (methods) arrives indented; the layout
/// pass expects the `def` line at column zero.
pub fn dedent(source: &str) -> String {
    let common = source
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    if common == 0 {
        return source.to_string();
    }

    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let strip = line
            .bytes()
            .take(common)
            .take_while(|b| *b == b' ' || *b == b'\t')
            .count();
        out.push_str(&line[strip..]);
    }
    out
}
