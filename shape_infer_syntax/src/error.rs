//! Parse error types

use crate::span::Span;
use thiserror::Error;

/// Parse error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Unexpected token
    #[error("unexpected token '{found}' at {}:{}, expected {expected}", .span.start_line, .span.start_column)]
    UnexpectedToken {
        /// Source text of the offending token
        found: String,
        /// What the parser was looking for
        expected: String,
        span: Span,
    },

    /// Unexpected end of input
    #[error("unexpected end of input at {}:{}, expected {expected}", .span.start_line, .span.start_column)]
    UnexpectedEof { expected: String, span: Span },

    /// Unterminated string
    #[error("unterminated string literal starting at {}:{}", .span.start_line, .span.start_column)]
    UnterminatedString { span: Span },

    /// Invalid number literal
    #[error("invalid number literal '{literal}' at {}:{}", .span.start_line, .span.start_column)]
    InvalidNumber { literal: String, span: Span },

    /// Dedent to a column that matches no enclosing block.
    #[error("inconsistent indentation at {}:{}", .span.start_line, .span.start_column)]
    InconsistentIndent { span: Span },

    /// Unclosed bracket
    #[error("unclosed bracket '{bracket}' at {}:{}", .span.start_line, .span.start_column)]
    UnclosedBracket { bracket: char, span: Span },

    /// Invalid syntax
    #[error("{message} at {}:{}", .span.start_line, .span.start_column)]
    InvalidSyntax { message: String, span: Span },

    /// Lexer error
    #[error("unrecognized token at {}:{}", .span.start_line, .span.start_column)]
    LexerError { span: Span },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::UnterminatedString { span }
            | ParseError::InvalidNumber { span, .. }
            | ParseError::InconsistentIndent { span }
            | ParseError::UnclosedBracket { span, .. }
            | ParseError::InvalidSyntax { span, .. }
            | ParseError::LexerError { span } => span,
        }
    }

    pub fn unexpected_token(
        found: impl Into<String>,
        expected: impl Into<String>,
        span: Span,
    ) -> Self {
        ParseError::UnexpectedToken {
            found: found.into(),
            expected: expected.into(),
            span,
        }
    }

    pub fn unexpected_eof(expected: impl Into<String>, span: Span) -> Self {
        ParseError::UnexpectedEof {
            expected: expected.into(),
            span,
        }
    }

    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        ParseError::InvalidSyntax {
            message: message.into(),
            span,
        }
    }

    /// Format error with source context
    ///
    /// Returns the offending source line followed by a caret marker.
    pub fn format_with_context(&self, source: &str) -> String {
        let span = self.span();
        let Some(line) = source.lines().nth(span.start_line.saturating_sub(1)) else {
            return String::new();
        };

        let col = span.start_column.saturating_sub(1);
        let len = if span.start_line == span.end_line {
            span.end_column.saturating_sub(span.start_column).max(1)
        } else {
            1
        };
        let marker = "^".repeat(len.min(line.len().saturating_sub(col)).max(1));
        let gutter = " ".repeat(span.start_line.to_string().len());

        format!(
            "  {} | {}\n  {} | {}{}",
            span.start_line,
            line,
            gutter,
            " ".repeat(col),
            marker
        )
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
