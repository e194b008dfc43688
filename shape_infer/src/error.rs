//! Error types for inference.
//!
//! Three kinds of failure are distinguished:
//!
//! - [`RuleError`]: a type rule could not produce a result. The engine
//!   recovers by reporting a diagnostic and continuing with a fresh type
//!   variable, except when the rule failed on a [`UnifyError`].
//! - [`UnifyError`]: two types are structurally incompatible. Fatal; surfaces
//!   as [`InferenceError::Unification`] with the offending location.
//! - [`UnsupportedConstruct`]: a syntax form the engine has no rule for.
//!   Fatal, but reported separately from type conflicts.

use std::fmt;

use shape_infer_syntax::{ParseError, Span};
use thiserror::Error;

use crate::lattice::shape::ShapeElem;
use crate::lattice::types::Type;

/// Line and column of a syntax node (1-indexed; `0:0` when unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Location {
            line: span.start_line,
            column: span.start_column,
        }
    }
}

impl From<&Span> for Location {
    fn from(span: &Span) -> Self {
        Location::from(*span)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnifyError {
    #[error("cannot unify {left} with {right}")]
    Mismatch { left: Type, right: Type },

    /// Binding would make a type contain itself.
    #[error("occurs check failed: {var} occurs in {ty}")]
    Occurs { var: Type, ty: Type },

    #[error("rank mismatch: {left} vs {right}")]
    Rank { left: Type, right: Type },

    #[error("dimension {axis} mismatch: {left} vs {right}")]
    Dim {
        axis: usize,
        left: ShapeElem,
        right: ShapeElem,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("{0}")]
    Failed(String),

    #[error("expected {expected} argument(s), got {found}")]
    Arity { expected: String, found: usize },

    #[error(transparent)]
    Unify(#[from] UnifyError),
}

impl RuleError {
    pub fn failed(message: impl Into<String>) -> Self {
        RuleError::Failed(message.into())
    }

    pub fn arity(expected: impl Into<String>, found: usize) -> Self {
        RuleError::Arity {
            expected: expected.into(),
            found,
        }
    }
}

/// Category of syntax the engine does not model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
    Statement(&'static str),
    Expression(&'static str),
    AssignTarget(&'static str),
    SliceForm,
    Comprehension,
}

impl fmt::Display for UnsupportedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedKind::Statement(kind) => write!(f, "statement `{kind}`"),
            UnsupportedKind::Expression(kind) => write!(f, "expression `{kind}`"),
            UnsupportedKind::AssignTarget(kind) => write!(f, "assignment target `{kind}`"),
            UnsupportedKind::SliceForm => write!(f, "slice form"),
            UnsupportedKind::Comprehension => {
                write!(f, "comprehension with several generators or conditions")
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("unsupported {kind} at {location}{}", hint.as_ref().map(|h| format!(" ({h})")).unwrap_or_default())]
pub struct UnsupportedConstruct {
    pub kind: UnsupportedKind,
    pub location: Location,
    pub hint: Option<String>,
}

impl UnsupportedConstruct {
    pub fn new(kind: UnsupportedKind, location: impl Into<Location>) -> Self {
        Self {
            kind,
            location: location.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Fatal inference failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("type error at {location}: {error}{}", if context.is_empty() { String::new() } else { format!(" in {context}") })]
    Unification {
        error: UnifyError,
        location: Location,
        context: String,
    },

    #[error(transparent)]
    Unsupported(#[from] UnsupportedConstruct),

    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    /// The analyzed function was called in a way it cannot accept.
    #[error("{message} at {location}")]
    Usage { message: String, location: Location },
}

impl InferenceError {
    pub fn unification(error: UnifyError, location: impl Into<Location>) -> Self {
        InferenceError::Unification {
            error,
            location: location.into(),
            context: String::new(),
        }
    }

    pub fn usage(message: impl Into<String>, location: impl Into<Location>) -> Self {
        InferenceError::Usage {
            message: message.into(),
            location: location.into(),
        }
    }

    /// Attach the name of the operation being inferred.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        if let InferenceError::Unification { context, .. } = &mut self {
            if context.is_empty() {
                *context = ctx.into();
            }
        }
        self
    }

    pub fn is_unification(&self) -> bool {
        matches!(self, InferenceError::Unification { .. })
    }
}

pub type InferResult<T> = Result<T, InferenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unification_message_includes_location_and_context() {
        let err = InferenceError::unification(
            UnifyError::Mismatch {
                left: Type::int(),
                right: Type::Str,
            },
            Location { line: 3, column: 5 },
        )
        .with_context("BinOp");
        assert_eq!(
            err.to_string(),
            "type error at 3:5: cannot unify int with str in BinOp"
        );
    }

    #[test]
    fn test_unsupported_message() {
        let err = UnsupportedConstruct::new(
            UnsupportedKind::Statement("With"),
            Location { line: 2, column: 1 },
        )
        .with_hint("context managers are not analyzed");
        assert_eq!(
            err.to_string(),
            "unsupported statement `With` at 2:1 (context managers are not analyzed)"
        );
    }

    #[test]
    fn test_rule_error_from_unify() {
        let err: RuleError = UnifyError::Mismatch {
            left: Type::Bool,
            right: Type::Str,
        }
        .into();
        assert!(matches!(err, RuleError::Unify(_)));
    }
}
