//! Warnings for inference steps that fell back to an unresolved type.
//!
//! When a rule fails, an unknown callee is called, or a name cannot be
//! resolved, inference continues with a fresh type variable at that node and
//! records a [`Diagnostic`] saying why. The collector is owned by the
//! inference session and handed back in the result; each diagnostic is also
//! emitted through `tracing` at warn level.

use std::fmt;

use crate::error::Location;

/// Reason inference degraded to a type variable.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticReason {
    /// A type rule rejected its arguments. Contains the operation name and
    /// the rule's message.
    RuleFailure { operation: String, message: String },

    /// No rule and no source for a callee.
    UnknownFunction(String),

    /// A name that is neither local, global nor builtin.
    UndefinedName(String),

    /// An attribute the receiver does not have.
    /// Contains (receiver description, attribute name).
    UnknownAttribute(String, String),

    /// The callee's source could not be fetched or parsed.
    InlineFailed { callee: String, message: String },

    /// Constant index past the end of a fixed-length tuple.
    IndexOutOfRange { index: i64, len: usize },

    /// `for` over something that is not a sequence or array.
    NotIterable(String),

    /// Assignment to an index of something other than a list or dict, or
    /// to an attribute of something other than an object.
    UnsupportedTarget(String),

    /// Inlining stopped at the configured depth.
    InlineDepthExceeded { callee: String, depth: usize },

    /// Call of a value that is not callable.
    NotCallable(String),
}

impl fmt::Display for DiagnosticReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticReason::RuleFailure { operation, message } => {
                write!(f, "failed to infer type of {operation}: {message}")
            }
            DiagnosticReason::UnknownFunction(name) => write!(f, "unknown function '{name}'"),
            DiagnosticReason::UndefinedName(name) => write!(f, "undefined name '{name}'"),
            DiagnosticReason::UnknownAttribute(receiver, attr) => {
                write!(f, "unknown attribute '{attr}' on {receiver}")
            }
            DiagnosticReason::InlineFailed { callee, message } => {
                write!(f, "cannot inline '{callee}': {message}")
            }
            DiagnosticReason::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for tuple of length {len}")
            }
            DiagnosticReason::NotIterable(ty) => write!(f, "cannot iterate over {ty}"),
            DiagnosticReason::UnsupportedTarget(desc) => {
                write!(f, "unsupported assignment target: {desc}")
            }
            DiagnosticReason::InlineDepthExceeded { callee, depth } => {
                write!(f, "not inlining '{callee}': depth limit {depth} reached")
            }
            DiagnosticReason::NotCallable(desc) => write!(f, "{desc} is not callable"),
        }
    }
}

/// A single inference warning.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub reason: DiagnosticReason,
    pub location: Option<Location>,
    /// Kind of the syntax node the warning is attached to.
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn new(reason: DiagnosticReason) -> Self {
        Self {
            reason,
            location: None,
            context: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<Location>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning: {}", self.reason)?;
        if let Some(location) = self.location {
            write!(f, " at {location}")?;
        }
        if let Some(ctx) = &self.context {
            write!(f, " ({ctx})")?;
        }
        Ok(())
    }
}

/// Diagnostics of one inference run, in emission order.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticsCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            reason = %diagnostic.reason,
            location = ?diagnostic.location,
            context = diagnostic.context.as_deref().unwrap_or(""),
            "type inference fell back to a type variable"
        );
        self.diagnostics.push(diagnostic);
    }

    /// Retrieve and clear collected diagnostics.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}
