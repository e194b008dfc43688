//! Flow-sensitive type and array-shape inference for numeric Python-like
//! functions.
//!
//! Given a function's syntax tree and the types (or live values) of its
//! arguments, the engine computes a type for every expression and
//! statement, including array dtypes and dimensions, by abstract
//! interpretation over a unification-based lattice. Calls to user-defined
//! functions and methods are inlined; library and builtin calls go through
//! rule tables.
//!
//! # Example
//!
//! ```
//! use shape_infer::lattice::{known_shape, DType};
//! use shape_infer::syntax::parse_function;
//! use shape_infer::{infer_function, InferenceConfig, Program, Type};
//!
//! let def = parse_function("def first_row(x):\n    y = x[0]\n    return y\n").unwrap();
//! let x = Type::ndarray(DType::Float32, known_shape(&[3, 4]));
//! let result = infer_function(&def, &[x], None, &Program::new(), InferenceConfig::default()).unwrap();
//! assert_eq!(
//!     result.return_type(),
//!     Some(&Type::ndarray(DType::Float32, known_shape(&[4])))
//! );
//! ```

// Library code reports through `tracing` and the diagnostics collector only.
#![deny(clippy::print_stdout, clippy::print_stderr)]

// Core modules
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lattice;

// The analyzed program
pub mod host;

// Type rules for builtins, libraries and operators
pub mod tfuncs;

// The inference engine
pub mod abstract_interp;

// Rust API for programmatic use
pub mod api;

pub use shape_infer_syntax as syntax;

pub use api::{infer_function, infer_function_value_args, InferenceResult, Inferencer};
pub use config::{ConfigError, InferenceConfig};
pub use diagnostics::{Diagnostic, DiagnosticReason};
pub use error::{
    InferResult, InferenceError, Location, RuleError, UnifyError, UnsupportedConstruct,
    UnsupportedKind,
};
pub use host::{FunctionId, Host, ModuleId, ObjectId, Program, TypeHints, Value};
pub use lattice::Type;
