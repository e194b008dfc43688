//! Abstract interpretation of function bodies over the type lattice.
//!
//! # Module structure
//!
//! - `session`: state shared by one run (variable store, diagnostics, inlined trees)
//! - `env`: local and attribute environments and their merge at join points
//! - `conditional`: `is None` narrowing for the arms of an `if`
//! - `loop_analysis`: element types of iterated values
//! - `engine`: statement, expression, subscript and call inference

pub mod conditional;
pub mod engine;
pub mod env;
pub mod loop_analysis;
pub mod session;

pub use conditional::{narrow_none, none_test, split_env_by_condition, NoneTest, SplitEnv};
pub use engine::{slice_len, Callable, InferenceEngine, InlineRegistry, InlinedCall};
pub use env::{AttrEnv, MergeConflict, Scope, TypeEnv};
pub use session::{NodeInfo, Session};
