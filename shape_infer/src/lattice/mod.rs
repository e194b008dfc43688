//! Type lattice for shape inference.
//!
//! # Module structure
//!
//! - `shape`: array dimensions (`ShapeElem`) with lifted arithmetic
//! - `types`: the closed set of `Type` variants
//! - `subst`: the type-variable store (`deref`, `resolve`, occurs check)
//! - `unify`: unification and type-hint matching
//! - `ops`: join, subtyping and projections
//! - `widening`: bounds that keep inference finite

pub mod ops;
pub mod shape;
pub mod subst;
pub mod types;
pub mod unify;
pub mod widening;

pub use ops::{dtype_of, elem_of, is_subtype, join, join_all, shape_of};
pub use shape::{display_shape, known_shape, unknown_shape, Shape, ShapeElem};
pub use subst::Substitution;
pub use types::{ArrayKind, DType, NumKind, NumValue, TupleType, Type, VarId};
pub use unify::{apply_subst, match_types, unify, TemplateBindings};
pub use widening::{DEFAULT_LOOP_PASSES, DEFAULT_MAX_INLINE_DEPTH};
