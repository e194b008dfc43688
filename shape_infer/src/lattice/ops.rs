//! Lattice operations used at control-flow merges.
//!
//! - join (⊔): least upper bound of the types two paths produced
//! - is_subtype (⊑): structural subtyping, `bool ⊑ num`, `Known(n) ⊑ Unknown`
//! - shape/dtype projections of array types

use super::shape::{unknown_shape, Shape};
use super::subst::Substitution;
use super::types::{DType, NumKind, TupleType, Type};
use crate::error::UnifyError;

fn incompatible(subst: &Substitution, a: &Type, b: &Type) -> UnifyError {
    UnifyError::Mismatch {
        left: subst.resolve(a),
        right: subst.resolve(b),
    }
}

fn join_num_kind(a: NumKind, b: NumKind) -> NumKind {
    if a == NumKind::Float || b == NumKind::Float {
        NumKind::Float
    } else {
        NumKind::Int
    }
}

/// Least upper bound of two types.
///
/// ```text
/// a3 ⊔ T                      = T
/// None ⊔ T                    = optional(T)
/// int(1) ⊔ int(1)             = int(1)
/// int(1) ⊔ float              = float
/// (int, int) ⊔ (int,)         = int tuple
/// (3, 4) ⊔ (3, None)          = (3, None)
/// float32 (3,) ⊔ int64 (3,)   = float64 (None,)
/// list ⊔ dict                 = error
/// ```
///
/// Distinct objects, functions of the same arity with different bodies and
/// different dtype tags join to a fresh variable: the merge succeeds but
/// knows nothing about the result.
pub fn join(subst: &mut Substitution, a: &Type, b: &Type) -> Result<Type, UnifyError> {
    let a = subst.deref(a);
    let b = subst.deref(b);
    if a == b {
        return Ok(a);
    }
    let joined = match (&a, &b) {
        (Type::Var(_), t) | (t, Type::Var(_)) => t.clone(),

        (Type::None, Type::Optional(_)) => b.clone(),
        (Type::Optional(_), Type::None) => a.clone(),
        (Type::None, t) | (t, Type::None) => Type::optional(t.clone()),
        (Type::Optional(x), Type::Optional(y)) => Type::optional(join(subst, x, y)?),
        (Type::Optional(x), t) | (t, Type::Optional(x)) => Type::optional(join(subst, x, t)?),

        (Type::Bool, Type::Num { kind, .. }) | (Type::Num { kind, .. }, Type::Bool) => {
            Type::num(*kind)
        }
        (Type::Num { kind: k1, value: v1 }, Type::Num { kind: k2, value: v2 }) => {
            let kind = join_num_kind(*k1, *k2);
            let value = if k1 == k2 && v1 == v2 { *v1 } else { None };
            Type::Num { kind, value }
        }

        (Type::List(x), Type::List(y)) => Type::list(join(subst, x, y)?),
        (Type::Tuple(TupleType::Fixed(xs)), Type::Tuple(TupleType::Fixed(ys)))
            if xs.len() == ys.len() =>
        {
            let mut elems = Vec::with_capacity(xs.len());
            for (x, y) in xs.iter().zip(ys) {
                elems.push(join(subst, x, y)?);
            }
            Type::tuple(elems)
        }
        (Type::Tuple(x), Type::Tuple(y)) => {
            let mut elem = tuple_element(subst, x)?;
            let other = tuple_element(subst, y)?;
            elem = join(subst, &elem, &other)?;
            Type::tuple_of(elem)
        }
        (Type::Dict(k1, v1), Type::Dict(k2, v2)) => {
            let key = join(subst, k1, k2)?;
            Type::dict(key, join(subst, v1, v2)?)
        }

        (
            Type::Array {
                kind: k1,
                dtype: d1,
                shape: s1,
            },
            Type::Array {
                kind: k2,
                dtype: d2,
                shape: s2,
            },
        ) => {
            if k1 != k2 {
                return Err(incompatible(subst, &a, &b));
            }
            if s1.len() != s2.len() {
                return Err(UnifyError::Rank {
                    left: a.clone(),
                    right: b.clone(),
                });
            }
            if d1 == d2 {
                let shape = s1.iter().zip(s2).map(|(x, y)| x.join(*y)).collect();
                Type::array(*k1, *d1, shape)
            } else {
                Type::array(*k1, d1.promote(*d2), unknown_shape(s1.len()))
            }
        }

        (Type::UserObject(_), Type::UserObject(_)) | (Type::DTypeTag(_), Type::DTypeTag(_)) => {
            subst.fresh_var()
        }
        (
            Type::Arrow {
                params: p1,
                ret: r1,
            },
            Type::Arrow {
                params: p2,
                ret: r2,
            },
        ) if p1.len() == p2.len() => {
            let mut params = Vec::with_capacity(p1.len());
            for (x, y) in p1.iter().zip(p2) {
                params.push(join(subst, x, y)?);
            }
            Type::Arrow {
                params,
                ret: Box::new(join(subst, r1, r2)?),
            }
        }

        _ => return Err(incompatible(subst, &a, &b)),
    };
    Ok(joined)
}

/// Join of every element type of a tuple.
fn tuple_element(subst: &mut Substitution, tuple: &TupleType) -> Result<Type, UnifyError> {
    match tuple {
        TupleType::Homogeneous(elem) => Ok((**elem).clone()),
        TupleType::Fixed(elems) => join_all(subst, elems),
    }
}

/// Join of a sequence of types; a fresh variable when empty.
pub fn join_all(subst: &mut Substitution, types: &[Type]) -> Result<Type, UnifyError> {
    let Some((first, rest)) = types.split_first() else {
        return Ok(subst.fresh_var());
    };
    let mut acc = first.clone();
    for t in rest {
        acc = join(subst, &acc, t)?;
    }
    Ok(acc)
}

/// Structural subtyping.
///
/// An unbound variable is both a subtype and a supertype of anything.
pub fn is_subtype(subst: &Substitution, a: &Type, b: &Type) -> bool {
    let a = subst.deref(a);
    let b = subst.deref(b);
    if a == b {
        return true;
    }
    match (&a, &b) {
        (_, Type::Var(_)) => true,
        (Type::Var(_), _) => true,

        (Type::Bool, Type::Num { value: None, .. }) => true,
        (Type::Num { kind: k1, .. }, Type::Num { kind: k2, value: None }) => k1 == k2,

        (Type::None, Type::Optional(_)) => true,
        (Type::Optional(x), Type::Optional(y)) => is_subtype(subst, x, y),
        (t, Type::Optional(y)) => is_subtype(subst, t, y),

        (Type::List(x), Type::List(y)) => is_subtype(subst, x, y),
        (Type::Tuple(TupleType::Fixed(xs)), Type::Tuple(TupleType::Fixed(ys))) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| is_subtype(subst, x, y))
        }
        (Type::Tuple(TupleType::Fixed(xs)), Type::Tuple(TupleType::Homogeneous(y))) => {
            xs.iter().all(|x| is_subtype(subst, x, y))
        }
        (Type::Tuple(TupleType::Homogeneous(x)), Type::Tuple(TupleType::Homogeneous(y))) => {
            is_subtype(subst, x, y)
        }
        (Type::Dict(k1, v1), Type::Dict(k2, v2)) => {
            is_subtype(subst, k1, k2) && is_subtype(subst, v1, v2)
        }
        (
            Type::Array {
                kind: k1,
                dtype: d1,
                shape: s1,
            },
            Type::Array {
                kind: k2,
                dtype: d2,
                shape: s2,
            },
        ) => {
            k1 == k2
                && d1 == d2
                && s1.len() == s2.len()
                && s1.iter().zip(s2).all(|(x, y)| x.is_subtype_of(*y))
        }
        (
            Type::Arrow {
                params: p1,
                ret: r1,
            },
            Type::Arrow {
                params: p2,
                ret: r2,
            },
        ) => {
            p1.len() == p2.len()
                && p1.iter().zip(p2).all(|(x, y)| is_subtype(subst, y, x))
                && is_subtype(subst, r1, r2)
        }
        _ => false,
    }
}

/// Shape of an array type.
pub fn shape_of(subst: &Substitution, t: &Type) -> Option<Shape> {
    match subst.deref(t) {
        Type::Array { shape, .. } => Some(shape),
        _ => None,
    }
}

/// Element dtype of an array type, or the dtype a tag names.
pub fn dtype_of(subst: &Substitution, t: &Type) -> Option<DType> {
    match subst.deref(t) {
        Type::Array { dtype, .. } | Type::DTypeTag(dtype) => Some(dtype),
        _ => None,
    }
}

/// Type of one item of a sequence: the element of a list or homogeneous
/// tuple, the leading-axis slice of an array of rank at least 1.
pub fn elem_of(subst: &Substitution, t: &Type) -> Option<Type> {
    match subst.deref(t) {
        Type::List(elem) | Type::Tuple(TupleType::Homogeneous(elem)) => Some(*elem),
        Type::Array { kind, dtype, shape } if !shape.is_empty() => {
            Some(Type::array(kind, dtype, shape[1..].to_vec()))
        }
        _ => None,
    }
}
