//! Unification through the substitution store, and one-way matching of
//! type-hint templates.

use std::collections::HashMap;

use super::subst::Substitution;
use super::types::{TupleType, Type, VarId};
use crate::error::UnifyError;

fn mismatch(subst: &Substitution, a: &Type, b: &Type) -> UnifyError {
    UnifyError::Mismatch {
        left: subst.resolve(a),
        right: subst.resolve(b),
    }
}

fn bind_var(subst: &mut Substitution, var: VarId, ty: &Type) -> Result<(), UnifyError> {
    if subst.occurs(var, ty) {
        return Err(UnifyError::Occurs {
            var: Type::Var(var),
            ty: subst.resolve(ty),
        });
    }
    subst.bind(var, ty.clone());
    Ok(())
}

fn unify_all(subst: &mut Substitution, xs: &[Type], ys: &[Type]) -> Result<(), UnifyError> {
    for (x, y) in xs.iter().zip(ys) {
        unify(subst, x, y)?;
    }
    Ok(())
}

/// Make `a` and `b` equal by binding unbound variables.
///
/// Scalars unify leniently: `bool`, `int` and `float` (with or without a
/// known value) are mutually compatible, since arithmetic promotion is the
/// operator rules' job. Array dimensions unify when equal or when either
/// side is unknown; kinds and dtypes must match exactly.
pub fn unify(subst: &mut Substitution, a: &Type, b: &Type) -> Result<(), UnifyError> {
    let a = subst.deref(a);
    let b = subst.deref(b);
    match (&a, &b) {
        (Type::Var(x), Type::Var(y)) if x == y => Ok(()),
        (Type::Var(x), _) => bind_var(subst, *x, &b),
        (_, Type::Var(y)) => bind_var(subst, *y, &a),

        (Type::None, Type::None) | (Type::Bool, Type::Bool) | (Type::Str, Type::Str) => Ok(()),
        (Type::Num { .. } | Type::Bool, Type::Num { .. } | Type::Bool) => Ok(()),

        (Type::List(x), Type::List(y)) => unify(subst, x, y),
        (Type::Tuple(TupleType::Fixed(xs)), Type::Tuple(TupleType::Fixed(ys))) => {
            if xs.len() != ys.len() {
                return Err(mismatch(subst, &a, &b));
            }
            unify_all(subst, xs, ys)
        }
        (Type::Tuple(TupleType::Fixed(xs)), Type::Tuple(TupleType::Homogeneous(y)))
        | (Type::Tuple(TupleType::Homogeneous(y)), Type::Tuple(TupleType::Fixed(xs))) => {
            for x in xs {
                unify(subst, x, y)?;
            }
            Ok(())
        }
        (Type::Tuple(TupleType::Homogeneous(x)), Type::Tuple(TupleType::Homogeneous(y))) => {
            unify(subst, x, y)
        }
        (Type::Dict(k1, v1), Type::Dict(k2, v2)) => {
            unify(subst, k1, k2)?;
            unify(subst, v1, v2)
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
            if k1 != k2 || d1 != d2 {
                return Err(mismatch(subst, &a, &b));
            }
            if s1.len() != s2.len() {
                return Err(UnifyError::Rank {
                    left: a.clone(),
                    right: b.clone(),
                });
            }
            for (axis, (x, y)) in s1.iter().zip(s2).enumerate() {
                if !x.compatible(*y) {
                    return Err(UnifyError::Dim {
                        axis,
                        left: *x,
                        right: *y,
                    });
                }
            }
            Ok(())
        }

        (Type::Optional(x), Type::Optional(y)) => unify(subst, x, y),
        (Type::Optional(_), Type::None) | (Type::None, Type::Optional(_)) => Ok(()),
        (Type::Optional(x), other) | (other, Type::Optional(x)) => unify(subst, x, other),

        (Type::UserObject(x), Type::UserObject(y)) if x == y => Ok(()),
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
            if p1.len() != p2.len() {
                return Err(mismatch(subst, &a, &b));
            }
            unify_all(subst, p1, p2)?;
            unify(subst, r1, r2)
        }
        (Type::DTypeTag(x), Type::DTypeTag(y)) if x == y => Ok(()),

        _ => Err(mismatch(subst, &a, &b)),
    }
}

/// Bindings of template variables produced by [`match_types`].
pub type TemplateBindings = HashMap<VarId, Type>;

/// Match each template against the corresponding candidate without
/// mutating either.
///
/// Template variables are local to the templates: they are never looked up
/// in `subst`, and each one is bound to the first candidate part it meets.
/// A template may be more general than its candidate (an unknown dimension
/// matches a known one) but not conflict with it.
pub fn match_types(
    templates: &[Type],
    candidates: &[Type],
    subst: &Substitution,
) -> Result<TemplateBindings, UnifyError> {
    let mut bindings = TemplateBindings::new();
    for (template, candidate) in templates.iter().zip(candidates) {
        match_one(&mut bindings, template, candidate, subst)?;
    }
    Ok(bindings)
}

fn match_one(
    bindings: &mut TemplateBindings,
    template: &Type,
    candidate: &Type,
    subst: &Substitution,
) -> Result<(), UnifyError> {
    let candidate = subst.deref(candidate);
    match (template, &candidate) {
        (Type::Var(v), _) => {
            if let Some(previous) = bindings.get(v) {
                let previous = subst.resolve(previous);
                let current = subst.resolve(&candidate);
                if previous != current {
                    return Err(UnifyError::Mismatch {
                        left: previous,
                        right: current,
                    });
                }
            } else {
                bindings.insert(*v, candidate.clone());
            }
            Ok(())
        }
        // An unresolved candidate accepts any template; the caller unifies
        // it with the applied template afterwards.
        (_, Type::Var(_)) => Ok(()),

        (Type::None, Type::None) | (Type::Bool, Type::Bool) | (Type::Str, Type::Str) => Ok(()),
        (Type::Num { .. }, Type::Num { .. } | Type::Bool) => Ok(()),
        (Type::List(t), Type::List(c)) => match_one(bindings, t, c, subst),
        (Type::Tuple(TupleType::Fixed(ts)), Type::Tuple(TupleType::Fixed(cs)))
            if ts.len() == cs.len() =>
        {
            for (t, c) in ts.iter().zip(cs) {
                match_one(bindings, t, c, subst)?;
            }
            Ok(())
        }
        (Type::Tuple(TupleType::Homogeneous(t)), Type::Tuple(TupleType::Fixed(cs))) => {
            for c in cs {
                match_one(bindings, t, c, subst)?;
            }
            Ok(())
        }
        (Type::Tuple(TupleType::Homogeneous(t)), Type::Tuple(TupleType::Homogeneous(c))) => {
            match_one(bindings, t, c, subst)
        }
        (Type::Dict(tk, tv), Type::Dict(ck, cv)) => {
            match_one(bindings, tk, ck, subst)?;
            match_one(bindings, tv, cv, subst)
        }
        (
            Type::Array {
                kind: tk,
                dtype: td,
                shape: ts,
            },
            Type::Array {
                kind: ck,
                dtype: cd,
                shape: cs,
            },
        ) => {
            if tk != ck || td != cd {
                return Err(mismatch(subst, template, &candidate));
            }
            if ts.len() != cs.len() {
                return Err(UnifyError::Rank {
                    left: template.clone(),
                    right: candidate.clone(),
                });
            }
            for (axis, (t, c)) in ts.iter().zip(cs).enumerate() {
                if !c.is_subtype_of(*t) {
                    return Err(UnifyError::Dim {
                        axis,
                        left: *t,
                        right: *c,
                    });
                }
            }
            Ok(())
        }
        (Type::Optional(t), Type::Optional(c)) => match_one(bindings, t, c, subst),
        (Type::Optional(_), Type::None) => Ok(()),
        (Type::Optional(t), _) => match_one(bindings, t, &candidate, subst),
        (Type::UserObject(t), Type::UserObject(c)) if t == c => Ok(()),
        (Type::DTypeTag(t), Type::DTypeTag(c)) if t == c => Ok(()),
        _ => Err(mismatch(subst, template, &candidate)),
    }
}

/// Instantiate `template` with the bindings from [`match_types`].
///
/// Template variables without a binding get a fresh store variable, shared
/// by every occurrence of the same template variable.
pub fn apply_subst(
    bindings: &mut TemplateBindings,
    template: &Type,
    subst: &mut Substitution,
) -> Type {
    match template {
        Type::Var(v) => bindings
            .entry(*v)
            .or_insert_with(|| subst.fresh_var())
            .clone(),
        Type::List(elem) => Type::list(apply_subst(bindings, elem, subst)),
        Type::Tuple(TupleType::Fixed(elems)) => Type::tuple(
            elems
                .iter()
                .map(|e| apply_subst(bindings, e, subst))
                .collect(),
        ),
        Type::Tuple(TupleType::Homogeneous(elem)) => {
            Type::tuple_of(apply_subst(bindings, elem, subst))
        }
        Type::Dict(k, v) => {
            let k = apply_subst(bindings, k, subst);
            Type::dict(k, apply_subst(bindings, v, subst))
        }
        Type::Optional(inner) => Type::optional(apply_subst(bindings, inner, subst)),
        Type::Arrow { params, ret } => Type::Arrow {
            params: params
                .iter()
                .map(|p| apply_subst(bindings, p, subst))
                .collect(),
            ret: Box::new(apply_subst(bindings, ret, subst)),
        },
        other => other.clone(),
    }
}
