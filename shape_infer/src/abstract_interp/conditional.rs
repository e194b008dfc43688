//! Narrowing of optional bindings on `is None` tests.
//!
//! For `if x is None:` the true branch sees `x: None` and the false branch
//! sees `x` with one `Optional` layer removed; `is not None` swaps the two.
//! The subject may be a local name or an attribute of a known object
//! (`self.cache is None`).

use std::collections::BTreeMap;

use shape_infer_syntax::{CmpOpKind, Expr, ExprKind, NodeId};

use super::env::Scope;
use crate::lattice::{Substitution, Type};

/// Scopes for the two arms of a conditional.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitEnv {
    pub then_env: Scope,
    pub else_env: Scope,
}

/// A recognized `subject is None` / `subject is not None` test.
#[derive(Debug, Clone, Copy)]
pub struct NoneTest<'e> {
    pub subject: &'e Expr,
    /// `is not None`.
    pub negated: bool,
}

/// Recognizes a single `is`/`is not` comparison against the `None` literal
/// whose subject is a name or an attribute.
pub fn none_test(test: &Expr) -> Option<NoneTest<'_>> {
    let ExprKind::Compare {
        left,
        ops,
        comparators,
    } = &test.kind
    else {
        return None;
    };
    let ([op], [rhs]) = (ops.as_slice(), comparators.as_slice()) else {
        return None;
    };
    let negated = match op {
        CmpOpKind::Is => false,
        CmpOpKind::IsNot => true,
        _ => return None,
    };
    if !rhs.is_none_literal() {
        return None;
    }
    match left.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } => Some(NoneTest {
            subject: left,
            negated,
        }),
        _ => None,
    }
}

/// Types of a binding in the branch where it is `None` and the branch where
/// it is not; `None` entries leave the binding as it was.
pub fn narrow_none(subst: &mut Substitution, ty: &Type) -> (Option<Type>, Option<Type>) {
    match subst.deref(ty) {
        Type::Optional(inner) => (Some(Type::None), Some(*inner)),
        Type::None => (None, Some(subst.fresh_var())),
        _ => (Some(Type::None), None),
    }
}

/// Copies `scope` into the two arms of a conditional on `test`, narrowing
/// the subject of an `is None` test.
///
/// `node_types` must already hold the test's subexpressions, so that the
/// object behind an attribute subject is known.
pub fn split_env_by_condition(
    test: &Expr,
    scope: &Scope,
    node_types: &BTreeMap<NodeId, Type>,
    subst: &mut Substitution,
) -> SplitEnv {
    let mut split = SplitEnv {
        then_env: scope.clone(),
        else_env: scope.clone(),
    };
    let Some(NoneTest { subject, negated }) = none_test(test) else {
        return split;
    };
    let (is_none, not_none) = if negated {
        (&mut split.else_env, &mut split.then_env)
    } else {
        (&mut split.then_env, &mut split.else_env)
    };

    match &subject.kind {
        ExprKind::Name(name) => {
            let Some(current) = scope.vars.get(name) else {
                return split;
            };
            let (when_none, when_some) = narrow_none(subst, current);
            if let Some(t) = when_none {
                is_none.vars.set(name.as_str(), t);
            }
            if let Some(t) = when_some {
                not_none.vars.set(name.as_str(), t);
            }
        }
        ExprKind::Attribute { value, attr } => {
            let receiver = node_types.get(&value.id).map(|t| subst.deref(t));
            let Some(Type::UserObject(object)) = receiver else {
                return split;
            };
            let Some(current) = scope.attrs.get(object, attr) else {
                return split;
            };
            let (when_none, when_some) = narrow_none(subst, current);
            if let Some(t) = when_none {
                is_none.attrs.set(object, attr.as_str(), t);
            }
            if let Some(t) = when_some {
                not_none.attrs.set(object, attr.as_str(), t);
            }
        }
        _ => {}
    }
    split
}
