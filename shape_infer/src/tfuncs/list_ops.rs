//! Methods of `list`. The receiver is the first argument.
//!
//! Mutating methods bind an unknown element type to the inserted item, so
//! `xs.append(1)` pins an empty list to `list[int]`. A known element type is
//! widened to its join with the item, as `xs += [item]` would: `xs.append(2.5)`
//! turns `list[int]` into `list[float]`, and `xs.append("a")` is an error.

use super::builtins::element_type;
use super::registry::{Keywords, RuleCx, RuleResult, TransferFunctions};
use crate::error::RuleError;
use crate::lattice::Type;

pub fn register(registry: &mut TransferFunctions) {
    registry.register_list_method("append", tfunc_append);
    registry.register_list_method("insert", tfunc_insert);
    registry.register_list_method("extend", tfunc_extend);
    registry.register_list_method("pop", tfunc_pop);
    registry.register_list_method("copy", tfunc_copy);
    registry.register_list_method("index", tfunc_index);
    registry.register_list_method("count", tfunc_count);
    registry.register_list_method("reverse", tfunc_returns_none);
    registry.register_list_method("sort", tfunc_returns_none);
    registry.register_list_method("clear", tfunc_returns_none);
    registry.register_list_method("remove", tfunc_remove);
}

/// Element type of the receiver, which must be a list.
fn receiver_elem(cx: &mut RuleCx, args: &[Type]) -> RuleResult {
    let Some(receiver) = args.first() else {
        return Err(RuleError::arity("a receiver", 0));
    };
    match cx.deref(receiver) {
        Type::List(elem) => Ok(*elem),
        other => Err(RuleError::failed(format!(
            "list method called on '{}'",
            other.tag()
        ))),
    }
}

fn expect_args(args: &[Type], min: usize, max: usize) -> Result<(), RuleError> {
    let given = args.len().saturating_sub(1);
    if given < min || given > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(RuleError::arity(expected, given));
    }
    Ok(())
}

fn add_element(cx: &mut RuleCx, elem: &Type, item: &Type) -> Result<(), RuleError> {
    let item = cx.resolve(item).without_values();
    if cx.deref(elem).is_var() {
        return cx.unify(elem, &item);
    }
    let current = cx.resolve(elem);
    let joined = cx.join(&current, &item)?;
    let joined = cx.resolve(&joined);
    if joined != current {
        cx.widen_receiver(Type::list(joined));
    }
    Ok(())
}

pub fn tfunc_append(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let elem = receiver_elem(cx, args)?;
    expect_args(args, 1, 1)?;
    add_element(cx, &elem, &args[1])?;
    Ok(Type::None)
}

pub fn tfunc_insert(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let elem = receiver_elem(cx, args)?;
    expect_args(args, 2, 2)?;
    add_element(cx, &elem, &args[2])?;
    Ok(Type::None)
}

pub fn tfunc_extend(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let elem = receiver_elem(cx, args)?;
    expect_args(args, 1, 1)?;
    let item = element_type(cx, &args[1])?;
    add_element(cx, &elem, &item)?;
    Ok(Type::None)
}

pub fn tfunc_pop(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let elem = receiver_elem(cx, args)?;
    expect_args(args, 0, 1)?;
    Ok(elem)
}

pub fn tfunc_copy(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    receiver_elem(cx, args)?;
    expect_args(args, 0, 0)?;
    Ok(cx.deref(&args[0]))
}

pub fn tfunc_index(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    receiver_elem(cx, args)?;
    expect_args(args, 1, 3)?;
    Ok(Type::int())
}

pub fn tfunc_count(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    receiver_elem(cx, args)?;
    expect_args(args, 1, 1)?;
    Ok(Type::int())
}

pub fn tfunc_remove(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    receiver_elem(cx, args)?;
    expect_args(args, 1, 1)?;
    Ok(Type::None)
}

pub fn tfunc_returns_none(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    receiver_elem(cx, args)?;
    Ok(Type::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnifyError;
    use crate::lattice::Substitution;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_append_pins_element_type() {
        let mut subst = Substitution::new();
        let elem = subst.fresh_var();
        let xs = Type::list(elem);
        let mut cx = RuleCx::new(&mut subst);
        assert_eq!(tfunc_append(&mut cx, &[xs.clone(), Type::int_const(3)], &[]), Ok(Type::None));
        assert_eq!(cx.resolve(&xs), Type::list(Type::int()));
        assert_eq!(tfunc_pop(&mut cx, &[xs.clone()], &[]), Ok(Type::int()));

        let err = tfunc_append(&mut cx, &[xs, Type::Str], &[]).unwrap_err();
        assert!(matches!(err, RuleError::Unify(UnifyError::Mismatch { .. })));
    }

    #[test]
    fn test_append_widens_known_element_type() {
        let mut subst = Substitution::new();
        let xs = Type::list(Type::int());
        let mut cx = RuleCx::new(&mut subst);
        tfunc_append(&mut cx, &[xs.clone(), Type::int_const(4)], &[]).unwrap();
        assert_eq!(cx.take_widened_receiver(), None);

        tfunc_append(&mut cx, &[xs.clone(), Type::float_const(2.5)], &[]).unwrap();
        assert_eq!(cx.take_widened_receiver(), Some(Type::list(Type::float())));

        tfunc_insert(&mut cx, &[xs, Type::int_const(0), Type::None], &[]).unwrap();
        assert_eq!(cx.take_widened_receiver(), Some(Type::list(Type::optional(Type::int()))));
    }

    #[test]
    fn test_extend_with_tuple() {
        let mut subst = Substitution::new();
        let elem = subst.fresh_var();
        let xs = Type::list(elem);
        let mut cx = RuleCx::new(&mut subst);
        let items = Type::tuple(vec![Type::float_const(1.0), Type::float_const(2.0)]);
        tfunc_extend(&mut cx, &[xs.clone(), items], &[]).unwrap();
        assert_eq!(cx.resolve(&xs), Type::list(Type::float()));
    }

    #[test]
    fn test_non_list_receiver_fails() {
        let mut subst = Substitution::new();
        let mut cx = RuleCx::new(&mut subst);
        assert!(matches!(
            tfunc_append(&mut cx, &[Type::Str, Type::Str], &[]),
            Err(RuleError::Failed(_))
        ));
        assert!(matches!(
            tfunc_count(&mut cx, &[Type::list(Type::int())], &[]),
            Err(RuleError::Arity { .. })
        ));
    }
}
