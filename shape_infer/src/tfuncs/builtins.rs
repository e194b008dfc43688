//! Transfer functions for Python builtins.

use super::registry::{Keywords, RuleCx, RuleResult, TransferFunctions};
use crate::error::RuleError;
use crate::lattice::{NumKind, NumValue, ShapeElem, TupleType, Type};

pub fn register(registry: &mut TransferFunctions) {
    registry.register_builtin("len", tfunc_len);
    registry.register_builtin("range", tfunc_range);
    registry.register_builtin("abs", tfunc_abs);
    registry.register_builtin("min", tfunc_min_max);
    registry.register_builtin("max", tfunc_min_max);
    registry.register_builtin("int", tfunc_int);
    registry.register_builtin("float", tfunc_float);
    registry.register_builtin("bool", tfunc_bool);
    registry.register_builtin("str", tfunc_str);
    registry.register_builtin("list", tfunc_list);
    registry.register_builtin("tuple", tfunc_tuple);
    registry.register_builtin("dict", tfunc_dict);
    registry.register_builtin("enumerate", tfunc_enumerate);
    registry.register_builtin("zip", tfunc_zip);
    registry.register_builtin("isinstance", tfunc_isinstance);
    registry.register_builtin("print", tfunc_print);
    registry.register_builtin("sum", tfunc_sum);
    registry.register_builtin("hash", tfunc_hash);
}

/// Type of one element produced by iterating over `t`.
///
/// Arrays iterate over their leading dimension; dicts over their keys;
/// strings over one-character strings. An unresolved iterable yields an
/// unresolved element.
pub fn element_type(cx: &mut RuleCx, t: &Type) -> RuleResult {
    match cx.deref(t) {
        Type::Var(_) => Ok(cx.fresh()),
        Type::List(elem) => Ok(*elem),
        Type::Tuple(TupleType::Homogeneous(elem)) => Ok(*elem),
        Type::Tuple(TupleType::Fixed(elems)) => {
            let Some((first, rest)) = elems.split_first() else {
                return Ok(cx.fresh());
            };
            let mut acc = first.clone();
            for e in rest {
                acc = cx.join(&acc, e)?;
            }
            Ok(acc)
        }
        Type::Dict(key, _) => Ok(*key),
        Type::Str => Ok(Type::Str),
        Type::Array { kind, dtype, shape } => match shape.split_first() {
            Some((_, rest)) => Ok(Type::array(kind, dtype, rest.to_vec())),
            None => Err(RuleError::failed("iteration over a 0-d array")),
        },
        other => Err(RuleError::failed(format!("'{}' object is not iterable", other.tag()))),
    }
}

fn expect_args(args: &[Type], min: usize, max: usize) -> Result<(), RuleError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(RuleError::arity(expected, args.len()));
    }
    Ok(())
}

pub fn tfunc_len(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 1, 1)?;
    match cx.deref(&args[0]) {
        Type::Tuple(TupleType::Fixed(elems)) => Ok(Type::int_const(elems.len() as i64)),
        Type::Array { shape, .. } => match shape.first() {
            Some(ShapeElem::Known(n)) => Ok(Type::int_const(*n as i64)),
            Some(ShapeElem::Unknown) => Ok(Type::int()),
            None => Err(RuleError::failed("len() of a 0-d array")),
        },
        Type::Var(_) | Type::List(_) | Type::Tuple(_) | Type::Dict(..) | Type::Str => Ok(Type::int()),
        other => Err(RuleError::failed(format!(
            "object of type '{}' has no len()",
            other.tag()
        ))),
    }
}

/// `range(stop)`, `range(start, stop[, step])`: iterates over ints.
pub fn tfunc_range(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 1, 3)?;
    for arg in args {
        match cx.deref(arg) {
            Type::Var(_) | Type::Bool | Type::Num { kind: NumKind::Int, .. } => {}
            other => {
                return Err(RuleError::failed(format!(
                    "'{}' object cannot be interpreted as an integer",
                    other.tag()
                )))
            }
        }
    }
    Ok(Type::list(Type::int()))
}

pub fn tfunc_abs(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 1, 1)?;
    match cx.deref(&args[0]) {
        Type::Num { kind, value } => {
            let value = value.and_then(|v| match v {
                NumValue::Int(n) => n.checked_abs().map(NumValue::Int),
                NumValue::Float(x) => Some(NumValue::Float(x.abs())),
            });
            Ok(Type::Num { kind, value })
        }
        Type::Bool => Ok(Type::int()),
        t @ Type::Array { .. } => Ok(t),
        Type::Var(_) => Ok(cx.fresh()),
        other => Err(RuleError::failed(format!(
            "bad operand type for abs(): '{}'",
            other.tag()
        ))),
    }
}

/// `min(iterable)` or `min(a, b, ...)`; `max` likewise.
pub fn tfunc_min_max(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    if args.is_empty() {
        return Err(RuleError::arity("at least 1", 0));
    }
    let candidates = if args.len() == 1 {
        vec![element_type(cx, &args[0])?]
    } else {
        args.to_vec()
    };
    let mut acc = cx.deref(&candidates[0]);
    for t in &candidates[1..] {
        acc = cx.join(&acc, t)?;
    }
    Ok(acc.without_values())
}

fn convert_scalar(cx: &mut RuleCx, args: &[Type], kind: NumKind) -> RuleResult {
    expect_args(args, 0, 2)?;
    let Some(arg) = args.first() else {
        return Ok(Type::Num {
            kind,
            value: Some(match kind {
                NumKind::Int => NumValue::Int(0),
                NumKind::Float => NumValue::Float(0.0),
            }),
        });
    };
    let value = cx.deref(arg).num_value().and_then(|v| match (kind, v) {
        (NumKind::Int, NumValue::Int(n)) => Some(NumValue::Int(n)),
        (NumKind::Int, NumValue::Float(x)) if x.is_finite() => Some(NumValue::Int(x.trunc() as i64)),
        (NumKind::Float, v) => Some(NumValue::Float(v.as_f64())),
        _ => None,
    });
    Ok(Type::Num { kind, value })
}

pub fn tfunc_int(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    convert_scalar(cx, args, NumKind::Int)
}

pub fn tfunc_float(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    convert_scalar(cx, args, NumKind::Float)
}

pub fn tfunc_bool(_: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 0, 1)?;
    Ok(Type::Bool)
}

pub fn tfunc_str(_: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 0, 1)?;
    Ok(Type::Str)
}

pub fn tfunc_list(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 0, 1)?;
    match args.first() {
        Some(arg) => Ok(Type::list(element_type(cx, arg)?.without_values())),
        None => Ok(Type::list(cx.fresh())),
    }
}

/// `tuple(x)`: fixed-length tuples keep their positions.
pub fn tfunc_tuple(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 0, 1)?;
    let Some(arg) = args.first() else {
        return Ok(Type::tuple(Vec::new()));
    };
    match cx.deref(arg) {
        t @ Type::Tuple(_) => Ok(t),
        other => Ok(Type::tuple_of(element_type(cx, &other)?)),
    }
}

/// `dict()`, `dict(mapping)` or `dict(pairs)`.
pub fn tfunc_dict(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 0, 1)?;
    let Some(arg) = args.first() else {
        return Ok(Type::dict(cx.fresh(), cx.fresh()));
    };
    match cx.deref(arg) {
        t @ Type::Dict(..) => Ok(t),
        other => {
            let pair = element_type(cx, &other)?;
            match cx.deref(&pair) {
                Type::Tuple(TupleType::Fixed(kv)) if kv.len() == 2 => {
                    Ok(Type::dict(kv[0].without_values(), kv[1].without_values()))
                }
                Type::Var(_) => Ok(Type::dict(cx.fresh(), cx.fresh())),
                _ => Err(RuleError::failed("dict() needs a sequence of pairs")),
            }
        }
    }
}

pub fn tfunc_enumerate(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 1, 2)?;
    let elem = element_type(cx, &args[0])?;
    Ok(Type::list(Type::tuple(vec![Type::int(), elem])))
}

pub fn tfunc_zip(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let mut elems = Vec::with_capacity(args.len());
    for arg in args {
        elems.push(element_type(cx, arg)?);
    }
    Ok(Type::list(Type::tuple(elems)))
}

pub fn tfunc_isinstance(_: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 2, 2)?;
    Ok(Type::Bool)
}

pub fn tfunc_print(_: &mut RuleCx, _: &[Type], _: &Keywords) -> RuleResult {
    Ok(Type::None)
}

/// `sum(iterable, start=0)`.
pub fn tfunc_sum(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    expect_args(args, 1, 2)?;
    let elem = element_type(cx, &args[0])?;
    let start = args
        .get(1)
        .or_else(|| kwargs.iter().find(|(k, _)| k == "start").map(|(_, t)| t))
        .cloned()
        .unwrap_or_else(Type::int);
    if cx.deref(&elem).is_var() {
        return Ok(elem);
    }
    Ok(cx.join(&start.without_values(), &elem.without_values())?)
}

/// `hash(n)` is `n` for ints; any other argument gives an unknown int.
pub fn tfunc_hash(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    expect_args(args, 1, 1)?;
    Ok(match cx.deref(&args[0]).int_value() {
        Some(n) => Type::int_const(n),
        None => Type::int(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{known_shape, DType, Substitution};
    use crate::tfuncs::registry::TransferFn;
    use pretty_assertions::assert_eq;

    fn call(f: TransferFn, args: &[Type]) -> RuleResult {
        let mut subst = Substitution::new();
        let mut cx = RuleCx::new(&mut subst);
        f(&mut cx, args, &[])
    }

    #[test]
    fn test_len() {
        assert_eq!(
            call(tfunc_len, &[Type::tuple(vec![Type::int(), Type::Str])]),
            Ok(Type::int_const(2))
        );
        assert_eq!(
            call(tfunc_len, &[Type::ndarray(DType::Float32, known_shape(&[5, 2]))]),
            Ok(Type::int_const(5))
        );
        assert_eq!(call(tfunc_len, &[Type::list(Type::int())]), Ok(Type::int()));
        assert!(call(tfunc_len, &[Type::int()]).is_err());
        assert!(matches!(call(tfunc_len, &[]), Err(RuleError::Arity { .. })));
    }

    #[test]
    fn test_conversions_fold_constants() {
        assert_eq!(call(tfunc_int, &[Type::float_const(2.7)]), Ok(Type::int_const(2)));
        assert_eq!(call(tfunc_float, &[Type::int_const(3)]), Ok(Type::float_const(3.0)));
        assert_eq!(call(tfunc_int, &[Type::Str]), Ok(Type::int()));
        assert_eq!(call(tfunc_abs, &[Type::int_const(-4)]), Ok(Type::int_const(4)));
    }

    #[test]
    fn test_iteration_helpers() {
        let pairs = call(tfunc_enumerate, &[Type::list(Type::Str)]).unwrap();
        assert_eq!(pairs, Type::list(Type::tuple(vec![Type::int(), Type::Str])));
        let zipped = call(
            tfunc_zip,
            &[
                Type::list(Type::int()),
                Type::tensor(DType::Float32, known_shape(&[4, 3])),
            ],
        )
        .unwrap();
        assert_eq!(
            zipped,
            Type::list(Type::tuple(vec![
                Type::int(),
                Type::tensor(DType::Float32, known_shape(&[3]))
            ]))
        );
    }

    #[test]
    fn test_min_max_and_sum() {
        assert_eq!(
            call(tfunc_min_max, &[Type::int_const(1), Type::float_const(2.0)]),
            Ok(Type::float())
        );
        assert_eq!(call(tfunc_min_max, &[Type::list(Type::int())]), Ok(Type::int()));
        assert_eq!(call(tfunc_sum, &[Type::list(Type::float())]), Ok(Type::float()));
        assert_eq!(
            call(tfunc_sum, &[Type::tuple(vec![Type::int_const(1), Type::int_const(2)])]),
            Ok(Type::int())
        );
    }

    #[test]
    fn test_tuple_and_list() {
        let fixed = Type::tuple(vec![Type::int_const(1), Type::Str]);
        assert_eq!(call(tfunc_tuple, &[fixed.clone()]), Ok(fixed));
        assert_eq!(
            call(tfunc_tuple, &[Type::list(Type::int())]),
            Ok(Type::tuple_of(Type::int()))
        );
        assert_eq!(
            call(tfunc_list, &[Type::tuple(vec![Type::int_const(1), Type::int_const(2)])]),
            Ok(Type::list(Type::int()))
        );
    }

    #[test]
    fn test_dict_from_pairs() {
        let pairs = Type::list(Type::tuple(vec![Type::Str, Type::int_const(1)]));
        assert_eq!(call(tfunc_dict, &[pairs]), Ok(Type::dict(Type::Str, Type::int())));
        assert!(call(tfunc_dict, &[Type::list(Type::int())]).is_err());
    }

    #[test]
    fn test_element_type() {
        let mut subst = Substitution::new();
        let mut cx = RuleCx::new(&mut subst);
        assert_eq!(
            element_type(&mut cx, &Type::dict(Type::Str, Type::int())),
            Ok(Type::Str)
        );
        assert!(element_type(&mut cx, &Type::ndarray(DType::Int64, vec![])).is_err());
        assert!(element_type(&mut cx, &Type::None).is_err());
    }
}
