//! Transfer functions for binary operators.
//!
//! Scalars follow Python's numeric tower: `bool` acts as `int`, and any
//! `float` operand makes the result `float`; true division always yields
//! `float`. Results are folded when both operands have known values.
//! Arrays broadcast against arrays and scalars; a shape that cannot broadcast
//! is a unification error, so it aborts inference instead of being
//! recovered.

use shape_infer_syntax::BinOpKind;

use super::registry::{RuleCx, RuleResult, TransferFunctions};
use crate::error::{RuleError, UnifyError};
use crate::lattice::{ArrayKind, DType, NumKind, NumValue, Shape, ShapeElem, TupleType, Type};

/// Registers one rule per binary operator.
pub fn register(registry: &mut TransferFunctions) {
    registry.register_operator(BinOpKind::Add, tfunc_add);
    registry.register_operator(BinOpKind::Sub, tfunc_sub);
    registry.register_operator(BinOpKind::Mult, tfunc_mul);
    registry.register_operator(BinOpKind::Div, tfunc_div);
    registry.register_operator(BinOpKind::FloorDiv, tfunc_floordiv);
    registry.register_operator(BinOpKind::Mod, tfunc_mod);
    registry.register_operator(BinOpKind::Pow, tfunc_pow);
    registry.register_operator(BinOpKind::MatMult, tfunc_matmul);
    registry.register_operator(BinOpKind::LShift, tfunc_lshift);
    registry.register_operator(BinOpKind::RShift, tfunc_rshift);
    registry.register_operator(BinOpKind::BitOr, tfunc_bitor);
    registry.register_operator(BinOpKind::BitXor, tfunc_bitxor);
    registry.register_operator(BinOpKind::BitAnd, tfunc_bitand);
}

pub fn tfunc_add(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::Add, l, r)
}

pub fn tfunc_sub(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::Sub, l, r)
}

pub fn tfunc_mul(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::Mult, l, r)
}

/// `/` always produces a float, or a floating array.
pub fn tfunc_div(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::Div, l, r)
}

pub fn tfunc_floordiv(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::FloorDiv, l, r)
}

/// `%` is modulo on numbers and formatting on strings.
pub fn tfunc_mod(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::Mod, l, r)
}

pub fn tfunc_pow(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::Pow, l, r)
}

pub fn tfunc_matmul(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::MatMult, l, r)
}

pub fn tfunc_lshift(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::LShift, l, r)
}

pub fn tfunc_rshift(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::RShift, l, r)
}

pub fn tfunc_bitor(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::BitOr, l, r)
}

pub fn tfunc_bitxor(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::BitXor, l, r)
}

pub fn tfunc_bitand(cx: &mut RuleCx, l: &Type, r: &Type) -> RuleResult {
    binop(cx, BinOpKind::BitAnd, l, r)
}

fn unsupported(op: BinOpKind, l: &Type, r: &Type) -> RuleError {
    RuleError::failed(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op.symbol(),
        l.tag(),
        r.tag()
    ))
}

fn is_bitwise(op: BinOpKind) -> bool {
    matches!(
        op,
        BinOpKind::LShift
            | BinOpKind::RShift
            | BinOpKind::BitOr
            | BinOpKind::BitXor
            | BinOpKind::BitAnd
    )
}

/// Scalar view of a `bool` or number: its kind and known value.
fn scalar(t: &Type) -> Option<(NumKind, Option<NumValue>)> {
    match t {
        Type::Bool => Some((NumKind::Int, None)),
        Type::Num { kind, value } => Some((*kind, *value)),
        _ => None,
    }
}

fn binop(cx: &mut RuleCx, op: BinOpKind, l: &Type, r: &Type) -> RuleResult {
    let l = cx.deref(l);
    let r = cx.deref(r);
    if l.is_var() || r.is_var() {
        // Not enough is known yet; the result is as unknown as the operand.
        return Ok(cx.fresh());
    }
    if l.is_array() || r.is_array() {
        return array_binop(op, &l, &r);
    }
    if op == BinOpKind::MatMult {
        return Err(unsupported(op, &l, &r));
    }
    if let (Some(ls), Some(rs)) = (scalar(&l), scalar(&r)) {
        let logical = matches!(op, BinOpKind::BitOr | BinOpKind::BitXor | BinOpKind::BitAnd);
        if logical && l == Type::Bool && r == Type::Bool {
            return Ok(Type::Bool);
        }
        return scalar_binop(op, ls, rs, &l, &r);
    }
    let is_int = |t: &Type| matches!(t, Type::Bool | Type::Num { kind: NumKind::Int, .. });
    match (&l, &r) {
        (Type::Str, Type::Str) if op == BinOpKind::Add => Ok(Type::Str),
        (Type::Str, _) if op == BinOpKind::Mod => Ok(Type::Str),
        (Type::Str, n) | (n, Type::Str) if op == BinOpKind::Mult && is_int(n) => Ok(Type::Str),

        (Type::List(x), Type::List(y)) if op == BinOpKind::Add => Ok(Type::list(cx.join(x, y)?)),
        (Type::List(_), n) if op == BinOpKind::Mult && is_int(n) => Ok(l.clone()),
        (n, Type::List(_)) if op == BinOpKind::Mult && is_int(n) => Ok(r.clone()),

        (Type::Tuple(x), Type::Tuple(y)) if op == BinOpKind::Add => tuple_concat(cx, x, y),
        (Type::Tuple(t), n) | (n, Type::Tuple(t)) if op == BinOpKind::Mult && is_int(n) => {
            tuple_repeat(cx, t, n.int_value())
        }

        _ => Err(unsupported(op, &l, &r)),
    }
}

fn scalar_binop(
    op: BinOpKind,
    (lk, lv): (NumKind, Option<NumValue>),
    (rk, rv): (NumKind, Option<NumValue>),
    l: &Type,
    r: &Type,
) -> RuleResult {
    let float_operand = lk == NumKind::Float || rk == NumKind::Float;
    if is_bitwise(op) && float_operand {
        return Err(unsupported(op, l, r));
    }
    let kind = match op {
        BinOpKind::Div => NumKind::Float,
        BinOpKind::Pow if !float_operand => match rv {
            Some(NumValue::Int(e)) if e < 0 => NumKind::Float,
            _ => NumKind::Int,
        },
        _ if float_operand => NumKind::Float,
        _ => NumKind::Int,
    };
    let value = match (lv, rv) {
        (Some(a), Some(b)) => fold(op, a, b)?,
        _ => None,
    };
    Ok(Type::Num {
        kind,
        value: value.filter(|v| v.kind() == kind),
    })
}

fn floor_div_i64(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn mod_i64(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn mod_f64(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

/// Constant-fold a scalar operation. `Ok(None)` when the result is not
/// representable (overflow); an error for division by zero.
fn fold(op: BinOpKind, a: NumValue, b: NumValue) -> Result<Option<NumValue>, RuleError> {
    let zero_divisor = b.as_f64() == 0.0;
    if zero_divisor && matches!(op, BinOpKind::Div | BinOpKind::FloorDiv | BinOpKind::Mod) {
        return Err(RuleError::failed("division by zero"));
    }
    if let (NumValue::Int(x), NumValue::Int(y)) = (a, b) {
        let folded = match op {
            BinOpKind::Add => x.checked_add(y),
            BinOpKind::Sub => x.checked_sub(y),
            BinOpKind::Mult => x.checked_mul(y),
            BinOpKind::Div => return Ok(Some(NumValue::Float(x as f64 / y as f64))),
            BinOpKind::FloorDiv => floor_div_i64(x, y),
            BinOpKind::Mod => mod_i64(x, y),
            BinOpKind::Pow if y < 0 => return Ok(Some(NumValue::Float((x as f64).powf(y as f64)))),
            BinOpKind::Pow => u32::try_from(y).ok().and_then(|e| x.checked_pow(e)),
            BinOpKind::LShift => u32::try_from(y).ok().and_then(|s| x.checked_shl(s)),
            BinOpKind::RShift => u32::try_from(y).ok().map(|s| x >> s.min(63)),
            BinOpKind::BitOr => Some(x | y),
            BinOpKind::BitXor => Some(x ^ y),
            BinOpKind::BitAnd => Some(x & y),
            BinOpKind::MatMult => None,
        };
        return Ok(folded.map(NumValue::Int));
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    let folded = match op {
        BinOpKind::Add => x + y,
        BinOpKind::Sub => x - y,
        BinOpKind::Mult => x * y,
        BinOpKind::Div => x / y,
        BinOpKind::FloorDiv => (x / y).floor(),
        BinOpKind::Mod => mod_f64(x, y),
        BinOpKind::Pow => x.powf(y),
        _ => return Ok(None),
    };
    Ok(folded.is_finite().then_some(NumValue::Float(folded)))
}

fn tuple_concat(cx: &mut RuleCx, x: &TupleType, y: &TupleType) -> RuleResult {
    match (x, y) {
        (TupleType::Fixed(xs), TupleType::Fixed(ys)) => {
            Ok(Type::tuple(xs.iter().chain(ys).cloned().collect()))
        }
        _ => {
            let ex = tuple_element(cx, x)?;
            let ey = tuple_element(cx, y)?;
            Ok(Type::tuple_of(cx.join(&ex, &ey)?))
        }
    }
}

fn tuple_element(cx: &mut RuleCx, t: &TupleType) -> RuleResult {
    match t {
        TupleType::Homogeneous(elem) => Ok((**elem).clone()),
        TupleType::Fixed(elems) => {
            let mut acc = cx.fresh();
            for e in elems {
                acc = cx.join(&acc, e)?;
            }
            Ok(acc)
        }
    }
}

fn tuple_repeat(cx: &mut RuleCx, t: &TupleType, count: Option<i64>) -> RuleResult {
    match (t, count) {
        (TupleType::Fixed(elems), Some(n)) => {
            let n = usize::try_from(n).unwrap_or(0);
            Ok(Type::tuple(
                std::iter::repeat(elems.iter().cloned())
                    .take(n)
                    .flatten()
                    .collect(),
            ))
        }
        _ => Ok(Type::tuple_of(tuple_element(cx, t)?)),
    }
}

// ==================== Arrays ====================

/// Broadcast two shapes, aligning trailing dimensions.
///
/// An unknown dimension against `n > 1` is taken to be `n` (it can only be
/// `1` or `n` in a valid program); against `1` or another unknown it stays
/// unknown.
pub fn broadcast_shapes(a: &[ShapeElem], b: &[ShapeElem]) -> Result<Shape, UnifyError> {
    let rank = a.len().max(b.len());
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let x = (i + a.len()).checked_sub(rank).map(|j| a[j]);
        let y = (i + b.len()).checked_sub(rank).map(|j| b[j]);
        let dim = match (x, y) {
            (Some(d), None) | (None, Some(d)) => d,
            (Some(ShapeElem::Known(1)), Some(d)) | (Some(d), Some(ShapeElem::Known(1))) => d,
            (Some(ShapeElem::Known(m)), Some(ShapeElem::Known(n))) if m == n => ShapeElem::Known(m),
            (Some(ShapeElem::Known(m)), Some(ShapeElem::Known(n))) => {
                return Err(UnifyError::Dim {
                    axis: i,
                    left: ShapeElem::Known(m),
                    right: ShapeElem::Known(n),
                })
            }
            (Some(ShapeElem::Known(n)), Some(ShapeElem::Unknown))
            | (Some(ShapeElem::Unknown), Some(ShapeElem::Known(n))) => ShapeElem::Known(n),
            _ => ShapeElem::Unknown,
        };
        out.push(dim);
    }
    Ok(out)
}

/// Result shape of `a @ b`.
pub fn matmul_shape(a: &[ShapeElem], b: &[ShapeElem]) -> Result<Shape, RuleError> {
    if a.is_empty() || b.is_empty() {
        return Err(RuleError::failed("matmul: operands must have at least one dimension"));
    }
    let a2: Shape = if a.len() == 1 { vec![ShapeElem::Known(1), a[0]] } else { a.to_vec() };
    let b2: Shape = if b.len() == 1 { vec![b[0], ShapeElem::Known(1)] } else { b.to_vec() };
    let (a_batch, a_mat) = a2.split_at(a2.len() - 2);
    let (b_batch, b_mat) = b2.split_at(b2.len() - 2);
    if !a_mat[1].compatible(b_mat[0]) {
        return Err(UnifyError::Dim {
            axis: a.len() - 1,
            left: a_mat[1],
            right: b_mat[0],
        }
        .into());
    }
    let mut shape = broadcast_shapes(a_batch, b_batch)?;
    if a.len() > 1 {
        shape.push(a_mat[0]);
    }
    if b.len() > 1 {
        shape.push(b_mat[1]);
    }
    Ok(shape)
}

/// Element dtype of `array op scalar`.
fn scalar_result_dtype(op: BinOpKind, kind: ArrayKind, dtype: DType, scalar: NumKind) -> DType {
    if op == BinOpKind::Div && !dtype.is_float() {
        return kind.default_float();
    }
    match (dtype, scalar) {
        (d, NumKind::Float) if !d.is_float() => kind.default_float(),
        (DType::Bool, NumKind::Int) => DType::Int64,
        (d, _) => d,
    }
}

fn array_binop(op: BinOpKind, l: &Type, r: &Type) -> RuleResult {
    match (l, r) {
        (
            Type::Array {
                kind: lk,
                dtype: ld,
                shape: ls,
            },
            Type::Array {
                kind: rk,
                dtype: rd,
                shape: rs,
            },
        ) => {
            if lk != rk {
                return Err(RuleError::failed(format!(
                    "cannot mix {} and {} operands",
                    lk.method_prefix(),
                    rk.method_prefix()
                )));
            }
            let mut dtype = ld.promote(*rd);
            if op == BinOpKind::Div && !dtype.is_float() {
                dtype = lk.default_float();
            }
            let shape = if op == BinOpKind::MatMult {
                matmul_shape(ls, rs)?
            } else {
                broadcast_shapes(ls, rs)?
            };
            Ok(Type::array(*lk, dtype, shape))
        }
        (Type::Array { kind, dtype, shape }, other) | (other, Type::Array { kind, dtype, shape }) => {
            if op == BinOpKind::MatMult {
                return Err(unsupported(op, l, r));
            }
            let Some((scalar_kind, _)) = scalar(other) else {
                return Err(unsupported(op, l, r));
            };
            Ok(Type::array(
                *kind,
                scalar_result_dtype(op, *kind, *dtype, scalar_kind),
                shape.clone(),
            ))
        }
        _ => Err(unsupported(op, l, r)),
    }
}
