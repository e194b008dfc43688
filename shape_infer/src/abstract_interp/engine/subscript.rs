//! Subscript inference: `x[i]`, `x[a:b:c]` and multi-axis array indexing.

use shape_infer_syntax::{Constant, Expr, ExprKind, Slice, Span};

use super::InferenceEngine;
use crate::diagnostics::DiagnosticReason;
use crate::error::{InferResult, InferenceError, UnsupportedConstruct, UnsupportedKind};
use crate::lattice::{join_all, ArrayKind, DType, Shape, ShapeElem, TupleType, Type};

/// Start, stop and step of `seq[lower:upper:step]` over `len` items,
/// clamped the way Python clamps slice bounds. `None` for a zero step.
fn adjust_slice(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Option<(i64, i64, i64)> {
    let len = i64::try_from(len).ok()?;
    let step = step.unwrap_or(1);
    if step == 0 {
        return None;
    }
    let clamp = |bound: i64| {
        if bound < 0 {
            let from_end = bound.saturating_add(len);
            if from_end >= 0 {
                from_end
            } else if step < 0 {
                -1
            } else {
                0
            }
        } else if bound >= len {
            if step < 0 {
                len - 1
            } else {
                len
            }
        } else {
            bound
        }
    };
    let start = match lower {
        Some(bound) => clamp(bound),
        None if step < 0 => len - 1,
        None => 0,
    };
    let stop = match upper {
        Some(bound) => clamp(bound),
        None if step < 0 => -1,
        None => len,
    };
    Some((start, stop, step))
}

/// Number of items `seq[lower:upper:step]` selects from `len` items.
///
/// ```
/// use shape_infer::abstract_interp::slice_len;
///
/// assert_eq!(slice_len(5, Some(1), Some(3), None), Some(2));
/// assert_eq!(slice_len(5, None, None, Some(-1)), Some(5));
/// assert_eq!(slice_len(5, Some(-2), None, None), Some(2));
/// assert_eq!(slice_len(5, None, None, Some(0)), None);
/// ```
pub fn slice_len(len: usize, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Option<usize> {
    let (start, stop, step) = adjust_slice(len, lower, upper, step)?;
    let count = if step > 0 {
        if start < stop {
            (stop - start - 1) / step + 1
        } else {
            0
        }
    } else if stop < start {
        (start - stop - 1) / step.checked_neg()? + 1
    } else {
        0
    };
    usize::try_from(count).ok()
}

fn slice_positions(len: usize, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Option<Vec<usize>> {
    let (start, _, step) = adjust_slice(len, lower, upper, step)?;
    let count = slice_len(len, lower, upper, Some(step))?;
    (0..count)
        .map(|k| {
            let k = i64::try_from(k).ok()?;
            usize::try_from(start + k * step).ok()
        })
        .collect()
}

fn is_ellipsis(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Constant(Constant::Ellipsis))
}

/// Whether an array index item selects along an existing axis.
fn consumes_axis(item: &Slice) -> bool {
    match item {
        Slice::Index(index) => !(index.is_none_literal() || is_ellipsis(index)),
        Slice::Range { .. } | Slice::Ext(_) => true,
    }
}

type Bounds = (Option<i64>, Option<i64>, Option<i64>);

impl<'s, 'a> InferenceEngine<'s, 'a> {
    pub(super) fn subscript(&mut self, expr: &Expr, value: &Expr, slice: &Slice) -> InferResult<Type> {
        let container = self.expr(value)?;
        match self.session.subst.deref(&container) {
            Type::List(elem) => match slice {
                Slice::Index(index) => {
                    self.int_index(index)?;
                    Ok(*elem)
                }
                Slice::Range { .. } => {
                    self.slice_exprs(slice)?;
                    Ok(Type::List(elem))
                }
                Slice::Ext(_) => Err(single_index_only(expr, "list")),
            },
            Type::Tuple(TupleType::Fixed(elems)) => self.fixed_tuple_item(expr, &elems, slice),
            Type::Tuple(TupleType::Homogeneous(elem)) => match slice {
                Slice::Index(index) => {
                    self.int_index(index)?;
                    Ok(*elem)
                }
                Slice::Range { .. } => {
                    self.slice_exprs(slice)?;
                    Ok(Type::tuple_of(*elem))
                }
                Slice::Ext(_) => Err(single_index_only(expr, "tuple")),
            },
            Type::Dict(key, val) => match slice {
                Slice::Index(index) => {
                    let index_ty = self.expr(index)?;
                    self.unify_at(&key, &index_ty, &index.span, "Subscript")?;
                    Ok(*val)
                }
                _ => Err(single_index_only(expr, "dict")),
            },
            Type::Str => match slice {
                Slice::Index(index) => {
                    self.int_index(index)?;
                    Ok(Type::Str)
                }
                Slice::Range { .. } => {
                    self.slice_exprs(slice)?;
                    Ok(Type::Str)
                }
                Slice::Ext(_) => Err(single_index_only(expr, "str")),
            },
            Type::Array { kind, dtype, shape } => self.array_item(expr, kind, dtype, &shape, slice),
            Type::Var(_) => {
                self.slice_exprs(slice)?;
                Ok(self.session.fresh())
            }
            other => {
                self.slice_exprs(slice)?;
                Ok(self.session.recover(
                    DiagnosticReason::RuleFailure {
                        operation: "Subscript".to_string(),
                        message: format!("'{}' object is not subscriptable", other.tag()),
                    },
                    &expr.span,
                    "Subscript",
                ))
            }
        }
    }

    fn int_index(&mut self, index: &Expr) -> InferResult<Type> {
        let ty = self.expr(index)?;
        self.unify_at(&ty, &Type::int(), &index.span, "Subscript")?;
        Ok(ty)
    }

    /// Infers every bound and index inside `slice`.
    pub(super) fn slice_exprs(&mut self, slice: &Slice) -> InferResult<()> {
        match slice {
            Slice::Index(index) => {
                self.expr(index)?;
            }
            Slice::Range { .. } => {
                self.range_bounds(slice)?;
            }
            Slice::Ext(items) => {
                for item in items {
                    self.slice_exprs(item)?;
                }
            }
        }
        Ok(())
    }

    /// Unifies the bounds of a range with `int`; their values when all the
    /// given bounds are constants.
    fn range_bounds(&mut self, slice: &Slice) -> InferResult<Option<Bounds>> {
        let Slice::Range { lower, upper, step } = slice else {
            return Ok(None);
        };
        let mut constant = true;
        let mut values = [None; 3];
        for (slot, bound) in values.iter_mut().zip([lower, upper, step]) {
            let Some(bound) = bound else {
                continue;
            };
            if bound.is_none_literal() {
                self.expr(bound)?;
                continue;
            }
            let ty = self.int_index(bound)?;
            match self.session.subst.deref(&ty).int_value() {
                Some(n) => *slot = Some(n),
                None => constant = false,
            }
        }
        let [lower, upper, step] = values;
        Ok(constant.then_some((lower, upper, step)))
    }

    fn fixed_tuple_item(&mut self, expr: &Expr, elems: &[Type], slice: &Slice) -> InferResult<Type> {
        match slice {
            Slice::Index(index) => {
                let ty = self.int_index(index)?;
                match self.session.subst.deref(&ty).int_value() {
                    Some(i) => {
                        let len = i64::try_from(elems.len()).unwrap_or(i64::MAX);
                        let position = if i < 0 { i.saturating_add(len) } else { i };
                        match usize::try_from(position).ok().and_then(|p| elems.get(p)) {
                            Some(elem) => Ok(elem.clone()),
                            None => Ok(self.session.recover(
                                DiagnosticReason::IndexOutOfRange {
                                    index: i,
                                    len: elems.len(),
                                },
                                &expr.span,
                                "Subscript",
                            )),
                        }
                    }
                    None => self.join_members(elems, &expr.span),
                }
            }
            Slice::Range { .. } => {
                let positions = self
                    .range_bounds(slice)?
                    .and_then(|(lower, upper, step)| slice_positions(elems.len(), lower, upper, step));
                match positions {
                    Some(positions) => Ok(Type::tuple(
                        positions.into_iter().map(|p| elems[p].clone()).collect(),
                    )),
                    None => Ok(Type::tuple_of(self.join_members(elems, &expr.span)?)),
                }
            }
            Slice::Ext(_) => Err(single_index_only(expr, "tuple")),
        }
    }

    fn join_members(&mut self, elems: &[Type], span: &Span) -> InferResult<Type> {
        join_all(&mut self.session.subst, elems)
            .map_err(|error| InferenceError::unification(error, span).with_context("Subscript"))
    }

    /// Shape of `array[items]`. Integers drop an axis, ranges keep it, `None`
    /// inserts a unit axis and `...` stands for every axis not otherwise
    /// indexed. Integer-array indices contribute their own shape; boolean
    /// masks select an unknown number of elements.
    fn array_item(
        &mut self,
        expr: &Expr,
        kind: ArrayKind,
        dtype: DType,
        shape: &[ShapeElem],
        slice: &Slice,
    ) -> InferResult<Type> {
        let items: Vec<&Slice> = match slice {
            Slice::Ext(items) => items.iter().collect(),
            single => vec![single],
        };
        let consumed = items.iter().filter(|item| consumes_axis(item)).count();
        let ellipses = items
            .iter()
            .filter(|item| matches!(item, Slice::Index(index) if is_ellipsis(index)))
            .count();
        let failure = if consumed > shape.len() {
            Some(format!(
                "too many indices: {consumed} for a {}-dimensional array",
                shape.len()
            ))
        } else if ellipses > 1 {
            Some("an index can only have a single ellipsis".to_string())
        } else {
            None
        };
        if let Some(message) = failure {
            self.slice_exprs(slice)?;
            return Ok(self.session.recover(
                DiagnosticReason::RuleFailure {
                    operation: "Subscript".to_string(),
                    message,
                },
                &expr.span,
                "Subscript",
            ));
        }

        let mut out: Shape = Vec::with_capacity(shape.len() + items.len());
        let mut axis = 0;
        for item in items {
            match item {
                Slice::Index(index) if index.is_none_literal() => {
                    self.expr(index)?;
                    out.push(ShapeElem::Known(1));
                }
                Slice::Index(index) if is_ellipsis(index) => {
                    self.expr(index)?;
                    let skipped = shape.len() - consumed;
                    out.extend_from_slice(&shape[axis..axis + skipped]);
                    axis += skipped;
                }
                Slice::Index(index) => {
                    let ty = self.expr(index)?;
                    match self.session.subst.deref(&ty) {
                        Type::Array {
                            dtype: DType::Bool, ..
                        } => out.push(ShapeElem::Unknown),
                        Type::Array {
                            shape: index_shape, ..
                        } => out.extend(index_shape),
                        Type::Num { .. } | Type::Bool | Type::Var(_) => {
                            self.unify_at(&ty, &Type::int(), &index.span, "Subscript")?;
                        }
                        other => {
                            return Ok(self.session.recover(
                                DiagnosticReason::RuleFailure {
                                    operation: "Subscript".to_string(),
                                    message: format!("cannot index an array with {}", other.tag()),
                                },
                                &index.span,
                                "Subscript",
                            ))
                        }
                    }
                    axis += 1;
                }
                Slice::Range { .. } => {
                    let bounds = self.range_bounds(item)?;
                    let len = match (shape[axis], bounds) {
                        (ShapeElem::Known(n), Some((lower, upper, step))) => {
                            slice_len(n, lower, upper, step).map_or(ShapeElem::Unknown, ShapeElem::Known)
                        }
                        _ => ShapeElem::Unknown,
                    };
                    out.push(len);
                    axis += 1;
                }
                Slice::Ext(_) => {
                    return Err(UnsupportedConstruct::new(UnsupportedKind::SliceForm, expr.span)
                        .with_hint("nested multi-axis index")
                        .into())
                }
            }
        }
        out.extend_from_slice(&shape[axis..]);
        Ok(Type::array(kind, dtype, out))
    }
}

fn single_index_only(expr: &Expr, container: &str) -> InferenceError {
    UnsupportedConstruct::new(UnsupportedKind::SliceForm, expr.span)
        .with_hint(format!("{container} subscripts take a single index or slice"))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slice_len_follows_python() {
        assert_eq!(slice_len(5, Some(1), Some(3), None), Some(2));
        assert_eq!(slice_len(5, None, None, Some(2)), Some(3));
        assert_eq!(slice_len(5, None, None, Some(-1)), Some(5));
        assert_eq!(slice_len(5, Some(-2), None, None), Some(2));
        assert_eq!(slice_len(5, Some(10), None, None), Some(0));
        assert_eq!(slice_len(5, Some(3), Some(1), None), Some(0));
        assert_eq!(slice_len(5, Some(-100), Some(100), None), Some(5));
        assert_eq!(slice_len(5, Some(4), Some(0), Some(-2)), Some(2));
        assert_eq!(slice_len(0, None, None, None), Some(0));
    }

    #[test]
    fn test_slice_positions() {
        assert_eq!(slice_positions(4, Some(1), None, None), Some(vec![1, 2, 3]));
        assert_eq!(slice_positions(4, None, None, Some(-2)), Some(vec![3, 1]));
        assert_eq!(slice_positions(4, None, None, Some(0)), None);
    }
}
