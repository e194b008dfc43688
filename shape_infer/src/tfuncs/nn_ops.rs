//! Rules for calling layer objects, keyed by class name.
//!
//! A layer's configuration is read from its instance fields
//! (`in_features`, `kernel_size`, ...). An input whose known size disagrees
//! with the layer's configuration is a unification error.

use super::registry::{RuleCx, RuleResult, TransferFunctions};
use crate::error::{RuleError, UnifyError};
use crate::host::Value;
use crate::lattice::shape::num_elements;
use crate::lattice::{ShapeElem, Type};

pub fn register(registry: &mut TransferFunctions) {
    registry.register_instance("Linear", tfunc_linear);
    registry.register_instance("Conv2d", tfunc_conv2d);
    registry.register_instance("Flatten", tfunc_flatten);
    registry.register_instance("Embedding", tfunc_embedding);
    for class in [
        "ReLU",
        "Sigmoid",
        "Tanh",
        "Dropout",
        "Identity",
        "Softmax",
        "LogSoftmax",
        "LayerNorm",
        "BatchNorm1d",
        "BatchNorm2d",
    ] {
        registry.register_instance(class, tfunc_shape_preserving);
    }
}

type Fields = [(String, Value)];

fn field<'a>(fields: &'a Fields, name: &str) -> Option<&'a Value> {
    fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

fn field_usize(fields: &Fields, name: &str) -> Result<Option<usize>, RuleError> {
    match field(fields, name) {
        None => Ok(None),
        Some(v) => v
            .as_int()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| RuleError::failed(format!("layer field '{name}' is not a size"))),
    }
}

/// A size given either as one int or as an `(h, w)` pair.
fn field_pair(fields: &Fields, name: &str, default: usize) -> Result<(usize, usize), RuleError> {
    let size = |v: &Value| {
        v.as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| RuleError::failed(format!("layer field '{name}' is not a size")))
    };
    match field(fields, name) {
        None => Ok((default, default)),
        Some(Value::Tuple(items)) | Some(Value::List(items)) if items.len() == 2 => {
            Ok((size(&items[0])?, size(&items[1])?))
        }
        Some(v) => {
            let n = size(v)?;
            Ok((n, n))
        }
    }
}

fn single_input<'a>(args: &'a [Type]) -> Result<&'a Type, RuleError> {
    match args {
        [x] => Ok(x),
        _ => Err(RuleError::arity("1", args.len())),
    }
}

/// Checks that `dim` at `axis` can be `expected`.
fn expect_dim(axis: usize, dim: ShapeElem, expected: usize) -> Result<(), RuleError> {
    if dim.compatible(ShapeElem::Known(expected)) {
        Ok(())
    } else {
        Err(UnifyError::Dim {
            axis,
            left: dim,
            right: ShapeElem::Known(expected),
        }
        .into())
    }
}

/// `Linear(in_features, out_features)`: `(*, in) -> (*, out)`.
pub fn tfunc_linear(cx: &mut RuleCx, fields: &Fields, args: &[Type]) -> RuleResult {
    let x = cx.deref(single_input(args)?);
    let tag = x.tag();
    let Type::Array {
        kind,
        dtype,
        mut shape,
    } = x
    else {
        return Err(RuleError::failed(format!("Linear applied to '{tag}'")));
    };
    let Some(last) = shape.len().checked_sub(1) else {
        return Err(RuleError::failed("Linear applied to a 0-d array"));
    };
    if let Some(in_features) = field_usize(fields, "in_features")? {
        expect_dim(last, shape[last], in_features)?;
    }
    shape[last] = field_usize(fields, "out_features")?.map_or(ShapeElem::Unknown, ShapeElem::Known);
    Ok(Type::array(kind, dtype, shape))
}

/// `Conv2d`: `(N, C_in, H, W) -> (N, C_out, H_out, W_out)` with
/// `H_out = (H + 2 * padding - kernel) / stride + 1`. Unbatched
/// `(C_in, H, W)` input is accepted too.
pub fn tfunc_conv2d(cx: &mut RuleCx, fields: &Fields, args: &[Type]) -> RuleResult {
    let x = cx.deref(single_input(args)?);
    let tag = x.tag();
    let Type::Array { kind, dtype, shape } = x else {
        return Err(RuleError::failed(format!("Conv2d applied to '{tag}'")));
    };
    let channel_axis = match shape.len() {
        4 => 1,
        3 => 0,
        rank => {
            return Err(RuleError::failed(format!(
                "Conv2d expects 3-d or 4-d input, got {rank}-d"
            )))
        }
    };
    if let Some(in_channels) = field_usize(fields, "in_channels")? {
        expect_dim(channel_axis, shape[channel_axis], in_channels)?;
    }
    let kernel = field_pair(fields, "kernel_size", 1)?;
    let stride = field_pair(fields, "stride", 1)?;
    let padding = field_pair(fields, "padding", 0)?;
    if stride.0 == 0 || stride.1 == 0 {
        return Err(RuleError::failed("Conv2d stride must be positive"));
    }
    let out_size = |dim: ShapeElem, k: usize, s: usize, p: usize| {
        let span = dim + ShapeElem::Known(2 * p);
        (span - ShapeElem::Known(k)).floor_div(ShapeElem::Known(s)) + ShapeElem::Known(1)
    };
    let mut out = shape.clone();
    out[channel_axis] = field_usize(fields, "out_channels")?.map_or(ShapeElem::Unknown, ShapeElem::Known);
    out[channel_axis + 1] = out_size(shape[channel_axis + 1], kernel.0, stride.0, padding.0);
    out[channel_axis + 2] = out_size(shape[channel_axis + 2], kernel.1, stride.1, padding.1);
    Ok(Type::array(kind, dtype, out))
}

/// `Flatten(start_dim=1, end_dim=-1)`.
pub fn tfunc_flatten(cx: &mut RuleCx, fields: &Fields, args: &[Type]) -> RuleResult {
    let x = cx.deref(single_input(args)?);
    let tag = x.tag();
    let Type::Array { kind, dtype, shape } = x else {
        return Err(RuleError::failed(format!("Flatten applied to '{tag}'")));
    };
    let rank = shape.len() as i64;
    let norm = |name: &str, default: i64| -> Result<usize, RuleError> {
        let d = field(fields, name).and_then(Value::as_int).unwrap_or(default);
        let d = if d < 0 { d + rank } else { d };
        usize::try_from(d)
            .ok()
            .filter(|d| (*d as i64) < rank)
            .ok_or_else(|| RuleError::failed(format!("Flatten {name} out of range for {rank}-d input")))
    };
    let (start, end) = (norm("start_dim", 1)?, norm("end_dim", -1)?);
    if start > end {
        return Err(RuleError::failed("Flatten start_dim comes after end_dim"));
    }
    let mut out = shape[..start].to_vec();
    out.push(num_elements(&shape[start..=end]));
    out.extend_from_slice(&shape[end + 1..]);
    Ok(Type::array(kind, dtype, out))
}

/// `Embedding(num_embeddings, embedding_dim)`: integer indices of any shape
/// gain a trailing `embedding_dim` axis.
pub fn tfunc_embedding(cx: &mut RuleCx, fields: &Fields, args: &[Type]) -> RuleResult {
    let x = cx.deref(single_input(args)?);
    let tag = x.tag();
    let Type::Array {
        kind,
        dtype,
        mut shape,
    } = x
    else {
        return Err(RuleError::failed(format!("Embedding applied to '{tag}'")));
    };
    if !dtype.is_integer() {
        return Err(RuleError::failed(format!(
            "Embedding expects integer indices, got {dtype}"
        )));
    }
    shape.push(field_usize(fields, "embedding_dim")?.map_or(ShapeElem::Unknown, ShapeElem::Known));
    Ok(Type::array(kind, kind.default_float(), shape))
}

/// Activations, dropout and normalization layers.
pub fn tfunc_shape_preserving(cx: &mut RuleCx, _: &Fields, args: &[Type]) -> RuleResult {
    match cx.deref(single_input(args)?) {
        t @ Type::Array { .. } => Ok(t),
        Type::Var(_) => Ok(cx.fresh()),
        other => Err(RuleError::failed(format!("layer applied to '{}'", other.tag()))),
    }
}
