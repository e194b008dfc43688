//! Transfer functions for the array libraries: `numpy` arrays and `torch`
//! tensors.
//!
//! Module functions are registered under their dotted path (`numpy.zeros`,
//! `torch.nn.functional.relu`); methods and attributes under the array
//! kind's prefix (`ndarray.reshape`, `tensor.view`, `tensor.shape`), with the
//! receiver passed as the first argument. Functions that create arrays from
//! scratch take the array kind from the library they are registered for.
//!
//! Shape arguments are only useful when their dimensions are statically
//! known; a dimension whose value is unknown becomes `Unknown`. Operations
//! that need two shapes to agree (`concatenate`, `stack`, `matmul`) report a
//! disagreement as a unification error.

use super::arithmetic::{matmul_shape, tfunc_add, tfunc_mul};
use super::registry::{Keywords, RuleCx, RuleResult, TransferFn, TransferFunctions};
use crate::error::{RuleError, UnifyError};
use crate::lattice::shape::num_elements;
use crate::lattice::{display_shape, ArrayKind, DType, NumKind, Shape, ShapeElem, TupleType, Type};

/// An array library whose creation functions produce arrays of one kind.
trait Library {
    const KIND: ArrayKind;
}

struct Numpy;
struct Torch;

impl Library for Numpy {
    const KIND: ArrayKind = ArrayKind::Ndarray;
}

impl Library for Torch {
    const KIND: ArrayKind = ArrayKind::Tensor;
}

pub fn register(registry: &mut TransferFunctions) {
    register_common::<Numpy>(registry, "numpy");
    register_common::<Torch>(registry, "torch");

    registry.register_library("numpy.array", tfunc_array::<Numpy>);
    registry.register_library("numpy.asarray", tfunc_array::<Numpy>);
    registry.register_library("numpy.concatenate", tfunc_concatenate);
    registry.register_library("numpy.expand_dims", tfunc_expand_dims);
    registry.register_library("numpy.dot", tfunc_dot);
    registry.register_library("numpy.amax", tfunc_max);
    registry.register_library("numpy.amin", tfunc_max);
    registry.register_library("numpy.random.randn", tfunc_random::<Numpy>);
    registry.register_library("numpy.random.rand", tfunc_random::<Numpy>);

    registry.register_library("torch.tensor", tfunc_array::<Torch>);
    registry.register_library("torch.cat", tfunc_concatenate);
    registry.register_library("torch.unsqueeze", tfunc_expand_dims);
    registry.register_library("torch.mm", tfunc_mm);
    registry.register_library("torch.chunk", tfunc_chunk);
    registry.register_library("torch.flatten", tfunc_flatten);
    registry.register_library("torch.randn", tfunc_random::<Torch>);
    registry.register_library("torch.rand", tfunc_random::<Torch>);
    registry.register_library("torch.sigmoid", tfunc_float_unary);
    registry.register_library("torch.relu", tfunc_unary);
    registry.register_library("torch.softmax", tfunc_float_unary);
    for name in ["relu", "dropout"] {
        registry.register_library(&format!("torch.nn.functional.{name}"), tfunc_unary);
    }
    for name in ["sigmoid", "tanh", "softmax", "log_softmax"] {
        registry.register_library(&format!("torch.nn.functional.{name}"), tfunc_float_unary);
    }

    register_methods(registry, ArrayKind::Ndarray);
    register_methods(registry, ArrayKind::Tensor);
    registry.register_library("ndarray.astype", tfunc_astype);
    registry.register_library("ndarray.copy", tfunc_same);
    registry.register_library("ndarray.dot", tfunc_dot);
    registry.register_attribute("ndarray.size", tfunc_attr_size);

    registry.register_library("tensor.view", tfunc_reshape_method);
    registry.register_library("tensor.permute", tfunc_permute);
    registry.register_library("tensor.unsqueeze", tfunc_expand_dims);
    registry.register_library("tensor.size", tfunc_size);
    registry.register_library("tensor.dim", tfunc_dim);
    registry.register_library("tensor.numel", tfunc_numel);
    registry.register_library("tensor.numpy", tfunc_numpy);
    registry.register_library("tensor.to", tfunc_to);
    registry.register_library("tensor.float", tfunc_to_float);
    registry.register_library("tensor.double", tfunc_to_double);
    registry.register_library("tensor.half", tfunc_to_half);
    registry.register_library("tensor.long", tfunc_to_long);
    registry.register_library("tensor.int", tfunc_to_int);
    registry.register_library("tensor.bool", tfunc_to_bool);
    registry.register_library("tensor.sigmoid", tfunc_float_unary);
    registry.register_library("tensor.relu", tfunc_unary);
    registry.register_library("tensor.softmax", tfunc_float_unary);
    for name in ["clone", "detach", "contiguous", "cpu"] {
        registry.register_library(&format!("tensor.{name}"), tfunc_same);
    }
}

/// Functions both libraries spell the same way.
fn register_common<L: Library>(registry: &mut TransferFunctions, prefix: &str) {
    let mut add =
        |name: &str, tfunc: TransferFn| registry.register_library(&format!("{prefix}.{name}"), tfunc);
    add("zeros", tfunc_filled::<L>);
    add("ones", tfunc_filled::<L>);
    add("empty", tfunc_filled::<L>);
    add("full", tfunc_full::<L>);
    add("zeros_like", tfunc_like);
    add("ones_like", tfunc_like);
    add("empty_like", tfunc_like);
    add("full_like", tfunc_like);
    add("arange", tfunc_arange::<L>);
    add("reshape", tfunc_reshape);
    add("stack", tfunc_stack);
    add("squeeze", tfunc_squeeze);
    add("transpose", tfunc_transpose);
    add("sum", tfunc_sum);
    add("mean", tfunc_mean);
    add("max", tfunc_max);
    add("min", tfunc_max);
    add("matmul", tfunc_matmul);
    add("split", tfunc_split);
    add("maximum", tfunc_maximum);
    add("minimum", tfunc_maximum);
    add("abs", tfunc_unary);
    for name in ["exp", "log", "sqrt", "tanh"] {
        add(name, tfunc_float_unary);
    }
}

/// Methods and attributes both array kinds have.
fn register_methods(registry: &mut TransferFunctions, kind: ArrayKind) {
    let prefix = kind.method_prefix();
    let methods: &[(&str, TransferFn)] = &[
        ("reshape", tfunc_reshape_method),
        ("sum", tfunc_sum),
        ("mean", tfunc_mean),
        ("max", tfunc_max),
        ("min", tfunc_max),
        ("transpose", tfunc_transpose),
        ("flatten", tfunc_flatten),
        ("squeeze", tfunc_squeeze),
        ("item", tfunc_item),
        ("matmul", tfunc_matmul),
        ("abs", tfunc_unary),
        ("exp", tfunc_float_unary),
        ("log", tfunc_float_unary),
        ("sqrt", tfunc_float_unary),
        ("tanh", tfunc_float_unary),
    ];
    for (name, tfunc) in methods {
        registry.register_library(&format!("{prefix}.{name}"), *tfunc);
    }
    registry.register_attribute(&format!("{prefix}.shape"), tfunc_attr_shape);
    registry.register_attribute(&format!("{prefix}.ndim"), tfunc_attr_ndim);
    registry.register_attribute(&format!("{prefix}.dtype"), tfunc_attr_dtype);
    registry.register_attribute(&format!("{prefix}.T"), tfunc_attr_t);
}

/// Array argument unpacked into its parts.
#[derive(Debug, Clone, PartialEq)]
struct ArrayInfo {
    kind: ArrayKind,
    dtype: DType,
    shape: Shape,
}

impl ArrayInfo {
    fn into_type(self) -> Type {
        Type::array(self.kind, self.dtype, self.shape)
    }

    fn with_shape(&self, shape: Shape) -> Type {
        Type::array(self.kind, self.dtype, shape)
    }

    fn rank(&self) -> usize {
        self.shape.len()
    }
}

fn as_array(cx: &RuleCx, t: &Type) -> Result<ArrayInfo, RuleError> {
    match cx.deref(t) {
        Type::Array { kind, dtype, shape } => Ok(ArrayInfo { kind, dtype, shape }),
        other => Err(RuleError::failed(format!(
            "expected an array, found '{}'",
            other.tag()
        ))),
    }
}

fn array_arg(cx: &RuleCx, args: &[Type], pos: usize) -> Result<ArrayInfo, RuleError> {
    match args.get(pos) {
        Some(t) => as_array(cx, t),
        None => Err(RuleError::arity(format!("at least {}", pos + 1), args.len())),
    }
}

fn keyword<'a>(kwargs: &'a Keywords, names: &[&str]) -> Option<&'a Type> {
    kwargs
        .iter()
        .find(|(k, _)| names.contains(&k.as_str()))
        .map(|(_, t)| t)
}

/// Positional argument `pos`, or else the keyword spelled any of `names`.
fn arg<'a>(args: &'a [Type], kwargs: &'a Keywords, pos: usize, names: &[&str]) -> Option<&'a Type> {
    args.get(pos).or_else(|| keyword(kwargs, names))
}

/// Value of an integer argument; `None` when it is not known statically.
fn int_arg(cx: &RuleCx, t: &Type) -> Result<Option<i64>, RuleError> {
    let t = cx.deref(t);
    match t {
        Type::Num {
            kind: NumKind::Int, ..
        } => Ok(t.int_value()),
        Type::Var(_) | Type::Bool => Ok(None),
        other => Err(RuleError::failed(format!(
            "expected an integer, found '{}'",
            other.tag()
        ))),
    }
}

fn optional_int_arg(cx: &RuleCx, t: Option<&Type>, default: i64) -> Result<Option<i64>, RuleError> {
    match t {
        None => Ok(Some(default)),
        Some(t) => int_arg(cx, t),
    }
}

fn dtype_arg(cx: &RuleCx, t: Option<&Type>) -> Result<Option<DType>, RuleError> {
    let Some(t) = t else {
        return Ok(None);
    };
    match cx.deref(t) {
        Type::DTypeTag(dtype) => Ok(Some(dtype)),
        Type::None | Type::Var(_) => Ok(None),
        other => Err(RuleError::failed(format!(
            "dtype must be a data type, found '{}'",
            other.tag()
        ))),
    }
}

/// Normalizes a possibly negative axis against `rank`.
fn norm_axis(axis: i64, rank: usize) -> Result<usize, RuleError> {
    let r = rank as i64;
    if axis < -r || axis >= r {
        return Err(RuleError::failed(format!(
            "axis {axis} is out of bounds for array of dimension {rank}"
        )));
    }
    Ok(axis.rem_euclid(r) as usize)
}

fn to_dim(size: Option<i64>) -> Result<ShapeElem, RuleError> {
    match size {
        None => Ok(ShapeElem::Unknown),
        Some(n) => usize::try_from(n)
            .map(ShapeElem::Known)
            .map_err(|_| RuleError::failed(format!("negative dimensions are not allowed: {n}"))),
    }
}

/// Requested dimensions of a shape argument, which is an int or a tuple of
/// ints. Entries are `None` where the size is not known statically.
fn shape_arg(cx: &RuleCx, t: &Type) -> Result<Vec<Option<i64>>, RuleError> {
    match cx.deref(t) {
        int @ Type::Num {
            kind: NumKind::Int, ..
        } => Ok(vec![int.int_value()]),
        Type::Tuple(TupleType::Fixed(elems)) => elems.iter().map(|e| int_arg(cx, e)).collect(),
        other => Err(RuleError::failed(format!(
            "shape of unknown length: '{}'",
            other.tag()
        ))),
    }
}

/// Shape given either as one tuple or as separate int arguments
/// (`torch.zeros(2, 3)`, `x.view(2, 3)`).
fn shape_from_args(cx: &RuleCx, args: &[Type]) -> Result<Vec<Option<i64>>, RuleError> {
    match args {
        [single] => shape_arg(cx, single),
        many => many.iter().map(|a| int_arg(cx, a)).collect(),
    }
}

fn shape_dims(sizes: &[Option<i64>]) -> Result<Shape, RuleError> {
    sizes.iter().map(|s| to_dim(*s)).collect()
}

fn shape_tuple(shape: &[ShapeElem]) -> Type {
    Type::tuple(
        shape
            .iter()
            .map(|d| match d {
                ShapeElem::Known(n) => Type::int_const(*n as i64),
                ShapeElem::Unknown => Type::int(),
            })
            .collect(),
    )
}

/// Scalar type of one element.
fn element_scalar(dtype: DType) -> Type {
    match dtype.num_kind() {
        Some(kind) => Type::num(kind),
        None => Type::Bool,
    }
}

// ---------------------------------------------------------------------------
// Creation

/// `zeros(shape, dtype=None)`, also `ones` and `empty`.
fn tfunc_filled<L: Library>(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    if args.is_empty() {
        return Err(RuleError::arity("at least 1", 0));
    }
    let (shape_args, dtype) = match (L::KIND, args) {
        (ArrayKind::Ndarray, [shape, rest @ ..]) => {
            (std::slice::from_ref(shape), arg(rest, kwargs, 0, &["dtype"]))
        }
        _ => (args, keyword(kwargs, &["dtype"])),
    };
    let shape = shape_dims(&shape_from_args(cx, shape_args)?)?;
    let dtype = dtype_arg(cx, dtype)?.unwrap_or_else(|| L::KIND.default_float());
    Ok(Type::array(L::KIND, dtype, shape))
}

/// `full(shape, fill_value, dtype=None)`: dtype follows the fill value.
fn tfunc_full<L: Library>(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let (Some(shape), Some(fill)) = (args.first(), arg(args, kwargs, 1, &["fill_value"])) else {
        return Err(RuleError::arity("2", args.len()));
    };
    let shape = shape_dims(&shape_arg(cx, shape)?)?;
    let dtype = match dtype_arg(cx, arg(args, kwargs, 2, &["dtype"]))? {
        Some(dtype) => dtype,
        None => match cx.deref(fill) {
            Type::Bool => DType::Bool,
            Type::Num {
                kind: NumKind::Int, ..
            } => DType::Int64,
            _ => L::KIND.default_float(),
        },
    };
    Ok(Type::array(L::KIND, dtype, shape))
}

/// `zeros_like(a, dtype=None)` and friends.
fn tfunc_like(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let dtype = dtype_arg(cx, keyword(kwargs, &["dtype"]))?.unwrap_or(a.dtype);
    Ok(Type::array(a.kind, dtype, a.shape))
}

/// Shape and element dtype of nested sequences given to `array`/`tensor`.
/// Fixed-length tuples have a known extent; lists do not.
fn literal_info(cx: &mut RuleCx, t: &Type, kind: ArrayKind) -> Result<(Shape, DType), RuleError> {
    match cx.deref(t) {
        Type::Bool => Ok((Vec::new(), DType::Bool)),
        Type::Num {
            kind: NumKind::Int, ..
        } => Ok((Vec::new(), DType::Int64)),
        Type::Num {
            kind: NumKind::Float,
            ..
        } => Ok((Vec::new(), kind.default_float())),
        Type::Array { dtype, shape, .. } => Ok((shape, dtype)),
        Type::Tuple(TupleType::Fixed(elems)) => {
            let Some((first, rest)) = elems.split_first() else {
                return Ok((vec![ShapeElem::Known(0)], kind.default_float()));
            };
            let (mut inner, mut dtype) = literal_info(cx, first, kind)?;
            for elem in rest {
                let (shape, d) = literal_info(cx, elem, kind)?;
                if shape.len() != inner.len() {
                    return Err(RuleError::failed("array literal has an inhomogeneous shape"));
                }
                inner = inner.iter().zip(&shape).map(|(a, b)| a.join(*b)).collect();
                dtype = dtype.promote(d);
            }
            inner.insert(0, ShapeElem::Known(elems.len()));
            Ok((inner, dtype))
        }
        Type::List(elem) | Type::Tuple(TupleType::Homogeneous(elem)) => {
            let (mut inner, dtype) = literal_info(cx, &elem, kind)?;
            inner.insert(0, ShapeElem::Unknown);
            Ok((inner, dtype))
        }
        other => Err(RuleError::failed(format!(
            "cannot build an array from '{}'",
            other.tag()
        ))),
    }
}

/// `array(data, dtype=None)` / `tensor(data, dtype=None)`.
fn tfunc_array<L: Library>(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let Some(data) = args.first() else {
        return Err(RuleError::arity("at least 1", 0));
    };
    let (shape, inferred) = literal_info(cx, data, L::KIND)?;
    let dtype = dtype_arg(cx, arg(args, kwargs, 1, &["dtype"]))?.unwrap_or(inferred);
    Ok(Type::array(L::KIND, dtype, shape))
}

/// `arange(stop)`, `arange(start, stop[, step])`.
fn tfunc_arange<L: Library>(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let mut any_float = false;
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        match cx.deref(a) {
            Type::Num { kind, value } => {
                any_float |= kind == NumKind::Float;
                values.push(value.map(|v| v.as_f64()));
            }
            Type::Bool | Type::Var(_) => values.push(None),
            other => {
                return Err(RuleError::failed(format!(
                    "arange() bounds must be numbers, found '{}'",
                    other.tag()
                )))
            }
        }
    }
    let (start, stop, step) = match values.as_slice() {
        [stop] => (Some(0.0), *stop, Some(1.0)),
        [start, stop] => (*start, *stop, Some(1.0)),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(RuleError::arity("1 to 3", args.len())),
    };
    let len = match (start, stop, step) {
        (_, _, Some(step)) if step == 0.0 => {
            return Err(RuleError::failed("arange() step must not be zero"))
        }
        (Some(start), Some(stop), Some(step)) => {
            ShapeElem::Known(((stop - start) / step).ceil().max(0.0) as usize)
        }
        _ => ShapeElem::Unknown,
    };
    let dtype = match dtype_arg(cx, keyword(kwargs, &["dtype"]))? {
        Some(dtype) => dtype,
        None if any_float => L::KIND.default_float(),
        None => DType::Int64,
    };
    Ok(Type::array(L::KIND, dtype, vec![len]))
}

/// `randn(d0, d1, ...)`: random floats of the given shape.
fn tfunc_random<L: Library>(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let shape = shape_dims(&shape_from_args(cx, args)?)?;
    let dtype = dtype_arg(cx, keyword(kwargs, &["dtype"]))?.unwrap_or_else(|| L::KIND.default_float());
    Ok(Type::array(L::KIND, dtype, shape))
}

// ---------------------------------------------------------------------------
// Shape manipulation

fn reshape_shape(input: &[ShapeElem], target: &[Option<i64>]) -> Result<Shape, RuleError> {
    if target.iter().filter(|d| **d == Some(-1)).count() > 1 {
        return Err(RuleError::failed("can only specify one unknown dimension"));
    }
    let mut explicit = Some(1usize);
    let mut out = Vec::with_capacity(target.len());
    let mut inferred_at = None;
    for (i, size) in target.iter().enumerate() {
        match size {
            Some(-1) => {
                inferred_at = Some(i);
                out.push(ShapeElem::Unknown);
            }
            Some(n) => {
                let dim = to_dim(Some(*n))?;
                explicit = explicit.zip(dim.value()).and_then(|(a, b)| a.checked_mul(b));
                out.push(dim);
            }
            None => {
                explicit = None;
                out.push(ShapeElem::Unknown);
            }
        }
    }
    let total = num_elements(input).value();
    match (inferred_at, total, explicit) {
        (Some(i), Some(total), Some(explicit)) => {
            if explicit == 0 || total % explicit != 0 {
                return Err(RuleError::failed(format!(
                    "cannot reshape array of shape {} into shape {}",
                    display_shape(input),
                    display_shape(&out)
                )));
            }
            out[i] = ShapeElem::Known(total / explicit);
        }
        (None, Some(total), Some(explicit)) if total != explicit => {
            return Err(RuleError::failed(format!(
                "cannot reshape array of size {total} into shape {}",
                display_shape(&out)
            )));
        }
        _ => {}
    }
    Ok(out)
}

/// `reshape(a, newshape)`.
fn tfunc_reshape(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let Some(target) = arg(args, kwargs, 1, &["newshape", "shape"]) else {
        return Err(RuleError::arity("2", args.len()));
    };
    let shape = reshape_shape(&a.shape, &shape_arg(cx, target)?)?;
    Ok(a.with_shape(shape))
}

/// `a.reshape(*shape)` and `t.view(*shape)`.
fn tfunc_reshape_method(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    if args.len() < 2 {
        return Err(RuleError::arity("at least 1", 0));
    }
    let shape = reshape_shape(&a.shape, &shape_from_args(cx, &args[1..])?)?;
    Ok(a.with_shape(shape))
}

/// Members of an array sequence: a fixed tuple gives each member, a list
/// only one standing for all of them.
enum Members {
    Each(Vec<ArrayInfo>),
    Representative(ArrayInfo),
}

fn members(cx: &RuleCx, t: &Type) -> Result<Members, RuleError> {
    match cx.deref(t) {
        Type::Tuple(TupleType::Fixed(elems)) => {
            if elems.is_empty() {
                return Err(RuleError::failed("need at least one array to join"));
            }
            Ok(Members::Each(
                elems.iter().map(|e| as_array(cx, e)).collect::<Result<_, _>>()?,
            ))
        }
        Type::List(elem) | Type::Tuple(TupleType::Homogeneous(elem)) => {
            Ok(Members::Representative(as_array(cx, &elem)?))
        }
        other => Err(RuleError::failed(format!(
            "expected a sequence of arrays, found '{}'",
            other.tag()
        ))),
    }
}

/// Common kind, dtype and shape of `arrays`, skipping `axis`, which is
/// joined instead of refined. Ranks and the other dimensions must agree.
fn agree(arrays: &[ArrayInfo], axis: Option<usize>) -> Result<ArrayInfo, RuleError> {
    let first = &arrays[0];
    let mut acc = first.clone();
    for a in &arrays[1..] {
        if a.kind != acc.kind {
            return Err(RuleError::failed("cannot join arrays of different kinds"));
        }
        if a.rank() != acc.rank() {
            return Err(UnifyError::Rank {
                left: first.clone().into_type(),
                right: a.clone().into_type(),
            }
            .into());
        }
        acc.dtype = acc.dtype.promote(a.dtype);
        for (i, (x, y)) in acc.shape.iter_mut().zip(&a.shape).enumerate() {
            if Some(i) == axis {
                continue;
            }
            if !x.compatible(*y) {
                return Err(UnifyError::Dim {
                    axis: i,
                    left: *x,
                    right: *y,
                }
                .into());
            }
            *x = x.refine(*y);
        }
    }
    Ok(acc)
}

/// `concatenate(arrays, axis=0)` / `cat(tensors, dim=0)`.
fn tfunc_concatenate(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let Some(seq) = args.first() else {
        return Err(RuleError::arity("at least 1", 0));
    };
    let axis = optional_int_arg(cx, arg(args, kwargs, 1, &["axis", "dim"]), 0)?;
    match members(cx, seq)? {
        Members::Each(arrays) => {
            let rank = arrays[0].rank();
            let Some(axis) = axis else {
                return Ok(arrays[0].with_shape(vec![ShapeElem::Unknown; rank]));
            };
            let axis = norm_axis(axis, rank)?;
            let mut out = agree(&arrays, Some(axis))?;
            out.shape[axis] = arrays
                .iter()
                .map(|a| a.shape.get(axis).copied().unwrap_or(ShapeElem::Unknown))
                .fold(ShapeElem::Known(0), |acc, d| acc + d);
            Ok(out.into_type())
        }
        Members::Representative(a) => {
            let mut shape = a.shape.clone();
            match axis {
                Some(axis) => shape[norm_axis(axis, a.rank())?] = ShapeElem::Unknown,
                None => shape = vec![ShapeElem::Unknown; a.rank()],
            }
            Ok(a.with_shape(shape))
        }
    }
}

/// `stack(arrays, axis=0)`: joins along a new axis.
fn tfunc_stack(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let Some(seq) = args.first() else {
        return Err(RuleError::arity("at least 1", 0));
    };
    let axis = optional_int_arg(cx, arg(args, kwargs, 1, &["axis", "dim"]), 0)?;
    let (mut out, count) = match members(cx, seq)? {
        Members::Each(arrays) => (agree(&arrays, None)?, ShapeElem::Known(arrays.len())),
        Members::Representative(a) => (a, ShapeElem::Unknown),
    };
    match axis {
        Some(axis) => {
            let axis = norm_axis(axis, out.rank() + 1)?;
            out.shape.insert(axis, count);
        }
        None => out.shape = vec![ShapeElem::Unknown; out.rank() + 1],
    }
    Ok(out.into_type())
}

/// `squeeze(a, axis=None)`: drops size-one dimensions.
///
/// Without an axis, unknown dimensions are assumed not to be one.
fn tfunc_squeeze(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let Some(axis) = arg(args, kwargs, 1, &["axis", "dim"]) else {
        let shape = a.shape.iter().copied().filter(|d| *d != ShapeElem::Known(1)).collect();
        return Ok(a.with_shape(shape));
    };
    let Some(axis) = int_arg(cx, axis)? else {
        return Ok(cx.fresh());
    };
    let axis = norm_axis(axis, a.rank())?;
    let mut shape = a.shape.clone();
    match shape[axis] {
        ShapeElem::Known(1) | ShapeElem::Unknown => {
            shape.remove(axis);
        }
        ShapeElem::Known(n) if a.kind == ArrayKind::Ndarray => {
            return Err(RuleError::failed(format!(
                "cannot select an axis to squeeze out which has size {n}"
            )))
        }
        ShapeElem::Known(_) => {}
    }
    Ok(a.with_shape(shape))
}

/// `expand_dims(a, axis)` / `unsqueeze(t, dim)`.
fn tfunc_expand_dims(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let Some(axis) = arg(args, kwargs, 1, &["axis", "dim"]) else {
        return Err(RuleError::arity("2", args.len()));
    };
    let Some(axis) = int_arg(cx, axis)? else {
        return Ok(a.with_shape(vec![ShapeElem::Unknown; a.rank() + 1]));
    };
    let axis = norm_axis(axis, a.rank() + 1)?;
    let mut shape = a.shape.clone();
    shape.insert(axis, ShapeElem::Known(1));
    Ok(a.with_shape(shape))
}

fn permuted(a: &ArrayInfo, axes: &[Option<i64>]) -> RuleResult {
    if axes.len() != a.rank() {
        return Err(RuleError::failed(format!(
            "axes don't match array: {} axes for {} dimensions",
            axes.len(),
            a.rank()
        )));
    }
    let mut shape = Vec::with_capacity(axes.len());
    let mut seen = vec![false; a.rank()];
    for axis in axes {
        let Some(axis) = axis else {
            return Ok(a.with_shape(vec![ShapeElem::Unknown; a.rank()]));
        };
        let i = norm_axis(*axis, a.rank())?;
        if std::mem::replace(&mut seen[i], true) {
            return Err(RuleError::failed("repeated axis in transpose"));
        }
        shape.push(a.shape[i]);
    }
    Ok(a.with_shape(shape))
}

fn swapped(cx: &RuleCx, a: &ArrayInfo, d0: &Type, d1: &Type) -> RuleResult {
    match (int_arg(cx, d0)?, int_arg(cx, d1)?) {
        (Some(d0), Some(d1)) => {
            let mut shape = a.shape.clone();
            shape.swap(norm_axis(d0, a.rank())?, norm_axis(d1, a.rank())?);
            Ok(a.with_shape(shape))
        }
        _ => Ok(a.with_shape(vec![ShapeElem::Unknown; a.rank()])),
    }
}

/// numpy: `transpose(a, axes=None)` reverses or permutes the axes.
/// torch: `transpose(t, dim0, dim1)` swaps two of them.
fn tfunc_transpose(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    match (a.kind, &args[1..]) {
        (ArrayKind::Tensor, [d0, d1]) => swapped(cx, &a, d0, d1),
        (ArrayKind::Tensor, _) => Err(RuleError::arity("2", args.len() - 1)),
        (ArrayKind::Ndarray, rest) => {
            let axes = match (rest, keyword(kwargs, &["axes"])) {
                ([], None) => None,
                ([], Some(axes)) | ([axes], _) => match cx.deref(axes) {
                    Type::None => None,
                    _ => Some(shape_arg(cx, axes)?),
                },
                (many, _) => Some(many.iter().map(|d| int_arg(cx, d)).collect::<Result<_, _>>()?),
            };
            match axes {
                None => {
                    let mut shape = a.shape.clone();
                    shape.reverse();
                    Ok(a.with_shape(shape))
                }
                Some(axes) => permuted(&a, &axes),
            }
        }
    }
}

/// `t.permute(*dims)`.
fn tfunc_permute(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    permuted(&a, &shape_from_args(cx, &args[1..])?)
}

/// `flatten(a, start_dim=0, end_dim=-1)`; numpy's method flattens fully.
fn tfunc_flatten(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    if a.rank() == 0 {
        return Ok(a.with_shape(vec![ShapeElem::Known(1)]));
    }
    let (start, end) = match a.kind {
        ArrayKind::Ndarray => (Some(0), Some(-1)),
        ArrayKind::Tensor => (
            optional_int_arg(cx, arg(args, kwargs, 1, &["start_dim"]), 0)?,
            optional_int_arg(cx, arg(args, kwargs, 2, &["end_dim"]), -1)?,
        ),
    };
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(cx.fresh());
    };
    let (start, end) = (norm_axis(start, a.rank())?, norm_axis(end, a.rank())?);
    if start > end {
        return Err(RuleError::failed("flatten() has invalid args: start_dim cannot come after end_dim"));
    }
    let mut shape = a.shape[..start].to_vec();
    shape.push(num_elements(&a.shape[start..=end]));
    shape.extend_from_slice(&a.shape[end + 1..]);
    Ok(a.with_shape(shape))
}

// ---------------------------------------------------------------------------
// Reductions

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Sum,
    Mean,
    Extremum,
}

fn reduced_dtype(reduction: Reduction, kind: ArrayKind, dtype: DType) -> DType {
    match reduction {
        Reduction::Sum if dtype == DType::Bool => DType::Int64,
        Reduction::Mean if !dtype.is_float() => kind.default_float(),
        _ => dtype,
    }
}

/// Axes named by an `axis`/`dim` argument: `None` when unknown statically.
fn axes_arg(cx: &RuleCx, t: &Type, rank: usize) -> Result<Option<Vec<usize>>, RuleError> {
    let sizes = match cx.deref(t) {
        Type::Tuple(TupleType::Fixed(_)) => shape_arg(cx, t)?,
        _ => vec![int_arg(cx, t)?],
    };
    sizes
        .into_iter()
        .map(|axis| axis.map(|axis| norm_axis(axis, rank)).transpose())
        .collect()
}

/// `sum(a, axis=None, keepdims=False)` and the other reductions.
///
/// `keepdims` is taken to be true whenever it is passed, unless it is the
/// literal `0`; boolean arguments carry no value to look at.
fn reduce(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords, reduction: Reduction) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let dtype = reduced_dtype(reduction, a.kind, a.dtype);
    let keepdims = match arg(args, kwargs, 2, &["keepdims", "keepdim"]) {
        Some(flag) => cx.deref(flag).int_value() != Some(0),
        None => false,
    };
    let axis = arg(args, kwargs, 1, &["axis", "dim"]).filter(|t| cx.deref(t) != Type::None);
    let Some(axis) = axis else {
        if keepdims {
            return Ok(Type::array(a.kind, dtype, vec![ShapeElem::Known(1); a.rank()]));
        }
        return Ok(match a.kind {
            ArrayKind::Ndarray => element_scalar(dtype),
            ArrayKind::Tensor => Type::array(a.kind, dtype, Vec::new()),
        });
    };
    let Some(axes) = axes_arg(cx, axis, a.rank())? else {
        let rank = if keepdims { a.rank() } else { a.rank().saturating_sub(1) };
        return Ok(Type::array(a.kind, dtype, vec![ShapeElem::Unknown; rank]));
    };
    let shape: Shape = a
        .shape
        .iter()
        .enumerate()
        .filter_map(|(i, d)| match (axes.contains(&i), keepdims) {
            (false, _) => Some(*d),
            (true, true) => Some(ShapeElem::Known(1)),
            (true, false) => None,
        })
        .collect();
    if a.kind == ArrayKind::Tensor && reduction == Reduction::Extremum {
        // torch.max(t, dim) returns (values, indices)
        let indices = Type::tensor(DType::Int64, shape.clone());
        return Ok(Type::tuple(vec![Type::array(a.kind, dtype, shape), indices]));
    }
    Ok(Type::array(a.kind, dtype, shape))
}

fn tfunc_sum(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    reduce(cx, args, kwargs, Reduction::Sum)
}

fn tfunc_mean(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    reduce(cx, args, kwargs, Reduction::Mean)
}

/// `max`/`min`; `torch.max(a, b)` with two tensors is elementwise.
fn tfunc_max(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    if let [a, b] = args {
        if cx.deref(a).is_array() && cx.deref(b).is_array() {
            return tfunc_maximum(cx, args, kwargs);
        }
    }
    reduce(cx, args, kwargs, Reduction::Extremum)
}

// ---------------------------------------------------------------------------
// Products

/// `matmul(a, b)` / `a.matmul(b)`.
fn tfunc_matmul(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let [a, b] = args else {
        return Err(RuleError::arity("2", args.len()));
    };
    let (a, b) = (as_array(cx, a)?, as_array(cx, b)?);
    if a.kind != b.kind {
        return Err(RuleError::failed("cannot multiply arrays of different kinds"));
    }
    let shape = matmul_shape(&a.shape, &b.shape)?;
    Ok(Type::array(a.kind, a.dtype.promote(b.dtype), shape))
}

/// `dot(a, b)`: scalar operands multiply elementwise.
fn tfunc_dot(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let [a, b] = args else {
        return Err(RuleError::arity("2", args.len()));
    };
    if !cx.deref(a).is_array() || !cx.deref(b).is_array() {
        return Ok(tfunc_mul(cx, a, b)?.without_values());
    }
    tfunc_matmul(cx, args, kwargs)
}

/// `mm(a, b)`: both operands must be matrices.
fn tfunc_mm(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    for (i, t) in args.iter().enumerate() {
        let a = as_array(cx, t)?;
        if a.rank() != 2 {
            return Err(RuleError::failed(format!(
                "mm: argument {} must be a matrix, got {} dimensions",
                i + 1,
                a.rank()
            )));
        }
    }
    tfunc_matmul(cx, args, kwargs)
}

// ---------------------------------------------------------------------------
// Splitting

fn piece(a: &ArrayInfo, axis: usize, size: ShapeElem) -> Type {
    let mut shape = a.shape.clone();
    shape[axis] = size;
    a.with_shape(shape)
}

/// Pieces of sizes `size, size, ..., rest` covering a dimension of `total`.
fn equal_pieces(a: &ArrayInfo, axis: usize, total: usize, size: usize) -> Type {
    let mut pieces = Vec::new();
    let mut left = total;
    while left > 0 {
        let n = left.min(size);
        pieces.push(piece(a, axis, ShapeElem::Known(n)));
        left -= n;
    }
    Type::tuple(pieces)
}

/// numpy: `split(a, sections, axis=0)` returns a list of equal parts.
/// torch: `split(t, split_size, dim=0)` returns a tuple of parts of
/// `split_size`, the last one possibly smaller.
fn tfunc_split(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let Some(sections) = arg(args, kwargs, 1, &["indices_or_sections", "split_size_or_sections"]) else {
        return Err(RuleError::arity("2", args.len()));
    };
    let Some(axis) = optional_int_arg(cx, arg(args, kwargs, 2, &["axis", "dim"]), 0)? else {
        return Ok(cx.fresh());
    };
    let axis = norm_axis(axis, a.rank())?;
    let dim = a.shape[axis];
    let sections = cx.deref(sections);
    match a.kind {
        ArrayKind::Ndarray => {
            let size = match (int_arg(cx, &sections), dim) {
                (Ok(Some(n)), _) if n <= 0 => {
                    return Err(RuleError::failed("number of sections must be positive"))
                }
                (Ok(Some(n)), ShapeElem::Known(d)) => {
                    let n = n as usize;
                    if d % n != 0 {
                        return Err(RuleError::failed(
                            "array split does not result in an equal division",
                        ));
                    }
                    ShapeElem::Known(d / n)
                }
                _ => ShapeElem::Unknown,
            };
            Ok(Type::list(piece(&a, axis, size)))
        }
        ArrayKind::Tensor => match (&sections, dim) {
            (Type::Tuple(TupleType::Fixed(sizes)), _) => {
                let mut pieces = Vec::with_capacity(sizes.len());
                for s in sizes {
                    pieces.push(piece(&a, axis, to_dim(int_arg(cx, s)?)?));
                }
                Ok(Type::tuple(pieces))
            }
            (_, ShapeElem::Known(total)) => match int_arg(cx, &sections)? {
                Some(size) if size > 0 => Ok(equal_pieces(&a, axis, total, size as usize)),
                Some(_) => Err(RuleError::failed("split_size must be positive")),
                None => Ok(Type::tuple_of(piece(&a, axis, ShapeElem::Unknown))),
            },
            _ => Ok(Type::tuple_of(piece(&a, axis, ShapeElem::Unknown))),
        },
    }
}

/// `chunk(t, chunks, dim=0)`.
fn tfunc_chunk(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let Some(chunks) = arg(args, kwargs, 1, &["chunks"]) else {
        return Err(RuleError::arity("2", args.len()));
    };
    let Some(axis) = optional_int_arg(cx, arg(args, kwargs, 2, &["dim"]), 0)? else {
        return Ok(cx.fresh());
    };
    let axis = norm_axis(axis, a.rank())?;
    match (int_arg(cx, chunks)?, a.shape[axis]) {
        (Some(n), _) if n <= 0 => Err(RuleError::failed("chunk expects `chunks` to be positive")),
        (Some(n), ShapeElem::Known(total)) => {
            let size = total.div_ceil(n as usize).max(1);
            Ok(equal_pieces(&a, axis, total, size))
        }
        _ => Ok(Type::tuple_of(piece(&a, axis, ShapeElem::Unknown))),
    }
}

// ---------------------------------------------------------------------------
// Elementwise

fn unary(cx: &mut RuleCx, args: &[Type], float_result: bool) -> RuleResult {
    let Some(x) = args.first() else {
        return Err(RuleError::arity("at least 1", 0));
    };
    match cx.deref(x) {
        Type::Array { kind, dtype, shape } => {
            let dtype = if float_result && !dtype.is_float() {
                kind.default_float()
            } else {
                dtype
            };
            Ok(Type::array(kind, dtype, shape))
        }
        Type::Num { .. } | Type::Bool if float_result => Ok(Type::float()),
        Type::Num { kind, .. } => Ok(Type::num(kind)),
        Type::Bool => Ok(Type::int()),
        Type::Var(_) => Ok(cx.fresh()),
        other => Err(RuleError::failed(format!(
            "elementwise function applied to '{}'",
            other.tag()
        ))),
    }
}

/// Elementwise function that keeps the dtype (`abs`, `relu`, `dropout`).
fn tfunc_unary(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    unary(cx, args, false)
}

/// Elementwise function with a floating result (`exp`, `sigmoid`, `softmax`).
fn tfunc_float_unary(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    unary(cx, args, true)
}

/// `maximum(a, b)`: broadcasts like `a + b`.
fn tfunc_maximum(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let [a, b] = args else {
        return Err(RuleError::arity("2", args.len()));
    };
    Ok(tfunc_add(cx, a, b)?.without_values())
}

// ---------------------------------------------------------------------------
// Methods

fn tfunc_same(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    Ok(array_arg(cx, args, 0)?.into_type())
}

fn cast(cx: &RuleCx, args: &[Type], dtype: DType) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    Ok(Type::array(a.kind, dtype, a.shape))
}

/// `a.astype(dtype)`.
fn tfunc_astype(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    match dtype_arg(cx, arg(args, kwargs, 1, &["dtype"]))? {
        Some(dtype) => cast(cx, args, dtype),
        None => Ok(array_arg(cx, args, 0)?.into_type()),
    }
}

/// `t.to(...)`: a dtype argument casts; devices leave the type alone.
fn tfunc_to(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let dtype = args
        .iter()
        .skip(1)
        .chain(keyword(kwargs, &["dtype"]))
        .find_map(|t| match cx.deref(t) {
            Type::DTypeTag(dtype) => Some(dtype),
            _ => None,
        });
    match dtype {
        Some(dtype) => cast(cx, args, dtype),
        None => tfunc_same(cx, args, kwargs),
    }
}

fn tfunc_to_float(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    cast(cx, args, DType::Float32)
}

fn tfunc_to_double(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    cast(cx, args, DType::Float64)
}

fn tfunc_to_half(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    cast(cx, args, DType::Float16)
}

fn tfunc_to_long(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    cast(cx, args, DType::Int64)
}

fn tfunc_to_int(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    cast(cx, args, DType::Int32)
}

fn tfunc_to_bool(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    cast(cx, args, DType::Bool)
}

/// `t.numpy()`.
fn tfunc_numpy(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    Ok(Type::ndarray(a.dtype, a.shape))
}

/// `t.size()` is the shape tuple; `t.size(d)` one dimension.
fn tfunc_size(cx: &mut RuleCx, args: &[Type], kwargs: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    let Some(dim) = arg(args, kwargs, 1, &["dim"]) else {
        return Ok(shape_tuple(&a.shape));
    };
    match int_arg(cx, dim)? {
        Some(d) => match a.shape[norm_axis(d, a.rank())?] {
            ShapeElem::Known(n) => Ok(Type::int_const(n as i64)),
            ShapeElem::Unknown => Ok(Type::int()),
        },
        None => Ok(Type::int()),
    }
}

fn tfunc_dim(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    Ok(Type::int_const(array_arg(cx, args, 0)?.rank() as i64))
}

fn tfunc_numel(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    Ok(match num_elements(&a.shape) {
        ShapeElem::Known(n) => Type::int_const(n as i64),
        ShapeElem::Unknown => Type::int(),
    })
}

/// `a.item()`: the single element as a Python scalar.
fn tfunc_item(cx: &mut RuleCx, args: &[Type], _: &Keywords) -> RuleResult {
    let a = array_arg(cx, args, 0)?;
    if let ShapeElem::Known(n) = num_elements(&a.shape) {
        if n != 1 {
            return Err(RuleError::failed(format!(
                "only one element arrays can be converted to scalars, got {n}"
            )));
        }
    }
    Ok(element_scalar(a.dtype))
}

// ---------------------------------------------------------------------------
// Attributes

fn tfunc_attr_shape(cx: &mut RuleCx, receiver: &Type) -> RuleResult {
    Ok(shape_tuple(&as_array(cx, receiver)?.shape))
}

fn tfunc_attr_ndim(cx: &mut RuleCx, receiver: &Type) -> RuleResult {
    Ok(Type::int_const(as_array(cx, receiver)?.rank() as i64))
}

fn tfunc_attr_dtype(cx: &mut RuleCx, receiver: &Type) -> RuleResult {
    Ok(Type::DTypeTag(as_array(cx, receiver)?.dtype))
}

fn tfunc_attr_t(cx: &mut RuleCx, receiver: &Type) -> RuleResult {
    let a = as_array(cx, receiver)?;
    let mut shape = a.shape.clone();
    shape.reverse();
    Ok(a.with_shape(shape))
}

fn tfunc_attr_size(cx: &mut RuleCx, receiver: &Type) -> RuleResult {
    let a = as_array(cx, receiver)?;
    tfunc_numel(cx, &[a.into_type()], &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{known_shape, Substitution};
    use crate::tfuncs::registry::TransferFn;
    use pretty_assertions::assert_eq;

    fn registry() -> TransferFunctions {
        let mut registry = TransferFunctions::new();
        register(&mut registry);
        registry
    }

    fn call(name: &str, args: &[Type], kwargs: &[(&str, Type)]) -> RuleResult {
        let rule: TransferFn = registry().library(name).unwrap_or_else(|| panic!("no rule {name}"));
        let kwargs: Vec<(String, Type)> = kwargs.iter().map(|(k, t)| (k.to_string(), t.clone())).collect();
        let mut subst = Substitution::new();
        let mut cx = RuleCx::new(&mut subst);
        rule(&mut cx, args, &kwargs)
    }

    fn dims(ds: &[i64]) -> Type {
        Type::tuple(ds.iter().map(|d| Type::int_const(*d)).collect())
    }

    fn nd(dtype: DType, shape: &[usize]) -> Type {
        Type::ndarray(dtype, known_shape(shape))
    }

    fn tn(dtype: DType, shape: &[usize]) -> Type {
        Type::tensor(dtype, known_shape(shape))
    }

    #[test]
    fn test_creation() {
        assert_eq!(call("numpy.zeros", &[dims(&[3, 4])], &[]), Ok(nd(DType::Float64, &[3, 4])));
        assert_eq!(
            call("torch.ones", &[Type::int_const(2), Type::int_const(5)], &[]),
            Ok(tn(DType::Float32, &[2, 5]))
        );
        assert_eq!(
            call("numpy.zeros", &[Type::int_const(4)], &[("dtype", Type::DTypeTag(DType::Int32))]),
            Ok(nd(DType::Int32, &[4]))
        );
        assert_eq!(
            call("numpy.full", &[dims(&[2]), Type::int_const(7)], &[]),
            Ok(nd(DType::Int64, &[2]))
        );
        assert_eq!(
            call("numpy.zeros", &[dims(&[2]).without_values()], &[]),
            Ok(Type::ndarray(DType::Float64, vec![ShapeElem::Unknown]))
        );
    }

    #[test]
    fn test_array_literals_and_arange() {
        let rows = Type::tuple(vec![
            Type::tuple(vec![Type::int_const(1), Type::int_const(2)]),
            Type::tuple(vec![Type::int_const(3), Type::float_const(4.0)]),
        ]);
        assert_eq!(call("numpy.array", &[rows], &[]), Ok(nd(DType::Float64, &[2, 2])));
        assert_eq!(
            call("torch.tensor", &[Type::list(Type::float())], &[]),
            Ok(Type::tensor(DType::Float32, vec![ShapeElem::Unknown]))
        );
        assert_eq!(call("numpy.arange", &[Type::int_const(5)], &[]), Ok(nd(DType::Int64, &[5])));
        assert_eq!(
            call("numpy.arange", &[Type::int_const(1), Type::float_const(2.0), Type::float_const(0.25)], &[]),
            Ok(nd(DType::Float64, &[4]))
        );
    }

    #[test]
    fn test_reshape() {
        let x = nd(DType::Float32, &[2, 6]);
        assert_eq!(call("numpy.reshape", &[x.clone(), dims(&[3, -1])], &[]), Ok(nd(DType::Float32, &[3, 4])));
        assert_eq!(
            call("ndarray.reshape", &[x.clone(), Type::int_const(12)], &[]),
            Ok(nd(DType::Float32, &[12]))
        );
        assert!(matches!(
            call("ndarray.reshape", &[x.clone(), dims(&[5, 2])], &[]),
            Err(RuleError::Failed(_))
        ));
        assert_eq!(
            call("tensor.view", &[tn(DType::Float32, &[4, 3]), Type::int_const(-1)], &[]),
            Ok(tn(DType::Float32, &[12]))
        );
    }

    #[test]
    fn test_concatenate_and_stack() {
        let a = nd(DType::Float64, &[2, 3]);
        let b = nd(DType::Float64, &[4, 3]);
        assert_eq!(
            call("numpy.concatenate", &[Type::tuple(vec![a.clone(), b.clone()])], &[]),
            Ok(nd(DType::Float64, &[6, 3]))
        );
        let err = call(
            "numpy.concatenate",
            &[Type::tuple(vec![a.clone(), b.clone()])],
            &[("axis", Type::int_const(1))],
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::Unify(UnifyError::Dim { axis: 0, .. })));
        assert_eq!(
            call("numpy.stack", &[Type::tuple(vec![a.clone(), a.clone()])], &[("axis", Type::int_const(-1))]),
            Ok(nd(DType::Float64, &[2, 3, 2]))
        );
        assert_eq!(
            call("torch.cat", &[Type::list(tn(DType::Float32, &[2, 3]))], &[("dim", Type::int_const(1))]),
            Ok(Type::tensor(DType::Float32, vec![ShapeElem::Known(2), ShapeElem::Unknown]))
        );
    }

    #[test]
    fn test_transpose_kinds() {
        let x = nd(DType::Int64, &[2, 3, 4]);
        assert_eq!(call("numpy.transpose", &[x.clone()], &[]), Ok(nd(DType::Int64, &[4, 3, 2])));
        assert_eq!(
            call("ndarray.transpose", &[x, Type::int_const(1), Type::int_const(0), Type::int_const(2)], &[]),
            Ok(nd(DType::Int64, &[3, 2, 4]))
        );
        let t = tn(DType::Float32, &[2, 3, 4]);
        assert_eq!(
            call("tensor.transpose", &[t.clone(), Type::int_const(0), Type::int_const(2)], &[]),
            Ok(tn(DType::Float32, &[4, 3, 2]))
        );
        assert_eq!(
            call("tensor.permute", &[t, Type::int_const(2), Type::int_const(0), Type::int_const(1)], &[]),
            Ok(tn(DType::Float32, &[4, 2, 3]))
        );
    }

    #[test]
    fn test_reductions() {
        let x = nd(DType::Bool, &[3, 4]);
        assert_eq!(call("numpy.sum", &[x.clone()], &[]), Ok(Type::int()));
        assert_eq!(
            call("ndarray.sum", &[x.clone()], &[("axis", Type::int_const(0))]),
            Ok(nd(DType::Int64, &[4]))
        );
        assert_eq!(
            call("ndarray.mean", &[nd(DType::Int64, &[3, 4]), Type::int_const(1)], &[("keepdims", Type::Bool)]),
            Ok(nd(DType::Float64, &[3, 1]))
        );
        let t = tn(DType::Float32, &[3, 4]);
        assert_eq!(
            call("tensor.max", &[t.clone()], &[("dim", Type::int_const(1))]),
            Ok(Type::tuple(vec![tn(DType::Float32, &[3]), tn(DType::Int64, &[3])]))
        );
        assert_eq!(call("tensor.sum", &[t.clone()], &[]), Ok(tn(DType::Float32, &[])));
        assert_eq!(call("torch.max", &[t.clone(), t.clone()], &[]), Ok(t));
    }

    #[test]
    fn test_products() {
        let a = nd(DType::Float64, &[2, 3]);
        let b = nd(DType::Float64, &[3, 5]);
        assert_eq!(call("numpy.matmul", &[a.clone(), b.clone()], &[]), Ok(nd(DType::Float64, &[2, 5])));
        assert!(matches!(
            call("numpy.dot", &[a.clone(), a.clone()], &[]),
            Err(RuleError::Unify(UnifyError::Dim { .. }))
        ));
        assert_eq!(call("numpy.dot", &[a.clone(), Type::float_const(2.0)], &[]), Ok(a));
        assert!(call("torch.mm", &[tn(DType::Float32, &[3]), tn(DType::Float32, &[3, 2])], &[]).is_err());
    }

    #[test]
    fn test_split_and_chunk() {
        let x = nd(DType::Float64, &[6, 2]);
        assert_eq!(
            call("numpy.split", &[x.clone(), Type::int_const(3)], &[]),
            Ok(Type::list(nd(DType::Float64, &[2, 2])))
        );
        assert!(call("numpy.split", &[x, Type::int_const(4)], &[]).is_err());
        let t = tn(DType::Float32, &[5, 2]);
        assert_eq!(
            call("torch.split", &[t.clone(), Type::int_const(2)], &[]),
            Ok(Type::tuple(vec![
                tn(DType::Float32, &[2, 2]),
                tn(DType::Float32, &[2, 2]),
                tn(DType::Float32, &[1, 2]),
            ]))
        );
        assert_eq!(
            call("torch.chunk", &[t, Type::int_const(2)], &[]),
            Ok(Type::tuple(vec![tn(DType::Float32, &[3, 2]), tn(DType::Float32, &[2, 2])]))
        );
    }

    #[test]
    fn test_shape_methods() {
        let t = tn(DType::Float32, &[1, 3, 1]);
        assert_eq!(call("tensor.squeeze", &[t.clone()], &[]), Ok(tn(DType::Float32, &[3])));
        assert_eq!(
            call("tensor.unsqueeze", &[t.clone(), Type::int_const(0)], &[]),
            Ok(tn(DType::Float32, &[1, 1, 3, 1]))
        );
        assert_eq!(call("tensor.flatten", &[t.clone(), Type::int_const(1)], &[]), Ok(tn(DType::Float32, &[1, 3])));
        assert_eq!(call("tensor.size", &[t.clone()], &[]), Ok(dims(&[1, 3, 1])));
        assert_eq!(call("tensor.size", &[t.clone(), Type::int_const(-2)], &[]), Ok(Type::int_const(3)));
        assert_eq!(call("tensor.long", &[t.clone()], &[]), Ok(tn(DType::Int64, &[1, 3, 1])));
        assert_eq!(call("tensor.numpy", &[t], &[]), Ok(nd(DType::Float32, &[1, 3, 1])));
        assert_eq!(
            call("ndarray.astype", &[nd(DType::Float64, &[2]), Type::DTypeTag(DType::Int32)], &[]),
            Ok(nd(DType::Int32, &[2]))
        );
        assert_eq!(call("numpy.exp", &[nd(DType::Int64, &[2])], &[]), Ok(nd(DType::Float64, &[2])));
    }

    #[test]
    fn test_attributes() {
        let registry = registry();
        let mut subst = Substitution::new();
        let mut cx = RuleCx::new(&mut subst);
        let x = Type::ndarray(DType::Float32, vec![ShapeElem::Known(2), ShapeElem::Unknown]);
        let shape = registry.array_attribute(ArrayKind::Ndarray, "shape").unwrap();
        assert_eq!(shape(&mut cx, &x), Ok(Type::tuple(vec![Type::int_const(2), Type::int()])));
        let size = registry.array_attribute(ArrayKind::Ndarray, "size").unwrap();
        assert_eq!(size(&mut cx, &x), Ok(Type::int()));
        let t = registry.array_attribute(ArrayKind::Tensor, "T").unwrap();
        assert_eq!(
            t(&mut cx, &tn(DType::Float32, &[2, 5])),
            Ok(tn(DType::Float32, &[5, 2]))
        );
        assert!(registry.array_attribute(ArrayKind::Tensor, "size").is_none());
    }
}
