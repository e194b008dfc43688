//! Core type definitions for the inference lattice.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::shape::{display_shape, Shape};
use crate::host::ObjectId;

/// Identifier of a type variable; its binding lives in a [`Substitution`].
///
/// [`Substitution`]: super::subst::Substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NumKind {
    Int,
    Float,
}

/// Statically known value of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumValue {
    Int(i64),
    Float(f64),
}

impl NumValue {
    pub fn kind(self) -> NumKind {
        match self {
            NumValue::Int(_) => NumKind::Int,
            NumValue::Float(_) => NumKind::Float,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            NumValue::Int(n) => n as f64,
            NumValue::Float(x) => x,
        }
    }
}

/// Element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int32,
    Int64,
    Float16,
    Float32,
    Float64,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float16 => "float16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Parses dtype spellings used by array libraries (`float32`, `float`, `long`, ...).
    pub fn from_name(name: &str) -> Option<DType> {
        Some(match name {
            "bool" | "bool_" => DType::Bool,
            "int32" => DType::Int32,
            "int64" | "int" | "long" | "int_" => DType::Int64,
            "float16" | "half" => DType::Float16,
            "float32" | "single" => DType::Float32,
            "float64" | "float" | "double" | "float_" => DType::Float64,
            _ => return None,
        })
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float16 | DType::Float32 | DType::Float64)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }

    /// Scalar kind of one element.
    pub fn num_kind(self) -> Option<NumKind> {
        if self.is_float() {
            Some(NumKind::Float)
        } else if self.is_integer() {
            Some(NumKind::Int)
        } else {
            None
        }
    }

    /// Result dtype of mixing two array dtypes.
    ///
    /// Integers and floats of any width mix to `float64`; otherwise the
    /// wider of the two wins.
    pub fn promote(self, other: DType) -> DType {
        if (self.is_integer() && other.is_float()) || (self.is_float() && other.is_integer()) {
            DType::Float64
        } else {
            self.max(other)
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Array flavor; the flavors never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayKind {
    Ndarray,
    Tensor,
}

impl ArrayKind {
    /// Default floating dtype of arrays created without an explicit dtype.
    pub fn default_float(self) -> DType {
        match self {
            ArrayKind::Ndarray => DType::Float64,
            ArrayKind::Tensor => DType::Float32,
        }
    }

    /// Prefix under which the kind's methods are registered.
    pub fn method_prefix(self) -> &'static str {
        match self {
            ArrayKind::Ndarray => "ndarray",
            ArrayKind::Tensor => "tensor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TupleType {
    /// Known length with per-position element types.
    Fixed(Vec<Type>),
    /// Unknown length, every element of one type.
    Homogeneous(Box<Type>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Var(VarId),
    None,
    Bool,
    Num {
        kind: NumKind,
        value: Option<NumValue>,
    },
    Str,
    List(Box<Type>),
    Tuple(TupleType),
    Dict(Box<Type>, Box<Type>),
    Array {
        kind: ArrayKind,
        dtype: DType,
        shape: Shape,
    },
    Optional(Box<Type>),
    /// Instance of a user-defined class; its fields live in the attribute environment.
    UserObject(ObjectId),
    Arrow {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    DTypeTag(DType),
}

impl Type {
    pub fn int() -> Type {
        Type::Num {
            kind: NumKind::Int,
            value: None,
        }
    }

    pub fn float() -> Type {
        Type::Num {
            kind: NumKind::Float,
            value: None,
        }
    }

    pub fn int_const(n: i64) -> Type {
        Type::Num {
            kind: NumKind::Int,
            value: Some(NumValue::Int(n)),
        }
    }

    pub fn float_const(x: f64) -> Type {
        Type::Num {
            kind: NumKind::Float,
            value: Some(NumValue::Float(x)),
        }
    }

    pub fn num(kind: NumKind) -> Type {
        Type::Num { kind, value: None }
    }

    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn tuple(elems: Vec<Type>) -> Type {
        Type::Tuple(TupleType::Fixed(elems))
    }

    pub fn tuple_of(elem: Type) -> Type {
        Type::Tuple(TupleType::Homogeneous(Box::new(elem)))
    }

    pub fn dict(key: Type, value: Type) -> Type {
        Type::Dict(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn array(kind: ArrayKind, dtype: DType, shape: Shape) -> Type {
        Type::Array { kind, dtype, shape }
    }

    pub fn ndarray(dtype: DType, shape: Shape) -> Type {
        Type::array(ArrayKind::Ndarray, dtype, shape)
    }

    pub fn tensor(dtype: DType, shape: Shape) -> Type {
        Type::array(ArrayKind::Tensor, dtype, shape)
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    /// `bool`, `int` or `float`.
    pub fn is_scalar_num(&self) -> bool {
        matches!(self, Type::Bool | Type::Num { .. })
    }

    /// Statically known integer value.
    pub fn int_value(&self) -> Option<i64> {
        match self {
            Type::Num {
                value: Some(NumValue::Int(n)),
                ..
            } => Some(*n),
            _ => None,
        }
    }

    pub fn num_value(&self) -> Option<NumValue> {
        match self {
            Type::Num { value, .. } => *value,
            _ => None,
        }
    }

    /// Same type with every statically known scalar value forgotten.
    pub fn without_values(&self) -> Type {
        match self {
            Type::Num { kind, .. } => Type::num(*kind),
            Type::List(elem) => Type::list(elem.without_values()),
            Type::Tuple(TupleType::Fixed(elems)) => {
                Type::tuple(elems.iter().map(Type::without_values).collect())
            }
            Type::Tuple(TupleType::Homogeneous(elem)) => Type::tuple_of(elem.without_values()),
            Type::Dict(k, v) => Type::dict(k.without_values(), v.without_values()),
            Type::Optional(inner) => Type::optional(inner.without_values()),
            Type::Arrow { params, ret } => Type::Arrow {
                params: params.iter().map(Type::without_values).collect(),
                ret: Box::new(ret.without_values()),
            },
            other => other.clone(),
        }
    }

    /// Short tag name, used in diagnostics about mismatched kinds.
    pub fn tag(&self) -> &'static str {
        match self {
            Type::Var(_) => "var",
            Type::None => "NoneType",
            Type::Bool => "bool",
            Type::Num { .. } => "num",
            Type::Str => "str",
            Type::List(_) => "list",
            Type::Tuple(_) => "tuple",
            Type::Dict(..) => "dict",
            Type::Array { .. } => "array",
            Type::Optional(_) => "optional",
            Type::UserObject(_) => "object",
            Type::Arrow { .. } => "function",
            Type::DTypeTag(_) => "dtype",
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "a{}", v.0),
            Type::None => f.write_str("NoneType"),
            Type::Bool => f.write_str("bool"),
            Type::Num { kind, value } => {
                let name = match kind {
                    NumKind::Int => "int",
                    NumKind::Float => "float",
                };
                match value {
                    Some(NumValue::Int(n)) => write!(f, "{name}({n})"),
                    Some(NumValue::Float(x)) => write!(f, "{name}({x:?})"),
                    None => f.write_str(name),
                }
            }
            Type::Str => f.write_str("str"),
            Type::List(elem) => write!(f, "{elem} list"),
            Type::Tuple(TupleType::Fixed(elems)) => {
                f.write_str("(")?;
                write_list(f, elems)?;
                if elems.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Type::Tuple(TupleType::Homogeneous(elem)) => write!(f, "{elem} tuple"),
            Type::Dict(k, v) => write!(f, "{{{k} : {v}}}"),
            Type::Array { kind, dtype, shape } => {
                let name = match kind {
                    ArrayKind::Ndarray => "ndarray",
                    ArrayKind::Tensor => "tensor",
                };
                write!(f, "{name}(dtype={dtype}, shape={})", display_shape(shape))
            }
            Type::Optional(inner) => write!(f, "optional({inner})"),
            Type::UserObject(obj) => write!(f, "object#{}", obj.0),
            Type::Arrow { params, ret } => {
                f.write_str("(")?;
                write_list(f, params)?;
                write!(f, ") -> {ret}")
            }
            Type::DTypeTag(dtype) => write!(f, "dtype({dtype})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::shape::{known_shape, ShapeElem};

    #[test]
    fn test_display() {
        let arr = Type::ndarray(DType::Float32, vec![ShapeElem::Known(3), ShapeElem::Unknown]);
        assert_eq!(arr.to_string(), "ndarray(dtype=float32, shape=(3, None))");
        assert_eq!(Type::list(Type::int()).to_string(), "int list");
        assert_eq!(Type::tuple(vec![Type::int()]).to_string(), "(int,)");
        assert_eq!(
            Type::tuple(vec![Type::int(), Type::float_const(0.5)]).to_string(),
            "(int, float(0.5))"
        );
        assert_eq!(Type::dict(Type::Str, Type::int_const(1)).to_string(), "{str : int(1)}");
        assert_eq!(Type::optional(Type::Var(VarId(2))).to_string(), "optional(a2)");
        assert_eq!(Type::tuple_of(Type::Str).to_string(), "str tuple");
    }

    #[test]
    fn test_dtype_names_and_promotion() {
        assert_eq!(DType::from_name("float"), Some(DType::Float64));
        assert_eq!(DType::from_name("int32"), Some(DType::Int32));
        assert_eq!(DType::from_name("long"), Some(DType::Int64));
        assert_eq!(DType::from_name("complex64"), None);
        assert_eq!(DType::Int32.promote(DType::Int64), DType::Int64);
        assert_eq!(DType::Int64.promote(DType::Float32), DType::Float64);
        assert_eq!(DType::Float16.promote(DType::Float32), DType::Float32);
        assert_eq!(DType::Bool.promote(DType::Float32), DType::Float32);
    }

    #[test]
    fn test_without_values() {
        let t = Type::tuple(vec![Type::int_const(3), Type::list(Type::float_const(1.0))]);
        assert_eq!(
            t.without_values(),
            Type::tuple(vec![Type::int(), Type::list(Type::float())])
        );
        let arr = Type::ndarray(DType::Int64, known_shape(&[2]));
        assert_eq!(arr.without_values(), arr);
    }
}
