//! Concrete values supplied by the host, and their conversion to types.

use serde::{Deserialize, Serialize};

use super::{FunctionId, ModuleId, ObjectId};
use crate::lattice::{
    join_all, known_shape, ArrayKind, DType, NumKind, NumValue, ShapeElem, Substitution,
    TupleType, Type,
};

/// Array value as far as inference cares: flavor, element type and extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub kind: ArrayKind,
    pub dtype: DType,
    pub shape: Vec<usize>,
}

impl ArrayValue {
    pub fn ndarray(dtype: DType, shape: &[usize]) -> Self {
        Self {
            kind: ArrayKind::Ndarray,
            dtype,
            shape: shape.to_vec(),
        }
    }

    pub fn tensor(dtype: DType, shape: &[usize]) -> Self {
        Self {
            kind: ArrayKind::Tensor,
            dtype,
            shape: shape.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Array(ArrayValue),
    DType(DType),
    Object(ObjectId),
    Function(FunctionId),
    Module(ModuleId),
    /// Library or builtin callable, by dotted name (`numpy.zeros`, `len`).
    Builtin(String),
    /// Method looked up on an object, bound to it.
    Method {
        receiver: ObjectId,
        function: FunctionId,
    },
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            other => other.as_int().map(|n| n as f64),
        }
    }

    /// Python-style type name, used in rule failure messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Array(_) => "array",
            Value::DType(_) => "dtype",
            Value::Object(_) => "object",
            Value::Function(_) | Value::Builtin(_) | Value::Method { .. } => "function",
            Value::Module(_) => "module",
        }
    }
}

fn element_type(subst: &mut Substitution, values: &[Value]) -> Type {
    let types: Vec<Type> = values
        .iter()
        .map(|v| type_of_value(subst, v).without_values())
        .collect();
    match join_all(subst, &types) {
        Ok(t) => t,
        Err(_) => subst.fresh_var(),
    }
}

/// Initial type of a concrete value.
///
/// Scalars keep their value; elements of lists and dicts are widened to
/// their kind and joined, with a fresh variable when they disagree.
/// Callables and modules have no type of their own.
pub fn type_of_value(subst: &mut Substitution, value: &Value) -> Type {
    match value {
        Value::None => Type::None,
        Value::Bool(_) => Type::Bool,
        Value::Int(n) => Type::int_const(*n),
        Value::Float(x) => Type::float_const(*x),
        Value::Str(_) => Type::Str,
        Value::List(items) => Type::list(element_type(subst, items)),
        Value::Tuple(items) => Type::tuple(items.iter().map(|v| type_of_value(subst, v)).collect()),
        Value::Dict(entries) => {
            let (keys, values): (Vec<Value>, Vec<Value>) = entries.iter().cloned().unzip();
            let key = element_type(subst, &keys);
            Type::dict(key, element_type(subst, &values))
        }
        Value::Array(array) => Type::array(array.kind, array.dtype, known_shape(&array.shape)),
        Value::DType(dtype) => Type::DTypeTag(*dtype),
        Value::Object(obj) => Type::UserObject(*obj),
        Value::Function(_) | Value::Module(_) | Value::Builtin(_) | Value::Method { .. } => {
            subst.fresh_var()
        }
    }
}

/// Concrete stand-in for a value of type `t`, used to evaluate builtins
/// that have no dedicated rule. `None` when the type is too vague.
pub fn dummy_value(subst: &Substitution, t: &Type) -> Option<Value> {
    Some(match subst.deref(t) {
        Type::None => Value::None,
        Type::Bool => Value::Bool(true),
        Type::Num { value: Some(NumValue::Int(n)), .. } => Value::Int(n),
        Type::Num { value: Some(NumValue::Float(x)), .. } => Value::Float(x),
        Type::Num { kind: NumKind::Int, value: None } => Value::Int(1),
        Type::Num { kind: NumKind::Float, value: None } => Value::Float(1.0),
        Type::Str => Value::Str("a".to_string()),
        Type::List(elem) => Value::List(dummy_value(subst, &elem).into_iter().collect()),
        Type::Tuple(TupleType::Fixed(elems)) => Value::Tuple(
            elems
                .iter()
                .map(|e| dummy_value(subst, e))
                .collect::<Option<Vec<_>>>()?,
        ),
        Type::Tuple(TupleType::Homogeneous(elem)) => {
            Value::Tuple(dummy_value(subst, &elem).into_iter().collect())
        }
        Type::Dict(k, v) => Value::Dict(vec![(dummy_value(subst, &k)?, dummy_value(subst, &v)?)]),
        Type::Array { kind, dtype, shape } => Value::Array(ArrayValue {
            kind,
            dtype,
            shape: shape
                .iter()
                .map(|d| match d {
                    ShapeElem::Known(n) => *n,
                    ShapeElem::Unknown => 1,
                })
                .collect(),
        }),
        Type::Optional(inner) => dummy_value(subst, &inner)?,
        Type::DTypeTag(dtype) => Value::DType(dtype),
        Type::UserObject(obj) => Value::Object(obj),
        Type::Var(_) | Type::Arrow { .. } => return None,
    })
}

/// Whether `t` pins down a single value, so a simulated result may keep
/// its value too.
pub fn is_concrete(subst: &Substitution, t: &Type) -> bool {
    match subst.deref(t) {
        Type::None => true,
        Type::Num { value, .. } => value.is_some(),
        Type::Tuple(TupleType::Fixed(elems)) => elems.iter().all(|e| is_concrete(subst, e)),
        _ => false,
    }
}
