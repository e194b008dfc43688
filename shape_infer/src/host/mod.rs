//! The program being analyzed, as seen by the inference engine.
//!
//! Objects, functions and modules are referred to through stable integer
//! handles; the attribute environment is keyed by [`ObjectId`], so every
//! alias of one object sees the same field types.

pub mod program;
pub mod value;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use program::Program;
pub use value::{dummy_value, is_concrete, type_of_value, ArrayValue, Value};

use crate::lattice::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Parameter-name → template-type bindings declared on a function.
pub type TypeHints = Vec<(String, Type)>;

/// Access to the live program: namespaces, function sources and objects.
pub trait Host {
    /// Module whose globals the analyzed function sees.
    fn main_module(&self) -> ModuleId;

    /// Global `name` in `module`.
    fn lookup_global(&self, module: ModuleId, name: &str) -> Option<Value>;

    /// Attribute `name` of a module value (`np.zeros`, `torch.float32`).
    fn module_attr(&self, module: ModuleId, name: &str) -> Option<Value>;

    /// Source text of a user-defined function, as written (possibly indented).
    fn function_source(&self, function: FunctionId) -> Option<&str>;

    fn function_name(&self, function: FunctionId) -> &str;

    /// Module the function was defined in; its globals resolve the body's names.
    fn function_module(&self, function: FunctionId) -> ModuleId;

    /// Declared parameter types of a function.
    fn type_hints(&self, _function: FunctionId) -> TypeHints {
        Vec::new()
    }

    /// Class name of an object (`Linear`, `Net`).
    fn object_class(&self, object: ObjectId) -> &str;

    /// Current instance fields of an object.
    fn object_fields(&self, object: ObjectId) -> Vec<(String, Value)>;

    /// Field or bound method `name` of an object.
    fn get_attr(&self, object: ObjectId, name: &str) -> Option<Value>;

    /// Method run when the object itself is called (`forward`, then `__call__`).
    fn instance_call(&self, object: ObjectId) -> Option<FunctionId>;

    /// Children of a sequential container, in call order.
    fn sequential_children(&self, object: ObjectId) -> Option<Vec<Value>>;
}
