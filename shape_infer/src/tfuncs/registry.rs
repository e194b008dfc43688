//! Registry of type rules for calls the engine does not inline.
//!
//! A rule predicts the result type of a call from its argument types. Rules
//! are plain function pointers grouped by how the engine reaches them:
//!
//! - `builtins`: Python builtins by bare name (`len`, `range`)
//! - `library`: array-library functions and methods by dotted name
//!   (`numpy.zeros`, `torch.cat`, `ndarray.reshape`, `tensor.view`); methods
//!   receive the receiver as their first argument
//! - `attributes`: array attributes (`ndarray.shape`)
//! - `list_methods`: methods of `list`, receiver first
//! - `instances`: callable objects by class name (`Linear`), given the
//!   object's fields
//! - `operators`: binary operators

use std::collections::HashMap;

use shape_infer_syntax::BinOpKind;

use crate::error::RuleError;
use crate::host::Value;
use crate::lattice::{join, unify, ArrayKind, Substitution, Type};

pub type RuleResult = Result<Type, RuleError>;

/// Keyword arguments of a call, in source order.
pub type Keywords = [(String, Type)];

/// Mutable state a rule may touch: the type-variable store, and the new
/// type of a receiver the rule mutated.
#[derive(Debug)]
pub struct RuleCx<'a> {
    pub subst: &'a mut Substitution,
    widened_receiver: Option<Type>,
}

impl<'a> RuleCx<'a> {
    pub fn new(subst: &'a mut Substitution) -> Self {
        Self {
            subst,
            widened_receiver: None,
        }
    }

    /// Records that the receiver now has type `t` (a list whose element
    /// type grew). The caller rebinds the receiver expression.
    pub fn widen_receiver(&mut self, t: Type) {
        self.widened_receiver = Some(t);
    }

    pub fn take_widened_receiver(&mut self) -> Option<Type> {
        self.widened_receiver.take()
    }

    pub fn fresh(&mut self) -> Type {
        self.subst.fresh_var()
    }

    /// Outermost constructor of `t`, following variable bindings.
    pub fn deref(&self, t: &Type) -> Type {
        self.subst.deref(t)
    }

    pub fn resolve(&self, t: &Type) -> Type {
        self.subst.resolve(t)
    }

    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<(), RuleError> {
        Ok(unify(self.subst, a, b)?)
    }

    pub fn join(&mut self, a: &Type, b: &Type) -> RuleResult {
        Ok(join(self.subst, a, b)?)
    }
}

/// Signature of a function or method rule.
pub type TransferFn = fn(&mut RuleCx, &[Type], &Keywords) -> RuleResult;

/// Signature of an attribute rule: receiver type to attribute type.
pub type AttrFn = fn(&mut RuleCx, &Type) -> RuleResult;

/// Signature of a callable-instance rule: object fields, then call arguments.
pub type InstanceFn = fn(&mut RuleCx, &[(String, Value)], &[Type]) -> RuleResult;

/// Signature of a binary operator rule.
pub type OperatorFn = fn(&mut RuleCx, &Type, &Type) -> RuleResult;

#[derive(Debug, Default)]
pub struct TransferFunctions {
    builtins: HashMap<String, TransferFn>,
    library: HashMap<String, TransferFn>,
    attributes: HashMap<String, AttrFn>,
    list_methods: HashMap<String, TransferFn>,
    instances: HashMap<String, InstanceFn>,
    operators: HashMap<BinOpKind, OperatorFn>,
}

impl TransferFunctions {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_builtin(&mut self, name: &str, tfunc: TransferFn) {
        self.builtins.insert(name.to_string(), tfunc);
    }

    pub fn register_library(&mut self, name: &str, tfunc: TransferFn) {
        self.library.insert(name.to_string(), tfunc);
    }

    pub fn register_attribute(&mut self, name: &str, tfunc: AttrFn) {
        self.attributes.insert(name.to_string(), tfunc);
    }

    pub fn register_list_method(&mut self, name: &str, tfunc: TransferFn) {
        self.list_methods.insert(name.to_string(), tfunc);
    }

    pub fn register_instance(&mut self, class_name: &str, tfunc: InstanceFn) {
        self.instances.insert(class_name.to_string(), tfunc);
    }

    pub fn register_operator(&mut self, op: BinOpKind, tfunc: OperatorFn) {
        self.operators.insert(op, tfunc);
    }

    pub fn builtin(&self, name: &str) -> Option<TransferFn> {
        self.builtins.get(name).copied()
    }

    pub fn library(&self, name: &str) -> Option<TransferFn> {
        self.library.get(name).copied()
    }

    /// Method `name` of arrays of `kind`.
    pub fn array_method(&self, kind: ArrayKind, name: &str) -> Option<TransferFn> {
        self.library
            .get(&format!("{}.{}", kind.method_prefix(), name))
            .copied()
    }

    pub fn array_attribute(&self, kind: ArrayKind, name: &str) -> Option<AttrFn> {
        self.attributes
            .get(&format!("{}.{}", kind.method_prefix(), name))
            .copied()
    }

    pub fn list_method(&self, name: &str) -> Option<TransferFn> {
        self.list_methods.get(name).copied()
    }

    pub fn instance(&self, class_name: &str) -> Option<InstanceFn> {
        self.instances.get(class_name).copied()
    }

    pub fn operator(&self, op: BinOpKind) -> Option<OperatorFn> {
        self.operators.get(&op).copied()
    }

    /// Whether any rule table knows a callee by this name.
    pub fn has_rule(&self, name: &str) -> bool {
        self.builtins.contains_key(name) || self.library.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.builtins.len()
            + self.library.len()
            + self.attributes.len()
            + self.list_methods.len()
            + self.instances.len()
            + self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
