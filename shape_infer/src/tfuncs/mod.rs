//! Type rules for calls and operators the engine does not inline.
//!
//! # Module structure
//!
//! - `registry`: rule signatures and the `TransferFunctions` tables
//! - `arithmetic`: binary operators, broadcasting and matmul shapes
//! - `builtins`: Python builtins (`len`, `range`, `zip`, ...)
//! - `list_ops`: methods of `list`
//! - `array_ops`: `numpy`/`torch` functions, array methods and attributes
//! - `nn_ops`: callable layer objects (`Linear`, `Conv2d`, ...)
//! - `simulate`: builtins evaluated on stand-in values

pub mod arithmetic;
pub mod array_ops;
pub mod builtins;
pub mod list_ops;
pub mod nn_ops;
pub mod registry;
pub mod simulate;

use std::collections::HashSet;

use once_cell::sync::Lazy;

pub use builtins::element_type;
pub use registry::{
    AttrFn, InstanceFn, Keywords, OperatorFn, RuleCx, RuleResult, TransferFn, TransferFunctions,
};

/// Names that resolve to Python builtins when no local or global shadows
/// them.
pub static BUILTIN_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "len", "range", "abs", "min", "max", "int", "float", "bool", "str", "list", "tuple",
        "dict", "enumerate", "zip", "isinstance", "print", "sum", "hash", "divmod", "round",
        "pow", "ord", "chr", "sorted",
    ]
    .into_iter()
    .collect()
});

/// Calls whose result is `None` and whose arguments carry no type
/// information worth checking.
pub static IGNORED_CALLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "logging.debug",
        "logging.info",
        "logging.warning",
        "logging.error",
        "warnings.warn",
        "torch.manual_seed",
        "numpy.random.seed",
    ]
    .into_iter()
    .collect()
});

pub fn is_builtin_name(name: &str) -> bool {
    BUILTIN_NAMES.contains(name)
}

pub fn is_ignored_call(name: &str) -> bool {
    IGNORED_CALLS.contains(name)
}

/// Registers every rule shipped with the crate.
pub fn register_all(registry: &mut TransferFunctions) {
    arithmetic::register(registry);
    builtins::register(registry);
    list_ops::register(registry);
    array_ops::register(registry);
    nn_ops::register(registry);
}

/// The shipped rules, built once.
pub static DEFAULT_RULES: Lazy<TransferFunctions> = Lazy::new(|| {
    let mut registry = TransferFunctions::new();
    register_all(&mut registry);
    registry
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::ArrayKind;
    use shape_infer_syntax::BinOpKind;

    #[test]
    fn test_default_rules_cover_every_table() {
        let rules = &*DEFAULT_RULES;
        assert!(rules.builtin("len").is_some());
        assert!(rules.library("numpy.zeros").is_some());
        assert!(rules.library("torch.nn.functional.relu").is_some());
        assert!(rules.array_method(ArrayKind::Tensor, "view").is_some());
        assert!(rules.array_method(ArrayKind::Ndarray, "view").is_none());
        assert!(rules.array_attribute(ArrayKind::Ndarray, "shape").is_some());
        assert!(rules.list_method("append").is_some());
        assert!(rules.instance("Linear").is_some());
        assert!(rules.operator(BinOpKind::MatMult).is_some());
    }

    #[test]
    fn test_static_tables() {
        assert!(is_builtin_name("divmod"));
        assert!(!is_builtin_name("numpy"));
        assert!(is_ignored_call("logging.info"));
        assert!(!is_ignored_call("print"));
        for name in BUILTIN_NAMES.iter() {
            let covered = DEFAULT_RULES.builtin(name).is_some() || simulate::is_simulated(name);
            assert!(covered, "{name} has no rule");
        }
    }
}
