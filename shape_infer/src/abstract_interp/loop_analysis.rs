//! Element types of iterated values.

use shape_infer_syntax::Span;

use super::session::Session;
use crate::diagnostics::DiagnosticReason;
use crate::error::RuleError;
use crate::lattice::Type;
use crate::tfuncs::{self, RuleCx};

/// Type bound to the target of `for target in <iter_ty>`.
///
/// Arrays yield their leading-dimension slices, lists and homogeneous
/// tuples their element, fixed tuples the join of their members, dicts their
/// key and strings `str`. Anything else degrades to a fresh variable with a
/// diagnostic.
pub fn element_type(session: &mut Session, iter_ty: &Type, span: &Span) -> Type {
    let result = {
        let mut cx = RuleCx::new(&mut session.subst);
        tfuncs::element_type(&mut cx, iter_ty)
    };
    match result {
        Ok(t) => t,
        Err(RuleError::Unify(error)) => session.recover(
            DiagnosticReason::RuleFailure {
                operation: "iteration".to_string(),
                message: error.to_string(),
            },
            span,
            "For",
        ),
        Err(_) => {
            let described = session.subst.resolve(iter_ty).to_string();
            session.recover(DiagnosticReason::NotIterable(described), span, "For")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceConfig;
    use crate::host::Program;
    use crate::lattice::{known_shape, DType};
    use crate::tfuncs::DEFAULT_RULES;
    use pretty_assertions::assert_eq;
    use shape_infer_syntax::parse_function;

    #[test]
    fn test_iteration_element_types() {
        let program = Program::new();
        let root = parse_function("def f():\n    pass\n").unwrap();
        let mut session = Session::new(&root, &program, &DEFAULT_RULES, InferenceConfig::default());
        let span = Span::default();

        let rows = Type::ndarray(DType::Float32, known_shape(&[5, 3]));
        assert_eq!(
            element_type(&mut session, &rows, &span),
            Type::ndarray(DType::Float32, known_shape(&[3]))
        );
        assert_eq!(element_type(&mut session, &Type::dict(Type::Str, Type::int()), &span), Type::Str);
        assert!(session.diagnostics.is_empty());

        let fallback = element_type(&mut session, &Type::int(), &span);
        assert!(fallback.is_var());
        assert_eq!(session.diagnostics.len(), 1);
    }
}
