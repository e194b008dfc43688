//! Call resolution and dispatch.
//!
//! A callee is resolved to a [`Callable`] before its arguments are inferred.
//! Library, builtin, list and array callees go through the rule tables;
//! layer objects with a registered class go through the instance rules;
//! user-defined functions and methods are inlined: their source is parsed,
//! renumbered for this call site and analyzed with the argument types.

use shape_infer_syntax::{Expr, ExprKind, FunctionDef, Keyword, Span};

use super::expr::literal_type;
use super::{InferenceEngine, InlinedCall};
use crate::abstract_interp::env::{Scope, TypeEnv};
use crate::diagnostics::DiagnosticReason;
use crate::error::{InferResult, InferenceError};
use crate::host::{dummy_value, is_concrete, type_of_value, FunctionId, ObjectId, Value};
use crate::lattice::{Substitution, Type};
use crate::tfuncs::{self, simulate};

/// What a call expression invokes.
#[derive(Debug, Clone, PartialEq)]
pub enum Callable {
    /// Library function with a rule, by dotted name (`numpy.zeros`).
    Library(String),
    /// Python builtin, by name.
    Builtin(String),
    /// Method of a list or array receiver.
    Method { receiver: Type, name: String },
    Function(FunctionId),
    BoundMethod {
        receiver: ObjectId,
        function: FunctionId,
    },
    /// Call of an object: a layer rule or its `forward`/`__call__`.
    Instance(ObjectId),
    /// Sequential container; children are applied in order.
    Sequential(ObjectId),
    /// Logging and seeding calls: typed `None`, arguments skipped.
    Ignored,
    Unknown(String),
    NotCallable(String),
}

/// Why call arguments could not be matched to a callee's parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ArgumentError {
    /// Wrong count, unknown keyword or duplicate value.
    Mismatch(String),
    /// An omitted parameter whose default is not a literal.
    NonConstantDefault { param: String, span: Span },
}

/// One type per parameter of `def`: positionals first, then keywords by
/// name, then literal defaults.
pub(crate) fn bind_arguments(
    def: &FunctionDef,
    positional: Vec<Type>,
    keywords: &[(String, Type)],
    subst: &mut Substitution,
) -> Result<Vec<Type>, ArgumentError> {
    let name = &def.name;
    if positional.len() > def.params.len() {
        return Err(ArgumentError::Mismatch(format!(
            "{name}() takes {} positional arguments but {} were given",
            def.params.len(),
            positional.len()
        )));
    }
    let mut slots: Vec<Option<Type>> = positional.into_iter().map(Some).collect();
    slots.resize(def.params.len(), None);
    for (keyword, ty) in keywords {
        let Some(index) = def.params.iter().position(|p| &p.name == keyword) else {
            return Err(ArgumentError::Mismatch(format!(
                "{name}() got an unexpected keyword argument '{keyword}'"
            )));
        };
        if slots[index].is_some() {
            return Err(ArgumentError::Mismatch(format!(
                "{name}() got multiple values for argument '{keyword}'"
            )));
        }
        slots[index] = Some(ty.clone());
    }

    let mut bound = Vec::with_capacity(slots.len());
    for (param, slot) in def.params.iter().zip(slots) {
        let ty = match (slot, &param.default) {
            (Some(ty), _) => ty,
            (None, Some(default)) => literal_type(subst, default).ok_or_else(|| {
                ArgumentError::NonConstantDefault {
                    param: param.name.clone(),
                    span: default.span,
                }
            })?,
            (None, None) => {
                return Err(ArgumentError::Mismatch(format!(
                    "{name}() missing required argument '{}'",
                    param.name
                )))
            }
        };
        bound.push(ty);
    }
    Ok(bound)
}

impl<'s, 'a> InferenceEngine<'s, 'a> {
    pub(super) fn call(
        &mut self,
        call: &Expr,
        func: &Expr,
        args: &[Expr],
        keywords: &[Keyword],
    ) -> InferResult<Type> {
        let callee = self.resolve_callee(func)?;
        if callee == Callable::Ignored {
            return Ok(Type::None);
        }
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let ty = self.expr(arg)?;
            arg_types.push(self.session.subst.deref(&ty));
        }
        let mut keyword_types = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let ty = self.expr(&keyword.value)?;
            keyword_types.push((keyword.arg.clone(), ty));
        }
        let params = arg_types.clone();
        let ty = self.dispatch(call, callee, arg_types, &keyword_types)?;
        let ty = self.session.subst.deref(&ty);
        // The callee node is typed as the signature this call used.
        self.node_types.entry(func.id).or_insert_with(|| Type::Arrow {
            params,
            ret: Box::new(ty.clone()),
        });
        Ok(ty)
    }

    /// Resolves the callee expression of a call.
    pub fn resolve_callee(&mut self, func: &Expr) -> InferResult<Callable> {
        match &func.kind {
            ExprKind::Name(name) => {
                if let Some(ty) = self.scope.vars.get(name) {
                    return Ok(match self.session.subst.deref(ty) {
                        Type::UserObject(object) => self.object_callable(object),
                        other => Callable::NotCallable(format!(
                            "'{name}' of type {}",
                            self.session.subst.resolve(&other)
                        )),
                    });
                }
                if let Some(value) = self.session.host.lookup_global(self.module, name) {
                    return Ok(self.value_callable(value, name));
                }
                if tfuncs::is_builtin_name(name) {
                    return Ok(Callable::Builtin(name.clone()));
                }
                Ok(Callable::Unknown(name.clone()))
            }
            ExprKind::Attribute { value, attr } => {
                if let Some(Value::Module(module)) = self.static_value(value) {
                    self.expr(value)?;
                    return Ok(match self.session.host.module_attr(module, attr) {
                        Some(found) => self.value_callable(found, attr),
                        None => Callable::Unknown(attr.clone()),
                    });
                }
                let receiver = self.expr(value)?;
                Ok(match self.session.subst.deref(&receiver) {
                    Type::List(_) | Type::Array { .. } => Callable::Method {
                        receiver,
                        name: attr.clone(),
                    },
                    Type::UserObject(object) => match self.static_value(func) {
                        Some(found) => self.value_callable(found, attr),
                        None => Callable::Unknown(format!(
                            "{}.{attr}",
                            self.session.host.object_class(object)
                        )),
                    },
                    other => Callable::Unknown(format!("{}.{attr}", other.tag())),
                })
            }
            _ => Ok(Callable::NotCallable(func.kind_name().to_string())),
        }
    }

    fn value_callable(&self, value: Value, name: &str) -> Callable {
        match value {
            Value::Builtin(dotted) => {
                if tfuncs::is_ignored_call(&dotted) {
                    Callable::Ignored
                } else if self.session.rules.library(&dotted).is_some() {
                    Callable::Library(dotted)
                } else if self.session.rules.builtin(&dotted).is_some()
                    || tfuncs::is_builtin_name(&dotted)
                {
                    Callable::Builtin(dotted)
                } else {
                    Callable::Unknown(dotted)
                }
            }
            Value::Function(function) => Callable::Function(function),
            Value::Method { receiver, function } => Callable::BoundMethod { receiver, function },
            Value::Object(object) => self.object_callable(object),
            Value::DType(dtype) => Callable::Unknown(dtype.name().to_string()),
            other => Callable::NotCallable(format!("'{name}' ({})", other.type_name())),
        }
    }

    fn object_callable(&self, object: ObjectId) -> Callable {
        let host = self.session.host;
        if host.sequential_children(object).is_some() {
            return Callable::Sequential(object);
        }
        let class = host.object_class(object);
        if self.session.rules.instance(class).is_some() || host.instance_call(object).is_some() {
            Callable::Instance(object)
        } else {
            Callable::NotCallable(format!("{class} object"))
        }
    }

    fn dispatch(
        &mut self,
        call: &Expr,
        callee: Callable,
        args: Vec<Type>,
        keywords: &[(String, Type)],
    ) -> InferResult<Type> {
        match callee {
            Callable::Ignored => Ok(Type::None),
            Callable::Library(name) => match self.session.rules.library(&name) {
                Some(rule) => self.apply_rule(&name, &call.span, "Call", |cx| rule(cx, &args, keywords)),
                None => Ok(self.unknown_function(name, &call.span)),
            },
            Callable::Builtin(name) => self.call_builtin(call, &name, &args, keywords),
            Callable::Method { receiver, name } => {
                let receiver = self.session.subst.deref(&receiver);
                let (rule, prefix) = match &receiver {
                    Type::List(_) => (self.session.rules.list_method(&name), "list"),
                    Type::Array { kind, .. } => {
                        (self.session.rules.array_method(*kind, &name), kind.method_prefix())
                    }
                    _ => (None, receiver.tag()),
                };
                let Some(rule) = rule else {
                    let described = self.session.subst.resolve(&receiver).to_string();
                    return Ok(self.session.recover(
                        DiagnosticReason::UnknownAttribute(described, name),
                        &call.span,
                        "Call",
                    ));
                };
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(receiver);
                full.extend(args);
                let operation = format!("{prefix}.{name}");
                let (ty, widened) = self.apply_receiver_rule(&operation, &call.span, "Call", |cx| {
                    rule(cx, &full, keywords)
                })?;
                if let (Some(widened), ExprKind::Call { func, .. }) = (widened, &call.kind) {
                    if let ExprKind::Attribute { value, .. } = &func.kind {
                        self.rebind(value, widened);
                    }
                }
                Ok(ty)
            }
            Callable::Function(function) => self.inline(call, function, None, args, keywords),
            Callable::BoundMethod { receiver, function } => {
                self.inline(call, function, Some(Type::UserObject(receiver)), args, keywords)
            }
            Callable::Instance(object) => self.call_instance(call, object, args, keywords),
            Callable::Sequential(object) => self.call_sequential(call, object, args),
            Callable::Unknown(name) => Ok(self.unknown_function(name, &call.span)),
            Callable::NotCallable(described) => Ok(self.session.recover(
                DiagnosticReason::NotCallable(described),
                &call.span,
                "Call",
            )),
        }
    }

    fn unknown_function(&mut self, name: String, span: &Span) -> Type {
        self.session
            .recover(DiagnosticReason::UnknownFunction(name), span, "Call")
    }

    fn call_builtin(
        &mut self,
        call: &Expr,
        name: &str,
        args: &[Type],
        keywords: &[(String, Type)],
    ) -> InferResult<Type> {
        if let Some(rule) = self.session.rules.builtin(name) {
            return self.apply_rule(name, &call.span, "Call", |cx| rule(cx, args, keywords));
        }
        if self.session.config.simulate_builtins && simulate::is_simulated(name) {
            return Ok(self.simulate(call, name, args));
        }
        Ok(self.unknown_function(name.to_string(), &call.span))
    }

    /// Runs a builtin on stand-in values of the argument types.
    fn simulate(&mut self, call: &Expr, name: &str, args: &[Type]) -> Type {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match dummy_value(&self.session.subst, arg) {
                Some(value) => values.push(value),
                None => {
                    let described = self.session.subst.resolve(arg).to_string();
                    return self.session.recover(
                        DiagnosticReason::RuleFailure {
                            operation: name.to_string(),
                            message: format!("no stand-in value for {described}"),
                        },
                        &call.span,
                        "Call",
                    );
                }
            }
        }
        match simulate::evaluate(name, &values) {
            Some(Ok(result)) => {
                let ty = type_of_value(&mut self.session.subst, &result);
                if args.iter().all(|arg| is_concrete(&self.session.subst, arg)) {
                    ty
                } else {
                    ty.without_values()
                }
            }
            Some(Err(message)) => self.session.recover(
                DiagnosticReason::RuleFailure {
                    operation: name.to_string(),
                    message,
                },
                &call.span,
                "Call",
            ),
            None => self.unknown_function(name.to_string(), &call.span),
        }
    }

    fn call_instance(
        &mut self,
        call: &Expr,
        object: ObjectId,
        args: Vec<Type>,
        keywords: &[(String, Type)],
    ) -> InferResult<Type> {
        let host = self.session.host;
        let class = host.object_class(object);
        if let Some(rule) = self.session.rules.instance(class) {
            let fields = host.object_fields(object);
            return self.apply_rule(class, &call.span, "Call", |cx| rule(cx, &fields, &args));
        }
        match host.instance_call(object) {
            Some(function) => {
                self.inline(call, function, Some(Type::UserObject(object)), args, keywords)
            }
            None => Ok(self.session.recover(
                DiagnosticReason::NotCallable(format!("{class} object")),
                &call.span,
                "Call",
            )),
        }
    }

    /// Feeds the argument through each child of a sequential container.
    fn call_sequential(&mut self, call: &Expr, object: ObjectId, args: Vec<Type>) -> InferResult<Type> {
        let [input] = args.as_slice() else {
            return Ok(self.session.recover(
                DiagnosticReason::RuleFailure {
                    operation: "Sequential".to_string(),
                    message: format!("expected 1 argument, got {}", args.len()),
                },
                &call.span,
                "Call",
            ));
        };
        let children = self.session.host.sequential_children(object).unwrap_or_default();
        let mut running = input.clone();
        for child in children {
            let callee = self.value_callable(child, "Sequential child");
            let out = self.dispatch(call, callee, vec![running], &[])?;
            running = self.session.subst.deref(&out);
        }
        Ok(running)
    }

    /// Analyzes the body of a user-defined callee in place of the call.
    fn inline(
        &mut self,
        call: &Expr,
        function: FunctionId,
        receiver: Option<Type>,
        args: Vec<Type>,
        keywords: &[(String, Type)],
    ) -> InferResult<Type> {
        let host = self.session.host;
        let name = host.function_name(function).to_string();
        if let Some(limit) = self.session.config.max_inline_depth {
            if self.session.depth >= limit {
                return Ok(self.session.recover(
                    DiagnosticReason::InlineDepthExceeded {
                        callee: name,
                        depth: limit,
                    },
                    &call.span,
                    "Call",
                ));
            }
        }
        let def = match self.session.instantiate(function) {
            Ok(Some(def)) => def,
            Ok(None) => {
                return Ok(self.session.recover(
                    DiagnosticReason::InlineFailed {
                        callee: name,
                        message: "source is not available".to_string(),
                    },
                    &call.span,
                    "Call",
                ))
            }
            Err(error) => {
                return Ok(self.session.recover(
                    DiagnosticReason::InlineFailed {
                        callee: name,
                        message: error.to_string(),
                    },
                    &call.span,
                    "Call",
                ))
            }
        };

        let mut positional = Vec::with_capacity(args.len() + 1);
        positional.extend(receiver);
        positional.extend(args);
        let params = match bind_arguments(&def, positional, keywords, &mut self.session.subst) {
            Ok(params) => params,
            Err(ArgumentError::Mismatch(message)) => {
                return Ok(self.session.recover(
                    DiagnosticReason::RuleFailure {
                        operation: name,
                        message,
                    },
                    &call.span,
                    "Call",
                ))
            }
            Err(ArgumentError::NonConstantDefault { param, span }) => {
                return Err(InferenceError::usage(
                    format!("default value of parameter '{param}' of '{name}' is not a literal"),
                    span,
                ))
            }
        };

        let hints = host.type_hints(function);
        let module = host.function_module(function);
        tracing::debug!(callee = %name, depth = self.session.depth, "inlining call");

        self.session.depth += 1;
        let outcome = {
            let scope = Scope {
                vars: TypeEnv::new(),
                attrs: self.scope.attrs.clone(),
            };
            let mut callee = InferenceEngine::with_scope(&mut *self.session, module, scope);
            callee
                .infer_function(&def, params, &hints)
                .map(|function_type| (function_type, callee.into_parts()))
        };
        self.session.depth -= 1;

        let (function_type, (node_types, inlined, scope)) =
            outcome.map_err(|error| error.with_context(format!("in call to '{name}'")))?;
        self.scope.attrs = scope.attrs;
        self.absorb_results(node_types, inlined);

        let ret = match &function_type {
            Type::Arrow { ret, .. } => (**ret).clone(),
            other => other.clone(),
        };
        self.inlined.entry(call.id).or_default().push(InlinedCall {
            function,
            def,
            function_type,
        });
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shape_infer_syntax::parse_function;

    #[test]
    fn test_bind_arguments_uses_keywords_and_defaults() {
        let def = parse_function("def f(x, y=2, scale=0.5):\n    pass\n").unwrap();
        let mut subst = Substitution::new();
        let bound = bind_arguments(
            &def,
            vec![Type::Str],
            &[("scale".to_string(), Type::Bool)],
            &mut subst,
        )
        .unwrap();
        assert_eq!(bound, vec![Type::Str, Type::int_const(2), Type::Bool]);
    }

    #[test]
    fn test_bind_arguments_reports_mismatches() {
        let def = parse_function("def f(x, y):\n    pass\n").unwrap();
        let mut subst = Substitution::new();
        assert!(matches!(
            bind_arguments(&def, vec![Type::Str], &[], &mut subst),
            Err(ArgumentError::Mismatch(m)) if m.contains("missing required argument 'y'")
        ));
        assert!(matches!(
            bind_arguments(&def, vec![Type::Str; 3], &[], &mut subst),
            Err(ArgumentError::Mismatch(_))
        ));
        assert!(matches!(
            bind_arguments(&def, vec![Type::Str], &[("x".to_string(), Type::Str)], &mut subst),
            Err(ArgumentError::Mismatch(m)) if m.contains("multiple values")
        ));
    }

    #[test]
    fn test_non_literal_default() {
        let def = parse_function("def f(x=make()):\n    pass\n").unwrap();
        let mut subst = Substitution::new();
        assert!(matches!(
            bind_arguments(&def, vec![], &[], &mut subst),
            Err(ArgumentError::NonConstantDefault { param, .. }) if param == "x"
        ));
    }
}
