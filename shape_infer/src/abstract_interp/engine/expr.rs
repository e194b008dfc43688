//! Expression inference.

use shape_infer_syntax::{
    BinOpKind, CmpOpKind, Comprehension, Constant, Expr, ExprKind, Span, UnaryOpKind,
};

use super::{is_data, InferenceEngine};
use crate::abstract_interp::loop_analysis;
use crate::diagnostics::DiagnosticReason;
use crate::error::{InferResult, InferenceError, RuleError, UnsupportedConstruct, UnsupportedKind};
use crate::host::{type_of_value, Value};
use crate::lattice::{join_all, DType, NumValue, Substitution, Type};
use crate::tfuncs::{self, arithmetic::broadcast_shapes, RuleCx, RuleResult};

/// Type of a literal.
pub(super) fn constant_type(subst: &mut Substitution, constant: &Constant) -> Type {
    match constant {
        Constant::None => Type::None,
        Constant::Bool(_) => Type::Bool,
        Constant::Int(n) => Type::int_const(*n),
        Constant::Float(x) => Type::float_const(*x),
        Constant::Str(_) => Type::Str,
        Constant::Ellipsis => subst.fresh_var(),
    }
}

fn negate(ty: Type) -> Type {
    match ty {
        Type::Num {
            kind,
            value: Some(NumValue::Int(n)),
        } => match n.checked_neg() {
            Some(neg) => Type::int_const(neg),
            None => Type::num(kind),
        },
        Type::Num {
            value: Some(NumValue::Float(x)),
            ..
        } => Type::float_const(-x),
        other => other,
    }
}

/// Type of a default-argument expression that can be typed without running
/// anything: literals, negated numbers and tuples or lists of those.
pub(super) fn literal_type(subst: &mut Substitution, expr: &Expr) -> Option<Type> {
    match &expr.kind {
        ExprKind::Constant(Constant::Ellipsis) => None,
        ExprKind::Constant(constant) => Some(constant_type(subst, constant)),
        ExprKind::UnaryOp {
            op: UnaryOpKind::USub,
            operand,
        } => match literal_type(subst, operand)? {
            num @ Type::Num { .. } => Some(negate(num)),
            _ => None,
        },
        ExprKind::Tuple(items) => items
            .iter()
            .map(|item| literal_type(subst, item))
            .collect::<Option<Vec<_>>>()
            .map(Type::tuple),
        ExprKind::List(items) => {
            let types = items
                .iter()
                .map(|item| literal_type(subst, item).map(|t| t.without_values()))
                .collect::<Option<Vec<_>>>()?;
            join_all(subst, &types).ok().map(Type::list)
        }
        _ => None,
    }
}

impl<'s, 'a> InferenceEngine<'s, 'a> {
    /// Type of `expr`, inferred once per engine.
    pub fn expr(&mut self, expr: &Expr) -> InferResult<Type> {
        if let Some(ty) = self.node_types.get(&expr.id) {
            return Ok(ty.clone());
        }
        let ty = self.infer_expr(expr)?;
        self.node_types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn infer_expr(&mut self, expr: &Expr) -> InferResult<Type> {
        match &expr.kind {
            ExprKind::BoolOp { values, .. } => {
                for value in values {
                    let ty = self.expr(value)?;
                    if self.session.subst.deref(&ty).is_scalar_num() {
                        self.unify_at(&ty, &Type::Bool, &value.span, "BoolOp")?;
                    }
                }
                Ok(Type::Bool)
            }
            ExprKind::BinOp { left, op, right } => {
                let l = self.expr(left)?;
                let r = self.expr(right)?;
                self.binop(*op, &l, &r, &expr.span, "BinOp")
            }
            ExprKind::UnaryOp { op, operand } => {
                let ty = self.expr(operand)?;
                Ok(match op {
                    UnaryOpKind::Not => Type::Bool,
                    UnaryOpKind::USub => negate(self.session.subst.deref(&ty)),
                    UnaryOpKind::UAdd | UnaryOpKind::Invert => ty,
                })
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => self.compare(expr, left, ops, comparators),
            ExprKind::Call {
                func,
                args,
                keywords,
            } => self.call(expr, func, args, keywords),
            ExprKind::IfExp { test, body, orelse } => {
                self.expr(test)?;
                let then_ty = self.expr(body)?;
                let else_ty = self.expr(orelse)?;
                self.join_at(&then_ty, &else_ty, &expr.span, "IfExp")
            }
            ExprKind::Constant(constant) => Ok(constant_type(&mut self.session.subst, constant)),
            ExprKind::Attribute { value, attr } => self.attribute(expr, value, attr),
            ExprKind::Subscript { value, slice } => self.subscript(expr, value, slice),
            ExprKind::Name(name) => Ok(self.name(expr, name)),
            ExprKind::List(items) => {
                let elem = self.join_elements(items, &expr.span, "List")?;
                Ok(Type::list(elem))
            }
            ExprKind::Tuple(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    types.push(self.expr(item)?);
                }
                Ok(Type::tuple(types))
            }
            ExprKind::Dict { keys, values } => {
                let key = self.join_elements(keys, &expr.span, "Dict")?;
                let value = self.join_elements(values, &expr.span, "Dict")?;
                Ok(Type::dict(key, value))
            }
            ExprKind::ListComp { elt, generators } => self.list_comp(expr, elt, generators),
            ExprKind::Lambda { .. } => Err(UnsupportedConstruct::new(
                UnsupportedKind::Expression("Lambda"),
                expr.span,
            )
            .into()),
        }
    }

    /// Join of the items' types with constant values dropped; a fresh
    /// variable for no items.
    fn join_elements(&mut self, items: &[Expr], span: &Span, context: &str) -> InferResult<Type> {
        let mut types = Vec::with_capacity(items.len());
        for item in items {
            types.push(self.expr(item)?.without_values());
        }
        join_all(&mut self.session.subst, &types)
            .map_err(|error| InferenceError::unification(error, span).with_context(context))
    }

    /// Runs a rule. A unification failure inside the rule is fatal; any other
    /// failure becomes a diagnostic and a fresh variable.
    pub(super) fn apply_rule(
        &mut self,
        operation: &str,
        span: &Span,
        context: &str,
        rule: impl FnOnce(&mut RuleCx) -> RuleResult,
    ) -> InferResult<Type> {
        self.apply_receiver_rule(operation, span, context, rule)
            .map(|(ty, _)| ty)
    }

    /// [`Self::apply_rule`] for rules that may mutate their receiver; also
    /// returns the receiver's new type when the rule widened it.
    pub(super) fn apply_receiver_rule(
        &mut self,
        operation: &str,
        span: &Span,
        context: &str,
        rule: impl FnOnce(&mut RuleCx) -> RuleResult,
    ) -> InferResult<(Type, Option<Type>)> {
        let mut cx = RuleCx::new(&mut self.session.subst);
        let result = rule(&mut cx);
        let widened = cx.take_widened_receiver();
        match result {
            Ok(ty) => Ok((ty, widened)),
            Err(RuleError::Unify(error)) => {
                Err(InferenceError::unification(error, span).with_context(operation))
            }
            Err(error) => Ok((
                self.session.recover(
                    DiagnosticReason::RuleFailure {
                        operation: operation.to_string(),
                        message: error.to_string(),
                    },
                    span,
                    context,
                ),
                None,
            )),
        }
    }

    pub(super) fn binop(
        &mut self,
        op: BinOpKind,
        left: &Type,
        right: &Type,
        span: &Span,
        context: &str,
    ) -> InferResult<Type> {
        match self.session.rules.operator(op) {
            Some(rule) => self.apply_rule(op.symbol(), span, context, |cx| rule(cx, left, right)),
            None => Ok(self.session.recover(
                DiagnosticReason::RuleFailure {
                    operation: op.symbol().to_string(),
                    message: "no rule for operator".to_string(),
                },
                span,
                context,
            )),
        }
    }

    fn compare(
        &mut self,
        expr: &Expr,
        left: &Expr,
        ops: &[CmpOpKind],
        comparators: &[Expr],
    ) -> InferResult<Type> {
        let mut operands = vec![self.expr(left)?];
        for comparator in comparators {
            operands.push(self.expr(comparator)?);
        }
        if let ([op], [l, r]) = (ops, operands.as_slice()) {
            if !op.is_identity_or_membership() {
                if let Some(mask) = self.elementwise_compare(l, r, &expr.span)? {
                    return Ok(mask);
                }
            }
        }
        Ok(Type::Bool)
    }

    /// Boolean array for a comparison with an array operand.
    fn elementwise_compare(&mut self, l: &Type, r: &Type, span: &Span) -> InferResult<Option<Type>> {
        let l = self.session.subst.deref(l);
        let r = self.session.subst.deref(r);
        let mask = match (&l, &r) {
            (
                Type::Array {
                    kind, shape: a, ..
                },
                Type::Array { shape: b, .. },
            ) => {
                let shape = broadcast_shapes(a, b).map_err(|error| {
                    InferenceError::unification(error, span).with_context("Compare")
                })?;
                Type::array(*kind, DType::Bool, shape)
            }
            (Type::Array { kind, shape, .. }, other) | (other, Type::Array { kind, shape, .. })
                if other.is_scalar_num() =>
            {
                Type::array(*kind, DType::Bool, shape.clone())
            }
            _ => return Ok(None),
        };
        Ok(Some(mask))
    }

    /// Locals, then globals of the current module, then builtins.
    fn name(&mut self, expr: &Expr, name: &str) -> Type {
        if let Some(ty) = self.scope.vars.get(name) {
            return ty.clone();
        }
        if let Some(value) = self.session.host.lookup_global(self.module, name) {
            return type_of_value(&mut self.session.subst, &value);
        }
        match name {
            "int" => return Type::DTypeTag(DType::Int64),
            "float" => return Type::DTypeTag(DType::Float64),
            "bool" => return Type::DTypeTag(DType::Bool),
            _ => {}
        }
        if tfuncs::is_builtin_name(name) {
            return self.session.fresh();
        }
        let var = self.session.recover(
            DiagnosticReason::UndefinedName(name.to_string()),
            &expr.span,
            "Name",
        );
        self.scope.vars.set(name, var.clone());
        var
    }

    /// Value an expression denotes without evaluating it: modules, objects
    /// and what their attributes hold.
    pub(super) fn static_value(&self, expr: &Expr) -> Option<Value> {
        match &expr.kind {
            ExprKind::Name(name) => match self.scope.vars.get(name) {
                Some(ty) => match self.session.subst.deref(ty) {
                    Type::UserObject(object) => Some(Value::Object(object)),
                    _ => None,
                },
                None => self.session.host.lookup_global(self.module, name),
            },
            ExprKind::Attribute { value, attr } => match self.static_value(value)? {
                Value::Module(module) => self.session.host.module_attr(module, attr),
                Value::Object(object) => match self.scope.attrs.get(object, attr) {
                    Some(ty) => match self.session.subst.deref(ty) {
                        Type::UserObject(inner) => Some(Value::Object(inner)),
                        _ => None,
                    },
                    None => self.session.host.get_attr(object, attr),
                },
                _ => None,
            },
            _ => None,
        }
    }

    fn attribute(&mut self, expr: &Expr, value: &Expr, attr: &str) -> InferResult<Type> {
        if let Some(Value::Module(module)) = self.static_value(value) {
            // The module itself is typed as an unconstrained variable.
            self.expr(value)?;
            return Ok(match self.session.host.module_attr(module, attr) {
                Some(found) => type_of_value(&mut self.session.subst, &found),
                None => self.session.recover(
                    DiagnosticReason::UnknownAttribute("module".to_string(), attr.to_string()),
                    &expr.span,
                    "Attribute",
                ),
            });
        }

        let receiver = self.expr(value)?;
        match self.session.subst.deref(&receiver) {
            Type::Array { kind, .. } => {
                if let Some(rule) = self.session.rules.array_attribute(kind, attr) {
                    let operation = format!("{}.{attr}", kind.method_prefix());
                    return self.apply_rule(&operation, &expr.span, "Attribute", |cx| {
                        rule(cx, &receiver)
                    });
                }
                if self.session.rules.array_method(kind, attr).is_some() {
                    return Ok(self.session.fresh());
                }
                let described = self.session.subst.resolve(&receiver).to_string();
                Ok(self.unknown_attribute(described, attr, &expr.span))
            }
            Type::UserObject(object) => {
                if let Some(ty) = self.scope.attrs.get(object, attr) {
                    return Ok(ty.clone());
                }
                match self.session.host.get_attr(object, attr) {
                    Some(found) => {
                        let ty = type_of_value(&mut self.session.subst, &found);
                        if is_data(&found) {
                            self.scope.attrs.set(object, attr, ty.clone());
                        }
                        Ok(ty)
                    }
                    None => {
                        let described = format!("{} object", self.session.host.object_class(object));
                        Ok(self.unknown_attribute(described, attr, &expr.span))
                    }
                }
            }
            Type::List(_) if self.session.rules.list_method(attr).is_some() => Ok(self.session.fresh()),
            Type::DTypeTag(_) | Type::None | Type::Var(_) => Ok(self.session.fresh()),
            other => Ok(self.unknown_attribute(other.tag().to_string(), attr, &expr.span)),
        }
    }

    fn unknown_attribute(&mut self, receiver: String, attr: &str, span: &Span) -> Type {
        self.session.recover(
            DiagnosticReason::UnknownAttribute(receiver, attr.to_string()),
            span,
            "Attribute",
        )
    }

    /// `[elt for target in iter]`, with a single generator and no filter.
    fn list_comp(&mut self, expr: &Expr, elt: &Expr, generators: &[Comprehension]) -> InferResult<Type> {
        let [generator] = generators else {
            return Err(UnsupportedConstruct::new(UnsupportedKind::Comprehension, expr.span)
                .with_hint("only one `for` clause is supported")
                .into());
        };
        if !generator.ifs.is_empty() {
            return Err(UnsupportedConstruct::new(UnsupportedKind::Comprehension, expr.span)
                .with_hint("`if` clauses are not supported")
                .into());
        }

        let mut child = InferenceEngine::with_scope(&mut *self.session, self.module, self.scope.clone());
        let iter_ty = child.expr(&generator.iter)?;
        let item = loop_analysis::element_type(&mut *child.session, &iter_ty, &generator.iter.span);
        child.assign(&generator.target, item)?;
        let elem = child.expr(elt)?;
        let (node_types, inlined, _) = child.into_parts();
        self.absorb_results(node_types, inlined);

        let elem = self.session.subst.resolve(&elem).without_values();
        Ok(Type::list(elem))
    }
}
