//! Flow-sensitive inference over one function body.
//!
//! The engine walks statements in order, keeping a [`Scope`] of local and
//! attribute types and recording a type for every node it visits.
//! Conditionals and loop passes run nested engines on copies of the scope
//! and merge the copies back with `join`; calls to user-defined functions
//! run a nested engine over the callee's tree (see `call`).
//!
//! Node types are memoized per engine: a nested engine starts with an empty
//! map, so each loop pass re-infers the body against the widened scope, and
//! its results replace the previous pass's when merged back.

mod call;
mod expr;
mod subscript;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use shape_infer_syntax::{
    ExceptHandler, Expr, ExprKind, FunctionDef, NodeId, Slice, Span, Stmt, StmtKind,
};

pub use call::Callable;
pub(crate) use call::{bind_arguments, ArgumentError};
pub use subscript::slice_len;

use super::conditional::split_env_by_condition;
use super::env::{MergeConflict, Scope};
use super::loop_analysis;
use super::session::Session;
use crate::diagnostics::DiagnosticReason;
use crate::error::{
    InferResult, InferenceError, UnifyError, UnsupportedConstruct, UnsupportedKind,
};
use crate::host::{type_of_value, FunctionId, ModuleId, TypeHints, Value};
use crate::lattice::{
    apply_subst, elem_of, is_subtype, join, join_all, match_types, unify, Substitution, Type,
};

/// A user-defined callee analyzed in place of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct InlinedCall {
    pub function: FunctionId,
    /// The callee's tree, renumbered for this call site. Its node types live
    /// in the same map as the caller's.
    pub def: FunctionDef,
    /// `Arrow` type of this instantiation.
    pub function_type: Type,
}

/// Inline registry: call-site node to the callees analyzed for it, in
/// call order.
pub type InlineRegistry = BTreeMap<NodeId, Vec<InlinedCall>>;

/// What a nested engine leaves behind.
#[derive(Debug)]
struct Branch {
    scope: Scope,
    node_types: BTreeMap<NodeId, Type>,
    inlined: InlineRegistry,
    returns: Vec<Type>,
    /// Type of the block's trailing statement.
    ty: Type,
}

#[derive(Debug)]
pub struct InferenceEngine<'s, 'a> {
    session: &'s mut Session<'a>,
    /// Module whose globals resolve free names.
    module: ModuleId,
    scope: Scope,
    node_types: BTreeMap<NodeId, Type>,
    inlined: InlineRegistry,
    /// Types of the `return` statements reached so far.
    returns: Vec<Type>,
}

fn merge_scopes(
    subst: &mut Substitution,
    a: &Scope,
    b: &Scope,
    span: &Span,
) -> InferResult<Scope> {
    a.merge(b, subst).map_err(|MergeConflict { name, error }| {
        InferenceError::unification(error, span).with_context(format!("merge of '{name}'"))
    })
}

/// Values whose type is worth tracking in the attribute environment.
fn is_data(value: &Value) -> bool {
    !matches!(
        value,
        Value::Function(_) | Value::Method { .. } | Value::Builtin(_) | Value::Module(_)
    )
}

impl<'s, 'a> InferenceEngine<'s, 'a> {
    pub fn new(session: &'s mut Session<'a>, module: ModuleId) -> Self {
        Self::with_scope(session, module, Scope::new())
    }

    pub(crate) fn with_scope(session: &'s mut Session<'a>, module: ModuleId, scope: Scope) -> Self {
        Self {
            session,
            module,
            scope,
            node_types: BTreeMap::new(),
            inlined: BTreeMap::new(),
            returns: Vec::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn node_types(&self) -> &BTreeMap<NodeId, Type> {
        &self.node_types
    }

    pub fn into_parts(self) -> (BTreeMap<NodeId, Type>, InlineRegistry, Scope) {
        (self.node_types, self.inlined, self.scope)
    }

    fn into_branch(self, ty: Type) -> Branch {
        Branch {
            scope: self.scope,
            node_types: self.node_types,
            inlined: self.inlined,
            returns: self.returns,
            ty,
        }
    }

    /// Takes over the node types and inlined calls of a nested engine.
    fn absorb_results(&mut self, node_types: BTreeMap<NodeId, Type>, inlined: InlineRegistry) {
        self.node_types.extend(node_types);
        for (site, calls) in inlined {
            self.inlined.entry(site).or_default().extend(calls);
        }
    }

    fn absorb(&mut self, branch: Branch) {
        self.returns.extend(branch.returns);
        self.absorb_results(branch.node_types, branch.inlined);
    }

    /// Runs `body` in a nested engine over `scope`.
    fn branch(&mut self, scope: Scope, body: &[Stmt]) -> InferResult<Branch> {
        let mut child = InferenceEngine::with_scope(&mut *self.session, self.module, scope);
        let ty = child.block(body)?;
        Ok(child.into_branch(ty))
    }

    fn unify_at(&mut self, a: &Type, b: &Type, span: &Span, context: &str) -> InferResult<()> {
        unify(&mut self.session.subst, a, b)
            .map_err(|error| InferenceError::unification(error, span).with_context(context))
    }

    fn join_at(&mut self, a: &Type, b: &Type, span: &Span, context: &str) -> InferResult<Type> {
        join(&mut self.session.subst, a, b)
            .map_err(|error| InferenceError::unification(error, span).with_context(context))
    }

    /// Infers `def` with its parameters bound to `params`, one type per
    /// parameter, and returns the function's `Arrow` type.
    pub fn infer_function(
        &mut self,
        def: &FunctionDef,
        params: Vec<Type>,
        hints: &TypeHints,
    ) -> InferResult<Type> {
        for (param, ty) in def.params.iter().zip(params) {
            self.seed_attributes(&ty);
            self.scope.vars.set(param.name.as_str(), ty);
        }
        self.apply_hints(def, hints)?;

        let mut param_types = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = match self.scope.vars.get(&param.name) {
                Some(ty) => ty.clone(),
                None => self.session.fresh(),
            };
            self.node_types.insert(param.id, ty.clone());
            param_types.push(ty);
        }

        self.block(&def.body)?;

        let ret = if self.returns.is_empty() {
            Type::None
        } else {
            let returns = std::mem::take(&mut self.returns);
            let joined = join_all(&mut self.session.subst, &returns).map_err(|error| {
                InferenceError::unification(error, &def.span)
                    .with_context(format!("return type of '{}'", def.name))
            })?;
            self.returns = returns;
            joined
        };
        let function_type = Type::Arrow {
            params: param_types,
            ret: Box::new(ret),
        };
        self.node_types.insert(def.id, function_type.clone());
        Ok(function_type)
    }

    /// Records the current fields of an object argument, unless this run
    /// already tracks them.
    fn seed_attributes(&mut self, ty: &Type) {
        let Type::UserObject(object) = self.session.subst.deref(ty) else {
            return;
        };
        for (field, value) in self.session.host.object_fields(object) {
            if is_data(&value) && !self.scope.attrs.contains(object, &field) {
                let field_ty = type_of_value(&mut self.session.subst, &value);
                self.scope.attrs.set(object, field, field_ty);
            }
        }
    }

    /// Instantiates declared parameter types against the arguments and
    /// rebinds the parameters to them.
    fn apply_hints(&mut self, def: &FunctionDef, hints: &TypeHints) -> InferResult<()> {
        let hinted: Vec<(&str, &Type)> = hints
            .iter()
            .filter(|(name, _)| self.scope.vars.contains(name))
            .map(|(name, template)| (name.as_str(), template))
            .collect();
        if hinted.is_empty() {
            return Ok(());
        }
        let context = || format!("type hints of '{}'", def.name);
        let templates: Vec<Type> = hinted.iter().map(|(_, t)| (*t).clone()).collect();
        let candidates: Vec<Type> = hinted
            .iter()
            .filter_map(|(name, _)| self.scope.vars.get(name).cloned())
            .collect();
        let mut bindings = match_types(&templates, &candidates, &self.session.subst)
            .map_err(|error| InferenceError::unification(error, &def.span).with_context(context()))?;
        for ((name, template), candidate) in hinted.iter().zip(&candidates) {
            let applied = apply_subst(&mut bindings, template, &mut self.session.subst);
            self.unify_at(candidate, &applied, &def.span, &context())?;
            self.scope.vars.set(*name, applied);
        }
        Ok(())
    }

    /// Infers statements in order; the type of the last one, `None` when
    /// the block is empty.
    pub fn block(&mut self, body: &[Stmt]) -> InferResult<Type> {
        let mut last = Type::None;
        for stmt in body {
            last = self.stmt(stmt)?;
        }
        Ok(last)
    }

    pub fn stmt(&mut self, stmt: &Stmt) -> InferResult<Type> {
        let ty = match &stmt.kind {
            StmtKind::Return(value) => {
                let ty = match value {
                    Some(value) => self.expr(value)?,
                    None => Type::None,
                };
                self.returns.push(ty.clone());
                ty
            }
            StmtKind::Assign { targets, value } => {
                let ty = self.expr(value)?;
                for target in targets {
                    self.assign(target, ty.clone())?;
                }
                Type::None
            }
            StmtKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let ty = self.expr(value)?;
                    self.assign(target, ty)?;
                }
                Type::None
            }
            StmtKind::AugAssign { target, op, value } => {
                let right = self.expr(value)?;
                let left = self.expr(target)?;
                let combined = self.binop(*op, &left, &right, &stmt.span, "AugAssign")?;
                if matches!(self.session.subst.deref(&left), Type::List(_)) {
                    self.unify_at(&combined, &left, &stmt.span, "AugAssign")?;
                }
                self.assign(target, combined)?;
                Type::None
            }
            StmtKind::If { test, body, orelse } => self.infer_if(stmt, test, body, orelse)?,
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.infer_for(stmt, target, iter, body)?;
                self.block(orelse)?;
                Type::None
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                ..
            } => self.infer_try(stmt, body, handlers, orelse)?,
            StmtKind::Raise(_) => self.session.fresh(),
            StmtKind::Expr(value) => {
                self.expr(value)?;
                Type::None
            }
            StmtKind::While { .. }
            | StmtKind::Assert { .. }
            | StmtKind::Delete(_)
            | StmtKind::Import(_)
            | StmtKind::Global(_)
            | StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue => Type::None,
            StmtKind::With { .. } => {
                return Err(UnsupportedConstruct::new(UnsupportedKind::Statement("With"), stmt.span)
                    .with_hint("context managers are not analyzed")
                    .into())
            }
            StmtKind::FunctionDef(inner) => {
                return Err(
                    UnsupportedConstruct::new(UnsupportedKind::Statement("FunctionDef"), stmt.span)
                        .with_hint(format!("nested function '{}'", inner.name))
                        .into(),
                )
            }
        };
        self.node_types.insert(stmt.id, ty.clone());
        Ok(ty)
    }

    fn infer_if(
        &mut self,
        stmt: &Stmt,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
    ) -> InferResult<Type> {
        self.expr(test)?;
        let split =
            split_env_by_condition(test, &self.scope, &self.node_types, &mut self.session.subst);
        let then_branch = self.branch(split.then_env, body)?;
        let else_branch = self.branch(split.else_env, orelse)?;
        self.scope = merge_scopes(
            &mut self.session.subst,
            &then_branch.scope,
            &else_branch.scope,
            &stmt.span,
        )?;
        let ty = self.join_at(&then_branch.ty, &else_branch.ty, &stmt.span, "If")?;
        self.absorb(then_branch);
        self.absorb(else_branch);
        Ok(ty)
    }

    fn infer_for(&mut self, stmt: &Stmt, target: &Expr, iter: &Expr, body: &[Stmt]) -> InferResult<()> {
        let iter_ty = self.expr(iter)?;
        let item = loop_analysis::element_type(&mut *self.session, &iter_ty, &iter.span);
        self.assign(target, item)?;

        let passes = self.session.config.loop_passes.max(1);
        let mut last = None;
        for pass in 0..passes {
            let branch = self.branch(self.scope.clone(), body)?;
            self.scope = merge_scopes(&mut self.session.subst, &self.scope, &branch.scope, &stmt.span)?;
            tracing::trace!(pass, line = stmt.span.start_line, "loop pass merged");
            last = Some(branch);
        }
        if let Some(branch) = last {
            self.absorb(branch);
        }
        Ok(())
    }

    /// The guarded body (followed by `else`) and each handler are parallel
    /// paths from the scope before `try`.
    fn infer_try(
        &mut self,
        stmt: &Stmt,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
    ) -> InferResult<Type> {
        let guarded = {
            let mut child =
                InferenceEngine::with_scope(&mut *self.session, self.module, self.scope.clone());
            let mut ty = child.block(body)?;
            if !orelse.is_empty() {
                ty = child.block(orelse)?;
            }
            child.into_branch(ty)
        };

        let mut scope = guarded.scope.clone();
        let mut ty = guarded.ty.clone();
        self.absorb(guarded);
        for handler in handlers {
            let mut handler_scope = self.scope.clone();
            if let Some(name) = &handler.name {
                let exception = self.session.fresh();
                handler_scope.vars.set(name.as_str(), exception);
            }
            let branch = self.branch(handler_scope, &handler.body)?;
            scope = merge_scopes(&mut self.session.subst, &scope, &branch.scope, &handler.span)?;
            ty = self.join_at(&ty, &branch.ty, &stmt.span, "Try")?;
            self.absorb(branch);
        }
        self.scope = scope;
        Ok(ty)
    }

    /// Binds an assignment target to `value`.
    pub(crate) fn assign(&mut self, target: &Expr, value: Type) -> InferResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.scope.vars.set(name.as_str(), value.clone());
            }
            ExprKind::Attribute {
                value: receiver,
                attr,
            } => {
                let receiver_ty = self.expr(receiver)?;
                match self.session.subst.deref(&receiver_ty) {
                    Type::UserObject(object) => {
                        self.scope.attrs.set(object, attr.as_str(), value.clone());
                    }
                    other => self.session.warn(
                        DiagnosticReason::UnsupportedTarget(format!(
                            "attribute '{attr}' of {}",
                            other.tag()
                        )),
                        &target.span,
                        "Assign",
                    ),
                }
            }
            ExprKind::Tuple(elts) | ExprKind::List(elts) => {
                let vars: Vec<Type> = elts.iter().map(|_| self.session.fresh()).collect();
                match elem_of(&self.session.subst, &value) {
                    Some(item) => {
                        for var in &vars {
                            self.unify_at(var, &item, &target.span, "Assign")?;
                        }
                    }
                    None => self.unify_at(&Type::tuple(vars.clone()), &value, &target.span, "Assign")?,
                }
                for (elt, var) in elts.iter().zip(&vars) {
                    let ty = self.session.subst.deref(var);
                    self.assign(elt, ty)?;
                }
                self.node_types.insert(target.id, Type::tuple(vars));
                return Ok(());
            }
            ExprKind::Subscript {
                value: container,
                slice,
            } => self.assign_item(target, container, slice, &value)?,
            _ => {
                return Err(UnsupportedConstruct::new(
                    UnsupportedKind::AssignTarget(target.kind_name()),
                    target.span,
                )
                .into())
            }
        }
        self.node_types.insert(target.id, value);
        Ok(())
    }

    /// Gives a mutated container a new type: a name is rebound, an
    /// attribute of a known object is updated. Other expressions are left as
    /// they are.
    fn rebind(&mut self, container: &Expr, ty: Type) {
        match &container.kind {
            ExprKind::Name(name) if self.scope.vars.contains(name) => {
                self.scope.vars.set(name.as_str(), ty);
            }
            ExprKind::Attribute { value, attr } => {
                if let Some(Value::Object(object)) = self.static_value(value) {
                    self.scope.attrs.set(object, attr.as_str(), ty);
                }
            }
            _ => {}
        }
    }

    /// `container[index] = value`.
    fn assign_item(
        &mut self,
        target: &Expr,
        container: &Expr,
        slice: &Slice,
        value: &Type,
    ) -> InferResult<()> {
        let container_ty = self.expr(container)?;
        let container_ty = self.session.subst.deref(&container_ty);
        let Slice::Index(index) = slice else {
            if container_ty.is_array() {
                return self.slice_exprs(slice);
            }
            return Err(UnsupportedConstruct::new(UnsupportedKind::SliceForm, target.span)
                .with_hint("slice assignment is only modeled for arrays")
                .into());
        };
        let index_ty = self.expr(index)?;
        match container_ty {
            Type::List(elem) => {
                if !is_subtype(&self.session.subst, &index_ty, &Type::int()) {
                    let error = UnifyError::Mismatch {
                        left: self.session.subst.resolve(&index_ty),
                        right: Type::int(),
                    };
                    return Err(
                        InferenceError::unification(error, &index.span).with_context("Subscript")
                    );
                }
                let item = self.session.subst.resolve(value).without_values();
                if self.session.subst.deref(&elem).is_var() {
                    self.unify_at(&elem, &item, &target.span, "Assign")?;
                } else {
                    // Storing widens the element type, as `+=` does.
                    let current = self.session.subst.resolve(&elem);
                    let joined = self.join_at(&current, &item, &target.span, "Assign")?;
                    let joined = self.session.subst.resolve(&joined);
                    if joined != current {
                        self.rebind(container, Type::list(joined));
                    }
                }
            }
            Type::Dict(key, val) => {
                self.unify_at(&key, &index_ty, &index.span, "Subscript")?;
                let item = self.session.subst.resolve(value).without_values();
                self.unify_at(&val, &item, &target.span, "Assign")?;
            }
            Type::Array { .. } | Type::Var(_) => {}
            other => self.session.warn(
                DiagnosticReason::UnsupportedTarget(format!("item of {}", other.tag())),
                &target.span,
                "Assign",
            ),
        }
        Ok(())
    }
}
