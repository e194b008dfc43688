//! Node id traversal over a function tree.
//!
//! The inference engine inlines callee trees into one run, so every inlined
//! tree is renumbered with fresh ids to keep ids unique across the run.

use crate::ast::{Expr, ExprKind, FunctionDef, NodeId, NodeIdGen, Slice, Stmt, StmtKind};
use crate::span::Span;

/// Calls `f` on every node id in `func`, including the function's own.
pub fn for_each_id(func: &FunctionDef, f: &mut impl FnMut(NodeId)) {
    for_each_node(func, &mut |id, _, _| f(id));
}

/// Calls `f` with the id, kind name and span of every node in `func`.
pub fn for_each_node(func: &FunctionDef, f: &mut impl FnMut(NodeId, &'static str, &Span)) {
    f(func.id, "FunctionDef", &func.span);
    for param in &func.params {
        f(param.id, "Param", &param.span);
        param.annotation.iter().for_each(|e| expr_ids(e, f));
        param.default.iter().for_each(|e| expr_ids(e, f));
    }
    func.returns.iter().for_each(|e| expr_ids(e, f));
    block_ids(&func.body, f);
}

fn block_ids(body: &[Stmt], f: &mut impl FnMut(NodeId, &'static str, &Span)) {
    for stmt in body {
        stmt_ids(stmt, f);
    }
}

fn stmt_ids(stmt: &Stmt, f: &mut impl FnMut(NodeId, &'static str, &Span)) {
    f(stmt.id, stmt.kind_name(), &stmt.span);
    match &stmt.kind {
        StmtKind::Return(value) | StmtKind::Raise(value) => {
            value.iter().for_each(|e| expr_ids(e, f));
        }
        StmtKind::Assign { targets, value } => {
            targets.iter().for_each(|e| expr_ids(e, f));
            expr_ids(value, f);
        }
        StmtKind::AugAssign { target, value, .. } => {
            expr_ids(target, f);
            expr_ids(value, f);
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            expr_ids(target, f);
            expr_ids(annotation, f);
            value.iter().for_each(|e| expr_ids(e, f));
        }
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            expr_ids(test, f);
            block_ids(body, f);
            block_ids(orelse, f);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            expr_ids(target, f);
            expr_ids(iter, f);
            block_ids(body, f);
            block_ids(orelse, f);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            block_ids(body, f);
            for handler in handlers {
                f(handler.id, "ExceptHandler", &handler.span);
                handler.exc_type.iter().for_each(|e| expr_ids(e, f));
                block_ids(&handler.body, f);
            }
            block_ids(orelse, f);
            block_ids(finalbody, f);
        }
        StmtKind::With { items, body } => {
            items.iter().for_each(|e| expr_ids(e, f));
            block_ids(body, f);
        }
        StmtKind::Assert { test, msg } => {
            expr_ids(test, f);
            msg.iter().for_each(|e| expr_ids(e, f));
        }
        StmtKind::Delete(targets) => targets.iter().for_each(|e| expr_ids(e, f)),
        StmtKind::FunctionDef(inner) => for_each_node(inner, f),
        StmtKind::Expr(value) => expr_ids(value, f),
        StmtKind::Import(_)
        | StmtKind::Global(_)
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

fn expr_ids(expr: &Expr, f: &mut impl FnMut(NodeId, &'static str, &Span)) {
    f(expr.id, expr.kind_name(), &expr.span);
    match &expr.kind {
        ExprKind::BoolOp { values, .. } => values.iter().for_each(|e| expr_ids(e, f)),
        ExprKind::BinOp { left, right, .. } => {
            expr_ids(left, f);
            expr_ids(right, f);
        }
        ExprKind::UnaryOp { operand, .. } => expr_ids(operand, f),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            expr_ids(left, f);
            comparators.iter().for_each(|e| expr_ids(e, f));
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            expr_ids(func, f);
            args.iter().for_each(|e| expr_ids(e, f));
            keywords.iter().for_each(|k| expr_ids(&k.value, f));
        }
        ExprKind::IfExp { test, body, orelse } => {
            expr_ids(test, f);
            expr_ids(body, f);
            expr_ids(orelse, f);
        }
        ExprKind::Attribute { value, .. } => expr_ids(value, f),
        ExprKind::Subscript { value, slice } => {
            expr_ids(value, f);
            slice_ids(slice, f);
        }
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            items.iter().for_each(|e| expr_ids(e, f));
        }
        ExprKind::Dict { keys, values } => {
            keys.iter().for_each(|e| expr_ids(e, f));
            values.iter().for_each(|e| expr_ids(e, f));
        }
        ExprKind::ListComp { elt, generators } => {
            expr_ids(elt, f);
            for generator in generators {
                expr_ids(&generator.target, f);
                expr_ids(&generator.iter, f);
                generator.ifs.iter().for_each(|e| expr_ids(e, f));
            }
        }
        ExprKind::Lambda { body, .. } => expr_ids(body, f),
        ExprKind::Constant(_) | ExprKind::Name(_) => {}
    }
}

fn slice_ids(slice: &Slice, f: &mut impl FnMut(NodeId, &'static str, &Span)) {
    match slice {
        Slice::Index(index) => expr_ids(index, f),
        Slice::Range { lower, upper, step } => {
            for bound in [lower, upper, step].into_iter().flatten() {
                expr_ids(bound, f);
            }
        }
        Slice::Ext(items) => items.iter().for_each(|s| slice_ids(s, f)),
    }
}

/// Largest id used in `func`.
pub fn max_node_id(func: &FunctionDef) -> NodeId {
    let mut max = func.id;
    for_each_id(func, &mut |id| max = max.max(id));
    max
}

/// Replaces every id in `func` with a fresh one from `ids`.
pub fn renumber(func: &mut FunctionDef, ids: &mut NodeIdGen) {
    renumber_function(func, &mut || ids.fresh());
}

fn renumber_function(func: &mut FunctionDef, next: &mut impl FnMut() -> NodeId) {
    func.id = next();
    for param in &mut func.params {
        param.id = next();
        param.annotation.iter_mut().for_each(|e| renumber_expr(e, next));
        param.default.iter_mut().for_each(|e| renumber_expr(e, next));
    }
    func.returns.iter_mut().for_each(|e| renumber_expr(e, next));
    renumber_block(&mut func.body, next);
}

fn renumber_block(body: &mut [Stmt], next: &mut impl FnMut() -> NodeId) {
    for stmt in body {
        renumber_stmt(stmt, next);
    }
}

fn renumber_stmt(stmt: &mut Stmt, next: &mut impl FnMut() -> NodeId) {
    stmt.id = next();
    match &mut stmt.kind {
        StmtKind::Return(value) | StmtKind::Raise(value) => {
            value.iter_mut().for_each(|e| renumber_expr(e, next));
        }
        StmtKind::Assign { targets, value } => {
            targets.iter_mut().for_each(|e| renumber_expr(e, next));
            renumber_expr(value, next);
        }
        StmtKind::AugAssign { target, value, .. } => {
            renumber_expr(target, next);
            renumber_expr(value, next);
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            renumber_expr(target, next);
            renumber_expr(annotation, next);
            value.iter_mut().for_each(|e| renumber_expr(e, next));
        }
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            renumber_expr(test, next);
            renumber_block(body, next);
            renumber_block(orelse, next);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            renumber_expr(target, next);
            renumber_expr(iter, next);
            renumber_block(body, next);
            renumber_block(orelse, next);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            renumber_block(body, next);
            for handler in handlers {
                handler.id = next();
                handler.exc_type.iter_mut().for_each(|e| renumber_expr(e, next));
                renumber_block(&mut handler.body, next);
            }
            renumber_block(orelse, next);
            renumber_block(finalbody, next);
        }
        StmtKind::With { items, body } => {
            items.iter_mut().for_each(|e| renumber_expr(e, next));
            renumber_block(body, next);
        }
        StmtKind::Assert { test, msg } => {
            renumber_expr(test, next);
            msg.iter_mut().for_each(|e| renumber_expr(e, next));
        }
        StmtKind::Delete(targets) => targets.iter_mut().for_each(|e| renumber_expr(e, next)),
        StmtKind::FunctionDef(inner) => renumber_function(inner, next),
        StmtKind::Expr(value) => renumber_expr(value, next),
        StmtKind::Import(_)
        | StmtKind::Global(_)
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

fn renumber_expr(expr: &mut Expr, next: &mut impl FnMut() -> NodeId) {
    expr.id = next();
    match &mut expr.kind {
        ExprKind::BoolOp { values, .. } => values.iter_mut().for_each(|e| renumber_expr(e, next)),
        ExprKind::BinOp { left, right, .. } => {
            renumber_expr(left, next);
            renumber_expr(right, next);
        }
        ExprKind::UnaryOp { operand, .. } => renumber_expr(operand, next),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            renumber_expr(left, next);
            comparators.iter_mut().for_each(|e| renumber_expr(e, next));
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            renumber_expr(func, next);
            args.iter_mut().for_each(|e| renumber_expr(e, next));
            keywords
                .iter_mut()
                .for_each(|k| renumber_expr(&mut k.value, next));
        }
        ExprKind::IfExp { test, body, orelse } => {
            renumber_expr(test, next);
            renumber_expr(body, next);
            renumber_expr(orelse, next);
        }
        ExprKind::Attribute { value, .. } => renumber_expr(value, next),
        ExprKind::Subscript { value, slice } => {
            renumber_expr(value, next);
            renumber_slice(slice, next);
        }
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            items.iter_mut().for_each(|e| renumber_expr(e, next));
        }
        ExprKind::Dict { keys, values } => {
            keys.iter_mut().for_each(|e| renumber_expr(e, next));
            values.iter_mut().for_each(|e| renumber_expr(e, next));
        }
        ExprKind::ListComp { elt, generators } => {
            renumber_expr(elt, next);
            for generator in generators {
                renumber_expr(&mut generator.target, next);
                renumber_expr(&mut generator.iter, next);
                generator
                    .ifs
                    .iter_mut()
                    .for_each(|e| renumber_expr(e, next));
            }
        }
        ExprKind::Lambda { body, .. } => renumber_expr(body, next),
        ExprKind::Constant(_) | ExprKind::Name(_) => {}
    }
}

fn renumber_slice(slice: &mut Slice, next: &mut impl FnMut() -> NodeId) {
    match slice {
        Slice::Index(index) => renumber_expr(index, next),
        Slice::Range { lower, upper, step } => {
            for bound in [lower, upper, step].into_iter().flatten() {
                renumber_expr(bound, next);
            }
        }
        Slice::Ext(items) => items.iter_mut().for_each(|s| renumber_slice(s, next)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_function;

    #[test]
    fn test_renumber_moves_ids_past_allocator_start() {
        let mut func = parse_function("def f(x):\n    return x + 1\n").expect("parse");
        let before = max_node_id(&func);

        let mut ids = NodeIdGen::starting_at(before.0 + 1);
        renumber(&mut func, &mut ids);

        let mut seen = Vec::new();
        for_each_id(&func, &mut |id| seen.push(id));
        assert!(seen.iter().all(|id| id.0 > before.0));

        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), seen.len(), "ids must stay unique");
    }

    #[test]
    fn test_for_each_node_reports_kinds_in_source_order() {
        let func = parse_function("def f(x):\n    y = x[0]\n    return y\n").expect("parse");
        let mut kinds = Vec::new();
        for_each_node(&func, &mut |_, kind, span| kinds.push((kind, span.start_line)));
        assert_eq!(
            kinds,
            vec![
                ("FunctionDef", 1),
                ("Param", 1),
                ("Assign", 2),
                ("Name", 2),
                ("Subscript", 2),
                ("Name", 2),
                ("Constant", 2),
                ("Return", 3),
                ("Name", 3),
            ]
        );
    }
}
