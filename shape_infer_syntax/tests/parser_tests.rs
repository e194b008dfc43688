//! Parser tests over realistic model-code snippets.

use pretty_assertions::assert_eq;
use shape_infer_syntax::{
    parse_function, parse_module, BinOpKind, CmpOpKind, Constant, ExprKind, FunctionDef,
    ParseError, Slice, Stmt, StmtKind, visit::for_each_node,
};

fn parse_ok(source: &str) -> FunctionDef {
    match parse_function(source) {
        Ok(func) => func,
        Err(e) => panic!("parse error: {}\n{}", e, e.format_with_context(source)),
    }
}

fn single_stmt(source: &str) -> Stmt {
    let mut body = parse_module(source).expect("parse");
    assert_eq!(body.len(), 1, "expected one statement");
    body.remove(0)
}

// ==================== Functions ====================

#[test]
fn test_function_signature() {
    let func = parse_ok("def forward(self, x: np.ndarray, scale=2.0) -> int:\n    pass\n");
    assert_eq!(func.name, "forward");
    let names: Vec<&str> = func.param_names().collect();
    assert_eq!(names, vec!["self", "x", "scale"]);
    assert!(func.params[1].annotation.is_some());
    assert!(matches!(
        func.params[2].default.as_ref().map(|d| &d.kind),
        Some(ExprKind::Constant(Constant::Float(v))) if *v == 2.0
    ));
    assert!(func.returns.is_some());
}

#[test]
fn test_indented_method_with_decorator() {
    let source = "    @staticmethod\n    def f(x):\n        return x\n";
    let func = parse_ok(source);
    assert_eq!(func.name, "f");
    assert_eq!(func.body.len(), 1);
}

#[test]
fn test_node_ids_are_unique() {
    let func = parse_ok("def f(x, y):\n    z = x + y * 2\n    return z[0]\n");
    let mut ids = Vec::new();
    shape_infer_syntax::visit::for_each_id(&func, &mut |id| ids.push(id));
    let count = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

// ==================== Statements ====================

#[test]
fn test_tuple_assignment_and_chained_targets() {
    let stmt = single_stmt("a, b = c = f(x)\n");
    let StmtKind::Assign { targets, value } = stmt.kind else {
        panic!("expected assign");
    };
    assert_eq!(targets.len(), 2);
    assert!(matches!(targets[0].kind, ExprKind::Tuple(ref items) if items.len() == 2));
    assert_eq!(targets[1].as_name(), Some("c"));
    assert!(matches!(value.kind, ExprKind::Call { .. }));
}

#[test]
fn test_augmented_assignment() {
    let stmt = single_stmt("h //= 2\n");
    assert!(matches!(
        stmt.kind,
        StmtKind::AugAssign {
            op: BinOpKind::FloorDiv,
            ..
        }
    ));
}

#[test]
fn test_elif_nests_in_orelse() {
    let source = "if x is None:\n    y = 1\nelif x > 0:\n    y = 2\nelse:\n    y = 3\n";
    let stmt = single_stmt(source);
    let StmtKind::If { test, orelse, .. } = stmt.kind else {
        panic!("expected if");
    };
    assert!(matches!(
        test.kind,
        ExprKind::Compare { ref ops, ref comparators, .. }
            if ops == &[CmpOpKind::Is] && comparators[0].is_none_literal()
    ));
    assert_eq!(orelse.len(), 1);
    let StmtKind::If { orelse: inner, .. } = &orelse[0].kind else {
        panic!("expected nested if");
    };
    assert_eq!(inner.len(), 1);
}

#[test]
fn test_is_not_and_not_in() {
    let stmt = single_stmt("a is not None and b not in c\n");
    let StmtKind::Expr(expr) = stmt.kind else {
        panic!("expected expression statement");
    };
    let ExprKind::BoolOp { values, .. } = expr.kind else {
        panic!("expected bool op");
    };
    assert!(matches!(values[0].kind, ExprKind::Compare { ref ops, .. } if ops == &[CmpOpKind::IsNot]));
    assert!(matches!(values[1].kind, ExprKind::Compare { ref ops, .. } if ops == &[CmpOpKind::NotIn]));
}

#[test]
fn test_for_with_tuple_target() {
    let stmt = single_stmt("for i, layer in enumerate(self.layers):\n    x = layer(x)\n");
    let StmtKind::For { target, iter, body, .. } = stmt.kind else {
        panic!("expected for");
    };
    assert!(matches!(target.kind, ExprKind::Tuple(_)));
    assert!(matches!(iter.kind, ExprKind::Call { .. }));
    assert_eq!(body.len(), 1);
}

#[test]
fn test_try_except_finally() {
    let source = "try:\n    y = f(x)\nexcept ValueError as e:\n    y = None\nfinally:\n    pass\n";
    let stmt = single_stmt(source);
    let StmtKind::Try {
        handlers, finalbody, ..
    } = stmt.kind
    else {
        panic!("expected try");
    };
    assert_eq!(handlers.len(), 1);
    assert_eq!(handlers[0].name.as_deref(), Some("e"));
    assert_eq!(finalbody.len(), 1);
}

#[test]
fn test_inline_suite_and_semicolons() {
    let body = parse_module("if a: b = 1; c = 2\nd = 3\n").expect("parse");
    assert_eq!(body.len(), 2);
    let StmtKind::If { body: inner, .. } = &body[0].kind else {
        panic!("expected if");
    };
    assert_eq!(inner.len(), 2);
}

#[test]
fn test_pass_through_statements() {
    let source = "import numpy as np\nfrom torch import nn\nassert x, 'msg'\ndel a, b\nwhile n:\n    n -= 1\n";
    let body = parse_module(source).expect("parse");
    let kinds: Vec<&str> = body.iter().map(|s| s.kind_name()).collect();
    assert_eq!(kinds, vec!["Import", "Import", "Assert", "Delete", "While"]);
    assert!(matches!(&body[0].kind, StmtKind::Import(names) if names == &["np".to_string()]));
    assert!(matches!(&body[3].kind, StmtKind::Delete(targets) if targets.len() == 2));
}

// ==================== Expressions ====================

#[test]
fn test_precedence() {
    let stmt = single_stmt("y = -x ** 2 + a @ b * c\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assign");
    };
    let ExprKind::BinOp { left, op, right } = value.kind else {
        panic!("expected binop");
    };
    assert_eq!(op, BinOpKind::Add);
    assert!(matches!(left.kind, ExprKind::UnaryOp { .. }));
    assert!(matches!(right.kind, ExprKind::BinOp { op: BinOpKind::Mult, .. }));
}

#[test]
fn test_subscript_forms() {
    let stmt = single_stmt("y = x[0, 1:, ::2]\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assign");
    };
    let ExprKind::Subscript { slice, .. } = value.kind else {
        panic!("expected subscript");
    };
    let Slice::Ext(items) = *slice else {
        panic!("expected extended slice");
    };
    assert_eq!(items.len(), 3);
    assert!(matches!(items[0], Slice::Index(_)));
    assert!(matches!(
        items[1],
        Slice::Range { lower: Some(_), upper: None, step: None }
    ));
    assert!(matches!(
        items[2],
        Slice::Range { lower: None, upper: None, step: Some(_) }
    ));
}

#[test]
fn test_negative_index_literal() {
    let stmt = single_stmt("y = x[-1]\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assign");
    };
    let ExprKind::Subscript { slice, .. } = value.kind else {
        panic!("expected subscript");
    };
    let Slice::Index(index) = *slice else {
        panic!("expected index");
    };
    assert_eq!(index.as_int_literal(), Some(-1));
}

#[test]
fn test_call_with_keywords() {
    let stmt = single_stmt("y = np.sum(x, axis=1, keepdims=True)\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assign");
    };
    let ExprKind::Call {
        func,
        args,
        keywords,
    } = value.kind
    else {
        panic!("expected call");
    };
    assert!(matches!(func.kind, ExprKind::Attribute { ref attr, .. } if attr == "sum"));
    assert_eq!(args.len(), 1);
    let names: Vec<&str> = keywords.iter().map(|k| k.arg.as_str()).collect();
    assert_eq!(names, vec!["axis", "keepdims"]);
}

#[test]
fn test_containers_and_comprehension() {
    let body = parse_module("a = []\nb = {}\nc = (1,)\nd = {'k': 1}\ne = [f(v) for v in xs]\n")
        .expect("parse");
    let values: Vec<&ExprKind> = body
        .iter()
        .map(|s| match &s.kind {
            StmtKind::Assign { value, .. } => &value.kind,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert!(matches!(values[0], ExprKind::List(items) if items.is_empty()));
    assert!(matches!(values[1], ExprKind::Dict { keys, .. } if keys.is_empty()));
    assert!(matches!(values[2], ExprKind::Tuple(items) if items.len() == 1));
    assert!(matches!(values[3], ExprKind::Dict { keys, .. } if keys.len() == 1));
    assert!(matches!(values[4], ExprKind::ListComp { generators, .. } if generators.len() == 1));
}

#[test]
fn test_string_literals() {
    let stmt = single_stmt("s = 'a\\n' \"b\"\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assign");
    };
    assert_eq!(value.kind, ExprKind::Constant(Constant::Str("a\nb".to_string())));
}

#[test]
fn test_docstring_is_an_expression_statement() {
    let func = parse_ok("def f(x):\n    \"\"\"Doc\n    string.\"\"\"\n    return x\n");
    assert_eq!(func.body.len(), 2);
    assert!(matches!(func.body[0].kind, StmtKind::Expr(_)));
}

#[test]
fn test_spans_point_at_source() {
    let func = parse_ok("def f(x):\n    y = x\n    return y\n");
    let ret = &func.body[1];
    assert_eq!(ret.span.start_line, 3);
    assert_eq!(ret.span.start_column, 5);
}

#[derive(serde::Serialize)]
struct NodeRow {
    kind: &'static str,
    line: usize,
    column: usize,
}

#[test]
fn test_node_listing_snapshot() {
    let func = parse_ok("def f(x, y=1):\n    z = x + y\n    return z\n");
    let mut rows = Vec::new();
    for_each_node(&func, &mut |_, kind, span| {
        rows.push(NodeRow {
            kind,
            line: span.start_line,
            column: span.start_column,
        })
    });
    insta::assert_yaml_snapshot!(rows, @r"
    - kind: FunctionDef
      line: 1
      column: 1
    - kind: Param
      line: 1
      column: 7
    - kind: Param
      line: 1
      column: 10
    - kind: Constant
      line: 1
      column: 12
    - kind: Assign
      line: 2
      column: 5
    - kind: Name
      line: 2
      column: 5
    - kind: BinOp
      line: 2
      column: 9
    - kind: Name
      line: 2
      column: 9
    - kind: Name
      line: 2
      column: 13
    - kind: Return
      line: 3
      column: 5
    - kind: Name
      line: 3
      column: 12
    ");
}

// ==================== Errors ====================

#[test]
fn test_missing_colon_is_reported() {
    let err = parse_function("def f(x)\n    return x\n").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    assert_eq!(err.span().start_line, 1);
}

#[test]
fn test_variadic_parameters_rejected() {
    let err = parse_function("def f(*args):\n    return args\n").unwrap_err();
    assert!(err.to_string().contains("variadic"));
}
