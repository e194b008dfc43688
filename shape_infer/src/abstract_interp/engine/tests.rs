use super::*;
use crate::config::InferenceConfig;
use crate::diagnostics::Diagnostic;
use crate::host::{ArrayValue, Host, ObjectId, Program};
use crate::lattice::{known_shape, DType, ShapeElem, Substitution, TupleType, VarId};
use crate::tfuncs::DEFAULT_RULES;
use pretty_assertions::assert_eq;
use shape_infer_syntax::parse_function;

#[derive(Debug)]
struct Outcome {
    function_type: Type,
    scope: Scope,
    node_types: BTreeMap<NodeId, Type>,
    inlined: InlineRegistry,
    diagnostics: Vec<Diagnostic>,
    subst: Substitution,
}

impl Outcome {
    fn var(&self, name: &str) -> Type {
        match self.scope.vars.get(name) {
            Some(ty) => self.subst.resolve(ty),
            None => panic!("'{name}' is not bound"),
        }
    }

    fn ret(&self) -> Type {
        match self.subst.resolve(&self.function_type) {
            Type::Arrow { ret, .. } => *ret,
            other => panic!("not a function type: {other}"),
        }
    }
}

fn analyze_with(
    program: &Program,
    config: InferenceConfig,
    source: &str,
    args: Vec<Type>,
    hints: &TypeHints,
) -> InferResult<Outcome> {
    let def = parse_function(source).unwrap();
    let mut session = Session::new(&def, program, &DEFAULT_RULES, config);
    for arg in &args {
        session.subst.reserve(arg);
    }
    let mut engine = InferenceEngine::new(&mut session, program.main_module());
    let function_type = engine.infer_function(&def, args, hints)?;
    let (node_types, inlined, scope) = engine.into_parts();
    let (_, subst, diagnostics) = session.finish();
    Ok(Outcome {
        function_type,
        scope,
        node_types,
        inlined,
        diagnostics,
        subst,
    })
}

fn analyze_in(program: &Program, source: &str, args: Vec<Type>) -> InferResult<Outcome> {
    analyze_with(program, InferenceConfig::default(), source, args, &TypeHints::new())
}

fn analyze(source: &str, args: Vec<Type>) -> Outcome {
    analyze_in(&Program::new(), source, args).unwrap()
}

fn f32_array(dims: &[usize]) -> Type {
    Type::ndarray(DType::Float32, known_shape(dims))
}

#[test]
fn test_straight_line_constants_fold() {
    let out = analyze(
        "def f(x):\n    y = x + 1\n    z = y * 2.0\n    return z\n",
        vec![Type::int_const(3)],
    );
    assert_eq!(out.var("y"), Type::int_const(4));
    assert_eq!(out.var("z"), Type::float_const(8.0));
    assert_eq!(out.ret(), Type::float_const(8.0));
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_function_type_records_params_and_return() {
    let x = Type::ndarray(DType::Int64, known_shape(&[3, 4]));
    let out = analyze("def f(x):\n    return x + 1\n", vec![x.clone()]);
    assert_eq!(
        out.subst.resolve(&out.function_type),
        Type::Arrow {
            params: vec![x.clone()],
            ret: Box::new(x),
        }
    );
}

#[test]
fn test_no_return_gives_none() {
    let out = analyze("def f(x):\n    y = x\n", vec![Type::Str]);
    assert_eq!(out.ret(), Type::None);
}

#[test]
fn test_tuple_unpacking() {
    let out = analyze(
        "def f(xs, m):\n    a, b = (1, 'label')\n    c, d = xs\n    r0, r1 = m\n",
        vec![Type::list(Type::float()), f32_array(&[2, 3])],
    );
    assert_eq!(out.var("a"), Type::int_const(1));
    assert_eq!(out.var("b"), Type::Str);
    assert_eq!(out.var("c"), Type::float());
    assert_eq!(out.var("d"), Type::float());
    assert_eq!(out.var("r1"), f32_array(&[3]));
}

#[test]
fn test_unpacking_arity_mismatch_is_fatal() {
    let result = analyze_in(
        &Program::new(),
        "def f():\n    a, b = (1, 2, 3)\n",
        vec![],
    );
    assert!(matches!(result, Err(ref e) if e.is_unification()));
}

#[test]
fn test_if_merges_branches() {
    let out = analyze(
        "def f(c):\n    if c:\n        y = 1\n        z = 'only then'\n    else:\n        y = 2.5\n    return y\n",
        vec![Type::Bool],
    );
    assert_eq!(out.var("y"), Type::float());
    assert_eq!(out.var("z"), Type::Str);
    assert_eq!(out.ret(), Type::float());
}

#[test]
fn test_if_merges_array_shapes() {
    let out = analyze(
        "def f(c, a, b):\n    if c:\n        x = a\n    else:\n        x = b\n    return x\n",
        vec![Type::Bool, f32_array(&[3, 5]), f32_array(&[3, 4])],
    );
    assert_eq!(
        out.ret(),
        Type::ndarray(DType::Float32, vec![ShapeElem::Known(3), ShapeElem::Unknown])
    );
}

#[test]
fn test_if_with_incompatible_branches_is_fatal() {
    let result = analyze_in(
        &Program::new(),
        "def f(c):\n    if c:\n        y = [1]\n    else:\n        y = 'text'\n",
        vec![Type::Bool],
    );
    match result {
        Err(InferenceError::Unification { context, .. }) => assert_eq!(context, "merge of 'y'"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected a merge conflict"),
    }
}

#[test]
fn test_none_narrowing() {
    let out = analyze(
        "def f(x):\n    if x is None:\n        a = x\n    else:\n        b = x + 1\n    return x\n",
        vec![Type::optional(Type::int())],
    );
    assert_eq!(out.var("a"), Type::None);
    assert_eq!(out.var("b"), Type::int());
    assert_eq!(out.ret(), Type::optional(Type::int()));
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_is_not_none_swaps_branches() {
    let out = analyze(
        "def f(x):\n    if x is not None:\n        a = x\n    else:\n        b = x\n",
        vec![Type::optional(f32_array(&[2]))],
    );
    assert_eq!(out.var("a"), f32_array(&[2]));
    assert_eq!(out.var("b"), Type::None);
}

#[test]
fn test_known_none_attribute_widens_on_else() {
    let mut program = Program::new();
    let class = program.add_class("Cache");
    let cache = program.add_object(class, vec![("value", Value::None)]);
    let out = analyze_in(
        &program,
        "def f(self):\n    if self.value is None:\n        a = self.value\n    else:\n        b = self.value\n",
        vec![Type::UserObject(cache)],
    )
    .unwrap();
    assert_eq!(out.var("a"), Type::None);
    assert!(out.var("b").is_var());
}

#[test]
fn test_loop_widens_accumulator() {
    let out = analyze(
        "def f():\n    y = 0\n    for i in range(3):\n        y = y + 0.5\n    return y\n",
        vec![],
    );
    assert_eq!(out.var("y"), Type::float());
    assert_eq!(out.var("i"), Type::int());
}

#[test]
fn test_loop_over_array_rows() {
    let out = analyze(
        "def f(m):\n    for row in m:\n        scaled = row * 2.0\n    return scaled\n",
        vec![f32_array(&[5, 3])],
    );
    assert_eq!(out.var("row"), f32_array(&[3]));
    assert_eq!(out.ret(), f32_array(&[3]));
}

#[test]
fn test_loop_over_non_iterable_warns() {
    let out = analyze("def f(n):\n    for i in n:\n        pass\n", vec![Type::Bool]);
    assert!(out.var("i").is_var());
    assert!(matches!(
        out.diagnostics[0].reason,
        DiagnosticReason::NotIterable(_)
    ));
}

#[test]
fn test_while_is_inert() {
    let out = analyze("def f(c):\n    while c:\n        y = 1\n    return 0\n", vec![Type::Bool]);
    assert!(out.scope.vars.get("y").is_none());
    assert_eq!(out.ret(), Type::int_const(0));
}

#[test]
fn test_try_merges_handlers() {
    let out = analyze(
        "def f():\n    try:\n        y = 1\n    except ValueError as e:\n        y = 2.0\n    finally:\n        z = 'ignored'\n    return y\n",
        vec![],
    );
    assert_eq!(out.ret(), Type::float());
    assert!(out.scope.vars.get("z").is_none());
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_unsupported_statements() {
    let with = analyze_in(
        &Program::new(),
        "def f(p):\n    with p as h:\n        pass\n",
        vec![Type::Str],
    );
    assert!(matches!(
        with,
        Err(InferenceError::Unsupported(UnsupportedConstruct {
            kind: UnsupportedKind::Statement("With"),
            ..
        }))
    ));

    let nested = analyze_in(
        &Program::new(),
        "def f():\n    def g():\n        pass\n",
        vec![],
    );
    assert!(matches!(
        nested,
        Err(InferenceError::Unsupported(UnsupportedConstruct {
            kind: UnsupportedKind::Statement("FunctionDef"),
            ..
        }))
    ));

    let lambda = analyze_in(&Program::new(), "def f():\n    g = lambda v: v\n", vec![]);
    assert!(matches!(lambda, Err(InferenceError::Unsupported(_))));
}

#[test]
fn test_list_comprehension() {
    let out = analyze(
        "def f(xs):\n    ys = [v * 2 for v in xs]\n    return ys\n",
        vec![Type::list(Type::int())],
    );
    assert_eq!(out.ret(), Type::list(Type::int()));
    assert!(out.scope.vars.get("v").is_none());

    let nested = analyze_in(
        &Program::new(),
        "def f(xs):\n    return [a for a in xs for b in xs]\n",
        vec![Type::list(Type::int())],
    );
    assert!(matches!(
        nested,
        Err(InferenceError::Unsupported(UnsupportedConstruct {
            kind: UnsupportedKind::Comprehension,
            ..
        }))
    ));
}

#[test]
fn test_undefined_name_warns_once() {
    let out = analyze("def f():\n    a = missing\n    b = missing\n", vec![]);
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(
        out.diagnostics[0].reason,
        DiagnosticReason::UndefinedName("missing".to_string())
    );
    assert_eq!(out.var("a"), out.var("b"));
}

#[test]
fn test_array_subscripts() {
    let out = analyze(
        "def f(x):\n    a = x[0]\n    b = x[:, 1:3]\n    c = x[None]\n    d = x[..., 0]\n    e = x[::-1]\n",
        vec![f32_array(&[3, 4])],
    );
    assert_eq!(out.var("a"), f32_array(&[4]));
    assert_eq!(out.var("b"), f32_array(&[3, 2]));
    assert_eq!(out.var("c"), f32_array(&[1, 3, 4]));
    assert_eq!(out.var("d"), f32_array(&[3]));
    assert_eq!(out.var("e"), f32_array(&[3, 4]));
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_array_subscript_with_unknown_bounds() {
    let out = analyze(
        "def f(x, n):\n    return x[:n]\n",
        vec![f32_array(&[6, 2]), Type::int()],
    );
    assert_eq!(
        out.ret(),
        Type::ndarray(DType::Float32, vec![ShapeElem::Unknown, ShapeElem::Known(2)])
    );
}

#[test]
fn test_too_many_indices_warns() {
    let out = analyze("def f(x):\n    return x[0, 0, 0]\n", vec![f32_array(&[3, 4])]);
    assert!(out.ret().is_var());
    assert!(matches!(
        out.diagnostics[0].reason,
        DiagnosticReason::RuleFailure { .. }
    ));
}

#[test]
fn test_tuple_subscripts() {
    let t = Type::tuple(vec![Type::int_const(1), Type::Str, Type::float()]);
    let out = analyze(
        "def f(t):\n    a = t[1]\n    b = t[-1]\n    c = t[1:]\n    d = t[5]\n",
        vec![t],
    );
    assert_eq!(out.var("a"), Type::Str);
    assert_eq!(out.var("b"), Type::float());
    assert_eq!(out.var("c"), Type::tuple(vec![Type::Str, Type::float()]));
    assert!(out.var("d").is_var());
    assert_eq!(
        out.diagnostics[0].reason,
        DiagnosticReason::IndexOutOfRange { index: 5, len: 3 }
    );
}

#[test]
fn test_dict_and_list_items() {
    let out = analyze(
        "def f(d, xs):\n    v = d['k']\n    d['j'] = 2\n    xs[0] = 1.5\n    return xs\n",
        vec![
            Type::dict(Type::Str, Type::int()),
            Type::list(Type::Var(VarId(0))),
        ],
    );
    assert_eq!(out.var("v"), Type::int());
    assert_eq!(out.ret(), Type::list(Type::float()));
}

#[test]
fn test_augmented_assignment_on_list() {
    let out = analyze(
        "def f(xs):\n    xs += [1]\n    return xs\n",
        vec![Type::list(Type::Var(VarId(0)))],
    );
    assert_eq!(out.ret(), Type::list(Type::int()));
}

#[test]
fn test_list_mutations_widen_alike() {
    let appended = analyze("def f():\n    xs = [1]\n    xs.append(2.5)\n    return xs\n", vec![]);
    let extended = analyze("def f():\n    xs = [1]\n    xs += [2.5]\n    return xs\n", vec![]);
    let stored = analyze("def f():\n    xs = [1]\n    xs[0] = 2.5\n    return xs\n", vec![]);
    assert_eq!(appended.ret(), Type::list(Type::float()));
    assert_eq!(appended.ret(), extended.ret());
    assert_eq!(stored.ret(), extended.ret());

    let unchanged = analyze("def f():\n    xs = [1.0]\n    xs.append(2)\n    return xs\n", vec![]);
    assert_eq!(unchanged.ret(), Type::list(Type::float()));
}

#[test]
fn test_list_store_needs_int_index() {
    let err = analyze_in(
        &Program::new(),
        "def f(xs):\n    xs[0.5] = 1\n    return xs\n",
        vec![Type::list(Type::int())],
    )
    .unwrap_err();
    match err {
        InferenceError::Unification { error, context, .. } => {
            assert_eq!(context, "Subscript");
            assert_eq!(
                error,
                UnifyError::Mismatch {
                    left: Type::float_const(0.5),
                    right: Type::int(),
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_attribute_assignment_and_read() {
    let mut program = Program::new();
    let class = program.add_class("Counter");
    let counter = program.add_object(class, vec![("count", Value::Int(0))]);
    let out = analyze_in(
        &program,
        "def f(self):\n    before = self.count\n    self.count = 1.5\n    return self.count\n",
        vec![Type::UserObject(counter)],
    )
    .unwrap();
    assert_eq!(out.var("before"), Type::int_const(0));
    assert_eq!(out.ret(), Type::float_const(1.5));
    assert_eq!(
        out.scope.attrs.get(counter, "count").map(|t| out.subst.resolve(t)),
        Some(Type::float_const(1.5))
    );
}

#[test]
fn test_attribute_of_non_object_warns() {
    let out = analyze("def f(s):\n    s.name = 1\n", vec![Type::Str]);
    assert!(matches!(
        out.diagnostics[0].reason,
        DiagnosticReason::UnsupportedTarget(_)
    ));
}

#[test]
fn test_array_attributes_and_methods() {
    let out = analyze(
        "def f(x):\n    s = x.shape\n    y = x.reshape(4, 3)\n    return x.T\n",
        vec![f32_array(&[3, 4])],
    );
    assert_eq!(
        out.var("s"),
        Type::tuple(vec![Type::int_const(3), Type::int_const(4)])
    );
    assert_eq!(out.var("y"), f32_array(&[4, 3]));
    assert_eq!(out.ret(), f32_array(&[4, 3]));
}

#[test]
fn test_elementwise_comparison() {
    let out = analyze(
        "def f(x):\n    m = x > 0\n    b = x is None\n    return m\n",
        vec![f32_array(&[3, 4])],
    );
    assert_eq!(out.ret(), Type::ndarray(DType::Bool, known_shape(&[3, 4])));
    assert_eq!(out.var("b"), Type::Bool);
}

#[test]
fn test_unary_and_boolean_operators() {
    let out = analyze(
        "def f(a, b):\n    n = -3\n    m = -a\n    c = a and b\n    d = not a\n",
        vec![Type::float_const(0.5), Type::Bool],
    );
    assert_eq!(out.var("n"), Type::int_const(-3));
    assert_eq!(out.var("m"), Type::float_const(-0.5));
    assert_eq!(out.var("c"), Type::Bool);
    assert_eq!(out.var("d"), Type::Bool);
}

#[test]
fn test_broadcast_mismatch_is_fatal() {
    let result = analyze_in(
        &Program::new(),
        "def f(a, b):\n    return a + b\n",
        vec![f32_array(&[3, 4]), f32_array(&[3, 5])],
    );
    match result {
        Err(InferenceError::Unification { location, .. }) => assert_eq!(location.line, 2),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected a unification error"),
    }
}

#[test]
fn test_unknown_function_warns_and_continues() {
    let out = analyze(
        "def f(x):\n    y = mystery(x)\n    z = x + 1\n    return y\n",
        vec![Type::int()],
    );
    assert!(out.ret().is_var());
    assert_eq!(out.var("z"), Type::int());
    assert_eq!(
        out.diagnostics[0].reason,
        DiagnosticReason::UnknownFunction("mystery".to_string())
    );
}

#[test]
fn test_ignored_calls_skip_arguments() {
    let mut program = Program::new();
    let main = program.main_module();
    let logging = program.add_library_module("logging");
    program.set_global(main, "logging", Value::Module(logging));
    let out = analyze_in(
        &program,
        "def f():\n    r = logging.info(undefined_thing)\n",
        vec![],
    )
    .unwrap();
    assert_eq!(out.var("r"), Type::None);
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_builtin_simulation() {
    let out = analyze(
        "def f(n):\n    q = divmod(7, 2)\n    r = divmod(n, 2)\n",
        vec![Type::int()],
    );
    assert_eq!(
        out.var("q"),
        Type::tuple(vec![Type::int_const(3), Type::int_const(1)])
    );
    assert_eq!(out.var("r"), Type::tuple(vec![Type::int(), Type::int()]));

    let off = analyze_with(
        &Program::new(),
        InferenceConfig {
            simulate_builtins: false,
            ..InferenceConfig::default()
        },
        "def f():\n    return divmod(7, 2)\n",
        vec![],
        &TypeHints::new(),
    )
    .unwrap();
    assert!(off.ret().is_var());
    assert_eq!(off.diagnostics.len(), 1);
}

#[test]
fn test_library_calls() {
    let mut program = Program::new();
    let main = program.main_module();
    let np = program.add_library_module("numpy");
    program.set_global(main, "np", Value::Module(np));
    let out = analyze_in(
        &program,
        "def f(n):\n    z = np.zeros((n, 3), dtype=np.float32)\n    return np.sum(z, axis=0)\n",
        vec![Type::int_const(2)],
    )
    .unwrap();
    assert_eq!(out.var("z"), f32_array(&[2, 3]));
    assert_eq!(out.ret(), f32_array(&[3]));
}

#[test]
fn test_inlines_user_function() {
    let mut program = Program::new();
    let main = program.main_module();
    let double = program.add_function(main, "double", "def double(v, k=2):\n    return v * k\n");
    let x = Type::ndarray(DType::Int64, known_shape(&[3]));
    let out = analyze_in(&program, "def f(x):\n    return double(x)\n", vec![x.clone()]).unwrap();
    assert_eq!(out.ret(), x);

    let (site, calls) = out.inlined.iter().next().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function, double);
    assert_eq!(calls[0].def.name, "double");
    assert!(out.node_types.contains_key(site));
    assert!(out.node_types.contains_key(&calls[0].def.id));
}

#[test]
fn test_inline_keyword_arguments() {
    let mut program = Program::new();
    let main = program.main_module();
    program.add_function(main, "scale", "def scale(v, factor=1):\n    return v * factor\n");
    let out = analyze_in(
        &program,
        "def f():\n    return scale(2, factor=0.5)\n",
        vec![],
    )
    .unwrap();
    assert_eq!(out.ret(), Type::float_const(1.0));
}

#[test]
fn test_inline_arity_mismatch_warns() {
    let mut program = Program::new();
    let main = program.main_module();
    program.add_function(main, "g", "def g(a, b):\n    return a\n");
    let out = analyze_in(&program, "def f():\n    return g(1)\n", vec![]).unwrap();
    assert!(out.ret().is_var());
    assert!(matches!(
        &out.diagnostics[0].reason,
        DiagnosticReason::RuleFailure { operation, .. } if operation == "g"
    ));
}

#[test]
fn test_non_literal_default_is_a_usage_error() {
    let mut program = Program::new();
    let main = program.main_module();
    program.add_function(main, "g", "def g(a=make()):\n    return a\n");
    let result = analyze_in(&program, "def f():\n    return g()\n", vec![]);
    assert!(matches!(result, Err(InferenceError::Usage { .. })));
}

#[test]
fn test_unparsable_callee_warns() {
    let mut program = Program::new();
    let main = program.main_module();
    program.add_function(main, "broken", "def broken(:\n    pass\n");
    let out = analyze_in(&program, "def f():\n    return broken()\n", vec![]).unwrap();
    assert!(out.ret().is_var());
    assert!(matches!(
        out.diagnostics[0].reason,
        DiagnosticReason::InlineFailed { .. }
    ));
}

#[test]
fn test_inline_depth_limit() {
    let mut program = Program::new();
    let main = program.main_module();
    program.add_function(main, "g", "def g(v):\n    return v\n");
    let out = analyze_with(
        &program,
        InferenceConfig::default().with_max_inline_depth(0),
        "def f():\n    return g(1)\n",
        vec![],
        &TypeHints::new(),
    )
    .unwrap();
    assert!(out.ret().is_var());
    assert_eq!(
        out.diagnostics[0].reason,
        DiagnosticReason::InlineDepthExceeded {
            callee: "g".to_string(),
            depth: 0,
        }
    );
}

fn model_program() -> (Program, ObjectId) {
    let mut program = Program::new();
    let main = program.main_module();
    let fc = program.add_library_object(
        "Linear",
        vec![("in_features", Value::Int(4)), ("out_features", Value::Int(2))],
    );
    let class = program.add_class("Net");
    program.add_method(
        class,
        main,
        "forward",
        "    def forward(self, x):\n        return self.fc(x)\n",
    );
    program.add_method(
        class,
        main,
        "reset",
        "    def reset(self):\n        self.total = 0.5\n",
    );
    let net = program.add_object(class, vec![("fc", Value::Object(fc))]);
    program.set_global(main, "net", Value::Object(net));
    (program, net)
}

#[test]
fn test_callable_instance_inlines_forward() {
    let (program, _) = model_program();
    let out = analyze_in(
        &program,
        "def f(x):\n    return net(x)\n",
        vec![Type::tensor(DType::Float32, known_shape(&[8, 4]))],
    )
    .unwrap();
    assert_eq!(out.ret(), Type::tensor(DType::Float32, known_shape(&[8, 2])));
    let calls: Vec<&InlinedCall> = out.inlined.values().flatten().collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].def.name, "forward");
}

#[test]
fn test_layer_rule_rejects_wrong_features() {
    let (program, _) = model_program();
    let result = analyze_in(
        &program,
        "def f(x):\n    return net(x)\n",
        vec![Type::tensor(DType::Float32, known_shape(&[8, 5]))],
    );
    assert!(matches!(result, Err(ref e) if e.is_unification()));
}

#[test]
fn test_method_updates_flow_back_to_caller() {
    let (program, net) = model_program();
    let out = analyze_in(
        &program,
        "def f(m):\n    m.reset()\n    return m.total\n",
        vec![Type::UserObject(net)],
    )
    .unwrap();
    assert_eq!(out.ret(), Type::float_const(0.5));
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_sequential_feeds_children_in_order() {
    let mut program = Program::new();
    let main = program.main_module();
    let fc = program.add_library_object(
        "Linear",
        vec![("in_features", Value::Int(3)), ("out_features", Value::Int(6))],
    );
    let relu = program.add_library_object("ReLU", vec![]);
    let seq = program.add_sequential(vec![Value::Object(fc), Value::Object(relu)]);
    program.set_global(main, "layers", Value::Object(seq));
    let out = analyze_in(
        &program,
        "def f(x):\n    return layers(x)\n",
        vec![Type::tensor(DType::Float32, known_shape(&[2, 3]))],
    )
    .unwrap();
    assert_eq!(out.ret(), Type::tensor(DType::Float32, known_shape(&[2, 6])));
}

#[test]
fn test_calling_a_plain_value_warns() {
    let out = analyze("def f(x):\n    return x(1)\n", vec![Type::int()]);
    assert!(out.ret().is_var());
    assert!(matches!(
        out.diagnostics[0].reason,
        DiagnosticReason::NotCallable(_)
    ));
}

#[test]
fn test_hints_generalize_parameters() {
    let hints: TypeHints = vec![(
        "x".to_string(),
        Type::ndarray(DType::Float32, vec![ShapeElem::Unknown, ShapeElem::Known(4)]),
    )];
    let out = analyze_with(
        &Program::new(),
        InferenceConfig::default(),
        "def f(x):\n    return x\n",
        vec![f32_array(&[3, 4])],
        &hints,
    )
    .unwrap();
    assert_eq!(
        out.ret(),
        Type::ndarray(DType::Float32, vec![ShapeElem::Unknown, ShapeElem::Known(4)])
    );

    let mismatch = analyze_with(
        &Program::new(),
        InferenceConfig::default(),
        "def f(x):\n    return x\n",
        vec![f32_array(&[3, 5])],
        &hints,
    );
    assert!(matches!(mismatch, Err(ref e) if e.is_unification()));
}

#[test]
fn test_value_arguments_seed_attributes() {
    let mut program = Program::new();
    let class = program.add_class("Holder");
    let weights = Value::Array(ArrayValue::ndarray(DType::Float64, &[2, 2]));
    let holder = program.add_object(class, vec![("w", weights)]);
    let out = analyze_in(&program, "def f(h):\n    return h.w\n", vec![Type::UserObject(holder)]).unwrap();
    assert_eq!(out.ret(), Type::ndarray(DType::Float64, known_shape(&[2, 2])));
    assert!(matches!(
        out.var("h"),
        Type::UserObject(id) if id == holder
    ));
}

#[test]
fn test_homogeneous_tuple_and_string_subscripts() {
    let out = analyze(
        "def f(t, s):\n    a = t[0]\n    b = t[1:]\n    c = s[0]\n",
        vec![Type::Tuple(TupleType::Homogeneous(Box::new(Type::int()))), Type::Str],
    );
    assert_eq!(out.var("a"), Type::int());
    assert_eq!(out.var("b"), Type::tuple_of(Type::int()));
    assert_eq!(out.var("c"), Type::Str);
}
