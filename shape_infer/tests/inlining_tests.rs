//! Inlining of user-defined functions and methods, layer objects and
//! run configuration.

mod common;

use common::{infer_in, infer_with, library_program, ndarray, parse, ret, tensor};
use pretty_assertions::assert_eq;
use shape_infer::host::ArrayValue;
use shape_infer::lattice::{DType, ShapeElem};
use shape_infer::{
    infer_function_value_args, DiagnosticReason, InferenceConfig, InferenceError, Inferencer,
    Host, ObjectId, Program, Type, Value,
};

const FORWARD: &str = concat!(
    "    def forward(self, x):\n",
    "        h = self.act(self.fc1(x))\n",
    "        h = F.dropout(h)\n",
    "        out = self.fc2(h)\n",
    "        return torch.sigmoid(out)\n",
);

/// Two-layer classifier bound to the global `model`.
fn classifier() -> (Program, ObjectId) {
    let (mut program, main) = library_program();
    let fc1 = program.add_library_object(
        "Linear",
        vec![("in_features", Value::Int(4)), ("out_features", Value::Int(8))],
    );
    let act = program.add_library_object("ReLU", vec![]);
    let fc2 = program.add_library_object(
        "Linear",
        vec![("in_features", Value::Int(8)), ("out_features", Value::Int(2))],
    );
    let class = program.add_class("Classifier");
    program.add_method(class, main, "forward", FORWARD);
    let model = program.add_object(
        class,
        vec![
            ("fc1", Value::Object(fc1)),
            ("act", Value::Object(act)),
            ("fc2", Value::Object(fc2)),
            ("threshold", Value::Float(0.5)),
        ],
    );
    program.set_global(main, "model", Value::Object(model));
    (program, model)
}

#[test]
fn test_model_forward_through_layers() {
    let (program, model) = classifier();
    let result = infer_in(
        &program,
        "def predict(batch):\n    return model(batch)\n",
        &[tensor(DType::Float32, &[16, 4])],
    )
    .unwrap();
    assert_eq!(ret(&result), tensor(DType::Float32, &[16, 2]));
    assert!(result.diagnostics.is_empty());

    let def = parse("def predict(batch):\n    return model(batch)\n");
    let shape_infer::syntax::StmtKind::Return(Some(call)) = &def.body[0].kind else {
        panic!("expected a return");
    };
    let inlined = result.inlined_at(call.id);
    assert_eq!(inlined.len(), 1);
    assert_eq!(inlined[0].def.name, "forward");
    assert_eq!(
        inlined[0].function_type,
        Type::Arrow {
            params: vec![Type::UserObject(model), tensor(DType::Float32, &[16, 4])],
            ret: Box::new(tensor(DType::Float32, &[16, 2])),
        }
    );
}

#[test]
fn test_layer_size_mismatch_names_the_call() {
    let (program, _) = classifier();
    let err = infer_in(
        &program,
        "def predict(batch):\n    return model(batch)\n",
        &[tensor(DType::Float32, &[16, 3])],
    )
    .unwrap_err();
    match err {
        InferenceError::Unification { context, location, .. } => {
            assert_eq!(context, "Linear");
            // Reported at `self.fc1(x)` inside the inlined `forward`.
            assert_eq!(location.line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_value_arguments() {
    let (program, model) = classifier();
    let def = parse("def run(m, batch):\n    probs = m(batch)\n    return probs > m.threshold\n");
    let result = infer_function_value_args(
        &def,
        &[
            Value::Object(model),
            Value::Array(ArrayValue::tensor(DType::Float32, &[5, 4])),
        ],
        None,
        &program,
        InferenceConfig::default(),
    )
    .unwrap();
    assert_eq!(ret(&result), tensor(DType::Bool, &[5, 2]));
    assert_eq!(result.param_types()[0], Type::UserObject(model));
}

#[test]
fn test_method_state_flows_between_calls() {
    let (mut program, main) = library_program();
    let class = program.add_class("Accumulator");
    program.add_method(
        class,
        main,
        "add",
        "    def add(self, x):\n        self.total = self.total + x\n        self.count = self.count + 1\n",
    );
    let acc = program.add_object(
        class,
        vec![
            ("total", Value::Array(ArrayValue::ndarray(DType::Float32, &[3]))),
            ("count", Value::Int(0)),
        ],
    );
    program.set_global(main, "acc", Value::Object(acc));

    let source = "\
def f(x):
    acc.add(x)
    acc.add(x)
    return acc.total, acc.count
";
    let result = infer_in(&program, source, &[ndarray(DType::Float32, &[3])]).unwrap();
    assert_eq!(
        ret(&result),
        Type::tuple(vec![ndarray(DType::Float32, &[3]), Type::int_const(2)])
    );
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_callee_hints_generalize_argument() {
    let (mut program, main) = library_program();
    let normalize = program.add_function(
        main,
        "normalize",
        "def normalize(v):\n    return v / np.sum(v, axis=1, keepdims=True)\n",
    );
    program.set_type_hints(
        normalize,
        vec![(
            "v".to_string(),
            Type::ndarray(DType::Float32, vec![ShapeElem::Unknown, ShapeElem::Known(4)]),
        )],
    );

    let source = "def f(x):\n    return normalize(x)\n";
    let result = infer_in(&program, source, &[ndarray(DType::Float32, &[3, 4])]).unwrap();
    assert_eq!(
        ret(&result),
        Type::ndarray(DType::Float32, vec![ShapeElem::Unknown, ShapeElem::Known(4)])
    );

    let err = infer_in(&program, source, &[ndarray(DType::Float32, &[3, 5])]).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::Unification { ref context, .. } if context == "type hints of 'normalize'"
    ));
}

#[test]
fn test_recursion_stops_at_depth_limit() {
    let mut program = Program::new();
    let main = program.main_module();
    program.add_function(
        main,
        "countdown",
        "def countdown(n):\n    if n > 0:\n        return countdown(n - 1)\n    return n\n",
    );
    let config = InferenceConfig::from_toml_str("max_inline_depth = 3").unwrap();
    let result = infer_with(&program, config, "def f():\n    return countdown(5)\n", &[]).unwrap();

    assert_eq!(ret(&result), Type::int());
    assert_eq!(
        result.diagnostics.iter().map(|d| d.reason.clone()).collect::<Vec<_>>(),
        vec![DiagnosticReason::InlineDepthExceeded {
            callee: "countdown".to_string(),
            depth: 3,
        }]
    );
    assert_eq!(result.inlined.values().flatten().count(), 3);
}

#[test]
fn test_simulated_builtins_follow_config() {
    let source = "def f(c):\n    return ord(c), round(2.5)\n";
    let program = Program::new();
    let on = infer_with(&program, InferenceConfig::default(), source, &[Type::Str]).unwrap();
    assert_eq!(ret(&on), Type::tuple(vec![Type::int(), Type::int_const(2)]));

    let off = infer_with(
        &program,
        InferenceConfig::from_toml_str("simulate_builtins = false").unwrap(),
        source,
        &[Type::Str],
    )
    .unwrap();
    assert_eq!(off.diagnostics.len(), 2);
    assert!(off
        .diagnostics
        .iter()
        .all(|d| matches!(d.reason, DiagnosticReason::UnknownFunction(_))));
}

#[test]
fn test_inferencer_is_reusable() {
    let (program, _) = library_program();
    let inferencer = Inferencer::new(&program)
        .with_config(InferenceConfig::default().with_loop_passes(3));
    let def = parse("def f(n):\n    return torch.zeros(n, 3)\n");

    let fixed = inferencer.infer(&def, &[Type::int_const(2)], None).unwrap();
    assert_eq!(ret(&fixed), tensor(DType::Float32, &[2, 3]));

    let open = inferencer.infer(&def, &[Type::int()], None).unwrap();
    assert_eq!(
        ret(&open),
        Type::tensor(DType::Float32, vec![ShapeElem::Unknown, ShapeElem::Known(3)])
    );
}

#[test]
fn test_render_lists_nodes_by_position() {
    let result = infer_in(
        &Program::new(),
        "def f(x):\n    y = x + 1\n    return y\n",
        &[Type::int()],
    )
    .unwrap();
    insta::assert_snapshot!(result.render(), @r"
    1:1 FunctionDef : (int) -> int
    1:7 Param : int
    2:5 Name : int
    2:5 Assign : NoneType
    2:9 Name : int
    2:9 BinOp : int
    2:13 Constant : int(1)
    3:5 Return : int
    3:12 Name : int
    ");
}

#[test]
fn test_render_appends_inlined_callees() {
    let mut program = Program::new();
    let main = program.main_module();
    program.add_function(main, "double", "def double(v):\n    return v * 2\n");
    let result = infer_in(&program, "def f(x):\n    return double(x)\n", &[Type::int()]).unwrap();
    insta::assert_snapshot!(result.render(), @r"
    1:1 FunctionDef : (int) -> int
    1:7 Param : int
    2:5 Return : int
    2:12 Name : (int) -> int
    2:12 Call : int
    2:19 Name : int
    == double inlined at 2:12
    1:1 FunctionDef : (int) -> int
    1:12 Param : int
    2:5 Return : int
    2:12 BinOp : int
    2:12 Name : int
    2:16 Constant : int(2)
    ");
}
