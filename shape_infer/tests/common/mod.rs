//! Shared helpers for integration tests
// Each test target uses a different subset of these helpers.
#![allow(dead_code)]

use shape_infer::lattice::{known_shape, DType};
use shape_infer::syntax::{parse_function, FunctionDef};
use shape_infer::{
    infer_function, Host, InferResult, InferenceConfig, InferenceResult, ModuleId, Program, Type,
    Value,
};

pub fn parse(source: &str) -> FunctionDef {
    parse_function(source).unwrap_or_else(|e| panic!("parse failed: {e}"))
}

/// Infers `source` against an empty program with default settings.
pub fn infer(source: &str, args: &[Type]) -> InferResult<InferenceResult> {
    infer_in(&Program::new(), source, args)
}

pub fn infer_in(program: &Program, source: &str, args: &[Type]) -> InferResult<InferenceResult> {
    infer_with(program, InferenceConfig::default(), source, args)
}

pub fn infer_with(
    program: &Program,
    config: InferenceConfig,
    source: &str,
    args: &[Type],
) -> InferResult<InferenceResult> {
    infer_function(&parse(source), args, None, program, config)
}

/// Return type of a successful run.
pub fn ret(result: &InferenceResult) -> Type {
    result
        .return_type()
        .cloned()
        .unwrap_or_else(|| panic!("no return type in {}", result.function_type))
}

pub fn ndarray(dtype: DType, dims: &[usize]) -> Type {
    Type::ndarray(dtype, known_shape(dims))
}

pub fn tensor(dtype: DType, dims: &[usize]) -> Type {
    Type::tensor(dtype, known_shape(dims))
}

/// Program whose main module imports numpy as `np` and torch as `torch`,
/// with `torch.nn` and `torch.nn.functional` (as `F`) available.
pub fn library_program() -> (Program, ModuleId) {
    let mut program = Program::new();
    let main = program.main_module();
    let numpy = program.add_library_module("numpy");
    let torch = program.add_library_module("torch");
    program.add_library_module("torch.nn");
    let functional = program.add_library_module("torch.nn.functional");
    program.set_global(main, "np", Value::Module(numpy));
    program.set_global(main, "torch", Value::Module(torch));
    program.set_global(main, "F", Value::Module(functional));
    (program, main)
}
