//! In-memory [`Host`]: module namespaces, function sources and an object arena.

use std::collections::BTreeMap;

use super::{FunctionId, Host, ModuleId, ObjectId, TypeHints, Value};
use crate::lattice::DType;

#[derive(Debug, Clone)]
struct ModuleData {
    name: String,
    globals: BTreeMap<String, Value>,
    /// Library modules resolve unknown attributes to builtins by dotted name.
    library: bool,
}

#[derive(Debug, Clone)]
struct FunctionData {
    name: String,
    source: String,
    module: ModuleId,
    hints: TypeHints,
}

#[derive(Debug, Clone)]
struct ClassData {
    name: String,
    methods: BTreeMap<String, FunctionId>,
}

#[derive(Debug, Clone)]
struct ObjectData {
    class: usize,
    fields: Vec<(String, Value)>,
    children: Option<Vec<Value>>,
}

/// Class handle inside a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

/// A program assembled in memory.
///
/// ```
/// use shape_infer::host::{Host, Program, Value};
///
/// let mut program = Program::new();
/// let main = program.main_module();
/// let np = program.add_library_module("numpy");
/// program.set_global(main, "np", Value::Module(np));
/// assert_eq!(
///     program.module_attr(np, "zeros"),
///     Some(Value::Builtin("numpy.zeros".to_string()))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Program {
    modules: Vec<ModuleData>,
    functions: Vec<FunctionData>,
    classes: Vec<ClassData>,
    objects: Vec<ObjectData>,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// Empty program with a `__main__` module.
    pub fn new() -> Self {
        Self {
            modules: vec![ModuleData {
                name: "__main__".to_string(),
                globals: BTreeMap::new(),
                library: false,
            }],
            functions: Vec::new(),
            classes: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn add_module(&mut self, name: &str) -> ModuleId {
        self.push_module(name, false)
    }

    /// Array or utility library (`numpy`, `torch`, `torch.nn.functional`).
    pub fn add_library_module(&mut self, name: &str) -> ModuleId {
        self.push_module(name, true)
    }

    fn push_module(&mut self, name: &str, library: bool) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(ModuleData {
            name: name.to_string(),
            globals: BTreeMap::new(),
            library,
        });
        id
    }

    pub fn set_global(&mut self, module: ModuleId, name: &str, value: Value) {
        if let Some(data) = self.modules.get_mut(module.0 as usize) {
            data.globals.insert(name.to_string(), value);
        }
    }

    /// Define a module-level function and bind it under `name`.
    pub fn add_function(&mut self, module: ModuleId, name: &str, source: &str) -> FunctionId {
        let id = self.push_function(module, name, source);
        self.set_global(module, name, Value::Function(id));
        id
    }

    fn push_function(&mut self, module: ModuleId, name: &str, source: &str) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(FunctionData {
            name: name.to_string(),
            source: source.to_string(),
            module,
            hints: Vec::new(),
        });
        id
    }

    pub fn set_type_hints(&mut self, function: FunctionId, hints: TypeHints) {
        if let Some(data) = self.functions.get_mut(function.0 as usize) {
            data.hints = hints;
        }
    }

    pub fn add_class(&mut self, name: &str) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(ClassData {
            name: name.to_string(),
            methods: BTreeMap::new(),
        });
        id
    }

    /// Define a method on `class`, with source taken from the class body.
    pub fn add_method(
        &mut self,
        class: ClassId,
        module: ModuleId,
        name: &str,
        source: &str,
    ) -> FunctionId {
        let id = self.push_function(module, name, source);
        if let Some(data) = self.classes.get_mut(class.0) {
            data.methods.insert(name.to_string(), id);
        }
        id
    }

    pub fn add_object(&mut self, class: ClassId, fields: Vec<(&str, Value)>) -> ObjectId {
        self.push_object(class, fields, None)
    }

    /// Object of a library class that has no analyzable methods
    /// (`Linear`, `ReLU`); the class is created on first use.
    pub fn add_library_object(&mut self, class_name: &str, fields: Vec<(&str, Value)>) -> ObjectId {
        let class = self.class_named(class_name);
        self.push_object(class, fields, None)
    }

    /// Container that calls each child on the running value, in order.
    pub fn add_sequential(&mut self, children: Vec<Value>) -> ObjectId {
        let class = self.class_named("Sequential");
        self.push_object(class, Vec::new(), Some(children))
    }

    pub fn set_field(&mut self, object: ObjectId, name: &str, value: Value) {
        let Some(data) = self.objects.get_mut(object.0 as usize) else {
            return;
        };
        match data.fields.iter_mut().find(|(field, _)| field == name) {
            Some(slot) => slot.1 = value,
            None => data.fields.push((name.to_string(), value)),
        }
    }

    fn class_named(&mut self, name: &str) -> ClassId {
        match self.classes.iter().position(|c| c.name == name) {
            Some(index) => ClassId(index),
            None => self.add_class(name),
        }
    }

    fn push_object(
        &mut self,
        class: ClassId,
        fields: Vec<(&str, Value)>,
        children: Option<Vec<Value>>,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(ObjectData {
            class: class.0,
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            children,
        });
        id
    }

    fn object(&self, object: ObjectId) -> Option<&ObjectData> {
        self.objects.get(object.0 as usize)
    }

    fn method(&self, object: ObjectId, name: &str) -> Option<FunctionId> {
        let data = self.object(object)?;
        self.classes.get(data.class)?.methods.get(name).copied()
    }
}

impl Host for Program {
    fn main_module(&self) -> ModuleId {
        ModuleId(0)
    }

    fn lookup_global(&self, module: ModuleId, name: &str) -> Option<Value> {
        self.modules.get(module.0 as usize)?.globals.get(name).cloned()
    }

    fn module_attr(&self, module: ModuleId, name: &str) -> Option<Value> {
        let data = self.modules.get(module.0 as usize)?;
        if let Some(value) = data.globals.get(name) {
            return Some(value.clone());
        }
        if !data.library {
            return None;
        }
        let dotted = format!("{}.{}", data.name, name);
        if let Some(index) = self.modules.iter().position(|m| m.name == dotted) {
            return Some(Value::Module(ModuleId(index as u32)));
        }
        // `float`, `int` and `bool` name the Python builtins, not dtypes.
        let builtin_alias = matches!(name, "float" | "int" | "bool");
        if let Some(dtype) = DType::from_name(name).filter(|_| !builtin_alias) {
            return Some(Value::DType(dtype));
        }
        Some(Value::Builtin(dotted))
    }

    fn function_source(&self, function: FunctionId) -> Option<&str> {
        self.functions
            .get(function.0 as usize)
            .map(|f| f.source.as_str())
    }

    fn function_name(&self, function: FunctionId) -> &str {
        self.functions
            .get(function.0 as usize)
            .map_or("<unknown>", |f| f.name.as_str())
    }

    fn function_module(&self, function: FunctionId) -> ModuleId {
        self.functions
            .get(function.0 as usize)
            .map_or(ModuleId(0), |f| f.module)
    }

    fn type_hints(&self, function: FunctionId) -> TypeHints {
        self.functions
            .get(function.0 as usize)
            .map(|f| f.hints.clone())
            .unwrap_or_default()
    }

    fn object_class(&self, object: ObjectId) -> &str {
        self.object(object)
            .and_then(|data| self.classes.get(data.class))
            .map_or("<unknown>", |class| class.name.as_str())
    }

    fn object_fields(&self, object: ObjectId) -> Vec<(String, Value)> {
        self.object(object)
            .map(|data| data.fields.clone())
            .unwrap_or_default()
    }

    fn get_attr(&self, object: ObjectId, name: &str) -> Option<Value> {
        let data = self.object(object)?;
        if let Some((_, value)) = data.fields.iter().find(|(field, _)| field == name) {
            return Some(value.clone());
        }
        self.method(object, name).map(|function| Value::Method {
            receiver: object,
            function,
        })
    }

    fn instance_call(&self, object: ObjectId) -> Option<FunctionId> {
        self.method(object, "forward")
            .or_else(|| self.method(object, "__call__"))
    }

    fn sequential_children(&self, object: ObjectId) -> Option<Vec<Value>> {
        self.object(object)?.children.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_library_attributes() {
        let mut program = Program::new();
        let torch = program.add_library_module("torch");
        let functional = program.add_library_module("torch.nn.functional");
        let nn = program.add_library_module("torch.nn");
        assert_eq!(program.module_attr(torch, "float32"), Some(Value::DType(DType::Float32)));
        assert_eq!(program.module_attr(torch, "nn"), Some(Value::Module(nn)));
        assert_eq!(
            program.module_attr(functional, "relu"),
            Some(Value::Builtin("torch.nn.functional.relu".to_string()))
        );
        assert_eq!(
            program.module_attr(torch, "float"),
            Some(Value::Builtin("torch.float".to_string()))
        );
    }

    #[test]
    fn test_object_fields_and_methods() {
        let mut program = Program::new();
        let main = program.main_module();
        let class = program.add_class("Net");
        let forward = program.add_method(class, main, "forward", "def forward(self, x):\n    return x\n");
        let obj = program.add_object(class, vec![("n", Value::Int(3))]);
        assert_eq!(program.object_class(obj), "Net");
        assert_eq!(program.get_attr(obj, "n"), Some(Value::Int(3)));
        assert_eq!(
            program.get_attr(obj, "forward"),
            Some(Value::Method {
                receiver: obj,
                function: forward
            })
        );
        assert_eq!(program.instance_call(obj), Some(forward));
        program.set_field(obj, "n", Value::Int(4));
        assert_eq!(program.object_fields(obj), vec![("n".to_string(), Value::Int(4))]);
    }

    #[test]
    fn test_sequential() {
        let mut program = Program::new();
        let relu = program.add_library_object("ReLU", vec![]);
        let seq = program.add_sequential(vec![Value::Object(relu)]);
        assert_eq!(program.object_class(seq), "Sequential");
        assert_eq!(program.sequential_children(seq), Some(vec![Value::Object(relu)]));
        assert_eq!(program.sequential_children(relu), None);
    }
}
