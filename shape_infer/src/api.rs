//! Rust API for running inference on one function.
//!
//! [`infer_function`] takes argument types, [`infer_function_value_args`]
//! takes live argument values; both analyze the function (and every
//! user-defined callee it reaches) and return an [`InferenceResult`].
//! [`Inferencer`] is the builder behind both, for callers that bring their
//! own rule tables.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use shape_infer_syntax::visit::for_each_id;
use shape_infer_syntax::{FunctionDef, NodeId};

use crate::abstract_interp::engine::{bind_arguments, ArgumentError};
use crate::abstract_interp::{InferenceEngine, InlineRegistry, InlinedCall, NodeInfo, Session};
use crate::config::InferenceConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{InferResult, InferenceError};
use crate::host::{type_of_value, Host, TypeHints, Value};
use crate::lattice::Type;
use crate::tfuncs::{TransferFunctions, DEFAULT_RULES};

/// Everything one run found out, with every type fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    /// Type of every node visited, in the analyzed function and in every
    /// inlined callee tree.
    pub node_types: BTreeMap<NodeId, Type>,
    /// Call-site node to the callees inlined there.
    pub inlined: InlineRegistry,
    /// `Arrow` type of the analyzed function.
    pub function_type: Type,
    pub diagnostics: Vec<Diagnostic>,
    /// Kind and position of every node, for rendering.
    pub nodes: BTreeMap<NodeId, NodeInfo>,
}

impl InferenceResult {
    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.node_types.get(&node)
    }

    pub fn return_type(&self) -> Option<&Type> {
        match &self.function_type {
            Type::Arrow { ret, .. } => Some(&**ret),
            _ => None,
        }
    }

    pub fn param_types(&self) -> &[Type] {
        match &self.function_type {
            Type::Arrow { params, .. } => params.as_slice(),
            _ => &[],
        }
    }

    /// Callees inlined at `call`, in call order.
    pub fn inlined_at(&self, call: NodeId) -> &[InlinedCall] {
        self.inlined.get(&call).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One line per typed node, `line:col kind : type`, ordered by position.
    ///
    /// The analyzed function comes first; each inlined callee follows under a
    /// `== name inlined at line:col` header, in call-site order.
    pub fn render(&self) -> String {
        let mut inlined_ids = BTreeSet::new();
        for call in self.inlined.values().flatten() {
            for_each_id(&call.def, &mut |id| {
                inlined_ids.insert(id);
            });
        }

        let mut out = Vec::new();
        self.render_rows(
            self.node_types.keys().filter(|id| !inlined_ids.contains(*id)).copied(),
            &mut out,
        );
        for (site, calls) in &self.inlined {
            let at = self
                .nodes
                .get(site)
                .map(|info| info.location.to_string())
                .unwrap_or_else(|| "?".to_string());
            for call in calls {
                out.push(format!("== {} inlined at {at}", call.def.name));
                let mut ids = Vec::new();
                for_each_id(&call.def, &mut |id| ids.push(id));
                self.render_rows(ids.into_iter(), &mut out);
            }
        }
        out.join("\n")
    }

    fn render_rows(&self, ids: impl Iterator<Item = NodeId>, out: &mut Vec<String>) {
        let mut rows: Vec<(usize, usize, NodeId, &str, &Type)> = ids
            .filter_map(|id| {
                let ty = self.node_types.get(&id)?;
                let info = self.nodes.get(&id)?;
                Some((info.location.line, info.location.column, id, info.kind, ty))
            })
            .collect();
        rows.sort_by_key(|&(line, column, id, ..)| (line, column, id));
        out.extend(
            rows.into_iter()
                .map(|(line, column, _, kind, ty)| format!("{line}:{column} {kind} : {ty}")),
        );
    }
}

/// Configured inference over one host program.
///
/// # Example
/// ```
/// use shape_infer::lattice::{known_shape, DType};
/// use shape_infer::syntax::parse_function;
/// use shape_infer::{Inferencer, InferenceConfig, Program, Type};
///
/// let def = parse_function("def f(x):\n    return x + 1\n").unwrap();
/// let program = Program::new();
/// let x = Type::ndarray(DType::Int64, known_shape(&[3, 4]));
///
/// let result = Inferencer::new(&program)
///     .with_config(InferenceConfig::default().with_loop_passes(3))
///     .infer(&def, &[x.clone()], None)
///     .unwrap();
/// assert_eq!(result.return_type(), Some(&x));
/// assert!(result.diagnostics.is_empty());
/// ```
pub struct Inferencer<'a> {
    host: &'a dyn Host,
    rules: &'a TransferFunctions,
    config: InferenceConfig,
}

impl fmt::Debug for Inferencer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inferencer")
            .field("rules", &self.rules.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Inferencer<'a> {
    /// Inferencer with the shipped rules and default settings.
    pub fn new(host: &'a dyn Host) -> Self {
        Self {
            host,
            rules: &DEFAULT_RULES,
            config: InferenceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rules(mut self, rules: &'a TransferFunctions) -> Self {
        self.rules = rules;
        self
    }

    /// Infers `def` called with arguments of the given types.
    ///
    /// Type variables in `args` may be shared between arguments; the run
    /// allocates its own variables above the highest one they use.
    pub fn infer(
        &self,
        def: &FunctionDef,
        args: &[Type],
        hints: Option<&TypeHints>,
    ) -> InferResult<InferenceResult> {
        let mut session = Session::new(def, self.host, self.rules, self.config.clone());
        for arg in args {
            session.subst.reserve(arg);
        }
        run(session, def, args.to_vec(), hints)
    }

    /// Infers `def` called with the given values.
    pub fn infer_values(
        &self,
        def: &FunctionDef,
        args: &[Value],
        hints: Option<&TypeHints>,
    ) -> InferResult<InferenceResult> {
        let mut session = Session::new(def, self.host, self.rules, self.config.clone());
        let args = args
            .iter()
            .map(|value| type_of_value(&mut session.subst, value))
            .collect();
        run(session, def, args, hints)
    }
}

fn run(
    mut session: Session<'_>,
    def: &FunctionDef,
    args: Vec<Type>,
    hints: Option<&TypeHints>,
) -> InferResult<InferenceResult> {
    let params = bind_arguments(def, args, &[], &mut session.subst).map_err(|error| match error {
        ArgumentError::Mismatch(message) => InferenceError::usage(message, def.span),
        ArgumentError::NonConstantDefault { param, span } => InferenceError::usage(
            format!("default value of parameter '{param}' is not a literal"),
            span,
        ),
    })?;
    let no_hints = TypeHints::new();
    let hints = hints.unwrap_or(&no_hints);

    let module = session.host.main_module();
    let mut engine = InferenceEngine::new(&mut session, module);
    let function_type = engine.infer_function(def, params, hints)?;
    let (node_types, inlined, _) = engine.into_parts();
    let (nodes, subst, diagnostics) = session.finish();
    tracing::debug!(
        function = %def.name,
        nodes = node_types.len(),
        inlined = inlined.len(),
        diagnostics = diagnostics.len(),
        "inference finished"
    );

    let node_types = node_types
        .into_iter()
        .map(|(id, ty)| (id, subst.resolve(&ty)))
        .collect();
    let inlined = inlined
        .into_iter()
        .map(|(site, calls)| {
            let calls = calls
                .into_iter()
                .map(|call| InlinedCall {
                    function_type: subst.resolve(&call.function_type),
                    ..call
                })
                .collect();
            (site, calls)
        })
        .collect();
    Ok(InferenceResult {
        node_types,
        inlined,
        function_type: subst.resolve(&function_type),
        diagnostics,
        nodes,
    })
}

/// Infers `def` called with arguments of the given types.
pub fn infer_function(
    def: &FunctionDef,
    args: &[Type],
    hints: Option<&TypeHints>,
    host: &dyn Host,
    config: InferenceConfig,
) -> InferResult<InferenceResult> {
    Inferencer::new(host).with_config(config).infer(def, args, hints)
}

/// Infers `def` called with the given argument values.
pub fn infer_function_value_args(
    def: &FunctionDef,
    args: &[Value],
    hints: Option<&TypeHints>,
    host: &dyn Host,
    config: InferenceConfig,
) -> InferResult<InferenceResult> {
    Inferencer::new(host).with_config(config).infer_values(def, args, hints)
}
