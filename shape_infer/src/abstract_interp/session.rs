//! State shared by every engine of one inference run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use shape_infer_syntax::visit::for_each_node;
use shape_infer_syntax::{parse_function, FunctionDef, NodeId, NodeIdGen, ParseError, Span};

use crate::config::InferenceConfig;
use crate::diagnostics::{Diagnostic, DiagnosticReason, DiagnosticsCollector};
use crate::error::Location;
use crate::host::{FunctionId, Host};
use crate::lattice::{Substitution, Type};
use crate::tfuncs::TransferFunctions;

/// Kind name and source position of a syntax node, for rendering results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub kind: &'static str,
    pub location: Location,
}

/// Run-wide state: the type-variable store, the node id allocator for
/// inlined trees, parsed callee sources and collected diagnostics.
///
/// Engines for branches, loop passes and inlined callees all borrow the same
/// session, so a variable bound anywhere is visible everywhere.
pub struct Session<'a> {
    pub host: &'a dyn Host,
    pub rules: &'a TransferFunctions,
    pub config: InferenceConfig,
    pub subst: Substitution,
    pub diagnostics: DiagnosticsCollector,
    /// Current inlining depth.
    pub depth: usize,
    ids: NodeIdGen,
    parsed: HashMap<FunctionId, Rc<FunctionDef>>,
    nodes: BTreeMap<NodeId, NodeInfo>,
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("vars", &self.subst.len())
            .field("diagnostics", &self.diagnostics.len())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'a> Session<'a> {
    /// Session for analyzing `root`; inlined trees are numbered after it.
    pub fn new(
        root: &FunctionDef,
        host: &'a dyn Host,
        rules: &'a TransferFunctions,
        config: InferenceConfig,
    ) -> Self {
        let next_id = shape_infer_syntax::visit::max_node_id(root).0 + 1;
        let mut session = Self {
            host,
            rules,
            config,
            subst: Substitution::new(),
            diagnostics: DiagnosticsCollector::new(),
            depth: 0,
            ids: NodeIdGen::starting_at(next_id),
            parsed: HashMap::new(),
            nodes: BTreeMap::new(),
        };
        session.describe(root);
        session
    }

    pub fn fresh(&mut self) -> Type {
        self.subst.fresh_var()
    }

    /// Report why inference fell back at a node and hand out the fallback.
    pub fn recover(&mut self, reason: DiagnosticReason, span: &Span, context: &str) -> Type {
        self.warn(reason, span, context);
        self.subst.fresh_var()
    }

    pub fn warn(&mut self, reason: DiagnosticReason, span: &Span, context: &str) {
        self.diagnostics.emit(
            Diagnostic::new(reason)
                .with_location(span)
                .with_context(context),
        );
    }

    /// A private copy of `function`'s tree with ids unique in this run.
    ///
    /// Sources are parsed once per function; every call site gets its own
    /// renumbered clone so node types of different call sites stay apart.
    pub fn instantiate(&mut self, function: FunctionId) -> Result<Option<FunctionDef>, ParseError> {
        let template = match self.parsed.get(&function) {
            Some(tree) => Rc::clone(tree),
            None => {
                let Some(source) = self.host.function_source(function) else {
                    return Ok(None);
                };
                let tree = Rc::new(parse_function(source)?);
                self.parsed.insert(function, Rc::clone(&tree));
                tree
            }
        };
        let mut tree = (*template).clone();
        shape_infer_syntax::visit::renumber(&mut tree, &mut self.ids);
        self.describe(&tree);
        Ok(Some(tree))
    }

    fn describe(&mut self, tree: &FunctionDef) {
        let nodes = &mut self.nodes;
        for_each_node(tree, &mut |id, kind, span| {
            nodes.insert(
                id,
                NodeInfo {
                    kind,
                    location: Location::from(span),
                },
            );
        });
    }

    /// Ends the run: node positions of the analyzed function and every
    /// inlined callee, the final store and the diagnostics.
    pub fn finish(self) -> (BTreeMap<NodeId, NodeInfo>, Substitution, Vec<Diagnostic>) {
        let Session {
            nodes,
            subst,
            mut diagnostics,
            ..
        } = self;
        (nodes, subst, diagnostics.take())
    }
}
