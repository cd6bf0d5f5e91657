// Two-phase graph construction.
//
// Phase 1 creates and structurally initializes nodes; phase 2 walks
// executable content and registers usage edges. Phase 2 never mutates the
// graph while walking: each node's body is reduced to a list of [`RefOp`]s
// which are applied through a single serial queue. The parallel builder
// reuses the same collectors.

use super::{masks, GraphEvent, NodeId, RefGraph, RefKind};
use crate::model::{Arg, BodyOp, DeclId, DeclRef, ProgramModel, ReturnExpr, TypeName};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Graph build was cancelled")]
    Cancelled,
}

/// Cooperative cancellation shared between the driver and a build in
/// progress. The build stops between nodes, leaving a valid partial graph.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// One deferred graph mutation produced by walking a body
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RefOp {
    Edge {
        from: NodeId,
        to: NodeId,
        via_initializer_write: bool,
    },
    FieldRead {
        field: NodeId,
    },
    FieldWrite {
        field: NodeId,
        inside_initializer: bool,
    },
    TypeReference {
        class: NodeId,
        from: NodeId,
    },
    InstanceReference {
        class: NodeId,
        from: NodeId,
    },
    CalledOnSubclass {
        method: NodeId,
    },
    SetReturnValueUsed {
        method: NodeId,
    },
    SetBodyEmpty {
        method: NodeId,
    },
    SetOnlyCallsSuper {
        method: NodeId,
    },
    UpdateReturnTemplate {
        method: NodeId,
        observed: Option<String>,
    },
    UpdateParamValues {
        method: NodeId,
        args: Vec<Arg>,
    },
    RemoveUnthrown {
        method: NodeId,
        escaped: TypeName,
    },
}

fn resolve(graph: &RefGraph, target: &DeclRef) -> Option<NodeId> {
    target.declared().and_then(|decl| graph.reference(decl))
}

/// Reduce one body-op sequence to deferred mutations. `enclosing_method` is
/// set when the ops belong to a method body; class and field initializers
/// pass None and attribute usages to the class or field node itself.
fn collect_body(
    graph: &RefGraph,
    model: &ProgramModel,
    from: NodeId,
    enclosing_method: Option<(NodeId, DeclId)>,
    inside_initializer: bool,
    ops: &[BodyOp],
    out: &mut Vec<RefOp>,
) {
    for op in ops {
        match op {
            BodyOp::Call {
                target,
                args,
                on_subclass,
                result_used,
            } => {
                let Some(callee) = resolve(graph, target) else {
                    continue;
                };
                out.push(RefOp::Edge {
                    from,
                    to: callee,
                    via_initializer_write: false,
                });
                out.push(RefOp::UpdateParamValues {
                    method: callee,
                    args: args.clone(),
                });
                if *on_subclass {
                    out.push(RefOp::CalledOnSubclass { method: callee });
                }
                if *result_used {
                    out.push(RefOp::SetReturnValueUsed { method: callee });
                }
            }
            BodyOp::Read { target } => {
                let Some(field) = resolve(graph, target) else {
                    continue;
                };
                out.push(RefOp::Edge {
                    from,
                    to: field,
                    via_initializer_write: false,
                });
                out.push(RefOp::FieldRead { field });
            }
            BodyOp::Write { target } => {
                let Some(field) = resolve(graph, target) else {
                    continue;
                };
                out.push(RefOp::Edge {
                    from,
                    to: field,
                    via_initializer_write: inside_initializer,
                });
                out.push(RefOp::FieldWrite {
                    field,
                    inside_initializer,
                });
            }
            BodyOp::Instantiate { ctor } => {
                let Some(ctor_node) = resolve(graph, ctor) else {
                    continue;
                };
                out.push(RefOp::Edge {
                    from,
                    to: ctor_node,
                    via_initializer_write: false,
                });
                if let Some(class) = graph.node(ctor_node).and_then(|n| n.owner()) {
                    out.push(RefOp::InstanceReference { class, from });
                }
            }
            BodyOp::TypeUse { class } => {
                let Some(class_node) = resolve(graph, class) else {
                    continue;
                };
                out.push(RefOp::Edge {
                    from,
                    to: class_node,
                    via_initializer_write: false,
                });
                out.push(RefOp::TypeReference {
                    class: class_node,
                    from,
                });
            }
            BodyOp::ReadParam { index } => {
                let Some((method_node, _)) = enclosing_method else {
                    continue;
                };
                let params = graph.method_parameters(method_node);
                if let Some(&param) = params
                    .iter()
                    .find(|&&p| graph.parameter_index(p) == Some(*index))
                {
                    out.push(RefOp::Edge {
                        from: method_node,
                        to: param,
                        via_initializer_write: false,
                    });
                }
            }
            BodyOp::Escapes { exception } => {
                if let Some((method_node, _)) = enclosing_method {
                    out.push(RefOp::RemoveUnthrown {
                        method: method_node,
                        escaped: exception.clone(),
                    });
                }
            }
            BodyOp::Return { value } => {
                let Some((method_node, method_decl)) = enclosing_method else {
                    continue;
                };
                match value {
                    // `return super.m(...)` carries no evidence of its own
                    ReturnExpr::SuperCall => {}
                    ReturnExpr::Literal(text) => out.push(RefOp::UpdateReturnTemplate {
                        method: method_node,
                        observed: Some(text.clone()),
                    }),
                    ReturnExpr::FieldRef(field_decl) => out.push(RefOp::UpdateReturnTemplate {
                        method: method_node,
                        observed: constant_field_value(model, method_decl, *field_decl),
                    }),
                    ReturnExpr::Unknown => out.push(RefOp::UpdateReturnTemplate {
                        method: method_node,
                        observed: None,
                    }),
                }
            }
            BodyOp::ExplicitCtorCall { target } => {
                if let Some(ctor_node) = resolve(graph, target) {
                    out.push(RefOp::Edge {
                        from,
                        to: ctor_node,
                        via_initializer_write: false,
                    });
                }
            }
        }
    }
}

/// A returned field reference counts as a constant only when the field is
/// a static final at least as visible as the returning method.
fn constant_field_value(
    model: &ProgramModel,
    method_decl: DeclId,
    field_decl: DeclId,
) -> Option<String> {
    let field = model.get(field_decl)?;
    let method = model.get(method_decl)?;
    if !field.modifiers.is_static || !field.modifiers.is_final {
        return None;
    }
    if !field
        .modifiers
        .visibility
        .is_at_least(method.modifiers.visibility)
    {
        return None;
    }
    let owner = model.owner_class_of(field_decl)?;
    let owner_fqn = &model.get(owner)?.as_class()?.qualified_name;
    Some(format!("{}.{}", owner_fqn, field.name))
}

/// Phase-2 collection for one node. Pure: reads the graph and the model,
/// mutates neither.
pub(crate) fn collect_node_ops(graph: &RefGraph, model: &ProgramModel, id: NodeId) -> Vec<RefOp> {
    let Some(node) = graph.node(id) else {
        return Vec::new();
    };
    let mut ops = Vec::new();
    match node.kind() {
        RefKind::Class => collect_class_ops(graph, model, id, &mut ops),
        RefKind::Method => collect_method_ops(graph, model, id, &mut ops),
        RefKind::Field => collect_field_ops(graph, model, id, &mut ops),
        RefKind::Package | RefKind::Parameter => {}
    }
    ops
}

fn collect_class_ops(graph: &RefGraph, model: &ProgramModel, id: NodeId, out: &mut Vec<RefOp>) {
    let Some(decl) = graph.node(id).and_then(|n| n.decl()) else {
        return;
    };
    let Some(class) = model.get(decl).and_then(|d| d.as_class()) else {
        return;
    };
    for block in &class.initializers {
        collect_body(graph, model, id, None, true, block, out);
    }
    // An implicit default constructor chains to each base's default
    // constructor, exactly like an empty declared constructor would.
    if let Some(ctor) = graph.class_default_constructor(id) {
        if graph.node(ctor).map(|n| n.decl().is_none()).unwrap_or(false) {
            for base in graph.class_bases(id) {
                if let Some(base_ctor) = graph.class_default_constructor(base) {
                    out.push(RefOp::Edge {
                        from: ctor,
                        to: base_ctor,
                        via_initializer_write: false,
                    });
                }
            }
        }
    }
}

fn collect_method_ops(graph: &RefGraph, model: &ProgramModel, id: NodeId, out: &mut Vec<RefOp>) {
    let Some(decl) = graph.node(id).and_then(|n| n.decl()) else {
        return;
    };
    let Some(declaration) = model.get(decl) else {
        return;
    };
    let Some(method) = declaration.as_method() else {
        return;
    };

    match &method.body {
        None => {
            // Abstract and native methods keep their behavior elsewhere;
            // anything else without a body is genuinely empty.
            if !declaration.modifiers.is_abstract && !declaration.modifiers.is_native {
                out.push(RefOp::SetBodyEmpty { method: id });
            }
        }
        Some(ops) if ops.is_empty() => {
            if !method.is_constructor {
                out.push(RefOp::SetBodyEmpty { method: id });
            }
        }
        Some(ops) => {
            if only_calls_super(method, ops) {
                out.push(RefOp::SetOnlyCallsSuper { method: id });
                out.push(RefOp::SetBodyEmpty { method: id });
            }
            collect_body(
                graph,
                model,
                id,
                Some((id, decl)),
                method.is_constructor,
                ops,
                out,
            );
        }
    }

    // A constructor without an explicit super()/this() call implicitly
    // invokes the default constructor of every base class.
    if method.is_constructor {
        let explicit = method
            .body
            .as_ref()
            .map(|ops| {
                ops.iter()
                    .any(|op| matches!(op, BodyOp::ExplicitCtorCall { .. }))
            })
            .unwrap_or(false);
        if !explicit {
            if let Some(owner) = graph.node(id).and_then(|n| n.owner()) {
                for base in graph.class_bases(owner) {
                    if let Some(base_ctor) = graph.class_default_constructor(base) {
                        out.push(RefOp::Edge {
                            from: id,
                            to: base_ctor,
                            via_initializer_write: false,
                        });
                    }
                }
            }
        }
    }
}

/// A redundant override: the body does nothing except delegate to the
/// overridden method.
fn only_calls_super(method: &crate::model::MethodDecl, ops: &[BodyOp]) -> bool {
    if ops.is_empty() || method.overrides.is_empty() {
        return false;
    }
    let super_decls: Vec<DeclId> = method
        .overrides
        .iter()
        .filter_map(|o| o.declared())
        .collect();
    ops.iter().all(|op| match op {
        BodyOp::Call { target, .. } => target
            .declared()
            .map(|d| super_decls.contains(&d))
            .unwrap_or(false),
        BodyOp::Return { value } => matches!(value, ReturnExpr::SuperCall),
        _ => false,
    })
}

fn collect_field_ops(graph: &RefGraph, model: &ProgramModel, id: NodeId, out: &mut Vec<RefOp>) {
    let Some(decl) = graph.node(id).and_then(|n| n.decl()) else {
        return;
    };
    let Some(field) = model.get(decl).and_then(|d| d.as_field()) else {
        return;
    };
    if let Some(initializer) = &field.initializer {
        out.push(RefOp::FieldWrite {
            field: id,
            inside_initializer: true,
        });
        collect_body(graph, model, id, None, true, initializer, out);
    }
}

impl RefGraph {
    /// Apply a batch of deferred mutations. This is the single serial
    /// mutation queue; both builders funnel their collected ops through it.
    pub(crate) fn apply_ops(&mut self, model: &ProgramModel, ops: Vec<RefOp>) {
        for op in ops {
            match op {
                RefOp::Edge {
                    from,
                    to,
                    via_initializer_write,
                } => self.add_usage_edge(from, to, via_initializer_write),
                RefOp::FieldRead { field } => self.mark_field_read(field),
                RefOp::FieldWrite {
                    field,
                    inside_initializer,
                } => self.mark_field_write(field, inside_initializer),
                RefOp::TypeReference { class, from } => {
                    if let Some(data) = self.node_mut(class).and_then(|n| n.class_data_mut()) {
                        data.in_type_references.insert(from);
                    }
                }
                RefOp::InstanceReference { class, from } => {
                    if let Some(data) = self.node_mut(class).and_then(|n| n.class_data_mut()) {
                        data.instance_references.insert(from);
                    }
                }
                RefOp::CalledOnSubclass { method } => {
                    if let Some(node) = self.node_mut(method) {
                        node.set_flag(true, masks::METHOD_CALLED_ON_SUBCLASS);
                    }
                }
                RefOp::SetReturnValueUsed { method } => {
                    if let Some(node) = self.node_mut(method) {
                        node.set_flag(true, masks::METHOD_RETURN_VALUE_USED);
                    }
                }
                RefOp::SetBodyEmpty { method } => {
                    if let Some(node) = self.node_mut(method) {
                        node.set_flag(true, masks::METHOD_BODY_EMPTY);
                    }
                }
                RefOp::SetOnlyCallsSuper { method } => {
                    if let Some(node) = self.node_mut(method) {
                        node.set_flag(true, masks::METHOD_ONLY_CALLS_SUPER);
                    }
                }
                RefOp::UpdateReturnTemplate { method, observed } => {
                    self.update_return_template(method, observed)
                }
                RefOp::UpdateParamValues { method, args } => {
                    self.update_parameter_values(method, &args)
                }
                RefOp::RemoveUnthrown { method, escaped } => {
                    self.remove_unthrown_exception(model, method, &escaped)
                }
            }
        }
    }

    /// Run phase 2 for one node if it has not run yet. Fires the
    /// references-built event exactly once.
    pub fn build_node_references(&mut self, model: &ProgramModel, id: NodeId) {
        let already = self
            .node(id)
            .map(|n| n.check_flag(masks::IS_BUILT))
            .unwrap_or(true);
        if already {
            return;
        }
        let ops = collect_node_ops(self, model, id);
        self.apply_ops(model, ops);
        if let Some(node) = self.node_mut(id) {
            node.set_flag(true, masks::IS_BUILT);
        }
        self.fire(GraphEvent::ReferencesBuilt { node: id });
    }
}

/// Sequential whole-program builder
pub struct GraphBuilder<'a> {
    model: &'a ProgramModel,
    cancel: CancellationToken,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(model: &'a ProgramModel) -> Self {
        Self {
            model,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Build the whole graph: phase 1 over every in-scope class, override
    /// root caching, then phase 2 over every node.
    pub fn build(&self, graph: &mut RefGraph) -> Result<(), BuildError> {
        info!(declarations = self.model.len(), "building reference graph");

        for (decl, _, class) in self.model.classes() {
            if self.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            debug!(class = %class.qualified_name, "phase 1");
            graph.get_or_create_reference(self.model, decl);
        }

        graph.cache_override_roots();

        for id in graph.node_ids() {
            if self.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            graph.build_node_references(self.model, id);
        }

        #[cfg(debug_assertions)]
        graph.assert_edge_invariants();

        info!(nodes = graph.node_count(), "reference graph complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::SessionConfig;
    use super::*;
    use crate::model::{ModelBuilder, TypeName, Visibility};

    fn build(model: &ProgramModel) -> RefGraph {
        let mut graph = RefGraph::new(SessionConfig::default());
        GraphBuilder::new(model)
            .build(&mut graph)
            .expect("build succeeds");
        graph
    }

    #[test]
    fn test_call_registers_edge_and_marks_callee_used() {
        let mut mb = ModelBuilder::new();
        let mut lib = mb.class("a.Lib");
        let helper = lib.method("helper").static_method().done();
        let mut app = mb.class("a.App");
        app.method("main")
            .static_method()
            .param("java.lang.String[]")
            .body(vec![BodyOp::Call {
                target: DeclRef::Declared(helper),
                args: vec![],
                on_subclass: false,
                result_used: false,
            }])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        let helper_node = graph.reference(helper).unwrap();
        assert!(graph.method_is_referenced(helper_node));
        assert!(!graph.is_suspicious(helper_node));
    }

    #[test]
    fn test_constructor_without_explicit_call_chains_to_base_default_ctor() {
        let mut mb = ModelBuilder::new();
        let base = mb.class("a.Base").id();
        let mut leaf = mb.class("a.Leaf").extends(base);
        let leaf_ctor = leaf.method("Leaf").constructor().body(vec![]).done();
        let model = mb.finish();

        let graph = build(&model);
        let base_ctor = graph
            .class_default_constructor(graph.reference(base).unwrap())
            .unwrap();
        let ctor_node = graph.reference(leaf_ctor).unwrap();
        assert!(graph.out_references(ctor_node).contains(&base_ctor));
        assert!(graph.in_references(base_ctor).contains(&ctor_node));
    }

    #[test]
    fn test_explicit_ctor_call_suppresses_implicit_chain() {
        let mut mb = ModelBuilder::new();
        let mut base = mb.class("a.Base");
        let base_ctor = base.method("Base").constructor().param("int").done();
        let base_id = base.id();
        let mut leaf = mb.class("a.Leaf").extends(base_id);
        let leaf_ctor = leaf
            .method("Leaf")
            .constructor()
            .body(vec![BodyOp::ExplicitCtorCall {
                target: DeclRef::Declared(base_ctor),
            }])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        let ctor_node = graph.reference(leaf_ctor).unwrap();
        let base_ctor_node = graph.reference(base_ctor).unwrap();
        assert!(graph.out_references(ctor_node).contains(&base_ctor_node));
        // The base has no default constructor and none was invented
        assert!(graph
            .class_default_constructor(graph.reference(base_id).unwrap())
            .is_none());
    }

    #[test]
    fn test_escaping_exception_clears_unthrown_entry() {
        let mut mb = ModelBuilder::new();
        let mut class = mb.class("a.Service");
        let load = class
            .method("load")
            .throws(TypeName::external("java.io.IOException"))
            .body(vec![BodyOp::Escapes {
                exception: TypeName::external("java.io.IOException"),
            }])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        let node = graph.reference(load).unwrap();
        assert!(graph.method_unthrown_exceptions(node).unwrap().is_empty());
    }

    #[test]
    fn test_redundant_override_detected() {
        let mut mb = ModelBuilder::new();
        let mut base = mb.class("a.Base");
        let base_close = base.method("close").done();
        let mut leaf = mb.class("a.Leaf");
        let close = leaf
            .method("close")
            .overrides(base_close)
            .body(vec![BodyOp::Call {
                target: DeclRef::Declared(base_close),
                args: vec![],
                on_subclass: false,
                result_used: false,
            }])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        let node = graph.reference(close).unwrap();
        assert!(graph.only_calls_super(node));
        assert!(graph.is_body_empty(node));
    }

    #[test]
    fn test_field_write_in_constructor_counts_as_initializer_write() {
        let mut mb = ModelBuilder::new();
        let mut class = mb.class("a.Holder");
        let field = class.field("state").done();
        class
            .method("Holder")
            .constructor()
            .body(vec![BodyOp::Write {
                target: DeclRef::Declared(field),
            }])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        let node = graph.reference(field).unwrap();
        assert!(graph.is_used_for_writing(node));
        assert!(graph.is_assigned_only_in_initializer(node));
    }

    #[test]
    fn test_cancellation_stops_build() {
        let mut mb = ModelBuilder::new();
        mb.class("a.One");
        mb.class("a.Two");
        let model = mb.finish();

        let token = CancellationToken::new();
        token.cancel();
        let mut graph = RefGraph::new(SessionConfig::default());
        let result = GraphBuilder::new(&model)
            .with_cancellation(token)
            .build(&mut graph);
        assert_eq!(result, Err(BuildError::Cancelled));
    }

    #[test]
    fn test_constant_return_collapses_on_disagreement() {
        let mut mb = ModelBuilder::new();
        let mut class = mb.class("a.Const");
        let stable = class
            .method("one")
            .returns(TypeName::external("int"))
            .body(vec![BodyOp::Return {
                value: ReturnExpr::Literal("1".to_string()),
            }])
            .done();
        let varying = class
            .method("flip")
            .returns(TypeName::external("int"))
            .body(vec![
                BodyOp::Return {
                    value: ReturnExpr::Literal("1".to_string()),
                },
                BodyOp::Return {
                    value: ReturnExpr::Literal("2".to_string()),
                },
            ])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        assert_eq!(
            graph
                .method_constant_return(graph.reference(stable).unwrap())
                .as_deref(),
            Some("1")
        );
        assert_eq!(
            graph.method_constant_return(graph.reference(varying).unwrap()),
            None
        );
    }

    #[test]
    fn test_constant_parameter_value_across_call_sites() {
        let mut mb = ModelBuilder::new();
        let mut lib = mb.class("a.Lib");
        let log = lib
            .method("log")
            .static_method()
            .param("java.lang.String")
            .done();
        let mut app = mb.class("a.App");
        app.method("run")
            .body(vec![
                BodyOp::Call {
                    target: DeclRef::Declared(log),
                    args: vec![Arg::Literal("\"start\"".to_string())],
                    on_subclass: false,
                    result_used: false,
                },
                BodyOp::Call {
                    target: DeclRef::Declared(log),
                    args: vec![Arg::Literal("\"start\"".to_string())],
                    on_subclass: false,
                    result_used: false,
                },
            ])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        let log_node = graph.reference(log).unwrap();
        let param = graph.method_parameters(log_node)[0];
        assert_eq!(
            graph.parameter_constant_value(param).as_deref(),
            Some("\"start\"")
        );
    }

    #[test]
    fn test_visibility_gates_field_ref_return_template() {
        let mut mb = ModelBuilder::new();
        let mut class = mb.class("a.Config");
        let constant = class
            .field("LIMIT")
            .static_field()
            .final_field()
            .visibility(Visibility::Private)
            .done();
        let getter = class
            .method("limit")
            .returns(TypeName::external("int"))
            .body(vec![BodyOp::Return {
                value: ReturnExpr::FieldRef(constant),
            }])
            .done();
        let model = mb.finish();

        let graph = build(&model);
        // A private field returned from a public method cannot stand in for
        // the call result, so it never becomes the template.
        assert_eq!(
            graph.method_constant_return(graph.reference(getter).unwrap()),
            None
        );
    }
}
