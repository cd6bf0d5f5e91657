//! Reference graph integration tests
//!
//! These tests exercise graph construction end to end: building from a
//! model, edge symmetry, node removal, and name round trips.

use refgraph::config::Config;
use refgraph::graph::{GraphBuilder, ParallelGraphBuilder, RefGraph, RefKind, SessionConfig};
use refgraph::model::{Arg, BodyOp, DeclRef, ModelBuilder, ProgramModel, Visibility};

fn build(model: &ProgramModel) -> RefGraph {
    let session = SessionConfig::from_config(&Config::default()).unwrap();
    let mut graph = RefGraph::new(session);
    GraphBuilder::new(model).build(&mut graph).unwrap();
    graph
}

/// Every out edge must have a matching in edge and vice versa.
fn assert_edges_symmetric(graph: &RefGraph) {
    for id in graph.node_ids() {
        for out in graph.out_references(id) {
            assert!(
                graph.in_references(out).contains(&id),
                "missing reverse edge for {:?} -> {:?}",
                id,
                out
            );
        }
        for from in graph.in_references(id) {
            assert!(
                graph.out_references(from).contains(&id),
                "missing forward edge for {:?} -> {:?}",
                from,
                id
            );
        }
    }
}

fn sample_model() -> ProgramModel {
    let mut mb = ModelBuilder::new();
    let mut util = mb.class("com.example.Util");
    let helper = util
        .method("helper")
        .static_method()
        .body(vec![])
        .done();
    let mut app = mb.class("com.example.App");
    let counter = app.field("counter").done();
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![
            BodyOp::Call {
                target: DeclRef::Declared(helper),
                args: vec![],
                on_subclass: false,
                result_used: false,
            },
            BodyOp::Write {
                target: DeclRef::Declared(counter),
            },
            BodyOp::Read {
                target: DeclRef::Declared(counter),
            },
        ])
        .done();
    mb.finish()
}

#[test]
fn test_build_produces_symmetric_edges() {
    let model = sample_model();
    let graph = build(&model);

    assert_edges_symmetric(&graph);
}

#[test]
fn test_build_is_idempotent() {
    let model = sample_model();
    let session = SessionConfig::from_config(&Config::default()).unwrap();
    let mut graph = RefGraph::new(session);

    GraphBuilder::new(&model).build(&mut graph).unwrap();
    let count = graph.node_count();
    let edges: Vec<_> = graph
        .node_ids()
        .iter()
        .map(|&id| graph.in_references(id).len())
        .collect();

    // A second build over the same graph must not duplicate anything
    GraphBuilder::new(&model).build(&mut graph).unwrap();
    assert_eq!(graph.node_count(), count);
    let edges_after: Vec<_> = graph
        .node_ids()
        .iter()
        .map(|&id| graph.in_references(id).len())
        .collect();
    assert_eq!(edges, edges_after);
}

#[test]
fn test_remove_class_removes_members_and_edges() {
    let mut mb = ModelBuilder::new();
    let mut victim = mb.class("com.example.Victim");
    let shout = victim.method("shout").done();
    let victim_id = victim.id();
    let mut caller = mb.class("com.example.Caller");
    let call = caller
        .method("call")
        .body(vec![BodyOp::Call {
            target: DeclRef::Declared(shout),
            args: vec![],
            on_subclass: false,
            result_used: false,
        }])
        .done();
    let model = mb.finish();

    let mut graph = build(&model);
    let victim_node = graph.reference(victim_id).unwrap();
    let shout_node = graph.reference(shout).unwrap();
    let call_node = graph.reference(call).unwrap();
    assert!(graph.out_references(call_node).contains(&shout_node));

    graph.remove_node(victim_node);

    // The class and its members are gone, and no edge dangles
    assert!(graph.node(victim_node).is_none());
    assert!(graph.node(shout_node).is_none());
    assert!(graph.reference(shout).is_none());
    assert!(!graph.out_references(call_node).contains(&shout_node));
    assert_edges_symmetric(&graph);
}

#[test]
fn test_remove_subclass_unlinks_hierarchy() {
    let mut mb = ModelBuilder::new();
    let base = mb.class("com.example.Base").id();
    let derived = mb.class("com.example.Derived").extends(base).id();
    let model = mb.finish();

    let mut graph = build(&model);
    let base_node = graph.reference(base).unwrap();
    let derived_node = graph.reference(derived).unwrap();
    assert_eq!(graph.class_subclasses(base_node), vec![derived_node]);

    graph.remove_node(derived_node);
    assert!(graph.class_subclasses(base_node).is_empty());
    assert_edges_symmetric(&graph);
}

#[test]
fn test_implicit_constructor_synthesized_and_chained() {
    let mut mb = ModelBuilder::new();
    let base = mb.class("com.example.Base").id();
    let derived = mb.class("com.example.Derived").extends(base).id();
    let model = mb.finish();

    let graph = build(&model);
    let base_node = graph.reference(base).unwrap();
    let derived_node = graph.reference(derived).unwrap();

    // Both classes get a synthesized default constructor
    let base_ctor = graph.class_default_constructor(base_node).unwrap();
    let derived_ctor = graph.class_default_constructor(derived_node).unwrap();
    assert_eq!(graph.node(base_ctor).unwrap().kind(), RefKind::Method);

    // The derived implicit constructor chains to the base one
    assert!(graph.out_references(derived_ctor).contains(&base_ctor));
    assert!(graph.is_referenced(base_ctor));
}

#[test]
fn test_declared_noarg_constructor_is_default_and_chained() {
    let mut mb = ModelBuilder::new();
    let mut base = mb.class("com.example.Base");
    let base_ctor = base.method("Base").constructor().body(vec![]).done();
    let base_id = base.id();
    let derived = mb.class("com.example.Derived").extends(base_id).id();
    let model = mb.finish();

    let graph = build(&model);
    let base_node = graph.reference(base_id).unwrap();
    let base_ctor_node = graph.reference(base_ctor).unwrap();
    let derived_node = graph.reference(derived).unwrap();

    // A declared zero-argument constructor is the default constructor
    assert_eq!(
        graph.class_default_constructor(base_node),
        Some(base_ctor_node)
    );

    // The derived implicit constructor chains to it
    let derived_ctor = graph.class_default_constructor(derived_node).unwrap();
    assert!(graph.out_references(derived_ctor).contains(&base_ctor_node));
    assert!(graph.is_referenced(base_ctor_node));
}

#[test]
fn test_unused_class_with_implicit_constructor_is_suspicious() {
    let mut mb = ModelBuilder::new();
    let ghost = mb.class("com.example.Ghost").id();
    let used = mb.class("com.example.Used").id();
    let mut app = mb.class("com.example.App");
    app.method("run")
        .body(vec![BodyOp::TypeUse {
            class: DeclRef::Declared(used),
        }])
        .done();
    let model = mb.finish();

    let graph = build(&model);
    let ghost_node = graph.reference(ghost).unwrap();
    let used_node = graph.reference(used).unwrap();

    // The implicit constructor's self-edge does not keep the class alive
    assert!(graph.is_suspicious(ghost_node));
    assert!(!graph.is_suspicious(used_node));
}

#[test]
fn test_interface_with_implementor_not_suspicious() {
    let mut mb = ModelBuilder::new();
    let mut iface_builder = mb.class("com.example.Shape").interface();
    let area = iface_builder.method("area").abstract_method().done();
    let iface = iface_builder.id();

    let mut circle = mb.class("com.example.Circle").extends(iface);
    let circle_area = circle.method("area").overrides(area).body(vec![]).done();
    let mut app = mb.class("com.example.App");
    app.method("draw")
        .body(vec![BodyOp::Call {
            target: DeclRef::Declared(area),
            args: vec![],
            on_subclass: true,
            result_used: false,
        }])
        .done();
    let model = mb.finish();

    let graph = build(&model);
    let iface_node = graph.reference(iface).unwrap();
    let area_node = graph.reference(area).unwrap();
    let circle_area_node = graph.reference(circle_area).unwrap();

    assert!(graph.is_interface(iface_node));
    // An interface with implementors is kept even without direct references
    assert!(!graph.is_suspicious(iface_node));
    // The interface method has a real caller; the override registration
    // alone would not count.
    assert!(!graph.is_suspicious(area_node));
    assert!(graph.is_called_on_subclass(area_node));
    assert!(graph.method_super_methods(circle_area_node).contains(&area_node));
}

#[test]
fn test_library_override_marks_method() {
    let mut mb = ModelBuilder::new();
    let mut class = mb.class("com.example.Point");
    let to_string = class
        .method("toString")
        .overrides_external("java.lang.Object java.lang.String toString()")
        .body(vec![])
        .done();
    let model = mb.finish();

    let graph = build(&model);
    let node = graph.reference(to_string).unwrap();
    assert!(graph.is_external_override(node));
    assert!(!graph.is_suspicious(node));
}

#[test]
fn test_external_name_round_trip() {
    let mut mb = ModelBuilder::new();
    let mut class = mb.class("com.example.App");
    let run = class.method("run").param("int").done();
    let count = class.field("count").done();
    let class_id = class.id();
    let model = mb.finish();

    let mut graph = build(&model);
    let class_node = graph.reference(class_id).unwrap();
    let run_node = graph.reference(run).unwrap();
    let count_node = graph.reference(count).unwrap();

    let class_name = graph.external_name(&model, class_node).unwrap();
    let run_name = graph.external_name(&model, run_node).unwrap();
    let count_name = graph.external_name(&model, count_node).unwrap();

    assert_eq!(class_name, "com.example.App");
    assert_eq!(run_name, "com.example.App void run(int)");
    assert_eq!(count_name, "com.example.App count");

    assert_eq!(
        graph.class_from_external_name(&model, &class_name),
        Some(class_node)
    );
    assert_eq!(
        graph.method_from_external_name(&model, &run_name),
        Some(run_node)
    );
    assert_eq!(
        graph.field_from_external_name(&model, &count_name),
        Some(count_node)
    );
}

#[test]
fn test_constructor_write_counts_as_initializer() {
    let mut mb = ModelBuilder::new();
    let mut class = mb.class("com.example.Holder");
    let value = class.field("value").done();
    class
        .method("Holder")
        .constructor()
        .body(vec![BodyOp::Write {
            target: DeclRef::Declared(value),
        }])
        .done();
    let reader = {
        let mut other = mb.class("com.example.Reader");
        other
            .method("read")
            .body(vec![BodyOp::Read {
                target: DeclRef::Declared(value),
            }])
            .done()
    };
    let model = mb.finish();

    let graph = build(&model);
    let value_node = graph.reference(value).unwrap();
    let _ = graph.reference(reader).unwrap();

    assert!(graph.is_used_for_reading(value_node));
    assert!(graph.is_used_for_writing(value_node));
    assert!(graph.is_assigned_only_in_initializer(value_node));
}

#[test]
fn test_constant_parameter_value_collapses() {
    let mut mb = ModelBuilder::new();
    let mut class = mb.class("com.example.Log");
    let log = class.method("log").param("int").body(vec![]).done();
    let mut caller = mb.class("com.example.Caller");
    caller
        .method("a")
        .body(vec![BodyOp::Call {
            target: DeclRef::Declared(log),
            args: vec![Arg::Literal("1".to_string())],
            on_subclass: false,
            result_used: false,
        }])
        .done();
    caller
        .method("b")
        .body(vec![BodyOp::Call {
            target: DeclRef::Declared(log),
            args: vec![Arg::Literal("2".to_string())],
            on_subclass: false,
            result_used: false,
        }])
        .done();
    let model = mb.finish();

    let graph = build(&model);
    let log_node = graph.reference(log).unwrap();
    let param = graph.method_parameters(log_node)[0];

    // Two different literals collapse the template
    assert_eq!(graph.parameter_constant_value(param), None);
}

#[test]
fn test_private_members_get_visibility() {
    let mut mb = ModelBuilder::new();
    let mut class = mb.class("com.example.Secret");
    let hidden = class
        .method("hidden")
        .visibility(Visibility::Private)
        .done();
    let model = mb.finish();

    let graph = build(&model);
    let node = graph.reference(hidden).unwrap();
    assert_eq!(graph.node(node).unwrap().visibility(), Visibility::Private);
}

#[test]
fn test_parallel_build_matches_sequential() {
    let model = sample_model();

    let session = SessionConfig::from_config(&Config::default()).unwrap();
    let mut sequential = RefGraph::new(session);
    GraphBuilder::new(&model).build(&mut sequential).unwrap();

    let session = SessionConfig::from_config(&Config::default()).unwrap();
    let mut parallel = RefGraph::new(session);
    ParallelGraphBuilder::new(&model)
        .build(&mut parallel)
        .unwrap();

    assert_eq!(sequential.node_count(), parallel.node_count());
    for id in sequential.node_ids() {
        assert_eq!(
            sequential.in_references(id).len(),
            parallel.in_references(id).len()
        );
        assert_eq!(sequential.is_suspicious(id), parallel.is_suspicious(id));
    }
    assert_edges_symmetric(&parallel);
}
