//! End-to-end analysis tests: model -> graph -> entry points -> findings.

use refgraph::analysis::{Analyzer, EntryPointRegistrar, FindingKind};
use refgraph::baseline::Baseline;
use refgraph::config::Config;
use refgraph::graph::{GraphBuilder, RefGraph, SessionConfig};
use refgraph::model::{
    Arg, BodyOp, DeclRef, ModelBuilder, ProgramModel, ReturnExpr, TypeName,
};

fn analyze(model: &ProgramModel, config: &Config) -> Vec<refgraph::analysis::Finding> {
    let session = SessionConfig::from_config(config).unwrap();
    let mut graph = RefGraph::new(session);
    GraphBuilder::new(model).build(&mut graph).unwrap();
    EntryPointRegistrar::new(config).apply(&mut graph, model);
    Analyzer::new(&graph, model, config).run()
}

fn call(target: refgraph::model::DeclId) -> BodyOp {
    BodyOp::Call {
        target: DeclRef::Declared(target),
        args: vec![],
        on_subclass: false,
        result_used: true,
    }
}

#[test]
fn test_clean_program_has_no_findings() {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    let field = app.field("state").done();
    let work = app
        .method("work")
        .body(vec![
            BodyOp::Read {
                target: DeclRef::Declared(field),
            },
            BodyOp::Write {
                target: DeclRef::Declared(field),
            },
        ])
        .done();
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![call(work)])
        .done();
    let model = mb.finish();

    let findings = analyze(&model, &Config::default());
    assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
}

#[test]
fn test_constant_return_reported() {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    let answer = app
        .method("answer")
        .returns(TypeName::external("int"))
        .body(vec![BodyOp::Return {
            value: ReturnExpr::Literal("42".to_string()),
        }])
        .done();
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![call(answer)])
        .done();
    let model = mb.finish();

    let findings = analyze(&model, &Config::default());
    let constant: Vec<_> = findings
        .iter()
        .filter(|f| f.kind == FindingKind::ConstantReturn)
        .collect();
    assert_eq!(constant.len(), 1);
    assert!(constant[0].message.contains("42"));
    assert_eq!(constant[0].kind.code(), "RG004");
}

#[test]
fn test_unthrown_exception_reported() {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    let safe = app
        .method("safe")
        .throws(TypeName::external("java.io.IOException"))
        .body(vec![])
        .done();
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![call(safe)])
        .done();
    let model = mb.finish();

    let findings = analyze(&model, &Config::default());
    let unthrown: Vec<_> = findings
        .iter()
        .filter(|f| f.kind == FindingKind::UnthrownException)
        .collect();
    assert_eq!(unthrown.len(), 1);
    assert!(unthrown[0].message.contains("java.io.IOException"));
}

#[test]
fn test_thrown_exception_not_reported() {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    let risky = app
        .method("risky")
        .throws(TypeName::external("java.io.IOException"))
        .body(vec![BodyOp::Escapes {
            exception: TypeName::external("java.io.IOException"),
        }])
        .done();
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![call(risky)])
        .done();
    let model = mb.finish();

    let findings = analyze(&model, &Config::default());
    assert!(findings
        .iter()
        .all(|f| f.kind != FindingKind::UnthrownException));
}

#[test]
fn test_redundant_override_reported() {
    let mut mb = ModelBuilder::new();
    let mut base_builder = mb.class("com.example.Base");
    let base_run = base_builder.method("run").body(vec![]).done();
    let base = base_builder.id();

    let mut derived = mb.class("com.example.Derived").extends(base);
    let derived_run = derived
        .method("run")
        .overrides(base_run)
        .body(vec![BodyOp::Return {
            value: ReturnExpr::SuperCall,
        }])
        .done();

    let mut app = mb.class("com.example.App");
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![call(base_run), call(derived_run)])
        .done();
    let model = mb.finish();

    let findings = analyze(&model, &Config::default());
    let redundant: Vec<_> = findings
        .iter()
        .filter(|f| f.kind == FindingKind::RedundantOverride)
        .collect();
    assert_eq!(redundant.len(), 1);
    assert!(redundant[0].name.contains("Derived"));
}

#[test]
fn test_dead_cycle_reported_when_enabled() {
    use refgraph::model::DeclId;

    let mut mb = ModelBuilder::new();
    let mut class = mb.class("com.example.Zombie");
    let second_ahead = DeclId(2);
    let first = class.method("first").body(vec![call(second_ahead)]).done();
    let second = class.method("second").body(vec![call(first)]).done();
    assert_eq!(second, second_ahead);
    let model = mb.finish();

    let mut config = Config::default();
    config.detection.dead_cycles = true;
    let findings = analyze(&model, &config);
    let cycles: Vec<_> = findings
        .iter()
        .filter(|f| f.kind == FindingKind::DeadCycle)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].kind.code(), "RG008");
}

#[test]
fn test_constant_parameter_reported() {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    let log = app
        .method("log")
        .param("int")
        .body(vec![BodyOp::ReadParam { index: 0 }])
        .done();
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![
            BodyOp::Call {
                target: DeclRef::Declared(log),
                args: vec![Arg::Literal("7".to_string())],
                on_subclass: false,
                result_used: false,
            },
            BodyOp::Call {
                target: DeclRef::Declared(log),
                args: vec![Arg::Literal("7".to_string())],
                on_subclass: false,
                result_used: false,
            },
        ])
        .done();
    let model = mb.finish();

    let findings = analyze(&model, &Config::default());
    let constant: Vec<_> = findings
        .iter()
        .filter(|f| f.kind == FindingKind::ConstantParameter)
        .collect();
    assert_eq!(constant.len(), 1);
    assert!(constant[0].message.contains("7"));
}

#[test]
fn test_test_case_class_is_not_reported() {
    let mut mb = ModelBuilder::new();
    let mut test = mb
        .class("com.example.AppTest")
        .extends_external("junit.framework.TestCase");
    test.method("testRuns").body(vec![]).done();
    let model = mb.finish();

    let findings = analyze(&model, &Config::default());
    assert!(findings.iter().all(|f| f.kind != FindingKind::Unused));
}

#[test]
fn test_disabled_detection_suppresses_findings() {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .done();
    app.method("stale").done();
    let model = mb.finish();

    let mut config = Config::default();
    config.detection.unused = false;
    let findings = analyze(&model, &config);
    assert!(findings.iter().all(|f| f.kind != FindingKind::Unused));
}

#[test]
fn test_baseline_filters_known_findings() {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .done();
    app.method("stale").done();
    let model = mb.finish();
    let config = Config::default();

    let findings = analyze(&model, &config);
    assert!(!findings.is_empty());

    // A baseline generated from the current findings hides them all
    let baseline = Baseline::from_findings(&findings);
    assert!(baseline.filter_new(&findings).is_empty());

    // A new finding still gets through
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .done();
    app.method("stale").done();
    app.method("fresh").done();
    let model = mb.finish();
    let findings = analyze(&model, &config);
    let new: Vec<_> = baseline.filter_new(&findings);
    assert_eq!(new.len(), 1);
    assert!(new[0].name.contains("fresh"));
}
