// Analysis module - some types and variants reserved for future use
#![allow(dead_code)]

mod cycles;
mod entry_points;

pub use cycles::{CycleDetector, CycleInfo};
pub use entry_points::EntryPointRegistrar;

use crate::config::Config;
use crate::graph::{NodeId, RefGraph, RefKind};
use crate::model::ProgramModel;
use tracing::info;

/// Types of findings derived from the reference graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// Declaration is never referenced
    Unused,
    /// Field is assigned but never read
    WriteOnly,
    /// Field is read but never assigned
    NeverAssigned,
    /// Method always returns the same constant
    ConstantReturn,
    /// Parameter receives the same constant at every call site
    ConstantParameter,
    /// Declared exception is never thrown
    UnthrownException,
    /// Override is empty or only delegates to super
    RedundantOverride,
    /// Cycle of declarations that only keep each other alive
    DeadCycle,
}

impl FindingKind {
    pub fn code(&self) -> &'static str {
        match self {
            FindingKind::Unused => "RG001",
            FindingKind::WriteOnly => "RG002",
            FindingKind::NeverAssigned => "RG003",
            FindingKind::ConstantReturn => "RG004",
            FindingKind::ConstantParameter => "RG005",
            FindingKind::UnthrownException => "RG006",
            FindingKind::RedundantOverride => "RG007",
            FindingKind::DeadCycle => "RG008",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            FindingKind::Unused => Severity::Warning,
            FindingKind::WriteOnly => Severity::Warning,
            FindingKind::NeverAssigned => Severity::Warning,
            FindingKind::ConstantReturn => Severity::Info,
            FindingKind::ConstantParameter => Severity::Info,
            FindingKind::UnthrownException => Severity::Info,
            FindingKind::RedundantOverride => Severity::Info,
            FindingKind::DeadCycle => Severity::Warning,
        }
    }
}

/// Severity levels for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reported finding
#[derive(Debug, Clone)]
pub struct Finding {
    pub node: NodeId,
    pub kind: FindingKind,
    pub severity: Severity,
    /// Display label of the node kind ("class", "method", ...)
    pub node_kind: &'static str,
    /// Stable external name when the node has one, display name otherwise
    pub name: String,
    /// Qualified name of the owning class, for grouping
    pub owner_class: Option<String>,
    pub message: String,
}

impl Finding {
    fn new(
        graph: &RefGraph,
        model: &ProgramModel,
        node: NodeId,
        kind: FindingKind,
        message: String,
    ) -> Option<Self> {
        let n = graph.node(node)?;
        let name = graph
            .external_name(model, node)
            .unwrap_or_else(|| n.name().to_string());
        let owner_class = owning_class_name(graph, node);
        Some(Self {
            node,
            kind,
            severity: kind.default_severity(),
            node_kind: n.kind().display_name(),
            name,
            owner_class,
            message,
        })
    }
}

fn owning_class_name(graph: &RefGraph, id: NodeId) -> Option<String> {
    let mut current = graph.node(id)?.owner();
    while let Some(owner) = current {
        let node = graph.node(owner)?;
        if node.kind() == RefKind::Class {
            return Some(node.name().to_string());
        }
        current = node.owner();
    }
    None
}

/// Runs the configured detections over a fully built graph.
///
/// Entry points must have been pinned (see [`EntryPointRegistrar`]) before
/// analysis; every predicate here is a pure read of the graph.
pub struct Analyzer<'a> {
    graph: &'a RefGraph,
    model: &'a ProgramModel,
    config: &'a Config,
}

impl<'a> Analyzer<'a> {
    pub fn new(graph: &'a RefGraph, model: &'a ProgramModel, config: &'a Config) -> Self {
        Self {
            graph,
            model,
            config,
        }
    }

    pub fn run(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        let detection = &self.config.detection;

        for (id, node) in self.graph.nodes() {
            if !node.is_valid() {
                continue;
            }
            match node.kind() {
                RefKind::Package => {}
                RefKind::Class => self.check_class(id, &mut findings),
                RefKind::Method => self.check_method(id, &mut findings),
                RefKind::Field => self.check_field(id, &mut findings),
                RefKind::Parameter => self.check_parameter(id, &mut findings),
            }
        }

        if detection.dead_cycles {
            let detector = CycleDetector::new();
            for cycle in detector.find_dead_cycles(self.graph) {
                let names = cycle.names.join(", ");
                if let Some(finding) = Finding::new(
                    self.graph,
                    self.model,
                    cycle.members[0],
                    FindingKind::DeadCycle,
                    format!(
                        "{} declarations only reference each other: {}",
                        cycle.members.len(),
                        names
                    ),
                ) {
                    findings.push(finding);
                }
            }
        }

        findings.sort_by(|a, b| {
            a.owner_class
                .cmp(&b.owner_class)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.kind.code().cmp(b.kind.code()))
        });
        info!(findings = findings.len(), "analysis complete");
        findings
    }

    /// Members of a class that is itself reported unused are not repeated
    /// individually.
    fn owner_reported_unused(&self, id: NodeId) -> bool {
        let mut current = self.graph.node(id).and_then(|n| n.owner());
        while let Some(owner) = current {
            let Some(node) = self.graph.node(owner) else {
                return false;
            };
            if node.kind() == RefKind::Class && self.graph.is_suspicious(owner) {
                return true;
            }
            current = node.owner();
        }
        false
    }

    fn push(
        &self,
        findings: &mut Vec<Finding>,
        id: NodeId,
        kind: FindingKind,
        message: String,
    ) {
        if let Some(finding) = Finding::new(self.graph, self.model, id, kind, message) {
            findings.push(finding);
        }
    }

    fn check_class(&self, id: NodeId, findings: &mut Vec<Finding>) {
        if self.config.detection.unused
            && self.graph.is_suspicious(id)
            && !self.owner_reported_unused(id)
        {
            let name = self
                .graph
                .node(id)
                .map(|n| n.name().to_string())
                .unwrap_or_default();
            self.push(
                findings,
                id,
                FindingKind::Unused,
                format!("class '{}' is never used", name),
            );
        }
    }

    fn check_method(&self, id: NodeId, findings: &mut Vec<Finding>) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        // Synthetic implicit constructors are reported through their class
        if node.decl().is_none() {
            return;
        }
        let detection = &self.config.detection;
        let name = node.name().to_string();

        if detection.unused && self.graph.is_suspicious(id) && !self.owner_reported_unused(id) {
            self.push(
                findings,
                id,
                FindingKind::Unused,
                format!("method '{}' is never used", name),
            );
            return;
        }
        if !self.graph.is_referenced(id) {
            return;
        }

        if detection.redundant_override && self.graph.only_calls_super(id) {
            self.push(
                findings,
                id,
                FindingKind::RedundantOverride,
                format!("override '{}' only calls its super method", name),
            );
        }
        if detection.constant_return {
            if let Some(value) = self.graph.method_constant_return(id) {
                self.push(
                    findings,
                    id,
                    FindingKind::ConstantReturn,
                    format!("method '{}' always returns '{}'", name, value),
                );
            }
        }
        if detection.unthrown_exceptions {
            if let Some(unthrown) = self.graph.method_unthrown_exceptions(id) {
                for exception in unthrown {
                    self.push(
                        findings,
                        id,
                        FindingKind::UnthrownException,
                        format!(
                            "method '{}' declares '{}' but never throws it",
                            name, exception.display
                        ),
                    );
                }
            }
        }
    }

    fn check_field(&self, id: NodeId, findings: &mut Vec<Finding>) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        if node.is_entry() || self.owner_reported_unused(id) {
            return;
        }
        let detection = &self.config.detection;
        let name = node.name().to_string();

        if !self.graph.is_referenced(id) {
            if detection.unused {
                self.push(
                    findings,
                    id,
                    FindingKind::Unused,
                    format!("field '{}' is never used", name),
                );
            }
            return;
        }
        if detection.write_only {
            let reads = self.graph.is_used_for_reading(id);
            let writes = self.graph.is_used_for_writing(id);
            if writes && !reads {
                let detail = if self.graph.is_assigned_only_in_initializer(id) {
                    " (assigned only in initializers)"
                } else {
                    ""
                };
                self.push(
                    findings,
                    id,
                    FindingKind::WriteOnly,
                    format!("field '{}' is assigned but never read{}", name, detail),
                );
            } else if reads && !writes {
                self.push(
                    findings,
                    id,
                    FindingKind::NeverAssigned,
                    format!("field '{}' is read but never assigned", name),
                );
            }
        }
    }

    fn check_parameter(&self, id: NodeId, findings: &mut Vec<Finding>) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        if node.is_entry() || self.owner_reported_unused(id) {
            return;
        }
        let owner_entry = node
            .owner()
            .and_then(|m| self.graph.node(m))
            .map(|m| m.is_entry())
            .unwrap_or(false);
        if owner_entry {
            return;
        }
        let detection = &self.config.detection;
        let name = node.name().to_string();

        if detection.unused && self.graph.is_suspicious(id) {
            self.push(
                findings,
                id,
                FindingKind::Unused,
                format!("parameter '{}' is never used", name),
            );
            return;
        }
        if detection.constant_return {
            if let Some(value) = self.graph.parameter_constant_value(id) {
                self.push(
                    findings,
                    id,
                    FindingKind::ConstantParameter,
                    format!("parameter '{}' is always '{}'", name, value),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, SessionConfig};
    use crate::model::{BodyOp, DeclRef, ModelBuilder};

    fn analyze(model: &ProgramModel, config: &Config) -> Vec<Finding> {
        let session = SessionConfig::from_config(config).unwrap();
        let mut graph = RefGraph::new(session);
        GraphBuilder::new(model).build(&mut graph).unwrap();
        EntryPointRegistrar::new(config).apply(&mut graph, model);
        Analyzer::new(&graph, model, config).run()
    }

    #[test]
    fn test_unused_method_reported_once_with_code() {
        let mut mb = ModelBuilder::new();
        let mut app = mb.class("a.App");
        let main = app
            .method("main")
            .static_method()
            .param("java.lang.String[]")
            .done();
        app.method("stale").static_method().done();
        let model = mb.finish();
        let config = Config::default();

        let findings = analyze(&model, &config);
        let unused: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.kind == FindingKind::Unused)
            .collect();
        assert_eq!(unused.len(), 1);
        assert!(unused[0].name.contains("stale"));
        assert_eq!(unused[0].kind.code(), "RG001");
        let _ = main;
    }

    #[test]
    fn test_members_of_unused_class_not_repeated() {
        let mut mb = ModelBuilder::new();
        let mut ghost = mb.class("a.Ghost");
        ghost.method("one").done();
        ghost.field("two").done();
        let model = mb.finish();
        let config = Config::default();

        let findings = analyze(&model, &config);
        let unused: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.kind == FindingKind::Unused)
            .collect();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].node_kind, "class");
    }

    #[test]
    fn test_write_only_field_reported() {
        let mut mb = ModelBuilder::new();
        let mut class = mb.class("a.Holder");
        let field = class.field("scratch").done();
        let main = class
            .method("main")
            .static_method()
            .param("java.lang.String[]")
            .body(vec![BodyOp::Write {
                target: DeclRef::Declared(field),
            }])
            .done();
        let model = mb.finish();
        let config = Config::default();

        let findings = analyze(&model, &config);
        assert!(findings.iter().any(|f| f.kind == FindingKind::WriteOnly));
        let _ = main;
    }

    #[test]
    fn test_retain_pattern_suppresses_unused() {
        let mut mb = ModelBuilder::new();
        mb.class("a.AccountBean");
        let model = mb.finish();

        let mut config = Config::default();
        config.retain_patterns = vec!["*Bean".to_string()];
        let findings = analyze(&model, &config);
        assert!(findings.iter().all(|f| f.kind != FindingKind::Unused));
    }
}
