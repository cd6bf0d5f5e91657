// Entry point pinning: nodes the outside world reaches that the graph
// cannot see edges for. Runs after the build, before analysis.

use crate::config::Config;
use crate::graph::{NodeId, RefGraph, RefKind};
use crate::model::ProgramModel;
use tracing::{debug, info};

/// Marks entry points on a built graph
pub struct EntryPointRegistrar<'a> {
    config: &'a Config,
}

impl<'a> EntryPointRegistrar<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn apply(&self, graph: &mut RefGraph, model: &ProgramModel) {
        let mut pinned: Vec<NodeId> = Vec::new();

        for (id, node) in graph.nodes() {
            match node.kind() {
                RefKind::Class => {
                    // Framework-instantiated roles
                    if graph.is_applet(id)
                        || graph.is_servlet(id)
                        || graph.is_ejb(id)
                        || graph.is_test_case(id)
                    {
                        pinned.push(id);
                        pinned.extend(graph.class_constructors(id));
                        pinned.extend(graph.class_library_override_methods(id));
                    }
                }
                RefKind::Method => {
                    if graph.is_app_main(id) || graph.is_test_method(id) {
                        pinned.push(id);
                    }
                }
                RefKind::Field => {
                    // Enum constants are reachable through values()/valueOf()
                    let is_enum_constant = node
                        .decl()
                        .and_then(|d| model.get(d))
                        .and_then(|d| d.as_field())
                        .map(|f| f.is_enum_constant)
                        .unwrap_or(false);
                    if is_enum_constant {
                        pinned.push(id);
                    }
                }
                _ => {}
            }
            // Name-based retention
            if self.config.should_retain(node.name()) {
                pinned.push(id);
            }
        }

        // Explicitly configured entry points, by external name
        for name in &self.config.entry_points {
            let resolved = graph
                .method_from_external_name(model, name)
                .or_else(|| graph.field_from_external_name(model, name))
                .or_else(|| graph.class_from_external_name(model, name));
            match resolved {
                Some(id) => pinned.push(id),
                None => debug!(name = %name, "configured entry point not found"),
            }
        }

        // An entry keeps its owners alive: the class around a main method
        // is reachable even though no edge points at it.
        let mut all = Vec::new();
        for id in pinned {
            all.push(id);
            let mut current = graph.node(id).and_then(|n| n.owner());
            while let Some(owner) = current {
                all.push(owner);
                current = graph.node(owner).and_then(|n| n.owner());
            }
        }

        let count = all.len();
        for id in all {
            graph.set_entry(id, true);
        }
        info!(entry_points = count, "entry points pinned");
    }
}
