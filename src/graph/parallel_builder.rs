// Parallel phase 2 using rayon.
//
// Phase 1 stays sequential: node creation is recursive and order-sensitive.
// Phase 2 is where the time goes, and its collectors are pure, so bodies
// are walked in parallel and the collected ops are applied through the same
// serial queue the sequential builder uses. The resulting graph is
// identical to a sequential build.

use super::builder::{collect_node_ops, BuildError, RefOp};
use super::{masks, CancellationToken, GraphEvent, NodeId, RefGraph};
use crate::model::ProgramModel;
use rayon::prelude::*;
use tracing::info;

/// Whole-program builder with parallel body walking
pub struct ParallelGraphBuilder<'a> {
    model: &'a ProgramModel,
    cancel: CancellationToken,
}

impl<'a> ParallelGraphBuilder<'a> {
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

    pub fn build(&self, graph: &mut RefGraph) -> Result<(), BuildError> {
        info!(
            declarations = self.model.len(),
            "building reference graph (parallel)"
        );

        for (decl, _, _) in self.model.classes() {
            if self.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            graph.get_or_create_reference(self.model, decl);
        }

        graph.cache_override_roots();

        let pending: Vec<NodeId> = graph
            .node_ids()
            .into_iter()
            .filter(|&id| {
                graph
                    .node(id)
                    .map(|n| !n.check_flag(masks::IS_BUILT))
                    .unwrap_or(false)
            })
            .collect();

        let collected: Vec<(NodeId, Vec<RefOp>)> = pending
            .par_iter()
            .map(|&id| (id, collect_node_ops(graph, self.model, id)))
            .collect();

        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        for (id, ops) in collected {
            graph.apply_ops(self.model, ops);
            if let Some(node) = graph.node_mut(id) {
                node.set_flag(true, masks::IS_BUILT);
            }
            graph.fire(GraphEvent::ReferencesBuilt { node: id });
        }

        #[cfg(debug_assertions)]
        graph.assert_edge_invariants();

        info!(nodes = graph.node_count(), "reference graph complete");
        Ok(())
    }
}
