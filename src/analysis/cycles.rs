// Cycle detector - finds declarations that only keep each other alive.
//
// A dead cycle is a strongly connected component of the usage graph where
// no member is an entry point and every incoming edge originates inside
// the component: each member is "referenced", but only by the others.

use crate::graph::{NodeId, RefGraph, RefKind};
use petgraph::algo::tarjan_scc;
use std::collections::HashSet;
use tracing::debug;

/// One detected dead cycle
#[derive(Debug, Clone)]
pub struct CycleInfo {
    /// Members, sorted for deterministic output
    pub members: Vec<NodeId>,
    /// Human-readable names
    pub names: Vec<String>,
}

pub struct CycleDetector;

impl CycleDetector {
    pub fn new() -> Self {
        Self
    }

    /// Find dead cycles, largest first. Only class and method nodes are
    /// considered cycle members; structural children (fields, parameters)
    /// follow their owners.
    pub fn find_dead_cycles(&self, graph: &RefGraph) -> Vec<CycleInfo> {
        let (usage, _) = graph.usage_graph();
        let sccs = tarjan_scc(&usage);

        let mut cycles = Vec::new();
        for scc in sccs {
            if scc.len() < 2 {
                continue;
            }
            let members: HashSet<NodeId> = scc
                .iter()
                .filter_map(|&idx| usage.node_weight(idx).copied())
                .collect();

            if members.iter().any(|&id| {
                graph
                    .node(id)
                    .map(|n| n.is_entry())
                    .unwrap_or(true)
            }) {
                continue;
            }
            let externally_referenced = members.iter().any(|&id| {
                graph
                    .in_references(id)
                    .iter()
                    .any(|from| !members.contains(from))
            });
            if externally_referenced {
                continue;
            }

            let mut significant: Vec<NodeId> = members
                .iter()
                .copied()
                .filter(|&id| {
                    graph
                        .node(id)
                        .map(|n| matches!(n.kind(), RefKind::Class | RefKind::Method))
                        .unwrap_or(false)
                })
                .collect();
            if significant.len() < 2 {
                continue;
            }
            significant.sort();
            let names = significant
                .iter()
                .filter_map(|&id| graph.node(id).map(|n| n.name().to_string()))
                .collect();
            debug!(size = significant.len(), "dead cycle found");
            cycles.push(CycleInfo {
                members: significant,
                names,
            });
        }

        cycles.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
        cycles
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}
