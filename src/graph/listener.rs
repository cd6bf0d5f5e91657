// Lifecycle events observed while the graph is built and edited.

use super::NodeId;
use std::sync::Mutex;

/// Graph lifecycle event. Initialization and references-built fire once per
/// node; marked-referenced fires once per distinct incoming edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// Phase 1 finished for the node
    Initialized { node: NodeId },
    /// Phase 2 finished for the node
    ReferencesBuilt { node: NodeId },
    /// A new incoming usage edge was registered
    MarkedReferenced {
        node: NodeId,
        from: NodeId,
        /// The reference is a field write performed inside an initializer
        via_initializer_write: bool,
    },
    /// The node was removed from the graph
    Removed { node: NodeId },
}

impl GraphEvent {
    pub fn node(&self) -> NodeId {
        match *self {
            GraphEvent::Initialized { node }
            | GraphEvent::ReferencesBuilt { node }
            | GraphEvent::MarkedReferenced { node, .. }
            | GraphEvent::Removed { node } => node,
        }
    }
}

/// Observer of graph lifecycle events. Listeners are read from parallel
/// build workers, so implementations must be shareable across threads.
pub trait GraphListener: Send + Sync {
    fn on_event(&self, event: &GraphEvent);
}

/// Listener that records every event, for tests and debugging
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<GraphEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl GraphListener for RecordingListener {
    fn on_event(&self, event: &GraphEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(*event);
        }
    }
}

// Shared handles can be registered while the caller keeps one to read from
impl GraphListener for std::sync::Arc<RecordingListener> {
    fn on_event(&self, event: &GraphEvent) {
        RecordingListener::on_event(self, event);
    }
}
