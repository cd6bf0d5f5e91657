// Field nodes: read/write tracking and the initializer-only-write marker.

use super::{masks, Node, NodeId, NodeKind, RefGraph};
use crate::model::{DeclId, ProgramModel};

impl RefGraph {
    pub(crate) fn create_field_node(
        &mut self,
        model: &ProgramModel,
        decl: DeclId,
    ) -> Option<NodeId> {
        let owner_class = model.owner_class_of(decl)?;
        let owner_node = self.get_or_create_reference(model, owner_class)?;
        if let Some(id) = self.reference(decl) {
            return Some(id);
        }
        let declaration = model.get(decl)?;
        declaration.as_field()?;

        let id = self.alloc(Node::new(
            declaration.name.clone(),
            Some(decl),
            NodeKind::Field,
        ));
        self.register(decl, id);
        self.add_child(owner_node, id);

        let interface_member = self.is_interface(owner_node);
        if let Some(node) = self.node_mut(id) {
            // Interface fields are constants whatever the modifiers say
            node.set_flag(
                declaration.modifiers.is_static || interface_member,
                masks::IS_STATIC,
            );
            node.set_flag(
                declaration.modifiers.is_final || interface_member,
                masks::IS_FINAL,
            );
            node.set_visibility(declaration.modifiers.visibility);
            node.set_flag(true, masks::IS_INITIALIZED);
        }
        self.fire(super::GraphEvent::Initialized { node: id });
        Some(id)
    }

    // ---- phase 2 state ------------------------------------------------

    pub(crate) fn mark_field_read(&mut self, field: NodeId) {
        if let Some(node) = self.node_mut(field) {
            node.set_flag(true, masks::FIELD_USED_FOR_READING);
        }
    }

    /// Record a write. Whether the field ends up "assigned only in
    /// initializers" must not depend on the order writes are observed in,
    /// so an out-of-initializer write leaves a permanent marker.
    pub(crate) fn mark_field_write(&mut self, field: NodeId, inside_initializer: bool) {
        if let Some(node) = self.node_mut(field) {
            node.set_flag(true, masks::FIELD_USED_FOR_WRITING);
            if inside_initializer {
                if !node.check_flag(masks::FIELD_WROTE_OUTSIDE_INITIALIZER) {
                    node.set_flag(true, masks::FIELD_ASSIGNED_ONLY_IN_INITIALIZER);
                }
            } else {
                node.set_flag(true, masks::FIELD_WROTE_OUTSIDE_INITIALIZER);
                node.set_flag(false, masks::FIELD_ASSIGNED_ONLY_IN_INITIALIZER);
            }
        }
    }

    // ---- queries ------------------------------------------------------

    pub fn is_used_for_reading(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::FIELD_USED_FOR_READING))
            .unwrap_or(false)
    }

    pub fn is_used_for_writing(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::FIELD_USED_FOR_WRITING))
            .unwrap_or(false)
    }

    /// Every observed write happened in a field initializer, a class
    /// initializer block, or a constructor.
    pub fn is_assigned_only_in_initializer(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::FIELD_ASSIGNED_ONLY_IN_INITIALIZER))
            .unwrap_or(false)
    }

    /// A field with no users is suspicious; so is one with asymmetric
    /// usage, written but never read or read but never written.
    pub(crate) fn field_is_suspicious(&self, id: NodeId) -> bool {
        if !self.has_in_references(id) {
            return true;
        }
        self.is_used_for_reading(id) != self.is_used_for_writing(id)
    }
}
