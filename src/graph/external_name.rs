// Persistable external names: stable string identities that survive graph
// and model rebuilds. Classes are their qualified name; members prefix it.
//
//   class:  com.example.Main
//   field:  com.example.Main count
//   method: com.example.Main void run(int, java.lang.String)
//
// Reverse lookup re-resolves against the current model and reports absence
// as None; a name from a previous session may legitimately match nothing.

use super::{NodeId, RefGraph, RefKind};
use crate::model::ProgramModel;

impl RefGraph {
    /// Stable external name of a node. Synthetic nodes (packages, implicit
    /// constructors) have none.
    pub fn external_name(&self, model: &ProgramModel, id: NodeId) -> Option<String> {
        let node = self.node(id)?;
        match node.kind() {
            RefKind::Class => Some(node.name().to_string()),
            RefKind::Field => {
                let owner = self.owner_class_name(id)?;
                Some(format!("{} {}", owner, node.name()))
            }
            RefKind::Method => {
                let decl = node.decl()?;
                let owner = self.owner_class_name(id)?;
                let signature = model.method_signature(decl)?;
                Some(format!("{} {}", owner, signature))
            }
            RefKind::Package | RefKind::Parameter => None,
        }
    }

    fn owner_class_name(&self, id: NodeId) -> Option<String> {
        let mut current = self.node(id)?.owner();
        while let Some(owner) = current {
            let node = self.node(owner)?;
            if node.kind() == RefKind::Class {
                return Some(node.name().to_string());
            }
            current = node.owner();
        }
        None
    }

    /// Resolve a class external name, creating the node if the class exists
    /// in the current model.
    pub fn class_from_external_name(
        &mut self,
        model: &ProgramModel,
        name: &str,
    ) -> Option<NodeId> {
        let decl = model.find_class_by_qualified_name(name)?;
        self.get_or_create_reference(model, decl)
    }

    /// Resolve a field external name. The field name follows the last space
    /// so qualified class names parse unambiguously.
    pub fn field_from_external_name(
        &mut self,
        model: &ProgramModel,
        name: &str,
    ) -> Option<NodeId> {
        let (class_name, field_name) = name.rsplit_once(' ')?;
        let class_decl = model.find_class_by_qualified_name(class_name)?;
        let class = model.get(class_decl)?.as_class()?;
        let field = class
            .fields
            .iter()
            .copied()
            .find(|&f| model.get(f).map(|d| d.name == field_name).unwrap_or(false))?;
        self.get_or_create_reference(model, field)
    }

    /// Resolve a method external name by matching the embedded signature
    /// against the owning class's methods.
    pub fn method_from_external_name(
        &mut self,
        model: &ProgramModel,
        name: &str,
    ) -> Option<NodeId> {
        let (class_name, signature) = name.split_once(' ')?;
        let class_decl = model.find_class_by_qualified_name(class_name)?;
        let class = model.get(class_decl)?.as_class()?;
        let method = class.methods.iter().copied().find(|&m| {
            model
                .method_signature(m)
                .map(|s| s == signature)
                .unwrap_or(false)
        })?;
        self.get_or_create_reference(model, method)
    }
}
