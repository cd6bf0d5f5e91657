// Class nodes: structural initialization and class-level queries.

use super::{masks, ClassData, Node, NodeId, NodeKind, RefGraph};
use crate::model::{ClassKind, DeclId, ProgramModel, Visibility};
use tracing::debug;

impl RefGraph {
    /// Create and structurally initialize a class node (phase 1).
    ///
    /// The node is registered before initialization so that recursive
    /// creation (members, base classes) resolves back to it instead of
    /// looping.
    pub(crate) fn create_class_node(
        &mut self,
        model: &ProgramModel,
        decl: DeclId,
    ) -> Option<NodeId> {
        let declaration = model.get(decl)?;
        let class = declaration.as_class()?;

        let id = self.alloc(Node::new(
            class.qualified_name.clone(),
            Some(decl),
            NodeKind::Class(ClassData::default()),
        ));
        self.register(decl, id);
        debug!(class = %class.qualified_name, node = %id, "creating class node");

        // Nested classes hang off their outer class, top-level classes off
        // their package.
        match model.owner_class_of(decl) {
            Some(outer) => {
                if let Some(outer_node) = self.get_or_create_reference(model, outer) {
                    self.add_child(outer_node, id);
                }
            }
            None => {
                let package = model.package_of(decl).unwrap_or_default();
                let package_node = self.get_or_create_package(&package);
                self.add_child(package_node, id);
            }
        }

        self.initialize_class(model, decl, id);
        Some(id)
    }

    fn initialize_class(&mut self, model: &ProgramModel, decl: DeclId, id: NodeId) {
        let Some(declaration) = model.get(decl) else {
            return;
        };
        let Some(class) = declaration.as_class() else {
            return;
        };

        let is_interface = class.kind == ClassKind::Interface;
        if let Some(node) = self.node_mut(id) {
            node.set_flag(class.is_anonymous, masks::CLASS_IS_ANONYMOUS);
            node.set_flag(class.is_local, masks::CLASS_IS_LOCAL);
            node.set_flag(is_interface, masks::CLASS_IS_INTERFACE);
            node.set_flag(
                declaration.modifiers.is_abstract && !is_interface,
                masks::CLASS_IS_ABSTRACT,
            );
            node.set_flag(declaration.modifiers.is_static, masks::IS_STATIC);
            node.set_flag(declaration.modifiers.is_final, masks::IS_FINAL);
            node.set_visibility(declaration.modifiers.visibility);
        }

        // Role classification runs over the full supertype closure,
        // including library supers known only by name.
        let applet = model.inherits_matching(decl, &|name| self.session.roles.applet.is_match(name));
        let servlet =
            !applet && model.inherits_matching(decl, &|name| self.session.roles.servlet.is_match(name));
        let test_case = !applet
            && !servlet
            && model.inherits_matching(decl, &|name| self.session.roles.test_case.is_match(name));
        let ejb = model.inherits_matching(decl, &|name| self.session.roles.ejb.is_match(name));
        if let Some(node) = self.node_mut(id) {
            node.set_flag(applet, masks::CLASS_IS_APPLET);
            node.set_flag(servlet, masks::CLASS_IS_SERVLET);
            node.set_flag(test_case, masks::CLASS_IS_TESTCASE);
            node.set_flag(ejb, masks::CLASS_IS_EJB);
        }

        // Base links are skipped entirely for inheritance cycles; a cyclic
        // hierarchy would otherwise make every structural walk diverge.
        if !model.is_self_inheritor(decl) {
            for super_ref in &class.supers {
                let Some(super_decl) = super_ref.declared() else {
                    continue;
                };
                if let Some(base) = self.get_or_create_reference(model, super_decl) {
                    if let Some(data) = self.node_mut(id).and_then(|n| n.class_data_mut()) {
                        data.bases.insert(base);
                    }
                    if let Some(data) = self.node_mut(base).and_then(|n| n.class_data_mut()) {
                        data.subclasses.insert(id);
                    }
                }
            }
        }

        // A framework test case taints its whole base chain: bases exist to
        // be run by the framework too.
        if test_case {
            self.mark_bases_as_test_case(id);
        }

        // Utility classification: members exist and every one of them is a
        // static method, a private zero-argument constructor, or (outside
        // interfaces) a static field.
        let mut utility = (!class.methods.is_empty() || !class.fields.is_empty())
            && !is_interface
            && !applet
            && !servlet
            && !test_case;
        for &field in &class.fields {
            if let Some(field_decl) = model.get(field) {
                if !field_decl.modifiers.is_static {
                    utility = false;
                }
            }
        }
        for &method in &class.methods {
            let Some(method_decl) = model.get(method) else {
                continue;
            };
            let Some(m) = method_decl.as_method() else {
                continue;
            };
            if m.is_constructor {
                if !m.params.is_empty()
                    || method_decl.modifiers.visibility != Visibility::Private
                {
                    utility = false;
                }
            } else if !method_decl.modifiers.is_static {
                utility = false;
            }
        }
        if let Some(node) = self.node_mut(id) {
            node.set_flag(utility, masks::CLASS_IS_UTILITY);
        }

        // Members (constructors register themselves on this class while
        // initializing)
        for &field in &class.fields {
            self.get_or_create_reference(model, field);
        }
        for &method in &class.methods {
            self.get_or_create_reference(model, method);
        }

        // A class without declared constructors is constructed through its
        // implicit default constructor; synthesize a node for it so the
        // construction chain has an endpoint.
        let needs_implicit = !is_interface
            && !class.is_anonymous
            && self
                .node(id)
                .and_then(|n| n.class_data())
                .map(|d| d.constructors.is_empty())
                .unwrap_or(false);
        if needs_implicit {
            let simple_name = class
                .qualified_name
                .rsplit('.')
                .next()
                .unwrap_or(&class.qualified_name)
                .to_string();
            let ctor = self.alloc(Node::new(
                simple_name,
                None,
                NodeKind::Method(super::MethodData::default()),
            ));
            if let Some(node) = self.node_mut(ctor) {
                node.set_flag(true, masks::METHOD_IS_CONSTRUCTOR);
                node.set_flag(true, masks::IS_INITIALIZED);
            }
            self.add_child(id, ctor);
            if let Some(data) = self.node_mut(id).and_then(|n| n.class_data_mut()) {
                data.constructors.push(ctor);
                data.default_constructor = Some(ctor);
            }
            // Constructing the class uses the class
            self.add_usage_edge(ctor, id, false);
        }

        if let Some(node) = self.node_mut(id) {
            node.set_flag(true, masks::IS_INITIALIZED);
        }
        self.fire(super::GraphEvent::Initialized { node: id });
    }

    fn mark_bases_as_test_case(&mut self, id: NodeId) {
        let bases: Vec<NodeId> = self
            .node(id)
            .and_then(|n| n.class_data())
            .map(|d| d.bases.iter().copied().collect())
            .unwrap_or_default();
        for base in bases {
            let already = self
                .node(base)
                .map(|n| n.check_flag(masks::CLASS_IS_TESTCASE))
                .unwrap_or(true);
            if already {
                continue;
            }
            if let Some(node) = self.node_mut(base) {
                node.set_flag(true, masks::CLASS_IS_TESTCASE);
            }
            self.mark_bases_as_test_case(base);
        }
    }

    // ---- queries ------------------------------------------------------

    pub fn class_bases(&self, id: NodeId) -> Vec<NodeId> {
        let mut bases: Vec<NodeId> = self
            .node(id)
            .and_then(|n| n.class_data())
            .map(|d| d.bases.iter().copied().collect())
            .unwrap_or_default();
        bases.sort();
        bases
    }

    pub fn class_subclasses(&self, id: NodeId) -> Vec<NodeId> {
        let mut subs: Vec<NodeId> = self
            .node(id)
            .and_then(|n| n.class_data())
            .map(|d| d.subclasses.iter().copied().collect())
            .unwrap_or_default();
        subs.sort();
        subs
    }

    pub fn class_constructors(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .and_then(|n| n.class_data())
            .map(|d| d.constructors.clone())
            .unwrap_or_default()
    }

    pub fn class_default_constructor(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.class_data())?.default_constructor
    }

    /// Methods of this class that override something outside the analysis
    /// scope. They keep the class alive for the framework that calls them.
    pub fn class_library_override_methods(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .and_then(|n| n.class_data())
            .map(|d| d.library_override_methods.clone())
            .unwrap_or_default()
    }

    /// Nodes that mention this class as a type without instantiating it
    pub fn class_type_references(&self, id: NodeId) -> Vec<NodeId> {
        let mut refs: Vec<NodeId> = self
            .node(id)
            .and_then(|n| n.class_data())
            .map(|d| d.in_type_references.iter().copied().collect())
            .unwrap_or_default();
        refs.sort();
        refs
    }

    /// Nodes that instantiate this class
    pub fn class_instance_references(&self, id: NodeId) -> Vec<NodeId> {
        let mut refs: Vec<NodeId> = self
            .node(id)
            .and_then(|n| n.class_data())
            .map(|d| d.instance_references.iter().copied().collect())
            .unwrap_or_default();
        refs.sort();
        refs
    }

    pub fn is_interface(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_INTERFACE))
            .unwrap_or(false)
    }

    pub fn is_abstract_class(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_ABSTRACT))
            .unwrap_or(false)
    }

    pub fn is_utility_class(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_UTILITY))
            .unwrap_or(false)
    }

    pub fn is_applet(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_APPLET))
            .unwrap_or(false)
    }

    pub fn is_servlet(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_SERVLET))
            .unwrap_or(false)
    }

    pub fn is_test_case(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_TESTCASE))
            .unwrap_or(false)
    }

    pub fn is_ejb(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_EJB))
            .unwrap_or(false)
    }

    pub fn is_anonymous_class(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_ANONYMOUS))
            .unwrap_or(false)
    }

    pub fn is_local_class(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::CLASS_IS_LOCAL))
            .unwrap_or(false)
    }

    /// A class's own members never keep it alive: every class carries a
    /// construction self-edge from its (possibly synthesized) constructor,
    /// which would otherwise make every class permanently referenced. The
    /// class is referenced when anything in its member subtree - the class
    /// itself, a constructor, a member, a nested class - has an incoming
    /// usage from outside the subtree.
    pub(crate) fn class_is_referenced(&self, id: NodeId) -> bool {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.has_external_in_reference(current, id) {
                return true;
            }
            if let Some(node) = self.node(current) {
                stack.extend(node.children().iter().copied());
            }
        }
        false
    }

    /// Class-level suspicion: a utility class that actually does something
    /// is kept; an interface or abstract class with implementors is kept;
    /// anything with an incoming usage is kept.
    pub(crate) fn class_is_suspicious(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.check_flag(masks::CLASS_IS_UTILITY) && self.has_out_references(id) {
            return false;
        }
        let has_impls = node
            .class_data()
            .map(|d| !d.subclasses.is_empty())
            .unwrap_or(false);
        let referenced = self.class_is_referenced(id)
            || ((node.check_flag(masks::CLASS_IS_INTERFACE)
                || node.check_flag(masks::CLASS_IS_ABSTRACT))
                && has_impls);
        !referenced
    }
}
