// Method and parameter nodes: override links, entry signatures, and the
// propagated state shared along override chains.

use super::{masks, MethodData, Node, NodeId, NodeKind, ParamData, RefGraph, ValueTemplate};
use crate::model::{Arg, DeclId, ProgramModel, TypeName, Visibility};
use std::collections::HashSet;
use tracing::debug;

impl RefGraph {
    pub(crate) fn create_method_node(
        &mut self,
        model: &ProgramModel,
        decl: DeclId,
    ) -> Option<NodeId> {
        let owner_class = model.owner_class_of(decl)?;
        let owner_node = self.get_or_create_reference(model, owner_class)?;
        // Initializing the owner class creates its members; if that already
        // covered this method, reuse it.
        if let Some(id) = self.reference(decl) {
            return Some(id);
        }
        let declaration = model.get(decl)?;
        let id = self.alloc(Node::new(
            declaration.name.clone(),
            Some(decl),
            NodeKind::Method(MethodData::default()),
        ));
        self.register(decl, id);
        self.add_child(owner_node, id);
        self.initialize_method(model, decl, id, owner_node);
        Some(id)
    }

    fn initialize_method(
        &mut self,
        model: &ProgramModel,
        decl: DeclId,
        id: NodeId,
        owner_node: NodeId,
    ) {
        let Some(declaration) = model.get(decl) else {
            return;
        };
        let Some(method) = declaration.as_method() else {
            return;
        };
        debug!(method = %declaration.name, node = %id, "initializing method node");

        let owner_is_interface = self.is_interface(owner_node);
        let is_void = method.return_type.is_none();
        let is_native = declaration.modifiers.is_native;

        if let Some(node) = self.node_mut(id) {
            node.set_flag(declaration.modifiers.is_static, masks::IS_STATIC);
            node.set_flag(declaration.modifiers.is_final, masks::IS_FINAL);
            node.set_visibility(declaration.modifiers.visibility);
            node.set_flag(method.is_constructor, masks::METHOD_IS_CONSTRUCTOR);
            // Interface members are nominally abstract; only explicit
            // abstractness on classes is meaningful for reporting.
            node.set_flag(
                declaration.modifiers.is_abstract && !owner_is_interface,
                masks::METHOD_IS_ABSTRACT,
            );
            // A void method's return value is trivially accounted for
            node.set_flag(is_void, masks::METHOD_RETURN_VALUE_USED);
        }
        if let Some(data) = self.node_mut(id).and_then(|n| n.method_data_mut()) {
            data.return_template = if is_void || is_native {
                ValueTemplate::Collapsed
            } else {
                ValueTemplate::Undefined
            };
        }

        if method.is_constructor {
            if let Some(data) = self.node_mut(owner_node).and_then(|n| n.class_data_mut()) {
                data.constructors.push(id);
                // A declared zero-argument constructor is the class's
                // default constructor; implicit super chains resolve to it.
                if method.params.is_empty() {
                    data.default_constructor = Some(id);
                }
            }
            // Constructing the class uses the class
            self.add_usage_edge(id, owner_node, false);
        }

        // Application entry signature: static void with a configured
        // name/parameter pattern.
        if declaration.modifiers.is_static && is_void {
            let param_types: Vec<String> = method
                .params
                .iter()
                .filter_map(|p| model.get(*p))
                .filter_map(|p| p.as_parameter())
                .map(|p| p.type_name.clone())
                .collect();
            let is_app_main = self
                .session
                .main_patterns
                .iter()
                .any(|pattern| pattern.name == declaration.name && pattern.params == param_types);
            if is_app_main {
                if let Some(node) = self.node_mut(id) {
                    node.set_flag(true, masks::METHOD_IS_APPMAIN);
                }
            }
        }

        // Override links; targets outside the analysis scope make this a
        // library override, invisible callers included.
        let mut library_override = is_native;
        for super_ref in &method.overrides {
            match super_ref.declared() {
                Some(super_decl) => match self.get_or_create_reference(model, super_decl) {
                    Some(super_node) => self.add_super_method(id, super_node),
                    None => library_override = true,
                },
                None => library_override = true,
            }
        }
        if library_override {
            if let Some(node) = self.node_mut(id) {
                node.set_flag(true, masks::METHOD_IS_LIBRARY_OVERRIDE);
            }
            if let Some(data) = self.node_mut(owner_node).and_then(|n| n.class_data_mut()) {
                data.library_override_methods.push(id);
            }
        }

        let is_test = !method.is_constructor
            && self.is_test_case(owner_node)
            && declaration.name.starts_with("test");
        if is_test {
            if let Some(node) = self.node_mut(id) {
                node.set_flag(true, masks::METHOD_IS_TEST);
            }
        }

        for &param in &method.params {
            self.get_or_create_reference(model, param);
        }

        // Declared exceptions are tracked as "never thrown" candidates only
        // at override roots with trackable bodies.
        let has_supers = self
            .node(id)
            .and_then(|n| n.method_data())
            .map(|d| !d.super_methods.is_empty())
            .unwrap_or(false);
        if !method.throws.is_empty() && !has_supers && !library_override && !is_test && !is_native {
            if let Some(data) = self.node_mut(id).and_then(|n| n.method_data_mut()) {
                data.unthrown_exceptions = Some(method.throws.clone());
            }
        }

        if let Some(node) = self.node_mut(id) {
            node.set_flag(true, masks::IS_INITIALIZED);
        }
        self.fire(super::GraphEvent::Initialized { node: id });
    }

    pub(crate) fn create_parameter_node(
        &mut self,
        model: &ProgramModel,
        decl: DeclId,
    ) -> Option<NodeId> {
        let declaration = model.get(decl)?;
        let param = declaration.as_parameter()?;
        let method_decl = declaration.owner?;
        let method_node = self.get_or_create_reference(model, method_decl)?;
        if let Some(id) = self.reference(decl) {
            return Some(id);
        }
        let index = param.index;
        let id = self.alloc(Node::new(
            declaration.name.clone(),
            Some(decl),
            NodeKind::Parameter(ParamData {
                index,
                value_template: ValueTemplate::Undefined,
            }),
        ));
        self.register(decl, id);
        self.add_child(method_node, id);
        if let Some(data) = self.node_mut(method_node).and_then(|n| n.method_data_mut()) {
            data.parameters.push(id);
        }
        if let Some(node) = self.node_mut(id) {
            node.set_flag(true, masks::IS_INITIALIZED);
        }
        self.fire(super::GraphEvent::Initialized { node: id });
        Some(id)
    }

    /// Link an override pair, both directions plus the usage edge: an
    /// override keeps its super alive for dynamic dispatch.
    pub(crate) fn add_super_method(&mut self, method: NodeId, super_method: NodeId) {
        if method == super_method {
            return;
        }
        let already = self
            .node(method)
            .and_then(|n| n.method_data())
            .map(|d| d.super_methods.contains(&super_method))
            .unwrap_or(true);
        if already {
            return;
        }
        if let Some(data) = self.node_mut(method).and_then(|n| n.method_data_mut()) {
            data.super_methods.push(super_method);
        }
        if let Some(data) = self.node_mut(super_method).and_then(|n| n.method_data_mut()) {
            data.derived_methods.push(method);
        }
        self.add_usage_edge(method, super_method, false);
    }

    // ---- override chains ----------------------------------------------

    /// Roots of the override chains this method belongs to: the transitive
    /// super methods that have no supers themselves, or the method itself
    /// when it overrides nothing. Propagated state (return templates,
    /// unthrown exceptions, parameter values) lives only at roots.
    pub fn override_roots(&self, id: NodeId) -> Vec<NodeId> {
        if let Some(cached) = self
            .node(id)
            .and_then(|n| n.method_data())
            .and_then(|d| d.override_roots.clone())
        {
            return cached;
        }
        self.compute_override_roots(id)
    }

    fn compute_override_roots(&self, id: NodeId) -> Vec<NodeId> {
        let mut roots = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let supers = self
                .node(current)
                .and_then(|n| n.method_data())
                .map(|d| d.super_methods.clone())
                .unwrap_or_default();
            if supers.is_empty() {
                roots.push(current);
            } else {
                stack.extend(supers);
            }
        }
        roots.sort();
        roots
    }

    /// Cache override roots on every method. Called once the structural
    /// phase has resolved all super links; the cache is what makes repeated
    /// propagation during phase 2 cheap.
    pub(crate) fn cache_override_roots(&mut self) {
        let methods: Vec<NodeId> = self
            .nodes()
            .filter(|(_, n)| n.method_data().is_some())
            .map(|(id, _)| id)
            .collect();
        for id in methods {
            let roots = self.compute_override_roots(id);
            if let Some(data) = self.node_mut(id).and_then(|n| n.method_data_mut()) {
                data.override_roots = Some(roots);
            }
        }
    }

    /// Does this method (or any transitive super) override library code?
    pub fn is_external_override(&self, id: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.node(current) else {
                continue;
            };
            if node.check_flag(masks::METHOD_IS_LIBRARY_OVERRIDE) {
                return true;
            }
            if let Some(data) = node.method_data() {
                stack.extend(data.super_methods.iter().copied());
            }
        }
        false
    }

    // ---- propagated state ---------------------------------------------

    /// Fold one observed return expression into the override-root templates.
    /// None means "not a constant", which collapses.
    pub(crate) fn update_return_template(&mut self, method: NodeId, observed: Option<String>) {
        for root in self.override_roots(method) {
            if let Some(data) = self.node_mut(root).and_then(|n| n.method_data_mut()) {
                data.return_template.update(observed.clone());
            }
        }
    }

    /// Fold call-site arguments into the parameter templates of the
    /// override roots. Missing or non-literal arguments collapse.
    pub(crate) fn update_parameter_values(&mut self, method: NodeId, args: &[Arg]) {
        for root in self.override_roots(method) {
            let params = self
                .node(root)
                .and_then(|n| n.method_data())
                .map(|d| d.parameters.clone())
                .unwrap_or_default();
            for param in params {
                let index = match self.node(param).and_then(|n| n.param_data()) {
                    Some(data) => data.index,
                    None => continue,
                };
                let observed = match args.get(index) {
                    Some(Arg::Literal(v)) => Some(v.clone()),
                    _ => None,
                };
                if let Some(data) = self.node_mut(param).and_then(|n| n.param_data_mut()) {
                    data.value_template.update(observed);
                }
            }
        }
    }

    /// An exception observed escaping a body is no longer "unthrown",
    /// anywhere in the override chain. Related types (either inheritance
    /// direction) count as the same exception.
    pub(crate) fn remove_unthrown_exception(
        &mut self,
        model: &ProgramModel,
        method: NodeId,
        escaped: &TypeName,
    ) {
        for root in self.override_roots(method) {
            let Some(current) = self
                .node(root)
                .and_then(|n| n.method_data())
                .and_then(|d| d.unthrown_exceptions.clone())
            else {
                continue;
            };
            let kept: Vec<TypeName> = current
                .into_iter()
                .filter(|declared| !model.exceptions_related(declared, escaped))
                .collect();
            if let Some(data) = self.node_mut(root).and_then(|n| n.method_data_mut()) {
                data.unthrown_exceptions = Some(kept);
            }
        }
    }

    // ---- queries ------------------------------------------------------

    pub fn method_super_methods(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .and_then(|n| n.method_data())
            .map(|d| d.super_methods.clone())
            .unwrap_or_default()
    }

    pub fn method_derived_methods(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .and_then(|n| n.method_data())
            .map(|d| d.derived_methods.clone())
            .unwrap_or_default()
    }

    pub fn method_parameters(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .and_then(|n| n.method_data())
            .map(|d| d.parameters.clone())
            .unwrap_or_default()
    }

    /// Declared exceptions never seen escaping, from this method's override
    /// roots. None when the method is not tracked (library override, test,
    /// native, non-root).
    pub fn method_unthrown_exceptions(&self, id: NodeId) -> Option<Vec<TypeName>> {
        let mut collected: Option<Vec<TypeName>> = None;
        for root in self.override_roots(id) {
            if let Some(unthrown) = self
                .node(root)
                .and_then(|n| n.method_data())
                .and_then(|d| d.unthrown_exceptions.as_ref())
            {
                collected.get_or_insert_with(Vec::new).extend(unthrown.iter().cloned());
            }
        }
        collected
    }

    /// The single constant this method always returns, if the collapsed
    /// evidence across its override chain agrees on one.
    pub fn method_constant_return(&self, id: NodeId) -> Option<String> {
        let roots = self.override_roots(id);
        let mut value: Option<String> = None;
        for root in roots {
            let template = self.node(root).and_then(|n| n.method_data())?;
            match template.return_template.if_same() {
                Some(v) => match &value {
                    Some(existing) if existing != v => return None,
                    _ => value = Some(v.to_string()),
                },
                None => return None,
            }
        }
        value
    }

    /// The single constant always passed for a parameter, if any
    pub fn parameter_constant_value(&self, id: NodeId) -> Option<String> {
        self.node(id)
            .and_then(|n| n.param_data())
            .and_then(|d| d.value_template.if_same().map(str::to_string))
    }

    pub fn parameter_index(&self, id: NodeId) -> Option<usize> {
        self.node(id).and_then(|n| n.param_data()).map(|d| d.index)
    }

    pub fn is_constructor(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_IS_CONSTRUCTOR))
            .unwrap_or(false)
    }

    pub fn is_app_main(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_IS_APPMAIN))
            .unwrap_or(false)
    }

    pub fn is_test_method(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_IS_TEST))
            .unwrap_or(false)
    }

    pub fn is_abstract_method(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_IS_ABSTRACT))
            .unwrap_or(false)
    }

    pub fn is_body_empty(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_BODY_EMPTY))
            .unwrap_or(false)
    }

    pub fn only_calls_super(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_ONLY_CALLS_SUPER))
            .unwrap_or(false)
    }

    pub fn is_return_value_used(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_RETURN_VALUE_USED))
            .unwrap_or(false)
    }

    pub fn is_called_on_subclass(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.check_flag(masks::METHOD_CALLED_ON_SUBCLASS))
            .unwrap_or(false)
    }

    /// Referenced means: some incoming usage that is not just an override
    /// registration, or callers invisible to the analysis (library
    /// override).
    pub(crate) fn method_is_referenced(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let empty = Vec::new();
        let derived = node
            .method_data()
            .map(|d| &d.derived_methods)
            .unwrap_or(&empty);
        let has_real_caller = self
            .in_references(id)
            .iter()
            .any(|r| !derived.contains(r));
        has_real_caller || self.is_external_override(id)
    }

    pub(crate) fn method_is_suspicious(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        // The sole private zero-argument constructor is an idiom for
        // "never instantiate", not dead code.
        if node.check_flag(masks::METHOD_IS_CONSTRUCTOR)
            && node.visibility() == Visibility::Private
            && node
                .method_data()
                .map(|d| d.parameters.is_empty())
                .unwrap_or(false)
        {
            let sole = node
                .owner()
                .map(|owner| self.class_constructors(owner).len() == 1)
                .unwrap_or(false);
            if sole {
                return false;
            }
        }
        !self.method_is_referenced(id)
    }
}
