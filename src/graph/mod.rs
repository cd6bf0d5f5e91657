// Reference graph - some methods reserved for future use
#![allow(dead_code)]

mod builder;
mod class;
mod entity;
mod external_name;
mod field;
mod listener;
mod method;
mod parallel_builder;

pub use builder::{BuildError, CancellationToken, GraphBuilder};
pub use entity::{Flags, UserData};
pub use listener::{GraphEvent, GraphListener, RecordingListener};
pub use parallel_builder::ParallelGraphBuilder;

pub(crate) use entity::masks;

use crate::config::{Config, MainPattern};
use crate::model::{DeclId, DeclKind, ProgramModel, TypeName};
use miette::{IntoDiagnostic, Result, WrapErr};
use petgraph::graph::DiGraph;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Stable handle of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Node kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Package,
    Class,
    Method,
    Field,
    Parameter,
}

impl RefKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            RefKind::Package => "package",
            RefKind::Class => "class",
            RefKind::Method => "method",
            RefKind::Field => "field",
            RefKind::Parameter => "parameter",
        }
    }
}

/// Monotonic constant-value template for return values and parameters.
///
/// `Undefined` collapses to a value on the first observation; a differing
/// second observation (or an unknowable one) collapses it to `Collapsed`
/// permanently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueTemplate {
    Undefined,
    Value(String),
    Collapsed,
}

impl ValueTemplate {
    pub(crate) fn update(&mut self, observed: Option<String>) {
        match self {
            ValueTemplate::Collapsed => {}
            ValueTemplate::Undefined => {
                *self = match observed {
                    Some(v) => ValueTemplate::Value(v),
                    None => ValueTemplate::Collapsed,
                };
            }
            ValueTemplate::Value(current) => {
                if observed.as_deref() != Some(current.as_str()) {
                    *self = ValueTemplate::Collapsed;
                }
            }
        }
    }

    pub fn if_same(&self) -> Option<&str> {
        match self {
            ValueTemplate::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Class-specific structural edges
#[derive(Debug, Default)]
pub struct ClassData {
    pub(crate) bases: HashSet<NodeId>,
    pub(crate) subclasses: HashSet<NodeId>,
    pub(crate) constructors: Vec<NodeId>,
    pub(crate) default_constructor: Option<NodeId>,
    pub(crate) library_override_methods: Vec<NodeId>,
    pub(crate) in_type_references: HashSet<NodeId>,
    pub(crate) instance_references: HashSet<NodeId>,
}

/// Method-specific structural edges and propagated state
#[derive(Debug, Default)]
pub struct MethodData {
    pub(crate) super_methods: Vec<NodeId>,
    pub(crate) derived_methods: Vec<NodeId>,
    pub(crate) parameters: Vec<NodeId>,
    /// Declared checked exceptions not yet observed to escape any body in
    /// the override chain. Lives only at override roots.
    pub(crate) unthrown_exceptions: Option<Vec<TypeName>>,
    pub(crate) return_template: ValueTemplate,
    /// Override-chain roots, cached once both build phases resolved all
    /// super links.
    pub(crate) override_roots: Option<Vec<NodeId>>,
}

impl Default for ValueTemplate {
    fn default() -> Self {
        ValueTemplate::Undefined
    }
}

#[derive(Debug)]
pub struct ParamData {
    pub(crate) index: usize,
    pub(crate) value_template: ValueTemplate,
}

#[derive(Debug)]
pub enum NodeKind {
    Package,
    Class(ClassData),
    Method(MethodData),
    Field,
    Parameter(ParamData),
}

/// One node of the reference graph.
///
/// The entity layer (name, owner, children, flags, user data) is common to
/// every kind; declaration-backed kinds additionally carry the identity
/// link and the usage edge sets.
#[derive(Debug)]
pub struct Node {
    name: String,
    owner: Option<NodeId>,
    children: Vec<NodeId>,
    flags: Flags,
    user_data: UserData,
    /// Identity link; None for packages and synthesized implicit
    /// constructors.
    decl: Option<DeclId>,
    in_refs: HashSet<NodeId>,
    out_refs: HashSet<NodeId>,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn new(name: String, decl: Option<DeclId>, kind: NodeKind) -> Self {
        Self {
            name,
            owner: None,
            children: Vec::new(),
            flags: Flags::default(),
            user_data: UserData::default(),
            decl,
            in_refs: HashSet::new(),
            out_refs: HashSet::new(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn decl(&self) -> Option<DeclId> {
        self.decl
    }

    pub fn kind(&self) -> RefKind {
        match self.kind {
            NodeKind::Package => RefKind::Package,
            NodeKind::Class(_) => RefKind::Class,
            NodeKind::Method(_) => RefKind::Method,
            NodeKind::Field => RefKind::Field,
            NodeKind::Parameter(_) => RefKind::Parameter,
        }
    }

    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    pub(crate) fn flags(&self) -> Flags {
        self.flags
    }

    pub(crate) fn check_flag(&self, mask: u32) -> bool {
        self.flags.check(mask)
    }

    pub(crate) fn set_flag(&mut self, value: bool, mask: u32) {
        self.flags.set(value, mask);
    }

    pub fn is_entry(&self) -> bool {
        self.check_flag(masks::IS_ENTRY)
    }

    pub fn visibility(&self) -> crate::model::Visibility {
        use crate::model::Visibility;
        match (self.flags.bits() & masks::ACCESS_BITS) >> masks::ACCESS_SHIFT {
            0 => Visibility::Public,
            1 => Visibility::Protected,
            2 => Visibility::PackagePrivate,
            _ => Visibility::Private,
        }
    }

    pub(crate) fn set_visibility(&mut self, visibility: crate::model::Visibility) {
        use crate::model::Visibility;
        let bits = match visibility {
            Visibility::Public => 0,
            Visibility::Protected => 1,
            Visibility::PackagePrivate => 2,
            Visibility::Private => 3,
        };
        self.flags.set(false, masks::ACCESS_BITS);
        self.flags.set(true, bits << masks::ACCESS_SHIFT);
    }

    pub fn is_static(&self) -> bool {
        self.check_flag(masks::IS_STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.check_flag(masks::IS_FINAL)
    }

    /// A node is valid until its backing declaration is retired from the
    /// program. Synthetic nodes (packages, implicit constructors) stay
    /// valid until explicitly removed.
    pub fn is_valid(&self) -> bool {
        !self.check_flag(masks::IS_DELETED)
    }

    pub fn is_initialized(&self) -> bool {
        self.check_flag(masks::IS_INITIALIZED)
    }

    pub fn is_references_built(&self) -> bool {
        self.check_flag(masks::IS_BUILT)
    }

    pub(crate) fn class_data(&self) -> Option<&ClassData> {
        match &self.kind {
            NodeKind::Class(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn class_data_mut(&mut self) -> Option<&mut ClassData> {
        match &mut self.kind {
            NodeKind::Class(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn method_data(&self) -> Option<&MethodData> {
        match &self.kind {
            NodeKind::Method(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn method_data_mut(&mut self) -> Option<&mut MethodData> {
        match &mut self.kind {
            NodeKind::Method(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn param_data(&self) -> Option<&ParamData> {
        match &self.kind {
            NodeKind::Parameter(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn param_data_mut(&mut self) -> Option<&mut ParamData> {
        match &mut self.kind {
            NodeKind::Parameter(data) => Some(data),
            _ => None,
        }
    }
}

/// Compiled role-classification patterns, matched against supertype names
#[derive(Debug)]
pub struct RolePatterns {
    pub(crate) applet: Regex,
    pub(crate) servlet: Regex,
    pub(crate) test_case: Regex,
    pub(crate) ejb: Regex,
}

/// Per-session options owned by the graph: the scope predicate and the
/// classification patterns. Created at session start, dropped with the
/// graph; there is no process-wide registry.
#[derive(Debug)]
pub struct SessionConfig {
    pub(crate) scope_packages: Vec<String>,
    pub(crate) roles: RolePatterns,
    pub(crate) main_patterns: Vec<MainPattern>,
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .into_diagnostic()
                .wrap_err_with(|| format!("Invalid role pattern: {}", pattern))
        };
        Ok(Self {
            scope_packages: config.scope_packages.clone(),
            roles: RolePatterns {
                applet: compile(&config.roles.applet)?,
                servlet: compile(&config.roles.servlet)?,
                test_case: compile(&config.roles.test_case)?,
                ejb: compile(&config.roles.ejb)?,
            },
            main_patterns: config.main_patterns.clone(),
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        // Built-in patterns are known-good regexes
        match Self::from_config(&Config::default()) {
            Ok(session) => session,
            Err(_) => unreachable!("built-in role patterns compile"),
        }
    }
}

/// The reference graph: an arena of nodes addressed by [`NodeId`], plus the
/// memoized map from program declarations to nodes.
///
/// All edges are stored as id sets on both endpoints; registration and
/// removal always touch the two sides together, so a half-edge is an
/// invariant violation, not a state the graph can reach through this API.
pub struct RefGraph {
    session: SessionConfig,
    nodes: Vec<Option<Node>>,
    decl_map: HashMap<DeclId, NodeId>,
    packages: HashMap<String, NodeId>,
    listeners: Vec<Box<dyn GraphListener>>,
}

impl RefGraph {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            nodes: Vec::new(),
            decl_map: HashMap::new(),
            packages: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn add_listener(&mut self, listener: Box<dyn GraphListener>) {
        self.listeners.push(listener);
    }

    // ---- arena access -------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|slot| slot.as_mut())
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    /// Live node count
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| NodeId(i as u32)))
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    /// Node already registered for a declaration, without creating one
    pub fn reference(&self, decl: DeclId) -> Option<NodeId> {
        self.decl_map.get(&decl).copied()
    }

    // ---- scope --------------------------------------------------------

    /// The scope predicate: project-owned source within the configured
    /// packages. Members take the scope of their owning class.
    pub fn belongs_to_scope(&self, model: &ProgramModel, decl: DeclId) -> bool {
        let class_id = match model.get(decl) {
            Some(d) if d.as_class().is_some() => decl,
            Some(_) => match model.owner_class_of(decl) {
                Some(c) => c,
                None => return false,
            },
            None => return false,
        };
        let Some(class_decl) = model.get(class_id) else {
            return false;
        };
        if class_decl.is_library {
            return false;
        }
        let Some(class) = class_decl.as_class() else {
            return false;
        };
        self.session.scope_packages.is_empty()
            || self
                .session
                .scope_packages
                .iter()
                .any(|p| class.qualified_name.starts_with(p.as_str()))
    }

    /// Lazily materialize the node for a declaration. Returns None when the
    /// declaration is outside the analysis scope or gone from the model.
    /// Creation runs phase 1 (structural initialization) immediately; it
    /// may recursively create ancestor nodes but never runs phase 2.
    pub fn get_or_create_reference(
        &mut self,
        model: &ProgramModel,
        decl: DeclId,
    ) -> Option<NodeId> {
        if let Some(&id) = self.decl_map.get(&decl) {
            return Some(id);
        }
        if !self.belongs_to_scope(model, decl) {
            return None;
        }
        match &model.get(decl)?.kind {
            DeclKind::Class(_) => self.create_class_node(model, decl),
            DeclKind::Method(_) => self.create_method_node(model, decl),
            DeclKind::Field(_) => self.create_field_node(model, decl),
            DeclKind::Parameter(_) => self.create_parameter_node(model, decl),
        }
    }

    pub(crate) fn register(&mut self, decl: DeclId, id: NodeId) {
        self.decl_map.insert(decl, id);
    }

    /// Package entity a top-level class is owned by
    pub(crate) fn get_or_create_package(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.packages.get(name) {
            return id;
        }
        let display = if name.is_empty() { "<default>" } else { name };
        let id = self.alloc(Node::new(display.to_string(), None, NodeKind::Package));
        self.packages.insert(name.to_string(), id);
        id
    }

    pub fn package(&self, name: &str) -> Option<NodeId> {
        self.packages.get(name).copied()
    }

    // ---- containment --------------------------------------------------

    /// Adopt `child` under `owner`. Reassignment updates both sides: the
    /// previous owner's child list drops the node.
    pub(crate) fn add_child(&mut self, owner: NodeId, child: NodeId) {
        let previous = self.node(child).and_then(|n| n.owner());
        if previous == Some(owner) {
            return;
        }
        if let Some(prev) = previous {
            if let Some(node) = self.node_mut(prev) {
                node.children.retain(|&c| c != child);
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.owner = Some(owner);
        }
        if let Some(node) = self.node_mut(owner) {
            node.children.push(child);
        }
    }

    // ---- usage edges --------------------------------------------------

    /// Register a directed usage edge. Both endpoints are updated together;
    /// re-registration is a no-op. Fires the marked-referenced event on a
    /// newly seen edge.
    pub(crate) fn add_usage_edge(&mut self, from: NodeId, to: NodeId, via_initializer_write: bool) {
        if from == to {
            return;
        }
        if self.node(from).is_none() || self.node(to).is_none() {
            return;
        }
        let inserted = self
            .node_mut(to)
            .map(|n| n.in_refs.insert(from))
            .unwrap_or(false);
        if let Some(node) = self.node_mut(from) {
            node.out_refs.insert(to);
        }
        if inserted {
            self.fire(GraphEvent::MarkedReferenced {
                node: to,
                from,
                via_initializer_write,
            });
        }
    }

    /// Who uses this node (sorted for deterministic output)
    pub fn in_references(&self, id: NodeId) -> Vec<NodeId> {
        let mut refs: Vec<NodeId> = self
            .node(id)
            .map(|n| n.in_refs.iter().copied().collect())
            .unwrap_or_default();
        refs.sort();
        refs
    }

    /// Whom this node uses (sorted for deterministic output)
    pub fn out_references(&self, id: NodeId) -> Vec<NodeId> {
        let mut refs: Vec<NodeId> = self
            .node(id)
            .map(|n| n.out_refs.iter().copied().collect())
            .unwrap_or_default();
        refs.sort();
        refs
    }

    pub(crate) fn has_in_references(&self, id: NodeId) -> bool {
        self.node(id).map(|n| !n.in_refs.is_empty()).unwrap_or(false)
    }

    pub(crate) fn has_out_references(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| !n.out_refs.is_empty())
            .unwrap_or(false)
    }

    /// Is `node` equal to `root` or owned by it, transitively?
    pub(crate) fn is_within(&self, node: NodeId, root: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(c) = current {
            if c == root {
                return true;
            }
            current = self.node(c).and_then(|n| n.owner());
        }
        false
    }

    /// Does `id` have an incoming usage edge from outside `root`'s subtree?
    pub(crate) fn has_external_in_reference(&self, id: NodeId, root: NodeId) -> bool {
        self.node(id)
            .map(|n| n.in_refs.iter().any(|&from| !self.is_within(from, root)))
            .unwrap_or(false)
    }

    // ---- derived predicates -------------------------------------------

    pub fn is_referenced(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        match node.kind() {
            RefKind::Class => self.class_is_referenced(id),
            RefKind::Method => self.method_is_referenced(id),
            _ => !node.in_refs.is_empty(),
        }
    }

    /// Candidate for unused reporting. Derived from current edge state at
    /// query time, never cached.
    pub fn is_suspicious(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.is_entry() {
            return false;
        }
        match node.kind() {
            RefKind::Package => false,
            RefKind::Class => self.class_is_suspicious(id),
            RefKind::Method => self.method_is_suspicious(id),
            RefKind::Field => self.field_is_suspicious(id),
            RefKind::Parameter => !self.is_referenced(id),
        }
    }

    pub fn set_entry(&mut self, id: NodeId, entry: bool) {
        if let Some(node) = self.node_mut(id) {
            node.set_flag(entry, masks::IS_ENTRY);
        }
    }

    /// Mark a node's backing declaration as unavailable (concurrent edit).
    /// Accessors report invalidity from now on; the caller is expected to
    /// follow up with [`RefGraph::remove_node`].
    pub fn invalidate(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.set_flag(true, masks::IS_DELETED);
        }
    }

    // ---- removal ------------------------------------------------------

    /// Remove a node and everything it owns, unwinding every edge that
    /// touches them. Safe to call on a node whose neighbors are
    /// mid-removal: the slot is cleared before neighbors are visited, so
    /// re-entrant removal is a no-op.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(slot) = self.nodes.get_mut(id.index()) else {
            return;
        };
        let Some(node) = slot.take() else {
            return;
        };

        if let Some(decl) = node.decl {
            self.decl_map.remove(&decl);
        }

        // Owner's child list drops the node
        if let Some(owner) = node.owner {
            if let Some(owner_node) = self.node_mut(owner) {
                owner_node.children.retain(|&c| c != id);
            }
        }

        // Kind-specific structural unwinding
        match &node.kind {
            NodeKind::Class(data) => self.unlink_class(id, data),
            NodeKind::Method(data) => self.unlink_method(id, node.owner, data),
            _ => {}
        }

        // Generic edge unwinding: excise the node from both directions of
        // every usage edge it participates in.
        for &out in &node.out_refs {
            if let Some(target) = self.node_mut(out) {
                target.in_refs.remove(&id);
            }
        }
        for &inc in &node.in_refs {
            if let Some(source) = self.node_mut(inc) {
                source.out_refs.remove(&id);
            }
        }

        // Type/instance reference sets index nodes without a reverse edge;
        // sweep them so no surviving edge set mentions the node.
        for slot in self.nodes.iter_mut() {
            if let Some(other) = slot {
                if let NodeKind::Class(data) = &mut other.kind {
                    data.in_type_references.remove(&id);
                    data.instance_references.remove(&id);
                }
            }
        }

        // Children go with their owner: class members and synthesized
        // constructors, method parameters.
        for &child in &node.children {
            self.remove_node(child);
        }

        self.fire(GraphEvent::Removed { node: id });
    }

    fn unlink_class(&mut self, id: NodeId, data: &ClassData) {
        for &sub in &data.subclasses {
            if let Some(subclass) = self.node_mut(sub).and_then(|n| n.class_data_mut()) {
                subclass.bases.remove(&id);
            }
        }
        for &base in &data.bases {
            if let Some(base_class) = self.node_mut(base).and_then(|n| n.class_data_mut()) {
                base_class.subclasses.remove(&id);
            }
        }
    }

    fn unlink_method(&mut self, id: NodeId, owner: Option<NodeId>, data: &MethodData) {
        for &sup in &data.super_methods {
            if let Some(super_method) = self.node_mut(sup).and_then(|n| n.method_data_mut()) {
                super_method.derived_methods.retain(|&m| m != id);
            }
        }
        for &der in &data.derived_methods {
            if let Some(derived) = self.node_mut(der).and_then(|n| n.method_data_mut()) {
                derived.super_methods.retain(|&m| m != id);
            }
        }
        if let Some(class) = owner
            .and_then(|o| self.node_mut(o))
            .and_then(|n| n.class_data_mut())
        {
            class.constructors.retain(|&m| m != id);
            class.library_override_methods.retain(|&m| m != id);
            if class.default_constructor == Some(id) {
                class.default_constructor = None;
            }
        }
    }

    // ---- snapshots ----------------------------------------------------

    /// Snapshot of the usage edges as a petgraph graph, for algorithms
    /// (reachability, dead cycles) that want classic traversals.
    pub fn usage_graph(
        &self,
    ) -> (
        DiGraph<NodeId, ()>,
        HashMap<NodeId, petgraph::graph::NodeIndex>,
    ) {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for (id, _) in self.nodes() {
            index.insert(id, graph.add_node(id));
        }
        for (id, node) in self.nodes() {
            for &out in &node.out_refs {
                if let (Some(&a), Some(&b)) = (index.get(&id), index.get(&out)) {
                    graph.add_edge(a, b, ());
                }
            }
        }
        (graph, index)
    }

    // ---- events -------------------------------------------------------

    pub(crate) fn fire(&self, event: GraphEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    /// Debug-build check of the bidirectional edge invariants
    #[cfg(debug_assertions)]
    pub(crate) fn assert_edge_invariants(&self) {
        for (id, node) in self.nodes() {
            for &out in &node.out_refs {
                debug_assert!(
                    self.node(out)
                        .map(|n| n.in_refs.contains(&id))
                        .unwrap_or(false),
                    "half edge: {} -> {} missing inverse",
                    id,
                    out
                );
            }
            if let Some(data) = node.class_data() {
                for &base in &data.bases {
                    debug_assert!(
                        self.node(base)
                            .and_then(|n| n.class_data())
                            .map(|d| d.subclasses.contains(&id))
                            .unwrap_or(false),
                        "base/subclass out of sync for {}",
                        id
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for RefGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefGraph")
            .field("nodes", &self.node_count())
            .field("declarations", &self.decl_map.len())
            .finish()
    }
}
