// Program model - the symbol/AST service boundary the graph is built from.
// Some accessors reserved for future use
#![allow(dead_code)]

mod build;

pub use build::{ClassBuilder, MethodBuilder, ModelBuilder};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Model loading errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse model: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Unique identifier for a declaration in the program model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DeclId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Visibility modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    PackagePrivate,
    Private,
}

impl Visibility {
    /// Rank for access comparison; wider access ranks higher.
    pub fn rank(self) -> u8 {
        match self {
            Visibility::Public => 3,
            Visibility::Protected => 2,
            Visibility::PackagePrivate => 1,
            Visibility::Private => 0,
        }
    }

    pub fn is_at_least(self, other: Visibility) -> bool {
        self.rank() >= other.rank()
    }
}

/// Modifier set of a declaration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_native: bool,
}

/// A type mention: display text plus the in-model class it resolves to, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeName {
    /// Textual form, e.g. "java.lang.String" or "int"
    pub display: String,
    /// Resolved class declaration when the type is part of the analyzed program
    #[serde(default)]
    pub decl: Option<DeclId>,
}

impl TypeName {
    pub fn external(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            decl: None,
        }
    }

    pub fn declared(display: impl Into<String>, decl: DeclId) -> Self {
        Self {
            display: display.into(),
            decl: Some(decl),
        }
    }
}

/// A reference to another declaration, which may not be resolvable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclRef {
    /// Resolved to a declaration in the model
    Declared(DeclId),
    /// Known only by name (library code, unresolvable)
    External(String),
}

impl DeclRef {
    pub fn declared(&self) -> Option<DeclId> {
        match self {
            DeclRef::Declared(id) => Some(*id),
            DeclRef::External(_) => None,
        }
    }
}

/// Constant-argument snapshot at a call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arg {
    /// Literal constant, e.g. "42" or "\"name\""
    Literal(String),
    /// Anything else
    Unknown,
}

/// Expression returned from a method body, reduced to what the graph tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnExpr {
    /// Literal constant
    Literal(String),
    /// Reference to a field; counts as a template only if static final and accessible
    FieldRef(DeclId),
    /// `return super.sameMethod(...)` - does not affect the template
    SuperCall,
    /// Anything else
    Unknown,
}

/// One resolved usage event inside executable content.
///
/// The symbol service reduces statements to this sequence; the graph never
/// sees raw syntax trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyOp {
    /// Method invocation
    Call {
        target: DeclRef,
        #[serde(default)]
        args: Vec<Arg>,
        /// Receiver is typed as a subclass of the method's owner
        #[serde(default)]
        on_subclass: bool,
        /// The call's result is consumed by the caller
        #[serde(default)]
        result_used: bool,
    },
    /// Field read
    Read { target: DeclRef },
    /// Field write
    Write { target: DeclRef },
    /// Constructor invocation via `new`
    Instantiate { ctor: DeclRef },
    /// Type mention (cast, local declaration, class literal)
    TypeUse { class: DeclRef },
    /// Read of a parameter of the enclosing method
    ReadParam { index: usize },
    /// Checked exception escaping this body unhandled
    Escapes { exception: TypeName },
    /// Return statement
    Return { value: ReturnExpr },
    /// Explicit `super(...)` or `this(...)` as the first constructor
    /// statement; suppresses the implicit chain to the base default
    /// constructor.
    ExplicitCtorCall { target: DeclRef },
}

/// Kind discriminator with per-kind payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclKind {
    Class(ClassDecl),
    Method(MethodDecl),
    Field(FieldDecl),
    Parameter(ParamDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Fully qualified name, e.g. "com.example.Main"
    pub qualified_name: String,
    pub kind: ClassKind,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub is_local: bool,
    /// Supertypes: superclass and implemented interfaces
    #[serde(default)]
    pub supers: Vec<DeclRef>,
    #[serde(default)]
    pub fields: Vec<DeclId>,
    #[serde(default)]
    pub methods: Vec<DeclId>,
    /// Static and instance initializer blocks
    #[serde(default)]
    pub initializers: Vec<Vec<BodyOp>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    #[serde(default)]
    pub is_constructor: bool,
    /// None for void and constructors
    #[serde(default)]
    pub return_type: Option<TypeName>,
    #[serde(default)]
    pub params: Vec<DeclId>,
    /// Declared checked exceptions
    #[serde(default)]
    pub throws: Vec<TypeName>,
    /// Methods this one overrides; external entries cannot be tracked
    #[serde(default)]
    pub overrides: Vec<DeclRef>,
    /// None when the method has no body (abstract, native)
    #[serde(default)]
    pub body: Option<Vec<BodyOp>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    #[serde(default)]
    pub declared_type: Option<TypeName>,
    #[serde(default)]
    pub initializer: Option<Vec<BodyOp>>,
    #[serde(default)]
    pub is_enum_constant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub index: usize,
    /// Parameter type text, used in method signatures
    pub type_name: String,
}

/// A declaration known to the program model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    #[serde(default)]
    pub owner: Option<DeclId>,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Library declarations are enumerated but lie outside the analysis scope
    #[serde(default)]
    pub is_library: bool,
    pub kind: DeclKind,
}

impl Declaration {
    pub fn as_class(&self) -> Option<&ClassDecl> {
        match &self.kind {
            DeclKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodDecl> {
        match &self.kind {
            DeclKind::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldDecl> {
        match &self.kind {
            DeclKind::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParamDecl> {
        match &self.kind {
            DeclKind::Parameter(p) => Some(p),
            _ => None,
        }
    }
}

/// The whole analyzed program, as handed over by the symbol service.
///
/// Declarations are addressed by index. Retiring a declaration models a
/// concurrent edit deleting it; lookups then report "gone" instead of
/// returning stale data.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProgramModel {
    decls: Vec<Declaration>,
    #[serde(skip)]
    retired: HashSet<DeclId>,
}

impl ProgramModel {
    pub fn new(decls: Vec<Declaration>) -> Self {
        Self {
            decls,
            retired: HashSet::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Look up a declaration; None if the id is stale or the declaration
    /// was retired by an edit.
    pub fn get(&self, id: DeclId) -> Option<&Declaration> {
        if self.retired.contains(&id) {
            return None;
        }
        self.decls.get(id.index())
    }

    /// Mark a declaration as deleted from the program.
    pub fn retire(&mut self, id: DeclId) {
        self.retired.insert(id);
    }

    pub fn ids(&self) -> impl Iterator<Item = DeclId> + '_ {
        (0..self.decls.len() as u32)
            .map(DeclId)
            .filter(move |id| !self.retired.contains(id))
    }

    /// All class declarations, in model order
    pub fn classes(&self) -> impl Iterator<Item = (DeclId, &Declaration, &ClassDecl)> {
        self.ids().filter_map(move |id| {
            let decl = self.get(id)?;
            decl.as_class().map(|c| (id, decl, c))
        })
    }

    pub fn find_class_by_qualified_name(&self, fqn: &str) -> Option<DeclId> {
        self.classes()
            .find(|(_, _, c)| c.qualified_name == fqn)
            .map(|(id, _, _)| id)
    }

    /// Fully qualified name of the class owning a declaration, walking up
    /// through nested members.
    pub fn owner_class_of(&self, id: DeclId) -> Option<DeclId> {
        let mut current = self.get(id)?.owner;
        while let Some(owner) = current {
            let decl = self.get(owner)?;
            if decl.as_class().is_some() {
                return Some(owner);
            }
            current = decl.owner;
        }
        None
    }

    /// Package portion of a class's qualified name ("" for the default package)
    pub fn package_of(&self, class: DeclId) -> Option<String> {
        let c = self.get(class)?.as_class()?;
        Some(match c.qualified_name.rfind('.') {
            Some(idx) => c.qualified_name[..idx].to_string(),
            None => String::new(),
        })
    }

    /// Does `sub` inherit from `sup` (or equal it), through declared supers?
    pub fn is_inheritor_or_self(&self, sub: DeclId, sup: DeclId) -> bool {
        if sub == sup {
            return true;
        }
        let mut visited = HashSet::new();
        self.inherits_inner(sub, sup, &mut visited)
    }

    fn inherits_inner(&self, sub: DeclId, sup: DeclId, visited: &mut HashSet<DeclId>) -> bool {
        if !visited.insert(sub) {
            return false;
        }
        let Some(class) = self.get(sub).and_then(|d| d.as_class()) else {
            return false;
        };
        for super_ref in &class.supers {
            if let DeclRef::Declared(id) = super_ref {
                if *id == sup || self.inherits_inner(*id, sup, visited) {
                    return true;
                }
            }
        }
        false
    }

    /// Does the class transitively inherit a supertype whose name matches?
    /// Checks both declared supers (by qualified name) and external names.
    pub fn inherits_matching(&self, class: DeclId, matches: &dyn Fn(&str) -> bool) -> bool {
        let mut visited = HashSet::new();
        self.inherits_matching_inner(class, matches, &mut visited)
    }

    fn inherits_matching_inner(
        &self,
        class: DeclId,
        matches: &dyn Fn(&str) -> bool,
        visited: &mut HashSet<DeclId>,
    ) -> bool {
        if !visited.insert(class) {
            return false;
        }
        let Some(c) = self.get(class).and_then(|d| d.as_class()) else {
            return false;
        };
        for super_ref in &c.supers {
            match super_ref {
                DeclRef::External(name) => {
                    if matches(name) {
                        return true;
                    }
                }
                DeclRef::Declared(id) => {
                    if let Some(sc) = self.get(*id).and_then(|d| d.as_class()) {
                        if matches(&sc.qualified_name) {
                            return true;
                        }
                    }
                    if self.inherits_matching_inner(*id, matches, visited) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Detects inheritance cycles: a class that (transitively) lists itself
    /// among its own supertypes. Such classes get no base links.
    pub fn is_self_inheritor(&self, class: DeclId) -> bool {
        let mut path = Vec::new();
        self.self_inheritor_inner(class, &mut path)
    }

    fn self_inheritor_inner(&self, class: DeclId, path: &mut Vec<DeclId>) -> bool {
        if path.contains(&class) {
            return true;
        }
        path.push(class);
        let mut cyclic = false;
        if let Some(c) = self.get(class).and_then(|d| d.as_class()) {
            for super_ref in &c.supers {
                if let DeclRef::Declared(id) = super_ref {
                    if self.self_inheritor_inner(*id, path) {
                        cyclic = true;
                        break;
                    }
                }
            }
        }
        path.pop();
        cyclic
    }

    /// Are two exception types the same or related by inheritance in either
    /// direction? External types compare by name only.
    pub fn exceptions_related(&self, a: &TypeName, b: &TypeName) -> bool {
        if a.display == b.display {
            return true;
        }
        match (a.decl, b.decl) {
            (Some(x), Some(y)) => self.is_inheritor_or_self(x, y) || self.is_inheritor_or_self(y, x),
            (Some(x), None) => self.inherits_matching(x, &|name| name == b.display),
            (None, Some(y)) => self.inherits_matching(y, &|name| name == a.display),
            (None, None) => false,
        }
    }

    /// Render a method signature as "<return> <name>(<param types>)".
    pub fn method_signature(&self, method: DeclId) -> Option<String> {
        let decl = self.get(method)?;
        let m = decl.as_method()?;
        let ret = m
            .return_type
            .as_ref()
            .map(|t| t.display.as_str())
            .unwrap_or("void");
        let params: Vec<&str> = m
            .params
            .iter()
            .filter_map(|p| self.get(*p))
            .filter_map(|p| p.as_parameter())
            .map(|p| p.type_name.as_str())
            .collect();
        Some(format!("{} {}({})", ret, decl.name, params.join(", ")))
    }
}
