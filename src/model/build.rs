// Fluent construction of program models, used by fixtures and tests.

use super::*;

/// Builds a [`ProgramModel`] declaration by declaration.
///
/// Ids are handed out eagerly so declarations can reference each other
/// before the model is finished.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    decls: Vec<Declaration>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(&mut self, qualified_name: &str) -> ClassBuilder<'_> {
        let name = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(qualified_name)
            .to_string();
        let id = self.push(Declaration {
            name,
            owner: None,
            modifiers: Modifiers::default(),
            is_library: false,
            kind: DeclKind::Class(ClassDecl {
                qualified_name: qualified_name.to_string(),
                kind: ClassKind::Class,
                is_anonymous: false,
                is_local: false,
                supers: vec![],
                fields: vec![],
                methods: vec![],
                initializers: vec![],
            }),
        });
        ClassBuilder { model: self, id }
    }

    pub fn finish(self) -> ProgramModel {
        ProgramModel::new(self.decls)
    }

    fn push(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    fn decl_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.index()]
    }

    fn class_mut(&mut self, id: DeclId) -> &mut ClassDecl {
        match &mut self.decl_mut(id).kind {
            DeclKind::Class(c) => c,
            _ => unreachable!("not a class id"),
        }
    }

    fn method_mut(&mut self, id: DeclId) -> &mut MethodDecl {
        match &mut self.decl_mut(id).kind {
            DeclKind::Method(m) => m,
            _ => unreachable!("not a method id"),
        }
    }

    fn field_mut(&mut self, id: DeclId) -> &mut FieldDecl {
        match &mut self.decl_mut(id).kind {
            DeclKind::Field(f) => f,
            _ => unreachable!("not a field id"),
        }
    }
}

/// Builder for one class declaration
pub struct ClassBuilder<'a> {
    model: &'a mut ModelBuilder,
    id: DeclId,
}

impl<'a> ClassBuilder<'a> {
    pub fn id(&self) -> DeclId {
        self.id
    }

    pub fn interface(self) -> Self {
        self.model.class_mut(self.id).kind = ClassKind::Interface;
        self
    }

    pub fn enum_class(self) -> Self {
        self.model.class_mut(self.id).kind = ClassKind::Enum;
        self
    }

    pub fn anonymous(self) -> Self {
        self.model.class_mut(self.id).is_anonymous = true;
        self
    }

    pub fn local(self) -> Self {
        self.model.class_mut(self.id).is_local = true;
        self
    }

    pub fn library(self) -> Self {
        self.model.decl_mut(self.id).is_library = true;
        self
    }

    pub fn abstract_class(self) -> Self {
        self.model.decl_mut(self.id).modifiers.is_abstract = true;
        self
    }

    pub fn visibility(self, v: Visibility) -> Self {
        self.model.decl_mut(self.id).modifiers.visibility = v;
        self
    }

    pub fn extends(self, super_class: DeclId) -> Self {
        self.model
            .class_mut(self.id)
            .supers
            .push(DeclRef::Declared(super_class));
        self
    }

    pub fn extends_external(self, name: &str) -> Self {
        self.model
            .class_mut(self.id)
            .supers
            .push(DeclRef::External(name.to_string()));
        self
    }

    pub fn initializer(self, ops: Vec<BodyOp>) -> Self {
        self.model.class_mut(self.id).initializers.push(ops);
        self
    }

    /// Add a method (or constructor) member to this class.
    pub fn method(&mut self, name: &str) -> MethodBuilder<'_> {
        let class_id = self.id;
        let id = self.model.push(Declaration {
            name: name.to_string(),
            owner: Some(class_id),
            modifiers: Modifiers::default(),
            is_library: false,
            kind: DeclKind::Method(MethodDecl {
                is_constructor: false,
                return_type: None,
                params: vec![],
                throws: vec![],
                overrides: vec![],
                body: Some(vec![]),
            }),
        });
        self.model.class_mut(class_id).methods.push(id);
        MethodBuilder {
            model: self.model,
            id,
        }
    }

    /// Add a field member to this class.
    pub fn field(&mut self, name: &str) -> FieldBuilder<'_> {
        let class_id = self.id;
        let id = self.model.push(Declaration {
            name: name.to_string(),
            owner: Some(class_id),
            modifiers: Modifiers::default(),
            is_library: false,
            kind: DeclKind::Field(FieldDecl {
                declared_type: None,
                initializer: None,
                is_enum_constant: false,
            }),
        });
        self.model.class_mut(class_id).fields.push(id);
        FieldBuilder {
            model: self.model,
            id,
        }
    }
}

/// Builder for one method declaration
pub struct MethodBuilder<'a> {
    model: &'a mut ModelBuilder,
    id: DeclId,
}

impl<'a> MethodBuilder<'a> {
    pub fn id(&self) -> DeclId {
        self.id
    }

    pub fn constructor(self) -> Self {
        self.model.method_mut(self.id).is_constructor = true;
        self
    }

    pub fn returns(self, type_name: TypeName) -> Self {
        self.model.method_mut(self.id).return_type = Some(type_name);
        self
    }

    pub fn param(self, type_name: &str) -> Self {
        let method_id = self.id;
        let index = self.model.method_mut(method_id).params.len();
        let id = self.model.push(Declaration {
            name: format!("p{}", index),
            owner: Some(method_id),
            modifiers: Modifiers::default(),
            is_library: false,
            kind: DeclKind::Parameter(ParamDecl {
                index,
                type_name: type_name.to_string(),
            }),
        });
        self.model.method_mut(method_id).params.push(id);
        self
    }

    pub fn throws(self, exception: TypeName) -> Self {
        self.model.method_mut(self.id).throws.push(exception);
        self
    }

    pub fn overrides(self, super_method: DeclId) -> Self {
        self.model
            .method_mut(self.id)
            .overrides
            .push(DeclRef::Declared(super_method));
        self
    }

    pub fn overrides_external(self, signature: &str) -> Self {
        self.model
            .method_mut(self.id)
            .overrides
            .push(DeclRef::External(signature.to_string()));
        self
    }

    pub fn body(self, ops: Vec<BodyOp>) -> Self {
        self.model.method_mut(self.id).body = Some(ops);
        self
    }

    pub fn no_body(self) -> Self {
        self.model.method_mut(self.id).body = None;
        self
    }

    pub fn static_method(self) -> Self {
        self.model.decl_mut(self.id).modifiers.is_static = true;
        self
    }

    pub fn abstract_method(self) -> Self {
        self.model.decl_mut(self.id).modifiers.is_abstract = true;
        self.no_body()
    }

    pub fn native(self) -> Self {
        self.model.decl_mut(self.id).modifiers.is_native = true;
        self.no_body()
    }

    pub fn visibility(self, v: Visibility) -> Self {
        self.model.decl_mut(self.id).modifiers.visibility = v;
        self
    }

    pub fn done(self) -> DeclId {
        self.id
    }
}

/// Builder for one field declaration
pub struct FieldBuilder<'a> {
    model: &'a mut ModelBuilder,
    id: DeclId,
}

impl<'a> FieldBuilder<'a> {
    pub fn id(&self) -> DeclId {
        self.id
    }

    pub fn typed(self, type_name: TypeName) -> Self {
        self.model.field_mut(self.id).declared_type = Some(type_name);
        self
    }

    pub fn initializer(self, ops: Vec<BodyOp>) -> Self {
        self.model.field_mut(self.id).initializer = Some(ops);
        self
    }

    pub fn enum_constant(self) -> Self {
        self.model.field_mut(self.id).is_enum_constant = true;
        self
    }

    pub fn static_field(self) -> Self {
        self.model.decl_mut(self.id).modifiers.is_static = true;
        self
    }

    pub fn final_field(self) -> Self {
        self.model.decl_mut(self.id).modifiers.is_final = true;
        self
    }

    pub fn visibility(self, v: Visibility) -> Self {
        self.model.decl_mut(self.id).modifiers.visibility = v;
        self
    }

    pub fn done(self) -> DeclId {
        self.id
    }
}
