//! Symbols and their namespaces

use std::fmt;

use crate::frontend::ast::NodeId;
use crate::semantic::const_eval::ConstValue;
use crate::semantic::scope::ScopeId;
use crate::types::Type;
use crate::utils::Span;

/// Index of a symbol in the symbol table arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

/// The three independent name spaces of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Type,
    Value,
    Field,
}

impl Namespace {
    pub fn name(self) -> &'static str {
        match self {
            Namespace::Type => "type",
            Namespace::Value => "value",
            Namespace::Field => "field",
        }
    }
}

/// Kind of symbol. The kind fixes the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    // Type namespace
    Struct,
    Enum,
    Trait,
    BuiltinType,
    // Value namespace
    Function,
    /// Builtin method such as `len`; never entered into a scope
    BuiltinMethod,
    Constant,
    StructConstructor,
    EnumVariant,
    Parameter,
    /// The `self` parameter of a method
    SelfValue,
    LocalVariable,
    // Field namespace
    Field,
}

impl SymbolKind {
    pub fn namespace(self) -> Namespace {
        match self {
            SymbolKind::Struct | SymbolKind::Enum | SymbolKind::Trait | SymbolKind::BuiltinType => {
                Namespace::Type
            }
            SymbolKind::Function
            | SymbolKind::BuiltinMethod
            | SymbolKind::Constant
            | SymbolKind::StructConstructor
            | SymbolKind::EnumVariant
            | SymbolKind::Parameter
            | SymbolKind::SelfValue
            | SymbolKind::LocalVariable => Namespace::Value,
            SymbolKind::Field => Namespace::Field,
        }
    }

    /// Bindings introduced by patterns and parameter lists
    pub fn is_binding(self) -> bool {
        matches!(
            self,
            SymbolKind::Parameter | SymbolKind::SelfValue | SymbolKind::LocalVariable
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Trait => "trait",
            SymbolKind::BuiltinType => "builtin type",
            SymbolKind::Function => "function",
            SymbolKind::BuiltinMethod => "builtin method",
            SymbolKind::Constant => "constant",
            SymbolKind::StructConstructor => "struct constructor",
            SymbolKind::EnumVariant => "enum variant",
            SymbolKind::Parameter => "parameter",
            SymbolKind::SelfValue => "self parameter",
            SymbolKind::LocalVariable => "local variable",
            SymbolKind::Field => "field",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Declared identity behind a name
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declaring node; `None` for builtins
    pub decl: Option<NodeId>,
    pub span: Span,
    pub scope: ScopeId,
    pub scope_level: usize,
    pub mutable: bool,
    /// Type this symbol belongs to (fields, variants, constructors, impl members)
    pub owner_type: Option<SymbolId>,
    /// Struct fields or enum variants, in declaration order
    pub members: Vec<SymbolId>,
    /// Functions and constants attached by impl blocks
    pub impl_members: Vec<SymbolId>,
    /// Constructor of a struct
    pub constructor: Option<SymbolId>,
    /// Cached type
    pub ty: Option<Type>,
    /// Cached value of a constant
    pub constant: Option<ConstValue>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, decl: Option<NodeId>, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            decl,
            span,
            scope: ScopeId(0),
            scope_level: 0,
            mutable: false,
            owner_type: None,
            members: Vec::new(),
            impl_members: Vec::new(),
            constructor: None,
            ty: None,
            constant: None,
        }
    }

    pub fn with_mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    pub fn with_owner(mut self, owner: SymbolId) -> Self {
        self.owner_type = Some(owner);
        self
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn namespace(&self) -> Namespace {
        self.kind.namespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_determines_namespace() {
        assert_eq!(SymbolKind::Struct.namespace(), Namespace::Type);
        assert_eq!(SymbolKind::StructConstructor.namespace(), Namespace::Value);
        assert_eq!(SymbolKind::LocalVariable.namespace(), Namespace::Value);
        assert_eq!(SymbolKind::Field.namespace(), Namespace::Field);
    }

    #[test]
    fn test_builder() {
        let symbol = Symbol::new("x", SymbolKind::LocalVariable, Some(NodeId(3)), Span::dummy())
            .with_mutable(true)
            .with_type(Type::I32);
        assert!(symbol.mutable);
        assert_eq!(symbol.ty, Some(Type::I32));
        assert_eq!(symbol.namespace(), Namespace::Value);
    }
}
