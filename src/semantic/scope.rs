//! Scoped symbol table
//!
//! Scopes form a tree stored in an arena. Every scope keeps three independent
//! maps (types, values, fields keyed by owning type name) and the AST node that
//! opened it, so the checking pass can re-enter exactly the scope the
//! declaration pass created for that node.

use std::collections::HashMap;

use log::trace;

use crate::frontend::ast::NodeId;
use crate::semantic::symbol::{Namespace, Symbol, SymbolId, SymbolKind};
use crate::utils::{Error, Result, Span};

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// A scope containing symbols
#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub level: usize,
    /// Node that opened this scope; `None` for the global scope
    pub owner: Option<NodeId>,
    types: HashMap<String, SymbolId>,
    values: HashMap<String, SymbolId>,
    fields: HashMap<(String, String), SymbolId>,
}

impl Scope {
    fn map(&self, namespace: Namespace) -> Option<&HashMap<String, SymbolId>> {
        match namespace {
            Namespace::Type => Some(&self.types),
            Namespace::Value => Some(&self.values),
            Namespace::Field => None,
        }
    }
}

/// Symbol table with nested scopes
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    scope_of: HashMap<NodeId, ScopeId>,
    current: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            symbols: Vec::new(),
            scope_of: HashMap::new(),
            current: ScopeId(0),
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Scope opened by `owner`, if any
    pub fn scope_for(&self, owner: NodeId) -> Option<ScopeId> {
        self.scope_of.get(&owner).copied()
    }

    // ==================== Scope Navigation ====================

    /// Create a child of the current scope for `owner` and enter it
    pub fn push_scope(&mut self, owner: NodeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        let level = self.scopes[self.current.0].level + 1;
        self.scopes.push(Scope {
            parent: Some(self.current),
            level,
            owner: Some(owner),
            ..Scope::default()
        });
        self.scopes[self.current.0].children.push(id);
        self.scope_of.insert(owner, id);
        self.current = id;
        trace!("created scope {} at level {} for node {}", id.0, level, owner);
        id
    }

    /// Re-enter the scope created for `owner`. It must be a child of the
    /// current scope.
    pub fn enter_scope(&mut self, owner: NodeId, span: Span) -> Result<ScopeId> {
        match self.scope_of.get(&owner) {
            Some(&id) if self.scopes[id.0].parent == Some(self.current) => {
                self.current = id;
                Ok(id)
            }
            _ => Err(Error::ScopeMismatch { span }),
        }
    }

    /// Exit the current scope
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    // ==================== Symbols ====================

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i), s))
    }

    pub fn symbols_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        self.symbols.iter_mut()
    }

    /// Store a symbol that is not visible through any scope map
    pub fn add_detached(&mut self, mut symbol: Symbol) -> SymbolId {
        symbol.scope = self.current;
        symbol.scope_level = self.scopes[self.current.0].level;
        let id = SymbolId(self.symbols.len());
        self.symbols.push(symbol);
        id
    }

    /// Declare a symbol in the current scope.
    ///
    /// Names are unique per map and scope, except that a binding may shadow
    /// an earlier binding. No binding may share its name with a constant
    /// anywhere in the enclosing scope chain.
    pub fn declare(&mut self, symbol: Symbol) -> Result<SymbolId> {
        let name = symbol.name.clone();
        let kind = symbol.kind;
        let span = symbol.span;
        let namespace = kind.namespace();

        match namespace {
            Namespace::Type => {
                if self.scopes[self.current.0].types.contains_key(&name) {
                    return Err(Self::duplicate(name, namespace, span));
                }
            }
            Namespace::Value => self.check_value_declaration(&name, kind, span)?,
            Namespace::Field => {
                let key = (self.owner_name(&symbol), name.clone());
                if self.scopes[self.current.0].fields.contains_key(&key) {
                    return Err(Self::duplicate(name, namespace, span));
                }
            }
        }

        let owner = self.owner_name(&symbol);
        let id = self.add_detached(symbol);
        let scope = &mut self.scopes[self.current.0];
        match namespace {
            Namespace::Type => {
                scope.types.insert(name, id);
            }
            Namespace::Value => {
                scope.values.insert(name, id);
            }
            Namespace::Field => {
                scope.fields.insert((owner, name), id);
            }
        }
        Ok(id)
    }

    fn check_value_declaration(&self, name: &str, kind: SymbolKind, span: Span) -> Result<()> {
        if kind.is_binding() {
            if let Some(found) = self.lookup(Namespace::Value, name) {
                if self.symbol(found).kind == SymbolKind::Constant {
                    return Err(Error::ConstantConflict {
                        name: name.to_string(),
                        what: kind.describe(),
                        span,
                    });
                }
            }
        }

        let Some(&existing) = self.scopes[self.current.0].values.get(name) else {
            return Ok(());
        };
        let existing_kind = self.symbol(existing).kind;

        if kind == SymbolKind::LocalVariable && existing_kind.is_binding() {
            return Ok(());
        }
        if kind == SymbolKind::Constant && existing_kind.is_binding() {
            return Err(Error::ConstantConflict {
                name: name.to_string(),
                what: existing_kind.describe(),
                span,
            });
        }
        Err(Self::duplicate(name.to_string(), Namespace::Value, span))
    }

    fn duplicate(name: String, namespace: Namespace, span: Span) -> Error {
        Error::DuplicateDefinition {
            name,
            namespace: namespace.name(),
            span,
        }
    }

    fn owner_name(&self, symbol: &Symbol) -> String {
        symbol
            .owner_type
            .map(|owner| self.symbol(owner).name.clone())
            .unwrap_or_default()
    }

    // ==================== Lookup ====================

    /// Look up a name from the current scope upward
    pub fn lookup(&self, namespace: Namespace, name: &str) -> Option<SymbolId> {
        self.lookup_from(self.current, namespace, name)
    }

    /// Look up a name from `scope` upward
    pub fn lookup_from(&self, scope: ScopeId, namespace: Namespace, name: &str) -> Option<SymbolId> {
        let mut scope_id = Some(scope);
        while let Some(id) = scope_id {
            let scope = &self.scopes[id.0];
            if let Some(&symbol) = scope.map(namespace).and_then(|map| map.get(name)) {
                return Some(symbol);
            }
            scope_id = scope.parent;
        }
        None
    }

    /// Look up a field of the type named `owner` from the current scope upward
    pub fn lookup_field(&self, owner: &str, field: &str) -> Option<SymbolId> {
        let key = (owner.to_string(), field.to_string());
        let mut scope_id = Some(self.current);
        while let Some(id) = scope_id {
            let scope = &self.scopes[id.0];
            if let Some(&symbol) = scope.fields.get(&key) {
                return Some(symbol);
            }
            scope_id = scope.parent;
        }
        None
    }

    /// Look up a name only in the current scope
    pub fn lookup_local(&self, namespace: Namespace, name: &str) -> Option<SymbolId> {
        self.scopes[self.current.0]
            .map(namespace)
            .and_then(|map| map.get(name))
            .copied()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, kind: SymbolKind) -> Symbol {
        Symbol::new(name, kind, None, Span::dummy())
    }

    #[test]
    fn test_nested_lookup() {
        let mut table = SymbolTable::new();
        let outer = table.declare(sym("x", SymbolKind::Function)).unwrap();
        table.push_scope(NodeId(1));
        assert_eq!(table.lookup(Namespace::Value, "x"), Some(outer));
        assert_eq!(table.lookup_local(Namespace::Value, "x"), None);
        let inner = table.declare(sym("x", SymbolKind::LocalVariable)).unwrap();
        assert_eq!(table.lookup(Namespace::Value, "x"), Some(inner));
        table.exit_scope();
        assert_eq!(table.lookup(Namespace::Value, "x"), Some(outer));
    }

    #[test]
    fn test_namespaces_are_independent() {
        let mut table = SymbolTable::new();
        let ty = table.declare(sym("P", SymbolKind::Struct)).unwrap();
        let ctor = table.declare(sym("P", SymbolKind::StructConstructor)).unwrap();
        assert_eq!(table.lookup(Namespace::Type, "P"), Some(ty));
        assert_eq!(table.lookup(Namespace::Value, "P"), Some(ctor));
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut table = SymbolTable::new();
        table.declare(sym("f", SymbolKind::Function)).unwrap();
        assert!(matches!(
            table.declare(sym("f", SymbolKind::Function)),
            Err(Error::DuplicateDefinition { namespace: "value", .. })
        ));
    }

    #[test]
    fn test_local_shadowing_and_constant_conflict() {
        let mut table = SymbolTable::new();
        table.push_scope(NodeId(1));
        table.declare(sym("x", SymbolKind::LocalVariable)).unwrap();
        assert!(table.declare(sym("x", SymbolKind::LocalVariable)).is_ok());
        assert!(matches!(
            table.declare(sym("x", SymbolKind::Constant)),
            Err(Error::ConstantConflict { .. })
        ));

        table.declare(sym("N", SymbolKind::Constant)).unwrap();
        table.push_scope(NodeId(2));
        assert!(matches!(
            table.declare(sym("N", SymbolKind::LocalVariable)),
            Err(Error::ConstantConflict { .. })
        ));
    }

    #[test]
    fn test_fields_are_keyed_by_owner() {
        let mut table = SymbolTable::new();
        let a = table.declare(sym("A", SymbolKind::Struct)).unwrap();
        let b = table.declare(sym("B", SymbolKind::Struct)).unwrap();
        let ax = table.declare(sym("x", SymbolKind::Field).with_owner(a)).unwrap();
        let bx = table.declare(sym("x", SymbolKind::Field).with_owner(b)).unwrap();
        assert_ne!(ax, bx);
        assert_eq!(table.lookup_field("B", "x"), Some(bx));
        assert!(table.declare(sym("x", SymbolKind::Field).with_owner(a)).is_err());
    }

    #[test]
    fn test_reenter_by_owner() {
        let mut table = SymbolTable::new();
        let f = table.push_scope(NodeId(10));
        let block = table.push_scope(NodeId(11));
        table.exit_scope();
        table.exit_scope();

        assert_eq!(table.enter_scope(NodeId(10), Span::dummy()).unwrap(), f);
        assert_eq!(table.enter_scope(NodeId(11), Span::dummy()).unwrap(), block);
        table.exit_scope();
        table.exit_scope();

        // Entering a grandchild directly is rejected
        assert!(matches!(
            table.enter_scope(NodeId(11), Span::dummy()),
            Err(Error::ScopeMismatch { .. })
        ));
    }
}
