//! Namespace analysis
//!
//! Two phases over the same scope tree: [`SymbolAdder`] declares, then
//! [`SymbolChecker`] resolves every name occurrence against the scope chain.

use std::collections::HashMap;

use log::debug;

use crate::frontend::ast::{NodeId, Program};
use crate::frontend::father::FatherMap;
use crate::semantic::adder::SymbolAdder;
use crate::semantic::builtins::Builtins;
use crate::semantic::checker::SymbolChecker;
use crate::semantic::scope::SymbolTable;
use crate::semantic::symbol::SymbolId;
use crate::utils::{Diagnostics, Result};

/// Symbols attached to AST nodes
#[derive(Debug, Default)]
pub struct Resolutions {
    /// Declaring nodes and referencing nodes alike
    symbols: HashMap<NodeId, SymbolId>,
    impl_types: HashMap<NodeId, SymbolId>,
    impl_traits: HashMap<NodeId, SymbolId>,
}

impl Resolutions {
    pub fn bind(&mut self, node: NodeId, symbol: SymbolId) {
        self.symbols.insert(node, symbol);
    }

    pub fn symbol(&self, node: NodeId) -> Option<SymbolId> {
        self.symbols.get(&node).copied()
    }

    pub fn set_impl_type(&mut self, imp: NodeId, ty: SymbolId) {
        self.impl_types.insert(imp, ty);
    }

    /// Type symbol an impl block is attached to
    pub fn impl_type(&self, imp: NodeId) -> Option<SymbolId> {
        self.impl_types.get(&imp).copied()
    }

    pub fn set_impl_trait(&mut self, imp: NodeId, tr: SymbolId) {
        self.impl_traits.insert(imp, tr);
    }

    /// Trait implemented by an impl block
    pub fn impl_trait(&self, imp: NodeId) -> Option<SymbolId> {
        self.impl_traits.get(&imp).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Output of namespace analysis
#[derive(Debug)]
pub struct NamespaceAnalysis {
    pub table: SymbolTable,
    pub resolutions: Resolutions,
    pub builtins: Builtins,
}

pub struct NamespaceAnalyzer;

impl NamespaceAnalyzer {
    pub fn analyze(
        program: &Program,
        fathers: &FatherMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<NamespaceAnalysis> {
        let mut table = SymbolTable::new();
        let builtins = Builtins::seed(&mut table)?;
        let mut resolutions = Resolutions::default();

        SymbolAdder::new(&mut table, &mut resolutions, diagnostics).run(program)?;
        SymbolChecker::new(&mut table, &mut resolutions, fathers, diagnostics).run(program)?;

        debug!(
            "namespace analysis: {} scopes, {} resolved nodes",
            table.scope_count(),
            resolutions.len()
        );
        Ok(NamespaceAnalysis {
            table,
            resolutions,
            builtins,
        })
    }
}
