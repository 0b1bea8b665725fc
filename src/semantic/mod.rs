//! Semantic analysis: name resolution, type checking, constant evaluation
//! and trait implementation checking

pub mod adder;
pub mod builtins;
pub mod checker;
pub mod const_eval;
pub mod decls;
pub mod namespace;
pub mod scope;
pub mod symbol;
pub mod trait_impl;
pub mod type_checker;

pub use const_eval::{ConstEvaluator, ConstValue, Value};
pub use decls::DeclIndex;
pub use namespace::{NamespaceAnalysis, NamespaceAnalyzer, Resolutions};
pub use scope::{ScopeId, SymbolTable};
pub use symbol::{Namespace, Symbol, SymbolId, SymbolKind};
pub use trait_impl::TraitImplChecker;
pub use type_checker::{TypeChecker, TypeTables};
