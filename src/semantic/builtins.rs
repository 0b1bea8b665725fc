//! Builtin types, functions and methods
//!
//! Seeded fresh into the global scope of every compilation. Builtins have no
//! declaration node.

use std::collections::HashMap;

use log::debug;

use crate::semantic::scope::SymbolTable;
use crate::semantic::symbol::{Symbol, SymbolId, SymbolKind};
use crate::types::{FnType, PrimitiveType, Receiver, Type};
use crate::utils::{Result, Span};

const BUILTIN_TYPES: &[PrimitiveType] = &[
    PrimitiveType::I32,
    PrimitiveType::U32,
    PrimitiveType::Usize,
    PrimitiveType::Isize,
    PrimitiveType::Bool,
    PrimitiveType::Char,
    PrimitiveType::Str,
    PrimitiveType::String,
];

const STRING_METHODS: &[&str] = &["to_string", "as_str", "as_mut_str", "len", "append"];
const ARRAY_METHODS: &[&str] = &["len"];
const INTEGER_METHODS: &[&str] = &["to_string"];

/// Handles to the builtin method symbols
#[derive(Debug, Default)]
pub struct Builtins {
    methods: HashMap<&'static str, SymbolId>,
}

impl Builtins {
    /// Register builtin types and functions in the current scope of `table`
    pub fn seed(table: &mut SymbolTable) -> Result<Self> {
        for prim in BUILTIN_TYPES {
            table.declare(
                Symbol::new(prim.name(), SymbolKind::BuiltinType, None, Span::dummy())
                    .with_type(Type::Primitive(*prim)),
            )?;
        }

        let str_ref = Type::reference(Type::STR, false);
        let functions = [
            ("print", vec![str_ref.clone()], Type::Unit),
            ("println", vec![str_ref.clone()], Type::Unit),
            ("printInt", vec![Type::I32], Type::Unit),
            ("printlnInt", vec![Type::I32], Type::Unit),
            ("getString", vec![], Type::STRING),
            ("getInt", vec![], Type::I32),
            ("exit", vec![Type::I32], Type::Unit),
        ];
        let function_count = functions.len();
        for (name, params, ret) in functions {
            table.declare(
                Symbol::new(name, SymbolKind::Function, None, Span::dummy())
                    .with_type(function(params, ret, None)),
            )?;
        }

        let shared = Some(Receiver {
            by_ref: true,
            mutable: false,
        });
        let exclusive = Some(Receiver {
            by_ref: true,
            mutable: true,
        });
        let methods = [
            ("to_string", function(vec![], Type::STRING, shared)),
            ("as_str", function(vec![], str_ref.clone(), shared)),
            (
                "as_mut_str",
                function(vec![], Type::reference(Type::STR, true), exclusive),
            ),
            ("len", function(vec![], Type::USIZE, shared)),
            ("append", function(vec![str_ref], Type::Unit, exclusive)),
        ];
        let mut builtins = Builtins::default();
        for (name, ty) in methods {
            let id = table.add_detached(
                Symbol::new(name, SymbolKind::BuiltinMethod, None, Span::dummy()).with_type(ty),
            );
            builtins.methods.insert(name, id);
        }

        debug!(
            "seeded {} builtin types, {} functions, {} methods",
            BUILTIN_TYPES.len(),
            function_count,
            builtins.methods.len()
        );
        Ok(builtins)
    }

    /// Builtin method `name` available on `receiver` (after auto-deref)
    pub fn method(&self, receiver: &Type, name: &str) -> Option<SymbolId> {
        let allowed = match receiver.auto_deref() {
            Type::Primitive(PrimitiveType::String | PrimitiveType::Str) => STRING_METHODS,
            Type::Array { .. } => ARRAY_METHODS,
            Type::Primitive(PrimitiveType::U32 | PrimitiveType::Usize | PrimitiveType::Int) => {
                INTEGER_METHODS
            }
            _ => return None,
        };
        if allowed.contains(&name) {
            self.methods.get(name).copied()
        } else {
            None
        }
    }
}

fn function(params: Vec<Type>, ret: Type, receiver: Option<Receiver>) -> Type {
    Type::Function(FnType {
        params,
        ret: Box::new(ret),
        receiver,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::symbol::Namespace;

    #[test]
    fn test_seeded_names() {
        let mut table = SymbolTable::new();
        Builtins::seed(&mut table).unwrap();
        assert!(table.lookup(Namespace::Type, "String").is_some());
        assert!(table.lookup(Namespace::Type, "usize").is_some());
        assert!(table.lookup(Namespace::Value, "printlnInt").is_some());
        assert!(table.lookup(Namespace::Value, "len").is_none());
    }

    #[test]
    fn test_method_availability() {
        let mut table = SymbolTable::new();
        let builtins = Builtins::seed(&mut table).unwrap();
        let string_ref = Type::reference(Type::STRING, true);
        assert!(builtins.method(&string_ref, "append").is_some());
        assert!(builtins.method(&Type::array(Type::I32, 2), "len").is_some());
        assert!(builtins.method(&Type::array(Type::I32, 2), "append").is_none());
        assert!(builtins.method(&Type::U32, "to_string").is_some());
        assert!(builtins.method(&Type::I32, "to_string").is_none());
        assert!(builtins.method(&Type::BOOL, "len").is_none());
    }
}
