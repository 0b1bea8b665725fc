//! Trait implementation checking
//!
//! Compares every `impl Trait for Type` block with the trait it names, using
//! the signatures the type checker cached on the symbols. Inherent impls are
//! skipped.

use std::collections::HashSet;

use log::debug;

use crate::frontend::ast::{AssocItem, ImplBlock};
use crate::semantic::decls::DeclIndex;
use crate::semantic::namespace::Resolutions;
use crate::semantic::scope::SymbolTable;
use crate::semantic::symbol::{Symbol, SymbolId, SymbolKind};
use crate::types::{is_compatible, FnType, Type};
use crate::utils::{Diagnostics, Error, Result, Span};

pub struct TraitImplChecker<'a> {
    decls: &'a DeclIndex<'a>,
    table: &'a SymbolTable,
    resolutions: &'a Resolutions,
    diagnostics: &'a mut Diagnostics,
}

/// The trait side of one impl block
struct TraitRef<'t> {
    symbol: SymbolId,
    name: &'t str,
    members: &'t [SymbolId],
}

impl<'a> TraitImplChecker<'a> {
    pub fn new(
        decls: &'a DeclIndex<'a>,
        table: &'a SymbolTable,
        resolutions: &'a Resolutions,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            decls,
            table,
            resolutions,
            diagnostics,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut checked = 0;
        for imp in self.decls.impls() {
            let (Some(tr), Some(target)) = (
                self.resolutions.impl_trait(imp.id),
                self.resolutions.impl_type(imp.id),
            ) else {
                continue;
            };
            self.impl_block(imp, tr, target)?;
            checked += 1;
        }
        debug!("checked {} trait impls", checked);
        Ok(())
    }

    fn impl_block(&mut self, imp: &ImplBlock, tr: SymbolId, target: SymbolId) -> Result<()> {
        let table = self.table;
        let trait_symbol = table.symbol(tr);
        let tr = TraitRef {
            symbol: tr,
            name: &trait_symbol.name,
            members: &trait_symbol.members,
        };
        let target_symbol = table.symbol(target);
        let self_ty = match target_symbol.kind {
            SymbolKind::Enum => Type::Enum {
                name: target_symbol.name.clone(),
                symbol: target,
            },
            _ => Type::Struct {
                name: target_symbol.name.clone(),
                symbol: target,
            },
        };

        let mut provided = HashSet::new();
        for item in &imp.items {
            let (id, name) = match item {
                AssocItem::Function(f) => (f.id, &f.name),
                AssocItem::Const(c) => (c.id, &c.name),
            };
            provided.insert(name.name.as_str());

            let expected = tr
                .members
                .iter()
                .copied()
                .find(|&m| table.symbol(m).name == name.name);
            let Some(expected) = expected else {
                self.diagnostics.report(Error::NotATraitMember {
                    name: name.name.clone(),
                    trait_name: tr.name.to_string(),
                    span: name.span,
                })?;
                continue;
            };
            let Some(actual) = self.resolutions.symbol(id) else {
                continue;
            };
            if !self.conforms(table.symbol(actual), table.symbol(expected), &tr, &self_ty) {
                self.diagnostics.report(Error::TraitSignatureMismatch {
                    name: name.name.clone(),
                    ty: target_symbol.name.clone(),
                    trait_name: tr.name.to_string(),
                    span: name.span,
                })?;
            }
        }

        for &member in tr.members {
            let symbol = table.symbol(member);
            if provided.contains(symbol.name.as_str()) || self.has_default(symbol) {
                continue;
            }
            let kind = match symbol.kind {
                SymbolKind::Constant => "constant",
                _ => "function",
            };
            self.missing(kind, symbol, &target_symbol.name, tr.name, imp.span)?;
        }
        Ok(())
    }

    fn missing(&mut self, kind: &'static str, symbol: &Symbol, ty: &str, trait_name: &str, span: Span) -> Result<()> {
        self.diagnostics.report(Error::MissingTraitItem {
            kind,
            name: symbol.name.clone(),
            ty: ty.to_string(),
            trait_name: trait_name.to_string(),
            span,
        })
    }

    /// Trait items with a body or value need not be provided
    fn has_default(&self, symbol: &Symbol) -> bool {
        let Some(decl) = symbol.decl else {
            return false;
        };
        match symbol.kind {
            SymbolKind::Function => self.decls.function(decl).is_some_and(|f| f.body.is_some()),
            SymbolKind::Constant => self.decls.constant(decl).is_some_and(|c| c.value.is_some()),
            _ => false,
        }
    }

    /// Whether the impl item `actual` can stand for the trait item `expected`
    fn conforms(&self, actual: &Symbol, expected: &Symbol, tr: &TraitRef<'_>, self_ty: &Type) -> bool {
        if actual.kind != expected.kind {
            return false;
        }
        let actual_ty = actual.ty.clone().unwrap_or(Type::Error);
        let expected_ty = expected
            .ty
            .clone()
            .unwrap_or(Type::Error)
            .substitute_trait(tr.symbol, self_ty);

        match (&actual_ty, &expected_ty) {
            (Type::Function(actual), Type::Function(expected)) => signatures_conform(actual, expected),
            _ => is_compatible(&actual_ty, &expected_ty),
        }
    }
}

fn signatures_conform(actual: &FnType, expected: &FnType) -> bool {
    let receivers_match = match (actual.receiver, expected.receiver) {
        (None, None) => true,
        // `mut self` only changes the binding
        (Some(a), Some(e)) => a.by_ref == e.by_ref && (!a.by_ref || a.mutable == e.mutable),
        _ => false,
    };
    receivers_match
        && actual.params.len() == expected.params.len()
        && actual
            .params
            .iter()
            .zip(&expected.params)
            .all(|(a, e)| is_compatible(a, e))
        && is_compatible(&actual.ret, &expected.ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::father::FatherMap;
    use crate::frontend::parser::Parser;
    use crate::semantic::namespace::NamespaceAnalyzer;
    use crate::semantic::type_checker::TypeChecker;
    use crate::utils::ErrorMode;

    fn check(source: &str) -> Vec<Error> {
        let program = Parser::parse_source(source, 0).unwrap();
        let fathers = FatherMap::build(&program);
        let mut diagnostics = Diagnostics::new(ErrorMode::Collect);
        let mut analysis = NamespaceAnalyzer::analyze(&program, &fathers, &mut diagnostics).unwrap();
        let decls = DeclIndex::build(&program);
        TypeChecker::new(
            &decls,
            &fathers,
            &mut analysis.table,
            &mut analysis.resolutions,
            &analysis.builtins,
            &mut diagnostics,
        )
        .run(&program)
        .unwrap();
        TraitImplChecker::new(&decls, &analysis.table, &analysis.resolutions, &mut diagnostics)
            .run()
            .unwrap();
        diagnostics.into_errors()
    }

    const SHAPE: &str = "
        trait Shape {
            const SIDES: i32;
            fn area(&self) -> i32;
            fn name() -> i32 { 0 }
        }
        struct Sq { s: i32 }
    ";

    fn with_shape(imp: &str) -> Vec<Error> {
        check(&format!("{}{}", SHAPE, imp))
    }

    #[test]
    fn test_complete_impl() {
        let errors = with_shape("impl Shape for Sq { const SIDES: i32 = 4; fn area(&self) -> i32 { self.s * self.s } }");
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_missing_items() {
        let errors = with_shape("impl Shape for Sq { const SIDES: i32 = 4; }");
        assert!(matches!(
            errors.as_slice(),
            [Error::MissingTraitItem { kind: "function", .. }]
        ));
        let errors = with_shape("impl Shape for Sq { fn area(&self) -> i32 { 1 } }");
        assert!(matches!(
            errors.as_slice(),
            [Error::MissingTraitItem { kind: "constant", .. }]
        ));
    }

    #[test]
    fn test_signature_mismatches() {
        let cases = [
            "fn area(&self) -> bool { true }",
            "fn area(&mut self) -> i32 { 1 }",
            "fn area() -> i32 { 1 }",
            "fn area(&self, extra: i32) -> i32 { extra }",
        ];
        for case in cases {
            let errors = with_shape(&format!("impl Shape for Sq {{ const SIDES: i32 = 4; {} }}", case));
            assert!(
                matches!(errors.as_slice(), [Error::TraitSignatureMismatch { .. }]),
                "{}: {:?}",
                case,
                errors
            );
        }
        let errors = with_shape("impl Shape for Sq { const SIDES: u32 = 4; fn area(&self) -> i32 { 1 } }");
        assert!(matches!(errors.as_slice(), [Error::TraitSignatureMismatch { .. }]));
    }

    #[test]
    fn test_extra_item() {
        let errors = with_shape(
            "impl Shape for Sq { const SIDES: i32 = 4; fn area(&self) -> i32 { 1 } fn extra(&self) {} }",
        );
        assert!(matches!(errors.as_slice(), [Error::NotATraitMember { .. }]));
    }

    #[test]
    fn test_trait_self_stands_for_implementor() {
        let source = "
            trait Make { fn make() -> Self; fn same(&self, other: &Self) -> bool; }
            struct A {}
            impl Make for A {
                fn make() -> A { A {} }
                fn same(&self, other: &Self) -> bool { true }
            }
            enum E { X }
            impl Make for E {
                fn make() -> Self { E::X }
                fn same(&self, other: &E) -> bool { false }
            }
        ";
        let errors = check(source);
        assert!(errors.is_empty(), "{:?}", errors);

        let errors = check("trait Make { fn make() -> Self; } struct A {} struct B {} impl Make for A { fn make() -> B { B {} } }");
        assert!(matches!(errors.as_slice(), [Error::TraitSignatureMismatch { .. }]));
    }

    #[test]
    fn test_inherent_impls_are_skipped() {
        let errors = check("struct S {} impl S { fn anything(&self) {} }");
        assert!(errors.is_empty(), "{:?}", errors);
    }
}
