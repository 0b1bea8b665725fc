//! Resolution pass (phase 2 of namespace analysis)
//!
//! Re-walks the scope tree built by the declaration pass, entering each
//! child scope by the node that created it, and attaches a symbol to every
//! name occurrence. The namespace a name is looked up in is passed down
//! explicitly as a [`Context`].

use crate::frontend::ast::*;
use crate::frontend::father::{FatherMap, NodeKind};
use crate::semantic::namespace::Resolutions;
use crate::semantic::scope::SymbolTable;
use crate::semantic::symbol::{Namespace, Symbol, SymbolId, SymbolKind};
use crate::utils::{Diagnostics, Error, Result};

/// Interpretation of a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    Type,
    Value,
    /// Field of the named type
    Field(String),
}

pub struct SymbolChecker<'a> {
    table: &'a mut SymbolTable,
    resolutions: &'a mut Resolutions,
    fathers: &'a FatherMap,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> SymbolChecker<'a> {
    pub fn new(
        table: &'a mut SymbolTable,
        resolutions: &'a mut Resolutions,
        fathers: &'a FatherMap,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            table,
            resolutions,
            fathers,
            diagnostics,
        }
    }

    pub fn run(&mut self, program: &Program) -> Result<()> {
        for item in &program.items {
            self.item(item)?;
        }
        Ok(())
    }

    fn item(&mut self, item: &Item) -> Result<()> {
        match item {
            Item::Function(f) => self.function(f),
            Item::Struct(s) => {
                for field in &s.fields {
                    self.type_expr(&field.ty)?;
                }
                Ok(())
            }
            Item::Enum(e) => {
                self.table.enter_scope(e.id, e.span)?;
                self.table.exit_scope();
                Ok(())
            }
            Item::Const(c) => self.constant(c),
            Item::Trait(t) => {
                self.table.enter_scope(t.id, t.span)?;
                self.assoc_items(&t.items)?;
                self.table.exit_scope();
                Ok(())
            }
            Item::Impl(i) => self.impl_block(i),
        }
    }

    fn assoc_items(&mut self, items: &[AssocItem]) -> Result<()> {
        for item in items {
            match item {
                AssocItem::Function(f) => self.function(f)?,
                AssocItem::Const(c) => self.constant(c)?,
            }
        }
        Ok(())
    }

    fn constant(&mut self, c: &ConstDef) -> Result<()> {
        self.type_expr(&c.ty)?;
        if let Some(value) = &c.value {
            self.expr(value)?;
        }
        Ok(())
    }

    fn function(&mut self, f: &Function) -> Result<()> {
        self.table.enter_scope(f.id, f.span)?;
        if let Some(ty) = f.self_param.as_ref().and_then(|s| s.ty.as_ref()) {
            self.type_expr(ty)?;
        }
        for param in &f.params {
            self.type_expr(&param.ty)?;
        }
        if let Some(ty) = &f.ret_type {
            self.type_expr(ty)?;
        }
        if let Some(body) = &f.body {
            self.block(body)?;
        }
        self.table.exit_scope();
        Ok(())
    }

    fn impl_block(&mut self, imp: &ImplBlock) -> Result<()> {
        match &imp.self_ty.kind {
            TypeExprKind::Path(segment) => {
                if let Some(target) = self.resolve_segment(segment, &Context::Type)? {
                    match self.table.symbol(target).kind {
                        SymbolKind::Struct | SymbolKind::Enum => {
                            self.resolutions.set_impl_type(imp.id, target)
                        }
                        _ => self.diagnostics.report(Error::InvalidImplTarget {
                            span: imp.self_ty.span,
                        })?,
                    }
                }
            }
            _ => self.diagnostics.report(Error::InvalidImplTarget {
                span: imp.self_ty.span,
            })?,
        }

        if let Some(trait_name) = &imp.trait_name {
            match self.table.lookup(Namespace::Type, &trait_name.name) {
                Some(tr) if self.table.symbol(tr).kind == SymbolKind::Trait => {
                    self.resolutions.set_impl_trait(imp.id, tr);
                }
                _ => self.diagnostics.report(Error::UnresolvedTrait {
                    name: trait_name.name.clone(),
                    span: trait_name.span,
                })?,
            }
        }

        self.table.enter_scope(imp.id, imp.span)?;
        self.assoc_items(&imp.items)?;
        self.table.exit_scope();
        Ok(())
    }

    // ==================== Statements ====================

    fn block(&mut self, block: &Block) -> Result<()> {
        self.table.enter_scope(block.id, block.span)?;
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(stmt) => {
                    if let Some(ty) = &stmt.ty {
                        self.type_expr(ty)?;
                    }
                    if let Some(init) = &stmt.init {
                        self.expr(init)?;
                    }
                    self.declare_locals(&stmt.pattern)?;
                }
                Stmt::Item(item) => self.item(item)?,
                Stmt::Expr(stmt) => self.expr(&stmt.expr)?,
                Stmt::Empty { .. } => {}
            }
        }
        if let Some(tail) = &block.tail {
            self.expr(tail)?;
        }
        self.table.exit_scope();
        Ok(())
    }

    fn declare_locals(&mut self, pattern: &Pattern) -> Result<()> {
        match pattern {
            Pattern::Ident {
                id,
                name,
                by_ref,
                mutable,
            } => {
                let symbol = Symbol::new(&name.name, SymbolKind::LocalVariable, Some(*id), name.span)
                    .with_mutable(*mutable && !*by_ref);
                match self.table.declare(symbol) {
                    Ok(symbol) => self.resolutions.bind(*id, symbol),
                    Err(err) => self.diagnostics.report(err)?,
                }
                Ok(())
            }
            Pattern::Wildcard { .. } => Ok(()),
            Pattern::Ref { inner, .. } => self.declare_locals(inner),
        }
    }

    // ==================== Expressions ====================

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Path(path) => {
                // `A::b`: the first segment names a type, the second is
                // resolved against that type during type checking
                let context = if path.second.is_some() {
                    Context::Type
                } else {
                    Context::Value
                };
                self.resolve_segment(&path.first, &context)?;
                Ok(())
            }
            ExprKind::StructLit { path, fields } => self.struct_literal(path, fields),
            ExprKind::Block(block) | ExprKind::Loop(block) => self.block(block),
            ExprKind::While { cond, body } => {
                self.expr(cond)?;
                self.block(body)
            }
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.expr(cond)?;
                self.block(then_block)?;
                match else_branch {
                    Some(else_branch) => self.expr(else_branch),
                    None => Ok(()),
                }
            }
            ExprKind::Cast { expr: inner, ty } => {
                self.expr(inner)?;
                self.type_expr(ty)
            }
            ExprKind::Group(inner)
            | ExprKind::Unary { expr: inner, .. }
            | ExprKind::Borrow { expr: inner, .. }
            | ExprKind::Deref(inner)
            | ExprKind::Field {
                receiver: inner, ..
            } => self.expr(inner),
            ExprKind::Binary { left, right, .. }
            | ExprKind::Assign {
                target: left,
                value: right,
            }
            | ExprKind::CompoundAssign {
                target: left,
                value: right,
                ..
            }
            | ExprKind::Index {
                base: left,
                index: right,
            }
            | ExprKind::ArrayRepeat {
                value: left,
                count: right,
            } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::Call { callee: first, args } | ExprKind::MethodCall { receiver: first, args, .. } => {
                self.expr(first)?;
                args.iter().try_for_each(|arg| self.expr(arg))
            }
            ExprKind::Array(elements) => elements.iter().try_for_each(|e| self.expr(e)),
            ExprKind::Break(Some(value)) | ExprKind::Return(Some(value)) => self.expr(value),
            ExprKind::Literal(_)
            | ExprKind::Unit
            | ExprKind::Break(None)
            | ExprKind::Return(None)
            | ExprKind::Continue
            | ExprKind::Underscore => Ok(()),
        }
    }

    fn struct_literal(&mut self, path: &PathSegment, fields: &[FieldInit]) -> Result<()> {
        let owner = match self.resolve_segment(path, &Context::Value)? {
            Some(ctor) if self.table.symbol(ctor).kind == SymbolKind::StructConstructor => self
                .table
                .symbol(ctor)
                .owner_type
                .map(|owner| self.table.symbol(owner).name.clone()),
            Some(_) => {
                self.diagnostics.report(Error::NotAStructConstructor {
                    name: path.text().to_string(),
                    span: path.span,
                })?;
                None
            }
            None => None,
        };

        for field in fields {
            if let Some(owner) = &owner {
                self.resolve_name(&field.name, field.id, &Context::Field(owner.clone()))?;
            }
            self.expr(&field.value)?;
        }
        Ok(())
    }

    fn type_expr(&mut self, ty: &TypeExpr) -> Result<()> {
        match &ty.kind {
            TypeExprKind::Path(segment) => {
                self.resolve_segment(segment, &Context::Type)?;
                Ok(())
            }
            TypeExprKind::Ref { inner, .. } => self.type_expr(inner),
            TypeExprKind::Array { elem, size } => {
                self.type_expr(elem)?;
                self.expr(size)
            }
            TypeExprKind::Unit => Ok(()),
        }
    }

    // ==================== Resolution ====================

    /// Resolve one path segment and bind it. Failures are reported and give
    /// `None`.
    fn resolve_segment(&mut self, segment: &PathSegment, context: &Context) -> Result<Option<SymbolId>> {
        let resolved = match &segment.kind {
            SegmentKind::Ident(name) => {
                let ident = Ident {
                    name: name.clone(),
                    span: segment.span,
                };
                return self.resolve_name(&ident, segment.id, context);
            }
            SegmentKind::SelfValue => match context {
                Context::Value => self.table.lookup(Namespace::Value, "self").ok_or_else(|| {
                    Error::InvalidSelf {
                        message: "`self` is only available in methods".to_string(),
                        span: segment.span,
                    }
                }),
                _ => Err(Error::InvalidSelf {
                    message: "`self` cannot be used as a type".to_string(),
                    span: segment.span,
                }),
            },
            SegmentKind::SelfType => self.resolve_self_type(segment, context),
        };

        match resolved {
            Ok(symbol) => {
                self.resolutions.bind(segment.id, symbol);
                Ok(Some(symbol))
            }
            Err(err) => {
                self.diagnostics.report(err)?;
                Ok(None)
            }
        }
    }

    fn resolve_name(&mut self, name: &Ident, node: NodeId, context: &Context) -> Result<Option<SymbolId>> {
        let found = match context {
            Context::Type => self.table.lookup(Namespace::Type, &name.name),
            Context::Value => self.table.lookup(Namespace::Value, &name.name),
            Context::Field(owner) => self.table.lookup_field(owner, &name.name),
        };

        match found {
            Some(symbol) => {
                self.resolutions.bind(node, symbol);
                Ok(Some(symbol))
            }
            None => {
                let err = match context {
                    Context::Type => Error::UnresolvedType {
                        name: name.name.clone(),
                        span: name.span,
                    },
                    Context::Value => Error::UnresolvedValue {
                        name: name.name.clone(),
                        span: name.span,
                    },
                    Context::Field(owner) => Error::UnresolvedField {
                        field: name.name.clone(),
                        ty: owner.clone(),
                        span: name.span,
                    },
                };
                self.diagnostics.report(err)?;
                Ok(None)
            }
        }
    }

    /// `Self` names the type of the nearest enclosing impl (or the trait
    /// itself inside a trait body). In value position it names the struct
    /// constructor.
    fn resolve_self_type(&self, segment: &PathSegment, context: &Context) -> Result<SymbolId> {
        let span = segment.span;
        let Some((owner, kind)) = self
            .fathers
            .enclosing(segment.id, &[NodeKind::Impl, NodeKind::Trait])
        else {
            return Err(Error::SelfOutsideImpl { span });
        };

        let ty = match kind {
            NodeKind::Impl => self.resolutions.impl_type(owner),
            _ => self.resolutions.symbol(owner),
        }
        .ok_or_else(|| Error::InvalidSelf {
            message: "`Self` refers to a type that could not be resolved".to_string(),
            span,
        })?;

        match context {
            Context::Value => self
                .table
                .symbol(ty)
                .constructor
                .ok_or_else(|| Error::InvalidSelf {
                    message: format!("`Self` is not a struct constructor in '{}'", self.table.symbol(ty).name),
                    span,
                }),
            _ => Ok(ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;
    use crate::semantic::namespace::{NamespaceAnalysis, NamespaceAnalyzer};
    use crate::utils::ErrorMode;

    fn resolve(source: &str, mode: ErrorMode) -> (Result<NamespaceAnalysis>, Vec<Error>) {
        let program = Parser::parse_source(source, 0).unwrap();
        let fathers = FatherMap::build(&program);
        let mut diagnostics = Diagnostics::new(mode);
        let result = NamespaceAnalyzer::analyze(&program, &fathers, &mut diagnostics);
        (result, diagnostics.into_errors())
    }

    fn resolve_ok(source: &str) -> NamespaceAnalysis {
        let (result, errors) = resolve(source, ErrorMode::Collect);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        result.unwrap()
    }

    fn collect(source: &str) -> Vec<Error> {
        resolve(source, ErrorMode::Collect).1
    }

    #[test]
    fn test_forward_reference() {
        resolve_ok("fn main() { helper(); } fn helper() {}");
    }

    #[test]
    fn test_parameters_resolve() {
        let analysis = resolve_ok("fn add(a: i32, b: i32) -> i32 { a + b }");
        let params = analysis
            .table
            .symbols()
            .filter(|(_, s)| s.kind == SymbolKind::Parameter)
            .count();
        assert_eq!(params, 2);
    }

    #[test]
    fn test_unresolved_value_throws() {
        let (result, _) = resolve("fn main() { y; }", ErrorMode::Throw);
        assert!(matches!(result, Err(Error::UnresolvedValue { ref name, .. }) if name == "y"));
    }

    #[test]
    fn test_collect_mode_reports_all() {
        let errors = collect("fn main() { a; b; let c: Missing = 1; }");
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[2], Error::UnresolvedType { .. }));
    }

    #[test]
    fn test_let_is_visible_after_initializer_only() {
        let errors = collect("fn main() { let x = x; }");
        assert!(matches!(errors.as_slice(), [Error::UnresolvedValue { .. }]));
    }

    #[test]
    fn test_block_scoping() {
        let errors = collect("fn main() { { let inner = 1; } inner; }");
        assert!(matches!(errors.as_slice(), [Error::UnresolvedValue { .. }]));
    }

    #[test]
    fn test_shadowing_and_constant_conflicts() {
        resolve_ok("fn main() { let x = 1; let x = 2; x; }");
        let errors = collect("fn main() { let x = 1; const x: i32 = 2; }");
        assert!(matches!(errors.as_slice(), [Error::ConstantConflict { .. }]));
        let errors = collect("fn main() { const x: i32 = 2; let x = 1; }");
        assert!(matches!(errors.as_slice(), [Error::ConstantConflict { .. }]));
    }

    #[test]
    fn test_duplicate_items() {
        let errors = collect("struct A {} struct A {} fn f() {} fn f() {}");
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, Error::DuplicateDefinition { .. })));
    }

    #[test]
    fn test_self_resolution() {
        resolve_ok(
            "struct P { x: i32 } impl P { fn new() -> Self { Self { x: 0 } } fn get(&self) -> i32 { self.x } }",
        );
        let errors = collect("fn f() -> Self { 0 }");
        assert!(matches!(errors.as_slice(), [Error::SelfOutsideImpl { .. }]));
        let errors = collect("fn f() { self; }");
        assert!(matches!(errors.as_slice(), [Error::InvalidSelf { .. }]));
    }

    #[test]
    fn test_impl_before_type() {
        resolve_ok("impl P { fn f() {} } struct P {}");
    }

    #[test]
    fn test_impl_targets() {
        let errors = collect("struct S {} impl Missing {} trait T {} impl T {} impl Nope for S {}");
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], Error::UnresolvedType { .. }));
        assert!(matches!(errors[1], Error::InvalidImplTarget { .. }));
        assert!(matches!(errors[2], Error::UnresolvedTrait { .. }));
    }

    #[test]
    fn test_duplicate_impl_members() {
        let errors = collect("struct P {} impl P { fn f() {} } impl P { fn f() {} }");
        assert!(matches!(errors.as_slice(), [Error::DuplicateDefinition { .. }]));
    }

    #[test]
    fn test_struct_literal_fields() {
        resolve_ok("struct P { x: i32 } fn main() { let p = P { x: 1 }; }");
        let errors = collect("struct P { x: i32 } fn main() { let p = P { z: 1 }; }");
        assert!(matches!(errors.as_slice(), [Error::UnresolvedField { .. }]));
        let errors = collect("fn f() {} fn main() { let p = f { x: 1 }; }");
        assert!(matches!(errors.as_slice(), [Error::NotAStructConstructor { .. }]));
    }

    #[test]
    fn test_types_and_values_are_separate() {
        let errors = collect("fn f() {} fn main() { let x: f = 1; }");
        assert!(matches!(errors.as_slice(), [Error::UnresolvedType { .. }]));
    }

    #[test]
    fn test_every_scope_is_reentered() {
        let analysis = resolve_ok(
            "enum E { A } trait T { fn t(&self); } struct S {} impl T for S { fn t(&self) { loop { if true { break; } else { { } } } } } fn main() { while false {} }",
        );
        assert!(analysis.table.scope_count() > 8);
    }
}
