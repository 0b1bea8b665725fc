//! Declaration pass (phase 1 of namespace analysis)
//!
//! Registers every named entity in the namespace of the scope it belongs to
//! and opens one scope per function, block, enum, trait and impl. Local `let`
//! bindings are left to the checking pass so that they only become visible
//! after their initializer.

use log::debug;

use crate::frontend::ast::*;
use crate::semantic::namespace::Resolutions;
use crate::semantic::scope::SymbolTable;
use crate::semantic::symbol::{Namespace, Symbol, SymbolId, SymbolKind};
use crate::utils::{Diagnostics, Error, Result};

pub struct SymbolAdder<'a> {
    table: &'a mut SymbolTable,
    resolutions: &'a mut Resolutions,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> SymbolAdder<'a> {
    pub fn new(
        table: &'a mut SymbolTable,
        resolutions: &'a mut Resolutions,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            table,
            resolutions,
            diagnostics,
        }
    }

    pub fn run(&mut self, program: &Program) -> Result<()> {
        let items: Vec<&Item> = program.items.iter().collect();
        self.items(&items)?;
        debug!(
            "declaration pass created {} scopes",
            self.table.scope_count()
        );
        Ok(())
    }

    /// Declare `symbol` in the current scope and bind it to `node`
    fn declare(&mut self, symbol: Symbol, node: NodeId) -> Result<Option<SymbolId>> {
        match self.table.declare(symbol) {
            Ok(id) => {
                self.resolutions.bind(node, id);
                Ok(Some(id))
            }
            Err(err) => {
                self.diagnostics.report(err)?;
                Ok(None)
            }
        }
    }

    /// Impl blocks are handled after the other items of the same list so
    /// that they may name a type declared later on.
    fn items(&mut self, items: &[&Item]) -> Result<()> {
        for item in items.iter().filter(|item| !matches!(item, Item::Impl(_))) {
            self.item(item)?;
        }
        for item in items {
            if let Item::Impl(imp) = item {
                self.impl_block(imp)?;
            }
        }
        Ok(())
    }

    fn item(&mut self, item: &Item) -> Result<()> {
        match item {
            Item::Function(f) => {
                let symbol = Symbol::new(&f.name.name, SymbolKind::Function, Some(f.id), f.name.span);
                self.declare(symbol, f.id)?;
                self.function_scope(f)
            }
            Item::Struct(s) => self.struct_def(s),
            Item::Enum(e) => self.enum_def(e),
            Item::Const(c) => {
                let symbol = Symbol::new(&c.name.name, SymbolKind::Constant, Some(c.id), c.name.span);
                self.declare(symbol, c.id)?;
                self.const_body(c)
            }
            Item::Trait(t) => self.trait_def(t),
            Item::Impl(i) => self.impl_block(i),
        }
    }

    fn struct_def(&mut self, s: &StructDef) -> Result<()> {
        let symbol = Symbol::new(&s.name.name, SymbolKind::Struct, Some(s.id), s.name.span);
        let owner = self.declare(symbol, s.id)?;

        if let Some(owner) = owner {
            let ctor = Symbol::new(
                &s.name.name,
                SymbolKind::StructConstructor,
                Some(s.id),
                s.name.span,
            )
            .with_owner(owner);
            match self.table.declare(ctor) {
                Ok(ctor) => self.table.symbol_mut(owner).constructor = Some(ctor),
                Err(err) => self.diagnostics.report(err)?,
            }
        }

        for field in &s.fields {
            if let Some(owner) = owner {
                let symbol = Symbol::new(&field.name.name, SymbolKind::Field, Some(field.id), field.name.span)
                    .with_owner(owner);
                if let Some(id) = self.declare(symbol, field.id)? {
                    self.table.symbol_mut(owner).members.push(id);
                }
            }
            self.type_expr(&field.ty)?;
        }
        Ok(())
    }

    fn enum_def(&mut self, e: &EnumDef) -> Result<()> {
        let symbol = Symbol::new(&e.name.name, SymbolKind::Enum, Some(e.id), e.name.span);
        let owner = self.declare(symbol, e.id)?;

        self.table.push_scope(e.id);
        for variant in &e.variants {
            let mut symbol = Symbol::new(
                &variant.name.name,
                SymbolKind::EnumVariant,
                Some(variant.id),
                variant.name.span,
            );
            symbol.owner_type = owner;
            let id = self.declare(symbol, variant.id)?;
            if let (Some(owner), Some(id)) = (owner, id) {
                self.table.symbol_mut(owner).members.push(id);
            }
        }
        self.table.exit_scope();
        Ok(())
    }

    fn trait_def(&mut self, t: &TraitDef) -> Result<()> {
        let symbol = Symbol::new(&t.name.name, SymbolKind::Trait, Some(t.id), t.name.span);
        let owner = self.declare(symbol, t.id)?;

        self.table.push_scope(t.id);
        for item in &t.items {
            let (kind, id, span) = match item {
                AssocItem::Function(f) => (SymbolKind::Function, f.id, f.name.span),
                AssocItem::Const(c) => (SymbolKind::Constant, c.id, c.name.span),
            };
            let mut symbol = Symbol::new(&item.name().name, kind, Some(id), span);
            symbol.owner_type = owner;
            let member = self.declare(symbol, id)?;
            if let (Some(owner), Some(member)) = (owner, member) {
                self.table.symbol_mut(owner).members.push(member);
            }
            self.assoc_body(item)?;
        }
        self.table.exit_scope();
        Ok(())
    }

    /// Impl members are not visible by bare name; they hang off the type
    fn impl_block(&mut self, imp: &ImplBlock) -> Result<()> {
        let target = match &imp.self_ty.kind {
            TypeExprKind::Path(PathSegment {
                kind: SegmentKind::Ident(name),
                ..
            }) => self
                .table
                .lookup(Namespace::Type, name)
                .filter(|&id| matches!(self.table.symbol(id).kind, SymbolKind::Struct | SymbolKind::Enum)),
            _ => None,
        };

        self.table.push_scope(imp.id);
        for item in &imp.items {
            let (kind, id, span) = match item {
                AssocItem::Function(f) => (SymbolKind::Function, f.id, f.name.span),
                AssocItem::Const(c) => (SymbolKind::Constant, c.id, c.name.span),
            };
            let name = &item.name().name;
            let mut symbol = Symbol::new(name, kind, Some(id), span);
            symbol.owner_type = target;
            let member = self.table.add_detached(symbol);
            self.resolutions.bind(id, member);

            if let Some(target) = target {
                let duplicate = self
                    .table
                    .symbol(target)
                    .impl_members
                    .iter()
                    .any(|&other| self.table.symbol(other).name == *name);
                if duplicate {
                    self.diagnostics.report(Error::DuplicateDefinition {
                        name: name.clone(),
                        namespace: Namespace::Value.name(),
                        span,
                    })?;
                } else {
                    self.table.symbol_mut(target).impl_members.push(member);
                }
            }
            self.assoc_body(item)?;
        }
        self.table.exit_scope();
        Ok(())
    }

    fn assoc_body(&mut self, item: &AssocItem) -> Result<()> {
        match item {
            AssocItem::Function(f) => self.function_scope(f),
            AssocItem::Const(c) => self.const_body(c),
        }
    }

    fn const_body(&mut self, c: &ConstDef) -> Result<()> {
        self.type_expr(&c.ty)?;
        if let Some(value) = &c.value {
            self.expr(value)?;
        }
        Ok(())
    }

    /// Open the function scope and declare `self` and the parameters in it
    fn function_scope(&mut self, f: &Function) -> Result<()> {
        self.table.push_scope(f.id);

        if let Some(self_param) = &f.self_param {
            let symbol = Symbol::new("self", SymbolKind::SelfValue, Some(self_param.id), self_param.span)
                .with_mutable(!self_param.is_ref && self_param.mutable);
            self.declare(symbol, self_param.id)?;
            if let Some(ty) = &self_param.ty {
                self.type_expr(ty)?;
            }
        }
        for param in &f.params {
            self.pattern(&param.pattern)?;
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

    fn pattern(&mut self, pattern: &Pattern) -> Result<()> {
        match pattern {
            Pattern::Ident {
                id,
                name,
                by_ref,
                mutable,
            } => {
                let symbol = Symbol::new(&name.name, SymbolKind::Parameter, Some(*id), name.span)
                    .with_mutable(*mutable && !*by_ref);
                self.declare(symbol, *id)?;
                Ok(())
            }
            Pattern::Wildcard { .. } => Ok(()),
            Pattern::Ref { inner, .. } => self.pattern(inner),
        }
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        self.table.push_scope(block.id);

        let items: Vec<&Item> = block
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Item(item) => Some(item),
                _ => None,
            })
            .collect();
        self.items(&items)?;

        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(stmt) => {
                    if let Some(ty) = &stmt.ty {
                        self.type_expr(ty)?;
                    }
                    if let Some(init) = &stmt.init {
                        self.expr(init)?;
                    }
                }
                Stmt::Expr(stmt) => self.expr(&stmt.expr)?,
                Stmt::Item(_) | Stmt::Empty { .. } => {}
            }
        }
        if let Some(tail) = &block.tail {
            self.expr(tail)?;
        }

        self.table.exit_scope();
        Ok(())
    }

    fn type_expr(&mut self, ty: &TypeExpr) -> Result<()> {
        match &ty.kind {
            TypeExprKind::Ref { inner, .. } => self.type_expr(inner),
            TypeExprKind::Array { elem, size } => {
                self.type_expr(elem)?;
                self.expr(size)
            }
            TypeExprKind::Path(_) | TypeExprKind::Unit => Ok(()),
        }
    }

    /// Walk an expression looking for nested blocks
    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
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
            ExprKind::StructLit { fields, .. } => {
                fields.iter().try_for_each(|field| self.expr(&field.value))
            }
            ExprKind::Array(elements) => elements.iter().try_for_each(|e| self.expr(e)),
            ExprKind::Break(Some(value)) | ExprKind::Return(Some(value)) => self.expr(value),
            ExprKind::Literal(_)
            | ExprKind::Unit
            | ExprKind::Path(_)
            | ExprKind::Break(None)
            | ExprKind::Return(None)
            | ExprKind::Continue
            | ExprKind::Underscore => Ok(()),
        }
    }
}
