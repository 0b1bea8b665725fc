//! Type checking
//!
//! One recursive walk assigns a [`Type`] to every expression and validates
//! every statement and declaration. Symbol types are computed lazily from
//! their declarations and cached on the symbol. Loop and function contexts
//! live on an explicit stack so that `break`, `continue` and `return` find
//! their target by searching it. Block tails produce ambiguous types that
//! resolve against the expected type at the use site.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::frontend::ast::*;
use crate::frontend::father::{FatherMap, NodeKind};
use crate::semantic::builtins::Builtins;
use crate::semantic::const_eval::{ConstEnv, ConstEvaluator, ConstValue};
use crate::semantic::decls::{Decl, DeclIndex};
use crate::semantic::namespace::Resolutions;
use crate::semantic::scope::SymbolTable;
use crate::semantic::symbol::{SymbolId, SymbolKind};
use crate::types::{common_type, is_compatible, FnType, Receiver, Type};
use crate::utils::{Diagnostics, Error, Result, Span};

/// Side tables produced by type checking
#[derive(Debug, Default)]
pub struct TypeTables {
    /// Type of every expression, undetermined integers defaulted to `i32`
    pub types: HashMap<NodeId, Type>,
    /// Loop or function each `break`, `continue` and `return` leaves
    pub targets: HashMap<NodeId, NodeId>,
    /// Folded constant expressions
    pub constants: HashMap<NodeId, ConstValue>,
}

#[derive(Debug)]
enum FlowContext {
    Function {
        node: NodeId,
        ret: Type,
    },
    Loop {
        node: NodeId,
        is_while: bool,
        break_ty: Option<Type>,
    },
}

pub struct TypeChecker<'a> {
    decls: &'a DeclIndex<'a>,
    fathers: &'a FatherMap,
    table: &'a mut SymbolTable,
    resolutions: &'a mut Resolutions,
    builtins: &'a Builtins,
    diagnostics: &'a mut Diagnostics,
    types: HashMap<NodeId, Type>,
    type_exprs: HashMap<NodeId, Type>,
    consts: HashMap<NodeId, ConstValue>,
    in_progress: HashSet<SymbolId>,
    flow: Vec<FlowContext>,
    targets: HashMap<NodeId, NodeId>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        decls: &'a DeclIndex<'a>,
        fathers: &'a FatherMap,
        table: &'a mut SymbolTable,
        resolutions: &'a mut Resolutions,
        builtins: &'a Builtins,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            decls,
            fathers,
            table,
            resolutions,
            builtins,
            diagnostics,
            types: HashMap::new(),
            type_exprs: HashMap::new(),
            consts: HashMap::new(),
            in_progress: HashSet::new(),
            flow: Vec::new(),
            targets: HashMap::new(),
        }
    }

    pub fn run(mut self, program: &Program) -> Result<TypeTables> {
        for item in &program.items {
            self.item(item)?;
        }

        // Undetermined integers that nothing pinned down become i32
        for ty in self.types.values_mut() {
            *ty = ty.defaulted();
        }
        for symbol in self.table.symbols_mut() {
            if let Some(ty) = &symbol.ty {
                symbol.ty = Some(ty.defaulted());
            }
        }

        debug!(
            "type checking assigned {} expression types",
            self.types.len()
        );
        Ok(TypeTables {
            types: self.types,
            targets: self.targets,
            constants: self.consts,
        })
    }

    fn report(&mut self, err: Error) -> Result<Type> {
        self.diagnostics.report(err)?;
        Ok(Type::Error)
    }

    fn expect(&mut self, actual: &Type, expected: &Type, span: Span) -> Result<()> {
        if !is_compatible(actual, expected) {
            self.diagnostics.report(Error::TypeMismatch {
                expected: expected.describe(),
                got: actual.describe(),
                span,
            })?;
        }
        Ok(())
    }

    // ==================== Symbol Types ====================

    /// Type of a symbol, computed from its declaration on first use
    pub fn symbol_type(&mut self, id: SymbolId) -> Result<Type> {
        let symbol = self.table.symbol(id);
        if let Some(ty) = &symbol.ty {
            return Ok(ty.clone());
        }
        let (kind, name, decl, owner) = (symbol.kind, symbol.name.clone(), symbol.decl, symbol.owner_type);
        // Placeholder while the declaration is typed; a type that refers
        // back to itself sees the poison type
        self.table.symbol_mut(id).ty = Some(Type::Error);

        let ty = match kind {
            SymbolKind::Struct => Type::Struct { name, symbol: id },
            SymbolKind::Enum => Type::Enum { name, symbol: id },
            SymbolKind::Trait => Type::Trait { name, symbol: id },
            SymbolKind::StructConstructor => match owner {
                Some(owner) => Type::StructConstructor(Box::new(self.symbol_type(owner)?)),
                None => Type::Error,
            },
            SymbolKind::EnumVariant => match owner {
                Some(owner) => Type::EnumConstructor(Box::new(self.symbol_type(owner)?)),
                None => Type::Error,
            },
            SymbolKind::Function => match decl.and_then(|d| self.decls.function(d)) {
                Some(f) => Type::Function(self.fn_type(f)?),
                None => Type::Error,
            },
            SymbolKind::Constant => match decl.and_then(|d| self.decls.constant(d)) {
                Some(c) => self.resolve_type(&c.ty)?,
                None => Type::Error,
            },
            SymbolKind::Field => match decl.and_then(|d| self.decls.field(d)) {
                Some(f) => self.resolve_type(&f.ty)?,
                None => Type::Error,
            },
            // Bindings are typed when their declaration is checked; builtins
            // are seeded with their type
            SymbolKind::BuiltinType
            | SymbolKind::BuiltinMethod
            | SymbolKind::Parameter
            | SymbolKind::SelfValue
            | SymbolKind::LocalVariable => {
                self.table.symbol_mut(id).ty = None;
                return Ok(Type::Error);
            }
        };

        self.table.symbol_mut(id).ty = Some(ty.clone());
        Ok(ty)
    }

    fn fn_type(&mut self, f: &Function) -> Result<FnType> {
        let receiver = match &f.self_param {
            Some(SelfParam { ty: Some(ty), .. }) => Some(match &ty.kind {
                TypeExprKind::Ref { mutable, .. } => Receiver {
                    by_ref: true,
                    mutable: *mutable,
                },
                _ => Receiver {
                    by_ref: false,
                    mutable: false,
                },
            }),
            Some(param) => Some(Receiver {
                by_ref: param.is_ref,
                mutable: param.mutable,
            }),
            None => None,
        };

        let mut params = Vec::with_capacity(f.params.len());
        for param in &f.params {
            params.push(self.resolve_type(&param.ty)?);
        }
        let ret = match &f.ret_type {
            Some(ty) => self.resolve_type(ty)?,
            None => Type::Unit,
        };
        Ok(FnType {
            params,
            ret: Box::new(ret),
            receiver,
        })
    }

    /// `Self` of the impl or trait enclosing `node`
    fn self_type(&mut self, node: NodeId) -> Result<Type> {
        let owner = match self.fathers.enclosing(node, &[NodeKind::Impl, NodeKind::Trait]) {
            Some((imp, NodeKind::Impl)) => self.resolutions.impl_type(imp),
            Some((tr, _)) => self.resolutions.symbol(tr),
            None => None,
        };
        match owner {
            Some(owner) => self.symbol_type(owner),
            None => Ok(Type::Error),
        }
    }

    /// Semantic type of a type expression
    pub fn resolve_type(&mut self, ty: &TypeExpr) -> Result<Type> {
        if let Some(resolved) = self.type_exprs.get(&ty.id) {
            return Ok(resolved.clone());
        }

        let resolved = match &ty.kind {
            TypeExprKind::Path(segment) => match self.resolutions.symbol(segment.id) {
                Some(symbol) => match self.table.symbol(symbol).kind {
                    SymbolKind::BuiltinType => self.table.symbol(symbol).ty.clone().unwrap_or(Type::Error),
                    SymbolKind::Struct | SymbolKind::Enum | SymbolKind::Trait => {
                        self.symbol_type(symbol)?
                    }
                    _ => Type::Error,
                },
                None => Type::Error,
            },
            TypeExprKind::Ref { mutable, inner } => Type::reference(self.resolve_type(inner)?, *mutable),
            TypeExprKind::Array { elem, size } => {
                let elem = self.resolve_type(elem)?;
                match self.array_size(size)? {
                    Some(size) => Type::array(elem, size),
                    None => Type::Error,
                }
            }
            TypeExprKind::Unit => Type::Unit,
        };

        self.type_exprs.insert(ty.id, resolved.clone());
        Ok(resolved)
    }

    // ==================== Constants ====================

    /// Type the size expression, then fold it
    fn array_size(&mut self, count: &Expr) -> Result<Option<u64>> {
        let saved = std::mem::take(&mut self.flow);
        let ty = self.expr(count);
        self.flow = saved;
        if ty?.is_bottom() {
            return Ok(None);
        }
        match ConstEvaluator::new(self).array_size(count) {
            Ok(size) => Ok(size),
            Err(err) => {
                self.diagnostics.report(err)?;
                Ok(None)
            }
        }
    }

    /// Value of a constant symbol, folded once and cached on the symbol.
    /// A failed evaluation is reported here and poisons later uses.
    fn constant_value(&mut self, symbol: SymbolId, span: Span) -> Result<Option<ConstValue>> {
        let sym = self.table.symbol(symbol);
        if sym.kind != SymbolKind::Constant {
            return Ok(None);
        }
        if let Some(value) = &sym.constant {
            return Ok(Some(value.clone()));
        }
        if self.in_progress.contains(&symbol) {
            return Err(Error::CyclicConstant {
                name: sym.name.clone(),
                span,
            });
        }
        let Some(value_expr) = sym
            .decl
            .and_then(|d| self.decls.constant(d))
            .and_then(|c| c.value.as_ref())
        else {
            return Ok(None);
        };

        self.in_progress.insert(symbol);
        let declared = self.symbol_type(symbol)?;
        let result = ConstEvaluator::new(self).evaluate_as(value_expr, &declared);
        self.in_progress.remove(&symbol);

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                self.diagnostics.report(err)?;
                ConstValue::unknown()
            }
        };
        self.table.symbol_mut(symbol).constant = Some(value.clone());
        Ok(Some(value))
    }

    /// Symbol named by the second segment of `A::b`, bound on success
    fn associated(&mut self, path: &PathExpr) -> Result<Option<SymbolId>> {
        let Some(second) = &path.second else {
            return Ok(self.resolutions.symbol(path.first.id));
        };
        if let Some(found) = self.resolutions.symbol(second.id) {
            return Ok(Some(found));
        }
        let Some(owner) = self.resolutions.symbol(path.first.id) else {
            return Ok(None);
        };

        let name = second.text();
        let owner_symbol = self.table.symbol(owner);
        let candidates = owner_symbol
            .members
            .iter()
            .filter(|&&m| self.table.symbol(m).kind != SymbolKind::Field)
            .chain(owner_symbol.impl_members.iter());
        let found = candidates.copied().find(|&m| self.table.symbol(m).name == name);

        match found {
            Some(member) => {
                self.resolutions.bind(second.id, member);
                Ok(Some(member))
            }
            None => {
                let ty = owner_symbol.name.clone();
                self.diagnostics.report(Error::UnresolvedAssociated {
                    ty,
                    name: name.to_string(),
                    span: second.span,
                })?;
                Ok(None)
            }
        }
    }

    // ==================== Items ====================

    fn item(&mut self, item: &Item) -> Result<()> {
        match item {
            Item::Function(f) => self.function(f, false),
            Item::Struct(s) => {
                for field in &s.fields {
                    self.resolve_type(&field.ty)?;
                }
                Ok(())
            }
            Item::Enum(_) => Ok(()),
            Item::Const(c) => self.constant(c, false),
            Item::Trait(t) => self.assoc_items(&t.items, true),
            Item::Impl(i) => self.assoc_items(&i.items, false),
        }
    }

    fn assoc_items(&mut self, items: &[AssocItem], in_trait: bool) -> Result<()> {
        for item in items {
            match item {
                AssocItem::Function(f) => self.function(f, in_trait)?,
                AssocItem::Const(c) => self.constant(c, in_trait)?,
            }
        }
        Ok(())
    }

    fn function(&mut self, f: &Function, in_trait: bool) -> Result<()> {
        let signature = match self.resolutions.symbol(f.id) {
            Some(symbol) => match self.symbol_type(symbol)? {
                Type::Function(signature) => signature,
                _ => self.fn_type(f)?,
            },
            None => self.fn_type(f)?,
        };

        if let Some(self_param) = &f.self_param {
            let ty = match &self_param.ty {
                Some(ty) => self.resolve_type(ty)?,
                None => {
                    let owner = self.self_type(f.id)?;
                    if self_param.is_ref {
                        Type::reference(owner, self_param.mutable)
                    } else {
                        owner
                    }
                }
            };
            if let Some(symbol) = self.resolutions.symbol(self_param.id) {
                self.table.symbol_mut(symbol).ty = Some(ty);
            }
        }
        for (param, ty) in f.params.iter().zip(&signature.params) {
            self.bind_pattern(&param.pattern, ty.clone())?;
        }

        let Some(body) = &f.body else {
            if !in_trait {
                self.diagnostics.report(Error::MissingBody {
                    name: f.name.name.clone(),
                    span: f.span,
                })?;
            }
            return Ok(());
        };

        self.flow.push(FlowContext::Function {
            node: f.id,
            ret: (*signature.ret).clone(),
        });
        let body_ty = self.block(body);
        self.flow.pop();
        let body_ty = body_ty?;

        let span = body.tail.as_ref().map_or(body.span, |tail| tail.span);
        self.expect(&body_ty, &signature.ret, span)
    }

    fn constant(&mut self, c: &ConstDef, in_trait: bool) -> Result<()> {
        let declared = match self.resolutions.symbol(c.id) {
            Some(symbol) => self.symbol_type(symbol)?,
            None => self.resolve_type(&c.ty)?,
        };
        let Some(value) = &c.value else {
            if !in_trait {
                self.diagnostics.report(Error::MissingConstValue {
                    name: c.name.name.clone(),
                    span: c.span,
                })?;
            }
            return Ok(());
        };

        let saved = std::mem::take(&mut self.flow);
        let actual = self.expr(value);
        self.flow = saved;
        let actual = actual?;
        if !is_compatible(&actual, &declared) {
            return self.expect(&actual, &declared, value.span);
        }
        if actual.is_bottom() {
            return Ok(());
        }

        match self.resolutions.symbol(c.id) {
            Some(symbol) => {
                self.constant_value(symbol, c.span)?;
            }
            // Duplicate declaration without a symbol of its own
            None => {
                if let Err(err) = ConstEvaluator::new(self).evaluate_as(value, &declared) {
                    self.diagnostics.report(err)?;
                }
            }
        }
        Ok(())
    }

    // ==================== Statements ====================

    fn block(&mut self, block: &Block) -> Result<Type> {
        let mut diverges = false;
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(stmt) => diverges |= self.let_stmt(stmt)?,
                Stmt::Item(item) => self.item(item)?,
                Stmt::Expr(stmt) => {
                    let ty = self.expr(&stmt.expr)?;
                    diverges |= ty.is_never();
                    if !stmt.has_semi && stmt.expr.is_block_like() {
                        self.expect(&ty, &Type::Unit, stmt.expr.span)?;
                    }
                }
                Stmt::Empty { .. } => {}
            }
        }

        let ty = match &block.tail {
            Some(tail) => {
                let ty = self.expr(tail)?;
                if diverges {
                    Type::Never
                } else {
                    Type::ambiguous(ty)
                }
            }
            None if diverges => Type::Never,
            None => Type::Unit,
        };
        Ok(ty)
    }

    /// Returns whether the initializer diverges
    fn let_stmt(&mut self, stmt: &LetStmt) -> Result<bool> {
        let declared = match &stmt.ty {
            Some(ty) => Some(self.resolve_type(ty)?),
            None => None,
        };
        let init = match &stmt.init {
            Some(init) => Some((self.expr(init)?, init.span)),
            None => None,
        };
        let diverges = init.as_ref().is_some_and(|(ty, _)| ty.is_never());

        let ty = match (declared, init) {
            (Some(declared), Some((actual, span))) => {
                self.expect(&actual, &declared, span)?;
                declared
            }
            (Some(declared), None) => declared,
            (None, Some((actual, _))) => actual.value_type().clone(),
            (None, None) => {
                let name = match &stmt.pattern {
                    Pattern::Ident { name, .. } => name.name.clone(),
                    _ => "_".to_string(),
                };
                self.report(Error::AnnotationNeeded {
                    name,
                    span: stmt.span,
                })?
            }
        };

        self.bind_pattern(&stmt.pattern, ty)?;
        Ok(diverges)
    }

    fn bind_pattern(&mut self, pattern: &Pattern, ty: Type) -> Result<()> {
        match pattern {
            Pattern::Ident {
                id,
                by_ref,
                mutable,
                ..
            } => {
                let ty = if *by_ref {
                    Type::reference(ty, *mutable)
                } else {
                    ty
                };
                if let Some(symbol) = self.resolutions.symbol(*id) {
                    self.table.symbol_mut(symbol).ty = Some(ty.clone());
                }
                self.types.insert(*id, ty);
                Ok(())
            }
            Pattern::Wildcard { .. } => Ok(()),
            Pattern::Ref {
                mutable,
                inner,
                span,
                ..
            } => match ty {
                Type::Reference {
                    inner: referent,
                    mutable: is_mut,
                } if is_mut || !*mutable => self.bind_pattern(inner, *referent),
                Type::Error | Type::Never => self.bind_pattern(inner, Type::Error),
                other => {
                    self.diagnostics.report(Error::PatternMismatch {
                        ty: other.describe(),
                        span: *span,
                    })?;
                    self.bind_pattern(inner, Type::Error)
                }
            },
        }
    }

    // ==================== Expressions ====================

    fn expr(&mut self, expr: &Expr) -> Result<Type> {
        let ty = self.expr_kind(expr)?;
        self.types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn expr_kind(&mut self, expr: &Expr) -> Result<Type> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => self.literal(lit, span),
            ExprKind::Unit => Ok(Type::Unit),
            ExprKind::Path(path) => self.path(path, span),
            ExprKind::Group(inner) => self.expr(inner),
            ExprKind::Unary { op, expr: operand } => self.unary(*op, operand),
            ExprKind::Borrow {
                mutable,
                expr: inner,
            } => {
                let ty = self.expr(inner)?;
                if *mutable && self.place_mutability(inner) == Some(false) {
                    self.diagnostics.report(Error::ImmutableBorrow { span })?;
                }
                Ok(Type::reference(ty.value_type().clone(), *mutable))
            }
            ExprKind::Deref(inner) => {
                let ty = self.expr(inner)?;
                match ty.value_type() {
                    Type::Reference { inner, .. } => Ok((**inner).clone()),
                    bottom if bottom.is_bottom() => Ok(bottom.clone()),
                    other => {
                        let ty = other.describe();
                        self.report(Error::CannotDeref { ty, span })
                    }
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.expr(left)?;
                let rhs = self.expr(right)?;
                self.binary(*op, &lhs, &rhs, span)
            }
            ExprKind::Assign { target, value } => {
                let value_ty = self.expr(value)?;
                if matches!(target.kind, ExprKind::Underscore) {
                    self.types.insert(target.id, value_ty.value_type().clone());
                    return Ok(Type::Unit);
                }
                let target_ty = self.expr(target)?;
                self.check_assignable(target)?;
                self.expect(&value_ty, &target_ty, value.span)?;
                Ok(Type::Unit)
            }
            ExprKind::CompoundAssign { op, target, value } => {
                let target_ty = self.expr(target)?;
                let value_ty = self.expr(value)?;
                self.check_assignable(target)?;
                let result = self.binary(*op, &target_ty, &value_ty, span)?;
                if !result.is_bottom() {
                    self.expect(&result, &target_ty, span)?;
                }
                Ok(Type::Unit)
            }
            ExprKind::Cast { expr: inner, ty } => {
                let from = self.expr(inner)?.value_type().clone();
                let to = self.resolve_type(ty)?;
                let valid = from.is_bottom()
                    || to.is_error()
                    || from == to
                    || (from.is_integer() && to.is_integer());
                if !valid {
                    return self.report(Error::InvalidCast {
                        from: from.describe(),
                        to: to.describe(),
                        span,
                    });
                }
                Ok(to)
            }
            ExprKind::Call { callee, args } => self.call(callee, args, span),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.method_call(expr.id, receiver, method, args, span),
            ExprKind::Field { receiver, field } => {
                let receiver_ty = self.expr(receiver)?;
                match receiver_ty.value_type().auto_deref() {
                    Type::Struct { symbol, .. } => {
                        let member = self
                            .table
                            .symbol(*symbol)
                            .members
                            .iter()
                            .copied()
                            .find(|&m| self.table.symbol(m).name == field.name);
                        match member {
                            Some(member) => {
                                self.resolutions.bind(expr.id, member);
                                self.symbol_type(member)
                            }
                            None => self.report(Error::UnknownField {
                                field: field.name.clone(),
                                ty: receiver_ty.describe(),
                                span: field.span,
                            }),
                        }
                    }
                    bottom if bottom.is_bottom() => Ok(Type::Error),
                    _ => self.report(Error::UnknownField {
                        field: field.name.clone(),
                        ty: receiver_ty.describe(),
                        span: field.span,
                    }),
                }
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.expr(base)?;
                let index_ty = self.expr(index)?;
                self.expect(&index_ty, &Type::USIZE, index.span)?;
                match base_ty.value_type().auto_deref() {
                    Type::Array { elem, .. } => Ok((**elem).clone()),
                    bottom if bottom.is_bottom() => Ok(Type::Error),
                    other => {
                        let ty = other.describe();
                        self.report(Error::NotIndexable { ty, span: base.span })
                    }
                }
            }
            ExprKind::StructLit { path, fields } => self.struct_literal(path, fields, span),
            ExprKind::Array(elements) => {
                let mut elem = Type::Never;
                for element in elements {
                    let ty = self.expr(element)?;
                    match common_type(&elem, ty.value_type()) {
                        Some(common) => elem = common,
                        None => {
                            self.diagnostics.report(Error::IncompatibleElements {
                                first: elem.to_string(),
                                other: ty.value_type().to_string(),
                                span: element.span,
                            })?;
                        }
                    }
                }
                Ok(Type::array(elem, elements.len() as u64))
            }
            ExprKind::ArrayRepeat { value, count } => {
                let elem = self.expr(value)?.value_type().clone();
                match self.array_size(count)? {
                    Some(size) => Ok(Type::array(elem, size)),
                    None => Ok(Type::Error),
                }
            }
            ExprKind::Block(block) => self.block(block),
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => self.if_expr(cond, then_block, else_branch.as_deref(), span),
            ExprKind::Loop(body) => {
                self.flow.push(FlowContext::Loop {
                    node: expr.id,
                    is_while: false,
                    break_ty: None,
                });
                let body_ty = self.block(body);
                let context = self.flow.pop();
                self.expect(&body_ty?, &Type::Unit, body.span)?;
                match context {
                    Some(FlowContext::Loop {
                        break_ty: Some(ty), ..
                    }) => Ok(ty),
                    _ => Ok(Type::Never),
                }
            }
            ExprKind::While { cond, body } => {
                self.condition(cond)?;
                self.flow.push(FlowContext::Loop {
                    node: expr.id,
                    is_while: true,
                    break_ty: None,
                });
                let body_ty = self.block(body);
                self.flow.pop();
                self.expect(&body_ty?, &Type::Unit, body.span)?;
                Ok(Type::Unit)
            }
            ExprKind::Break(value) => self.break_expr(expr.id, value.as_deref(), span),
            ExprKind::Continue => match self.enclosing_loop() {
                Some(index) => {
                    if let FlowContext::Loop { node, .. } = &self.flow[index] {
                        self.targets.insert(expr.id, *node);
                    }
                    Ok(Type::Never)
                }
                None => {
                    self.diagnostics.report(Error::ContinueOutsideLoop { span })?;
                    Ok(Type::Never)
                }
            },
            ExprKind::Return(value) => self.return_expr(expr.id, value.as_deref(), span),
            ExprKind::Underscore => self.report(Error::MisplacedUnderscore { span }),
        }
    }

    fn literal(&mut self, lit: &Literal, span: Span) -> Result<Type> {
        let ty = match lit {
            Literal::Int { value, suffix } => match suffix {
                Some(suffix) => {
                    let prim = suffix.primitive();
                    let value = i128::from(*value);
                    if let Some((lo, hi)) = prim.range() {
                        if value < lo || value > hi {
                            return self.report(Error::ConstOverflow {
                                value,
                                ty: prim.name().to_string(),
                                span,
                            });
                        }
                    }
                    Type::Primitive(prim)
                }
                None => Type::INT,
            },
            Literal::Bool(_) => Type::BOOL,
            Literal::Char(_) => Type::CHAR,
            Literal::Str(_) | Literal::CStr(_) => Type::reference(Type::STR, false),
        };
        Ok(ty)
    }

    fn path(&mut self, path: &PathExpr, span: Span) -> Result<Type> {
        let Some(symbol) = self.associated(path)? else {
            return Ok(Type::Error);
        };
        let symbol_ty = self.symbol_type(symbol)?;
        let sym = self.table.symbol(symbol);

        match (sym.kind, symbol_ty) {
            (SymbolKind::StructConstructor, Type::StructConstructor(inner)) => {
                let is_unit = matches!(
                    sym.decl.and_then(|decl| self.decls.get(decl)),
                    Some(Decl::Struct(s)) if s.is_unit
                );
                if is_unit {
                    Ok(*inner)
                } else {
                    let name = sym.name.clone();
                    self.report(Error::ExpectedValue {
                        what: "struct",
                        name,
                        span,
                    })
                }
            }
            (SymbolKind::EnumVariant, Type::EnumConstructor(inner)) => Ok(*inner),
            // `Type::method` names the method as a plain function taking
            // the receiver first
            (SymbolKind::Function, Type::Function(f)) if path.second.is_some() => match f.receiver {
                Some(receiver) => {
                    let decl = sym.decl.unwrap_or(path.first.id);
                    let owner = self.self_type(decl)?;
                    let first = if receiver.by_ref {
                        Type::reference(owner, receiver.mutable)
                    } else {
                        owner
                    };
                    let mut params = vec![first];
                    params.extend(f.params);
                    Ok(Type::Function(FnType {
                        params,
                        ret: f.ret,
                        receiver: None,
                    }))
                }
                None => Ok(Type::Function(f)),
            },
            (SymbolKind::Struct | SymbolKind::Enum | SymbolKind::Trait | SymbolKind::BuiltinType, _) => {
                let (what, name) = (sym.kind.describe(), sym.name.clone());
                self.report(Error::ExpectedValue { what, name, span })
            }
            (_, ty) => Ok(ty),
        }
    }

    fn unary(&mut self, op: UnOp, operand: &Expr) -> Result<Type> {
        let ty = self.expr(operand)?.value_type().clone();
        let valid = match (op, &ty) {
            (_, bottom) if bottom.is_bottom() => true,
            (UnOp::Neg, Type::Primitive(p)) => p.is_integer() && p.is_signed(),
            (UnOp::Not, Type::Primitive(p)) => p.is_integer() || ty == Type::BOOL,
            _ => false,
        };
        if !valid {
            let symbol = match op {
                UnOp::Neg => "-",
                UnOp::Not => "!",
            };
            return self.report(Error::InvalidOperand {
                op: symbol,
                ty: ty.describe(),
                span: operand.span,
            });
        }
        Ok(ty)
    }

    fn binary(&mut self, op: BinOp, lhs: &Type, rhs: &Type, span: Span) -> Result<Type> {
        let (lhs, rhs) = (lhs.value_type(), rhs.value_type());
        if lhs.is_error() || rhs.is_error() {
            return Ok(if op.is_comparison() || op.is_lazy() {
                Type::BOOL
            } else {
                Type::Error
            });
        }

        if op.is_lazy() {
            self.expect(lhs, &Type::BOOL, span)?;
            self.expect(rhs, &Type::BOOL, span)?;
            return Ok(Type::BOOL);
        }

        if op.is_comparison() {
            if common_type(lhs, rhs).is_none() {
                self.diagnostics.report(Error::TypeMismatch {
                    expected: lhs.describe(),
                    got: rhs.describe(),
                    span,
                })?;
            }
            return Ok(Type::BOOL);
        }

        let is_operand = |ty: &Type| ty.is_never() || ty.is_integer();
        let booleans = op.is_bitwise() && lhs == &Type::BOOL && rhs == &Type::BOOL;
        if booleans {
            return Ok(Type::BOOL);
        }
        for ty in [lhs, rhs] {
            if !is_operand(ty) {
                return self.report(Error::InvalidOperand {
                    op: op.symbol(),
                    ty: ty.describe(),
                    span,
                });
            }
        }

        if op.is_shift() {
            return Ok(lhs.clone());
        }
        match common_type(lhs, rhs) {
            Some(common) => Ok(common),
            None => self.report(Error::TypeMismatch {
                expected: lhs.describe(),
                got: rhs.describe(),
                span,
            }),
        }
    }

    fn condition(&mut self, cond: &Expr) -> Result<()> {
        let ty = self.expr(cond)?;
        if !is_compatible(&ty, &Type::BOOL) {
            self.diagnostics.report(Error::NonBooleanCondition {
                got: ty.describe(),
                span: cond.span,
            })?;
        }
        Ok(())
    }

    fn if_expr(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        else_branch: Option<&Expr>,
        span: Span,
    ) -> Result<Type> {
        self.condition(cond)?;
        let then_ty = self.block(then_block)?;

        let Some(else_branch) = else_branch else {
            self.expect(&then_ty, &Type::Unit, then_block.span)?;
            return Ok(Type::Unit);
        };
        let else_ty = self.expr(else_branch)?;

        match common_type(&then_ty, &else_ty) {
            Some(common) => Ok(common),
            None => self.report(Error::IncompatibleBranches {
                then_ty: then_ty.describe(),
                else_ty: else_ty.describe(),
                span,
            }),
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<Type> {
        let callee_ty = self.expr(callee)?;
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.expr(arg)?);
        }

        match callee_ty.value_type() {
            Type::Function(f) => {
                let f = f.clone();
                self.check_args(&f.params, args, &arg_types, span)?;
                Ok(*f.ret)
            }
            bottom if bottom.is_bottom() => Ok(Type::Error),
            other => {
                let ty = other.describe();
                self.report(Error::NotCallable { ty, span: callee.span })
            }
        }
    }

    fn check_args(&mut self, params: &[Type], args: &[Expr], arg_types: &[Type], span: Span) -> Result<()> {
        if params.len() != args.len() {
            self.diagnostics.report(Error::ArgCountMismatch {
                expected: params.len(),
                got: args.len(),
                span,
            })?;
            return Ok(());
        }
        for ((param, arg), ty) in params.iter().zip(args).zip(arg_types) {
            self.expect(ty, param, arg.span)?;
        }
        Ok(())
    }

    fn method_call(
        &mut self,
        node: NodeId,
        receiver: &Expr,
        method: &Ident,
        args: &[Expr],
        span: Span,
    ) -> Result<Type> {
        let receiver_ty = self.expr(receiver)?;
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.expr(arg)?);
        }

        let base = receiver_ty.value_type().auto_deref().clone();
        if base.is_bottom() {
            return Ok(Type::Error);
        }

        let declared = match &base {
            Type::Struct { symbol, .. } | Type::Enum { symbol, .. } => {
                Some(&self.table.symbol(*symbol).impl_members)
            }
            Type::Trait { symbol, .. } => Some(&self.table.symbol(*symbol).members),
            _ => None,
        }
        .and_then(|members| {
            members
                .iter()
                .copied()
                .find(|&m| self.table.symbol(m).name == method.name)
        });
        let Some(symbol) = declared.or_else(|| self.builtins.method(&base, &method.name)) else {
            return self.report(Error::UnresolvedMethod {
                method: method.name.clone(),
                ty: receiver_ty.describe(),
                span: method.span,
            });
        };
        self.resolutions.bind(node, symbol);

        let f = match self.symbol_type(symbol)? {
            Type::Function(f) if f.receiver.is_some() => f,
            Type::Function(_) => {
                return self.report(Error::NotAMethod {
                    name: method.name.clone(),
                    span: method.span,
                })
            }
            _ => return Ok(Type::Error),
        };

        if let Some(Receiver {
            by_ref: true,
            mutable: true,
        }) = f.receiver
        {
            let writable = match receiver_ty.value_type() {
                Type::Reference { mutable, .. } => *mutable,
                _ => self.place_mutability(receiver) != Some(false),
            };
            if !writable {
                self.diagnostics.report(Error::ImmutableBorrow {
                    span: receiver.span,
                })?;
            }
        }

        self.check_args(&f.params, args, &arg_types, span)?;
        Ok(*f.ret)
    }

    fn struct_literal(&mut self, path: &PathSegment, fields: &[FieldInit], span: Span) -> Result<Type> {
        let owner = self
            .resolutions
            .symbol(path.id)
            .filter(|&ctor| self.table.symbol(ctor).kind == SymbolKind::StructConstructor)
            .and_then(|ctor| self.table.symbol(ctor).owner_type);

        let mut value_types = Vec::with_capacity(fields.len());
        for field in fields {
            value_types.push(self.expr(&field.value)?);
        }
        let Some(owner) = owner else {
            return Ok(Type::Error);
        };

        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.name.name.as_str()) {
                self.diagnostics.report(Error::DuplicateField {
                    field: field.name.name.clone(),
                    span: field.span,
                })?;
            }
        }

        let expected = self.table.symbol(owner).members.len();
        if seen.len() != expected {
            self.diagnostics.report(Error::FieldCountMismatch {
                name: self.table.symbol(owner).name.clone(),
                expected,
                got: seen.len(),
                span,
            })?;
        }

        for (field, value_ty) in fields.iter().zip(&value_types) {
            if let Some(member) = self.resolutions.symbol(field.id) {
                let field_ty = self.symbol_type(member)?;
                self.expect(value_ty, &field_ty, field.value.span)?;
            }
        }
        self.symbol_type(owner)
    }

    // ==================== Control Flow ====================

    /// Index of the innermost loop inside the current function
    fn enclosing_loop(&self) -> Option<usize> {
        for (index, context) in self.flow.iter().enumerate().rev() {
            match context {
                FlowContext::Function { .. } => return None,
                FlowContext::Loop { .. } => return Some(index),
            }
        }
        None
    }

    fn break_expr(&mut self, node: NodeId, value: Option<&Expr>, span: Span) -> Result<Type> {
        let value_ty = match value {
            Some(value) => self.expr(value)?.value_type().clone(),
            None => Type::Unit,
        };
        let Some(index) = self.enclosing_loop() else {
            self.diagnostics.report(Error::BreakOutsideLoop { span })?;
            return Ok(Type::Never);
        };

        let mismatch = match &mut self.flow[index] {
            FlowContext::Loop {
                node: target,
                is_while,
                break_ty,
            } => {
                self.targets.insert(node, *target);
                if *is_while {
                    if value.is_some() {
                        Some(Error::BreakWithValueInWhile { span })
                    } else {
                        None
                    }
                } else {
                    let merged = match break_ty.as_ref() {
                        Some(previous) => common_type(previous, &value_ty).ok_or_else(|| previous.clone()),
                        None => Ok(value_ty.clone()),
                    };
                    match merged {
                        Ok(merged) => {
                            *break_ty = Some(merged);
                            None
                        }
                        Err(previous) => Some(Error::TypeMismatch {
                            expected: previous.describe(),
                            got: value_ty.describe(),
                            span,
                        }),
                    }
                }
            }
            FlowContext::Function { .. } => None,
        };
        if let Some(err) = mismatch {
            self.diagnostics.report(err)?;
        }
        Ok(Type::Never)
    }

    fn return_expr(&mut self, node: NodeId, value: Option<&Expr>, span: Span) -> Result<Type> {
        let value_ty = match value {
            Some(value) => self.expr(value)?,
            None => Type::Unit,
        };
        let function = self.flow.iter().rev().find_map(|context| match context {
            FlowContext::Function { node, ret } => Some((*node, ret.clone())),
            FlowContext::Loop { .. } => None,
        });
        match function {
            Some((target, ret)) => {
                self.targets.insert(node, target);
                let span = value.map_or(span, |value| value.span);
                self.expect(&value_ty, &ret, span)?;
            }
            None => self.diagnostics.report(Error::ReturnOutsideFunction { span })?,
        }
        Ok(Type::Never)
    }

    // ==================== Places ====================

    /// `Some(mutable)` for place expressions, `None` for temporaries
    fn place_mutability(&self, expr: &Expr) -> Option<bool> {
        match &expr.kind {
            ExprKind::Path(path) if path.second.is_none() => {
                let symbol = self.resolutions.symbol(path.first.id)?;
                let symbol = self.table.symbol(symbol);
                Some(symbol.kind.is_binding() && symbol.mutable)
            }
            ExprKind::Path(_) => Some(false),
            ExprKind::Group(inner) => self.place_mutability(inner),
            ExprKind::Field { receiver: base, .. } | ExprKind::Index { base, .. } => {
                match self.types.get(&base.id).map(Type::value_type) {
                    Some(Type::Reference { mutable, .. }) => Some(*mutable),
                    _ => self.place_mutability(base),
                }
            }
            ExprKind::Deref(inner) => match self.types.get(&inner.id).map(Type::value_type) {
                Some(Type::Reference { mutable, .. }) => Some(*mutable),
                _ => Some(false),
            },
            _ => None,
        }
    }

    fn check_assignable(&mut self, target: &Expr) -> Result<()> {
        match self.place_mutability(target) {
            Some(true) => Ok(()),
            Some(false) => self.diagnostics.report(Error::ImmutableAssignment { span: target.span }),
            None => self.diagnostics.report(Error::InvalidAssignTarget { span: target.span }),
        }
    }
}

impl ConstEnv for TypeChecker<'_> {
    fn named_constant(&mut self, path: &PathExpr, span: Span) -> Result<Option<ConstValue>> {
        let symbol = if path.second.is_some() {
            self.associated(path)?
        } else {
            self.resolutions.symbol(path.first.id)
        };
        match symbol {
            Some(symbol) => self.constant_value(symbol, span),
            // Already reported during resolution
            None => Ok(Some(ConstValue::unknown())),
        }
    }

    fn cast_target(&mut self, ty: &TypeExpr) -> Result<Type> {
        self.resolve_type(ty)
    }

    fn cached(&self, node: NodeId) -> Option<ConstValue> {
        self.consts.get(&node).cloned()
    }

    fn cache(&mut self, node: NodeId, value: ConstValue) {
        self.consts.insert(node, value);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::frontend::parser::Parser;
    use crate::semantic::namespace::NamespaceAnalyzer;
    use crate::utils::ErrorMode;

    struct Checked {
        program: Program,
        tables: TypeTables,
        table: SymbolTable,
        errors: Vec<Error>,
    }

    fn check(source: &str) -> Checked {
        let program = Parser::parse_source(source, 0).unwrap();
        let fathers = FatherMap::build(&program);
        let mut diagnostics = Diagnostics::new(ErrorMode::Collect);
        let mut analysis = NamespaceAnalyzer::analyze(&program, &fathers, &mut diagnostics).unwrap();
        assert!(
            !diagnostics.has_errors(),
            "resolution errors: {:?}",
            diagnostics.errors()
        );
        let decls = DeclIndex::build(&program);
        let tables = TypeChecker::new(
            &decls,
            &fathers,
            &mut analysis.table,
            &mut analysis.resolutions,
            &analysis.builtins,
            &mut diagnostics,
        )
        .run(&program)
        .unwrap();
        Checked {
            program,
            tables,
            table: analysis.table,
            errors: diagnostics.into_errors(),
        }
    }

    fn errors_in(source: &str) -> Vec<Error> {
        check(source).errors
    }

    fn assert_clean(source: &str) {
        let errors = errors_in(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    fn local_type(checked: &Checked, name: &str) -> Option<Type> {
        checked
            .table
            .symbols()
            .find(|(_, s)| s.name == name && s.kind == SymbolKind::LocalVariable)
            .and_then(|(_, s)| s.ty.clone())
    }

    #[test]
    fn test_function_body_matches_return_type() {
        assert_clean("fn add(a: i32, b: i32) -> i32 { a + b }");
        let errors = errors_in("fn f() -> i32 { true }");
        assert!(matches!(errors.as_slice(), [Error::TypeMismatch { .. }]));
    }

    #[test]
    fn test_let_inference_and_defaulting() {
        let checked = check("fn main() { let a = 1; let b: u32 = 2; let c = b + 3; let d = [1; 4]; }");
        assert!(checked.errors.is_empty(), "{:?}", checked.errors);
        assert_eq!(local_type(&checked, "a"), Some(Type::I32));
        assert_eq!(local_type(&checked, "c"), Some(Type::U32));
        assert_eq!(local_type(&checked, "d"), Some(Type::array(Type::I32, 4)));
    }

    #[test]
    fn test_annotation_needed() {
        let errors = errors_in("fn main() { let x; }");
        assert!(matches!(errors.as_slice(), [Error::AnnotationNeeded { .. }]));
    }

    #[test]
    fn test_ambiguous_block() {
        assert_clean("fn f() {} fn main() { let u: () = { f() }; }");
        let errors = errors_in("fn f() {} fn main() { let b: bool = { f() }; }");
        assert!(matches!(errors.as_slice(), [Error::TypeMismatch { .. }]));
        // A tail value may be discarded
        assert_clean("fn main() { if true { 1 } else { 2 } }");
    }

    #[test]
    fn test_if_branches() {
        let errors = errors_in("fn f() -> bool { if true { 1 } else { false } }");
        match errors.as_slice() {
            [Error::IncompatibleBranches { then_ty, else_ty, .. }] => {
                assert_eq!(then_ty, "i32");
                assert_eq!(else_ty, "bool");
            }
            other => panic!("unexpected errors: {:?}", other),
        }
        let errors = errors_in("fn main() { if 1 { } }");
        assert!(matches!(errors.as_slice(), [Error::NonBooleanCondition { .. }]));
    }

    #[test]
    fn test_never_unifies() {
        assert_clean("fn f(c: bool) -> i32 { if c { return 1; } else { 2 } }");
        assert_clean("fn f() -> i32 { loop { return 3; } }");
        assert_clean("fn f() -> i32 { return 4; }");
    }

    #[test]
    fn test_loop_break_values() {
        let checked = check("fn main() { let x = loop { break 5u32; }; }");
        assert!(checked.errors.is_empty(), "{:?}", checked.errors);
        assert_eq!(local_type(&checked, "x"), Some(Type::U32));

        let errors = errors_in("fn main() { let x = loop { if true { break 1; } break false; }; }");
        assert!(matches!(errors.as_slice(), [Error::TypeMismatch { .. }]));
        let errors = errors_in("fn main() { while true { break 1; } }");
        assert!(matches!(errors.as_slice(), [Error::BreakWithValueInWhile { .. }]));
    }

    #[test]
    fn test_control_flow_placement() {
        let errors = errors_in("fn main() { break; }");
        assert!(matches!(errors.as_slice(), [Error::BreakOutsideLoop { .. }]));
        let errors = errors_in("fn main() { continue; }");
        assert!(matches!(errors.as_slice(), [Error::ContinueOutsideLoop { .. }]));
        // A nested function is a barrier for the outer loop
        let errors = errors_in("fn main() { loop { fn inner() { break; } break; } }");
        assert!(matches!(errors.as_slice(), [Error::BreakOutsideLoop { .. }]));
        let errors = errors_in("const C: i32 = return 1;");
        assert!(matches!(errors.as_slice(), [Error::ReturnOutsideFunction { .. }]));
    }

    #[test]
    fn test_break_targets() {
        let checked = check("fn main() { loop { while true { break; } break; } }");
        assert_eq!(checked.tables.targets.len(), 2);
        let mut targets: Vec<NodeId> = checked.tables.targets.values().copied().collect();
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_assignment_mutability() {
        assert_clean("fn main() { let mut x = 1; x = 2; x += 3; }");
        let errors = errors_in("fn main() { let x = 1; x = 2; }");
        assert!(matches!(errors.as_slice(), [Error::ImmutableAssignment { .. }]));
        let errors = errors_in("fn main() { 1 = 2; }");
        assert!(matches!(errors.as_slice(), [Error::InvalidAssignTarget { .. }]));
        let errors = errors_in("fn main() { let x = 1; let r = &mut x; }");
        assert!(matches!(errors.as_slice(), [Error::ImmutableBorrow { .. }]));
        assert_clean("fn main() { let mut a = [0; 3]; let r = &mut a; r[1] = 4; _ = r; }");
    }

    #[test]
    fn test_methods_and_self() {
        let source = "
            struct Counter { n: i32 }
            impl Counter {
                fn new() -> Self { Self { n: 0 } }
                fn get(&self) -> i32 { self.n }
                fn bump(&mut self) { self.n += 1; }
            }
            fn main() {
                let mut c = Counter::new();
                c.bump();
                let v: i32 = c.get();
                let w = Counter::get(&c);
            }
        ";
        assert_clean(source);

        let errors = errors_in(
            "struct C { n: i32 } impl C { fn bump(&mut self) { self.n += 1; } fn peek(&self) { self.n = 2; } } fn main() { let c = C { n: 0 }; c.bump(); }",
        );
        assert!(matches!(
            errors.as_slice(),
            [Error::ImmutableAssignment { .. }, Error::ImmutableBorrow { .. }]
        ));
    }

    #[test]
    fn test_method_errors() {
        let errors = errors_in("struct P {} impl P { fn make() -> P { P {} } } fn main() { let p = P {}; p.make(); p.nope(); }");
        assert!(matches!(
            errors.as_slice(),
            [Error::NotAMethod { .. }, Error::UnresolvedMethod { .. }]
        ));
        let errors = errors_in("struct P {} fn main() { let q = P::missing; }");
        assert!(matches!(errors.as_slice(), [Error::UnresolvedAssociated { .. }]));
    }

    #[test]
    fn test_builtins() {
        assert_clean(
            "fn main() { let mut s: String = getString(); s.append(\"x\"); let n: usize = s.len(); let a = [1, 2]; let m = a.len(); printlnInt(getInt()); println(s.as_str()); exit(0); }",
        );
        let errors = errors_in("fn main() { printInt(1, 2); }");
        assert!(matches!(errors.as_slice(), [Error::ArgCountMismatch { .. }]));
        let errors = errors_in("fn main() { let s = getString(); s.append(\"x\"); }");
        assert!(matches!(errors.as_slice(), [Error::ImmutableBorrow { .. }]));
    }

    #[test]
    fn test_struct_literals_and_fields() {
        assert_clean("struct P { x: i32, y: i32 } fn main() { let p = P { y: 2, x: 1 }; let s: i32 = p.x + p.y; }");
        let errors = errors_in("struct P { x: i32, y: i32 } fn main() { let p = P { x: 1 }; }");
        assert!(matches!(
            errors.as_slice(),
            [Error::FieldCountMismatch { expected: 2, got: 1, .. }]
        ));
        let errors = errors_in("struct P { x: i32 } fn main() { let p = P { x: true }; }");
        assert!(matches!(errors.as_slice(), [Error::TypeMismatch { .. }]));
        let errors = errors_in("struct P { x: i32 } fn main() { let p = P { x: 1, x: 2 }; }");
        assert!(matches!(errors.as_slice(), [Error::DuplicateField { .. }]));
        let errors = errors_in("struct P { x: i32 } fn main() { let p = P { x: 1 }; p.z; }");
        assert!(matches!(errors.as_slice(), [Error::UnknownField { .. }]));
    }

    #[test]
    fn test_auto_deref_and_explicit_deref() {
        assert_clean("struct P { x: i32 } fn f(p: &P) -> i32 { p.x } fn g(r: &i32) -> i32 { *r }");
        let errors = errors_in("fn g(r: i32) -> i32 { *r }");
        assert!(matches!(errors.as_slice(), [Error::CannotDeref { .. }]));
        let errors = errors_in("fn g(r: i32) -> i32 { r[0] }");
        assert!(matches!(errors.as_slice(), [Error::NotIndexable { .. }]));
    }

    #[test]
    fn test_casts() {
        assert_clean("fn main() { let a = 1i32 as usize; let b = true as bool; }");
        let errors = errors_in("fn main() { let a = true as i32; }");
        assert!(matches!(errors.as_slice(), [Error::InvalidCast { .. }]));
    }

    #[test]
    fn test_array_sizes() {
        let checked = check("const N: usize = 2 + 1; fn main() { let a = [0; N]; let b: [i32; 3] = a; }");
        assert!(checked.errors.is_empty(), "{:?}", checked.errors);
        assert_eq!(local_type(&checked, "b"), Some(Type::array(Type::I32, 3)));

        let errors = errors_in("fn main() { let n: usize = 3; let a = [0; n]; }");
        assert!(matches!(errors.as_slice(), [Error::NonConstant { .. }]));
        let errors = errors_in("fn main() { let a = [0; 0 - 1]; }");
        assert!(matches!(errors.as_slice(), [Error::NegativeArraySize { .. }]));
        let errors = errors_in("fn main() { let a: [i32; 2] = [1, 2, 3]; }");
        assert!(matches!(errors.as_slice(), [Error::TypeMismatch { .. }]));
    }

    #[test]
    fn test_wide_shifts_in_constants() {
        assert_clean("const A: usize = 1 << 40; fn main() { let a = [0; 1 << 33]; }");

        let errors = errors_in("const A: i32 = 1 << 40;");
        assert!(matches!(errors.as_slice(), [Error::ConstOverflow { .. }]));
        let errors = errors_in("const A: u32 = 1u32 << 32;");
        assert!(matches!(
            errors.as_slice(),
            [Error::ShiftOverflow { amount: 32, bits: 32, .. }]
        ));
    }

    #[test]
    fn test_array_elements_must_agree() {
        let errors = errors_in("fn main() { let a = [1, true]; }");
        assert!(matches!(errors.as_slice(), [Error::IncompatibleElements { .. }]));
        assert_eq!(
            errors[0].to_string(),
            "Array elements have incompatible types: {integer} and bool"
        );
    }

    #[test]
    fn test_constant_evaluation_errors() {
        let errors = errors_in("const A: i32 = B; const B: i32 = A;");
        assert!(matches!(errors.as_slice(), [Error::CyclicConstant { .. }]));
        let errors = errors_in("const D: i32 = 1 / 0; fn main() { let a = [0; D as usize]; }");
        assert!(matches!(errors.as_slice(), [Error::ZeroDivisor { .. }]));
        let errors = errors_in("const X: u32 = 0 - 1;");
        assert!(matches!(errors.as_slice(), [Error::ConstOverflow { .. }]));
        let errors = errors_in("const X: i32;");
        assert!(matches!(errors.as_slice(), [Error::MissingConstValue { .. }]));
    }

    #[test]
    fn test_associated_constants_and_variants() {
        assert_clean(
            "enum Color { Red, Green } struct G {} impl G { const SIZE: usize = 4; } fn main() { let c = Color::Red; let same: bool = c == Color::Green; let a = [0; G::SIZE]; }",
        );
    }

    #[test]
    fn test_ref_patterns() {
        assert_clean("fn f(&x: &i32) -> i32 { x } fn g(ref y: i32) -> i32 { *y }");
        let errors = errors_in("fn f(&x: i32) {}");
        assert!(matches!(errors.as_slice(), [Error::PatternMismatch { .. }]));
    }

    #[test]
    fn test_unit_struct_and_type_as_value() {
        assert_clean("struct U; fn main() { let u: U = U; }");
        let errors = errors_in("struct P { x: i32 } fn main() { let p = P; }");
        assert!(matches!(errors.as_slice(), [Error::ExpectedValue { .. }]));
    }

    #[test]
    fn test_expression_types_are_recorded() {
        let checked = check("fn add(a: i32, b: i32) -> i32 { a + b }");
        let Some(Item::Function(f)) = checked.program.items.first() else {
            panic!("expected a function");
        };
        let tail = f.body.as_ref().and_then(|b| b.tail.as_ref()).unwrap();
        assert_eq!(checked.tables.types.get(&tail.id), Some(&Type::I32));
    }
}
