//! Father-setter pass
//!
//! Records the syntactic parent of every node in a side table indexed by
//! [`NodeId`]. Later passes use it to walk upward from an arbitrary node to its
//! enclosing function, impl or trait without the tree holding back-pointers.

use log::debug;

use crate::frontend::ast::*;

/// Syntactic category of a node, as seen from its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Function,
    SelfParam,
    Param,
    Struct,
    Field,
    Enum,
    Variant,
    Const,
    Trait,
    Impl,
    Block,
    Let,
    ExprStmt,
    Expr,
    FieldInit,
    Pattern,
    TypeExpr,
    PathSegment,
}

/// Parent links for one program
#[derive(Debug, Default)]
pub struct FatherMap {
    parents: Vec<Option<NodeId>>,
    kinds: Vec<Option<NodeKind>>,
}

impl FatherMap {
    /// Run the pass over a parsed program
    pub fn build(program: &Program) -> Self {
        let mut setter = FatherSetter {
            map: FatherMap {
                parents: vec![None; program.node_count],
                kinds: vec![None; program.node_count],
            },
        };
        for item in &program.items {
            setter.item(item, None);
        }
        debug!("father map built for {} nodes", program.node_count);
        setter.map
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.0).copied().flatten()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.kinds.get(id.0).copied().flatten()
    }

    /// Iterate over the strict ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    /// Nearest ancestor whose kind is one of `kinds`
    pub fn enclosing(&self, id: NodeId, kinds: &[NodeKind]) -> Option<(NodeId, NodeKind)> {
        self.ancestors(id).find_map(|node| {
            let kind = self.kind(node)?;
            kinds.contains(&kind).then_some((node, kind))
        })
    }

    fn set(&mut self, id: NodeId, kind: NodeKind, parent: Option<NodeId>) {
        if id.0 >= self.parents.len() {
            self.parents.resize(id.0 + 1, None);
            self.kinds.resize(id.0 + 1, None);
        }
        self.parents[id.0] = parent;
        self.kinds[id.0] = Some(kind);
    }
}

struct FatherSetter {
    map: FatherMap,
}

impl FatherSetter {
    fn item(&mut self, item: &Item, parent: Option<NodeId>) {
        match item {
            Item::Function(f) => self.function(f, parent),
            Item::Struct(s) => {
                self.map.set(s.id, NodeKind::Struct, parent);
                for field in &s.fields {
                    self.map.set(field.id, NodeKind::Field, Some(s.id));
                    self.type_expr(&field.ty, field.id);
                }
            }
            Item::Enum(e) => {
                self.map.set(e.id, NodeKind::Enum, parent);
                for variant in &e.variants {
                    self.map.set(variant.id, NodeKind::Variant, Some(e.id));
                }
            }
            Item::Const(c) => self.constant(c, parent),
            Item::Trait(t) => {
                self.map.set(t.id, NodeKind::Trait, parent);
                self.assoc_items(&t.items, t.id);
            }
            Item::Impl(i) => {
                self.map.set(i.id, NodeKind::Impl, parent);
                self.type_expr(&i.self_ty, i.id);
                self.assoc_items(&i.items, i.id);
            }
        }
    }

    fn assoc_items(&mut self, items: &[AssocItem], parent: NodeId) {
        for item in items {
            match item {
                AssocItem::Function(f) => self.function(f, Some(parent)),
                AssocItem::Const(c) => self.constant(c, Some(parent)),
            }
        }
    }

    fn function(&mut self, f: &Function, parent: Option<NodeId>) {
        self.map.set(f.id, NodeKind::Function, parent);
        if let Some(self_param) = &f.self_param {
            self.map.set(self_param.id, NodeKind::SelfParam, Some(f.id));
            if let Some(ty) = &self_param.ty {
                self.type_expr(ty, self_param.id);
            }
        }
        for param in &f.params {
            self.map.set(param.id, NodeKind::Param, Some(f.id));
            self.pattern(&param.pattern, param.id);
            self.type_expr(&param.ty, param.id);
        }
        if let Some(ty) = &f.ret_type {
            self.type_expr(ty, f.id);
        }
        if let Some(body) = &f.body {
            self.block(body, f.id);
        }
    }

    fn constant(&mut self, c: &ConstDef, parent: Option<NodeId>) {
        self.map.set(c.id, NodeKind::Const, parent);
        self.type_expr(&c.ty, c.id);
        if let Some(value) = &c.value {
            self.expr(value, c.id);
        }
    }

    fn block(&mut self, block: &Block, parent: NodeId) {
        self.map.set(block.id, NodeKind::Block, Some(parent));
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(stmt) => {
                    self.map.set(stmt.id, NodeKind::Let, Some(block.id));
                    self.pattern(&stmt.pattern, stmt.id);
                    if let Some(ty) = &stmt.ty {
                        self.type_expr(ty, stmt.id);
                    }
                    if let Some(init) = &stmt.init {
                        self.expr(init, stmt.id);
                    }
                }
                Stmt::Item(item) => self.item(item, Some(block.id)),
                Stmt::Expr(stmt) => {
                    self.map.set(stmt.id, NodeKind::ExprStmt, Some(block.id));
                    self.expr(&stmt.expr, stmt.id);
                }
                Stmt::Empty { .. } => {}
            }
        }
        if let Some(tail) = &block.tail {
            self.expr(tail, block.id);
        }
    }

    fn pattern(&mut self, pattern: &Pattern, parent: NodeId) {
        self.map.set(pattern.id(), NodeKind::Pattern, Some(parent));
        if let Pattern::Ref { inner, .. } = pattern {
            self.pattern(inner, pattern.id());
        }
    }

    fn type_expr(&mut self, ty: &TypeExpr, parent: NodeId) {
        self.map.set(ty.id, NodeKind::TypeExpr, Some(parent));
        match &ty.kind {
            TypeExprKind::Path(segment) => {
                self.map.set(segment.id, NodeKind::PathSegment, Some(ty.id));
            }
            TypeExprKind::Ref { inner, .. } => self.type_expr(inner, ty.id),
            TypeExprKind::Array { elem, size } => {
                self.type_expr(elem, ty.id);
                self.expr(size, ty.id);
            }
            TypeExprKind::Unit => {}
        }
    }

    fn expr(&mut self, expr: &Expr, parent: NodeId) {
        let id = expr.id;
        self.map.set(id, NodeKind::Expr, Some(parent));

        match &expr.kind {
            ExprKind::Literal(_)
            | ExprKind::Unit
            | ExprKind::Continue
            | ExprKind::Underscore => {}
            ExprKind::Path(path) => {
                self.map.set(path.first.id, NodeKind::PathSegment, Some(id));
                if let Some(second) = &path.second {
                    self.map.set(second.id, NodeKind::PathSegment, Some(id));
                }
            }
            ExprKind::Group(inner)
            | ExprKind::Unary { expr: inner, .. }
            | ExprKind::Borrow { expr: inner, .. }
            | ExprKind::Deref(inner) => self.expr(inner, id),
            ExprKind::Binary { left, right, .. } => {
                self.expr(left, id);
                self.expr(right, id);
            }
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                self.expr(target, id);
                self.expr(value, id);
            }
            ExprKind::Cast { expr: inner, ty } => {
                self.expr(inner, id);
                self.type_expr(ty, id);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee, id);
                for arg in args {
                    self.expr(arg, id);
                }
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.expr(receiver, id);
                for arg in args {
                    self.expr(arg, id);
                }
            }
            ExprKind::Field { receiver, .. } => self.expr(receiver, id),
            ExprKind::Index { base, index } => {
                self.expr(base, id);
                self.expr(index, id);
            }
            ExprKind::StructLit { path, fields } => {
                self.map.set(path.id, NodeKind::PathSegment, Some(id));
                for field in fields {
                    self.map.set(field.id, NodeKind::FieldInit, Some(id));
                    self.expr(&field.value, field.id);
                }
            }
            ExprKind::Array(elements) => {
                for element in elements {
                    self.expr(element, id);
                }
            }
            ExprKind::ArrayRepeat { value, count } => {
                self.expr(value, id);
                self.expr(count, id);
            }
            ExprKind::Block(block) | ExprKind::Loop(block) => self.block(block, id),
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.expr(cond, id);
                self.block(then_block, id);
                if let Some(else_branch) = else_branch {
                    self.expr(else_branch, id);
                }
            }
            ExprKind::While { cond, body } => {
                self.expr(cond, id);
                self.block(body, id);
            }
            ExprKind::Break(value) | ExprKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value, id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;

    #[test]
    fn test_every_node_below_an_item_has_a_parent() {
        let program =
            Parser::parse_source("impl P { fn get(&self) -> i32 { let x = 1; x + 2 } }", 0)
                .unwrap();
        let map = FatherMap::build(&program);
        let roots: Vec<usize> = (0..program.node_count)
            .filter(|&i| map.kind(NodeId(i)).is_some() && map.parent(NodeId(i)).is_none())
            .collect();
        assert_eq!(roots, vec![program.items[0].id().0]);
    }

    #[test]
    fn test_enclosing_impl_from_inner_expression() {
        let program = Parser::parse_source("impl P { fn get() -> i32 { { Self::N } } }", 0).unwrap();
        let map = FatherMap::build(&program);
        let Item::Impl(imp) = &program.items[0] else {
            panic!("expected impl");
        };
        let AssocItem::Function(f) = &imp.items[0] else {
            panic!("expected function");
        };
        let body = f.body.as_ref().unwrap();
        let inner = body.tail.as_ref().unwrap();
        let ExprKind::Block(block) = &inner.kind else {
            panic!("expected block");
        };
        let path = block.tail.as_ref().unwrap();

        assert_eq!(
            map.enclosing(path.id, &[NodeKind::Impl, NodeKind::Trait]),
            Some((imp.id, NodeKind::Impl))
        );
        assert_eq!(
            map.enclosing(path.id, &[NodeKind::Function]),
            Some((f.id, NodeKind::Function))
        );
        assert_eq!(map.ancestors(path.id).last(), Some(imp.id));
    }

    #[test]
    fn test_free_function_has_no_impl() {
        let program = Parser::parse_source("fn main() { 1 }", 0).unwrap();
        let map = FatherMap::build(&program);
        let Item::Function(f) = &program.items[0] else {
            panic!("expected function");
        };
        let tail = f.body.as_ref().unwrap().tail.as_ref().unwrap();
        assert_eq!(map.enclosing(tail.id, &[NodeKind::Impl]), None);
        assert_eq!(map.kind(tail.id), Some(NodeKind::Expr));
    }
}
