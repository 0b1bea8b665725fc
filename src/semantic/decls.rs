//! Declaration index: from a declaring node id back to its AST node

use std::collections::HashMap;

use crate::frontend::ast::*;

/// Borrowed declaration node
#[derive(Debug, Clone, Copy)]
pub enum Decl<'a> {
    Function(&'a Function),
    Struct(&'a StructDef),
    Field(&'a Field),
    Enum(&'a EnumDef),
    Const(&'a ConstDef),
    Trait(&'a TraitDef),
    Impl(&'a ImplBlock),
}

/// Every declaration of a program, keyed by node id
#[derive(Debug, Default)]
pub struct DeclIndex<'a> {
    decls: HashMap<NodeId, Decl<'a>>,
    /// Impl blocks in source order, nested ones included
    impls: Vec<&'a ImplBlock>,
}

impl<'a> DeclIndex<'a> {
    pub fn build(program: &'a Program) -> Self {
        let mut index = DeclIndex::default();
        for item in &program.items {
            index.item(item);
        }
        index
    }

    pub fn get(&self, id: NodeId) -> Option<Decl<'a>> {
        self.decls.get(&id).copied()
    }

    pub fn function(&self, id: NodeId) -> Option<&'a Function> {
        match self.get(id)? {
            Decl::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn constant(&self, id: NodeId) -> Option<&'a ConstDef> {
        match self.get(id)? {
            Decl::Const(c) => Some(c),
            _ => None,
        }
    }

    pub fn field(&self, id: NodeId) -> Option<&'a Field> {
        match self.get(id)? {
            Decl::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn impls(&self) -> &[&'a ImplBlock] {
        &self.impls
    }

    fn item(&mut self, item: &'a Item) {
        match item {
            Item::Function(f) => self.function_decl(f),
            Item::Struct(s) => {
                self.decls.insert(s.id, Decl::Struct(s));
                for field in &s.fields {
                    self.decls.insert(field.id, Decl::Field(field));
                }
            }
            Item::Enum(e) => {
                self.decls.insert(e.id, Decl::Enum(e));
            }
            Item::Const(c) => self.const_decl(c),
            Item::Trait(t) => {
                self.decls.insert(t.id, Decl::Trait(t));
                self.assoc_items(&t.items);
            }
            Item::Impl(i) => {
                self.decls.insert(i.id, Decl::Impl(i));
                self.impls.push(i);
                self.assoc_items(&i.items);
            }
        }
    }

    fn assoc_items(&mut self, items: &'a [AssocItem]) {
        for item in items {
            match item {
                AssocItem::Function(f) => self.function_decl(f),
                AssocItem::Const(c) => self.const_decl(c),
            }
        }
    }

    fn function_decl(&mut self, f: &'a Function) {
        self.decls.insert(f.id, Decl::Function(f));
        if let Some(body) = &f.body {
            self.block(body);
        }
    }

    fn const_decl(&mut self, c: &'a ConstDef) {
        self.decls.insert(c.id, Decl::Const(c));
        if let Some(value) = &c.value {
            self.expr(value);
        }
    }

    fn block(&mut self, block: &'a Block) {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Item(item) => self.item(item),
                Stmt::Let(stmt) => {
                    if let Some(init) = &stmt.init {
                        self.expr(init);
                    }
                }
                Stmt::Expr(stmt) => self.expr(&stmt.expr),
                Stmt::Empty { .. } => {}
            }
        }
        if let Some(tail) = &block.tail {
            self.expr(tail);
        }
    }

    /// Items can only hide inside blocks, so only walk what may contain one
    fn expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Block(block) | ExprKind::Loop(block) => self.block(block),
            ExprKind::While { cond, body } => {
                self.expr(cond);
                self.block(body);
            }
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.expr(cond);
                self.block(then_block);
                if let Some(else_branch) = else_branch {
                    self.expr(else_branch);
                }
            }
            ExprKind::Group(inner)
            | ExprKind::Unary { expr: inner, .. }
            | ExprKind::Borrow { expr: inner, .. }
            | ExprKind::Deref(inner)
            | ExprKind::Cast { expr: inner, .. }
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
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                args.iter().for_each(|arg| self.expr(arg));
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.expr(receiver);
                args.iter().for_each(|arg| self.expr(arg));
            }
            ExprKind::StructLit { fields, .. } => {
                fields.iter().for_each(|field| self.expr(&field.value));
            }
            ExprKind::Array(elements) => elements.iter().for_each(|e| self.expr(e)),
            ExprKind::Break(Some(value)) | ExprKind::Return(Some(value)) => self.expr(value),
            ExprKind::Literal(_)
            | ExprKind::Unit
            | ExprKind::Path(_)
            | ExprKind::Break(None)
            | ExprKind::Return(None)
            | ExprKind::Continue
            | ExprKind::Underscore => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;

    #[test]
    fn test_nested_declarations_are_indexed() {
        let program = Parser::parse_source(
            "fn main() { if true { struct Inner { a: i32 } impl Inner {} } } const N: i32 = { const M: i32 = 1; M };",
            0,
        )
        .unwrap();
        let index = DeclIndex::build(&program);
        assert_eq!(index.impls().len(), 1);
        let structs = index
            .decls
            .values()
            .filter(|d| matches!(d, Decl::Struct(s) if s.name.name == "Inner"))
            .count();
        assert_eq!(structs, 1);
        let consts = index.decls.values().filter(|d| matches!(d, Decl::Const(_))).count();
        assert_eq!(consts, 2);
    }
}
