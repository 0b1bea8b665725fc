//! Parser for rxc
//!
//! Recursive descent parser with Pratt parsing for expressions. Parsing is
//! all-or-nothing: the first structural mismatch is returned as an error.

use log::debug;

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Binding power of prefix operators (`- ! * & &&`)
const PREFIX_PRECEDENCE: u8 = 160;

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_id: usize,
}

impl Parser {
    /// Create a parser from a token stream
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token::eof(Span::new(end, end, 0)));
        }
        Self {
            tokens,
            pos: 0,
            next_id: 0,
        }
    }

    /// Lex and parse a whole source string
    pub fn parse_source(source: &str, file_id: usize) -> Result<Program> {
        let tokens = Lexer::tokenize_source(source, file_id)?;
        Parser::new(tokens).parse_program()
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, n: usize) -> &TokenKind {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.current();
        if token.kind.is_reserved() {
            return Error::UnsupportedKeyword {
                keyword: token.text.clone(),
                span: token.span,
            };
        }
        Error::UnexpectedToken {
            expected: expected.to_string(),
            got: token.describe(),
            span: token.span,
        }
    }

    /// Span from `start` to the end of the previously consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.tokens[self.pos.saturating_sub(1)].span)
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // ==================== Items ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            items.push(self.parse_item()?);
        }

        debug!("parsed {} top-level items", items.len());
        Ok(Program {
            items,
            node_count: self.next_id,
        })
    }

    fn parse_item(&mut self) -> Result<Item> {
        match self.current_kind() {
            TokenKind::Fn => Ok(Item::Function(self.parse_function()?)),
            TokenKind::Const if matches!(self.peek_kind(1), TokenKind::Fn) => {
                Ok(Item::Function(self.parse_function()?))
            }
            TokenKind::Const => Ok(Item::Const(self.parse_const()?)),
            TokenKind::Struct => Ok(Item::Struct(self.parse_struct()?)),
            TokenKind::Enum => Ok(Item::Enum(self.parse_enum()?)),
            TokenKind::Trait => Ok(Item::Trait(self.parse_trait()?)),
            TokenKind::Impl => Ok(Item::Impl(self.parse_impl()?)),
            _ => Err(self.unexpected("item (fn, const, struct, enum, trait, impl)")),
        }
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.current().clone();
        match &token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Ident {
                    name: name.clone(),
                    span: token.span,
                })
            }
            _ => Err(Error::ExpectedIdent {
                got: token.describe(),
                span: token.span,
            }),
        }
    }

    /// Parse a function definition, optionally prefixed by `const`
    fn parse_function(&mut self) -> Result<Function> {
        let start = self.current().span;
        let is_const = self.consume(&TokenKind::Const);
        self.expect(TokenKind::Fn)?;
        let id = self.fresh_id();
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let self_param = self.parse_self_param()?;
        if self_param.is_some() && !self.check(&TokenKind::RParen) {
            self.expect(TokenKind::Comma)?;
        }
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        let ret_type = if self.consume(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.consume(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_block()?)
        };

        Ok(Function {
            id,
            name,
            is_const,
            self_param,
            params,
            ret_type,
            body,
            span: self.span_from(start),
        })
    }

    /// `&? mut? self` or `mut? self: Type`. Rewinds if no `self` follows.
    fn parse_self_param(&mut self) -> Result<Option<SelfParam>> {
        let saved = self.pos;
        let start = self.current().span;
        let is_ref = self.consume(&TokenKind::And);
        let mutable = self.consume(&TokenKind::Mut);
        if !self.check(&TokenKind::SelfValue) {
            self.pos = saved;
            return Ok(None);
        }
        self.advance();

        let ty = if !is_ref && self.consume(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        Ok(Some(SelfParam {
            id: self.fresh_id(),
            is_ref,
            mutable,
            ty,
            span: self.span_from(start),
        }))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let start = self.current().span;
            let id = self.fresh_id();
            let pattern = self.parse_pattern()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            params.push(Param {
                id,
                pattern,
                ty,
                span: self.span_from(start),
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    fn parse_struct(&mut self) -> Result<StructDef> {
        let start = self.current().span;
        self.expect(TokenKind::Struct)?;
        let id = self.fresh_id();
        let name = self.parse_ident()?;

        if self.consume(&TokenKind::Semicolon) {
            return Ok(StructDef {
                id,
                name,
                fields: Vec::new(),
                is_unit: true,
                span: self.span_from(start),
            });
        }

        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field_start = self.current().span;
            let field_id = self.fresh_id();
            let field_name = self.parse_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            fields.push(Field {
                id: field_id,
                name: field_name,
                ty,
                span: self.span_from(field_start),
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(StructDef {
            id,
            name,
            fields,
            is_unit: false,
            span: self.span_from(start),
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDef> {
        let start = self.current().span;
        self.expect(TokenKind::Enum)?;
        let id = self.fresh_id();
        let name = self.parse_ident()?;

        self.expect(TokenKind::LBrace)?;
        let mut variants = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let variant_id = self.fresh_id();
            variants.push(Variant {
                id: variant_id,
                name: self.parse_ident()?,
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(EnumDef {
            id,
            name,
            variants,
            span: self.span_from(start),
        })
    }

    fn parse_const(&mut self) -> Result<ConstDef> {
        let start = self.current().span;
        self.expect(TokenKind::Const)?;
        let id = self.fresh_id();
        let name = self.parse_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;

        let value = if self.consume(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(ConstDef {
            id,
            name,
            ty,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_trait(&mut self) -> Result<TraitDef> {
        let start = self.current().span;
        self.expect(TokenKind::Trait)?;
        let id = self.fresh_id();
        let name = self.parse_ident()?;
        let items = self.parse_assoc_items()?;

        Ok(TraitDef {
            id,
            name,
            items,
            span: self.span_from(start),
        })
    }

    /// `impl Type { .. }` or `impl Trait for Type { .. }`
    fn parse_impl(&mut self) -> Result<ImplBlock> {
        let start = self.current().span;
        self.expect(TokenKind::Impl)?;
        let id = self.fresh_id();

        let trait_name = if matches!(self.current_kind(), TokenKind::Ident(_))
            && matches!(self.peek_kind(1), TokenKind::For)
        {
            let name = self.parse_ident()?;
            self.advance();
            Some(name)
        } else {
            None
        };

        let self_ty = self.parse_type()?;
        let items = self.parse_assoc_items()?;

        Ok(ImplBlock {
            id,
            trait_name,
            self_ty,
            items,
            span: self.span_from(start),
        })
    }

    fn parse_assoc_items(&mut self) -> Result<Vec<AssocItem>> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.current_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Fn => items.push(AssocItem::Function(self.parse_function()?)),
                TokenKind::Const if matches!(self.peek_kind(1), TokenKind::Fn) => {
                    items.push(AssocItem::Function(self.parse_function()?))
                }
                TokenKind::Const => items.push(AssocItem::Const(self.parse_const()?)),
                _ => return Err(self.unexpected("associated item (fn, const)")),
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(items)
    }

    // ==================== Types and Patterns ====================

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let start = self.current().span;

        // Reference type (`&&T` is a reference to a reference)
        if self.check(&TokenKind::And) || self.check(&TokenKind::AndAnd) {
            let double = self.advance().kind == TokenKind::AndAnd;
            let mutable = self.consume(&TokenKind::Mut);
            let inner = self.parse_type()?;
            let span = self.span_from(start);
            let mut ty = TypeExpr {
                id: self.fresh_id(),
                kind: TypeExprKind::Ref {
                    mutable,
                    inner: Box::new(inner),
                },
                span,
            };
            if double {
                ty = TypeExpr {
                    id: self.fresh_id(),
                    kind: TypeExprKind::Ref {
                        mutable: false,
                        inner: Box::new(ty),
                    },
                    span,
                };
            }
            return Ok(ty);
        }

        // Array type
        if self.consume(&TokenKind::LBracket) {
            let elem = self.parse_type()?;
            self.expect(TokenKind::Semicolon)?;
            let size = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(TypeExpr {
                id: self.fresh_id(),
                kind: TypeExprKind::Array {
                    elem: Box::new(elem),
                    size: Box::new(size),
                },
                span: self.span_from(start),
            });
        }

        // Unit type
        if self.consume(&TokenKind::LParen) {
            self.expect(TokenKind::RParen)?;
            return Ok(TypeExpr {
                id: self.fresh_id(),
                kind: TypeExprKind::Unit,
                span: self.span_from(start),
            });
        }

        match self.parse_path_segment() {
            Some(segment) => Ok(TypeExpr {
                id: self.fresh_id(),
                kind: TypeExprKind::Path(segment),
                span: start,
            }),
            None => Err(Error::ExpectedType {
                got: self.current().describe(),
                span: start,
            }),
        }
    }

    /// Identifier, `self` or `Self`
    fn parse_path_segment(&mut self) -> Option<PathSegment> {
        let token = self.current().clone();
        let kind = match token.kind {
            TokenKind::Ident(name) => SegmentKind::Ident(name),
            TokenKind::SelfValue => SegmentKind::SelfValue,
            TokenKind::SelfType => SegmentKind::SelfType,
            _ => return None,
        };
        self.advance();
        Some(PathSegment {
            id: self.fresh_id(),
            kind,
            span: token.span,
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let start = self.current().span;

        if self.check(&TokenKind::And) || self.check(&TokenKind::AndAnd) {
            let double = self.advance().kind == TokenKind::AndAnd;
            let mutable = self.consume(&TokenKind::Mut);
            let inner = self.parse_pattern()?;
            let span = self.span_from(start);
            let mut pattern = Pattern::Ref {
                id: self.fresh_id(),
                mutable,
                inner: Box::new(inner),
                span,
            };
            if double {
                pattern = Pattern::Ref {
                    id: self.fresh_id(),
                    mutable: false,
                    inner: Box::new(pattern),
                    span,
                };
            }
            return Ok(pattern);
        }

        if self.consume(&TokenKind::Underscore) {
            return Ok(Pattern::Wildcard {
                id: self.fresh_id(),
                span: start,
            });
        }

        if matches!(
            self.current_kind(),
            TokenKind::Ref | TokenKind::Mut | TokenKind::Ident(_)
        ) {
            let by_ref = self.consume(&TokenKind::Ref);
            let mutable = self.consume(&TokenKind::Mut);
            let name = self.parse_ident()?;
            return Ok(Pattern::Ident {
                id: self.fresh_id(),
                name,
                by_ref,
                mutable,
            });
        }

        Err(Error::ExpectedPattern {
            got: self.current().describe(),
            span: start,
        })
    }

    // ==================== Statements ====================

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.current().span;
        self.expect(TokenKind::LBrace)?;
        let id = self.fresh_id();

        let mut stmts = Vec::new();
        let mut tail = None;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.current_kind() {
                TokenKind::Semicolon => {
                    let span = self.advance().span;
                    stmts.push(Stmt::Empty { span });
                }
                TokenKind::Let => stmts.push(Stmt::Let(self.parse_let()?)),
                TokenKind::Fn
                | TokenKind::Const
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Trait
                | TokenKind::Impl => stmts.push(Stmt::Item(self.parse_item()?)),
                _ => {
                    let stmt_id = self.fresh_id();
                    let expr = if self.starts_block_like() {
                        self.parse_primary(true)?
                    } else {
                        self.parse_expr()?
                    };

                    if self.consume(&TokenKind::Semicolon) {
                        stmts.push(Stmt::Expr(ExprStmt {
                            id: stmt_id,
                            expr,
                            has_semi: true,
                        }));
                    } else if self.check(&TokenKind::RBrace) {
                        tail = Some(Box::new(expr));
                    } else if expr.is_block_like() {
                        stmts.push(Stmt::Expr(ExprStmt {
                            id: stmt_id,
                            expr,
                            has_semi: false,
                        }));
                    } else {
                        return Err(self.unexpected("`;`"));
                    }
                }
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(Block {
            id,
            stmts,
            tail,
            span: self.span_from(start),
        })
    }

    fn starts_block_like(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::If | TokenKind::Loop | TokenKind::While | TokenKind::LBrace
        )
    }

    /// `let pattern (: type)? (= expr)? ;`
    fn parse_let(&mut self) -> Result<LetStmt> {
        let start = self.current().span;
        self.expect(TokenKind::Let)?;
        let id = self.fresh_id();
        let pattern = self.parse_pattern()?;

        let ty = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let init = if self.consume(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(LetStmt {
            id,
            pattern,
            ty,
            init,
            span: self.span_from(start),
        })
    }

    // ==================== Expression Parsing (Pratt) ====================

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0, true)
    }

    /// Expression in a position followed by a block (`if`/`while` conditions)
    fn parse_expr_no_struct(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0, false)
    }

    fn make_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: self.fresh_id(),
            kind,
            span,
        }
    }

    /// Parse expression with binding power (Pratt parsing)
    fn parse_expr_bp(&mut self, min_bp: u8, allow_struct: bool) -> Result<Expr> {
        let mut left = self.parse_prefix(allow_struct)?;

        loop {
            let op_kind = self.current_kind().clone();
            let Some(bp) = op_kind.infix_precedence() else {
                break;
            };
            if bp < min_bp {
                break;
            }
            let start = left.span;
            self.advance();

            left = match op_kind {
                TokenKind::Dot => {
                    let name = self.parse_ident()?;
                    if self.consume(&TokenKind::LParen) {
                        let args = self.parse_args()?;
                        let kind = ExprKind::MethodCall {
                            receiver: Box::new(left),
                            method: name,
                            args,
                        };
                        let span = self.span_from(start);
                        self.make_expr(kind, span)
                    } else {
                        let kind = ExprKind::Field {
                            receiver: Box::new(left),
                            field: name,
                        };
                        let span = self.span_from(start);
                        self.make_expr(kind, span)
                    }
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    let kind = ExprKind::Call {
                        callee: Box::new(left),
                        args,
                    };
                    let span = self.span_from(start);
                    self.make_expr(kind, span)
                }
                TokenKind::LBracket => {
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let kind = ExprKind::Index {
                        base: Box::new(left),
                        index: Box::new(index),
                    };
                    let span = self.span_from(start);
                    self.make_expr(kind, span)
                }
                TokenKind::As => {
                    let ty = self.parse_type()?;
                    let kind = ExprKind::Cast {
                        expr: Box::new(left),
                        ty,
                    };
                    let span = self.span_from(start);
                    self.make_expr(kind, span)
                }
                TokenKind::Eq => {
                    // Right-associative
                    let value = self.parse_expr_bp(bp, allow_struct)?;
                    let span = start.merge(&value.span);
                    let kind = ExprKind::Assign {
                        target: Box::new(left),
                        value: Box::new(value),
                    };
                    self.make_expr(kind, span)
                }
                ref kind if Self::compound_op(kind).is_some() => {
                    let op = Self::compound_op(kind).unwrap_or(BinOp::Add);
                    let value = self.parse_expr_bp(bp, allow_struct)?;
                    let span = start.merge(&value.span);
                    let kind = ExprKind::CompoundAssign {
                        op,
                        target: Box::new(left),
                        value: Box::new(value),
                    };
                    self.make_expr(kind, span)
                }
                ref kind => {
                    let op = Self::binary_op(kind).ok_or_else(|| self.unexpected("operator"))?;
                    let right = self.parse_expr_bp(bp + 1, allow_struct)?;
                    let span = start.merge(&right.span);
                    let kind = ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    self.make_expr(kind, span)
                }
            };
        }

        Ok(left)
    }

    fn binary_op(kind: &TokenKind) -> Option<BinOp> {
        let op = match kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Rem,
            TokenKind::And => BinOp::BitAnd,
            TokenKind::Or => BinOp::BitOr,
            TokenKind::Caret => BinOp::BitXor,
            TokenKind::Shl => BinOp::Shl,
            TokenKind::Shr => BinOp::Shr,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::AndAnd => BinOp::And,
            TokenKind::OrOr => BinOp::Or,
            _ => return None,
        };
        Some(op)
    }

    fn compound_op(kind: &TokenKind) -> Option<BinOp> {
        let op = match kind {
            TokenKind::PlusEq => BinOp::Add,
            TokenKind::MinusEq => BinOp::Sub,
            TokenKind::StarEq => BinOp::Mul,
            TokenKind::SlashEq => BinOp::Div,
            TokenKind::PercentEq => BinOp::Rem,
            TokenKind::AndEq => BinOp::BitAnd,
            TokenKind::OrEq => BinOp::BitOr,
            TokenKind::CaretEq => BinOp::BitXor,
            TokenKind::ShlEq => BinOp::Shl,
            TokenKind::ShrEq => BinOp::Shr,
            _ => return None,
        };
        Some(op)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            args.push(self.parse_expr()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_prefix(&mut self, allow_struct: bool) -> Result<Expr> {
        let start = self.current().span;
        match self.current_kind() {
            TokenKind::Minus | TokenKind::Not => {
                let op = if self.advance().kind == TokenKind::Minus {
                    UnOp::Neg
                } else {
                    UnOp::Not
                };
                let operand = self.parse_expr_bp(PREFIX_PRECEDENCE, allow_struct)?;
                let span = start.merge(&operand.span);
                let kind = ExprKind::Unary {
                    op,
                    expr: Box::new(operand),
                };
                Ok(self.make_expr(kind, span))
            }
            TokenKind::Star => {
                self.advance();
                let operand = self.parse_expr_bp(PREFIX_PRECEDENCE, allow_struct)?;
                let span = start.merge(&operand.span);
                Ok(self.make_expr(ExprKind::Deref(Box::new(operand)), span))
            }
            TokenKind::And | TokenKind::AndAnd => {
                let double = self.advance().kind == TokenKind::AndAnd;
                let mutable = self.consume(&TokenKind::Mut);
                let operand = self.parse_expr_bp(PREFIX_PRECEDENCE, allow_struct)?;
                let span = start.merge(&operand.span);
                let kind = ExprKind::Borrow {
                    mutable,
                    expr: Box::new(operand),
                };
                let mut expr = self.make_expr(kind, span);
                if double {
                    let kind = ExprKind::Borrow {
                        mutable: false,
                        expr: Box::new(expr),
                    };
                    expr = self.make_expr(kind, span);
                }
                Ok(expr)
            }
            _ => self.parse_primary(allow_struct),
        }
    }

    fn parse_primary(&mut self, allow_struct: bool) -> Result<Expr> {
        let token = self.current().clone();
        let start = token.span;

        match token.kind {
            TokenKind::IntLit { value, suffix } => {
                self.advance();
                let suffix = match suffix {
                    Some(text) => Some(IntSuffix::parse(&text).ok_or(Error::InvalidIntSuffix {
                        suffix: text.clone(),
                        span: start,
                    })?),
                    None => None,
                };
                if value > u64::from(u32::MAX) {
                    return Err(Error::IntegerTooLarge {
                        text: token.text,
                        span: start,
                    });
                }
                Ok(self.make_expr(ExprKind::Literal(Literal::Int { value, suffix }), start))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                let value = token.kind == TokenKind::True;
                Ok(self.make_expr(ExprKind::Literal(Literal::Bool(value)), start))
            }
            TokenKind::CharLit(c) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Literal(Literal::Char(c)), start))
            }
            TokenKind::StrLit(text) | TokenKind::RawStrLit(text) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Literal(Literal::Str(text)), start))
            }
            TokenKind::CStrLit(text) | TokenKind::RawCStrLit(text) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Literal(Literal::CStr(text)), start))
            }
            TokenKind::Ident(_) | TokenKind::SelfValue | TokenKind::SelfType => {
                self.parse_path_expr(allow_struct)
            }
            TokenKind::LParen => {
                self.advance();
                if self.consume(&TokenKind::RParen) {
                    return Ok(self.make_expr(ExprKind::Unit, self.span_from(start)));
                }
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let span = self.span_from(start);
                Ok(self.make_expr(ExprKind::Group(Box::new(inner)), span))
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(self.make_expr(ExprKind::Block(block), span))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Loop => {
                self.advance();
                let body = self.parse_block()?;
                let span = self.span_from(start);
                Ok(self.make_expr(ExprKind::Loop(body), span))
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr_no_struct()?;
                let body = self.parse_block()?;
                let span = self.span_from(start);
                let kind = ExprKind::While {
                    cond: Box::new(cond),
                    body,
                };
                Ok(self.make_expr(kind, span))
            }
            TokenKind::Break => {
                self.advance();
                let value = self.parse_optional_operand(allow_struct)?;
                let span = self.span_from(start);
                Ok(self.make_expr(ExprKind::Break(value), span))
            }
            TokenKind::Return => {
                self.advance();
                let value = self.parse_optional_operand(allow_struct)?;
                let span = self.span_from(start);
                Ok(self.make_expr(ExprKind::Return(value), span))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(self.make_expr(ExprKind::Continue, start))
            }
            TokenKind::Underscore => {
                self.advance();
                Ok(self.make_expr(ExprKind::Underscore, start))
            }
            ref kind if kind.is_reserved() => Err(self.unexpected("expression")),
            _ => Err(Error::ExpectedExpr {
                got: token.describe(),
                span: start,
            }),
        }
    }

    /// Operand of `break`/`return`, absent when the expression ends here
    fn parse_optional_operand(&mut self, allow_struct: bool) -> Result<Option<Box<Expr>>> {
        let ends = matches!(
            self.current_kind(),
            TokenKind::Semicolon
                | TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::Comma
                | TokenKind::Eof
        );
        if ends {
            Ok(None)
        } else {
            Ok(Some(Box::new(self.parse_expr_bp(0, allow_struct)?)))
        }
    }

    fn parse_path_expr(&mut self, allow_struct: bool) -> Result<Expr> {
        let start = self.current().span;
        let Some(first) = self.parse_path_segment() else {
            return Err(self.unexpected("path"));
        };

        let second = if self.consume(&TokenKind::ColonColon) {
            match self.parse_path_segment() {
                Some(segment) => Some(segment),
                None => return Err(self.unexpected("path segment")),
            }
        } else {
            None
        };

        if second.is_none() && allow_struct && self.at_struct_literal() {
            return self.parse_struct_lit(first, start);
        }

        let span = self.span_from(start);
        Ok(self.make_expr(ExprKind::Path(PathExpr { first, second }), span))
    }

    /// `{` followed by `}` or `name:`
    fn at_struct_literal(&self) -> bool {
        self.check(&TokenKind::LBrace)
            && (matches!(self.peek_kind(1), TokenKind::RBrace)
                || (matches!(self.peek_kind(1), TokenKind::Ident(_))
                    && matches!(self.peek_kind(2), TokenKind::Colon)))
    }

    fn parse_struct_lit(&mut self, path: PathSegment, start: Span) -> Result<Expr> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field_start = self.current().span;
            let id = self.fresh_id();
            let name = self.parse_ident()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            fields.push(FieldInit {
                id,
                name,
                value,
                span: self.span_from(field_start),
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        let span = self.span_from(start);
        Ok(self.make_expr(ExprKind::StructLit { path, fields }, span))
    }

    /// `[]`, `[a, b, c]` or `[value; count]`
    fn parse_array(&mut self) -> Result<Expr> {
        let start = self.current().span;
        self.expect(TokenKind::LBracket)?;

        if self.consume(&TokenKind::RBracket) {
            let span = self.span_from(start);
            return Ok(self.make_expr(ExprKind::Array(Vec::new()), span));
        }

        let first = self.parse_expr()?;
        if self.consume(&TokenKind::Semicolon) {
            let count = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            let span = self.span_from(start);
            let kind = ExprKind::ArrayRepeat {
                value: Box::new(first),
                count: Box::new(count),
            };
            return Ok(self.make_expr(kind, span));
        }

        let mut elements = vec![first];
        while self.consume(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            elements.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBracket)?;

        let span = self.span_from(start);
        Ok(self.make_expr(ExprKind::Array(elements), span))
    }

    /// `if cond { .. } (else (if .. | { .. }))?`
    fn parse_if(&mut self) -> Result<Expr> {
        let start = self.current().span;
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr_no_struct()?;
        let then_block = self.parse_block()?;

        let else_branch = if self.consume(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                let block = self.parse_block()?;
                let span = block.span;
                Some(Box::new(self.make_expr(ExprKind::Block(block), span)))
            }
        } else {
            None
        };

        let span = self.span_from(start);
        let kind = ExprKind::If {
            cond: Box::new(cond),
            then_block,
            else_branch,
        };
        Ok(self.make_expr(kind, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Result<Program> {
        Parser::parse_source(source, 0)
    }

    fn parse_fn_body(source: &str) -> Block {
        let program = parse(&format!("fn main() {{ {} }}", source)).unwrap();
        match program.items.into_iter().next() {
            Some(Item::Function(f)) => f.body.unwrap(),
            other => panic!("expected function, got {:?}", other),
        }
    }

    fn tail_expr(source: &str) -> Expr {
        *parse_fn_body(source).tail.unwrap()
    }

    #[test]
    fn test_parse_function() {
        let program = parse("fn add(a: i32, b: i32) -> i32 { a + b }").unwrap();
        assert_eq!(program.items.len(), 1);
        let Item::Function(f) = &program.items[0] else {
            panic!("expected function");
        };
        assert_eq!(f.name.name, "add");
        assert_eq!(f.params.len(), 2);
        assert!(f.ret_type.is_some());
        let body = f.body.as_ref().unwrap();
        assert!(body.stmts.is_empty());
        assert!(matches!(
            body.tail.as_deref(),
            Some(Expr { kind: ExprKind::Binary { op: BinOp::Add, .. }, .. })
        ));
    }

    #[test]
    fn test_precedence() {
        let expr = tail_expr("1 + 2 * 3");
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = tail_expr("a - b - c");
        let ExprKind::Binary { left, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(left.kind, ExprKind::Binary { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let body = parse_fn_body("a = b = 1;");
        let Stmt::Expr(stmt) = &body.stmts[0] else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { value, .. } = &stmt.expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn test_cast_binds_looser_than_negation() {
        let expr = tail_expr("-x as u32");
        let ExprKind::Cast { expr, .. } = expr.kind else {
            panic!("expected cast");
        };
        assert!(matches!(expr.kind, ExprKind::Unary { op: UnOp::Neg, .. }));
    }

    #[test]
    fn test_method_call_and_field() {
        let expr = tail_expr("p.x.len()");
        let ExprKind::MethodCall { receiver, method, args } = expr.kind else {
            panic!("expected method call");
        };
        assert_eq!(method.name, "len");
        assert!(args.is_empty());
        assert!(matches!(receiver.kind, ExprKind::Field { .. }));
    }

    #[test]
    fn test_struct_literal() {
        let expr = tail_expr("Point { x: 1, y: 2 }");
        let ExprKind::StructLit { path, fields } = expr.kind else {
            panic!("expected struct literal");
        };
        assert_eq!(path.text(), "Point");
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_no_struct_literal_in_condition() {
        let body = parse_fn_body("if x == y { 1 } else { 2 }");
        let Some(tail) = body.tail else {
            panic!("expected tail");
        };
        let ExprKind::If { cond, else_branch, .. } = tail.kind else {
            panic!("expected if");
        };
        assert!(matches!(cond.kind, ExprKind::Binary { op: BinOp::Eq, .. }));
        assert!(else_branch.is_some());
    }

    #[test]
    fn test_else_if_chain() {
        let expr = tail_expr("if a { 1 } else if b { 2 } else { 3 }");
        let ExprKind::If { else_branch, .. } = expr.kind else {
            panic!("expected if");
        };
        assert!(matches!(else_branch.map(|e| e.kind), Some(ExprKind::If { .. })));
    }

    #[test]
    fn test_array_forms() {
        assert!(matches!(tail_expr("[1, 2, 3,]").kind, ExprKind::Array(ref v) if v.len() == 3));
        assert!(matches!(tail_expr("[0; 4]").kind, ExprKind::ArrayRepeat { .. }));
        assert!(matches!(tail_expr("[]").kind, ExprKind::Array(ref v) if v.is_empty()));
    }

    #[test]
    fn test_path_with_two_segments() {
        let expr = tail_expr("Color::Red");
        let ExprKind::Path(path) = expr.kind else {
            panic!("expected path");
        };
        assert_eq!(path.first.text(), "Color");
        assert_eq!(path.second.map(|s| s.text().to_string()), Some("Red".to_string()));
    }

    #[test]
    fn test_block_like_statement_without_semicolon() {
        let body = parse_fn_body("if a { f(); } let x = 1; x");
        assert_eq!(body.stmts.len(), 2);
        assert!(matches!(&body.stmts[0], Stmt::Expr(ExprStmt { has_semi: false, .. })));
        assert!(body.tail.is_some());
    }

    #[test]
    fn test_missing_semicolon() {
        let result = parse("fn main() { let x = 1; x x }");
        assert!(matches!(result, Err(Error::UnexpectedToken { .. })));
    }

    #[test]
    fn test_break_and_return_operands() {
        let body = parse_fn_body("loop { break; } loop { break 5; } return;");
        assert_eq!(body.stmts.len(), 3);
        let Stmt::Expr(ExprStmt { expr, .. }) = &body.stmts[2] else {
            panic!("expected return statement");
        };
        assert!(matches!(expr.kind, ExprKind::Return(None)));
    }

    #[test]
    fn test_self_params() {
        let program = parse(
            "impl P { fn a(&self) {} fn b(&mut self, x: i32) {} fn c(mut self) {} fn d(x: i32) {} fn e(self: Self) {} }",
        )
        .unwrap();
        let Item::Impl(imp) = &program.items[0] else {
            panic!("expected impl");
        };
        let params: Vec<Option<(bool, bool)>> = imp
            .items
            .iter()
            .map(|item| match item {
                AssocItem::Function(f) => f.self_param.as_ref().map(|s| (s.is_ref, s.mutable)),
                AssocItem::Const(_) => None,
            })
            .collect();
        assert_eq!(
            params,
            vec![
                Some((true, false)),
                Some((true, true)),
                Some((false, true)),
                None,
                Some((false, false)),
            ]
        );
    }

    #[test]
    fn test_trait_impl() {
        let program = parse(
            "trait Shape { fn area(&self) -> i32; const SIDES: i32; } impl Shape for Square { fn area(&self) -> i32 { 1 } const SIDES: i32 = 4; }",
        )
        .unwrap();
        assert_eq!(program.items.len(), 2);
        let Item::Trait(tr) = &program.items[0] else {
            panic!("expected trait");
        };
        assert!(matches!(&tr.items[0], AssocItem::Function(f) if f.body.is_none()));
        let Item::Impl(imp) = &program.items[1] else {
            panic!("expected impl");
        };
        assert_eq!(imp.trait_name.as_ref().map(|t| t.name.as_str()), Some("Shape"));
    }

    #[test]
    fn test_items_and_const_fn() {
        let program = parse(
            "struct Unit; struct P { x: i32, y: i32, } enum E { A, B, } const N: usize = 3; const fn f() -> usize { N }",
        )
        .unwrap();
        assert_eq!(program.items.len(), 5);
        assert!(matches!(&program.items[0], Item::Struct(s) if s.is_unit));
        assert!(matches!(&program.items[1], Item::Struct(s) if s.fields.len() == 2));
        assert!(matches!(&program.items[2], Item::Enum(e) if e.variants.len() == 2));
        assert!(matches!(&program.items[4], Item::Function(f) if f.is_const));
    }

    #[test]
    fn test_patterns() {
        let body = parse_fn_body("let &mut ref mut x = y; let _ = 1; let &&z = w;");
        let Stmt::Let(first) = &body.stmts[0] else {
            panic!("expected let");
        };
        let Pattern::Ref { mutable: true, inner, .. } = &first.pattern else {
            panic!("expected reference pattern");
        };
        assert!(matches!(
            inner.as_ref(),
            Pattern::Ident { by_ref: true, mutable: true, .. }
        ));
        let Stmt::Let(third) = &body.stmts[2] else {
            panic!("expected let");
        };
        assert!(matches!(
            &third.pattern,
            Pattern::Ref { inner, .. } if matches!(inner.as_ref(), Pattern::Ref { .. })
        ));
    }

    #[test]
    fn test_types() {
        let body = parse_fn_body("let a: &mut [i32; 3] = b; let c: () = d;");
        let Stmt::Let(first) = &body.stmts[0] else {
            panic!("expected let");
        };
        let Some(TypeExpr { kind: TypeExprKind::Ref { mutable: true, inner }, .. }) = &first.ty else {
            panic!("expected reference type");
        };
        assert!(matches!(inner.kind, TypeExprKind::Array { .. }));
    }

    #[test]
    fn test_integer_suffix_validation() {
        assert!(parse("fn main() { 1u32 }").is_ok());
        assert!(matches!(
            parse("fn main() { 1u8 }"),
            Err(Error::InvalidIntSuffix { .. })
        ));
        assert!(matches!(
            parse("fn main() { 4294967296 }"),
            Err(Error::IntegerTooLarge { .. })
        ));
    }

    #[test]
    fn test_reserved_keyword() {
        assert!(matches!(
            parse("fn main() { match x {} }"),
            Err(Error::UnsupportedKeyword { .. })
        ));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let program = parse("fn f(a: i32) -> i32 { let b = a + 1; b }").unwrap();
        let Item::Function(f) = &program.items[0] else {
            panic!("expected function");
        };
        let body = f.body.as_ref().unwrap();
        assert_ne!(f.id, body.id);
        assert!(program.node_count > 6);
    }
}
