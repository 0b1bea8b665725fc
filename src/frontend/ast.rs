//! Abstract Syntax Tree definitions for rxc
//!
//! The tree owns its children exclusively. Every node that later passes need
//! to annotate carries a [`NodeId`]; parent links, resolved symbols and types
//! live in side tables keyed by that id.

use std::fmt;

use serde::Serialize;

use crate::types::PrimitiveType;
use crate::utils::Span;

/// Unique identifier for an AST node within one compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A complete program (compilation unit)
#[derive(Debug, Clone)]
pub struct Program {
    pub items: Vec<Item>,
    /// Number of node ids handed out by the parser
    pub node_count: usize,
}

/// Items (allowed at top level and inside blocks)
#[derive(Debug, Clone)]
pub enum Item {
    Function(Function),
    Struct(StructDef),
    Enum(EnumDef),
    Const(ConstDef),
    Trait(TraitDef),
    Impl(ImplBlock),
}

impl Item {
    pub fn id(&self) -> NodeId {
        match self {
            Item::Function(f) => f.id,
            Item::Struct(s) => s.id,
            Item::Enum(e) => e.id,
            Item::Const(c) => c.id,
            Item::Trait(t) => t.id,
            Item::Impl(i) => i.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Item::Function(f) => f.span,
            Item::Struct(s) => s.span,
            Item::Enum(e) => e.span,
            Item::Const(c) => c.span,
            Item::Trait(t) => t.span,
            Item::Impl(i) => i.span,
        }
    }
}

/// Function definition (free function, method or associated function)
#[derive(Debug, Clone)]
pub struct Function {
    pub id: NodeId,
    pub name: Ident,
    pub is_const: bool,
    pub self_param: Option<SelfParam>,
    pub params: Vec<Param>,
    pub ret_type: Option<TypeExpr>,
    /// `None` for a signature ending in `;`
    pub body: Option<Block>,
    pub span: Span,
}

/// `self`, `&self`, `&mut self`, `mut self` or `self: T`
#[derive(Debug, Clone)]
pub struct SelfParam {
    pub id: NodeId,
    pub is_ref: bool,
    pub mutable: bool,
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub id: NodeId,
    pub pattern: Pattern,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Struct definition
#[derive(Debug, Clone)]
pub struct StructDef {
    pub id: NodeId,
    pub name: Ident,
    pub fields: Vec<Field>,
    /// `struct N;`
    pub is_unit: bool,
    pub span: Span,
}

/// Struct field
#[derive(Debug, Clone)]
pub struct Field {
    pub id: NodeId,
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Enum definition (unit variants only)
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub id: NodeId,
    pub name: Ident,
    pub variants: Vec<Variant>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub id: NodeId,
    pub name: Ident,
}

/// Constant item
#[derive(Debug, Clone)]
pub struct ConstDef {
    pub id: NodeId,
    pub name: Ident,
    pub ty: TypeExpr,
    pub value: Option<Expr>,
    pub span: Span,
}

/// Trait definition
#[derive(Debug, Clone)]
pub struct TraitDef {
    pub id: NodeId,
    pub name: Ident,
    pub items: Vec<AssocItem>,
    pub span: Span,
}

/// `impl Type { .. }` or `impl Trait for Type { .. }`
#[derive(Debug, Clone)]
pub struct ImplBlock {
    pub id: NodeId,
    pub trait_name: Option<Ident>,
    pub self_ty: TypeExpr,
    pub items: Vec<AssocItem>,
    pub span: Span,
}

/// Item inside a trait or impl body
#[derive(Debug, Clone)]
pub enum AssocItem {
    Function(Function),
    Const(ConstDef),
}

impl AssocItem {
    pub fn name(&self) -> &Ident {
        match self {
            AssocItem::Function(f) => &f.name,
            AssocItem::Const(c) => &c.name,
        }
    }
}

/// Block of statements with an optional trailing expression
#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    /// Final expression without a trailing `;`
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone)]
pub enum Stmt {
    Let(LetStmt),
    Item(Item),
    Expr(ExprStmt),
    /// Empty statement (;)
    Empty { span: Span },
}

#[derive(Debug, Clone)]
pub struct LetStmt {
    pub id: NodeId,
    pub pattern: Pattern,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub id: NodeId,
    pub expr: Expr,
    pub has_semi: bool,
}

/// Expression
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    /// `()`
    Unit,
    /// `a` or `A::b`
    Path(PathExpr),
    /// `( e )`
    Group(Box<Expr>),
    /// `-e` or `!e`
    Unary { op: UnOp, expr: Box<Expr> },
    /// `&e` or `&mut e`
    Borrow { mutable: bool, expr: Box<Expr> },
    /// `*e`
    Deref(Box<Expr>),
    /// Arithmetic, bitwise, comparison and lazy boolean operators
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `a op= b`
    CompoundAssign {
        op: BinOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Cast { expr: Box<Expr>, ty: TypeExpr },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    MethodCall {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    Field { receiver: Box<Expr>, field: Ident },
    Index { base: Box<Expr>, index: Box<Expr> },
    StructLit {
        path: PathSegment,
        fields: Vec<FieldInit>,
    },
    /// `[a, b, c]`
    Array(Vec<Expr>),
    /// `[value; count]`
    ArrayRepeat { value: Box<Expr>, count: Box<Expr> },
    Block(Block),
    If {
        cond: Box<Expr>,
        then_block: Block,
        /// Either a block expression or another `if`
        else_branch: Option<Box<Expr>>,
    },
    Loop(Block),
    While { cond: Box<Expr>, body: Block },
    Break(Option<Box<Expr>>),
    Continue,
    Return(Option<Box<Expr>>),
    /// `_` (only valid as an assignment target)
    Underscore,
}

impl Expr {
    /// Block-like expressions end a statement without needing `;`
    pub fn is_block_like(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Block(_) | ExprKind::If { .. } | ExprKind::Loop(_) | ExprKind::While { .. }
        )
    }
}

/// Path with one or two segments
#[derive(Debug, Clone)]
pub struct PathExpr {
    pub first: PathSegment,
    pub second: Option<PathSegment>,
}

#[derive(Debug, Clone)]
pub struct PathSegment {
    pub id: NodeId,
    pub kind: SegmentKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    Ident(String),
    /// `self`
    SelfValue,
    /// `Self`
    SelfType,
}

impl PathSegment {
    pub fn text(&self) -> &str {
        match &self.kind {
            SegmentKind::Ident(name) => name,
            SegmentKind::SelfValue => "self",
            SegmentKind::SelfType => "Self",
        }
    }
}

/// `name: value` inside a struct literal
#[derive(Debug, Clone)]
pub struct FieldInit {
    pub id: NodeId,
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

/// Pattern (let bindings and parameters)
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `ref? mut? name`
    Ident {
        id: NodeId,
        name: Ident,
        by_ref: bool,
        mutable: bool,
    },
    /// `_`
    Wildcard { id: NodeId, span: Span },
    /// `&p` or `&mut p`
    Ref {
        id: NodeId,
        mutable: bool,
        inner: Box<Pattern>,
        span: Span,
    },
}

impl Pattern {
    pub fn id(&self) -> NodeId {
        match self {
            Pattern::Ident { id, .. } | Pattern::Wildcard { id, .. } | Pattern::Ref { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Pattern::Ident { name, .. } => name.span,
            Pattern::Wildcard { span, .. } | Pattern::Ref { span, .. } => *span,
        }
    }
}

/// Type as written in the source
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub id: NodeId,
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// `i32`, `Point`, `Self`
    Path(PathSegment),
    /// `&T` or `&mut T`
    Ref { mutable: bool, inner: Box<TypeExpr> },
    /// `[T; N]`
    Array { elem: Box<TypeExpr>, size: Box<Expr> },
    /// `()`
    Unit,
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int { value: u64, suffix: Option<IntSuffix> },
    Bool(bool),
    Char(char),
    Str(String),
    CStr(String),
}

/// Integer type suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSuffix {
    I32,
    U32,
    Usize,
    Isize,
}

impl IntSuffix {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "i32" => Some(Self::I32),
            "u32" => Some(Self::U32),
            "usize" => Some(Self::Usize),
            "isize" => Some(Self::Isize),
            _ => None,
        }
    }

    pub fn primitive(self) -> PrimitiveType {
        match self {
            Self::I32 => PrimitiveType::I32,
            Self::U32 => PrimitiveType::U32,
            Self::Usize => PrimitiveType::Usize,
            Self::Isize => PrimitiveType::Isize,
        }
    }
}

/// Identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Lazy boolean
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_lazy(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Logical or bitwise not (!)
    Not,
}
