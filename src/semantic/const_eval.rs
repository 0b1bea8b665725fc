//! Constant evaluation
//!
//! Folds the constant subset of the expression language (literals, named
//! constants, grouping, arithmetic, comparison, short-circuit logic, casts,
//! array literals and repeats) into a [`ConstValue`]. Arithmetic is carried
//! out in `i128` and range checked against the concrete integer type of the
//! result. Results are memoized per expression node through the environment.

use std::fmt;

use crate::frontend::ast::*;
use crate::types::{common_type, PrimitiveType, Type};
use crate::utils::{Error, Result, Span};

/// Folded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i128),
    Bool(bool),
    Char(char),
    Str(String),
    Array(Vec<ConstValue>),
    /// `[value; count]` kept unexpanded
    Repeat { value: Box<ConstValue>, count: u64 },
    /// Depends on a constant whose evaluation already failed
    Unknown,
}

/// A folded value together with its type
#[derive(Debug, Clone, PartialEq)]
pub struct ConstValue {
    pub value: Value,
    pub ty: Type,
}

impl ConstValue {
    pub fn new(value: Value, ty: Type) -> Self {
        Self { value, ty }
    }

    pub fn int(value: i128, ty: Type) -> Self {
        Self::new(Value::Int(value), ty)
    }

    pub fn unknown() -> Self {
        Self::new(Value::Unknown, Type::Error)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.value, Value::Unknown)
    }

    pub fn as_int(&self) -> Option<i128> {
        match self.value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element.value)?;
                }
                write!(f, "]")
            }
            Value::Repeat { value, count } => write!(f, "[{}; {}]", value.value, count),
            Value::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// What the evaluator needs from the analysis it runs inside
pub trait ConstEnv {
    /// Value of the constant a path names. `Ok(None)` when the path names
    /// something that is not a constant.
    fn named_constant(&mut self, path: &PathExpr, span: Span) -> Result<Option<ConstValue>>;

    /// Semantic type of a cast target
    fn cast_target(&mut self, ty: &TypeExpr) -> Result<Type>;

    fn cached(&self, node: NodeId) -> Option<ConstValue>;

    fn cache(&mut self, node: NodeId, value: ConstValue);
}

pub struct ConstEvaluator<'e, E: ConstEnv> {
    env: &'e mut E,
}

impl<'e, E: ConstEnv> ConstEvaluator<'e, E> {
    pub fn new(env: &'e mut E) -> Self {
        Self { env }
    }

    /// Evaluate an array length. `Ok(None)` when the length depends on an
    /// already reported failure.
    pub fn array_size(&mut self, expr: &Expr) -> Result<Option<u64>> {
        let value = self.evaluate(expr)?;
        if value.is_unknown() {
            return Ok(None);
        }
        let accepted = matches!(
            value.ty,
            Type::Primitive(PrimitiveType::Usize | PrimitiveType::Int)
        );
        let size = match value.as_int() {
            Some(size) if accepted => size,
            _ => {
                return Err(Error::InvalidArraySize {
                    ty: value.ty.describe(),
                    span: expr.span,
                })
            }
        };
        if size < 0 {
            return Err(Error::NegativeArraySize {
                size,
                span: expr.span,
            });
        }
        u64::try_from(size).map(Some).map_err(|_| Error::ConstOverflow {
            value: size,
            ty: Type::USIZE.to_string(),
            span: expr.span,
        })
    }

    /// Evaluate and convert to the declared type of a constant
    pub fn evaluate_as(&mut self, expr: &Expr, expected: &Type) -> Result<ConstValue> {
        let value = self.evaluate(expr)?;
        retype(value, expected, expr.span)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<ConstValue> {
        if let Some(value) = self.env.cached(expr.id) {
            return Ok(value);
        }
        let value = self.evaluate_uncached(expr)?;
        self.env.cache(expr.id, value.clone());
        Ok(value)
    }

    fn evaluate_uncached(&mut self, expr: &Expr) -> Result<ConstValue> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => literal(lit, span),
            ExprKind::Group(inner) => self.evaluate(inner),
            ExprKind::Path(path) => match self.env.named_constant(path, span)? {
                Some(value) => Ok(value),
                None => Err(non_constant(format!("value '{}'", path_text(path)), span)),
            },
            ExprKind::Unary { op, expr: operand } => {
                let operand = self.evaluate(operand)?;
                unary(*op, operand, span)
            }
            ExprKind::Binary { op, left, right } if op.is_lazy() => {
                let lhs = self.evaluate(left)?;
                match (op, &lhs.value) {
                    (BinOp::And, Value::Bool(false)) => Ok(lhs),
                    (BinOp::Or, Value::Bool(true)) => Ok(lhs),
                    (_, Value::Bool(_)) => self.evaluate(right),
                    (_, Value::Unknown) => Ok(ConstValue::unknown()),
                    _ => Err(non_constant("logical operand".to_string(), left.span)),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.evaluate(left)?;
                let rhs = self.evaluate(right)?;
                binary(*op, lhs, rhs, span)
            }
            ExprKind::Cast { expr: inner, ty } => {
                let value = self.evaluate(inner)?;
                let target = self.env.cast_target(ty)?;
                cast(value, target, span)
            }
            ExprKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                let mut elem_ty = Type::Never;
                for element in elements {
                    let value = self.evaluate(element)?;
                    elem_ty = common_type(&elem_ty, &value.ty).unwrap_or(Type::Error);
                    values.push(value);
                }
                if elem_ty.is_error() {
                    return Ok(ConstValue::unknown());
                }
                let size = values.len() as u64;
                Ok(ConstValue::new(Value::Array(values), Type::array(elem_ty, size)))
            }
            ExprKind::ArrayRepeat { value, count } => {
                let element = self.evaluate(value)?;
                match self.array_size(count)? {
                    Some(size) if !element.is_unknown() => {
                        let ty = Type::array(element.ty.clone(), size);
                        Ok(ConstValue::new(
                            Value::Repeat {
                                value: Box::new(element),
                                count: size,
                            },
                            ty,
                        ))
                    }
                    _ => Ok(ConstValue::unknown()),
                }
            }
            // A block made only of items with a tail expression folds to its tail
            ExprKind::Block(block) => {
                let pure = block
                    .stmts
                    .iter()
                    .all(|stmt| matches!(stmt, Stmt::Item(_) | Stmt::Empty { .. }));
                match &block.tail {
                    Some(tail) if pure => self.evaluate(tail),
                    _ => Err(non_constant("block".to_string(), span)),
                }
            }
            other => Err(non_constant(describe(other).to_string(), span)),
        }
    }
}

// ==================== Folding ====================

fn literal(lit: &Literal, span: Span) -> Result<ConstValue> {
    match lit {
        Literal::Int { value, suffix } => {
            let ty = match suffix {
                Some(suffix) => Type::Primitive(suffix.primitive()),
                None => Type::INT,
            };
            let value = i128::from(*value);
            check_range(value, &ty, span)?;
            Ok(ConstValue::int(value, ty))
        }
        Literal::Bool(b) => Ok(ConstValue::new(Value::Bool(*b), Type::BOOL)),
        Literal::Char(c) => Ok(ConstValue::new(Value::Char(*c), Type::CHAR)),
        Literal::Str(s) | Literal::CStr(s) => Ok(ConstValue::new(
            Value::Str(s.clone()),
            Type::reference(Type::STR, false),
        )),
    }
}

fn unary(op: UnOp, operand: ConstValue, span: Span) -> Result<ConstValue> {
    let ty = operand.ty.clone();
    match (op, operand.value) {
        (_, Value::Unknown) => Ok(ConstValue::unknown()),
        (UnOp::Neg, Value::Int(v)) => {
            let result = v.checked_neg().ok_or_else(|| overflow(v, &ty, span))?;
            check_range(result, &ty, span)?;
            Ok(ConstValue::int(result, ty))
        }
        (UnOp::Not, Value::Bool(b)) => Ok(ConstValue::new(Value::Bool(!b), ty)),
        (UnOp::Not, Value::Int(v)) => {
            let result = match &ty {
                Type::Primitive(p) if !p.is_signed() => {
                    p.range().map_or(!v, |(_, max)| max - v)
                }
                _ => !v,
            };
            Ok(ConstValue::int(result, ty))
        }
        _ => Err(non_constant("operand".to_string(), span)),
    }
}

fn binary(op: BinOp, lhs: ConstValue, rhs: ConstValue, span: Span) -> Result<ConstValue> {
    if lhs.is_unknown() || rhs.is_unknown() {
        return Ok(ConstValue::unknown());
    }

    if op.is_comparison() {
        let ordering = match (&lhs.value, &rhs.value) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => return Err(non_constant("comparison".to_string(), span)),
        };
        let result = match op {
            BinOp::Eq => ordering.is_eq(),
            BinOp::Ne => ordering.is_ne(),
            BinOp::Lt => ordering.is_lt(),
            BinOp::Le => ordering.is_le(),
            BinOp::Gt => ordering.is_gt(),
            _ => ordering.is_ge(),
        };
        return Ok(ConstValue::new(Value::Bool(result), Type::BOOL));
    }

    if let (Value::Bool(a), Value::Bool(b)) = (&lhs.value, &rhs.value) {
        let result = match op {
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::BitXor => a ^ b,
            _ => return Err(non_constant("boolean arithmetic".to_string(), span)),
        };
        return Ok(ConstValue::new(Value::Bool(result), Type::BOOL));
    }

    let (Value::Int(a), Value::Int(b)) = (&lhs.value, &rhs.value) else {
        return Err(non_constant("arithmetic operand".to_string(), span));
    };
    let (a, b) = (*a, *b);

    if op.is_shift() {
        let ty = lhs.ty;
        let bits = bit_width(&ty);
        let amount = u32::try_from(b)
            .ok()
            .filter(|amount| *amount < bits)
            .ok_or(Error::ShiftOverflow {
                amount: b,
                bits,
                span,
            })?;
        let result = match op {
            BinOp::Shl => wrap(a << amount, &ty),
            _ => a >> amount,
        };
        return Ok(ConstValue::int(result, ty));
    }

    let ty = common_type(&lhs.ty, &rhs.ty).unwrap_or(Type::Error);
    if ty.is_error() {
        return Ok(ConstValue::unknown());
    }
    let result = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(|| overflow(a.saturating_add(b), &ty, span))?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(|| overflow(a.saturating_sub(b), &ty, span))?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(|| overflow(a.saturating_mul(b), &ty, span))?,
        BinOp::Div | BinOp::Rem if b == 0 => {
            return Err(Error::ZeroDivisor {
                op: if op == BinOp::Div { "division" } else { "remainder" },
                span,
            })
        }
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        _ => return Err(non_constant(format!("operator `{}`", op.symbol()), span)),
    };
    check_range(result, &ty, span)?;
    Ok(ConstValue::int(result, ty))
}

fn cast(value: ConstValue, target: Type, span: Span) -> Result<ConstValue> {
    if value.is_unknown() || target.is_error() {
        return Ok(ConstValue::unknown());
    }
    match (&value.value, &target) {
        (Value::Int(v), Type::Primitive(p)) if p.is_integer() => {
            Ok(ConstValue::int(wrap(*v, &target), Type::Primitive(*p)))
        }
        _ if value.ty == target => Ok(value),
        _ => Err(non_constant("cast".to_string(), span)),
    }
}

/// Give undetermined integers (and arrays of them) the expected type
fn retype(value: ConstValue, expected: &Type, span: Span) -> Result<ConstValue> {
    match (value.value, expected) {
        (Value::Int(v), Type::Primitive(p)) if p.is_integer() && value.ty.is_integer() => {
            check_range(v, expected, span)?;
            Ok(ConstValue::int(v, expected.clone()))
        }
        (Value::Array(elements), Type::Array { elem, .. }) => {
            let elements = elements
                .into_iter()
                .map(|element| retype(element, elem, span))
                .collect::<Result<Vec<_>>>()?;
            Ok(ConstValue::new(Value::Array(elements), expected.clone()))
        }
        (Value::Repeat { value: element, count }, Type::Array { elem, .. }) => {
            let element = retype(*element, elem, span)?;
            Ok(ConstValue::new(
                Value::Repeat {
                    value: Box::new(element),
                    count,
                },
                expected.clone(),
            ))
        }
        (other, _) => Ok(ConstValue::new(other, value.ty)),
    }
}

fn check_range(value: i128, ty: &Type, span: Span) -> Result<()> {
    match ty {
        Type::Primitive(p) => match p.range() {
            Some((lo, hi)) if value < lo || value > hi => Err(overflow(value, ty, span)),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

/// Two's complement truncation to the width of `ty`
fn wrap(value: i128, ty: &Type) -> i128 {
    match ty {
        Type::Primitive(PrimitiveType::I32) => i128::from(value as i32),
        Type::Primitive(PrimitiveType::U32) => i128::from(value as u32),
        Type::Primitive(PrimitiveType::Isize) => i128::from(value as i64),
        Type::Primitive(PrimitiveType::Usize) => i128::from(value as u64),
        _ => value,
    }
}

/// Undetermined integers may still become 64-bit, so they shift like one.
/// Their range is checked once they take a concrete type.
fn bit_width(ty: &Type) -> u32 {
    match ty {
        Type::Primitive(PrimitiveType::I32 | PrimitiveType::U32) => 32,
        _ => 64,
    }
}

fn overflow(value: i128, ty: &Type, span: Span) -> Error {
    Error::ConstOverflow {
        value,
        ty: ty.to_string(),
        span,
    }
}

fn non_constant(what: String, span: Span) -> Error {
    Error::NonConstant { what, span }
}

fn path_text(path: &PathExpr) -> String {
    match &path.second {
        Some(second) => format!("{}::{}", path.first.text(), second.text()),
        None => path.first.text().to_string(),
    }
}

fn describe(kind: &ExprKind) -> &'static str {
    match kind {
        ExprKind::Call { .. } => "function call",
        ExprKind::MethodCall { .. } => "method call",
        ExprKind::Field { .. } => "field access",
        ExprKind::Index { .. } => "index expression",
        ExprKind::Borrow { .. } => "borrow",
        ExprKind::Deref(_) => "dereference",
        ExprKind::Assign { .. } | ExprKind::CompoundAssign { .. } => "assignment",
        ExprKind::StructLit { .. } => "struct literal",
        ExprKind::If { .. } => "if expression",
        ExprKind::Loop(_) | ExprKind::While { .. } => "loop",
        ExprKind::Break(_) | ExprKind::Continue | ExprKind::Return(_) => "control flow",
        _ => "expression",
    }
}
