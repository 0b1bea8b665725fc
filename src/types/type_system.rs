//! Type System for rxc

use std::fmt;

use crate::semantic::symbol::SymbolId;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    I32,
    U32,
    Usize,
    Isize,
    /// Integer literal whose concrete type is not yet known
    Int,
    Bool,
    Char,
    Str,
    String,
}

impl PrimitiveType {
    /// Check if this is an integer type (including an undetermined one)
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I32 | Self::U32 | Self::Usize | Self::Isize | Self::Int
        )
    }

    /// Check if this is a signed integer type
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::I32 | Self::Isize | Self::Int)
    }

    /// Inclusive value range of a concrete integer type
    pub fn range(&self) -> Option<(i128, i128)> {
        match self {
            Self::I32 => Some((i32::MIN.into(), i32::MAX.into())),
            Self::U32 => Some((0, u32::MAX.into())),
            Self::Isize => Some((i64::MIN.into(), i64::MAX.into())),
            Self::Usize => Some((0, u64::MAX.into())),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::Usize => "usize",
            Self::Isize => "isize",
            Self::Int => "{integer}",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Str => "str",
            Self::String => "String",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let prim = match name {
            "i32" => Self::I32,
            "u32" => Self::U32,
            "usize" => Self::Usize,
            "isize" => Self::Isize,
            "bool" => Self::Bool,
            "char" => Self::Char,
            "str" => Self::Str,
            "String" => Self::String,
            _ => return None,
        };
        Some(prim)
    }
}

/// How a method receives `self`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Receiver {
    pub by_ref: bool,
    pub mutable: bool,
}

/// Signature of a function or method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
    /// Present for methods
    pub receiver: Option<Receiver>,
}

/// Semantic type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    Reference { inner: Box<Type>, mutable: bool },
    Array { elem: Box<Type>, size: u64 },
    Struct { name: String, symbol: SymbolId },
    Enum { name: String, symbol: SymbolId },
    Trait { name: String, symbol: SymbolId },
    Function(FnType),
    /// Type of a struct name in value position; wraps the struct type
    StructConstructor(Box<Type>),
    /// Type of an enum variant constructor; wraps the enum type
    EnumConstructor(Box<Type>),
    Unit,
    /// Expressions that never complete normally
    Never,
    /// Block tail type, resolvable to the wrapped type or to unit
    Ambiguous(Box<Type>),
    /// Already reported failure; compatible with everything
    Error,
}

impl Type {
    pub const I32: Type = Type::Primitive(PrimitiveType::I32);
    pub const U32: Type = Type::Primitive(PrimitiveType::U32);
    pub const USIZE: Type = Type::Primitive(PrimitiveType::Usize);
    pub const ISIZE: Type = Type::Primitive(PrimitiveType::Isize);
    pub const INT: Type = Type::Primitive(PrimitiveType::Int);
    pub const BOOL: Type = Type::Primitive(PrimitiveType::Bool);
    pub const CHAR: Type = Type::Primitive(PrimitiveType::Char);
    pub const STR: Type = Type::Primitive(PrimitiveType::Str);
    pub const STRING: Type = Type::Primitive(PrimitiveType::String);

    pub fn reference(inner: Type, mutable: bool) -> Self {
        Type::Reference {
            inner: Box::new(inner),
            mutable,
        }
    }

    pub fn array(elem: Type, size: u64) -> Self {
        Type::Array {
            elem: Box::new(elem),
            size,
        }
    }

    /// Wrap a block tail type; unit, never and error stay as they are
    pub fn ambiguous(inner: Type) -> Self {
        match inner {
            Type::Unit | Type::Never | Type::Error | Type::Ambiguous(_) => inner,
            other => Type::Ambiguous(Box::new(other)),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_integer())
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Never or error: produces no value worth checking
    pub fn is_bottom(&self) -> bool {
        matches!(self, Type::Never | Type::Error)
    }

    /// Value type of an ambiguous block type, or the type itself
    pub fn value_type(&self) -> &Type {
        match self {
            Type::Ambiguous(inner) => inner,
            other => other,
        }
    }

    /// Strip every reference layer
    pub fn auto_deref(&self) -> &Type {
        match self {
            Type::Reference { inner, .. } => inner.auto_deref(),
            other => other,
        }
    }

    /// Default undetermined integers to `i32`
    pub fn defaulted(&self) -> Type {
        match self {
            Type::Primitive(PrimitiveType::Int) => Type::I32,
            Type::Reference { inner, mutable } => Type::reference(inner.defaulted(), *mutable),
            Type::Array { elem, size } => Type::array(elem.defaulted(), *size),
            Type::Ambiguous(inner) => Type::Ambiguous(Box::new(inner.defaulted())),
            other => other.clone(),
        }
    }

    /// Name used in diagnostics: ambiguity dropped, integers defaulted
    pub fn describe(&self) -> String {
        self.value_type().defaulted().to_string()
    }

    /// Replace the trait type `symbol` (trait `Self`) by `with`
    pub fn substitute_trait(&self, symbol: SymbolId, with: &Type) -> Type {
        match self {
            Type::Trait { symbol: s, .. } if *s == symbol => with.clone(),
            Type::Reference { inner, mutable } => {
                Type::reference(inner.substitute_trait(symbol, with), *mutable)
            }
            Type::Array { elem, size } => Type::array(elem.substitute_trait(symbol, with), *size),
            Type::Function(f) => Type::Function(FnType {
                params: f
                    .params
                    .iter()
                    .map(|p| p.substitute_trait(symbol, with))
                    .collect(),
                ret: Box::new(f.ret.substitute_trait(symbol, with)),
                receiver: f.receiver,
            }),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p.name()),
            Type::Reference { inner, mutable: true } => write!(f, "&mut {}", inner),
            Type::Reference { inner, mutable: false } => write!(f, "&{}", inner),
            Type::Array { elem, size } => write!(f, "[{}; {}]", elem, size),
            Type::Struct { name, .. } | Type::Enum { name, .. } | Type::Trait { name, .. } => {
                write!(f, "{}", name)
            }
            Type::Function(func) => {
                write!(f, "fn(")?;
                let mut first = true;
                if let Some(receiver) = func.receiver {
                    let prefix = match (receiver.by_ref, receiver.mutable) {
                        (true, true) => "&mut ",
                        (true, false) => "&",
                        (false, true) => "mut ",
                        (false, false) => "",
                    };
                    write!(f, "{}self", prefix)?;
                    first = false;
                }
                for param in &func.params {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                    first = false;
                }
                write!(f, ") -> {}", func.ret)
            }
            Type::StructConstructor(inner) | Type::EnumConstructor(inner) => {
                write!(f, "constructor of {}", inner)
            }
            Type::Unit => write!(f, "()"),
            Type::Never => write!(f, "!"),
            Type::Ambiguous(inner) => write!(f, "{} (or ())", inner),
            Type::Error => write!(f, "{{error}}"),
        }
    }
}
