//! Error handling for rxc

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::utils::Span;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================
    #[error("Unknown escape sequence: \\{escape}")]
    UnknownEscape { escape: String, span: Span },

    #[error("Unterminated character literal")]
    UnterminatedChar { span: Span },

    #[error("Unrecognized character: {ch:?}")]
    UnknownCharacter { ch: char, span: Span },

    #[error("Unterminated block comment")]
    UnterminatedBlockComment { span: Span },

    #[error("Unterminated literal")]
    UnterminatedLiteral { span: Span },

    #[error("Malformed integer literal: {text}")]
    MalformedInteger { text: String, span: Span },

    // ==================== Parser Errors ====================
    #[error("Unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Expected identifier, got {got}")]
    ExpectedIdent { got: String, span: Span },

    #[error("Expected type, got {got}")]
    ExpectedType { got: String, span: Span },

    #[error("Expected expression, got {got}")]
    ExpectedExpr { got: String, span: Span },

    #[error("Expected pattern, got {got}")]
    ExpectedPattern { got: String, span: Span },

    #[error("Invalid integer suffix: {suffix}")]
    InvalidIntSuffix { suffix: String, span: Span },

    #[error("Integer literal too large: {text}")]
    IntegerTooLarge { text: String, span: Span },

    #[error("Keyword `{keyword}` is reserved and not supported")]
    UnsupportedKeyword { keyword: String, span: Span },

    // ==================== Name Resolution Errors ====================
    #[error("Type '{name}' not found")]
    UnresolvedType { name: String, span: Span },

    #[error("Value '{name}' not found")]
    UnresolvedValue { name: String, span: Span },

    #[error("Field '{field}' not found in type '{ty}'")]
    UnresolvedField { field: String, ty: String, span: Span },

    #[error("Duplicate {namespace} declaration: '{name}'")]
    DuplicateDefinition {
        name: String,
        namespace: &'static str,
        span: Span,
    },

    #[error("cannot define {what} '{name}' as it conflicts with a constant in scope")]
    ConstantConflict {
        name: String,
        what: &'static str,
        span: Span,
    },

    #[error("'Self' used outside of an impl or trait")]
    SelfOutsideImpl { span: Span },

    #[error("{message}")]
    InvalidSelf { message: String, span: Span },

    #[error("'{name}' is not a struct")]
    NotAStructConstructor { name: String, span: Span },

    #[error("Invalid type name in impl declaration")]
    InvalidImplTarget { span: Span },

    #[error("Trait '{name}' not found for impl declaration")]
    UnresolvedTrait { name: String, span: Span },

    #[error("Scope tree changed between declaration and checking passes")]
    ScopeMismatch { span: Span },

    #[error("No associated item '{name}' in '{ty}'")]
    UnresolvedAssociated { ty: String, name: String, span: Span },

    #[error("No method '{method}' found for type {ty}")]
    UnresolvedMethod { method: String, ty: String, span: Span },

    // ==================== Type Errors ====================
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("if branches have incompatible types: {then_ty} and {else_ty}")]
    IncompatibleBranches {
        then_ty: String,
        else_ty: String,
        span: Span,
    },

    #[error("Array elements have incompatible types: {first} and {other}")]
    IncompatibleElements {
        first: String,
        other: String,
        span: Span,
    },

    #[error("Condition must be bool, got {got}")]
    NonBooleanCondition { got: String, span: Span },

    #[error("Invalid cast from {from} to {to}")]
    InvalidCast { from: String, to: String, span: Span },

    #[error("Argument count mismatch: expected {expected}, got {got}")]
    ArgCountMismatch {
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Expression of type {ty} is not callable")]
    NotCallable { ty: String, span: Span },

    #[error("Field count mismatch for struct '{name}': expected {expected}, got {got}")]
    FieldCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Field '{field}' specified more than once")]
    DuplicateField { field: String, span: Span },

    #[error("Type {ty} has no field '{field}'")]
    UnknownField { field: String, ty: String, span: Span },

    #[error("Cannot dereference a value of type {ty}")]
    CannotDeref { ty: String, span: Span },

    #[error("Cannot index into a value of type {ty}")]
    NotIndexable { ty: String, span: Span },

    #[error("Operator `{op}` cannot be applied to {ty}")]
    InvalidOperand {
        op: &'static str,
        ty: String,
        span: Span,
    },

    #[error("`break` outside of a loop")]
    BreakOutsideLoop { span: Span },

    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop { span: Span },

    #[error("`return` outside of a function")]
    ReturnOutsideFunction { span: Span },

    #[error("`break` with a value inside a `while` loop")]
    BreakWithValueInWhile { span: Span },

    #[error("Cannot assign to an immutable place")]
    ImmutableAssignment { span: Span },

    #[error("Cannot borrow an immutable place as mutable")]
    ImmutableBorrow { span: Span },

    #[error("Invalid left-hand side of assignment")]
    InvalidAssignTarget { span: Span },

    #[error("`_` can only appear on the left-hand side of an assignment")]
    MisplacedUnderscore { span: Span },

    #[error("Type annotation needed for '{name}'")]
    AnnotationNeeded { name: String, span: Span },

    #[error("Function '{name}' has no body")]
    MissingBody { name: String, span: Span },

    #[error("Constant '{name}' has no value")]
    MissingConstValue { name: String, span: Span },

    #[error("Expected a value, found {what} '{name}'")]
    ExpectedValue {
        what: &'static str,
        name: String,
        span: Span,
    },

    #[error("Associated function '{name}' cannot be called with method syntax")]
    NotAMethod { name: String, span: Span },

    #[error("Reference pattern does not match type {ty}")]
    PatternMismatch { ty: String, span: Span },

    // ==================== Constant Evaluation Errors ====================
    #[error("Non-constant {what} in constant expression")]
    NonConstant { what: String, span: Span },

    #[error("{op} by zero in constant expression")]
    ZeroDivisor { op: &'static str, span: Span },

    #[error("Array size cannot be negative: {size}")]
    NegativeArraySize { size: i128, span: Span },

    #[error("Array size must be an integer, got {ty}")]
    InvalidArraySize { ty: String, span: Span },

    #[error("Constant value {value} does not fit in {ty}")]
    ConstOverflow { value: i128, ty: String, span: Span },

    #[error("Shift amount {amount} is out of range for a {bits}-bit integer")]
    ShiftOverflow { amount: i128, bits: u32, span: Span },

    #[error("Constant '{name}' depends on itself")]
    CyclicConstant { name: String, span: Span },

    // ==================== Trait Errors ====================
    #[error("Missing implementation of trait {kind} '{name}' for type '{ty}' from trait '{trait_name}'")]
    MissingTraitItem {
        kind: &'static str,
        name: String,
        ty: String,
        trait_name: String,
        span: Span,
    },

    #[error("Signature mismatch for '{name}' in impl for type '{ty}' from trait '{trait_name}'")]
    TraitSignatureMismatch {
        name: String,
        ty: String,
        trait_name: String,
        span: Span,
    },

    #[error("'{name}' is not a member of trait '{trait_name}'")]
    NotATraitMember {
        name: String,
        trait_name: String,
        span: Span,
    },

    #[error("IO error: {0}")]
    Io(String),
}

/// Coarse classification of errors, one per compiler stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    Lex,
    Parse,
    NameResolution,
    Type,
    ConstEval,
    Trait,
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lex => "LexError",
            Self::Parse => "ParseError",
            Self::NameResolution => "NameResolutionError",
            Self::Type => "TypeError",
            Self::ConstEval => "ConstEvalError",
            Self::Trait => "TraitError",
            Self::Io => "IoError",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnknownEscape { span, .. }
            | Self::UnterminatedChar { span }
            | Self::UnknownCharacter { span, .. }
            | Self::UnterminatedBlockComment { span }
            | Self::UnterminatedLiteral { span }
            | Self::MalformedInteger { span, .. }
            | Self::UnexpectedToken { span, .. }
            | Self::ExpectedIdent { span, .. }
            | Self::ExpectedType { span, .. }
            | Self::ExpectedExpr { span, .. }
            | Self::ExpectedPattern { span, .. }
            | Self::InvalidIntSuffix { span, .. }
            | Self::IntegerTooLarge { span, .. }
            | Self::UnsupportedKeyword { span, .. }
            | Self::UnresolvedType { span, .. }
            | Self::UnresolvedValue { span, .. }
            | Self::UnresolvedField { span, .. }
            | Self::DuplicateDefinition { span, .. }
            | Self::ConstantConflict { span, .. }
            | Self::SelfOutsideImpl { span }
            | Self::InvalidSelf { span, .. }
            | Self::NotAStructConstructor { span, .. }
            | Self::InvalidImplTarget { span }
            | Self::UnresolvedTrait { span, .. }
            | Self::ScopeMismatch { span }
            | Self::UnresolvedAssociated { span, .. }
            | Self::UnresolvedMethod { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::IncompatibleBranches { span, .. }
            | Self::IncompatibleElements { span, .. }
            | Self::NonBooleanCondition { span, .. }
            | Self::InvalidCast { span, .. }
            | Self::ArgCountMismatch { span, .. }
            | Self::NotCallable { span, .. }
            | Self::FieldCountMismatch { span, .. }
            | Self::DuplicateField { span, .. }
            | Self::UnknownField { span, .. }
            | Self::CannotDeref { span, .. }
            | Self::NotIndexable { span, .. }
            | Self::InvalidOperand { span, .. }
            | Self::BreakOutsideLoop { span }
            | Self::ContinueOutsideLoop { span }
            | Self::ReturnOutsideFunction { span }
            | Self::BreakWithValueInWhile { span }
            | Self::ImmutableAssignment { span }
            | Self::ImmutableBorrow { span }
            | Self::InvalidAssignTarget { span }
            | Self::MisplacedUnderscore { span }
            | Self::AnnotationNeeded { span, .. }
            | Self::MissingBody { span, .. }
            | Self::MissingConstValue { span, .. }
            | Self::ExpectedValue { span, .. }
            | Self::NotAMethod { span, .. }
            | Self::PatternMismatch { span, .. }
            | Self::NonConstant { span, .. }
            | Self::ZeroDivisor { span, .. }
            | Self::NegativeArraySize { span, .. }
            | Self::InvalidArraySize { span, .. }
            | Self::ConstOverflow { span, .. }
            | Self::ShiftOverflow { span, .. }
            | Self::CyclicConstant { span, .. }
            | Self::MissingTraitItem { span, .. }
            | Self::TraitSignatureMismatch { span, .. }
            | Self::NotATraitMember { span, .. } => Some(*span),
            Self::Io(_) => None,
        }
    }

    /// The compiler stage this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownEscape { .. }
            | Self::UnterminatedChar { .. }
            | Self::UnknownCharacter { .. }
            | Self::UnterminatedBlockComment { .. }
            | Self::UnterminatedLiteral { .. }
            | Self::MalformedInteger { .. } => ErrorCategory::Lex,

            Self::UnexpectedToken { .. }
            | Self::ExpectedIdent { .. }
            | Self::ExpectedType { .. }
            | Self::ExpectedExpr { .. }
            | Self::ExpectedPattern { .. }
            | Self::InvalidIntSuffix { .. }
            | Self::IntegerTooLarge { .. }
            | Self::UnsupportedKeyword { .. } => ErrorCategory::Parse,

            Self::UnresolvedType { .. }
            | Self::UnresolvedValue { .. }
            | Self::UnresolvedField { .. }
            | Self::DuplicateDefinition { .. }
            | Self::ConstantConflict { .. }
            | Self::SelfOutsideImpl { .. }
            | Self::InvalidSelf { .. }
            | Self::NotAStructConstructor { .. }
            | Self::InvalidImplTarget { .. }
            | Self::UnresolvedTrait { .. }
            | Self::ScopeMismatch { .. }
            | Self::UnresolvedAssociated { .. }
            | Self::UnresolvedMethod { .. } => ErrorCategory::NameResolution,

            Self::NonConstant { .. }
            | Self::ZeroDivisor { .. }
            | Self::NegativeArraySize { .. }
            | Self::InvalidArraySize { .. }
            | Self::ConstOverflow { .. }
            | Self::ShiftOverflow { .. }
            | Self::CyclicConstant { .. } => ErrorCategory::ConstEval,

            Self::MissingTraitItem { .. }
            | Self::TraitSignatureMismatch { .. }
            | Self::NotATraitMember { .. } => ErrorCategory::Trait,

            Self::Io(_) => ErrorCategory::Io,

            _ => ErrorCategory::Type,
        }
    }

    /// Lex, parse and IO errors always abort; everything else is semantic
    pub fn is_semantic(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Lex | ErrorCategory::Parse | ErrorCategory::Io
        )
    }
}
