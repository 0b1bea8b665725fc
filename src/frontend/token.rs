//! Token definitions for rxc

use serde::Serialize;

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text (for literals: the decoded contents)
    pub text: String,
    /// Number of `#` delimiters of a raw literal
    pub raw_hashes: usize,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            raw_hashes: 0,
            span,
        }
    }

    pub fn eof(span: Span) -> Self {
        Self::new(TokenKind::Eof, "", span)
    }

    /// Human readable form used in parse errors
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::StrLit(_) | TokenKind::RawStrLit(_) => "string literal".to_string(),
            TokenKind::CStrLit(_) | TokenKind::RawCStrLit(_) => "C string literal".to_string(),
            TokenKind::CharLit(_) => "character literal".to_string(),
            _ => format!("`{}`", self.text),
        }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    // ============ Keywords ============
    As,
    Break,
    Const,
    Continue,
    Crate,
    Else,
    Enum,
    Extern,
    False,
    Fn,
    For,
    If,
    Impl,
    In,
    Let,
    Loop,
    Match,
    Mod,
    Move,
    Mut,
    Ref,
    Return,
    /// self
    SelfValue,
    /// Self
    SelfType,
    Static,
    Struct,
    Super,
    Trait,
    True,
    Type,
    Unsafe,
    Use,
    Where,
    While,

    // ============ Identifiers and Literals ============
    Ident(String),
    /// Integer literal with optional type suffix
    IntLit { value: u64, suffix: Option<String> },
    CharLit(char),
    StrLit(String),
    RawStrLit(String),
    CStrLit(String),
    RawCStrLit(String),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// ^
    Caret,
    /// !
    Not,
    /// &
    And,
    /// |
    Or,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// <<
    Shl,
    /// >>
    Shr,
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// +=
    PlusEq,
    /// -=
    MinusEq,
    /// *=
    StarEq,
    /// /=
    SlashEq,
    /// %=
    PercentEq,
    /// ^=
    CaretEq,
    /// &=
    AndEq,
    /// |=
    OrEq,
    /// <<=
    ShlEq,
    /// >>=
    ShrEq,
    /// @
    At,
    /// .
    Dot,
    /// ..
    DotDot,
    /// ...
    DotDotDot,
    /// ..=
    DotDotEq,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// :
    Colon,
    /// ::
    ColonColon,
    /// ->
    Arrow,
    /// =>
    FatArrow,
    /// <-
    LArrow,
    /// #
    Pound,
    /// ##
    PoundPound,
    /// $
    Dollar,
    /// ?
    Question,
    /// ~
    Tilde,
    /// _
    Underscore,

    // ============ Delimiters ============
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    // ============ Special ============
    Eof,
}

impl TokenKind {
    /// Try to convert an identifier to a keyword
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "as" => TokenKind::As,
            "break" => TokenKind::Break,
            "const" => TokenKind::Const,
            "continue" => TokenKind::Continue,
            "crate" => TokenKind::Crate,
            "else" => TokenKind::Else,
            "enum" => TokenKind::Enum,
            "extern" => TokenKind::Extern,
            "false" => TokenKind::False,
            "fn" => TokenKind::Fn,
            "for" => TokenKind::For,
            "if" => TokenKind::If,
            "impl" => TokenKind::Impl,
            "in" => TokenKind::In,
            "let" => TokenKind::Let,
            "loop" => TokenKind::Loop,
            "match" => TokenKind::Match,
            "mod" => TokenKind::Mod,
            "move" => TokenKind::Move,
            "mut" => TokenKind::Mut,
            "ref" => TokenKind::Ref,
            "return" => TokenKind::Return,
            "self" => TokenKind::SelfValue,
            "Self" => TokenKind::SelfType,
            "static" => TokenKind::Static,
            "struct" => TokenKind::Struct,
            "super" => TokenKind::Super,
            "trait" => TokenKind::Trait,
            "true" => TokenKind::True,
            "type" => TokenKind::Type,
            "unsafe" => TokenKind::Unsafe,
            "use" => TokenKind::Use,
            "where" => TokenKind::Where,
            "while" => TokenKind::While,
            _ => return None,
        };
        Some(kind)
    }

    /// Keywords the lexer knows but the grammar does not use
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            TokenKind::Crate
                | TokenKind::Extern
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Match
                | TokenKind::Mod
                | TokenKind::Move
                | TokenKind::Static
                | TokenKind::Super
                | TokenKind::Type
                | TokenKind::Unsafe
                | TokenKind::Use
                | TokenKind::Where
        )
    }

    /// Multi-character punctuation, longest first
    pub const MULTI_CHAR_PUNCT: &'static [(&'static str, TokenKind)] = &[
        ("<<=", TokenKind::ShlEq),
        (">>=", TokenKind::ShrEq),
        ("...", TokenKind::DotDotDot),
        ("..=", TokenKind::DotDotEq),
        ("##", TokenKind::PoundPound),
        ("==", TokenKind::EqEq),
        ("<=", TokenKind::Le),
        (">=", TokenKind::Ge),
        ("!=", TokenKind::Ne),
        ("&&", TokenKind::AndAnd),
        ("||", TokenKind::OrOr),
        ("<<", TokenKind::Shl),
        (">>", TokenKind::Shr),
        ("+=", TokenKind::PlusEq),
        ("-=", TokenKind::MinusEq),
        ("*=", TokenKind::StarEq),
        ("/=", TokenKind::SlashEq),
        ("%=", TokenKind::PercentEq),
        ("&=", TokenKind::AndEq),
        ("|=", TokenKind::OrEq),
        ("^=", TokenKind::CaretEq),
        ("->", TokenKind::Arrow),
        ("=>", TokenKind::FatArrow),
        ("::", TokenKind::ColonColon),
        ("..", TokenKind::DotDot),
        ("<-", TokenKind::LArrow),
    ];

    /// Single-character punctuation
    pub fn single_punct(c: char) -> Option<TokenKind> {
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '!' => TokenKind::Not,
            '&' => TokenKind::And,
            '|' => TokenKind::Or,
            '=' => TokenKind::Eq,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '@' => TokenKind::At,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '#' => TokenKind::Pound,
            '$' => TokenKind::Dollar,
            '?' => TokenKind::Question,
            '~' => TokenKind::Tilde,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            _ => return None,
        };
        Some(kind)
    }

    /// Binding power of an infix or postfix operator (higher binds tighter).
    /// Returns None if the token does not continue an expression.
    pub fn infix_precedence(&self) -> Option<u8> {
        let precedence = match self {
            TokenKind::Dot => 190,
            TokenKind::LParen | TokenKind::LBracket => 170,
            TokenKind::As => 150,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 140,
            TokenKind::Plus | TokenKind::Minus => 130,
            TokenKind::Shl | TokenKind::Shr => 120,
            TokenKind::And => 110,
            TokenKind::Caret => 100,
            TokenKind::Or => 90,
            TokenKind::EqEq
            | TokenKind::Ne
            | TokenKind::Lt
            | TokenKind::Le
            | TokenKind::Gt
            | TokenKind::Ge => 80,
            TokenKind::AndAnd => 70,
            TokenKind::OrOr => 60,
            TokenKind::Eq
            | TokenKind::PlusEq
            | TokenKind::MinusEq
            | TokenKind::StarEq
            | TokenKind::SlashEq
            | TokenKind::PercentEq
            | TokenKind::AndEq
            | TokenKind::OrEq
            | TokenKind::CaretEq
            | TokenKind::ShlEq
            | TokenKind::ShrEq => 50,
            _ => return None,
        };
        Some(precedence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(TokenKind::keyword_from_str("fn"), Some(TokenKind::Fn));
        assert_eq!(TokenKind::keyword_from_str("Self"), Some(TokenKind::SelfType));
        assert_eq!(TokenKind::keyword_from_str("self"), Some(TokenKind::SelfValue));
        assert_eq!(TokenKind::keyword_from_str("main"), None);
    }

    #[test]
    fn test_multi_char_table_is_longest_first() {
        let lengths: Vec<usize> = TokenKind::MULTI_CHAR_PUNCT
            .iter()
            .map(|(text, _)| text.len())
            .collect();
        assert!(lengths.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn test_precedence_order() {
        let mul = TokenKind::Star.infix_precedence();
        let add = TokenKind::Plus.infix_precedence();
        let assign = TokenKind::Eq.infix_precedence();
        assert!(mul > add);
        assert!(add > assign);
        assert_eq!(TokenKind::Semicolon.infix_precedence(), None);
    }
}
