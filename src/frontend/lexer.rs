//! Lexer for rxc
//!
//! Converts source text into a stream of tokens, one line at a time. The lexer
//! is stateful across lines: an open block comment or an unterminated string
//! literal carries over into the next call to [`Lexer::tokenize`].

use log::trace;

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Flavor of a string-like literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralKind {
    Str,
    RawStr,
    CStr,
    RawCStr,
}

impl LiteralKind {
    fn is_raw(self) -> bool {
        matches!(self, LiteralKind::RawStr | LiteralKind::RawCStr)
    }

    fn into_token_kind(self, text: String) -> TokenKind {
        match self {
            LiteralKind::Str => TokenKind::StrLit(text),
            LiteralKind::RawStr => TokenKind::RawStrLit(text),
            LiteralKind::CStr => TokenKind::CStrLit(text),
            LiteralKind::RawCStr => TokenKind::RawCStrLit(text),
        }
    }
}

/// Where an unfinished literal stopped at the end of the previous line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralPhase {
    /// Inside the literal body
    Mid,
    /// After a `\` at end of line; leading whitespace of the next line is dropped
    ContinuationEscape,
}

/// A string literal that has not seen its closing quote yet
#[derive(Debug, Clone)]
struct PendingLiteral {
    kind: LiteralKind,
    text: String,
    hashes: usize,
    start: usize,
    phase: LiteralPhase,
}

/// Characters of a single line with their byte offsets
struct LineCursor {
    chars: Vec<(usize, char)>,
    len: usize,
    pos: usize,
}

impl LineCursor {
    fn new(line: &str) -> Self {
        Self {
            chars: line.char_indices().collect(),
            len: line.len(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).map(|&(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Byte offset (within the line) of the current character
    fn byte_pos(&self) -> usize {
        self.chars.get(self.pos).map(|&(i, _)| i).unwrap_or(self.len)
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, expected)| self.peek_at(i) == Some(expected))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }
}

/// The lexer state
#[derive(Debug)]
pub struct Lexer {
    tokens: Vec<Token>,
    /// Nesting depth of open `/* */` comments
    comment_depth: usize,
    comment_start: usize,
    pending: Option<PendingLiteral>,
    /// Byte offset of the current line in the whole source
    line_offset: usize,
    file_id: usize,
}

impl Lexer {
    pub fn new(file_id: usize) -> Self {
        Self {
            tokens: Vec::new(),
            comment_depth: 0,
            comment_start: 0,
            pending: None,
            line_offset: 0,
            file_id,
        }
    }

    /// Tokenize a whole source string
    pub fn tokenize_source(source: &str, file_id: usize) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(file_id);
        for line in source.split('\n') {
            lexer.tokenize(line)?;
        }
        lexer.finish()
    }

    /// Tokens produced so far
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Append the tokens of one line (without its trailing newline)
    pub fn tokenize(&mut self, raw_line: &str) -> Result<()> {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let mut cursor = LineCursor::new(line);

        loop {
            if self.comment_depth > 0 {
                self.skip_block_comment(&mut cursor);
                if cursor.at_end() {
                    break;
                }
                continue;
            }

            if let Some(pending) = self.pending.take() {
                self.continue_literal(pending, &mut cursor)?;
                if self.pending.is_some() {
                    break;
                }
                continue;
            }

            cursor.skip_whitespace();
            let Some(c) = cursor.peek() else { break };

            if cursor.starts_with("//") {
                break;
            }
            if cursor.starts_with("/*") {
                self.comment_start = self.line_offset + cursor.byte_pos();
                self.comment_depth = 1;
                cursor.pos += 2;
                continue;
            }

            if c.is_ascii_digit() {
                self.read_number(&mut cursor)?;
            } else if let Some((kind, prefix_len)) = Self::literal_prefix(&cursor) {
                let start = self.line_offset + cursor.byte_pos();
                cursor.pos += prefix_len;
                let hashes = if kind.is_raw() {
                    Self::count_hashes(&mut cursor)
                } else {
                    0
                };
                // The literal prefix is always followed by its opening quote
                cursor.advance();
                self.open_literal(kind, hashes, start, &mut cursor)?;
            } else if c.is_alphabetic() || c == '_' {
                self.read_identifier(&mut cursor);
            } else if c == '\'' {
                self.read_char(&mut cursor)?;
            } else if c == '"' {
                let start = self.line_offset + cursor.byte_pos();
                cursor.advance();
                self.open_literal(LiteralKind::Str, 0, start, &mut cursor)?;
            } else {
                self.read_punct(&mut cursor)?;
            }
        }

        if let Some(pending) = self.pending.as_mut() {
            if pending.phase == LiteralPhase::Mid {
                pending.text.push('\n');
            }
        }
        self.line_offset += raw_line.len() + 1;
        Ok(())
    }

    /// Finish lexing and return the token stream terminated by `Eof`
    pub fn finish(mut self) -> Result<Vec<Token>> {
        if self.comment_depth > 0 {
            return Err(Error::UnterminatedBlockComment {
                span: self.span(self.comment_start, self.comment_start + 2),
            });
        }
        if let Some(pending) = self.pending.take() {
            return Err(Error::UnterminatedLiteral {
                span: self.span(pending.start, pending.start + 1),
            });
        }
        let end = self.line_offset.saturating_sub(1);
        self.tokens.push(Token::eof(self.span(end, end)));
        trace!("lexed {} tokens", self.tokens.len());
        Ok(self.tokens)
    }

    // ==================== Helpers ====================

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(start, end, self.file_id)
    }

    fn span_in_line(&self, start: usize, cursor: &LineCursor) -> Span {
        self.span(self.line_offset + start, self.line_offset + cursor.byte_pos())
    }

    fn skip_block_comment(&mut self, cursor: &mut LineCursor) {
        while !cursor.at_end() && self.comment_depth > 0 {
            if cursor.starts_with("/*") {
                self.comment_depth += 1;
                cursor.pos += 2;
            } else if cursor.starts_with("*/") {
                self.comment_depth -= 1;
                cursor.pos += 2;
            } else {
                cursor.pos += 1;
            }
        }
    }

    /// Detects `r"`, `r#"`, `c"`, `cr"` and `cr#"` openers
    fn literal_prefix(cursor: &LineCursor) -> Option<(LiteralKind, usize)> {
        let raw_opener = |offset: usize| {
            let mut i = offset;
            while cursor.peek_at(i) == Some('#') {
                i += 1;
            }
            cursor.peek_at(i) == Some('"')
        };
        match (cursor.peek(), cursor.peek_at(1)) {
            (Some('r'), Some('"' | '#')) if raw_opener(1) => Some((LiteralKind::RawStr, 1)),
            (Some('c'), Some('"')) => Some((LiteralKind::CStr, 1)),
            (Some('c'), Some('r')) if matches!(cursor.peek_at(2), Some('"' | '#')) && raw_opener(2) => {
                Some((LiteralKind::RawCStr, 2))
            }
            _ => None,
        }
    }

    fn count_hashes(cursor: &mut LineCursor) -> usize {
        let mut hashes = 0;
        while cursor.peek() == Some('#') {
            cursor.advance();
            hashes += 1;
        }
        hashes
    }

    fn read_identifier(&mut self, cursor: &mut LineCursor) {
        let start = cursor.byte_pos();
        let mut text = String::new();
        while let Some(c) = cursor.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                cursor.advance();
            } else {
                break;
            }
        }

        let kind = if text == "_" {
            TokenKind::Underscore
        } else {
            TokenKind::keyword_from_str(&text).unwrap_or_else(|| TokenKind::Ident(text.clone()))
        };
        let span = self.span_in_line(start, cursor);
        self.tokens.push(Token::new(kind, text, span));
    }

    fn read_number(&mut self, cursor: &mut LineCursor) -> Result<()> {
        let start = cursor.byte_pos();
        let radix = match (cursor.peek(), cursor.peek_at(1)) {
            (Some('0'), Some('b')) => 2,
            (Some('0'), Some('o')) => 8,
            (Some('0'), Some('x')) => 16,
            _ => 10,
        };
        if radix != 10 {
            cursor.pos += 2;
        }

        let mut digits = String::new();
        while let Some(c) = cursor.peek() {
            if c == '_' {
                cursor.advance();
            } else if c.is_digit(radix) {
                digits.push(c);
                cursor.advance();
            } else {
                break;
            }
        }

        // A suffix may follow directly, but never one that looks like an exponent
        let mut suffix = String::new();
        if let Some(c) = cursor.peek() {
            let exponent = radix == 10 && matches!(c, 'e' | 'E');
            if (c.is_alphabetic() || c == '_') && !exponent {
                while let Some(c) = cursor.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        suffix.push(c);
                        cursor.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        let span = self.span_in_line(start, cursor);
        let text: String = cursor.chars[..cursor.pos]
            .iter()
            .skip_while(|&&(i, _)| i < start)
            .map(|&(_, c)| c)
            .collect();
        if digits.is_empty() {
            return Err(Error::MalformedInteger { text, span });
        }
        let value = u64::from_str_radix(&digits, radix).map_err(|_| Error::IntegerTooLarge {
            text: text.clone(),
            span,
        })?;

        let suffix = (!suffix.is_empty()).then_some(suffix);
        self.tokens.push(Token::new(TokenKind::IntLit { value, suffix }, text, span));
        Ok(())
    }

    /// Decode the escape sequence after a `\`. The backslash is already consumed.
    fn read_escape(&self, cursor: &mut LineCursor, start: usize) -> Result<char> {
        let escape_start = cursor.byte_pos();
        let unknown = |escape: String, cursor: &LineCursor| Error::UnknownEscape {
            escape,
            span: self.span_in_line(start.min(escape_start), cursor),
        };
        let Some(c) = cursor.advance() else {
            return Err(unknown(String::new(), cursor));
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '0' => '\0',
            'x' => {
                let hi = cursor.advance();
                let lo = cursor.advance();
                let code = match (hi, lo) {
                    (Some(hi), Some(lo)) => hi
                        .to_digit(16)
                        .zip(lo.to_digit(16))
                        .map(|(hi, lo)| hi * 16 + lo),
                    _ => None,
                };
                match code.and_then(char::from_u32) {
                    Some(decoded) => decoded,
                    None => return Err(unknown("x".to_string(), cursor)),
                }
            }
            other => return Err(unknown(other.to_string(), cursor)),
        };
        Ok(decoded)
    }

    fn read_char(&mut self, cursor: &mut LineCursor) -> Result<()> {
        let start = cursor.byte_pos();
        cursor.advance();
        let value = match cursor.advance() {
            Some('\\') => {
                if cursor.at_end() {
                    return Err(Error::UnterminatedChar {
                        span: self.span_in_line(start, cursor),
                    });
                }
                self.read_escape(cursor, start)?
            }
            Some('\'') | None => {
                return Err(Error::UnterminatedChar {
                    span: self.span_in_line(start, cursor),
                })
            }
            Some(c) => c,
        };
        if cursor.advance() != Some('\'') {
            return Err(Error::UnterminatedChar {
                span: self.span_in_line(start, cursor),
            });
        }
        let span = self.span_in_line(start, cursor);
        self.tokens
            .push(Token::new(TokenKind::CharLit(value), value.to_string(), span));
        Ok(())
    }

    fn open_literal(
        &mut self,
        kind: LiteralKind,
        hashes: usize,
        start: usize,
        cursor: &mut LineCursor,
    ) -> Result<()> {
        let pending = PendingLiteral {
            kind,
            text: String::new(),
            hashes,
            start,
            phase: LiteralPhase::Mid,
        };
        self.continue_literal(pending, cursor)
    }

    /// Scan the body of a string-like literal. Leaves it in `self.pending`
    /// if the line ends before the closing quote.
    fn continue_literal(&mut self, mut pending: PendingLiteral, cursor: &mut LineCursor) -> Result<()> {
        if pending.phase == LiteralPhase::ContinuationEscape {
            cursor.skip_whitespace();
            if cursor.at_end() {
                self.pending = Some(pending);
                return Ok(());
            }
            pending.phase = LiteralPhase::Mid;
        }

        while let Some(c) = cursor.advance() {
            match c {
                '"' if pending.kind.is_raw() => {
                    let mut closing = 0;
                    while closing < pending.hashes && cursor.peek() == Some('#') {
                        cursor.advance();
                        closing += 1;
                    }
                    if closing == pending.hashes {
                        self.finish_literal(pending, cursor);
                        return Ok(());
                    }
                    pending.text.push('"');
                    pending.text.extend(std::iter::repeat('#').take(closing));
                }
                '"' => {
                    self.finish_literal(pending, cursor);
                    return Ok(());
                }
                '\\' if !pending.kind.is_raw() => {
                    if cursor.at_end() {
                        pending.phase = LiteralPhase::ContinuationEscape;
                        self.pending = Some(pending);
                        return Ok(());
                    }
                    let at = cursor.byte_pos();
                    let decoded = self.read_escape(cursor, at)?;
                    pending.text.push(decoded);
                }
                other => pending.text.push(other),
            }
        }

        self.pending = Some(pending);
        Ok(())
    }

    fn finish_literal(&mut self, pending: PendingLiteral, cursor: &LineCursor) {
        let span = self.span(pending.start, self.line_offset + cursor.byte_pos());
        let text = pending.text.clone();
        let mut token = Token::new(pending.kind.into_token_kind(pending.text), text, span);
        token.raw_hashes = pending.hashes;
        self.tokens.push(token);
    }

    fn read_punct(&mut self, cursor: &mut LineCursor) -> Result<()> {
        let start = cursor.byte_pos();
        for (text, kind) in TokenKind::MULTI_CHAR_PUNCT {
            if cursor.starts_with(text) {
                cursor.pos += text.chars().count();
                let span = self.span_in_line(start, cursor);
                self.tokens.push(Token::new(kind.clone(), *text, span));
                return Ok(());
            }
        }

        let Some(c) = cursor.advance() else {
            return Ok(());
        };
        let span = self.span_in_line(start, cursor);
        match TokenKind::single_punct(c) {
            Some(kind) => {
                self.tokens.push(Token::new(kind, c.to_string(), span));
                Ok(())
            }
            None => Err(Error::UnknownCharacter { ch: c, span }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize_source(source, 0)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex("fn main let x Self self _"),
            vec![
                TokenKind::Fn,
                TokenKind::Ident("main".to_string()),
                TokenKind::Let,
                TokenKind::Ident("x".to_string()),
                TokenKind::SelfType,
                TokenKind::SelfValue,
                TokenKind::Underscore,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(
            lex("42 7u32 0x1F_usize 0b101 1_000"),
            vec![
                TokenKind::IntLit { value: 42, suffix: None },
                TokenKind::IntLit { value: 7, suffix: Some("u32".to_string()) },
                TokenKind::IntLit { value: 31, suffix: Some("usize".to_string()) },
                TokenKind::IntLit { value: 5, suffix: None },
                TokenKind::IntLit { value: 1000, suffix: None },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_is_not_a_suffix() {
        assert_eq!(
            lex("1e5"),
            vec![
                TokenKind::IntLit { value: 1, suffix: None },
                TokenKind::Ident("e5".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_match_punctuation() {
        assert_eq!(
            lex("<<= >>= ..= :: -> && &"),
            vec![
                TokenKind::ShlEq,
                TokenKind::ShrEq,
                TokenKind::DotDotEq,
                TokenKind::ColonColon,
                TokenKind::Arrow,
                TokenKind::AndAnd,
                TokenKind::And,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let source = "a // line\n/* outer /* inner */ still */ b";
        assert_eq!(
            lex(source),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_block_comment_across_lines() {
        let mut lexer = Lexer::new(0);
        lexer.tokenize("x /* start").unwrap();
        lexer.tokenize("still comment */ y").unwrap();
        let kinds: Vec<TokenKind> = lexer.finish().unwrap().into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::Ident("y".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex(r#""a\n\t\x41\"b""#),
            vec![TokenKind::StrLit("a\n\tA\"b".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unknown_escape() {
        let result = Lexer::tokenize_source(r#""\q""#, 0);
        assert!(matches!(result, Err(Error::UnknownEscape { .. })));
    }

    #[test]
    fn test_multiline_string() {
        assert_eq!(
            lex("\"first\nsecond\""),
            vec![TokenKind::StrLit("first\nsecond".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_continuation_escape_skips_indentation() {
        assert_eq!(
            lex("\"first \\\n      second\""),
            vec![TokenKind::StrLit("first second".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_raw_strings() {
        let tokens = Lexer::tokenize_source(r###"r#"say "hi""# r"plain""###, 0).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::RawStrLit(r#"say "hi""#.to_string()));
        assert_eq!(tokens[0].raw_hashes, 1);
        assert_eq!(tokens[1].kind, TokenKind::RawStrLit("plain".to_string()));
    }

    #[test]
    fn test_raw_string_needs_matching_hashes() {
        assert_eq!(
            lex(r###"r##"a"#b"##"###),
            vec![TokenKind::RawStrLit("a\"#b".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_c_strings() {
        assert_eq!(
            lex(r##"c"hi" cr#"raw"#"##),
            vec![
                TokenKind::CStrLit("hi".to_string()),
                TokenKind::RawCStrLit("raw".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(
            lex(r"'a' '\n' '\''"),
            vec![
                TokenKind::CharLit('a'),
                TokenKind::CharLit('\n'),
                TokenKind::CharLit('\''),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_char() {
        let result = Lexer::tokenize_source("'ab'", 0);
        assert!(matches!(result, Err(Error::UnterminatedChar { .. })));
    }

    #[test]
    fn test_unknown_character() {
        let result = Lexer::tokenize_source("let a = `b`;", 0);
        assert!(matches!(result, Err(Error::UnknownCharacter { ch: '`', .. })));
    }

    #[test]
    fn test_unterminated_at_end_of_file() {
        assert!(matches!(
            Lexer::tokenize_source("\"open", 0),
            Err(Error::UnterminatedLiteral { .. })
        ));
        assert!(matches!(
            Lexer::tokenize_source("/* open", 0),
            Err(Error::UnterminatedBlockComment { .. })
        ));
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens = Lexer::tokenize_source("fn\n  main", 0).unwrap();
        assert_eq!(tokens[0].span, Span::new(0, 2, 0));
        assert_eq!(tokens[1].span, Span::new(5, 9, 0));
    }
}
