// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Byte-oriented tokenizer that keeps trivia
//!
//! Keywords (`and`, `div`, `true`, ...) are produced as plain identifiers and
//! interpreted by the parser from their position, so `text.div` and
//! `value.is(Quantity)` tokenize like any other member access.

use super::error::{ParseError, ParseResult};
use crate::ast::{Lexeme, Span};

/// Token category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Integer literal (`42`)
    Integer,
    /// Long literal (`42L`)
    Long,
    /// Decimal literal (`4.2`)
    Decimal,
    /// Single-quoted string
    String,
    /// Date literal (`@2020-01-01`)
    Date,
    /// DateTime literal (`@2020-01-01T10:00`)
    DateTime,
    /// Time literal (`@T10:00`)
    Time,
    /// Plain identifier or keyword
    Identifier,
    /// Backtick-delimited identifier
    DelimitedIdentifier,
    /// `$this`
    DollarThis,
    /// `$index`
    DollarIndex,
    /// `$total`
    DollarTotal,
    /// `%name`, `` %`name` `` or `%'name'`
    External,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `~`
    Equivalent,
    /// `!~`
    NotEquivalent,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// End of input; its leading trivia is the expression's trailing trivia
    Eof,
}

/// A token with its source lexeme and decoded value
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Category
    pub kind: TokenKind,
    /// Source text and leading trivia
    pub lexeme: Lexeme,
    /// Decoded value: unescaped string content, identifier name without
    /// backticks, external constant name without `%`
    pub value: String,
}

impl Token {
    /// Raw token text
    pub fn text(&self) -> &str {
        &self.lexeme.text
    }

    /// Start offset of the token text
    pub fn position(&self) -> usize {
        self.lexeme.span.start
    }

    /// Whether this is the undelimited identifier `word`
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme.text == word
    }
}

/// Tokenizer over a FHIRPath expression
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer for `input`
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn is_id_start(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'_')
    }

    fn is_id_continue(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn slice(&self, start: usize, end: usize) -> &'input str {
        &self.input[start..end]
    }

    /// Consume whitespace and comments, returning them verbatim
    fn scan_trivia(&mut self) -> ParseResult<&'input str> {
        let start = self.pos;
        while let Some(ch) = self.peek_byte(0) {
            match ch {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.peek_byte(1) == Some(b'/') => {
                    self.pos += 2;
                    while let Some(c) = self.peek_byte(0) {
                        if c == b'\n' || c == b'\r' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                b'/' if self.peek_byte(1) == Some(b'*') => {
                    let comment_start = self.pos;
                    self.pos += 2;
                    loop {
                        match (self.peek_byte(0), self.peek_byte(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                return Err(ParseError::UnclosedComment {
                                    position: comment_start,
                                });
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(self.slice(start, self.pos))
    }

    fn scan_number(&mut self) -> TokenKind {
        while self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }

        let is_decimal = self.peek_byte(0) == Some(b'.')
            && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit());
        if is_decimal {
            self.pos += 1;
            while self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
            return TokenKind::Decimal;
        }

        if self.peek_byte(0) == Some(b'L') && !self.peek_byte(1).is_some_and(Self::is_id_continue)
        {
            self.pos += 1;
            return TokenKind::Long;
        }

        TokenKind::Integer
    }

    fn scan_identifier(&mut self) {
        while self.peek_byte(0).is_some_and(Self::is_id_continue) {
            self.pos += 1;
        }
    }

    /// Scan a `'...'` or `` `...` `` body starting at the opening delimiter,
    /// returning the unescaped content
    fn scan_delimited(&mut self, delimiter: u8, what: &'static str) -> ParseResult<String> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        let mut chunk_start = self.pos;

        while let Some(ch) = self.peek_byte(0) {
            if ch == delimiter {
                value.push_str(self.slice(chunk_start, self.pos));
                self.pos += 1;
                return Ok(value);
            }
            if ch == b'\\' {
                value.push_str(self.slice(chunk_start, self.pos));
                let escape_pos = self.pos;
                self.pos += 1;
                let Some(escaped) = self.input[self.pos..].chars().next() else {
                    break;
                };
                self.pos += escaped.len_utf8();
                match escaped {
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    'f' => value.push('\u{000C}'),
                    'u' => {
                        let hex = self
                            .input
                            .get(self.pos..self.pos + 4)
                            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()));
                        let decoded = hex
                            .and_then(|h| u32::from_str_radix(h, 16).ok())
                            .and_then(char::from_u32);
                        match decoded {
                            Some(c) => {
                                value.push(c);
                                self.pos += 4;
                            }
                            None => {
                                return Err(ParseError::InvalidEscape {
                                    escape: "u".to_string(),
                                    position: escape_pos,
                                });
                            }
                        }
                    }
                    // \' \" \` \\ \/ and anything else stand for themselves
                    other => value.push(other),
                }
                chunk_start = self.pos;
                continue;
            }
            self.pos += 1;
        }

        Err(ParseError::UnclosedString {
            what,
            position: start,
        })
    }

    fn scan_two_digits(&mut self) -> bool {
        if self.peek_byte(0).is_some_and(|b| b.is_ascii_digit())
            && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 2;
            true
        } else {
            false
        }
    }

    fn scan_date_part(&mut self) -> bool {
        for _ in 0..4 {
            if !self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
                return false;
            }
            self.pos += 1;
        }

        if self.peek_byte(0) == Some(b'-') {
            let save = self.pos;
            self.pos += 1;
            if !self.scan_two_digits() {
                self.pos = save;
                return true;
            }
            if self.peek_byte(0) == Some(b'-') {
                let save = self.pos;
                self.pos += 1;
                if !self.scan_two_digits() {
                    self.pos = save;
                }
            }
        }
        true
    }

    fn scan_time_part(&mut self) {
        if !self.scan_two_digits() {
            return;
        }
        if self.peek_byte(0) == Some(b':') {
            let save = self.pos;
            self.pos += 1;
            if !self.scan_two_digits() {
                self.pos = save;
                return;
            }
            if self.peek_byte(0) == Some(b':') {
                let save = self.pos;
                self.pos += 1;
                if !self.scan_two_digits() {
                    self.pos = save;
                    return;
                }
                if self.peek_byte(0) == Some(b'.')
                    && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit())
                {
                    self.pos += 1;
                    while self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                }
            }
        }
    }

    fn scan_timezone(&mut self) {
        match self.peek_byte(0) {
            Some(b'Z') => self.pos += 1,
            Some(b'+') | Some(b'-') => {
                let tz = self.bytes.get(self.pos + 1..self.pos + 6);
                let well_formed = tz.is_some_and(|t| {
                    t[0].is_ascii_digit()
                        && t[1].is_ascii_digit()
                        && t[2] == b':'
                        && t[3].is_ascii_digit()
                        && t[4].is_ascii_digit()
                });
                if well_formed {
                    self.pos += 6;
                }
            }
            _ => {}
        }
    }

    fn scan_datetime_literal(&mut self) -> ParseResult<TokenKind> {
        let start = self.pos;
        self.pos += 1;

        if self.peek_byte(0) == Some(b'T') {
            self.pos += 1;
            self.scan_time_part();
            if self.pos == start + 2 {
                return Err(ParseError::InvalidLiteral {
                    kind: "time",
                    value: self.slice(start, self.pos).to_string(),
                    position: start,
                });
            }
            return Ok(TokenKind::Time);
        }

        if !self.scan_date_part() {
            return Err(ParseError::InvalidLiteral {
                kind: "date",
                value: self.slice(start, self.pos).to_string(),
                position: start,
            });
        }

        if self.peek_byte(0) == Some(b'T') {
            self.pos += 1;
            self.scan_time_part();
            self.scan_timezone();
            Ok(TokenKind::DateTime)
        } else {
            Ok(TokenKind::Date)
        }
    }

    fn scan_operator(&mut self, ch: u8) -> Option<TokenKind> {
        let next = self.peek_byte(1);
        let (kind, len) = match ch {
            b'+' => (TokenKind::Plus, 1),
            b'-' => (TokenKind::Minus, 1),
            b'*' => (TokenKind::Star, 1),
            b'/' => (TokenKind::Slash, 1),
            b'&' => (TokenKind::Ampersand, 1),
            b'|' => (TokenKind::Pipe, 1),
            b'=' => (TokenKind::Equal, 1),
            b'~' => (TokenKind::Equivalent, 1),
            b'!' if next == Some(b'=') => (TokenKind::NotEqual, 2),
            b'!' if next == Some(b'~') => (TokenKind::NotEquivalent, 2),
            b'<' if next == Some(b'=') => (TokenKind::LessThanOrEqual, 2),
            b'<' => (TokenKind::LessThan, 1),
            b'>' if next == Some(b'=') => (TokenKind::GreaterThanOrEqual, 2),
            b'>' => (TokenKind::GreaterThan, 1),
            b'(' => (TokenKind::LeftParen, 1),
            b')' => (TokenKind::RightParen, 1),
            b'[' => (TokenKind::LeftBracket, 1),
            b']' => (TokenKind::RightBracket, 1),
            b'{' => (TokenKind::LeftBrace, 1),
            b'}' => (TokenKind::RightBrace, 1),
            b'.' => (TokenKind::Dot, 1),
            b',' => (TokenKind::Comma, 1),
            _ => return None,
        };
        self.pos += len;
        Some(kind)
    }

    /// Produce the next token; returns an `Eof` token at the end of input
    pub fn next_token(&mut self) -> ParseResult<Token> {
        let leading = self.scan_trivia()?.to_string();
        let start = self.pos;

        let Some(ch) = self.peek_byte(0) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                lexeme: Lexeme::new("", Span::new(start, start)).with_leading(leading),
                value: String::new(),
            });
        };

        let mut value = None;
        let kind = match ch {
            b'0'..=b'9' => self.scan_number(),
            b'\'' => {
                value = Some(self.scan_delimited(b'\'', "string literal")?);
                TokenKind::String
            }
            b'`' => {
                value = Some(self.scan_delimited(b'`', "delimited identifier")?);
                TokenKind::DelimitedIdentifier
            }
            b'@' => self.scan_datetime_literal()?,
            b'$' => {
                self.pos += 1;
                let name_start = self.pos;
                self.scan_identifier();
                match self.slice(name_start, self.pos) {
                    "this" => TokenKind::DollarThis,
                    "index" => TokenKind::DollarIndex,
                    "total" => TokenKind::DollarTotal,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            token: format!("${other}"),
                            position: start,
                        });
                    }
                }
            }
            b'%' => {
                self.pos += 1;
                match self.peek_byte(0) {
                    Some(b'`') => value = Some(self.scan_delimited(b'`', "delimited identifier")?),
                    Some(b'\'') => value = Some(self.scan_delimited(b'\'', "string literal")?),
                    Some(b) if Self::is_id_start(b) => {
                        let name_start = self.pos;
                        self.scan_identifier();
                        // %vs-name and %ext-name constants
                        while self.peek_byte(0) == Some(b'-')
                            && self.peek_byte(1).is_some_and(Self::is_id_continue)
                        {
                            self.pos += 1;
                            self.scan_identifier();
                        }
                        value = Some(self.slice(name_start, self.pos).to_string());
                    }
                    _ => {
                        return Err(ParseError::UnexpectedToken {
                            token: "%".to_string(),
                            position: start,
                        });
                    }
                }
                TokenKind::External
            }
            b if Self::is_id_start(b) => {
                self.scan_identifier();
                TokenKind::Identifier
            }
            b => match self.scan_operator(b) {
                Some(kind) => kind,
                None => {
                    let token = self.input[start..].chars().next().unwrap_or('?');
                    return Err(ParseError::UnexpectedToken {
                        token: token.to_string(),
                        position: start,
                    });
                }
            },
        };

        let text = self.slice(start, self.pos);
        Ok(Token {
            kind,
            lexeme: Lexeme::new(text, Span::new(start, self.pos)).with_leading(leading),
            value: value.unwrap_or_else(|| text.to_string()),
        })
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub fn tokenize_all(&mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Tokenize a string into tokens ending with `Eof`
pub fn tokenize(input: &str) -> ParseResult<Vec<Token>> {
    Tokenizer::new(input).tokenize_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenizer_basic() {
        assert_eq!(
            kinds("Patient.name"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_trivia_is_kept() {
        let tokens = tokenize("  a /* c */ + // tail\n b ").unwrap();
        assert_eq!(tokens[0].lexeme.leading, "  ");
        assert_eq!(tokens[1].lexeme.leading, " /* c */ ");
        assert_eq!(tokens[2].lexeme.leading, " // tail\n ");
        assert_eq!(tokens[3].kind, TokenKind::Eof);
        assert_eq!(tokens[3].lexeme.leading, " ");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42")[0], TokenKind::Integer);
        assert_eq!(kinds("4.2")[0], TokenKind::Decimal);
        assert_eq!(kinds("42L")[0], TokenKind::Long);
        // a dot not followed by a digit is an invocation
        assert_eq!(
            kinds("1.abs()")[..3],
            [TokenKind::Integer, TokenKind::Dot, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r"'it\'s A\n'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].value, "it's A\n");
        assert_eq!(tokens[0].text(), r"'it\'s A\n'");
    }

    #[test]
    fn test_unclosed_string() {
        assert!(matches!(
            tokenize("'abc"),
            Err(ParseError::UnclosedString { position: 0, .. })
        ));
    }

    #[test]
    fn test_datetime_literals() {
        assert_eq!(kinds("@2020-01-01")[0], TokenKind::Date);
        assert_eq!(kinds("@2020")[0], TokenKind::Date);
        assert_eq!(kinds("@2020-01-01T10:00:00.000+01:00")[0], TokenKind::DateTime);
        assert_eq!(kinds("@2020T")[0], TokenKind::DateTime);
        assert_eq!(kinds("@T10:30")[0], TokenKind::Time);
        let tokens = tokenize("@2020-01-01T10:00-x").unwrap();
        assert_eq!(tokens[0].text(), "@2020-01-01T10:00");
        assert_eq!(tokens[1].kind, TokenKind::Minus);
    }

    #[test]
    fn test_variables_and_externals() {
        let tokens = tokenize("$this %resource %`vs-x` %vs-administrative-gender").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::DollarThis);
        assert_eq!(tokens[1].kind, TokenKind::External);
        assert_eq!(tokens[1].value, "resource");
        assert_eq!(tokens[2].value, "vs-x");
        assert_eq!(tokens[3].value, "vs-administrative-gender");
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("!= !~ <= >= < > = ~ | &"),
            vec![
                TokenKind::NotEqual,
                TokenKind::NotEquivalent,
                TokenKind::LessThanOrEqual,
                TokenKind::GreaterThanOrEqual,
                TokenKind::LessThan,
                TokenKind::GreaterThan,
                TokenKind::Equal,
                TokenKind::Equivalent,
                TokenKind::Pipe,
                TokenKind::Ampersand,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unclosed_comment() {
        assert!(matches!(
            tokenize("a /* b"),
            Err(ParseError::UnclosedComment { position: 2 })
        ));
    }
}
