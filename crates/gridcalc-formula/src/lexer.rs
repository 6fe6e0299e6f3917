//! Formula lexer
//!
//! Turns formula source text into a flat token stream. Positions are byte
//! offsets into the original source (including the optional leading `=`),
//! so parse diagnostics point at the text the user actually typed.

use crate::error::{EngineError, EngineResult};
use gridcalc_core::ErrorCode;

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Number,
    String,
    Boolean,
    Error,

    // References and calls
    CellRef,
    Function,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Colon,

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,
    Percent,
    Concat,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,

    /// `!` between a sheet name and a cell reference
    SheetSep,

    /// End-of-input sentinel
    End,
}

/// A single token: kind, source text, and byte position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: usize,
}

/// Formula lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Tokenize the whole input, ending with an `End` sentinel
    pub fn tokenize(mut self) -> EngineResult<Vec<Token>> {
        // A leading '=' belongs to the cell, not the expression
        if self.peek() == Some('=') {
            self.advance();
        }

        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let position = self.pos;
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::End,
                        lexeme: String::new(),
                        position,
                    });
                    return Ok(tokens);
                }
            };

            let token = match c {
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '*' => self.single(TokenKind::Multiply),
                '/' => self.single(TokenKind::Divide),
                '^' => self.single(TokenKind::Power),
                '%' => self.single(TokenKind::Percent),
                '&' => self.single(TokenKind::Concat),
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '!' => self.single(TokenKind::SheetSep),
                '=' => self.single(TokenKind::Eq),
                '<' => {
                    self.advance();
                    match self.peek() {
                        Some('=') => {
                            self.advance();
                            self.token_at(TokenKind::Le, "<=", position)
                        }
                        Some('>') => {
                            self.advance();
                            self.token_at(TokenKind::Neq, "<>", position)
                        }
                        _ => self.token_at(TokenKind::Lt, "<", position),
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.token_at(TokenKind::Ge, ">=", position)
                    } else {
                        self.token_at(TokenKind::Gt, ">", position)
                    }
                }
                '"' => self.scan_string()?,
                '\'' => self.scan_quoted_name()?,
                '#' => self.scan_error_literal()?,
                c if c.is_ascii_digit() => self.scan_number(),
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.scan_number()
                }
                c if c.is_ascii_alphabetic() || c == '$' => self.scan_identifier()?,
                other => {
                    return Err(EngineError::parse_at(
                        position,
                        format!("unexpected character '{other}'"),
                    ))
                }
            };
            tokens.push(token);
        }
    }

    // === Scanners ===

    fn scan_string(&mut self) -> EngineResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        let content_start = self.pos;
        loop {
            match self.peek() {
                Some('"') => break,
                Some(_) => self.advance(),
                None => {
                    return Err(EngineError::parse_at(start, "unterminated string literal"))
                }
            }
        }
        let lexeme = self.input[content_start..self.pos].to_string();
        self.advance(); // closing quote

        Ok(Token {
            kind: TokenKind::String,
            lexeme,
            position: start,
        })
    }

    /// Quoted sheet names: `'Budget ''24'!A1`. A doubled quote escapes one.
    fn scan_quoted_name(&mut self) -> EngineResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    if self.peek_at(1) == Some('\'') {
                        name.push('\'');
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        break;
                    }
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => {
                    return Err(EngineError::parse_at(start, "unterminated sheet name"))
                }
            }
        }

        Ok(Token {
            kind: TokenKind::CellRef,
            lexeme: name,
            position: start,
        })
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        // A fraction part needs at least one digit; a bare trailing '.' is
        // left for the next scan round to reject. This also covers the
        // leading-dot form `.5`.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        Token {
            kind: TokenKind::Number,
            lexeme: self.input[start..self.pos].to_string(),
            position: start,
        }
    }

    fn scan_identifier(&mut self) -> EngineResult<Token> {
        let start = self.pos;

        let dollar_prefix = self.peek() == Some('$');
        if dollar_prefix {
            self.advance();
        }
        let letters_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.advance();
        }
        if self.pos == letters_start {
            return Err(EngineError::parse_at(
                start,
                "expected column letters after '$'",
            ));
        }

        // `$` and/or digits after the letters make this a cell reference
        let has_ref_tail = self.peek().is_some_and(|c| c == '$' || c.is_ascii_digit());
        if has_ref_tail || dollar_prefix {
            if self.peek() == Some('$') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            return Ok(Token {
                kind: TokenKind::CellRef,
                lexeme: self.input[start..self.pos].to_string(),
                position: start,
            });
        }

        let lexeme = self.input[start..self.pos].to_string();

        // Letters only: a call site makes it a function, TRUE/FALSE are
        // booleans, anything else stays a reference (named ranges reach the
        // compiler and fail there).
        if self.peek_past_whitespace() == Some('(') {
            return Ok(Token {
                kind: TokenKind::Function,
                lexeme,
                position: start,
            });
        }
        if lexeme.eq_ignore_ascii_case("TRUE") || lexeme.eq_ignore_ascii_case("FALSE") {
            return Ok(Token {
                kind: TokenKind::Boolean,
                lexeme,
                position: start,
            });
        }
        Ok(Token {
            kind: TokenKind::CellRef,
            lexeme,
            position: start,
        })
    }

    fn scan_error_literal(&mut self) -> EngineResult<Token> {
        let start = self.pos;
        self.advance(); // '#'
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '/' || c == '?')
        {
            self.advance();
        }
        if self.peek() == Some('!') {
            self.advance();
        }

        let lexeme = self.input[start..self.pos].to_string();
        if ErrorCode::parse(&lexeme).is_none() {
            return Err(EngineError::parse_at(
                start,
                format!("unknown error literal '{lexeme}'"),
            ));
        }
        Ok(Token {
            kind: TokenKind::Error,
            lexeme,
            position: start,
        })
    }

    // === Helpers ===

    fn single(&mut self, kind: TokenKind) -> Token {
        let position = self.pos;
        let start = self.pos;
        self.advance();
        Token {
            kind,
            lexeme: self.input[start..self.pos].to_string(),
            position,
        }
    }

    fn token_at(&self, kind: TokenKind, lexeme: &str, position: usize) -> Token {
        Token {
            kind,
            lexeme: lexeme.to_string(),
            position,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn peek_past_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }
}
