//! Formula parser
//!
//! A recursive descent parser over the lexer's token stream with the usual
//! spreadsheet precedence ladder (lowest first):
//!
//! 1. Comparison: `=`, `<>`, `<`, `<=`, `>`, `>=`
//! 2. Concatenation: `&`
//! 3. Addition/subtraction: `+`, `-`
//! 4. Multiplication/division: `*`, `/`
//! 5. Exponentiation: `^` (right-associative, unary as its left operand)
//! 6. Unary: prefix `-`/`+`, postfix `%`
//! 7. Primary: literals, references, ranges, calls, parentheses

use crate::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::error::{EngineError, EngineResult};
use crate::lexer::{Lexer, Token, TokenKind};
use gridcalc_core::ErrorCode;

/// Parse a formula string into an AST
///
/// A leading `=` is accepted and skipped; everything after the expression
/// must be consumed.
///
/// # Example
/// ```
/// use gridcalc_formula::parser::parse;
///
/// let ast = parse("=1+2").unwrap();
/// let ast = parse("=SUM(A1:A10)").unwrap();
/// let ast = parse("=IF(A1>0,\"yes\",\"no\")").unwrap();
/// ```
pub fn parse(source: &str) -> EngineResult<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    // === Token access ===

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with End
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> EngineResult<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            let token = self.peek();
            Err(EngineError::parse_at(
                token.position,
                format!("expected {what}, found '{}'", describe(token)),
            ))
        }
    }

    fn expect_end(&mut self) -> EngineResult<()> {
        if self.at(TokenKind::End) {
            Ok(())
        } else {
            let token = self.peek();
            Err(EngineError::parse_at(
                token.position,
                format!("unexpected '{}' after expression", describe(token)),
            ))
        }
    }

    // === Grammar ===

    fn parse_expression(&mut self) -> EngineResult<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Neq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            let right = self.parse_concat()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_additive()?;
        while self.eat(TokenKind::Concat) {
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op: BinaryOp::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> EngineResult<Expr> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Multiply => BinaryOp::Mul,
                TokenKind::Divide => BinaryOp::Div,
                _ => break,
            };
            self.bump();
            let right = self.parse_power()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> EngineResult<Expr> {
        let left = self.parse_unary()?;
        if self.eat(TokenKind::Power) {
            // Right-associative: a^b^c = a^(b^c)
            let right = self.parse_power()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> EngineResult<Expr> {
        if self.eat(TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }
        if self.eat(TokenKind::Plus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Plus,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> EngineResult<Expr> {
        let mut expr = self.parse_primary()?;
        if self.eat(TokenKind::Percent) {
            expr = Expr::Unary {
                op: UnaryOp::Percent,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> EngineResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.bump();
                let value: f64 = token.lexeme.parse().map_err(|_| {
                    EngineError::parse_at(
                        token.position,
                        format!("invalid numeric literal '{}'", token.lexeme),
                    )
                })?;
                Ok(Expr::Literal(Literal::Number(value)))
            }

            TokenKind::String => {
                self.bump();
                Ok(Expr::Literal(Literal::Text(token.lexeme)))
            }

            TokenKind::Boolean => {
                self.bump();
                Ok(Expr::Literal(Literal::Bool(
                    token.lexeme.eq_ignore_ascii_case("TRUE"),
                )))
            }

            TokenKind::Error => {
                self.bump();
                let code = ErrorCode::parse(&token.lexeme).ok_or_else(|| {
                    EngineError::parse_at(
                        token.position,
                        format!("unknown error literal '{}'", token.lexeme),
                    )
                })?;
                Ok(Expr::Literal(Literal::Error(code)))
            }

            TokenKind::Function => {
                self.bump();
                self.parse_call(token.lexeme)
            }

            TokenKind::CellRef => {
                self.bump();
                if self.eat(TokenKind::Colon) {
                    let end = self.expect(TokenKind::CellRef, "a range endpoint")?;
                    return Ok(Expr::Range(token.lexeme, end.lexeme));
                }
                if self.eat(TokenKind::SheetSep) {
                    let cell = self.expect(TokenKind::CellRef, "a cell reference after '!'")?;
                    return Ok(Expr::SheetRef {
                        sheet: token.lexeme,
                        cell: cell.lexeme,
                    });
                }
                Ok(Expr::CellRef(token.lexeme))
            }

            TokenKind::LeftParen => {
                self.bump();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(expr)
            }

            _ => Err(EngineError::parse_at(
                token.position,
                format!("unexpected '{}'", describe(&token)),
            )),
        }
    }

    fn parse_call(&mut self, name: String) -> EngineResult<Expr> {
        self.expect(TokenKind::LeftParen, "'('")?;

        let mut args = Vec::new();
        if !self.at(TokenKind::RightParen) {
            args.push(self.parse_expression()?);
            while self.eat(TokenKind::Comma) {
                args.push(self.parse_expression()?);
            }
        }

        self.expect(TokenKind::RightParen, "')'")?;
        Ok(Expr::Call { name, args })
    }
}

fn describe(token: &Token) -> &str {
    if token.kind == TokenKind::End {
        "end of formula"
    } else {
        &token.lexeme
    }
}
