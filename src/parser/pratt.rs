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

//! Pratt parser for FHIRPath expressions

use super::error::{ParseError, ParseResult};
use super::tokenizer::{Token, TokenKind, Tokenizer};
use crate::ast::{
    BinaryOperationNode, BinaryOperator, Expression, ExpressionNode, FunctionCallNode,
    IdentifierNode, IndexNode, LiteralNode, LiteralValue, MemberAccessNode, MethodCallNode,
    ParenthesizedNode, TypeOperationNode, TypeOperator, TypeSpecifier, UnaryOperationNode,
    UnaryOperator, VariableKind, VariableNode,
};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence - implies (right associative)
    Implies = 1,
    /// Logical OR and XOR
    Or = 2,
    /// Logical AND
    And = 3,
    /// Membership operators (in, contains)
    Membership = 4,
    /// Equality operators (=, !=, ~, !~)
    Equality = 5,
    /// Inequality operators (<, >, <=, >=)
    Inequality = 6,
    /// Union operator (|)
    Union = 7,
    /// Type operators (is, as)
    Type = 8,
    /// Additive operators (+, -, &)
    Additive = 9,
    /// Multiplicative operators (*, /, div, mod)
    Multiplicative = 10,
    /// Unary operators (+, -)
    Unary = 11,
    /// Invocation/Indexing (., [])
    Invocation = 12,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Implies => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Membership,
            Precedence::Membership => Precedence::Equality,
            Precedence::Equality => Precedence::Inequality,
            Precedence::Inequality => Precedence::Union,
            Precedence::Union => Precedence::Type,
            Precedence::Type => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Invocation,
            Precedence::Invocation => Precedence::Invocation,
        }
    }

    /// Check if this precedence is right associative
    pub const fn is_right_associative(self) -> bool {
        matches!(self, Precedence::Implies)
    }
}

/// Calendar duration keywords accepted as quantity units
const CALENDAR_UNITS: &[&str] = &[
    "year",
    "years",
    "month",
    "months",
    "week",
    "weeks",
    "day",
    "days",
    "hour",
    "hours",
    "minute",
    "minutes",
    "second",
    "seconds",
    "millisecond",
    "milliseconds",
];

/// Map an infix token to its operator and precedence
fn binary_operator(token: &Token) -> Option<(BinaryOperator, Precedence)> {
    let op = match token.kind {
        TokenKind::Star => BinaryOperator::Multiply,
        TokenKind::Slash => BinaryOperator::Divide,
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Subtract,
        TokenKind::Ampersand => BinaryOperator::Concatenate,
        TokenKind::Pipe => BinaryOperator::Union,
        TokenKind::LessThan => BinaryOperator::LessThan,
        TokenKind::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
        TokenKind::GreaterThan => BinaryOperator::GreaterThan,
        TokenKind::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
        TokenKind::Equal => BinaryOperator::Equal,
        TokenKind::NotEqual => BinaryOperator::NotEqual,
        TokenKind::Equivalent => BinaryOperator::Equivalent,
        TokenKind::NotEquivalent => BinaryOperator::NotEquivalent,
        TokenKind::Identifier => match token.text() {
            "div" | "mod" | "in" | "contains" | "and" | "or" | "xor" | "implies" => {
                BinaryOperator::from_symbol(token.text())?
            }
            _ => return None,
        },
        _ => return None,
    };

    let precedence = match op {
        BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::IntegerDivide
        | BinaryOperator::Modulo => Precedence::Multiplicative,
        BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Concatenate => {
            Precedence::Additive
        }
        BinaryOperator::Union => Precedence::Union,
        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => Precedence::Inequality,
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::Equivalent
        | BinaryOperator::NotEquivalent => Precedence::Equality,
        BinaryOperator::In | BinaryOperator::Contains => Precedence::Membership,
        BinaryOperator::And => Precedence::And,
        BinaryOperator::Or | BinaryOperator::Xor => Precedence::Or,
        BinaryOperator::Implies => Precedence::Implies,
    };
    Some((op, precedence))
}

fn type_operator(token: &Token) -> Option<TypeOperator> {
    if token.is_keyword("is") {
        Some(TypeOperator::Is)
    } else if token.is_keyword("as") {
        Some(TypeOperator::As)
    } else {
        None
    }
}

/// Pratt parser over a pre-tokenized expression
pub struct PrattParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl PrattParser {
    /// Tokenize `input` and prepare a parser
    pub fn new(input: &str) -> ParseResult<Self> {
        let tokens = Tokenizer::new(input).tokenize_all()?;
        Ok(Self { tokens, pos: 0 })
    }

    fn current(&self) -> &Token {
        // the token list always ends with Eof and `pos` never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        if token.kind == TokenKind::Eof {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }
        } else {
            ParseError::ExpectedToken {
                expected: expected.to_string(),
                found: token.text().to_string(),
                position: token.position(),
            }
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.current().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn identifier(token: Token) -> IdentifierNode {
        IdentifierNode {
            name: token.value,
            token: token.lexeme,
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<IdentifierNode> {
        match self.current().kind {
            TokenKind::Identifier | TokenKind::DelimitedIdentifier => {
                Ok(Self::identifier(self.advance()))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn invalid_literal(kind: &'static str, token: &Token) -> ParseError {
        ParseError::InvalidLiteral {
            kind,
            value: token.text().to_string(),
            position: token.position(),
        }
    }

    fn parse_decimal(token: &Token, text: &str) -> ParseResult<Decimal> {
        Decimal::from_str(text).map_err(|_| Self::invalid_literal("decimal", token))
    }

    fn validate_date(token: &Token, text: &str) -> ParseResult<()> {
        let date = text.split('T').next().unwrap_or_default();
        if date.len() == 10 && chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(Self::invalid_literal("date", token));
        }
        Ok(())
    }

    /// Number literal, possibly followed by a unit making it a quantity
    fn parse_number_literal(&mut self) -> ParseResult<ExpressionNode> {
        let token = self.advance();
        let text = token.text().to_string();

        let next = self.current();
        let has_unit = token.kind != TokenKind::Long
            && (next.kind == TokenKind::String
                || (next.kind == TokenKind::Identifier
                    && CALENDAR_UNITS.contains(&next.text())));
        if has_unit {
            let unit_token = self.advance();
            let value = Self::parse_decimal(&token, &text)?;
            return Ok(ExpressionNode::Literal(LiteralNode {
                value: LiteralValue::Quantity {
                    value,
                    unit: unit_token.value,
                },
                lexemes: vec![token.lexeme, unit_token.lexeme],
            }));
        }

        let value = match token.kind {
            TokenKind::Integer => LiteralValue::Integer(
                text.parse::<i64>()
                    .map_err(|_| Self::invalid_literal("integer", &token))?,
            ),
            TokenKind::Long => LiteralValue::Long(
                text.trim_end_matches('L')
                    .parse::<i64>()
                    .map_err(|_| Self::invalid_literal("long", &token))?,
            ),
            _ => LiteralValue::Decimal(Self::parse_decimal(&token, &text)?),
        };
        Ok(ExpressionNode::Literal(LiteralNode {
            value,
            lexemes: vec![token.lexeme],
        }))
    }

    fn parse_function_call(&mut self, name: IdentifierNode) -> ParseResult<FunctionCallNode> {
        let open = self.expect(TokenKind::LeftParen, "'('")?;
        let mut arguments = Vec::new();
        let mut commas = Vec::new();

        if self.current().kind != TokenKind::RightParen {
            loop {
                arguments.push(self.parse_expression()?);
                if self.current().kind == TokenKind::Comma {
                    commas.push(self.advance().lexeme);
                } else {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RightParen, "')' or ','")?;
        Ok(FunctionCallNode {
            name,
            open: open.lexeme,
            arguments,
            commas,
            close: close.lexeme,
        })
    }

    fn parse_primary(&mut self) -> ParseResult<ExpressionNode> {
        let kind = self.current().kind;
        match kind {
            TokenKind::Integer | TokenKind::Long | TokenKind::Decimal => {
                self.parse_number_literal()
            }
            TokenKind::String => {
                let token = self.advance();
                Ok(ExpressionNode::Literal(LiteralNode {
                    value: LiteralValue::String(token.value),
                    lexemes: vec![token.lexeme],
                }))
            }
            TokenKind::Date | TokenKind::DateTime | TokenKind::Time => {
                let token = self.advance();
                let raw = token.text().trim_start_matches('@').to_string();
                let value = match kind {
                    TokenKind::Date => {
                        Self::validate_date(&token, &raw)?;
                        LiteralValue::Date(raw)
                    }
                    TokenKind::DateTime => {
                        Self::validate_date(&token, &raw)?;
                        LiteralValue::DateTime(raw)
                    }
                    _ => LiteralValue::Time(raw.trim_start_matches('T').to_string()),
                };
                Ok(ExpressionNode::Literal(LiteralNode {
                    value,
                    lexemes: vec![token.lexeme],
                }))
            }
            TokenKind::Identifier if matches!(self.current().text(), "true" | "false") => {
                let token = self.advance();
                Ok(ExpressionNode::Literal(LiteralNode {
                    value: LiteralValue::Boolean(token.text() == "true"),
                    lexemes: vec![token.lexeme],
                }))
            }
            TokenKind::Identifier | TokenKind::DelimitedIdentifier => {
                let name = Self::identifier(self.advance());
                if self.current().kind == TokenKind::LeftParen {
                    Ok(ExpressionNode::FunctionCall(self.parse_function_call(name)?))
                } else {
                    Ok(ExpressionNode::Identifier(name))
                }
            }
            TokenKind::DollarThis | TokenKind::DollarIndex | TokenKind::DollarTotal => {
                let token = self.advance();
                let var_kind = match kind {
                    TokenKind::DollarThis => VariableKind::This,
                    TokenKind::DollarIndex => VariableKind::Index,
                    _ => VariableKind::Total,
                };
                Ok(ExpressionNode::Variable(VariableNode {
                    kind: var_kind,
                    name: token.text().trim_start_matches('$').to_string(),
                    token: token.lexeme,
                }))
            }
            TokenKind::External => {
                let token = self.advance();
                Ok(ExpressionNode::Variable(VariableNode {
                    kind: VariableKind::External,
                    name: token.value,
                    token: token.lexeme,
                }))
            }
            TokenKind::LeftParen => {
                let open = self.advance();
                let inner = self.parse_expression()?;
                let close = self.expect(TokenKind::RightParen, "')'")?;
                Ok(ExpressionNode::Parenthesized(ParenthesizedNode {
                    open: open.lexeme,
                    inner: Box::new(inner),
                    close: close.lexeme,
                }))
            }
            TokenKind::LeftBrace => {
                let open = self.advance();
                let close = self.expect(TokenKind::RightBrace, "'}'")?;
                Ok(ExpressionNode::Literal(LiteralNode {
                    value: LiteralValue::Empty,
                    lexemes: vec![open.lexeme, close.lexeme],
                }))
            }
            TokenKind::Plus | TokenKind::Minus => {
                let token = self.advance();
                let operator = if kind == TokenKind::Minus {
                    UnaryOperator::Negate
                } else {
                    UnaryOperator::Positive
                };
                let operand = self.parse_expression_with_precedence(Precedence::Unary)?;
                Ok(ExpressionNode::UnaryOperation(UnaryOperationNode {
                    operator,
                    token: token.lexeme,
                    operand: Box::new(operand),
                }))
            }
            TokenKind::Eof => Err(self.unexpected("expression")),
            _ => {
                let token = self.current();
                Err(ParseError::UnexpectedToken {
                    token: token.text().to_string(),
                    position: token.position(),
                })
            }
        }
    }

    /// Handle `.member`, `.method(...)` and `[index]` chains
    fn parse_postfix(&mut self, mut left: ExpressionNode) -> ParseResult<ExpressionNode> {
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    let dot = self.advance().lexeme;
                    let name = self.expect_identifier()?;
                    left = if self.current().kind == TokenKind::LeftParen {
                        ExpressionNode::MethodCall(MethodCallNode {
                            object: Box::new(left),
                            dot,
                            call: self.parse_function_call(name)?,
                        })
                    } else {
                        ExpressionNode::MemberAccess(MemberAccessNode {
                            object: Box::new(left),
                            dot,
                            member: name,
                        })
                    };
                }
                TokenKind::LeftBracket => {
                    let open = self.advance().lexeme;
                    let index = self.parse_expression()?;
                    let close = self.expect(TokenKind::RightBracket, "']'")?;
                    left = ExpressionNode::Index(IndexNode {
                        object: Box::new(left),
                        open,
                        index: Box::new(index),
                        close: close.lexeme,
                    });
                }
                _ => return Ok(left),
            }
        }
    }

    /// `Name` or `Namespace.Name` after `is` / `as`
    fn parse_type_specifier(&mut self) -> ParseResult<TypeSpecifier> {
        let first = self.expect_identifier()?;
        let mut spec = TypeSpecifier {
            parts: vec![first],
            dots: Vec::new(),
        };
        let qualified = matches!(spec.name(), "FHIR" | "System")
            && self.current().kind == TokenKind::Dot
            && matches!(
                self.peek_kind(1),
                TokenKind::Identifier | TokenKind::DelimitedIdentifier
            );
        if qualified {
            spec.dots.push(self.advance().lexeme);
            spec.parts.push(self.expect_identifier()?);
        }
        Ok(spec)
    }

    fn parse_expression_with_precedence(
        &mut self,
        min_precedence: Precedence,
    ) -> ParseResult<ExpressionNode> {
        let primary = self.parse_primary()?;
        let mut left = self.parse_postfix(primary)?;

        loop {
            if let Some(operator) = type_operator(self.current()) {
                if Precedence::Type < min_precedence {
                    break;
                }
                let token = self.advance().lexeme;
                let type_specifier = self.parse_type_specifier()?;
                left = ExpressionNode::TypeOperation(TypeOperationNode {
                    operand: Box::new(left),
                    operator,
                    token,
                    type_specifier,
                });
                continue;
            }

            let Some((operator, precedence)) = binary_operator(self.current()) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }

            let token = self.advance().lexeme;
            let next_min = if precedence.is_right_associative() {
                precedence
            } else {
                precedence.next_level()
            };
            let right = self.parse_expression_with_precedence(next_min)?;
            left = ExpressionNode::BinaryOperation(BinaryOperationNode {
                left: Box::new(left),
                operator,
                token,
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    /// Parse a full sub-expression at the lowest precedence
    pub fn parse_expression(&mut self) -> ParseResult<ExpressionNode> {
        self.parse_expression_with_precedence(Precedence::Implies)
    }

    /// Parse the whole input, requiring every token to be consumed
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current().kind == TokenKind::Eof {
            return Err(ParseError::EmptyExpression);
        }

        let root = self.parse_expression()?;

        let rest = self.current();
        if rest.kind != TokenKind::Eof {
            return Err(ParseError::UnexpectedToken {
                token: rest.text().to_string(),
                position: rest.position(),
            });
        }

        Ok(Expression {
            root,
            trailing: rest.lexeme.leading.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> ExpressionNode {
        PrattParser::new(input).unwrap().parse().unwrap().root
    }

    fn binary(node: &ExpressionNode) -> &BinaryOperationNode {
        match node {
            ExpressionNode::BinaryOperation(b) => b,
            other => panic!("expected binary operation, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_ordering() {
        let root = parse("a = b and c or d implies e");
        let implies = binary(&root);
        assert_eq!(implies.operator, BinaryOperator::Implies);
        let or = binary(&implies.left);
        assert_eq!(or.operator, BinaryOperator::Or);
        let and = binary(&or.left);
        assert_eq!(and.operator, BinaryOperator::And);
        assert_eq!(binary(&and.left).operator, BinaryOperator::Equal);
    }

    #[test]
    fn test_arithmetic_precedence() {
        let root = parse("1 + 2 * 3");
        let add = binary(&root);
        assert_eq!(add.operator, BinaryOperator::Add);
        assert_eq!(binary(&add.right).operator, BinaryOperator::Multiply);
    }

    #[test]
    fn test_implies_is_right_associative() {
        let root = parse("a implies b implies c");
        let outer = binary(&root);
        assert!(matches!(*outer.left, ExpressionNode::Identifier(_)));
        assert_eq!(binary(&outer.right).operator, BinaryOperator::Implies);
    }

    #[test]
    fn test_membership_below_equality() {
        let root = parse("a = b in c");
        let membership = binary(&root);
        assert_eq!(membership.operator, BinaryOperator::In);
        assert_eq!(binary(&membership.left).operator, BinaryOperator::Equal);
    }

    #[test]
    fn test_keywords_as_members() {
        let root = parse("text.div.contains('x')");
        let ExpressionNode::MethodCall(call) = root else {
            panic!("expected method call");
        };
        assert_eq!(call.call.name.name, "contains");
        let ExpressionNode::MemberAccess(member) = *call.object else {
            panic!("expected member access");
        };
        assert_eq!(member.member.name, "div");
    }

    #[test]
    fn test_type_operators() {
        let root = parse("value is FHIR.Quantity and value as Quantity = x");
        let and = binary(&root);
        let ExpressionNode::TypeOperation(is) = and.left.as_ref() else {
            panic!("expected type operation");
        };
        assert_eq!(is.operator, TypeOperator::Is);
        assert_eq!(is.type_specifier.qualified_name(), "FHIR.Quantity");
        let eq = binary(&and.right);
        assert!(matches!(eq.left.as_ref(), ExpressionNode::TypeOperation(_)));
    }

    #[test]
    fn test_quantity_literals() {
        let ExpressionNode::Literal(lit) = parse("4.5 'mg'") else {
            panic!("expected literal");
        };
        assert_eq!(lit.lexemes.len(), 2);
        assert!(matches!(lit.value, LiteralValue::Quantity { ref unit, .. } if unit == "mg"));

        let ExpressionNode::Literal(lit) = parse("3 days") else {
            panic!("expected literal");
        };
        assert!(matches!(lit.value, LiteralValue::Quantity { ref unit, .. } if unit == "days"));
    }

    #[test]
    fn test_unary_minus_and_index() {
        let root = parse("-name[0].given");
        let ExpressionNode::UnaryOperation(unary) = root else {
            panic!("expected unary operation");
        };
        assert!(matches!(*unary.operand, ExpressionNode::MemberAccess(_)));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            PrattParser::new("   ").unwrap().parse(),
            Err(ParseError::EmptyExpression)
        );
        assert!(matches!(
            PrattParser::new("a b").unwrap().parse(),
            Err(ParseError::UnexpectedToken { position: 2, .. })
        ));
        assert!(matches!(
            PrattParser::new("where(").unwrap().parse(),
            Err(ParseError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            PrattParser::new("@2020-13-45").unwrap().parse(),
            Err(ParseError::InvalidLiteral { kind: "date", .. })
        ));
    }
}
