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

//! Operator definitions for FHIRPath expressions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators in FHIRPath expressions
///
/// `is` and `as` are not listed here: their right-hand side is a type
/// specifier, not an expression, see [`TypeOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic operators
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Subtract,
    /// Multiplication (*)
    Multiply,
    /// Division (/)
    Divide,
    /// Modulo (mod)
    Modulo,
    /// Integer division (div)
    IntegerDivide,
    /// String concatenation (&)
    Concatenate,

    // Equality
    /// Equality (=)
    Equal,
    /// Inequality (!=)
    NotEqual,
    /// Equivalence (~)
    Equivalent,
    /// Non-equivalence (!~)
    NotEquivalent,

    // Ordering
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,

    // Logical operators
    /// Logical AND (and)
    And,
    /// Logical OR (or)
    Or,
    /// Logical XOR (xor)
    Xor,
    /// Implication (implies)
    Implies,

    // Collection operators
    /// Collection union (|)
    Union,
    /// Collection membership (in)
    In,
    /// Collection containment (contains)
    Contains,
}

/// Unary prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Arithmetic negation (-)
    Negate,
    /// Positive sign (+)
    Positive,
}

/// Type operators taking a type specifier on the right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeOperator {
    /// Type test (is)
    Is,
    /// Type cast (as)
    As,
}

impl BinaryOperator {
    /// Precedence level of this operator (higher = binds tighter)
    pub fn precedence(self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::IntegerDivide | Self::Modulo => 10,
            Self::Add | Self::Subtract | Self::Concatenate => 9,
            // type operators sit at 8
            Self::Union => 7,
            Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual => 6,
            Self::Equal | Self::NotEqual | Self::Equivalent | Self::NotEquivalent => 5,
            Self::In | Self::Contains => 4,
            Self::And => 3,
            Self::Xor | Self::Or => 2,
            Self::Implies => 1,
        }
    }

    /// Check if this operator is left-associative
    pub fn is_left_associative(self) -> bool {
        !matches!(self, Self::Implies)
    }

    /// Check if this operator is arithmetic
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Subtract
                | Self::Multiply
                | Self::Divide
                | Self::IntegerDivide
                | Self::Modulo
        )
    }

    /// Check if this operator compares for (in)equality or equivalence
    pub fn is_equality(self) -> bool {
        matches!(
            self,
            Self::Equal | Self::NotEqual | Self::Equivalent | Self::NotEquivalent
        )
    }

    /// Check if this operator is an ordering comparison
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::LessThan | Self::LessThanOrEqual | Self::GreaterThan | Self::GreaterThanOrEqual
        )
    }

    /// Check if this operator is logical
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Implies)
    }

    /// Get the symbol representation of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "mod",
            Self::IntegerDivide => "div",
            Self::Concatenate => "&",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Equivalent => "~",
            Self::NotEquivalent => "!~",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Implies => "implies",
            Self::Union => "|",
            Self::In => "in",
            Self::Contains => "contains",
        }
    }

    /// Parse an operator from its source spelling
    pub fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            "+" => Self::Add,
            "-" => Self::Subtract,
            "*" => Self::Multiply,
            "/" => Self::Divide,
            "mod" => Self::Modulo,
            "div" => Self::IntegerDivide,
            "&" => Self::Concatenate,
            "=" => Self::Equal,
            "!=" => Self::NotEqual,
            "~" => Self::Equivalent,
            "!~" => Self::NotEquivalent,
            "<" => Self::LessThan,
            "<=" => Self::LessThanOrEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterThanOrEqual,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "implies" => Self::Implies,
            "|" => Self::Union,
            "in" => Self::In,
            "contains" => Self::Contains,
            _ => return None,
        })
    }
}

impl UnaryOperator {
    /// Get the symbol representation of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Positive => "+",
        }
    }
}

impl TypeOperator {
    /// Precedence shared by `is` and `as`
    pub const PRECEDENCE: u8 = 8;

    /// Get the keyword of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::As => "as",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl fmt::Display for TypeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOperator::Multiply.precedence() > BinaryOperator::Add.precedence());
        assert!(BinaryOperator::Add.precedence() > TypeOperator::PRECEDENCE);
        assert!(TypeOperator::PRECEDENCE > BinaryOperator::Union.precedence());
        assert!(BinaryOperator::Union.precedence() > BinaryOperator::LessThan.precedence());
        assert!(BinaryOperator::LessThan.precedence() > BinaryOperator::Equal.precedence());
        assert!(BinaryOperator::Equal.precedence() > BinaryOperator::In.precedence());
        assert!(BinaryOperator::In.precedence() > BinaryOperator::And.precedence());
        assert!(BinaryOperator::And.precedence() > BinaryOperator::Or.precedence());
        assert!(BinaryOperator::Or.precedence() > BinaryOperator::Implies.precedence());
    }

    #[test]
    fn test_symbol_roundtrip() {
        for op in [
            BinaryOperator::Add,
            BinaryOperator::NotEquivalent,
            BinaryOperator::IntegerDivide,
            BinaryOperator::Contains,
            BinaryOperator::Implies,
        ] {
            assert_eq!(BinaryOperator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(BinaryOperator::from_symbol("is"), None);
    }

    #[test]
    fn test_associativity() {
        assert!(!BinaryOperator::Implies.is_left_associative());
        assert!(BinaryOperator::Or.is_left_associative());
    }
}
