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

//! Operator typing rules over system types

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::model::SystemType;

/// How the checker treats an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    /// `+ - * / div mod`
    Arithmetic,
    /// `&`
    Concatenate,
    /// `= != ~ !~`
    Equality,
    /// `< <= > >=`
    Ordering,
    /// `and or xor implies`
    Logical,
    /// `|`
    Union,
    /// `in`
    Membership,
    /// `contains`
    Containership,
}

/// Classify a binary operator
pub fn classify(op: BinaryOperator) -> OperatorClass {
    match op {
        BinaryOperator::Concatenate => OperatorClass::Concatenate,
        BinaryOperator::Union => OperatorClass::Union,
        BinaryOperator::In => OperatorClass::Membership,
        BinaryOperator::Contains => OperatorClass::Containership,
        op if op.is_arithmetic() => OperatorClass::Arithmetic,
        op if op.is_equality() => OperatorClass::Equality,
        op if op.is_ordering() => OperatorClass::Ordering,
        _ => OperatorClass::Logical,
    }
}

fn numeric_join(left: SystemType, right: SystemType) -> Option<SystemType> {
    use SystemType::*;
    match (left, right) {
        (Integer, Integer) => Some(Integer),
        (Integer | Long, Integer | Long) => Some(Long),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(Decimal),
        _ => None,
    }
}

/// Result type of an arithmetic operator, `None` when not applicable
pub fn arithmetic_result(
    op: BinaryOperator,
    left: SystemType,
    right: SystemType,
) -> Option<SystemType> {
    use SystemType::*;
    match op {
        BinaryOperator::Add => match (left, right) {
            (String, String) => Some(String),
            (Quantity, Quantity) => Some(Quantity),
            (t, Quantity) if t.is_temporal() => Some(t),
            _ => numeric_join(left, right),
        },
        BinaryOperator::Subtract => match (left, right) {
            (Quantity, Quantity) => Some(Quantity),
            (t, Quantity) if t.is_temporal() => Some(t),
            _ => numeric_join(left, right),
        },
        BinaryOperator::Multiply => match (left, right) {
            (Quantity, Quantity) => Some(Quantity),
            (Quantity, n) | (n, Quantity) if n.is_numeric() => Some(Quantity),
            _ => numeric_join(left, right),
        },
        BinaryOperator::Divide => match (left, right) {
            (Quantity, Quantity) => Some(Quantity),
            (Quantity, n) if n.is_numeric() => Some(Quantity),
            _ => numeric_join(left, right).map(|_| Decimal),
        },
        BinaryOperator::IntegerDivide => match numeric_join(left, right)? {
            Long => Some(Long),
            _ => Some(Integer),
        },
        BinaryOperator::Modulo => numeric_join(left, right),
        _ => None,
    }
}

/// Result type of a prefix operator, `None` when not applicable
pub fn unary_result(_op: UnaryOperator, operand: SystemType) -> Option<SystemType> {
    (operand.is_numeric() || operand == SystemType::Quantity).then_some(operand)
}

/// Whether `left` and `right` may be ordered against each other
pub fn ordering_applies(left: SystemType, right: SystemType) -> bool {
    left.is_comparable_with(right)
        || (left == SystemType::Quantity && right == SystemType::Quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use SystemType::*;

    #[rstest]
    #[case(BinaryOperator::Add, Integer, Integer, Some(Integer))]
    #[case(BinaryOperator::Add, Integer, Decimal, Some(Decimal))]
    #[case(BinaryOperator::Add, Integer, Long, Some(Long))]
    #[case(BinaryOperator::Add, String, String, Some(String))]
    #[case(BinaryOperator::Add, Date, Quantity, Some(Date))]
    #[case(BinaryOperator::Add, Boolean, Integer, None)]
    #[case(BinaryOperator::Subtract, String, String, None)]
    #[case(BinaryOperator::Multiply, Integer, Quantity, Some(Quantity))]
    #[case(BinaryOperator::Divide, Integer, Integer, Some(Decimal))]
    #[case(BinaryOperator::IntegerDivide, Decimal, Decimal, Some(Integer))]
    #[case(BinaryOperator::Modulo, Integer, Integer, Some(Integer))]
    fn test_arithmetic_result(
        #[case] op: BinaryOperator,
        #[case] left: SystemType,
        #[case] right: SystemType,
        #[case] expected: Option<SystemType>,
    ) {
        assert_eq!(arithmetic_result(op, left, right), expected);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(BinaryOperator::Concatenate), OperatorClass::Concatenate);
        assert_eq!(classify(BinaryOperator::Equivalent), OperatorClass::Equality);
        assert_eq!(classify(BinaryOperator::LessThan), OperatorClass::Ordering);
        assert_eq!(classify(BinaryOperator::Implies), OperatorClass::Logical);
        assert_eq!(classify(BinaryOperator::In), OperatorClass::Membership);
        assert_eq!(classify(BinaryOperator::Modulo), OperatorClass::Arithmetic);
    }

    #[test]
    fn test_ordering() {
        assert!(ordering_applies(Date, DateTime));
        assert!(ordering_applies(Quantity, Quantity));
        assert!(!ordering_applies(Boolean, Boolean));
        assert!(!ordering_applies(String, Integer));
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary_result(UnaryOperator::Negate, Decimal), Some(Decimal));
        assert_eq!(unary_result(UnaryOperator::Negate, String), None);
    }
}
