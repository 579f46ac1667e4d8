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

//! Expression tree
//!
//! Every node owns the [`Lexeme`]s it was parsed from, so the tree is both a
//! semantic representation and a lossless record of the source text.

use super::lexeme::{Lexeme, Span};
use super::literal::LiteralValue;
use super::operator::{BinaryOperator, TypeOperator, UnaryOperator};
use serde::{Deserialize, Serialize};

/// A parsed expression: the root node and any trivia after the last token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Root node
    pub root: ExpressionNode,
    /// Whitespace and comments after the last token
    pub trailing: String,
}

/// AST node for FHIRPath expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionNode {
    /// Literal value
    Literal(LiteralNode),
    /// Bare identifier at the start of a path
    Identifier(IdentifierNode),
    /// `$this`, `$index`, `$total` or an external constant `%name`
    Variable(VariableNode),
    /// Member navigation `object.member`
    MemberAccess(MemberAccessNode),
    /// Function call without an explicit receiver `name(args)`
    FunctionCall(FunctionCallNode),
    /// Method call `object.name(args)`
    MethodCall(MethodCallNode),
    /// Indexer `object[index]`
    Index(IndexNode),
    /// Prefix operator
    UnaryOperation(UnaryOperationNode),
    /// Infix operator
    BinaryOperation(BinaryOperationNode),
    /// `is` / `as` with a type specifier
    TypeOperation(TypeOperationNode),
    /// Parenthesized sub-expression
    Parenthesized(ParenthesizedNode),
}

/// Literal node; quantities and `{}` are made of two lexemes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralNode {
    /// Decoded value
    pub value: LiteralValue,
    /// Source tokens
    pub lexemes: Vec<Lexeme>,
}

/// Identifier, possibly written with backticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierNode {
    /// Identifier name with delimiters removed
    pub name: String,
    /// Source token
    pub token: Lexeme,
}

/// Kind of variable reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    /// `$this`
    This,
    /// `$index`
    Index,
    /// `$total`
    Total,
    /// `%name`
    External,
}

/// Variable reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableNode {
    /// Kind of variable
    pub kind: VariableKind,
    /// Name without the sigil and delimiters
    pub name: String,
    /// Source token
    pub token: Lexeme,
}

/// Member access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAccessNode {
    /// Receiver
    pub object: Box<ExpressionNode>,
    /// The `.` token
    pub dot: Lexeme,
    /// Member name
    pub member: IdentifierNode,
}

/// Function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallNode {
    /// Function name
    pub name: IdentifierNode,
    /// The `(` token
    pub open: Lexeme,
    /// Arguments in order
    pub arguments: Vec<ExpressionNode>,
    /// Separating `,` tokens, one fewer than arguments
    pub commas: Vec<Lexeme>,
    /// The `)` token
    pub close: Lexeme,
}

/// Method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCallNode {
    /// Receiver
    pub object: Box<ExpressionNode>,
    /// The `.` token
    pub dot: Lexeme,
    /// The invoked function
    pub call: FunctionCallNode,
}

/// Indexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Indexed collection
    pub object: Box<ExpressionNode>,
    /// The `[` token
    pub open: Lexeme,
    /// Index expression
    pub index: Box<ExpressionNode>,
    /// The `]` token
    pub close: Lexeme,
}

/// Prefix operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryOperationNode {
    /// Operator
    pub operator: UnaryOperator,
    /// Operator token
    pub token: Lexeme,
    /// Operand
    pub operand: Box<ExpressionNode>,
}

/// Infix operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOperationNode {
    /// Left operand
    pub left: Box<ExpressionNode>,
    /// Operator
    pub operator: BinaryOperator,
    /// Operator token
    pub token: Lexeme,
    /// Right operand
    pub right: Box<ExpressionNode>,
}

/// Qualified type name such as `FHIR.Patient` or `Quantity`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpecifier {
    /// Name segments
    pub parts: Vec<IdentifierNode>,
    /// Separating `.` tokens
    pub dots: Vec<Lexeme>,
}

impl TypeSpecifier {
    /// Namespace qualifier, if written
    pub fn namespace(&self) -> Option<&str> {
        if self.parts.len() > 1 {
            self.parts.first().map(|p| p.name.as_str())
        } else {
            None
        }
    }

    /// Unqualified type name
    pub fn name(&self) -> &str {
        self.parts.last().map(|p| p.name.as_str()).unwrap_or_default()
    }

    /// Dotted name as written, without trivia or backticks
    pub fn qualified_name(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// `operand is Type` / `operand as Type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeOperationNode {
    /// Tested or cast operand
    pub operand: Box<ExpressionNode>,
    /// Operator
    pub operator: TypeOperator,
    /// Operator keyword token
    pub token: Lexeme,
    /// Target type
    pub type_specifier: TypeSpecifier,
}

/// Parenthesized expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParenthesizedNode {
    /// The `(` token
    pub open: Lexeme,
    /// Inner expression
    pub inner: Box<ExpressionNode>,
    /// The `)` token
    pub close: Lexeme,
}

impl ExpressionNode {
    /// Byte span covered by this node, trivia excluded
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(lit) => match (lit.lexemes.first(), lit.lexemes.last()) {
                (Some(first), Some(last)) => first.span.join(last.span),
                _ => Span::default(),
            },
            Self::Identifier(id) => id.token.span,
            Self::Variable(var) => var.token.span,
            Self::MemberAccess(m) => m.object.span().join(m.member.token.span),
            Self::FunctionCall(f) => f.name.token.span.join(f.close.span),
            Self::MethodCall(m) => m.object.span().join(m.call.close.span),
            Self::Index(i) => i.object.span().join(i.close.span),
            Self::UnaryOperation(u) => u.token.span.join(u.operand.span()),
            Self::BinaryOperation(b) => b.left.span().join(b.right.span()),
            Self::TypeOperation(t) => {
                let end = t
                    .type_specifier
                    .parts
                    .last()
                    .map(|p| p.token.span)
                    .unwrap_or(t.token.span);
                t.operand.span().join(end)
            }
            Self::Parenthesized(p) => p.open.span.join(p.close.span),
        }
    }

    /// Short node kind name used in traces
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Identifier(_) => "identifier",
            Self::Variable(_) => "variable",
            Self::MemberAccess(_) => "member",
            Self::FunctionCall(_) => "function",
            Self::MethodCall(_) => "method",
            Self::Index(_) => "index",
            Self::UnaryOperation(_) => "unary",
            Self::BinaryOperation(_) => "binary",
            Self::TypeOperation(_) => "type-operation",
            Self::Parenthesized(_) => "parenthesized",
        }
    }

    /// Interpret this node as a type specifier (`Quantity`, `FHIR.string`).
    ///
    /// Used for the argument of `ofType()`, `is()` and `as()`.
    pub fn as_type_specifier(&self) -> Option<TypeSpecifier> {
        match self {
            Self::Identifier(id) => Some(TypeSpecifier {
                parts: vec![id.clone()],
                dots: Vec::new(),
            }),
            Self::MemberAccess(m) => {
                let mut spec = m.object.as_type_specifier()?;
                spec.dots.push(m.dot.clone());
                spec.parts.push(m.member.clone());
                Some(spec)
            }
            Self::Parenthesized(p) => p.inner.as_type_specifier(),
            _ => None,
        }
    }

    /// String payload of a string literal node
    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(lit) => lit.value.as_str(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: usize) -> IdentifierNode {
        IdentifierNode {
            name: name.to_string(),
            token: Lexeme::new(name, Span::new(start, start + name.len())),
        }
    }

    #[test]
    fn test_member_access_as_type_specifier() {
        let node = ExpressionNode::MemberAccess(MemberAccessNode {
            object: Box::new(ExpressionNode::Identifier(ident("FHIR", 0))),
            dot: Lexeme::new(".", Span::new(4, 5)),
            member: ident("Patient", 5),
        });

        let spec = node.as_type_specifier().expect("type specifier");
        assert_eq!(spec.namespace(), Some("FHIR"));
        assert_eq!(spec.name(), "Patient");
        assert_eq!(spec.qualified_name(), "FHIR.Patient");
        assert_eq!(node.span(), Span::new(0, 12));
    }
}
