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

//! Visitor pattern for AST traversal

use super::expression::*;

/// Trait for visiting AST nodes
pub trait Visitor: Sized {
    /// The result type of visiting a node
    type Result;

    /// Visit an expression node
    fn visit_expression(&mut self, expr: &ExpressionNode) -> Self::Result {
        walk_expression(self, expr)
    }

    /// Visit a literal
    fn visit_literal(&mut self, node: &LiteralNode) -> Self::Result;

    /// Visit an identifier at the start of a path
    fn visit_identifier(&mut self, node: &IdentifierNode) -> Self::Result;

    /// Visit a variable reference
    fn visit_variable(&mut self, node: &VariableNode) -> Self::Result;

    /// Visit a member access
    fn visit_member_access(&mut self, node: &MemberAccessNode) -> Self::Result;

    /// Visit a function call without receiver
    fn visit_function_call(&mut self, node: &FunctionCallNode) -> Self::Result;

    /// Visit a method call
    fn visit_method_call(&mut self, node: &MethodCallNode) -> Self::Result;

    /// Visit an indexer
    fn visit_index(&mut self, node: &IndexNode) -> Self::Result;

    /// Visit a prefix operation
    fn visit_unary_operation(&mut self, node: &UnaryOperationNode) -> Self::Result;

    /// Visit an infix operation
    fn visit_binary_operation(&mut self, node: &BinaryOperationNode) -> Self::Result;

    /// Visit `is` / `as`
    fn visit_type_operation(&mut self, node: &TypeOperationNode) -> Self::Result;

    /// Visit a parenthesized expression
    fn visit_parenthesized(&mut self, node: &ParenthesizedNode) -> Self::Result {
        self.visit_expression(&node.inner)
    }
}

/// Default implementation of walking an expression tree
pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &ExpressionNode) -> V::Result {
    match expr {
        ExpressionNode::Literal(node) => visitor.visit_literal(node),
        ExpressionNode::Identifier(node) => visitor.visit_identifier(node),
        ExpressionNode::Variable(node) => visitor.visit_variable(node),
        ExpressionNode::MemberAccess(node) => visitor.visit_member_access(node),
        ExpressionNode::FunctionCall(node) => visitor.visit_function_call(node),
        ExpressionNode::MethodCall(node) => visitor.visit_method_call(node),
        ExpressionNode::Index(node) => visitor.visit_index(node),
        ExpressionNode::UnaryOperation(node) => visitor.visit_unary_operation(node),
        ExpressionNode::BinaryOperation(node) => visitor.visit_binary_operation(node),
        ExpressionNode::TypeOperation(node) => visitor.visit_type_operation(node),
        ExpressionNode::Parenthesized(node) => visitor.visit_parenthesized(node),
    }
}
