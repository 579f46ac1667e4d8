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

//! Reconstructs expression source text from the tree.
//!
//! Lexemes are written in source order with their leading trivia, so the
//! output is byte-identical to what the parser consumed. Nothing is
//! normalized: quoting style, numeric formatting and comments survive.

use super::expression::*;
use super::lexeme::Lexeme;
use super::visitor::Visitor;

/// Visitor that appends every lexeme of a tree to a buffer
#[derive(Debug, Default)]
pub struct EchoPrinter {
    out: String,
}

impl EchoPrinter {
    /// Create an empty printer
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the printer, returning the text written so far
    pub fn finish(self) -> String {
        self.out
    }

    fn lexeme(&mut self, lexeme: &Lexeme) {
        lexeme.write_to(&mut self.out);
    }

    fn call(&mut self, node: &FunctionCallNode) {
        self.visit_identifier(&node.name);
        self.lexeme(&node.open);
        for (i, arg) in node.arguments.iter().enumerate() {
            if i > 0 {
                if let Some(comma) = node.commas.get(i - 1) {
                    self.lexeme(comma);
                }
            }
            self.visit_expression(arg);
        }
        self.lexeme(&node.close);
    }
}

impl Visitor for EchoPrinter {
    type Result = ();

    fn visit_literal(&mut self, node: &LiteralNode) {
        for lexeme in &node.lexemes {
            self.lexeme(lexeme);
        }
    }

    fn visit_identifier(&mut self, node: &IdentifierNode) {
        self.lexeme(&node.token);
    }

    fn visit_variable(&mut self, node: &VariableNode) {
        self.lexeme(&node.token);
    }

    fn visit_member_access(&mut self, node: &MemberAccessNode) {
        self.visit_expression(&node.object);
        self.lexeme(&node.dot);
        self.visit_identifier(&node.member);
    }

    fn visit_function_call(&mut self, node: &FunctionCallNode) {
        self.call(node);
    }

    fn visit_method_call(&mut self, node: &MethodCallNode) {
        self.visit_expression(&node.object);
        self.lexeme(&node.dot);
        self.call(&node.call);
    }

    fn visit_index(&mut self, node: &IndexNode) {
        self.visit_expression(&node.object);
        self.lexeme(&node.open);
        self.visit_expression(&node.index);
        self.lexeme(&node.close);
    }

    fn visit_unary_operation(&mut self, node: &UnaryOperationNode) {
        self.lexeme(&node.token);
        self.visit_expression(&node.operand);
    }

    fn visit_binary_operation(&mut self, node: &BinaryOperationNode) {
        self.visit_expression(&node.left);
        self.lexeme(&node.token);
        self.visit_expression(&node.right);
    }

    fn visit_type_operation(&mut self, node: &TypeOperationNode) {
        self.visit_expression(&node.operand);
        self.lexeme(&node.token);
        for (i, part) in node.type_specifier.parts.iter().enumerate() {
            if i > 0 {
                if let Some(dot) = node.type_specifier.dots.get(i - 1) {
                    self.lexeme(dot);
                }
            }
            self.visit_identifier(part);
        }
    }

    fn visit_parenthesized(&mut self, node: &ParenthesizedNode) {
        self.lexeme(&node.open);
        self.visit_expression(&node.inner);
        self.lexeme(&node.close);
    }
}

/// Echo a whole parsed expression, trailing trivia included
pub fn echo(expression: &Expression) -> String {
    let mut printer = EchoPrinter::new();
    printer.visit_expression(&expression.root);
    let mut out = printer.finish();
    out.push_str(&expression.trailing);
    out
}

/// Source text of a single node without its leading trivia
pub fn node_source(node: &ExpressionNode) -> String {
    let mut printer = EchoPrinter::new();
    printer.visit_expression(node);
    let out = printer.finish();
    out.trim_start().to_string()
}
