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

//! Source-preserving tokens stored in the AST

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range into the original expression text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A token exactly as written, together with the whitespace and comments
/// that precede it.
///
/// Concatenating `leading` and `text` of every lexeme of a tree in source
/// order, followed by the expression's trailing trivia, reproduces the input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lexeme {
    /// Whitespace and comments before the token
    pub leading: String,
    /// Raw token text, quotes and escapes included
    pub text: String,
    /// Location of `text` in the source
    pub span: Span,
}

impl Lexeme {
    /// Create a lexeme without leading trivia
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            leading: String::new(),
            text: text.into(),
            span,
        }
    }

    /// Attach leading trivia
    pub fn with_leading(mut self, leading: impl Into<String>) -> Self {
        self.leading = leading.into();
        self
    }

    /// Append trivia and text to `out`
    pub fn write_to(&self, out: &mut String) {
        out.push_str(&self.leading);
        out.push_str(&self.text);
    }
}
