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

//! Parser error types

use thiserror::Error;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parser error type
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    /// Unexpected token
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token
        token: String,
        /// Position in input
        position: usize,
    },

    /// Expected a specific token
    #[error("Expected {expected} at position {position}, found '{found}'")]
    ExpectedToken {
        /// What was expected
        expected: String,
        /// What was found
        found: String,
        /// Position in input
        position: usize,
    },

    /// Unexpected end of input
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What was expected
        expected: String,
    },

    /// Unclosed string or delimited identifier
    #[error("Unclosed {what} starting at position {position}")]
    UnclosedString {
        /// "string literal", "delimited identifier", ...
        what: &'static str,
        /// Position of the opening delimiter
        position: usize,
    },

    /// Unclosed `/* ... */` comment
    #[error("Unclosed comment starting at position {position}")]
    UnclosedComment {
        /// Position of the opening `/*`
        position: usize,
    },

    /// Invalid literal value
    #[error("Invalid {kind} literal '{value}' at position {position}")]
    InvalidLiteral {
        /// Literal kind
        kind: &'static str,
        /// Raw text
        value: String,
        /// Position in input
        position: usize,
    },

    /// Invalid escape sequence
    #[error("Invalid escape sequence '\\{escape}' at position {position}")]
    InvalidEscape {
        /// The character after the backslash
        escape: String,
        /// Position in input
        position: usize,
    },

    /// Empty expression
    #[error("Expression is empty")]
    EmptyExpression,
}

impl ParseError {
    /// Byte offset the error refers to, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::UnexpectedToken { position, .. }
            | Self::ExpectedToken { position, .. }
            | Self::UnclosedString { position, .. }
            | Self::UnclosedComment { position }
            | Self::InvalidLiteral { position, .. }
            | Self::InvalidEscape { position, .. } => Some(*position),
            Self::UnexpectedEof { .. } | Self::EmptyExpression => None,
        }
    }
}
