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

//! FHIRPath expression parser

pub mod error;
pub mod pratt;
pub mod tokenizer;

pub use error::{ParseError, ParseResult};
pub use pratt::{Precedence, PrattParser};
pub use tokenizer::{Token, TokenKind, Tokenizer, tokenize};

use crate::ast::Expression;

/// Parse a FHIRPath expression into a lossless AST
pub fn parse(input: &str) -> ParseResult<Expression> {
    PrattParser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::echo;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_echo_preserves_source() {
        let source = "  name.where( use = 'official' /* pick */ ).given [0]  // first\n";
        let parsed = parse(source).unwrap();
        assert_eq!(echo(&parsed), source);
    }
}
