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

//! Static type checking of FHIRPath expressions
//!
//! The [`TypeChecker`] walks a parsed expression from a context type and
//! computes the set of candidate types of every node, reporting problems into
//! an [`Outcome`](crate::diagnostics::Outcome). Type-level problems never
//! abort the walk; only parse failures and caller errors such as an empty
//! context name surface as [`CheckError`].

pub mod environment;
pub mod functions;
pub mod operators;
pub mod type_checker;

pub use environment::{Environment, Frame};
pub use functions::{FunctionSignature, InputRule, Parameter, ReturnRule, TypeClass};
pub use type_checker::TypeChecker;

use crate::ast::Expression;
use crate::diagnostics::Outcome;
use crate::model::{ModelError, ModelResolver, TypeSet};
use crate::parser::{ParseError, parse};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Treatment of members found on only some candidate types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberPolicy {
    /// Report a warning and continue with the types that resolved
    #[default]
    Tolerant,
    /// Report an error
    Strict,
}

/// Checker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Partially resolving members
    pub member_policy: MemberPolicy,
    /// Report collections passed where FHIRPath evaluates a single item
    /// (arithmetic, ordering, `is` and singleton-input functions)
    pub strict_cardinality: bool,
}

impl CheckerConfig {
    /// Strict member and cardinality checks
    pub fn strict() -> Self {
        Self {
            member_policy: MemberPolicy::Strict,
            strict_cardinality: true,
        }
    }
}

/// Failures of a whole checking attempt
#[derive(Debug, Error)]
pub enum CheckError {
    /// Expression could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// Invalid context or model access
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result of checking one expression
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Parsed expression
    pub expression: Expression,
    /// Candidate types of the whole expression
    pub result: TypeSet,
    /// Diagnostics in visitation order
    pub outcome: Outcome,
}

impl CheckResult {
    /// No error was reported
    pub fn success(&self) -> bool {
        self.outcome.success()
    }
}

/// Parse `expression` and check it against the type at `context`
pub fn check(
    resolver: &ModelResolver,
    context: &str,
    expression: &str,
) -> Result<CheckResult, CheckError> {
    check_with(resolver, CheckerConfig::default(), context, expression)
}

/// [`check`] with an explicit configuration
pub fn check_with(
    resolver: &ModelResolver,
    config: CheckerConfig,
    context: &str,
    expression: &str,
) -> Result<CheckResult, CheckError> {
    let expression = parse(expression)?;
    let mut checker = TypeChecker::with_config(resolver, config);
    checker.set_context(context)?;
    let result = checker.visit(&expression);
    Ok(CheckResult {
        expression,
        result,
        outcome: checker.into_outcome(),
    })
}
