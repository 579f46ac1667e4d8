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

//! Static type checking for FHIRPath expressions
//!
//! Expressions are parsed into a lossless tree, walked against a FHIR type
//! model and the findings collected into an [`Outcome`]. The conformance
//! harness runs the checker over every invariant a definition corpus
//! declares.

pub mod analyzer;
pub mod ast;
pub mod conformance;
pub mod diagnostics;
pub mod model;
pub mod parser;

// Re-export main types
pub use analyzer::{
    CheckError, CheckResult, CheckerConfig, MemberPolicy, TypeChecker, check, check_with,
};
pub use ast::{Expression, echo};
pub use diagnostics::{Diagnostic, DiagnosticCode, Outcome, Severity};
pub use model::{ModelResolver, ResolverConfig, SystemType, TypeRef, TypeSet};
pub use parser::{ParseError, parse};
