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

//! Core diagnostic types

use crate::ast::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity levels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Information - does not affect the outcome
    #[default]
    Information,
    /// Warning - suspicious but type-correct
    Warning,
    /// Error - the expression is not well typed
    Error,
}

impl Severity {
    /// Lower-case name as used in OperationOutcome
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Invocation errors
    /// Function name is not known
    UnknownFunction,
    /// Wrong number of arguments
    InvalidArity,
    /// Argument types do not fit the signature
    InvalidArgumentTypes,
    /// Function cannot be applied to its input
    InvalidInputType,

    // Navigation
    /// No candidate type declares the member
    UndefinedMember,
    /// Only some candidate types declare the member
    PartialMember,
    /// Variable was never defined
    UndefinedVariable,

    // Operators
    /// Operand types are not valid for the operator
    InvalidOperandTypes,
    /// A singleton was required but a collection was supplied
    SingletonRequired,

    // Types
    /// Type specifier names no known type
    InvalidTypeSpecifier,
    /// Type filter can never match
    ImpossibleTypeFilter,
    /// Result type cannot be determined statically
    UntypedResult,

    // Literal arguments
    /// Regular expression does not compile
    InvalidRegex,
    /// Extension URL is not a valid absolute URL
    InvalidExtensionUrl,
    /// Extension URL does not name a known extension
    UnresolvedExtension,

    /// Custom code
    Custom(String),
}

impl DiagnosticCode {
    /// Stable short code
    pub fn code_string(&self) -> String {
        let code = match self {
            DiagnosticCode::UnknownFunction => "E100",
            DiagnosticCode::InvalidArity => "E101",
            DiagnosticCode::InvalidArgumentTypes => "E102",
            DiagnosticCode::InvalidInputType => "E103",
            DiagnosticCode::UndefinedMember => "E200",
            DiagnosticCode::PartialMember => "W201",
            DiagnosticCode::UndefinedVariable => "E210",
            DiagnosticCode::InvalidOperandTypes => "E300",
            DiagnosticCode::SingletonRequired => "E301",
            DiagnosticCode::InvalidTypeSpecifier => "E400",
            DiagnosticCode::ImpossibleTypeFilter => "W401",
            DiagnosticCode::UntypedResult => "I402",
            DiagnosticCode::InvalidRegex => "E500",
            DiagnosticCode::InvalidExtensionUrl => "E600",
            DiagnosticCode::UnresolvedExtension => "W601",
            DiagnosticCode::Custom(code) => return code.clone(),
        };
        code.to_string()
    }

    /// FHIR `IssueType` code for OperationOutcome rendering
    pub fn issue_type(&self) -> &'static str {
        match self {
            DiagnosticCode::UnknownFunction
            | DiagnosticCode::UndefinedMember
            | DiagnosticCode::PartialMember
            | DiagnosticCode::UndefinedVariable
            | DiagnosticCode::UnresolvedExtension => "not-found",
            DiagnosticCode::UntypedResult => "informational",
            DiagnosticCode::InvalidRegex | DiagnosticCode::InvalidExtensionUrl => "value",
            DiagnosticCode::Custom(_) => "processing",
            _ => "invalid",
        }
    }

    fn help(&self) -> Option<&'static str> {
        match self {
            DiagnosticCode::UnknownFunction => {
                Some("Check function name spelling and available functions")
            }
            DiagnosticCode::InvalidArity => {
                Some("Check function documentation for correct number of arguments")
            }
            DiagnosticCode::UndefinedVariable => {
                Some("Define the variable or check variable name spelling")
            }
            DiagnosticCode::PartialMember => {
                Some("Narrow the input with ofType() before navigating")
            }
            DiagnosticCode::SingletonRequired => {
                Some("Reduce the operand with first(), single() or an indexer")
            }
            _ => None,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code_string())
    }
}

/// A diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity of the diagnostic
    pub severity: Severity,
    /// Error code
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Byte range of the offending node
    pub span: Option<Span>,
    /// Source text of the offending node
    pub source: Option<String>,
    /// Simple contextual help message
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        let help = code.help().map(str::to_string);
        Self {
            severity,
            code,
            message: message.into(),
            span: None,
            source: None,
            help,
        }
    }

    /// Error diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Warning diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Information diagnostic
    pub fn information(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Information, code, message)
    }

    /// Attach the location and text of the offending node
    pub fn at(mut self, span: Span, source: impl Into<String>) -> Self {
        self.span = Some(span);
        self.source = Some(source.into());
        self
    }

    /// Replace the help message
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Stable short code
    pub fn code_string(&self) -> String {
        self.code.code_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(span) = self.span {
            write!(f, " at {span}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings_are_stable() {
        assert_eq!(DiagnosticCode::UndefinedMember.code_string(), "E200");
        assert_eq!(DiagnosticCode::PartialMember.code_string(), "W201");
        assert_eq!(DiagnosticCode::Custom("X1".into()).code_string(), "X1");
    }

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic::error(DiagnosticCode::UndefinedMember, "no member 'foo'")
            .at(Span::new(5, 8), "foo");
        assert_eq!(diagnostic.to_string(), "error[E200]: no member 'foo' at 5..8");
        assert_eq!(diagnostic.source.as_deref(), Some("foo"));
    }

    #[test]
    fn test_help_is_generated() {
        let diagnostic = Diagnostic::error(DiagnosticCode::UnknownFunction, "unknown function");
        assert!(diagnostic.help.is_some());
        assert!(Diagnostic::error(DiagnosticCode::InvalidRegex, "bad").help.is_none());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Information);
    }
}
