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

//! Diagnostic log of one checking pass
//!
//! An [`Outcome`] only ever grows. Its success flag and warning count are
//! derived from the diagnostic sequence on demand, and the serialized
//! `OperationOutcome` preserves diagnostic order.

use super::diagnostic::{Diagnostic, Severity};
use serde::Serialize;
use serde_json::Value;

/// Code system used for diagnostic codes in rendered reports
pub const DIAGNOSTIC_CODE_SYSTEM: &str = "urn:octofhir:fhirpath-validator:diagnostic";

/// Ordered diagnostics produced by one checking pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    diagnostics: Vec<Diagnostic>,
}

impl Outcome {
    /// Create an empty outcome
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// All diagnostics in the order they were reported
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Iterate diagnostics
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// No error-severity diagnostic was reported
    pub fn success(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Number of errors
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Number of warnings
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Render as a FHIR OperationOutcome resource
    pub fn to_operation_outcome(&self) -> OperationOutcome {
        let mut issue: Vec<OutcomeIssue> =
            self.diagnostics.iter().map(OutcomeIssue::from).collect();
        // OperationOutcome requires at least one issue
        if issue.is_empty() {
            issue.push(OutcomeIssue {
                severity: Severity::Information.as_str(),
                code: "informational",
                details: None,
                diagnostics: Some("All OK".to_string()),
                expression: Vec::new(),
                location: Vec::new(),
            });
        }
        OperationOutcome {
            resource_type: "OperationOutcome",
            issue,
        }
    }

    /// OperationOutcome as a JSON value
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.to_operation_outcome()).unwrap_or(Value::Null)
    }
}

impl Extend<Diagnostic> for Outcome {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.diagnostics.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Outcome {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}

/// FHIR OperationOutcome resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    /// Always `OperationOutcome`
    pub resource_type: &'static str,
    /// Issues in diagnostic order
    pub issue: Vec<OutcomeIssue>,
}

/// One OperationOutcome issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeIssue {
    /// `error`, `warning` or `information`
    pub severity: &'static str,
    /// FHIR IssueType code
    pub code: &'static str,
    /// Diagnostic code and message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IssueDetails>,
    /// Source text of the offending node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// Offending node source text
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
    /// Byte range as `start..end`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<String>,
}

/// CodeableConcept carrying the diagnostic code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDetails {
    /// Diagnostic code
    pub coding: Vec<IssueCoding>,
    /// Diagnostic message
    pub text: String,
}

/// Coding of a diagnostic code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueCoding {
    /// Code system
    pub system: &'static str,
    /// Code
    pub code: String,
}

impl From<&Diagnostic> for OutcomeIssue {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            severity: diagnostic.severity.as_str(),
            code: diagnostic.code.issue_type(),
            details: Some(IssueDetails {
                coding: vec![IssueCoding {
                    system: DIAGNOSTIC_CODE_SYSTEM,
                    code: diagnostic.code_string(),
                }],
                text: diagnostic.message.clone(),
            }),
            diagnostics: diagnostic.help.clone(),
            expression: diagnostic.source.iter().cloned().collect(),
            location: diagnostic.span.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::diagnostics::DiagnosticCode;
    use serde_json::json;

    #[test]
    fn test_derived_counts() {
        let mut outcome = Outcome::new();
        assert!(outcome.success());
        outcome.push(Diagnostic::warning(DiagnosticCode::PartialMember, "partial"));
        assert!(outcome.success());
        assert_eq!(outcome.warning_count(), 1);
        outcome.push(Diagnostic::error(DiagnosticCode::UndefinedMember, "missing"));
        assert!(!outcome.success());
        assert_eq!(outcome.error_count(), 1);
        assert_eq!(outcome.len(), 2);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut outcome = Outcome::new();
        let diagnostic = Diagnostic::error(DiagnosticCode::UndefinedVariable, "%x");
        outcome.push(diagnostic.clone());
        outcome.push(diagnostic);
        assert_eq!(outcome.error_count(), 2);
    }

    #[test]
    fn test_empty_operation_outcome() {
        let json = Outcome::new().to_json();
        assert_eq!(json["resourceType"], "OperationOutcome");
        assert_eq!(json["issue"][0]["severity"], "information");
        assert_eq!(json["issue"][0]["code"], "informational");
    }

    #[test]
    fn test_operation_outcome_preserves_order() {
        let mut outcome = Outcome::new();
        outcome.push(
            Diagnostic::error(DiagnosticCode::UndefinedMember, "first")
                .at(Span::new(10, 23), "unknownMember"),
        );
        outcome.push(Diagnostic::warning(DiagnosticCode::UnresolvedExtension, "second"));

        let json = outcome.to_json();
        assert_eq!(
            json["issue"][0],
            json!({
                "severity": "error",
                "code": "not-found",
                "details": {
                    "coding": [{ "system": DIAGNOSTIC_CODE_SYSTEM, "code": "E200" }],
                    "text": "first"
                },
                "expression": ["unknownMember"],
                "location": ["10..23"]
            })
        );
        assert_eq!(json["issue"][1]["details"]["text"], "second");
    }
}
