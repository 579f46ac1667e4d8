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

//! Invariant cases drawn from a definition corpus

use crate::model::{Derivation, TypeDeclaration, TypeSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `"{path} {key}"` pairs whose checks are expected to fail
pub const KNOWN_BAD_INVARIANTS: &[&str] = &[
    "ObservationDefinition obd-0",
    "Bundle bdl-14",
    "CodeSystem csd-3",
    "ObservationDefinition.component obd-1",
    "Bundle bdl-16",
    // Walks into contained resources from the root; should start at `item`
    "Questionnaire que-2",
];

/// Pairs reported as skipped: the membership operator receives a collection
/// where its declared signature expects a single item.
pub const INCONCLUSIVE_INVARIANTS: &[(&str, &str, &str)] = &[
    (
        "DiagnosticReport",
        "dgr-1",
        "'in' operator expects a single item",
    ),
    ("PlanDefinition", "pld-3", "'in' operator expects a single item"),
];

/// One `(path, key, expression)` triple with its expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantCase {
    /// Context path the constraint is declared on
    pub path: String,
    /// Constraint key
    pub key: String,
    /// FHIRPath source text
    pub expression: String,
    /// Human description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub human: String,
    /// Whether checking should succeed
    pub expect_success: bool,
}

impl InvariantCase {
    /// Case whose expectation follows [`KNOWN_BAD_INVARIANTS`]
    pub fn new(
        path: impl Into<String>,
        key: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let key = key.into();
        let expect_success = !is_known_bad(&path, &key);
        Self {
            path,
            key,
            expression: expression.into(),
            human: String::new(),
            expect_success,
        }
    }

    /// Root resource type of the context path
    pub fn resource_type(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }

    /// `path key`
    pub fn id(&self) -> String {
        format!("{} {}", self.path, self.key)
    }

    /// Reason the case cannot be decided, if any
    pub fn inconclusive_reason(&self) -> Option<&'static str> {
        INCONCLUSIVE_INVARIANTS
            .iter()
            .find(|(path, key, _)| *path == self.path && *key == self.key)
            .map(|(_, _, reason)| *reason)
    }
}

/// The pair is on the known-bad allow-list
pub fn is_known_bad(path: &str, key: &str) -> bool {
    KNOWN_BAD_INVARIANTS
        .iter()
        .any(|entry| entry.split_once(' ') == Some((path, key)))
}

fn is_concrete_resource(declaration: &TypeDeclaration) -> bool {
    declaration.is_resource()
        && !declaration.is_abstract
        && declaration.derivation == Derivation::Specialization
}

/// Every constraint with a non-empty expression declared by a concrete
/// resource, ordered by path then declaration order.
pub fn extract_invariants(source: &Arc<dyn TypeSource>) -> Vec<InvariantCase> {
    let mut declarations = source.declarations();
    declarations.retain(|d| is_concrete_resource(d));
    declarations.sort_by(|a, b| a.name.cmp(&b.name));
    declarations.dedup_by(|a, b| a.name == b.name);

    let mut cases = Vec::new();
    for declaration in declarations {
        let mut constraints: Vec<_> = declaration
            .constraints
            .iter()
            .filter(|c| !c.expression.trim().is_empty())
            .collect();
        // Root constraints first, nested paths after; stable within a path
        constraints.sort_by_key(|c| c.path.matches('.').count());
        for constraint in constraints {
            let path = if constraint.path.is_empty() {
                declaration.name.clone()
            } else {
                constraint.path.clone()
            };
            let mut case = InvariantCase::new(path, &constraint.key, &constraint.expression);
            case.human = constraint.human.clone();
            cases.push(case);
        }
    }
    cases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstraintDeclaration, InMemorySource, TypeKind, builtin_model};

    fn constraint(path: &str, key: &str, expression: &str) -> ConstraintDeclaration {
        ConstraintDeclaration {
            key: key.into(),
            severity: "error".into(),
            human: String::new(),
            expression: expression.into(),
            path: path.into(),
        }
    }

    #[test]
    fn test_known_bad_pairs() {
        assert!(is_known_bad("Questionnaire", "que-2"));
        assert!(is_known_bad("ObservationDefinition.component", "obd-1"));
        assert!(!is_known_bad("Questionnaire", "que-1"));
        assert!(!is_known_bad("ObservationDefinition", "obd-1"));
    }

    #[test]
    fn test_expectation_follows_allow_list() {
        assert!(!InvariantCase::new("Bundle", "bdl-14", "true").expect_success);
        assert!(InvariantCase::new("Bundle", "bdl-1", "true").expect_success);
    }

    #[test]
    fn test_inconclusive_pairs() {
        let case = InvariantCase::new("DiagnosticReport", "dgr-1", "x");
        assert!(case.inconclusive_reason().is_some());
        assert!(InvariantCase::new("Patient", "pat-1", "x").inconclusive_reason().is_none());
    }

    #[test]
    fn test_extraction_skips_abstract_profiles_and_blank() {
        let source: Arc<dyn TypeSource> = Arc::new(
            InMemorySource::new("test")
                .with(
                    TypeDeclaration::new("DomainResource", TypeKind::Resource)
                        .into_abstract()
                        .with_constraint(constraint(
                            "DomainResource",
                            "dom-2",
                            "contained.empty()",
                        )),
                )
                .with(
                    TypeDeclaration::new("Basic", TypeKind::Resource)
                        .with_constraint(constraint("Basic.code", "bas-2", "exists()"))
                        .with_constraint(constraint("Basic", "bas-1", "code.exists()"))
                        .with_constraint(constraint("Basic", "bas-3", "  ")),
                )
                .with(
                    TypeDeclaration::new("BasicProfile", TypeKind::Resource)
                        .into_profile()
                        .with_constraint(constraint("Basic", "prf-1", "true")),
                )
                .with(
                    TypeDeclaration::new("Address", TypeKind::ComplexType)
                        .with_constraint(constraint("Address", "add-1", "true")),
                ),
        );

        let ids: Vec<_> = extract_invariants(&source).iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["Basic bas-1", "Basic.code bas-2"]);
    }

    #[test]
    fn test_builtin_corpus() {
        let cases = extract_invariants(&builtin_model());
        let que2 = cases
            .iter()
            .find(|c| c.key == "que-2")
            .expect("que-2 present");
        assert_eq!(que2.path, "Questionnaire");
        assert_eq!(que2.resource_type(), "Questionnaire");
        assert!(!que2.expect_success);
        assert!(cases.iter().filter(|c| c.key != "que-2").all(|c| c.expect_success));
    }
}
