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

//! End-to-end checks through the public API

use octofhir_fhirpath_validator::analyzer::{CheckerConfig, check, check_with};
use octofhir_fhirpath_validator::diagnostics::{DiagnosticCode, Severity};
use octofhir_fhirpath_validator::model::{
    ModelResolver, SystemType, TypeRef, TypeSet, builtin_model,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

#[fixture]
fn resolver() -> ModelResolver {
    ModelResolver::new(builtin_model())
}

#[rstest]
fn patient_given_names_exist(resolver: ModelResolver) {
    let checked = check(&resolver, "Patient", "name.given.exists()").unwrap();
    assert!(checked.success());
    assert!(checked.outcome.is_empty());
    assert_eq!(checked.result, TypeSet::singleton(SystemType::Boolean));
}

#[rstest]
fn undefined_member_on_primitive(resolver: ModelResolver) {
    let checked = check(&resolver, "Patient", "birthDate.unknownMember").unwrap();
    assert!(!checked.success());
    assert!(checked.result.is_empty());
    assert_eq!(checked.outcome.len(), 1);

    let diagnostic = &checked.outcome.diagnostics()[0];
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.code, DiagnosticCode::UndefinedMember);
    assert!(diagnostic.message.contains("unknownMember"));
}

#[rstest]
fn polymorphic_member_on_some_alternatives(resolver: ModelResolver) {
    let checked = check(&resolver, "Observation", "Observation.value.unit").unwrap();
    assert!(checked.success());
    assert_eq!(checked.outcome.warning_count(), 1);
    assert_eq!(checked.outcome.error_count(), 0);
    assert_eq!(checked.result, TypeSet::singleton(TypeRef::named("string")));

    let warning = &checked.outcome.diagnostics()[0];
    assert_eq!(warning.code, DiagnosticCode::PartialMember);
    assert!(warning.message.contains("defined on 1 of 11"), "{}", warning.message);
}

#[rstest]
fn polymorphic_member_strict(resolver: ModelResolver) {
    let checked = check_with(
        &resolver,
        CheckerConfig::strict(),
        "Observation",
        "Observation.value.unit",
    )
    .unwrap();
    assert!(!checked.success());
    assert_eq!(checked.outcome.error_count(), 1);
}

#[rstest]
#[case("Patient", "name.where(use = 'official').given.first()")]
#[case("Patient", "telecom.where(system = 'phone').value")]
#[case("Patient", "contact.name.family | name.family")]
#[case("Observation", "component.code.coding.where(system = %loinc).code")]
#[case("Bundle", "entry.resource.id")]
#[case("Bundle.entry", "fullUrl.contains('/_history/').not()")]
#[case("Questionnaire", "item.repeat(item).linkId")]
fn clean_expressions(resolver: ModelResolver, #[case] context: &str, #[case] expression: &str) {
    let checked = check(&resolver, context, expression).unwrap();
    assert!(checked.outcome.is_empty(), "{:?}", checked.outcome);
    assert!(!checked.result.is_empty());
}

#[rstest]
#[case("Patient", "name.foo()", DiagnosticCode::UnknownFunction)]
#[case("Patient", "name.where()", DiagnosticCode::InvalidArity)]
#[case("Patient", "name.where(given)", DiagnosticCode::InvalidArgumentTypes)]
#[case("Patient", "%undefined", DiagnosticCode::UndefinedVariable)]
#[case("Patient", "gender + 1", DiagnosticCode::InvalidOperandTypes)]
#[case("Patient", "name.given in 'x'", DiagnosticCode::SingletonRequired)]
#[case("Patient", "name.ofType(NoSuchType)", DiagnosticCode::InvalidTypeSpecifier)]
#[case("Patient", "name.given.matches('[')", DiagnosticCode::InvalidRegex)]
#[case("Patient", "extension('not a url')", DiagnosticCode::InvalidExtensionUrl)]
fn reported_errors(
    resolver: ModelResolver,
    #[case] context: &str,
    #[case] expression: &str,
    #[case] expected: DiagnosticCode,
) {
    let checked = check(&resolver, context, expression).unwrap();
    assert!(!checked.success());
    assert!(
        checked.outcome.iter().any(|d| d.code == expected),
        "{:?}",
        checked.outcome
    );
}

#[rstest]
fn diagnostics_locate_their_node(resolver: ModelResolver) {
    let checked = check(&resolver, "Patient", "name.given.exists() and birthDate.bogus").unwrap();
    let diagnostic = &checked.outcome.diagnostics()[0];
    assert_eq!(diagnostic.source.as_deref(), Some("bogus"));
    let span = diagnostic.span.unwrap();
    assert_eq!(&"name.given.exists() and birthDate.bogus"[span.start..span.end], "bogus");
}

#[rstest]
fn walk_continues_after_errors(resolver: ModelResolver) {
    let checked = check(&resolver, "Patient", "birthDate.a.exists() or gender.b.exists()").unwrap();
    assert_eq!(checked.outcome.error_count(), 2);
    assert_eq!(checked.result, TypeSet::singleton(SystemType::Boolean));
}

#[rstest]
fn operation_outcome_document(resolver: ModelResolver) {
    let checked = check(&resolver, "Patient", "birthDate.unknownMember").unwrap();
    let json = checked.outcome.to_json();
    assert_eq!(json["resourceType"], "OperationOutcome");
    assert_eq!(json["issue"][0]["severity"], "error");
    assert_eq!(json["issue"][0]["code"], "not-found");
}

#[rstest]
fn parse_failures_fail_the_attempt(resolver: ModelResolver) {
    assert!(check(&resolver, "Patient", "name.where(").is_err());
    assert!(check(&resolver, "", "name").is_err());
}
