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

//! Loading definitions from disk and checking against them

use octofhir_fhirpath_validator::analyzer::check;
use octofhir_fhirpath_validator::conformance::{
    Harness, HarnessConfig, KnownTestFailures, TestOutcome, extract_invariants,
};
use octofhir_fhirpath_validator::model::{
    DirectorySource, MemberLookup, ModelResolver, ResolverConfig, SystemType, TypeRef, TypeSet,
    TypeSource, open_local_source,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;

fn basic_definition() -> Value {
    json!({
        "resourceType": "StructureDefinition",
        "url": "http://example.org/fhir/StructureDefinition/Basic",
        "name": "Basic",
        "type": "Basic",
        "kind": "resource",
        "abstract": false,
        "derivation": "specialization",
        "baseDefinition": "http://hl7.org/fhir/StructureDefinition/DomainResource",
        "snapshot": { "element": [
            { "path": "Basic", "min": 0, "max": "*" },
            { "path": "Basic.identifier", "min": 0, "max": "*", "type": [{ "code": "Identifier" }] },
            { "path": "Basic.code", "min": 1, "max": "1", "type": [{ "code": "CodeableConcept" }] },
            { "path": "Basic.created", "min": 0, "max": "1", "type": [{ "code": "date" }] },
            { "path": "Basic.value[x]", "min": 0, "max": "1",
              "type": [{ "code": "string" }, { "code": "integer" }] },
            { "path": "Basic.note", "min": 0, "max": "*", "type": [{ "code": "BackboneElement" }] },
            { "path": "Basic.note.text", "min": 1, "max": "1", "type": [{ "code": "string" }] }
        ]},
        "differential": { "element": [
            { "path": "Basic", "constraint": [
                { "key": "bas-1", "severity": "error", "human": "notes carry text",
                  "expression": "code.exists() and note.all(text.exists())" }
            ]},
            { "path": "Basic.note", "constraint": [
                { "key": "bas-2", "severity": "warning", "human": "dated notes",
                  "expression": "text.exists() or %resource.created.exists()" }
            ]}
        ]}
    })
}

fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

#[test]
fn directory_definitions_extend_builtin_model() {
    let dir = tempfile::tempdir().unwrap();
    write_json(&dir.path().join("StructureDefinition-Basic.json"), &basic_definition());
    write_json(&dir.path().join("notes.json"), &json!({ "resourceType": "Patient" }));
    std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();

    let resolver = ModelResolver::new(open_local_source(&ResolverConfig::directory(dir.path())));

    assert!(resolver.is_subtype("Basic", "Resource"));
    match resolver.children_of(&TypeRef::named("Basic"), "valueString") {
        MemberLookup::Found(types) => {
            assert_eq!(types, TypeSet::singleton(TypeRef::named("string")))
        }
        MemberLookup::Missing => panic!("valueString should resolve"),
    }

    let checked = check(&resolver, "Basic", "note.text.first() = code.text").unwrap();
    assert!(checked.outcome.is_empty(), "{:?}", checked.outcome);
    assert_eq!(checked.result, TypeSet::singleton(SystemType::Boolean));

    let checked = check(&resolver, "Basic.note", "text.length() > 3").unwrap();
    assert!(checked.outcome.is_empty(), "{:?}", checked.outcome);
}

#[test]
fn directory_invariants_run_clean() {
    let dir = tempfile::tempdir().unwrap();
    write_json(&dir.path().join("basic.json"), &basic_definition());

    let corpus: Arc<dyn TypeSource> = Arc::new(DirectorySource::open(dir.path()).unwrap());
    let cases = extract_invariants(&corpus);
    let ids: Vec<String> = cases.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["Basic bas-1", "Basic.note bas-2"]);

    let resolver = ModelResolver::new(open_local_source(&ResolverConfig::directory(dir.path())));
    let harness = Harness::new(
        Arc::new(resolver),
        HarnessConfig::default(),
        KnownTestFailures::new(),
    );
    let report = harness.run_local(&cases).unwrap();
    assert!(
        report.cases.iter().all(|c| c.outcome == TestOutcome::Passed),
        "{:#?}",
        report.cases
    );
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn bundle_of_definitions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles-resources.json");
    write_json(
        &path,
        &json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [ { "fullUrl": "http://example.org/fhir/StructureDefinition/Basic",
                         "resource": basic_definition() } ]
        }),
    );

    let source = open_local_source(&ResolverConfig::bundle(&path));
    assert!(source.resolve("Basic").is_some());
    assert!(source.resolve("http://example.org/fhir/StructureDefinition/Basic").is_some());
    assert!(source.resolve("Basic.note").is_some());
}

#[test]
fn unavailable_store_falls_back_to_builtin() {
    let source = open_local_source(&ResolverConfig::directory("/definitely/not/here"));
    let resolver = ModelResolver::new(source);
    let checked = check(&resolver, "Patient", "name.given.exists()").unwrap();
    assert!(checked.success());
}
