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

use criterion::{Criterion, criterion_group, criterion_main};
use octofhir_fhirpath_validator::analyzer::{TypeChecker, check};
use octofhir_fhirpath_validator::ast::echo;
use octofhir_fhirpath_validator::conformance::{
    Harness, HarnessConfig, KnownTestFailures, extract_invariants,
};
use octofhir_fhirpath_validator::model::{ModelResolver, builtin_model};
use octofhir_fhirpath_validator::parser::parse;
use std::hint::black_box;
use std::sync::Arc;

const EXPRESSIONS: &[(&str, &str)] = &[
    ("Patient", "name.given.exists()"),
    ("Patient", "name.where(use = 'official').given.first()"),
    ("Observation", "Observation.value.unit"),
    ("Questionnaire", "item.repeat(item).linkId.isDistinct()"),
    (
        "Bundle",
        "entry.where(fullUrl.exists()).select(fullUrl & iif(resource.meta.versionId.exists(), resource.meta.versionId, '')).isDistinct()",
    ),
];

fn benchmark_parse_and_echo(c: &mut Criterion) {
    let (_, expression) = EXPRESSIONS[4];
    c.bench_function("parse", |b| b.iter(|| black_box(parse(black_box(expression)))));

    let parsed = parse(expression).unwrap();
    c.bench_function("echo", |b| b.iter(|| black_box(echo(black_box(&parsed)))));
}

fn benchmark_check(c: &mut Criterion) {
    let resolver = ModelResolver::new(builtin_model());
    for (context, expression) in EXPRESSIONS {
        c.bench_function(&format!("check {context}: {expression}"), |b| {
            b.iter(|| black_box(check(&resolver, context, black_box(expression))))
        });
    }
}

fn benchmark_visit_only(c: &mut Criterion) {
    let resolver = ModelResolver::new(builtin_model());
    let parsed = parse(EXPRESSIONS[1].1).unwrap();
    c.bench_function("visit only", |b| {
        b.iter(|| {
            let mut checker = TypeChecker::new(&resolver);
            checker.set_context("Patient").unwrap();
            black_box(checker.visit(black_box(&parsed)))
        })
    });
}

fn benchmark_invariant_corpus(c: &mut Criterion) {
    let source = builtin_model();
    let cases = extract_invariants(&source);
    let harness = Harness::new(
        Arc::new(ModelResolver::new(source)),
        HarnessConfig::default(),
        KnownTestFailures::new(),
    );
    c.bench_function("builtin invariant corpus", |b| {
        b.iter(|| black_box(harness.run_local(black_box(&cases))))
    });
}

criterion_group!(
    benches,
    benchmark_parse_and_echo,
    benchmark_check,
    benchmark_visit_only,
    benchmark_invariant_corpus
);
criterion_main!(benches);
