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

//! Harness runs over the built-in corpus

use async_trait::async_trait;
use octofhir_fhirpath_validator::conformance::{
    CaseReport, Harness, HarnessConfig, HarnessResult, InvariantCase, KnownFailure,
    KnownTestFailures, RemoteEvaluator, RemoteRequest, RemoteResponse, TestOutcome,
    extract_invariants,
};
use octofhir_fhirpath_validator::model::{ModelResolver, builtin_model};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn harness_with(known: KnownTestFailures, config: HarnessConfig) -> Harness {
    Harness::new(Arc::new(ModelResolver::new(builtin_model())), config, known)
}

fn builtin_cases() -> Vec<InvariantCase> {
    extract_invariants(&builtin_model())
}

fn outcome_of(report: &[CaseReport], key: &str) -> TestOutcome {
    report
        .iter()
        .find(|c| c.key == key)
        .map(|c| c.outcome)
        .unwrap_or_else(|| panic!("{key} not in report"))
}

#[test]
fn known_bad_listed_exits_zero() {
    let known = KnownTestFailures::from_entries([KnownFailure::new("Questionnaire", "que-2")
        .with_reason("walks into contained resources")]);
    let report = harness_with(known, HarnessConfig::default())
        .run_local(&builtin_cases())
        .unwrap();

    let unexpected: Vec<_> = report
        .with_outcome(TestOutcome::Failed)
        .map(|c| (c.group.clone(), c.key.clone(), c.message.clone()))
        .collect();
    assert!(unexpected.is_empty(), "{unexpected:#?}");
    assert_eq!(outcome_of(&report.cases, "que-2"), TestOutcome::KnownFailure);
    assert_eq!(outcome_of(&report.cases, "dgr-1"), TestOutcome::Skipped);
    assert_eq!(outcome_of(&report.cases, "pld-3"), TestOutcome::Skipped);
    assert_eq!(report.summary.known_failures, 1);
    assert_eq!(report.summary.skipped, 2);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn known_bad_unlisted_exits_one() {
    let report = harness_with(KnownTestFailures::new(), HarnessConfig::default())
        .run_local(&builtin_cases())
        .unwrap();
    assert_eq!(outcome_of(&report.cases, "que-2"), TestOutcome::Failed);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn wildcard_entries_suppress_groups_and_keys() {
    let by_key = KnownTestFailures::from_entries([KnownFailure::new("*", "que-2")]);
    let report = harness_with(by_key, HarnessConfig::default())
        .run_local(&builtin_cases())
        .unwrap();
    assert_eq!(report.exit_code(), 0);

    let by_group = KnownTestFailures::from_entries([KnownFailure::new("Questionnaire", "*")]);
    let report = harness_with(by_group, HarnessConfig::default())
        .run_local(&builtin_cases())
        .unwrap();
    assert_eq!(outcome_of(&report.cases, "que-2"), TestOutcome::KnownFailure);
    // que-1 passes under a wildcard entry without being reported as resolved
    assert_eq!(outcome_of(&report.cases, "que-1"), TestOutcome::Passed);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn stale_exact_entry_is_resolved() {
    let known = KnownTestFailures::from_entries([
        KnownFailure::new("Questionnaire", "que-2"),
        KnownFailure::new("Patient.contact", "pat-1"),
    ]);
    let report = harness_with(known, HarnessConfig::default())
        .run_local(&builtin_cases())
        .unwrap();
    assert_eq!(outcome_of(&report.cases, "pat-1"), TestOutcome::Resolved);
    assert_eq!(report.summary.resolved, 1);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn results_are_persisted_per_case() {
    let dir = tempfile::tempdir().unwrap();
    let config = HarnessConfig {
        results_dir: Some(dir.path().join("results")),
        ..HarnessConfig::default()
    };
    let cases = vec![InvariantCase::new("Patient", "pat-x", "name.exists()")];
    harness_with(KnownTestFailures::new(), config)
        .run_local(&cases)
        .unwrap();

    let text =
        std::fs::read_to_string(dir.path().join("results").join("Patient-pat-x.json")).unwrap();
    let document: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(document["outcome"], "passed");
    assert_eq!(document["resultType"], "System.Boolean");
    assert_eq!(document["operationOutcome"]["resourceType"], "OperationOutcome");
}

/// Answers every request with the same response, optionally after a delay
struct MockEvaluator {
    response: RemoteResponse,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockEvaluator {
    fn answering(response: RemoteResponse) -> Self {
        Self {
            response,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteEvaluator for MockEvaluator {
    async fn evaluate(&self, request: &RemoteRequest) -> HarnessResult<RemoteResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.resource["resourceType"], json!(request.resource_type));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.response.clone())
    }

    fn engine(&self) -> &str {
        "mock"
    }
}

#[tokio::test]
async fn remote_results_use_same_classification() {
    let evaluator = MockEvaluator::answering(RemoteResponse::value(json!([true])));
    let known = KnownTestFailures::from_entries([KnownFailure::new("Questionnaire", "que-2")]);
    let cases = builtin_cases();
    let report = harness_with(known, HarnessConfig::default())
        .run_remote(&cases, &evaluator)
        .await
        .unwrap();

    assert_eq!(report.cases.len(), cases.len());
    assert_eq!(report.cases[0].key, cases[0].key);
    assert_eq!(outcome_of(&report.cases, "que-2"), TestOutcome::KnownFailure);
    assert_eq!(outcome_of(&report.cases, "dgr-1"), TestOutcome::Skipped);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.exit_code(), 0);
    // skipped cases are never sent
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), cases.len() - 2);
}

#[tokio::test]
async fn remote_errors_fail_cases() {
    let evaluator = MockEvaluator::answering(RemoteResponse::failure("unknown function"));
    let cases = vec![InvariantCase::new("Patient", "pat-x", "name.bogus()")];
    let report = harness_with(KnownTestFailures::new(), HarnessConfig::default())
        .run_remote(&cases, &evaluator)
        .await
        .unwrap();
    assert_eq!(report.cases[0].outcome, TestOutcome::Failed);
    assert_eq!(
        report.cases[0].remote.as_ref().and_then(|r| r.error.as_deref()),
        Some("unknown function")
    );
}

#[tokio::test(start_paused = true)]
async fn remote_timeout_is_a_failure() {
    let evaluator = MockEvaluator {
        response: RemoteResponse::value(json!([true])),
        delay: Some(Duration::from_secs(60)),
        calls: AtomicUsize::new(0),
    };
    let config = HarnessConfig {
        timeout_secs: 1,
        ..HarnessConfig::default()
    };
    let cases = vec![InvariantCase::new("Patient", "pat-x", "name.exists()")];
    let report = harness_with(KnownTestFailures::new(), config)
        .run_remote(&cases, &evaluator)
        .await
        .unwrap();
    assert_eq!(report.cases[0].outcome, TestOutcome::Failed);
    assert!(report.cases[0].message.as_deref().unwrap().contains("timed out"));
    assert_eq!(report.exit_code(), 1);
}
