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

//! Running invariant cases and classifying their verdicts

use super::remote::{RemoteEvaluator, RemoteRequest, RemoteResponse};
use super::{HarnessError, HarnessResult, InvariantCase, KnownTestFailures};
use crate::analyzer::{CheckerConfig, check_with};
use crate::ast::echo;
use crate::diagnostics::OperationOutcome;
use crate::model::{ModelResolver, SystemType, TypeSet};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Raw verdict of one case, before the known-failure list is consulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    Inconclusive(String),
}

/// Classified result of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestOutcome {
    Passed,
    Failed,
    KnownFailure,
    Skipped,
    /// An exactly-listed known failure now passes; the list is stale
    Resolved,
}

impl TestOutcome {
    pub fn label(self) -> &'static str {
        match self {
            TestOutcome::Passed => "PASSED",
            TestOutcome::Failed => "FAILED",
            TestOutcome::KnownFailure => "KNOWN FAILURE",
            TestOutcome::Skipped => "SKIPPED",
            TestOutcome::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify `verdict` for `group`/`test` against the known-failure list
pub fn classify(
    verdict: &Verdict,
    known: &KnownTestFailures,
    group: &str,
    test: &str,
) -> TestOutcome {
    match verdict {
        Verdict::Inconclusive(_) => TestOutcome::Skipped,
        Verdict::Pass if known.is_exact(group, test) => TestOutcome::Resolved,
        Verdict::Pass => TestOutcome::Passed,
        Verdict::Fail(_) if known.is_known(group, test) => TestOutcome::KnownFailure,
        Verdict::Fail(_) => TestOutcome::Failed,
    }
}

/// Per-case result document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseReport {
    pub group: String,
    pub key: String,
    pub expression: String,
    pub expect_success: bool,
    pub outcome: TestOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_outcome: Option<OperationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteResponse>,
}

impl CaseReport {
    fn new(case: &InvariantCase) -> Self {
        Self {
            group: case.path.clone(),
            key: case.key.clone(),
            expression: case.expression.clone(),
            expect_success: case.expect_success,
            outcome: TestOutcome::Skipped,
            message: None,
            result_type: None,
            echo: None,
            operation_outcome: None,
            remote: None,
        }
    }

    /// File name of the persisted document
    pub fn file_name(&self) -> String {
        format!("{}-{}.json", sanitize(&self.group), sanitize(&self.key))
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Counts per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub known_failures: usize,
    pub skipped: usize,
    pub resolved: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: TestOutcome) {
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::KnownFailure => self.known_failures += 1,
            TestOutcome::Skipped => self.skipped += 1,
            TestOutcome::Resolved => self.resolved += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.known_failures + self.skipped + self.resolved
    }

    /// 0 when nothing unexpected happened, 1 on failures or stale entries
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 || self.resolved > 0 { 1 } else { 0 }
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub cases: Vec<CaseReport>,
    pub summary: RunSummary,
}

impl RunReport {
    fn from_cases(cases: Vec<CaseReport>) -> Self {
        let mut summary = RunSummary::default();
        for case in &cases {
            summary.record(case.outcome);
        }
        Self { cases, summary }
    }

    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code()
    }

    /// Cases with the given outcome
    pub fn with_outcome(&self, outcome: TestOutcome) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(move |c| c.outcome == outcome)
    }
}

/// Harness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Explicit known-failure file; discovered when absent
    pub known_failures: Option<PathBuf>,
    /// Directory receiving one JSON document per case
    pub results_dir: Option<PathBuf>,
    pub checker: CheckerConfig,
    /// Warnings count as failure
    pub require_zero_warnings: bool,
    /// Concurrent remote requests
    pub concurrency: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            known_failures: None,
            results_dir: None,
            checker: CheckerConfig::default(),
            require_zero_warnings: true,
            concurrency: 8,
            timeout_secs: 30,
        }
    }
}

/// Drives cases through the checker or a remote evaluator
pub struct Harness {
    resolver: Arc<ModelResolver>,
    config: HarnessConfig,
    known: KnownTestFailures,
}

impl Harness {
    pub fn new(
        resolver: Arc<ModelResolver>,
        config: HarnessConfig,
        known: KnownTestFailures,
    ) -> Self {
        Self {
            resolver,
            config,
            known,
        }
    }

    /// Load the known-failure list named by `config`, or discover one
    /// relative to the working directory.
    pub fn with_discovered_failures(resolver: Arc<ModelResolver>, config: HarnessConfig) -> Self {
        let known = match &config.known_failures {
            Some(path) => KnownTestFailures::load_or_empty(path),
            None => {
                let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                KnownTestFailures::discover(&base)
            }
        };
        Self::new(resolver, config, known)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn known_failures(&self) -> &KnownTestFailures {
        &self.known
    }

    fn reduces_to_boolean(&self, types: &TypeSet) -> bool {
        !types.is_empty()
            && types
                .types()
                .all(|t| self.resolver.system_type(t) == Some(SystemType::Boolean))
    }

    /// Check one case locally and classify it
    pub fn check_case(&self, case: &InvariantCase) -> CaseReport {
        let mut report = CaseReport::new(case);
        let verdict = self.local_verdict(case, &mut report);
        report.outcome = classify(&verdict, &self.known, &case.path, &case.key);
        if let Verdict::Fail(message) | Verdict::Inconclusive(message) = verdict {
            report.message = Some(message);
        }
        debug!("{} {}: {}", case.path, case.key, report.outcome);
        report
    }

    fn local_verdict(&self, case: &InvariantCase, report: &mut CaseReport) -> Verdict {
        if let Some(reason) = case.inconclusive_reason() {
            return Verdict::Inconclusive(reason.to_string());
        }

        let checked = match check_with(
            &self.resolver,
            self.config.checker,
            &case.path,
            &case.expression,
        ) {
            Ok(checked) => checked,
            Err(err) => return Verdict::Fail(err.to_string()),
        };
        let echoed = echo(&checked.expression);
        report.result_type = Some(checked.result.to_string());
        report.operation_outcome = Some(checked.outcome.to_operation_outcome());
        report.echo = Some(echoed.clone());

        let warnings = checked.outcome.warning_count();
        let success =
            checked.outcome.success() && (!self.config.require_zero_warnings || warnings == 0);
        if success != case.expect_success {
            return Verdict::Fail(format!(
                "expected success = {}, got success = {} with {} error(s) and {warnings} warning(s)",
                case.expect_success,
                checked.outcome.success(),
                checked.outcome.error_count(),
            ));
        }
        if case.expect_success && !self.reduces_to_boolean(&checked.result) {
            return Verdict::Fail(format!(
                "invariants must return a boolean, got {}",
                checked.result
            ));
        }
        if echoed != case.expression {
            return Verdict::Fail(format!("echo differs from source: {echoed:?}"));
        }
        Verdict::Pass
    }

    /// Check every case locally, in order
    pub fn run_local(&self, cases: &[InvariantCase]) -> HarnessResult<RunReport> {
        if cases.is_empty() {
            return Err(HarnessError::EmptyCorpus);
        }
        info!("Checking {} invariants", cases.len());
        let reports: Vec<_> = cases.iter().map(|case| self.check_case(case)).collect();
        self.persist(&reports)?;
        Ok(RunReport::from_cases(reports))
    }

    async fn remote_case(
        &self,
        case: &InvariantCase,
        evaluator: &dyn RemoteEvaluator,
    ) -> CaseReport {
        let mut report = CaseReport::new(case);
        let verdict = match case.inconclusive_reason() {
            Some(reason) => Verdict::Inconclusive(reason.to_string()),
            None => {
                let request = RemoteRequest::for_case(case, evaluator.engine());
                let timeout = Duration::from_secs(self.config.timeout_secs);
                match tokio::time::timeout(timeout, evaluator.evaluate(&request)).await {
                    Err(_) => {
                        Verdict::Fail(format!("timed out after {}s", self.config.timeout_secs))
                    }
                    Ok(Err(err)) => Verdict::Fail(err.to_string()),
                    Ok(Ok(response)) => {
                        let verdict = if response.succeeded() == case.expect_success {
                            Verdict::Pass
                        } else {
                            Verdict::Fail(match &response.error {
                                Some(error) => format!("remote error: {error}"),
                                None => format!("remote result {:?}", response.result),
                            })
                        };
                        report.remote = Some(response);
                        verdict
                    }
                }
            }
        };
        report.outcome = classify(&verdict, &self.known, &case.path, &case.key);
        if let Verdict::Fail(message) | Verdict::Inconclusive(message) = verdict {
            report.message = Some(message);
        }
        report
    }

    /// Send every case to `evaluator`, `concurrency` at a time. Reports keep
    /// the order of `cases`.
    pub async fn run_remote(
        &self,
        cases: &[InvariantCase],
        evaluator: &dyn RemoteEvaluator,
    ) -> HarnessResult<RunReport> {
        if cases.is_empty() {
            return Err(HarnessError::EmptyCorpus);
        }
        info!(
            "Evaluating {} invariants remotely with engine {}",
            cases.len(),
            evaluator.engine()
        );
        let mut indexed: Vec<(usize, CaseReport)> = stream::iter(cases.iter().enumerate())
            .map(|(index, case)| async move { (index, self.remote_case(case, evaluator).await) })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let reports: Vec<_> = indexed.into_iter().map(|(_, report)| report).collect();
        self.persist(&reports)?;
        Ok(RunReport::from_cases(reports))
    }

    fn persist(&self, reports: &[CaseReport]) -> HarnessResult<()> {
        let Some(dir) = &self.config.results_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir).map_err(|source| HarnessError::Io {
            path: dir.clone(),
            source,
        })?;
        for report in reports {
            write_report(dir, report)?;
        }
        Ok(())
    }
}

fn write_report(dir: &Path, report: &CaseReport) -> HarnessResult<()> {
    let path = dir.join(report.file_name());
    let text = serde_json::to_string_pretty(report).map_err(|source| HarnessError::Json {
        path: path.clone(),
        source,
    })?;
    if let Err(source) = std::fs::write(&path, text) {
        warn!("Could not write {}: {source}", path.display());
        return Err(HarnessError::Io { path, source });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::KnownFailure;
    use crate::model::builtin_model;
    use rstest::rstest;

    fn harness(known: KnownTestFailures) -> Harness {
        Harness::new(
            Arc::new(ModelResolver::new(builtin_model())),
            HarnessConfig::default(),
            known,
        )
    }

    #[rstest]
    #[case(Verdict::Pass, "Bundle", "bdl-1", TestOutcome::Resolved)]
    #[case(Verdict::Pass, "Bundle", "bdl-2", TestOutcome::Passed)]
    #[case(Verdict::Pass, "Patient", "pat-1", TestOutcome::Passed)]
    #[case(Verdict::Fail("x".into()), "Bundle", "bdl-2", TestOutcome::KnownFailure)]
    #[case(Verdict::Fail("x".into()), "Bundle", "bdl-1", TestOutcome::KnownFailure)]
    #[case(Verdict::Fail("x".into()), "Patient", "pat-1", TestOutcome::Failed)]
    #[case(Verdict::Inconclusive("x".into()), "Bundle", "bdl-1", TestOutcome::Skipped)]
    fn test_classify(
        #[case] verdict: Verdict,
        #[case] group: &str,
        #[case] test: &str,
        #[case] expected: TestOutcome,
    ) {
        let known = KnownTestFailures::from_entries([
            KnownFailure::new("Bundle", "bdl-1"),
            KnownFailure::new("Bundle", "*"),
        ]);
        assert_eq!(classify(&verdict, &known, group, test), expected);
    }

    #[test]
    fn test_exit_codes() {
        let mut summary = RunSummary::default();
        summary.record(TestOutcome::Passed);
        summary.record(TestOutcome::KnownFailure);
        summary.record(TestOutcome::Skipped);
        assert_eq!(summary.exit_code(), 0);
        summary.record(TestOutcome::Resolved);
        assert_eq!(summary.exit_code(), 1);

        let mut summary = RunSummary::default();
        summary.record(TestOutcome::Failed);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.total(), 1);
    }

    #[test]
    fn test_passing_case() {
        let case = InvariantCase::new("Patient", "pat-1", "name.given.exists()");
        let report = harness(KnownTestFailures::new()).check_case(&case);
        assert_eq!(report.outcome, TestOutcome::Passed);
        assert_eq!(report.echo.as_deref(), Some("name.given.exists()"));
        assert_eq!(report.result_type.as_deref(), Some("System.Boolean"));
    }

    #[test]
    fn test_non_boolean_result_fails() {
        let case = InvariantCase::new("Patient", "pat-x", "name.given");
        let report = harness(KnownTestFailures::new()).check_case(&case);
        assert_eq!(report.outcome, TestOutcome::Failed);
        assert!(report.message.unwrap().contains("boolean"));
    }

    #[test]
    fn test_warnings_fail_by_default() {
        let case = InvariantCase::new("Observation", "obs-x", "value.unit.exists()");
        let strict = harness(KnownTestFailures::new()).check_case(&case);
        assert_eq!(strict.outcome, TestOutcome::Failed);

        let lenient = Harness::new(
            Arc::new(ModelResolver::new(builtin_model())),
            HarnessConfig {
                require_zero_warnings: false,
                ..HarnessConfig::default()
            },
            KnownTestFailures::new(),
        );
        assert_eq!(lenient.check_case(&case).outcome, TestOutcome::Passed);
    }

    #[test]
    fn test_parse_error_fails() {
        let case = InvariantCase::new("Patient", "pat-x", "name.(");
        let report = harness(KnownTestFailures::new()).check_case(&case);
        assert_eq!(report.outcome, TestOutcome::Failed);
    }

    #[test]
    fn test_inconclusive_is_skipped() {
        let case = InvariantCase::new("PlanDefinition", "pld-3", "true");
        let report = harness(KnownTestFailures::new()).check_case(&case);
        assert_eq!(report.outcome, TestOutcome::Skipped);
        assert!(report.operation_outcome.is_none());
    }

    #[test]
    fn test_empty_corpus() {
        assert!(matches!(
            harness(KnownTestFailures::new()).run_local(&[]),
            Err(HarnessError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_file_names_are_sanitized() {
        let mut report = CaseReport::new(&InvariantCase::new("Bundle.entry", "bdl/5", "true"));
        report.outcome = TestOutcome::Passed;
        assert_eq!(report.file_name(), "Bundle.entry-bdl_5.json");
    }
}
