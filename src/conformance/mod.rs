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

//! Conformance harness over schema-declared invariants
//!
//! Every invariant of a concrete resource declaration is checked in the
//! context of the element it is declared on. The verdict is compared with
//! the expected result, then classified against a known-failure list.

pub mod invariants;
pub mod known_failures;
pub mod remote;
pub mod runner;

pub use invariants::{
    INCONCLUSIVE_INVARIANTS, InvariantCase, KNOWN_BAD_INVARIANTS, extract_invariants,
};
pub use known_failures::{KnownFailure, KnownTestFailures};
pub use remote::{HttpEvaluator, RemoteEvaluator, RemoteRequest, RemoteResponse};
pub use runner::{
    CaseReport, Harness, HarnessConfig, RunReport, RunSummary, TestOutcome, Verdict,
};

use std::path::PathBuf;
use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Failures that stop a harness run
#[derive(Debug, Error)]
pub enum HarnessError {
    /// File could not be read or written
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Malformed JSON document
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
    /// The corpus holds nothing to check
    #[error("corpus contains no invariants")]
    EmptyCorpus,
    /// Remote evaluator failure
    #[error("remote evaluator error: {0}")]
    Remote(String),
}

impl From<reqwest::Error> for HarnessError {
    fn from(err: reqwest::Error) -> Self {
        HarnessError::Remote(err.to_string())
    }
}
