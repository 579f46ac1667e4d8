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

//! Known-failure list (`known-test-failures.json`)

use super::{HarnessError, HarnessResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Matches any group or test name
pub const WILDCARD: &str = "*";

/// Default file name
pub const FILE_NAME: &str = "known-test-failures.json";

/// One suppressed case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownFailure {
    /// Context path, or `*`
    pub group_name: String,
    /// Constraint key, or `*`
    pub test_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
}

impl KnownFailure {
    pub fn new(group_name: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            test_name: test_name.into(),
            reason: None,
            issue_url: None,
        }
    }

    /// Attach a reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Entry matches the pair, wildcards included
    pub fn matches(&self, group: &str, test: &str) -> bool {
        (self.group_name == group || self.group_name == WILDCARD)
            && (self.test_name == test || self.test_name == WILDCARD)
    }

    /// Entry names exactly this pair, without wildcards
    pub fn is_exact(&self, group: &str, test: &str) -> bool {
        self.group_name == group && self.test_name == test
    }
}

/// The whole document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnownTestFailures {
    pub description: Option<String>,
    pub version: Option<String>,
    pub known_failures: Vec<KnownFailure>,
}

impl KnownTestFailures {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries
    pub fn from_entries(entries: impl IntoIterator<Item = KnownFailure>) -> Self {
        Self {
            known_failures: entries.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Read and parse `path`
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| HarnessError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Candidate locations relative to `base`, in lookup order
    pub fn candidate_paths(base: &Path) -> Vec<PathBuf> {
        vec![
            base.join("static").join(FILE_NAME),
            base.join(FILE_NAME),
            base.join("..").join("..").join("static").join(FILE_NAME),
        ]
    }

    /// Load the first list found under `base`. A missing or unreadable file
    /// yields an empty list.
    pub fn discover(base: &Path) -> Self {
        let candidates = Self::candidate_paths(base);
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::load_or_empty(path),
            None => {
                info!("No {FILE_NAME} found, searched:");
                for path in &candidates {
                    info!("  - {}", path.display());
                }
                Self::default()
            }
        }
    }

    /// [`Self::load`], logging a warning and returning an empty list on failure
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(list) => {
                info!(
                    "Loaded {} known test failures from {}",
                    list.len(),
                    path.display()
                );
                list
            }
            Err(err) => {
                warn!("Could not load known test failures: {err}");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.known_failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_failures.is_empty()
    }

    /// Any entry matches
    pub fn is_known(&self, group: &str, test: &str) -> bool {
        self.known_failures.iter().any(|kf| kf.matches(group, test))
    }

    /// An entry names exactly this pair
    pub fn is_exact(&self, group: &str, test: &str) -> bool {
        self.known_failures.iter().any(|kf| kf.is_exact(group, test))
    }

    /// First matching entry
    pub fn find(&self, group: &str, test: &str) -> Option<&KnownFailure> {
        self.known_failures.iter().find(|kf| kf.matches(group, test))
    }
}
