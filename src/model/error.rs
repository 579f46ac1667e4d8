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

//! Model loading errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while loading or querying the data model
#[derive(Debug, Error)]
pub enum ModelError {
    /// A type name or path was empty
    #[error("Type name must not be empty")]
    EmptyName,

    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON
    #[error("Failed to parse {path}: {source}")]
    Json {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// JSON document is neither a StructureDefinition nor a Bundle of them
    #[error("{0} does not contain structure definitions")]
    NotADefinition(String),

    /// Invalid glob pattern for a directory source
    #[error("Invalid definition pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Remote registry failure
    #[error("Registry request failed: {0}")]
    Registry(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Registry(err.to_string())
    }
}
