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

//! Selecting the definition store
//!
//! The store is chosen by a [`ResolverConfig`] value handed to
//! [`open_source`]. Opening never fails: when the configured store cannot
//! be loaded the built-in model is used instead and a warning is logged.

use super::builtin::builtin_model;
use super::error::ModelResult;
use super::registry::RegistryClient;
use super::source::{BundleSource, CachedSource, DirectorySource, MultiSource, TypeSource};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where declarations come from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceConfig {
    /// Built-in minimal model
    #[default]
    BuiltIn,
    /// Every definition file in a directory
    Directory {
        /// Directory path
        path: PathBuf,
    },
    /// A single definitions Bundle
    Bundle {
        /// Bundle file path
        path: PathBuf,
    },
    /// Definitions fetched from a FHIR server at startup
    Registry {
        /// Server base URL
        base_url: String,
        /// Canonical URLs to fetch
        canonicals: Vec<String>,
        /// Per-request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Primary store
    pub source: SourceConfig,
    /// LRU capacity in front of the store; `None` disables caching
    pub cache_capacity: Option<usize>,
    /// Consult the built-in model for names the primary store lacks
    pub fallback_to_builtin: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::BuiltIn,
            cache_capacity: Some(CachedSource::DEFAULT_CAPACITY),
            fallback_to_builtin: true,
        }
    }
}

impl ResolverConfig {
    /// Configuration using only the built-in model
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Configuration loading a directory of definitions
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceConfig::Directory { path: path.into() },
            ..Self::default()
        }
    }

    /// Configuration loading a definitions Bundle
    pub fn bundle(path: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceConfig::Bundle { path: path.into() },
            ..Self::default()
        }
    }
}

fn open_local(source: &SourceConfig) -> ModelResult<Option<Arc<dyn TypeSource>>> {
    Ok(match source {
        SourceConfig::BuiltIn => None,
        SourceConfig::Directory { path } => Some(Arc::new(DirectorySource::open(path)?)),
        SourceConfig::Bundle { path } => Some(Arc::new(BundleSource::open(path)?)),
        SourceConfig::Registry { .. } => None,
    })
}

fn assemble(config: &ResolverConfig, primary: Option<Arc<dyn TypeSource>>) -> Arc<dyn TypeSource> {
    let source: Arc<dyn TypeSource> = match primary {
        None => builtin_model(),
        Some(primary) if config.fallback_to_builtin => {
            Arc::new(MultiSource::new(vec![primary, builtin_model()]))
        }
        Some(primary) => primary,
    };

    let source = match config.cache_capacity {
        Some(capacity) => Arc::new(CachedSource::new(source, capacity)) as Arc<dyn TypeSource>,
        None => source,
    };
    info!("Using {}", source.describe());
    source
}

/// Open the configured store, falling back to the built-in model
pub async fn open_source(config: &ResolverConfig) -> Arc<dyn TypeSource> {
    let primary = match &config.source {
        SourceConfig::Registry {
            base_url,
            canonicals,
            timeout_secs,
        } => {
            let loaded = match RegistryClient::new(base_url, Duration::from_secs(*timeout_secs)) {
                Ok(client) => client.preload(canonicals).await,
                Err(err) => Err(err),
            };
            loaded.map(|s| Some(Arc::new(s) as Arc<dyn TypeSource>))
        }
        local => open_local(local),
    };

    match primary {
        Ok(primary) => assemble(config, primary),
        Err(err) => {
            warn!("Definition store unavailable, using built-in model: {err}");
            assemble(config, None)
        }
    }
}

/// Synchronous variant of [`open_source`] for local stores. A registry
/// configuration falls back to the built-in model.
pub fn open_local_source(config: &ResolverConfig) -> Arc<dyn TypeSource> {
    if matches!(config.source, SourceConfig::Registry { .. }) {
        warn!("Registry sources need an async runtime, using built-in model");
    }
    match open_local(&config.source) {
        Ok(primary) => assemble(config, primary),
        Err(err) => {
            warn!("Definition store unavailable, using built-in model: {err}");
            assemble(config, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_directory_falls_back() {
        let source = open_source(&ResolverConfig::directory("/no/such/definitions")).await;
        assert!(source.resolve("Patient").is_some());
    }

    #[tokio::test]
    async fn test_unreachable_registry_falls_back() {
        let config = ResolverConfig {
            source: SourceConfig::Registry {
                base_url: "not a url".into(),
                canonicals: vec![],
                timeout_secs: 1,
            },
            ..ResolverConfig::default()
        };
        let source = open_source(&config).await;
        assert!(source.resolve("Observation").is_some());
    }

    #[test]
    fn test_config_deserializes() {
        let config: ResolverConfig = serde_json::from_str(
            r#"{ "source": { "kind": "directory", "path": "defs" }, "cache_capacity": null }"#,
        )
        .unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Directory {
                path: PathBuf::from("defs")
            }
        );
        assert_eq!(config.cache_capacity, None);
        assert!(config.fallback_to_builtin);
    }
}
