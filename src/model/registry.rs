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

//! Preloading definitions from a FHIR server

use super::error::{ModelError, ModelResult};
use super::source::InMemorySource;
use log::{info, warn};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Fetches StructureDefinitions from a FHIR REST endpoint
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: url::Url,
    client: reqwest::Client,
}

impl RegistryClient {
    /// Create a client for `base_url` (e.g. `https://hapi.fhir.org/baseR4`)
    pub fn new(base_url: &str, timeout: Duration) -> ModelResult<Self> {
        let mut base_url = url::Url::parse(base_url)
            .map_err(|e| ModelError::Registry(format!("invalid registry url {base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    /// Search endpoint for a canonical URL
    pub fn search_url(&self, canonical: &str) -> ModelResult<url::Url> {
        let mut url = self
            .base_url
            .join("StructureDefinition")
            .map_err(|e| ModelError::Registry(e.to_string()))?;
        url.query_pairs_mut().append_pair("url", canonical);
        Ok(url)
    }

    /// Fetch the definitions published under `canonical`
    pub async fn fetch(&self, canonical: &str) -> ModelResult<Value> {
        let url = self.search_url(canonical)?;
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/fhir+json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ModelError::Registry(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Load every canonical into a new in-memory source. Individual failures
    /// are logged and skipped; the call fails only if nothing was loaded.
    pub async fn preload(&self, canonicals: &[String]) -> ModelResult<InMemorySource> {
        let mut source = InMemorySource::new(format!("registry {}", self.base_url));
        for canonical in canonicals {
            match self.fetch(canonical).await {
                Ok(document) => {
                    if let Err(err) = source.load_json(document, Path::new(canonical)) {
                        warn!("Registry returned an unusable document for {canonical}: {err}");
                    }
                }
                Err(err) => warn!("Failed to fetch {canonical}: {err}"),
            }
        }

        if source.is_empty() {
            return Err(ModelError::Registry(format!(
                "no definitions loaded from {}",
                self.base_url
            )));
        }
        info!("Preloaded {} declarations from {}", source.len(), self.base_url);
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url() {
        let client =
            RegistryClient::new("https://example.org/fhir", Duration::from_secs(1)).unwrap();
        let url = client
            .search_url("http://hl7.org/fhir/StructureDefinition/Patient")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.org/fhir/StructureDefinition?url=http%3A%2F%2Fhl7.org%2Ffhir%2FStructureDefinition%2FPatient"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RegistryClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
