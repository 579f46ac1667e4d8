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

//! Remote evaluator protocol
//!
//! The remote mode hands each invariant to an external FHIRPath engine and
//! feeds its boolean answer into the same classification as local checks.

use super::{HarnessError, HarnessResult, InvariantCase};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

/// Engine identifier sent when none is configured
pub const DEFAULT_ENGINE: &str = "octofhir-fhirpath-validator";

/// Evaluation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
    /// FHIRPath source text
    pub expression: String,
    /// Context path within the resource
    pub context: String,
    /// Resource type of the instance
    pub resource_type: String,
    /// Instance to evaluate against
    pub resource: Value,
    /// Requesting engine
    pub engine: String,
}

impl RemoteRequest {
    /// Request for `case` against a bare instance of its resource type
    pub fn for_case(case: &InvariantCase, engine: &str) -> Self {
        Self::with_instance(case, engine, json!({ "resourceType": case.resource_type() }))
    }

    /// Request for `case` against `resource`
    pub fn with_instance(case: &InvariantCase, engine: &str, resource: Value) -> Self {
        Self {
            expression: case.expression.clone(),
            context: case.path.clone(),
            resource_type: case.resource_type().to_string(),
            resource,
            engine: engine.to_string(),
        }
    }
}

/// Evaluation response: a result collection or an error message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteResponse {
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl RemoteResponse {
    /// Successful response
    pub fn value(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// Failed response
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }

    /// The result as a single boolean. `[true]` and `true` both qualify.
    pub fn as_boolean(&self) -> Option<bool> {
        match self.result.as_ref()? {
            Value::Bool(b) => Some(*b),
            Value::Array(items) if items.len() == 1 => items[0].as_bool(),
            _ => None,
        }
    }

    /// Evaluation yielded a boolean without error
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.as_boolean().is_some()
    }
}

/// Accept either a `{ "result", "error" }` envelope or a bare result
fn parse_response(body: Value) -> RemoteResponse {
    let is_envelope = body
        .as_object()
        .is_some_and(|o| o.contains_key("result") || o.contains_key("error"));
    if is_envelope {
        serde_json::from_value(body)
            .unwrap_or_else(|e| RemoteResponse::failure(format!("malformed response: {e}")))
    } else {
        RemoteResponse::value(body)
    }
}

/// An external FHIRPath engine
#[async_trait]
pub trait RemoteEvaluator: Send + Sync {
    /// Evaluate one request
    async fn evaluate(&self, request: &RemoteRequest) -> HarnessResult<RemoteResponse>;

    /// Identifier sent with each request
    fn engine(&self) -> &str {
        DEFAULT_ENGINE
    }
}

/// Evaluator posting JSON requests to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpEvaluator {
    endpoint: url::Url,
    engine: String,
    client: reqwest::Client,
}

impl HttpEvaluator {
    pub fn new(endpoint: &str, timeout: Duration) -> HarnessResult<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| HarnessError::Remote(format!("invalid evaluator url {endpoint}: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            engine: DEFAULT_ENGINE.to_string(),
            client,
        })
    }

    /// Override the engine identifier
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteEvaluator for HttpEvaluator {
    async fn evaluate(&self, request: &RemoteRequest) -> HarnessResult<RemoteResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} returned {status}", self.endpoint));
            return Ok(RemoteResponse::failure(message));
        }
        Ok(parse_response(body))
    }

    fn engine(&self) -> &str {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_defaults_to_bare_instance() {
        let case = InvariantCase::new("Bundle.entry", "bdl-5", "resource.exists()");
        let request = RemoteRequest::for_case(&case, "engine-x");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "expression": "resource.exists()",
                "context": "Bundle.entry",
                "resourceType": "Bundle",
                "resource": { "resourceType": "Bundle" },
                "engine": "engine-x"
            })
        );
    }

    #[test]
    fn test_boolean_results() {
        assert_eq!(RemoteResponse::value(json!([true])).as_boolean(), Some(true));
        assert_eq!(RemoteResponse::value(json!(false)).as_boolean(), Some(false));
        assert_eq!(RemoteResponse::value(json!([1])).as_boolean(), None);
        assert_eq!(RemoteResponse::value(json!([true, false])).as_boolean(), None);
        assert!(!RemoteResponse::failure("boom").succeeded());
    }

    #[test]
    fn test_response_deserializes() {
        let response: RemoteResponse =
            serde_json::from_str(r#"{ "result": [true] }"#).unwrap();
        assert!(response.succeeded());
        let response: RemoteResponse =
            serde_json::from_str(r#"{ "error": "unknown function" }"#).unwrap();
        assert_eq!(response.error.as_deref(), Some("unknown function"));
    }

    #[test]
    fn test_bare_result_body() {
        assert_eq!(parse_response(json!([true])).as_boolean(), Some(true));
        assert_eq!(
            parse_response(json!({ "error": "bad" })),
            RemoteResponse::failure("bad")
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(HttpEvaluator::new("::", Duration::from_secs(1)).is_err());
    }
}
