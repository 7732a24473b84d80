//! JSON-over-HTTP field generator.
//!
//! Sends `POST {endpoint}` with `{"plant_name", "field", "context"}` and
//! expects `{"content": <any JSON>}` back. An optional API key is sent as a
//! bearer token.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use async_trait::async_trait;
use canopy_common::FieldKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::enrichment::provider::FieldProvider;
use crate::http::{ensure_success, RetryingClient};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    plant_name: &'a str,
    field: FieldKey,
    context: &'a BTreeMap<FieldKey, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    content: serde_json::Value,
}

/// [`FieldProvider`] backed by an HTTP endpoint.
///
/// # Examples
///
/// ```no_run
/// use canopy::enrichment::providers::HttpFieldProvider;
/// use canopy::http::{RetryPolicy, RetryingClient};
///
/// let client = RetryingClient::new(RetryPolicy::default()).unwrap();
/// let provider = HttpFieldProvider::new(client, "https://ai.internal/fill", None);
/// ```
pub struct HttpFieldProvider {
    client: RetryingClient,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpFieldProvider {
    pub fn new(client: RetryingClient, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl FieldProvider for HttpFieldProvider {
    fn name(&self) -> &str {
        "http-ai"
    }

    async fn generate(
        &self,
        plant_name: &str,
        field: FieldKey,
        context: &BTreeMap<FieldKey, serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value> {
        let mut request = self.client.post(&self.endpoint).json(&GenerateRequest {
            plant_name,
            field,
            context,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = self
            .client
            .send(request)
            .await
            .and_then(ensure_success)
            .with_context(|| format!("AI request for field '{field}' failed"))?;

        let body: GenerateResponse = response
            .json()
            .await
            .with_context(|| format!("AI response for field '{field}' is not valid JSON"))?;

        if body.content.is_null() {
            bail!("AI returned no content for field '{field}'");
        }

        debug!(plant = plant_name, field = %field, "AI content received");
        Ok(body.content)
    }
}
