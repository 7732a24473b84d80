//! JSON-over-HTTP name translator.
//!
//! `POST {endpoint}` with `{"text", "target_language"}`, answered by
//! `{"translated": "..."}`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::enrichment::provider::TranslationProvider;
use crate::http::{ensure_success, RetryingClient};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    target_language: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated: String,
}

pub struct HttpTranslationProvider {
    client: RetryingClient,
    endpoint: String,
    api_key: Option<String>,
    target_language: String,
}

impl HttpTranslationProvider {
    pub fn new(
        client: RetryingClient,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            target_language: target_language.into(),
        }
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    async fn translate(&self, text: &str) -> anyhow::Result<String> {
        let mut request = self.client.post(&self.endpoint).json(&TranslateRequest {
            text,
            target_language: &self.target_language,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = self
            .client
            .send(request)
            .await
            .and_then(ensure_success)
            .context("Translation request failed")?;

        let body: TranslateResponse = response
            .json()
            .await
            .context("Translation response is not valid JSON")?;

        let translated = body.translated.trim();
        if translated.is_empty() {
            bail!("Translation of '{text}' is empty");
        }
        Ok(translated.to_string())
    }
}
