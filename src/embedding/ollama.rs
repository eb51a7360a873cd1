//! Ollama embeddings adapter for locally hosted models.
//!
//! Calls `POST /api/embed` on a local Ollama server. The endpoint accepts a
//! batch of inputs natively, so [`generate_batch`] is one request. Network
//! timeouts are enforced here; the core imposes none of its own.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::EmbeddingProvider;

pub struct OllamaProvider {
    base_url: String,
    model: String,
    dims: usize,
    timeout: Duration,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn from_config(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;

        Ok(Self {
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model,
            dims: config.dims,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn provider_error(&self, message: impl Into<String>) -> Error {
        Error::Provider {
            provider: self.identity(),
            message: message.into(),
        }
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.provider_error(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.provider_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(self.provider_error(format!("API error {status}: {body_text}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| self.provider_error(e.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(self.provider_error(format!(
                "invalid response: expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        for vec in &parsed.embeddings {
            if vec.len() != self.dims {
                return Err(self.provider_error(format!(
                    "dimension mismatch: expected {}, got {}",
                    self.dims,
                    vec.len()
                )));
            }
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn generate_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| self.provider_error("empty embedding response"))
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn identity(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
