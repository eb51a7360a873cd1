//! Embedding provider abstraction and implementations.
//!
//! An [`EmbeddingProvider`] turns text into a fixed-width vector and
//! declares its own dimensionality and identity string. Implementations:
//!
//! - **[`OpenAiProvider`]** — OpenAI embeddings API with batching, retry,
//!   and backoff.
//! - **[`OllamaProvider`]** — local Ollama HTTP API.
//! - **[`MockProvider`]** — deterministic hash-seeded unit vectors; always
//!   succeeds, conventionally last in the chain as the guaranteed fallback.
//! - **[`DisabledProvider`]** — always fails; useful for exercising the
//!   fallback chain.
//!
//! The [`EmbeddingService`] owns an ordered provider chain plus an optional
//! [`EmbeddingCache`] and implements fallback, batching, and truncation.

mod cache;
mod mock;
mod ollama;
mod openai;
mod service;

pub use cache::EmbeddingCache;
pub use mock::{DisabledProvider, MockProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use service::EmbeddingService;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::EmbeddingConfig;
use crate::error::Result;

/// Concurrency ceiling for the default per-text batch implementation.
const BATCH_CONCURRENCY: usize = 3;

/// A source of embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn generate_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, returning vectors in input order.
    ///
    /// The default maps [`generate_one`](Self::generate_one) concurrently
    /// with a bounded ceiling; providers with true batch APIs override it.
    /// The futures are built eagerly so none of them borrows past the
    /// buffered stream.
    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let futures: Vec<_> = texts.iter().map(|t| self.generate_one(t)).collect();
        stream::iter(futures)
            .buffered(BATCH_CONCURRENCY)
            .try_collect()
            .await
    }

    /// Vector dimensionality this provider produces.
    fn dimensions(&self) -> usize;

    /// Stable provider+model identity, used as the cache namespace
    /// (e.g. `"openai:text-embedding-3-small"`).
    fn identity(&self) -> String;
}

/// Build the ordered provider chain named by the configuration.
pub fn create_providers(
    config: &EmbeddingConfig,
) -> anyhow::Result<Vec<Box<dyn EmbeddingProvider>>> {
    let mut providers: Vec<Box<dyn EmbeddingProvider>> = Vec::new();
    for name in &config.providers {
        match name.as_str() {
            "openai" => providers.push(Box::new(OpenAiProvider::from_config(config)?)),
            "ollama" => providers.push(Box::new(OllamaProvider::from_config(config)?)),
            "mock" => providers.push(Box::new(MockProvider::new(config.dims))),
            other => anyhow::bail!("Unknown embedding provider: {}", other),
        }
    }
    Ok(providers)
}
