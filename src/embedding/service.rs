//! Embedding generation with provider fallback and caching.
//!
//! The service owns an ordered, non-empty provider chain (first =
//! preferred, last conventionally the deterministic mock as a
//! guaranteed-success fallback) and an optional cache. Provider failures
//! are recovered locally by falling back to the next provider; only
//! exhaustion of the whole chain surfaces as an aggregate error.

use std::sync::Mutex;

use crate::chunker::word_spans;
use crate::error::{Error, ProviderAttempt, Result};

use super::{EmbeddingCache, EmbeddingProvider};

/// Approximate tokens-per-word ratio used for the truncation budget.
const TOKENS_PER_WORD: f64 = 1.3;

pub struct EmbeddingService {
    providers: Vec<Box<dyn EmbeddingProvider>>,
    cache: Option<Mutex<EmbeddingCache>>,
    last_provider: Mutex<Option<String>>,
    max_tokens: usize,
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("providers", &self.providers.len())
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl EmbeddingService {
    /// Build a service over an ordered provider chain.
    ///
    /// All providers must agree on dimensionality so a fallback never
    /// changes the vector width an index was created with.
    pub fn new(
        providers: Vec<Box<dyn EmbeddingProvider>>,
        cache: Option<EmbeddingCache>,
        max_tokens: usize,
    ) -> Result<Self> {
        let Some(first) = providers.first() else {
            return Err(Error::Validation(
                "embedding service requires at least one provider".to_string(),
            ));
        };
        let dims = first.dimensions();
        for p in &providers {
            if p.dimensions() != dims {
                return Err(Error::Validation(format!(
                    "provider '{}' produces {} dimensions but '{}' produces {}",
                    p.identity(),
                    p.dimensions(),
                    first.identity(),
                    dims,
                )));
            }
        }

        Ok(Self {
            providers,
            cache: cache.map(Mutex::new),
            last_provider: Mutex::new(None),
            max_tokens: max_tokens.max(1),
        })
    }

    /// Dimensionality of every vector this service produces.
    pub fn dimensions(&self) -> usize {
        self.providers[0].dimensions()
    }

    /// Identity of the preferred (first) provider.
    pub fn identity(&self) -> String {
        self.providers[0].identity()
    }

    /// Identity of the provider that most recently produced a vector.
    pub fn last_provider(&self) -> Option<String> {
        self.last_provider.lock().expect("lock poisoned").clone()
    }

    fn remember(&self, identity: String) {
        *self.last_provider.lock().expect("lock poisoned") = Some(identity);
    }

    /// Truncate to the approximate token budget (word_count × 1.3), dropping
    /// trailing words, never splitting mid-word.
    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        let max_words = (self.max_tokens as f64 / TOKENS_PER_WORD) as usize;
        let spans = word_spans(text);
        if spans.len() <= max_words || max_words == 0 {
            return text;
        }
        &text[..spans[max_words - 1].1]
    }

    fn cache_get(&self, identity: &str, text: &str) -> Option<Vec<f32>> {
        let cache = self.cache.as_ref()?;
        let cache = cache.lock().expect("lock poisoned");
        cache.get(&EmbeddingCache::key(identity, text)).cloned()
    }

    fn cache_put(&self, identity: &str, text: &str, vector: &[f32]) {
        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().expect("lock poisoned");
            cache.insert(EmbeddingCache::key(identity, text), vector.to_vec());
        }
    }

    /// Embed one text: cache lookup per provider in chain order, then
    /// provider attempts in chain order. The first success is cached under
    /// that provider's identity.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let text = self.truncate(text);

        for provider in &self.providers {
            if let Some(hit) = self.cache_get(&provider.identity(), text) {
                return Ok(hit);
            }
        }

        let mut attempts = Vec::new();
        for provider in &self.providers {
            let identity = provider.identity();
            match provider.generate_one(text).await {
                Ok(vector) => {
                    self.cache_put(&identity, text, &vector);
                    self.remember(identity);
                    return Ok(vector);
                }
                Err(e) => {
                    tracing::warn!(provider = %identity, error = %e, "embedding provider failed, trying next");
                    attempts.push(ProviderAttempt {
                        provider: identity,
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(Error::AllProvidersFailed(attempts))
    }

    /// Embed a batch, reassembling results in input order.
    ///
    /// Texts are partitioned into cache hits and misses using the first
    /// provider's identity as the lookup namespace. Misses go to provider
    /// batch APIs in chain order; if every batch attempt fails, each miss
    /// falls back to one-by-one generation so one bad text cannot discard
    /// the partial results of the rest of the batch.
    pub async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts.iter().map(|t| self.truncate(t).to_string()).collect();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        let primary = self.identity();
        for (i, text) in truncated.iter().enumerate() {
            if let Some(hit) = self.cache_get(&primary, text) {
                results[i] = Some(hit);
            }
        }

        let miss_indices: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| i)
            .collect();

        if !miss_indices.is_empty() {
            let miss_texts: Vec<String> =
                miss_indices.iter().map(|&i| truncated[i].clone()).collect();

            let mut batch_result: Option<(String, Vec<Vec<f32>>)> = None;
            for provider in &self.providers {
                let identity = provider.identity();
                match provider.generate_batch(&miss_texts).await {
                    Ok(vectors) if vectors.len() == miss_texts.len() => {
                        batch_result = Some((identity, vectors));
                        break;
                    }
                    Ok(vectors) => {
                        tracing::warn!(
                            provider = %identity,
                            expected = miss_texts.len(),
                            got = vectors.len(),
                            "batch embedding count mismatch, trying next provider"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(provider = %identity, error = %e, "batch embedding failed, trying next provider");
                    }
                }
            }

            match batch_result {
                Some((identity, vectors)) => {
                    for (&i, vector) in miss_indices.iter().zip(vectors) {
                        self.cache_put(&identity, &truncated[i], &vector);
                        results[i] = Some(vector);
                    }
                    self.remember(identity);
                }
                None => {
                    // Every provider's batch API failed; retry misses
                    // one-by-one through the full fallback chain.
                    tracing::warn!("all batch attempts failed, falling back one-by-one");
                    for &i in &miss_indices {
                        results[i] = Some(self.generate_embedding(&truncated[i]).await?);
                    }
                }
            }
        }

        // Every slot is filled above: hits at partition time, misses by
        // batch or one-by-one fallback.
        Ok(results.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledProvider, MockProvider};

    fn service(
        providers: Vec<Box<dyn EmbeddingProvider>>,
        cache_size: Option<usize>,
    ) -> EmbeddingService {
        EmbeddingService::new(providers, cache_size.map(EmbeddingCache::new), 8192).unwrap()
    }

    #[tokio::test]
    async fn falls_back_to_next_provider() {
        let svc = service(
            vec![
                Box::new(DisabledProvider::new(8)),
                Box::new(MockProvider::new(8)),
            ],
            None,
        );
        let vector = svc.generate_embedding("x").await.unwrap();
        assert_eq!(vector.len(), 8);
        assert_eq!(svc.last_provider().as_deref(), Some("mock:deterministic"));
    }

    #[tokio::test]
    async fn all_failures_aggregate() {
        let svc = service(
            vec![
                Box::new(DisabledProvider::new(8)),
                Box::new(DisabledProvider::new(8)),
            ],
            None,
        );
        let err = svc.generate_embedding("x").await.unwrap_err();
        match err {
            Error::AllProvidersFailed(attempts) => assert_eq!(attempts.len(), 2),
            other => panic!("expected aggregate error, got {other}"),
        }
        assert_eq!(svc.last_provider(), None);
    }

    #[tokio::test]
    async fn cache_hit_skips_providers() {
        let svc = service(vec![Box::new(MockProvider::new(8))], Some(16));
        let first = svc.generate_embedding("cached text").await.unwrap();

        // Second call is served from the cache; same vector comes back.
        let second = svc.generate_embedding("cached text").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn batch_reassembles_input_order() {
        let svc = service(vec![Box::new(MockProvider::new(8))], Some(16));
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();

        // Warm the cache with a subset so the batch mixes hits and misses.
        svc.generate_embedding(&texts[1]).await.unwrap();
        svc.generate_embedding(&texts[3]).await.unwrap();

        let batch = svc.generate_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), texts.len());
        for (text, vector) in texts.iter().zip(&batch) {
            let single = svc.generate_embedding(text).await.unwrap();
            assert_eq!(&single, vector);
        }
    }

    #[tokio::test]
    async fn batch_falls_back_when_primary_fails() {
        let svc = service(
            vec![
                Box::new(DisabledProvider::new(8)),
                Box::new(MockProvider::new(8)),
            ],
            None,
        );
        let texts: Vec<String> = (0..3).map(|i| format!("text {i}")).collect();
        let batch = svc.generate_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(svc.last_provider().as_deref(), Some("mock:deterministic"));
    }

    #[tokio::test]
    async fn mismatched_dimensions_rejected_at_construction() {
        let err = EmbeddingService::new(
            vec![
                Box::new(MockProvider::new(8)),
                Box::new(MockProvider::new(16)),
            ],
            None,
            8192,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn empty_provider_list_rejected() {
        let err = EmbeddingService::new(Vec::new(), None, 8192).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn truncation_drops_trailing_words_only() {
        let svc = service(vec![Box::new(MockProvider::new(8))], None);
        let word = "alpha ";
        let text = word.repeat(20_000);
        let truncated = {
            // 8192 tokens / 1.3 ≈ 6301 words
            let svc = &svc;
            svc.truncate(&text).to_string()
        };
        assert!(truncated.len() < text.len());
        assert!(truncated.ends_with("alpha"));
        assert_eq!(truncated.split_whitespace().count(), 6301);
    }

    #[test]
    fn short_text_not_truncated() {
        let svc = service(vec![Box::new(MockProvider::new(8))], None);
        assert_eq!(svc.truncate("a few words"), "a few words");
    }
}
