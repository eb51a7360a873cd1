//! Deterministic mock provider and an always-failing stand-in.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

use super::EmbeddingProvider;

/// Deterministic embedding provider: the same text always maps to the same
/// unit vector. Never fails, so it serves as the guaranteed-success tail of
/// a provider chain and as the test provider.
pub struct MockProvider {
    dims: usize,
}

impl MockProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Hash-seeded unit vector. SHA-256 output is expanded with a counter
    /// until the requested width is filled, then L2-normalized.
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut values = Vec::with_capacity(self.dims);
        let mut counter = 0u32;
        while values.len() < self.dims {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            for byte in hasher.finalize() {
                if values.len() == self.dims {
                    break;
                }
                values.push(byte as f32 / 255.0 - 0.5);
            }
            counter += 1;
        }

        let norm = values.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt() as f32;
        if norm > 1e-10 {
            for v in &mut values {
                *v /= norm;
            }
        } else {
            let uniform = 1.0 / (self.dims as f32).sqrt();
            values.fill(uniform);
        }
        values
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn generate_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn identity(&self) -> String {
        "mock:deterministic".to_string()
    }
}

/// A provider that always fails. Takes the place of a cloud adapter when
/// embeddings are not configured, and exercises fallback paths in tests.
pub struct DisabledProvider {
    dims: usize,
}

impl DisabledProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    async fn generate_one(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Provider {
            provider: self.identity(),
            message: "embedding provider is disabled".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn identity(&self) -> String {
        "disabled".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::cosine_similarity;

    #[tokio::test]
    async fn mock_is_deterministic() {
        let provider = MockProvider::new(8);
        let a = provider.generate_one("the same text").await.unwrap();
        let b = provider.generate_one("the same text").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn mock_produces_unit_vectors() {
        let provider = MockProvider::new(384);
        let v = provider.generate_one("normalize me").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn different_texts_differ() {
        let provider = MockProvider::new(64);
        let a = provider.generate_one("first text").await.unwrap();
        let b = provider.generate_one("second text").await.unwrap();
        assert!(cosine_similarity(&a, &b) < 0.999);
    }

    #[tokio::test]
    async fn default_batch_preserves_input_order() {
        let provider = MockProvider::new(16);
        let texts: Vec<String> = (0..10).map(|i| format!("text number {i}")).collect();
        let batch = provider.generate_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), texts.len());
        for (text, vec) in texts.iter().zip(&batch) {
            let single = provider.generate_one(text).await.unwrap();
            assert_eq!(&single, vec);
        }
    }

    #[tokio::test]
    async fn disabled_provider_always_fails() {
        let provider = DisabledProvider::new(8);
        let err = provider.generate_one("x").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
