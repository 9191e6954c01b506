//! Deterministic offline embeddings.
//!
//! [`HashingProvider`] maps text into a fixed-size vector with FNV-1a
//! feature hashing over lower-cased word tokens and their character
//! trigrams. The output depends only on the text, so scores are
//! reproducible without network access.

use async_trait::async_trait;
use tracing::debug;

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::normalize;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const TOKEN_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Offline embedding provider used when no real backend is configured.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
    model: String,
}

impl HashingProvider {
    /// Create a provider emitting vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model: format!("fnv-hashing-{dimension}"),
        }
    }

    /// Embed text synchronously. Always returns a unit-length vector.
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let mut features = 0usize;

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.accumulate(&mut vector, token.as_bytes(), TOKEN_WEIGHT);
            features += 1;

            let chars: Vec<char> = token.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        // No word features (empty or punctuation-only text): hash the raw
        // string so the vector still has unit length.
        if features == 0 || vector.iter().all(|x| *x == 0.0) {
            vector.iter_mut().for_each(|x| *x = 0.0);
            let bucket = (fnv1a(text.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] = 1.0;
        }

        normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(crate::FALLBACK_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let embedding = self.embed_text(&request.text);
        debug!(
            "Generated fallback embedding with {} dimensions",
            embedding.len()
        );

        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: self.model.clone(),
            tokens_used: Some(request.text.split_whitespace().count() as u64),
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::{l2_norm, similarity};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fallback_is_deterministic() {
        let provider = HashingProvider::default();
        let a = provider
            .embed(EmbeddingRequest::new("Reorder point for SKU-1001").with_model("any"))
            .await
            .unwrap();
        let b = provider
            .embed(EmbeddingRequest::new("Reorder point for SKU-1001").with_model("any"))
            .await
            .unwrap();

        let a_bits: Vec<u32> = a.embedding.iter().map(|x| x.to_bits()).collect();
        let b_bits: Vec<u32> = b.embedding.iter().map(|x| x.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn test_fallback_is_unit_length() {
        let provider = HashingProvider::default();
        for text in ["warehouse stock levels", "", "!!!", "OTIF trend Q3"] {
            let v = provider.embed_text(text);
            assert_eq!(v.len(), crate::FALLBACK_DIMENSION);
            assert!((l2_norm(&v) - 1.0).abs() < 1e-6, "norm off for {text:?}");
        }
    }

    #[test]
    fn test_related_text_scores_higher() {
        let provider = HashingProvider::new(256);
        let query = provider.embed_text("late shipment delay");
        let close = provider.embed_text("shipment delay at port");
        let far = provider.embed_text("quarterly fill rate metric");

        let close_score = similarity(&query, &close).unwrap();
        let far_score = similarity(&query, &far).unwrap();
        assert!(close_score > far_score);
    }

    #[test]
    fn test_self_similarity() {
        let provider = HashingProvider::default();
        let v = provider.embed_text("backorder ETA");
        assert!((similarity(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }
}
