use async_trait::async_trait;
use glean_core::{GleanError, GleanResult};
use std::collections::HashMap;

/// Computes vector representations of result text for the store.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding vector for a single text.
    async fn embed(&self, text: &str) -> GleanResult<Vec<f32>>;

    /// Dimension of the vectors produced.
    fn dimension(&self) -> usize;
}

/// Local hashed bag-of-words embedding. Deterministic and offline.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Embedding with `dimension` buckets.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> GleanResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(GleanError::Store("Cannot embed empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let mut freq: HashMap<&str, f32> = HashMap::new();
        let mut total = 0.0f32;
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 1)
        {
            *freq.entry(word).or_insert(0.0) += 1.0;
            total += 1.0;
        }

        if total == 0.0 {
            return Ok(vector);
        }

        // Two hash positions per term soften collisions.
        for (word, count) in &freq {
            let tf = count / total;
            let primary = fnv1a(word.as_bytes()) as usize;
            let secondary = fnv1a(&[word.as_bytes(), b"#"].concat()) as usize;
            vector[primary % self.dimension] += tf;
            vector[secondary % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a, stable across processes and platforms.
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    #[tokio::test]
    async fn test_dimension_and_norm() {
        let emb = LocalEmbedding::new(64);
        let v = emb.embed("structured data extraction pipeline").await.unwrap();
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_similar_texts_are_closer() {
        let emb = LocalEmbedding::default();
        let a = emb.embed("rust web scraping library").await.unwrap();
        let b = emb.embed("rust scraping library for the web").await.unwrap();
        let c = emb.embed("banana bread recipe").await.unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[tokio::test]
    async fn test_deterministic() {
        let emb = LocalEmbedding::default();
        assert_eq!(
            emb.embed("same input").await.unwrap(),
            emb.embed("same input").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let emb = LocalEmbedding::default();
        assert!(emb.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_single_letter_text_is_zero_vector() {
        let emb = LocalEmbedding::new(8);
        let v = emb.embed("a b c").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
