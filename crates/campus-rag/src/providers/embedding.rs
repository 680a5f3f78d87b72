//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: local Ollama server
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving order
    ///
    /// Default implementation runs up to `concurrency` `embed` calls at once.
    async fn embed_batch(&self, texts: &[String], concurrency: usize) -> Result<Vec<Vec<f32>>> {
        let pending: Vec<_> = texts.iter().map(|text| self.embed(text)).collect();
        stream::iter(pending)
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Shorter texts finish later, so completion order is the reverse of input order
    struct SlowEmbedder {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let len = text.chars().count();
            tokio::time::sleep(Duration::from_millis(40 / len as u64)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if text == "坏" {
                return Err(Error::embedding("rejected"));
            }
            Ok(vec![len as f32])
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn embedder() -> SlowEmbedder {
        SlowEmbedder {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_embed_batch_keeps_input_order() {
        let embedder = embedder();
        let texts: Vec<String> = ["一", "一二", "一二三", "一二三四"].iter().map(|s| s.to_string()).collect();

        let embeddings = embedder.embed_batch(&texts, 3).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]]);
        assert!(embedder.peak.load(Ordering::SeqCst) > 1);
        assert!(embedder.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_embed_batch_propagates_errors() {
        let texts = vec!["校历".to_string(), "坏".to_string()];
        let err = embedder().embed_batch(&texts, 2).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
